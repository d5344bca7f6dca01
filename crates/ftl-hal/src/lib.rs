//! `ftl-hal` – hardware profiles and drivers.
//!
//! # Modules
//!
//! - [`driver`] – the [`HardwareDriver`] trait every I/O surface implements.
//! - [`profile`] – [`HardwareProfile`], the immutable port layout paired with
//!   the driver constructor that brings it up.
//! - [`sim`] – the built-in simulation profile and [`SimHardware`] driver.
//! - [`registry`] – the name → profile table used at startup.

pub mod driver;
pub mod profile;
pub mod registry;
pub mod sim;

pub use driver::HardwareDriver;
pub use profile::{DriverFactory, HardwareProfile};
pub use registry::{ProfileFactory, ProfileRegistry, builtin_profiles};
pub use sim::SimHardware;
