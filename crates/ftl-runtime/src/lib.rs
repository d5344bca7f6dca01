//! `ftl-runtime` – process wiring for the robot base.
//!
//! # Modules
//!
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: installs the
//!   global `tracing` subscriber (compact or JSON) with an optional OTLP span
//!   exporter.
//! - [`bootstrap`] – [`bootstrap`][bootstrap::bootstrap]: resolves the
//!   hardware profile and link by name, falls back to simulation on a miss,
//!   builds the driver, starts the link and relays output commands from the
//!   link to the driver.

pub mod bootstrap;
pub mod telemetry;

pub use bootstrap::{BootstrapOptions, Robot, SharedDriver, bootstrap, spawn_output_relay};
pub use telemetry::{LogFormat, LogSettings, TracerProviderGuard, init_tracing};
