//! Generic `HardwareDriver` trait for the physical or simulated I/O surface
//! behind a [`HardwareProfile`][crate::profile::HardwareProfile].
//!
//! A driver is built once at startup from its profile and performs any
//! hardware initialisation during construction.  Afterwards the only traffic
//! it sees is decoded output commands relayed from the link.

use ftl_types::{OutputEvent, RobotError};

/// The I/O surface of a robot: GPIO expanders, PWM controllers, or a
/// simulation stand-in.
pub trait HardwareDriver: Send {
    /// Human-readable driver name, e.g. `"sim"`.
    fn name(&self) -> &str;

    /// Apply a batch of output commands received from the bus.
    ///
    /// # Errors
    ///
    /// Returns [`RobotError::HardwareFault`] if the command cannot be applied.
    fn apply_outputs(&mut self, event: &OutputEvent) -> Result<(), RobotError>;
}
