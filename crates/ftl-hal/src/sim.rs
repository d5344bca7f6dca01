//! In-process simulation hardware for running without a physical robot.
//!
//! [`sim_profile`] declares the built-in `"simulation"` port layout and
//! [`SimHardware`] backs it with a stub driver that records every output
//! command it is handed.  This is what the process falls back to whenever the
//! requested profile cannot be resolved.
//!
//! # Example
//!
//! ```rust
//! use ftl_hal::sim::{sim_profile, SimHardware};
//! use ftl_hal::HardwareDriver;
//! use ftl_types::OutputEvent;
//! use std::collections::BTreeMap;
//!
//! let profile = sim_profile();
//! let mut hw = SimHardware::new(&profile);
//! hw.apply_outputs(&OutputEvent::Digital(BTreeMap::from([(6, true)])))
//!     .unwrap();
//! assert_eq!(hw.digital_output(6), Some(true));
//! ```

use std::collections::{BTreeMap, BTreeSet};

use ftl_types::{InputPorts, OutputEvent, OutputPorts, PortId, RobotError};
use tracing::{debug, info, warn};

use crate::driver::HardwareDriver;
use crate::profile::HardwareProfile;

/// Registry key of the simulation profile.
pub const SIM_PROFILE_KEY: &str = "sim";

/// The built-in simulation profile.
pub fn sim_profile() -> HardwareProfile {
    HardwareProfile::new(
        "simulation",
        InputPorts {
            digital: BTreeSet::from([0, 1, 2, 3, 4, 5]),
            analog: BTreeSet::from([0, 1, 2, 3, 4]),
        },
        OutputPorts {
            digital: BTreeSet::from([6, 7, 8, 9]),
            pwm: BTreeSet::from([0, 1, 2, 3]),
        },
        SimHardware::create,
    )
}

// ────────────────────────────────────────────────────────────────────────────
// Stub driver
// ────────────────────────────────────────────────────────────────────────────

/// A simulated I/O surface that stores the latest value commanded on each
/// declared output port.  Commands for undeclared ports are logged and
/// skipped.
pub struct SimHardware {
    outputs: OutputPorts,
    digital: BTreeMap<PortId, bool>,
    pwm: BTreeMap<PortId, f64>,
}

impl SimHardware {
    pub fn new(profile: &HardwareProfile) -> Self {
        info!(profile = profile.name(), "Sim Hardware Initialized");
        Self {
            outputs: profile.outputs().clone(),
            digital: BTreeMap::new(),
            pwm: BTreeMap::new(),
        }
    }

    /// [`DriverFactory`][crate::profile::DriverFactory] entry point.
    pub fn create(profile: &HardwareProfile) -> Result<Box<dyn HardwareDriver>, RobotError> {
        Ok(Box::new(Self::new(profile)))
    }

    /// Last commanded state of a digital output, if any.
    pub fn digital_output(&self, port: PortId) -> Option<bool> {
        self.digital.get(&port).copied()
    }

    /// Last commanded duty cycle of a PWM output, if any.
    pub fn pwm_output(&self, port: PortId) -> Option<f64> {
        self.pwm.get(&port).copied()
    }
}

impl HardwareDriver for SimHardware {
    fn name(&self) -> &str {
        "sim"
    }

    fn apply_outputs(&mut self, event: &OutputEvent) -> Result<(), RobotError> {
        match event {
            OutputEvent::Digital(values) => {
                for (port, value) in values {
                    if !self.outputs.digital.contains(port) {
                        warn!(port, "digital output not declared by profile; ignoring");
                        continue;
                    }
                    debug!(port, value, "sim digital out");
                    self.digital.insert(*port, *value);
                }
            }
            OutputEvent::Pwm(values) => {
                for (port, value) in values {
                    if !self.outputs.pwm.contains(port) {
                        warn!(port, "pwm output not declared by profile; ignoring");
                        continue;
                    }
                    debug!(port, value, "sim pwm out");
                    self.pwm.insert(*port, *value);
                }
            }
        }
        Ok(())
    }
}
