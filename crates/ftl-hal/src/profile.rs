//! [`HardwareProfile`] – static declaration of a robot's ports plus the
//! driver that drives them.

use ftl_types::{InputPorts, OutputPorts, RobotError};

use crate::driver::HardwareDriver;

/// Constructor for the driver behind a profile.  Receives the profile it was
/// declared in.
pub type DriverFactory = fn(&HardwareProfile) -> Result<Box<dyn HardwareDriver>, RobotError>;

/// Immutable hardware profile.
///
/// Fields are private; a profile never changes after it has been built.
#[derive(Clone, Debug)]
pub struct HardwareProfile {
    name: String,
    inputs: InputPorts,
    outputs: OutputPorts,
    implementation: DriverFactory,
}

impl HardwareProfile {
    pub fn new(
        name: impl Into<String>,
        inputs: InputPorts,
        outputs: OutputPorts,
        implementation: DriverFactory,
    ) -> Self {
        Self {
            name: name.into(),
            inputs,
            outputs,
            implementation,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inputs(&self) -> &InputPorts {
        &self.inputs
    }

    pub fn outputs(&self) -> &OutputPorts {
        &self.outputs
    }

    /// Build the driver declared by this profile.
    ///
    /// # Errors
    ///
    /// Propagates whatever the driver constructor reports.
    pub fn instantiate(&self) -> Result<Box<dyn HardwareDriver>, RobotError> {
        (self.implementation)(self)
    }
}
