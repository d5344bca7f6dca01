//! Robot bootstrap.
//!
//! [`bootstrap`] turns two optional selectors into a running robot:
//!
//! 1. Resolve the hardware profile and the link in their registries.  An
//!    unknown name is logged and replaced by the `"sim"` entry, so bad
//!    configuration never stops the process.
//! 2. Build the link and instantiate the driver from the profile.
//! 3. Relay every `OutputsChanged` event from the link to the driver.  The
//!    relay subscribes before the link starts, so no early event is missed.
//! 4. Start the link.

use std::sync::Arc;

use ftl_hal::{HardwareDriver, HardwareProfile, ProfileRegistry};
use ftl_middleware::{Link, LinkRegistry, LinkSettings};
use ftl_types::{LinkEvent, RobotError};
use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Driver shared between the [`Robot`] handle and the output relay.
pub type SharedDriver = Arc<Mutex<Box<dyn HardwareDriver>>>;

/// Profile and link selectors.  `None` means "use the default".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapOptions {
    pub profile: Option<String>,
    pub link: Option<String>,
}

/// A started robot.  Dropping it stops the output relay; the link's own
/// tasks live until the runtime shuts down.
pub struct Robot {
    profile_key: String,
    link_key: String,
    profile: HardwareProfile,
    link: Arc<dyn Link>,
    driver: SharedDriver,
    relay: JoinHandle<()>,
}

impl Robot {
    /// Registry key of the selected profile (after any fallback).
    pub fn profile_key(&self) -> &str {
        &self.profile_key
    }

    /// Registry key of the selected link (after any fallback).
    pub fn link_key(&self) -> &str {
        &self.link_key
    }

    pub fn profile(&self) -> &HardwareProfile {
        &self.profile
    }

    pub fn link(&self) -> &Arc<dyn Link> {
        &self.link
    }

    pub fn driver(&self) -> &SharedDriver {
        &self.driver
    }
}

impl Drop for Robot {
    fn drop(&mut self) {
        self.relay.abort();
    }
}

/// Resolve, construct, wire and start the robot.
///
/// Must be called from within a Tokio runtime.
///
/// # Errors
///
/// * [`RobotError::Runtime`] – called outside a Tokio runtime.
/// * [`RobotError::UnknownEntry`] – a registry lacks its default entry.
/// * Whatever the driver factory returns when hardware initialisation fails.
pub fn bootstrap(
    options: &BootstrapOptions,
    profiles: &ProfileRegistry,
    links: &LinkRegistry,
    settings: &LinkSettings,
) -> Result<Robot, RobotError> {
    tokio::runtime::Handle::try_current()
        .map_err(|e| RobotError::Runtime(format!("bootstrap requires a Tokio runtime: {e}")))?;

    info!("===== Initializing Robot =====");

    let profile_entry = profiles.resolve(options.profile.as_deref())?;
    let link_entry = links.resolve(options.link.as_deref())?;
    info!(profile = profile_entry.name, "Hardware Configuration: {}", profile_entry.name);
    info!(link = link_entry.name, "Link Interface: {}", link_entry.name);

    let profile = (profile_entry.factory)();
    let link = (link_entry.factory)(settings);
    let driver: SharedDriver = Arc::new(Mutex::new(profile.instantiate()?));

    let relay = spawn_output_relay(link.as_ref(), Arc::clone(&driver));
    if let Err(e) = link.start() {
        relay.abort();
        return Err(e);
    }

    Ok(Robot {
        profile_key: profile_entry.name.to_string(),
        link_key: link_entry.name.to_string(),
        profile,
        link,
        driver,
        relay,
    })
}

/// Forward the link's events to `driver` until the link's event channel
/// closes.  Output commands the driver rejects are logged and skipped.
///
/// Must be called from within a Tokio runtime.
pub fn spawn_output_relay(link: &dyn Link, driver: SharedDriver) -> JoinHandle<()> {
    let mut events = link.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(LinkEvent::OutputsChanged(outputs)) => {
                    if let Err(e) = driver.lock().apply_outputs(&outputs) {
                        error!(error = %e, "Failed to apply outputs");
                    }
                }
                Ok(LinkEvent::SysMessageReceived(message)) => {
                    info!(?message, "System message received");
                }
                Err(RecvError::Lagged(n)) => {
                    warn!(skipped = n, "Output relay lagged; older output commands were skipped");
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!("output relay stopped");
    })
}
