//! The Link capability contract.
//!
//! The robot base never speaks to the bus directly.  It hands input-state
//! changes to a [`Link`] and listens to the [`LinkEvent`]s the link emits
//! for inbound traffic.
//!
//! # Overview
//!
//! - [`Link`] – the trait every link must implement.
//! - [`SimLink`][crate::sim_link::SimLink] – no transport; logs only.
//! - [`RosLink`][crate::ros_link::RosLink] – a [`BusTransport`] link, by
//!   default over rosbridge.
//! - [`builtin_links`] – the name → link table used at startup.
//!
//! [`BusTransport`]: crate::transport::BusTransport

use std::sync::Arc;
use std::time::Duration;

use ftl_types::{
    AdvertiseOutcome, ChangeSet, InputKind, LinkEvent, OutputEvent, ReceivedMessage, Registry,
    RobotError, SysMessage,
};
use tokio::sync::broadcast;

use crate::ros_link::RosLink;
use crate::sim_link::SimLink;

/// Registry key of the simulation link.
pub const SIM_LINK_KEY: &str = "sim";
/// Registry key of the rosbridge link.
pub const ROS_LINK_KEY: &str = "ros";

/// Default node name presented to the bus.
pub const DEFAULT_NODE_NAME: &str = "lab_robot_base";
/// Default rosbridge endpoint.
pub const DEFAULT_ROSBRIDGE_URL: &str = "ws://localhost:9090";
/// Default publish-queue flush period.
pub const DEFAULT_PUBLISH_INTERVAL: Duration = Duration::from_millis(50);
/// Default pause between connection attempts while the bus is unreachable.
pub const DEFAULT_CONNECT_RETRY: Duration = Duration::from_secs(1);

/// Capacity of a link's [`LinkEvent`] channel.
pub(crate) const EVENT_CAPACITY: usize = 64;

/// Every link variant must implement this trait.
///
/// # Contract
///
/// * `start` – begins asynchronous initialisation and returns immediately.
///   Must be called from within a Tokio runtime.
///
/// * `is_ready` – `true` once the link can accept outbound updates.
///
/// * `advertise_inputs_changed` – best effort, at most once: an update
///   handed over while the link is not ready is dropped, not queued.
///
/// * `subscribe` – a receiver for every [`LinkEvent`] emitted from now on.
pub trait Link: Send + Sync {
    /// Registry key of this link variant.
    fn name(&self) -> &'static str;

    /// Begin connecting.
    ///
    /// # Errors
    ///
    /// Returns [`RobotError::Runtime`] when called outside a Tokio runtime.
    fn start(&self) -> Result<(), RobotError>;

    fn is_ready(&self) -> bool;

    /// Announce a batch of input-state changes.
    fn advertise_inputs_changed(&self, kind: InputKind, changes: &ChangeSet) -> AdvertiseOutcome;

    /// [`advertise_inputs_changed`][Self::advertise_inputs_changed] keyed by
    /// the wire tag (`"analog"` or `"digital"`).
    ///
    /// # Errors
    ///
    /// Returns [`RobotError::UnsupportedPortType`] for any other tag.
    fn advertise_tagged(&self, tag: &str, changes: &ChangeSet) -> Result<AdvertiseOutcome, RobotError> {
        let kind: InputKind = tag.parse()?;
        Ok(self.advertise_inputs_changed(kind, changes))
    }

    fn last_received_digital_out_message(&self) -> Option<ReceivedMessage<OutputEvent>>;

    fn last_received_pwm_out_message(&self) -> Option<ReceivedMessage<OutputEvent>>;

    fn last_received_robot_mode_message(&self) -> Option<ReceivedMessage<SysMessage>>;

    /// Subscribe to the link's notifications.
    fn subscribe(&self) -> broadcast::Receiver<LinkEvent>;
}

/// Settings shared by every link factory.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkSettings {
    pub node_name: String,
    pub rosbridge_url: String,
    pub publish_interval: Duration,
    pub connect_retry: Duration,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            node_name: DEFAULT_NODE_NAME.to_string(),
            rosbridge_url: DEFAULT_ROSBRIDGE_URL.to_string(),
            publish_interval: DEFAULT_PUBLISH_INTERVAL,
            connect_retry: DEFAULT_CONNECT_RETRY,
        }
    }
}

/// Builds a link from the process-wide [`LinkSettings`].
pub type LinkFactory = fn(&LinkSettings) -> Arc<dyn Link>;

/// Name → link table with `"sim"` as the fallback.
pub type LinkRegistry = Registry<LinkFactory>;

fn sim_link(_settings: &LinkSettings) -> Arc<dyn Link> {
    Arc::new(SimLink::new())
}

fn ros_link(settings: &LinkSettings) -> Arc<dyn Link> {
    Arc::new(RosLink::rosbridge(settings))
}

/// Registry holding every link shipped with this crate.
pub fn builtin_links() -> LinkRegistry {
    Registry::<LinkFactory>::new("link", SIM_LINK_KEY)
        .with(SIM_LINK_KEY, sim_link)
        .with(ROS_LINK_KEY, ros_link)
}
