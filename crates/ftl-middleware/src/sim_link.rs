//! Simulation link.
//!
//! [`SimLink`] stands in for a real bus: it is always ready, logs every
//! outbound update instead of transmitting it, and never receives anything.

use ftl_types::{
    AdvertiseOutcome, ChangeSet, InputKind, LinkEvent, OutputEvent, ReceivedMessage, RobotError,
    SysMessage,
};
use tokio::sync::broadcast;
use tracing::info;

use crate::link::{EVENT_CAPACITY, Link, SIM_LINK_KEY};

/// Link that performs no transport I/O.
pub struct SimLink {
    events: broadcast::Sender<LinkEvent>,
}

impl SimLink {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { events }
    }
}

impl Default for SimLink {
    fn default() -> Self {
        Self::new()
    }
}

impl Link for SimLink {
    fn name(&self) -> &'static str {
        SIM_LINK_KEY
    }

    fn start(&self) -> Result<(), RobotError> {
        info!("Link Started");
        Ok(())
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn advertise_inputs_changed(&self, kind: InputKind, changes: &ChangeSet) -> AdvertiseOutcome {
        info!(%kind, ?changes, "Advertising \"{kind}\" change");
        AdvertiseOutcome::Logged
    }

    fn last_received_digital_out_message(&self) -> Option<ReceivedMessage<OutputEvent>> {
        None
    }

    fn last_received_pwm_out_message(&self) -> Option<ReceivedMessage<OutputEvent>> {
        None
    }

    fn last_received_robot_mode_message(&self) -> Option<ReceivedMessage<SysMessage>> {
        None
    }

    fn subscribe(&self) -> broadcast::Receiver<LinkEvent> {
        self.events.subscribe()
    }
}
