//! In-process, typed, topic-based publish/subscribe bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others.
//!
//! # Topics
//!
//! Traffic is partitioned into three [`Topic`] lanes, mirroring the topics
//! the robot base exchanges with the outside world:
//!
//! | Topic | Wire name | Direction |
//! |---|---|---|
//! | [`Topic::HardwareInputs`] | `ftl_hardware_inputs` | robot → bus (input-state changes) |
//! | [`Topic::HardwareOutputs`] | `ftl_hardware_outputs` | bus → robot (PWM / digital commands) |
//! | [`Topic::SysMessage`] | `ftl_sys_message` | bus → robot (mode and system messages) |

use ftl_types::{BusMessage, RobotError};
use tokio::sync::broadcast;

/// Default channel capacity (number of buffered messages before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Every topic the robot base publishes or subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topic {
    /// Outbound input-state announcements.
    HardwareInputs,
    /// Inbound output commands.
    HardwareOutputs,
    /// Inbound system messages (robot mode, …).
    SysMessage,
}

impl Topic {
    /// Wire name of the topic.
    pub fn name(self) -> &'static str {
        match self {
            Topic::HardwareInputs => "ftl_hardware_inputs",
            Topic::HardwareOutputs => "ftl_hardware_outputs",
            Topic::SysMessage => "ftl_sys_message",
        }
    }

    /// Reverse of [`name`][Self::name].
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ftl_hardware_inputs" => Some(Topic::HardwareInputs),
            "ftl_hardware_outputs" => Some(Topic::HardwareOutputs),
            "ftl_sys_message" => Some(Topic::SysMessage),
            _ => None,
        }
    }
}

/// Shared in-process bus. Clone it cheaply – all clones share the same
/// underlying broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    hardware_inputs: broadcast::Sender<BusMessage>,
    hardware_outputs: broadcast::Sender<BusMessage>,
    sys_message: broadcast::Sender<BusMessage>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity.
    ///
    /// The `capacity` is applied to every topic channel independently.
    pub fn new(capacity: usize) -> Self {
        let (hardware_inputs, _) = broadcast::channel(capacity);
        let (hardware_outputs, _) = broadcast::channel(capacity);
        let (sys_message, _) = broadcast::channel(capacity);
        Self {
            hardware_inputs,
            hardware_outputs,
            sys_message,
        }
    }

    /// Publish `message` to the given [`Topic`] channel.
    ///
    /// Returns the number of active receivers that were handed the message.
    ///
    /// # Errors
    ///
    /// Returns [`RobotError::Transport`] when nobody is subscribed to the
    /// topic.
    pub fn publish_to(&self, topic: Topic, message: BusMessage) -> Result<usize, RobotError> {
        self.topic_sender(topic)
            .send(message)
            .map_err(|_| RobotError::Transport(format!("No subscribers for topic {}", topic.name())))
    }

    /// Subscribe to a specific [`Topic`] channel.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    /// Number of live subscribers on `topic`.
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.topic_sender(topic).receiver_count()
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<BusMessage> {
        match topic {
            Topic::HardwareInputs => &self.hardware_inputs,
            Topic::HardwareOutputs => &self.hardware_outputs,
            Topic::SysMessage => &self.sys_message,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// An async receiver bound to a single [`Topic`] channel.
///
/// Obtained via [`EventBus::subscribe_to`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<BusMessage>,
}

impl TopicReceiver {
    /// Wait for the next message on this topic.
    ///
    /// Returns:
    /// * `Ok(message)` – a successfully received message.
    /// * `Err(broadcast::error::RecvError::Lagged(n))` – the subscriber fell
    ///   behind and `n` messages were dropped.
    /// * `Err(broadcast::error::RecvError::Closed)` – the bus has shut down.
    pub async fn recv(&mut self) -> Result<BusMessage, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Non-blocking variant of [`recv`][Self::recv].
    pub fn try_recv(&mut self) -> Result<BusMessage, broadcast::error::TryRecvError> {
        self.receiver.try_recv()
    }

    /// The [`Topic`] this receiver is bound to.
    pub fn topic(&self) -> Topic {
        self.topic
    }
}
