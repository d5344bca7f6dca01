//! Shared data model for the FTL robot base.
//!
//! Everything that crosses a crate boundary lives here: the port layout of a
//! hardware profile, the outbound [`ChangeSet`], the flat [`BusMessage`] wire
//! envelope, the decoded inbound events and the global [`RobotError`].

pub mod registry;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use registry::{Registry, Resolved};

/// Numeric identifier of a hardware port.
pub type PortId = u16;

/// Input ports a profile exposes. Ids are unique per category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputPorts {
    pub digital: BTreeSet<PortId>,
    pub analog: BTreeSet<PortId>,
}

/// Output ports a profile exposes. Ids are unique per category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputPorts {
    pub digital: BTreeSet<PortId>,
    pub pwm: BTreeSet<PortId>,
}

/// Category tag for an outbound input-state announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Analog,
    Digital,
}

impl InputKind {
    /// Wire tag, also used as the [`BusMessage::name`] of the encoded update.
    pub fn as_str(self) -> &'static str {
        match self {
            InputKind::Analog => "analog",
            InputKind::Digital => "digital",
        }
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InputKind {
    type Err = RobotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "analog" => Ok(InputKind::Analog),
            "digital" => Ok(InputKind::Digital),
            other => Err(RobotError::UnsupportedPortType(other.to_string())),
        }
    }
}

/// Value carried for a single port in a [`ChangeSet`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortValue {
    Digital(bool),
    Analog(f64),
}

impl PortValue {
    /// Truthiness of the value; analog values are true when non-zero.
    pub fn as_bool(self) -> bool {
        match self {
            PortValue::Digital(b) => b,
            PortValue::Analog(v) => v != 0.0,
        }
    }

    /// Numeric view of the value; digital values map to `1.0` / `0.0`.
    pub fn as_f64(self) -> f64 {
        match self {
            PortValue::Digital(true) => 1.0,
            PortValue::Digital(false) => 0.0,
            PortValue::Analog(v) => v,
        }
    }
}

impl From<bool> for PortValue {
    fn from(value: bool) -> Self {
        PortValue::Digital(value)
    }
}

impl From<f64> for PortValue {
    fn from(value: f64) -> Self {
        PortValue::Analog(value)
    }
}

/// A batch of local port-state changes to announce on the bus.
///
/// Ports are iterated in ascending id order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeSet(BTreeMap<PortId, PortValue>);

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `value` for `port`, replacing any earlier value in this batch.
    pub fn insert(&mut self, port: PortId, value: impl Into<PortValue>) {
        self.0.insert(port, value.into());
    }

    /// Builder-style variant of [`insert`][Self::insert].
    pub fn with(mut self, port: PortId, value: impl Into<PortValue>) -> Self {
        self.insert(port, value);
        self
    }

    pub fn get(&self, port: PortId) -> Option<PortValue> {
        self.0.get(&port).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PortId, PortValue)> + '_ {
        self.0.iter().map(|(p, v)| (*p, *v))
    }

    pub fn ports(&self) -> impl Iterator<Item = PortId> + '_ {
        self.0.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<V: Into<PortValue>> FromIterator<(PortId, V)> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = (PortId, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(p, v)| (p, v.into())).collect())
    }
}

/// One string key/value pair of a [`BusMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

/// Flat wire envelope exchanged over the publish/subscribe bus.
///
/// `name` is the message kind tag; `values` keeps insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusMessage {
    pub name: String,
    #[serde(default)]
    pub values: Vec<KeyValue>,
}

impl BusMessage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
        }
    }

    /// Append a key/value pair.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.push(KeyValue {
            key: key.into(),
            value: value.into(),
        });
    }

    /// Builder-style variant of [`push`][Self::push].
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(key, value);
        self
    }

    /// First value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|kv| kv.key == key)
            .map(|kv| kv.value.as_str())
    }
}

/// Decoded hardware-output command received from the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "values", rename_all = "lowercase")]
pub enum OutputEvent {
    Pwm(BTreeMap<PortId, f64>),
    Digital(BTreeMap<PortId, bool>),
}

/// Decoded system message received from the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "values")]
pub enum SysMessage {
    #[serde(rename = "ftl-robot-mode")]
    RobotMode(BTreeMap<String, String>),
}

/// Notification emitted by a link for every recognised inbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LinkEvent {
    OutputsChanged(OutputEvent),
    SysMessageReceived(SysMessage),
}

/// The most recent message of one kind, with its decoded form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceivedMessage<T> {
    pub timestamp: DateTime<Utc>,
    pub event: T,
    pub raw: BusMessage,
}

impl<T> ReceivedMessage<T> {
    pub fn now(event: T, raw: BusMessage) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
            raw,
        }
    }
}

/// Last-received cache, one slot per known inbound message kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LastReceived {
    pub digital_out: Option<ReceivedMessage<OutputEvent>>,
    pub pwm_out: Option<ReceivedMessage<OutputEvent>>,
    pub robot_mode: Option<ReceivedMessage<SysMessage>>,
}

/// Result of handing a [`ChangeSet`] to a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvertiseOutcome {
    /// Encoded and appended to the publish queue.
    Queued,
    /// The transport was not ready; the update was discarded.
    Dropped,
    /// The link has no transport and only logged the update.
    Logged,
}

/// Global error type for profile/link resolution, transports and drivers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RobotError {
    #[error("No {registry} registered under \"{name}\"")]
    UnknownEntry { registry: &'static str, name: String },

    #[error("Unsupported port type: {0}")]
    UnsupportedPortType(String),

    #[error("Link is not ready")]
    NotReady,

    #[error("Transport Error: {0}")]
    Transport(String),

    #[error("Serialization Error: {0}")]
    Serialization(String),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Hardware Fault on {component}: {details}")]
    HardwareFault { component: String, details: String },

    #[error("Runtime Error: {0}")]
    Runtime(String),
}
