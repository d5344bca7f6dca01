//! `ftl-middleware` – the link between the robot process and the bus.
//!
//! Translates between flat [`BusMessage`][ftl_types::BusMessage] envelopes
//! on the publish/subscribe bus and typed in-process events, without caring
//! what the hardware does with them.
//!
//! # Modules
//!
//! - [`bus`] – in-process, typed, topic-based publish/subscribe bus built on
//!   Tokio broadcast channels.
//! - [`codec`] – [`ChangeSet`][ftl_types::ChangeSet] encoding and inbound
//!   message decoding.
//! - [`transport`] – the [`BusTransport`] seam and its in-process
//!   implementation.
//! - [`rosbridge`] – [`BusTransport`] over a `rosbridge_server` WebSocket.
//! - [`link`] – the [`Link`] capability contract and the link registry.
//! - [`sim_link`] / [`ros_link`] – the two link variants.

pub mod bus;
pub mod codec;
pub mod link;
pub mod ros_link;
pub mod rosbridge;
pub mod sim_link;
pub mod transport;

pub use bus::{EventBus, Topic, TopicReceiver};
pub use link::{Link, LinkFactory, LinkRegistry, LinkSettings, builtin_links};
pub use ros_link::{LinkPhase, RosLink};
pub use rosbridge::RosbridgeTransport;
pub use sim_link::SimLink;
pub use transport::{BusTransport, LocalTransport};
