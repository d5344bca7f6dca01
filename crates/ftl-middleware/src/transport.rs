//! The Bus Transport seam.
//!
//! A [`Link`][crate::link::Link] never speaks a wire protocol directly.  It
//! drives a [`BusTransport`], which owns the connection handshake and the
//! mechanics of subscribing, advertising and publishing on named topics.
//!
//! - [`LocalTransport`] – routes through an in-process [`EventBus`].
//! - [`RosbridgeTransport`][crate::rosbridge::RosbridgeTransport] – speaks
//!   the `rosbridge_server` JSON protocol over a WebSocket.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use ftl_types::{BusMessage, RobotError};
use futures_util::stream::{self, BoxStream};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::bus::{EventBus, Topic};

/// Every bus transport must implement this trait.
///
/// # Contract
///
/// * `connect` – completes the connection handshake.  It may wait
///   indefinitely; the other methods fail with [`RobotError::Transport`]
///   until it has returned `Ok`.
///
/// * `subscribe` – returns a live stream of every message published on the
///   topic from now on.
///
/// * `publish` – fire-and-forget: success means the message was handed to
///   the transport, not that anybody received it.
#[async_trait]
pub trait BusTransport: Send + Sync {
    /// Connect to the bus as `node_name`.
    async fn connect(&self, node_name: &str) -> Result<(), RobotError>;

    /// Subscribe to `topic`.
    async fn subscribe(&self, topic: Topic) -> Result<BoxStream<'static, BusMessage>, RobotError>;

    /// Announce that this node will publish on `topic`.
    async fn advertise(&self, topic: Topic) -> Result<(), RobotError>;

    /// Publish `message` on `topic`.
    async fn publish(&self, topic: Topic, message: BusMessage) -> Result<(), RobotError>;
}

/// [`BusTransport`] over an in-process [`EventBus`].
///
/// The handshake completes immediately.  Useful for embedding the robot base
/// in a larger process and for exercising links without a network.
pub struct LocalTransport {
    bus: Arc<EventBus>,
    connected: AtomicBool,
}

impl LocalTransport {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            bus,
            connected: AtomicBool::new(false),
        }
    }

    /// The bus this transport routes through.
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    fn ensure_connected(&self) -> Result<(), RobotError> {
        if self.connected.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(RobotError::Transport("local transport is not connected".to_string()))
        }
    }
}

#[async_trait]
impl BusTransport for LocalTransport {
    async fn connect(&self, node_name: &str) -> Result<(), RobotError> {
        self.connected.store(true, Ordering::Release);
        info!(node = node_name, "connected to in-process bus");
        Ok(())
    }

    async fn subscribe(&self, topic: Topic) -> Result<BoxStream<'static, BusMessage>, RobotError> {
        self.ensure_connected()?;
        let receiver = self.bus.subscribe_to(topic);
        let stream = stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(message) => return Some((message, receiver)),
                    Err(RecvError::Lagged(n)) => {
                        warn!(topic = receiver.topic().name(), lagged_by = n, "local subscriber lagged");
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        });
        Ok(Box::pin(stream))
    }

    async fn advertise(&self, topic: Topic) -> Result<(), RobotError> {
        self.ensure_connected()?;
        info!(topic = topic.name(), "advertised on in-process bus");
        Ok(())
    }

    async fn publish(&self, topic: Topic, message: BusMessage) -> Result<(), RobotError> {
        self.ensure_connected()?;
        self.bus.publish_to(topic, message).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    fn make_transport() -> (Arc<EventBus>, LocalTransport) {
        let bus = Arc::new(EventBus::default());
        let transport = LocalTransport::new(Arc::clone(&bus));
        (bus, transport)
    }

    #[tokio::test]
    async fn operations_fail_before_connect() {
        let (_, transport) = make_transport();
        assert!(matches!(
            transport.advertise(Topic::HardwareInputs).await,
            Err(RobotError::Transport(_))
        ));
        assert!(transport.subscribe(Topic::SysMessage).await.is_err());
        assert!(
            transport
                .publish(Topic::HardwareInputs, BusMessage::new("digital"))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn subscribe_streams_published_messages() -> Result<(), Box<dyn std::error::Error>> {
        let (bus, transport) = make_transport();
        transport.connect("test_node").await?;

        let mut stream = transport.subscribe(Topic::HardwareOutputs).await?;
        let message = BusMessage::new("pwmOut").with_value("0", "0.5");
        bus.publish_to(Topic::HardwareOutputs, message.clone())?;

        assert_eq!(stream.next().await, Some(message));
        Ok(())
    }

    #[tokio::test]
    async fn publish_reaches_bus_subscribers() -> Result<(), Box<dyn std::error::Error>> {
        let (bus, transport) = make_transport();
        transport.connect("test_node").await?;
        transport.advertise(Topic::HardwareInputs).await?;

        let mut rx = bus.subscribe_to(Topic::HardwareInputs);
        let message = BusMessage::new("analog").with_value("2", "0.75");
        transport.publish(Topic::HardwareInputs, message.clone()).await?;

        assert_eq!(rx.recv().await?, message);
        Ok(())
    }
}
