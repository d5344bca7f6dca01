//! [`BusTransport`] over a `rosbridge_server` WebSocket.
//!
//! The robot base exchanges `diagnostic_msgs/DiagnosticStatus` messages with
//! the ROS graph.  rosbridge wraps every interaction in a JSON frame:
//!
//! ```json
//! {"op":"advertise","topic":"ftl_hardware_inputs","type":"diagnostic_msgs/DiagnosticStatus"}
//! {"op":"subscribe","topic":"ftl_hardware_outputs","type":"diagnostic_msgs/DiagnosticStatus"}
//! {"op":"publish","topic":"ftl_hardware_inputs","msg":{"level":0,"name":"digital","message":"","hardware_id":"","values":[{"key":"3","value":"1"}]}}
//! ```
//!
//! Inbound `publish` frames are routed to the stream returned by
//! [`subscribe`][BusTransport::subscribe] for their topic.  Frames for
//! unknown topics, other ops, and malformed JSON are ignored.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ftl_types::{BusMessage, KeyValue, RobotError};
use futures_util::stream::{self, BoxStream, SplitSink};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use crate::bus::Topic;
use crate::transport::BusTransport;

/// ROS message type carried on every topic.
pub const DIAGNOSTIC_STATUS_TYPE: &str = "diagnostic_msgs/DiagnosticStatus";

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type Routes = Arc<Mutex<HashMap<Topic, mpsc::UnboundedSender<BusMessage>>>>;

/// `diagnostic_msgs/DiagnosticStatus` as rosbridge serialises it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticStatus {
    #[serde(default)]
    pub level: u8,
    pub name: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub hardware_id: String,
    #[serde(default)]
    pub values: Vec<KeyValue>,
}

impl From<BusMessage> for DiagnosticStatus {
    fn from(msg: BusMessage) -> Self {
        Self {
            name: msg.name,
            values: msg.values,
            ..Self::default()
        }
    }
}

impl From<DiagnosticStatus> for BusMessage {
    fn from(status: DiagnosticStatus) -> Self {
        BusMessage {
            name: status.name,
            values: status.values,
        }
    }
}

// ---------------------------------------------------------------------------
// Frame helpers
// ---------------------------------------------------------------------------

/// Build an `advertise` frame.
pub fn advertise_frame(topic: Topic) -> Value {
    json!({ "op": "advertise", "topic": topic.name(), "type": DIAGNOSTIC_STATUS_TYPE })
}

/// Build a `subscribe` frame.
pub fn subscribe_frame(topic: Topic) -> Value {
    json!({ "op": "subscribe", "topic": topic.name(), "type": DIAGNOSTIC_STATUS_TYPE })
}

/// Build a `publish` frame carrying `message` as a `DiagnosticStatus`.
///
/// # Errors
///
/// Returns [`RobotError::Serialization`] if the message cannot be encoded.
pub fn publish_frame(topic: Topic, message: BusMessage) -> Result<Value, RobotError> {
    let msg = serde_json::to_value(DiagnosticStatus::from(message))
        .map_err(|e| RobotError::Serialization(e.to_string()))?;
    Ok(json!({ "op": "publish", "topic": topic.name(), "msg": msg }))
}

/// Parse an inbound text frame.  Returns `None` for anything that is not a
/// `publish` of a `DiagnosticStatus` on a known topic.
pub fn parse_inbound_frame(text: &str) -> Option<(Topic, BusMessage)> {
    let frame: Value = serde_json::from_str(text).ok()?;
    if frame.get("op").and_then(Value::as_str) != Some("publish") {
        return None;
    }
    let topic = frame
        .get("topic")
        .and_then(Value::as_str)
        .and_then(Topic::from_name)?;
    let status: DiagnosticStatus = serde_json::from_value(frame.get("msg")?.clone()).ok()?;
    Some((topic, status.into()))
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// WebSocket client for a `rosbridge_server` endpoint.
pub struct RosbridgeTransport {
    url: String,
    sink: tokio::sync::Mutex<Option<WsSink>>,
    routes: Routes,
}

impl RosbridgeTransport {
    /// Create a transport for `url`, e.g. `"ws://localhost:9090"`.  Nothing is
    /// opened until [`connect`][BusTransport::connect].
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            sink: tokio::sync::Mutex::new(None),
            routes: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn send_frame(&self, frame: Value) -> Result<(), RobotError> {
        let mut guard = self.sink.lock().await;
        let sink = guard
            .as_mut()
            .ok_or_else(|| RobotError::Transport(format!("not connected to {}", self.url)))?;
        sink.send(Message::Text(frame.to_string().into()))
            .await
            .map_err(|e| RobotError::Transport(format!("rosbridge send error: {e}")))
    }
}

/// Hand an inbound frame to the subscriber registered for its topic.
fn route_frame(routes: &Routes, text: &str) {
    let Some((topic, message)) = parse_inbound_frame(text) else {
        debug!("ignoring rosbridge frame");
        return;
    };
    let mut routes = routes.lock();
    if let Some(tx) = routes.get(&topic)
        && tx.send(message).is_err()
    {
        routes.remove(&topic);
    }
}

#[async_trait]
impl BusTransport for RosbridgeTransport {
    async fn connect(&self, node_name: &str) -> Result<(), RobotError> {
        let (ws_stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| RobotError::Transport(format!("rosbridge connect to {}: {e}", self.url)))?;
        let (ws_tx, mut ws_rx) = ws_stream.split();
        *self.sink.lock().await = Some(ws_tx);

        let routes = Arc::clone(&self.routes);
        let url = self.url.clone();
        tokio::spawn(async move {
            while let Some(frame) = ws_rx.next().await {
                match frame {
                    Ok(Message::Text(text)) => route_frame(&routes, text.as_str()),
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!(url = %url, error = %e, "rosbridge read error");
                        break;
                    }
                }
            }
            warn!(url = %url, "rosbridge connection closed");
            routes.lock().clear();
        });

        info!(node = node_name, url = %self.url, "connected to rosbridge");
        Ok(())
    }

    async fn subscribe(&self, topic: Topic) -> Result<BoxStream<'static, BusMessage>, RobotError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.routes.lock().insert(topic, tx);
        if let Err(e) = self.send_frame(subscribe_frame(topic)).await {
            self.routes.lock().remove(&topic);
            return Err(e);
        }
        let stream = stream::unfold(rx, |mut rx| async move {
            let message = rx.recv().await?;
            Some((message, rx))
        });
        Ok(Box::pin(stream))
    }

    async fn advertise(&self, topic: Topic) -> Result<(), RobotError> {
        self.send_frame(advertise_frame(topic)).await
    }

    async fn publish(&self, topic: Topic, message: BusMessage) -> Result<(), RobotError> {
        let frame = publish_frame(topic, message)?;
        self.send_frame(frame).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advertise_and_subscribe_frames() {
        let frame = advertise_frame(Topic::HardwareInputs);
        assert_eq!(frame["op"], "advertise");
        assert_eq!(frame["topic"], "ftl_hardware_inputs");
        assert_eq!(frame["type"], DIAGNOSTIC_STATUS_TYPE);

        let frame = subscribe_frame(Topic::SysMessage);
        assert_eq!(frame["op"], "subscribe");
        assert_eq!(frame["topic"], "ftl_sys_message");
    }

    #[test]
    fn publish_frame_wraps_diagnostic_status() {
        let message = BusMessage::new("digital").with_value("3", "1").with_value("4", "0");
        let frame = publish_frame(Topic::HardwareInputs, message).unwrap();

        assert_eq!(frame["op"], "publish");
        assert_eq!(frame["topic"], "ftl_hardware_inputs");
        assert_eq!(frame["msg"]["name"], "digital");
        assert_eq!(frame["msg"]["level"], 0);
        assert_eq!(frame["msg"]["values"][0]["key"], "3");
        assert_eq!(frame["msg"]["values"][1]["value"], "0");
    }

    #[test]
    fn parse_inbound_publish_frame() {
        let text = r#"{"op":"publish","topic":"ftl_hardware_outputs","msg":{"level":0,"name":"pwmOut","message":"","hardware_id":"","values":[{"key":"0","value":"0.5"}]}}"#;
        let (topic, message) = parse_inbound_frame(text).unwrap();
        assert_eq!(topic, Topic::HardwareOutputs);
        assert_eq!(message, BusMessage::new("pwmOut").with_value("0", "0.5"));
    }

    #[test]
    fn parse_inbound_tolerates_missing_optional_fields() {
        let text = r#"{"op":"publish","topic":"ftl_sys_message","msg":{"name":"ftl-robot-mode","values":[{"key":"mode","value":"auto"}]}}"#;
        let (topic, message) = parse_inbound_frame(text).unwrap();
        assert_eq!(topic, Topic::SysMessage);
        assert_eq!(message.get("mode"), Some("auto"));
    }

    #[test]
    fn parse_inbound_ignores_other_frames() {
        // Not a publish.
        assert!(parse_inbound_frame(r#"{"op":"status","level":"error","msg":"boom"}"#).is_none());
        // Unknown topic.
        assert!(
            parse_inbound_frame(r#"{"op":"publish","topic":"/cmd_vel","msg":{"name":"x"}}"#).is_none()
        );
        // Malformed JSON.
        assert!(parse_inbound_frame("{not json").is_none());
        // Wrong message shape.
        assert!(
            parse_inbound_frame(r#"{"op":"publish","topic":"ftl_sys_message","msg":{"data":1}}"#)
                .is_none()
        );
    }

    #[test]
    fn route_frame_delivers_to_registered_topic() {
        let routes: Routes = Arc::new(Mutex::new(HashMap::new()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        routes.lock().insert(Topic::HardwareOutputs, tx);

        route_frame(
            &routes,
            r#"{"op":"publish","topic":"ftl_hardware_outputs","msg":{"name":"digitalOut","values":[{"key":"6","value":"1"}]}}"#,
        );
        // Nobody subscribed to sys messages; the frame is dropped.
        route_frame(
            &routes,
            r#"{"op":"publish","topic":"ftl_sys_message","msg":{"name":"ftl-robot-mode","values":[]}}"#,
        );

        let message = rx.try_recv().unwrap();
        assert_eq!(message.name, "digitalOut");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn route_frame_forgets_closed_subscribers() {
        let routes: Routes = Arc::new(Mutex::new(HashMap::new()));
        let (tx, rx) = mpsc::unbounded_channel();
        routes.lock().insert(Topic::SysMessage, tx);
        drop(rx);

        route_frame(
            &routes,
            r#"{"op":"publish","topic":"ftl_sys_message","msg":{"name":"ftl-robot-mode","values":[]}}"#,
        );
        assert!(routes.lock().is_empty());
    }

    #[tokio::test]
    async fn operations_fail_before_connect() {
        let transport = RosbridgeTransport::new("ws://localhost:9090");
        assert_eq!(transport.url(), "ws://localhost:9090");
        assert!(matches!(
            transport.advertise(Topic::HardwareInputs).await,
            Err(RobotError::Transport(_))
        ));
        assert!(transport.subscribe(Topic::HardwareOutputs).await.is_err());
        assert!(transport.routes.lock().is_empty());
    }

    #[tokio::test]
    async fn connect_to_unreachable_endpoint_fails() {
        // Port 9 (discard) on localhost is not a WebSocket server.
        let transport = RosbridgeTransport::new("ws://127.0.0.1:9");
        assert!(matches!(
            transport.connect("lab_robot_base").await,
            Err(RobotError::Transport(_))
        ));
    }
}
