//! Bus-transport link.
//!
//! [`RosLink`] bridges between the robot base and a publish/subscribe bus
//! reached through a [`BusTransport`]:
//!
//! * **Outbound** – [`ChangeSet`]s handed to
//!   [`advertise_inputs_changed`][Link::advertise_inputs_changed] are encoded
//!   and appended to a publish queue.  A timer drains the queue onto
//!   `ftl_hardware_inputs` every publish interval (50 ms by default).
//!
//! * **Inbound** – `pwmOut` / `digitalOut` messages on
//!   `ftl_hardware_outputs` and `ftl-robot-mode` messages on
//!   `ftl_sys_message` are decoded, cached as the last message of their kind,
//!   and emitted as [`LinkEvent`]s.  Anything else is ignored.
//!
//! # Lifecycle
//!
//! `Uninitialized` → [`start`][Link::start] → `Connecting` → handshake
//! completes → `Ready`.  There is no way back from `Ready`.  While the bus is
//! unreachable the link stays in `Connecting`, drops updates, and re-attempts
//! the connection every [`LinkSettings::connect_retry`].

use std::sync::Arc;
use std::time::Duration;

use ftl_types::{
    AdvertiseOutcome, BusMessage, ChangeSet, InputKind, LastReceived, LinkEvent, OutputEvent,
    ReceivedMessage, RobotError, SysMessage,
};
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::bus::Topic;
use crate::codec;
use crate::link::{EVENT_CAPACITY, Link, LinkSettings, ROS_LINK_KEY};
use crate::rosbridge::RosbridgeTransport;
use crate::transport::BusTransport;

/// Connection state of a [`RosLink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPhase {
    Uninitialized,
    Connecting,
    Ready,
}

/// Link over a [`BusTransport`].  Cheap to share: clones are not needed,
/// the link is handed out as `Arc<dyn Link>`.
pub struct RosLink {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn BusTransport>,
    node_name: String,
    publish_interval: Duration,
    connect_retry: Duration,
    phase: Mutex<LinkPhase>,
    publish_queue: Mutex<Vec<BusMessage>>,
    /// Held for a whole flush so batches reach the transport in order.
    flush_lock: tokio::sync::Mutex<()>,
    last_received: Mutex<LastReceived>,
    events: broadcast::Sender<LinkEvent>,
}

impl RosLink {
    /// Create a link driving `transport`.
    pub fn new(transport: Arc<dyn BusTransport>, settings: &LinkSettings) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                transport,
                node_name: settings.node_name.clone(),
                publish_interval: settings.publish_interval,
                connect_retry: settings.connect_retry,
                phase: Mutex::new(LinkPhase::Uninitialized),
                publish_queue: Mutex::new(Vec::new()),
                flush_lock: tokio::sync::Mutex::new(()),
                last_received: Mutex::new(LastReceived::default()),
                events,
            }),
        }
    }

    /// Create a link over a [`RosbridgeTransport`] for
    /// `settings.rosbridge_url`.
    pub fn rosbridge(settings: &LinkSettings) -> Self {
        let transport = Arc::new(RosbridgeTransport::new(settings.rosbridge_url.clone()));
        Self::new(transport, settings)
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> LinkPhase {
        *self.inner.phase.lock()
    }

    /// Number of messages waiting for the next flush.
    pub fn pending_messages(&self) -> usize {
        self.inner.publish_queue.lock().len()
    }

    /// Publish every queued message in enqueue order and clear the queue.
    /// Returns the number of messages handed to the transport.  Concurrent
    /// flushes, including the timer's, run one after the other.
    pub async fn flush_publish_queue(&self) -> usize {
        self.inner.flush_publish_queue().await
    }

    /// Handle one message from `ftl_hardware_outputs`.
    pub fn handle_hardware_outputs(&self, msg: BusMessage) {
        self.inner.handle_hardware_outputs(msg);
    }

    /// Handle one message from `ftl_sys_message`.
    pub fn handle_system_message(&self, msg: BusMessage) {
        self.inner.handle_system_message(msg);
    }
}

impl Inner {
    fn is_ready(&self) -> bool {
        *self.phase.lock() == LinkPhase::Ready
    }

    async fn run(self: Arc<Self>) -> Result<(), RobotError> {
        self.connect().await;
        info!(node = %self.node_name, "Bus node {} initialized", self.node_name);

        let outputs = self.transport.subscribe(Topic::HardwareOutputs).await?;
        let sys_messages = self.transport.subscribe(Topic::SysMessage).await?;
        self.transport.advertise(Topic::HardwareInputs).await?;

        *self.phase.lock() = LinkPhase::Ready;

        tokio::spawn(Self::pump(Arc::clone(&self), outputs, Self::handle_hardware_outputs));
        tokio::spawn(Self::pump(Arc::clone(&self), sys_messages, Self::handle_system_message));

        let mut interval = tokio::time::interval(self.publish_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            self.flush_publish_queue().await;
        }
    }

    /// Wait for the handshake, however long the bus takes to come up.
    async fn connect(&self) {
        let mut attempt: u64 = 1;
        while let Err(e) = self.transport.connect(&self.node_name).await {
            warn!(
                error = %e,
                attempt,
                retry_in = ?self.connect_retry,
                "Bus not reachable yet; retrying"
            );
            tokio::time::sleep(self.connect_retry).await;
            attempt += 1;
        }
    }

    async fn pump(
        self: Arc<Self>,
        mut stream: BoxStream<'static, BusMessage>,
        handler: fn(&Inner, BusMessage),
    ) {
        while let Some(msg) = stream.next().await {
            handler(self.as_ref(), msg);
        }
        debug!("inbound subscription ended");
    }

    async fn flush_publish_queue(&self) -> usize {
        let _flushing = self.flush_lock.lock().await;
        let batch = std::mem::take(&mut *self.publish_queue.lock());
        let count = batch.len();
        for msg in batch {
            if let Err(e) = self.transport.publish(Topic::HardwareInputs, msg).await {
                warn!(error = %e, "Failed to publish queued input update");
            }
        }
        count
    }

    fn enqueue(&self, msg: BusMessage) {
        self.publish_queue.lock().push(msg);
    }

    fn handle_hardware_outputs(&self, msg: BusMessage) {
        let Some(event) = codec::decode_output_message(&msg) else {
            return;
        };
        let record = ReceivedMessage::now(event.clone(), msg);
        {
            let mut last = self.last_received.lock();
            match event {
                OutputEvent::Pwm(_) => last.pwm_out = Some(record),
                OutputEvent::Digital(_) => last.digital_out = Some(record),
            }
        }
        let _ = self.events.send(LinkEvent::OutputsChanged(event));
    }

    fn handle_system_message(&self, msg: BusMessage) {
        let Some(event) = codec::decode_sys_message(&msg) else {
            return;
        };
        let record = ReceivedMessage::now(event.clone(), msg);
        match event {
            SysMessage::RobotMode(_) => self.last_received.lock().robot_mode = Some(record),
        }
        let _ = self.events.send(LinkEvent::SysMessageReceived(event));
    }
}

impl Link for RosLink {
    fn name(&self) -> &'static str {
        ROS_LINK_KEY
    }

    fn start(&self) -> Result<(), RobotError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| RobotError::Runtime(format!("link start requires a Tokio runtime: {e}")))?;
        {
            let mut phase = self.inner.phase.lock();
            if *phase != LinkPhase::Uninitialized {
                warn!(phase = ?*phase, "Link already started");
                return Ok(());
            }
            *phase = LinkPhase::Connecting;
        }

        let inner = Arc::clone(&self.inner);
        runtime.spawn(async move {
            if let Err(e) = inner.run().await {
                error!(error = %e, "Link setup failed; outbound updates will be dropped");
            }
        });
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.inner.is_ready()
    }

    fn advertise_inputs_changed(&self, kind: InputKind, changes: &ChangeSet) -> AdvertiseOutcome {
        if !self.inner.is_ready() {
            warn!(%kind, "Link is not ready. Dropping update of type {kind}");
            return AdvertiseOutcome::Dropped;
        }
        self.inner.enqueue(codec::encode_change_set(kind, changes));
        AdvertiseOutcome::Queued
    }

    fn last_received_digital_out_message(&self) -> Option<ReceivedMessage<OutputEvent>> {
        self.inner.last_received.lock().digital_out.clone()
    }

    fn last_received_pwm_out_message(&self) -> Option<ReceivedMessage<OutputEvent>> {
        self.inner.last_received.lock().pwm_out.clone()
    }

    fn last_received_robot_mode_message(&self) -> Option<ReceivedMessage<SysMessage>> {
        self.inner.last_received.lock().robot_mode.clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<LinkEvent> {
        self.inner.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBus;
    use crate::transport::LocalTransport;
    use async_trait::async_trait;
    use futures_util::stream;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;
    use tokio::time::timeout;

    fn settings() -> LinkSettings {
        LinkSettings {
            publish_interval: Duration::from_millis(10),
            connect_retry: Duration::from_millis(20),
            ..LinkSettings::default()
        }
    }

    fn make_link() -> (Arc<EventBus>, RosLink) {
        let bus = Arc::new(EventBus::default());
        let transport = Arc::new(LocalTransport::new(Arc::clone(&bus)));
        (bus, RosLink::new(transport, &settings()))
    }

    async fn wait_until_ready(link: &RosLink) {
        timeout(Duration::from_secs(2), async {
            while !link.is_ready() {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("link did not become ready");
    }

    /// Transport whose handshake blocks until released.
    struct GatedTransport {
        gate: Arc<Notify>,
        inner: LocalTransport,
    }

    #[async_trait]
    impl BusTransport for GatedTransport {
        async fn connect(&self, node_name: &str) -> Result<(), RobotError> {
            self.gate.notified().await;
            self.inner.connect(node_name).await
        }

        async fn subscribe(&self, topic: Topic) -> Result<BoxStream<'static, BusMessage>, RobotError> {
            self.inner.subscribe(topic).await
        }

        async fn advertise(&self, topic: Topic) -> Result<(), RobotError> {
            self.inner.advertise(topic).await
        }

        async fn publish(&self, topic: Topic, message: BusMessage) -> Result<(), RobotError> {
            self.inner.publish(topic, message).await
        }
    }

    /// Transport whose first `failures` handshakes are refused.
    struct FlakyTransport {
        failures_left: AtomicUsize,
        attempts: AtomicUsize,
        inner: LocalTransport,
    }

    #[async_trait]
    impl BusTransport for FlakyTransport {
        async fn connect(&self, node_name: &str) -> Result<(), RobotError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let refused = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if refused {
                return Err(RobotError::Transport("connection refused".to_string()));
            }
            self.inner.connect(node_name).await
        }

        async fn subscribe(&self, topic: Topic) -> Result<BoxStream<'static, BusMessage>, RobotError> {
            self.inner.subscribe(topic).await
        }

        async fn advertise(&self, topic: Topic) -> Result<(), RobotError> {
            self.inner.advertise(topic).await
        }

        async fn publish(&self, topic: Topic, message: BusMessage) -> Result<(), RobotError> {
            self.inner.publish(topic, message).await
        }
    }

    /// Transport whose publishes take a while; records the first port key of
    /// every published message in completion order.
    struct SlowTransport {
        published: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl BusTransport for SlowTransport {
        async fn connect(&self, _node_name: &str) -> Result<(), RobotError> {
            Ok(())
        }

        async fn subscribe(&self, _topic: Topic) -> Result<BoxStream<'static, BusMessage>, RobotError> {
            Ok(Box::pin(stream::pending()))
        }

        async fn advertise(&self, _topic: Topic) -> Result<(), RobotError> {
            Ok(())
        }

        async fn publish(&self, _topic: Topic, message: BusMessage) -> Result<(), RobotError> {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let key = message.values.first().map(|kv| kv.key.clone()).unwrap_or_default();
            self.published.lock().push(key);
            Ok(())
        }
    }

    // -----------------------------------------------------------------------
    // Readiness
    // -----------------------------------------------------------------------

    #[test]
    fn new_link_is_uninitialized() {
        let (_, link) = make_link();
        assert_eq!(link.phase(), LinkPhase::Uninitialized);
        assert!(!link.is_ready());
    }

    #[test]
    fn start_outside_runtime_is_an_error() {
        let (_, link) = make_link();
        assert!(matches!(link.start(), Err(RobotError::Runtime(_))));
        assert_eq!(link.phase(), LinkPhase::Uninitialized);
    }

    #[tokio::test]
    async fn link_becomes_ready_only_after_handshake() {
        let gate = Arc::new(Notify::new());
        let transport = Arc::new(GatedTransport {
            gate: Arc::clone(&gate),
            inner: LocalTransport::new(Arc::new(EventBus::default())),
        });
        let link = RosLink::new(transport, &settings());

        link.start().unwrap();
        assert_eq!(link.phase(), LinkPhase::Connecting);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!link.is_ready());

        gate.notify_one();
        wait_until_ready(&link).await;
        assert_eq!(link.phase(), LinkPhase::Ready);
    }

    #[tokio::test]
    async fn refused_handshake_is_retried_until_ready() {
        let transport = Arc::new(FlakyTransport {
            failures_left: AtomicUsize::new(2),
            attempts: AtomicUsize::new(0),
            inner: LocalTransport::new(Arc::new(EventBus::default())),
        });
        let link = RosLink::new(Arc::clone(&transport) as Arc<dyn BusTransport>, &settings());

        link.start().unwrap();
        assert!(!link.is_ready());
        wait_until_ready(&link).await;
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn rosbridge_link_becomes_ready_once_bridge_comes_up() -> Result<(), Box<dyn std::error::Error>> {
        // Reserve a free port, then release it so nothing is listening yet.
        let reserved = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = reserved.local_addr()?;
        drop(reserved);

        let link = RosLink::rosbridge(&LinkSettings {
            rosbridge_url: format!("ws://{addr}"),
            connect_retry: Duration::from_millis(50),
            ..LinkSettings::default()
        });
        link.start()?;
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(link.phase(), LinkPhase::Connecting);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        let bridge = tokio::spawn(async move {
            let Ok((socket, _)) = listener.accept().await else {
                return;
            };
            let Ok(mut ws) = tokio_tungstenite::accept_async(socket).await else {
                return;
            };
            while let Some(Ok(_)) = ws.next().await {}
        });

        wait_until_ready(&link).await;
        assert_eq!(link.phase(), LinkPhase::Ready);
        bridge.abort();
        Ok(())
    }

    #[tokio::test]
    async fn second_start_is_ignored() {
        let (_, link) = make_link();
        link.start().unwrap();
        link.start().unwrap();
        wait_until_ready(&link).await;
        link.start().unwrap();
        assert_eq!(link.phase(), LinkPhase::Ready);
    }

    // -----------------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------------

    #[test]
    fn advertise_while_not_ready_does_not_touch_queue() {
        let (_, link) = make_link();
        for kind in [InputKind::Analog, InputKind::Digital] {
            let changes = ChangeSet::new().with(0, true).with(1, 0.5);
            assert_eq!(
                link.advertise_inputs_changed(kind, &changes),
                AdvertiseOutcome::Dropped
            );
            assert_eq!(link.pending_messages(), 0);
        }
    }

    #[tokio::test]
    async fn advertise_while_connecting_is_dropped() {
        let gate = Arc::new(Notify::new());
        let transport = Arc::new(GatedTransport {
            gate,
            inner: LocalTransport::new(Arc::new(EventBus::default())),
        });
        let link = RosLink::new(transport, &settings());
        link.start().unwrap();

        let outcome = link.advertise_tagged("digital", &ChangeSet::new().with(2, true));
        assert_eq!(outcome, Ok(AdvertiseOutcome::Dropped));
        assert_eq!(link.pending_messages(), 0);
    }

    #[tokio::test]
    async fn flush_publishes_queued_messages_in_order() -> Result<(), Box<dyn std::error::Error>> {
        let bus = Arc::new(EventBus::default());
        // Long interval so the timer does not race the manual flush.
        let link = RosLink::new(
            Arc::new(LocalTransport::new(Arc::clone(&bus))),
            &LinkSettings {
                publish_interval: Duration::from_secs(3600),
                ..LinkSettings::default()
            },
        );
        let mut rx = bus.subscribe_to(Topic::HardwareInputs);
        link.start()?;
        wait_until_ready(&link).await;
        // The first interval tick fires immediately; let it pass.
        tokio::time::sleep(Duration::from_millis(10)).await;

        for port in 0..3u16 {
            let changes = ChangeSet::new().with(port, f64::from(port) + 0.5);
            assert_eq!(
                link.advertise_inputs_changed(InputKind::Analog, &changes),
                AdvertiseOutcome::Queued
            );
        }
        assert_eq!(link.pending_messages(), 3);

        assert_eq!(link.flush_publish_queue().await, 3);
        assert_eq!(link.pending_messages(), 0);

        for port in 0..3u16 {
            let msg = rx.recv().await?;
            assert_eq!(msg.name, "analog");
            assert_eq!(msg.get(&port.to_string()), Some(format!("{port}.5").as_str()));
        }

        // Nothing left: a second flush publishes nothing.
        assert_eq!(link.flush_publish_queue().await, 0);
        assert!(rx.try_recv().is_err());
        Ok(())
    }

    #[tokio::test]
    async fn overlapping_flushes_keep_enqueue_order() -> Result<(), Box<dyn std::error::Error>> {
        let published = Arc::new(Mutex::new(Vec::new()));
        let link = RosLink::new(
            Arc::new(SlowTransport {
                published: Arc::clone(&published),
            }),
            &LinkSettings {
                publish_interval: Duration::from_secs(3600),
                ..settings()
            },
        );
        link.start()?;
        wait_until_ready(&link).await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        for port in 0..2u16 {
            link.advertise_inputs_changed(InputKind::Analog, &ChangeSet::new().with(port, 1.0));
        }
        let (first, second) = tokio::join!(link.flush_publish_queue(), async {
            // Lands while the first batch is still being published.
            tokio::time::sleep(Duration::from_millis(2)).await;
            link.advertise_inputs_changed(InputKind::Analog, &ChangeSet::new().with(2, 1.0));
            link.flush_publish_queue().await
        });

        assert_eq!((first, second), (2, 1));
        assert_eq!(*published.lock(), vec!["0", "1", "2"]);
        Ok(())
    }

    #[tokio::test]
    async fn timer_flushes_queue_onto_inputs_topic() -> Result<(), Box<dyn std::error::Error>> {
        let (bus, link) = make_link();
        let mut rx = bus.subscribe_to(Topic::HardwareInputs);
        link.start()?;
        wait_until_ready(&link).await;

        let outcome = link.advertise_inputs_changed(
            InputKind::Digital,
            &ChangeSet::new().with(3, true).with(4, false),
        );
        assert_eq!(outcome, AdvertiseOutcome::Queued);

        let msg = timeout(Duration::from_secs(1), rx.recv()).await??;
        assert_eq!(msg.name, "digital");
        assert_eq!(msg.get("3"), Some("1"));
        assert_eq!(msg.get("4"), Some("0"));
        assert_eq!(link.pending_messages(), 0);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------------

    #[test]
    fn digital_out_records_and_emits_digital_values() {
        let (_, link) = make_link();
        let mut rx = link.subscribe();
        let raw = BusMessage::new("digitalOut")
            .with_value("3", "1")
            .with_value("4", "0");

        link.handle_hardware_outputs(raw.clone());

        let expected = OutputEvent::Digital(BTreeMap::from([(3, true), (4, false)]));
        assert_eq!(rx.try_recv().unwrap(), LinkEvent::OutputsChanged(expected.clone()));

        let last = link.last_received_digital_out_message().unwrap();
        assert_eq!(last.event, expected);
        assert_eq!(last.raw, raw);
        assert!(link.last_received_pwm_out_message().is_none());
    }

    #[test]
    fn pwm_out_records_and_emits_pwm_values() {
        let (_, link) = make_link();
        let mut rx = link.subscribe();

        link.handle_hardware_outputs(BusMessage::new("pwmOut").with_value("0", "0.5"));

        let expected = OutputEvent::Pwm(BTreeMap::from([(0, 0.5)]));
        assert_eq!(rx.try_recv().unwrap(), LinkEvent::OutputsChanged(expected.clone()));
        assert_eq!(link.last_received_pwm_out_message().unwrap().event, expected);
        assert!(link.last_received_digital_out_message().is_none());
    }

    #[test]
    fn later_message_replaces_last_received() {
        let (_, link) = make_link();
        link.handle_hardware_outputs(BusMessage::new("pwmOut").with_value("0", "0.1"));
        link.handle_hardware_outputs(BusMessage::new("pwmOut").with_value("1", "0.9"));

        let last = link.last_received_pwm_out_message().unwrap();
        assert_eq!(last.event, OutputEvent::Pwm(BTreeMap::from([(1, 0.9)])));
    }

    #[test]
    fn unknown_output_kind_is_ignored() {
        let (_, link) = make_link();
        let mut rx = link.subscribe();

        link.handle_hardware_outputs(BusMessage::new("unknownOut").with_value("0", "1"));

        assert!(rx.try_recv().is_err());
        assert!(link.last_received_digital_out_message().is_none());
        assert!(link.last_received_pwm_out_message().is_none());
    }

    #[test]
    fn robot_mode_records_and_emits_sys_message() {
        let (_, link) = make_link();
        let mut rx = link.subscribe();

        link.handle_system_message(
            BusMessage::new("ftl-robot-mode")
                .with_value("mode", "auto")
                .with_value("enabled", "1"),
        );

        let expected = SysMessage::RobotMode(BTreeMap::from([
            ("enabled".to_string(), "1".to_string()),
            ("mode".to_string(), "auto".to_string()),
        ]));
        assert_eq!(rx.try_recv().unwrap(), LinkEvent::SysMessageReceived(expected.clone()));
        assert_eq!(link.last_received_robot_mode_message().unwrap().event, expected);
    }

    #[test]
    fn unknown_sys_message_is_ignored() {
        let (_, link) = make_link();
        let mut rx = link.subscribe();

        link.handle_system_message(BusMessage::new("ftl-heartbeat").with_value("t", "1"));

        assert!(rx.try_recv().is_err());
        assert!(link.last_received_robot_mode_message().is_none());
    }

    #[tokio::test]
    async fn inbound_bus_traffic_reaches_subscribers() -> Result<(), Box<dyn std::error::Error>> {
        let (bus, link) = make_link();
        let mut events = link.subscribe();
        link.start()?;
        wait_until_ready(&link).await;

        bus.publish_to(
            Topic::HardwareOutputs,
            BusMessage::new("digitalOut").with_value("6", "true"),
        )?;
        bus.publish_to(
            Topic::SysMessage,
            BusMessage::new("ftl-robot-mode").with_value("mode", "disabled"),
        )?;

        let first = timeout(Duration::from_secs(1), events.recv()).await??;
        let second = timeout(Duration::from_secs(1), events.recv()).await??;
        let mut received = vec![first, second];
        received.sort_by_key(|e| matches!(e, LinkEvent::SysMessageReceived(_)));

        assert_eq!(
            received[0],
            LinkEvent::OutputsChanged(OutputEvent::Digital(BTreeMap::from([(6, true)])))
        );
        assert!(matches!(received[1], LinkEvent::SysMessageReceived(_)));
        assert!(link.last_received_robot_mode_message().is_some());
        Ok(())
    }
}
