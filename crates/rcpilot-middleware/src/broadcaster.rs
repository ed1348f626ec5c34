//! [`StatusBroadcaster`] – merge-and-republish status bus.
//!
//! Observers (one per realtime connection) call
//! [`StatusBroadcaster::connect`] and get an [`Observer`] that:
//!
//! 1. yields a single `"server connected"` greeting first, addressed to that
//!    observer alone;
//! 2. then yields every status report published by *other* observers, with
//!    the server-known actuator link flag stamped on under
//!    [`LINK_STATUS_KEY`].
//!
//! An observer never receives its own report back.  Server-originated
//! reports (no origin) reach everyone.
//!
//! Uses a [`tokio::sync::broadcast`] channel underneath, so a slow observer
//! lags and drops old reports instead of blocking the others.

use rcpilot_types::{ServerFrame, ServerStatus};
use serde_json::{Map, Value, json};
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};
use uuid::Uuid;

/// Key under which the actuator link flag is merged into every report.
/// Overwrites a colliding key sent by the reporter.
pub const LINK_STATUS_KEY: &str = "Actuator Link";

/// Key under which non-object reports are wrapped before merging.
pub const REPORT_KEY: &str = "report";

/// Payload of the per-connection greeting.
pub const GREETING: &str = "server connected";

/// Default channel capacity (reports buffered before slow observers lag).
const DEFAULT_CAPACITY: usize = 256;

/// Identity of a connected observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(Uuid);

impl std::fmt::Display for ObserverId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone)]
struct Envelope {
    origin: Option<ObserverId>,
    frame: ServerFrame,
}

/// Shared status bus.  Clone it cheaply – all clones share the same channel.
#[derive(Clone, Debug)]
pub struct StatusBroadcaster {
    sender: broadcast::Sender<Envelope>,
    link: watch::Receiver<ServerStatus>,
}

impl StatusBroadcaster {
    /// Create a bus that reads the link flag from `link`.
    pub fn new(link: watch::Receiver<ServerStatus>) -> Self {
        Self::with_capacity(DEFAULT_CAPACITY, link)
    }

    pub fn with_capacity(capacity: usize, link: watch::Receiver<ServerStatus>) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, link }
    }

    /// Register a new observer.  Its first frame is the greeting.
    pub fn connect(&self) -> Observer {
        let observer = Observer {
            id: ObserverId(Uuid::new_v4()),
            greeting: Some(ServerFrame::RobotStatus(Value::String(GREETING.to_string()))),
            receiver: self.sender.subscribe(),
        };
        debug!(observer = %observer.id, "observer connected");
        observer
    }

    /// Merge `report` with the link flag and send it to every observer except
    /// `origin`.
    ///
    /// Returns the number of observers handed the report, including `origin`
    /// itself (which filters it out on receive).  `0` simply means nobody is
    /// listening.
    pub fn publish_update(&self, origin: ObserverId, report: Value) -> usize {
        self.send(Some(origin), report)
    }

    /// Merge `report` with the link flag and send it to every observer.
    pub fn publish_server(&self, report: Value) -> usize {
        self.send(None, report)
    }

    /// Stamp the link flag onto `report`.
    pub fn merge(&self, report: Value) -> Value {
        let mut map = match report {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert(REPORT_KEY.to_string(), other);
                map
            }
        };
        map.insert(
            LINK_STATUS_KEY.to_string(),
            Value::Bool(self.link.borrow().has_actuator_link),
        );
        Value::Object(map)
    }

    /// Number of currently connected observers.
    pub fn observer_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Publish a server report every time the [`ServerStatus`] changes,
    /// until the status channel closes.
    pub async fn run_status_forwarder(self) {
        let mut link = self.link.clone();
        link.borrow_and_update();
        while link.changed().await.is_ok() {
            let status = *link.borrow_and_update();
            self.publish_server(json!({ "AI Mode": status.current_ai }));
        }
    }

    fn send(&self, origin: Option<ObserverId>, report: Value) -> usize {
        let envelope = Envelope {
            origin,
            frame: ServerFrame::RobotStatus(self.merge(report)),
        };
        // A send error only means there are no observers right now.
        self.sender.send(envelope).unwrap_or(0)
    }
}

/// One connection's view of the bus.
pub struct Observer {
    id: ObserverId,
    greeting: Option<ServerFrame>,
    receiver: broadcast::Receiver<Envelope>,
}

impl Observer {
    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// Wait for the next frame addressed to this observer.
    ///
    /// Returns `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<ServerFrame> {
        if let Some(greeting) = self.greeting.take() {
            return Some(greeting);
        }
        loop {
            match self.receiver.recv().await {
                Ok(envelope) if envelope.origin == Some(self.id) => continue,
                Ok(envelope) => return Some(envelope.frame),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(observer = %self.id, lagged_by = n, "observer lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`recv`][Self::recv].  Returns `None` when
    /// nothing is queued for this observer right now.
    pub fn try_recv(&mut self) -> Option<ServerFrame> {
        if let Some(greeting) = self.greeting.take() {
            return Some(greeting);
        }
        loop {
            match self.receiver.try_recv() {
                Ok(envelope) if envelope.origin == Some(self.id) => continue,
                Ok(envelope) => return Some(envelope.frame),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcpilot_types::AiMode;

    fn make_bus(has_actuator_link: bool) -> (StatusBroadcaster, watch::Sender<ServerStatus>) {
        let (tx, rx) = watch::channel(ServerStatus {
            has_actuator_link,
            ..ServerStatus::default()
        });
        (StatusBroadcaster::new(rx), tx)
    }

    fn payload(frame: ServerFrame) -> Value {
        let ServerFrame::RobotStatus(value) = frame;
        value
    }

    #[tokio::test]
    async fn new_observer_gets_exactly_one_greeting() {
        let (bus, _tx) = make_bus(false);
        let mut obs = bus.connect();

        let first = obs.recv().await.unwrap();
        assert_eq!(payload(first), Value::String(GREETING.to_string()));
        assert!(obs.try_recv().is_none());
    }

    #[tokio::test]
    async fn greeting_is_not_sent_to_other_observers() {
        let (bus, _tx) = make_bus(false);
        let mut a = bus.connect();
        a.recv().await.unwrap();

        let _b = bus.connect();
        assert!(a.try_recv().is_none());
    }

    #[tokio::test]
    async fn sender_is_excluded_from_its_own_update() {
        let (bus, _tx) = make_bus(true);
        let mut sender = bus.connect();
        let mut other = bus.connect();
        sender.recv().await.unwrap();
        other.recv().await.unwrap();

        bus.publish_update(sender.id(), json!({ "faces": 1 }));

        let got = payload(other.recv().await.unwrap());
        assert_eq!(got["faces"], 1);
        assert_eq!(got[LINK_STATUS_KEY], true);
        assert!(sender.try_recv().is_none());
    }

    #[tokio::test]
    async fn link_flag_overwrites_colliding_key() {
        let (bus, _tx) = make_bus(false);
        let merged = bus.merge(json!({ LINK_STATUS_KEY: true, "fps": 12 }));
        assert_eq!(merged[LINK_STATUS_KEY], false);
        assert_eq!(merged["fps"], 12);
    }

    #[tokio::test]
    async fn non_object_report_is_wrapped() {
        let (bus, _tx) = make_bus(true);
        let merged = bus.merge(json!("tracking lost"));
        assert_eq!(merged[REPORT_KEY], "tracking lost");
        assert_eq!(merged[LINK_STATUS_KEY], true);
    }

    #[tokio::test]
    async fn merge_reads_live_link_flag() {
        let (bus, tx) = make_bus(false);
        assert_eq!(bus.merge(json!({}))[LINK_STATUS_KEY], false);
        tx.send_modify(|s| s.has_actuator_link = true);
        assert_eq!(bus.merge(json!({}))[LINK_STATUS_KEY], true);
    }

    #[tokio::test]
    async fn server_reports_reach_everyone() {
        let (bus, _tx) = make_bus(false);
        let mut a = bus.connect();
        let mut b = bus.connect();
        a.recv().await.unwrap();
        b.recv().await.unwrap();

        assert_eq!(bus.publish_server(json!({ "note": "hi" })), 2);
        assert_eq!(payload(a.recv().await.unwrap())["note"], "hi");
        assert_eq!(payload(b.recv().await.unwrap())["note"], "hi");
    }

    #[test]
    fn publish_without_observers_is_not_an_error() {
        let (bus, _tx) = make_bus(false);
        assert_eq!(bus.observer_count(), 0);
        assert_eq!(bus.publish_server(json!({})), 0);
    }

    #[tokio::test]
    async fn status_forwarder_publishes_changes() {
        let (bus, tx) = make_bus(false);
        let mut obs = bus.connect();
        obs.recv().await.unwrap();
        tokio::spawn(bus.clone().run_status_forwarder());

        tx.send_modify(|s| {
            s.has_actuator_link = true;
            s.current_ai = AiMode::Red;
        });

        let got = payload(obs.recv().await.unwrap());
        assert_eq!(got["AI Mode"], "red");
        assert_eq!(got[LINK_STATUS_KEY], true);
    }

    #[tokio::test]
    async fn observer_count_tracks_connections() {
        let (bus, _tx) = make_bus(false);
        let a = bus.connect();
        let b = bus.connect();
        assert_eq!(bus.observer_count(), 2);
        drop(a);
        drop(b);
        assert_eq!(bus.observer_count(), 0);
    }
}
