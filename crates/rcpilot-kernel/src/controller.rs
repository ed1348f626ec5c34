//! [`Controller`] – single-writer actor around the [`Dispatcher`].
//!
//! HTTP requests, realtime messages, the board's link-ready signal and safety
//! timer expiries all land on one queue and are applied one at a time, so the
//! servo/timer pair and the [`ServerStatus`] never see concurrent writers.
//! Readers get the latest state through `watch` channels and never block the
//! actor.

use rcpilot_hal::ServoBank;
use rcpilot_types::{PilotError, ServerStatus, VehicleSnapshot};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{info, warn};

use crate::dispatcher::{Dispatcher, Effect};
use crate::named_values::NamedValues;
use crate::safety_timer::TimerExpiry;

/// Queue depth for inbound control events.
const EVENT_CAPACITY: usize = 64;

enum ControlEvent {
    Command { raw: String, source: &'static str },
    LinkReady(ServoBank),
    FullStop(oneshot::Sender<()>),
}

/// The actor.  Build with [`Controller::new`], then drive [`run`][Self::run]
/// on a task (or use [`Controller::spawn`]).
pub struct Controller {
    dispatcher: Dispatcher,
    events_rx: mpsc::Receiver<ControlEvent>,
    expiry_rx: mpsc::UnboundedReceiver<TimerExpiry>,
    status_tx: watch::Sender<ServerStatus>,
    snapshot_tx: watch::Sender<VehicleSnapshot>,
}

impl Controller {
    pub fn new(values: NamedValues) -> (Self, ControllerHandle) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CAPACITY);
        let (expiry_tx, expiry_rx) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::new(values, expiry_tx);

        let (status_tx, status_rx) = watch::channel(dispatcher.status());
        let (snapshot_tx, snapshot_rx) = watch::channel(dispatcher.snapshot());

        let controller = Self {
            dispatcher,
            events_rx,
            expiry_rx,
            status_tx,
            snapshot_tx,
        };
        let handle = ControllerHandle {
            events_tx,
            status_rx,
            snapshot_rx,
        };
        (controller, handle)
    }

    /// Build the actor and run it on a new Tokio task.
    pub fn spawn(values: NamedValues) -> ControllerHandle {
        let (controller, handle) = Self::new(values);
        tokio::spawn(controller.run());
        handle
    }

    /// Process events until every [`ControllerHandle`] is dropped, then bring
    /// the car to rest.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                Some(expiry) = self.expiry_rx.recv() => self.on_expiry(expiry),
                event = self.events_rx.recv() => match event {
                    Some(event) => self.on_event(event),
                    None => break,
                },
            }
        }

        if let Err(e) = self.dispatcher.full_stop() {
            warn!(error = %e, "full stop on controller shutdown failed");
        }
        info!("controller stopped");
    }

    fn on_event(&mut self, event: ControlEvent) {
        match event {
            ControlEvent::Command { raw, source } => {
                info!(command = %raw, source, "command received");
                match self.dispatcher.dispatch(&raw) {
                    Ok(effect) if effect.touched_servos() => self.publish_snapshot(),
                    Ok(Effect::AiMode(_)) => self.publish_snapshot(),
                    Ok(_) => {}
                    Err(e) => {
                        warn!(command = %raw, source, error = %e, "command rejected");
                        // A partial write may have moved one servo.
                        self.publish_snapshot();
                    }
                }
            }
            ControlEvent::LinkReady(servos) => {
                self.dispatcher.attach(servos);
                self.publish_snapshot();
            }
            ControlEvent::FullStop(ack) => {
                if let Err(e) = self.dispatcher.full_stop() {
                    warn!(error = %e, "full stop failed");
                }
                self.publish_snapshot();
                let _ = ack.send(());
            }
        }
        self.publish_status();
    }

    fn on_expiry(&mut self, expiry: TimerExpiry) {
        match self.dispatcher.handle_expiry(expiry) {
            Ok(true) => self.publish_snapshot(),
            Ok(false) => {}
            Err(e) => {
                warn!(error = %e, "safety stop failed");
                self.publish_snapshot();
            }
        }
    }

    fn publish_status(&self) {
        let status = self.dispatcher.status();
        self.status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }

    fn publish_snapshot(&self) {
        self.snapshot_tx.send_replace(self.dispatcher.snapshot());
    }
}

/// Cloneable front door to a running [`Controller`].
#[derive(Clone)]
pub struct ControllerHandle {
    events_tx: mpsc::Sender<ControlEvent>,
    status_rx: watch::Receiver<ServerStatus>,
    snapshot_rx: watch::Receiver<VehicleSnapshot>,
}

impl ControllerHandle {
    /// Queue a raw command string.  `source` is only used for logging
    /// (e.g. `"http"`, `"ws"`).
    ///
    /// # Errors
    ///
    /// [`PilotError::Channel`] if the controller has shut down.
    pub async fn command(
        &self,
        raw: impl Into<String>,
        source: &'static str,
    ) -> Result<(), PilotError> {
        self.send(ControlEvent::Command {
            raw: raw.into(),
            source,
        })
        .await
    }

    /// Hand over the servos of a board that just came online.
    pub async fn link_ready(&self, servos: ServoBank) -> Result<(), PilotError> {
        self.send(ControlEvent::LinkReady(servos)).await
    }

    /// Centre steering and cut throttle; resolves once applied.
    pub async fn full_stop(&self) -> Result<(), PilotError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.send(ControlEvent::FullStop(ack_tx)).await?;
        ack_rx
            .await
            .map_err(|e| PilotError::Channel(format!("full stop not acknowledged: {e}")))
    }

    pub fn status(&self) -> ServerStatus {
        *self.status_rx.borrow()
    }

    pub fn snapshot(&self) -> VehicleSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Subscribe to [`ServerStatus`] changes.
    pub fn watch_status(&self) -> watch::Receiver<ServerStatus> {
        self.status_rx.clone()
    }

    /// Subscribe to snapshot updates.
    pub fn watch_snapshot(&self) -> watch::Receiver<VehicleSnapshot> {
        self.snapshot_rx.clone()
    }

    async fn send(&self, event: ControlEvent) -> Result<(), PilotError> {
        self.events_tx
            .send(event)
            .await
            .map_err(|_| PilotError::Channel("controller is not running".to_string()))
    }
}
