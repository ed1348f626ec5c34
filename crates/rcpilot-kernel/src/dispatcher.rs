//! [`Dispatcher`] – applies commands to the servos and the server status.
//!
//! Each command is evaluated independently against the current
//! [`ServerStatus`]:
//!
//! * no actuator link → every command is ignored (the car is not connected);
//! * `manual-throttle-*` → arm the [`SafetyTimer`], then move the throttle;
//! * `manual-turn-*` → move the steering;
//! * `face-*` / `red-*` → update the advertised [`AiMode`];
//! * anything else → throttle stop, timer cancelled, steering neutral.
//!
//! The dispatcher is plain synchronous state.  Serialising access to it is
//! the job of the [`Controller`][crate::controller::Controller].

use std::time::Duration;

use chrono::Utc;
use rcpilot_hal::{Channel, ServoBank};
use rcpilot_types::{AiMode, PilotError, ServerStatus, VehicleSnapshot};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::command::{Command, CommandError};
use crate::named_values::NamedValues;
use crate::safety_timer::{SafetyTimer, TimerExpiry};

/// What a dispatched command did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// No actuator link yet; nothing happened.
    NoLink,
    /// Recognised prefix, unusable remainder; nothing happened.
    Malformed(CommandError),
    /// Throttle moved and the stop timer armed.
    Throttle { position: i32, stop_after: Duration },
    /// Steering moved.
    Turn { position: i32 },
    /// Advertised vision mode changed (or was re-asserted).
    AiMode(AiMode),
    /// Steering centred, throttle cut, timer cleared.
    Stopped,
}

impl Effect {
    /// `true` when servo positions or the timer may have changed.
    pub fn touched_servos(&self) -> bool {
        matches!(
            self,
            Effect::Throttle { .. } | Effect::Turn { .. } | Effect::Stopped
        )
    }
}

/// Owned controller context: status, servos, timer and value table.
pub struct Dispatcher {
    values: NamedValues,
    status: ServerStatus,
    servos: Option<ServoBank>,
    timer: SafetyTimer,
}

impl Dispatcher {
    /// Create a dispatcher with no actuator link.  Timer expiries are
    /// reported on `expiry_tx` and must be fed back via
    /// [`handle_expiry`][Self::handle_expiry].
    pub fn new(values: NamedValues, expiry_tx: mpsc::UnboundedSender<TimerExpiry>) -> Self {
        Self {
            values,
            status: ServerStatus::default(),
            servos: None,
            timer: SafetyTimer::new(expiry_tx),
        }
    }

    pub fn status(&self) -> ServerStatus {
        self.status
    }

    pub fn servos(&self) -> Option<&ServoBank> {
        self.servos.as_ref()
    }

    pub fn timer(&self) -> &SafetyTimer {
        &self.timer
    }

    /// The board link came up: take ownership of its servos.
    pub fn attach(&mut self, servos: ServoBank) {
        self.servos = Some(servos);
        self.status.has_actuator_link = true;
        info!("actuator link established");
    }

    /// Parse and apply a raw command string.
    ///
    /// # Errors
    ///
    /// * [`PilotError::UnresolvedValue`] – a value or duration token could not
    ///   be resolved; servo and timer state are unchanged.
    /// * [`PilotError::HardwareFault`] – the servo driver rejected the write.
    pub fn dispatch(&mut self, raw: &str) -> Result<Effect, PilotError> {
        let Some(servos) = self.servos.as_mut() else {
            debug!(command = raw, "no actuator link; command ignored");
            return Ok(Effect::NoLink);
        };

        let command = match Command::parse(raw) {
            Ok(command) => command,
            Err(e) => {
                debug!(command = raw, error = %e, "malformed command ignored");
                return Ok(Effect::Malformed(e));
            }
        };

        match command {
            Command::Throttle { value, duration } => {
                let target = self.values.resolve(&value)?;
                let stop_after = match duration {
                    Some(token) => self.values.resolve_duration(&token)?,
                    None => self.values.throttle_time(),
                };
                self.timer.arm(stop_after);
                let position = servos.move_to(Channel::Acceleration, target)?;
                debug!(position, stop_after_ms = stop_after.as_millis() as u64, "throttle set");
                Ok(Effect::Throttle {
                    position,
                    stop_after,
                })
            }
            Command::Turn { value } => {
                let target = self.values.resolve(&value)?;
                let position = servos.move_to(Channel::Steering, target)?;
                debug!(position, "steering set");
                Ok(Effect::Turn { position })
            }
            Command::FaceTracking { begin } => {
                let mode = if begin { AiMode::UpperBody } else { AiMode::None };
                Ok(self.set_ai_mode(mode))
            }
            Command::RedTracking { begin } => {
                let mode = if begin { AiMode::Red } else { AiMode::None };
                Ok(self.set_ai_mode(mode))
            }
            Command::Stop => {
                halt(servos, &mut self.timer, &self.values)?;
                info!("vehicle stopped");
                Ok(Effect::Stopped)
            }
        }
    }

    /// Feed back an expiry from the safety timer.
    ///
    /// Returns `true` when the expiry was live and the throttle was cut.
    pub fn handle_expiry(&mut self, expiry: TimerExpiry) -> Result<bool, PilotError> {
        if !self.timer.fire(expiry) {
            debug!(generation = expiry.generation(), "stale safety timer expiry dropped");
            return Ok(false);
        }
        match self.servos.as_mut() {
            Some(servos) => {
                servos.move_to(Channel::Acceleration, self.values.stop())?;
                info!("safety timer expired; throttle cut");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Centre the steering and cut the throttle regardless of the command
    /// grammar.  Used on shutdown.  A no-op without a link.
    pub fn full_stop(&mut self) -> Result<(), PilotError> {
        match self.servos.as_mut() {
            Some(servos) => halt(servos, &mut self.timer, &self.values),
            None => {
                self.timer.cancel();
                Ok(())
            }
        }
    }

    /// Read-only view for introspection.
    pub fn snapshot(&self) -> VehicleSnapshot {
        let (acceleration, steering) = match &self.servos {
            Some(bank) => {
                let (a, s) = bank.snapshot();
                (Some(a), Some(s))
            }
            None => (None, None),
        };
        VehicleSnapshot {
            status: self.status,
            acceleration,
            steering,
            stop_timer_pending: self.timer.is_pending(),
            updated_at: Utc::now(),
        }
    }

    fn set_ai_mode(&mut self, mode: AiMode) -> Effect {
        if self.status.current_ai != mode {
            info!(from = %self.status.current_ai, to = %mode, "AI mode changed");
        }
        self.status.current_ai = mode;
        Effect::AiMode(mode)
    }
}

/// Cut the throttle, then centre the steering.
///
/// The pending stop timer is only cancelled once the throttle write has
/// landed; if it fails the deferred stop stays armed and gets another try.
/// The steering write is attempted either way and the first error wins.
fn halt(
    servos: &mut ServoBank,
    timer: &mut SafetyTimer,
    values: &NamedValues,
) -> Result<(), PilotError> {
    let throttle = servos.move_to(Channel::Acceleration, values.stop());
    if throttle.is_ok() {
        timer.cancel();
    }
    let steering = servos.move_to(Channel::Steering, values.neutral());
    throttle?;
    steering?;
    Ok(())
}
