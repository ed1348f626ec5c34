//! [`Board`] – the servo controller link.
//!
//! Resolving [`Board::connect`] is the "link ready" event: once it returns a
//! [`ServoBank`] the controller may start moving servos.  Until then every
//! command is a no-op.

use std::time::Duration;

use async_trait::async_trait;
use rcpilot_types::{ActuatorConfig, PilotError};
use tracing::info;

use crate::bank::{Channel, ServoBank};
use crate::servo::Servo;
use crate::sim::{SimActuator, SimProbe};

/// A servo controller board that can be brought online.
#[async_trait]
pub trait Board: Send + Sync {
    /// Open the link, attach both servos and drive them to their initial
    /// positions.
    ///
    /// # Errors
    ///
    /// Returns [`PilotError::HardwareFault`] when the board does not come up.
    async fn connect(
        &self,
        acceleration: ActuatorConfig,
        steering: ActuatorConfig,
    ) -> Result<ServoBank, PilotError>;
}

/// Board stand-in backed by [`SimActuator`]s.
///
/// Becomes ready after `ready_delay`, emulating the serial handshake of a
/// real board.
#[derive(Debug, Clone, Default)]
pub struct SimBoard {
    ready_delay: Duration,
    acceleration_probe: SimProbe,
    steering_probe: SimProbe,
}

impl SimBoard {
    pub fn new(ready_delay: Duration) -> Self {
        Self {
            ready_delay,
            ..Self::default()
        }
    }

    /// Probe onto the writes of the given channel once connected.
    pub fn probe(&self, channel: Channel) -> SimProbe {
        match channel {
            Channel::Acceleration => self.acceleration_probe.clone(),
            Channel::Steering => self.steering_probe.clone(),
        }
    }
}

#[async_trait]
impl Board for SimBoard {
    async fn connect(
        &self,
        acceleration: ActuatorConfig,
        steering: ActuatorConfig,
    ) -> Result<ServoBank, PilotError> {
        if !self.ready_delay.is_zero() {
            tokio::time::sleep(self.ready_delay).await;
        }

        let accel_driver = SimActuator::attached(
            Channel::Acceleration.id(),
            acceleration.initial_position(),
            &self.acceleration_probe,
        );
        let steer_driver = SimActuator::attached(
            Channel::Steering.id(),
            steering.initial_position(),
            &self.steering_probe,
        );

        let mut bank = ServoBank::new(
            Servo::new(acceleration, accel_driver),
            Servo::new(steering, steer_driver),
        );
        bank.home_all()?;

        info!(ready_delay_ms = self.ready_delay.as_millis() as u64, "simulated servo board ready");
        Ok(bank)
    }
}
