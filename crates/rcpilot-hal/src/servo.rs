//! [`Servo`] – a driver paired with its static configuration.
//!
//! Every move is clamped into the configured range before it reaches the
//! driver, so a bad numeric command can never push the linkage past its
//! mechanical stops.

use rcpilot_types::{ActuatorConfig, PilotError, ServoSnapshot};
use tracing::debug;

use crate::actuator::Actuator;

/// A single degree-of-freedom output with range clamping.
pub struct Servo {
    config: ActuatorConfig,
    driver: Box<dyn Actuator>,
}

impl Servo {
    pub fn new(config: ActuatorConfig, driver: Box<dyn Actuator>) -> Self {
        Self { config, driver }
    }

    pub fn id(&self) -> &str {
        self.driver.id()
    }

    pub fn config(&self) -> &ActuatorConfig {
        &self.config
    }

    /// Move to `value`, clamped into `[min, max]`.
    ///
    /// Returns the position actually sent to the driver.
    ///
    /// # Errors
    ///
    /// Propagates the driver's [`PilotError::HardwareFault`].
    pub fn move_to(&mut self, value: i32) -> Result<i32, PilotError> {
        let target = self.config.clamp(value);
        if target != value {
            debug!(
                servo = self.driver.id(),
                requested = value,
                clamped = target,
                "servo target clamped into range"
            );
        }
        self.driver.set_position(target)?;
        Ok(target)
    }

    /// Drive to the configured initial position (`start_at` or centre).
    pub fn home(&mut self) -> Result<i32, PilotError> {
        self.move_to(self.config.initial_position())
    }

    pub fn position(&self) -> i32 {
        self.driver.position()
    }

    pub fn snapshot(&self) -> ServoSnapshot {
        ServoSnapshot {
            id: self.driver.id().to_string(),
            pin: self.config.pin,
            min: self.config.min(),
            max: self.config.max(),
            position: self.driver.position(),
        }
    }
}
