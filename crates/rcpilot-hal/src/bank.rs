//! [`ServoBank`] – the car's two named servo channels.
//!
//! The controller never looks servos up by string; it addresses them through
//! [`Channel`], so a typo cannot route a throttle value to the steering
//! linkage.

use rcpilot_types::{PilotError, ServoSnapshot};

use crate::servo::Servo;

/// Named servo channel on the car.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Throttle / ESC input.
    Acceleration,
    /// Front-wheel steering.
    Steering,
}

impl Channel {
    /// Stable identifier used in logs and snapshots.
    pub fn id(self) -> &'static str {
        match self {
            Channel::Acceleration => "acceleration",
            Channel::Steering => "steering",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Both servos of a connected board.
pub struct ServoBank {
    acceleration: Servo,
    steering: Servo,
}

impl ServoBank {
    pub fn new(acceleration: Servo, steering: Servo) -> Self {
        Self {
            acceleration,
            steering,
        }
    }

    fn servo(&self, channel: Channel) -> &Servo {
        match channel {
            Channel::Acceleration => &self.acceleration,
            Channel::Steering => &self.steering,
        }
    }

    /// Move `channel` to `value` (clamped).  Returns the applied position.
    pub fn move_to(&mut self, channel: Channel, value: i32) -> Result<i32, PilotError> {
        match channel {
            Channel::Acceleration => self.acceleration.move_to(value),
            Channel::Steering => self.steering.move_to(value),
        }
    }

    /// Drive both servos to their configured initial positions.
    pub fn home_all(&mut self) -> Result<(), PilotError> {
        self.acceleration.home()?;
        self.steering.home()?;
        Ok(())
    }

    pub fn position(&self, channel: Channel) -> i32 {
        self.servo(channel).position()
    }

    /// `(acceleration, steering)` snapshots.
    pub fn snapshot(&self) -> (ServoSnapshot, ServoSnapshot) {
        (self.acceleration.snapshot(), self.steering.snapshot())
    }
}
