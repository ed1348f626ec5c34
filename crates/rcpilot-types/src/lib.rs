use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Vision mode advertised to the external AI subsystem.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiMode {
    #[default]
    None,
    /// Track the upper body of a person in frame.
    UpperBody,
    /// Track red objects.
    Red,
}

impl std::fmt::Display for AiMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AiMode::None => write!(f, "none"),
            AiMode::UpperBody => write!(f, "upper_body"),
            AiMode::Red => write!(f, "red"),
        }
    }
}

/// Process-wide link and AI-mode state, exposed via status broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatus {
    /// `true` once the servo board reported ready.
    pub has_actuator_link: bool,
    /// Reserved for a camera/vision link; never set by the controller itself.
    pub has_sensor_link: bool,
    pub current_ai: AiMode,
}

/// Servo flavour, mirrored from the hardware configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServoKind {
    #[default]
    Standard,
    /// Continuous-rotation servo: position is interpreted as speed.
    Continuous,
}

/// Static configuration of a single servo channel.
///
/// Immutable after creation; the hardware layer only ever reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActuatorConfig {
    /// Board pin the servo signal wire is attached to.
    pub pin: u8,
    /// Allowed position range `[min, max]`, in servo degrees.
    pub range: [i32; 2],
    #[serde(default)]
    pub kind: ServoKind,
    /// Position commanded when the link comes up.
    pub start_at: i32,
    /// When `true`, overrides `start_at` with the midpoint of `range`.
    #[serde(default)]
    pub center: bool,
}

impl ActuatorConfig {
    /// Throttle servo of the stock car: pin 9, full 0–180 range, idle at 90.
    pub fn acceleration() -> Self {
        Self {
            pin: 9,
            range: [0, 180],
            kind: ServoKind::Standard,
            start_at: 90,
            center: false,
        }
    }

    /// Steering servo of the stock car: pin 10, mechanically limited to 40–100.
    pub fn steering() -> Self {
        Self {
            pin: 10,
            range: [40, 100],
            kind: ServoKind::Standard,
            start_at: 75,
            center: true,
        }
    }

    /// Lower bound of the range, tolerating a reversed `range` pair.
    pub fn min(&self) -> i32 {
        self.range[0].min(self.range[1])
    }

    /// Upper bound of the range, tolerating a reversed `range` pair.
    pub fn max(&self) -> i32 {
        self.range[0].max(self.range[1])
    }

    /// Clamp `value` into `[min, max]`.
    pub fn clamp(&self, value: i32) -> i32 {
        value.clamp(self.min(), self.max())
    }

    /// Position the servo should be driven to when the link comes up.
    pub fn initial_position(&self) -> i32 {
        if self.center {
            self.min() + (self.max() - self.min()) / 2
        } else {
            self.clamp(self.start_at)
        }
    }
}

/// Read-only view of one servo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServoSnapshot {
    pub id: String,
    pub pin: u8,
    pub min: i32,
    pub max: i32,
    pub position: i32,
}

/// Read-only introspection view of the whole vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleSnapshot {
    pub status: ServerStatus,
    /// `None` until the servo board link is up.
    pub acceleration: Option<ServoSnapshot>,
    pub steering: Option<ServoSnapshot>,
    /// `true` while a deferred throttle stop is scheduled.
    pub stop_timer_pending: bool,
    pub updated_at: DateTime<Utc>,
}

impl Default for VehicleSnapshot {
    fn default() -> Self {
        Self {
            status: ServerStatus::default(),
            acceleration: None,
            steering: None,
            stop_timer_pending: false,
            updated_at: Utc::now(),
        }
    }
}

/// Frames sent by browser or vision clients over the realtime channel.
///
/// Encoded as `{"event": "<name>", "data": <payload>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientFrame {
    #[serde(rename = "robot command")]
    RobotCommand(String),
    #[serde(rename = "robot update")]
    RobotUpdate(Value),
}

/// Frames emitted by the server over the realtime channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerFrame {
    #[serde(rename = "robot status")]
    RobotStatus(Value),
}

/// Error type shared by every rcpilot crate.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PilotError {
    #[error("Hardware Fault on {component}: {details}")]
    HardwareFault { component: String, details: String },

    #[error("Unresolved value token '{token}': not a named value or integer")]
    UnresolvedValue { token: String },

    #[error("Channel Error: {0}")]
    Channel(String),

    #[error("Transport Error: {0}")]
    Transport(String),

    #[error("Config Error: {0}")]
    Config(String),
}
