//! Generic `Actuator` trait for servo outputs.
//!
//! This is the physical driver boundary: everything above it (clamping,
//! channel naming, the safety timer) only ever talks to the trait, so a
//! serial/Firmata driver or a simulated one can be swapped in freely.

use rcpilot_types::PilotError;

/// A position-controlled servo output.
pub trait Actuator: Send + Sync {
    /// Stable identifier for this actuator, e.g. `"acceleration"`.
    fn id(&self) -> &str;

    /// Drive the servo to `position` (servo degrees).
    ///
    /// The value has already been clamped by the caller; drivers forward it
    /// as-is.
    ///
    /// # Errors
    ///
    /// Returns [`PilotError::HardwareFault`] if the write cannot be applied.
    /// The reported [`position`][Actuator::position] must then stay at its
    /// previous value.
    fn set_position(&mut self, position: i32) -> Result<(), PilotError>;

    /// Return the most recently applied position.
    fn position(&self) -> i32;
}
