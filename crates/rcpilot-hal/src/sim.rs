//! In-process simulated servos for running the full stack without a board.
//!
//! [`SimActuator`] records every commanded position.  Hand out a
//! [`SimProbe`] to a test when it needs to assert on the exact sequence of
//! writes that reached the "hardware", or to make the driver start failing
//! with [`SimProbe::fail_writes`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use rcpilot_types::PilotError;

use crate::actuator::Actuator;

/// Read handle onto the write history of a [`SimActuator`].
#[derive(Clone, Debug, Default)]
pub struct SimProbe {
    writes: Arc<Mutex<Vec<i32>>>,
    faulty: Arc<AtomicBool>,
}

impl SimProbe {
    /// Every position written so far, oldest first.
    pub fn writes(&self) -> Vec<i32> {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The most recent write, if any.
    pub fn last(&self) -> Option<i32> {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .copied()
    }

    /// Number of writes so far.
    pub fn count(&self) -> usize {
        self.writes.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// While `true`, every write is rejected with a hardware fault and left
    /// out of the history, as a board with a dropped serial link would.
    pub fn fail_writes(&self, faulty: bool) {
        self.faulty.store(faulty, Ordering::SeqCst);
    }

    fn is_faulty(&self) -> bool {
        self.faulty.load(Ordering::SeqCst)
    }

    fn record(&self, position: i32) {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(position);
    }
}

/// A simulated servo that records the most recent commanded position.
/// Succeeds unless its probe was told to fail.
pub struct SimActuator {
    id: String,
    position: i32,
    probe: SimProbe,
}

impl SimActuator {
    /// Create a new simulated actuator resting at `position`.
    pub fn new(id: impl Into<String>, position: i32) -> Box<Self> {
        Self::with_probe(id, position).0
    }

    /// Like [`new`][Self::new] but also returns a probe onto its writes.
    pub fn with_probe(id: impl Into<String>, position: i32) -> (Box<Self>, SimProbe) {
        let probe = SimProbe::default();
        (Self::attached(id, position, &probe), probe)
    }

    /// Create an actuator that records into an existing `probe`.
    pub fn attached(id: impl Into<String>, position: i32, probe: &SimProbe) -> Box<Self> {
        Box::new(Self {
            id: id.into(),
            position,
            probe: probe.clone(),
        })
    }
}

impl Actuator for SimActuator {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_position(&mut self, position: i32) -> Result<(), PilotError> {
        if self.probe.is_faulty() {
            return Err(PilotError::HardwareFault {
                component: self.id.clone(),
                details: format!("write of {position} rejected"),
            });
        }
        self.position = position;
        self.probe.record(position);
        Ok(())
    }

    fn position(&self) -> i32 {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_actuator_records_position() {
        let mut act = SimActuator::new("steering", 75);
        assert_eq!(act.position(), 75);
        act.set_position(40).unwrap();
        assert_eq!(act.position(), 40);
    }

    #[test]
    fn probe_sees_every_write_in_order() {
        let (mut act, probe) = SimActuator::with_probe("acceleration", 90);
        assert_eq!(probe.count(), 0);
        assert_eq!(probe.last(), None);

        act.set_position(65).unwrap();
        act.set_position(90).unwrap();

        assert_eq!(probe.writes(), vec![65, 90]);
        assert_eq!(probe.last(), Some(90));
    }

    #[test]
    fn failing_writes_keep_position_and_history() {
        let (mut act, probe) = SimActuator::with_probe("steering", 75);
        probe.fail_writes(true);

        let result = act.set_position(40);
        assert!(matches!(result, Err(PilotError::HardwareFault { ref component, .. }) if component == "steering"));
        assert_eq!(act.position(), 75);
        assert_eq!(probe.count(), 0);

        probe.fail_writes(false);
        act.set_position(40).unwrap();
        assert_eq!(probe.writes(), vec![40]);
    }

    #[test]
    fn cloned_probe_shares_history() {
        let (mut act, probe) = SimActuator::with_probe("acceleration", 90);
        let other = probe.clone();
        act.set_position(105).unwrap();
        assert_eq!(other.last(), Some(105));
    }
}
