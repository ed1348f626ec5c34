//! [`SafetyTimer`] – throttle dead-man switch.
//!
//! Every throttle command re-arms the timer; if no further throttle command
//! arrives before it expires, the owner cuts the throttle.  Forward or
//! reverse motion therefore always self-terminates within the last armed
//! duration.
//!
//! The timer never touches a servo itself.  Expiry is reported as a
//! [`TimerExpiry`] on a channel so the owner handles it on the same queue as
//! every other input.  Each arm bumps a generation counter and an expiry is
//! only honoured by [`SafetyTimer::fire`] when its generation is still the
//! armed one, so a timer that was superseded (even one whose expiry was
//! already queued) can never produce a second stop.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

/// Expiry notice emitted by an armed [`SafetyTimer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerExpiry {
    generation: u64,
}

impl TimerExpiry {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

struct Pending {
    generation: u64,
    duration: Duration,
    handle: JoinHandle<()>,
}

/// At most one outstanding deferred stop.
pub struct SafetyTimer {
    expiry_tx: mpsc::UnboundedSender<TimerExpiry>,
    generation: u64,
    pending: Option<Pending>,
}

impl SafetyTimer {
    /// Create an idle timer that reports expiries on `expiry_tx`.
    pub fn new(expiry_tx: mpsc::UnboundedSender<TimerExpiry>) -> Self {
        Self {
            expiry_tx,
            generation: 0,
            pending: None,
        }
    }

    /// Cancel any pending timer, then schedule a new expiry after `duration`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn arm(&mut self, duration: Duration) -> TimerExpiry {
        self.cancel();
        self.generation += 1;
        let expiry = TimerExpiry {
            generation: self.generation,
        };

        let tx = self.expiry_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            // The owner may already be gone during shutdown.
            let _ = tx.send(expiry);
        });

        trace!(generation = self.generation, duration_ms = duration.as_millis() as u64, "safety timer armed");
        self.pending = Some(Pending {
            generation: self.generation,
            duration,
            handle,
        });
        expiry
    }

    /// Clear the pending timer, if any.  Returns `true` if one was pending.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(pending) => {
                pending.handle.abort();
                trace!(generation = pending.generation, "safety timer cancelled");
                true
            }
            None => false,
        }
    }

    /// Accept `expiry` if it belongs to the live timer.
    ///
    /// Returns `true` exactly once per arm; the owner must then perform the
    /// stop.  Stale expiries return `false` and change nothing.
    pub fn fire(&mut self, expiry: TimerExpiry) -> bool {
        match &self.pending {
            Some(pending) if pending.generation == expiry.generation => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Duration of the pending timer, if any.
    pub fn armed_for(&self) -> Option<Duration> {
        self.pending.as_ref().map(|p| p.duration)
    }
}

impl Drop for SafetyTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
