//! Timed lit → blessing sequencing.
//!
//! The sequencer owns at most one pending deadline. It is driven
//! cooperatively: the caller passes the current [`Instant`] into
//! [`PhaseSequencer::poll`] once per loop iteration, and a due timer is
//! reported exactly once. Whether the reported episode still matters is the
//! state machine's decision, not the sequencer's.

use std::time::{Duration, Instant};

use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingBlessing {
    episode: u64,
    due: Instant,
}

/// Single-slot, cancellable blessing timer.
#[derive(Debug, Clone)]
pub struct PhaseSequencer {
    delay: Duration,
    pending: Option<PendingBlessing>,
}

impl PhaseSequencer {
    pub fn new(delay: Duration) -> Self {
        Self { delay, pending: None }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Arm the timer for `episode`.
    ///
    /// Returns `false` and leaves the existing timer untouched if one is
    /// already pending.
    pub fn schedule(&mut self, episode: u64, now: Instant) -> bool {
        if let Some(p) = self.pending {
            debug!(episode, pending = p.episode, "blessing timer already pending");
            return false;
        }
        self.pending = Some(PendingBlessing { episode, due: now + self.delay });
        true
    }

    /// Drop the pending timer, if any.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    /// Fire the pending timer if its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<u64> {
        match self.pending {
            Some(p) if now >= p.due => {
                self.pending = None;
                Some(p.episode)
            }
            _ => None,
        }
    }

    pub fn pending(&self) -> Option<u64> {
        self.pending.map(|p| p.episode)
    }

    pub fn time_remaining(&self, now: Instant) -> Option<Duration> {
        self.pending.map(|p| p.due.saturating_duration_since(now))
    }
}
