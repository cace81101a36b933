//! Per-host update state machine.
//!
//! A host is Idle or Rendering; update requests arriving while Rendering
//! are dropped but recorded as a pending follow-up. Leaving Rendering with
//! the follow-up bit set schedules exactly one coalesced deferred run. The
//! counter spans consecutive dirty runs and trips the loop guard on
//! runaway lifecycle-hook chains; it resets whenever a run completes
//! clean.

use std::cell::Cell;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Rendering,
}

#[derive(Default)]
pub struct UpdateState {
    phase: Cell<Phase>,
    pending: Cell<bool>,
    scheduled: Cell<bool>,
    counter: Cell<u32>,
    lazy: Cell<bool>,
}

impl UpdateState {
    pub fn new() -> Self {
        UpdateState::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase.get()
    }

    pub fn is_rendering(&self) -> bool {
        self.phase.get() == Phase::Rendering
    }

    /// Try to enter Rendering. Returns `false` (and records the follow-up)
    /// when a run is already in progress.
    pub fn begin(&self) -> bool {
        if self.is_rendering() {
            self.pending.set(true);
            return false;
        }
        self.phase.set(Phase::Rendering);
        self.pending.set(false);
        self.counter.set(self.counter.get() + 1);
        true
    }

    /// Leave Rendering. Returns `true` when a follow-up was recorded during
    /// the run; the counter resets only on a clean exit.
    pub fn finish(&self) -> bool {
        self.phase.set(Phase::Idle);
        if self.pending.get() {
            true
        } else {
            self.counter.set(0);
            false
        }
    }

    /// Whether the counter has exceeded `limit` for the current cycle.
    pub fn over_limit(&self, limit: u32) -> bool {
        self.counter.get() > limit
    }

    /// Abort the current cycle after the guard trips.
    pub fn reset_cycle(&self) {
        self.phase.set(Phase::Idle);
        self.pending.set(false);
        self.scheduled.set(false);
        self.counter.set(0);
    }

    pub fn mark_pending(&self) {
        self.pending.set(true);
    }

    /// Coalescing bit for the engine's deferred queue.
    pub fn try_schedule(&self) -> bool {
        if self.scheduled.get() {
            false
        } else {
            self.scheduled.set(true);
            true
        }
    }

    pub fn clear_scheduled(&self) {
        self.scheduled.set(false);
    }

    pub fn is_lazy(&self) -> bool {
        self.lazy.get()
    }

    pub fn set_lazy(&self, lazy: bool) {
        self.lazy.set(lazy);
    }
}
