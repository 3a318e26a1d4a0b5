//! When to run the next sync cycle.
//!
//! A plain state machine, driven by the watch loop with explicit clock
//! values so it can be tested without sleeping:
//!
//! ```text
//!          trigger               tick (due)
//!  Idle ───────────▶ Armed ───────────────▶ Running
//!   ▲                  ▲                      │
//!   │   finish         │ finish (pending)     │
//!   └──────────────────┴──────────────────────┘
//! ```
//!
//! Edits arriving while a cycle runs are coalesced into a single follow-up
//! run. At most one cycle is ever in flight.

use std::time::{Duration, Instant, SystemTime};

use tracing::trace;

/// Default quiet period after the last local edit.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Idle,
    /// A local edit was seen; run once `due` passes without further edits.
    Armed { due: Instant },
    /// A cycle is in flight. `pending` records edits seen meanwhile.
    Running { pending: bool },
}

#[derive(Debug)]
pub struct SyncCoordinator {
    state: CoordinatorState,
    debounce: Duration,
    interval: Duration,
    next_interval: Instant,
    suppressed_until: Option<SystemTime>,
}

impl SyncCoordinator {
    /// New coordinator whose first interval run is due immediately.
    #[must_use]
    pub fn new(debounce: Duration, interval: Duration, now: Instant) -> Self {
        Self {
            state: CoordinatorState::Idle,
            debounce,
            interval,
            next_interval: now,
            suppressed_until: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    /// A local edit happened.
    pub fn trigger(&mut self, now: Instant) {
        self.state = match self.state {
            CoordinatorState::Idle | CoordinatorState::Armed { .. } => CoordinatorState::Armed {
                due: now + self.debounce,
            },
            CoordinatorState::Running { .. } => CoordinatorState::Running { pending: true },
        };
        trace!(state = ?self.state, "Sync triggered");
    }

    /// Returns true when a cycle should start now; the caller must then run
    /// it and call [`finish`](Self::finish).
    pub fn tick(&mut self, now: Instant) -> bool {
        let start = match self.state {
            CoordinatorState::Running { .. } => false,
            CoordinatorState::Armed { due } => now >= due || now >= self.next_interval,
            CoordinatorState::Idle => now >= self.next_interval,
        };
        if start {
            self.state = CoordinatorState::Running { pending: false };
        }
        start
    }

    /// The running cycle is done, successfully or not.
    pub fn finish(&mut self, now: Instant) {
        let pending = matches!(self.state, CoordinatorState::Running { pending: true });
        self.next_interval = now + self.interval;
        self.state = if pending {
            CoordinatorState::Armed { due: now }
        } else {
            CoordinatorState::Idle
        };
    }

    /// How long the loop may sleep before the next [`tick`](Self::tick) matters.
    #[must_use]
    pub fn next_wakeup(&self, now: Instant) -> Duration {
        let deadline = match self.state {
            CoordinatorState::Armed { due } => due.min(self.next_interval),
            CoordinatorState::Idle => self.next_interval,
            CoordinatorState::Running { .. } => now + self.interval,
        };
        deadline.saturating_duration_since(now)
    }

    /// Ignore file modifications up to `mtime` (the sync's own writes).
    pub fn suppress_until(&mut self, mtime: SystemTime) {
        self.suppressed_until = Some(self.suppressed_until.map_or(mtime, |t| t.max(mtime)));
    }

    /// Feed an observed tree-file modification time. Returns true if it
    /// counted as a local edit.
    pub fn observe_change(&mut self, mtime: SystemTime, now: Instant) -> bool {
        if self.suppressed_until.is_some_and(|until| mtime <= until) {
            return false;
        }
        self.trigger(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEBOUNCE: Duration = Duration::from_secs(2);
    const INTERVAL: Duration = Duration::from_secs(300);

    fn started(now: Instant) -> SyncCoordinator {
        let mut c = SyncCoordinator::new(DEBOUNCE, INTERVAL, now);
        assert!(c.tick(now));
        c.finish(now);
        c
    }

    #[test]
    fn test_first_tick_runs_immediately() {
        let now = Instant::now();
        let mut c = SyncCoordinator::new(DEBOUNCE, INTERVAL, now);
        assert!(c.tick(now));
        assert_eq!(c.state(), CoordinatorState::Running { pending: false });
        assert!(!c.tick(now), "never two cycles in flight");
    }

    #[test]
    fn test_debounce_rearms_on_each_edit() {
        let t0 = Instant::now();
        let mut c = started(t0);

        c.trigger(t0);
        c.trigger(t0 + Duration::from_secs(1));
        assert!(!c.tick(t0 + Duration::from_secs(2)));
        assert!(c.tick(t0 + Duration::from_secs(3)));
    }

    #[test]
    fn test_edit_during_run_schedules_one_follow_up() {
        let t0 = Instant::now();
        let mut c = started(t0);
        c.trigger(t0);
        assert!(c.tick(t0 + DEBOUNCE));

        c.trigger(t0 + DEBOUNCE);
        c.trigger(t0 + DEBOUNCE);
        c.finish(t0 + DEBOUNCE * 2);

        assert!(matches!(c.state(), CoordinatorState::Armed { .. }));
        assert!(c.tick(t0 + DEBOUNCE * 2));
        c.finish(t0 + DEBOUNCE * 3);
        assert_eq!(c.state(), CoordinatorState::Idle);
    }

    #[test]
    fn test_interval_runs_when_idle() {
        let t0 = Instant::now();
        let mut c = started(t0);
        assert!(!c.tick(t0 + INTERVAL - Duration::from_secs(1)));
        assert_eq!(c.next_wakeup(t0), INTERVAL);
        assert!(c.tick(t0 + INTERVAL));
    }

    #[test]
    fn test_own_writes_are_suppressed() {
        let t0 = Instant::now();
        let mut c = started(t0);
        let written = SystemTime::now();
        c.suppress_until(written);

        assert!(!c.observe_change(written, t0));
        assert_eq!(c.state(), CoordinatorState::Idle);
        assert!(c.observe_change(written + Duration::from_secs(1), t0));
        assert!(matches!(c.state(), CoordinatorState::Armed { .. }));
    }
}
