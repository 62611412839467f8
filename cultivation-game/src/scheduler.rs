//! Save policy: classifies state transitions and decides when each store is written.
//!
//! The scheduler holds no I/O handles. [`crate::session::SyncSession`] feeds
//! it transitions and clock readings and executes the resulting [`SavePlan`].

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{
    DEFAULT_LOCAL_INTERVAL_MS, DEFAULT_LOGOUT_GRACE_MS, DEFAULT_REMOTE_INTERVAL_MS,
    LOG_TARGET_SAVE,
};
use crate::state::GameState;

/// Save cadence. Missing fields fall back to their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveSchedule {
    pub local_interval_ms: u64,
    pub remote_interval_ms: u64,
    pub logout_grace_ms: u64,
}

impl Default for SaveSchedule {
    fn default() -> Self {
        Self {
            local_interval_ms: DEFAULT_LOCAL_INTERVAL_MS,
            remote_interval_ms: DEFAULT_REMOTE_INTERVAL_MS,
            logout_grace_ms: DEFAULT_LOGOUT_GRACE_MS,
        }
    }
}

impl SaveSchedule {
    #[must_use]
    pub const fn local_interval(&self) -> Duration {
        Duration::from_millis(self.local_interval_ms)
    }

    #[must_use]
    pub const fn remote_interval(&self) -> Duration {
        Duration::from_millis(self.remote_interval_ms)
    }

    #[must_use]
    pub const fn logout_grace(&self) -> Duration {
        Duration::from_millis(self.logout_grace_ms)
    }
}

/// How much a transition matters for persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChangeClass {
    Unchanged,
    /// Only resource counters moved.
    Incidental,
    /// Generators, realm position, faction, unlocks or settings changed.
    Critical,
}

/// Classify the difference between two states.
#[must_use]
pub fn classify(previous: &GameState, next: &GameState) -> ChangeClass {
    let critical = previous.generators != next.generators
        || previous.realm.id != next.realm.id
        || previous.realm.stage != next.realm.stage
        || previous.faction != next.faction
        || previous.upgrades != next.upgrades
        || previous.achievements != next.achievements
        || previous.settings != next.settings;
    if critical {
        ChangeClass::Critical
    } else if previous.resources != next.resources {
        ChangeClass::Incidental
    } else {
        ChangeClass::Unchanged
    }
}

/// Which stores a save should touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SavePlan {
    pub local: bool,
    pub remote: bool,
    /// Set for critical saves; cached stats are refreshed before writing.
    pub critical: bool,
}

impl SavePlan {
    pub const SKIP: Self = Self {
        local: false,
        remote: false,
        critical: false,
    };

    pub const IMMEDIATE: Self = Self {
        local: true,
        remote: true,
        critical: true,
    };

    #[must_use]
    pub const fn is_skip(&self) -> bool {
        !self.local && !self.remote
    }
}

/// Decides when to persist, tracking the last saved snapshot and timer marks.
#[derive(Debug, Clone)]
pub struct SaveScheduler {
    schedule: SaveSchedule,
    baseline: GameState,
    last_stamp: u64,
    last_local: Duration,
    last_remote: Duration,
}

impl SaveScheduler {
    /// Start tracking from a reconciled `baseline` at monotonic time `now`.
    #[must_use]
    pub fn new(schedule: SaveSchedule, baseline: GameState, now: Duration) -> Self {
        Self {
            schedule,
            last_stamp: baseline.last_save_time,
            baseline,
            last_local: now,
            last_remote: now,
        }
    }

    #[must_use]
    pub const fn schedule(&self) -> &SaveSchedule {
        &self.schedule
    }

    /// The last snapshot handed to a critical or explicit save.
    #[must_use]
    pub const fn baseline(&self) -> &GameState {
        &self.baseline
    }

    /// Plan for a freshly reduced state. Critical changes save immediately to
    /// both stores; anything else waits for the timers.
    #[must_use]
    pub fn observe(&self, next: &GameState) -> SavePlan {
        match classify(&self.baseline, next) {
            ChangeClass::Critical => SavePlan::IMMEDIATE,
            ChangeClass::Incidental | ChangeClass::Unchanged => SavePlan::SKIP,
        }
    }

    /// Plan for a timer tick at monotonic time `now`.
    #[must_use]
    pub fn due(&self, current: &GameState, now: Duration) -> SavePlan {
        let plan = SavePlan {
            local: now.saturating_sub(self.last_local) >= self.schedule.local_interval(),
            remote: now.saturating_sub(self.last_remote) >= self.schedule.remote_interval(),
            critical: false,
        };
        if plan.is_skip() || self.guards_empty_state(current) {
            return SavePlan::SKIP;
        }
        plan
    }

    /// A blank slate is never written unless a critical field changed since the
    /// last save.
    #[must_use]
    pub fn guards_empty_state(&self, current: &GameState) -> bool {
        let guarded = current.is_mostly_empty()
            && classify(&self.baseline, current) != ChangeClass::Critical;
        if guarded {
            log::debug!(target: LOG_TARGET_SAVE, "skipping save of a mostly empty state");
        }
        guarded
    }

    /// Next save stamp. Never earlier than the previous one, even if the wall
    /// clock stepped back.
    pub fn stamp(&mut self, now_millis: u64) -> u64 {
        self.last_stamp = self.last_stamp.max(now_millis);
        self.last_stamp
    }

    pub fn record_local(&mut self, now: Duration) {
        self.last_local = now;
    }

    pub fn record_remote(&mut self, now: Duration) {
        self.last_remote = now;
    }

    /// Replace the snapshot used for critical-change diffing.
    pub fn mark_saved(&mut self, state: &GameState) {
        self.baseline = state.clone();
        self.last_stamp = self.last_stamp.max(state.last_save_time);
    }
}
