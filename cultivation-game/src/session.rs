//! Session facade owning the canonical in-memory state.
//!
//! All mutation goes through [`reduce`]; persistence is decided by the
//! [`SaveScheduler`] observing each transition.

use std::time::Duration;

use crate::accumulator::click_power;
use crate::actions::{ActionEvent, GameAction, Transition, reduce};
use crate::constants::LOG_TARGET_SAVE;
use crate::error::{ReconcileError, StoreError, SyncError};
use crate::reconcile::{ReconcilePhase, Reconciled, Reconciler};
use crate::scheduler::{SavePlan, SaveSchedule, SaveScheduler};
use crate::state::GameState;
use crate::{Clock, LocalCache, RemoteStore, SaveReceipt};

/// Remote sync status for a degraded-sync indicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncHealth {
    Synced,
    /// The remote store is behind; the local cache holds the latest progress.
    /// `retryable` is false when the store refused the save outright.
    Degraded { reason: String, retryable: bool },
    ReauthRequired,
}

impl SyncHealth {
    fn from_store_error(err: &StoreError) -> Self {
        match err {
            StoreError::Unauthorized => Self::ReauthRequired,
            other => Self::Degraded {
                reason: other.to_string(),
                retryable: other.is_retryable(),
            },
        }
    }
}

/// What a timer tick did.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TickReport {
    pub produced: f64,
    pub saved_local: bool,
    pub pushed_remote: bool,
    /// Non-fatal remote failure; the local cache was still written.
    pub remote_error: Option<SyncError>,
}

/// Outcome of the final flush on logout.
#[derive(Debug, Clone, PartialEq)]
pub struct LogoutReport {
    pub flushed: bool,
    /// Nothing worth saving: the session still holds an untouched blank slate.
    pub skipped: bool,
    pub error: Option<String>,
}

/// A signed-in play session over one local cache and one remote store.
pub struct SyncSession<L, R, C>
where
    L: LocalCache,
    R: RemoteStore,
    C: Clock,
{
    local: L,
    remote: R,
    clock: C,
    schedule: SaveSchedule,
    reconciler: Reconciler,
    scheduler: Option<SaveScheduler>,
    state: Option<GameState>,
    health: SyncHealth,
    last_tick: Duration,
}

impl<L, R, C> SyncSession<L, R, C>
where
    L: LocalCache,
    R: RemoteStore,
    C: Clock,
{
    pub fn new(local: L, remote: R, clock: C, schedule: SaveSchedule) -> Self {
        let last_tick = clock.monotonic();
        Self {
            local,
            remote,
            clock,
            schedule,
            reconciler: Reconciler::new(),
            scheduler: None,
            state: None,
            health: SyncHealth::Synced,
            last_tick,
        }
    }

    #[must_use]
    pub const fn phase(&self) -> ReconcilePhase {
        self.reconciler.phase()
    }

    /// Canonical state, available once [`Self::boot`] succeeded.
    #[must_use]
    pub const fn state(&self) -> Option<&GameState> {
        self.state.as_ref()
    }

    #[must_use]
    pub const fn health(&self) -> &SyncHealth {
        &self.health
    }

    #[must_use]
    pub const fn local(&self) -> &L {
        &self.local
    }

    #[must_use]
    pub const fn remote(&self) -> &R {
        &self.remote
    }

    /// Reconcile both stores and make the winner the session state. May be
    /// retried after a retryable error.
    ///
    /// # Errors
    ///
    /// Propagates [`ReconcileError`]; no state is available until a retry
    /// succeeds.
    pub async fn boot(&mut self) -> Result<Reconciled, ReconcileError> {
        match self.reconciler.run(&self.local, &self.remote).await {
            Ok(reconciled) => {
                let now = self.clock.monotonic();
                self.health = reconciled
                    .remote_repair_error
                    .as_ref()
                    .map_or(SyncHealth::Synced, SyncHealth::from_store_error);
                self.scheduler = Some(SaveScheduler::new(
                    self.schedule,
                    reconciled.state.clone(),
                    now,
                ));
                self.state = Some(reconciled.state.clone());
                self.last_tick = now;
                Ok(reconciled)
            }
            Err(err) => {
                self.health = match &err {
                    ReconcileError::ReauthRequired => SyncHealth::ReauthRequired,
                    ReconcileError::RemoteUnavailable { reason, .. } => SyncHealth::Degraded {
                        reason: reason.clone(),
                        retryable: err.is_retryable(),
                    },
                };
                self.state = None;
                self.scheduler = None;
                Err(err)
            }
        }
    }

    /// Reduce one action and persist it if the transition is critical.
    ///
    /// A failed remote save does not fail the action; it shows up in
    /// [`Self::health`].
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotReady`] before a successful boot.
    pub async fn dispatch(&mut self, action: &GameAction) -> Result<ActionEvent, SyncError> {
        if matches!(action, GameAction::HardReset) {
            self.hard_reset().await?;
            return Ok(ActionEvent::Reset);
        }
        let current = self.state.as_ref().ok_or(SyncError::NotReady)?;
        let Transition { state, event } = reduce(current, action);
        let plan = self
            .scheduler
            .as_ref()
            .map_or(SavePlan::SKIP, |scheduler| scheduler.observe(&state));
        self.state = Some(state);
        if !plan.is_skip() {
            log::info!(target: LOG_TARGET_SAVE, "critical change detected; saving immediately");
            if let Err(err) = self.persist(plan).await {
                log::warn!(target: LOG_TARGET_SAVE, "critical save incomplete: {err}");
            }
        }
        Ok(event)
    }

    /// Credit passive production for the monotonic time since the previous
    /// tick, then run whichever save timers are due.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotReady`] before a successful boot.
    pub async fn tick(&mut self) -> Result<TickReport, SyncError> {
        let current = self.state.as_ref().ok_or(SyncError::NotReady)?;
        let now = self.clock.monotonic();
        let elapsed = now.saturating_sub(self.last_tick);
        self.last_tick = now;

        let Transition { state, event } = reduce(current, &GameAction::Produce { elapsed });
        let produced = match event {
            ActionEvent::Produced { gained } => gained,
            _ => 0.0,
        };
        let plan = self
            .scheduler
            .as_ref()
            .map_or(SavePlan::SKIP, |scheduler| scheduler.due(&state, now));
        self.state = Some(state);

        let mut report = TickReport {
            produced,
            ..TickReport::default()
        };
        if plan.is_skip() {
            return Ok(report);
        }
        report.saved_local = plan.local;
        match self.persist(plan).await {
            Ok(receipt) => report.pushed_remote = receipt.is_some(),
            Err(SyncError::NotReady) => return Err(SyncError::NotReady),
            Err(err) => {
                log::warn!(target: LOG_TARGET_SAVE, "periodic save incomplete: {err}");
                report.remote_error = Some(err);
            }
        }
        Ok(report)
    }

    /// Serialize, write the local cache, then attempt the remote store.
    /// Idempotent; calling it twice writes the same snapshot twice.
    ///
    /// # Errors
    ///
    /// Returns a non-fatal [`SyncError`] if the remote write fails. The local
    /// cache already holds the snapshot in that case.
    pub async fn manual_sync(&mut self) -> Result<SaveReceipt, SyncError> {
        let plan = SavePlan {
            local: true,
            remote: true,
            critical: true,
        };
        self.persist(plan).await?.ok_or(SyncError::NotReady)
    }

    /// Wipe progress and overwrite both stores so the stale copy cannot
    /// resurrect on the next boot.
    ///
    /// # Errors
    ///
    /// Returns a non-fatal [`SyncError`] if the remote store could not be
    /// overwritten; the local cache is reset regardless.
    pub async fn hard_reset(&mut self) -> Result<(), SyncError> {
        let current = self.state.as_ref().ok_or(SyncError::NotReady)?;
        let Transition { state, .. } = reduce(current, &GameAction::HardReset);
        self.state = Some(state);
        log::info!(target: LOG_TARGET_SAVE, "hard reset requested; overwriting both stores");
        self.local.clear();
        self.persist(SavePlan::IMMEDIATE).await.map(|_| ())
    }

    /// Attempt one last remote flush bounded by the logout grace period.
    /// Failures are logged and never block the logout.
    pub async fn logout(mut self) -> LogoutReport {
        let guarded = match (self.state.as_ref(), self.scheduler.as_ref()) {
            (Some(state), Some(scheduler)) => scheduler.guards_empty_state(state),
            _ => {
                return LogoutReport {
                    flushed: false,
                    skipped: false,
                    error: None,
                };
            }
        };
        if guarded {
            log::info!(target: LOG_TARGET_SAVE, "nothing to save before logout");
            return LogoutReport {
                flushed: false,
                skipped: true,
                error: None,
            };
        }
        let grace = self.schedule.logout_grace();
        match tokio::time::timeout(grace, self.manual_sync()).await {
            Ok(Ok(_)) => {
                log::info!(target: LOG_TARGET_SAVE, "final save flushed before logout");
                LogoutReport {
                    flushed: true,
                    skipped: false,
                    error: None,
                }
            }
            Ok(Err(err)) => {
                log::warn!(target: LOG_TARGET_SAVE, "final save failed: {err}");
                LogoutReport {
                    flushed: false,
                    skipped: false,
                    error: Some(err.to_string()),
                }
            }
            Err(_) => {
                log::warn!(
                    target: LOG_TARGET_SAVE,
                    "final save did not finish within {}ms",
                    grace.as_millis()
                );
                LogoutReport {
                    flushed: false,
                    skipped: false,
                    error: Some("final save timed out".to_string()),
                }
            }
        }
    }

    /// Execute `plan` against the current state. Returns the remote receipt
    /// when the remote store was written.
    async fn persist(&mut self, plan: SavePlan) -> Result<Option<SaveReceipt>, SyncError> {
        let (Some(state), Some(scheduler)) = (self.state.as_mut(), self.scheduler.as_mut()) else {
            return Err(SyncError::NotReady);
        };
        state.last_save_time = scheduler.stamp(self.clock.now_millis());
        if plan.critical {
            state.stats.qi_per_tap = click_power(state);
        }
        state.validate()?;
        let snapshot = state.clone();
        let now = self.clock.monotonic();

        if plan.local {
            let json = serde_json::to_string(&snapshot)
                .map_err(|err| SyncError::Invalid(err.into()))?;
            self.local.store(&json);
            scheduler.record_local(now);
        }
        if plan.critical {
            scheduler.mark_saved(&snapshot);
        }
        if !plan.remote {
            return Ok(None);
        }

        match self.remote.push(&snapshot).await {
            Ok(receipt) => {
                if let Some(scheduler) = self.scheduler.as_mut() {
                    scheduler.record_remote(now);
                }
                self.health = SyncHealth::Synced;
                log::debug!(
                    target: LOG_TARGET_SAVE,
                    "remote save acknowledged at {}",
                    receipt.timestamp
                );
                Ok(Some(receipt))
            }
            Err(err) => {
                self.health = SyncHealth::from_store_error(&err);
                Err(SyncError::from(err))
            }
        }
    }
}
