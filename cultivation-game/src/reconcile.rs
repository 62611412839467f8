//! Startup reconciliation between the local cache and the remote store.
//!
//! Both stores hold the same JSON shape. On boot the engine reads them
//! concurrently, sanitizes whatever it finds, picks the canonical snapshot by
//! `lastSaveTime` and overwrites the losing store with the winner.
//!
//! A legacy snapshot carries no usable progress, so it never competes: only
//! its settings survive, and a blank slate built from it is never pushed.

use crate::constants::LOG_TARGET_RECONCILE;
use crate::error::{ReconcileError, StoreError};
use crate::sanitize::{Sanitized, SnapshotShape, sanitize_json};
use crate::state::{GameState, Settings};
use crate::{LocalCache, RemoteStore};

/// Lifecycle of a reconciliation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconcilePhase {
    #[default]
    Unloaded,
    Loading,
    Reconciled,
    Error {
        retryable: bool,
    },
}

/// Where the canonical state came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotSource {
    Local,
    Remote,
    /// Neither store held a usable snapshot.
    Fresh,
}

impl SnapshotSource {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
            Self::Fresh => "fresh",
        }
    }
}

/// A store overwritten during reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repair {
    /// The local cache was seeded or overwritten with the remote snapshot.
    LocalCache,
    /// The remote store received the local snapshot.
    RemoteStore,
}

/// Result of a successful reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub state: GameState,
    pub source: SnapshotSource,
    pub repairs: Vec<Repair>,
    /// Set when the remote store should have been repaired but the push failed.
    /// The local cache already holds the canonical snapshot.
    pub remote_repair_error: Option<StoreError>,
}

/// Drives [`ReconcilePhase`] transitions for one session.
#[derive(Debug, Default)]
pub struct Reconciler {
    phase: ReconcilePhase,
}

impl Reconciler {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            phase: ReconcilePhase::Unloaded,
        }
    }

    #[must_use]
    pub const fn phase(&self) -> ReconcilePhase {
        self.phase
    }

    /// Determine the canonical state from both stores and repair the loser.
    ///
    /// Running this twice over the same store contents yields the same state
    /// and leaves the stores untouched the second time.
    ///
    /// # Errors
    ///
    /// * [`ReconcileError::ReauthRequired`] if the remote store rejects the
    ///   session. The phase returns to `Unloaded`.
    /// * [`ReconcileError::RemoteUnavailable`] if the remote store cannot be
    ///   read. The phase becomes a retryable `Error`. Nothing is written and
    ///   the local snapshot is returned only as a read-only preview.
    pub async fn run<L, R>(&mut self, local: &L, remote: &R) -> Result<Reconciled, ReconcileError>
    where
        L: LocalCache + ?Sized,
        R: RemoteStore + ?Sized,
    {
        self.phase = ReconcilePhase::Loading;
        log::debug!(target: LOG_TARGET_RECONCILE, "loading local and remote snapshots");

        let (remote_raw, local_raw) = tokio::join!(remote.fetch_latest(), async { local.load() });
        let local_snapshot = local_raw.as_deref().and_then(|raw| decode("local", raw));

        let remote_snapshot = match remote_raw {
            Ok(raw) => raw.as_deref().and_then(|raw| decode("remote", raw)),
            Err(StoreError::Unauthorized) => {
                log::warn!(target: LOG_TARGET_RECONCILE, "remote store rejected the session");
                return Err(self.fail(ReconcileError::ReauthRequired));
            }
            Err(err) => {
                log::warn!(
                    target: LOG_TARGET_RECONCILE,
                    "remote fetch failed ({err}); blocking until retried"
                );
                return Err(self.fail(ReconcileError::RemoteUnavailable {
                    reason: err.to_string(),
                    local_preview: local_snapshot.map(|snapshot| Box::new(snapshot.state)),
                }));
            }
        };

        let (local_snapshot, local_legacy) = split_legacy("local", local_snapshot);
        let (remote_snapshot, remote_legacy) = split_legacy("remote", remote_snapshot);
        let legacy_settings = local_legacy.or(remote_legacy);

        let outcome = match (local_snapshot, remote_snapshot) {
            (Some(local_snapshot), Some(remote_snapshot)) => {
                if remote_snapshot.state.last_save_time > local_snapshot.state.last_save_time {
                    log::info!(
                        target: LOG_TARGET_RECONCILE,
                        "remote snapshot is newer ({} > {})",
                        remote_snapshot.state.last_save_time,
                        local_snapshot.state.last_save_time
                    );
                    write_local(local, &remote_snapshot.state);
                    Reconciled {
                        state: remote_snapshot.state,
                        source: SnapshotSource::Remote,
                        repairs: vec![Repair::LocalCache],
                        remote_repair_error: None,
                    }
                } else {
                    log::info!(
                        target: LOG_TARGET_RECONCILE,
                        "local snapshot is newer or equal ({} >= {})",
                        local_snapshot.state.last_save_time,
                        remote_snapshot.state.last_save_time
                    );
                    let agree = local_snapshot.state == remote_snapshot.state
                        && local_snapshot.dropped_generators.is_empty();
                    if agree {
                        log::debug!(target: LOG_TARGET_RECONCILE, "stores already agree");
                        Reconciled {
                            state: local_snapshot.state,
                            source: SnapshotSource::Local,
                            repairs: Vec::new(),
                            remote_repair_error: None,
                        }
                    } else {
                        adopt_local(local, remote, local_snapshot)
                            .await
                            .map_err(|err| self.fail(err))?
                    }
                }
            }
            (None, Some(remote_snapshot)) => {
                log::info!(target: LOG_TARGET_RECONCILE, "adopting remote snapshot (only source)");
                write_local(local, &remote_snapshot.state);
                Reconciled {
                    state: remote_snapshot.state,
                    source: SnapshotSource::Remote,
                    repairs: vec![Repair::LocalCache],
                    remote_repair_error: None,
                }
            }
            (Some(local_snapshot), None) => {
                log::info!(target: LOG_TARGET_RECONCILE, "adopting local snapshot (only source)");
                adopt_local(local, remote, local_snapshot)
                    .await
                    .map_err(|err| self.fail(err))?
            }
            (None, None) => {
                log::info!(target: LOG_TARGET_RECONCILE, "no save found; starting fresh");
                Reconciled {
                    state: GameState {
                        settings: legacy_settings.unwrap_or_default(),
                        ..GameState::default()
                    },
                    source: SnapshotSource::Fresh,
                    repairs: Vec::new(),
                    remote_repair_error: None,
                }
            }
        };

        self.phase = ReconcilePhase::Reconciled;
        Ok(outcome)
    }

    /// An auth failure is not a data error: the phase resets instead of
    /// entering `Error`.
    fn fail(&mut self, err: ReconcileError) -> ReconcileError {
        self.phase = match &err {
            ReconcileError::ReauthRequired => ReconcilePhase::Unloaded,
            ReconcileError::RemoteUnavailable { .. } => ReconcilePhase::Error { retryable: true },
        };
        err
    }
}

fn decode(store: &str, raw: &str) -> Option<Sanitized> {
    match sanitize_json(raw) {
        Ok(sanitized) => Some(sanitized),
        Err(err) => {
            log::warn!(target: LOG_TARGET_RECONCILE, "ignoring invalid {store} snapshot: {err}");
            None
        }
    }
}

/// Separate a legacy snapshot from a usable one, keeping only its settings.
fn split_legacy(
    store: &str,
    snapshot: Option<Sanitized>,
) -> (Option<Sanitized>, Option<Settings>) {
    match snapshot {
        Some(snapshot) if snapshot.shape == SnapshotShape::Legacy => {
            log::info!(
                target: LOG_TARGET_RECONCILE,
                "{store} snapshot uses the legacy shape; ignoring it for adoption"
            );
            (None, Some(snapshot.state.settings))
        }
        other => (other, None),
    }
}

fn write_local<L: LocalCache + ?Sized>(local: &L, state: &GameState) {
    match serde_json::to_string(state) {
        Ok(json) => local.store(&json),
        Err(err) => {
            log::error!(target: LOG_TARGET_RECONCILE, "failed to serialize snapshot: {err}");
        }
    }
}

/// Adopt the local snapshot, rewrite the cache if sanitizing dropped anything
/// and push it to the remote store.
async fn adopt_local<L, R>(
    local: &L,
    remote: &R,
    snapshot: Sanitized,
) -> Result<Reconciled, ReconcileError>
where
    L: LocalCache + ?Sized,
    R: RemoteStore + ?Sized,
{
    let mut repairs = Vec::new();
    if !snapshot.dropped_generators.is_empty() {
        write_local(local, &snapshot.state);
        repairs.push(Repair::LocalCache);
    }

    let remote_repair_error = match remote.push(&snapshot.state).await {
        Ok(_) => {
            repairs.push(Repair::RemoteStore);
            None
        }
        Err(StoreError::Unauthorized) => return Err(ReconcileError::ReauthRequired),
        Err(err) => {
            log::warn!(
                target: LOG_TARGET_RECONCILE,
                "remote repair failed ({err}); local cache remains authoritative"
            );
            Some(err)
        }
    };

    Ok(Reconciled {
        state: snapshot.state,
        source: SnapshotSource::Local,
        repairs,
        remote_repair_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryCache, MemoryRemote};

    fn snapshot(last_save_time: u64, qi: f64) -> GameState {
        let mut state = GameState::default();
        state.resources.qi = qi;
        state.resources.total_qi = qi;
        state.last_save_time = last_save_time;
        state
    }

    #[tokio::test]
    async fn fresh_start_writes_nothing() {
        let local = MemoryCache::default();
        let remote = MemoryRemote::default();
        let mut reconciler = Reconciler::new();
        let outcome = reconciler.run(&local, &remote).await.unwrap();
        assert_eq!(outcome.source, SnapshotSource::Fresh);
        assert_eq!(outcome.state, GameState::default());
        assert!(outcome.repairs.is_empty());
        assert!(local.load().is_none());
        assert_eq!(remote.push_count(), 0);
        assert_eq!(reconciler.phase(), ReconcilePhase::Reconciled);
    }

    #[tokio::test]
    async fn legacy_remote_row_loses_to_real_local_progress() {
        let local = MemoryCache::with_state(&snapshot(10, 75.0));
        let remote = MemoryRemote::default();
        remote.put_raw(r#"{"realm":{"name":"Mortal"},"lastSaveTime":900}"#);
        let outcome = Reconciler::new().run(&local, &remote).await.unwrap();
        assert_eq!(outcome.source, SnapshotSource::Local);
        assert_eq!(outcome.repairs, vec![Repair::RemoteStore]);
        let repaired = remote.state().unwrap();
        assert!((repaired.resources.total_qi - 75.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn newer_local_overwrites_remote() {
        let local = MemoryCache::with_state(&snapshot(200, 50.0));
        let remote = MemoryRemote::with_state(&snapshot(100, 10.0));
        let outcome = Reconciler::new().run(&local, &remote).await.unwrap();
        assert_eq!(outcome.source, SnapshotSource::Local);
        assert_eq!(outcome.repairs, vec![Repair::RemoteStore]);
        assert_eq!(remote.state().unwrap().last_save_time, 200);
        assert!((remote.state().unwrap().resources.qi - 50.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn newer_remote_overwrites_local() {
        let local = MemoryCache::with_state(&snapshot(100, 10.0));
        let remote = MemoryRemote::with_state(&snapshot(300, 70.0));
        let outcome = Reconciler::new().run(&local, &remote).await.unwrap();
        assert_eq!(outcome.source, SnapshotSource::Remote);
        assert_eq!(outcome.repairs, vec![Repair::LocalCache]);
        assert_eq!(local.state().unwrap().last_save_time, 300);
        assert_eq!(remote.push_count(), 0);
    }

    #[tokio::test]
    async fn tie_favours_local() {
        let local = MemoryCache::with_state(&snapshot(100, 80.0));
        let remote = MemoryRemote::with_state(&snapshot(100, 20.0));
        let outcome = Reconciler::new().run(&local, &remote).await.unwrap();
        assert_eq!(outcome.source, SnapshotSource::Local);
        assert!((outcome.state.resources.qi - 80.0).abs() < f64::EPSILON);
        assert!((remote.state().unwrap().resources.qi - 80.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn transient_failure_blocks_without_writing() {
        let local = MemoryCache::with_state(&snapshot(100, 10.0));
        let remote = MemoryRemote::default();
        remote.fail_with(Some(StoreError::Transient("connection reset".into())));
        let before = local.load();
        let mut reconciler = Reconciler::new();
        let err = reconciler.run(&local, &remote).await.unwrap_err();
        match err {
            ReconcileError::RemoteUnavailable { local_preview, .. } => {
                assert_eq!(local_preview.unwrap().last_save_time, 100);
            }
            ReconcileError::ReauthRequired => panic!("expected a retryable error"),
        }
        assert_eq!(reconciler.phase(), ReconcilePhase::Error { retryable: true });
        assert_eq!(local.load(), before);
        assert_eq!(remote.push_count(), 0);
    }

    #[tokio::test]
    async fn unauthorized_requires_reauth() {
        let local = MemoryCache::default();
        let remote = MemoryRemote::default();
        remote.fail_with(Some(StoreError::Unauthorized));
        let mut reconciler = Reconciler::new();
        assert_eq!(
            reconciler.run(&local, &remote).await.unwrap_err(),
            ReconcileError::ReauthRequired
        );
        assert_eq!(reconciler.phase(), ReconcilePhase::Unloaded);
    }

    #[tokio::test]
    async fn invalid_local_snapshot_is_ignored() {
        let local = MemoryCache::default();
        local.store("{\"realm\":{\"id\":99,\"stage\":1}}");
        let remote = MemoryRemote::with_state(&snapshot(10, 5.0));
        let outcome = Reconciler::new().run(&local, &remote).await.unwrap();
        assert_eq!(outcome.source, SnapshotSource::Remote);
        assert_eq!(local.state().unwrap().last_save_time, 10);
    }
}
