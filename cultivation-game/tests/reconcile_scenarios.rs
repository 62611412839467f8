use cultivation_game::{
    GameState, LocalCache, MemoryCache, MemoryRemote, ReconcileError, ReconcilePhase, Reconciler,
    RemoteStore, Repair, SaveReceipt, SnapshotSource, StoreError, Theme,
};

fn saved_at(last_save_time: u64, spirit_wells: u64) -> GameState {
    let mut state = GameState::default();
    state.generators.insert("spirit_well".into(), spirit_wells);
    state.resources.total_qi = 500.0;
    state.last_save_time = last_save_time;
    state
}

#[tokio::test]
async fn newer_local_wins_and_repairs_remote() {
    let local = MemoryCache::with_state(&saved_at(200, 3));
    let remote = MemoryRemote::with_state(&saved_at(100, 1));

    let outcome = Reconciler::new().run(&local, &remote).await.unwrap();

    assert_eq!(outcome.source, SnapshotSource::Local);
    assert_eq!(outcome.state.generator_count("spirit_well"), 3);
    let repaired = remote.state().unwrap();
    assert_eq!(repaired.last_save_time, 200);
    assert_eq!(repaired.generator_count("spirit_well"), 3);
}

#[tokio::test]
async fn reconciling_twice_is_idempotent() {
    let local = MemoryCache::with_state(&saved_at(200, 3));
    let remote = MemoryRemote::with_state(&saved_at(100, 1));

    let first = Reconciler::new().run(&local, &remote).await.unwrap();
    let local_after_first = local.load();
    let remote_after_first = remote.state();
    let pushes = remote.push_count();

    let second = Reconciler::new().run(&local, &remote).await.unwrap();
    assert_eq!(first.state, second.state);
    assert!(second.repairs.is_empty());
    assert_eq!(local.load(), local_after_first);
    assert_eq!(remote.state(), remote_after_first);
    assert_eq!(remote.push_count(), pushes);
}

#[tokio::test]
async fn remote_only_seeds_the_local_cache() {
    let local = MemoryCache::default();
    let remote = MemoryRemote::with_state(&saved_at(40, 2));
    let outcome = Reconciler::new().run(&local, &remote).await.unwrap();
    assert_eq!(outcome.source, SnapshotSource::Remote);
    assert_eq!(outcome.repairs, vec![Repair::LocalCache]);
    assert_eq!(local.state().unwrap().generator_count("spirit_well"), 2);
}

#[tokio::test]
async fn local_only_is_pushed_after_an_offline_session() {
    let local = MemoryCache::with_state(&saved_at(40, 2));
    let remote = MemoryRemote::default();
    let outcome = Reconciler::new().run(&local, &remote).await.unwrap();
    assert_eq!(outcome.source, SnapshotSource::Local);
    assert!(outcome.repairs.contains(&Repair::RemoteStore));
    assert_eq!(remote.state().unwrap().generator_count("spirit_well"), 2);
}

#[tokio::test]
async fn first_load_network_failure_blocks_instead_of_starting_fresh() {
    let local = MemoryCache::default();
    let remote = MemoryRemote::default();
    remote.fail_with(Some(StoreError::Transient("503 Service Unavailable".into())));
    let mut reconciler = Reconciler::new();

    let err = reconciler.run(&local, &remote).await.unwrap_err();
    assert!(err.is_retryable());
    assert!(matches!(
        err,
        ReconcileError::RemoteUnavailable {
            local_preview: None,
            ..
        }
    ));
    assert_eq!(reconciler.phase(), ReconcilePhase::Error { retryable: true });
    assert!(local.load().is_none());

    remote.fail_with(None);
    let outcome = reconciler.run(&local, &remote).await.unwrap();
    assert_eq!(outcome.source, SnapshotSource::Fresh);
    assert_eq!(reconciler.phase(), ReconcilePhase::Reconciled);
}

#[tokio::test]
async fn remote_repair_failure_is_reported_not_fatal() {
    let local = MemoryCache::with_state(&saved_at(300, 5));
    let remote = MemoryRemote::with_state(&saved_at(100, 1));
    let outcome = {
        let flaky = FailingPush {
            inner: remote.clone(),
        };
        Reconciler::new().run(&local, &flaky).await.unwrap()
    };
    assert_eq!(outcome.source, SnapshotSource::Local);
    assert!(matches!(
        outcome.remote_repair_error,
        Some(StoreError::Transient(_))
    ));
    assert_eq!(remote.state().unwrap().last_save_time, 100);
}

const LEGACY_LOCAL: &str = r#"{"resources":{"qi":10,"totalQi":10},"realm":{"name":"Mortal"},"settings":{"theme":"light"},"lastSaveTime":200}"#;

#[tokio::test]
async fn legacy_local_save_starts_fresh_with_its_settings() {
    let local = MemoryCache::default();
    local.store(LEGACY_LOCAL);
    let writes_before = local.write_count();
    let remote = MemoryRemote::default();

    let outcome = Reconciler::new().run(&local, &remote).await.unwrap();

    assert_eq!(outcome.source, SnapshotSource::Fresh);
    assert!(outcome.state.is_mostly_empty());
    assert_eq!(outcome.state.settings.theme, Theme::Light);
    assert!(outcome.repairs.is_empty());
    assert_eq!(local.write_count(), writes_before);
    assert_eq!(remote.push_count(), 0);
}

#[tokio::test]
async fn newer_legacy_local_never_overwrites_a_real_remote_save() {
    let mut saved = saved_at(100, 7);
    saved.resources.total_qi = 50_000.0;
    let local = MemoryCache::default();
    local.store(LEGACY_LOCAL);
    let remote = MemoryRemote::with_state(&saved);

    let outcome = Reconciler::new().run(&local, &remote).await.unwrap();

    assert_eq!(outcome.source, SnapshotSource::Remote);
    assert_eq!(outcome.repairs, vec![Repair::LocalCache]);
    assert_eq!(outcome.state.generator_count("spirit_well"), 7);
    assert_eq!(remote.push_count(), 0);
    let kept = remote.state().unwrap();
    assert_eq!(kept.generator_count("spirit_well"), 7);
    assert!((kept.resources.total_qi - 50_000.0).abs() < f64::EPSILON);
    assert_eq!(local.state().unwrap(), outcome.state);
}

/// Reads succeed, writes fail transiently.
struct FailingPush {
    inner: MemoryRemote,
}

#[async_trait::async_trait]
impl RemoteStore for FailingPush {
    async fn fetch_latest(&self) -> Result<Option<String>, StoreError> {
        self.inner.fetch_latest().await
    }

    async fn push(&self, _state: &GameState) -> Result<SaveReceipt, StoreError> {
        Err(StoreError::Transient("timeout".into()))
    }
}
