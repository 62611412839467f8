//! In-memory store implementations for tests and offline simulation.
use async_trait::async_trait;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::StoreError;
use crate::state::GameState;
use crate::{Clock, LocalCache, RemoteStore, SaveReceipt};

/// Single-slot local cache. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    slot: Rc<RefCell<Option<String>>>,
    writes: Rc<Cell<usize>>,
}

impl MemoryCache {
    /// Cache pre-seeded with a serialized `state`.
    #[must_use]
    pub fn with_state(state: &GameState) -> Self {
        let cache = Self::default();
        if let Ok(json) = serde_json::to_string(state) {
            cache.slot.replace(Some(json));
        }
        cache
    }

    /// Decoded contents, if the slot holds a current-shape snapshot.
    #[must_use]
    pub fn state(&self) -> Option<GameState> {
        self.slot
            .borrow()
            .as_deref()
            .and_then(|json| serde_json::from_str(json).ok())
    }

    /// Number of writes (including clears) since creation.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.get()
    }
}

impl LocalCache for MemoryCache {
    fn load(&self) -> Option<String> {
        self.slot.borrow().clone()
    }

    fn store(&self, snapshot: &str) {
        self.slot.replace(Some(snapshot.to_string()));
        self.writes.set(self.writes.get() + 1);
    }

    fn clear(&self) {
        self.slot.replace(None);
        self.writes.set(self.writes.get() + 1);
    }
}

#[derive(Debug, Default)]
struct RemoteInner {
    snapshot: Option<String>,
    failure: Option<StoreError>,
    fetches: usize,
    pushes: usize,
}

/// Remote store double with failure injection. Clones share the same row.
#[derive(Debug, Clone, Default)]
pub struct MemoryRemote {
    inner: Arc<Mutex<RemoteInner>>,
}

impl MemoryRemote {
    #[must_use]
    pub fn with_state(state: &GameState) -> Self {
        let remote = Self::default();
        remote.lock().snapshot = serde_json::to_string(state).ok();
        remote
    }

    /// Store a raw body as the saved row, bypassing validation.
    pub fn put_raw(&self, raw: impl Into<String>) {
        self.lock().snapshot = Some(raw.into());
    }

    /// Make every subsequent call fail with `failure`, or succeed again with `None`.
    pub fn fail_with(&self, failure: Option<StoreError>) {
        self.lock().failure = failure;
    }

    #[must_use]
    pub fn state(&self) -> Option<GameState> {
        self.lock()
            .snapshot
            .as_deref()
            .and_then(|json| serde_json::from_str(json).ok())
    }

    #[must_use]
    pub fn push_count(&self) -> usize {
        self.lock().pushes
    }

    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.lock().fetches
    }

    fn lock(&self) -> MutexGuard<'_, RemoteInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn fetch_latest(&self) -> Result<Option<String>, StoreError> {
        let mut inner = self.lock();
        inner.fetches += 1;
        if let Some(failure) = inner.failure.clone() {
            return Err(failure);
        }
        Ok(inner.snapshot.clone())
    }

    async fn push(&self, state: &GameState) -> Result<SaveReceipt, StoreError> {
        let mut inner = self.lock();
        if let Some(failure) = inner.failure.clone() {
            return Err(failure);
        }
        let json =
            serde_json::to_string(state).map_err(|err| StoreError::Rejected(err.to_string()))?;
        inner.snapshot = Some(json);
        inner.pushes += 1;
        Ok(SaveReceipt {
            success: true,
            timestamp: state.last_save_time,
        })
    }
}

/// Hand-driven clock. Clones share the same readings.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    wall_ms: Rc<Cell<u64>>,
    elapsed: Rc<Cell<Duration>>,
}

impl ManualClock {
    #[must_use]
    pub fn starting_at(wall_ms: u64) -> Self {
        let clock = Self::default();
        clock.wall_ms.set(wall_ms);
        clock
    }

    /// Move both the wall clock and the monotonic clock forward.
    pub fn advance(&self, by: Duration) {
        let millis = u64::try_from(by.as_millis()).unwrap_or(u64::MAX);
        self.wall_ms.set(self.wall_ms.get().saturating_add(millis));
        self.elapsed.set(self.elapsed.get().saturating_add(by));
    }

    /// Step the wall clock alone, as an NTP correction or a user edit would.
    pub fn set_wall(&self, wall_ms: u64) {
        self.wall_ms.set(wall_ms);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.wall_ms.get()
    }

    fn monotonic(&self) -> Duration {
        self.elapsed.get()
    }
}
