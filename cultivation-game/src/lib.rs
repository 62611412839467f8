//! Cultivation Game Engine
//!
//! Platform-agnostic progression economy and save synchronisation for the
//! cultivation idle game. This crate provides the realm ladder, resource
//! accumulation, snapshot sanitisation, startup reconciliation between a local
//! cache and a remote store, and the save scheduler, without UI or
//! platform-specific dependencies.

pub mod accumulator;
pub mod actions;
pub mod constants;
pub mod error;
pub mod generators;
pub mod memory;
pub mod numbers;
pub mod progression;
pub mod realms;
pub mod reconcile;
pub mod sanitize;
pub mod scheduler;
pub mod session;
pub mod state;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// Re-export commonly used types
pub use accumulator::{
    PurchaseOutcome, apply_click, apply_elapsed, click_power, is_generator_visible,
    next_generator_cost, passive_rate, purchase_generator,
};
pub use actions::{ActionEvent, GameAction, Transition, reduce};
pub use error::{ReconcileError, StoreError, SyncError, ValidationError};
pub use generators::{GENERATORS, GeneratorDefinition, generator_by_key};
pub use memory::{ManualClock, MemoryCache, MemoryRemote};
pub use numbers::format_qi;
pub use progression::{
    BreakthroughOutcome, LadderPosition, breakthrough, breakthrough_progress,
    discounted_requirement, generator_cost, multiplier, next_position, required_qi, total_steps,
};
pub use realms::{REALMS, RealmDefinition, WORLDS, realm_by_id};
pub use reconcile::{ReconcilePhase, Reconciled, Reconciler, Repair, SnapshotSource};
pub use sanitize::{Sanitized, SnapshotShape, sanitize_json, sanitize_state};
pub use scheduler::{ChangeClass, SavePlan, SaveSchedule, SaveScheduler, classify};
pub use session::{LogoutReport, SyncHealth, SyncSession, TickReport};
pub use state::{Faction, GameState, RealmState, Resources, Settings, Stats, Theme};

/// Acknowledgement returned by the remote store for a successful save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveReceipt {
    pub success: bool,
    /// Server-side save time in milliseconds since the Unix epoch.
    pub timestamp: u64,
}

/// Trait for abstracting the durable local cache.
/// Platform-specific implementations should provide this
///
/// The cache holds a single serialized snapshot. Writes are synchronous and
/// cannot fail observably; implementations log their own I/O errors.
pub trait LocalCache {
    /// Raw snapshot text, if any.
    fn load(&self) -> Option<String>;

    /// Replace the stored snapshot.
    fn store(&self, snapshot: &str);

    /// Remove the stored snapshot.
    fn clear(&self);
}

/// Trait for abstracting the authoritative remote save store.
/// Platform-specific implementations should provide this
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch the latest raw snapshot for the signed-in user.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on auth, network or decoding failure. A missing
    /// save is `Ok(None)`, not an error.
    async fn fetch_latest(&self) -> Result<Option<String>, StoreError>;

    /// Upsert the full snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store rejects or cannot receive the save.
    async fn push(&self, state: &GameState) -> Result<SaveReceipt, StoreError>;
}

/// Wall-clock and monotonic time source.
pub trait Clock {
    /// Milliseconds since the Unix epoch; used only to stamp saves.
    fn now_millis(&self) -> u64;

    /// Time since an arbitrary fixed origin; used for production and timers.
    fn monotonic(&self) -> Duration;
}
