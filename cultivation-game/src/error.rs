//! Error taxonomy for snapshot validation, store access and synchronisation.
//!
//! The progression model and accumulator are total functions and never fail;
//! everything here is raised by the sanitizer, the reconciliation engine, the
//! save scheduler, or a store implementation.

use crate::state::GameState;

/// A snapshot that is malformed or out of range. Such a snapshot is rejected
/// and never persisted.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("snapshot is not valid JSON: {0}")]
    Json(String),
    #[error("snapshot field `{field}` is missing or has the wrong shape")]
    Shape { field: &'static str },
    #[error("realm {id} is not in the catalog")]
    UnknownRealm { id: u32 },
    #[error("stage {stage} is outside 1..={max} for realm {id}")]
    StageOutOfRange { id: u32, stage: u32, max: u32 },
    #[error("resource `{field}` must be a finite, non-negative number (got {value})")]
    Resource { field: &'static str, value: f64 },
    #[error("generator `{key}` has an invalid count {value}")]
    GeneratorCount { key: String, value: f64 },
    #[error("generator `{0}` is not in the catalog")]
    UnknownGenerator(String),
    #[error("unknown faction `{0}`")]
    UnknownFaction(String),
    #[error("unknown theme `{0}`")]
    UnknownTheme(String),
}

impl From<serde_json::Error> for ValidationError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Failures reported by a remote save store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The session is no longer valid; the user must authenticate again.
    #[error("remote store rejected the session")]
    Unauthorized,
    /// The store refused the payload as structurally invalid (HTTP 400).
    #[error("remote store rejected the payload: {0}")]
    Rejected(String),
    /// Network failure, timeout or server error. Retryable.
    #[error("remote store unavailable: {0}")]
    Transient(String),
    /// The store answered with a body that could not be decoded.
    #[error("remote store returned a malformed response: {0}")]
    Malformed(String),
}

impl StoreError {
    /// Whether retrying later could succeed without user intervention.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Malformed(_))
    }
}

/// Reasons startup reconciliation cannot produce a canonical state.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReconcileError {
    /// The remote store reported an invalid session. Not a data problem.
    #[error("session expired; re-authentication required")]
    ReauthRequired,
    /// The remote store could not be reached. Play must stay blocked (or
    /// read-only) until a retry succeeds; the local snapshot, if any, is
    /// offered for display only.
    #[error("remote save unavailable: {reason}")]
    RemoteUnavailable {
        reason: String,
        local_preview: Option<Box<GameState>>,
    },
}

impl ReconcileError {
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RemoteUnavailable { .. })
    }
}

/// Non-fatal errors surfaced by explicit save operations. The local cache has
/// already been written when one of these is returned, so no progress is lost.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SyncError {
    #[error("session expired; re-authentication required")]
    ReauthRequired,
    #[error("remote save failed: {0}")]
    RemoteFailed(String),
    #[error("refusing to persist an invalid snapshot: {0}")]
    Invalid(#[from] ValidationError),
    #[error("session has not been reconciled yet")]
    NotReady,
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unauthorized => Self::ReauthRequired,
            other => Self::RemoteFailed(other.to_string()),
        }
    }
}
