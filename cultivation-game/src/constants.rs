//! Centralized balance and tuning constants for the cultivation economy.
//!
//! These values define the deterministic math for progression, costs and
//! save cadence. Keeping them together ensures that the economy can only be
//! adjusted via code changes reviewed in version control.

// Multiplier curve ----------------------------------------------------------
pub(crate) const REALM_MULTIPLIER_BASE: f64 = 1.9;
pub(crate) const STAGE_MULTIPLIER_BASE: f64 = 1.5;
/// Multipliers above this value are rounded to whole numbers.
pub(crate) const MULTIPLIER_ROUNDING_THRESHOLD: f64 = 1_000.0;

// Breakthrough requirement --------------------------------------------------
pub(crate) const REQUIRED_QI_BASE: f64 = 100_000.0;
pub(crate) const REQUIRED_QI_GROWTH: f64 = 2.5;

// Generator pricing ---------------------------------------------------------
/// Single growth constant applied to every generator purchase.
pub const GENERATOR_COST_GROWTH: f64 = 1.15;
/// A locked generator is revealed once its cost is within this factor of held qi.
pub(crate) const GENERATOR_REVEAL_FACTOR: f64 = 5.0;

// Faction modifiers ---------------------------------------------------------
pub(crate) const FACTION_CLICK_BONUS: f64 = 1.1;
pub(crate) const FACTION_BREAKTHROUGH_DISCOUNT: f64 = 0.9;

// Click power ---------------------------------------------------------------
pub(crate) const BASE_CLICK_POWER: f64 = 1.0;

// Persistence ---------------------------------------------------------------
/// Key under which the local cache stores the serialized snapshot.
pub const LOCAL_SAVE_KEY: &str = "cultivation_save";
pub(crate) const DEFAULT_LOCAL_INTERVAL_MS: u64 = 5_000;
pub(crate) const DEFAULT_REMOTE_INTERVAL_MS: u64 = 60_000;
pub(crate) const DEFAULT_LOGOUT_GRACE_MS: u64 = 1_500;

// Logging keys --------------------------------------------------------------
pub(crate) const LOG_TARGET_RECONCILE: &str = "cultivation::reconcile";
pub(crate) const LOG_TARGET_SAVE: &str = "cultivation::save";
