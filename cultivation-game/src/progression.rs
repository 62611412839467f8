//! Progression model: pure, deterministic formulas over the realm ladder.
//!
//! Nothing here performs I/O or fails. The breakthrough transition is modelled
//! as a small state machine over `(realm_id, stage)` positions; the terminal
//! `MaxRealm` state is reached when no realm follows the current one.

use serde::{Deserialize, Serialize};

use crate::constants::{
    FACTION_BREAKTHROUGH_DISCOUNT, GENERATOR_COST_GROWTH, MULTIPLIER_ROUNDING_THRESHOLD,
    REALM_MULTIPLIER_BASE, REQUIRED_QI_BASE, REQUIRED_QI_GROWTH, STAGE_MULTIPLIER_BASE,
};
use crate::numbers::{floor_f64_to_u64, round_to_cents, u32_to_i32};
use crate::realms::{REALMS, next_realm, realm_by_id};
use crate::state::{Faction, GameState, RealmState};

/// Realm power multiplier for a ladder position.
///
/// `(1 + world_index) * 1.9^(realm_id - 1) * 1.5^(stage - 1)`, rounded to a
/// whole number above 1000 and to two decimals otherwise.
#[must_use]
pub fn multiplier(realm_id: u32, stage: u32, world_index: u32) -> f64 {
    let world_mult = 1.0 + f64::from(world_index);
    let realm_mult = REALM_MULTIPLIER_BASE.powi(u32_to_i32(realm_id.saturating_sub(1)));
    let stage_mult = STAGE_MULTIPLIER_BASE.powi(u32_to_i32(stage.saturating_sub(1)));
    let total = world_mult * realm_mult * stage_mult;
    if total > MULTIPLIER_ROUNDING_THRESHOLD {
        total.round()
    } else {
        round_to_cents(total)
    }
}

/// Cumulative stages passed before reaching `(realm_id, stage)`.
#[must_use]
pub fn total_steps(realm_id: u32, stage: u32) -> u32 {
    let completed: u32 = REALMS
        .iter()
        .filter(|realm| realm.id < realm_id)
        .map(|realm| realm.stages)
        .sum();
    completed + stage.saturating_sub(1)
}

/// Qi required to break through from `(realm_id, stage)`, before faction discount.
#[must_use]
pub fn required_qi(realm_id: u32, stage: u32) -> f64 {
    let steps = total_steps(realm_id, stage);
    (REQUIRED_QI_BASE * REQUIRED_QI_GROWTH.powi(u32_to_i32(steps))).floor()
}

/// Breakthrough requirement after applying the faction discount.
#[must_use]
pub fn discounted_requirement(realm_id: u32, stage: u32, faction: Option<Faction>) -> f64 {
    let discount = match faction {
        Some(faction) if faction.discounts_breakthrough() => FACTION_BREAKTHROUGH_DISCOUNT,
        _ => 1.0,
    };
    required_qi(realm_id, stage) * discount
}

/// Price of the next generator unit when `owned` are already held.
#[must_use]
pub fn generator_cost(base_cost: f64, owned: u64) -> u64 {
    let exponent = i32::try_from(owned).unwrap_or(i32::MAX);
    floor_f64_to_u64(base_cost * GENERATOR_COST_GROWTH.powi(exponent))
}

/// A position on the ladder, or the terminal state beyond the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LadderPosition {
    InRealm { realm_id: u32, stage: u32 },
    MaxRealm,
}

/// The position a successful breakthrough from `(realm_id, stage)` leads to.
#[must_use]
pub fn next_position(realm_id: u32, stage: u32) -> LadderPosition {
    let Some(current) = realm_by_id(realm_id) else {
        return LadderPosition::MaxRealm;
    };
    if stage < current.stages {
        return LadderPosition::InRealm {
            realm_id,
            stage: stage + 1,
        };
    }
    next_realm(realm_id).map_or(LadderPosition::MaxRealm, |next| {
        LadderPosition::InRealm {
            realm_id: next.id,
            stage: 1,
        }
    })
}

/// Result of attempting a breakthrough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BreakthroughOutcome {
    /// Advanced one stage within the same realm.
    Minor { realm_id: u32, stage: u32, multiplier: f64 },
    /// Advanced into the first stage of the next realm.
    Major { realm_id: u32, name: String, multiplier: f64 },
    /// The guard held but no higher realm exists. State is unchanged.
    MaxRealmReached,
    /// The guard failed. State is unchanged.
    InsufficientQi { required: f64, available: f64 },
}

impl BreakthroughOutcome {
    #[must_use]
    pub const fn advanced(&self) -> bool {
        matches!(self, Self::Minor { .. } | Self::Major { .. })
    }
}

/// Attempt a breakthrough, mutating `state` only on success.
///
/// The requirement is subtracted from qi and the remainder is kept. Lifetime
/// qi is untouched.
pub fn breakthrough(state: &mut GameState) -> BreakthroughOutcome {
    let realm_id = state.realm.id;
    let stage = state.realm.stage;
    let required = discounted_requirement(realm_id, stage, state.faction);
    let available = state.resources.qi;
    if available < required {
        return BreakthroughOutcome::InsufficientQi {
            required,
            available,
        };
    }

    let LadderPosition::InRealm {
        realm_id: next_id,
        stage: next_stage,
    } = next_position(realm_id, stage)
    else {
        return BreakthroughOutcome::MaxRealmReached;
    };
    let Some(definition) = realm_by_id(next_id) else {
        return BreakthroughOutcome::MaxRealmReached;
    };

    state.resources.qi = (available - required).max(0.0);
    state.realm = RealmState::at(definition, next_stage);

    if next_id > realm_id {
        BreakthroughOutcome::Major {
            realm_id: next_id,
            name: definition.name.to_string(),
            multiplier: state.realm.multiplier,
        }
    } else {
        BreakthroughOutcome::Minor {
            realm_id: next_id,
            stage: next_stage,
            multiplier: state.realm.multiplier,
        }
    }
}

/// Progress toward the next breakthrough as a ratio in `[0, 1]`.
#[must_use]
pub fn breakthrough_progress(state: &GameState) -> f64 {
    let required = discounted_requirement(state.realm.id, state.realm.stage, state.faction);
    if required <= 0.0 {
        return 1.0;
    }
    (state.resources.qi / required).clamp(0.0, 1.0)
}
