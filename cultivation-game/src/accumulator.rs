//! Resource accumulator: clicks, generator purchases and passive production.
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{BASE_CLICK_POWER, FACTION_CLICK_BONUS, GENERATOR_REVEAL_FACTOR};
use crate::generators::{GENERATORS, generator_by_key};
use crate::numbers::u64_to_f64;
use crate::progression::generator_cost;
use crate::state::GameState;

fn faction_bonus(state: &GameState) -> f64 {
    match state.faction {
        Some(faction) if faction.boosts_clicks() => FACTION_CLICK_BONUS,
        _ => 1.0,
    }
}

/// Qi granted by a single click.
#[must_use]
pub fn click_power(state: &GameState) -> f64 {
    let flat: f64 = GENERATORS
        .iter()
        .map(|generator| u64_to_f64(state.generator_count(generator.key)) * generator.click_bonus)
        .sum();
    (BASE_CLICK_POWER + flat) * state.realm.multiplier * faction_bonus(state)
}

/// Credit one click to both current and lifetime qi.
pub fn apply_click(state: &mut GameState) -> f64 {
    let gained = click_power(state);
    credit(state, gained);
    gained
}

/// Passive qi produced per second by owned generators.
#[must_use]
pub fn passive_rate(state: &GameState) -> f64 {
    let base: f64 = GENERATORS
        .iter()
        .map(|generator| {
            u64_to_f64(state.generator_count(generator.key)) * generator.base_production
        })
        .sum();
    base * state.realm.multiplier * faction_bonus(state)
}

/// Credit passive production for the wall-clock time elapsed since the last
/// credit. Callers measure `elapsed` from a monotonic clock, so suspended or
/// throttled timers neither lose nor duplicate production.
pub fn apply_elapsed(state: &mut GameState, elapsed: Duration) -> f64 {
    let gained = passive_rate(state) * elapsed.as_secs_f64();
    if gained > 0.0 {
        credit(state, gained);
    }
    gained
}

fn credit(state: &mut GameState, amount: f64) {
    if !amount.is_finite() || amount <= 0.0 {
        return;
    }
    state.resources.qi += amount;
    state.resources.total_qi += amount;
}

/// Result of a generator purchase attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PurchaseOutcome {
    Bought { key: String, owned: u64, cost: u64 },
    InsufficientQi { key: String, cost: u64, available: f64 },
    UnknownGenerator { key: String },
}

/// Buy one unit of `key` if affordable. Spending reduces qi only.
pub fn purchase_generator(state: &mut GameState, key: &str) -> PurchaseOutcome {
    let Some(definition) = generator_by_key(key) else {
        return PurchaseOutcome::UnknownGenerator {
            key: key.to_string(),
        };
    };
    let owned = state.generator_count(key);
    let cost = generator_cost(definition.base_cost, owned);
    let available = state.resources.qi;
    if available < u64_to_f64(cost) {
        return PurchaseOutcome::InsufficientQi {
            key: key.to_string(),
            cost,
            available,
        };
    }
    state.resources.qi = (available - u64_to_f64(cost)).max(0.0);
    state.generators.insert(definition.key.to_string(), owned + 1);
    PurchaseOutcome::Bought {
        key: definition.key.to_string(),
        owned: owned + 1,
        cost,
    }
}

/// Cost of the next unit of `key`, if the key is in the catalog.
#[must_use]
pub fn next_generator_cost(state: &GameState, key: &str) -> Option<u64> {
    generator_by_key(key)
        .map(|definition| generator_cost(definition.base_cost, state.generator_count(key)))
}

/// Whether the catalog entry at `index` should be revealed to the player: it is
/// owned, the previous entry is owned, or it is nearly affordable.
#[must_use]
pub fn is_generator_visible(state: &GameState, index: usize) -> bool {
    let Some(definition) = GENERATORS.get(index) else {
        return false;
    };
    let owned = state.generator_count(definition.key);
    if owned > 0 {
        return true;
    }
    let previous_owned = index
        .checked_sub(1)
        .and_then(|prev| GENERATORS.get(prev))
        .is_none_or(|prev| state.generator_count(prev.key) > 0);
    let cost = u64_to_f64(generator_cost(definition.base_cost, owned));
    previous_owned || cost <= state.resources.qi * GENERATOR_REVEAL_FACTOR
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realms::realm_by_id;
    use crate::state::{Faction, RealmState};

    #[test]
    fn fresh_click_grants_one() {
        let mut state = GameState::default();
        assert!((apply_click(&mut state) - 1.0).abs() < f64::EPSILON);
        assert!((state.resources.qi - 1.0).abs() < f64::EPSILON);
        assert!((state.resources.total_qi - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn click_power_stacks_generators_multiplier_and_faction() {
        let mut state = GameState::default();
        state.generators.insert("meditation_mat".into(), 2);
        state.generators.insert("spirit_well".into(), 1);
        state.realm = RealmState::at(realm_by_id(1).unwrap(), 2);
        // (1 + 2*1 + 1*8) * 1.5 = 16.5
        assert!((click_power(&state) - 16.5).abs() < 1e-9);
        state.faction = Some(Faction::Righteous);
        assert!((click_power(&state) - 18.15).abs() < 1e-9);
        state.faction = Some(Faction::Heavenly);
        assert!((click_power(&state) - 16.5).abs() < 1e-9);
    }

    #[test]
    fn purchase_spends_qi_but_not_lifetime() {
        let mut state = GameState::default();
        state.resources.qi = 20.0;
        state.resources.total_qi = 20.0;
        let outcome = purchase_generator(&mut state, "meditation_mat");
        assert_eq!(
            outcome,
            PurchaseOutcome::Bought {
                key: "meditation_mat".into(),
                owned: 1,
                cost: 15
            }
        );
        assert!((state.resources.qi - 5.0).abs() < f64::EPSILON);
        assert!((state.resources.total_qi - 20.0).abs() < f64::EPSILON);
        assert_eq!(next_generator_cost(&state, "meditation_mat"), Some(17));
    }

    #[test]
    fn unaffordable_or_unknown_purchase_is_a_no_op() {
        let mut state = GameState::default();
        state.resources.qi = 14.0;
        let before = state.clone();
        assert!(matches!(
            purchase_generator(&mut state, "meditation_mat"),
            PurchaseOutcome::InsufficientQi { cost: 15, .. }
        ));
        assert!(matches!(
            purchase_generator(&mut state, "jade_furnace"),
            PurchaseOutcome::UnknownGenerator { .. }
        ));
        assert_eq!(state, before);
    }

    #[test]
    fn passive_production_scales_with_elapsed_time() {
        let mut state = GameState::default();
        state.generators.insert("spirit_well".into(), 2);
        let one_second = apply_elapsed(&mut state.clone(), Duration::from_secs(1));
        let gained = apply_elapsed(&mut state, Duration::from_secs(90));
        assert!((one_second - 2.0).abs() < 1e-9);
        assert!((gained - 180.0).abs() < 1e-9);
        assert!((state.resources.total_qi - 180.0).abs() < 1e-9);
    }

    #[test]
    fn idle_without_generators_produces_nothing() {
        let mut state = GameState::default();
        assert!(apply_elapsed(&mut state, Duration::from_secs(3_600)).abs() < f64::EPSILON);
        assert!(state.is_mostly_empty());
    }

    #[test]
    fn generator_visibility_follows_discovery_rules() {
        let mut state = GameState::default();
        assert!(is_generator_visible(&state, 0));
        assert!(!is_generator_visible(&state, 1));
        state.resources.qi = 20.0;
        assert!(is_generator_visible(&state, 1));
        state.resources.qi = 0.0;
        state.generators.insert("meditation_mat".into(), 1);
        assert!(is_generator_visible(&state, 1));
        assert!(!is_generator_visible(&state, 9));
    }
}
