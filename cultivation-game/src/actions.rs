//! Pure reducer over [`GameState`]. Every user or timer action goes through
//! [`reduce`]; persistence is driven separately by observing its output.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::accumulator::{PurchaseOutcome, apply_click, apply_elapsed, purchase_generator};
use crate::progression::{BreakthroughOutcome, breakthrough};
use crate::state::{Faction, GameState, Theme};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameAction {
    Click,
    Purchase(String),
    Breakthrough,
    SelectFaction(Faction),
    SetTheme(Theme),
    GrantUpgrade(String),
    UnlockAchievement(String),
    /// Passive production for time measured on a monotonic clock.
    Produce { elapsed: Duration },
    /// Wipe all progress. The caller must overwrite both stores.
    HardReset,
}

/// What happened, for notification surfaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActionEvent {
    Clicked { gained: f64 },
    Purchase(PurchaseOutcome),
    Breakthrough(BreakthroughOutcome),
    FactionChosen(Faction),
    /// A faction was already chosen; the choice is permanent.
    FactionLocked(Faction),
    ThemeChanged(Theme),
    Unlocked { id: String, newly: bool },
    Produced { gained: f64 },
    Reset,
}

impl ActionEvent {
    /// Whether the event left the state untouched.
    #[must_use]
    pub const fn is_no_op(&self) -> bool {
        match self {
            Self::Purchase(outcome) => !matches!(outcome, PurchaseOutcome::Bought { .. }),
            Self::Breakthrough(outcome) => !outcome.advanced(),
            Self::FactionLocked(_) => true,
            Self::Unlocked { newly, .. } => !*newly,
            _ => false,
        }
    }
}

/// Result of reducing one action.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: GameState,
    pub event: ActionEvent,
}

/// Apply `action` to `state`, returning the next state and an event describing
/// the outcome. Never fails; rejected actions return the state unchanged.
#[must_use]
pub fn reduce(state: &GameState, action: &GameAction) -> Transition {
    let mut next = state.clone();
    let event = match action {
        GameAction::Click => ActionEvent::Clicked {
            gained: apply_click(&mut next),
        },
        GameAction::Purchase(key) => ActionEvent::Purchase(purchase_generator(&mut next, key)),
        GameAction::Breakthrough => ActionEvent::Breakthrough(breakthrough(&mut next)),
        GameAction::SelectFaction(faction) => match next.faction {
            Some(existing) => ActionEvent::FactionLocked(existing),
            None => {
                next.faction = Some(*faction);
                ActionEvent::FactionChosen(*faction)
            }
        },
        GameAction::SetTheme(theme) => {
            next.settings.theme = *theme;
            ActionEvent::ThemeChanged(*theme)
        }
        GameAction::GrantUpgrade(id) => ActionEvent::Unlocked {
            id: id.clone(),
            newly: next.upgrades.insert(id.clone()),
        },
        GameAction::UnlockAchievement(id) => ActionEvent::Unlocked {
            id: id.clone(),
            newly: next.achievements.insert(id.clone()),
        },
        GameAction::Produce { elapsed } => ActionEvent::Produced {
            gained: apply_elapsed(&mut next, *elapsed),
        },
        GameAction::HardReset => {
            next = GameState {
                last_save_time: state.last_save_time,
                ..GameState::default()
            };
            ActionEvent::Reset
        }
    };
    Transition { state: next, event }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn click_then_purchase() {
        let mut state = GameState::default();
        for _ in 0..15 {
            state = reduce(&state, &GameAction::Click).state;
        }
        let transition = reduce(&state, &GameAction::Purchase("meditation_mat".into()));
        assert!(!transition.event.is_no_op());
        assert_eq!(transition.state.generator_count("meditation_mat"), 1);
        assert!(transition.state.resources.qi.abs() < f64::EPSILON);
        assert!((transition.state.resources.total_qi - 15.0).abs() < f64::EPSILON);
    }

    #[test]
    fn faction_choice_is_permanent() {
        let state = GameState::default();
        let chosen = reduce(&state, &GameAction::SelectFaction(Faction::Demonic)).state;
        let again = reduce(&chosen, &GameAction::SelectFaction(Faction::Heavenly));
        assert_eq!(again.event, ActionEvent::FactionLocked(Faction::Demonic));
        assert!(again.event.is_no_op());
        assert_eq!(again.state, chosen);
    }

    #[test]
    fn unlocks_are_set_semantics() {
        let state = GameState::default();
        let first = reduce(&state, &GameAction::GrantUpgrade("jade_slip".into()));
        assert!(!first.event.is_no_op());
        let second = reduce(&first.state, &GameAction::GrantUpgrade("jade_slip".into()));
        assert!(second.event.is_no_op());
        assert_eq!(second.state.upgrades.len(), 1);
    }

    #[test]
    fn insufficient_breakthrough_is_reported() {
        let state = GameState::default();
        let transition = reduce(&state, &GameAction::Breakthrough);
        assert!(matches!(
            transition.event,
            ActionEvent::Breakthrough(BreakthroughOutcome::InsufficientQi { .. })
        ));
        assert_eq!(transition.state, state);
    }

    #[test]
    fn hard_reset_clears_progress() {
        let mut state = GameState::default();
        state.resources.qi = 500.0;
        state.resources.total_qi = 900.0;
        state.faction = Some(Faction::Heavenly);
        state.generators.insert("spirit_well".into(), 3);
        state.last_save_time = 77;
        let transition = reduce(&state, &GameAction::HardReset);
        assert_eq!(transition.event, ActionEvent::Reset);
        assert!(transition.state.is_mostly_empty());
        assert!(transition.state.faction.is_none());
        assert_eq!(transition.state.last_save_time, 77);
    }
}
