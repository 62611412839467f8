//! State sanitizer: turns a loaded snapshot (current or legacy shape) into a
//! structurally valid [`GameState`].
//!
//! The raw save structs below are deliberately lenient so that older saves can
//! still be read. Normalisation rules:
//!
//! * a snapshot whose realm has no numeric id is a legacy save; progress is
//!   discarded and only the settings survive,
//! * generator keys outside the catalog are dropped and missing keys are zero,
//! * the cached realm fields and `stats.qiPerTap` are recomputed,
//! * anything else out of range is a [`ValidationError`].

use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::accumulator::click_power;
use crate::error::ValidationError;
use crate::generators::{GENERATORS, is_known_generator};
use crate::numbers::{floor_f64_to_u64, whole_count};
use crate::realms::realm_by_id;
use crate::state::{Faction, GameState, RealmState, Resources, Settings, Stats, Theme};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSave {
    #[serde(default)]
    resources: Option<RawResources>,
    #[serde(default)]
    generators: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    realm: Option<RawRealm>,
    #[serde(default)]
    faction: Option<String>,
    #[serde(default)]
    upgrades: Vec<String>,
    #[serde(default)]
    achievements: Vec<String>,
    #[serde(default)]
    settings: Option<RawSettings>,
    #[serde(default)]
    last_save_time: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawResources {
    qi: f64,
    total_qi: f64,
    #[serde(default)]
    ascension_points: f64,
}

/// Early saves stored the realm as `{ name, level }` without an id.
#[derive(Debug, Deserialize)]
struct RawRealm {
    #[serde(default)]
    id: Option<u32>,
    #[serde(default)]
    stage: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawSettings {
    #[serde(default)]
    theme: Option<String>,
}

/// Whether the snapshot was already current or had to be migrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotShape {
    Current,
    /// Pre-catalog save; progress was reset and only settings were kept.
    Legacy,
}

/// Outcome of sanitizing a raw snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Sanitized {
    pub state: GameState,
    pub shape: SnapshotShape,
    /// Generator keys dropped because they are no longer in the catalog.
    pub dropped_generators: Vec<String>,
}

/// Parse and sanitize a serialized snapshot from either store.
///
/// # Errors
///
/// Returns [`ValidationError`] when the text is not JSON, has the wrong shape,
/// or carries out-of-range values that the normalisation rules do not cover.
pub fn sanitize_json(raw: &str) -> Result<Sanitized, ValidationError> {
    let save: RawSave = serde_json::from_str(raw)?;
    sanitize_raw(save)
}

/// Sanitize an already-typed state, for example one built in memory or
/// received from a transport that decoded it eagerly.
///
/// # Errors
///
/// Returns [`ValidationError`] if the state violates a structural invariant.
pub fn sanitize_state(state: &GameState) -> Result<GameState, ValidationError> {
    let value = serde_json::to_value(state)?;
    let save: RawSave = serde_json::from_value(value)?;
    sanitize_raw(save).map(|sanitized| sanitized.state)
}

fn sanitize_raw(save: RawSave) -> Result<Sanitized, ValidationError> {
    let settings = parse_settings(save.settings.as_ref())?;
    let last_save_time = parse_timestamp(save.last_save_time)?;

    let Some((realm_id, stage)) = save
        .realm
        .as_ref()
        .and_then(|realm| realm.id.filter(|id| *id > 0).map(|id| (id, realm.stage)))
    else {
        log::info!("legacy snapshot detected; resetting progress and keeping settings");
        return Ok(Sanitized {
            state: GameState {
                settings,
                last_save_time,
                ..GameState::default()
            },
            shape: SnapshotShape::Legacy,
            dropped_generators: Vec::new(),
        });
    };

    let definition = realm_by_id(realm_id).ok_or(ValidationError::UnknownRealm { id: realm_id })?;
    let stage = stage.ok_or(ValidationError::Shape {
        field: "realm.stage",
    })?;

    let raw_resources = save.resources.ok_or(ValidationError::Shape { field: "resources" })?;
    let resources = Resources {
        qi: raw_resources.qi,
        total_qi: raw_resources.total_qi,
        ascension_points: raw_resources.ascension_points,
    };

    let (generators, dropped_generators) = clean_generators(save.generators)?;

    let faction = save
        .faction
        .as_deref()
        .map(str::parse::<Faction>)
        .transpose()?;

    let mut state = GameState {
        resources,
        generators,
        realm: RealmState::at(definition, stage),
        faction,
        upgrades: save.upgrades.into_iter().collect::<BTreeSet<_>>(),
        achievements: save.achievements.into_iter().collect::<BTreeSet<_>>(),
        settings,
        stats: Stats::default(),
        last_save_time,
    };
    state.validate()?;
    state.stats.qi_per_tap = click_power(&state);

    if !dropped_generators.is_empty() {
        log::debug!("dropped unknown generators: {}", dropped_generators.join(", "));
    }
    Ok(Sanitized {
        state,
        shape: SnapshotShape::Current,
        dropped_generators,
    })
}

type CleanGenerators = (BTreeMap<String, u64>, Vec<String>);

fn clean_generators(
    raw: BTreeMap<String, serde_json::Value>,
) -> Result<CleanGenerators, ValidationError> {
    let mut counts: BTreeMap<String, u64> = GENERATORS
        .iter()
        .map(|generator| (generator.key.to_string(), 0))
        .collect();
    let mut dropped = Vec::new();
    for (key, value) in raw {
        if !is_known_generator(&key) {
            dropped.push(key);
            continue;
        }
        if value.is_null() {
            continue;
        }
        let number = value.as_f64().ok_or_else(|| ValidationError::GeneratorCount {
            key: key.clone(),
            value: f64::NAN,
        })?;
        let count = whole_count(number).ok_or(ValidationError::GeneratorCount {
            key: key.clone(),
            value: number,
        })?;
        counts.insert(key, count);
    }
    Ok((counts, dropped))
}

fn parse_settings(raw: Option<&RawSettings>) -> Result<Settings, ValidationError> {
    let theme = raw
        .and_then(|settings| settings.theme.as_deref())
        .map(str::parse::<Theme>)
        .transpose()?
        .unwrap_or_default();
    Ok(Settings { theme })
}

fn parse_timestamp(raw: Option<f64>) -> Result<u64, ValidationError> {
    match raw {
        None => Ok(0),
        Some(value) if value.is_finite() && value >= 0.0 => Ok(floor_f64_to_u64(value)),
        Some(_) => Err(ValidationError::Shape {
            field: "lastSaveTime",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn current_save() -> serde_json::Value {
        json!({
            "resources": { "qi": 120.5, "totalQi": 900.0, "ascensionPoints": 0 },
            "generators": { "meditation_mat": 3, "spirit_well": 1 },
            "realm": { "id": 2, "stage": 2, "name": "stale", "world": "stale", "multiplier": 999 },
            "faction": "righteous",
            "upgrades": ["a", "a", "b"],
            "achievements": [],
            "settings": { "theme": "light" },
            "stats": { "qiPerTap": 0 },
            "lastSaveTime": 1_700_000_000_000_u64
        })
    }

    #[test]
    fn recomputes_cached_realm_fields_and_stats() {
        let sanitized = sanitize_json(&current_save().to_string()).unwrap();
        let state = sanitized.state;
        assert_eq!(sanitized.shape, SnapshotShape::Current);
        assert_eq!(state.realm.name, "Foundation Establishment");
        assert_eq!(state.realm.world, "Mortal World");
        assert!((state.realm.multiplier - 2.85).abs() < 1e-9);
        assert!((state.stats.qi_per_tap - click_power(&state)).abs() < f64::EPSILON);
        assert_eq!(state.upgrades.len(), 2);
        assert_eq!(state.settings.theme, Theme::Light);
        assert_eq!(state.last_save_time, 1_700_000_000_000);
    }

    #[test]
    fn drops_orphaned_generators_and_fills_missing() {
        let mut save = current_save();
        save["generators"] = json!({ "jade_furnace": 4, "spirit_well": 2 });
        let sanitized = sanitize_json(&save.to_string()).unwrap();
        assert_eq!(sanitized.dropped_generators, vec!["jade_furnace".to_string()]);
        assert_eq!(sanitized.state.generator_count("meditation_mat"), 0);
        assert_eq!(sanitized.state.generator_count("spirit_well"), 2);
        assert!(!sanitized.state.generators.contains_key("jade_furnace"));
    }

    #[test]
    fn legacy_realm_resets_progress_but_keeps_settings() {
        let legacy = json!({
            "resources": { "qi": 5_000, "totalQi": 5_000 },
            "realm": { "name": "Qi Condensation", "level": 4 },
            "settings": { "theme": "light" },
            "lastSaveTime": 55
        });
        let sanitized = sanitize_json(&legacy.to_string()).unwrap();
        assert_eq!(sanitized.shape, SnapshotShape::Legacy);
        assert!(sanitized.state.is_mostly_empty());
        assert_eq!(sanitized.state.settings.theme, Theme::Light);
        assert_eq!(sanitized.state.last_save_time, 55);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut save = current_save();
        save["realm"]["stage"] = json!(12);
        assert!(matches!(
            sanitize_json(&save.to_string()),
            Err(ValidationError::StageOutOfRange { .. })
        ));

        let mut save = current_save();
        save["realm"]["id"] = json!(99);
        assert_eq!(
            sanitize_json(&save.to_string()),
            Err(ValidationError::UnknownRealm { id: 99 })
        );

        let mut save = current_save();
        save["resources"]["qi"] = json!(-1.0);
        assert!(matches!(
            sanitize_json(&save.to_string()),
            Err(ValidationError::Resource { field: "qi", .. })
        ));

        let mut save = current_save();
        save["generators"]["spirit_well"] = json!(1.5);
        assert!(matches!(
            sanitize_json(&save.to_string()),
            Err(ValidationError::GeneratorCount { .. })
        ));

        let mut save = current_save();
        save["faction"] = json!("neutral");
        assert!(matches!(
            sanitize_json(&save.to_string()),
            Err(ValidationError::UnknownFaction(_))
        ));
    }

    #[test]
    fn rejects_non_json() {
        assert!(matches!(
            sanitize_json("{not json"),
            Err(ValidationError::Json(_))
        ));
    }

    #[test]
    fn sanitizing_a_clean_state_is_stable() {
        let mut state = GameState::default();
        state.generators.insert("spirit_well".into(), 2);
        state.stats.qi_per_tap = click_power(&state);
        let once = sanitize_state(&state).unwrap();
        let twice = sanitize_state(&once).unwrap();
        assert_eq!(once, twice);
        assert_eq!(once, state);
    }
}
