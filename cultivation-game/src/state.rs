use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::generators::{GENERATORS, is_known_generator};
use crate::progression::multiplier;
use crate::realms::{FIRST_REALM_ID, RealmDefinition, realm_by_id};

/// Sect alignment chosen once per save. The choice is permanent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Faction {
    Righteous,
    Demonic,
    Heavenly,
}

impl Faction {
    pub const ALL: [Self; 3] = [Self::Righteous, Self::Demonic, Self::Heavenly];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Righteous => "righteous",
            Self::Demonic => "demonic",
            Self::Heavenly => "heavenly",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Righteous => "Righteous Sect",
            Self::Demonic => "Demonic Path",
            Self::Heavenly => "Heavenly Dao",
        }
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Righteous | Self::Demonic => "+10% Click Power",
            Self::Heavenly => "-10% Realm Breakthrough Cost",
        }
    }

    /// Factions that boost click power.
    #[must_use]
    pub const fn boosts_clicks(self) -> bool {
        matches!(self, Self::Righteous | Self::Demonic)
    }

    /// The faction that discounts breakthrough requirements.
    #[must_use]
    pub const fn discounts_breakthrough(self) -> bool {
        matches!(self, Self::Heavenly)
    }
}

impl fmt::Display for Faction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Faction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "righteous" => Ok(Self::Righteous),
            "demonic" => Ok(Self::Demonic),
            "heavenly" => Ok(Self::Heavenly),
            other => Err(ValidationError::UnknownFaction(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

impl Theme {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            other => Err(ValidationError::UnknownTheme(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Resources {
    pub qi: f64,
    /// Lifetime qi. Spending never reduces it.
    pub total_qi: f64,
    #[serde(default)]
    pub ascension_points: f64,
}

/// Current position on the ladder plus display fields cached from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealmState {
    pub id: u32,
    pub stage: u32,
    pub name: String,
    pub world: String,
    pub multiplier: f64,
}

impl RealmState {
    /// Build the cached realm fields for a ladder position.
    #[must_use]
    pub fn at(definition: &RealmDefinition, stage: u32) -> Self {
        Self {
            id: definition.id,
            stage,
            name: definition.name.to_string(),
            world: definition.world.to_string(),
            multiplier: multiplier(definition.id, stage, definition.world_index),
        }
    }
}

impl Default for RealmState {
    fn default() -> Self {
        realm_by_id(FIRST_REALM_ID).map_or_else(
            || Self {
                id: FIRST_REALM_ID,
                stage: 1,
                name: String::new(),
                world: String::new(),
                multiplier: 1.0,
            },
            |definition| Self::at(definition, 1),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub theme: Theme,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    /// Cached click power, refreshed on every critical save.
    pub qi_per_tap: f64,
}

impl Default for Stats {
    fn default() -> Self {
        Self { qi_per_tap: 1.0 }
    }
}

/// The single persisted aggregate. Both stores hold exactly this JSON shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub resources: Resources,
    pub generators: BTreeMap<String, u64>,
    pub realm: RealmState,
    pub faction: Option<Faction>,
    pub upgrades: BTreeSet<String>,
    pub achievements: BTreeSet<String>,
    pub settings: Settings,
    #[serde(default)]
    pub stats: Stats,
    /// Milliseconds since the Unix epoch; the only conflict-resolution signal.
    pub last_save_time: u64,
}

impl Default for GameState {
    /// The fresh-game state. Every catalog generator is present at zero.
    fn default() -> Self {
        Self {
            resources: Resources::default(),
            generators: GENERATORS
                .iter()
                .map(|generator| (generator.key.to_string(), 0))
                .collect(),
            realm: RealmState::default(),
            faction: None,
            upgrades: BTreeSet::new(),
            achievements: BTreeSet::new(),
            settings: Settings::default(),
            stats: Stats::default(),
            last_save_time: 0,
        }
    }
}

impl GameState {
    /// Owned count for a generator key; absent keys count as zero.
    #[must_use]
    pub fn generator_count(&self, key: &str) -> u64 {
        self.generators.get(key).copied().unwrap_or(0)
    }

    /// Catalog entry for the current realm.
    #[must_use]
    pub fn realm_definition(&self) -> Option<&'static RealmDefinition> {
        realm_by_id(self.realm.id)
    }

    /// Nothing worth protecting: no generators, floor realm, no lifetime qi.
    #[must_use]
    pub fn is_mostly_empty(&self) -> bool {
        self.generators.values().all(|count| *count == 0)
            && self.realm.id == FIRST_REALM_ID
            && self.realm.stage == 1
            && self.resources.total_qi <= 0.0
    }

    /// Copy of this state stamped with a new save time.
    #[must_use]
    pub fn stamped(&self, last_save_time: u64) -> Self {
        Self {
            last_save_time,
            ..self.clone()
        }
    }

    /// Check the structural invariants a persisted snapshot must satisfy.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let definition = self
            .realm_definition()
            .ok_or(ValidationError::UnknownRealm { id: self.realm.id })?;
        if !(1..=definition.stages).contains(&self.realm.stage) {
            return Err(ValidationError::StageOutOfRange {
                id: self.realm.id,
                stage: self.realm.stage,
                max: definition.stages,
            });
        }
        for (field, value) in [
            ("qi", self.resources.qi),
            ("totalQi", self.resources.total_qi),
            ("ascensionPoints", self.resources.ascension_points),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ValidationError::Resource { field, value });
            }
        }
        if let Some(key) = self.generators.keys().find(|key| !is_known_generator(key)) {
            return Err(ValidationError::UnknownGenerator(key.clone()));
        }
        Ok(())
    }
}
