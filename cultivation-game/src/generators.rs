//! Generator catalog: purchasable units that raise click power and passive production.
use serde::Serialize;

/// Static definition of a generator type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeneratorDefinition {
    pub key: &'static str,
    pub label: &'static str,
    /// Qi cost of the first unit; later units scale by the cost growth constant.
    pub base_cost: f64,
    /// Flat click power added per owned unit, before multipliers.
    pub click_bonus: f64,
    /// Qi per second produced per owned unit, before multipliers.
    pub base_production: f64,
    pub description: &'static str,
}

pub const GENERATORS: [GeneratorDefinition; 2] = [
    GeneratorDefinition {
        key: "meditation_mat",
        label: "Meditation Mat",
        base_cost: 15.0,
        click_bonus: 1.0,
        base_production: 0.1,
        description: "A simple mat to aid focus.",
    },
    GeneratorDefinition {
        key: "spirit_well",
        label: "Spirit Well",
        base_cost: 100.0,
        click_bonus: 8.0,
        base_production: 1.0,
        description: "Draws ambient qi from the earth.",
    },
];

/// Look up a generator by key.
#[must_use]
pub fn generator_by_key(key: &str) -> Option<&'static GeneratorDefinition> {
    GENERATORS.iter().find(|generator| generator.key == key)
}

/// Whether a generator key belongs to the current catalog.
#[must_use]
pub fn is_known_generator(key: &str) -> bool {
    generator_by_key(key).is_some()
}
