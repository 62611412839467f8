//! Static realm catalog: the two-level progression ladder grouped into worlds.

use serde::Serialize;

/// A single major realm. Catalog entries are ordered by ascending id and
/// grouped contiguously by world index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RealmDefinition {
    pub id: u32,
    pub name: &'static str,
    pub world: &'static str,
    pub world_index: u32,
    pub stages: u32,
    pub description: &'static str,
}

/// World display names, indexed by `world_index`.
pub const WORLDS: [&str; 7] = [
    "Mortal World",
    "Upper World",
    "Deity Realm",
    "Zenith Realm",
    "Sage Realms",
    "Primordial Chaos Realms",
    "Supreme Realms",
];

const fn realm(
    id: u32,
    name: &'static str,
    world_index: u32,
    stages: u32,
    description: &'static str,
) -> RealmDefinition {
    RealmDefinition {
        id,
        name,
        world: WORLDS[world_index as usize],
        world_index,
        stages,
        description,
    }
}

pub const REALMS: [RealmDefinition; 34] = [
    realm(1, "Qi Refinement", 0, 9, "Refining qi into the body."),
    realm(2, "Foundation Establishment", 0, 9, "Building the dao foundation."),
    realm(3, "Golden Core", 0, 9, "Condensing a core of power."),
    realm(4, "Nascent Soul", 0, 9, "Birthing the spiritual self."),
    realm(5, "Soul Formation", 0, 9, "Expanding the soul's domain."),
    realm(6, "Void Amalgamation", 0, 9, "Merging with the void."),
    realm(7, "Body Integration", 0, 9, "Fusing body and spirit."),
    realm(8, "Tribulation Transcendence", 0, 9, "Facing heavenly lightning."),
    realm(9, "Mahayana", 0, 9, "The great vehicle of ascension."),
    realm(10, "Loose Immortal", 1, 4, "Shedding the mortal coil."),
    realm(11, "Earth Immortal", 1, 4, "Rooted in the immortal earth."),
    realm(12, "Earth Immortal of Grand Unity", 1, 4, "One with the earth."),
    realm(13, "Heaven Immortal", 1, 4, "Ascending to the heavens."),
    realm(14, "Heaven Immortal of Grand Unity", 1, 4, "One with the heavens."),
    realm(15, "True Immortal", 1, 4, "Understanding the true self."),
    realm(16, "True Immortal of Grand Unity", 1, 4, "True unity achieved."),
    realm(17, "Mystic Immortal", 1, 4, "Grasping mystic arts."),
    realm(18, "Mystic Immortal of Grand Unity", 1, 4, "Mastery of mystic unity."),
    realm(19, "Golden Immortal", 1, 4, "Indestructible golden body."),
    realm(20, "Golden Immortal of Grand Unity", 1, 4, "Supreme golden unity."),
    realm(21, "Immortal Emperor", 1, 9, "Ruler of immortals."),
    realm(22, "Providence Immortal Emperor", 1, 3, "Governing fate."),
    realm(23, "Great Dao Immortal Emperor", 1, 3, "Touching the Great Dao."),
    realm(24, "Perfect Immortal Emperor", 1, 3, "Perfection achieved."),
    realm(25, "Mystic Divine Origin", 2, 6, "Origin of divinity."),
    realm(26, "Zenith Heaven", 3, 4, "Peak of the heavens."),
    realm(27, "Quasi-Sage", 4, 3, "Approaching sagehood."),
    realm(28, "Heavenly Dao Sage", 4, 4, "Sage of the Heavenly Dao."),
    realm(29, "Freedom Primordial Chaos", 5, 3, "Chaos unbound."),
    realm(30, "Great Dao Primordial Chaos", 5, 4, "Order within chaos."),
    realm(31, "Great Dao Supreme", 6, 3, "Supreme among the Dao."),
    realm(32, "Dao Creator", 6, 3, "Creator of Daos."),
    realm(33, "Creator Lord", 6, 3, "Lord of Creation."),
    realm(34, "Final Ultimate Supreme", 6, 3, "The Absolute End."),
];

/// Lowest realm id in the catalog.
pub const FIRST_REALM_ID: u32 = 1;

/// Look up a realm by id.
#[must_use]
pub fn realm_by_id(id: u32) -> Option<&'static RealmDefinition> {
    REALMS.iter().find(|realm| realm.id == id)
}

/// The realm following `id`, if the catalog has one.
#[must_use]
pub fn next_realm(id: u32) -> Option<&'static RealmDefinition> {
    realm_by_id(id.checked_add(1)?)
}

/// World index for a realm id; unknown ids fall back to the first world.
#[must_use]
pub fn world_index(id: u32) -> u32 {
    realm_by_id(id).map_or(0, |realm| realm.world_index)
}

/// Number of stages in a realm; unknown ids have none.
#[must_use]
pub fn stages_of(id: u32) -> u32 {
    realm_by_id(id).map_or(0, |realm| realm.stages)
}

/// Whether `(id, stage)` names a position on the ladder.
#[must_use]
pub fn is_valid_position(id: u32, stage: u32) -> bool {
    realm_by_id(id).is_some_and(|realm| (1..=realm.stages).contains(&stage))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_is_sorted_and_contiguous() {
        for (idx, realm) in REALMS.iter().enumerate() {
            assert_eq!(realm.id as usize, idx + 1);
            assert!(realm.stages >= 1);
        }
        for pair in REALMS.windows(2) {
            assert!(pair[1].world_index >= pair[0].world_index);
            assert!(pair[1].world_index - pair[0].world_index <= 1);
        }
    }

    #[test]
    fn world_names_match_index() {
        for realm in &REALMS {
            assert_eq!(realm.world, WORLDS[realm.world_index as usize]);
        }
    }

    #[test]
    fn lookups_cover_edges() {
        assert_eq!(realm_by_id(1).map(|r| r.name), Some("Qi Refinement"));
        assert!(realm_by_id(0).is_none());
        assert!(next_realm(34).is_none());
        assert_eq!(next_realm(9).map(|r| r.world), Some("Upper World"));
        assert_eq!(world_index(25), 2);
        assert_eq!(stages_of(21), 9);
        assert!(is_valid_position(10, 4));
        assert!(!is_valid_position(10, 5));
        assert!(!is_valid_position(35, 1));
    }
}
