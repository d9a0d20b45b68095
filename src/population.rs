//! Monsters and items as seen from the terrain engine.
//!
//! The engine never owns creatures or objects. It reads positions through the
//! [`Population`] trait and asks the game to spawn, move or remove things.
//! [`Roster`] is a plain in-memory implementation used by the CLI and tests.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::coords::WindowPos;
use crate::terrain::Feature;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MonsterId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemId(pub u32);

/// Terrain a creature can survive on
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Habitat {
    Land,
    Amphibious,
    Water,
    Lava,
    Flying,
}

impl Habitat {
    /// Whether a creature of this habitat may stand on `feature`
    pub fn can_occupy(&self, feature: Feature) -> bool {
        match self {
            Habitat::Land => feature.is_walkable(),
            Habitat::Amphibious => feature.is_walkable() || feature == Feature::DeepWater,
            Habitat::Water => matches!(feature, Feature::ShallowWater | Feature::DeepWater),
            Habitat::Lava => feature.is_walkable() || feature == Feature::Lava,
            Habitat::Flying => !feature.is_solid() && feature != Feature::Unseen,
        }
    }
}

/// Flags passed to the monster factory
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnFlags {
    pub habitat: Habitat,
    pub friendly: bool,
    pub pursuing: bool,
}

impl Default for SpawnFlags {
    fn default() -> Self {
        SpawnFlags { habitat: Habitat::Land, friendly: false, pursuing: false }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MonsterRecord {
    pub id: MonsterId,
    pub kind: String,
    pub pos: WindowPos,
    pub habitat: Habitat,
    /// Allied with the player; never silently destroyed by a shift
    pub friendly: bool,
    /// Actively chasing the player; goes to limbo rather than being destroyed
    pub pursuing: bool,
    /// Hiding under liquid
    pub submerged: bool,
}

impl MonsterRecord {
    /// Survives being dropped off the window: sent to limbo instead of destroyed
    pub fn follows_player(&self) -> bool {
        self.friendly || self.pursuing
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemCategory {
    Gold,
    Potion,
    Scroll,
    Weapon,
    Armour,
    Wand,
    /// The unique collectible of the Abyss
    Rune,
}

impl ItemCategory {
    /// Categories the regenerator may scatter
    pub const ORDINARY: [ItemCategory; 6] = [
        ItemCategory::Gold,
        ItemCategory::Potion,
        ItemCategory::Scroll,
        ItemCategory::Weapon,
        ItemCategory::Armour,
        ItemCategory::Wand,
    ];

    pub fn ascii_char(&self) -> char {
        match self {
            ItemCategory::Gold => '$',
            ItemCategory::Potion => '!',
            ItemCategory::Scroll => '?',
            ItemCategory::Weapon => '(',
            ItemCategory::Armour => '[',
            ItemCategory::Wand => '/',
            ItemCategory::Rune => '|',
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: ItemId,
    pub category: ItemCategory,
    pub pos: WindowPos,
    pub depth_level: u32,
}

/// The game's monster and item factories, as consumed by the engine.
///
/// Implementations must not call back into the engine.
pub trait Population {
    fn monsters(&self) -> Vec<MonsterRecord>;

    fn items(&self) -> Vec<ItemRecord>;

    fn monster(&self, id: MonsterId) -> Option<MonsterRecord> {
        self.monsters().into_iter().find(|m| m.id == id)
    }

    fn monster_at(&self, pos: WindowPos) -> Option<MonsterRecord> {
        self.monsters().into_iter().find(|m| m.pos == pos)
    }

    fn items_at(&self, pos: WindowPos) -> Vec<ItemRecord> {
        self.items().into_iter().filter(|i| i.pos == pos).collect()
    }

    fn spawn_monster(&mut self, kind: &str, pos: WindowPos, flags: SpawnFlags) -> Option<MonsterId>;

    fn spawn_item(&mut self, category: ItemCategory, pos: WindowPos, depth_level: u32) -> Option<ItemId>;

    fn relocate_monster(&mut self, id: MonsterId, pos: WindowPos);

    fn relocate_item(&mut self, id: ItemId, pos: WindowPos);

    fn destroy_monster(&mut self, id: MonsterId);

    fn destroy_item(&mut self, id: ItemId);

    /// Take a monster off the level; the game brings it back elsewhere later
    fn send_to_limbo(&mut self, id: MonsterId);
}

/// In-memory population
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Roster {
    monsters: BTreeMap<MonsterId, MonsterRecord>,
    items: BTreeMap<ItemId, ItemRecord>,
    limbo: Vec<MonsterRecord>,
    next_id: u32,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    pub fn monster_count(&self) -> usize {
        self.monsters.len()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Monsters waiting off-level
    pub fn limbo(&self) -> &[MonsterRecord] {
        &self.limbo
    }

    /// Mark a monster as submerged (or surfaced)
    pub fn set_submerged(&mut self, id: MonsterId, submerged: bool) {
        if let Some(m) = self.monsters.get_mut(&id) {
            m.submerged = submerged;
        }
    }
}

impl Population for Roster {
    fn monsters(&self) -> Vec<MonsterRecord> {
        self.monsters.values().cloned().collect()
    }

    fn items(&self) -> Vec<ItemRecord> {
        self.items.values().cloned().collect()
    }

    fn monster(&self, id: MonsterId) -> Option<MonsterRecord> {
        self.monsters.get(&id).cloned()
    }

    fn spawn_monster(&mut self, kind: &str, pos: WindowPos, flags: SpawnFlags) -> Option<MonsterId> {
        if self.monsters.values().any(|m| m.pos == pos) {
            return None;
        }
        let id = MonsterId(self.allocate());
        self.monsters.insert(
            id,
            MonsterRecord {
                id,
                kind: kind.to_string(),
                pos,
                habitat: flags.habitat,
                friendly: flags.friendly,
                pursuing: flags.pursuing,
                submerged: false,
            },
        );
        Some(id)
    }

    fn spawn_item(&mut self, category: ItemCategory, pos: WindowPos, depth_level: u32) -> Option<ItemId> {
        let id = ItemId(self.allocate());
        self.items.insert(id, ItemRecord { id, category, pos, depth_level });
        Some(id)
    }

    fn relocate_monster(&mut self, id: MonsterId, pos: WindowPos) {
        if let Some(m) = self.monsters.get_mut(&id) {
            m.pos = pos;
            m.submerged = false;
        }
    }

    fn relocate_item(&mut self, id: ItemId, pos: WindowPos) {
        if let Some(i) = self.items.get_mut(&id) {
            i.pos = pos;
        }
    }

    fn destroy_monster(&mut self, id: MonsterId) {
        self.monsters.remove(&id);
    }

    fn destroy_item(&mut self, id: ItemId) {
        self.items.remove(&id);
    }

    fn send_to_limbo(&mut self, id: MonsterId) {
        if let Some(m) = self.monsters.remove(&id) {
            self.limbo.push(m);
        }
    }
}
