//! Terrain features and transient clouds for the Abyss window.

use serde::{Deserialize, Serialize};

/// Terrain feature occupying one window tile
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Feature {
    /// Wiped or not yet sampled
    #[default]
    Unseen,
    Floor,

    // Solid terrain
    RockWall,
    StoneWall,
    MetalWall,
    CrystalWall,
    Tree,

    // Liquids
    ShallowWater,
    DeepWater,
    Lava,

    // Protected features
    /// Gate back to the dungeon
    ExitAbyss,
    /// One-way stair deeper into the Abyss
    AbyssalStair,
    Altar,
}

impl Feature {
    /// Blocks movement and line of sight
    pub fn is_solid(&self) -> bool {
        matches!(
            self,
            Feature::RockWall
                | Feature::StoneWall
                | Feature::MetalWall
                | Feature::CrystalWall
                | Feature::Tree
        )
    }

    /// A land-bound creature can stand here
    pub fn is_walkable(&self) -> bool {
        !self.is_solid() && !matches!(self, Feature::DeepWater | Feature::Lava | Feature::Unseen)
    }

    pub fn is_liquid(&self) -> bool {
        matches!(self, Feature::ShallowWater | Feature::DeepWater | Feature::Lava)
    }

    /// Kills or drowns the player outright
    pub fn is_lethal_to_player(&self) -> bool {
        matches!(self, Feature::DeepWater | Feature::Lava)
    }

    /// Stairs, exits and altars are never overwritten by the terrain applier
    pub fn is_protected(&self) -> bool {
        matches!(self, Feature::ExitAbyss | Feature::AbyssalStair | Feature::Altar)
    }

    /// Survivable stand-in for a lethal feature under the player
    pub fn player_safe_downgrade(&self) -> Feature {
        match self {
            Feature::DeepWater => Feature::ShallowWater,
            Feature::Lava => Feature::Floor,
            other => *other,
        }
    }

    /// Get ASCII character for terminal display
    pub fn ascii_char(&self) -> char {
        match self {
            Feature::Unseen => ' ',
            Feature::Floor => '.',
            Feature::RockWall => '#',
            Feature::StoneWall => '#',
            Feature::MetalWall => '#',
            Feature::CrystalWall => '#',
            Feature::Tree => '♣',
            Feature::ShallowWater => '~',
            Feature::DeepWater => '≈',
            Feature::Lava => '≈',
            Feature::ExitAbyss => '\\',
            Feature::AbyssalStair => '>',
            Feature::Altar => '_',
        }
    }

    /// Get RGB color for rendering
    pub fn color(&self) -> (u8, u8, u8) {
        match self {
            Feature::Unseen => (0, 0, 0),
            Feature::Floor => (70, 60, 80),
            Feature::RockWall => (130, 100, 70),
            Feature::StoneWall => (140, 140, 140),
            Feature::MetalWall => (80, 160, 200),
            Feature::CrystalWall => (90, 220, 110),
            Feature::Tree => (40, 120, 40),
            Feature::ShallowWater => (80, 130, 180),
            Feature::DeepWater => (40, 80, 140),
            Feature::Lava => (255, 100, 20),
            Feature::ExitAbyss => (230, 230, 255),
            Feature::AbyssalStair => (200, 60, 200),
            Feature::Altar => (160, 40, 40),
        }
    }
}

/// Kinds of transient gas the engine spawns
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CloudKind {
    Dust,
    Steam,
    Glitter,
    Spores,
    Smoke,
}

impl CloudKind {
    /// Gas left behind when `previous` dissolves into walkable terrain
    pub fn for_dissolved(previous: Feature) -> Option<CloudKind> {
        match previous {
            Feature::RockWall | Feature::StoneWall => Some(CloudKind::Dust),
            Feature::MetalWall => Some(CloudKind::Smoke),
            Feature::CrystalWall => Some(CloudKind::Glitter),
            Feature::Tree => Some(CloudKind::Spores),
            Feature::Lava => Some(CloudKind::Steam),
            _ => None,
        }
    }

    pub fn ascii_char(&self) -> char {
        match self {
            CloudKind::Dust => '°',
            CloudKind::Steam => '§',
            CloudKind::Glitter => '*',
            CloudKind::Spores => '"',
            CloudKind::Smoke => '§',
        }
    }
}

/// A cloud sitting on a tile
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cloud {
    pub kind: CloudKind,
    /// Remaining lifetime in time units
    pub lifetime: u32,
}

impl Cloud {
    pub fn new(kind: CloudKind, lifetime: u32) -> Self {
        Cloud { kind, lifetime }
    }

    /// Age the cloud; returns false once it has dissipated
    pub fn age(&mut self, elapsed: u32) -> bool {
        self.lifetime = self.lifetime.saturating_sub(elapsed);
        self.lifetime > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solid_is_never_walkable() {
        for f in [
            Feature::RockWall,
            Feature::StoneWall,
            Feature::MetalWall,
            Feature::CrystalWall,
            Feature::Tree,
        ] {
            assert!(f.is_solid());
            assert!(!f.is_walkable());
        }
        assert!(Feature::Floor.is_walkable());
        assert!(Feature::ShallowWater.is_walkable());
        assert!(!Feature::Lava.is_walkable());
    }

    #[test]
    fn test_player_downgrades_are_survivable() {
        assert_eq!(Feature::DeepWater.player_safe_downgrade(), Feature::ShallowWater);
        assert_eq!(Feature::Lava.player_safe_downgrade(), Feature::Floor);
        assert!(!Feature::Lava.player_safe_downgrade().is_lethal_to_player());
        assert_eq!(Feature::Floor.player_safe_downgrade(), Feature::Floor);
    }

    #[test]
    fn test_cloud_ages_out() {
        let mut cloud = Cloud::new(CloudKind::Dust, 15);
        assert!(cloud.age(10));
        assert!(!cloud.age(10));
        assert_eq!(cloud.lifetime, 0);
        assert_eq!(CloudKind::for_dissolved(Feature::Floor), None);
    }
}
