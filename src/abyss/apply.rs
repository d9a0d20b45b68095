//! Terrain writes and the rules that refuse them.
//!
//! Every change the morph tick wants to make goes through
//! [`Abyss::apply_feature`]. Shift regeneration writes straight into tiles
//! the wipe has already emptied and does not come through here.

use rand::Rng;
use tracing::trace;

use super::Abyss;
use crate::coords::WindowPos;
use crate::population::{ItemCategory, Population};
use crate::terrain::{Cloud, CloudKind, Feature};

/// Why a terrain write was refused
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VetoReason {
    /// The tile belongs to a vault
    AuthoredContent,
    /// Exit, stair or altar
    ProtectedFeature,
    /// The Abyssal rune lies here
    Rune,
    /// Solid terrain would entomb the player
    PlayerTile,
    /// A submerged creature would be left stranded
    SubmergedCreature,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ApplyOutcome {
    Written,
    /// The tile already held the candidate
    Unchanged,
    /// A lethal candidate was softened because the player stands here
    Downgraded,
    Vetoed(VetoReason),
}

impl ApplyOutcome {
    pub fn changed(&self) -> bool {
        matches!(self, ApplyOutcome::Written | ApplyOutcome::Downgraded)
    }
}

impl Abyss {
    /// Write `candidate` at `pos` unless a veto applies, then run side effects.
    pub fn apply_feature(
        &mut self,
        pos: WindowPos,
        candidate: Feature,
        population: &dyn Population,
    ) -> ApplyOutcome {
        assert!(self.grid.in_bounds(pos), "terrain write at {} outside the window", pos);
        let current = self.grid.at(pos).feature;
        if candidate == current {
            return ApplyOutcome::Unchanged;
        }
        if let Some(reason) = self.veto(pos, candidate, population) {
            trace!(%pos, ?candidate, ?reason, "terrain write vetoed");
            return ApplyOutcome::Vetoed(reason);
        }

        let lethal_here = pos == self.player && candidate.is_lethal_to_player();
        let feature = if lethal_here { candidate.player_safe_downgrade() } else { candidate };
        if feature == current {
            return ApplyOutcome::Unchanged;
        }

        self.write_feature(pos, feature, population);
        if lethal_here {
            ApplyOutcome::Downgraded
        } else {
            ApplyOutcome::Written
        }
    }

    fn veto(&self, pos: WindowPos, candidate: Feature, population: &dyn Population) -> Option<VetoReason> {
        let tile = self.grid.at(pos);
        if tile.is_authored() {
            return Some(VetoReason::AuthoredContent);
        }
        if tile.feature.is_protected() {
            return Some(VetoReason::ProtectedFeature);
        }
        if population.items_at(pos).iter().any(|i| i.category == ItemCategory::Rune) {
            return Some(VetoReason::Rune);
        }
        if pos == self.player && candidate.is_solid() {
            return Some(VetoReason::PlayerTile);
        }
        if let Some(monster) = population.monster_at(pos) {
            if monster.submerged && !monster.habitat.can_occupy(candidate) {
                return Some(VetoReason::SubmergedCreature);
            }
        }
        None
    }

    /// Unconditional write plus clouds and monster displacement
    pub(crate) fn write_feature(&mut self, pos: WindowPos, feature: Feature, population: &dyn Population) {
        let cloud_chance = self.config.cloud_chance.clamp(0.0, 1.0);
        let (min_life, max_life) = self.config.cloud_lifetime;

        let tile = self.grid.at_mut(pos);
        let previous = tile.feature;
        tile.feature = feature;

        // Clouds only rise where a wall or lava gave way to open ground
        if feature.is_solid() {
            tile.cloud = None;
        } else if feature.is_walkable() {
            if let Some(kind) = CloudKind::for_dissolved(previous) {
                if self.rng.gen_bool(cloud_chance) {
                    tile.cloud = Some(Cloud::new(kind, self.rng.gen_range(min_life..=max_life)));
                }
            }
        }

        if let Some(monster) = population.monster_at(pos) {
            if !monster.habitat.can_occupy(feature) && !self.displaced.contains(&monster.id) {
                trace!(id = monster.id.0, %pos, ?feature, "monster displaced by terrain");
                self.displaced.push(monster.id);
            }
        }
    }
}
