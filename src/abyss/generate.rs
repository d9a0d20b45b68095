//! Filling freshly exposed ground: base terrain, special features, vaults,
//! items and monsters. Also the one-shot entry generation and teleports.

use std::collections::VecDeque;

use rand::Rng;
use tracing::{debug, info, warn};

use super::shift::{PreservationMask, ShiftPlan, ShiftReport};
use super::{Abyss, AbyssState, AbyssTile};
use crate::coords::{AbsCoord, WindowPos};
use crate::error::{AbyssError, Result};
use crate::layout::NEVER_CHANGES;
use crate::population::{Habitat, ItemCategory, Population, SpawnFlags};
use crate::terrain::Feature;
use crate::tilemap::Tilemap;

/// Fresh origins are drawn from this range on both axes, well clear of the wastes
const ORIGIN_RANGE: i64 = 1 << 28;

/// How far a same-region teleport may jump
const NEAR_JUMP: std::ops::RangeInclusive<i64> = 60..=240;

/// Random positions tried before a feature or spawn is skipped
const SPOT_ATTEMPTS: u32 = 64;

/// Each this many Abyss levels below the first raise the item cap by one
const LEVELS_PER_EXTRA_ITEM: u32 = 2;

/// Tag the regenerator asks the vault catalogue for
const VAULT_TAG: &str = "abyss";

/// Creatures the regenerator may spawn, with the terrain they live on
const MONSTER_KINDS: [(&str, Habitat); 5] = [
    ("abyssal_fiend", Habitat::Land),
    ("starcursed_mass", Habitat::Land),
    ("lurking_horror", Habitat::Amphibious),
    ("wretched_star", Habitat::Flying),
    ("lava_worm", Habitat::Lava),
];

/// Entities created while filling a region
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Spawned {
    pub items: usize,
    pub monsters: usize,
}

impl Abyss {
    /// First entry into the Abyss. Retries from scratch until the player can
    /// reach the entry exit, up to the configured number of attempts.
    pub fn enter_fresh(&mut self, population: &mut dyn Population) -> Result<()> {
        let attempts = self.config.generation_attempts;
        for attempt in 1..=attempts {
            let origin = self.random_origin();
            self.state = AbyssState::new(self.seeds.master, origin);
            self.sampler.recenter(origin);
            self.grid.fill(AbyssTile::default());
            self.fragments.clear_placed();
            self.scheduler.clear();
            self.displaced.clear();
            self.player = self.center();

            // Proto-terrain: the player arrives on safe ground
            *self.grid.at_mut(self.player) = AbyssTile::sampled(Feature::Floor, 0);

            let mut region = PreservationMask::disk(self.grid.width, self.grid.height, self.player, 0);
            region.invert();
            self.lay_base_terrain(&region);

            if self.config.entry_exit && !self.place_entry_exit(&region) {
                debug!(attempt, %origin, "entry exit unreachable, regenerating");
                continue;
            }
            if self.roll(self.config.entry_altar_chance) {
                self.place_protected(&region, Feature::Altar);
            }

            let spawned = self.place_content(&region, population);
            info!(
                attempt,
                %origin,
                items = spawned.items,
                monsters = spawned.monsters,
                "entered the abyss"
            );
            return Ok(());
        }

        warn!(attempts, "abyss generation vetoed on every attempt");
        Err(AbyssError::GenerationVeto { attempts })
    }

    /// Jump the window elsewhere in the plane, keeping only the player's tile
    pub fn teleport(&mut self, same_region: bool, population: &mut dyn Population) -> ShiftReport {
        let new_origin = if same_region {
            let dx = self.rng.gen_range(NEAR_JUMP) * if self.rng.gen_bool(0.5) { 1 } else { -1 };
            let dy = self.rng.gen_range(NEAR_JUMP) * if self.rng.gen_bool(0.5) { 1 } else { -1 };
            self.state.origin_offset.offset(dx, dy)
        } else {
            self.random_origin()
        };
        debug!(same_region, %new_origin, "teleporting within the abyss");

        let plan = ShiftPlan {
            anchor: self.player,
            preserve_radius: 0,
            new_origin: Some(new_origin),
        };
        self.shift_window(plan, population)
    }

    /// Base terrain followed by every kind of content
    pub(crate) fn regenerate(&mut self, region: &PreservationMask, population: &mut dyn Population) -> Spawned {
        self.lay_base_terrain(region);
        self.place_content(region, population)
    }

    /// Sample every visible tile of `region` straight into the grid. The
    /// region must already be wiped.
    fn lay_base_terrain(&mut self, region: &PreservationMask) {
        let depth = self.state.depth;
        let positions: Vec<WindowPos> = region.positions().collect();
        for pos in positions {
            debug_assert!(!self.grid.at(pos).is_authored(), "regenerating over a vault at {}", pos);
            if !self.is_visible(pos) {
                continue;
            }
            let sample = self.sampler.sample(self.abs_coord(pos), depth);
            *self.grid.at_mut(pos) = AbyssTile::sampled(sample.feature, depth);
            if sample.changepoint != NEVER_CHANGES {
                self.scheduler.push(sample);
            }
        }
    }

    /// Special features, then vaults, then items, then monsters
    fn place_content(&mut self, region: &PreservationMask, population: &mut dyn Population) -> Spawned {
        let mut spawned = Spawned::default();
        spawned.items += self.place_special_features(region, population);
        self.place_vault(region);
        spawned.items += self.place_items(region, population);
        spawned.monsters += self.place_monsters(region, population);
        spawned
    }

    /// Exits, altars, stairs and the rune. Returns the number of items spawned.
    fn place_special_features(&mut self, region: &PreservationMask, population: &mut dyn Population) -> usize {
        if self.roll(self.config.exit_chance) {
            self.place_protected(region, Feature::ExitAbyss);
        }
        if self.roll(self.config.altar_chance) {
            self.place_protected(region, Feature::Altar);
        }
        if self.progress.abyss_level < self.config.max_abyss_level && self.roll(self.config.stair_chance) {
            self.place_protected(region, Feature::AbyssalStair);
        }

        let rune_allowed = self.progress.abyss_level >= self.config.rune_min_level
            && !self.progress.has_rune
            && !population.items().iter().any(|i| i.category == ItemCategory::Rune);
        if rune_allowed && self.roll(self.config.rune_chance) {
            if let Some(pos) = self.random_spot(region, population, |t| t.feature.is_walkable()) {
                if population.spawn_item(ItemCategory::Rune, pos, self.progress.abyss_level).is_some() {
                    info!(%pos, "the abyssal rune appears");
                    return 1;
                }
            }
        }
        0
    }

    fn place_protected(&mut self, region: &PreservationMask, feature: Feature) -> Option<WindowPos> {
        let candidates = self.spot_candidates(region);
        for _ in 0..SPOT_ATTEMPTS {
            if candidates.is_empty() {
                break;
            }
            let pos = candidates[self.rng.gen_range(0..candidates.len())];
            let tile = self.grid.at_mut(pos);
            if tile.feature.is_walkable() && !tile.feature.is_protected() && !tile.is_authored() {
                tile.feature = feature;
                tile.cloud = None;
                return Some(pos);
            }
        }
        debug!(?feature, "no spot for special feature");
        None
    }

    fn place_vault(&mut self, region: &PreservationMask) {
        if !self.roll(self.config.vault_chance) {
            return;
        }
        let template = self.catalog.find_map_for_tag(VAULT_TAG, &mut self.rng).cloned();
        let Some(template) = template else {
            debug!(tag = VAULT_TAG, "vault catalogue has nothing to offer");
            return;
        };
        let attempts = self.config.vault_attempts;
        match self
            .fragments
            .place_fragment(&template, region.cells(), &mut self.grid, &mut self.rng, attempts)
        {
            Ok(placed) => debug!(vault = %placed.name, origin = %placed.origin, "vault placed"),
            Err(e) => debug!(vault = template.name, error = %e, "vault skipped"),
        }
    }

    fn place_items(&mut self, region: &PreservationMask, population: &mut dyn Population) -> usize {
        let count = self.rng.gen_range(0..=self.item_cap());
        let mut spawned = 0;
        for _ in 0..count {
            let category = ItemCategory::ORDINARY[self.rng.gen_range(0..ItemCategory::ORDINARY.len())];
            let Some(pos) = self.random_spot(region, population, |t| t.feature.is_walkable()) else { continue };
            if population.spawn_item(category, pos, self.progress.abyss_level).is_some() {
                spawned += 1;
            }
        }
        spawned
    }

    /// Deeper levels hold more loot
    fn item_cap(&self) -> u32 {
        let bonus = self.progress.abyss_level.saturating_sub(1) / LEVELS_PER_EXTRA_ITEM;
        self.config.max_items.saturating_add(bonus)
    }

    fn place_monsters(&mut self, region: &PreservationMask, population: &mut dyn Population) -> usize {
        let count = self.rng.gen_range(0..=self.config.max_monsters);
        let mut spawned = 0;
        for _ in 0..count {
            let (kind, habitat) = MONSTER_KINDS[self.rng.gen_range(0..MONSTER_KINDS.len())];
            let Some(pos) = self.random_spot(region, population, |t| habitat.can_occupy(t.feature)) else { continue };
            let flags = SpawnFlags { habitat, ..SpawnFlags::default() };
            if population.spawn_monster(kind, pos, flags).is_some() {
                spawned += 1;
            }
        }
        spawned
    }

    /// Visible positions of `region`
    fn spot_candidates(&self, region: &PreservationMask) -> Vec<WindowPos> {
        region.positions().filter(|p| self.is_visible(*p)).collect()
    }

    /// A random free tile of `region` accepted by `accept`: not the player's,
    /// not holding a protected feature and not occupied by a monster.
    fn random_spot<F>(&mut self, region: &PreservationMask, population: &dyn Population, accept: F) -> Option<WindowPos>
    where
        F: Fn(&AbyssTile) -> bool,
    {
        let candidates = self.spot_candidates(region);
        if candidates.is_empty() {
            return None;
        }
        for _ in 0..SPOT_ATTEMPTS {
            let pos = candidates[self.rng.gen_range(0..candidates.len())];
            let tile = self.grid.at(pos);
            if pos != self.player
                && accept(tile)
                && !tile.feature.is_protected()
                && population.monster_at(pos).is_none()
            {
                return Some(pos);
            }
        }
        None
    }

    /// Put the exit at a random walkable tile in the entry distance band and
    /// check the player can walk there.
    fn place_entry_exit(&mut self, region: &PreservationMask) -> bool {
        let min = self.config.entry_exit_min_distance as i64;
        let max = self.config.entry_exit_max_distance as i64;
        let player = self.player;
        let band: Vec<WindowPos> = region
            .positions()
            .filter(|p| {
                let d2 = p.distance_sq(player);
                d2 >= min * min && d2 <= max * max && self.grid.at(*p).feature.is_walkable()
            })
            .collect();
        if band.is_empty() {
            return false;
        }

        let exit = band[self.rng.gen_range(0..band.len())];
        self.grid.at_mut(exit).feature = Feature::ExitAbyss;
        *reachable_from(&self.grid, player).at(exit)
    }

    fn random_origin(&mut self) -> AbsCoord {
        AbsCoord::new(
            self.rng.gen_range(-ORIGIN_RANGE..ORIGIN_RANGE),
            self.rng.gen_range(-ORIGIN_RANGE..ORIGIN_RANGE),
        )
    }

    pub(crate) fn roll(&mut self, chance: f64) -> bool {
        chance > 0.0 && self.rng.gen_bool(chance.min(1.0))
    }
}

/// Tiles a walker can reach from `start` with king moves
pub fn reachable_from(grid: &Tilemap<AbyssTile>, start: WindowPos) -> Tilemap<bool> {
    let mut seen = Tilemap::new_with(grid.width, grid.height, false);
    if !grid.in_bounds(start) {
        return seen;
    }
    let mut queue = VecDeque::new();
    seen.set(start, true);
    queue.push_back(start);
    while let Some(pos) = queue.pop_front() {
        for next in grid.neighbors_8(pos) {
            if !*seen.at(next) && grid.at(next).feature.is_walkable() {
                seen.set(next, true);
                queue.push_back(next);
            }
        }
    }
    seen
}
