//! Authored fragments (vaults) and the registry that owns them.
//!
//! The engine only needs four things from the vault subsystem: pick a
//! template for a tag, stamp it into the window inside a constraint mask,
//! find which placed fragments overlap a region, and forget fragments no tile
//! refers to any more. Unique vaults stay consumed after they are forgotten.

pub mod prefabs;
pub mod types;

use std::collections::{BTreeMap, BTreeSet};

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::abyss::AbyssTile;
use crate::coords::{WindowDelta, WindowPos};
use crate::tilemap::Tilemap;

pub use prefabs::PrefabCatalog;
pub use types::{FragmentId, PlacedFragment, PlacementError, VaultTemplate};

/// Source of vault templates
pub trait VaultCatalog {
    fn find_map_for_tag(&self, tag: &str, rng: &mut dyn RngCore) -> Option<&VaultTemplate>;
}

/// Every fragment placed in one level instance
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FragmentRegistry {
    next_id: u32,
    placed: BTreeMap<FragmentId, PlacedFragment>,
    used_unique: BTreeSet<String>,
}

impl FragmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: FragmentId) -> Option<&PlacedFragment> {
        self.placed.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlacedFragment> {
        self.placed.values()
    }

    pub fn len(&self) -> usize {
        self.placed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placed.is_empty()
    }

    pub fn is_unique_used(&self, name: &str) -> bool {
        self.used_unique.contains(name)
    }

    /// Stamp `template` into `grid` at a random spot where every cell is
    /// allowed by `constraint`, holds no other fragment and no protected
    /// feature. Tries `attempts` positions with random orientation.
    pub fn place_fragment(
        &mut self,
        template: &VaultTemplate,
        constraint: &Tilemap<bool>,
        grid: &mut Tilemap<AbyssTile>,
        rng: &mut dyn RngCore,
        attempts: u32,
    ) -> Result<PlacedFragment, PlacementError> {
        if template.unique && self.used_unique.contains(template.name) {
            return Err(PlacementError::UniqueAlreadyUsed(template.name.to_string()));
        }

        for _ in 0..attempts {
            let mut oriented = template.clone();
            for _ in 0..rng.gen_range(0..4) {
                oriented = oriented.rotate_cw();
            }
            if rng.gen_bool(0.5) {
                oriented = oriented.flip_h();
            }

            if oriented.width > grid.width || oriented.height > grid.height {
                continue;
            }
            let origin = WindowPos::new(
                rng.gen_range(0..=grid.width - oriented.width) as i32,
                rng.gen_range(0..=grid.height - oriented.height) as i32,
            );

            if !fits(&oriented, origin, constraint, grid) {
                continue;
            }

            self.next_id += 1;
            let id = FragmentId(self.next_id);
            for y in 0..oriented.height {
                for x in 0..oriented.width {
                    let pos = WindowPos::new(origin.x + x as i32, origin.y + y as i32);
                    let tile = grid.at_mut(pos);
                    tile.feature = oriented.tiles[y][x];
                    tile.fragment = Some(id);
                    tile.cloud = None;
                }
            }

            let placed = PlacedFragment {
                id,
                name: template.name.to_string(),
                origin,
                width: oriented.width,
                height: oriented.height,
                unique: template.unique,
            };
            if template.unique {
                self.used_unique.insert(template.name.to_string());
            }
            trace!(vault = template.name, %origin, "placed vault");
            self.placed.insert(id, placed.clone());
            return Ok(placed);
        }

        debug!(vault = template.name, attempts, "no room for vault");
        Err(PlacementError::NoRoom)
    }

    /// Fragments owning at least one tile where `mask` is set
    pub fn fragment_overlaps(&self, grid: &Tilemap<AbyssTile>, mask: &Tilemap<bool>) -> BTreeSet<FragmentId> {
        grid.iter()
            .filter(|(pos, _)| *mask.at(*pos))
            .filter_map(|(_, tile)| tile.fragment)
            .collect()
    }

    /// Forget fragments that no tile refers to. Returns how many were dropped.
    pub fn discard_unreferenced(&mut self, grid: &Tilemap<AbyssTile>) -> usize {
        let referenced: BTreeSet<FragmentId> = grid.iter().filter_map(|(_, t)| t.fragment).collect();
        let before = self.placed.len();
        self.placed.retain(|id, _| referenced.contains(id));
        let dropped = before - self.placed.len();
        if dropped > 0 {
            debug!(dropped, "discarded unreferenced fragments");
        }
        dropped
    }

    /// Move every fragment's bookkeeping along with a window shift
    pub(crate) fn translate(&mut self, delta: WindowDelta) {
        for fragment in self.placed.values_mut() {
            fragment.translate(delta);
        }
    }

    /// Drop all placed fragments; unique names stay consumed
    pub fn clear_placed(&mut self) {
        self.placed.clear();
    }
}

fn fits(template: &VaultTemplate, origin: WindowPos, constraint: &Tilemap<bool>, grid: &Tilemap<AbyssTile>) -> bool {
    (0..template.height).all(|y| {
        (0..template.width).all(|x| {
            let pos = WindowPos::new(origin.x + x as i32, origin.y + y as i32);
            constraint.get(pos).copied().unwrap_or(false)
                && grid
                    .get(pos)
                    .map(|t| t.fragment.is_none() && !t.feature.is_protected())
                    .unwrap_or(false)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::Feature;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn floor_grid(w: usize, h: usize) -> Tilemap<AbyssTile> {
        Tilemap::new_with(w, h, AbyssTile::sampled(Feature::Floor, 0))
    }

    #[test]
    fn test_place_respects_constraint() {
        let mut grid = floor_grid(30, 30);
        let mut allowed = Tilemap::new_with(30, 30, false);
        for y in 20..30 {
            for x in 20..30 {
                allowed.set(WindowPos::new(x, y), true);
            }
        }
        let mut registry = FragmentRegistry::new();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let placed = registry
            .place_fragment(&prefabs::pillar_hall(), &allowed, &mut grid, &mut rng, 200)
            .unwrap();
        assert!(placed.origin.x >= 20 && placed.origin.y >= 20);
        let owned = grid.iter().filter(|(_, t)| t.fragment == Some(placed.id)).count();
        assert_eq!(owned, placed.area());
        for (pos, tile) in grid.iter() {
            if tile.fragment.is_some() {
                assert!(*allowed.at(pos));
            }
        }
    }

    #[test]
    fn test_no_room_is_reported() {
        let mut grid = floor_grid(4, 4);
        let allowed = Tilemap::new_with(4, 4, true);
        let mut registry = FragmentRegistry::new();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let result = registry.place_fragment(&prefabs::ruined_chapel(), &allowed, &mut grid, &mut rng, 10);
        assert_eq!(result, Err(PlacementError::NoRoom));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unique_stays_consumed_after_discard() {
        let mut grid = floor_grid(20, 20);
        let allowed = Tilemap::new_with(20, 20, true);
        let mut registry = FragmentRegistry::new();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let grove = prefabs::petrified_grove();

        let placed = registry.place_fragment(&grove, &allowed, &mut grid, &mut rng, 50).unwrap();
        for (_, tile) in grid.iter_mut() {
            if tile.fragment == Some(placed.id) {
                *tile = AbyssTile::default();
            }
        }
        assert_eq!(registry.discard_unreferenced(&grid), 1);
        assert!(registry.is_unique_used("petrified_grove"));
        assert_eq!(
            registry.place_fragment(&grove, &allowed, &mut grid, &mut rng, 50),
            Err(PlacementError::UniqueAlreadyUsed("petrified_grove".to_string()))
        );
    }

    #[test]
    fn test_overlaps_report_fragments_under_mask() {
        let mut grid = floor_grid(20, 20);
        let allowed = Tilemap::new_with(20, 20, true);
        let mut registry = FragmentRegistry::new();
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let placed = registry
            .place_fragment(&prefabs::crystal_pool(), &allowed, &mut grid, &mut rng, 50)
            .unwrap();

        let mut mask = Tilemap::new_with(20, 20, false);
        mask.set(placed.origin, true);
        let overlaps = registry.fragment_overlaps(&grid, &mask);
        assert_eq!(overlaps.into_iter().collect::<Vec<_>>(), vec![placed.id]);
    }
}
