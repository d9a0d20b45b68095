//! Re-centring the window on the player.
//!
//! A shift is a strict sequence of phases over one preservation mask:
//! build the mask, move the origin, wipe outside the mask, carry the preserved
//! tiles to their new window positions, wipe again against the moved mask,
//! invert it, regenerate the inverted region, forget orphaned fragments and
//! finally rehome the monsters that were queued along the way. Each grid phase
//! is a free function so it can be tested on its own; [`Abyss::shift_window`]
//! is the only place that calls them in order.

use std::collections::BTreeSet;

use tracing::{debug, info};

use super::relocate::{self, EntityTally};
use super::{Abyss, AbyssTile};
use crate::coords::{AbsCoord, WindowDelta, WindowPos};
use crate::population::Population;
use crate::tilemap::Tilemap;
use crate::vaults::{FragmentId, FragmentRegistry};

/// Tiles that must survive a shift
#[derive(Clone, Debug, PartialEq)]
pub struct PreservationMask {
    cells: Tilemap<bool>,
}

impl PreservationMask {
    pub fn empty(width: usize, height: usize) -> Self {
        PreservationMask { cells: Tilemap::new_with(width, height, false) }
    }

    /// All tiles within `radius` (Euclidean, inclusive) of `center`
    pub fn disk(width: usize, height: usize, center: WindowPos, radius: i32) -> Self {
        let mut mask = Self::empty(width, height);
        let r2 = radius as i64 * radius as i64;
        for (pos, cell) in mask.cells.iter_mut() {
            *cell = pos.distance_sq(center) <= r2;
        }
        mask
    }

    /// Set every tile owned by one of `fragments`. Returns how many tiles
    /// were added.
    pub fn expand_over_fragments(&mut self, grid: &Tilemap<AbyssTile>, fragments: &BTreeSet<FragmentId>) -> usize {
        let mut added = 0;
        for (pos, tile) in grid.iter() {
            if tile.fragment.map_or(false, |id| fragments.contains(&id)) && !*self.cells.at(pos) {
                self.cells.set(pos, true);
                added += 1;
            }
        }
        added
    }

    /// False for positions outside the window
    pub fn contains(&self, pos: WindowPos) -> bool {
        self.cells.get(pos).copied().unwrap_or(false)
    }

    /// The mask moved by `delta`; cells pushed off the window are dropped
    pub fn shifted(&self, delta: WindowDelta) -> Self {
        let mut moved = Self::empty(self.cells.width, self.cells.height);
        for pos in self.positions() {
            moved.cells.set(pos + delta, true);
        }
        moved
    }

    pub fn invert(&mut self) {
        for (_, cell) in self.cells.iter_mut() {
            *cell = !*cell;
        }
    }

    pub fn count(&self) -> usize {
        self.cells.count_set()
    }

    pub fn cells(&self) -> &Tilemap<bool> {
        &self.cells
    }

    pub fn positions(&self) -> impl Iterator<Item = WindowPos> + '_ {
        self.cells.iter().filter(|(_, set)| **set).map(|(pos, _)| pos)
    }
}

/// Disk around the player, expanded over every fragment it touches
pub fn build_preservation_mask(
    grid: &Tilemap<AbyssTile>,
    fragments: &FragmentRegistry,
    player: WindowPos,
    radius: i32,
) -> PreservationMask {
    let mut mask = PreservationMask::disk(grid.width, grid.height, player, radius);
    let touched = fragments.fragment_overlaps(grid, mask.cells());
    if !touched.is_empty() {
        let added = mask.expand_over_fragments(grid, &touched);
        debug!(fragments = touched.len(), added, "preservation mask grown over fragments");
    }
    mask
}

/// Reset every tile outside `mask` to unseen. Returns how many were wiped.
pub fn wipe_outside(grid: &mut Tilemap<AbyssTile>, mask: &PreservationMask) -> usize {
    let mut wiped = 0;
    for (pos, tile) in grid.iter_mut() {
        if !mask.contains(pos) && *tile != AbyssTile::default() {
            tile.wipe();
            wiped += 1;
        }
    }
    wiped
}

/// Move every tile inside `mask` by `delta`. Tiles whose destination is
/// outside the window are dropped. Returns how many tiles landed.
///
/// Each axis is swept from the side the tiles move towards, so a source is
/// always read before anything is written over it.
pub fn relocate_preserved(grid: &mut Tilemap<AbyssTile>, mask: &PreservationMask, delta: WindowDelta) -> usize {
    if delta.is_zero() {
        return mask.count();
    }

    let xs: Vec<i32> = if delta.dx > 0 {
        (0..grid.width as i32).rev().collect()
    } else {
        (0..grid.width as i32).collect()
    };
    let ys: Vec<i32> = if delta.dy > 0 {
        (0..grid.height as i32).rev().collect()
    } else {
        (0..grid.height as i32).collect()
    };

    let mut landed = 0;
    for &y in &ys {
        for &x in &xs {
            let from = WindowPos::new(x, y);
            if !mask.contains(from) {
                continue;
            }
            let tile = grid.take(from).unwrap_or_default();
            if grid.set(from + delta, tile) {
                landed += 1;
            }
        }
    }
    landed
}

/// What a shift should do
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShiftPlan {
    /// Window position that becomes the new centre
    pub anchor: WindowPos,
    /// Radius of the disk kept around the player
    pub preserve_radius: i32,
    /// Jump the origin here instead of following the anchor (teleport)
    pub new_origin: Option<AbsCoord>,
}

/// Everything a shift did
#[derive(Clone, Debug, PartialEq)]
pub struct ShiftReport {
    /// How far the window moved over the plane; tiles moved by the negation
    pub displacement: WindowDelta,
    /// Preserved tiles, at their new positions
    pub preserved_mask: PreservationMask,
    pub preserved: usize,
    /// Size of the region handed to the regenerator
    pub regenerated: usize,
    pub monsters_relocated: usize,
    pub monsters_destroyed: usize,
    pub monsters_to_limbo: usize,
    pub items_relocated: usize,
    pub items_destroyed: usize,
    pub items_spawned: usize,
    pub monsters_spawned: usize,
    pub fragments_discarded: usize,
}

impl ShiftReport {
    fn absorb(&mut self, tally: &EntityTally) {
        self.monsters_relocated += tally.monsters_relocated;
        self.monsters_destroyed += tally.monsters_destroyed;
        self.monsters_to_limbo += tally.monsters_to_limbo;
        self.items_relocated += tally.items_relocated;
        self.items_destroyed += tally.items_destroyed;
    }
}

impl Abyss {
    /// Shift if the player has come within the safety margin of the edge
    pub fn request_shift_if_needed(
        &mut self,
        player: WindowPos,
        population: &mut dyn Population,
    ) -> Option<ShiftReport> {
        self.set_player_pos(player);
        let margin = self.config.shift_margin;
        let near_edge = player.x < margin
            || player.y < margin
            || player.x >= self.grid.width as i32 - margin
            || player.y >= self.grid.height as i32 - margin;
        near_edge.then(|| self.shift_to(player, population))
    }

    /// Make `anchor` the new window centre, keeping the area around the player
    pub fn shift_to(&mut self, anchor: WindowPos, population: &mut dyn Population) -> ShiftReport {
        let plan = ShiftPlan {
            anchor,
            preserve_radius: self.config.effective_preserve_radius(),
            new_origin: None,
        };
        self.shift_window(plan, population)
    }

    /// Run every shift phase in order. Never fails.
    pub fn shift_window(&mut self, plan: ShiftPlan, population: &mut dyn Population) -> ShiftReport {
        let center = self.center();
        let bounds = WindowPos::new(self.grid.width as i32 - 1, self.grid.height as i32 - 1);

        // The player must land inside the window, whatever the anchor
        let wanted = self.player + (center - plan.anchor);
        let landed = WindowPos::new(wanted.x.clamp(0, bounds.x), wanted.y.clamp(0, bounds.y));
        let tile_delta = landed - self.player;
        let displacement = -tile_delta;

        debug!(
            anchor = %plan.anchor,
            dx = displacement.dx,
            dy = displacement.dy,
            jump = plan.new_origin.is_some(),
            "shifting abyss window"
        );

        self.scheduler.clear();
        self.displaced.clear();
        let mut tally = EntityTally::default();
        let mut monster_queue = Vec::new();
        let mut item_queue = Vec::new();

        // 1. What survives
        let mask = build_preservation_mask(&self.grid, &self.fragments, self.player, plan.preserve_radius.max(0));

        // 2. Preserved tiles keep their absolute coordinates
        let origin = plan
            .new_origin
            .unwrap_or(self.state.origin_offset + displacement);
        self.state.origin_offset = origin;
        self.sampler.recenter(origin);

        // 3. Wipe everything else
        wipe_outside(&mut self.grid, &mask);
        relocate::evict_outside(population, &mask, &mut monster_queue, &mut item_queue, &mut tally);

        // 4. Carry the preserved region
        relocate_preserved(&mut self.grid, &mask, tile_delta);
        relocate::carry_preserved(
            population,
            &mask,
            tile_delta,
            &self.grid,
            &mut monster_queue,
            &mut item_queue,
            &mut tally,
        );
        self.fragments.translate(tile_delta);
        self.player = landed;

        // 5. Nothing may linger outside the moved region
        let preserved_mask = mask.shifted(tile_delta);
        wipe_outside(&mut self.grid, &preserved_mask);

        // 6. What must be regenerated
        let mut region = preserved_mask.clone();
        region.invert();

        if plan.new_origin.is_some() {
            // Same tiles, different place in the plane: resample them soon
            for pos in preserved_mask.positions() {
                let tile = self.grid.at_mut(pos);
                if !tile.is_authored() {
                    tile.sampled_at = None;
                }
            }
        } else {
            self.reschedule(|pos, _| preserved_mask.contains(pos));
        }

        // 7. Fresh terrain and content
        let spawned = self.regenerate(&region, population);

        // 8. Orphaned fragments; unique names stay used
        let fragments_discarded = self.fragments.discard_unreferenced(&self.grid);

        // 9. Rehome everything that was queued
        relocate::queue_stranded(population, &self.grid, &mut monster_queue);
        let radius = (self.grid.width.max(self.grid.height)) as i32;
        relocate::rehome_monsters(population, &self.grid, &monster_queue, Some(self.player), self.player, radius, &mut tally);
        relocate::rehome_items(population, &self.grid, &item_queue, self.player, radius, &mut tally);

        let mut report = ShiftReport {
            displacement,
            preserved: preserved_mask.count(),
            regenerated: region.count(),
            preserved_mask,
            monsters_relocated: 0,
            monsters_destroyed: 0,
            monsters_to_limbo: 0,
            items_relocated: 0,
            items_destroyed: 0,
            items_spawned: spawned.items,
            monsters_spawned: spawned.monsters,
            fragments_discarded,
        };
        report.absorb(&tally);

        info!(
            origin = %self.state.origin_offset,
            preserved = report.preserved,
            regenerated = report.regenerated,
            destroyed = report.monsters_destroyed,
            limbo = report.monsters_to_limbo,
            "abyss window shifted"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::filled;
    use super::*;
    use crate::layout::Layout;
    use crate::population::{Habitat, ItemCategory, Roster, SpawnFlags};
    use crate::terrain::Feature;
    use crate::vaults::FragmentId;

    #[test]
    fn test_inverted_disk_has_window_minus_disk() {
        let mut mask = PreservationMask::disk(80, 80, WindowPos::new(40, 40), 8);
        let disk_area = (-8i32..=8)
            .flat_map(|dy| (-8i32..=8).map(move |dx| (dx, dy)))
            .filter(|(dx, dy)| dx * dx + dy * dy <= 64)
            .count();
        assert_eq!(disk_area, 197);
        assert_eq!(mask.count(), disk_area);
        mask.invert();
        assert_eq!(mask.count(), 80 * 80 - disk_area);
    }

    #[test]
    fn test_mask_swallows_touching_fragment() {
        let mut grid = Tilemap::new_with(30, 30, AbyssTile::sampled(Feature::Floor, 0));
        // A 3x3 fragment straddling the disk edge
        for y in 10..13 {
            for x in 19..22 {
                grid.at_mut(WindowPos::new(x, y)).fragment = Some(FragmentId(7));
            }
        }
        let mask = build_preservation_mask(&grid, &FragmentRegistry::new(), WindowPos::new(15, 11), 4);
        for y in 10..13 {
            for x in 19..22 {
                assert!(mask.contains(WindowPos::new(x, y)));
            }
        }
    }

    #[test]
    fn test_relocation_handles_overlap_in_every_direction() {
        for delta in [
            WindowDelta::new(3, 0),
            WindowDelta::new(-3, 0),
            WindowDelta::new(0, 2),
            WindowDelta::new(-2, -5),
            WindowDelta::new(4, 4),
        ] {
            let mut grid: Tilemap<AbyssTile> = Tilemap::new(20, 20);
            for (pos, tile) in grid.iter_mut() {
                tile.sampled_at = Some((pos.y * 100 + pos.x) as u64);
            }
            let mask = PreservationMask::disk(20, 20, WindowPos::new(10, 10), 5);
            let landed = relocate_preserved(&mut grid, &mask, delta);
            assert_eq!(landed, mask.count());

            let moved = mask.shifted(delta);
            wipe_outside(&mut grid, &moved);
            for pos in mask.positions() {
                let dest = pos + delta;
                assert_eq!(grid.at(dest).sampled_at, Some((pos.y * 100 + pos.x) as u64), "delta {:?}", delta);
            }
            assert_eq!(grid.iter().filter(|(_, t)| t.sampled_at.is_some()).count(), mask.count());
        }
    }

    #[test]
    fn test_tiles_pushed_off_window_are_dropped() {
        let mut grid: Tilemap<AbyssTile> = Tilemap::new_with(10, 10, AbyssTile::sampled(Feature::Floor, 1));
        let mask = PreservationMask::disk(10, 10, WindowPos::new(7, 5), 1);
        let landed = relocate_preserved(&mut grid, &mask, WindowDelta::new(2, 0));
        assert_eq!(landed, mask.count() - 1);
    }

    #[test]
    fn test_every_tile_is_preserved_xor_regenerated() {
        let mut abyss = filled(80, 80, Layout::Plain(Feature::Floor), Feature::RockWall);
        let mut roster = Roster::new();
        abyss.set_player_pos(WindowPos::new(60, 45));
        let report = abyss.shift_to(WindowPos::new(60, 45), &mut roster);

        let mut region = report.preserved_mask.clone();
        region.invert();
        assert_eq!(report.preserved + report.regenerated, 80 * 80);
        for pos in abyss.grid.positions() {
            assert!(report.preserved_mask.contains(pos) != region.contains(pos));
            let feature = abyss.grid.at(pos).feature;
            if report.preserved_mask.contains(pos) {
                assert_eq!(feature, Feature::RockWall);
            } else {
                assert_eq!(feature, Feature::Floor);
            }
        }
        assert_eq!(abyss.player_pos(), abyss.center());
    }

    #[test]
    fn test_consecutive_shifts_are_additive() {
        let mut abyss = filled(80, 80, Layout::Plain(Feature::Floor), Feature::Floor);
        let mut roster = Roster::new();
        // A fragment right next to the player
        let player = abyss.player_pos();
        for y in 0..3 {
            for x in 0..3 {
                abyss.grid.at_mut(WindowPos::new(player.x + 2 + x, player.y + y)).fragment = Some(FragmentId(1));
            }
        }
        let start = abyss.state.origin_offset;

        let first = abyss.shift_to(WindowPos::new(50, 40), &mut roster);
        let second = abyss.shift_to(WindowPos::new(35, 47), &mut roster);

        let total = first.displacement + second.displacement;
        assert_eq!(abyss.state.origin_offset, start + total);
        assert_eq!(total, WindowDelta::new(10 - 5, 0 + 7));

        let owned = abyss.grid.iter().filter(|(_, t)| t.fragment == Some(FragmentId(1))).count();
        assert_eq!(owned, 9);
    }

    #[test]
    fn test_preserved_tiles_keep_absolute_coordinates() {
        let mut abyss = filled(60, 60, Layout::Plain(Feature::Floor), Feature::Floor);
        let mut roster = Roster::new();
        let marked = WindowPos::new(33, 30);
        abyss.grid.at_mut(marked).feature = Feature::CrystalWall;
        let abs = abyss.abs_coord(marked);

        abyss.shift_to(WindowPos::new(45, 20), &mut roster);
        let now = abyss.window_pos(abs).unwrap();
        assert_eq!(abyss.grid.at(now).feature, Feature::CrystalWall);
    }

    #[test]
    fn test_entities_are_conserved() {
        let mut abyss = filled(80, 80, Layout::Plain(Feature::Floor), Feature::Floor);
        let mut roster = Roster::new();
        let player = abyss.player_pos();
        let near = player + WindowDelta::new(2, 1);
        roster.spawn_monster("imp", near, SpawnFlags::default());
        roster.spawn_monster("wretch", WindowPos::new(2, 2), SpawnFlags::default());
        let hound = SpawnFlags { pursuing: true, ..SpawnFlags::default() };
        roster.spawn_monster("hound", WindowPos::new(75, 3), hound);
        let ally = SpawnFlags { friendly: true, habitat: Habitat::Flying, ..SpawnFlags::default() };
        roster.spawn_monster("familiar", WindowPos::new(70, 70), ally);
        roster.spawn_item(ItemCategory::Gold, WindowPos::new(1, 78), 1);
        roster.spawn_item(ItemCategory::Potion, near, 1);
        roster.spawn_item(ItemCategory::Rune, WindowPos::new(79, 0), 3);

        let monsters_before = roster.monster_count();
        let items_before = roster.item_count();
        let report = abyss.shift_to(WindowPos::new(60, 40), &mut roster);

        assert_eq!(
            roster.monster_count(),
            monsters_before - report.monsters_destroyed - report.monsters_to_limbo + report.monsters_spawned
        );
        assert_eq!(roster.item_count(), items_before - report.items_destroyed + report.items_spawned);
        // The wretch is destroyed; the hound and the familiar are rehomed
        assert_eq!(report.monsters_destroyed, 1);
        assert_eq!(report.monsters_relocated, 2);
        assert_eq!(report.items_destroyed, 1);
        assert!(roster.items().iter().any(|i| i.category == ItemCategory::Rune));
        // The imp moved with its tile
        assert!(roster.monster_at(near + WindowDelta::new(-20, 0)).is_some());
    }

    fn allow_box(width: usize, height: usize, xs: std::ops::Range<i32>, ys: std::ops::Range<i32>) -> Tilemap<bool> {
        let mut allowed = Tilemap::new_with(width, height, false);
        for y in ys {
            for x in xs.clone() {
                allowed.set(WindowPos::new(x, y), true);
            }
        }
        allowed
    }

    #[test]
    fn test_shift_keeps_near_vault_and_forgets_far_one() {
        let mut abyss = filled(80, 80, Layout::Plain(Feature::Floor), Feature::Floor);
        let mut roster = Roster::new();

        let near = abyss
            .fragments
            .place_fragment(
                &crate::vaults::prefabs::pillar_hall(),
                &allow_box(80, 80, 41..49, 37..45),
                &mut abyss.grid,
                &mut abyss.rng,
                10_000,
            )
            .unwrap();
        let far = abyss
            .fragments
            .place_fragment(
                &crate::vaults::prefabs::petrified_grove(),
                &allow_box(80, 80, 70..80, 0..10),
                &mut abyss.grid,
                &mut abyss.rng,
                10_000,
            )
            .unwrap();
        assert_eq!(abyss.fragments.len(), 2);

        let report = abyss.shift_to(WindowPos::new(60, 40), &mut roster);
        assert_eq!(report.fragments_discarded, 1);
        assert_eq!(abyss.fragments.len(), 1);
        assert!(abyss.fragments.get(far.id).is_none());
        assert!(abyss.fragments.is_unique_used("petrified_grove"));

        let kept = abyss.fragments.get(near.id).unwrap();
        assert_eq!(kept.origin, near.origin + WindowDelta::new(-20, 0));
        let owned = abyss.grid.iter().filter(|(_, t)| t.fragment == Some(near.id)).count();
        assert_eq!(owned, near.area());
        assert!(abyss.grid.iter().all(|(_, t)| t.fragment != Some(far.id)));
    }

    #[test]
    fn test_carried_monster_on_hostile_ground_is_rehomed() {
        let mut abyss = filled(80, 80, Layout::Plain(Feature::Floor), Feature::Floor);
        let mut roster = Roster::new();
        let lava = abyss.player_pos() + WindowDelta::new(3, 0);
        abyss.grid.at_mut(lava).feature = Feature::Lava;
        let orc = roster.spawn_monster("orc", lava, SpawnFlags::default()).unwrap();

        let report = abyss.shift_to(WindowPos::new(50, 40), &mut roster);
        let moved_lava = lava + WindowDelta::new(-10, 0);
        assert_eq!(abyss.grid.at(moved_lava).feature, Feature::Lava);
        assert_eq!(report.monsters_relocated, 1);
        assert_eq!(report.monsters_destroyed, 0);
        let pos = roster.monster(orc).unwrap().pos;
        assert!(Habitat::Land.can_occupy(abyss.grid.at(pos).feature));
        assert_ne!(pos, abyss.player_pos());
    }
}
