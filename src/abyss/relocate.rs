//! Keeping monsters and items consistent with terrain that moves or mutates.

use std::collections::BTreeSet;

use tracing::debug;

use super::shift::PreservationMask;
use super::AbyssTile;
use crate::coords::{WindowDelta, WindowPos};
use crate::population::{ItemCategory, ItemId, MonsterId, MonsterRecord, Population};
use crate::terrain::Feature;
use crate::tilemap::Tilemap;

/// Entity bookkeeping for one shift or tick
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EntityTally {
    /// Queued monsters given a new tile
    pub monsters_relocated: usize,
    pub monsters_destroyed: usize,
    pub monsters_to_limbo: usize,
    /// Queued or stranded items given a new tile
    pub items_relocated: usize,
    pub items_destroyed: usize,
}

/// Nearest position within `radius` (king moves) of `from` satisfying `accept`.
/// Rings are searched outwards; inside a ring the Euclidean-closest wins.
pub fn nearest_tile<F>(grid: &Tilemap<AbyssTile>, from: WindowPos, radius: i32, accept: F) -> Option<WindowPos>
where
    F: Fn(WindowPos, &AbyssTile) -> bool,
{
    for r in 0..=radius.max(0) {
        let mut best: Option<WindowPos> = None;
        for dy in -r..=r {
            for dx in -r..=r {
                if dx.abs() != r && dy.abs() != r {
                    continue;
                }
                let pos = WindowPos::new(from.x + dx, from.y + dy);
                let Some(tile) = grid.get(pos) else { continue };
                if !accept(pos, tile) {
                    continue;
                }
                let closer = best.map_or(true, |b| pos.distance_sq(from) < b.distance_sq(from));
                if closer {
                    best = Some(pos);
                }
            }
        }
        if best.is_some() {
            return best;
        }
    }
    None
}

/// Monsters and items outside the mask. Monsters that follow the player and
/// the rune are queued; everything else is destroyed.
pub(crate) fn evict_outside(
    population: &mut dyn Population,
    mask: &PreservationMask,
    monster_queue: &mut Vec<MonsterId>,
    item_queue: &mut Vec<ItemId>,
    tally: &mut EntityTally,
) {
    for monster in population.monsters() {
        if !mask.contains(monster.pos) {
            drop_monster(population, &monster, monster_queue, tally);
        }
    }
    for item in population.items() {
        if mask.contains(item.pos) {
            continue;
        }
        if item.category == ItemCategory::Rune {
            item_queue.push(item.id);
        } else {
            population.destroy_item(item.id);
            tally.items_destroyed += 1;
        }
    }
}

fn drop_monster(
    population: &mut dyn Population,
    monster: &MonsterRecord,
    monster_queue: &mut Vec<MonsterId>,
    tally: &mut EntityTally,
) {
    if monster.follows_player() {
        monster_queue.push(monster.id);
    } else {
        debug!(id = monster.id.0, kind = %monster.kind, "monster lost to the abyss");
        population.destroy_monster(monster.id);
        tally.monsters_destroyed += 1;
    }
}

/// Move the monsters and items of the preserved region along with its tiles
pub(crate) fn carry_preserved(
    population: &mut dyn Population,
    mask: &PreservationMask,
    delta: WindowDelta,
    grid: &Tilemap<AbyssTile>,
    monster_queue: &mut Vec<MonsterId>,
    item_queue: &mut Vec<ItemId>,
    tally: &mut EntityTally,
) {
    for monster in population.monsters() {
        if !mask.contains(monster.pos) {
            continue;
        }
        let dest = monster.pos + delta;
        if grid.in_bounds(dest) {
            population.relocate_monster(monster.id, dest);
        } else {
            drop_monster(population, &monster, monster_queue, tally);
        }
    }
    for item in population.items() {
        if !mask.contains(item.pos) {
            continue;
        }
        let dest = item.pos + delta;
        if grid.in_bounds(dest) {
            population.relocate_item(item.id, dest);
        } else if item.category == ItemCategory::Rune {
            item_queue.push(item.id);
        } else {
            population.destroy_item(item.id);
            tally.items_destroyed += 1;
        }
    }
}

/// Queue every monster standing on terrain it cannot survive
pub(crate) fn queue_stranded(population: &dyn Population, grid: &Tilemap<AbyssTile>, queue: &mut Vec<MonsterId>) {
    for monster in population.monsters() {
        let stranded = grid
            .get(monster.pos)
            .map_or(true, |t| !monster.habitat.can_occupy(t.feature));
        if stranded && !queue.contains(&monster.id) {
            queue.push(monster.id);
        }
    }
}

/// Find new tiles for queued monsters: near `anchor` if given, otherwise near
/// the monster itself. Monsters that follow the player go to limbo when no
/// tile is free; the rest are destroyed.
pub(crate) fn rehome_monsters(
    population: &mut dyn Population,
    grid: &Tilemap<AbyssTile>,
    queue: &[MonsterId],
    anchor: Option<WindowPos>,
    player: WindowPos,
    radius: i32,
    tally: &mut EntityTally,
) {
    if queue.is_empty() {
        return;
    }
    let queued: BTreeSet<MonsterId> = queue.iter().copied().collect();
    let mut occupied: BTreeSet<WindowPos> = population
        .monsters()
        .iter()
        .filter(|m| !queued.contains(&m.id))
        .map(|m| m.pos)
        .collect();
    occupied.insert(player);

    for &id in queue {
        let Some(monster) = population.monster(id) else { continue };
        // Terrain may have turned back in its favour
        if anchor.is_none()
            && grid.get(monster.pos).map_or(false, |t| monster.habitat.can_occupy(t.feature))
            && !occupied.contains(&monster.pos)
        {
            occupied.insert(monster.pos);
            continue;
        }

        let from = anchor.unwrap_or(monster.pos);
        let home = nearest_tile(grid, from, radius, |pos, tile| {
            !occupied.contains(&pos) && monster.habitat.can_occupy(tile.feature)
        });
        match home {
            Some(pos) => {
                population.relocate_monster(id, pos);
                occupied.insert(pos);
                tally.monsters_relocated += 1;
            }
            None if monster.follows_player() => {
                debug!(id = id.0, kind = %monster.kind, "no room; monster sent to limbo");
                population.send_to_limbo(id);
                tally.monsters_to_limbo += 1;
            }
            None => {
                debug!(id = id.0, kind = %monster.kind, "no room; monster destroyed");
                population.destroy_monster(id);
                tally.monsters_destroyed += 1;
            }
        }
    }
}

/// Put queued items on the nearest walkable tile to `player`. Items that
/// cannot be placed anywhere land on the player's own tile.
pub(crate) fn rehome_items(
    population: &mut dyn Population,
    grid: &Tilemap<AbyssTile>,
    queue: &[ItemId],
    player: WindowPos,
    radius: i32,
    tally: &mut EntityTally,
) {
    for &id in queue {
        let home = nearest_tile(grid, player, radius, |pos, tile| pos != player && tile.feature.is_walkable())
            .unwrap_or(player);
        population.relocate_item(id, home);
        tally.items_relocated += 1;
    }
}

/// Push items off solid terrain to the nearest open tile, destroying those
/// with nowhere to go. The rune always survives.
pub(crate) fn push_stranded_items(
    population: &mut dyn Population,
    grid: &Tilemap<AbyssTile>,
    player: WindowPos,
    radius: i32,
    tally: &mut EntityTally,
) {
    for item in population.items() {
        let solid = grid.get(item.pos).map_or(true, |t| t.feature.is_solid());
        if !solid {
            continue;
        }
        let open = |_: WindowPos, tile: &AbyssTile| !tile.feature.is_solid() && tile.feature != Feature::Unseen;
        match nearest_tile(grid, item.pos, radius, open) {
            Some(pos) => {
                population.relocate_item(item.id, pos);
                tally.items_relocated += 1;
            }
            None if item.category == ItemCategory::Rune => {
                population.relocate_item(item.id, player);
                tally.items_relocated += 1;
            }
            None => {
                population.destroy_item(item.id);
                tally.items_destroyed += 1;
            }
        }
    }
}
