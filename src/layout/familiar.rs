//! Familiar geometry borrowed from an ordinary dungeon level.
//!
//! The Abyss occasionally drifts through a copy of a real level. The game can
//! hand over any generated level as a [`LevelSnapshot`]; when it does not,
//! [`generate_familiar_level`] builds a plain rooms-and-corridors level with
//! binary space partitioning.

use std::sync::Arc;

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::coords::WindowPos;
use crate::terrain::Feature;
use crate::tilemap::Tilemap;

/// Minimum leaf size for BSP generation
const MIN_LEAF_SIZE: usize = 8;

/// Ratio to split (how uneven splits can be)
const SPLIT_RATIO_MIN: f32 = 0.35;
const SPLIT_RATIO_MAX: f32 = 0.65;

/// A read-only copy of an already generated level's terrain
#[derive(Clone, Debug, PartialEq)]
pub struct LevelSnapshot {
    tiles: Tilemap<Feature>,
}

impl LevelSnapshot {
    /// Wrap a generated level. Protected features are flattened to floor so a
    /// borrowed copy never duplicates exits or altars.
    pub fn new(tiles: Tilemap<Feature>) -> Self {
        let tiles = tiles.map(|f| match f {
            f if f.is_protected() => Feature::Floor,
            Feature::Unseen => Feature::RockWall,
            other => *other,
        });
        LevelSnapshot { tiles }
    }

    pub fn width(&self) -> usize {
        self.tiles.width
    }

    pub fn height(&self) -> usize {
        self.tiles.height
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.width == 0 || self.tiles.height == 0
    }

    /// Feature at a position, tiling the snapshot over the whole plane.
    /// An empty snapshot reads as solid rock.
    pub fn feature_at(&self, x: i64, y: i64) -> Feature {
        let px = x.checked_rem_euclid(self.tiles.width as i64);
        let py = y.checked_rem_euclid(self.tiles.height as i64);
        match (px, py) {
            (Some(px), Some(py)) => *self.tiles.at(WindowPos::new(px as i32, py as i32)),
            _ => Feature::RockWall,
        }
    }
}

#[derive(Clone, Debug)]
struct BspNode {
    x: usize,
    y: usize,
    width: usize,
    height: usize,
    left: Option<Box<BspNode>>,
    right: Option<Box<BspNode>>,
    room: Option<Room>,
}

#[derive(Clone, Copy, Debug)]
struct Room {
    x: usize,
    y: usize,
    width: usize,
    height: usize,
}

impl Room {
    fn center(&self) -> (usize, usize) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }
}

impl BspNode {
    fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        BspNode { x, y, width, height, left: None, right: None, room: None }
    }

    fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    /// Any room inside this subtree, used as a corridor endpoint
    fn any_room(&self) -> Option<Room> {
        self.room
            .or_else(|| self.left.as_ref().and_then(|n| n.any_room()))
            .or_else(|| self.right.as_ref().and_then(|n| n.any_room()))
    }
}

/// Recursively split a BSP node
fn split_node(node: &mut BspNode, rng: &mut ChaCha8Rng) {
    if node.width < MIN_LEAF_SIZE * 2 && node.height < MIN_LEAF_SIZE * 2 {
        return;
    }

    // Prefer splitting the longer dimension
    let split_h = if node.width as f32 >= node.height as f32 * 1.25 {
        false
    } else if node.height as f32 >= node.width as f32 * 1.25 {
        true
    } else {
        rng.gen_bool(0.5)
    };

    if split_h && node.height < MIN_LEAF_SIZE * 2 {
        return;
    }
    if !split_h && node.width < MIN_LEAF_SIZE * 2 {
        return;
    }

    let ratio = rng.gen_range(SPLIT_RATIO_MIN..SPLIT_RATIO_MAX);

    let (mut left, mut right) = if split_h {
        let split_y = node.y + (node.height as f32 * ratio) as usize;
        let split_y = split_y
            .max(node.y + MIN_LEAF_SIZE)
            .min(node.y + node.height - MIN_LEAF_SIZE);
        (
            BspNode::new(node.x, node.y, node.width, split_y - node.y),
            BspNode::new(node.x, split_y, node.width, node.y + node.height - split_y),
        )
    } else {
        let split_x = node.x + (node.width as f32 * ratio) as usize;
        let split_x = split_x
            .max(node.x + MIN_LEAF_SIZE)
            .min(node.x + node.width - MIN_LEAF_SIZE);
        (
            BspNode::new(node.x, node.y, split_x - node.x, node.height),
            BspNode::new(split_x, node.y, node.x + node.width - split_x, node.height),
        )
    };

    split_node(&mut left, rng);
    split_node(&mut right, rng);
    node.left = Some(Box::new(left));
    node.right = Some(Box::new(right));
}

/// Carve a room into each leaf and a corridor between every pair of siblings
fn carve(node: &mut BspNode, tiles: &mut Tilemap<Feature>, rng: &mut ChaCha8Rng) {
    if node.is_leaf() {
        let padding = 1;
        let room_width = rng.gen_range(3..=(node.width - padding * 2).max(3));
        let room_height = rng.gen_range(3..=(node.height - padding * 2).max(3));
        let room_x = node.x + rng.gen_range(padding..=(node.width - room_width - padding).max(padding));
        let room_y = node.y + rng.gen_range(padding..=(node.height - room_height - padding).max(padding));
        let room = Room { x: room_x, y: room_y, width: room_width, height: room_height };

        for y in room.y..room.y + room.height {
            for x in room.x..room.x + room.width {
                tiles.set(WindowPos::new(x as i32, y as i32), Feature::Floor);
            }
        }
        node.room = Some(room);
        return;
    }

    if let Some(left) = node.left.as_mut() {
        carve(left, tiles, rng);
    }
    if let Some(right) = node.right.as_mut() {
        carve(right, tiles, rng);
    }

    let a = node.left.as_ref().and_then(|n| n.any_room());
    let b = node.right.as_ref().and_then(|n| n.any_room());
    if let (Some(a), Some(b)) = (a, b) {
        carve_corridor(tiles, a.center(), b.center(), rng.gen_bool(0.5));
    }
}

/// L-shaped corridor between two points
fn carve_corridor(
    tiles: &mut Tilemap<Feature>,
    from: (usize, usize),
    to: (usize, usize),
    horizontal_first: bool,
) {
    let corner = if horizontal_first { (to.0, from.1) } else { (from.0, to.1) };
    for (a, b) in [(from, corner), (corner, to)] {
        let (x0, x1) = (a.0.min(b.0), a.0.max(b.0));
        let (y0, y1) = (a.1.min(b.1), a.1.max(b.1));
        for y in y0..=y1 {
            for x in x0..=x1 {
                tiles.set(WindowPos::new(x as i32, y as i32), Feature::Floor);
            }
        }
    }
}

/// Generate an ordinary rooms-and-corridors level to borrow geometry from
pub fn generate_familiar_level(width: usize, height: usize, seed: u64) -> Arc<LevelSnapshot> {
    let width = width.max(MIN_LEAF_SIZE * 2);
    let height = height.max(MIN_LEAF_SIZE * 2);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut tiles = Tilemap::new_with(width, height, Feature::RockWall);

    let mut root = BspNode::new(1, 1, width - 2, height - 2);
    split_node(&mut root, &mut rng);
    carve(&mut root, &mut tiles, &mut rng);

    // A few pillars and pools so the copy is recognisably lived-in
    let decorations = (width * height) / 400;
    for _ in 0..decorations {
        let pos = WindowPos::new(
            rng.gen_range(0..width) as i32,
            rng.gen_range(0..height) as i32,
        );
        if *tiles.at(pos) == Feature::Floor {
            let feature = if rng.gen_bool(0.5) { Feature::StoneWall } else { Feature::ShallowWater };
            tiles.set(pos, feature);
        }
    }

    Arc::new(LevelSnapshot::new(tiles))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_familiar_level_has_rooms() {
        let level = generate_familiar_level(60, 40, 7);
        let mut floors = 0;
        for y in 0..40 {
            for x in 0..60 {
                if level.feature_at(x, y) == Feature::Floor {
                    floors += 1;
                }
            }
        }
        assert!(floors > 60 * 40 / 10, "only {} floor tiles", floors);
    }

    #[test]
    fn test_snapshot_tiles_the_plane() {
        let level = generate_familiar_level(30, 20, 1);
        assert_eq!(level.feature_at(3, 4), level.feature_at(33, 24));
        assert_eq!(level.feature_at(-1, -1), level.feature_at(29, 19));
    }

    #[test]
    fn test_snapshot_strips_protected_features() {
        let mut tiles = Tilemap::new_with(4, 4, Feature::Floor);
        tiles.set(WindowPos::new(1, 1), Feature::ExitAbyss);
        tiles.set(WindowPos::new(2, 2), Feature::Altar);
        let snapshot = LevelSnapshot::new(tiles);
        assert_eq!(snapshot.feature_at(1, 1), Feature::Floor);
        assert_eq!(snapshot.feature_at(2, 2), Feature::Floor);
    }

    #[test]
    fn test_empty_snapshot_reads_as_rock() {
        let snapshot = LevelSnapshot::new(Tilemap::new_with(0, 5, Feature::Floor));
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.feature_at(7, -3), Feature::RockWall);
    }

    #[test]
    fn test_generation_is_deterministic() {
        assert_eq!(generate_familiar_level(40, 30, 99), generate_familiar_level(40, 30, 99));
    }
}
