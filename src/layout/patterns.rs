//! Leaf patterns behind the [`Layout`](super::Layout) variants.
//!
//! Lattices and borrowed geometry never change with depth and report a long
//! static interval. Noise-driven patterns estimate their changepoint from the
//! distance to the nearest threshold, assuming Perlin noise never moves faster
//! than `NOISE_SLOPE` per unit of z.

use noise::{NoiseFn, Perlin, Seedable};

use super::worley::cell_noise;
use super::{LevelSnapshot, ProceduralSample, DEPTH_SCALE, STATIC_INTERVAL};
use crate::coords::AbsCoord;
use crate::seeds::{child_seed, hash01, hash3};
use crate::terrain::Feature;

/// Upper bound on how fast the noise field moves per unit z
const NOISE_SLOPE: f64 = 2.5;

fn static_sample(coord: AbsCoord, depth: u64, feature: Feature) -> ProceduralSample {
    ProceduralSample::new(coord, feature, depth.saturating_add(STATIC_INTERVAL))
}

/// Changepoint for a noise value sitting `margin` away from its nearest threshold
fn noise_changepoint(depth: u64, margin: f64, z_scale: f64) -> u64 {
    let steps = (margin.abs() / (NOISE_SLOPE * z_scale) * DEPTH_SCALE).floor() as u64;
    depth.saturating_add(steps.clamp(1, STATIC_INTERVAL))
}

pub(super) fn diamond(
    coord: AbsCoord,
    depth: u64,
    width: u32,
    height: u32,
    wall: Feature,
) -> ProceduralSample {
    let w = width.max(2) as i64;
    let h = height.max(2) as i64;
    let lx = coord.x.rem_euclid(w) as f64 + 0.5 - w as f64 / 2.0;
    let ly = coord.y.rem_euclid(h) as f64 + 0.5 - h as f64 / 2.0;
    let inside = lx.abs() / (w as f64 / 2.0) + ly.abs() / (h as f64 / 2.0) < 1.0;
    static_sample(coord, depth, if inside { Feature::Floor } else { wall })
}

pub(super) fn column(
    coord: AbsCoord,
    depth: u64,
    column: u32,
    spacing: u32,
    wall: Feature,
) -> ProceduralSample {
    let column = column.max(1) as i64;
    let period = column + spacing.max(1) as i64;
    let is_pillar = coord.x.rem_euclid(period) < column && coord.y.rem_euclid(period) < column;
    static_sample(coord, depth, if is_pillar { wall } else { Feature::Floor })
}

pub(super) fn chaos(
    coord: AbsCoord,
    depth: u64,
    seed: u64,
    density: f64,
    period: u64,
) -> ProceduralSample {
    let period = period.max(1);
    let epoch = depth / period;
    let roll = hash01(seed, coord.x, coord.y, epoch as i64);
    let feature = if roll < density {
        match hash3(child_seed(seed, 1), coord.x, coord.y, epoch as i64) % 4 {
            0 => Feature::StoneWall,
            1 => Feature::CrystalWall,
            _ => Feature::RockWall,
        }
    } else {
        Feature::Floor
    };
    let last_of_epoch = epoch.saturating_add(1).saturating_mul(period).saturating_sub(1);
    ProceduralSample::new(coord, feature, last_of_epoch)
}

pub(super) fn roiling(
    coord: AbsCoord,
    depth: u64,
    noise: &Perlin,
    scale: f64,
    threshold: f64,
) -> ProceduralSample {
    let x = coord.x as f64 / scale;
    let y = coord.y as f64 / scale;
    let z = depth as f64 / DEPTH_SCALE;
    let v = noise.get([x, y, z]);

    let feature = if v > threshold {
        // Second octave picks the material so neighbouring blobs differ
        let material = noise.get([x * 2.0 + 101.3, y * 2.0 - 47.9, z]);
        if material > 0.3 {
            Feature::CrystalWall
        } else if material < -0.3 {
            Feature::Lava
        } else {
            Feature::RockWall
        }
    } else {
        Feature::Floor
    };

    ProceduralSample::new(coord, feature, noise_changepoint(depth, v - threshold, 1.0))
}

pub(super) fn river(
    coord: AbsCoord,
    depth: u64,
    noise: &Perlin,
    scale: f64,
    width: f64,
) -> ProceduralSample {
    // Rivers drift four times slower than the roiling rock
    let z = depth as f64 / DEPTH_SCALE * 0.25;
    let v = noise.get([coord.x as f64 / scale, coord.y as f64 / scale, z]).abs();

    let (feature, margin) = if v < width * 0.5 {
        (Feature::DeepWater, width * 0.5 - v)
    } else if v < width {
        (Feature::ShallowWater, (width - v).min(v - width * 0.5))
    } else {
        (Feature::Floor, v - width)
    };
    ProceduralSample::new(coord, feature, noise_changepoint(depth, margin, 0.25))
}

pub(super) fn city(
    coord: AbsCoord,
    depth: u64,
    seed: u64,
    scale: f64,
    wall_width: f64,
    door_chance: f64,
) -> ProceduralSample {
    let cell = cell_noise(seed, coord.x as f64 / scale, coord.y as f64 / scale, 0.0);
    let feature = if cell.ridge() * scale < wall_width {
        if hash01(child_seed(seed, 1), coord.x, coord.y, 0) < door_chance {
            Feature::Floor
        } else {
            // Both sides of a wall agree on its material
            match cell.id[0].min(cell.id[1]) % 3 {
                0 => Feature::StoneWall,
                1 => Feature::MetalWall,
                _ => Feature::RockWall,
            }
        }
    } else {
        Feature::Floor
    };
    static_sample(coord, depth, feature)
}

pub(super) fn forest(
    coord: AbsCoord,
    depth: u64,
    noise: &Perlin,
    scale: f64,
    density: f64,
) -> ProceduralSample {
    let v = noise.get([coord.x as f64 / scale, coord.y as f64 / scale, 0.5]);
    let clump = (v + 1.0) / 2.0;

    let feature = if v > 0.7 {
        Feature::ShallowWater
    } else if clump < density && hash01(noise.seed() as u64, coord.x, coord.y, 0) < 0.65 {
        Feature::Tree
    } else {
        Feature::Floor
    };
    static_sample(coord, depth, feature)
}

pub(super) fn borrowed(
    coord: AbsCoord,
    depth: u64,
    snapshot: &LevelSnapshot,
    seed: u64,
) -> ProceduralSample {
    let ox = (seed & 0x3ff) as i64;
    let oy = ((seed >> 10) & 0x3ff) as i64;
    static_sample(coord, depth, snapshot.feature_at(coord.x + ox, coord.y + oy))
}

pub(super) fn wastes(coord: AbsCoord, depth: u64, seed: u64) -> ProceduralSample {
    let roll = hash01(seed, coord.x, coord.y, 0);
    let feature = if roll < 0.015 {
        Feature::RockWall
    } else if roll < 0.025 {
        Feature::Tree
    } else {
        Feature::Floor
    };
    static_sample(coord, depth, feature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diamond_is_periodic() {
        for (x, y) in [(0, 0), (3, 1), (-5, 7)] {
            let a = diamond(AbsCoord::new(x, y), 0, 8, 6, Feature::StoneWall);
            let b = diamond(AbsCoord::new(x + 8, y - 6), 0, 8, 6, Feature::StoneWall);
            assert_eq!(a.feature, b.feature);
        }
        // Cell centre is open, cell corner is wall
        assert_eq!(diamond(AbsCoord::new(4, 3), 0, 8, 6, Feature::StoneWall).feature, Feature::Floor);
        assert_eq!(diamond(AbsCoord::new(0, 0), 0, 8, 6, Feature::StoneWall).feature, Feature::StoneWall);
    }

    #[test]
    fn test_column_lattice() {
        assert_eq!(column(AbsCoord::new(0, 0), 0, 2, 3, Feature::MetalWall).feature, Feature::MetalWall);
        assert_eq!(column(AbsCoord::new(1, 1), 0, 2, 3, Feature::MetalWall).feature, Feature::MetalWall);
        assert_eq!(column(AbsCoord::new(2, 0), 0, 2, 3, Feature::MetalWall).feature, Feature::Floor);
        assert_eq!(column(AbsCoord::new(-5, 5), 0, 2, 3, Feature::MetalWall).feature, Feature::MetalWall);
    }

    #[test]
    fn test_chaos_holds_for_its_period() {
        let coord = AbsCoord::new(12, -40);
        let s = chaos(coord, 250, 9, 0.5, 100);
        assert_eq!(s.changepoint, 299);
        for depth in 200..=299 {
            assert_eq!(chaos(coord, depth, 9, 0.5, 100).feature, s.feature);
        }
    }

    #[test]
    fn test_chaos_with_unit_period_expires_every_step() {
        let coord = AbsCoord::new(-3, 8);
        for depth in [0, 1, 77, 4096] {
            assert_eq!(chaos(coord, depth, 5, 0.5, 1).changepoint, depth);
            assert_eq!(chaos(coord, depth, 5, 0.5, 0).changepoint, depth);
        }
    }

    #[test]
    fn test_chaos_density_is_respected() {
        let walls = (0..2000)
            .filter(|i| chaos(AbsCoord::new(*i, i * 3), 0, 4, 0.25, 50).feature.is_solid())
            .count();
        assert!((350..650).contains(&walls), "{} walls", walls);
    }

    #[test]
    fn test_static_patterns_report_interval() {
        let s = wastes(AbsCoord::new(1, 1), 10, 3);
        assert_eq!(s.changepoint, 10 + STATIC_INTERVAL);
        let noise = Perlin::new(3);
        let r = roiling(AbsCoord::new(5, 5), 10, &noise, 10.0, 0.2);
        assert!(r.changepoint > 10 && r.changepoint <= 10 + STATIC_INTERVAL);
    }
}
