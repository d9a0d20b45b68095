//! Procedural layouts: pure `(coordinate, depth) -> feature` samplers.
//!
//! A [`Layout`] is a closed set of patterns. Simple ones are periodic lattices
//! or thresholded noise; [`Layout::Blend`] composes children through weighted
//! cellular selection, so the Abyss shows large patches of one character with
//! soft, randomised borders. Every sample also says when it is next worth
//! looking at again (its changepoint), which is what lets the scheduler skip
//! most of the window on most turns.
//!
//! # Example
//!
//! ```ignore
//! use abyss_engine::layout::{Layout, Weighted};
//! use abyss_engine::terrain::Feature;
//!
//! let layout = Layout::blend(42, 8.0, vec![
//!     Weighted::new(1.0, Layout::Plain(Feature::Floor)),
//!     Weighted::new(1.0, Layout::Plain(Feature::RockWall)),
//! ]);
//! let sample = layout.sample(AbsCoord::new(0, 0), 0);
//! ```

mod familiar;
mod patterns;
pub mod worley;

use std::cmp::Ordering;
use std::sync::Arc;

use noise::Perlin;

use crate::coords::AbsCoord;
use crate::seeds::{child_seed, AbyssSeeds};
use crate::terrain::Feature;

pub use familiar::{generate_familiar_level, LevelSnapshot};

/// Depth units per unit of noise-space z
pub const DEPTH_SCALE: f64 = 512.0;

/// How long a sample from a static pattern stays unexamined
pub const STATIC_INTERVAL: u64 = 4096;

/// Changepoint of a sample that never needs re-examining
pub const NEVER_CHANGES: u64 = u64::MAX;

/// One sampled tile: what it is, and when to look at it again
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProceduralSample {
    pub coord: AbsCoord,
    pub feature: Feature,
    pub changepoint: u64,
}

impl ProceduralSample {
    pub fn new(coord: AbsCoord, feature: Feature, changepoint: u64) -> Self {
        ProceduralSample { coord, feature, changepoint }
    }

    /// Whether this sample is stale at `depth`
    pub fn is_due(&self, depth: u64) -> bool {
        self.changepoint < depth
    }
}

impl Ord for ProceduralSample {
    fn cmp(&self, other: &Self) -> Ordering {
        self.changepoint
            .cmp(&other.changepoint)
            .then_with(|| self.coord.cmp(&other.coord))
            .then_with(|| self.feature.cmp(&other.feature))
    }
}

impl PartialOrd for ProceduralSample {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A child of a blend with its share of the plane
#[derive(Clone, Debug)]
pub struct Weighted {
    pub weight: f64,
    pub layout: Layout,
}

impl Weighted {
    pub fn new(weight: f64, layout: Layout) -> Self {
        assert!(weight > 0.0, "blend weights must be positive");
        Weighted { weight, layout }
    }
}

/// Closed set of layout patterns
#[derive(Clone, Debug)]
pub enum Layout {
    /// The same feature everywhere
    Plain(Feature),
    /// Diamond-shaped rooms on a periodic lattice
    Diamond { width: u32, height: u32, wall: Feature },
    /// Square pillars on a periodic lattice
    Column { column: u32, spacing: u32, wall: Feature },
    /// Scattered walls re-rolled every `period` depth units
    Chaos { seed: u64, density: f64, period: u64 },
    /// Thresholded 3-D noise that rolls as depth increases
    Roiling { noise: Perlin, scale: f64, threshold: f64 },
    /// Meandering bands of water
    River { noise: Perlin, scale: f64, width: f64 },
    /// Walled cells with the odd doorway
    City { seed: u64, scale: f64, wall_width: f64, door_chance: f64 },
    /// Tree clumps with small ponds
    Forest { noise: Perlin, scale: f64, density: f64 },
    /// Geometry copied from an ordinary level
    Borrowed { snapshot: Arc<LevelSnapshot>, seed: u64 },
    /// Nearly empty plains of the reserved quadrant
    Wastes { seed: u64 },
    /// Weighted cellular selection between children
    Blend { seed: u64, scale: f64, children: Vec<Weighted> },
}

impl Layout {
    pub fn blend(seed: u64, scale: f64, children: Vec<Weighted>) -> Layout {
        assert!(!children.is_empty(), "a blend needs at least one child");
        Layout::Blend { seed, scale, children }
    }

    /// Sample the feature at `coord` for the given depth
    pub fn sample(&self, coord: AbsCoord, depth: u64) -> ProceduralSample {
        match self {
            Layout::Plain(feature) => ProceduralSample::new(coord, *feature, NEVER_CHANGES),
            Layout::Diamond { width, height, wall } => {
                patterns::diamond(coord, depth, *width, *height, *wall)
            }
            Layout::Column { column, spacing, wall } => {
                patterns::column(coord, depth, *column, *spacing, *wall)
            }
            Layout::Chaos { seed, density, period } => {
                patterns::chaos(coord, depth, *seed, *density, *period)
            }
            Layout::Roiling { noise, scale, threshold } => {
                patterns::roiling(coord, depth, noise, *scale, *threshold)
            }
            Layout::River { noise, scale, width } => {
                patterns::river(coord, depth, noise, *scale, *width)
            }
            Layout::City { seed, scale, wall_width, door_chance } => {
                patterns::city(coord, depth, *seed, *scale, *wall_width, *door_chance)
            }
            Layout::Forest { noise, scale, density } => {
                patterns::forest(coord, depth, noise, *scale, *density)
            }
            Layout::Borrowed { snapshot, seed } => patterns::borrowed(coord, depth, snapshot, *seed),
            Layout::Wastes { seed } => patterns::wastes(coord, depth, *seed),
            Layout::Blend { seed, scale, children } => {
                sample_blend(coord, depth, *seed, *scale, children)
            }
        }
    }

    /// The layout mix used for the main body of the Abyss
    pub fn abyss(seeds: &AbyssSeeds, familiar: Option<Arc<LevelSnapshot>>) -> Layout {
        let seed = seeds.layout;
        let noise_seed = |i: u64| child_seed(seed, i) as u32;

        let lattices = Layout::blend(
            child_seed(seed, 1),
            9.0,
            vec![
                Weighted::new(1.0, Layout::Diamond { width: 6, height: 6, wall: Feature::RockWall }),
                Weighted::new(1.0, Layout::Diamond { width: 12, height: 8, wall: Feature::StoneWall }),
                Weighted::new(1.0, Layout::Column { column: 2, spacing: 4, wall: Feature::StoneWall }),
                Weighted::new(0.7, Layout::Column { column: 1, spacing: 5, wall: Feature::MetalWall }),
            ],
        );

        let chaos = Layout::blend(
            child_seed(seed, 2),
            7.0,
            vec![
                Weighted::new(1.0, Layout::Chaos { seed: child_seed(seed, 20), density: 0.3, period: 600 }),
                Weighted::new(0.8, Layout::Chaos { seed: child_seed(seed, 21), density: 0.55, period: 300 }),
                Weighted::new(0.6, Layout::Plain(Feature::Floor)),
            ],
        );

        let mut children = vec![
            Weighted::new(1.0, lattices),
            Weighted::new(1.0, chaos),
            Weighted::new(
                1.5,
                Layout::Roiling { noise: Perlin::new(noise_seed(3)), scale: 11.0, threshold: 0.25 },
            ),
            Weighted::new(
                0.7,
                Layout::River { noise: Perlin::new(noise_seed(4)), scale: 23.0, width: 0.12 },
            ),
            Weighted::new(
                1.2,
                Layout::City { seed: child_seed(seed, 5), scale: 7.0, wall_width: 1.0, door_chance: 0.12 },
            ),
            Weighted::new(
                0.8,
                Layout::Forest { noise: Perlin::new(noise_seed(6)), scale: 6.0, density: 0.45 },
            ),
        ];

        if let Some(snapshot) = familiar {
            children.push(Weighted::new(
                0.35,
                Layout::Borrowed { snapshot, seed: child_seed(seed, 7) },
            ));
        }

        Layout::blend(child_seed(seed, 0), 24.0, children)
    }
}

/// Weighted Worley selection between children.
///
/// Each child owns a cell field seeded from the blend seed and its index. The
/// child whose nearest-cell distance divided by its weight is smallest wins.
/// Cell distances move at most one unit per unit of z, so child `k` cannot
/// overtake before its margin closes at `1/w_best + 1/w_k` per unit z. The
/// changepoint is the earliest such overtake over every other child.
fn sample_blend(
    coord: AbsCoord,
    depth: u64,
    seed: u64,
    scale: f64,
    children: &[Weighted],
) -> ProceduralSample {
    let x = coord.x as f64 / scale;
    let y = coord.y as f64 / scale;
    let z = depth as f64 / DEPTH_SCALE;

    let scores: Vec<f64> = children
        .iter()
        .enumerate()
        .map(|(i, child)| worley::cell_noise(child_seed(seed, i as u64), x, y, z).distance[0] / child.weight)
        .collect();
    let mut best = 0;
    for (i, score) in scores.iter().enumerate() {
        if *score < scores[best] {
            best = i;
        }
    }

    let chosen = &children[best];
    let inner = chosen.layout.sample(coord, depth);
    if children.len() == 1 {
        return inner;
    }

    let margin_depth = children
        .iter()
        .enumerate()
        .filter(|(k, _)| *k != best)
        .map(|(k, rival)| {
            let closing = 1.0 / chosen.weight + 1.0 / rival.weight;
            ((scores[k] - scores[best]) / closing * DEPTH_SCALE).floor() as u64
        })
        .min()
        .unwrap_or(0);
    let changepoint = depth.saturating_add(margin_depth);

    ProceduralSample::new(coord, inner.feature, changepoint.min(inner.changepoint))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floor_wall_blend(seed: u64) -> Layout {
        Layout::blend(
            seed,
            8.0,
            vec![
                Weighted::new(1.0, Layout::Plain(Feature::Floor)),
                Weighted::new(1.0, Layout::Plain(Feature::RockWall)),
            ],
        )
    }

    #[test]
    fn test_two_way_blend_is_deterministic_and_closed() {
        let layout = floor_wall_blend(42);
        let a = layout.sample(AbsCoord::new(0, 0), 0);
        let b = layout.sample(AbsCoord::new(0, 0), 0);
        assert!(matches!(a.feature, Feature::Floor | Feature::RockWall));
        assert_eq!(a, b);
    }

    #[test]
    fn test_blend_uses_both_children() {
        let layout = floor_wall_blend(42);
        let mut floors = 0;
        let mut walls = 0;
        for y in -60..60 {
            for x in -60..60 {
                match layout.sample(AbsCoord::new(x, y), 0).feature {
                    Feature::Floor => floors += 1,
                    Feature::RockWall => walls += 1,
                    other => panic!("unexpected feature {:?}", other),
                }
            }
        }
        assert!(floors > 1000 && walls > 1000, "floors {} walls {}", floors, walls);
    }

    #[test]
    fn test_blend_changepoint_is_honest() {
        // Nothing may change strictly before the changepoint
        let layout = floor_wall_blend(7);
        for x in 0..40 {
            let coord = AbsCoord::new(x * 3, x * 5);
            let s = layout.sample(coord, 1000);
            assert!(s.changepoint >= 1000);
            let midway = 1000 + (s.changepoint - 1000) / 2;
            assert_eq!(layout.sample(coord, midway).feature, s.feature);
        }
    }

    #[test]
    fn test_light_third_child_cannot_overtake_early() {
        let layout = Layout::blend(
            11,
            8.0,
            vec![
                Weighted::new(1.0, Layout::Plain(Feature::Floor)),
                Weighted::new(4.0, Layout::Plain(Feature::RockWall)),
                Weighted::new(0.3, Layout::Plain(Feature::Lava)),
            ],
        );
        for y in (-60..60).step_by(3) {
            for x in (-60..60).step_by(3) {
                let coord = AbsCoord::new(x, y);
                let s = layout.sample(coord, 0);
                let last = s.changepoint.min(600);
                for depth in 1..last {
                    assert_eq!(
                        layout.sample(coord, depth).feature,
                        s.feature,
                        "{} changed at depth {} before changepoint {}",
                        coord,
                        depth,
                        s.changepoint
                    );
                }
            }
        }
    }

    #[test]
    fn test_heavier_child_claims_more_ground() {
        let layout = Layout::blend(
            3,
            8.0,
            vec![
                Weighted::new(4.0, Layout::Plain(Feature::Floor)),
                Weighted::new(1.0, Layout::Plain(Feature::Lava)),
            ],
        );
        let floors = (-50..50)
            .flat_map(|y| (-50..50).map(move |x| AbsCoord::new(x, y)))
            .filter(|c| layout.sample(*c, 0).feature == Feature::Floor)
            .count();
        assert!(floors > 100 * 100 / 2);
    }

    #[test]
    fn test_abyss_mix_is_deterministic() {
        let seeds = AbyssSeeds::from_master(42);
        let familiar = generate_familiar_level(60, 40, seeds.familiar);
        let a = Layout::abyss(&seeds, Some(familiar.clone()));
        let b = Layout::abyss(&seeds, Some(familiar));
        for i in 0..200 {
            let coord = AbsCoord::new(i * 7 - 300, i * 13 - 900);
            assert_eq!(a.sample(coord, i as u64 * 17), b.sample(coord, i as u64 * 17));
        }
    }

    #[test]
    fn test_abyss_mix_never_yields_protected_or_unseen() {
        let seeds = AbyssSeeds::from_master(5);
        let layout = Layout::abyss(&seeds, Some(generate_familiar_level(50, 50, 5)));
        for y in -40..40 {
            for x in -40..40 {
                let f = layout.sample(AbsCoord::new(x, y), 250).feature;
                assert!(!f.is_protected() && f != Feature::Unseen, "{:?}", f);
            }
        }
    }

    #[test]
    fn test_samples_order_by_changepoint() {
        let early = ProceduralSample::new(AbsCoord::new(9, 9), Feature::Floor, 10);
        let late = ProceduralSample::new(AbsCoord::new(0, 0), Feature::Floor, 11);
        assert!(early < late);
        assert!(early.is_due(11));
        assert!(!early.is_due(10));
    }
}
