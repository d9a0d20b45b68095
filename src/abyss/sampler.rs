use std::sync::Arc;

use crate::config::AbyssConfig;
use crate::coords::AbsCoord;
use crate::layout::{Layout, LevelSnapshot, ProceduralSample, NEVER_CHANGES, STATIC_INTERVAL};
use crate::seeds::{hash01, AbyssSeeds};

/// How far a sample that loses its change roll is pushed back
pub const DEFER_INTERVAL: u64 = 4 * STATIC_INTERVAL;

/// Top-level sampler: picks the wastes or the main layout mix, then decides
/// how eager each tile is to change.
///
/// Tiles within `immutable_radius` of the window centre never change on their
/// own. Further out, a hashed roll against `1 - exp(-(d - r) / falloff)`
/// either keeps the layout's changepoint or defers it.
#[derive(Clone, Debug)]
pub struct AbyssSampler {
    layout: Layout,
    wastes: Layout,
    seed: u64,
    center: AbsCoord,
    immutable_radius: f64,
    change_falloff: f64,
}

impl AbyssSampler {
    pub fn new(
        seeds: &AbyssSeeds,
        config: &AbyssConfig,
        familiar: Option<Arc<LevelSnapshot>>,
        center: AbsCoord,
    ) -> Self {
        Self::with_layout(Layout::abyss(seeds, familiar), seeds, config, center)
    }

    /// Sampler over an arbitrary main layout
    pub fn with_layout(layout: Layout, seeds: &AbyssSeeds, config: &AbyssConfig, center: AbsCoord) -> Self {
        AbyssSampler {
            layout,
            wastes: Layout::Wastes { seed: seeds.wastes },
            seed: seeds.changes,
            center,
            immutable_radius: config.immutable_radius,
            change_falloff: config.change_falloff.max(f64::EPSILON),
        }
    }

    pub fn center(&self) -> AbsCoord {
        self.center
    }

    /// Follow the window after a shift
    pub fn recenter(&mut self, center: AbsCoord) {
        self.center = center;
    }

    pub fn is_immutable(&self, coord: AbsCoord) -> bool {
        coord.distance(self.center) <= self.immutable_radius
    }

    pub fn sample(&self, coord: AbsCoord, depth: u64) -> ProceduralSample {
        let raw = if coord.in_wastes() {
            self.wastes.sample(coord, depth)
        } else {
            self.layout.sample(coord, depth)
        };
        if raw.changepoint == NEVER_CHANGES {
            return raw;
        }

        let distance = coord.distance(self.center);
        if distance <= self.immutable_radius {
            return ProceduralSample { changepoint: NEVER_CHANGES, ..raw };
        }

        let chance = 1.0 - (-(distance - self.immutable_radius) / self.change_falloff).exp();
        let roll = hash01(self.seed, coord.x, coord.y, raw.changepoint as i64);
        if roll < chance {
            raw
        } else {
            ProceduralSample {
                changepoint: raw.changepoint.saturating_add(DEFER_INTERVAL),
                ..raw
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::WASTES_THRESHOLD;
    use crate::terrain::Feature;

    fn lattice_sampler() -> AbyssSampler {
        let layout = Layout::Column { column: 1, spacing: 2, wall: Feature::StoneWall };
        AbyssSampler::with_layout(layout, &AbyssSeeds::from_master(42), &AbyssConfig::default(), AbsCoord::new(0, 0))
    }

    #[test]
    fn test_sampling_is_deterministic() {
        let seeds = AbyssSeeds::from_master(42);
        let config = AbyssConfig::default();
        let a = AbyssSampler::new(&seeds, &config, None, AbsCoord::new(100, -100));
        let b = AbyssSampler::new(&seeds, &config, None, AbsCoord::new(100, -100));
        for i in 0..100 {
            let coord = AbsCoord::new(100 + i * 3, -100 - i * 2);
            assert_eq!(a.sample(coord, i as u64 * 31), b.sample(coord, i as u64 * 31));
        }
    }

    #[test]
    fn test_centre_is_immutable() {
        let sampler = lattice_sampler();
        let s = sampler.sample(AbsCoord::new(1, 2), 0);
        assert_eq!(s.changepoint, NEVER_CHANGES);
        assert!(sampler.is_immutable(AbsCoord::new(1, 2)));
    }

    #[test]
    fn test_far_tiles_keep_or_defer_changepoint() {
        let sampler = lattice_sampler();
        for x in 10..60 {
            let s = sampler.sample(AbsCoord::new(x, 0), 100);
            let expected = 100 + STATIC_INTERVAL;
            assert!(s.changepoint == expected || s.changepoint == expected + DEFER_INTERVAL);
        }
    }

    #[test]
    fn test_wastes_quadrant_uses_wastes_layout() {
        let seeds = AbyssSeeds::from_master(42);
        let plain = Layout::Plain(Feature::Lava);
        let sampler = AbyssSampler::with_layout(plain, &seeds, &AbyssConfig::default(), AbsCoord::new(0, 0));
        let inside = AbsCoord::new(WASTES_THRESHOLD + 5, WASTES_THRESHOLD + 9);
        assert_ne!(sampler.sample(inside, 0).feature, Feature::Lava);
        assert_eq!(sampler.sample(AbsCoord::new(5, 9), 0).feature, Feature::Lava);
    }
}
