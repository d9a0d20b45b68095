//! The per-turn churn: advance depth, rewrite tiles whose sample went stale,
//! and let the whole window decay a little at random.

use rand::Rng;
use tracing::{debug, trace};

use super::relocate::{self, EntityTally};
use super::{Abyss, AdvanceModifiers, ApplyOutcome, DepthRate};
use crate::coords::WindowPos;
use crate::layout::NEVER_CHANGES;
use crate::population::Population;

/// Everything one tick did
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub depth_gained: u64,
    /// Scheduled samples that came due
    pub due: usize,
    /// Tiles resampled by ambient decay
    pub ambient: usize,
    pub written: usize,
    pub downgraded: usize,
    pub vetoed: usize,
    pub clouds_dissipated: usize,
    pub entities: EntityTally,
}

impl TickReport {
    fn record(&mut self, outcome: ApplyOutcome) {
        match outcome {
            ApplyOutcome::Written => self.written += 1,
            ApplyOutcome::Downgraded => self.downgraded += 1,
            ApplyOutcome::Vetoed(_) => self.vetoed += 1,
            ApplyOutcome::Unchanged => {}
        }
    }
}

impl Abyss {
    /// Advance the Abyss by `elapsed` time units. A zero-length tick does
    /// nothing at all.
    pub fn tick(
        &mut self,
        elapsed: u32,
        modifiers: AdvanceModifiers,
        population: &mut dyn Population,
    ) -> TickReport {
        let mut report = TickReport::default();
        if elapsed == 0 {
            return report;
        }

        if self.state.force_full_regen {
            self.state.force_full_regen = false;
            self.scheduler.clear();
            for (_, tile) in self.grid.iter_mut() {
                if !tile.is_authored() {
                    tile.sampled_at = None;
                }
            }
            debug!("full regeneration requested; every tile is stale");
        }

        report.depth_gained = self
            .state
            .advance(elapsed, &DepthRate::from_config(&self.config), modifiers);
        let depth = self.state.depth;

        for due in self.scheduler.pop_due(depth) {
            report.due += 1;
            let Some(pos) = self.window_pos(due.coord) else { continue };
            if self.grid.at(pos).is_authored() || !self.is_visible(pos) {
                continue;
            }
            self.resample(pos, population, true, &mut report);
        }

        self.ambient_decay(population, &mut report);

        // Monsters whose ground changed under them
        let displaced = std::mem::take(&mut self.displaced);
        let mut tally = EntityTally::default();
        let radius = self.config.displacement_radius;
        relocate::rehome_monsters(population, &self.grid, &displaced, None, self.player, radius, &mut tally);
        relocate::push_stranded_items(population, &self.grid, self.player, radius, &mut tally);
        report.entities = tally;

        for (_, tile) in self.grid.iter_mut() {
            if let Some(cloud) = tile.cloud.as_mut() {
                if !cloud.age(elapsed) {
                    tile.cloud = None;
                    report.clouds_dissipated += 1;
                }
            }
        }

        trace!(
            depth,
            due = report.due,
            ambient = report.ambient,
            written = report.written,
            vetoed = report.vetoed,
            "abyss tick"
        );
        report
    }

    /// Each visible tile resamples with a chance that grows with the depth
    /// since it was last sampled. Stale tiles always resample.
    fn ambient_decay(&mut self, population: &mut dyn Population, report: &mut TickReport) {
        let depth = self.state.depth;
        let span = self.config.ambient_decay_span.max(1) as f64;
        let rate = self.config.ambient_rate.clamp(0.0, 1.0);

        let positions: Vec<WindowPos> = self.grid.positions().collect();
        for pos in positions {
            if !self.is_visible(pos) {
                continue;
            }
            let (authored, sampled_at) = {
                let tile = self.grid.at(pos);
                (tile.is_authored(), tile.sampled_at)
            };
            if authored {
                continue;
            }
            let resample = match sampled_at {
                None => true,
                Some(_) if self.sampler.is_immutable(self.abs_coord(pos)) => false,
                Some(at) => {
                    let age = depth.saturating_sub(at) as f64;
                    let chance = rate * (age / span).min(1.0);
                    chance > 0.0 && self.rng.gen_bool(chance)
                }
            };
            if resample {
                report.ambient += 1;
                self.resample(pos, population, sampled_at.is_none(), report);
            }
        }
    }

    /// Sample `pos` at the current depth, write the result through the veto
    /// rules and optionally schedule the next change.
    fn resample(&mut self, pos: WindowPos, population: &mut dyn Population, schedule: bool, report: &mut TickReport) {
        let depth = self.state.depth;
        let sample = self.sampler.sample(self.abs_coord(pos), depth);
        let outcome = self.apply_feature(pos, sample.feature, population);
        report.record(outcome);
        self.grid.at_mut(pos).sampled_at = Some(depth);
        if schedule && sample.changepoint != NEVER_CHANGES {
            self.scheduler.push(sample);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::filled;
    use super::*;
    use crate::config::AbyssConfig;
    use crate::layout::{Layout, ProceduralSample};
    use crate::population::{ItemCategory, Roster, SpawnFlags};
    use crate::terrain::{Cloud, CloudKind, Feature};
    use crate::vaults::FragmentId;

    #[test]
    fn test_zero_tick_is_a_no_op() {
        let mut abyss = filled(20, 20, Layout::Plain(Feature::RockWall), Feature::Floor);
        let mut roster = Roster::new();
        let coord = abyss.abs_coord(WindowPos::new(2, 2));
        abyss.scheduler.push(ProceduralSample::new(coord, Feature::RockWall, 0));
        abyss.force_full_regen();
        let grid = abyss.grid.clone();

        let report = abyss.tick(0, AdvanceModifiers::default(), &mut roster);
        assert_eq!(report, TickReport::default());
        assert_eq!(abyss.grid, grid);
        assert_eq!(abyss.scheduled(), 1);
        assert_eq!(abyss.state.depth, 0);
        assert!(abyss.state.force_full_regen);
    }

    #[test]
    fn test_due_sample_rewrites_tile() {
        let mut abyss = filled(20, 20, Layout::Plain(Feature::RockWall), Feature::Floor);
        let mut roster = Roster::new();
        let pos = WindowPos::new(2, 2);
        abyss.scheduler.push(ProceduralSample::new(abyss.abs_coord(pos), Feature::Floor, 0));

        let report = abyss.tick(1, AdvanceModifiers::default(), &mut roster);
        assert_eq!(report.due, 1);
        assert_eq!(report.written, 1);
        assert_eq!(abyss.grid.at(pos).feature, Feature::RockWall);
        assert_eq!(abyss.grid.at(pos).sampled_at, Some(abyss.state.depth));
        // Plain layouts never change again
        assert_eq!(abyss.scheduled(), 0);
    }

    #[test]
    fn test_monster_escapes_new_lava() {
        let mut abyss = filled(40, 40, Layout::Plain(Feature::Lava), Feature::Floor);
        let mut roster = Roster::new();
        let pos = WindowPos::new(30, 20);
        let id = roster.spawn_monster("orc", pos, SpawnFlags::default()).unwrap();
        abyss.scheduler.push(ProceduralSample::new(abyss.abs_coord(pos), Feature::Floor, 0));

        let report = abyss.tick(1, AdvanceModifiers::default(), &mut roster);
        assert_eq!(abyss.grid.at(pos).feature, Feature::Lava);
        assert_eq!(report.entities.monsters_relocated, 1);
        let orc = roster.monster(id).unwrap();
        assert_ne!(orc.pos, pos);
        assert!(!abyss.grid.at(orc.pos).feature.is_lethal_to_player());
        assert!(abyss.displaced.is_empty());
    }

    #[test]
    fn test_protected_content_survives_full_regeneration() {
        let mut abyss = filled(30, 30, Layout::Plain(Feature::RockWall), Feature::Floor);
        let mut roster = Roster::new();
        let altar = WindowPos::new(3, 3);
        let exit = WindowPos::new(6, 6);
        let vault = WindowPos::new(5, 20);
        let rune = WindowPos::new(24, 8);
        abyss.grid.at_mut(altar).feature = Feature::Altar;
        abyss.grid.at_mut(exit).feature = Feature::ExitAbyss;
        abyss.grid.at_mut(vault).fragment = Some(FragmentId(0));
        roster.spawn_item(ItemCategory::Rune, rune, 3);

        for _ in 0..50 {
            abyss.force_full_regen();
            abyss.tick(10, AdvanceModifiers::default(), &mut roster);
        }

        assert_eq!(abyss.grid.at(altar).feature, Feature::Altar);
        assert_eq!(abyss.grid.at(exit).feature, Feature::ExitAbyss);
        assert_eq!(abyss.grid.at(vault).feature, Feature::Floor);
        assert_eq!(abyss.grid.at(rune).feature, Feature::Floor);
        assert_eq!(abyss.grid.at(abyss.player_pos()).feature, Feature::Floor);
        assert_eq!(abyss.grid.at(WindowPos::new(20, 20)).feature, Feature::RockWall);
    }

    #[test]
    fn test_stale_tiles_are_filled_in() {
        let mut abyss = filled(20, 20, Layout::Plain(Feature::ShallowWater), Feature::Floor);
        let mut roster = Roster::new();
        let pos = WindowPos::new(1, 18);
        abyss.grid.at_mut(pos).wipe();

        let report = abyss.tick(1, AdvanceModifiers::default(), &mut roster);
        assert_eq!(report.ambient, 1);
        assert_eq!(abyss.grid.at(pos).feature, Feature::ShallowWater);
        assert!(!abyss.grid.at(pos).is_stale());
        // Fresh tiles are left alone while ambient decay is off
        assert_eq!(abyss.grid.at(WindowPos::new(2, 18)).feature, Feature::Floor);
    }

    #[test]
    fn test_ambient_decay_reaches_old_tiles() {
        let config = AbyssConfig { ambient_rate: 1.0, ambient_decay_span: 1, ..AbyssConfig::bare(20, 20) };
        let mut abyss = filled(20, 20, Layout::Plain(Feature::Tree), Feature::Floor);
        abyss.config = config;
        let mut roster = Roster::new();

        abyss.tick(5, AdvanceModifiers::default(), &mut roster);
        let trees = abyss.grid.iter().filter(|(_, t)| t.feature == Feature::Tree).count();
        // Everything outside the immutable centre turned
        assert!(trees > 300);
    }

    #[test]
    fn test_clouds_age_and_dissipate() {
        let mut abyss = filled(10, 10, Layout::Plain(Feature::Floor), Feature::Floor);
        let mut roster = Roster::new();
        let pos = WindowPos::new(1, 1);
        abyss.grid.at_mut(pos).cloud = Some(Cloud::new(CloudKind::Dust, 5));

        abyss.tick(3, AdvanceModifiers::default(), &mut roster);
        assert_eq!(abyss.grid.at(pos).cloud.map(|c| c.lifetime), Some(2));
        let report = abyss.tick(3, AdvanceModifiers::default(), &mut roster);
        assert_eq!(report.clouds_dissipated, 1);
        assert_eq!(abyss.grid.at(pos).cloud, None);
    }

    #[test]
    fn test_depth_only_grows() {
        let mut abyss = filled(10, 10, Layout::Plain(Feature::Floor), Feature::Floor);
        let mut roster = Roster::new();
        let mut last = abyss.state.depth;
        for elapsed in [1, 7, 0, 3, 100] {
            let hostile = AdvanceModifiers { hostile: true, surge: 2.0 };
            abyss.tick(elapsed, hostile, &mut roster);
            assert!(abyss.state.depth >= last);
            last = abyss.state.depth;
        }
        assert!(last > 0);
    }
}
