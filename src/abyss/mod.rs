//! The Abyss engine: a finite window onto an infinite, slowly churning plane.
//!
//! All state for one level instance lives in [`Abyss`]. The game drives it
//! with [`Abyss::enter_fresh`] once, then [`Abyss::tick`] every turn and
//! [`Abyss::request_shift_if_needed`] whenever the player moves. Monsters and
//! items are the game's business; the engine reaches them through a
//! [`Population`] passed into each call.

mod apply;
mod generate;
mod morph;
mod relocate;
mod sampler;
mod scheduler;
mod shift;
mod state;
mod tile;

use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::AbyssConfig;
use crate::coords::{AbsCoord, WindowPos};
use crate::error::{AbyssError, Result};
use crate::layout::{generate_familiar_level, Layout, LevelSnapshot, NEVER_CHANGES};
use crate::population::MonsterId;
use crate::seeds::AbyssSeeds;
use crate::tilemap::Tilemap;
use crate::vaults::{FragmentRegistry, PrefabCatalog, VaultCatalog};

pub use apply::{ApplyOutcome, VetoReason};
pub use morph::TickReport;
pub use relocate::EntityTally;
pub use sampler::{AbyssSampler, DEFER_INTERVAL};
pub use scheduler::SampleScheduler;
pub use shift::{PreservationMask, ShiftPlan, ShiftReport};
pub use state::{AbyssState, AdvanceModifiers, DepthRate};
pub use tile::AbyssTile;

/// How far the player has got, as far as Abyss content is concerned
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameProgress {
    /// 1-based level within the Abyss branch
    pub abyss_level: u32,
    /// The player already carries the Abyssal rune
    pub has_rune: bool,
}

/// Everything about a level instance that survives a save
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SavedAbyss {
    pub state: AbyssState,
    pub progress: GameProgress,
    pub player: WindowPos,
    pub grid: Tilemap<AbyssTile>,
    pub fragments: FragmentRegistry,
}

/// One live Abyss level
pub struct Abyss {
    pub(crate) config: AbyssConfig,
    pub(crate) seeds: AbyssSeeds,
    pub(crate) state: AbyssState,
    pub(crate) progress: GameProgress,
    pub(crate) sampler: AbyssSampler,
    pub(crate) grid: Tilemap<AbyssTile>,
    pub(crate) fragments: FragmentRegistry,
    pub(crate) scheduler: SampleScheduler,
    pub(crate) rng: ChaCha8Rng,
    pub(crate) player: WindowPos,
    /// Monsters whose tile turned hostile under them
    pub(crate) displaced: Vec<MonsterId>,
    pub(crate) catalog: Box<dyn VaultCatalog>,
}

impl Abyss {
    /// Create an unentered level. Call [`Abyss::enter_fresh`] before playing.
    pub fn new(config: AbyssConfig, seed: u64) -> Result<Self> {
        let seeds = AbyssSeeds::from_master(seed);
        let familiar = familiar_snapshot(&config, &seeds);
        let layout = Layout::abyss(&seeds, familiar);
        Self::build(config, seeds, layout)
    }

    /// Create a level whose familiar geometry is copied from a real level
    pub fn with_familiar(config: AbyssConfig, seed: u64, snapshot: Arc<LevelSnapshot>) -> Result<Self> {
        if snapshot.is_empty() {
            return Err(AbyssError::Config(format!(
                "familiar snapshot is {}x{}, it needs at least one tile",
                snapshot.width(),
                snapshot.height()
            )));
        }
        let seeds = AbyssSeeds::from_master(seed);
        let layout = Layout::abyss(&seeds, Some(snapshot));
        Self::build(config, seeds, layout)
    }

    /// Create a level over an arbitrary main layout
    pub fn with_layout(config: AbyssConfig, seed: u64, layout: Layout) -> Result<Self> {
        Self::build(config, AbyssSeeds::from_master(seed), layout)
    }

    fn build(config: AbyssConfig, seeds: AbyssSeeds, layout: Layout) -> Result<Self> {
        config.validate()?;
        let origin = AbsCoord::default();
        let grid = Tilemap::new(config.window_width, config.window_height);
        let player = grid.center();
        let sampler = AbyssSampler::with_layout(layout, &seeds, &config, origin);
        Ok(Abyss {
            state: AbyssState::new(seeds.master, origin),
            rng: ChaCha8Rng::seed_from_u64(seeds.placement_at(0)),
            progress: GameProgress { abyss_level: 1, has_rune: false },
            fragments: FragmentRegistry::new(),
            scheduler: SampleScheduler::new(),
            displaced: Vec::new(),
            catalog: Box::new(PrefabCatalog::default()),
            config,
            seeds,
            sampler,
            grid,
            player,
        })
    }

    pub fn with_catalog(mut self, catalog: Box<dyn VaultCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_progress(mut self, progress: GameProgress) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &AbyssConfig {
        &self.config
    }

    pub fn seeds(&self) -> &AbyssSeeds {
        &self.seeds
    }

    pub fn state(&self) -> &AbyssState {
        &self.state
    }

    pub fn progress(&self) -> GameProgress {
        self.progress
    }

    pub fn set_progress(&mut self, progress: GameProgress) {
        self.progress = progress;
    }

    pub fn grid(&self) -> &Tilemap<AbyssTile> {
        &self.grid
    }

    pub fn tile(&self, pos: WindowPos) -> Option<&AbyssTile> {
        self.grid.get(pos)
    }

    pub fn fragments(&self) -> &FragmentRegistry {
        &self.fragments
    }

    pub fn scheduled(&self) -> usize {
        self.scheduler.len()
    }

    pub fn player_pos(&self) -> WindowPos {
        self.player
    }

    pub fn set_player_pos(&mut self, pos: WindowPos) {
        assert!(self.grid.in_bounds(pos), "player position {} is outside the window", pos);
        self.player = pos;
    }

    /// Window position corresponding to `origin_offset`
    pub fn center(&self) -> WindowPos {
        self.grid.center()
    }

    /// Mark every tile stale on the next tick
    pub fn force_full_regen(&mut self) {
        self.state.force_full_regen = true;
    }

    /// Absolute coordinate of a window position
    pub fn abs_coord(&self, pos: WindowPos) -> AbsCoord {
        self.state.origin_offset + (pos - self.center())
    }

    /// Window position of an absolute coordinate, if it is inside the window
    pub fn window_pos(&self, coord: AbsCoord) -> Option<WindowPos> {
        let center = self.center();
        let x = coord.x.checked_sub(self.state.origin_offset.x)?.checked_add(center.x as i64)?;
        let y = coord.y.checked_sub(self.state.origin_offset.y)?.checked_add(center.y as i64)?;
        let pos = WindowPos::new(i32::try_from(x).ok()?, i32::try_from(y).ok()?);
        self.grid.in_bounds(pos).then_some(pos)
    }

    /// Whether `pos` is close enough to the window centre to be sampled at all
    pub(crate) fn is_visible(&self, pos: WindowPos) -> bool {
        let r = self.config.visibility_radius as i64;
        pos.distance_sq(self.center()) <= r * r
    }

    /// Resample tiles without writing them, so the scheduler knows when to
    /// look again. Used after the queue was discarded.
    pub(crate) fn reschedule<F: Fn(WindowPos, &AbyssTile) -> bool>(&mut self, select: F) {
        let depth = self.state.depth;
        let positions: Vec<WindowPos> = self
            .grid
            .iter()
            .filter(|(pos, tile)| !tile.is_authored() && !tile.is_stale() && select(*pos, tile))
            .map(|(pos, _)| pos)
            .collect();
        for pos in positions {
            if !self.is_visible(pos) {
                continue;
            }
            let sample = self.sampler.sample(self.abs_coord(pos), depth);
            if sample.changepoint != NEVER_CHANGES {
                self.scheduler.push(sample);
            }
        }
    }

    /// Capture everything that must survive a save
    pub fn to_saved(&self) -> SavedAbyss {
        SavedAbyss {
            state: self.state.clone(),
            progress: self.progress,
            player: self.player,
            grid: self.grid.clone(),
            fragments: self.fragments.clone(),
        }
    }

    /// Rebuild a level from a save. The placement RNG is reseeded from the
    /// depth and the scheduler is rebuilt from the restored grid.
    pub fn from_saved(config: AbyssConfig, saved: SavedAbyss) -> Result<Self> {
        let seeds = AbyssSeeds::from_master(saved.state.seed);
        let familiar = familiar_snapshot(&config, &seeds);
        let layout = Layout::abyss(&seeds, familiar);
        Self::restore(config, seeds, layout, saved)
    }

    /// [`Abyss::from_saved`] over an arbitrary main layout
    pub fn from_saved_with_layout(config: AbyssConfig, saved: SavedAbyss, layout: Layout) -> Result<Self> {
        let seeds = AbyssSeeds::from_master(saved.state.seed);
        Self::restore(config, seeds, layout, saved)
    }

    fn restore(config: AbyssConfig, seeds: AbyssSeeds, layout: Layout, saved: SavedAbyss) -> Result<Self> {
        let mut abyss = Self::build(config, seeds, layout)?;
        if saved.grid.width != abyss.config.window_width || saved.grid.height != abyss.config.window_height {
            return Err(AbyssError::Deserialization(format!(
                "saved window is {}x{}, configuration expects {}x{}",
                saved.grid.width, saved.grid.height, abyss.config.window_width, abyss.config.window_height
            )));
        }
        abyss.rng = ChaCha8Rng::seed_from_u64(abyss.seeds.placement_at(saved.state.depth));
        abyss.sampler.recenter(saved.state.origin_offset);
        abyss.state = saved.state;
        abyss.progress = saved.progress;
        abyss.player = saved.player;
        abyss.grid = saved.grid;
        abyss.fragments = saved.fragments;
        abyss.reschedule(|_, _| true);
        info!(
            depth = abyss.state.depth,
            origin = %abyss.state.origin_offset,
            scheduled = abyss.scheduler.len(),
            "restored abyss level"
        );
        Ok(abyss)
    }
}

fn familiar_snapshot(config: &AbyssConfig, seeds: &AbyssSeeds) -> Option<Arc<LevelSnapshot>> {
    config
        .familiar_layout
        .then(|| generate_familiar_level(config.window_width, config.window_height, seeds.familiar))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::terrain::Feature;

    /// A level over `layout` whose every tile already holds `fill`
    pub fn filled(width: usize, height: usize, layout: Layout, fill: Feature) -> Abyss {
        let mut abyss = Abyss::with_layout(AbyssConfig::bare(width, height), 42, layout).unwrap();
        abyss.grid.fill(AbyssTile::sampled(fill, 0));
        abyss
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::Feature;

    #[test]
    fn test_window_mapping_round_trips() {
        let mut abyss = testing::filled(40, 30, Layout::Plain(Feature::Floor), Feature::Floor);
        abyss.state.origin_offset = AbsCoord::new(1_000, -7);
        let center = abyss.center();
        assert_eq!(abyss.abs_coord(center), AbsCoord::new(1_000, -7));
        let pos = WindowPos::new(3, 25);
        assert_eq!(abyss.window_pos(abyss.abs_coord(pos)), Some(pos));
        assert_eq!(abyss.window_pos(AbsCoord::new(i64::MAX, 0)), None);
        assert_eq!(abyss.window_pos(AbsCoord::new(1_000 + 40, -7)), None);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = AbyssConfig { window_width: 4, ..AbyssConfig::default() };
        assert!(Abyss::new(config, 1).is_err());
    }

    #[test]
    fn test_empty_familiar_snapshot_is_rejected() {
        let empty = Arc::new(LevelSnapshot::new(Tilemap::new_with(0, 0, Feature::Floor)));
        let result = Abyss::with_familiar(AbyssConfig::default(), 5, empty);
        assert!(matches!(result, Err(AbyssError::Config(_))));

        let tiny = Arc::new(LevelSnapshot::new(Tilemap::new_with(1, 1, Feature::Floor)));
        assert!(Abyss::with_familiar(AbyssConfig::default(), 5, tiny).is_ok());
    }

    #[test]
    fn test_saved_round_trip_keeps_state() {
        let mut abyss = testing::filled(40, 30, Layout::Plain(Feature::Floor), Feature::Floor);
        abyss.state.depth = 1234;
        abyss.state.origin_offset = AbsCoord::new(-50, 60);
        abyss.grid.set(WindowPos::new(2, 2), AbyssTile::sampled(Feature::Altar, 10));
        let saved = abyss.to_saved();

        let restored =
            Abyss::from_saved_with_layout(AbyssConfig::bare(40, 30), saved.clone(), Layout::Plain(Feature::Floor))
                .unwrap();
        assert_eq!(restored.to_saved(), saved);
        assert_eq!(restored.sampler.center(), AbsCoord::new(-50, 60));
    }
}
