//! Configuration for the Abyss engine.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AbyssError, Result};

/// Tunable parameters for one Abyss level instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbyssConfig {
    // Window
    /// Window width in tiles
    pub window_width: usize,
    /// Window height in tiles
    pub window_height: usize,
    /// Player line-of-sight radius; the preserved disk is never smaller
    pub sight_radius: i32,
    /// Radius of the disk preserved around the player on a shift
    pub preserve_radius: i32,
    /// Distance from the window edge at which a shift is requested
    pub shift_margin: i32,
    /// Tiles further than this from the window centre are never sampled
    pub visibility_radius: i32,

    // Depth and phase
    /// Depth gained per time unit at neutral phase
    pub base_depth_rate: f64,
    /// Phase advance per time unit (radians)
    pub phase_rate: f64,
    /// Strength of the sine surge, in [0, 1)
    pub surge_amplitude: f64,
    /// Rate multiplier while the Abyss is hostile to the player
    pub hostile_multiplier: f64,

    // Change modulation
    /// Tiles this close to the window centre never change on their own
    pub immutable_radius: f64,
    /// Distance over which the chance of changing at all ramps up
    pub change_falloff: f64,

    // Ambient decay
    /// Per-tick chance of an ambient resample for a fully stale tile
    pub ambient_rate: f64,
    /// Depth after which a tile counts as fully stale
    pub ambient_decay_span: u64,

    // Clouds
    /// Chance that a dissolving wall leaves a cloud
    pub cloud_chance: f64,
    /// Cloud lifetime range in time units (inclusive)
    pub cloud_lifetime: (u32, u32),

    // Content placed when an area is regenerated
    /// Chance of an exit back to the dungeon per regenerated area
    pub exit_chance: f64,
    /// Chance of an altar per regenerated area
    pub altar_chance: f64,
    /// Chance of a one-way stair deeper per regenerated area
    pub stair_chance: f64,
    /// Chance of the rune appearing once progress allows it
    pub rune_chance: f64,
    /// Abyss level from which the rune may appear
    pub rune_min_level: u32,
    /// Deepest Abyss level; no stairs are placed there
    pub max_abyss_level: u32,
    /// Chance of trying to place one vault per regenerated area
    pub vault_chance: f64,
    /// Random positions tried before a vault placement is skipped
    pub vault_attempts: u32,
    /// Maximum items placed per regenerated area on the first Abyss level.
    /// Every second level below adds one.
    pub max_items: u32,
    /// Maximum monsters spawned per regenerated area
    pub max_monsters: u32,

    // Entry generation
    /// Place an exit near the player on first entry
    pub entry_exit: bool,
    /// Chance of an altar near the player on first entry
    pub entry_altar_chance: f64,
    /// Minimum distance from the player for the entry exit
    pub entry_exit_min_distance: i32,
    /// Maximum distance from the player for the entry exit
    pub entry_exit_max_distance: i32,
    /// Retry ceiling for initial generation
    pub generation_attempts: u32,

    /// Search radius when displacing monsters or items
    pub displacement_radius: i32,
    /// Include a tile-copy of an ordinary level in the layout mix
    pub familiar_layout: bool,
}

impl Default for AbyssConfig {
    fn default() -> Self {
        Self {
            window_width: 80,
            window_height: 70,
            sight_radius: 7,
            preserve_radius: 11,
            shift_margin: 14,
            visibility_radius: 40,

            base_depth_rate: 1.0,
            phase_rate: 0.004,
            surge_amplitude: 0.75,
            hostile_multiplier: 2.0,

            immutable_radius: 4.0,
            change_falloff: 18.0,

            ambient_rate: 0.02,
            ambient_decay_span: 2000,

            cloud_chance: 0.35,
            cloud_lifetime: (20, 60),

            exit_chance: 0.25,
            altar_chance: 0.03,
            stair_chance: 0.15,
            rune_chance: 0.2,
            rune_min_level: 3,
            max_abyss_level: 5,
            vault_chance: 0.3,
            vault_attempts: 24,
            max_items: 3,
            max_monsters: 2,

            entry_exit: true,
            entry_altar_chance: 0.1,
            entry_exit_min_distance: 6,
            entry_exit_max_distance: 20,
            generation_attempts: 50,

            displacement_radius: 12,
            familiar_layout: true,
        }
    }
}

impl AbyssConfig {
    /// Load a configuration from a JSON file; missing fields take defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: AbyssConfig =
            serde_json::from_str(&text).map_err(|e| AbyssError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Write this configuration as pretty JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| AbyssError::Serialization(e.to_string()))?;
        fs::write(path, text)?;
        Ok(())
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.window_width < 8 || self.window_height < 8 {
            return Err(AbyssError::Config(format!(
                "window {}x{} is too small",
                self.window_width, self.window_height
            )));
        }
        let half = (self.window_width.min(self.window_height) / 2) as i32;
        if self.shift_margin < 1 || self.shift_margin >= half {
            return Err(AbyssError::Config(format!(
                "shift margin {} must be in 1..{}",
                self.shift_margin, half
            )));
        }
        if self.effective_preserve_radius() >= half {
            return Err(AbyssError::Config(format!(
                "preserve radius {} does not fit a window of half-size {}",
                self.effective_preserve_radius(),
                half
            )));
        }
        if !(0.0..1.0).contains(&self.surge_amplitude) {
            return Err(AbyssError::Config("surge amplitude must be in [0, 1)".into()));
        }
        if self.base_depth_rate < 0.0 || self.phase_rate < 0.0 || self.hostile_multiplier < 1.0 {
            return Err(AbyssError::Config("depth rates must be non-negative".into()));
        }
        if self.cloud_lifetime.0 > self.cloud_lifetime.1 {
            return Err(AbyssError::Config("cloud lifetime range is inverted".into()));
        }
        if self.entry_exit_min_distance > self.entry_exit_max_distance {
            return Err(AbyssError::Config("entry exit distance range is inverted".into()));
        }
        if self.generation_attempts == 0 {
            return Err(AbyssError::Config("generation needs at least one attempt".into()));
        }
        Ok(())
    }

    /// Radius of the preserved disk: never smaller than the sight radius
    pub fn effective_preserve_radius(&self) -> i32 {
        self.preserve_radius.max(self.sight_radius)
    }

    /// A small, content-free configuration used by tests.
    #[cfg(test)]
    pub fn bare(width: usize, height: usize) -> Self {
        Self {
            window_width: width,
            window_height: height,
            preserve_radius: 8,
            sight_radius: 7,
            shift_margin: 10,
            visibility_radius: 200,
            ambient_rate: 0.0,
            cloud_chance: 0.0,
            exit_chance: 0.0,
            altar_chance: 0.0,
            stair_chance: 0.0,
            rune_chance: 0.0,
            vault_chance: 0.0,
            max_items: 0,
            max_monsters: 0,
            entry_exit: false,
            entry_altar_chance: 0.0,
            familiar_layout: false,
            ..Self::default()
        }
    }
}
