//! The Abyss "camera": where the window sits in the infinite plane, and how
//! deep into the noise field it is looking.

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

use crate::config::AbyssConfig;
use crate::coords::AbsCoord;

/// Persisted engine state for one Abyss level instance
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AbyssState {
    /// Absolute coordinate of the window centre
    pub origin_offset: AbsCoord,
    /// Only ever increases, except on a fresh entry
    pub depth: u64,
    /// Radians in `[0, 2π)`
    pub phase: f64,
    pub seed: u64,
    /// Consumed by the next tick: every tile goes stale
    pub force_full_regen: bool,
}

/// Per-call conditions that speed the Abyss up
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AdvanceModifiers {
    /// The Abyss is hostile to the player (doubles the rate)
    pub hostile: bool,
    /// Temporary multiplier; values below 1 are ignored
    pub surge: f64,
}

/// Rate parameters for [`AbyssState::advance`]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DepthRate {
    pub base: f64,
    pub phase_rate: f64,
    pub amplitude: f64,
    pub hostile_multiplier: f64,
}

impl DepthRate {
    pub fn from_config(config: &AbyssConfig) -> Self {
        DepthRate {
            base: config.base_depth_rate,
            phase_rate: config.phase_rate,
            amplitude: config.surge_amplitude,
            hostile_multiplier: config.hostile_multiplier,
        }
    }

    /// Slow-fast-slow modulation; positive while `amplitude < 1`
    pub fn nonlinear(&self, phase: f64) -> f64 {
        1.0 + self.amplitude * phase.sin()
    }
}

impl AbyssState {
    pub fn new(seed: u64, origin_offset: AbsCoord) -> Self {
        AbyssState {
            origin_offset,
            depth: 0,
            phase: 0.0,
            seed,
            force_full_regen: false,
        }
    }

    /// Advance depth and phase by `elapsed` time units and return the depth gained.
    pub fn advance(&mut self, elapsed: u32, rate: &DepthRate, modifiers: AdvanceModifiers) -> u64 {
        if elapsed == 0 {
            return 0;
        }

        let mut speed = rate.base * rate.nonlinear(self.phase);
        if modifiers.hostile {
            speed *= rate.hostile_multiplier;
        }
        speed *= modifiers.surge.max(1.0);

        let delta = (elapsed as f64 * speed).round().max(0.0) as u64;
        self.depth = self.depth.saturating_add(delta);
        self.phase = (self.phase + elapsed as f64 * rate.phase_rate).rem_euclid(TAU);
        delta
    }
}
