//! Abyss terrain engine library
//!
//! A finite window onto an infinite, deterministic and slowly mutating plane
//! of procedural terrain. Re-exports modules for use by the binary and by a
//! host game.

pub mod abyss;
pub mod config;
pub mod coords;
pub mod error;
pub mod export;
pub mod layout;
pub mod population;
pub mod seeds;
pub mod storage;
pub mod terrain;
pub mod tilemap;
pub mod vaults;

pub use abyss::{Abyss, AdvanceModifiers, GameProgress, SavedAbyss, ShiftReport, TickReport};
pub use config::AbyssConfig;
pub use error::{AbyssError, Result};
