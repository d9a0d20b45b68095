//! Error types for the Abyss engine.

use thiserror::Error;

/// Errors that escape the engine.
///
/// Placement failures never appear here: they are retried and then skipped
/// where they happen. Broken invariants panic instead of returning an error.
#[derive(Debug, Error)]
pub enum AbyssError {
    /// Initial generation could not connect the player to the entry exit
    #[error("abyss generation vetoed {attempts} times in a row; giving up")]
    GenerationVeto { attempts: u32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Corrupted save or version mismatch
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, AbyssError>;
