//! Error types for the village core.

use thiserror::Error;
use village_llm::GenerationError;

/// Top-level error type for all village operations.
#[derive(Error, Debug)]
pub enum VillageError {
    /// The text backend failed where no fallback is allowed (memory summaries).
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    /// SQLite persistence error.
    #[error("Database error: {0}")]
    Persistence(#[from] rusqlite::Error),

    /// Configuration error, including malformed agent definitions.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A stored value could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A movement or placement rule was violated.
    #[error("World error: {0}")]
    World(#[from] WorldError),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Violations of the world map's placement rules.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorldError {
    /// Relocation was requested but the map has no other location.
    #[error("no location other than '{current}' to move to")]
    NoAlternativeLocation {
        /// The agent's current location.
        current: String,
    },

    /// The agent has not been placed on the map yet.
    #[error("agent '{0}' has no location")]
    Unplaced(String),

    /// The named location is not on the map.
    #[error("unknown location '{0}'")]
    UnknownLocation(String),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, VillageError>;
