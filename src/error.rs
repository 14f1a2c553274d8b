//! Error types.
//!
//! Everything in the engine is synchronous in-process state manipulation, so
//! failures are structural: a missing or malformed registration, or settings
//! that cannot be parsed. Unreachable keypaths are not errors; they resolve
//! to [`Value::Undefined`](crate::Value::Undefined).

use thiserror::Error;

/// Configuration and registration failures.
#[derive(Debug, Error)]
pub enum Error {
    /// Observers need at least one adapter interface to tokenize keypaths.
    #[error("at least one adapter interface must be registered")]
    NoAdapterInterfaces,

    /// The root interface (or a keypath prefix) names no registered adapter.
    #[error("no adapter registered for interface `{0}`")]
    UnknownInterface(char),

    /// Adapter interfaces are single characters.
    #[error("adapter interface `{0}` must be exactly one character")]
    InvalidInterface(String),

    /// A binder or formatter was registered under an empty name.
    #[error("{kind} registered without a name")]
    UnnamedRegistration {
        /// Which registry rejected the entry.
        kind: &'static str,
    },

    /// Template delimiters must both be non-empty.
    #[error("template delimiters must be non-empty")]
    InvalidDelimiters,

    /// Settings JSON could not be decoded.
    #[error("invalid settings: {0}")]
    Settings(#[from] serde_json::Error),
}

/// Result alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
