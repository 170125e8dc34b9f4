//! Error types for the Toolshield domain.
//!
//! Uses `thiserror` for ergonomic error definitions. Rule-loading errors
//! live in the rules crate (they own the TOML surface); everything the
//! evaluation path can produce is represented here.

use thiserror::Error;

/// The top-level error type for Toolshield operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Per-check evaluation failures (contained by the engine) ---
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;
