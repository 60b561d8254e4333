//! Error types for the regatta engine.

use thiserror::Error;

/// Errors that can occur in regatta operations.
#[derive(Error, Debug)]
pub enum RegattaError {
    #[error("Event not found: {0}")]
    NotFound(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Roster backend error: {0}")]
    Backend(String),

    #[error("Chat transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for regatta operations.
pub type RegattaResult<T> = Result<T, RegattaError>;
