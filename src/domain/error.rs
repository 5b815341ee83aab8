//! Domain errors for the prompt optimization engine.

use thiserror::Error;

/// Engine-level errors.
///
/// Only capability failures and invalid configuration are errors. A
/// verification that misses its threshold, an exhausted iteration budget,
/// or a rejected evolution proposal are all expected control flow and are
/// represented in result types, never here.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Generator call failed: {0}")]
    Generator(String),

    #[error("Verifier call failed: {0}")]
    Verifier(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Evolution requires at least {required} seed prompts, got {provided}")]
    InsufficientSeeds { required: usize, provided: usize },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}
