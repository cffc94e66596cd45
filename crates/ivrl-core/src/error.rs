//! Error types for ivrl

use thiserror::Error;

/// Main error type for ivrl
#[derive(Error, Debug)]
pub enum IvrlError {
    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("Sink error: {0}")]
    Sink(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for ivrl operations
pub type Result<T> = std::result::Result<T, IvrlError>;
