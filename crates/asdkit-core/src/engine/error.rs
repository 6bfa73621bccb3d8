use std::time::Duration;
use thiserror::Error;

use super::config::ConfigError;
use crate::core::error::PropertyError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Property(#[from] PropertyError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Stability model '{model}' has no trained backing model")]
    ModelNotTrained { model: String },

    #[error("Model metadata error for '{path}': {message}")]
    ModelMetadata { path: String, message: String },

    #[error("Worker pool failed to start: {0}")]
    WorkerPool(String),

    #[error("Not started before the {0:?} screening deadline")]
    Timeout(Duration),
}

impl EngineError {
    /// The underlying property error, if this failure came from the data layer.
    pub fn as_property_error(&self) -> Option<&PropertyError> {
        match self {
            EngineError::Property(e) => Some(e),
            _ => None,
        }
    }
}
