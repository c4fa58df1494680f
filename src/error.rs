//! Error handling

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChiliError>;

/// A model artifact is missing or unusable. Fatal: the registry caches it and every
/// later `get` returns the same error.
#[derive(Debug, Clone, Error)]
#[error("model artifact for {model_type} at {path} is unavailable: {reason}")]
pub struct ModelNotFoundError {
    pub model_type: String,
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum ChiliError {
    #[error(transparent)]
    ModelNotFound(#[from] ModelNotFoundError),

    /// The input bytes are not a decodable image.
    #[error("could not decode image: {0}")]
    Decode(String),

    /// Scaling, projection, classification or label decoding failed.
    #[error("classification failed: {0}")]
    Inference(String),

    /// The request deadline passed before both models answered.
    #[error("prediction timed out after {0:?}")]
    Timeout(Duration),
}

impl ChiliError {
    pub fn inference(message: impl Into<String>) -> Self {
        ChiliError::Inference(message.into())
    }

    /// Whether retrying the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ChiliError::Timeout(_))
    }
}
