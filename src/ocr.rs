//! Boundary to the text-recognition engine. The engine is opaque: it gets
//! image bytes and returns recognized lines.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PredictError {
    #[error("Image could not be decoded: {0}")]
    Decode(String),

    #[error("Recognition failed: {0}")]
    Processing(String),

    #[error("No prediction engine configured")]
    Unavailable,
}

/// Blocking recognition call; the API runs it on the blocking pool.
pub trait PredictionEngine: Send + Sync {
    fn predict(&self, image: &[u8]) -> Result<Vec<String>, PredictError>;
}

/// Placeholder used when the process runs without a recognition backend.
pub struct UnconfiguredEngine;

impl PredictionEngine for UnconfiguredEngine {
    fn predict(&self, _image: &[u8]) -> Result<Vec<String>, PredictError> {
        Err(PredictError::Unavailable)
    }
}
