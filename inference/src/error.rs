use skylark_audio::AudioError;
use thiserror::Error;

/// Errors returned by the embedding pipeline.
///
/// Configuration and output-I/O errors are fatal to a run; audio and
/// model errors are isolated per file by [`crate::EmbedFn`] and turned
/// into counter increments.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("audio too short: {seconds:.3}s is less than one {window:.3}s window")]
    AudioTooShort { seconds: f64, window: f64 },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("model error: {0}")]
    Model(String),

    #[error("record encode error: {0}")]
    Encode(String),

    #[error("malformed record: {0}")]
    Parse(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rmp_serde::encode::Error> for InferenceError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        InferenceError::Encode(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for InferenceError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        InferenceError::Parse(e.to_string())
    }
}

impl From<ndarray::ShapeError> for InferenceError {
    fn from(e: ndarray::ShapeError) -> Self {
        InferenceError::Model(e.to_string())
    }
}
