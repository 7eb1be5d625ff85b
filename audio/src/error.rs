use thiserror::Error;

/// Errors returned by audio decoding and resampling.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("failed to decode {path}: {reason}")]
    Decode { path: String, reason: String },

    #[error("audio file {path} contains no samples")]
    Empty { path: String },

    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    #[error("invalid shard {shard_index} of {num_shards}")]
    InvalidShard { shard_index: u32, num_shards: u32 },

    #[error("resample error: {0}")]
    Resample(String),
}

impl From<rubato::ResamplerConstructionError> for AudioError {
    fn from(e: rubato::ResamplerConstructionError) -> Self {
        AudioError::Resample(e.to_string())
    }
}

impl From<rubato::ResampleError> for AudioError {
    fn from(e: rubato::ResampleError) -> Self {
        AudioError::Resample(e.to_string())
    }
}
