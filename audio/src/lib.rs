//! Audio utilities for the skylark embedding pipeline.
//!
//! This crate provides the small audio surface the pipeline needs:
//!
//! - [`AudioBuffer`]: mono f32 samples with a known sample rate
//! - [`load_wav`]: WAV decoding (integer or float PCM, downmixed to mono)
//! - [`resample`]: whole-buffer sample-rate conversion via rubato

mod buffer;
mod error;
mod resample;
mod wav;

pub use buffer::AudioBuffer;
pub use error::AudioError;
pub use resample::resample;
pub use wav::load_wav;
