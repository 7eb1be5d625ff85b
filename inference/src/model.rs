use std::collections::BTreeMap;

use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};
use skylark_audio::AudioBuffer;

use crate::InferenceError;

/// The outputs an acoustic model declares support for.
///
/// Flags are fixed at model construction. A disabled capability yields
/// an empty output from [`EmbeddingModel::embed`], never an error and
/// never an absent field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub embeddings: bool,
    pub logits: bool,
    pub separated_audio: bool,
}

/// Output of one [`EmbeddingModel::embed`] call.
///
/// Unsupported outputs are zero-length arrays (or an empty map for
/// logits) so the serialization schema stays fixed across models.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbedOutput {
    /// `[windows, channels, embedding_size]`.
    pub embeddings: Array3<f32>,
    /// Label-set name to `[windows, num_labels]`.
    pub logits: BTreeMap<String, Array2<f32>>,
    /// `[windows, channels, samples]`, at the model's native rate.
    pub separated_audio: Array3<f32>,
}

impl EmbedOutput {
    /// An output with every field empty.
    pub fn empty() -> Self {
        Self {
            embeddings: Array3::zeros((0, 0, 0)),
            logits: BTreeMap::new(),
            separated_audio: Array3::zeros((0, 0, 0)),
        }
    }
}

/// Capability contract satisfied by any acoustic model.
///
/// `embed` accepts audio at any sample rate and resamples internally to
/// the model's native rate. It must be deterministic given identical
/// audio and configuration, and must not mutate its input. A model is
/// constructed once per worker and reused across many files, so any
/// expensive state (weights, compiled graphs) belongs in the
/// constructor.
pub trait EmbeddingModel: Send + Sync {
    /// The model's native sample rate in Hz.
    fn sample_rate(&self) -> u32;

    /// Embedding dimensionality; 0 when embeddings are unsupported.
    fn embedding_size(&self) -> usize;

    /// Length of one processing window in seconds.
    fn window_seconds(&self) -> f64;

    fn capabilities(&self) -> Capabilities;

    fn embed(&self, audio: &AudioBuffer) -> Result<EmbedOutput, InferenceError>;
}

/// Configuration for a single (non-composite) model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub sample_rate: u32,
    #[serde(default)]
    pub embedding_size: usize,
    #[serde(default)]
    pub make_embeddings: bool,
    #[serde(default)]
    pub make_logits: bool,
    #[serde(default)]
    pub make_separated_audio: bool,
    /// Channels produced when separation is enabled.
    #[serde(default = "default_num_channels")]
    pub num_channels: usize,
    /// Ordered label names; logits are emitted under the name `label`.
    /// Empty means a built-in generic label set.
    #[serde(default)]
    pub target_class_list: Vec<String>,
}

fn default_num_channels() -> usize {
    2
}

impl ModelConfig {
    pub fn validate(&self) -> Result<(), InferenceError> {
        if self.sample_rate == 0 {
            return Err(InferenceError::Config("sample_rate must be nonzero".into()));
        }
        if self.make_embeddings && self.embedding_size == 0 {
            return Err(InferenceError::Config(
                "embedding_size must be nonzero when make_embeddings is set".into(),
            ));
        }
        if self.make_separated_audio && self.num_channels == 0 {
            return Err(InferenceError::Config(
                "num_channels must be nonzero when make_separated_audio is set".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_output_has_zero_length_fields() {
        let out = EmbedOutput::empty();
        assert_eq!(out.embeddings.len(), 0);
        assert_eq!(out.separated_audio.len(), 0);
        assert!(out.logits.is_empty());
    }

    #[test]
    fn config_validation() {
        let cfg: ModelConfig = serde_json::from_value(serde_json::json!({
            "sample_rate": 16000,
            "embedding_size": 128,
            "make_embeddings": true,
        }))
        .unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.num_channels, 2);
        assert!(cfg.target_class_list.is_empty());

        let bad: ModelConfig = serde_json::from_value(serde_json::json!({
            "sample_rate": 0,
        }))
        .unwrap();
        assert!(bad.validate().is_err());

        let bad: ModelConfig = serde_json::from_value(serde_json::json!({
            "sample_rate": 16000,
            "make_embeddings": true,
        }))
        .unwrap();
        assert!(bad.validate().is_err());
    }
}
