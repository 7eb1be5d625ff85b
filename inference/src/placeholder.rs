use ndarray::{Array2, Array3};
use skylark_audio::{AudioBuffer, resample};

use crate::{Capabilities, EmbedOutput, EmbeddingModel, InferenceError, ModelConfig};

/// Name of the logit set emitted by models with a target class list.
pub const LOGIT_NAME: &str = "label";

const DEFAULT_NUM_LABELS: usize = 10;

/// Deterministic stand-in model used for wiring and tests.
///
/// Produces one processing window per second of audio at its native
/// rate. Outputs are cheap functions of the window content so that
/// composition properties (channel stacking, logit reduction) are
/// observable without real model weights. Separation splits the input
/// into `num_channels` scaled copies.
pub struct PlaceholderModel {
    config: ModelConfig,
}

impl PlaceholderModel {
    pub fn new(config: ModelConfig) -> Result<Self, InferenceError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn num_labels(&self) -> usize {
        if self.config.target_class_list.is_empty() {
            DEFAULT_NUM_LABELS
        } else {
            self.config.target_class_list.len()
        }
    }

    fn window_energy(window: &[f32]) -> f32 {
        window.iter().map(|s| s.abs()).sum::<f32>() / window.len() as f32
    }
}

impl EmbeddingModel for PlaceholderModel {
    fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    fn embedding_size(&self) -> usize {
        if self.config.make_embeddings {
            self.config.embedding_size
        } else {
            0
        }
    }

    fn window_seconds(&self) -> f64 {
        1.0
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            embeddings: self.config.make_embeddings,
            logits: self.config.make_logits,
            separated_audio: self.config.make_separated_audio,
        }
    }

    fn embed(&self, audio: &AudioBuffer) -> Result<EmbedOutput, InferenceError> {
        let audio = resample(audio, self.config.sample_rate)?;
        let samples = audio.samples();
        let window = self.config.sample_rate as usize;
        let windows = samples.len() / window;

        let mut out = EmbedOutput::empty();

        if self.config.make_embeddings {
            let size = self.config.embedding_size;
            let mut e = Array3::zeros((windows, 1, size));
            for w in 0..windows {
                let energy = Self::window_energy(&samples[w * window..(w + 1) * window]);
                for d in 0..size {
                    e[[w, 0, d]] = energy + w as f32 + d as f32 * 1e-3;
                }
            }
            out.embeddings = e;
        }

        if self.config.make_logits {
            let labels = self.num_labels();
            let mut l = Array2::zeros((windows, labels));
            for w in 0..windows {
                let energy = Self::window_energy(&samples[w * window..(w + 1) * window]);
                for j in 0..labels {
                    l[[w, j]] = energy + w as f32 * 0.1 - j as f32 * 0.01;
                }
            }
            out.logits.insert(LOGIT_NAME.to_string(), l);
        }

        if self.config.make_separated_audio {
            let channels = self.config.num_channels;
            let mut sep = Array3::zeros((1, channels, samples.len()));
            for k in 0..channels {
                let scale = 1.0 / (k as f32 + 2.0);
                for (i, &s) in samples.iter().enumerate() {
                    sep[[0, k, i]] = s * scale;
                }
            }
            out.separated_audio = sep;
        }

        Ok(out)
    }
}
