use ndarray::{Axis, Zip, s};
use serde::{Deserialize, Serialize};
use skylark_audio::{AudioBuffer, resample};

use crate::{
    Capabilities, EmbedOutput, EmbeddingModel, InferenceError, ModelConfig, PlaceholderModel,
};

/// Configuration for a [`SeparateEmbedModel`] backed by two models.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeparateEmbedConfig {
    pub separator: ModelConfig,
    pub embedder: ModelConfig,
}

/// A separation model chained into an embedding model.
///
/// Separation runs first, at the caller's sample rate. Every separated
/// channel plus the original audio is resampled independently to the
/// embedding model's native rate and embedded; per-channel embeddings
/// are stacked on the channel axis, per-channel logits reduced by
/// element-wise max. The two models' rates are never assumed equal.
///
/// The composite is itself an [`EmbeddingModel`], so the rest of the
/// pipeline cannot tell it apart from a plain model.
pub struct SeparateEmbedModel {
    separator: Box<dyn EmbeddingModel>,
    embedder: Box<dyn EmbeddingModel>,
}

impl SeparateEmbedModel {
    pub fn new(
        separator: Box<dyn EmbeddingModel>,
        embedder: Box<dyn EmbeddingModel>,
    ) -> Result<Self, InferenceError> {
        if !separator.capabilities().separated_audio {
            return Err(InferenceError::Config(
                "separation model does not produce separated audio".into(),
            ));
        }
        Ok(Self {
            separator,
            embedder,
        })
    }

    pub fn from_config(config: &SeparateEmbedConfig) -> Result<Self, InferenceError> {
        let separator = PlaceholderModel::new(config.separator.clone())?;
        let embedder = PlaceholderModel::new(config.embedder.clone())?;
        Self::new(Box::new(separator), Box::new(embedder))
    }
}

impl EmbeddingModel for SeparateEmbedModel {
    fn sample_rate(&self) -> u32 {
        self.separator.sample_rate()
    }

    fn embedding_size(&self) -> usize {
        self.embedder.embedding_size()
    }

    fn window_seconds(&self) -> f64 {
        self.embedder.window_seconds()
    }

    fn capabilities(&self) -> Capabilities {
        let emb = self.embedder.capabilities();
        Capabilities {
            embeddings: emb.embeddings,
            logits: emb.logits,
            separated_audio: true,
        }
    }

    fn embed(&self, audio: &AudioBuffer) -> Result<EmbedOutput, InferenceError> {
        let sep_out = self.separator.embed(audio)?;
        let sep = &sep_out.separated_audio;
        let sep_rate = self.separator.sample_rate();
        let emb_rate = self.embedder.sample_rate();

        // Channel set: separated channels, then the original raw audio.
        let mut channels: Vec<AudioBuffer> = Vec::with_capacity(sep.shape()[1] + 1);
        for k in 0..sep.shape()[1] {
            let samples: Vec<f32> = sep.index_axis(Axis(1), k).iter().copied().collect();
            channels.push(AudioBuffer::new(samples, sep_rate)?);
        }
        channels.push(audio.clone());

        let mut per_channel = Vec::with_capacity(channels.len());
        for buf in &channels {
            let at_rate = resample(buf, emb_rate)?;
            per_channel.push(self.embedder.embed(&at_rate)?);
        }

        let mut out = EmbedOutput::empty();
        out.separated_audio = sep_out.separated_audio;

        if self.embedder.capabilities().embeddings {
            // Channel lengths can drift by a sample through resampling;
            // align on the shortest window count before stacking.
            let windows = per_channel
                .iter()
                .map(|o| o.embeddings.shape()[0])
                .min()
                .unwrap_or(0);
            let views: Vec<_> = per_channel
                .iter()
                .map(|o| o.embeddings.slice(s![..windows, .., ..]))
                .collect();
            out.embeddings = ndarray::concatenate(Axis(1), &views)?;
        }

        if self.embedder.capabilities().logits {
            let names: Vec<String> = per_channel[0].logits.keys().cloned().collect();
            for name in names {
                let windows = per_channel
                    .iter()
                    .map(|o| o.logits[&name].shape()[0])
                    .min()
                    .unwrap_or(0);
                let mut acc = per_channel[0].logits[&name].slice(s![..windows, ..]).to_owned();
                for other in &per_channel[1..] {
                    let view = other.logits[&name].slice(s![..windows, ..]);
                    Zip::from(&mut acc).and(&view).for_each(|a, &b| *a = a.max(b));
                }
                out.logits.insert(name, acc);
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placeholder::LOGIT_NAME;

    fn separator_config(rate: u32, num_channels: usize) -> ModelConfig {
        ModelConfig {
            sample_rate: rate,
            embedding_size: 0,
            make_embeddings: false,
            make_logits: false,
            make_separated_audio: true,
            num_channels,
            target_class_list: vec![],
        }
    }

    fn embedder_config(rate: u32, labels: &[&str]) -> ModelConfig {
        ModelConfig {
            sample_rate: rate,
            embedding_size: 128,
            make_embeddings: true,
            make_logits: true,
            make_separated_audio: false,
            num_channels: 2,
            target_class_list: labels.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn tone(rate: u32, seconds: f64) -> AudioBuffer {
        let n = (rate as f64 * seconds) as usize;
        let samples = (0..n)
            .map(|i| (i as f32 * 0.03).sin() * 0.5)
            .collect();
        AudioBuffer::new(samples, rate).unwrap()
    }

    fn sep_embed(sep_rate: u32, emb_rate: u32, num_channels: usize) -> SeparateEmbedModel {
        SeparateEmbedModel::from_config(&SeparateEmbedConfig {
            separator: separator_config(sep_rate, num_channels),
            embedder: embedder_config(emb_rate, &["sparrow", "warbler", "thrush"]),
        })
        .unwrap()
    }

    #[test]
    fn five_second_clip_shapes() {
        // 2-channel separator plus the raw audio channel: axis length 3.
        let model = sep_embed(22050, 22050, 2);
        let out = model.embed(&tone(22050, 5.0)).unwrap();
        assert_eq!(out.embeddings.shape(), &[5, 3, 128]);
        assert_eq!(out.logits[LOGIT_NAME].shape(), &[5, 3]);
    }

    #[test]
    fn channel_axis_is_k_plus_one() {
        for k in 1..4 {
            let model = sep_embed(22050, 22050, k);
            let out = model.embed(&tone(22050, 2.0)).unwrap();
            assert_eq!(out.embeddings.shape(), &[2, k + 1, 128]);
        }
    }

    #[test]
    fn rates_are_reconciled() {
        // Separator at 22.05 kHz, embedder at 16 kHz: windows are still
        // one per second of source audio.
        let model = sep_embed(22050, 16000, 2);
        let out = model.embed(&tone(22050, 5.0)).unwrap();
        assert_eq!(out.embeddings.shape(), &[5, 3, 128]);
        assert_eq!(out.logits[LOGIT_NAME].shape(), &[5, 3]);
    }

    #[test]
    fn logits_are_per_channel_max() {
        let model = sep_embed(22050, 22050, 2);
        let audio = tone(22050, 3.0);
        let out = model.embed(&audio).unwrap();

        // Recompute each channel's logits directly and reduce by hand.
        let separator = PlaceholderModel::new(separator_config(22050, 2)).unwrap();
        let embedder =
            PlaceholderModel::new(embedder_config(22050, &["sparrow", "warbler", "thrush"]))
                .unwrap();
        let sep = separator.embed(&audio).unwrap().separated_audio;
        let mut channels = Vec::new();
        for k in 0..2 {
            let samples: Vec<f32> = sep.index_axis(Axis(1), k).iter().copied().collect();
            channels.push(AudioBuffer::new(samples, 22050).unwrap());
        }
        channels.push(audio.clone());

        let per_channel: Vec<_> = channels
            .iter()
            .map(|c| embedder.embed(c).unwrap().logits[LOGIT_NAME].clone())
            .collect();
        for w in 0..3 {
            for j in 0..3 {
                let want = per_channel
                    .iter()
                    .map(|l| l[[w, j]])
                    .fold(f32::MIN, f32::max);
                assert_eq!(out.logits[LOGIT_NAME][[w, j]], want);
            }
        }
    }

    #[test]
    fn separated_audio_passes_through() {
        let model = sep_embed(22050, 22050, 2);
        let out = model.embed(&tone(22050, 2.0)).unwrap();
        assert_eq!(out.separated_audio.shape(), &[1, 2, 2 * 22050]);
    }

    #[test]
    fn embedder_without_logits_yields_empty_logits() {
        let mut emb = embedder_config(22050, &[]);
        emb.make_logits = false;
        let model = SeparateEmbedModel::from_config(&SeparateEmbedConfig {
            separator: separator_config(22050, 2),
            embedder: emb,
        })
        .unwrap();
        let out = model.embed(&tone(22050, 2.0)).unwrap();
        assert!(out.logits.is_empty());
        assert_eq!(out.embeddings.shape(), &[2, 3, 128]);
    }

    #[test]
    fn separator_must_separate() {
        let not_a_separator = PlaceholderModel::new(embedder_config(22050, &[])).unwrap();
        let embedder = PlaceholderModel::new(embedder_config(22050, &[])).unwrap();
        assert!(SeparateEmbedModel::new(Box::new(not_a_separator), Box::new(embedder)).is_err());
    }
}
