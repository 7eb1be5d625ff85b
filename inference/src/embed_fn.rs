use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use skylark_audio::load_wav;

use crate::pipeline::Counters;
use crate::records::{
    EMBEDDING, FILE_NAME, NUM_SHARDS, RAW_AUDIO, SEPARATED_AUDIO, SHARD_INDEX,
};
use crate::{
    EmbeddingModel, InferenceError, ModelConfig, PlaceholderModel, Record, SeparateEmbedConfig,
    SeparateEmbedModel, SourceInfo,
};

/// Configuration for the per-file processing unit.
///
/// The `make_*` toggles in the model configuration control what gets
/// computed; the `write_*` toggles here independently control what gets
/// stored. A computed output can be withheld from storage, and writing
/// an output the model does not compute is not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedFnConfig {
    /// Selects the model implementation (`placeholder`, `separate_embed`).
    pub model_key: String,
    /// Implementation-specific model configuration.
    pub model_config: serde_json::Value,
    #[serde(default)]
    pub write_embeddings: bool,
    #[serde(default)]
    pub write_logits: bool,
    #[serde(default)]
    pub write_separated_audio: bool,
    #[serde(default)]
    pub write_raw_audio: bool,
}

/// Builds a model from its registry key and configuration.
///
/// An unknown key or malformed configuration is a setup-time error; it
/// indicates a run-wide misconfiguration, not a per-file problem.
pub fn build_model(
    model_key: &str,
    model_config: &serde_json::Value,
) -> Result<Box<dyn EmbeddingModel>, InferenceError> {
    match model_key {
        "placeholder" => {
            let config: ModelConfig = serde_json::from_value(model_config.clone())
                .map_err(|e| InferenceError::Config(format!("bad placeholder config: {e}")))?;
            Ok(Box::new(PlaceholderModel::new(config)?))
        }
        "separate_embed" => {
            let config: SeparateEmbedConfig = serde_json::from_value(model_config.clone())
                .map_err(|e| InferenceError::Config(format!("bad separate_embed config: {e}")))?;
            Ok(Box::new(SeparateEmbedModel::from_config(&config)?))
        }
        other => Err(InferenceError::Config(format!("unknown model key: {other}"))),
    }
}

/// Turns one [`SourceInfo`] into one fixed-schema [`Record`].
///
/// The model is constructed once in [`EmbedFn::setup`] and reused for
/// every file a worker processes. Per-file failures are isolated: they
/// increment the failed counter and never abort the run.
pub struct EmbedFn {
    write_embeddings: bool,
    write_logits: bool,
    write_separated_audio: bool,
    write_raw_audio: bool,
    model: Box<dyn EmbeddingModel>,
    counters: Counters,
}

impl EmbedFn {
    pub fn setup(config: &EmbedFnConfig) -> Result<Self, InferenceError> {
        let model = build_model(&config.model_key, &config.model_config)?;
        debug!(
            model_key = %config.model_key,
            sample_rate = model.sample_rate(),
            "embed fn ready"
        );
        Ok(Self {
            write_embeddings: config.write_embeddings,
            write_logits: config.write_logits,
            write_separated_audio: config.write_separated_audio,
            write_raw_audio: config.write_raw_audio,
            model,
            counters: Counters::new(),
        })
    }

    pub fn model(&self) -> &dyn EmbeddingModel {
        self.model.as_ref()
    }

    /// Handle to the processed/failed counters, shared across workers.
    pub fn counters(&self) -> Counters {
        self.counters.clone()
    }

    /// Processes one source, counting success or failure.
    ///
    /// Failures are logged and converted into a counter increment so
    /// the caller can move on to the next file.
    pub fn process(&self, source: &SourceInfo, crop_seconds: Option<f64>) -> Option<Record> {
        match self.try_process(source, crop_seconds) {
            Ok(record) => {
                self.counters.inc_processed();
                Some(record)
            }
            Err(e) => {
                warn!(
                    file = %source.filepath.display(),
                    shard = source.shard_index,
                    error = %e,
                    "skipping source"
                );
                self.counters.inc_failed();
                None
            }
        }
    }

    /// Processes one source without touching the counters.
    pub fn try_process(
        &self,
        source: &SourceInfo,
        crop_seconds: Option<f64>,
    ) -> Result<Record, InferenceError> {
        let mut audio = load_wav(&source.filepath)?;
        audio = audio.slice_shard(source.shard_index, source.num_shards)?;
        if let Some(seconds) = crop_seconds {
            audio.crop(seconds);
        }

        let window = self.model.window_seconds();
        let seconds = audio.duration_seconds();
        if seconds < window {
            return Err(InferenceError::AudioTooShort { seconds, window });
        }

        let output = self.model.embed(&audio)?;
        let caps = self.model.capabilities();

        let mut record = Record::new();
        record.set_text(FILE_NAME, source.file_name());
        record.set_ints(SHARD_INDEX, vec![source.shard_index as i64]);
        record.set_ints(NUM_SHARDS, vec![source.num_shards as i64]);

        record.set_array(
            EMBEDDING,
            (self.write_embeddings && caps.embeddings)
                .then(|| output.embeddings.view().into_dyn()),
        );

        // One pair per logit set the model computed; withheld sets keep
        // their field names with empty payloads.
        for (name, logits) in &output.logits {
            record.set_array(name, self.write_logits.then(|| logits.view().into_dyn()));
        }

        record.set_array(
            SEPARATED_AUDIO,
            (self.write_separated_audio && caps.separated_audio)
                .then(|| output.separated_audio.view().into_dyn()),
        );

        if self.write_raw_audio {
            let raw =
                ndarray::Array2::from_shape_vec((1, audio.len()), audio.samples().to_vec())?;
            record.set_array(RAW_AUDIO, Some(raw.view().into_dyn()));
        } else {
            record.set_array(RAW_AUDIO, None);
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{self, parse_record};
    use std::path::Path;

    fn write_tone_wav(path: &Path, rate: u32, seconds: f64) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        let n = (rate as f64 * seconds) as usize;
        for i in 0..n {
            let s = ((i as f32 * 0.02).sin() * 0.4 * i16::MAX as f32) as i16;
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn placeholder_config(write_raw: bool) -> EmbedFnConfig {
        EmbedFnConfig {
            model_key: "placeholder".into(),
            model_config: serde_json::json!({
                "sample_rate": 16000,
                "embedding_size": 8,
                "make_embeddings": true,
                "make_logits": true,
            }),
            write_embeddings: true,
            write_logits: true,
            write_separated_audio: false,
            write_raw_audio: write_raw,
        }
    }

    #[test]
    fn unknown_model_key_is_fatal_at_setup() {
        let mut config = placeholder_config(false);
        config.model_key = "no_such_model".into();
        assert!(matches!(
            EmbedFn::setup(&config),
            Err(InferenceError::Config(_))
        ));
    }

    #[test]
    fn malformed_model_config_is_fatal_at_setup() {
        let mut config = placeholder_config(false);
        config.model_config = serde_json::json!({"sample_rate": "loud"});
        assert!(matches!(
            EmbedFn::setup(&config),
            Err(InferenceError::Config(_))
        ));
    }

    #[test]
    fn record_carries_base_name_and_shard() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clap.wav");
        write_tone_wav(&path, 16000, 4.0);

        let embed_fn = EmbedFn::setup(&placeholder_config(true)).unwrap();
        assert_eq!(embed_fn.model().sample_rate(), 16000);
        let source = SourceInfo::new(&path, 1, 2);
        let record = embed_fn.try_process(&source, None).unwrap();

        let parsed = parse_record(&record.to_bytes().unwrap(), &["label"]).unwrap();
        assert_eq!(parsed.file_name, "clap.wav");
        assert_eq!(parsed.shard_index, 1);
        assert_eq!(parsed.num_shards, 2);
        // Second of two shards of 4 s: 2 windows of embeddings.
        assert_eq!(parsed.arrays[records::EMBEDDING].shape(), &[2, 1, 8]);
        assert_eq!(parsed.arrays["label"].shape(), &[2, 10]);
        assert_eq!(parsed.arrays[records::RAW_AUDIO].shape(), &[1, 32000]);
    }

    #[test]
    fn crop_limits_windows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long.wav");
        write_tone_wav(&path, 16000, 10.0);

        let embed_fn = EmbedFn::setup(&placeholder_config(false)).unwrap();
        let record = embed_fn
            .try_process(&SourceInfo::new(&path, 0, 1), Some(3.0))
            .unwrap();
        let parsed = parse_record(&record.to_bytes().unwrap(), &[]).unwrap();
        assert_eq!(parsed.arrays[records::EMBEDDING].shape(), &[3, 1, 8]);
    }

    #[test]
    fn short_audio_is_counted_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blip.wav");
        write_tone_wav(&path, 16000, 0.25);

        let embed_fn = EmbedFn::setup(&placeholder_config(false)).unwrap();
        assert!(embed_fn.process(&SourceInfo::new(&path, 0, 1), None).is_none());
        assert_eq!(embed_fn.counters().examples_failed(), 1);
        assert_eq!(embed_fn.counters().examples_processed(), 0);
    }

    #[test]
    fn decode_failure_is_counted_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.wav");
        std::fs::write(&path, b"not audio").unwrap();

        let embed_fn = EmbedFn::setup(&placeholder_config(false)).unwrap();
        assert!(embed_fn.process(&SourceInfo::new(&path, 0, 1), None).is_none());
        assert_eq!(embed_fn.counters().examples_failed(), 1);
    }

    #[test]
    fn write_toggle_off_withholds_computed_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clap.wav");
        write_tone_wav(&path, 16000, 2.0);

        let mut config = placeholder_config(false);
        config.write_embeddings = false;
        let embed_fn = EmbedFn::setup(&config).unwrap();
        let record = embed_fn
            .try_process(&SourceInfo::new(&path, 0, 1), None)
            .unwrap();

        let parsed = parse_record(&record.to_bytes().unwrap(), &["label"]).unwrap();
        assert_eq!(parsed.arrays[records::EMBEDDING].shape(), &[0]);
        // Logits still written: toggles are independent.
        assert_eq!(parsed.arrays["label"].shape(), &[2, 10]);
    }
}
