//! Batch audio-embedding pipeline.
//!
//! Runs acoustic models over a corpus of audio files and serializes
//! per-window embeddings, classifier logits, separated audio and raw
//! audio into sharded flat-record files.
//!
//! # Architecture
//!
//! 1. [`SourceInfo`]: one audio file plus an optional temporal shard of it
//! 2. [`EmbeddingModel`]: capability contract any acoustic model satisfies
//! 3. [`SeparateEmbedModel`]: separation model chained into an embedding
//!    model, with sample-rate reconciliation between the two
//! 4. [`EmbedFn`]: per-file unit turning one [`SourceInfo`] into one
//!    fixed-schema [`Record`]
//! 5. [`run_pipeline`]: worker pool fanning [`EmbedFn`] out over a corpus,
//!    writing sharded record files and aggregating [`Counters`]

mod embed_fn;
mod error;
mod model;
mod pipeline;
mod placeholder;
pub mod records;
mod sep_embed;
mod source;

pub use embed_fn::{EmbedFn, EmbedFnConfig, build_model};
pub use error::InferenceError;
pub use model::{Capabilities, EmbedOutput, EmbeddingModel, ModelConfig};
pub use pipeline::{Counters, PipelineOptions, PipelineReport, run_pipeline};
pub use placeholder::{LOGIT_NAME, PlaceholderModel};
pub use records::{ParsedRecord, Record, RecordReader, RecordWriter, parse_record};
pub use sep_embed::{SeparateEmbedConfig, SeparateEmbedModel};
pub use source::{SourceInfo, enumerate_sources};
