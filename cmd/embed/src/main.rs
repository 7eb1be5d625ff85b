//! skylark-embed - batch embedding over an audio corpus.
//!
//! Enumerates the input directory, runs the configured model over every
//! file (optionally sharded in time), and writes sharded record files
//! plus a processed/failed summary.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;

use skylark_inference::{
    EmbedFn, EmbedFnConfig, PipelineOptions, enumerate_sources, run_pipeline,
};

/// Batch embedding over an audio corpus.
#[derive(Parser, Debug)]
#[command(name = "skylark-embed")]
#[command(about = "Run acoustic models over an audio corpus and write embedding records")]
struct Args {
    /// Directory scanned recursively for audio files
    #[arg(long)]
    input_dir: PathBuf,

    /// Directory for sharded record output
    #[arg(long)]
    output_dir: PathBuf,

    /// Model implementation key (placeholder, separate_embed)
    #[arg(long, default_value = "placeholder")]
    model: String,

    /// YAML file with the model configuration
    #[arg(long)]
    model_config: PathBuf,

    /// Store embeddings in output records
    #[arg(long)]
    write_embeddings: bool,

    /// Store classifier logits in output records
    #[arg(long)]
    write_logits: bool,

    /// Store separated audio channels in output records
    #[arg(long)]
    write_separated_audio: bool,

    /// Store the raw (decoded) audio in output records
    #[arg(long)]
    write_raw_audio: bool,

    /// Crop each file/shard to this many seconds after loading
    #[arg(long)]
    crop_s: Option<f64>,

    /// Split each file into this many temporal shards (0 = whole file)
    #[arg(long, default_value_t = 0)]
    num_shards: u32,

    /// Worker threads (default: available parallelism)
    #[arg(long)]
    workers: Option<usize>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_target(false)
        .init();

    let raw = std::fs::read_to_string(&args.model_config)
        .with_context(|| format!("reading {}", args.model_config.display()))?;
    let model_config: serde_json::Value =
        serde_yaml::from_str(&raw).context("parsing model config")?;

    let embed_fn = EmbedFn::setup(&EmbedFnConfig {
        model_key: args.model.clone(),
        model_config,
        write_embeddings: args.write_embeddings,
        write_logits: args.write_logits,
        write_separated_audio: args.write_separated_audio,
        write_raw_audio: args.write_raw_audio,
    })?;

    let sources = enumerate_sources(&args.input_dir, args.num_shards)?;
    if sources.is_empty() {
        bail!("no audio files under {}", args.input_dir.display());
    }

    let num_workers = args.workers.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    });

    let report = run_pipeline(
        &sources,
        &embed_fn,
        &args.output_dir,
        &PipelineOptions {
            num_workers,
            crop_seconds: args.crop_s,
        },
    )?;

    println!("examples_processed: {}", report.examples_processed);
    println!("examples_failed:    {}", report.examples_failed);
    for file in &report.output_files {
        println!("wrote {}", file.display());
    }

    if report.examples_processed == 0 && report.examples_failed > 0 {
        bail!("all {} sources failed", report.examples_failed);
    }
    Ok(())
}
