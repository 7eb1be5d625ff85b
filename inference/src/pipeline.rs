use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::info;

use crate::records::{RecordWriter, shard_file_name};
use crate::{EmbedFn, InferenceError, SourceInfo};

/// Operational counters aggregated across workers.
///
/// Clones share the same underlying values; increments are safe from
/// any number of threads and the totals are queryable after a run.
#[derive(Debug, Clone, Default)]
pub struct Counters {
    inner: Arc<CounterInner>,
}

#[derive(Debug, Default)]
struct CounterInner {
    processed: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_processed(&self) {
        self.inner.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_failed(&self) {
        self.inner.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn examples_processed(&self) -> u64 {
        self.inner.processed.load(Ordering::Relaxed)
    }

    pub fn examples_failed(&self) -> u64 {
        self.inner.failed.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub num_workers: usize,
    /// Crop every file/shard to at most this many seconds after loading.
    pub crop_seconds: Option<f64>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            num_workers: 1,
            crop_seconds: None,
        }
    }
}

/// Summary of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub examples_processed: u64,
    pub examples_failed: u64,
    pub output_files: Vec<PathBuf>,
}

/// Fans [`EmbedFn`] out over the sources with a fixed worker pool.
///
/// Worker `w` of `n` processes source indices congruent to `w` mod `n`
/// and owns the output shard of the same index, so the partitioning of
/// records into shard files is reproducible given the same enumeration
/// and worker count. Per-file failures are counted and skipped; only
/// output I/O errors and setup problems abort the run.
pub fn run_pipeline(
    sources: &[SourceInfo],
    embed_fn: &EmbedFn,
    output_dir: &Path,
    options: &PipelineOptions,
) -> Result<PipelineReport, InferenceError> {
    std::fs::create_dir_all(output_dir)?;
    let workers = options.num_workers.max(1);
    info!(
        sources = sources.len(),
        workers,
        output_dir = %output_dir.display(),
        "starting pipeline"
    );

    let output_files = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|w| {
                scope.spawn(move || -> Result<PathBuf, InferenceError> {
                    let path = output_dir.join(shard_file_name(w, workers));
                    let mut writer = RecordWriter::create(&path)?;
                    for source in sources.iter().skip(w).step_by(workers) {
                        if let Some(record) = embed_fn.process(source, options.crop_seconds) {
                            writer.write(&record)?;
                        }
                    }
                    writer.flush()?;
                    Ok(path)
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| {
                h.join()
                    .map_err(|_| InferenceError::Model("worker thread panicked".into()))?
            })
            .collect::<Result<Vec<PathBuf>, InferenceError>>()
    })?;

    let counters = embed_fn.counters();
    let report = PipelineReport {
        examples_processed: counters.examples_processed(),
        examples_failed: counters.examples_failed(),
        output_files,
    };
    info!(
        processed = report.examples_processed,
        failed = report.examples_failed,
        "pipeline complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_across_clones() {
        let counters = Counters::new();
        let clone = counters.clone();
        counters.inc_processed();
        clone.inc_processed();
        clone.inc_failed();
        assert_eq!(counters.examples_processed(), 2);
        assert_eq!(counters.examples_failed(), 1);
    }

    #[test]
    fn counters_are_thread_safe() {
        let counters = Counters::new();
        std::thread::scope(|scope| {
            for _ in 0..8 {
                let c = counters.clone();
                scope.spawn(move || {
                    for _ in 0..1000 {
                        c.inc_processed();
                    }
                });
            }
        });
        assert_eq!(counters.examples_processed(), 8000);
    }
}
