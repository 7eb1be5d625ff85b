use std::path::{Path, PathBuf};

use crate::InferenceError;

/// One input audio file plus which temporal shard of it to process.
///
/// `num_shards` of 0 or 1 means the whole file. Values are created once
/// by corpus enumeration and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    pub filepath: PathBuf,
    pub shard_index: u32,
    pub num_shards: u32,
}

impl SourceInfo {
    pub fn new(filepath: impl Into<PathBuf>, shard_index: u32, num_shards: u32) -> Self {
        Self {
            filepath: filepath.into(),
            shard_index,
            num_shards,
        }
    }

    /// The file's base name, as stored in output records.
    pub fn file_name(&self) -> String {
        self.filepath
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Enumerates a corpus directory into [`SourceInfo`] values.
///
/// Scans recursively for `.wav` files in sorted order (so re-runs see
/// the same enumeration) and expands each file into `num_shards`
/// entries.
pub fn enumerate_sources(dir: &Path, num_shards: u32) -> Result<Vec<SourceInfo>, InferenceError> {
    let mut files = Vec::new();
    collect_wavs(dir, &mut files)?;
    files.sort();

    let shards = num_shards.max(1);
    let mut sources = Vec::with_capacity(files.len() * shards as usize);
    for file in files {
        for shard in 0..shards {
            sources.push(SourceInfo::new(file.clone(), shard, num_shards));
        }
    }
    Ok(sources)
}

fn collect_wavs(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), InferenceError> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_wavs(&path, out)?;
        } else if path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("wav"))
        {
            out.push(path);
        }
    }
    Ok(())
}
