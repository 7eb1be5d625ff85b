//! Fixed-schema flat records and their parser.
//!
//! Every processed file/shard becomes exactly one [`Record`]: a map of
//! named features with fixed field names. N-D payloads are flattened to
//! 1-D `f32` storage with a companion `<name>_shape` field carrying the
//! true shape. Records are MessagePack-encoded and framed with a
//! little-endian `u32` length prefix in sharded output files.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use ndarray::{ArrayD, ArrayViewD, IxDyn};
use serde::{Deserialize, Serialize};

use crate::InferenceError;

pub const FILE_NAME: &str = "file_name";
pub const SHARD_INDEX: &str = "shard_index";
pub const NUM_SHARDS: &str = "num_shards";
pub const EMBEDDING: &str = "embedding";
pub const EMBEDDING_SHAPE: &str = "embedding_shape";
pub const SEPARATED_AUDIO: &str = "separated_audio";
pub const SEPARATED_AUDIO_SHAPE: &str = "separated_audio_shape";
pub const RAW_AUDIO: &str = "raw_audio";
pub const RAW_AUDIO_SHAPE: &str = "raw_audio_shape";

/// The shape companion field for a payload field.
pub fn shape_field(name: &str) -> String {
    format!("{name}_shape")
}

/// Returns the file name of one output shard.
pub fn shard_file_name(shard: usize, total: usize) -> String {
    format!("embeddings-{shard:05}-of-{total:05}.msgpack")
}

/// One feature value in a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Feature {
    Text(String),
    Floats(Vec<f32>),
    Ints(Vec<i64>),
}

/// A fixed-schema serialized record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    fields: BTreeMap<String, Feature>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_text(&mut self, name: &str, value: impl Into<String>) {
        self.fields.insert(name.to_string(), Feature::Text(value.into()));
    }

    pub fn set_floats(&mut self, name: &str, values: Vec<f32>) {
        self.fields.insert(name.to_string(), Feature::Floats(values));
    }

    pub fn set_ints(&mut self, name: &str, values: Vec<i64>) {
        self.fields.insert(name.to_string(), Feature::Ints(values));
    }

    /// Stores a payload/shape field pair.
    ///
    /// `Some(array)` flattens the array and records its true shape;
    /// `None` (withheld or unsupported output) stores an empty payload
    /// with shape `(0,)`. Either way both fields are present.
    pub fn set_array(&mut self, name: &str, array: Option<ArrayViewD<'_, f32>>) {
        match array {
            Some(a) => {
                self.set_floats(name, a.iter().copied().collect());
                self.set_ints(
                    &shape_field(name),
                    a.shape().iter().map(|&d| d as i64).collect(),
                );
            }
            None => {
                self.set_floats(name, Vec::new());
                self.set_ints(&shape_field(name), vec![0]);
            }
        }
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.fields.get(name) {
            Some(Feature::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn floats(&self, name: &str) -> Option<&[f32]> {
        match self.fields.get(name) {
            Some(Feature::Floats(v)) => Some(v),
            _ => None,
        }
    }

    pub fn ints(&self, name: &str) -> Option<&[i64]> {
        match self.fields.get(name) {
            Some(Feature::Ints(v)) => Some(v),
            _ => None,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, InferenceError> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, InferenceError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

/// Writes length-prefixed records to one output shard.
pub struct RecordWriter {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl RecordWriter {
    pub fn create(path: &Path) -> Result<Self, InferenceError> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&mut self, record: &Record) -> Result<(), InferenceError> {
        let bytes = record.to_bytes()?;
        self.writer.write_all(&(bytes.len() as u32).to_le_bytes())?;
        self.writer.write_all(&bytes)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), InferenceError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Iterates records from one shard file.
pub struct RecordReader {
    reader: BufReader<File>,
}

impl RecordReader {
    pub fn open(path: &Path) -> Result<Self, InferenceError> {
        Ok(Self {
            reader: BufReader::new(File::open(path)?),
        })
    }
}

impl Iterator for RecordReader {
    type Item = Result<Record, InferenceError>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut len_buf = [0u8; 4];
        match self.reader.read_exact(&mut len_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return None,
            Err(e) => return Some(Err(e.into())),
        }
        let len = u32::from_le_bytes(len_buf) as usize;
        let mut buf = vec![0u8; len];
        if let Err(e) = self.reader.read_exact(&mut buf) {
            return Some(Err(e.into()));
        }
        Some(Record::from_bytes(&buf))
    }
}

/// A record parsed back into shaped arrays.
#[derive(Debug, Clone)]
pub struct ParsedRecord {
    pub file_name: String,
    pub shard_index: i64,
    pub num_shards: i64,
    /// Payload field name to reconstructed array.
    pub arrays: BTreeMap<String, ArrayD<f32>>,
}

/// Parses a serialized record, reshaping each flat payload with its
/// shape field.
///
/// `logit_names` lists the logit sets to reconstruct in addition to the
/// fixed payload fields. A missing or empty payload parses to a
/// zero-length 1-D array regardless of its declared shape.
pub fn parse_record(bytes: &[u8], logit_names: &[&str]) -> Result<ParsedRecord, InferenceError> {
    let record = Record::from_bytes(bytes)?;

    let mut names = vec![EMBEDDING, SEPARATED_AUDIO, RAW_AUDIO];
    names.extend_from_slice(logit_names);

    let mut arrays = BTreeMap::new();
    for name in names {
        arrays.insert(name.to_string(), parse_array(&record, name)?);
    }

    Ok(ParsedRecord {
        file_name: record.text(FILE_NAME).unwrap_or_default().to_string(),
        shard_index: first_int(&record, SHARD_INDEX),
        num_shards: first_int(&record, NUM_SHARDS),
        arrays,
    })
}

fn first_int(record: &Record, name: &str) -> i64 {
    record.ints(name).and_then(|v| v.first().copied()).unwrap_or(0)
}

fn parse_array(record: &Record, name: &str) -> Result<ArrayD<f32>, InferenceError> {
    let payload = record.floats(name).unwrap_or(&[]);
    if payload.is_empty() {
        return Ok(ArrayD::zeros(IxDyn(&[0])));
    }
    let shape: Vec<usize> = record
        .ints(&shape_field(name))
        .ok_or_else(|| InferenceError::Parse(format!("missing shape field for {name}")))?
        .iter()
        .map(|&d| d as usize)
        .collect();
    ArrayD::from_shape_vec(IxDyn(&shape), payload.to_vec())
        .map_err(|e| InferenceError::Parse(format!("bad shape for {name}: {e}")))
}
