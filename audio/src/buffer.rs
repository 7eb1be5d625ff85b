use crate::AudioError;

/// A buffer of mono audio samples with a known sample rate.
///
/// Every buffer crossing a component boundary carries a nonzero sample
/// rate; constructors enforce this.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Creates a buffer from mono samples.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self, AudioError> {
        if sample_rate == 0 {
            return Err(AudioError::InvalidSampleRate(sample_rate));
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration of the buffer in seconds.
    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Truncates the buffer to at most `seconds` of audio.
    pub fn crop(&mut self, seconds: f64) {
        let max = (seconds * self.sample_rate as f64) as usize;
        self.samples.truncate(max);
    }

    /// Returns the given temporal shard of this buffer.
    ///
    /// Shards are non-overlapping equal-length partitions; shard `i` of
    /// `n` covers the sample range `[i*len/n, (i+1)*len/n)`, with the
    /// final shard absorbing the rounding remainder. `num_shards` of 0
    /// or 1 returns the whole buffer.
    pub fn slice_shard(&self, shard_index: u32, num_shards: u32) -> Result<Self, AudioError> {
        if num_shards <= 1 {
            if shard_index != 0 {
                return Err(AudioError::InvalidShard {
                    shard_index,
                    num_shards,
                });
            }
            return Ok(self.clone());
        }
        if shard_index >= num_shards {
            return Err(AudioError::InvalidShard {
                shard_index,
                num_shards,
            });
        }
        let len = self.samples.len();
        let start = len * shard_index as usize / num_shards as usize;
        let end = if shard_index + 1 == num_shards {
            len
        } else {
            len * (shard_index as usize + 1) / num_shards as usize
        };
        Ok(Self {
            samples: self.samples[start..end].to_vec(),
            sample_rate: self.sample_rate,
        })
    }
}
