//! Whole-buffer sample-rate conversion.
//!
//! Mono batch resampling built on rubato's FFT resampler. Input is fed
//! in fixed-size blocks, the final block zero-padded, and the output is
//! trimmed by the resampler's startup delay so the result lines up with
//! the source signal.

use rubato::{FftFixedInOut, Resampler as RubatoResampler};

use crate::{AudioBuffer, AudioError};

const CHUNK_FRAMES: usize = 1024;

/// Resamples a mono buffer to `target_rate`.
///
/// Returns a clone when the buffer is already at the target rate. The
/// output length is `round(len * target_rate / source_rate)`.
pub fn resample(audio: &AudioBuffer, target_rate: u32) -> Result<AudioBuffer, AudioError> {
    if target_rate == 0 {
        return Err(AudioError::InvalidSampleRate(target_rate));
    }
    if audio.sample_rate() == target_rate {
        return Ok(audio.clone());
    }
    if audio.is_empty() {
        return AudioBuffer::new(Vec::new(), target_rate);
    }

    let src = audio.samples();
    let expected =
        ((src.len() as u64 * target_rate as u64) as f64 / audio.sample_rate() as f64).round()
            as usize;

    let mut resampler = FftFixedInOut::<f32>::new(
        audio.sample_rate() as usize,
        target_rate as usize,
        CHUNK_FRAMES,
        1,
    )?;
    let delay = resampler.output_delay();

    let mut out: Vec<f32> = Vec::with_capacity(expected + delay);
    let mut input = vec![vec![0f32; 0]];
    let mut pos = 0;
    while out.len() < expected + delay {
        let needed = resampler.input_frames_next();
        input[0].clear();
        input[0].resize(needed, 0.0);
        if pos < src.len() {
            let take = needed.min(src.len() - pos);
            input[0][..take].copy_from_slice(&src[pos..pos + take]);
            pos += take;
        }
        let mut output = resampler.process(&input, None)?;
        out.append(&mut output[0]);
    }

    out.drain(..delay.min(out.len()));
    out.truncate(expected);
    AudioBuffer::new(out, target_rate)
}
