use std::path::Path;

use hound::SampleFormat;

use crate::{AudioBuffer, AudioError};

/// Decodes a WAV file into a mono [`AudioBuffer`].
///
/// Integer PCM is normalized to [-1, 1]; multi-channel audio is
/// downmixed by averaging the channels of each frame.
pub fn load_wav(path: &Path) -> Result<AudioBuffer, AudioError> {
    let display = path.display().to_string();
    let decode = |e: hound::Error| AudioError::Decode {
        path: display.clone(),
        reason: e.to_string(),
    };

    let mut reader = hound::WavReader::open(path).map_err(decode)?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(decode)?,
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(decode)?
        }
    };

    let mono = downmix(&samples, spec.channels as usize);
    if mono.is_empty() {
        return Err(AudioError::Empty { path: display });
    }
    AudioBuffer::new(mono, spec.sample_rate)
}

fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}
