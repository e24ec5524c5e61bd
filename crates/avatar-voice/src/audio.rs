//! In-memory WAV helpers.

use crate::error::VoiceError;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::io::Cursor;
use std::time::Duration;

/// Returns the header of a WAV stream, failing if it is not one.
pub fn inspect(wav: &[u8]) -> Result<WavSpec, VoiceError> {
    Ok(WavReader::new(Cursor::new(wav))?.spec())
}

/// Largest absolute sample value scaled to `[0, 1]`. A stream with no
/// samples has a peak of 0.
pub fn peak_amplitude(wav: &[u8]) -> Result<f32, VoiceError> {
    let mut reader = WavReader::new(Cursor::new(wav))?;
    let spec = reader.spec();
    let peak = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .try_fold(0.0f32, |acc, s| s.map(|v| acc.max(v.abs())))?,
        SampleFormat::Int => {
            let full_scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .try_fold(0.0f32, |acc, s| s.map(|v| acc.max((v as f32).abs() / full_scale)))?
        }
    };
    Ok(peak)
}

/// Wraps raw little-endian signed 16-bit mono PCM into a WAV stream.
pub fn wrap_pcm_s16le(pcm: &[u8], sample_rate: u32) -> Result<Vec<u8>, VoiceError> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut buf = Vec::new();
    {
        let mut writer = WavWriter::new(Cursor::new(&mut buf), spec)?;
        for pair in pcm.chunks_exact(2) {
            writer.write_sample(i16::from_le_bytes([pair[0], pair[1]]))?;
        }
        writer.finalize()?;
    }
    Ok(buf)
}

/// Joins WAV segments in order with `gap` of silence between neighbours.
///
/// All segments must share one format; the output uses it too.
pub fn concat_with_gaps(segments: &[Vec<u8>], gap: Duration) -> Result<Vec<u8>, VoiceError> {
    let first = segments
        .first()
        .ok_or_else(|| VoiceError::Synthesis("no audio segments to join".to_string()))?;
    let spec = inspect(first)?;
    let gap_frames = (u128::from(spec.sample_rate) * gap.as_millis() / 1000) as usize;
    let gap_samples = gap_frames * usize::from(spec.channels);

    let mut buf = Vec::new();
    {
        let mut writer = WavWriter::new(Cursor::new(&mut buf), spec)?;
        for (i, segment) in segments.iter().enumerate() {
            let mut reader = WavReader::new(Cursor::new(segment.as_slice()))?;
            if reader.spec() != spec {
                return Err(VoiceError::Synthesis(format!(
                    "segment {} has format {:?}, expected {:?}",
                    i,
                    reader.spec(),
                    spec
                )));
            }
            match spec.sample_format {
                SampleFormat::Float => {
                    if i > 0 {
                        for _ in 0..gap_samples {
                            writer.write_sample(0.0f32)?;
                        }
                    }
                    for sample in reader.samples::<f32>() {
                        writer.write_sample(sample?)?;
                    }
                }
                SampleFormat::Int => {
                    if i > 0 {
                        for _ in 0..gap_samples {
                            writer.write_sample(0i32)?;
                        }
                    }
                    for sample in reader.samples::<i32>() {
                        writer.write_sample(sample?)?;
                    }
                }
            }
        }
        writer.finalize()?;
    }
    Ok(buf)
}
