//! Audio file export
//!
//! Writers for rendered audio: raw little-endian 32-bit float (importable in
//! audio editors with the matching settings) and 16-bit WAV. Used by the
//! example binaries and offline tools; the synthesis engine itself never
//! touches the filesystem.

use std::io::Write;
use std::path::Path;

use crate::{Result, SynthError};

/// Write samples as raw little-endian 32-bit floats.
///
/// Stereo data is expected sample-interleaved (L, R, L, R, ...). The file
/// has no header; import with the rendering sample rate and channel count.
pub fn write_raw_f32<P: AsRef<Path>>(path: P, samples: &[f32]) -> Result<()> {
    let mut file = std::fs::File::create(path)?;

    let mut bytes = Vec::with_capacity(samples.len() * 4);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }

    file.write_all(&bytes)?;
    Ok(())
}

/// Write samples to a 16-bit WAV file.
///
/// Stereo data is expected sample-interleaved. Samples are clamped to
/// [-1, 1] before conversion.
pub fn write_wav<P: AsRef<Path>>(
    path: P,
    samples: &[f32],
    sample_rate: u32,
    channels: u16,
) -> Result<()> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| SynthError::AudioFileError(format!("Failed to create WAV file: {}", e)))?;

    for &sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer
            .write_sample(value)
            .map_err(|e| SynthError::AudioFileError(format!("Failed to write sample: {}", e)))?;
    }

    writer
        .finalize()
        .map_err(|e| SynthError::AudioFileError(format!("Failed to finalize WAV file: {}", e)))?;

    Ok(())
}

/// Interleave separate left and right buffers into one L,R stream.
pub fn interleave(left: &[f32], right: &[f32]) -> Vec<f32> {
    let mut interleaved = Vec::with_capacity(left.len() + right.len());
    for (l, r) in left.iter().zip(right) {
        interleaved.push(*l);
        interleaved.push(*r);
    }
    interleaved
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interleave() {
        let left = [0.1, 0.2, 0.3];
        let right = [-0.1, -0.2, -0.3];
        assert_eq!(
            interleave(&left, &right),
            vec![0.1, -0.1, 0.2, -0.2, 0.3, -0.3]
        );
    }

    #[test]
    fn test_raw_f32_round_trip() {
        let dir = std::env::temp_dir();
        let path = dir.join("sfsynth_export_test.f32");

        let samples = [0.0f32, 0.5, -0.5, 1.0];
        write_raw_f32(&path, &samples).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 16);
        for (i, sample) in samples.iter().enumerate() {
            let value = f32::from_le_bytes([
                bytes[4 * i],
                bytes[4 * i + 1],
                bytes[4 * i + 2],
                bytes[4 * i + 3],
            ]);
            assert_eq!(value, *sample);
        }

        std::fs::remove_file(&path).ok();
    }
}
