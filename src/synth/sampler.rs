//! Sample playback
//!
//! Resamples a region of the bank's global sample buffer at a pitch-derived
//! rate, with linear interpolation and optional looping. The read position is
//! a double-precision fractional index so long notes do not accumulate drift.

use std::sync::Arc;

/// Loop behavior of a sample region, from the `SampleModes` generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    /// Play the region once, then stop at its end
    None,
    /// Loop between the loop points for the whole life of the voice
    Continuous,
    /// Loop until the key is released, then play through to the region end
    UntilRelease,
}

impl LoopMode {
    /// Decode the raw `SampleModes` generator value.
    ///
    /// Value 2 is unused by the SoundFont specification and plays as no loop.
    pub fn from_value(value: u16) -> Self {
        match value {
            1 => LoopMode::Continuous,
            3 => LoopMode::UntilRelease,
            _ => LoopMode::None,
        }
    }
}

/// Pitch-shifting sample player for one voice track.
#[derive(Debug, Clone)]
pub struct Sampler {
    // Information about the audio sample
    buffer: Arc<Vec<f32>>,
    start: u32,
    end: u32,
    loop_mode: LoopMode,
    loop_start: u32,
    loop_end: u32,
    root_key: u8,

    // Internal state
    dest_sample_rate: u32,
    current_index: f64,
    looping: bool,
    tune: f32,
    pitch_change_scale: f32,
    sample_rate_ratio: f32,
}

impl Sampler {
    /// Create a sampler rendering at the given output sample rate.
    pub fn new(dest_sample_rate: u32) -> Self {
        Sampler {
            buffer: Arc::new(Vec::new()),
            start: 0,
            end: 0,
            loop_mode: LoopMode::None,
            loop_start: 0,
            loop_end: 0,
            root_key: 0,
            dest_sample_rate,
            current_index: 0.0,
            looping: false,
            tune: 0.0,
            pitch_change_scale: 0.0,
            sample_rate_ratio: 0.0,
        }
    }

    /// Begin playback of a sample region.
    ///
    /// `start`/`end` and the loop points index into `buffer`; `sample_rate`
    /// is the rate the sample was acquired at; `root_key` is the MIDI key of
    /// the recorded pitch. `coarse_tune` is in semitones, `fine_tune` in
    /// cents, and `scale_tuning` in cents of pitch change per key.
    #[allow(clippy::too_many_arguments)]
    pub fn start(
        &mut self,
        buffer: Arc<Vec<f32>>,
        start: u32,
        end: u32,
        loop_mode: LoopMode,
        loop_start: u32,
        loop_end: u32,
        sample_rate: u32,
        root_key: u8,
        coarse_tune: i16,
        fine_tune: i16,
        scale_tuning: u16,
    ) {
        self.buffer = buffer;
        self.start = start;
        self.end = end;
        self.loop_mode = loop_mode;
        self.loop_start = loop_start;
        self.loop_end = loop_end;
        self.root_key = root_key;

        self.tune = coarse_tune as f32 + 0.01 * fine_tune as f32;
        self.pitch_change_scale = 0.01 * scale_tuning as f32;
        self.sample_rate_ratio = sample_rate as f32 / self.dest_sample_rate as f32;

        self.looping = loop_mode != LoopMode::None;
        self.current_index = start as f64;
    }

    /// Notify the sampler that the key was released.
    ///
    /// An `UntilRelease` region stops looping and runs past the loop end to
    /// the region end.
    pub fn release(&mut self) {
        if self.loop_mode == LoopMode::UntilRelease {
            self.looping = false;
        }
    }

    /// Fill `dest[..size]` with resampled audio at the given pitch (in MIDI
    /// key units, fractional).
    ///
    /// Returns false when non-looping playback ended before producing any
    /// sample; past-the-end positions inside the block are zero-filled.
    pub fn process(&mut self, dest: &mut [f32], size: usize, pitch: f32) -> bool {
        let pitch_change = self.pitch_change_scale * (pitch - self.root_key as f32) + self.tune;
        let pitch_ratio = (self.sample_rate_ratio * (pitch_change / 12.0).exp2()) as f64;

        let loop_length = self.loop_end - self.loop_start;
        let buffer = self.buffer.as_slice();

        for i in 0..size {
            let index = self.current_index.floor() as u32;
            let mut index2 = index + 1;

            if !self.looping {
                if index >= self.end {
                    if i == 0 {
                        return false;
                    }

                    for value in dest[i..size].iter_mut() {
                        *value = 0.0;
                    }

                    return true;
                }
            } else if index2 >= self.loop_end {
                index2 -= loop_length;
            }

            let x1 = buffer[index as usize];
            let x2 = buffer[index2 as usize];
            let a = (self.current_index - index as f64) as f32;
            dest[i] = x1 + a * (x2 - x1);

            self.current_index += pitch_ratio;

            if self.looping && self.current_index >= self.loop_end as f64 {
                self.current_index -= loop_length as f64;
            }
        }

        true
    }
}
