//! Synthesizer configuration
//!
//! Settings are validated when set and assigned to a [`crate::Synthesizer`]
//! at construction; they cannot be changed on a live synthesizer.

use crate::{Result, SynthError};

const DEFAULT_BLOCK_SIZE: usize = 64;
const DEFAULT_MAXIMUM_POLYPHONY: usize = 64;
const DEFAULT_REVERB_AND_CHORUS_ENABLED: bool = true;

/// Holds the settings for a synthesizer.
///
/// A freshly created instance uses a block size of 64 frames, a maximum
/// polyphony of 64 voices, and reverb/chorus send tracking enabled.
#[derive(Debug, Clone)]
pub struct SynthesizerSettings {
    sample_rate: u32,
    block_size: usize,
    maximum_polyphony: usize,
    reverb_and_chorus_enabled: bool,
}

impl SynthesizerSettings {
    /// Create settings for the given output sample rate.
    ///
    /// Returns `ConfigError` if the sample rate is outside 16 000 - 192 000 Hz.
    pub fn new(sample_rate: u32) -> Result<Self> {
        let mut settings = SynthesizerSettings {
            sample_rate: 0,
            block_size: DEFAULT_BLOCK_SIZE,
            maximum_polyphony: DEFAULT_MAXIMUM_POLYPHONY,
            reverb_and_chorus_enabled: DEFAULT_REVERB_AND_CHORUS_ENABLED,
        };
        settings.set_sample_rate(sample_rate)?;
        Ok(settings)
    }

    /// Set the sample rate of the synthesized signal (16 000 - 192 000 Hz).
    pub fn set_sample_rate(&mut self, sample_rate: u32) -> Result<()> {
        if !(16_000..=192_000).contains(&sample_rate) {
            return Err(SynthError::ConfigError(format!(
                "The sample rate must be between 16000 and 192000, got {}",
                sample_rate
            )));
        }
        self.sample_rate = sample_rate;
        Ok(())
    }

    /// Set the block size used internally during synthesis (8 - 1024 frames).
    pub fn set_block_size(&mut self, block_size: usize) -> Result<()> {
        if !(8..=1024).contains(&block_size) {
            return Err(SynthError::ConfigError(format!(
                "The block size must be between 8 and 1024, got {}",
                block_size
            )));
        }
        self.block_size = block_size;
        Ok(())
    }

    /// Set the maximum number of notes playing at any single time (8 - 256).
    pub fn set_maximum_polyphony(&mut self, maximum_polyphony: usize) -> Result<()> {
        if !(8..=256).contains(&maximum_polyphony) {
            return Err(SynthError::ConfigError(format!(
                "The maximum polyphony must be between 8 and 256, got {}",
                maximum_polyphony
            )));
        }
        self.maximum_polyphony = maximum_polyphony;
        Ok(())
    }

    /// Enable or disable reverb and chorus send tracking.
    pub fn enable_reverb_and_chorus(&mut self, enable: bool) {
        self.reverb_and_chorus_enabled = enable;
    }

    /// The sample rate of the synthesized signal, in hertz.
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The block size used internally during synthesis, in frames.
    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// The maximum number of notes playing at any single time.
    #[inline]
    pub fn maximum_polyphony(&self) -> usize {
        self.maximum_polyphony
    }

    /// Whether reverb and chorus send levels are tracked.
    #[inline]
    pub fn reverb_and_chorus_enabled(&self) -> bool {
        self.reverb_and_chorus_enabled
    }
}
