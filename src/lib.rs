//! SoundFont 2 MIDI Synthesizer
//!
//! A real-time polyphonic synthesizer driven by SoundFont 2.x sample banks.
//! Given a loaded bank and a stream of MIDI-like events (note-on, note-off,
//! control changes, program changes, pitch bend), it renders 32-bit float PCM
//! audio into caller-provided mono or stereo buffers.
//!
//! # Features
//! - Per-voice DSP pipeline: pitch-shifting sample playback, dual six-stage
//!   envelopes, vibrato/modulation LFOs, resonant low-pass filter
//! - Polyphonic voice pool with exclusive-class handling and priority-based
//!   eviction under overflow
//! - 16 MIDI channels with high-resolution controllers, RPN tuning and
//!   pitch-bend range, sustain, expression
//! - SoundFont 2.x parser (16-bit and 24-bit sample data, generator and
//!   modulator merging per the 2.01 specification)
//! - Block-based rendering with sub-block resumption, so arbitrary render
//!   sizes concatenate exactly
//!
//! # Quick start
//! ```no_run
//! use sfsynth::{Synthesizer, SynthesizerSettings};
//!
//! # fn main() -> sfsynth::Result<()> {
//! let settings = SynthesizerSettings::new(44_100)?;
//! let mut synth = Synthesizer::new(&settings);
//! synth.load_sound_font("bank.sf2")?;
//!
//! let mut left = vec![0.0f32; 44_100];
//! let mut right = vec![0.0f32; 44_100];
//!
//! synth.note_on(0, 60, 100); // middle C
//! synth.render_stereo(&mut left[..22_050], &mut right[..22_050]);
//! synth.note_off(0, 60);
//! synth.render_stereo(&mut left[22_050..], &mut right[22_050..]);
//! # Ok(())
//! # }
//! ```
//!
//! The engine is single-threaded and synchronous: all control and render
//! calls run on the caller's thread, and nothing is allocated on the render
//! path. Interleave control calls and `render` calls; events take effect on
//! the next internal block boundary.

#![warn(missing_docs)]

pub mod channel;
pub mod export;
pub mod settings;
pub mod soundfont;
pub mod synth;

/// Error types for synthesizer operations
#[derive(thiserror::Error, Debug)]
pub enum SynthError {
    /// Error while parsing a SoundFont file
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Error writing an audio file
    #[error("Audio file write error: {0}")]
    AudioFileError(String),

    /// IO error from the filesystem
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for SynthError {
    /// Converts a String into `SynthError::Other`.
    fn from(msg: String) -> Self {
        SynthError::Other(msg)
    }
}

impl From<&str> for SynthError {
    /// Converts a string slice into `SynthError::Other`.
    fn from(msg: &str) -> Self {
        SynthError::Other(msg.to_string())
    }
}

/// Result type for synthesizer operations
pub type Result<T> = std::result::Result<T, SynthError>;

// Public API exports
pub use channel::Channel;
pub use settings::SynthesizerSettings;
pub use soundfont::{PresetId, SoundFont};
pub use synth::Synthesizer;
