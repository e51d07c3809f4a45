//! Synthesis engine
//!
//! The [`Synthesizer`] owns the 16 MIDI channels and the voice pool, maps
//! MIDI events to voice allocations, and assembles rendered audio out of
//! fixed-size blocks. Each block drives every active voice once through its
//! DSP pipeline and accumulates the result into a stereo (or mono) mix
//! buffer with a per-voice gain ramp; caller-sized renders are carved out of
//! those blocks, with a partially consumed block carried over between calls.

pub mod envelope;
pub mod filter;
pub mod lfo;
pub mod sampler;
pub mod voice;
pub mod voice_pool;

mod units;

use std::collections::BTreeMap;
use std::path::Path;

use crate::channel::Channel;
use crate::settings::SynthesizerSettings;
use crate::soundfont::generator::GeneratorType;
use crate::soundfont::{PresetId, SoundFont};
use crate::Result;

use envelope::NON_AUDIBLE;
use units::{decibels_to_linear, linear_to_decibels};
use voice_pool::VoicePool;

const CHANNEL_COUNT: usize = 16;
const PERCUSSION_CHANNEL: usize = 9;

/// A MIDI synthesizer driven by a SoundFont bank.
///
/// A bank must be loaded before any synthesis can happen; without one the
/// synthesizer stays usable but silent. The synthesizer is controlled either
/// via raw MIDI messages ([`Synthesizer::process_midi_message`]) or by
/// calling the dedicated methods directly.
#[derive(Debug)]
pub struct Synthesizer {
    soundfont: SoundFont,
    settings: SynthesizerSettings,

    default_preset: Option<PresetId>,

    channels: Vec<Channel>,
    voices: VoicePool,

    block_left: Vec<f32>,
    block_right: Vec<f32>,
    blocks_offset: usize,
    inverse_block_size: f32,

    nb_rendered_samples: u32,
    master_volume: f32,
}

impl Synthesizer {
    /// Create a synthesizer with the given settings.
    pub fn new(settings: &SynthesizerSettings) -> Self {
        let channels = (0..CHANNEL_COUNT)
            .map(|i| Channel::new(i == PERCUSSION_CHANNEL))
            .collect();

        Synthesizer {
            soundfont: SoundFont::default(),
            settings: settings.clone(),
            default_preset: None,
            channels,
            voices: VoicePool::new(settings),
            block_left: vec![0.0; settings.block_size()],
            block_right: vec![0.0; settings.block_size()],
            blocks_offset: settings.block_size(),
            inverse_block_size: 1.0 / settings.block_size() as f32,
            nb_rendered_samples: 0,
            master_volume: 1.0,
        }
    }

    /// Load a SoundFont file.
    ///
    /// On success the first preset in iteration order becomes the fallback
    /// of last resort for note-on.
    pub fn load_sound_font<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.install_sound_font(SoundFont::load(path)?);
        Ok(())
    }

    /// Load a SoundFont file already present in memory.
    pub fn load_sound_font_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.install_sound_font(SoundFont::from_bytes(data)?);
        Ok(())
    }

    fn install_sound_font(&mut self, soundfont: SoundFont) {
        self.default_preset = soundfont.first_preset_id();
        self.soundfont = soundfont;
    }

    /// The loaded SoundFont bank.
    #[inline]
    pub fn sound_font(&self) -> &SoundFont {
        &self.soundfont
    }

    /// Process a MIDI message.
    ///
    /// Returns false when the channel does not exist; unknown commands and
    /// controllers are ignored.
    pub fn process_midi_message(
        &mut self,
        channel: u8,
        command: u8,
        data1: u8,
        data2: u8,
    ) -> bool {
        if channel as usize >= self.channels.len() {
            log::debug!("MIDI message on unknown channel {}", channel);
            return false;
        }

        match command {
            // Note Off
            0x80 => self.note_off(channel, data1),

            // Note On
            0x90 => self.note_on(channel, data1, data2),

            // Controller
            0xB0 => match data1 {
                // All Sound Off
                0x78 => self.all_notes_off_channel(channel, true),

                // Reset All Controllers
                0x79 => self.reset_controllers(channel),

                // All Notes Off
                0x7B => self.all_notes_off_channel(channel, false),

                _ => {
                    let channel_info = &mut self.channels[channel as usize];
                    match data1 {
                        // Bank Selection
                        0x00 => channel_info.set_bank(data2),

                        // Modulation Coarse & Fine
                        0x01 => channel_info.set_modulation_coarse(data2),
                        0x21 => channel_info.set_modulation_fine(data2),

                        // Data Entry Coarse & Fine
                        0x06 => channel_info.set_data_entry_coarse(data2),
                        0x26 => channel_info.set_data_entry_fine(data2),

                        // Channel Volume Coarse & Fine
                        0x07 => channel_info.set_volume_coarse(data2),
                        0x27 => channel_info.set_volume_fine(data2),

                        // Pan Coarse & Fine
                        0x0A => channel_info.set_pan_coarse(data2),
                        0x2A => channel_info.set_pan_fine(data2),

                        // Expression Coarse & Fine
                        0x0B => channel_info.set_expression_coarse(data2),
                        0x2B => channel_info.set_expression_fine(data2),

                        // Sustain
                        0x40 => channel_info.set_sustain(data2),

                        // Reverb Send
                        0x5B => channel_info.set_reverb_send(data2),

                        // Chorus Send
                        0x5D => channel_info.set_chorus_send(data2),

                        // RPN Coarse & Fine
                        0x65 => channel_info.set_rpn_coarse(data2),
                        0x64 => channel_info.set_rpn_fine(data2),

                        _ => {}
                    }
                }
            },

            // Program Change
            0xC0 => self.channels[channel as usize].set_preset(data1),

            // Pitch Bend
            0xE0 => self.channels[channel as usize].set_pitch_bend(data1, data2),

            _ => {}
        }

        true
    }

    /// Start playing a key. The key sounds until [`Synthesizer::note_off`].
    ///
    /// A velocity of zero is a note-off. When the channel's preset has no
    /// match for the key, the lookup falls back to the GM sound set (bank 0,
    /// or preset 128:0 for percussion), then to the bank's first preset; if
    /// nothing matches, the note is dropped.
    pub fn note_on(&mut self, channel: u8, key: u8, velocity: u8) {
        if velocity == 0 {
            self.note_off(channel, key);
            return;
        }

        if channel as usize >= self.channels.len() {
            return;
        }

        let channel_info = &self.channels[channel as usize];

        let mut bank = channel_info.bank() as u16;
        let mut number = channel_info.preset() as u16;

        let mut key_info = self.soundfont.get_key_info(bank, number, key, velocity);

        if key_info.is_none() {
            // Fall back to the GM sound set. The given preset number in bank
            // 0 will normally work; for drums (bank >= 128) the standard set
            // 128:0 is the better choice.
            if bank < 128 {
                bank = 0;
            } else {
                bank = 128;
                number = 0;
            }

            key_info = self.soundfont.get_key_info(bank, number, key, velocity);

            if key_info.is_none() {
                // No corresponding preset was found. Use the default one.
                key_info = self.default_preset.and_then(|id| {
                    self.soundfont.get_key_info(id.bank, id.number, key, velocity)
                });

                if key_info.is_some() {
                    log::debug!(
                        "No preset for channel {} key {}; using the default preset",
                        channel,
                        key
                    );
                }
            }
        }

        let key_info = match key_info {
            Some(key_info) => key_info,
            None => return,
        };

        let exclusive_class = key_info
            .left
            .generator_unsigned(GeneratorType::ExclusiveClass, 0);

        let voice = self.voices.request(channel, exclusive_class);
        voice.start(
            &key_info,
            self.soundfont.buffer(),
            self.soundfont.samples(),
            channel,
            key,
            velocity,
        );
    }

    /// Release a key. Its sound gradually falls off.
    pub fn note_off(&mut self, channel: u8, key: u8) {
        if channel as usize >= self.channels.len() {
            return;
        }

        for voice in self.voices.active_voices_mut() {
            if voice.channel() == channel && voice.key() == key {
                voice.end();
            }
        }
    }

    /// Release every key on every channel.
    ///
    /// When `immediate` is true the voices stop on the next block; otherwise
    /// their sound falls off as with [`Synthesizer::note_off`].
    pub fn all_notes_off(&mut self, immediate: bool) {
        if immediate {
            self.voices.clear();
        } else {
            for voice in self.voices.active_voices_mut() {
                voice.end();
            }
        }
    }

    /// Release every key of one channel.
    pub fn all_notes_off_channel(&mut self, channel: u8, immediate: bool) {
        for voice in self.voices.active_voices_mut() {
            if voice.channel() == channel {
                if immediate {
                    voice.kill();
                } else {
                    voice.end();
                }
            }
        }
    }

    /// Reset the controllers of every channel.
    pub fn reset_all_controllers(&mut self) {
        for channel in &mut self.channels {
            channel.reset_controllers();
        }
    }

    /// Reset the controllers of one channel.
    pub fn reset_controllers(&mut self, channel: u8) {
        if let Some(channel_info) = self.channels.get_mut(channel as usize) {
            channel_info.reset_controllers();
        }
    }

    /// Reset the synthesizer: all voices off, every channel back to its
    /// defaults, rendering state cleared.
    pub fn reset(&mut self) {
        self.voices.clear();

        for channel in &mut self.channels {
            channel.reset();
        }

        self.blocks_offset = self.settings.block_size();
        self.nb_rendered_samples = 0;
    }

    /// Render stereo audio into the two buffers.
    ///
    /// The buffers must have the same length. Rendering is concatenative:
    /// two consecutive calls produce exactly the same audio as one call over
    /// the combined length.
    pub fn render_stereo(&mut self, left: &mut [f32], right: &mut [f32]) {
        debug_assert_eq!(left.len(), right.len());
        let size = left.len().min(right.len());
        let block_size = self.settings.block_size();

        let mut nb_written = 0;

        while nb_written < size {
            if self.blocks_offset == block_size {
                self.render_block_stereo();
                self.blocks_offset = 0;
            }

            let src_remainder = block_size - self.blocks_offset;
            let dst_remainder = size - nb_written;
            let remainder = src_remainder.min(dst_remainder);

            left[nb_written..nb_written + remainder]
                .copy_from_slice(&self.block_left[self.blocks_offset..self.blocks_offset + remainder]);
            right[nb_written..nb_written + remainder].copy_from_slice(
                &self.block_right[self.blocks_offset..self.blocks_offset + remainder],
            );

            self.blocks_offset += remainder;
            nb_written += remainder;
        }

        self.nb_rendered_samples += nb_written as u32;
    }

    /// Render mono audio into the buffer.
    ///
    /// Stereo voices contribute the sum of their two channels.
    pub fn render_mono(&mut self, buffer: &mut [f32]) {
        let size = buffer.len();
        let block_size = self.settings.block_size();

        let mut nb_written = 0;

        while nb_written < size {
            if self.blocks_offset == block_size {
                self.render_block_mono();
                self.blocks_offset = 0;
            }

            let src_remainder = block_size - self.blocks_offset;
            let dst_remainder = size - nb_written;
            let remainder = src_remainder.min(dst_remainder);

            buffer[nb_written..nb_written + remainder]
                .copy_from_slice(&self.block_left[self.blocks_offset..self.blocks_offset + remainder]);

            self.blocks_offset += remainder;
            nb_written += remainder;
        }

        self.nb_rendered_samples += nb_written as u32;
    }

    /// Set the master volume, in decibels (0 dB = unit gain).
    pub fn set_master_volume(&mut self, volume: f32) {
        self.master_volume = decibels_to_linear(volume);
    }

    /// The master volume, in decibels.
    pub fn master_volume(&self) -> f32 {
        linear_to_decibels(self.master_volume)
    }

    /// The number of samples rendered so far.
    #[inline]
    pub fn nb_rendered_samples(&self) -> u32 {
        self.nb_rendered_samples
    }

    /// The number of active voices.
    pub fn nb_active_voices(&self) -> usize {
        self.voices.nb_active_voices()
    }

    /// The number of MIDI channels.
    #[inline]
    pub fn nb_channels(&self) -> usize {
        self.channels.len()
    }

    /// Assign a preset of the bank to a channel.
    ///
    /// Returns false when the channel or the preset does not exist.
    pub fn configure_channel(&mut self, channel: u8, bank: u8, preset: u8) -> bool {
        if channel as usize >= self.channels.len() {
            return false;
        }

        if self.soundfont.preset(bank as u16, preset as u16).is_none() {
            log::debug!("Preset {}:{} not found in the bank", bank, preset);
            return false;
        }

        let channel_info = &mut self.channels[channel as usize];
        channel_info.set_bank(bank);
        channel_info.set_preset(preset);

        true
    }

    /// Assign a preset of the bank to a channel, by preset identifier.
    pub fn configure_channel_preset(&mut self, channel: u8, id: PresetId) -> bool {
        self.configure_channel(channel, id.bank as u8, id.number as u8)
    }

    /// The names of all presets in the bank, keyed by identifier.
    pub fn preset_names(&self) -> BTreeMap<PresetId, String> {
        self.soundfont.preset_names()
    }

    /// A channel of the synthesizer.
    pub fn channel(&self, channel: u8) -> &Channel {
        &self.channels[channel as usize]
    }

    /// A channel of the synthesizer, mutably.
    pub fn channel_mut(&mut self, channel: u8) -> &mut Channel {
        &mut self.channels[channel as usize]
    }

    /// The settings of the synthesizer.
    #[inline]
    pub fn settings(&self) -> &SynthesizerSettings {
        &self.settings
    }

    fn render_block_stereo(&mut self) {
        self.voices.process(&self.channels, &self.settings);

        self.block_left.fill(0.0);
        self.block_right.fill(0.0);

        for voice in self.voices.active_voices() {
            let previous_gain = self.master_volume * voice.previous_mix_gain_left();
            let current_gain = self.master_volume * voice.current_mix_gain_left();
            write_block(
                previous_gain,
                current_gain,
                voice.block_left(),
                &mut self.block_left,
                self.inverse_block_size,
            );

            let previous_gain = self.master_volume * voice.previous_mix_gain_right();
            let current_gain = self.master_volume * voice.current_mix_gain_right();
            write_block(
                previous_gain,
                current_gain,
                if voice.stereo() {
                    voice.block_right()
                } else {
                    voice.block_left()
                },
                &mut self.block_right,
                self.inverse_block_size,
            );
        }
    }

    fn render_block_mono(&mut self) {
        self.voices.process(&self.channels, &self.settings);

        self.block_left.fill(0.0);

        for voice in self.voices.active_voices() {
            if voice.stereo() {
                let previous_gain = self.master_volume * voice.previous_mix_gain_left();
                let current_gain = self.master_volume * voice.current_mix_gain_left();
                write_block(
                    previous_gain,
                    current_gain,
                    voice.block_left(),
                    &mut self.block_left,
                    self.inverse_block_size,
                );

                let previous_gain = self.master_volume * voice.previous_mix_gain_right();
                let current_gain = self.master_volume * voice.current_mix_gain_right();
                write_block(
                    previous_gain,
                    current_gain,
                    voice.block_right(),
                    &mut self.block_left,
                    self.inverse_block_size,
                );
            } else {
                let previous_gain = self.master_volume * voice.previous_mix_gain_left();
                let current_gain = self.master_volume * voice.current_mix_gain_left();
                write_block(
                    previous_gain,
                    current_gain,
                    voice.block_left(),
                    &mut self.block_left,
                    self.inverse_block_size,
                );
            }
        }
    }
}

/// Accumulate one voice block into the mix buffer, ramping linearly from the
/// previous gain to the current one (or applying a constant gain when the
/// two are close).
fn write_block(
    previous_gain: f32,
    current_gain: f32,
    source: &[f32],
    destination: &mut [f32],
    inverse_block_size: f32,
) {
    if previous_gain.max(current_gain) < NON_AUDIBLE {
        return;
    }

    if (current_gain - previous_gain).abs() < 1.0e-3 {
        for (out, value) in destination.iter_mut().zip(source) {
            *out += current_gain * value;
        }
    } else {
        let step = inverse_block_size * (current_gain - previous_gain);
        let mut gain = previous_gain;

        for (out, value) in destination.iter_mut().zip(source) {
            *out += gain * value;
            gain += step;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soundfont::test_bank::{constant_sample, TestBank};

    const SAMPLE_LEVEL: f32 = 16_383.0 / 32_767.0;

    fn mono_synth() -> Synthesizer {
        let settings = SynthesizerSettings::new(22_050).unwrap();
        let mut synth = Synthesizer::new(&settings);
        synth
            .load_sound_font_bytes(
                &TestBank::mono()
                    .looped()
                    .sample_words(constant_sample(256))
                    .build(),
            )
            .unwrap();
        synth
    }

    fn stereo_synth() -> Synthesizer {
        let settings = SynthesizerSettings::new(22_050).unwrap();
        let mut synth = Synthesizer::new(&settings);
        synth
            .load_sound_font_bytes(
                &TestBank::stereo()
                    .looped()
                    .sample_words(constant_sample(256))
                    .build(),
            )
            .unwrap();
        synth
    }

    /// Expected steady-state gain of one track at the given velocity with
    /// the default controllers (volume 100, expression 127, envelope fully
    /// open).
    fn steady_track_gain(velocity: u8) -> f32 {
        let note_gain = decibels_to_linear(-linear_to_decibels(127.0 / velocity as f32));
        let volume = decibels_to_linear(40.0 * (12_800.0f32 / 16_383.0).log10());
        let expression = 16_256.0 / 16_383.0;
        note_gain * volume * expression
    }

    /// The equal-power pan weights of a mono voice on a centered channel.
    fn center_pan_weights() -> (f32, f32) {
        let pan = (100.0 / 16_383.0) * 8_192.0 - 50.0;
        let angle = (std::f32::consts::FRAC_PI_2 / 50.0) * pan;
        let factor = 1.0 + (std::f32::consts::SQRT_2 - 1.0) * angle.cos();
        ((50.0 - pan) / 100.0 * factor, (50.0 + pan) / 100.0 * factor)
    }

    #[test]
    fn test_mono_bank_stereo_render_levels() {
        let mut synth = mono_synth();
        synth.note_on(0, 69, 127);

        let mut left = vec![0.0f32; 2048];
        let mut right = vec![0.0f32; 2048];
        synth.render_stereo(&mut left, &mut right);

        let gain = steady_track_gain(127);
        let (weight_left, weight_right) = center_pan_weights();
        let expected_left = SAMPLE_LEVEL * gain * weight_left;
        let expected_right = SAMPLE_LEVEL * gain * weight_right;

        // Past the attack the output is the steady product of sample level,
        // note gain, channel gain and pan weight
        for i in 1024..2048 {
            assert!(
                (left[i] - expected_left).abs() < 1e-4,
                "left[{}] = {} != {}",
                i,
                left[i],
                expected_left
            );
            assert!(
                (right[i] - expected_right).abs() < 1e-4,
                "right[{}] = {} != {}",
                i,
                right[i],
                expected_right
            );
        }
    }

    #[test]
    fn test_stereo_bank_mono_render_is_left_plus_right() {
        let mut synth = stereo_synth();
        synth.note_on(0, 69, 100);

        let mut left = vec![0.0f32; 1024];
        let mut right = vec![0.0f32; 1024];
        synth.render_stereo(&mut left, &mut right);

        let mut synth = stereo_synth();
        synth.note_on(0, 69, 100);

        let mut mono = vec![0.0f32; 1024];
        synth.render_mono(&mut mono);

        for i in 0..1024 {
            assert!(
                (mono[i] - (left[i] + right[i])).abs() < 1e-5,
                "mono[{}] = {} != {} + {}",
                i,
                mono[i],
                left[i],
                right[i]
            );
        }
    }

    #[test]
    fn test_stereo_bank_levels_ignore_pan_edge() {
        // The bank hard-pans its two samples, which lands on the +/-50 edge
        // of the pan law: both track gains pass through essentially unscaled
        let mut synth = stereo_synth();
        synth.note_on(0, 69, 100);

        let mut left = vec![0.0f32; 2048];
        let mut right = vec![0.0f32; 2048];
        synth.render_stereo(&mut left, &mut right);

        let expected = SAMPLE_LEVEL * steady_track_gain(100);
        for i in 1024..2048 {
            assert!((left[i] - expected).abs() < 1e-4, "left[{}] = {}", i, left[i]);
            assert!((right[i] - expected).abs() < 1e-4, "right[{}] = {}", i, right[i]);
        }
    }

    #[test]
    fn test_render_is_concatenative() {
        let mut synth = mono_synth();
        synth.note_on(0, 69, 100);

        let mut whole = vec![0.0f32; 777];
        synth.render_mono(&mut whole);

        let mut synth = mono_synth();
        synth.note_on(0, 69, 100);

        let mut pieces = vec![0.0f32; 777];
        // Deliberately odd split points, crossing block boundaries
        synth.render_mono(&mut pieces[..13]);
        synth.render_mono(&mut pieces[13..100]);
        synth.render_mono(&mut pieces[100..640]);
        synth.render_mono(&mut pieces[640..]);

        assert_eq!(whole, pieces);
    }

    #[test]
    fn test_note_off_fades_to_silence() {
        let mut synth = mono_synth();
        synth.note_on(0, 69, 100);

        let mut buffer = vec![0.0f32; 1024];
        synth.render_mono(&mut buffer);
        assert!(synth.nb_active_voices() == 1);

        synth.note_off(0, 69);
        let mut tail = vec![0.0f32; 22_050];
        synth.render_mono(&mut tail);

        assert_eq!(synth.nb_active_voices(), 0);
        assert_eq!(tail[22_049], 0.0);
    }

    #[test]
    fn test_note_on_velocity_zero_is_note_off() {
        let mut synth = mono_synth();
        synth.note_on(0, 69, 100);

        let mut buffer = vec![0.0f32; 1024];
        synth.render_mono(&mut buffer);

        synth.note_on(0, 69, 0);
        let mut tail = vec![0.0f32; 22_050];
        synth.render_mono(&mut tail);
        assert_eq!(synth.nb_active_voices(), 0);
    }

    #[test]
    fn test_all_notes_off_immediate_silences_next_block() {
        let mut synth = mono_synth();
        for key in [60, 64, 67] {
            synth.note_on(0, key, 100);
        }

        let mut buffer = vec![0.0f32; 1024];
        synth.render_mono(&mut buffer);
        assert_eq!(synth.nb_active_voices(), 3);

        synth.all_notes_off(true);
        assert_eq!(synth.nb_active_voices(), 0);

        let mut tail = vec![0.0f32; 1024];
        synth.render_mono(&mut tail);
        assert!(tail.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_master_volume_scales_output() {
        let mut synth = mono_synth();
        synth.note_on(0, 69, 100);
        let mut reference = vec![0.0f32; 2048];
        synth.render_mono(&mut reference);

        let mut synth = mono_synth();
        synth.set_master_volume(6.0);
        assert!((synth.master_volume() - 6.0).abs() < 1e-4);

        synth.note_on(0, 69, 100);
        let mut boosted = vec![0.0f32; 2048];
        synth.render_mono(&mut boosted);

        let factor = decibels_to_linear(6.0);
        for i in 1024..2048 {
            assert!(
                (boosted[i] - factor * reference[i]).abs() < 1e-4,
                "sample {}: {} != {} * {}",
                i,
                boosted[i],
                factor,
                reference[i]
            );
        }
    }

    #[test]
    fn test_midi_dispatch_note_on_off() {
        let mut synth = mono_synth();

        assert!(synth.process_midi_message(0, 0x90, 69, 100));
        let mut buffer = vec![0.0f32; 512];
        synth.render_mono(&mut buffer);
        assert_eq!(synth.nb_active_voices(), 1);

        // Note On with velocity 0 acts as Note Off
        assert!(synth.process_midi_message(0, 0x90, 69, 0));
        let mut tail = vec![0.0f32; 22_050];
        synth.render_mono(&mut tail);
        assert_eq!(synth.nb_active_voices(), 0);
    }

    #[test]
    fn test_midi_dispatch_unknown_channel() {
        let mut synth = mono_synth();
        assert!(!synth.process_midi_message(16, 0x90, 69, 100));
        assert!(synth.process_midi_message(15, 0x90, 69, 100));
    }

    #[test]
    fn test_midi_dispatch_controllers() {
        let mut synth = mono_synth();

        synth.process_midi_message(0, 0xB0, 0x07, 64);
        assert!((synth.channel(0).volume() - 40.0 * ((64 << 7) as f32 / 16_383.0).log10()).abs() < 1e-5);

        synth.process_midi_message(0, 0xB0, 0x40, 127);
        assert!(synth.channel(0).sustain());

        synth.process_midi_message(0, 0xE0, 0x00, 0x60);
        assert!(synth.channel(0).pitch_bend() > 0.0);

        synth.process_midi_message(0, 0xC0, 5, 0);
        assert_eq!(synth.channel(0).preset(), 5);

        // Reset All Controllers clears sustain and pitch bend
        synth.process_midi_message(0, 0xB0, 0x79, 0);
        assert!(!synth.channel(0).sustain());
        assert_eq!(synth.channel(0).pitch_bend(), 0.0);
    }

    #[test]
    fn test_preset_fallback_to_default() {
        let mut synth = mono_synth();

        // Preset 42 does not exist; the note falls back to the first preset
        synth.process_midi_message(0, 0xC0, 42, 0);
        synth.note_on(0, 69, 100);
        let mut buffer = vec![0.0f32; 512];
        synth.render_mono(&mut buffer);
        assert_eq!(synth.nb_active_voices(), 1);
        assert!(buffer[256..].iter().any(|&v| v != 0.0));
    }

    #[test]
    fn test_note_on_without_bank_is_dropped() {
        let settings = SynthesizerSettings::new(22_050).unwrap();
        let mut synth = Synthesizer::new(&settings);

        synth.note_on(0, 69, 100);
        assert_eq!(synth.nb_active_voices(), 0);

        let mut buffer = vec![0.0f32; 512];
        synth.render_mono(&mut buffer);
        assert!(buffer.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_configure_channel() {
        let mut synth = mono_synth();
        assert!(synth.configure_channel(0, 0, 0));
        assert!(!synth.configure_channel(0, 3, 7));
        assert!(!synth.configure_channel(16, 0, 0));
        assert!(synth.configure_channel_preset(0, PresetId { bank: 0, number: 0 }));
    }

    #[test]
    fn test_exclusive_class_cuts_previous_note() {
        let settings = SynthesizerSettings::new(22_050).unwrap();
        let mut synth = Synthesizer::new(&settings);
        synth
            .load_sound_font_bytes(
                &TestBank::mono()
                    .looped()
                    .sample_words(constant_sample(256))
                    .instrument_generator(GeneratorType::ExclusiveClass, 1)
                    .build(),
            )
            .unwrap();

        synth.note_on(0, 60, 100);
        synth.note_on(0, 62, 100);
        assert_eq!(synth.nb_active_voices(), 1);

        let mut buffer = vec![0.0f32; 512];
        synth.render_mono(&mut buffer);
        assert_eq!(synth.nb_active_voices(), 1);
    }

    #[test]
    fn test_polyphony_is_bounded_under_saturation() {
        let mut settings = SynthesizerSettings::new(22_050).unwrap();
        settings.set_maximum_polyphony(8).unwrap();

        let mut synth = Synthesizer::new(&settings);
        synth
            .load_sound_font_bytes(
                &TestBank::mono()
                    .looped()
                    .sample_words(constant_sample(256))
                    .build(),
            )
            .unwrap();

        let mut buffer = vec![0.0f32; 64];
        for key in 20..120 {
            synth.note_on(0, key, 100);
            synth.render_mono(&mut buffer);
            assert!(synth.nb_active_voices() <= 8);
        }
        assert_eq!(synth.nb_active_voices(), 8);
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let mut synth = mono_synth();
        synth.note_on(0, 69, 100);
        synth.process_midi_message(0, 0xB0, 0x07, 30);

        let mut buffer = vec![0.0f32; 700];
        synth.render_mono(&mut buffer);
        assert!(synth.nb_rendered_samples() == 700);

        synth.reset();
        assert_eq!(synth.nb_active_voices(), 0);
        assert_eq!(synth.nb_rendered_samples(), 0);
        assert!((synth.channel(0).volume() - 40.0 * (12_800.0f32 / 16_383.0).log10()).abs() < 1e-5);
    }

    #[test]
    fn test_rendered_sample_counter_accumulates() {
        let mut synth = mono_synth();
        let mut buffer = vec![0.0f32; 100];
        synth.render_mono(&mut buffer);
        synth.render_mono(&mut buffer);
        assert_eq!(synth.nb_rendered_samples(), 200);
    }

    #[test]
    fn test_percussion_channel_bank_offset() {
        let synth = mono_synth();
        assert_eq!(synth.channel(9).bank(), 128);
        assert_eq!(synth.channel(0).bank(), 0);
    }
}
