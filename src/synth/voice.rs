//! Polyphonic voice
//!
//! A voice binds one pressed key to its DSP pipeline: sample playback,
//! volume and modulation envelopes, vibrato and modulation LFOs, and the
//! low-pass filter, producing one audio block per `process()` call.
//!
//! Stereo keys run two structurally identical tracks (left and right); mono
//! keys run only the left track and are split to stereo by the pan stage.

use std::f32::consts::{FRAC_PI_2, SQRT_2};
use std::sync::Arc;

use crate::channel::Channel;
use crate::settings::SynthesizerSettings;
use crate::soundfont::generator::GeneratorType;
use crate::soundfont::{KeyInfo, Sample, SampleInfo};

use super::envelope::{ModulationEnvelope, VolumeEnvelope, NON_AUDIBLE};
use super::filter::BiquadFilter;
use super::lfo::Lfo;
use super::sampler::{LoopMode, Sampler};
use super::units::{
    cents_to_hertz, cents_to_multiplying_factor, decibels_to_linear,
    key_number_to_multiplying_factor, linear_to_decibels, timecents_to_seconds,
};

/// Lifecycle of a voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VoiceState {
    Playing,
    ReleaseRequested,
    Released,
}

/// One channel of a voice: the full DSP chain from sampler to mix gain.
#[derive(Debug, Clone)]
struct Track {
    volume_envelope: VolumeEnvelope,
    modulation_envelope: ModulationEnvelope,

    vibrato_lfo: Lfo,
    modulation_lfo: Lfo,

    sampler: Sampler,
    filter: BiquadFilter,

    note_gain: f32,

    cutoff: f32,
    resonance: f32,

    vib_lfo_to_pitch: f32,
    mod_lfo_to_pitch: f32,
    mod_env_to_pitch: f32,

    mod_lfo_to_cutoff: i32,
    mod_env_to_cutoff: i32,
    dynamic_cutoff: bool,

    mod_lfo_to_volume: f32,
    dynamic_volume: bool,

    instrument_pan: f32,
    instrument_reverb: f32,
    instrument_chorus: f32,

    // Some instruments require fast cutoff changes, which can cause pop
    // noise. This is used to smooth out the cutoff frequency.
    smoothed_cutoff: f32,

    block: Vec<f32>,

    previous_mix_gain: f32,
    current_mix_gain: f32,
}

impl Track {
    fn new(settings: &SynthesizerSettings) -> Self {
        Track {
            volume_envelope: VolumeEnvelope::new(settings.sample_rate()),
            modulation_envelope: ModulationEnvelope::new(settings.sample_rate()),
            vibrato_lfo: Lfo::new(settings.sample_rate(), settings.block_size()),
            modulation_lfo: Lfo::new(settings.sample_rate(), settings.block_size()),
            sampler: Sampler::new(settings.sample_rate()),
            filter: BiquadFilter::new(settings.sample_rate()),
            note_gain: 0.0,
            cutoff: 0.0,
            resonance: 0.0,
            vib_lfo_to_pitch: 0.0,
            mod_lfo_to_pitch: 0.0,
            mod_env_to_pitch: 0.0,
            mod_lfo_to_cutoff: 0,
            mod_env_to_cutoff: 0,
            dynamic_cutoff: false,
            mod_lfo_to_volume: 0.0,
            dynamic_volume: false,
            instrument_pan: 0.0,
            instrument_reverb: 0.0,
            instrument_chorus: 0.0,
            smoothed_cutoff: 0.0,
            block: vec![0.0; settings.block_size()],
            previous_mix_gain: 0.0,
            current_mix_gain: 0.0,
        }
    }
}

/// A voice of the polyphonic pool, responsible for playing one note.
#[derive(Debug, Clone)]
pub struct Voice {
    stereo: bool,
    left: Track,
    right: Track,

    previous_reverb_send: f32,
    previous_chorus_send: f32,
    current_reverb_send: f32,
    current_chorus_send: f32,

    exclusive_class: u16,
    channel: u8,
    key: u8,
    velocity: u8,

    state: VoiceState,
    voice_length: u32,
}

impl Voice {
    /// Create an idle voice with its per-track block buffers pre-allocated.
    pub fn new(settings: &SynthesizerSettings) -> Self {
        Voice {
            stereo: false,
            left: Track::new(settings),
            right: Track::new(settings),
            previous_reverb_send: 0.0,
            previous_chorus_send: 0.0,
            current_reverb_send: 0.0,
            current_chorus_send: 0.0,
            exclusive_class: 0,
            channel: 0,
            key: 0,
            velocity: 0,
            state: VoiceState::Playing,
            voice_length: 0,
        }
    }

    /// Bind the voice to a key and start its pipeline.
    ///
    /// `samples` and `buffer` come from the bank that produced `key_info`.
    pub fn start(
        &mut self,
        key_info: &KeyInfo,
        buffer: &Arc<Vec<f32>>,
        samples: &[Sample],
        channel: u8,
        key: u8,
        velocity: u8,
    ) {
        self.stereo = key_info.stereo;

        self.exclusive_class = key_info
            .left
            .generator_unsigned(GeneratorType::ExclusiveClass, 0);
        self.channel = channel;
        self.key = key;
        self.velocity = velocity;

        Self::start_track(
            &mut self.left,
            &key_info.left,
            buffer,
            samples,
            key,
            velocity,
        );

        if let Some(right_info) = &key_info.right {
            Self::start_track(&mut self.right, right_info, buffer, samples, key, velocity);
        }

        self.state = VoiceState::Playing;
        self.voice_length = 0;
    }

    /// Request a graceful release of the key.
    pub fn end(&mut self) {
        if self.state == VoiceState::Playing {
            self.state = VoiceState::ReleaseRequested;
        }
    }

    /// Silence the voice; it retires on its next `process()` call.
    pub fn kill(&mut self) {
        self.left.note_gain = 0.0;
        self.right.note_gain = 0.0;
    }

    /// Run one block of synthesis.
    ///
    /// Returns false once the voice is no longer audible and can be retired.
    pub fn process(&mut self, channel_info: &Channel, settings: &SynthesizerSettings) -> bool {
        if self.left.note_gain < NON_AUDIBLE
            && (!self.stereo || self.right.note_gain < NON_AUDIBLE)
        {
            return false;
        }

        // Honor the release only after a short grace window (~2 ms), so very
        // short notes still produce their transient, and never while the
        // sustain pedal is held
        if self.voice_length >= settings.sample_rate() / 500
            && self.state == VoiceState::ReleaseRequested
            && !channel_info.sustain()
        {
            self.left.volume_envelope.release();
            self.left.modulation_envelope.release();
            self.left.sampler.release();

            if self.stereo {
                self.right.volume_envelope.release();
                self.right.modulation_envelope.release();
                self.right.sampler.release();
            }

            self.state = VoiceState::Released;
        }

        self.left.previous_mix_gain = self.left.current_mix_gain;
        self.right.previous_mix_gain = self.right.current_mix_gain;

        let mut success =
            Self::process_track(&mut self.left, channel_info, settings, self.key);

        if self.stereo {
            success = Self::process_track(&mut self.right, channel_info, settings, self.key)
                || success;
        }

        if !success {
            return false;
        }

        if !self.stereo {
            let pan = channel_info.pan() + self.left.instrument_pan;
            if pan > -50.0 && pan < 50.0 {
                let angle = (FRAC_PI_2 / 50.0) * pan;
                let factor = 1.0 + (SQRT_2 - 1.0) * angle.cos();

                let gain = self.left.current_mix_gain;

                self.left.current_mix_gain = gain * (50.0 - pan) / 100.0 * factor;
                self.right.current_mix_gain = gain * (50.0 + pan) / 100.0 * factor;
            }
        } else {
            let pan = channel_info.pan() + self.left.instrument_pan;
            if pan > -50.0 && pan < 50.0 {
                let angle = (FRAC_PI_2 / 50.0) * pan;
                let factor = 1.0 + (SQRT_2 - 1.0) * angle.cos();

                self.left.current_mix_gain *= (50.0 - pan) / 100.0 * factor;
            }

            let pan = channel_info.pan() + self.right.instrument_pan;
            if pan > -50.0 && pan < 50.0 {
                let angle = (FRAC_PI_2 / 50.0) * pan;
                let factor = 1.0 + (SQRT_2 - 1.0) * angle.cos();

                self.right.current_mix_gain *= (50.0 - pan) / 100.0 * factor;
            }
        }

        self.previous_reverb_send = self.current_reverb_send;
        self.previous_chorus_send = self.current_chorus_send;

        if self.stereo {
            self.current_reverb_send = (channel_info.reverb_send()
                + (self.left.instrument_reverb + self.right.instrument_reverb) * 0.5)
                .clamp(0.0, 1.0);
            self.current_chorus_send = (channel_info.chorus_send()
                + (self.left.instrument_chorus + self.right.instrument_chorus) * 0.5)
                .clamp(0.0, 1.0);
        } else {
            self.current_reverb_send =
                (channel_info.reverb_send() + self.left.instrument_reverb).clamp(0.0, 1.0);
            self.current_chorus_send =
                (channel_info.chorus_send() + self.left.instrument_chorus).clamp(0.0, 1.0);
        }

        if self.voice_length == 0 {
            // No ramp-up from zero on the very first block
            self.left.previous_mix_gain = self.left.current_mix_gain;
            self.right.previous_mix_gain = self.right.current_mix_gain;
            self.previous_reverb_send = self.current_reverb_send;
            self.previous_chorus_send = self.current_chorus_send;
        }

        self.voice_length += settings.block_size() as u32;

        true
    }

    /// The eviction priority of the voice; lower is more disposable.
    pub fn priority(&self) -> f32 {
        if self.stereo {
            if self.left.note_gain < NON_AUDIBLE && self.right.note_gain < NON_AUDIBLE {
                return 0.0;
            }

            self.left
                .volume_envelope
                .priority()
                .max(self.right.volume_envelope.priority())
        } else {
            if self.left.note_gain < NON_AUDIBLE {
                return 0.0;
            }

            self.left.volume_envelope.priority()
        }
    }

    /// Whether the voice plays a stereo sample pair.
    #[inline]
    pub fn stereo(&self) -> bool {
        self.stereo
    }

    /// The left (or mono) output block of the last `process()` call.
    #[inline]
    pub fn block_left(&self) -> &[f32] {
        &self.left.block
    }

    /// The right output block of the last `process()` call.
    #[inline]
    pub fn block_right(&self) -> &[f32] {
        &self.right.block
    }

    /// Left mix gain of the previous block.
    #[inline]
    pub fn previous_mix_gain_left(&self) -> f32 {
        self.left.previous_mix_gain
    }

    /// Right mix gain of the previous block.
    #[inline]
    pub fn previous_mix_gain_right(&self) -> f32 {
        self.right.previous_mix_gain
    }

    /// Left mix gain of the current block.
    #[inline]
    pub fn current_mix_gain_left(&self) -> f32 {
        self.left.current_mix_gain
    }

    /// Right mix gain of the current block.
    #[inline]
    pub fn current_mix_gain_right(&self) -> f32 {
        self.right.current_mix_gain
    }

    /// Reverb send of the previous block.
    #[inline]
    pub fn previous_reverb_send(&self) -> f32 {
        self.previous_reverb_send
    }

    /// Chorus send of the previous block.
    #[inline]
    pub fn previous_chorus_send(&self) -> f32 {
        self.previous_chorus_send
    }

    /// Reverb send of the current block.
    #[inline]
    pub fn current_reverb_send(&self) -> f32 {
        self.current_reverb_send
    }

    /// Chorus send of the current block.
    #[inline]
    pub fn current_chorus_send(&self) -> f32 {
        self.current_chorus_send
    }

    /// The exclusive class of the voice (0 when none).
    #[inline]
    pub fn exclusive_class(&self) -> u16 {
        self.exclusive_class
    }

    /// The MIDI channel the voice plays on.
    #[inline]
    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// The key the voice plays.
    #[inline]
    pub fn key(&self) -> u8 {
        self.key
    }

    /// The velocity the key was pressed with.
    #[inline]
    pub fn velocity(&self) -> u8 {
        self.velocity
    }

    /// Samples rendered since the voice started.
    #[inline]
    pub fn voice_length(&self) -> u32 {
        self.voice_length
    }

    fn start_track(
        track: &mut Track,
        sample_info: &SampleInfo,
        buffer: &Arc<Vec<f32>>,
        samples: &[Sample],
        key: u8,
        velocity: u8,
    ) {
        use GeneratorType::*;

        let sample = &samples[sample_info.sample];

        if velocity > 0 {
            // The initial attenuation is reduced to 40% of its nominal
            // centibels, matching the reference rendering of common banks
            let sample_attenuation =
                0.1 * 0.1 * sample_info.generator_unsigned(InitialAttenuation, 0) as f32;

            let filter_attenuation =
                0.5 * 0.1 * sample_info.generator_unsigned(InitialFilterQ, 0) as f32;

            let decibels = -linear_to_decibels(127.0 / velocity as f32)
                - sample_attenuation
                - filter_attenuation;

            track.note_gain = decibels_to_linear(decibels);
        } else {
            track.note_gain = 0.0;
        }

        track.cutoff = cents_to_hertz(
            sample_info.generator_unsigned(InitialFilterCutoffFrequency, 13500) as f32,
        );
        track.resonance =
            decibels_to_linear(0.1 * sample_info.generator_unsigned(InitialFilterQ, 0) as f32);

        track.vib_lfo_to_pitch = 0.01 * sample_info.generator_signed(VibratoLfoToPitch, 0) as f32;
        track.mod_lfo_to_pitch =
            0.01 * sample_info.generator_signed(ModulationLfoToPitch, 0) as f32;
        track.mod_env_to_pitch =
            0.01 * sample_info.generator_signed(ModulationEnvelopeToPitch, 0) as f32;

        track.mod_lfo_to_cutoff =
            sample_info.generator_signed(ModulationLfoToFilterCutoffFrequency, 0) as i32;
        track.mod_env_to_cutoff =
            sample_info.generator_signed(ModulationEnvelopeToFilterCutoffFrequency, 0) as i32;
        track.dynamic_cutoff = track.mod_lfo_to_cutoff != 0 || track.mod_env_to_cutoff != 0;

        track.mod_lfo_to_volume =
            0.1 * sample_info.generator_signed(ModulationLfoToVolume, 0) as f32;
        track.dynamic_volume = track.mod_lfo_to_volume > 0.05;

        track.instrument_pan =
            (0.1 * sample_info.generator_signed(Pan, 0) as f32).clamp(-50.0, 50.0);
        track.instrument_reverb =
            0.01 * 0.1 * sample_info.generator_unsigned(ReverbEffectsSend, 0) as f32;
        track.instrument_chorus =
            0.01 * 0.1 * sample_info.generator_unsigned(ChorusEffectsSend, 0) as f32;

        {
            let delay =
                timecents_to_seconds(sample_info.generator_signed(DelayVolumeEnvelope, -12000) as f32);

            let attack = timecents_to_seconds(
                sample_info.generator_signed(AttackVolumeEnvelope, -12000) as f32,
            );

            let hold = timecents_to_seconds(
                sample_info.generator_signed(HoldVolumeEnvelope, -12000) as f32,
            ) * key_number_to_multiplying_factor(
                sample_info.generator_signed(KeyNumberToVolumeEnvelopeHold, 0),
                key,
            );

            let decay = timecents_to_seconds(
                sample_info.generator_signed(DecayVolumeEnvelope, -12000) as f32,
            ) * key_number_to_multiplying_factor(
                sample_info.generator_signed(KeyNumberToVolumeEnvelopeDecay, 0),
                key,
            );

            let sustain = decibels_to_linear(
                -0.1 * sample_info.generator_unsigned(SustainVolumeEnvelope, 0) as f32,
            );

            let release = timecents_to_seconds(
                sample_info.generator_signed(ReleaseVolumeEnvelope, -12000) as f32,
            )
            .max(0.01);

            track
                .volume_envelope
                .start(delay, attack, hold, decay, sustain, release);
        }

        {
            let delay = timecents_to_seconds(
                sample_info.generator_signed(DelayModulationEnvelope, -12000) as f32,
            );

            // The modulation envelope attack is velocity sensitive; the
            // volume envelope attack is not
            let attack = timecents_to_seconds(
                sample_info.generator_signed(AttackModulationEnvelope, -12000) as f32,
            ) * ((145.0 - velocity as f32) / 144.0);

            let hold = timecents_to_seconds(
                sample_info.generator_signed(HoldModulationEnvelope, -12000) as f32,
            ) * key_number_to_multiplying_factor(
                sample_info.generator_signed(KeyNumberToModulationEnvelopeHold, 0),
                key,
            );

            let decay = timecents_to_seconds(
                sample_info.generator_signed(DecayModulationEnvelope, -12000) as f32,
            ) * key_number_to_multiplying_factor(
                sample_info.generator_signed(KeyNumberToModulationEnvelopeDecay, 0),
                key,
            );

            let sustain =
                1.0 - sample_info.generator_unsigned(SustainModulationEnvelope, 0) as f32 / 100.0;

            let release = timecents_to_seconds(
                sample_info.generator_signed(ReleaseModulationEnvelope, -12000) as f32,
            );

            track
                .modulation_envelope
                .start(delay, attack, hold, decay, sustain, release);
        }

        track.vibrato_lfo.start(
            timecents_to_seconds(sample_info.generator_signed(DelayVibratoLfo, -12000) as f32),
            cents_to_hertz(sample_info.generator_signed(FrequencyVibratoLfo, 0) as f32),
        );

        track.modulation_lfo.start(
            timecents_to_seconds(sample_info.generator_signed(DelayModulationLfo, -12000) as f32),
            cents_to_hertz(sample_info.generator_signed(FrequencyModulationLfo, 0) as f32),
        );

        let overriding_root_key = sample_info.generator_signed(OverridingRootKey, -1);
        let mut loop_mode = LoopMode::from_value(sample_info.generator_unsigned(SampleModes, 0));
        if sample.loop_start >= sample.loop_end {
            // A zone can request looping on a sample without loop points
            loop_mode = LoopMode::None;
        }
        let coarse_tune = sample_info.generator_signed(CoarseTune, 0);
        let fine_tune = sample_info.generator_signed(FineTune, 0);
        let scale_tuning = sample_info.generator_unsigned(ScaleTuning, 100);

        let root_key = if overriding_root_key >= 0 {
            overriding_root_key as u8
        } else {
            sample.original_pitch
        };

        track.sampler.start(
            buffer.clone(),
            sample.start,
            sample.end,
            loop_mode,
            sample.loop_start,
            sample.loop_end,
            sample.sample_rate,
            root_key,
            coarse_tune,
            fine_tune + sample.pitch_correction as i16,
            scale_tuning,
        );

        track.filter.clear_buffer();
        track.filter.set_low_pass_filter(track.cutoff, track.resonance);

        track.smoothed_cutoff = track.cutoff;
    }

    fn process_track(
        track: &mut Track,
        channel_info: &Channel,
        settings: &SynthesizerSettings,
        key: u8,
    ) -> bool {
        let block_size = settings.block_size();

        if !track.volume_envelope.process(block_size as u32) {
            return false;
        }

        track.modulation_envelope.process(block_size as u32);
        track.vibrato_lfo.process();
        track.modulation_lfo.process();

        let vib_pitch_change = (0.01 * channel_info.modulation() + track.vib_lfo_to_pitch)
            * track.vibrato_lfo.value();
        let mod_pitch_change = track.mod_lfo_to_pitch * track.modulation_lfo.value()
            + track.mod_env_to_pitch * track.modulation_envelope.value();

        let channel_pitch_change = channel_info.tune() + channel_info.pitch_bend();
        let pitch = key as f32 + vib_pitch_change + mod_pitch_change + channel_pitch_change;

        if !track.sampler.process(&mut track.block, block_size, pitch) {
            return false;
        }

        if track.dynamic_cutoff {
            let cents = track.mod_lfo_to_cutoff as f32 * track.modulation_lfo.value()
                + track.mod_env_to_cutoff as f32 * track.modulation_envelope.value();

            let factor = cents_to_multiplying_factor(cents);
            let new_cutoff = factor * track.cutoff;

            // The cutoff change is limited within x0.5 and x2 to reduce pop
            // noise
            let lower_limit = 0.5 * track.smoothed_cutoff;
            let upper_limit = 2.0 * track.smoothed_cutoff;
            track.smoothed_cutoff = new_cutoff.clamp(lower_limit, upper_limit);

            track
                .filter
                .set_low_pass_filter(track.smoothed_cutoff, track.resonance);
        }

        track.filter.process(&mut track.block[..block_size]);

        let channel_gain =
            decibels_to_linear(channel_info.volume()) * channel_info.expression();

        let mut mix_gain = track.note_gain * channel_gain * track.volume_envelope.value();
        if track.dynamic_volume {
            let decibels = track.mod_lfo_to_volume * track.modulation_lfo.value();
            mix_gain *= decibels_to_linear(decibels);
        }

        track.current_mix_gain = mix_gain;

        true
    }
}
