//! Voice pool
//!
//! Fixed-capacity collection of pre-allocated voices. The first
//! `nb_active` entries are the live voices; `process()` maintains that
//! partition in place by swapping retired voices out of the prefix.
//!
//! Allocation reuses a same-channel voice with a matching exclusive class,
//! takes a free slot if one exists, and otherwise evicts the voice with the
//! lowest priority (ties broken towards the oldest voice).

use crate::channel::Channel;
use crate::settings::SynthesizerSettings;

use super::voice::Voice;

/// The voices of a synthesizer.
#[derive(Debug)]
pub struct VoicePool {
    voices: Vec<Voice>,
    nb_active: usize,
}

impl VoicePool {
    /// Create a pool of `maximum_polyphony` idle voices.
    pub fn new(settings: &SynthesizerSettings) -> Self {
        VoicePool {
            voices: (0..settings.maximum_polyphony())
                .map(|_| Voice::new(settings))
                .collect(),
            nb_active: 0,
        }
    }

    /// Obtain a voice for a new note. The caller starts it, which resets
    /// whatever it was playing before.
    pub fn request(&mut self, channel: u8, exclusive_class: u16) -> &mut Voice {
        let index = self.find_slot(channel, exclusive_class);
        &mut self.voices[index]
    }

    fn find_slot(&mut self, channel: u8, exclusive_class: u16) -> usize {
        // An exclusive class plays one voice at a time per channel: reuse
        // the active voice with the same class
        if exclusive_class != 0 {
            for i in 0..self.nb_active {
                let voice = &self.voices[i];
                if voice.exclusive_class() == exclusive_class && voice.channel() == channel {
                    return i;
                }
            }
        }

        // A free slot, if any
        if self.nb_active < self.voices.len() {
            let index = self.nb_active;
            self.nb_active += 1;
            return index;
        }

        // Saturated: evict the voice with the lowest priority, preferring
        // the oldest among equals
        let mut candidate = 0;
        let mut lowest_priority = f32::MAX;

        for (i, voice) in self.voices.iter().enumerate() {
            let priority = voice.priority();

            if priority < lowest_priority {
                lowest_priority = priority;
                candidate = i;
            } else if priority == lowest_priority
                && voice.voice_length() > self.voices[candidate].voice_length()
            {
                candidate = i;
            }
        }

        candidate
    }

    /// Run one block of synthesis on every active voice, retiring the ones
    /// that report themselves inaudible.
    pub fn process(&mut self, channels: &[Channel], settings: &SynthesizerSettings) {
        let mut i = 0;

        while i != self.nb_active {
            let channel = &channels[self.voices[i].channel() as usize];

            if self.voices[i].process(channel, settings) {
                i += 1;
            } else {
                self.nb_active -= 1;
                self.voices.swap(i, self.nb_active);
            }
        }
    }

    /// Retire every voice immediately.
    pub fn clear(&mut self) {
        self.nb_active = 0;
    }

    /// The number of currently active voices.
    #[inline]
    pub fn nb_active_voices(&self) -> usize {
        self.nb_active
    }

    /// The active voices.
    #[inline]
    pub fn active_voices(&self) -> &[Voice] {
        &self.voices[..self.nb_active]
    }

    /// The active voices, mutably (for note-off and controller sweeps).
    #[inline]
    pub fn active_voices_mut(&mut self) -> &mut [Voice] {
        &mut self.voices[..self.nb_active]
    }
}
