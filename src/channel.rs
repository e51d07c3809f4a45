//! MIDI channel controller state
//!
//! A synthesizer owns 16 channels. Each one is assigned to a "bank:preset"
//! pair in the SoundFont bank and carries the controller values that
//! modulate synthesis: modulation wheel, volume, pan, expression, sustain,
//! pitch bend, effect sends, and the RPN-addressed tuning parameters.
//!
//! The high-resolution controllers are 14-bit values assembled from paired
//! coarse/fine MIDI messages; the coarse setter replaces the top 7 bits and
//! the fine setter the bottom 7.

/// State of a single MIDI channel.
#[derive(Debug, Clone)]
pub struct Channel {
    // General parameters
    percussion: bool,
    bank: u8,
    preset: u8,
    pitch_bend: f32,

    // High resolution continuous controllers (14 bits)
    modulation: u16,
    volume: u16,
    pan: u16,
    expression: u16,

    // Switches
    sustain: bool,

    // Low resolution continuous controllers (7 bits)
    reverb_send: u8,
    chorus_send: u8,

    // Registered parameters; rpn is -1 while no parameter is selected
    rpn: i16,
    pitch_bend_range: u16,
    coarse_tune: i8,
    fine_tune: u16,
}

impl Channel {
    /// Create a channel.
    ///
    /// Percussion channels offset every bank selection by 128, targeting the
    /// SoundFont percussion banks.
    pub fn new(percussion: bool) -> Self {
        let mut channel = Channel {
            percussion,
            bank: 0,
            preset: 0,
            pitch_bend: 0.0,
            modulation: 0,
            volume: 0,
            pan: 0,
            expression: 0,
            sustain: false,
            reverb_send: 0,
            chorus_send: 0,
            rpn: -1,
            pitch_bend_range: 0,
            coarse_tune: 0,
            fine_tune: 0,
        };
        channel.reset();
        channel
    }

    /// Reset the channel to its power-on defaults.
    pub fn reset(&mut self) {
        self.bank = if self.percussion { 128 } else { 0 };
        self.preset = 0;

        self.modulation = 0;
        self.volume = 100 << 7;
        self.pan = 64 << 7;
        self.expression = 127 << 7;
        self.sustain = false;

        self.reverb_send = 40;
        self.chorus_send = 0;

        self.rpn = -1;
        self.pitch_bend_range = 2 << 7;
        self.coarse_tune = 0;
        self.fine_tune = 8192;

        self.pitch_bend = 0.0;
    }

    /// Reset the continuous controllers, keeping bank, preset, volume, pan
    /// and the tuning parameters.
    pub fn reset_controllers(&mut self) {
        self.modulation = 0;
        self.expression = 127 << 7;
        self.sustain = false;

        self.rpn = -1;

        self.pitch_bend = 0.0;
    }

    /// Set the bank number (percussion channels are offset by 128).
    #[inline]
    pub fn set_bank(&mut self, value: u8) {
        self.bank = value.wrapping_add(if self.percussion { 128 } else { 0 });
    }

    /// Set the preset number.
    #[inline]
    pub fn set_preset(&mut self, value: u8) {
        self.preset = value;
    }

    /// Set the pitch bend from its two MIDI data bytes.
    #[inline]
    pub fn set_pitch_bend(&mut self, value1: u8, value2: u8) {
        let raw = (value1 as u16) | ((value2 as u16) << 7);
        self.pitch_bend = (1.0 / 8192.0) * (raw as i32 - 8192) as f32;
    }

    /// Set the coarse modulation value.
    #[inline]
    pub fn set_modulation_coarse(&mut self, value: u8) {
        self.modulation = ((value as u16) << 7) | (self.modulation & 0x7F);
    }

    /// Set the fine modulation value.
    #[inline]
    pub fn set_modulation_fine(&mut self, value: u8) {
        self.modulation = (self.modulation & 0xFF80) | value as u16;
    }

    /// Set the coarse volume value.
    #[inline]
    pub fn set_volume_coarse(&mut self, value: u8) {
        self.volume = ((value as u16) << 7) | (self.volume & 0x7F);
    }

    /// Set the fine volume value.
    #[inline]
    pub fn set_volume_fine(&mut self, value: u8) {
        self.volume = (self.volume & 0xFF80) | value as u16;
    }

    /// Set the coarse pan value.
    #[inline]
    pub fn set_pan_coarse(&mut self, value: u8) {
        self.pan = ((value as u16) << 7) | (self.pan & 0x7F);
    }

    /// Set the fine pan value.
    #[inline]
    pub fn set_pan_fine(&mut self, value: u8) {
        self.pan = (self.pan & 0xFF80) | value as u16;
    }

    /// Set the coarse expression value.
    #[inline]
    pub fn set_expression_coarse(&mut self, value: u8) {
        self.expression = ((value as u16) << 7) | (self.expression & 0x7F);
    }

    /// Set the fine expression value.
    #[inline]
    pub fn set_expression_fine(&mut self, value: u8) {
        self.expression = (self.expression & 0xFF80) | value as u16;
    }

    /// Set the sustain switch (on for values >= 64).
    #[inline]
    pub fn set_sustain(&mut self, value: u8) {
        self.sustain = value >= 64;
    }

    /// Set the reverb send level.
    #[inline]
    pub fn set_reverb_send(&mut self, value: u8) {
        self.reverb_send = value;
    }

    /// Set the chorus send level.
    #[inline]
    pub fn set_chorus_send(&mut self, value: u8) {
        self.chorus_send = value;
    }

    /// Select the coarse part of the registered parameter number.
    #[inline]
    pub fn set_rpn_coarse(&mut self, value: u8) {
        self.rpn = ((value as i16) << 7) | (self.rpn & 0x7F);
    }

    /// Select the fine part of the registered parameter number.
    #[inline]
    pub fn set_rpn_fine(&mut self, value: u8) {
        self.rpn = (self.rpn & !0x7F) | value as i16;
    }

    /// Write the coarse data entry to the currently selected RPN.
    ///
    /// RPN 0 addresses the pitch-bend range, RPN 1 the fine tuning, RPN 2 the
    /// coarse tuning (as a signed offset around 64 semitones). Other RPNs are
    /// ignored.
    pub fn set_data_entry_coarse(&mut self, value: u8) {
        match self.rpn {
            0 => {
                self.pitch_bend_range = ((value as u16) << 7) | (self.pitch_bend_range & 0x7F);
            }
            1 => {
                self.fine_tune = ((value as u16) << 7) | (self.fine_tune & 0x7F);
            }
            2 => {
                self.coarse_tune = (value as i16 - 64) as i8;
            }
            _ => {}
        }
    }

    /// Write the fine data entry to the currently selected RPN.
    pub fn set_data_entry_fine(&mut self, value: u8) {
        match self.rpn {
            0 => {
                self.pitch_bend_range = (self.pitch_bend_range & 0xFF80) | value as u16;
            }
            1 => {
                self.fine_tune = (self.fine_tune & 0xFF80) | value as u16;
            }
            _ => {}
        }
    }

    /// Whether this is a percussion channel.
    #[inline]
    pub fn percussion(&self) -> bool {
        self.percussion
    }

    /// The bank number of the channel.
    #[inline]
    pub fn bank(&self) -> u8 {
        self.bank
    }

    /// The preset number of the channel.
    #[inline]
    pub fn preset(&self) -> u8 {
        self.preset
    }

    /// The modulation depth, in cents of pitch deviation (0 - 50).
    #[inline]
    pub fn modulation(&self) -> f32 {
        (50.0 / 16383.0) * self.modulation as f32
    }

    /// The channel volume, in decibels.
    #[inline]
    pub fn volume(&self) -> f32 {
        40.0 * (self.volume as f32 / 16383.0).log10()
    }

    /// The pan position, -50 (hard left) to +50 (hard right).
    #[inline]
    pub fn pan(&self) -> f32 {
        (100.0 / 16383.0) * self.pan as f32 - 50.0
    }

    /// The expression level, 0 to 1.
    #[inline]
    pub fn expression(&self) -> f32 {
        (1.0 / 16383.0) * self.expression as f32
    }

    /// Whether the sustain pedal is held.
    #[inline]
    pub fn sustain(&self) -> bool {
        self.sustain
    }

    /// The reverb send level, 0 to 1.
    #[inline]
    pub fn reverb_send(&self) -> f32 {
        (1.0 / 127.0) * self.reverb_send as f32
    }

    /// The chorus send level, 0 to 1.
    #[inline]
    pub fn chorus_send(&self) -> f32 {
        (1.0 / 127.0) * self.chorus_send as f32
    }

    /// The pitch bend range, in semitones (coarse part) plus cents (fine).
    #[inline]
    pub fn pitch_bend_range(&self) -> f32 {
        (self.pitch_bend_range >> 7) as f32 + 0.01 * (self.pitch_bend_range & 0x7F) as f32
    }

    /// The current pitch bend, in semitones.
    #[inline]
    pub fn pitch_bend(&self) -> f32 {
        self.pitch_bend_range() * self.pitch_bend
    }

    /// The channel tuning adjustment, in semitones.
    #[inline]
    pub fn tune(&self) -> f32 {
        self.coarse_tune as f32 + (1.0 / 8192.0) * (self.fine_tune as i32 - 8192) as f32
    }
}

impl Default for Channel {
    fn default() -> Self {
        Channel::new(false)
    }
}
