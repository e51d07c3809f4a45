//! Volume and modulation envelopes
//!
//! Both envelopes share the six-stage SoundFont shape
//! Delay-Attack-Hold-Decay-Sustain-Release, advanced one block at a time.
//! The volume envelope decays exponentially and also publishes a priority
//! scalar that the voice pool uses to rank voices for eviction; the
//! modulation envelope decays linearly and feeds pitch and filter-cutoff
//! modulation.

/// Threshold below which an envelope no longer produces audible output.
pub const NON_AUDIBLE: f32 = 0.001;

const LOG_NON_AUDIBLE: f32 = -6.907_755; // ln(NON_AUDIBLE)

// Slope constant of the exponential decay/release segments; the curve
// reaches the -80 dB floor after `decay` seconds.
const DECAY_SLOPE_FACTOR: f32 = -9.226;

/// Exponential with a hard cutoff to zero below the non-audible floor.
#[inline]
fn exp_cutoff(x: f32) -> f32 {
    if x < LOG_NON_AUDIBLE {
        return 0.0;
    }
    x.exp()
}

/// The stages of an envelope, in the order they are traversed.
///
/// Sustain is not a stage of its own: the decay value is clamped to the
/// sustain level, so a decayed envelope holds there until released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Stage {
    Delay,
    Attack,
    Hold,
    Decay,
    Release,
}

/// Amplitude envelope of one voice track.
///
/// `process()` must be called once per block; the returned flag reports
/// whether the envelope still lets the track be heard.
#[derive(Debug, Clone)]
pub struct VolumeEnvelope {
    sample_rate: u32,

    attack_slope: f32,
    decay_slope: f32,
    release_slope: f32,

    attack_start_time: f32,
    hold_start_time: f32,
    decay_start_time: f32,
    release_start_time: f32,

    sustain_level: f32,
    release_level: f32,

    nb_processed_samples: u32,
    stage: Stage,

    value: f32,
    priority: f32,
}

impl VolumeEnvelope {
    /// Create an envelope clocked at the given sample rate.
    pub fn new(sample_rate: u32) -> Self {
        VolumeEnvelope {
            sample_rate,
            attack_slope: 0.0,
            decay_slope: 0.0,
            release_slope: 0.0,
            attack_start_time: 0.0,
            hold_start_time: 0.0,
            decay_start_time: 0.0,
            release_start_time: 0.0,
            sustain_level: 0.0,
            release_level: 0.0,
            nb_processed_samples: 0,
            stage: Stage::Delay,
            value: 0.0,
            priority: 0.0,
        }
    }

    /// Start a new envelope. All times are in seconds, sustain is a level in
    /// [0, 1]. Must be called when the key is pressed, before `process()`.
    pub fn start(&mut self, delay: f32, attack: f32, hold: f32, decay: f32, sustain: f32, release: f32) {
        self.attack_slope = 1.0 / attack;
        self.decay_slope = DECAY_SLOPE_FACTOR / decay;
        self.release_slope = DECAY_SLOPE_FACTOR / release;

        self.attack_start_time = delay;
        self.hold_start_time = self.attack_start_time + attack;
        self.decay_start_time = self.hold_start_time + hold;
        self.release_start_time = 0.0;

        self.sustain_level = sustain.clamp(0.0, 1.0);
        self.release_level = 0.0;

        self.nb_processed_samples = 0;
        self.stage = Stage::Delay;
        self.value = 0.0;

        self.process(0);
    }

    /// Switch to the release stage, starting from the current level.
    pub fn release(&mut self) {
        self.stage = Stage::Release;
        self.release_start_time = self.nb_processed_samples as f32 / self.sample_rate as f32;
        self.release_level = self.value;
    }

    /// Advance the envelope by `nb_samples` and recompute its value.
    ///
    /// Returns true while the envelope still allows the signal to be heard.
    pub fn process(&mut self, nb_samples: u32) -> bool {
        self.nb_processed_samples += nb_samples;

        let current_time = self.nb_processed_samples as f32 / self.sample_rate as f32;

        // Change stage if necessary
        while self.stage <= Stage::Hold {
            let end = match self.stage {
                Stage::Delay => self.attack_start_time,
                Stage::Attack => self.hold_start_time,
                Stage::Hold => self.decay_start_time,
                _ => return false,
            };

            if current_time < end {
                break;
            }

            self.stage = match self.stage {
                Stage::Delay => Stage::Attack,
                Stage::Attack => Stage::Hold,
                _ => Stage::Decay,
            };
        }

        // Compute the envelope value at the current stage
        match self.stage {
            Stage::Delay => {
                self.value = 0.0;
                self.priority = 3.0;
                true
            }
            Stage::Attack => {
                self.value = self.attack_slope * (current_time - self.attack_start_time);
                self.priority = 3.0 - self.value;
                true
            }
            Stage::Hold => {
                self.value = 1.0;
                self.priority = 2.0;
                true
            }
            Stage::Decay => {
                self.value = exp_cutoff(self.decay_slope * (current_time - self.decay_start_time))
                    .max(self.sustain_level);
                self.priority = 1.0 + self.value;
                self.value > NON_AUDIBLE
            }
            Stage::Release => {
                self.value = self.release_level
                    * exp_cutoff(self.release_slope * (current_time - self.release_start_time));
                self.priority = self.value;
                self.value > NON_AUDIBLE
            }
        }
    }

    /// The current gain, 0 to 1.
    #[inline]
    pub fn value(&self) -> f32 {
        self.value
    }

    /// The current scheduling priority (lower is more disposable).
    #[inline]
    pub fn priority(&self) -> f32 {
        self.priority
    }
}

/// Modulation envelope of one voice track.
///
/// Same stage structure as [`VolumeEnvelope`] but with linear decay and
/// release segments. Produces a normalized scalar used for pitch and cutoff
/// modulation; there is no priority readout.
#[derive(Debug, Clone)]
pub struct ModulationEnvelope {
    sample_rate: u32,

    attack_slope: f32,
    decay_slope: f32,
    release_slope: f32,

    attack_start_time: f32,
    hold_start_time: f32,
    decay_start_time: f32,

    decay_end_time: f32,
    release_end_time: f32,

    sustain_level: f32,
    release_level: f32,

    nb_processed_samples: u32,
    stage: Stage,

    value: f32,
}

impl ModulationEnvelope {
    /// Create an envelope clocked at the given sample rate.
    pub fn new(sample_rate: u32) -> Self {
        ModulationEnvelope {
            sample_rate,
            attack_slope: 0.0,
            decay_slope: 0.0,
            release_slope: 0.0,
            attack_start_time: 0.0,
            hold_start_time: 0.0,
            decay_start_time: 0.0,
            decay_end_time: 0.0,
            release_end_time: 0.0,
            sustain_level: 0.0,
            release_level: 0.0,
            nb_processed_samples: 0,
            stage: Stage::Delay,
            value: 0.0,
        }
    }

    /// Start a new envelope; parameters as for [`VolumeEnvelope::start`].
    pub fn start(&mut self, delay: f32, attack: f32, hold: f32, decay: f32, sustain: f32, release: f32) {
        self.attack_slope = 1.0 / attack;
        self.decay_slope = 1.0 / decay;
        self.release_slope = 1.0 / release;

        self.attack_start_time = delay;
        self.hold_start_time = self.attack_start_time + attack;
        self.decay_start_time = self.hold_start_time + hold;

        self.decay_end_time = self.decay_start_time + decay;
        self.release_end_time = release;

        self.sustain_level = sustain.clamp(0.0, 1.0);
        self.release_level = 0.0;

        self.nb_processed_samples = 0;
        self.stage = Stage::Delay;
        self.value = 0.0;

        self.process(0);
    }

    /// Switch to the release stage, starting from the current level.
    pub fn release(&mut self) {
        self.stage = Stage::Release;
        self.release_end_time += self.nb_processed_samples as f32 / self.sample_rate as f32;
        self.release_level = self.value;
    }

    /// Advance the envelope by `nb_samples` and recompute its value.
    ///
    /// Returns true while the envelope output is above the non-audible floor.
    pub fn process(&mut self, nb_samples: u32) -> bool {
        self.nb_processed_samples += nb_samples;

        let current_time = self.nb_processed_samples as f32 / self.sample_rate as f32;

        // Change stage if necessary
        while self.stage <= Stage::Hold {
            let end = match self.stage {
                Stage::Delay => self.attack_start_time,
                Stage::Attack => self.hold_start_time,
                Stage::Hold => self.decay_start_time,
                _ => return false,
            };

            if current_time < end {
                break;
            }

            self.stage = match self.stage {
                Stage::Delay => Stage::Attack,
                Stage::Attack => Stage::Hold,
                _ => Stage::Decay,
            };
        }

        // Compute the envelope value at the current stage
        match self.stage {
            Stage::Delay => {
                self.value = 0.0;
                true
            }
            Stage::Attack => {
                self.value = self.attack_slope * (current_time - self.attack_start_time);
                true
            }
            Stage::Hold => {
                self.value = 1.0;
                true
            }
            Stage::Decay => {
                self.value = (self.decay_slope * (self.decay_end_time - current_time))
                    .max(self.sustain_level);
                self.value > NON_AUDIBLE
            }
            Stage::Release => {
                self.value = (self.release_level
                    * self.release_slope
                    * (self.release_end_time - current_time))
                    .max(0.0);
                self.value > NON_AUDIBLE
            }
        }
    }

    /// The current envelope value, 0 to 1.
    #[inline]
    pub fn value(&self) -> f32 {
        self.value
    }
}
