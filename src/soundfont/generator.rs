//! SoundFont generators
//!
//! A generator is a numeric parameter of a zone (attack time, cutoff, pan,
//! ...). Values are 16-bit amounts whose interpretation depends on the
//! generator type: signed, unsigned, or a (lo, hi) byte range. Units are the
//! SoundFont domain units: timecents, centibels, cents, absolute integers.

use std::collections::BTreeMap;
use std::sync::OnceLock;

/// The different types of generators, numbered as in the SoundFont 2.01
/// specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[allow(missing_docs)]
pub enum GeneratorType {
    StartAddressOffset = 0,
    EndAddressOffset = 1,
    StartLoopAddressOffset = 2,
    EndLoopAddressOffset = 3,
    StartAddressCoarseOffset = 4,
    ModulationLfoToPitch = 5,
    VibratoLfoToPitch = 6,
    ModulationEnvelopeToPitch = 7,
    InitialFilterCutoffFrequency = 8,
    InitialFilterQ = 9,
    ModulationLfoToFilterCutoffFrequency = 10,
    ModulationEnvelopeToFilterCutoffFrequency = 11,
    EndAddressCoarseOffset = 12,
    ModulationLfoToVolume = 13,
    Unused1 = 14,
    ChorusEffectsSend = 15,
    ReverbEffectsSend = 16,
    Pan = 17,
    Unused2 = 18,
    Unused3 = 19,
    Unused4 = 20,
    DelayModulationLfo = 21,
    FrequencyModulationLfo = 22,
    DelayVibratoLfo = 23,
    FrequencyVibratoLfo = 24,
    DelayModulationEnvelope = 25,
    AttackModulationEnvelope = 26,
    HoldModulationEnvelope = 27,
    DecayModulationEnvelope = 28,
    SustainModulationEnvelope = 29,
    ReleaseModulationEnvelope = 30,
    KeyNumberToModulationEnvelopeHold = 31,
    KeyNumberToModulationEnvelopeDecay = 32,
    DelayVolumeEnvelope = 33,
    AttackVolumeEnvelope = 34,
    HoldVolumeEnvelope = 35,
    DecayVolumeEnvelope = 36,
    SustainVolumeEnvelope = 37,
    ReleaseVolumeEnvelope = 38,
    KeyNumberToVolumeEnvelopeHold = 39,
    KeyNumberToVolumeEnvelopeDecay = 40,
    Instrument = 41,
    Reserved1 = 42,
    KeyRange = 43,
    VelocityRange = 44,
    StartLoopAddressCoarseOffset = 45,
    KeyNumber = 46,
    Velocity = 47,
    InitialAttenuation = 48,
    Reserved2 = 49,
    EndLoopAddressCoarseOffset = 50,
    CoarseTune = 51,
    FineTune = 52,
    SampleId = 53,
    SampleModes = 54,
    Reserved3 = 55,
    ScaleTuning = 56,
    ExclusiveClass = 57,
    OverridingRootKey = 58,
    Unused5 = 59,
    UnusedEnd = 60,
}

impl GeneratorType {
    /// Create from a raw file value; unknown values are rejected.
    pub fn from_value(value: u16) -> Option<Self> {
        use GeneratorType::*;
        Some(match value {
            0 => StartAddressOffset,
            1 => EndAddressOffset,
            2 => StartLoopAddressOffset,
            3 => EndLoopAddressOffset,
            4 => StartAddressCoarseOffset,
            5 => ModulationLfoToPitch,
            6 => VibratoLfoToPitch,
            7 => ModulationEnvelopeToPitch,
            8 => InitialFilterCutoffFrequency,
            9 => InitialFilterQ,
            10 => ModulationLfoToFilterCutoffFrequency,
            11 => ModulationEnvelopeToFilterCutoffFrequency,
            12 => EndAddressCoarseOffset,
            13 => ModulationLfoToVolume,
            14 => Unused1,
            15 => ChorusEffectsSend,
            16 => ReverbEffectsSend,
            17 => Pan,
            18 => Unused2,
            19 => Unused3,
            20 => Unused4,
            21 => DelayModulationLfo,
            22 => FrequencyModulationLfo,
            23 => DelayVibratoLfo,
            24 => FrequencyVibratoLfo,
            25 => DelayModulationEnvelope,
            26 => AttackModulationEnvelope,
            27 => HoldModulationEnvelope,
            28 => DecayModulationEnvelope,
            29 => SustainModulationEnvelope,
            30 => ReleaseModulationEnvelope,
            31 => KeyNumberToModulationEnvelopeHold,
            32 => KeyNumberToModulationEnvelopeDecay,
            33 => DelayVolumeEnvelope,
            34 => AttackVolumeEnvelope,
            35 => HoldVolumeEnvelope,
            36 => DecayVolumeEnvelope,
            37 => SustainVolumeEnvelope,
            38 => ReleaseVolumeEnvelope,
            39 => KeyNumberToVolumeEnvelopeHold,
            40 => KeyNumberToVolumeEnvelopeDecay,
            41 => Instrument,
            42 => Reserved1,
            43 => KeyRange,
            44 => VelocityRange,
            45 => StartLoopAddressCoarseOffset,
            46 => KeyNumber,
            47 => Velocity,
            48 => InitialAttenuation,
            49 => Reserved2,
            50 => EndLoopAddressCoarseOffset,
            51 => CoarseTune,
            52 => FineTune,
            53 => SampleId,
            54 => SampleModes,
            55 => Reserved3,
            56 => ScaleTuning,
            57 => ExclusiveClass,
            58 => OverridingRootKey,
            59 => Unused5,
            60 => UnusedEnd,
            _ => return None,
        })
    }

    /// Whether preset-zone values of this generator are added onto the
    /// instrument-zone values when building the merged map of a key.
    ///
    /// Everything else is instrument-level only and preset values for it are
    /// ignored.
    pub fn preset_additive(self) -> bool {
        use GeneratorType::*;
        matches!(
            self,
            InitialFilterCutoffFrequency
                | InitialFilterQ
                | ChorusEffectsSend
                | ReverbEffectsSend
                | SustainModulationEnvelope
                | SustainVolumeEnvelope
                | InitialAttenuation
                | ScaleTuning
                | ModulationLfoToPitch
                | VibratoLfoToPitch
                | ModulationEnvelopeToPitch
                | ModulationLfoToFilterCutoffFrequency
                | ModulationEnvelopeToFilterCutoffFrequency
                | ModulationLfoToVolume
                | Pan
                | DelayModulationLfo
                | FrequencyModulationLfo
                | DelayVibratoLfo
                | FrequencyVibratoLfo
                | DelayModulationEnvelope
                | AttackModulationEnvelope
                | HoldModulationEnvelope
                | DecayModulationEnvelope
                | ReleaseModulationEnvelope
                | KeyNumberToModulationEnvelopeHold
                | KeyNumberToModulationEnvelopeDecay
                | DelayVolumeEnvelope
                | AttackVolumeEnvelope
                | HoldVolumeEnvelope
                | DecayVolumeEnvelope
                | ReleaseVolumeEnvelope
                | KeyNumberToVolumeEnvelopeHold
                | KeyNumberToVolumeEnvelopeDecay
                | CoarseTune
                | FineTune
        )
    }

    /// How the 16-bit amount of this generator is interpreted.
    fn amount_class(self) -> AmountClass {
        use GeneratorType::*;
        match self {
            KeyRange | VelocityRange => AmountClass::Range,
            InitialFilterCutoffFrequency | InitialFilterQ | ChorusEffectsSend
            | ReverbEffectsSend | SustainModulationEnvelope | SustainVolumeEnvelope
            | InitialAttenuation | SampleModes | ScaleTuning | ExclusiveClass | Instrument
            | SampleId => AmountClass::Unsigned,
            _ => AmountClass::Signed,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum AmountClass {
    Signed,
    Unsigned,
    Range,
}

/// The value carried by a generator: a signed or unsigned 16-bit quantity,
/// or a (lo, hi) range.
///
/// Accessors reinterpret the underlying 16 bits when asked for a different
/// view, so reading a nominally unsigned generator as signed is well defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorAmount {
    /// A signed integer value
    Signed(i16),
    /// An unsigned integer value
    Unsigned(u16),
    /// A range of values (lower bound, upper bound)
    Range(u8, u8),
}

impl GeneratorAmount {
    /// Build the amount for `generator_type` from the raw 16 bits stored in
    /// the file.
    pub fn classify(generator_type: GeneratorType, raw: u16) -> Self {
        match generator_type.amount_class() {
            AmountClass::Signed => GeneratorAmount::Signed(raw as i16),
            AmountClass::Unsigned => GeneratorAmount::Unsigned(raw),
            AmountClass::Range => GeneratorAmount::Range((raw & 0xFF) as u8, (raw >> 8) as u8),
        }
    }

    /// The raw 16 bits of the amount.
    #[inline]
    pub fn raw(&self) -> u16 {
        match *self {
            GeneratorAmount::Signed(value) => value as u16,
            GeneratorAmount::Unsigned(value) => value,
            GeneratorAmount::Range(lo, hi) => (lo as u16) | ((hi as u16) << 8),
        }
    }

    /// The amount as a signed integer.
    #[inline]
    pub fn signed(&self) -> i16 {
        self.raw() as i16
    }

    /// The amount as an unsigned integer.
    #[inline]
    pub fn unsigned(&self) -> u16 {
        self.raw()
    }

    /// The amount as a (lo, hi) range.
    #[inline]
    pub fn range(&self) -> (u8, u8) {
        match *self {
            GeneratorAmount::Range(lo, hi) => (lo, hi),
            other => {
                let raw = other.raw();
                ((raw & 0xFF) as u8, (raw >> 8) as u8)
            }
        }
    }

    /// Sum of two amounts of the same generator, with two's-complement
    /// wrapping like the merge arithmetic of the reference banks.
    pub fn added_to(&self, generator_type: GeneratorType, other: &GeneratorAmount) -> Self {
        GeneratorAmount::classify(generator_type, self.raw().wrapping_add(other.raw()))
    }
}

/// The generators of a zone, keyed by type.
pub type GeneratorMap = BTreeMap<GeneratorType, GeneratorAmount>;

/// The default instrument generators every SoundFont zone starts from.
///
/// Envelope and LFO delays default to -12000 timecents (about one
/// millisecond), the filter is open at 13500 cents, scale tuning is 100
/// cents per key, and the root key override is unset.
pub fn default_instrument_generators() -> &'static GeneratorMap {
    static DEFAULTS: OnceLock<GeneratorMap> = OnceLock::new();
    DEFAULTS.get_or_init(|| {
        use GeneratorType::*;
        let mut map = GeneratorMap::new();
        map.insert(InitialFilterCutoffFrequency, GeneratorAmount::Unsigned(13500));
        map.insert(DelayModulationLfo, GeneratorAmount::Signed(-12000));
        map.insert(DelayVibratoLfo, GeneratorAmount::Signed(-12000));
        map.insert(DelayModulationEnvelope, GeneratorAmount::Signed(-12000));
        map.insert(AttackModulationEnvelope, GeneratorAmount::Signed(-12000));
        map.insert(HoldModulationEnvelope, GeneratorAmount::Signed(-12000));
        map.insert(DecayModulationEnvelope, GeneratorAmount::Signed(-12000));
        map.insert(ReleaseModulationEnvelope, GeneratorAmount::Signed(-12000));
        map.insert(DelayVolumeEnvelope, GeneratorAmount::Signed(-12000));
        map.insert(AttackVolumeEnvelope, GeneratorAmount::Signed(-12000));
        map.insert(HoldVolumeEnvelope, GeneratorAmount::Signed(-12000));
        map.insert(DecayVolumeEnvelope, GeneratorAmount::Signed(-12000));
        map.insert(ReleaseVolumeEnvelope, GeneratorAmount::Signed(-12000));
        map.insert(KeyRange, GeneratorAmount::Range(0, 127));
        map.insert(VelocityRange, GeneratorAmount::Range(0, 127));
        map.insert(KeyNumber, GeneratorAmount::Signed(-1));
        map.insert(Velocity, GeneratorAmount::Signed(-1));
        map.insert(ScaleTuning, GeneratorAmount::Unsigned(100));
        map.insert(OverridingRootKey, GeneratorAmount::Signed(-1));
        map
    })
}
