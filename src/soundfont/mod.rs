//! SoundFont 2.x bank
//!
//! In-memory representation of a parsed SoundFont file: presets, instruments,
//! samples, and the global float sample buffer, plus the key-lookup query
//! used by the synthesizer. Presets reference instruments through zones;
//! instruments reference samples through zones; a zone carries the generators
//! and modulators that apply when a key inside its key/velocity ranges is
//! played.

pub mod generator;
pub mod modulator;
mod parser;

#[cfg(test)]
pub(crate) mod test_bank;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::Result;
use generator::{GeneratorAmount, GeneratorMap, GeneratorType};
use modulator::ModulatorMap;

/// Non-audio information about a SoundFont bank, from the INFO chunk.
#[derive(Debug, Clone, Default)]
pub struct BankInfo {
    /// Major part of the SoundFont specification version of the file
    pub major_version: u16,
    /// Minor part of the SoundFont specification version of the file
    pub minor_version: u16,
    /// Name of the bank
    pub name: String,
    /// Wavetable sound engine the file was optimized for
    pub target_engine: String,
    /// Wavetable sound data ROM referenced by ROM samples, if any
    pub rom_name: String,
    /// Major version of the sound data ROM
    pub rom_major_version: u16,
    /// Minor version of the sound data ROM
    pub rom_minor_version: u16,
    /// Creation date of the bank
    pub creation_date: String,
    /// Sound designers and engineers responsible for the bank
    pub engineers: String,
    /// Product the bank is intended for
    pub product: String,
    /// Copyright assertion
    pub copyright: String,
    /// Comments
    pub comments: String,
    /// Tool used to create and most recently modify the bank
    pub creation_tool: String,
}

/// The kind of a sample, including its role in a stereo pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleType {
    /// A mono sample
    Mono,
    /// The right channel of a stereo pair
    Right,
    /// The left channel of a stereo pair
    Left,
    /// A sample linked to others (unsupported grouping)
    Linked,
    /// A mono sample in ROM
    RomMono,
    /// The right channel of a ROM stereo pair
    RomRight,
    /// The left channel of a ROM stereo pair
    RomLeft,
    /// A linked ROM sample
    RomLinked,
}

impl SampleType {
    /// Decode the raw file value; unknown values read as mono.
    pub fn from_value(value: u16) -> Self {
        match value {
            0x0002 => SampleType::Right,
            0x0004 => SampleType::Left,
            0x0008 => SampleType::Linked,
            0x8001 => SampleType::RomMono,
            0x8002 => SampleType::RomRight,
            0x8004 => SampleType::RomLeft,
            0x8008 => SampleType::RomLinked,
            _ => SampleType::Mono,
        }
    }

    /// Whether this sample stands alone rather than being half of a pair.
    pub fn is_mono(self) -> bool {
        matches!(self, SampleType::Mono | SampleType::RomMono)
    }

    /// Whether this sample is the left half of a stereo pair.
    pub fn is_left(self) -> bool {
        matches!(self, SampleType::Left | SampleType::RomLeft)
    }
}

/// An audio sample: the instructions needed to play a region of the global
/// sample buffer.
#[derive(Debug, Clone)]
pub struct Sample {
    /// Name of the sample
    pub name: String,
    /// Start index of the sample in the buffer
    pub start: u32,
    /// End index of the sample in the buffer
    pub end: u32,
    /// Starting point of the loop
    pub loop_start: u32,
    /// Ending point of the loop
    pub loop_end: u32,
    /// Sample rate, in hertz, at which this sample was acquired
    pub sample_rate: u32,
    /// MIDI key number of the recorded pitch of the sample
    pub original_pitch: u8,
    /// Pitch correction in cents to apply on playback
    pub pitch_correction: i8,
    /// Type of the sample
    pub sample_type: SampleType,
    /// Index of the other channel's sample for stereo pairs
    pub sample_link: u16,
}

/// A zone of a preset or instrument: the generators and modulators that
/// apply to keys within its ranges.
///
/// Global zones have already been folded into each local zone at load time,
/// and the key/velocity ranges are hoisted out of the generator map.
#[derive(Debug, Clone, Default)]
pub struct Zone {
    /// Range of keys the zone applies to (inclusive)
    pub key_range: (u8, u8),
    /// Range of velocities the zone applies to (inclusive)
    pub velocity_range: (u8, u8),
    /// The generators of the zone
    pub generators: GeneratorMap,
    /// The modulators of the zone
    pub modulators: ModulatorMap,
}

impl Zone {
    fn matches(&self, key: u8, velocity: u8) -> bool {
        (self.key_range.0..=self.key_range.1).contains(&key)
            && (self.velocity_range.0..=self.velocity_range.1).contains(&velocity)
    }

    fn sample_id(&self) -> Option<usize> {
        self.generators
            .get(&GeneratorType::SampleId)
            .map(|amount| amount.unsigned() as usize)
    }
}

/// Identifier of a preset: its bank and program number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PresetId {
    /// The bank number (128 and up are percussion banks)
    pub bank: u16,
    /// The program number within the bank
    pub number: u16,
}

/// A preset: the selectable unit of a bank, built from zones referencing
/// instruments.
#[derive(Debug, Clone, Default)]
pub struct Preset {
    /// Name of the preset
    pub name: String,
    /// The local zones of the preset
    pub zones: Vec<Zone>,
}

/// An instrument, built from zones referencing samples.
#[derive(Debug, Clone, Default)]
pub struct Instrument {
    /// Name of the instrument
    pub name: String,
    /// The local zones of the instrument
    pub zones: Vec<Zone>,
}

/// Everything needed to synthesize one channel of a key: the merged
/// generators and modulators plus the sample to play.
#[derive(Debug, Clone)]
pub struct SampleInfo {
    /// Merged generators (instrument values plus additive preset offsets)
    pub generators: GeneratorMap,
    /// Merged modulators
    pub modulators: ModulatorMap,
    /// Index of the audio sample in the bank
    pub sample: usize,
}

impl SampleInfo {
    /// The value of a generator as a signed integer, or `default` if absent.
    #[inline]
    pub fn generator_signed(&self, generator_type: GeneratorType, default: i16) -> i16 {
        self.generators
            .get(&generator_type)
            .map_or(default, GeneratorAmount::signed)
    }

    /// The value of a generator as an unsigned integer, or `default` if
    /// absent.
    #[inline]
    pub fn generator_unsigned(&self, generator_type: GeneratorType, default: u16) -> u16 {
        self.generators
            .get(&generator_type)
            .map_or(default, GeneratorAmount::unsigned)
    }
}

/// All the information needed to synthesize a key: one sample for mono, a
/// left/right pair for stereo.
#[derive(Debug, Clone)]
pub struct KeyInfo {
    /// Whether two samples are in play
    pub stereo: bool,
    /// The left (or mono) sample information
    pub left: SampleInfo,
    /// The right sample information, for stereo keys
    pub right: Option<SampleInfo>,
}

/// A parsed SoundFont bank.
#[derive(Debug, Clone, Default)]
pub struct SoundFont {
    info: BankInfo,
    buffer: Arc<Vec<f32>>,
    presets: BTreeMap<PresetId, Preset>,
    instruments: Vec<Instrument>,
    samples: Vec<Sample>,
}

impl SoundFont {
    /// Load a SoundFont file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }

    /// Parse a SoundFont file already present in memory.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        parser::parse(data)
    }

    pub(crate) fn new(
        info: BankInfo,
        buffer: Vec<f32>,
        presets: BTreeMap<PresetId, Preset>,
        instruments: Vec<Instrument>,
        samples: Vec<Sample>,
    ) -> Self {
        SoundFont {
            info,
            buffer: Arc::new(buffer),
            presets,
            instruments,
            samples,
        }
    }

    /// All the information needed to synthesize `key` at `velocity` with the
    /// given preset, or `None` when the bank has no matching preset, zone or
    /// sample.
    ///
    /// The relevant generators and modulators of the preset and instrument
    /// zones are merged according to the specification and returned with the
    /// sample reference(s).
    pub fn get_key_info(
        &self,
        bank: u16,
        preset_number: u16,
        key: u8,
        velocity: u8,
    ) -> Option<KeyInfo> {
        let preset = self.preset(bank, preset_number)?;
        let preset_zone = find_zone(&preset.zones, key, velocity, None)?;

        let instrument_index = preset_zone
            .generators
            .get(&GeneratorType::Instrument)?
            .unsigned() as usize;
        let instrument = self.instruments.get(instrument_index)?;

        let instrument_zone = find_zone(&instrument.zones, key, velocity, None)?;
        let sample_index = instrument_zone.sample_id()?;
        let sample = self.samples.get(sample_index)?;

        if sample.sample_type.is_mono() {
            return Some(KeyInfo {
                stereo: false,
                left: fill_sample_info(instrument_zone, preset_zone, sample_index),
                right: None,
            });
        }

        // A stereo pair: the second zone carries the other channel's sample
        let instrument_zone2 = find_zone(&instrument.zones, key, velocity, Some(sample_index))?;
        let sample_index2 = instrument_zone2.sample_id()?;
        self.samples.get(sample_index2)?;

        let (left_zone, left_index, right_zone, right_index) = if sample.sample_type.is_left() {
            (instrument_zone, sample_index, instrument_zone2, sample_index2)
        } else {
            (instrument_zone2, sample_index2, instrument_zone, sample_index)
        };

        Some(KeyInfo {
            stereo: true,
            left: fill_sample_info(left_zone, preset_zone, left_index),
            right: Some(fill_sample_info(right_zone, preset_zone, right_index)),
        })
    }

    /// The global buffer of audio data samples index into.
    #[inline]
    pub fn buffer(&self) -> &Arc<Vec<f32>> {
        &self.buffer
    }

    /// The non-audio information of the bank.
    #[inline]
    pub fn info(&self) -> &BankInfo {
        &self.info
    }

    /// The number of presets.
    #[inline]
    pub fn nb_presets(&self) -> usize {
        self.presets.len()
    }

    /// The presets of the bank, ordered by (bank, number).
    #[inline]
    pub fn presets(&self) -> &BTreeMap<PresetId, Preset> {
        &self.presets
    }

    /// A specific preset, or `None` if absent.
    pub fn preset(&self, bank: u16, number: u16) -> Option<&Preset> {
        self.presets.get(&PresetId { bank, number })
    }

    /// The identifier of the first preset in iteration order, used as the
    /// fallback of last resort for note-on.
    pub fn first_preset_id(&self) -> Option<PresetId> {
        self.presets.keys().next().copied()
    }

    /// The names of all presets, keyed by identifier.
    pub fn preset_names(&self) -> BTreeMap<PresetId, String> {
        self.presets
            .iter()
            .map(|(id, preset)| (*id, preset.name.clone()))
            .collect()
    }

    /// The number of instruments.
    #[inline]
    pub fn nb_instruments(&self) -> usize {
        self.instruments.len()
    }

    /// The instruments of the bank.
    #[inline]
    pub fn instruments(&self) -> &[Instrument] {
        &self.instruments
    }

    /// The number of samples.
    #[inline]
    pub fn nb_samples(&self) -> usize {
        self.samples.len()
    }

    /// The samples of the bank.
    #[inline]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }
}

/// Find the first zone covering the key/velocity pair, optionally skipping
/// zones that play an excluded sample (used for stereo pair resolution).
fn find_zone<'a>(
    zones: &'a [Zone],
    key: u8,
    velocity: u8,
    exclude_sample: Option<usize>,
) -> Option<&'a Zone> {
    zones.iter().find(|zone| {
        zone.matches(key, velocity)
            && (exclude_sample.is_none() || zone.sample_id() != exclude_sample)
    })
}

/// Merge an instrument zone with its preset zone into the generator and
/// modulator maps of one key.
///
/// Instrument generators are taken as-is; preset generators are added for
/// the defined additive subset and ignored otherwise. Modulators add by
/// identity.
fn fill_sample_info(instrument_zone: &Zone, preset_zone: &Zone, sample: usize) -> SampleInfo {
    let mut generators = instrument_zone.generators.clone();

    for (&generator_type, preset_amount) in &preset_zone.generators {
        if !generator_type.preset_additive() {
            continue;
        }

        let merged = match generators.get(&generator_type) {
            Some(amount) => amount.added_to(generator_type, preset_amount),
            None => GeneratorAmount::classify(generator_type, preset_amount.raw()),
        };
        generators.insert(generator_type, merged);
    }

    let mut modulators = instrument_zone.modulators.clone();

    for (id, preset_modulator) in &preset_zone.modulators {
        modulators
            .entry(*id)
            .and_modify(|modulator| {
                modulator.amount = modulator.amount.wrapping_add(preset_modulator.amount)
            })
            .or_insert(*preset_modulator);
    }

    SampleInfo {
        generators,
        modulators,
        sample,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(key_range: (u8, u8), velocity_range: (u8, u8), sample_id: Option<usize>) -> Zone {
        let mut generators = GeneratorMap::new();
        if let Some(id) = sample_id {
            generators.insert(GeneratorType::SampleId, GeneratorAmount::Unsigned(id as u16));
        }
        Zone {
            key_range,
            velocity_range,
            generators,
            modulators: ModulatorMap::new(),
        }
    }

    #[test]
    fn test_zone_matching() {
        let zones = vec![
            zone((0, 59), (0, 127), Some(0)),
            zone((60, 127), (0, 127), Some(1)),
        ];

        assert_eq!(find_zone(&zones, 59, 100, None).unwrap().sample_id(), Some(0));
        assert_eq!(find_zone(&zones, 60, 100, None).unwrap().sample_id(), Some(1));
    }

    #[test]
    fn test_zone_velocity_split() {
        let zones = vec![
            zone((0, 127), (0, 63), Some(0)),
            zone((0, 127), (64, 127), Some(1)),
        ];

        assert_eq!(find_zone(&zones, 60, 10, None).unwrap().sample_id(), Some(0));
        assert_eq!(find_zone(&zones, 60, 100, None).unwrap().sample_id(), Some(1));
        assert!(find_zone(&zones, 60, 100, Some(1)).is_none());
    }

    #[test]
    fn test_exclusion_picks_sibling_zone() {
        let zones = vec![
            zone((0, 127), (0, 127), Some(4)),
            zone((0, 127), (0, 127), Some(7)),
        ];

        assert_eq!(find_zone(&zones, 60, 100, Some(4)).unwrap().sample_id(), Some(7));
        assert_eq!(find_zone(&zones, 60, 100, Some(7)).unwrap().sample_id(), Some(4));
    }

    #[test]
    fn test_merge_adds_preset_offsets_for_additive_subset() {
        let mut instrument_zone = zone((0, 127), (0, 127), Some(0));
        instrument_zone.generators.insert(
            GeneratorType::AttackVolumeEnvelope,
            GeneratorAmount::Signed(-12000),
        );
        instrument_zone.generators.insert(
            GeneratorType::InitialAttenuation,
            GeneratorAmount::Unsigned(100),
        );
        instrument_zone
            .generators
            .insert(GeneratorType::SampleModes, GeneratorAmount::Unsigned(1));

        let mut preset_zone = Zone::default();
        preset_zone.generators.insert(
            GeneratorType::AttackVolumeEnvelope,
            GeneratorAmount::Signed(1200),
        );
        preset_zone.generators.insert(
            GeneratorType::InitialAttenuation,
            GeneratorAmount::Unsigned(50),
        );
        // Not additive: must be ignored
        preset_zone
            .generators
            .insert(GeneratorType::SampleModes, GeneratorAmount::Unsigned(3));

        let info = fill_sample_info(&instrument_zone, &preset_zone, 0);

        assert_eq!(info.generator_signed(GeneratorType::AttackVolumeEnvelope, 0), -10800);
        assert_eq!(info.generator_unsigned(GeneratorType::InitialAttenuation, 0), 150);
        assert_eq!(info.generator_unsigned(GeneratorType::SampleModes, 0), 1);
    }

    #[test]
    fn test_merge_inserts_missing_additive_generator() {
        let instrument_zone = zone((0, 127), (0, 127), Some(0));
        let mut preset_zone = Zone::default();
        preset_zone
            .generators
            .insert(GeneratorType::Pan, GeneratorAmount::Signed(250));

        let info = fill_sample_info(&instrument_zone, &preset_zone, 0);
        assert_eq!(info.generator_signed(GeneratorType::Pan, 0), 250);
    }

    #[test]
    fn test_generator_defaults_when_absent() {
        let info = fill_sample_info(&Zone::default(), &Zone::default(), 0);
        assert_eq!(info.generator_signed(GeneratorType::AttackVolumeEnvelope, -12000), -12000);
        assert_eq!(info.generator_unsigned(GeneratorType::ScaleTuning, 100), 100);
    }
}
