//! SoundFont file parsing
//!
//! Decodes the RIFF `sfbk` container: the INFO chunk (bank metadata), the
//! sdta chunk (16-bit sample data, with the optional `sm24` least-significant
//! byte extension for 24-bit banks) and the pdta "hydra" chunk (presets,
//! bags, modulators, generators, instruments, sample headers).
//!
//! The hydra's indirection is resolved at load time: each preset and
//! instrument gets self-contained local zones, with any global zone and the
//! specification's default generators and modulators already folded in.

use std::collections::BTreeMap;

use super::generator::{
    default_instrument_generators, GeneratorAmount, GeneratorMap, GeneratorType,
};
use super::modulator::{
    default_modulators, Modulator, ModulatorId, ModulatorMap, ModulatorSource, ModulatorTransform,
};
use super::{BankInfo, Instrument, Preset, PresetId, Sample, SampleType, SoundFont, Zone};
use crate::{Result, SynthError};

/// Byte reader over the file contents.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Reader { data, pos: 0 }
    }

    fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(SynthError::ParseError(
                "Chunk extends beyond end of file".to_string(),
            ));
        }
        self.pos = pos;
        Ok(())
    }

    fn read_bytes(&mut self, size: usize) -> Result<&'a [u8]> {
        if self.pos + size > self.data.len() {
            return Err(SynthError::ParseError(
                "Unexpected end of file".to_string(),
            ));
        }
        let bytes = &self.data[self.pos..self.pos + size];
        self.pos += size;
        Ok(bytes)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn read_i16(&mut self) -> Result<i16> {
        Ok(self.read_u16()? as i16)
    }

    fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_fourcc(&mut self) -> Result<[u8; 4]> {
        let bytes = self.read_bytes(4)?;
        Ok([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    /// Fixed-size field holding a NUL-padded ASCII name.
    fn read_fixed_name(&mut self, size: usize) -> Result<String> {
        let bytes = self.read_bytes(size)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(size);
        Ok(bytes[..end].iter().map(|&b| b as char).collect())
    }
}

struct FieldInfo {
    id: [u8; 4],
    size: usize,
}

fn read_field_info(reader: &mut Reader) -> Result<FieldInfo> {
    let id = reader.read_fourcc()?;
    let size = reader.read_u32()? as usize;
    Ok(FieldInfo { id, size })
}

/// Parse a complete SoundFont file.
pub fn parse(data: &[u8]) -> Result<SoundFont> {
    let mut reader = Reader::new(data);

    // Main chunk
    let riff = reader.read_fourcc()?;
    let _riff_size = reader.read_u32()?;
    let sfbk = reader.read_fourcc()?;
    if &riff != b"RIFF" || &sfbk != b"sfbk" {
        return Err(SynthError::ParseError(
            "Not a SoundFont file (missing RIFF/sfbk header)".to_string(),
        ));
    }

    // Information chunk
    let list = reader.read_fourcc()?;
    let info_size = reader.read_u32()? as usize;
    let info_id = reader.read_fourcc()?;
    if &list != b"LIST" || &info_id != b"INFO" {
        return Err(SynthError::ParseError(
            "Missing INFO chunk".to_string(),
        ));
    }

    let end_of_info = reader.pos + info_size.saturating_sub(4);
    let info = parse_information(&mut reader, end_of_info)?;
    reader.seek(end_of_info)?;

    // Sample data chunk
    let list = reader.read_fourcc()?;
    let sdta_size = reader.read_u32()? as usize;
    let sdta_id = reader.read_fourcc()?;
    if &list != b"LIST" || &sdta_id != b"sdta" {
        return Err(SynthError::ParseError(
            "Missing sdta chunk".to_string(),
        ));
    }

    let end_of_sdta = reader.pos + sdta_size.saturating_sub(4);
    let buffer = if sdta_size != 4 {
        parse_sample_data(&mut reader, end_of_sdta)?
    } else {
        Vec::new()
    };
    reader.seek(end_of_sdta)?;

    // Preset, instrument, and sample header data chunk
    let list = reader.read_fourcc()?;
    let _pdta_size = reader.read_u32()?;
    let pdta_id = reader.read_fourcc()?;
    if &list != b"LIST" || &pdta_id != b"pdta" {
        return Err(SynthError::ParseError(
            "Missing pdta chunk".to_string(),
        ));
    }

    let (presets, instruments, samples) = parse_hydra(&mut reader)?;

    // Sample regions must stay inside the decoded buffer (the specification
    // mandates guard points after each sample, so a valid bank always has
    // data at the end index)
    for sample in &samples {
        if sample.start > sample.end
            || sample.end as usize >= buffer.len()
            || sample.loop_start > sample.loop_end
            || sample.loop_end as usize > buffer.len()
        {
            return Err(SynthError::ParseError(format!(
                "Sample \"{}\" extends beyond the sample data",
                sample.name
            )));
        }
    }

    log::debug!(
        "Loaded SoundFont \"{}\": {} presets, {} instruments, {} samples",
        info.name,
        presets.len(),
        instruments.len(),
        samples.len()
    );

    Ok(SoundFont::new(info, buffer, presets, instruments, samples))
}

fn parse_information(reader: &mut Reader, end_of_chunk: usize) -> Result<BankInfo> {
    let mut info = BankInfo::default();

    while reader.pos < end_of_chunk {
        let field = read_field_info(reader)?;

        match &field.id {
            b"ifil" => {
                if field.size != 4 {
                    return Err(SynthError::ParseError(
                        "Malformed ifil field".to_string(),
                    ));
                }
                info.major_version = reader.read_u16()?;
                info.minor_version = reader.read_u16()?;
            }
            b"iver" => {
                if field.size != 4 {
                    return Err(SynthError::ParseError(
                        "Malformed iver field".to_string(),
                    ));
                }
                info.rom_major_version = reader.read_u16()?;
                info.rom_minor_version = reader.read_u16()?;
            }
            b"INAM" => info.name = reader.read_fixed_name(field.size)?,
            b"isng" => info.target_engine = reader.read_fixed_name(field.size)?,
            b"irom" => info.rom_name = reader.read_fixed_name(field.size)?,
            b"ICRD" => info.creation_date = reader.read_fixed_name(field.size)?,
            b"IENG" => info.engineers = reader.read_fixed_name(field.size)?,
            b"IPRD" => info.product = reader.read_fixed_name(field.size)?,
            b"ICOP" => info.copyright = reader.read_fixed_name(field.size)?,
            b"ICMT" => info.comments = reader.read_fixed_name(field.size)?,
            b"ISFT" => info.creation_tool = reader.read_fixed_name(field.size)?,
            _ => {
                reader.read_bytes(field.size)?;
            }
        }
    }

    Ok(info)
}

/// Decode the sample data into the global float buffer.
///
/// 16-bit banks normalize by 1/32767; when an `sm24` field supplies the
/// least significant byte of 24-bit samples the pair is combined and
/// normalized by 1/8388608.
fn parse_sample_data(reader: &mut Reader, end_of_chunk: usize) -> Result<Vec<f32>> {
    let smpl_field = read_field_info(reader)?;
    if &smpl_field.id != b"smpl" {
        return Err(SynthError::ParseError(
            "Missing smpl field in sdta chunk".to_string(),
        ));
    }

    let smpl_start = reader.pos;
    let nb_samples = smpl_field.size / 2;

    // Look past the sample words for the 24-bit extension
    reader.seek(smpl_start + smpl_field.size)?;
    let lsb = if reader.pos + 8 <= end_of_chunk {
        let sm24_field = read_field_info(reader)?;
        if &sm24_field.id == b"sm24" && sm24_field.size >= nb_samples {
            Some(reader.read_bytes(sm24_field.size)?)
        } else {
            None
        }
    } else {
        None
    };

    reader.seek(smpl_start)?;
    let words = reader.read_bytes(smpl_field.size)?;

    let mut buffer = Vec::with_capacity(nb_samples);

    match lsb {
        Some(lsb) => {
            for i in 0..nb_samples {
                let word = i16::from_le_bytes([words[2 * i], words[2 * i + 1]]);
                let value = ((word as i32) << 8) | lsb[i] as i32;
                buffer.push(value as f32 / 8_388_608.0);
            }
        }
        None => {
            for i in 0..nb_samples {
                let word = i16::from_le_bytes([words[2 * i], words[2 * i + 1]]);
                buffer.push(word as f32 / 32_767.0);
            }
        }
    }

    Ok(buffer)
}

struct RawPreset {
    name: String,
    preset: u16,
    bank: u16,
    bag_index: usize,
}

struct RawInstrument {
    name: String,
    bag_index: usize,
}

struct RawBag {
    generator_index: usize,
    modulator_index: usize,
}

struct RawModulator {
    src_operation: u16,
    dest_operation: u16,
    amount: i16,
    amount_src_operation: u16,
    transform_operation: u16,
}

struct RawGenerator {
    generator_type: u16,
    amount: u16,
}

type Hydra = (BTreeMap<PresetId, Preset>, Vec<Instrument>, Vec<Sample>);

fn expect_field(reader: &mut Reader, id: &[u8; 4]) -> Result<usize> {
    let field = read_field_info(reader)?;
    if &field.id != id {
        return Err(SynthError::ParseError(format!(
            "Missing {} field in pdta chunk",
            String::from_utf8_lossy(id)
        )));
    }
    Ok(field.size)
}

fn parse_hydra(reader: &mut Reader) -> Result<Hydra> {
    // Presets
    let size = expect_field(reader, b"phdr")?;
    let nb_presets = size / 38;
    let mut raw_presets = Vec::with_capacity(nb_presets);
    for _ in 0..nb_presets {
        let name = reader.read_fixed_name(20)?;
        let preset = reader.read_u16()?;
        let bank = reader.read_u16()?;
        let bag_index = reader.read_u16()? as usize;
        let _library = reader.read_u32()?;
        let _genre = reader.read_u32()?;
        let _morphology = reader.read_u32()?;
        raw_presets.push(RawPreset {
            name,
            preset,
            bank,
            bag_index,
        });
    }

    // Preset bags
    let size = expect_field(reader, b"pbag")?;
    let preset_bags = read_bags(reader, size / 4)?;

    // Preset modulators
    let size = expect_field(reader, b"pmod")?;
    let preset_modulators = read_modulators(reader, size / 10)?;

    // Preset generators
    let size = expect_field(reader, b"pgen")?;
    let preset_generators = read_generators(reader, size / 4)?;

    // Instruments
    let size = expect_field(reader, b"inst")?;
    let nb_instruments = size / 22;
    let mut raw_instruments = Vec::with_capacity(nb_instruments);
    for _ in 0..nb_instruments {
        let name = reader.read_fixed_name(20)?;
        let bag_index = reader.read_u16()? as usize;
        raw_instruments.push(RawInstrument { name, bag_index });
    }

    // Instrument bags
    let size = expect_field(reader, b"ibag")?;
    let instrument_bags = read_bags(reader, size / 4)?;

    // Instrument modulators
    let size = expect_field(reader, b"imod")?;
    let instrument_modulators = read_modulators(reader, size / 10)?;

    // Instrument generators
    let size = expect_field(reader, b"igen")?;
    let instrument_generators = read_generators(reader, size / 4)?;

    // Samples
    let size = expect_field(reader, b"shdr")?;
    let nb_samples = size / 46;
    let mut samples = Vec::new();
    for i in 0..nb_samples {
        let name = reader.read_fixed_name(20)?;
        let start = reader.read_u32()?;
        let end = reader.read_u32()?;
        let loop_start = reader.read_u32()?;
        let loop_end = reader.read_u32()?;
        let sample_rate = reader.read_u32()?;
        let original_pitch = reader.read_u8()?;
        let pitch_correction = reader.read_i8()?;
        let sample_link = reader.read_u16()?;
        let sample_type = reader.read_u16()?;

        // The terminal record is not a sample
        if i + 1 < nb_samples {
            samples.push(Sample {
                name,
                start,
                end,
                loop_start,
                loop_end,
                sample_rate,
                original_pitch,
                pitch_correction,
                sample_type: SampleType::from_value(sample_type),
                sample_link,
            });
        }
    }

    if nb_presets == 0 || nb_instruments == 0 || nb_samples == 0 {
        return Err(SynthError::ParseError(
            "Hydra chunk is missing its terminal records".to_string(),
        ));
    }

    // Build the internal representation, resolving bags into local zones
    let mut presets = BTreeMap::new();
    for i in 0..nb_presets - 1 {
        let raw = &raw_presets[i];
        let bag_end = raw_presets[i + 1].bag_index;

        let zones = build_zones(
            &preset_bags,
            raw.bag_index,
            bag_end,
            &preset_generators,
            &preset_modulators,
            &preset_base_generators(),
            &ModulatorMap::new(),
            GeneratorType::Instrument,
        )?;

        presets.insert(
            PresetId {
                bank: raw.bank,
                number: raw.preset,
            },
            Preset {
                name: raw.name.clone(),
                zones,
            },
        );
    }

    let mut instruments = Vec::new();
    for i in 0..nb_instruments - 1 {
        let raw = &raw_instruments[i];
        let bag_end = raw_instruments[i + 1].bag_index;

        let zones = build_zones(
            &instrument_bags,
            raw.bag_index,
            bag_end,
            &instrument_generators,
            &instrument_modulators,
            default_instrument_generators(),
            default_modulators(),
            GeneratorType::SampleId,
        )?;

        instruments.push(Instrument {
            name: raw.name.clone(),
            zones,
        });
    }

    Ok((presets, instruments, samples))
}

fn read_bags(reader: &mut Reader, count: usize) -> Result<Vec<RawBag>> {
    let mut bags = Vec::with_capacity(count);
    for _ in 0..count {
        let generator_index = reader.read_u16()? as usize;
        let modulator_index = reader.read_u16()? as usize;
        bags.push(RawBag {
            generator_index,
            modulator_index,
        });
    }
    Ok(bags)
}

fn read_modulators(reader: &mut Reader, count: usize) -> Result<Vec<RawModulator>> {
    let mut modulators = Vec::with_capacity(count);
    for _ in 0..count {
        let src_operation = reader.read_u16()?;
        let dest_operation = reader.read_u16()?;
        let amount = reader.read_i16()?;
        let amount_src_operation = reader.read_u16()?;
        let transform_operation = reader.read_u16()?;
        modulators.push(RawModulator {
            src_operation,
            dest_operation,
            amount,
            amount_src_operation,
            transform_operation,
        });
    }
    Ok(modulators)
}

fn read_generators(reader: &mut Reader, count: usize) -> Result<Vec<RawGenerator>> {
    let mut generators = Vec::with_capacity(count);
    for _ in 0..count {
        let generator_type = reader.read_u16()?;
        let amount = reader.read_u16()?;
        generators.push(RawGenerator {
            generator_type,
            amount,
        });
    }
    Ok(generators)
}

/// The generators a preset zone starts from: just the full key and velocity
/// ranges (presets have no other defaults).
fn preset_base_generators() -> GeneratorMap {
    let mut map = GeneratorMap::new();
    map.insert(GeneratorType::KeyRange, GeneratorAmount::Range(0, 127));
    map.insert(GeneratorType::VelocityRange, GeneratorAmount::Range(0, 127));
    map
}

/// Resolve the bags of one preset or instrument into local zones.
///
/// A bag without the `local_marker` generator (Instrument for presets,
/// SampleId for instruments) is a global zone: its values become the
/// starting point of every following local zone instead of the defaults.
#[allow(clippy::too_many_arguments)]
fn build_zones(
    bags: &[RawBag],
    bag_start: usize,
    bag_end: usize,
    raw_generators: &[RawGenerator],
    raw_modulators: &[RawModulator],
    base_generators: &GeneratorMap,
    base_modulators: &ModulatorMap,
    local_marker: GeneratorType,
) -> Result<Vec<Zone>> {
    if bag_end > bags.len().saturating_sub(1) || bag_start > bag_end {
        return Err(SynthError::ParseError(
            "Bag index out of range in pdta chunk".to_string(),
        ));
    }

    let mut zones = Vec::new();
    let mut globals: Option<(GeneratorMap, ModulatorMap)> = None;

    for j in bag_start..bag_end {
        let (mut generators, mut modulators) = match &globals {
            Some((generators, modulators)) => (generators.clone(), modulators.clone()),
            None => (base_generators.clone(), base_modulators.clone()),
        };

        let generator_range = bags[j].generator_index..bags[j + 1].generator_index;
        if generator_range.end > raw_generators.len() || generator_range.start > generator_range.end
        {
            return Err(SynthError::ParseError(
                "Generator index out of range in pdta chunk".to_string(),
            ));
        }

        for raw in &raw_generators[generator_range] {
            // Unknown generator types are ignored
            if let Some(generator_type) = GeneratorType::from_value(raw.generator_type) {
                generators.insert(
                    generator_type,
                    GeneratorAmount::classify(generator_type, raw.amount),
                );
            }
        }

        let modulator_range = bags[j].modulator_index..bags[j + 1].modulator_index;
        if modulator_range.end > raw_modulators.len() || modulator_range.start > modulator_range.end
        {
            return Err(SynthError::ParseError(
                "Modulator index out of range in pdta chunk".to_string(),
            ));
        }

        for raw in &raw_modulators[modulator_range] {
            let destination = match GeneratorType::from_value(raw.dest_operation) {
                Some(destination) => destination,
                None => continue,
            };

            modulators.insert(
                ModulatorId {
                    source: ModulatorSource::from_operation(raw.src_operation),
                    destination,
                    amount_source: ModulatorSource::from_operation(raw.amount_src_operation),
                },
                Modulator {
                    amount: raw.amount,
                    transform: ModulatorTransform::from_value(raw.transform_operation),
                },
            );
        }

        if generators.contains_key(&local_marker) {
            let key_range = generators
                .remove(&GeneratorType::KeyRange)
                .map_or((0, 127), |amount| amount.range());
            let velocity_range = generators
                .remove(&GeneratorType::VelocityRange)
                .map_or((0, 127), |amount| amount.range());

            zones.push(Zone {
                key_range,
                velocity_range,
                generators,
                modulators,
            });
        } else {
            globals = Some((generators, modulators));
        }
    }

    Ok(zones)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soundfont::test_bank::{sine_sample, TestBank};

    #[test]
    fn test_rejects_non_soundfont_data() {
        assert!(parse(b"not a soundfont").is_err());
        assert!(parse(b"RIFF\x04\x00\x00\x00WAVE").is_err());
    }

    #[test]
    fn test_rejects_truncated_file() {
        let data = TestBank::mono().build();
        for len in [3, 12, 40, data.len() / 2] {
            assert!(parse(&data[..len]).is_err(), "accepted {} bytes", len);
        }
    }

    #[test]
    fn test_parses_minimal_mono_bank() {
        let soundfont = SoundFont::from_bytes(&TestBank::mono().build()).unwrap();

        assert_eq!(soundfont.nb_presets(), 1);
        assert_eq!(soundfont.nb_instruments(), 1);
        assert_eq!(soundfont.nb_samples(), 1);
        assert_eq!(soundfont.info().major_version, 2);
        assert_eq!(soundfont.info().name, "Test Bank");

        let sample = &soundfont.samples()[0];
        assert_eq!(sample.sample_rate, 22_050);
        assert_eq!(sample.original_pitch, 69);
        assert_eq!(sample.sample_type, SampleType::Mono);
    }

    #[test]
    fn test_sample_data_normalization() {
        let soundfont = SoundFont::from_bytes(&TestBank::mono().build()).unwrap();
        let source = sine_sample();
        let buffer = soundfont.buffer();

        assert!(buffer.len() >= source.len());
        for (i, &word) in source.iter().enumerate() {
            let expected = word as f32 / 32_767.0;
            assert!(
                (buffer[i] - expected).abs() < 1e-6,
                "sample {}: {} != {}",
                i,
                buffer[i],
                expected
            );
        }
    }

    #[test]
    fn test_key_info_lookup_mono() {
        let soundfont = SoundFont::from_bytes(&TestBank::mono().build()).unwrap();

        let key_info = soundfont.get_key_info(0, 0, 69, 100).unwrap();
        assert!(!key_info.stereo);
        assert!(key_info.right.is_none());
        assert_eq!(key_info.left.sample, 0);

        // Default generators survive the merge
        assert_eq!(
            key_info
                .left
                .generator_unsigned(GeneratorType::InitialFilterCutoffFrequency, 0),
            13500
        );
    }

    #[test]
    fn test_key_info_lookup_stereo() {
        let soundfont = SoundFont::from_bytes(&TestBank::stereo().build()).unwrap();

        let key_info = soundfont.get_key_info(0, 0, 69, 100).unwrap();
        assert!(key_info.stereo);

        let right = key_info.right.as_ref().unwrap();
        assert!(soundfont.samples()[key_info.left.sample].sample_type.is_left());
        assert_eq!(
            soundfont.samples()[right.sample].sample_type,
            SampleType::Right
        );
    }

    #[test]
    fn test_key_info_missing_preset() {
        let soundfont = SoundFont::from_bytes(&TestBank::mono().build()).unwrap();
        assert!(soundfont.get_key_info(5, 99, 69, 100).is_none());
    }

    #[test]
    fn test_preset_zone_attenuation_adds_to_instrument() {
        let data = TestBank::mono()
            .instrument_generator(GeneratorType::InitialAttenuation, 100)
            .preset_generator(GeneratorType::InitialAttenuation, 50)
            .build();
        let soundfont = SoundFont::from_bytes(&data).unwrap();

        let key_info = soundfont.get_key_info(0, 0, 69, 100).unwrap();
        assert_eq!(
            key_info
                .left
                .generator_unsigned(GeneratorType::InitialAttenuation, 0),
            150
        );
    }

    #[test]
    fn test_key_range_restricts_zone() {
        let data = TestBank::mono().key_range(60, 72).build();
        let soundfont = SoundFont::from_bytes(&data).unwrap();

        assert!(soundfont.get_key_info(0, 0, 69, 100).is_some());
        assert!(soundfont.get_key_info(0, 0, 59, 100).is_none());
        assert!(soundfont.get_key_info(0, 0, 73, 100).is_none());
    }

    #[test]
    fn test_default_modulators_present_in_key_info() {
        let soundfont = SoundFont::from_bytes(&TestBank::mono().build()).unwrap();
        let key_info = soundfont.get_key_info(0, 0, 69, 100).unwrap();
        assert_eq!(key_info.left.modulators.len(), 10);
    }

    #[test]
    fn test_first_preset_is_default() {
        let soundfont = SoundFont::from_bytes(&TestBank::mono().build()).unwrap();
        let id = soundfont.first_preset_id().unwrap();
        assert_eq!(id, PresetId { bank: 0, number: 0 });
    }
}
