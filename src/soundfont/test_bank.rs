//! In-memory SoundFont builder for tests
//!
//! Builds a minimal but structurally complete sfbk file: INFO chunk, 16-bit
//! sample data, and a hydra with one preset referencing one instrument. Used
//! by the parser tests and by the synthesizer end-to-end tests.

use super::generator::GeneratorType;

/// A 440 Hz sine at 22050 Hz, 2205 words (0.1 s), amplitude 0.8.
pub fn sine_sample() -> Vec<i16> {
    (0..2205)
        .map(|i| {
            let phase = std::f64::consts::TAU * 440.0 * i as f64 / 22_050.0;
            (0.8 * phase.sin() * 32_767.0) as i16
        })
        .collect()
}

/// A constant-level sample, convenient for exact gain arithmetic in tests.
pub fn constant_sample(len: usize) -> Vec<i16> {
    vec![16_383; len]
}

/// Builder for a one-preset, one-instrument test bank.
pub struct TestBank {
    stereo: bool,
    sample_words: Vec<i16>,
    sample_rate: u32,
    original_pitch: u8,
    looped: bool,
    key_range: Option<(u8, u8)>,
    instrument_generators: Vec<(GeneratorType, u16)>,
    preset_generators: Vec<(GeneratorType, u16)>,
}

impl TestBank {
    /// A bank with a single mono sample at preset 0:0.
    pub fn mono() -> Self {
        TestBank {
            stereo: false,
            sample_words: sine_sample(),
            sample_rate: 22_050,
            original_pitch: 69,
            looped: false,
            key_range: None,
            instrument_generators: Vec::new(),
            preset_generators: Vec::new(),
        }
    }

    /// A bank with a hard-panned left/right sample pair at preset 0:0.
    pub fn stereo() -> Self {
        TestBank {
            stereo: true,
            ..TestBank::mono()
        }
    }

    /// Replace the sample words.
    pub fn sample_words(mut self, words: Vec<i16>) -> Self {
        self.sample_words = words;
        self
    }

    /// Mark the sample region as continuously looping over its full length.
    pub fn looped(mut self) -> Self {
        self.looped = true;
        self
    }

    /// Restrict the instrument zone(s) to a key range.
    pub fn key_range(mut self, lo: u8, hi: u8) -> Self {
        self.key_range = Some((lo, hi));
        self
    }

    /// Add a generator to every instrument zone.
    pub fn instrument_generator(mut self, generator_type: GeneratorType, raw: u16) -> Self {
        self.instrument_generators.push((generator_type, raw));
        self
    }

    /// Add a generator to the preset zone.
    pub fn preset_generator(mut self, generator_type: GeneratorType, raw: u16) -> Self {
        self.preset_generators.push((generator_type, raw));
        self
    }

    /// Serialize the bank as an sfbk file.
    pub fn build(&self) -> Vec<u8> {
        const GUARD_WORDS: usize = 8;

        let nb_regions = if self.stereo { 2 } else { 1 };
        let region_len = self.sample_words.len();

        // Sample data: each region followed by guard words for interpolation
        let mut words: Vec<i16> = Vec::new();
        let mut region_starts = Vec::new();
        for _ in 0..nb_regions {
            region_starts.push(words.len() as u32);
            words.extend_from_slice(&self.sample_words);
            words.extend(std::iter::repeat(0).take(GUARD_WORDS));
        }

        let mut smpl = Vec::new();
        for word in &words {
            smpl.extend_from_slice(&word.to_le_bytes());
        }

        // INFO chunk
        let mut info = Vec::new();
        info.extend_from_slice(&field(b"ifil", &{
            let mut v = Vec::new();
            v.extend_from_slice(&2u16.to_le_bytes());
            v.extend_from_slice(&1u16.to_le_bytes());
            v
        }));
        info.extend_from_slice(&field(b"INAM", b"Test Bank\0"));

        // Hydra
        let mut phdr = Vec::new();
        phdr.extend_from_slice(&preset_record("Preset", 0, 0, 0));
        phdr.extend_from_slice(&preset_record("EOP", 0, 0, 1));

        let mut pgen = Vec::new();
        for &(generator_type, raw) in &self.preset_generators {
            pgen.extend_from_slice(&generator_record(generator_type as u16, raw));
        }
        pgen.extend_from_slice(&generator_record(GeneratorType::Instrument as u16, 0));
        let nb_pgen = (pgen.len() / 4) as u16;

        let mut pbag = Vec::new();
        pbag.extend_from_slice(&bag_record(0, 0));
        pbag.extend_from_slice(&bag_record(nb_pgen, 0));

        let mut inst = Vec::new();
        inst.extend_from_slice(&instrument_record("Instrument", 0));
        inst.extend_from_slice(&instrument_record("EOI", nb_regions as u16));

        let mut igen = Vec::new();
        let mut ibag = Vec::new();
        for region in 0..nb_regions {
            ibag.extend_from_slice(&bag_record((igen.len() / 4) as u16, 0));

            if let Some((lo, hi)) = self.key_range {
                igen.extend_from_slice(&generator_record(
                    GeneratorType::KeyRange as u16,
                    (lo as u16) | ((hi as u16) << 8),
                ));
            }
            for &(generator_type, raw) in &self.instrument_generators {
                igen.extend_from_slice(&generator_record(generator_type as u16, raw));
            }
            if self.stereo {
                // Hard-panned halves of the pair
                let pan: i16 = if region == 0 { -500 } else { 500 };
                igen.extend_from_slice(&generator_record(
                    GeneratorType::Pan as u16,
                    pan as u16,
                ));
            }
            if self.looped {
                igen.extend_from_slice(&generator_record(GeneratorType::SampleModes as u16, 1));
            }
            igen.extend_from_slice(&generator_record(
                GeneratorType::SampleId as u16,
                region as u16,
            ));
        }
        ibag.extend_from_slice(&bag_record((igen.len() / 4) as u16, 0));

        let mut shdr = Vec::new();
        for region in 0..nb_regions {
            let start = region_starts[region];
            let end = start + region_len as u32;
            let sample_type: u16 = if !self.stereo {
                0x0001
            } else if region == 0 {
                0x0004 // left
            } else {
                0x0002 // right
            };
            let link = if self.stereo {
                (1 - region) as u16
            } else {
                0
            };
            shdr.extend_from_slice(&sample_record(
                if region == 0 { "SampleL" } else { "SampleR" },
                start,
                end,
                start,
                end,
                self.sample_rate,
                self.original_pitch,
                link,
                sample_type,
            ));
        }
        shdr.extend_from_slice(&sample_record("EOS", 0, 0, 0, 0, 0, 0, 0, 0));

        let mut pdta = Vec::new();
        pdta.extend_from_slice(&field(b"phdr", &phdr));
        pdta.extend_from_slice(&field(b"pbag", &pbag));
        pdta.extend_from_slice(&field(b"pmod", &[]));
        pdta.extend_from_slice(&field(b"pgen", &pgen));
        pdta.extend_from_slice(&field(b"inst", &inst));
        pdta.extend_from_slice(&field(b"ibag", &ibag));
        pdta.extend_from_slice(&field(b"imod", &[]));
        pdta.extend_from_slice(&field(b"igen", &igen));
        pdta.extend_from_slice(&field(b"shdr", &shdr));

        // Assemble the RIFF envelope
        let mut contents = Vec::new();
        contents.extend_from_slice(b"sfbk");
        contents.extend_from_slice(&list(b"INFO", &info));
        contents.extend_from_slice(&list(b"sdta", &field(b"smpl", &smpl)));
        contents.extend_from_slice(&list(b"pdta", &pdta));

        let mut data = Vec::new();
        data.extend_from_slice(b"RIFF");
        data.extend_from_slice(&(contents.len() as u32).to_le_bytes());
        data.extend_from_slice(&contents);
        data
    }
}

fn field(id: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut data = Vec::with_capacity(8 + payload.len());
    data.extend_from_slice(id);
    data.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    data.extend_from_slice(payload);
    data
}

fn list(id: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut data = Vec::with_capacity(12 + payload.len());
    data.extend_from_slice(b"LIST");
    data.extend_from_slice(&((payload.len() + 4) as u32).to_le_bytes());
    data.extend_from_slice(id);
    data.extend_from_slice(payload);
    data
}

fn fixed_name(name: &str) -> [u8; 20] {
    let mut bytes = [0u8; 20];
    for (i, b) in name.bytes().take(19).enumerate() {
        bytes[i] = b;
    }
    bytes
}

fn preset_record(name: &str, preset: u16, bank: u16, bag_index: u16) -> Vec<u8> {
    let mut data = Vec::with_capacity(38);
    data.extend_from_slice(&fixed_name(name));
    data.extend_from_slice(&preset.to_le_bytes());
    data.extend_from_slice(&bank.to_le_bytes());
    data.extend_from_slice(&bag_index.to_le_bytes());
    data.extend_from_slice(&0u32.to_le_bytes()); // library
    data.extend_from_slice(&0u32.to_le_bytes()); // genre
    data.extend_from_slice(&0u32.to_le_bytes()); // morphology
    data
}

fn instrument_record(name: &str, bag_index: u16) -> Vec<u8> {
    let mut data = Vec::with_capacity(22);
    data.extend_from_slice(&fixed_name(name));
    data.extend_from_slice(&bag_index.to_le_bytes());
    data
}

fn bag_record(generator_index: u16, modulator_index: u16) -> Vec<u8> {
    let mut data = Vec::with_capacity(4);
    data.extend_from_slice(&generator_index.to_le_bytes());
    data.extend_from_slice(&modulator_index.to_le_bytes());
    data
}

fn generator_record(generator_type: u16, amount: u16) -> Vec<u8> {
    let mut data = Vec::with_capacity(4);
    data.extend_from_slice(&generator_type.to_le_bytes());
    data.extend_from_slice(&amount.to_le_bytes());
    data
}

#[allow(clippy::too_many_arguments)]
fn sample_record(
    name: &str,
    start: u32,
    end: u32,
    loop_start: u32,
    loop_end: u32,
    sample_rate: u32,
    original_pitch: u8,
    link: u16,
    sample_type: u16,
) -> Vec<u8> {
    let mut data = Vec::with_capacity(46);
    data.extend_from_slice(&fixed_name(name));
    data.extend_from_slice(&start.to_le_bytes());
    data.extend_from_slice(&end.to_le_bytes());
    data.extend_from_slice(&loop_start.to_le_bytes());
    data.extend_from_slice(&loop_end.to_le_bytes());
    data.extend_from_slice(&sample_rate.to_le_bytes());
    data.push(original_pitch);
    data.push(0); // pitch correction
    data.extend_from_slice(&link.to_le_bytes());
    data.extend_from_slice(&sample_type.to_le_bytes());
    data
}
