//! SoundFont modulators
//!
//! A modulator is a dynamic rule mapping a controller source through a
//! transfer function to a generator destination. Modulators are tracked by
//! identity (source, destination, amount source); when zones are merged,
//! amounts of identical modulators add.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use super::generator::GeneratorType;

/// General controller sources (used when a modulator source is not a MIDI
/// continuous controller).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GeneralSource {
    /// No controller; the source behaves as a constant 1
    None = 0,
    /// Note-on velocity of the triggering key
    NoteOnVelocity = 2,
    /// Key number of the triggering note-on
    NoteOnKeyNumber = 3,
    /// MIDI poly-pressure amount
    PolyPressure = 10,
    /// MIDI channel-pressure amount
    ChannelPressure = 13,
    /// MIDI pitch wheel amount
    PitchWheel = 14,
    /// Pitch wheel sensitivity (RPN 0)
    PitchWheelSensitivity = 16,
}

/// Shape of a modulator transfer curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SourceType {
    /// Output moves linearly between the extremes
    Linear = 0,
    /// Concave (logarithmic) transfer
    Concave = 1,
    /// Convex transfer (concave with endpoints reversed)
    Convex = 2,
    /// Minimum below half input, maximum above
    Switch = 3,
}

impl SourceType {
    fn from_value(value: u16) -> Self {
        match value {
            1 => SourceType::Concave,
            2 => SourceType::Convex,
            3 => SourceType::Switch,
            _ => SourceType::Linear,
        }
    }
}

/// Direction of a modulator source sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SourceDirection {
    /// From the minimum value to the maximum value
    MinToMax = 0,
    /// From the maximum value to the minimum value
    MaxToMin = 1,
}

/// Polarity of a modulator source mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SourcePolarity {
    /// Mapped to 0 ... 1
    Unipolar = 0,
    /// Mapped to -1 ... 1
    Bipolar = 1,
}

/// The controller feeding a modulator source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Controller {
    /// One of the general controller sources (raw palette index)
    General(u8),
    /// A MIDI continuous controller number
    Midi(u8),
}

impl Controller {
    /// A general-palette controller from its well-known source.
    pub fn general(source: GeneralSource) -> Self {
        Controller::General(source as u8)
    }
}

/// A fully qualified modulator source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ModulatorSource {
    /// Transfer curve shape
    pub source_type: SourceType,
    /// Sweep direction
    pub direction: SourceDirection,
    /// Unipolar or bipolar mapping
    pub polarity: SourcePolarity,
    /// The backing controller
    pub controller: Controller,
}

impl ModulatorSource {
    /// Decode a source from its packed 16-bit file representation.
    pub fn from_operation(operation: u16) -> Self {
        let controller = if operation & 0x0080 != 0 {
            Controller::Midi((operation & 0x007F) as u8)
        } else {
            Controller::General((operation & 0x007F) as u8)
        };

        ModulatorSource {
            source_type: SourceType::from_value((operation & 0xFC00) >> 10),
            direction: if operation & 0x0100 != 0 {
                SourceDirection::MaxToMin
            } else {
                SourceDirection::MinToMax
            },
            polarity: if operation & 0x0200 != 0 {
                SourcePolarity::Bipolar
            } else {
                SourcePolarity::Unipolar
            },
            controller,
        }
    }

    fn new(
        source_type: SourceType,
        direction: SourceDirection,
        polarity: SourcePolarity,
        controller: Controller,
    ) -> Self {
        ModulatorSource {
            source_type,
            direction,
            polarity,
            controller,
        }
    }
}

/// The identity of a modulator: its source, destination generator, and
/// amount source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ModulatorId {
    /// Source of the modulation
    pub source: ModulatorSource,
    /// Destination generator
    pub destination: GeneratorType,
    /// Controller scaling the modulation amount
    pub amount_source: ModulatorSource,
}

/// Transform applied to a modulator output. The 2.01 specification defines
/// only the linear transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModulatorTransform {
    /// Output used as-is
    Linear,
}

impl ModulatorTransform {
    /// Decode from the raw file value; unknown transforms read as linear.
    pub fn from_value(_value: u16) -> Self {
        ModulatorTransform::Linear
    }
}

/// The data of a modulator, minus its identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Modulator {
    /// Degree to which the source modulates the destination
    pub amount: i16,
    /// Transform applied to the source before application
    pub transform: ModulatorTransform,
}

/// The modulators of a zone, keyed by identity.
pub type ModulatorMap = BTreeMap<ModulatorId, Modulator>;

/// The ten default modulators of the SoundFont 2.01 specification, always
/// present in every instrument zone.
pub fn default_modulators() -> &'static ModulatorMap {
    static DEFAULTS: OnceLock<ModulatorMap> = OnceLock::new();
    DEFAULTS.get_or_init(|| {
        use GeneratorType::*;
        use SourceDirection::*;
        use SourcePolarity::*;
        use SourceType::*;

        let no_amount = ModulatorSource::new(
            Linear,
            MinToMax,
            Unipolar,
            Controller::general(GeneralSource::None),
        );

        let mut map = ModulatorMap::new();
        let mut add = |source, destination, amount_source, amount| {
            map.insert(
                ModulatorId {
                    source,
                    destination,
                    amount_source,
                },
                Modulator {
                    amount,
                    transform: ModulatorTransform::Linear,
                },
            );
        };

        // Note-on velocity to initial attenuation
        add(
            ModulatorSource::new(
                Concave,
                MaxToMin,
                Unipolar,
                Controller::general(GeneralSource::NoteOnVelocity),
            ),
            InitialAttenuation,
            no_amount,
            960,
        );

        // Note-on velocity to filter cutoff
        add(
            ModulatorSource::new(
                Linear,
                MaxToMin,
                Unipolar,
                Controller::general(GeneralSource::NoteOnVelocity),
            ),
            InitialFilterCutoffFrequency,
            ModulatorSource::new(
                Switch,
                MaxToMin,
                Unipolar,
                Controller::general(GeneralSource::NoteOnVelocity),
            ),
            -2400,
        );

        // Channel pressure to vibrato LFO pitch depth
        add(
            ModulatorSource::new(
                Linear,
                MinToMax,
                Unipolar,
                Controller::general(GeneralSource::ChannelPressure),
            ),
            VibratoLfoToPitch,
            no_amount,
            50,
        );

        // CC 1 (modulation wheel) to vibrato LFO pitch depth
        add(
            ModulatorSource::new(Linear, MinToMax, Unipolar, Controller::Midi(1)),
            VibratoLfoToPitch,
            no_amount,
            50,
        );

        // CC 7 (channel volume) to initial attenuation
        add(
            ModulatorSource::new(Concave, MaxToMin, Unipolar, Controller::Midi(7)),
            InitialAttenuation,
            no_amount,
            960,
        );

        // CC 10 (pan) to pan position
        add(
            ModulatorSource::new(Linear, MinToMax, Bipolar, Controller::Midi(10)),
            Pan,
            no_amount,
            1000,
        );

        // CC 11 (expression) to initial attenuation
        add(
            ModulatorSource::new(Concave, MaxToMin, Unipolar, Controller::Midi(11)),
            InitialAttenuation,
            no_amount,
            960,
        );

        // CC 91 to reverb effects send
        add(
            ModulatorSource::new(Linear, MinToMax, Unipolar, Controller::Midi(91)),
            ReverbEffectsSend,
            no_amount,
            200,
        );

        // CC 93 to chorus effects send
        add(
            ModulatorSource::new(Linear, MinToMax, Unipolar, Controller::Midi(93)),
            ChorusEffectsSend,
            no_amount,
            200,
        );

        // Pitch wheel to initial pitch, scaled by pitch wheel sensitivity
        add(
            ModulatorSource::new(
                Linear,
                MinToMax,
                Bipolar,
                Controller::general(GeneralSource::PitchWheel),
            ),
            FineTune,
            ModulatorSource::new(
                Linear,
                MinToMax,
                Unipolar,
                Controller::general(GeneralSource::PitchWheelSensitivity),
            ),
            12700,
        );

        map
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_decoding() {
        // MIDI CC 7, linear, min-to-max, unipolar
        let source = ModulatorSource::from_operation(0x0087);
        assert_eq!(source.controller, Controller::Midi(7));
        assert_eq!(source.source_type, SourceType::Linear);
        assert_eq!(source.direction, SourceDirection::MinToMax);
        assert_eq!(source.polarity, SourcePolarity::Unipolar);

        // Note-on velocity, concave, max-to-min, unipolar (0x0502)
        let source = ModulatorSource::from_operation(0x0502);
        assert_eq!(
            source.controller,
            Controller::general(GeneralSource::NoteOnVelocity)
        );
        assert_eq!(source.source_type, SourceType::Concave);
        assert_eq!(source.direction, SourceDirection::MaxToMin);

        // Pitch wheel, linear, bipolar (0x020E)
        let source = ModulatorSource::from_operation(0x020E);
        assert_eq!(
            source.controller,
            Controller::general(GeneralSource::PitchWheel)
        );
        assert_eq!(source.polarity, SourcePolarity::Bipolar);
    }

    #[test]
    fn test_default_modulators_complete() {
        assert_eq!(default_modulators().len(), 10);
    }

    #[test]
    fn test_identity_distinguishes_amount_source() {
        let defaults = default_modulators();

        // Velocity feeds both attenuation and cutoff, as distinct identities
        let velocity_targets: Vec<_> = defaults
            .keys()
            .filter(|id| {
                id.source.controller == Controller::general(GeneralSource::NoteOnVelocity)
            })
            .map(|id| id.destination)
            .collect();
        assert_eq!(
            velocity_targets,
            vec![
                GeneratorType::InitialFilterCutoffFrequency,
                GeneratorType::InitialAttenuation
            ]
        );
    }
}
