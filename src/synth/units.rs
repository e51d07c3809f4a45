//! SoundFont unit conversions
//!
//! Generators express times in timecents (1200 per doubling, 0 = one
//! second), levels in centibels, and pitches in cents relative to the 8.176
//! Hz origin of MIDI key 0.

/// Absolute timecents to seconds.
#[inline]
pub fn timecents_to_seconds(timecents: f32) -> f32 {
    ((1.0 / 1200.0) * timecents).exp2()
}

/// Decibels to linear amplitude.
#[inline]
pub fn decibels_to_linear(decibels: f32) -> f32 {
    10.0_f32.powf(0.05 * decibels)
}

/// Linear amplitude to decibels.
#[inline]
pub fn linear_to_decibels(linear: f32) -> f32 {
    20.0 * linear.log10()
}

/// Absolute cents to a frequency in hertz.
#[inline]
pub fn cents_to_hertz(cents: f32) -> f32 {
    8.176 * ((1.0 / 1200.0) * cents).exp2()
}

/// Relative cents to a multiplying factor.
#[inline]
pub fn cents_to_multiplying_factor(cents: f32) -> f32 {
    ((1.0 / 1200.0) * cents).exp2()
}

/// Key-number scaling of envelope hold/decay times: `cents` timecents per
/// key away from middle C.
#[inline]
pub fn key_number_to_multiplying_factor(cents: i16, key: u8) -> f32 {
    timecents_to_seconds((cents as i32 * (60 - key as i32)) as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timecents() {
        assert!((timecents_to_seconds(0.0) - 1.0).abs() < 1e-6);
        assert!((timecents_to_seconds(1200.0) - 2.0).abs() < 1e-6);
        assert!((timecents_to_seconds(-12000.0) - 0.000976_562_5).abs() < 1e-9);
    }

    #[test]
    fn test_decibels_round_trip() {
        for value in [0.001f32, 0.5, 1.0, 2.0] {
            let decibels = linear_to_decibels(value);
            assert!((decibels_to_linear(decibels) - value).abs() < 1e-5 * value);
        }
    }

    #[test]
    fn test_cents_to_hertz_a440() {
        // MIDI key 69 = 6900 cents above key 0
        assert!((cents_to_hertz(6900.0) - 440.0).abs() < 0.05);
    }

    #[test]
    fn test_key_scaling_neutral_at_middle_c() {
        assert_eq!(key_number_to_multiplying_factor(50, 60), 1.0);
        assert!(key_number_to_multiplying_factor(50, 72) < 1.0);
        assert!(key_number_to_multiplying_factor(50, 48) > 1.0);
    }
}
