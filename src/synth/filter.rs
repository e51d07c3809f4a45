//! Resonant low-pass filter
//!
//! Second-order biquad in the Audio-EQ-Cookbook low-pass form, applied in
//! place to one block at a time. The filter deactivates itself when the
//! cutoff approaches the Nyquist frequency; while inactive it still primes
//! its history from the passing signal so a later activation does not click.

use std::f32::consts::PI;

const RESONANCE_PEAK_OFFSET: f32 = 0.292_893_22; // 1 - 1/sqrt(2)

/// Two-pole low-pass filter of one voice track.
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    sample_rate: u32,

    active: bool,

    a0: f32,
    a1: f32,
    a2: f32,
    a3: f32,
    a4: f32,

    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl BiquadFilter {
    /// Create a filter for the given output sample rate.
    pub fn new(sample_rate: u32) -> Self {
        BiquadFilter {
            sample_rate,
            active: false,
            a0: 0.0,
            a1: 0.0,
            a2: 0.0,
            a3: 0.0,
            a4: 0.0,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    /// Zero the filter history.
    pub fn clear_buffer(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }

    /// Configure as a low-pass at `cutoff_frequency` hertz with the given
    /// resonance (linear amplitude at the peak).
    ///
    /// Cutoffs at or above 0.499 of the sample rate disable the filter.
    pub fn set_low_pass_filter(&mut self, cutoff_frequency: f32, resonance: f32) {
        if cutoff_frequency < 0.499 * self.sample_rate as f32 {
            self.active = true;

            // This equation gives the Q value which makes the desired
            // resonance peak. The error of the resultant peak height is
            // less than 3%.
            let q = resonance - RESONANCE_PEAK_OFFSET / (1.0 + 6.0 * (resonance - 1.0));

            let w = 2.0 * PI * cutoff_frequency / self.sample_rate as f32;
            let cosw = w.cos();
            let alpha = w.sin() / (2.0 * q);

            let b0 = (1.0 - cosw) / 2.0;
            let b1 = 1.0 - cosw;
            let b2 = (1.0 - cosw) / 2.0;
            let a0 = 1.0 + alpha;
            let a1 = -2.0 * cosw;
            let a2 = 1.0 - alpha;

            self.set_coefficients(a0, a1, a2, b0, b1, b2);
        } else {
            self.active = false;
        }
    }

    /// Filter one block in place.
    pub fn process(&mut self, block: &mut [f32]) {
        if self.active {
            for value in block.iter_mut() {
                let input = *value;
                let output = self.a0 * input + self.a1 * self.x1 + self.a2 * self.x2
                    - self.a3 * self.y1
                    - self.a4 * self.y2;

                self.x2 = self.x1;
                self.x1 = input;
                self.y2 = self.y1;
                self.y1 = output;

                *value = output;
            }
        } else {
            // Keep the history tracking the signal so switching the filter
            // on later starts from a consistent state
            self.x2 = block[block.len() - 2];
            self.x1 = block[block.len() - 1];
            self.y2 = self.x2;
            self.y1 = self.x1;
        }
    }

    fn set_coefficients(&mut self, a0: f32, a1: f32, a2: f32, b0: f32, b1: f32, b2: f32) {
        self.a0 = b0 / a0;
        self.a1 = b1 / a0;
        self.a2 = b2 / a0;
        self.a3 = a1 / a0;
        self.a4 = a2 / a0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::TAU;

    fn rms(signal: &[f32]) -> f32 {
        (signal.iter().map(|x| x * x).sum::<f32>() / signal.len() as f32).sqrt()
    }

    fn sine(frequency: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (TAU * frequency * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_low_pass_attenuates_high_frequencies() {
        let sample_rate = 44_100;

        let mut filter = BiquadFilter::new(sample_rate);
        filter.clear_buffer();
        filter.set_low_pass_filter(1_000.0, 1.0);

        let mut low = sine(100.0, sample_rate, 4096);
        filter.process(&mut low);

        let mut filter = BiquadFilter::new(sample_rate);
        filter.clear_buffer();
        filter.set_low_pass_filter(1_000.0, 1.0);

        let mut high = sine(10_000.0, sample_rate, 4096);
        filter.process(&mut high);

        // Skip the transient at the start
        let low_rms = rms(&low[1024..]);
        let high_rms = rms(&high[1024..]);

        assert!(low_rms > 0.5, "passband level too low: {}", low_rms);
        assert!(
            high_rms < 0.05 * low_rms,
            "stopband not attenuated: low {} high {}",
            low_rms,
            high_rms
        );
    }

    #[test]
    fn test_passthrough_above_nyquist_limit() {
        let sample_rate = 44_100;
        let mut filter = BiquadFilter::new(sample_rate);
        filter.clear_buffer();
        filter.set_low_pass_filter(0.5 * sample_rate as f32, 1.0);

        let original = sine(5_000.0, sample_rate, 256);
        let mut block = original.clone();
        filter.process(&mut block);

        assert_eq!(block, original, "inactive filter must not modify the block");
    }

    #[test]
    fn test_passthrough_primes_history() {
        // An inactive filter copies the last two input samples into its
        // history; activating it afterwards must continue from them instead
        // of from zero, so no discontinuity is introduced.
        let sample_rate = 44_100;
        let mut filter = BiquadFilter::new(sample_rate);
        filter.clear_buffer();
        filter.set_low_pass_filter(0.5 * sample_rate as f32, 1.0);

        let mut block = vec![0.25f32; 64];
        filter.process(&mut block);

        filter.set_low_pass_filter(10_000.0, 1.0);
        let mut next = vec![0.25f32; 64];
        filter.process(&mut next);

        for (i, value) in next.iter().enumerate() {
            assert!(
                (value - 0.25).abs() < 0.01,
                "sample {} jumped after filter activation: {}",
                i,
                value
            );
        }
    }

    #[test]
    fn test_resonance_boosts_cutoff_region() {
        let sample_rate = 44_100;
        let cutoff = 2_000.0;

        let mut flat = BiquadFilter::new(sample_rate);
        flat.clear_buffer();
        flat.set_low_pass_filter(cutoff, 1.0);

        let mut peaked = BiquadFilter::new(sample_rate);
        peaked.clear_buffer();
        peaked.set_low_pass_filter(cutoff, 4.0);

        let mut a = sine(cutoff, sample_rate, 4096);
        flat.process(&mut a);
        let mut b = sine(cutoff, sample_rate, 4096);
        peaked.process(&mut b);

        assert!(
            rms(&b[1024..]) > 2.0 * rms(&a[1024..]),
            "resonance peak missing: flat {} peaked {}",
            rms(&a[1024..]),
            rms(&b[1024..])
        );
    }
}
