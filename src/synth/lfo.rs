//! Low frequency oscillator
//!
//! Triangle wave in [-1, +1] with an initial delay, advanced one block per
//! `process()` call. Frequencies at or below 1 mHz leave the LFO inactive
//! with a constant zero output.

/// Triangle-wave LFO for vibrato and modulation.
#[derive(Debug, Clone)]
pub struct Lfo {
    sample_rate: u32,
    block_size: usize,

    active: bool,
    delay: f32,
    period: f32,

    nb_processed_samples: u32,
    value: f32,
}

impl Lfo {
    /// Create an LFO advancing `block_size` samples per process call.
    pub fn new(sample_rate: u32, block_size: usize) -> Self {
        Lfo {
            sample_rate,
            block_size,
            active: false,
            delay: 0.0,
            period: 0.0,
            nb_processed_samples: 0,
            value: 0.0,
        }
    }

    /// Start the oscillator with the given delay (seconds) and frequency
    /// (hertz).
    pub fn start(&mut self, delay: f32, frequency: f32) {
        if frequency > 0.001 {
            self.active = true;

            self.delay = delay;
            self.period = 1.0 / frequency;

            self.nb_processed_samples = 0;
            self.value = 0.0;
        } else {
            self.active = false;
            self.value = 0.0;
        }
    }

    /// Advance the oscillator by one block.
    pub fn process(&mut self) {
        if !self.active {
            return;
        }

        self.nb_processed_samples += self.block_size as u32;

        let current_time = self.nb_processed_samples as f32 / self.sample_rate as f32;

        if current_time < self.delay {
            self.value = 0.0;
        } else {
            let phase = ((current_time - self.delay) % self.period) / self.period;

            if phase < 0.25 {
                self.value = 4.0 * phase;
            } else if phase < 0.75 {
                self.value = 4.0 * (0.5 - phase);
            } else {
                self.value = 4.0 * (phase - 1.0);
            }
        }
    }

    /// The current oscillator value, -1 to +1.
    #[inline]
    pub fn value(&self) -> f32 {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inactive_below_frequency_floor() {
        let mut lfo = Lfo::new(22_050, 64);
        lfo.start(0.0, 0.0005);

        for _ in 0..100 {
            lfo.process();
            assert_eq!(lfo.value(), 0.0);
        }
    }

    #[test]
    fn test_silent_during_delay() {
        let mut lfo = Lfo::new(22_050, 64);
        lfo.start(0.5, 5.0);

        // 0.5 s at 22050 Hz = 172 blocks of 64
        for _ in 0..172 {
            lfo.process();
            assert_eq!(lfo.value(), 0.0);
        }

        lfo.process();
        assert!(lfo.value() > 0.0);
    }

    #[test]
    fn test_triangle_shape() {
        let sample_rate = 25_600;
        let mut lfo = Lfo::new(sample_rate, 64);
        // 1 Hz: one period = 400 blocks of 64 samples
        lfo.start(0.0, 1.0);

        let mut values = Vec::new();
        for _ in 0..400 {
            lfo.process();
            values.push(lfo.value());
        }

        // Peak at a quarter period, zero crossing at half, trough at three
        // quarters
        assert!((values[99] - 1.0).abs() < 0.05, "peak: {}", values[99]);
        assert!(values[199].abs() < 0.05, "mid crossing: {}", values[199]);
        assert!((values[299] + 1.0).abs() < 0.05, "trough: {}", values[299]);

        for value in &values {
            assert!((-1.0..=1.0).contains(value), "value out of range: {}", value);
        }
    }

    #[test]
    fn test_rising_from_zero() {
        let mut lfo = Lfo::new(22_050, 64);
        lfo.start(0.0, 2.0);

        lfo.process();
        let first = lfo.value();
        lfo.process();
        let second = lfo.value();

        assert!(first > 0.0);
        assert!(second > first);
    }
}
