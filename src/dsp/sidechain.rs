//! Sidechain ducking: a peak-follower on a designated bus produces a gain
//! multiplier (in the dB domain) applied to the main mix.

use super::decibels::{amplitude_to_db, db_to_amplitude};
use super::one_pole::coefficient_from_time;

#[derive(Debug, Clone, Copy)]
pub struct SidechainParams {
    pub threshold_db: f32,
    pub ratio: f32,
    pub mix: f32,
    pub attack_seconds: f32,
    pub release_seconds: f32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Sidechain {
    envelope_db: f32,
}

impl Sidechain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.envelope_db = -120.0;
    }

    /// Returns the duck gain multiplier to apply to the main bus this sample.
    pub fn next(&mut self, sidechain_peak_abs: f32, params: &SidechainParams, sample_rate: f32) -> f32 {
        let input_db = amplitude_to_db(sidechain_peak_abs);
        let coefficient = if input_db > self.envelope_db {
            coefficient_from_time(params.attack_seconds, sample_rate)
        } else {
            coefficient_from_time(params.release_seconds, sample_rate)
        };
        self.envelope_db = input_db + coefficient * (self.envelope_db - input_db);

        let reduction_db = if self.envelope_db > params.threshold_db && params.ratio > 1.0 {
            (self.envelope_db - params.threshold_db) * (1.0 - 1.0 / params.ratio)
        } else {
            0.0
        };
        let duck_gain = db_to_amplitude(-reduction_db);
        1.0 + (duck_gain - 1.0) * params.mix.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loud_sidechain_ducks_main_bus() {
        let mut sidechain = Sidechain::new();
        sidechain.reset();
        let params = SidechainParams { threshold_db: -18.0, ratio: 4.0, mix: 1.0, attack_seconds: 0.005, release_seconds: 0.2 };
        let mut gain = 1.0;
        for _ in 0..10_000 {
            gain = sidechain.next(1.0, &params, 48_000.0);
        }
        let expected_reduction_db = (0.0 - (-18.0)) * (1.0 - 1.0 / 4.0);
        let expected_gain = db_to_amplitude(-expected_reduction_db);
        assert!((gain - expected_gain).abs() < 0.1);
    }

    #[test]
    fn quiet_sidechain_does_not_duck() {
        let mut sidechain = Sidechain::new();
        sidechain.reset();
        let params = SidechainParams { threshold_db: -18.0, ratio: 4.0, mix: 1.0, attack_seconds: 0.005, release_seconds: 0.2 };
        let mut gain = 1.0;
        for _ in 0..10_000 {
            gain = sidechain.next(0.001, &params, 48_000.0);
        }
        assert!((gain - 1.0).abs() < 0.05);
    }
}
