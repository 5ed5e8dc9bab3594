//! Peak-follower compressor with asymmetric attack/release smoothing and a
//! soft-threshold gain reduction computed in the dB domain.

use super::decibels::{amplitude_to_db, db_to_amplitude};
use super::one_pole::coefficient_from_time;

#[derive(Debug, Clone, Copy)]
pub struct CompressorParams {
    pub threshold_db: f32,
    pub ratio: f32,
    pub mix: f32,
    pub attack_seconds: f32,
    pub release_seconds: f32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Compressor {
    envelope_db: f32,
}

impl Compressor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.envelope_db = -120.0;
    }

    /// `input` is a single stereo-summed peak-detector feed (max abs across channels).
    pub fn next(&mut self, peak_abs: f32, params: &CompressorParams, sample_rate: f32) -> f32 {
        let input_db = amplitude_to_db(peak_abs);
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
        let wet_gain = db_to_amplitude(-reduction_db);
        1.0 + (wet_gain - 1.0) * params.mix.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn below_threshold_passes_unity_gain() {
        let mut comp = Compressor::new();
        comp.reset();
        let params = CompressorParams { threshold_db: -6.0, ratio: 4.0, mix: 1.0, attack_seconds: 0.001, release_seconds: 0.05 };
        let mut gain = 1.0;
        for _ in 0..10_000 {
            gain = comp.next(0.01, &params, 48_000.0);
        }
        assert!((gain - 1.0).abs() < 0.05);
    }

    #[test]
    fn above_threshold_reduces_gain() {
        let mut comp = Compressor::new();
        comp.reset();
        let params = CompressorParams { threshold_db: -12.0, ratio: 4.0, mix: 1.0, attack_seconds: 0.001, release_seconds: 0.05 };
        let mut gain = 1.0;
        for _ in 0..10_000 {
            gain = comp.next(1.0, &params, 48_000.0);
        }
        assert!(gain < 1.0);
    }
}
