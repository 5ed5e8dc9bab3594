//! Shape-interpolated oscillator: sine → triangle → square → sawtooth over
//! `shape ∈ [0, 1]`, with a phase skew and a uniform-noise mix.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::TAU;

fn sine(phase: f32) -> f32 {
    (phase * TAU).sin()
}

fn triangle(phase: f32) -> f32 {
    4.0 * (phase - 0.5).abs() - 1.0
}

fn square(phase: f32) -> f32 {
    if phase < 0.5 {
        1.0
    } else {
        -1.0
    }
}

fn sawtooth(phase: f32) -> f32 {
    2.0 * phase - 1.0
}

/// Interpolates sine→triangle→square→sawtooth across three equal thirds of `shape`.
fn waveform(phase: f32, shape: f32) -> f32 {
    let shape = shape.clamp(0.0, 1.0);
    let (a, b, t) = if shape < 1.0 / 3.0 {
        (sine(phase), triangle(phase), shape * 3.0)
    } else if shape < 2.0 / 3.0 {
        (triangle(phase), square(phase), (shape - 1.0 / 3.0) * 3.0)
    } else {
        (square(phase), sawtooth(phase), (shape - 2.0 / 3.0) * 3.0)
    };
    a + (b - a) * t
}

/// Warps `phase` before wave lookup; `skew ∈ [-0.5, 0.5]` biases the waveform
/// toward its start (positive) or end (negative) without changing its period.
fn skew_phase(phase: f32, skew: f32) -> f32 {
    let exponent = (1.0 + 2.0 * skew.clamp(-0.5, 0.5)).max(0.05);
    phase.clamp(0.0, 1.0).powf(exponent)
}

pub struct Oscillator {
    phase: f32,
    rng: SmallRng,
}

impl Oscillator {
    pub fn new(seed: u64) -> Self {
        Self { phase: 0.0, rng: SmallRng::seed_from_u64(seed) }
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    pub fn phase(&self) -> f32 {
        self.phase
    }

    pub fn set_phase(&mut self, phase: f32) {
        self.phase = phase.rem_euclid(1.0);
    }

    /// Produces one sample; leaves phase advance to the caller, since voices
    /// sometimes need to modulate the increment before advancing (see
    /// `OscMode::Fm`/`Mf`).
    pub fn sample(&mut self, shape: f32, skew: f32, noise_mix: f32) -> f32 {
        let warped = skew_phase(self.phase, skew);
        let wave = waveform(warped, shape);
        let noise_mix = noise_mix.clamp(0.0, 1.0);
        if noise_mix <= 0.0 {
            return wave;
        }
        let noise = self.rng.gen_range(-1.0f32..=1.0);
        wave + (noise - wave) * noise_mix
    }

    pub fn advance(&mut self, increment: f32) {
        self.phase = (self.phase + increment).rem_euclid(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_zero_is_sine() {
        let phase = 0.2f32;
        assert!((waveform(phase, 0.0) - sine(phase)).abs() < 1e-6);
    }

    #[test]
    fn shape_one_is_sawtooth() {
        let phase = 0.6f32;
        assert!((waveform(phase, 1.0) - sawtooth(phase)).abs() < 1e-6);
    }

    #[test]
    fn phase_wraps() {
        let mut osc = Oscillator::new(1);
        osc.set_phase(0.9);
        osc.advance(0.5);
        assert!(osc.phase() < 0.5);
    }
}
