//! The mix bus: sidechain ducking, a shared delay line, and a peak
//! compressor, applied to the sum of every instrument's per-frame output.
//!
//! Lives entirely on the audio thread.

use crate::control::{Control, EngineControlId};
use crate::dsp::compressor::{Compressor, CompressorParams};
use crate::dsp::delay_line::DelayLine;
use crate::dsp::one_pole::coefficient_from_time;
use crate::dsp::sidechain::{Sidechain, SidechainParams};
use crate::dsp::approach;

struct Ramp {
    current: f32,
    target: f32,
}

impl Ramp {
    fn new(value: f32) -> Self {
        Self { current: value, target: value }
    }

    fn set_target(&mut self, target: f32) {
        self.target = target;
    }

    fn step(&mut self) -> f32 {
        self.current = approach(self.current, self.target);
        self.current
    }

    fn snap(&mut self) {
        self.current = self.target;
    }
}

struct EngineRamps {
    delay_mix: Ramp,
    delay_time: Ramp,
    delay_feedback: Ramp,
    delay_low_pass_frequency: Ramp,
    delay_high_pass_frequency: Ramp,
    compressor_threshold: Ramp,
    compressor_ratio: Ramp,
    compressor_attack: Ramp,
    compressor_release: Ramp,
    compressor_mix: Ramp,
    sidechain_threshold: Ramp,
    sidechain_ratio: Ramp,
    sidechain_attack: Ramp,
    sidechain_release: Ramp,
    sidechain_mix: Ramp,
}

fn default_controls() -> [Control; EngineControlId::COUNT] {
    let mut controls = [Control::new(0.0, 0.0, 0.0); EngineControlId::COUNT];
    for id in EngineControlId::ALL {
        let (default, min, max) = id.default_range();
        controls[id.index()] = Control::new(default, min, max);
    }
    controls
}

fn ramps_from_controls(controls: &[Control; EngineControlId::COUNT]) -> EngineRamps {
    let v = |id: EngineControlId| controls[id.index()].value();
    EngineRamps {
        delay_mix: Ramp::new(v(EngineControlId::DelayMix)),
        delay_time: Ramp::new(v(EngineControlId::DelayTime)),
        delay_feedback: Ramp::new(v(EngineControlId::DelayFeedback)),
        delay_low_pass_frequency: Ramp::new(v(EngineControlId::DelayLowPassFrequency)),
        delay_high_pass_frequency: Ramp::new(v(EngineControlId::DelayHighPassFrequency)),
        compressor_threshold: Ramp::new(v(EngineControlId::CompressorThreshold)),
        compressor_ratio: Ramp::new(v(EngineControlId::CompressorRatio)),
        compressor_attack: Ramp::new(v(EngineControlId::CompressorAttack)),
        compressor_release: Ramp::new(v(EngineControlId::CompressorRelease)),
        compressor_mix: Ramp::new(v(EngineControlId::CompressorMix)),
        sidechain_threshold: Ramp::new(v(EngineControlId::SidechainThreshold)),
        sidechain_ratio: Ramp::new(v(EngineControlId::SidechainRatio)),
        sidechain_attack: Ramp::new(v(EngineControlId::SidechainAttack)),
        sidechain_release: Ramp::new(v(EngineControlId::SidechainRelease)),
        sidechain_mix: Ramp::new(v(EngineControlId::SidechainMix)),
    }
}

/// Shared stereo delay + compressor + sidechain-duck mix bus.
pub struct EngineProcessor {
    sample_rate: f32,
    controls: [Control; EngineControlId::COUNT],
    ramps: EngineRamps,
    delay: DelayLine,
    compressor: Compressor,
    sidechain: Sidechain,
}

/// One instrument's contribution for a frame, gathered by the caller before
/// handing it to [`EngineProcessor::mix_frame`].
#[derive(Clone, Copy, Default)]
pub struct InstrumentContribution {
    pub output: [f32; 2],
    pub delay_send: [f32; 2],
    pub sidechain_send: [f32; 2],
}

const MAX_DELAY_SECONDS: f32 = 2.5;

impl EngineProcessor {
    pub fn new(sample_rate: f32) -> Self {
        let controls = default_controls();
        let ramps = ramps_from_controls(&controls);
        let max_delay_frames = (sample_rate * MAX_DELAY_SECONDS).ceil() as usize;
        Self { sample_rate, controls, ramps, delay: DelayLine::new(max_delay_frames.max(1)), compressor: Compressor::new(), sidechain: Sidechain::new() }
    }

    pub fn set_control(&mut self, id: EngineControlId, value: f32) -> f32 {
        let stored = self.controls[id.index()].set(value);
        self.ramp_target_mut(id).set_target(stored);
        stored
    }

    pub fn get_control(&self, id: EngineControlId) -> f32 {
        self.controls[id.index()].value()
    }

    fn ramp_target_mut(&mut self, id: EngineControlId) -> &mut Ramp {
        use EngineControlId::*;
        match id {
            DelayMix => &mut self.ramps.delay_mix,
            DelayTime => &mut self.ramps.delay_time,
            DelayFeedback => &mut self.ramps.delay_feedback,
            DelayLowPassFrequency => &mut self.ramps.delay_low_pass_frequency,
            DelayHighPassFrequency => &mut self.ramps.delay_high_pass_frequency,
            CompressorThreshold => &mut self.ramps.compressor_threshold,
            CompressorRatio => &mut self.ramps.compressor_ratio,
            CompressorAttack => &mut self.ramps.compressor_attack,
            CompressorRelease => &mut self.ramps.compressor_release,
            CompressorMix => &mut self.ramps.compressor_mix,
            SidechainThreshold => &mut self.ramps.sidechain_threshold,
            SidechainRatio => &mut self.ramps.sidechain_ratio,
            SidechainAttack => &mut self.ramps.sidechain_attack,
            SidechainRelease => &mut self.ramps.sidechain_release,
            SidechainMix => &mut self.ramps.sidechain_mix,
        }
    }

    /// Applies sidechain duck, delay, and compressor to the summed
    /// contributions of every instrument for this frame, per §4.9.
    pub fn mix_frame(&mut self, contributions: &[InstrumentContribution]) -> [f32; 2] {
        let mut output = [0.0f32; 2];
        let mut sidechain_bus = [0.0f32; 2];
        for c in contributions {
            output[0] += c.output[0];
            output[1] += c.output[1];
            sidechain_bus[0] += c.sidechain_send[0];
            sidechain_bus[1] += c.sidechain_send[1];
        }

        let sidechain_threshold = self.ramps.sidechain_threshold.step();
        let sidechain_ratio = self.ramps.sidechain_ratio.step();
        let sidechain_attack = self.ramps.sidechain_attack.step();
        let sidechain_release = self.ramps.sidechain_release.step();
        let sidechain_mix = self.ramps.sidechain_mix.step();
        let sidechain_peak = sidechain_bus[0].abs().max(sidechain_bus[1].abs());
        let duck_gain = self.sidechain.next(
            sidechain_peak,
            &SidechainParams { threshold_db: sidechain_threshold, ratio: sidechain_ratio, mix: sidechain_mix, attack_seconds: sidechain_attack, release_seconds: sidechain_release },
            self.sample_rate,
        );
        output[0] *= duck_gain;
        output[1] *= duck_gain;

        let mut delay_send = [0.0f32; 2];
        for c in contributions {
            delay_send[0] += c.delay_send[0];
            delay_send[1] += c.delay_send[1];
        }
        let delay_mix = self.ramps.delay_mix.step();
        let delay_time_seconds = self.ramps.delay_time.step();
        let delay_feedback = self.ramps.delay_feedback.step();
        let delay_lp_frequency = self.ramps.delay_low_pass_frequency.step();
        let delay_hp_frequency = self.ramps.delay_high_pass_frequency.step();
        let delay_frames = (delay_time_seconds * self.sample_rate).max(0.0);
        let lp_coefficient = coefficient_from_time(1.0 / delay_lp_frequency.max(1.0), self.sample_rate);
        let hp_coefficient = coefficient_from_time(1.0 / delay_hp_frequency.max(1.0), self.sample_rate);
        let delay_read = self.delay.process_frame(delay_send, delay_frames, delay_feedback, lp_coefficient, hp_coefficient);
        output[0] += delay_mix * delay_read[0];
        output[1] += delay_mix * delay_read[1];

        let compressor_threshold = self.ramps.compressor_threshold.step();
        let compressor_ratio = self.ramps.compressor_ratio.step();
        let compressor_attack = self.ramps.compressor_attack.step();
        let compressor_release = self.ramps.compressor_release.step();
        let compressor_mix = self.ramps.compressor_mix.step();
        let output_peak = output[0].abs().max(output[1].abs());
        let compressor_gain = self.compressor.next(
            output_peak,
            &CompressorParams { threshold_db: compressor_threshold, ratio: compressor_ratio, mix: compressor_mix, attack_seconds: compressor_attack, release_seconds: compressor_release },
            self.sample_rate,
        );
        output[0] *= compressor_gain;
        output[1] *= compressor_gain;

        output
    }

    pub fn reset(&mut self) {
        self.delay.reset();
        self.compressor.reset();
        self.sidechain.reset();
        self.ramps = ramps_from_controls(&self.controls);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_in_yields_silence_out_once_settled() {
        let mut engine = EngineProcessor::new(48_000.0);
        let contributions = vec![InstrumentContribution::default()];
        let mut out = [0.0, 0.0];
        for _ in 0..4_000 {
            out = engine.mix_frame(&contributions);
        }
        assert!(out[0].abs() < 1e-4 && out[1].abs() < 1e-4);
    }

    #[test]
    fn sidechain_ducks_other_instrument() {
        let mut engine = EngineProcessor::new(48_000.0);
        engine.set_control(EngineControlId::SidechainThreshold, -30.0);
        engine.set_control(EngineControlId::SidechainRatio, 4.0);
        engine.set_control(EngineControlId::SidechainMix, 1.0);
        engine.set_control(EngineControlId::DelayMix, 0.0);
        engine.set_control(EngineControlId::CompressorMix, 0.0);

        let loud_sidechain = InstrumentContribution { output: [0.0, 0.0], delay_send: [0.0, 0.0], sidechain_send: [1.0, 1.0] };
        let ducked = InstrumentContribution { output: [0.5, 0.5], delay_send: [0.0, 0.0], sidechain_send: [0.0, 0.0] };
        let mut out = [0.0, 0.0];
        for _ in 0..20_000 {
            out = engine.mix_frame(&[loud_sidechain, ducked]);
        }
        assert!(out[0] < 0.5, "expected ducking once settled, got {out:?}");
    }
}
