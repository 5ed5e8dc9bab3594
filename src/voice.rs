//! A single polyphonic voice: oscillator + sample-slice cursor + envelope +
//! biquad + bit-crusher + distortion, combined per [`OscMode`].

use std::sync::Arc;

use crate::dsp::biquad::{Biquad, BiquadCoefficients, FilterType};
use crate::dsp::bitcrusher::BitCrusher;
use crate::dsp::envelope::{AdsrParams, Envelope};
use crate::dsp::{approach, distortion};
use crate::oscillator::Oscillator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OscMode {
    Mix,
    Am,
    Ring,
    Fm,
    Mf,
    EnvelopeFollower,
}

impl OscMode {
    pub fn from_control(v: f32) -> Self {
        match v.round() as i32 {
            1 => OscMode::Am,
            2 => OscMode::Ring,
            3 => OscMode::Fm,
            4 => OscMode::Mf,
            5 => OscMode::EnvelopeFollower,
            _ => OscMode::Mix,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceMode {
    Sustain,
    Loop,
    Once,
}

impl SliceMode {
    pub fn from_control(v: f32) -> Self {
        match v.round() as i32 {
            1 => SliceMode::Loop,
            2 => SliceMode::Once,
            _ => SliceMode::Sustain,
        }
    }
}

/// A pair of `(current, target)` that exponentially approaches its target by
/// one step per sample — the single smoothing channel the source's
/// "set-control + slope" double channel collapses into.
#[derive(Debug, Clone, Copy)]
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

    fn snap(&mut self, value: f32) {
        self.current = value;
        self.target = value;
    }
}

/// Smoothed voice-level parameters, set from control messages and ramped once per sample.
#[derive(Debug, Clone, Copy)]
pub struct VoiceParams {
    pub gain: Ramp,
    pub osc_mix: Ramp,
    pub osc_shape: Ramp,
    pub osc_skew: Ramp,
    pub osc_noise_mix: Ramp,
    pub stereo_pan: Ramp,
    pub bit_crusher_range: Ramp,
    pub bit_crusher_increment: Ramp,
    pub distortion_mix: Ramp,
    pub distortion_drive: Ramp,
    pub filter_frequency: Ramp,
    pub filter_q: Ramp,
    pub delay_send: Ramp,
    pub sidechain_send: Ramp,
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self {
            gain: Ramp::new(1.0),
            osc_mix: Ramp::new(0.0),
            osc_shape: Ramp::new(0.0),
            osc_skew: Ramp::new(0.0),
            osc_noise_mix: Ramp::new(0.0),
            stereo_pan: Ramp::new(0.0),
            bit_crusher_range: Ramp::new(2f32.powf(15.0)),
            bit_crusher_increment: Ramp::new(1.0),
            distortion_mix: Ramp::new(0.0),
            distortion_drive: Ramp::new(1.0),
            filter_frequency: Ramp::new(8_000.0),
            filter_q: Ramp::new(0.707),
            delay_send: Ramp::new(0.0),
            sidechain_send: Ramp::new(0.0),
        }
    }
}

impl VoiceParams {
    fn step_all(&mut self) {
        self.gain.step();
        self.osc_mix.step();
        self.osc_shape.step();
        self.osc_skew.step();
        self.osc_noise_mix.step();
        self.stereo_pan.step();
        self.bit_crusher_range.step();
        self.bit_crusher_increment.step();
        self.distortion_mix.step();
        self.distortion_drive.step();
        self.filter_frequency.step();
        self.filter_q.step();
        self.delay_send.step();
        self.sidechain_send.step();
    }
}

/// Per-note derived playback rates, fixed for the life of the note.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoteParams {
    pub gain: f32,
    pub osc_increment: f32,
    pub slice_increment: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct InstrumentVoiceSettings {
    pub osc_mode: OscMode,
    pub slice_mode: SliceMode,
    pub filter_type: FilterType,
    pub adsr: AdsrParams,
}

pub struct Voice {
    pub on: bool,
    pub pitch: f32,
    pub age: u64,
    osc: Oscillator,
    biquad: Biquad,
    bitcrusher: BitCrusher,
    envelope: Envelope,
    params: VoiceParams,
    note: NoteParams,
    settings: InstrumentVoiceSettings,
    slice: Option<Arc<[f32]>>,
    slice_offset: f64,
    sample_rate: f32,
}

impl Voice {
    pub fn new(sample_rate: f32, seed: u64) -> Self {
        Self {
            on: false,
            pitch: 0.0,
            age: 0,
            osc: Oscillator::new(seed),
            biquad: Biquad::new(),
            bitcrusher: BitCrusher::new(),
            envelope: Envelope::new(sample_rate),
            params: VoiceParams::default(),
            note: NoteParams::default(),
            settings: InstrumentVoiceSettings {
                osc_mode: OscMode::Mix,
                slice_mode: SliceMode::Sustain,
                filter_type: FilterType::None,
                adsr: AdsrParams { attack_seconds: 0.0, decay_seconds: 0.0, sustain: 1.0, release_seconds: 0.0, sample_rate },
            },
            slice: None,
            slice_offset: 0.0,
            sample_rate,
        }
    }

    pub fn is_active(&self) -> bool {
        self.envelope.is_active()
    }

    pub fn params_mut(&mut self) -> &mut VoiceParams {
        &mut self.params
    }

    pub fn set_settings(&mut self, settings: InstrumentVoiceSettings) {
        self.settings = settings;
    }

    /// Updates note-level playback parameters (gain/pitch) without
    /// restarting the envelope or any DSP state — used by `NoteControl` edits.
    pub fn set_note_params(&mut self, note: NoteParams) {
        self.note = note;
    }

    pub fn note_params(&self) -> NoteParams {
        self.note
    }

    /// Acquires the voice for a fresh note, resetting per-sample DSP state.
    pub fn start(&mut self, pitch: f32, note: NoteParams, slice: Option<Arc<[f32]>>) {
        self.on = true;
        self.pitch = pitch;
        self.age = 0;
        self.note = note;
        self.slice = slice;
        self.slice_offset = 0.0;
        self.osc.reset();
        self.biquad.reset();
        self.bitcrusher.reset();
        self.envelope.start(self.settings.adsr);
    }

    /// Re-triggers an already-sounding voice (retrigger mode) without resetting FX state.
    pub fn retrigger(&mut self, note: NoteParams) {
        self.age = 0;
        self.note = note;
        self.slice_offset = 0.0;
        self.envelope.start(self.settings.adsr);
    }

    pub fn stop(&mut self) {
        if self.settings.slice_mode != SliceMode::Once {
            self.envelope.stop();
        }
    }

    fn slice_sample(&self) -> f32 {
        let Some(slice) = &self.slice else { return 0.0 };
        if self.slice_offset < 0.0 {
            return 0.0;
        }
        let i0 = self.slice_offset.floor() as usize;
        if i0 >= slice.len() {
            return 0.0;
        }
        if i0 + 1 >= slice.len() {
            return slice[i0];
        }
        let frac = (self.slice_offset - i0 as f64) as f32;
        slice[i0] + (slice[i0 + 1] - slice[i0]) * frac
    }

    fn advance_slice_offset(&mut self) {
        let Some(slice) = &self.slice else { return };
        let len = slice.len() as f64;
        self.slice_offset += self.note.slice_increment;
        match self.settings.slice_mode {
            SliceMode::Sustain => {
                if self.slice_offset > len - 1.0 {
                    self.slice_offset = len - 1.0;
                }
            }
            SliceMode::Loop => {
                if len > 0.0 {
                    self.slice_offset = self.slice_offset.rem_euclid(len);
                }
            }
            SliceMode::Once => {
                if self.slice_offset > len - 1.0 {
                    self.on = false;
                    self.envelope.reset();
                }
            }
        }
    }

    /// Produces one stereo sample and advances all per-sample state.
    /// Returns `(output, delay_send, sidechain_send)`, each `[left, right]`.
    pub fn next_frame(&mut self) -> ([f32; 2], [f32; 2], [f32; 2]) {
        if !self.on || !self.envelope.is_active() {
            return ([0.0; 2], [0.0; 2], [0.0; 2]);
        }

        let osc_increment = self.note.osc_increment;
        let osc_sample = self.osc.sample(self.params.osc_shape.current, self.params.osc_skew.current, self.params.osc_noise_mix.current);
        let slice_sample = self.slice_sample();

        let osc_mix = self.params.osc_mix.current;
        let osc_output = osc_mix * osc_sample;
        let slice_output = (1.0 - osc_mix) * slice_sample;

        let combined = match self.settings.osc_mode {
            OscMode::Mix => osc_output + slice_output,
            OscMode::Am => osc_output.abs() * slice_sample + slice_output,
            OscMode::Ring => osc_output * slice_sample + slice_output,
            OscMode::Fm => {
                self.osc.advance(osc_increment * (1.0 + slice_sample));
                slice_sample
            }
            OscMode::Mf => {
                self.osc.advance(osc_increment * (1.0 + slice_sample));
                osc_output + slice_output
            }
            OscMode::EnvelopeFollower => osc_output * slice_sample.abs() + slice_output,
        };

        if !matches!(self.settings.osc_mode, OscMode::Fm | OscMode::Mf) {
            self.osc.advance(osc_increment);
        }

        let envelope_gain = self.envelope.next();
        let mut sample = combined * envelope_gain * self.note.gain * self.params.gain.current;
        self.advance_slice_offset();

        let coefficients = BiquadCoefficients::from_type(self.settings.filter_type, self.sample_rate, self.params.filter_frequency.current, self.params.filter_q.current);
        sample = self.biquad.next(sample, &coefficients);
        sample = self.bitcrusher.next(sample, self.params.bit_crusher_range.current, self.params.bit_crusher_increment.current);
        sample = distortion::next(sample, self.params.distortion_drive.current, self.params.distortion_mix.current);

        let pan = self.params.stereo_pan.current.clamp(-1.0, 1.0);
        let angle = (pan + 1.0) * std::f32::consts::FRAC_PI_4;
        let left_gain = angle.cos();
        let right_gain = angle.sin();
        let output = [sample * left_gain, sample * right_gain];
        let delay_send = [output[0] * self.params.delay_send.current, output[1] * self.params.delay_send.current];
        let sidechain_send = [output[0] * self.params.sidechain_send.current, output[1] * self.params.sidechain_send.current];

        self.params.step_all();
        if !self.envelope.is_active() {
            self.on = false;
        }
        (output, delay_send, sidechain_send)
    }

    pub fn snap_params_for_test(&mut self) {
        // Test helper: skip the 0.002-per-sample ramp so unit tests don't
        // need thousands of warm-up frames to reach a target value.
        let p = &mut self.params;
        p.gain.snap(p.gain.target);
        p.osc_mix.snap(p.osc_mix.target);
        p.osc_shape.snap(p.osc_shape.target);
        p.osc_skew.snap(p.osc_skew.target);
        p.osc_noise_mix.snap(p.osc_noise_mix.target);
        p.stereo_pan.snap(p.stereo_pan.target);
        p.bit_crusher_range.snap(p.bit_crusher_range.target);
        p.bit_crusher_increment.snap(p.bit_crusher_increment.target);
        p.distortion_mix.snap(p.distortion_mix.target);
        p.distortion_drive.snap(p.distortion_drive.target);
        p.filter_frequency.snap(p.filter_frequency.target);
        p.filter_q.snap(p.filter_q.target);
        p.delay_send.snap(p.delay_send.target);
        p.sidechain_send.snap(p.sidechain_send.target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn once_mode_freezes_off_past_slice_end() {
        let mut voice = Voice::new(4.0, 1);
        voice.set_settings(InstrumentVoiceSettings {
            osc_mode: OscMode::Mix,
            slice_mode: SliceMode::Once,
            filter_type: FilterType::None,
            adsr: AdsrParams { attack_seconds: 0.0, decay_seconds: 0.0, sustain: 1.0, release_seconds: 0.0, sample_rate: 4.0 },
        });
        voice.params_mut().osc_mix.snap(0.0); // osc_mix=0 plays the slice at full weight, matching scenario 4 (§8)
        voice.params_mut().gain.snap(1.0);
        voice.params_mut().bit_crusher_range.snap(0.0);
        voice.params_mut().stereo_pan.snap(-1.0); // hard left so left_gain == 1.0 for exact-value checks below
        let slice: Arc<[f32]> = Arc::from(vec![0.1f32, 0.2, 0.3, 0.4]);
        voice.start(0.0, NoteParams { gain: 1.0, osc_increment: 0.0, slice_increment: 1.0 }, Some(slice));
        voice.snap_params_for_test();

        let mut outputs = Vec::new();
        for _ in 0..5 {
            let (out, _, _) = voice.next_frame();
            outputs.push(out[0]);
        }
        assert!((outputs[0] - 0.1).abs() < 1e-5);
        assert!((outputs[3] - 0.4).abs() < 1e-5);
        assert_eq!(outputs[4], 0.0);
        assert!(!voice.is_active());
    }
}
