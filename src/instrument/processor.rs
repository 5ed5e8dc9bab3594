//! Audio-side instrument state: a fixed voice pool, voice stealing, and the
//! per-sample rendering loop. Lives entirely on the realtime thread.

use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::control::{Control, ControlId, NoteControlId};
use crate::dsp::biquad::FilterType;
use crate::dsp::envelope::AdsrParams;
use crate::message::NoteOnParams;
use crate::slice::{SliceHandle, SlicePool};
use crate::voice::{InstrumentVoiceSettings, NoteParams, OscMode, SliceMode, Voice};

pub const MAX_VOICES: usize = 32;

/// Snapshot of the instrument's current control values, taken once so it can
/// be applied to a voice without needing to borrow the instrument again.
struct VoiceParamTargets {
    gain: f32,
    osc_mix: f32,
    osc_shape: f32,
    osc_skew: f32,
    osc_noise_mix: f32,
    stereo_pan: f32,
    bit_crusher_range: f32,
    bit_crusher_increment: f32,
    distortion_mix: f32,
    distortion_drive: f32,
    filter_frequency: f32,
    filter_q: f32,
    delay_send: f32,
    sidechain_send: f32,
}

impl VoiceParamTargets {
    fn apply_to(&self, voice: &mut Voice) {
        let p = voice.params_mut();
        p.gain.set_target(self.gain);
        p.osc_mix.set_target(self.osc_mix);
        p.osc_shape.set_target(self.osc_shape);
        p.osc_skew.set_target(self.osc_skew);
        p.osc_noise_mix.set_target(self.osc_noise_mix);
        p.stereo_pan.set_target(self.stereo_pan);
        p.bit_crusher_range.set_target(self.bit_crusher_range);
        p.bit_crusher_increment.set_target(self.bit_crusher_increment);
        p.distortion_mix.set_target(self.distortion_mix);
        p.distortion_drive.set_target(self.distortion_drive);
        p.filter_frequency.set_target(self.filter_frequency);
        p.filter_q.set_target(self.filter_q);
        p.delay_send.set_target(self.delay_send);
        p.sidechain_send.set_target(self.sidechain_send);
    }
}

/// `440 * 2^(pitch/12)`: pitch is measured in semitones relative to A4.
fn pitch_to_frequency(pitch: f32) -> f32 {
    440.0 * 2f32.powf(pitch / 12.0)
}

pub struct InstrumentProcessor {
    sample_rate: f32,
    voices: Vec<Voice>,
    voice_count: usize,
    controls: [Control; ControlId::COUNT],
    sample_data: Option<SliceHandle>,
    slice_rng: SmallRng,
    /// `(sample_rate, root_pitch)` of the slice each voice last bound, if any —
    /// kept alongside the voice so a later `NoteControl::PitchShift` edit can
    /// recompute its playback increments without re-selecting a slice.
    voice_slice_meta: Vec<Option<(i32, f32)>>,
    /// Per-voice note pitch-shift, separate from `Voice::note_params` so it
    /// can be folded back in when recomputing increments.
    voice_note_pitch_shift: Vec<f32>,
}

fn default_controls() -> [Control; ControlId::COUNT] {
    let mut controls = [Control::new(0.0, 0.0, 0.0); ControlId::COUNT];
    for id in ControlId::ALL {
        let (default, min, max) = id.default_range();
        controls[id.index()] = Control::new(default, min, max);
    }
    controls
}

impl InstrumentProcessor {
    pub fn new(sample_rate: f32, seed: u64) -> Self {
        let voices = (0..MAX_VOICES).map(|i| Voice::new(sample_rate, seed.wrapping_add(i as u64 + 1))).collect();
        Self {
            sample_rate,
            voices,
            voice_count: 8,
            controls: default_controls(),
            sample_data: None,
            slice_rng: SmallRng::seed_from_u64(seed),
            voice_slice_meta: vec![None; MAX_VOICES],
            voice_note_pitch_shift: vec![0.0; MAX_VOICES],
        }
    }

    pub fn set_control(&mut self, id: ControlId, value: f32) -> f32 {
        let stored = self.controls[id.index()].set(value);
        if id == ControlId::VoiceCount {
            self.voice_count = (stored.round() as usize).clamp(1, MAX_VOICES);
        }
        stored
    }

    pub fn get_control(&self, id: ControlId) -> f32 {
        self.controls[id.index()].value()
    }

    pub fn set_sample_data(&mut self, handle: Option<SliceHandle>) {
        self.sample_data = handle;
    }

    fn current_voice_settings(&self) -> InstrumentVoiceSettings {
        InstrumentVoiceSettings {
            osc_mode: OscMode::from_control(self.get_control(ControlId::OscMode)),
            slice_mode: SliceMode::from_control(self.get_control(ControlId::SliceMode)),
            filter_type: FilterType::from_control(self.get_control(ControlId::FilterType)),
            adsr: AdsrParams {
                attack_seconds: self.get_control(ControlId::Attack),
                decay_seconds: self.get_control(ControlId::Decay),
                sustain: self.get_control(ControlId::Sustain),
                release_seconds: self.get_control(ControlId::Release),
                sample_rate: self.sample_rate,
            },
        }
    }

    fn note_params(&self, pitch: f32, note_gain: f32, note_pitch_shift: f32, slice_sample_rate: Option<i32>, slice_root_pitch: Option<f32>) -> NoteParams {
        let effective_pitch = pitch + self.get_control(ControlId::PitchShift) + self.get_control(ControlId::OscPitchShift) + note_pitch_shift;
        let osc_increment = pitch_to_frequency(effective_pitch) / self.sample_rate;
        let slice_increment = match (slice_sample_rate, slice_root_pitch) {
            (Some(sr), Some(root)) => {
                let rate_ratio = sr as f64 / self.sample_rate as f64;
                let pitch_ratio = 2f64.powf((effective_pitch - root) as f64 / 12.0);
                rate_ratio * pitch_ratio
            }
            _ => 0.0,
        };
        NoteParams { gain: note_gain, osc_increment, slice_increment }
    }

    fn voice_param_targets(&self) -> VoiceParamTargets {
        VoiceParamTargets {
            gain: self.get_control(ControlId::Gain),
            osc_mix: self.get_control(ControlId::OscMix),
            osc_shape: self.get_control(ControlId::OscShape),
            osc_skew: self.get_control(ControlId::OscSkew),
            osc_noise_mix: self.get_control(ControlId::OscNoiseMix),
            stereo_pan: self.get_control(ControlId::StereoPan),
            bit_crusher_range: crate::dsp::bitcrusher::range_from_depth(self.get_control(ControlId::BitCrusherDepth)),
            bit_crusher_increment: crate::dsp::bitcrusher::increment_from_rate(self.get_control(ControlId::BitCrusherRate)),
            distortion_mix: self.get_control(ControlId::DistortionMix),
            distortion_drive: crate::dsp::distortion::drive_from_control(self.get_control(ControlId::DistortionDrive)),
            filter_frequency: self.get_control(ControlId::FilterFrequency),
            filter_q: self.get_control(ControlId::FilterQ),
            delay_send: self.get_control(ControlId::DelaySend),
            sidechain_send: self.get_control(ControlId::SidechainSend),
        }
    }

    /// Linear scan over the fixed voice pool for the active voice sounding
    /// `pitch`, if any — no allocation, and nothing to prune on note-off
    /// since there is no side table to go stale.
    fn voice_for_pitch(&self, pitch: f32) -> Option<usize> {
        self.voices.iter().position(|v| v.on && v.pitch == pitch)
    }

    /// Acquires a voice for `pitch` per §4.6: retrigger-reuse, then
    /// first-free, then steal-oldest. Returns the acquired voice's index.
    fn acquire_voice(&mut self, pitch: f32) -> usize {
        let retrigger = self.get_control(ControlId::Retrigger) > 0.5;

        let acquired = if retrigger { self.voice_for_pitch(pitch) } else { None };

        let index = acquired.unwrap_or_else(|| {
            let active_count = self.voices.iter().filter(|v| v.on).count();
            if active_count < self.voice_count {
                self.voices.iter().position(|v| !v.on).expect("an inactive slot must exist")
            } else {
                self.voices
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| v.on)
                    .max_by_key(|(_, v)| v.age)
                    .map(|(i, _)| i)
                    .unwrap_or(0)
            }
        });

        for (i, voice) in self.voices.iter_mut().enumerate() {
            if i == index {
                voice.age = 0;
            } else {
                voice.age = voice.age.saturating_add(1);
            }
        }
        index
    }

    pub fn note_on(&mut self, pitch: f32, params: NoteOnParams, slice_pool: &SlicePool) {
        let retrigger = self.get_control(ControlId::Retrigger) > 0.5;
        let index = self.acquire_voice(pitch);
        let was_reuse = retrigger && self.voices[index].on && self.voices[index].pitch == pitch;

        let selected = self.sample_data.and_then(|h| slice_pool.select_slice(h, pitch, &mut self.slice_rng));
        let note = self.note_params(pitch, params.gain, params.pitch_shift, selected.map(|s| s.sample_rate), selected.map(|s| s.root_pitch));
        let slice_samples = selected.map(|s| s.samples.clone());

        self.apply_voice_params_targets_at(index);
        if was_reuse {
            self.voices[index].retrigger(note);
        } else {
            self.voices[index].start(pitch, note, slice_samples);
        }
        self.voice_slice_meta[index] = selected.map(|s| (s.sample_rate, s.root_pitch));
        self.voice_note_pitch_shift[index] = params.pitch_shift;
    }

    fn apply_voice_params_targets_at(&mut self, index: usize) {
        let settings = self.current_voice_settings();
        let targets = self.voice_param_targets();
        let voice = &mut self.voices[index];
        voice.set_settings(settings);
        targets.apply_to(voice);
    }

    pub fn note_off(&mut self, pitch: f32) {
        if let Some(index) = self.voice_for_pitch(pitch) {
            self.voices[index].stop();
        }
    }

    pub fn set_note_control(&mut self, pitch: f32, id: NoteControlId, value: f32) {
        let (_, min, max) = id.default_range();
        let clamped = value.clamp(min, max);
        let Some(index) = self.voice_for_pitch(pitch) else { return };
        let mut note = self.voices[index].note_params();
        match id {
            NoteControlId::Gain => {
                note.gain = clamped;
            }
            NoteControlId::PitchShift => {
                self.voice_note_pitch_shift[index] = clamped;
                let meta = self.voice_slice_meta[index];
                let recomputed = self.note_params(pitch, note.gain, clamped, meta.map(|m| m.0), meta.map(|m| m.1));
                note = recomputed;
            }
        }
        self.voices[index].set_note_params(note);
    }

    /// Renders one audio frame across all active voices, summing into
    /// `(output, delay_send, sidechain_send)`.
    pub fn next_frame(&mut self) -> ([f32; 2], [f32; 2], [f32; 2]) {
        let mut output = [0.0f32; 2];
        let mut delay_send = [0.0f32; 2];
        let mut sidechain_send = [0.0f32; 2];
        for voice in &mut self.voices {
            if voice.on {
                let (o, d, s) = voice.next_frame();
                output[0] += o[0];
                output[1] += o[1];
                delay_send[0] += d[0];
                delay_send[1] += d[1];
                sidechain_send[0] += s[0];
                sidechain_send[1] += s[1];
            }
        }
        (output, delay_send, sidechain_send)
    }

    pub fn is_note_on(&self, pitch: f32) -> bool {
        self.voice_for_pitch(pitch).is_some()
    }
}
