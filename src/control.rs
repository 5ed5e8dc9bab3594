//! Clamped float parameters and the enumerations identifying them.

/// A float-valued parameter with a clamped range.
#[derive(Debug, Clone, Copy)]
pub struct Control {
    value: f32,
    min: f32,
    max: f32,
}

impl Control {
    pub const fn new(default: f32, min: f32, max: f32) -> Self {
        Self { value: clamp_const(default, min, max), min, max }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    /// Clamp `v` into range and store it, returning the stored value.
    pub fn set(&mut self, v: f32) -> f32 {
        self.value = v.clamp(self.min, self.max);
        self.value
    }
}

const fn clamp_const(v: f32, min: f32, max: f32) -> f32 {
    if v < min {
        min
    } else if v > max {
        max
    } else {
        v
    }
}

/// A per-note variant of [`Control`]; identical shape, kept as a distinct type
/// so note tables and instrument tables cannot be confused at the type level.
pub type NoteControl = Control;

/// Instrument-level control identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlId {
    Gain,
    PitchShift,
    StereoPan,
    Retrigger,
    VoiceCount,
    Attack,
    Decay,
    Sustain,
    Release,
    OscMix,
    OscMode,
    OscNoiseMix,
    OscPitchShift,
    OscShape,
    OscSkew,
    SliceMode,
    BitCrusherDepth,
    BitCrusherRate,
    DistortionMix,
    DistortionDrive,
    FilterType,
    FilterFrequency,
    FilterQ,
    ArpMode,
    ArpGateRatio,
    ArpRate,
    DelaySend,
    SidechainSend,
}

impl ControlId {
    pub const ALL: [ControlId; 27] = [
        ControlId::Gain,
        ControlId::PitchShift,
        ControlId::StereoPan,
        ControlId::Retrigger,
        ControlId::VoiceCount,
        ControlId::Attack,
        ControlId::Decay,
        ControlId::Sustain,
        ControlId::Release,
        ControlId::OscMix,
        ControlId::OscMode,
        ControlId::OscNoiseMix,
        ControlId::OscPitchShift,
        ControlId::OscShape,
        ControlId::OscSkew,
        ControlId::SliceMode,
        ControlId::BitCrusherDepth,
        ControlId::BitCrusherRate,
        ControlId::DistortionMix,
        ControlId::DistortionDrive,
        ControlId::FilterType,
        ControlId::FilterFrequency,
        ControlId::FilterQ,
        ControlId::ArpMode,
        ControlId::ArpGateRatio,
        ControlId::ArpRate,
        ControlId::DelaySend,
        ControlId::SidechainSend,
    ];

    pub const COUNT: usize = Self::ALL.len();

    /// Dense index into a `[Control; ControlId::COUNT]` array.
    pub fn index(self) -> usize {
        Self::ALL.iter().position(|&c| c == self).expect("ControlId::ALL is exhaustive")
    }

    /// `(default, min, max)` for this control, matching typical instrument defaults.
    pub fn default_range(self) -> (f32, f32, f32) {
        use ControlId::*;
        match self {
            Gain => (1.0, 0.0, 4.0),
            PitchShift => (0.0, -48.0, 48.0),
            StereoPan => (0.0, -1.0, 1.0),
            Retrigger => (0.0, 0.0, 1.0),
            VoiceCount => (8.0, 1.0, 32.0),
            Attack => (0.0, 0.0, 60.0),
            Decay => (0.0, 0.0, 60.0),
            Sustain => (1.0, 0.0, 1.0),
            Release => (0.0, 0.0, 60.0),
            OscMix => (0.0, 0.0, 1.0),
            OscMode => (0.0, 0.0, 5.0),
            OscNoiseMix => (0.0, 0.0, 1.0),
            OscPitchShift => (0.0, -48.0, 48.0),
            OscShape => (0.0, 0.0, 1.0),
            OscSkew => (0.0, -0.5, 0.5),
            SliceMode => (0.0, 0.0, 2.0),
            BitCrusherDepth => (1.0, 0.0, 1.0),
            BitCrusherRate => (1.0, 0.0, 1.0),
            DistortionMix => (0.0, 0.0, 1.0),
            DistortionDrive => (0.0, 0.0, 1.0),
            FilterType => (0.0, 0.0, 2.0),
            FilterFrequency => (8_000.0, 0.0, 48_000.0),
            FilterQ => (0.707, 0.1, 10.0),
            ArpMode => (0.0, 0.0, 2.0),
            ArpGateRatio => (0.5, 0.0, 1.0),
            ArpRate => (0.0, 0.0, 64.0),
            DelaySend => (0.0, 0.0, 1.0),
            SidechainSend => (0.0, 0.0, 1.0),
        }
    }
}

/// Per-note control identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoteControlId {
    Gain,
    PitchShift,
}

impl NoteControlId {
    pub const ALL: [NoteControlId; 2] = [NoteControlId::Gain, NoteControlId::PitchShift];
    pub const COUNT: usize = Self::ALL.len();

    pub fn index(self) -> usize {
        match self {
            NoteControlId::Gain => 0,
            NoteControlId::PitchShift => 1,
        }
    }

    pub fn default_range(self) -> (f32, f32, f32) {
        match self {
            NoteControlId::Gain => (1.0, 0.0, 4.0),
            NoteControlId::PitchShift => (0.0, -48.0, 48.0),
        }
    }
}

/// Engine (mix-bus) control identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineControlId {
    DelayMix,
    DelayTime,
    DelayFeedback,
    DelayLowPassFrequency,
    DelayHighPassFrequency,
    CompressorThreshold,
    CompressorRatio,
    CompressorAttack,
    CompressorRelease,
    CompressorMix,
    SidechainThreshold,
    SidechainRatio,
    SidechainAttack,
    SidechainRelease,
    SidechainMix,
}

impl EngineControlId {
    pub const ALL: [EngineControlId; 15] = [
        EngineControlId::DelayMix,
        EngineControlId::DelayTime,
        EngineControlId::DelayFeedback,
        EngineControlId::DelayLowPassFrequency,
        EngineControlId::DelayHighPassFrequency,
        EngineControlId::CompressorThreshold,
        EngineControlId::CompressorRatio,
        EngineControlId::CompressorAttack,
        EngineControlId::CompressorRelease,
        EngineControlId::CompressorMix,
        EngineControlId::SidechainThreshold,
        EngineControlId::SidechainRatio,
        EngineControlId::SidechainAttack,
        EngineControlId::SidechainRelease,
        EngineControlId::SidechainMix,
    ];
    pub const COUNT: usize = Self::ALL.len();

    pub fn index(self) -> usize {
        Self::ALL.iter().position(|&c| c == self).expect("EngineControlId::ALL is exhaustive")
    }

    pub fn default_range(self) -> (f32, f32, f32) {
        use EngineControlId::*;
        match self {
            DelayMix => (0.0, 0.0, 1.0),
            DelayTime => (0.25, 0.0, 2.0),
            DelayFeedback => (0.3, 0.0, 0.98),
            DelayLowPassFrequency => (8_000.0, 20.0, 20_000.0),
            DelayHighPassFrequency => (200.0, 0.0, 20_000.0),
            CompressorThreshold => (-12.0, -60.0, 0.0),
            CompressorRatio => (4.0, 1.0, 20.0),
            CompressorAttack => (0.01, 0.0001, 1.0),
            CompressorRelease => (0.15, 0.0001, 2.0),
            CompressorMix => (1.0, 0.0, 1.0),
            SidechainThreshold => (-18.0, -60.0, 0.0),
            SidechainRatio => (4.0, 1.0, 20.0),
            SidechainAttack => (0.005, 0.0001, 1.0),
            SidechainRelease => (0.2, 0.0001, 2.0),
            SidechainMix => (1.0, 0.0, 1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_clamps_into_range() {
        let mut c = Control::new(1.0, 0.0, 4.0);
        assert_eq!(c.set(10.0), 4.0);
        assert_eq!(c.set(-10.0), 0.0);
        assert_eq!(c.set(2.5), 2.5);
    }
}
