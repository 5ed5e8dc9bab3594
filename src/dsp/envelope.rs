//! Attack-Decay-Sustain-Release gain envelope.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

#[derive(Debug, Clone, Copy)]
pub struct AdsrParams {
    pub attack_seconds: f32,
    pub decay_seconds: f32,
    pub sustain: f32,
    pub release_seconds: f32,
    pub sample_rate: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct Envelope {
    stage: Stage,
    value: f32,
    params: AdsrParams,
}

impl Envelope {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            stage: Stage::Idle,
            value: 0.0,
            params: AdsrParams { attack_seconds: 0.0, decay_seconds: 0.0, sustain: 1.0, release_seconds: 0.0, sample_rate },
        }
    }

    pub fn start(&mut self, params: AdsrParams) {
        self.params = params;
        self.value = 0.0;
        self.stage = if params.attack_seconds <= 0.0 {
            if params.decay_seconds <= 0.0 {
                self.value = params.sustain;
                Stage::Sustain
            } else {
                Stage::Decay
            }
        } else {
            Stage::Attack
        };
    }

    pub fn stop(&mut self) {
        if self.stage != Stage::Idle {
            self.stage = Stage::Release;
        }
    }

    pub fn is_active(&self) -> bool {
        self.stage != Stage::Idle
    }

    pub fn reset(&mut self) {
        self.stage = Stage::Idle;
        self.value = 0.0;
    }

    /// Advances one sample and returns the current gain.
    pub fn next(&mut self) -> f32 {
        let sr = self.params.sample_rate.max(1.0);
        match self.stage {
            Stage::Idle => 0.0,
            Stage::Attack => {
                let step = 1.0 / (self.params.attack_seconds.max(1.0 / sr) * sr);
                self.value += step;
                if self.value >= 1.0 {
                    self.value = 1.0;
                    self.stage = if self.params.decay_seconds <= 0.0 {
                        self.value = self.params.sustain;
                        Stage::Sustain
                    } else {
                        Stage::Decay
                    };
                }
                self.value
            }
            Stage::Decay => {
                let step = (1.0 - self.params.sustain) / (self.params.decay_seconds.max(1.0 / sr) * sr);
                self.value -= step;
                if self.value <= self.params.sustain {
                    self.value = self.params.sustain;
                    self.stage = Stage::Sustain;
                }
                self.value
            }
            Stage::Sustain => self.value,
            Stage::Release => {
                let start = self.value;
                let step = start / (self.params.release_seconds.max(1.0 / sr) * sr);
                self.value -= step;
                if self.value <= 0.0 {
                    self.value = 0.0;
                    self.stage = Stage::Idle;
                }
                self.value
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_is_silent_and_inactive() {
        let env = Envelope::new(48_000.0);
        assert!(!env.is_active());
    }

    #[test]
    fn zero_attack_skips_straight_to_decay() {
        let mut env = Envelope::new(48_000.0);
        env.start(AdsrParams { attack_seconds: 0.0, decay_seconds: 0.1, sustain: 0.3, release_seconds: 0.1, sample_rate: 48_000.0 });
        let first = env.next();
        assert!(first < 1.0, "should already be decaying, not pinned at peak");
    }

    #[test]
    fn reaches_sustain_and_holds() {
        let mut env = Envelope::new(48_000.0);
        env.start(AdsrParams { attack_seconds: 0.01, decay_seconds: 0.01, sustain: 0.4, release_seconds: 0.1, sample_rate: 48_000.0 });
        for _ in 0..48_000 {
            env.next();
        }
        assert!((env.next() - 0.4).abs() < 1e-3);
    }

    #[test]
    fn release_reaches_idle() {
        let mut env = Envelope::new(48_000.0);
        env.start(AdsrParams { attack_seconds: 0.001, decay_seconds: 0.001, sustain: 1.0, release_seconds: 0.01, sample_rate: 48_000.0 });
        for _ in 0..10 {
            env.next();
        }
        env.stop();
        for _ in 0..48_000 {
            env.next();
        }
        assert!(!env.is_active());
    }
}
