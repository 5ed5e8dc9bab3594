//! Stereo delay line with linear-interpolated read and a low-pass→high-pass
//! filtered feedback path.

use super::one_pole::{OnePoleHighPass, OnePoleLowPass};

const CHANNELS: usize = 2;

pub struct DelayLine {
    buffer: Vec<[f32; CHANNELS]>,
    cursor: usize,
    lowpass: [OnePoleLowPass; CHANNELS],
    highpass: [OnePoleHighPass; CHANNELS],
}

impl DelayLine {
    pub fn new(max_frames: usize) -> Self {
        Self {
            buffer: vec![[0.0; CHANNELS]; max_frames.max(1)],
            cursor: 0,
            lowpass: Default::default(),
            highpass: Default::default(),
        }
    }

    pub fn reset(&mut self) {
        for slot in &mut self.buffer {
            *slot = [0.0; CHANNELS];
        }
        self.cursor = 0;
        self.lowpass = Default::default();
        self.highpass = Default::default();
    }

    fn read_interpolated(&self, delay_frames: f32) -> [f32; CHANNELS] {
        let len = self.buffer.len() as f32;
        let delay_frames = delay_frames.clamp(0.0, len - 1.0);
        let back = delay_frames.floor();
        let frac = delay_frames - back;
        let idx0 = (self.cursor as isize - back as isize).rem_euclid(self.buffer.len() as isize) as usize;
        let idx1 = (idx0 + self.buffer.len() - 1) % self.buffer.len();
        let mut out = [0.0; CHANNELS];
        for c in 0..CHANNELS {
            let a = self.buffer[idx0][c];
            let b = self.buffer[idx1][c];
            out[c] = a + (b - a) * frac;
        }
        out
    }

    /// Advances the line by one frame and returns the delay-mix contribution
    /// (caller adds `mix * contribution` to its output, or passes `mix`
    /// pre-applied).
    #[allow(clippy::too_many_arguments)]
    pub fn process_frame(
        &mut self,
        input: [f32; CHANNELS],
        delay_frames: f32,
        feedback: f32,
        lp_coefficient: f32,
        hp_coefficient: f32,
    ) -> [f32; CHANNELS] {
        let read = self.read_interpolated(delay_frames);
        let mut filtered = [0.0; CHANNELS];
        for c in 0..CHANNELS {
            let lp = self.lowpass[c].next(read[c], lp_coefficient);
            filtered[c] = self.highpass[c].next(lp, hp_coefficient);
        }
        let mut write = [0.0; CHANNELS];
        for c in 0..CHANNELS {
            write[c] = input[c] + feedback * filtered[c];
        }
        self.buffer[self.cursor] = write;
        self.cursor = (self.cursor + 1) % self.buffer.len();
        read
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_in_yields_silence_out() {
        let mut delay = DelayLine::new(100);
        for _ in 0..200 {
            let out = delay.process_frame([0.0, 0.0], 10.0, 0.4, 0.5, 0.5);
            assert_eq!(out, [0.0, 0.0]);
        }
    }

    #[test]
    fn impulse_reappears_after_delay() {
        let mut delay = DelayLine::new(100);
        delay.process_frame([1.0, 1.0], 5.0, 0.0, 1.0, 0.0);
        let mut saw_nonzero_later = false;
        for _ in 0..10 {
            let out = delay.process_frame([0.0, 0.0], 5.0, 0.0, 1.0, 0.0);
            if out[0] != 0.0 {
                saw_nonzero_later = true;
            }
        }
        assert!(saw_nonzero_later);
    }
}
