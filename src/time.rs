//! Beat ↔ second ↔ frame conversions.
//!
//! These are pure functions of `(tempo, sample_rate)`; the only state is the
//! `tempo`/`timestamp` pair owned by [`crate::musician::Musician`].

/// Convert a duration in seconds to beats at the given tempo (beats per minute).
///
/// When `tempo <= 0.0`, beat-time does not advance: the result is `+inf`/`-inf`/`NaN`
/// by the sign of `seconds`, signalling to callers that the scheduler must not fire.
pub fn beats_from_seconds(tempo: f64, seconds: f64) -> f64 {
    if tempo <= 0.0 {
        return match seconds.partial_cmp(&0.0) {
            Some(std::cmp::Ordering::Greater) => f64::INFINITY,
            Some(std::cmp::Ordering::Less) => f64::NEG_INFINITY,
            _ => 0.0,
        };
    }
    tempo * seconds / 60.0
}

/// Convert a duration in beats to seconds at the given tempo.
pub fn seconds_from_beats(tempo: f64, beats: f64) -> f64 {
    if tempo <= 0.0 {
        return match beats.partial_cmp(&0.0) {
            Some(std::cmp::Ordering::Greater) => f64::INFINITY,
            Some(std::cmp::Ordering::Less) => f64::NEG_INFINITY,
            _ => 0.0,
        };
    }
    60.0 * beats / tempo
}

/// Convert a duration in seconds to a whole number of audio frames, floored.
pub fn frames_from_seconds(sample_rate: i32, seconds: f64) -> i64 {
    (seconds * sample_rate as f64).floor() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn beats_seconds_roundtrip() {
        let tempo = 128.0;
        for x in [0.0, 1.0, 3.5, 120.0, -7.25] {
            let back = beats_from_seconds(tempo, seconds_from_beats(tempo, x));
            assert!((back - x).abs() <= f64::EPSILON * x.abs().max(1.0));
        }
    }

    #[test]
    fn zero_tempo_never_advances() {
        assert_eq!(beats_from_seconds(0.0, 1.0), f64::INFINITY);
        assert_eq!(beats_from_seconds(0.0, -1.0), f64::NEG_INFINITY);
        assert_eq!(seconds_from_beats(-5.0, 2.0), f64::INFINITY);
    }

    #[test]
    fn frames_additive_up_to_rounding() {
        let sr = 48_000;
        let s = 0.333_333;
        let t = 0.666_667;
        let combined = frames_from_seconds(sr, s + t);
        let separate = frames_from_seconds(sr, s) + frames_from_seconds(sr, t);
        assert!((combined - separate).abs() <= 1);
    }
}
