//! Amplitude ↔ decibel helpers shared by the compressor and sidechain stages.

const MIN_AMPLITUDE: f32 = 1e-6;

pub fn amplitude_to_db(amplitude: f32) -> f32 {
    20.0 * amplitude.abs().max(MIN_AMPLITUDE).log10()
}

pub fn db_to_amplitude(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        for db in [-60.0f32, -6.0, 0.0, 6.0] {
            let back = amplitude_to_db(db_to_amplitude(db));
            assert!((back - db).abs() < 1e-3);
        }
    }
}
