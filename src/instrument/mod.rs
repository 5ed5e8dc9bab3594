//! An instrument: the control-side note table/arpeggiator paired with the
//! audio-side voice pool that actually renders sound.

pub mod controller;
pub mod processor;

pub use controller::{ArpMode, InstrumentController, NoteEventCallback};
pub use processor::InstrumentProcessor;

/// One instrument: a [`InstrumentController`] (control-side note/arp state)
/// and an [`InstrumentProcessor`] (audio-side voice pool), kept together so
/// the arena that owns instruments has a single source of truth per handle.
///
/// Neither half stores its own [`crate::handles::InstrumentHandle`]: the pool
/// only produces that handle once this value is inserted, so callers pass it
/// in at each call site instead (see [`crate::musician::Musician`]).
pub struct Instrument {
    pub controller: InstrumentController,
    pub processor: InstrumentProcessor,
}

impl Instrument {
    pub fn new(sample_rate: f32, seed: u64) -> Self {
        Self { controller: InstrumentController::new(seed), processor: InstrumentProcessor::new(sample_rate, seed) }
    }
}
