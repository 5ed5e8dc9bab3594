//! A real-time, beat-oriented music engine: a transport clock, a
//! performer/task scheduler, and a polyphonic instrument + mix-bus audio
//! processor, driven from a single control-thread-facing [`Musician`].
//!
//! The crate is split the way the audio graph itself is split: a control
//! side that may allocate and return [`error::Result`], and an audio side
//! (reached only through [`Musician::process`]) that never allocates, locks,
//! or blocks, and reports failure by zero-filling its output.

pub mod control;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod handles;
pub mod instrument;
pub mod message;
pub mod musician;
pub mod oscillator;
pub mod performer;
pub mod slice;
pub mod time;
pub mod voice;

pub use control::{ControlId, EngineControlId, NoteControlId};
pub use dsp::biquad::FilterType;
pub use error::{Error, Result};
pub use handles::{InstrumentHandle, PerformerHandle, TaskHandle};
pub use instrument::{ArpMode, NoteEventCallback};
pub use message::NoteOnParams;
pub use musician::{Musician, MusicianConfig};
pub use performer::TaskCallback;
pub use slice::Slice;
pub use voice::{OscMode, SliceMode};
