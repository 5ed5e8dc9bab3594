//! Typed error surface for the control side.
//!
//! Audio-side failures never use this type: `process` signals failure by
//! zero-filling its output and returning `false` (see [`crate::musician`]),
//! because the realtime path must not allocate a `Box<dyn Error>` or walk a
//! formatting machinery on every call.

use thiserror::Error;

/// Errors returned by control-side `Musician`/`Instrument`/`Performer` calls.
#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("handle is stale or out of range")]
    InvalidHandle,

    #[error("capacity exceeded: {0}")]
    CapacityExceeded(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
