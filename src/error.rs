//! Error type for the umbrella crate.
//!
//! Wraps the subsystem errors so `?` propagates across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] ostinato_core::Error),

    #[error("MIDI: {0}")]
    Midi(#[from] ostinato_midi::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
