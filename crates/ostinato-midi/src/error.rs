//! Error types for ostinato-midi.

use thiserror::Error;

/// Error type for MIDI event conversion.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Failed to parse MIDI message: {0}")]
    Parse(String),

    #[error("MIDI message does not fit a raw event: {0} bytes")]
    MessageTooLong(usize),

    #[error("Empty MIDI buffer")]
    EmptyBuffer,
}

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;

impl From<midi_msg::ParseError> for Error {
    fn from(err: midi_msg::ParseError) -> Self {
        Error::Parse(format!("{err:?}"))
    }
}
