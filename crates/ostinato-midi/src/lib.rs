//! MIDI event containers for the ostinato graph engine.
//!
//! Events are raw three-byte messages stamped with a frame offset. A
//! [`MidiEventVector`] is a bounded, lock-protected list of them that can be
//! shared between the audio thread and producer threads. [`MidiEvents`] pairs
//! the events of the current cycle with the events still waiting in the queue.
//!
//! # Example
//!
//! ```
//! use ostinato_midi::MidiEvents;
//!
//! let events = MidiEvents::new();
//! events.queued_events.add_note_on(1, 60, 100, 12);
//! events.queued_events.add_note_off(1, 60, 400);
//!
//! // audio thread, 256-frame cycle
//! events.dequeue(0, 256);
//! assert_eq!(events.active_events.len(), 1);
//! assert_eq!(events.queued_events.len(), 1);
//! ```

pub mod chord;
pub mod error;
pub mod event;
pub mod events;
pub mod utils;
pub mod vector;

pub use chord::{ChordAccent, ChordDescriptor, ChordType, MusicalNote, CHORD_NOTE_OFFSET};
pub use error::{Error, Result};
pub use event::{MidiEvent, MidiTime};
pub use events::MidiEvents;
pub use vector::{MidiEventVector, MAX_MIDI_EVENTS};
