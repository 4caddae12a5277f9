//! Active/queued event pair carried by MIDI ports.

use crate::event::MidiTime;
use crate::vector::MidiEventVector;

/// Events for the current cycle plus events waiting for a later one.
///
/// Producers on other threads push into `queued_events`. The audio thread
/// moves the due slice into `active_events` with [`dequeue`](Self::dequeue).
#[derive(Debug, Default, Clone)]
pub struct MidiEvents {
    /// Events to use in this cycle. Times are cycle-relative.
    pub active_events: MidiEventVector,
    /// Events from the UI or hardware, timed relative to the next cycle start.
    pub queued_events: MidiEventVector,
}

impl MidiEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves queued events timed inside `[local_offset, local_offset + nframes)`
    /// into the active events. Later events stay queued.
    ///
    /// Calling this twice for the same window moves nothing the second time.
    pub fn dequeue(&self, local_offset: MidiTime, nframes: MidiTime) -> usize {
        self.queued_events
            .move_window_into(&self.active_events, local_offset, nframes)
    }

    /// Re-times still-queued events for the next cycle. Called once the
    /// current cycle's `block_length` frames have been processed.
    pub fn advance_queued(&self, block_length: MidiTime) {
        self.queued_events.shift_back(block_length);
    }

    /// Clears both vectors.
    pub fn clear(&self) {
        self.active_events.clear();
        self.queued_events.clear();
    }
}
