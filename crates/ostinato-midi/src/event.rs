//! Raw timestamped MIDI events.

use midi_msg::MidiMsg;
use serde::{Deserialize, Serialize};

use crate::utils;
use crate::{Error, Result};

/// Frame offset of an event inside the current cycle.
pub type MidiTime = u32;

/// Raw MIDI event with a frame timestamp.
///
/// Holds at most one three-byte message. Equality compares the frame time and
/// the message bytes; `systime` is diagnostic only.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct MidiEvent {
    pub raw_buffer: [u8; 3],
    /// Valid bytes in `raw_buffer` (1-3).
    pub raw_buffer_sz: u8,
    /// Frame offset (cycle-relative once dequeued).
    pub time: MidiTime,
    /// Wall-clock creation time in microseconds, 0 if unknown.
    pub systime: u64,
}

impl MidiEvent {
    #[inline]
    pub fn new(byte1: u8, byte2: u8, byte3: u8, time: MidiTime) -> Self {
        Self {
            raw_buffer: [byte1, byte2, byte3],
            raw_buffer_sz: 3,
            time,
            systime: 0,
        }
    }

    /// Builds an event from up to three bytes. Longer buffers are truncated.
    pub fn from_slice(buf: &[u8], time: MidiTime) -> Self {
        let len = buf.len().min(3);
        let mut raw_buffer = [0u8; 3];
        raw_buffer[..len].copy_from_slice(&buf[..len]);
        Self {
            raw_buffer,
            raw_buffer_sz: len as u8,
            time,
            systime: 0,
        }
    }

    #[inline]
    pub fn with_systime(mut self, systime: u64) -> Self {
        self.systime = systime;
        self
    }

    /// Valid message bytes.
    #[inline]
    pub fn raw(&self) -> &[u8] {
        &self.raw_buffer[..self.raw_buffer_sz as usize]
    }

    #[inline]
    pub fn status(&self) -> u8 {
        utils::status(self.raw_buffer[0])
    }

    /// Channel in 1..=16, or `None` for system messages.
    #[inline]
    pub fn channel(&self) -> Option<u8> {
        utils::is_channel_voice(self.raw_buffer[0]).then(|| utils::channel_1_to_16(self.raw_buffer[0]))
    }

    #[inline]
    pub fn is_note_on(&self) -> bool {
        utils::is_note_on(self.raw())
    }

    #[inline]
    pub fn is_note_off(&self) -> bool {
        utils::is_note_off(self.raw())
    }

    #[inline]
    pub fn note_number(&self) -> u8 {
        self.raw_buffer[1]
    }

    #[inline]
    pub fn velocity(&self) -> u8 {
        self.raw_buffer[2]
    }

    /// Overwrites the velocity of a note on. Other messages are left alone.
    pub fn set_velocity(&mut self, velocity: u8) {
        if self.is_note_on() {
            self.raw_buffer[2] = velocity & 0x7F;
        }
    }

    /// Parses the raw bytes into a typed message.
    pub fn to_midi_msg(&self) -> Result<MidiMsg> {
        if self.raw_buffer_sz == 0 {
            return Err(Error::EmptyBuffer);
        }
        let (msg, _len) = MidiMsg::from_midi(self.raw())?;
        Ok(msg)
    }

    /// Encodes a typed message. Fails for messages longer than three bytes.
    pub fn from_midi_msg(msg: &MidiMsg, time: MidiTime) -> Result<Self> {
        let bytes = msg.to_midi();
        match bytes.len() {
            0 => Err(Error::EmptyBuffer),
            1..=3 => Ok(Self::from_slice(&bytes, time)),
            n => Err(Error::MessageTooLong(n)),
        }
    }
}

impl PartialEq for MidiEvent {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time
            && self.raw_buffer == other.raw_buffer
            && self.raw_buffer_sz == other.raw_buffer_sz
    }
}

impl Eq for MidiEvent {}
