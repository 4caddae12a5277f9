//! Raw MIDI byte helpers.

pub const NOTE_OFF: u8 = 0x80;
pub const NOTE_ON: u8 = 0x90;
pub const POLY_PRESSURE: u8 = 0xA0;
pub const CONTROL_CHANGE: u8 = 0xB0;
pub const PROGRAM_CHANGE: u8 = 0xC0;
pub const CHANNEL_PRESSURE: u8 = 0xD0;
pub const PITCH_BEND: u8 = 0xE0;
pub const SONG_POSITION: u8 = 0xF2;

pub const CC_VOLUME: u8 = 7;
pub const CC_ALL_NOTES_OFF: u8 = 123;

/// Centre value of the 14-bit pitch wheel.
pub const PITCH_BEND_CENTER: u32 = 0x2000;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Status nibble (upper four bits) of a status byte.
#[inline]
pub fn status(byte: u8) -> u8 {
    byte & 0xF0
}

/// Channel in 1..=16 from a channel voice status byte.
#[inline]
pub fn channel_1_to_16(byte: u8) -> u8 {
    (byte & 0x0F) + 1
}

/// Builds a channel voice status byte from a 1-based channel.
#[inline]
pub fn status_byte(kind: u8, channel: u8) -> u8 {
    kind | (channel.saturating_sub(1) & 0x0F)
}

#[inline]
pub fn is_channel_voice(byte: u8) -> bool {
    (0x80..0xF0).contains(&byte)
}

/// Note on with non-zero velocity.
#[inline]
pub fn is_note_on(buf: &[u8]) -> bool {
    buf.len() >= 3 && status(buf[0]) == NOTE_ON && buf[2] > 0
}

/// Note off, or note on with zero velocity.
#[inline]
pub fn is_note_off(buf: &[u8]) -> bool {
    buf.len() >= 3
        && (status(buf[0]) == NOTE_OFF || (status(buf[0]) == NOTE_ON && buf[2] == 0))
}

#[inline]
pub fn is_controller(buf: &[u8]) -> bool {
    !buf.is_empty() && status(buf[0]) == CONTROL_CHANGE
}

#[inline]
pub fn is_pitch_bend(buf: &[u8]) -> bool {
    !buf.is_empty() && status(buf[0]) == PITCH_BEND
}

#[inline]
pub fn is_all_notes_off(buf: &[u8]) -> bool {
    buf.len() >= 3 && status(buf[0]) == CONTROL_CHANGE && buf[1] == CC_ALL_NOTES_OFF
}

/// 14-bit pitch wheel value (0..=16383).
#[inline]
pub fn pitch_bend_value(buf: &[u8]) -> u32 {
    if buf.len() < 3 {
        return PITCH_BEND_CENTER;
    }
    (buf[1] as u32 & 0x7F) | ((buf[2] as u32 & 0x7F) << 7)
}

/// Note name without octave, e.g. `"F#"`.
pub fn note_name(note: u8) -> &'static str {
    NOTE_NAMES[(note % 12) as usize]
}
