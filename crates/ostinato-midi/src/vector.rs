//! Bounded, lock-protected MIDI event vector.
//!
//! # RT Safety
//!
//! Storage is reserved up front for [`MAX_MIDI_EVENTS`] and never grows, so
//! pushing from the audio thread does not allocate. Every operation takes a
//! short `parking_lot` mutex. Producers on other threads must not hold the
//! vector across blocking work (see [`MidiEventVector::with_events`]).

use core::ops::Range;
use core::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use crate::chord::ChordDescriptor;
use crate::event::{MidiEvent, MidiTime};
use crate::utils::{self, CC_ALL_NOTES_OFF, CC_VOLUME};

/// Maximum events held by one vector.
pub const MAX_MIDI_EVENTS: usize = 2560;

/// Thread-safe, bounded collection of timestamped MIDI events.
///
/// Pushing past [`MAX_MIDI_EVENTS`] drops the event and bumps
/// [`dropped_count`](Self::dropped_count).
#[derive(Debug)]
pub struct MidiEventVector {
    events: Mutex<Vec<MidiEvent>>,
    dropped: AtomicUsize,
}

impl Default for MidiEventVector {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MidiEventVector {
    fn clone(&self) -> Self {
        let copy = Self::new();
        copy.events.lock().extend_from_slice(&self.events.lock());
        copy
    }
}

impl MidiEventVector {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::with_capacity(MAX_MIDI_EVENTS)),
            dropped: AtomicUsize::new(0),
        }
    }

    /// Appends an event. Returns `false` if the vector is full.
    pub fn push_back(&self, event: MidiEvent) -> bool {
        let mut events = self.events.lock();
        self.push_locked(&mut events, event)
    }

    /// Appends a batch. Returns how many events fit.
    pub fn push_back_many(&self, batch: &[MidiEvent]) -> usize {
        let mut events = self.events.lock();
        let room = MAX_MIDI_EVENTS.saturating_sub(events.len());
        let taken = batch.len().min(room);
        events.extend_from_slice(&batch[..taken]);
        self.record_dropped(batch.len() - taken);
        taken
    }

    pub fn pop_front(&self) -> Option<MidiEvent> {
        let mut events = self.events.lock();
        if events.is_empty() {
            None
        } else {
            Some(events.remove(0))
        }
    }

    pub fn pop_back(&self) -> Option<MidiEvent> {
        self.events.lock().pop()
    }

    pub fn front(&self) -> Option<MidiEvent> {
        self.events.lock().first().copied()
    }

    pub fn back(&self) -> Option<MidiEvent> {
        self.events.lock().last().copied()
    }

    pub fn at(&self, index: usize) -> Option<MidiEvent> {
        self.events.lock().get(index).copied()
    }

    /// Removes the events in `range`, clamped to the current length.
    pub fn erase(&self, range: Range<usize>) {
        let mut events = self.events.lock();
        let end = range.end.min(events.len());
        let start = range.start.min(end);
        events.drain(start..end);
    }

    pub fn remove_if(&self, mut predicate: impl FnMut(&MidiEvent) -> bool) {
        self.events.lock().retain(|ev| !predicate(ev));
    }

    /// Removes every event equal to `event`.
    pub fn remove(&self, event: &MidiEvent) {
        self.remove_if(|ev| ev == event);
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.events.lock().capacity()
    }

    /// Events rejected because the vector was full, since creation or the last
    /// [`take_dropped_count`](Self::take_dropped_count).
    pub fn dropped_count(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn take_dropped_count(&self) -> usize {
        self.dropped.swap(0, Ordering::Relaxed)
    }

    /// Exchanges contents with `other`.
    pub fn swap(&self, other: &MidiEventVector) {
        if core::ptr::eq(self, other) {
            return;
        }
        let (mut a, mut b) = self.lock_pair(other);
        core::mem::swap(&mut *a, &mut *b);
    }

    pub fn foreach_event(&self, mut func: impl FnMut(&MidiEvent)) {
        self.events.lock().iter().for_each(|ev| func(ev));
    }

    /// Runs `func` with the events locked.
    pub fn with_events<R>(&self, func: impl FnOnce(&[MidiEvent]) -> R) -> R {
        func(&self.events.lock())
    }

    /// Copies the events out. Allocates; not for the audio thread.
    pub fn to_vec(&self) -> Vec<MidiEvent> {
        self.events.lock().clone()
    }

    /// Appends the events of `src` whose time is inside
    /// `[local_offset, local_offset + nframes)`.
    pub fn append(&self, src: &MidiEventVector, local_offset: MidiTime, nframes: MidiTime) {
        self.append_w_filter(src, None, local_offset, nframes);
    }

    /// Like [`append`](Self::append) but only keeps channel voice events whose
    /// channel is enabled in `channels` (index 0 is channel 1). System
    /// messages always pass.
    pub fn append_w_filter(
        &self,
        src: &MidiEventVector,
        channels: Option<&[bool; 16]>,
        local_offset: MidiTime,
        nframes: MidiTime,
    ) {
        if core::ptr::eq(self, src) {
            return;
        }
        let window = local_offset..local_offset.saturating_add(nframes);
        let (source, mut dest) = src.lock_pair(self);
        for ev in source.iter() {
            if !window.contains(&ev.time) {
                continue;
            }
            if let Some(channels) = channels {
                if utils::is_channel_voice(ev.raw_buffer[0])
                    && !channels[(ev.raw_buffer[0] & 0x0F) as usize]
                {
                    continue;
                }
            }
            self.push_locked(&mut dest, *ev);
        }
    }

    /// Moves the events inside `[local_offset, local_offset + nframes)` from
    /// `self` into `dest`, keeping their relative order. Returns how many moved.
    ///
    /// Events that do not fit into `dest` stay in `self`.
    pub fn move_window_into(
        &self,
        dest: &MidiEventVector,
        local_offset: MidiTime,
        nframes: MidiTime,
    ) -> usize {
        if core::ptr::eq(self, dest) {
            return 0;
        }
        let window = local_offset..local_offset.saturating_add(nframes);
        let (mut source, mut target) = self.lock_pair(dest);
        let mut moved = 0;
        source.retain(|ev| {
            if !window.contains(&ev.time) {
                return true;
            }
            if dest.push_locked(&mut target, *ev) {
                moved += 1;
                false
            } else {
                true
            }
        });
        moved
    }

    /// Shifts every event `nframes` earlier, saturating at 0.
    pub fn shift_back(&self, nframes: MidiTime) {
        for ev in self.events.lock().iter_mut() {
            ev.time = ev.time.saturating_sub(nframes);
        }
    }

    /// Expands note events of `src` into chords and appends the result.
    ///
    /// `chord_for_note` maps a note number to its chord; notes without one are
    /// skipped. Non-note events in the window are copied unchanged.
    pub fn transform_chord_and_append<'a>(
        &self,
        src: &MidiEventVector,
        chord_for_note: impl Fn(u8) -> Option<&'a ChordDescriptor>,
        velocity_to_use: u8,
        local_offset: MidiTime,
        nframes: MidiTime,
    ) {
        if core::ptr::eq(self, src) {
            return;
        }
        let window = local_offset..local_offset.saturating_add(nframes);
        let (source, mut dest) = src.lock_pair(self);
        for ev in source.iter().filter(|ev| window.contains(&ev.time)) {
            if ev.is_note_on() {
                if let Some(descr) = chord_for_note(ev.note_number()) {
                    for note in descr.iter_midi_notes() {
                        let on = MidiEvent::new(
                            utils::status_byte(utils::NOTE_ON, 1),
                            note,
                            velocity_to_use,
                            ev.time,
                        );
                        self.push_locked(&mut dest, on);
                    }
                }
            } else if ev.is_note_off() {
                if let Some(descr) = chord_for_note(ev.note_number()) {
                    for note in descr.iter_midi_notes() {
                        let off = MidiEvent::new(
                            utils::status_byte(utils::NOTE_OFF, 1),
                            note,
                            0,
                            ev.time,
                        );
                        self.push_locked(&mut dest, off);
                    }
                }
            } else {
                self.push_locked(&mut dest, *ev);
            }
        }
    }

    /// Stable sort by time. Insertion sort, in place; input is usually nearly sorted.
    pub fn sort(&self) {
        let mut events = self.events.lock();
        for i in 1..events.len() {
            let mut j = i;
            while j > 0 && events[j - 1].time > events[j].time {
                events.swap(j - 1, j);
                j -= 1;
            }
        }
    }

    /// Drops exact duplicates, keeping the first occurrence.
    pub fn clear_duplicates(&self) {
        let mut events = self.events.lock();
        let mut kept = 0;
        for read in 0..events.len() {
            let ev = events[read];
            if !events[..kept].contains(&ev) {
                events[kept] = ev;
                kept += 1;
            }
        }
        events.truncate(kept);
    }

    /// Rewrites the channel of every channel voice event (`channel` is 1-based).
    pub fn set_channel(&self, channel: u8) {
        let mut events = self.events.lock();
        for ev in events.iter_mut() {
            if utils::is_channel_voice(ev.raw_buffer[0]) {
                ev.raw_buffer[0] = utils::status_byte(utils::status(ev.raw_buffer[0]), channel);
            }
        }
    }

    /// Adds a note on. `channel` is 1-based.
    pub fn add_note_on(&self, channel: u8, note_pitch: u8, velocity: u8, time: MidiTime) {
        self.add_simple(
            utils::status_byte(utils::NOTE_ON, channel),
            note_pitch & 0x7F,
            velocity & 0x7F,
            time,
        );
    }

    /// Adds a note off with zero release velocity. `channel` is 1-based.
    pub fn add_note_off(&self, channel: u8, note_pitch: u8, time: MidiTime) {
        self.add_simple(
            utils::status_byte(utils::NOTE_OFF, channel),
            note_pitch & 0x7F,
            0,
            time,
        );
    }

    pub fn add_control_change(&self, channel: u8, controller: u8, value: u8, time: MidiTime) {
        self.add_simple(
            utils::status_byte(utils::CONTROL_CHANGE, channel),
            controller & 0x7F,
            value & 0x7F,
            time,
        );
    }

    pub fn add_cc_volume(&self, channel: u8, volume: u8, time: MidiTime) {
        self.add_control_change(channel, CC_VOLUME, volume, time);
    }

    /// Adds a pitch bend. `pitchbend` is the 14-bit wheel value (0..=16383).
    pub fn add_pitchbend(&self, channel: u8, pitchbend: u32, time: MidiTime) {
        self.add_simple(
            utils::status_byte(utils::PITCH_BEND, channel),
            (pitchbend & 0x7F) as u8,
            ((pitchbend >> 7) & 0x7F) as u8,
            time,
        );
    }

    pub fn add_channel_pressure(&self, channel: u8, value: u8, time: MidiTime) {
        self.push_back(MidiEvent::from_slice(
            &[utils::status_byte(utils::CHANNEL_PRESSURE, channel), value & 0x7F],
            time,
        ));
    }

    pub fn add_all_notes_off(&self, channel: u8, time: MidiTime) {
        self.add_control_change(channel, CC_ALL_NOTES_OFF, 0, time);
    }

    /// All notes off on every channel.
    pub fn panic(&self) {
        for channel in 1..=16 {
            self.add_all_notes_off(channel, 0);
        }
    }

    /// Adds a song position pointer in sixteenth notes.
    pub fn add_song_pos(&self, total_sixteenths: i64, time: MidiTime) {
        let pos = total_sixteenths.clamp(0, 0x3FFF) as u32;
        self.add_simple(
            utils::SONG_POSITION,
            (pos & 0x7F) as u8,
            ((pos >> 7) & 0x7F) as u8,
            time,
        );
    }

    pub fn add_note_ons_from_chord_descr(
        &self,
        descr: &ChordDescriptor,
        channel: u8,
        velocity: u8,
        time: MidiTime,
    ) {
        for note in descr.iter_midi_notes() {
            self.add_note_on(channel, note, velocity, time);
        }
    }

    pub fn add_note_offs_from_chord_descr(
        &self,
        descr: &ChordDescriptor,
        channel: u8,
        time: MidiTime,
    ) {
        for note in descr.iter_midi_notes() {
            self.add_note_off(channel, note, time);
        }
    }

    pub fn add_simple(&self, byte1: u8, byte2: u8, byte3: u8, time: MidiTime) {
        self.push_back(MidiEvent::new(byte1, byte2, byte3, time));
    }

    /// Adds up to three raw bytes as one event.
    pub fn add_raw(&self, buf: &[u8], time: MidiTime) {
        if !buf.is_empty() {
            self.push_back(MidiEvent::from_slice(buf, time));
        }
    }

    /// Adds a complete message received from a device.
    ///
    /// Note ons with zero velocity become note offs. Running status is not
    /// handled; the caller must prepend the status byte.
    pub fn add_event_from_buf(&self, time: MidiTime, buf: &[u8]) {
        if buf.is_empty() || buf[0] < 0x80 {
            debug!("Ignoring MIDI buffer without status byte: {:02X?}", buf);
            return;
        }
        let pushed = if buf.len() >= 3 && utils::is_note_off(buf) {
            self.push_back(MidiEvent::new(
                utils::status_byte(utils::NOTE_OFF, utils::channel_1_to_16(buf[0])),
                buf[1],
                0,
                time,
            ))
        } else {
            self.push_back(MidiEvent::from_slice(buf, time))
        };
        if !pushed {
            debug!("MIDI event vector full, dropping event");
        }
    }

    #[inline]
    fn push_locked(&self, events: &mut Vec<MidiEvent>, event: MidiEvent) -> bool {
        if events.len() >= MAX_MIDI_EVENTS {
            self.record_dropped(1);
            return false;
        }
        events.push(event);
        true
    }

    #[inline]
    fn record_dropped(&self, count: usize) {
        if count > 0 {
            self.dropped.fetch_add(count, Ordering::Relaxed);
        }
    }

    /// Locks `self` and `other` in address order. Callers check for aliasing.
    fn lock_pair<'a>(
        &'a self,
        other: &'a MidiEventVector,
    ) -> (
        parking_lot::MutexGuard<'a, Vec<MidiEvent>>,
        parking_lot::MutexGuard<'a, Vec<MidiEvent>>,
    ) {
        if (self as *const Self) < (other as *const Self) {
            let a = self.events.lock();
            let b = other.events.lock();
            (a, b)
        } else {
            let b = other.events.lock();
            let a = self.events.lock();
            (a, b)
        }
    }
}
