//! MIDI port.

use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use arc_swap::{ArcSwap, ArcSwapOption};
use ostinato_midi::{MidiEvent, MidiEvents};
use parking_lot::Mutex;
use ringbuf::{traits::*, HeapRb};

use super::{PortFlow, PortInfo, PortSource, PortType, MIDI_RING_SIZE};
use crate::{AtomicFlag, EngineConfig, EngineProcessTimeInfo, NFrames, ProcessMode};

/// Event port. Holds the events of the current cycle plus a queue that
/// other threads feed.
pub struct MidiPort {
    info: PortInfo,
    events: MidiEvents,
    sources: ArcSwap<Vec<PortSource<MidiPort>>>,
    channel_filter: ArcSwapOption<[bool; 16]>,
    activity: AtomicFlag,
    ring: Mutex<Option<HeapRb<MidiEvent>>>,
    block_length: AtomicU32,
}

impl fmt::Debug for MidiPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MidiPort")
            .field("info", &self.info)
            .field("active", &self.events.active_events.len())
            .field("queued", &self.events.queued_events.len())
            .field("sources", &self.sources.load().len())
            .finish_non_exhaustive()
    }
}

impl MidiPort {
    pub fn new(label: impl Into<String>, flow: PortFlow) -> Self {
        Self::with_info(PortInfo::new(label, PortType::Midi, flow))
    }

    pub fn with_info(info: PortInfo) -> Self {
        Self {
            info,
            events: MidiEvents::new(),
            sources: ArcSwap::from_pointee(Vec::new()),
            channel_filter: ArcSwapOption::empty(),
            activity: AtomicFlag::new(false),
            ring: Mutex::new(None),
            block_length: AtomicU32::new(0),
        }
    }

    #[inline]
    pub fn info(&self) -> &PortInfo {
        &self.info
    }

    /// Active and queued events. Push into `queued_events` from other threads.
    #[inline]
    pub fn events(&self) -> &MidiEvents {
        &self.events
    }

    /// Safe while a cycle runs on this port: the cycle length is only
    /// seeded on the first call.
    pub fn prepare_for_processing(&self, config: &EngineConfig) {
        let mut ring = self.ring.lock();
        if ring.is_none() {
            *ring = Some(HeapRb::new(MIDI_RING_SIZE));
            let _ = self.block_length.compare_exchange(
                0,
                config.block_length,
                Ordering::AcqRel,
                Ordering::Acquire,
            );
        }
    }

    pub fn release_resources(&self) {
        *self.ring.lock() = None;
        self.events.clear();
    }

    #[inline]
    pub fn set_block_length(&self, nframes: NFrames) {
        self.block_length.store(nframes, Ordering::Release);
    }

    /// Starts a cycle of `nframes`. Every active event of the previous cycle
    /// is dropped, whatever its time.
    pub fn begin_cycle(&self, nframes: NFrames) {
        self.set_block_length(nframes);
        self.events.active_events.clear();
    }

    /// Removes active events timed inside the window.
    pub fn clear_buffer(&self, offset: NFrames, nframes: NFrames) {
        let window = offset..offset.saturating_add(nframes);
        self.events
            .active_events
            .remove_if(|ev| window.contains(&ev.time));
    }

    /// Only events on enabled channels (index 0 is channel 1) pass from
    /// sources. `None` lets everything through.
    pub fn set_channel_filter(&self, channels: Option<[bool; 16]>) {
        self.channel_filter.store(channels.map(Arc::new));
    }

    pub(crate) fn set_sources(&self, sources: Vec<PortSource<MidiPort>>) {
        self.sources.store(Arc::new(sources));
    }

    pub fn sources(&self) -> Arc<Vec<PortSource<MidiPort>>> {
        self.sources.load_full()
    }

    pub fn process_block(&self, time_nfo: EngineProcessTimeInfo, mode: ProcessMode) {
        if mode == ProcessMode::NoRoll {
            return;
        }

        let offset = time_nfo.local_offset;
        let nframes = time_nfo.nframes;
        self.events.dequeue(offset, nframes);

        let filter = self.channel_filter.load();
        for src in self.sources.load().iter().filter(|s| s.enabled) {
            self.events.active_events.append_w_filter(
                &src.port.events.active_events,
                filter.as_deref(),
                offset,
                nframes,
            );
        }
        self.events.active_events.sort();

        let block_length = self.block_length.load(Ordering::Acquire);
        if time_nfo.end_offset() == block_length {
            if !self.events.active_events.is_empty() {
                self.activity.set(true);
            }
            self.write_ring();
            self.events.advance_queued(block_length);
        }
    }

    fn write_ring(&self) {
        let Some(mut guard) = self.ring.try_lock() else {
            return;
        };
        if let Some(ring) = guard.as_mut() {
            self.events.active_events.foreach_event(|ev| {
                ring.push_overwrite(*ev);
            });
        }
    }

    pub fn has_events(&self) -> bool {
        !self.events.active_events.is_empty()
    }

    /// Whether any event passed since the last call. UI thread.
    pub fn take_activity(&self) -> bool {
        self.activity.swap(false)
    }

    /// Drains the UI ring.
    pub fn read_ring(&self, out: &mut Vec<MidiEvent>) -> usize {
        let mut guard = self.ring.lock();
        let Some(ring) = guard.as_mut() else {
            return 0;
        };
        let before = out.len();
        out.extend(ring.pop_iter());
        out.len() - before
    }

    pub fn ring_snapshot(&self) -> Vec<MidiEvent> {
        self.ring
            .lock()
            .as_ref()
            .map(|ring| ring.iter().copied().collect())
            .unwrap_or_default()
    }
}
