//! Float buffer shared by audio and CV ports.
//!
//! A port can sit in the running graph and in a graph being built at the
//! same time, so the control thread never touches storage the audio thread
//! may be using. The first `prepare` installs storage directly; after that a
//! larger buffer is handed over and swapped in at the next cycle start, and
//! the storage it replaced is freed by the next `prepare` or `release`.

use core::ops::Range;
use core::sync::atomic::{AtomicU32, AtomicU8, AtomicUsize, Ordering};

use parking_lot::Mutex;
use ringbuf::{traits::*, HeapRb};

use super::AUDIO_RING_SIZE;
use crate::dsp;
use crate::{EngineConfig, NFrames, RtCell};

const UNALLOCATED: u8 = 0;
const INSTALLING: u8 = 1;
const INSTALLED: u8 = 2;

#[derive(Default)]
struct Handoff {
    /// Storage to install at the next cycle start.
    pending: Option<Vec<f32>>,
    /// Storage replaced on the audio thread, freed on the control thread.
    retired: Option<Vec<f32>>,
}

/// Per-cycle sample buffer plus the UI snapshot ring.
pub(crate) struct SignalBuffer {
    buf: RtCell<Vec<f32>>,
    state: AtomicU8,
    /// Length of the installed storage.
    len: AtomicUsize,
    /// Length of the newest storage, installed or pending.
    allocated: AtomicUsize,
    handoff: Mutex<Handoff>,
    ring: Mutex<Option<HeapRb<f32>>>,
    block_length: AtomicU32,
}

impl SignalBuffer {
    pub(crate) fn new() -> Self {
        Self {
            buf: RtCell::new(Vec::new()),
            state: AtomicU8::new(UNALLOCATED),
            len: AtomicUsize::new(0),
            allocated: AtomicUsize::new(0),
            handoff: Mutex::new(Handoff::default()),
            ring: Mutex::new(None),
            block_length: AtomicU32::new(0),
        }
    }

    /// Control thread. Safe while a cycle runs on this buffer.
    ///
    /// Storage only grows. A buffer already holding `max_block_length`
    /// frames is left alone.
    pub(crate) fn prepare(&self, config: &EngineConfig) {
        let size = config.max_block_length.max(config.block_length).max(1) as usize;
        {
            let mut ring = self.ring.lock();
            if ring.is_none() {
                *ring = Some(HeapRb::new(AUDIO_RING_SIZE));
            }
        }

        match self.state.compare_exchange(
            UNALLOCATED,
            INSTALLING,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                // SAFETY: cycles see no storage until the state reads INSTALLED
                unsafe { *self.buf.get_mut() = vec![0.0; size] };
                self.len.store(size, Ordering::Release);
                self.allocated.store(size, Ordering::Release);
                self.set_block_length(config.block_length);
                self.state.store(INSTALLED, Ordering::Release);
            }
            Err(_) => {
                while self.state.load(Ordering::Acquire) == INSTALLING {
                    std::hint::spin_loop();
                }
                self.request_storage(size);
            }
        }
    }

    fn request_storage(&self, size: usize) {
        let mut handoff = self.handoff.lock();
        handoff.retired = None;
        if self.allocated.load(Ordering::Acquire) >= size {
            return;
        }
        handoff.pending = Some(vec![0.0; size]);
        self.allocated.store(size, Ordering::Release);
    }

    /// Drops the storage at the next cycle start and the UI ring now.
    pub(crate) fn release(&self) {
        {
            let mut handoff = self.handoff.lock();
            handoff.retired = None;
            if self.state.load(Ordering::Acquire) == INSTALLED {
                handoff.pending = Some(Vec::new());
                self.allocated.store(0, Ordering::Release);
            }
        }
        *self.ring.lock() = None;
    }

    /// Audio thread, before any node of the cycle runs. Installs handed-over
    /// storage, then sets the cycle length.
    pub(crate) fn begin_cycle(&self, nframes: NFrames) {
        if let Some(mut handoff) = self.handoff.try_lock() {
            if let Some(next) = handoff.pending.take() {
                debug_assert!(handoff.retired.is_none());
                // SAFETY: cycle start, no node is using the storage
                let buf = unsafe { self.buf.get_mut() };
                let old = core::mem::replace(buf, next);
                self.len.store(buf.len(), Ordering::Release);
                handoff.retired = Some(old);
            }
        }
        self.set_block_length(nframes);
    }

    #[inline]
    pub(crate) fn set_block_length(&self, nframes: NFrames) {
        self.block_length.store(nframes, Ordering::Release);
    }

    #[inline]
    pub(crate) fn block_length(&self) -> NFrames {
        self.block_length.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    /// `[offset, offset + nframes)` clamped to the allocated length.
    #[inline]
    pub(crate) fn range(&self, offset: NFrames, nframes: NFrames) -> Range<usize> {
        let len = self.len();
        let start = (offset as usize).min(len);
        let end = (offset as usize + nframes as usize).min(len);
        start..end
    }

    /// # Safety
    /// No writer may be active on this buffer (see [`RtCell`]).
    #[inline]
    pub(crate) unsafe fn samples(&self) -> &[f32] {
        if self.state.load(Ordering::Acquire) != INSTALLED {
            return &[];
        }
        self.buf.get()
    }

    /// # Safety
    /// Caller is the owning node, or no cycle is running.
    #[allow(clippy::mut_from_ref)]
    #[inline]
    pub(crate) unsafe fn samples_mut(&self) -> &mut [f32] {
        if self.state.load(Ordering::Acquire) != INSTALLED {
            return &mut [];
        }
        self.buf.get_mut()
    }

    pub(crate) fn fill(&self, offset: NFrames, nframes: NFrames, value: f32) {
        let range = self.range(offset, nframes);
        // SAFETY: only the owning node clears its port
        let buf = unsafe { self.samples_mut() };
        dsp::fill(&mut buf[range], value);
    }

    /// Copies the whole block into the ring. Skips the write if a reader holds the ring.
    pub(crate) fn write_ring(&self) {
        let Some(mut guard) = self.ring.try_lock() else {
            return;
        };
        if let Some(ring) = guard.as_mut() {
            let range = self.range(0, self.block_length());
            // SAFETY: called by the owning node at the end of its block
            let buf = unsafe { self.samples() };
            ring.push_slice_overwrite(&buf[range]);
        }
    }

    /// Drains the ring. UI threads only.
    pub(crate) fn read_ring(&self, out: &mut [f32]) -> usize {
        self.ring
            .lock()
            .as_mut()
            .map(|ring| ring.pop_slice(out))
            .unwrap_or(0)
    }

    /// Samples currently in the ring, oldest first, without consuming them.
    pub(crate) fn ring_snapshot(&self) -> Vec<f32> {
        self.ring
            .lock()
            .as_ref()
            .map(|ring| ring.iter().copied().collect())
            .unwrap_or_default()
    }

    pub(crate) fn has_sound(&self) -> bool {
        let range = self.range(0, self.block_length());
        // SAFETY: read after the cycle finished
        let buf = unsafe { self.samples() };
        dsp::has_sound(&buf[range])
    }
}
