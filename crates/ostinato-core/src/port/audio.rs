//! Audio port.

use core::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use super::signal::SignalBuffer;
use super::{PortFlow, PortInfo, PortSource, PortType};
use crate::dsp::{self, PeakFallSmooth, DENORMAL_PREVENTION_VAL, UNITY_GAIN_EPSILON};
use crate::{AtomicFloat, EngineConfig, EngineProcessTimeInfo, NFrames, ProcessMode};

/// Peak meter reads per second assumed by the falloff.
const METER_READS_PER_SECOND: f32 = 20.0;
const METER_FALLOFF_HZ: f32 = 3.0;
/// Limit applied to ports created with [`PortInfo::with_limiting`].
const LIMIT: f32 = 2.0;

/// One channel of audio. Sums its connected sources every cycle.
pub struct AudioPort {
    info: PortInfo,
    buffer: SignalBuffer,
    sources: ArcSwap<Vec<PortSource<AudioPort>>>,
    peak: AtomicFloat,
    meter: Mutex<PeakFallSmooth>,
}

impl fmt::Debug for AudioPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioPort")
            .field("info", &self.info)
            .field("sources", &self.sources.load().len())
            .finish_non_exhaustive()
    }
}

impl AudioPort {
    pub fn new(label: impl Into<String>, flow: PortFlow) -> Self {
        Self::with_info(PortInfo::new(label, PortType::Audio, flow))
    }

    pub fn with_info(info: PortInfo) -> Self {
        let mut meter = PeakFallSmooth::default();
        meter.calculate_coeff(METER_FALLOFF_HZ, METER_READS_PER_SECOND);
        Self {
            info,
            buffer: SignalBuffer::new(),
            sources: ArcSwap::from_pointee(Vec::new()),
            peak: AtomicFloat::new(0.0),
            meter: Mutex::new(meter),
        }
    }

    #[inline]
    pub fn info(&self) -> &PortInfo {
        &self.info
    }

    pub fn prepare_for_processing(&self, config: &EngineConfig) {
        self.buffer.prepare(config);
        self.peak.set(0.0);
    }

    pub fn release_resources(&self) {
        self.buffer.release();
    }

    #[inline]
    pub fn set_block_length(&self, nframes: NFrames) {
        self.buffer.set_block_length(nframes);
    }

    /// Starts a cycle of `nframes`. Storage grown by a later
    /// [`prepare_for_processing`](Self::prepare_for_processing) is installed
    /// here, then the block is cleared.
    pub fn begin_cycle(&self, nframes: NFrames) {
        self.buffer.begin_cycle(nframes);
        self.clear_buffer(0, nframes);
    }

    /// Fills the window with the denormal-prevention value.
    pub fn clear_buffer(&self, offset: NFrames, nframes: NFrames) {
        self.buffer.fill(offset, nframes, DENORMAL_PREVENTION_VAL);
    }

    /// Replaces the summed sources. Control thread.
    pub(crate) fn set_sources(&self, sources: Vec<PortSource<AudioPort>>) {
        self.sources.store(Arc::new(sources));
    }

    pub fn sources(&self) -> Arc<Vec<PortSource<AudioPort>>> {
        self.sources.load_full()
    }

    pub fn process_block(&self, time_nfo: EngineProcessTimeInfo, mode: ProcessMode) {
        let range = self.buffer.range(time_nfo.local_offset, time_nfo.nframes);

        if mode == ProcessMode::NoRoll {
            self.buffer.fill(
                time_nfo.local_offset,
                time_nfo.nframes,
                DENORMAL_PREVENTION_VAL,
            );
        } else {
            // SAFETY: this node owns the buffer; sources finished before us
            let dest = unsafe { &mut self.buffer.samples_mut()[range.clone()] };
            for src in self.sources.load().iter().filter(|s| s.enabled) {
                let src_range = src.port.buffer.range(time_nfo.local_offset, time_nfo.nframes);
                let src_buf = unsafe { &src.port.buffer.samples()[src_range] };
                if dsp::floats_near(src.multiplier, 1.0, UNITY_GAIN_EPSILON) {
                    dsp::add2(dest, src_buf);
                } else {
                    dsp::mix_product(dest, src_buf, src.multiplier);
                }
            }

            if self.info.requires_limiting {
                dsp::clip_if_out_of_range(dest, -LIMIT, LIMIT);
            }
            if self.info.metered {
                self.peak.fetch_max(dsp::abs_max(dest));
            }
        }

        if time_nfo.end_offset() == self.buffer.block_length() {
            self.buffer.write_ring();
        }
    }

    /// Copies the current cycle's samples. For inspection outside a cycle.
    pub fn snapshot(&self) -> Vec<f32> {
        let range = self.buffer.range(0, self.buffer.block_length());
        // SAFETY: only valid between cycles
        unsafe { self.buffer.samples()[range].to_vec() }
    }

    /// Buffer for the owning node's process function.
    ///
    /// # Safety
    /// Only the node that owns this port may call it, and only inside its
    /// process call (or outside any cycle).
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn buffer_mut(&self) -> &mut [f32] {
        self.buffer.samples_mut()
    }

    /// Buffer for nodes scheduled after the owner.
    ///
    /// # Safety
    /// The owning node must have finished this cycle.
    pub unsafe fn buffer(&self) -> &[f32] {
        self.buffer.samples()
    }

    pub fn has_sound(&self) -> bool {
        self.buffer.has_sound()
    }

    /// Drains the UI ring into `out`. Returns the number of samples read.
    pub fn read_ring(&self, out: &mut [f32]) -> usize {
        self.buffer.read_ring(out)
    }

    pub fn ring_snapshot(&self) -> Vec<f32> {
        self.buffer.ring_snapshot()
    }

    /// Peak since the last call, with falloff. UI thread.
    pub fn meter_value(&self) -> f32 {
        let peak = self.peak.swap(0.0);
        let mut meter = self.meter.lock();
        meter.set_value(peak);
        meter.smoothed_value()
    }
}
