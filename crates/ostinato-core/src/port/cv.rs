//! Control-voltage port.

use core::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;

use super::signal::SignalBuffer;
use super::{PortFlow, PortInfo, PortRange, PortSource, PortType};
use crate::dsp::{self, UNITY_GAIN_EPSILON};
use crate::{EngineConfig, EngineProcessTimeInfo, NFrames, ProcessMode};

/// Sample-accurate modulation signal.
///
/// Source signals are treated as `[-1, 1]` and scaled by the port's
/// [`depth_range`](PortRange::depth_range) times the connection multiplier.
/// The summed chunk is clipped to `[minf, maxf]` whenever it leaves the range.
pub struct CvPort {
    info: PortInfo,
    buffer: SignalBuffer,
    sources: ArcSwap<Vec<PortSource<CvPort>>>,
}

impl fmt::Debug for CvPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CvPort")
            .field("info", &self.info)
            .field("sources", &self.sources.load().len())
            .finish_non_exhaustive()
    }
}

impl CvPort {
    pub fn new(label: impl Into<String>, flow: PortFlow) -> Self {
        Self::with_info(PortInfo::new(label, PortType::Cv, flow))
    }

    pub fn with_range(label: impl Into<String>, flow: PortFlow, range: PortRange) -> Self {
        Self::with_info(PortInfo::new(label, PortType::Cv, flow).with_range(range))
    }

    pub fn with_info(info: PortInfo) -> Self {
        Self {
            info,
            buffer: SignalBuffer::new(),
            sources: ArcSwap::from_pointee(Vec::new()),
        }
    }

    #[inline]
    pub fn info(&self) -> &PortInfo {
        &self.info
    }

    #[inline]
    pub fn range(&self) -> PortRange {
        self.info.range
    }

    pub fn prepare_for_processing(&self, config: &EngineConfig) {
        self.buffer.prepare(config);
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

    pub fn clear_buffer(&self, offset: NFrames, nframes: NFrames) {
        self.buffer.fill(offset, nframes, 0.0);
    }

    pub(crate) fn set_sources(&self, sources: Vec<PortSource<CvPort>>) {
        self.sources.store(Arc::new(sources));
    }

    pub fn sources(&self) -> Arc<Vec<PortSource<CvPort>>> {
        self.sources.load_full()
    }

    pub fn process_block(&self, time_nfo: EngineProcessTimeInfo, mode: ProcessMode) {
        let range = self.buffer.range(time_nfo.local_offset, time_nfo.nframes);

        if mode == ProcessMode::NoRoll {
            self.buffer
                .fill(time_nfo.local_offset, time_nfo.nframes, 0.0);
        } else {
            let PortRange { minf, maxf, .. } = self.info.range;
            let depth = self.info.range.depth_range();
            // SAFETY: this node owns the buffer; sources finished before us
            let dest = unsafe { &mut self.buffer.samples_mut()[range] };
            for src in self.sources.load().iter().filter(|s| s.enabled) {
                let multiplier = depth * src.multiplier;
                let src_range = src.port.buffer.range(time_nfo.local_offset, time_nfo.nframes);
                let src_buf = unsafe { &src.port.buffer.samples()[src_range] };
                if dsp::floats_near(multiplier, 1.0, UNITY_GAIN_EPSILON) {
                    dsp::add2(dest, src_buf);
                } else {
                    dsp::mix_product(dest, src_buf, multiplier);
                }
            }
            dsp::clip_if_out_of_range(dest, minf, maxf);
        }

        if time_nfo.end_offset() == self.buffer.block_length() {
            self.buffer.write_ring();
        }
    }

    /// Copies the current cycle's values. For inspection outside a cycle.
    pub fn snapshot(&self) -> Vec<f32> {
        let range = self.buffer.range(0, self.buffer.block_length());
        // SAFETY: only valid between cycles
        unsafe { self.buffer.samples()[range].to_vec() }
    }

    /// # Safety
    /// Only the owning node, inside its process call or outside any cycle.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn buffer_mut(&self) -> &mut [f32] {
        self.buffer.samples_mut()
    }

    /// # Safety
    /// The owning node must have finished this cycle.
    pub unsafe fn buffer(&self) -> &[f32] {
        self.buffer.samples()
    }

    pub fn has_sound(&self) -> bool {
        self.buffer.has_sound()
    }

    pub fn read_ring(&self, out: &mut [f32]) -> usize {
        self.buffer.read_ring(out)
    }

    pub fn ring_snapshot(&self) -> Vec<f32> {
        self.buffer.ring_snapshot()
    }
}
