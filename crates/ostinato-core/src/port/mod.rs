//! Typed signal ports and the connections between them.
//!
//! A port is a buffer owned by one graph node. Audio and CV ports carry one
//! float per frame; MIDI ports carry a [`MidiEvents`](ostinato_midi::MidiEvents)
//! pair. During a cycle each port sums its enabled sources into its own
//! buffer in [`Port::process_block`].

mod audio;
mod connection;
mod cv;
mod midi;
mod signal;

pub use audio::AudioPort;
pub use connection::{PortConnection, PortConnectionsManager};
pub use cv::CvPort;
pub use midi::MidiPort;

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{EngineConfig, EngineProcessTimeInfo, NFrames, ProcessMode};

/// Ring capacity for audio/CV snapshots, in samples.
pub const AUDIO_RING_SIZE: usize = 65536;
/// Ring capacity for MIDI snapshots, in events.
pub const MIDI_RING_SIZE: usize = 2048;

/// Process-unique port identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortId(pub u64);

impl PortId {
    /// Allocates a fresh id.
    pub fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "port#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortType {
    Audio,
    Cv,
    Midi,
    /// Parameter port. Carries no buffer; connections to it only hold a base value.
    Control,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortFlow {
    Input,
    Output,
}

/// Value range of a port.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortRange {
    pub minf: f32,
    pub maxf: f32,
    pub zerof: f32,
}

impl Default for PortRange {
    fn default() -> Self {
        Self {
            minf: -1.0,
            maxf: 1.0,
            zerof: 0.0,
        }
    }
}

impl PortRange {
    pub fn new(minf: f32, maxf: f32, zerof: f32) -> Self {
        Self { minf, maxf, zerof }
    }

    /// Half the span. Connection multipliers scale around the centre of the
    /// range, so a multiplier of 1.0 maps a full-scale `[-1, 1]` source onto
    /// the whole range.
    #[inline]
    pub fn depth_range(&self) -> f32 {
        (self.maxf - self.minf) * 0.5
    }

    #[inline]
    pub fn contains(&self, value: f32) -> bool {
        value >= self.minf && value <= self.maxf
    }
}

/// Port metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortInfo {
    pub id: PortId,
    pub label: String,
    pub port_type: PortType,
    pub flow: PortFlow,
    pub range: PortRange,
    /// Audio only: clip the summed signal to `[-2, 2]`.
    pub requires_limiting: bool,
    /// Audio only: track the block peak for meters.
    pub metered: bool,
}

impl PortInfo {
    pub fn new(label: impl Into<String>, port_type: PortType, flow: PortFlow) -> Self {
        Self {
            id: PortId::next(),
            label: label.into(),
            port_type,
            flow,
            range: PortRange::default(),
            requires_limiting: false,
            metered: false,
        }
    }

    pub fn with_range(mut self, range: PortRange) -> Self {
        self.range = range;
        self
    }

    pub fn with_limiting(mut self) -> Self {
        self.requires_limiting = true;
        self
    }

    pub fn with_metering(mut self) -> Self {
        self.metered = true;
        self
    }

    #[inline]
    pub fn is_input(&self) -> bool {
        self.flow == PortFlow::Input
    }

    #[inline]
    pub fn is_output(&self) -> bool {
        self.flow == PortFlow::Output
    }
}

/// An incoming connection as seen by the destination port during a cycle.
#[derive(Debug)]
pub struct PortSource<P> {
    pub port: Arc<P>,
    pub multiplier: f32,
    pub enabled: bool,
}

impl<P> Clone for PortSource<P> {
    fn clone(&self) -> Self {
        Self {
            port: Arc::clone(&self.port),
            multiplier: self.multiplier,
            enabled: self.enabled,
        }
    }
}

/// A port of any signal type.
#[derive(Debug, Clone)]
pub enum Port {
    Audio(Arc<AudioPort>),
    Cv(Arc<CvPort>),
    Midi(Arc<MidiPort>),
}

impl Port {
    pub fn info(&self) -> &PortInfo {
        match self {
            Port::Audio(p) => p.info(),
            Port::Cv(p) => p.info(),
            Port::Midi(p) => p.info(),
        }
    }

    #[inline]
    pub fn id(&self) -> PortId {
        self.info().id
    }

    #[inline]
    pub fn port_type(&self) -> PortType {
        self.info().port_type
    }

    pub fn label(&self) -> &str {
        &self.info().label
    }

    /// Allocates buffers for `config.max_block_length` frames. May run while
    /// another graph processes this port; grown buffers take effect at the
    /// next [`begin_cycle`](Self::begin_cycle).
    pub fn prepare_for_processing(&self, config: &EngineConfig) {
        match self {
            Port::Audio(p) => p.prepare_for_processing(config),
            Port::Cv(p) => p.prepare_for_processing(config),
            Port::Midi(p) => p.prepare_for_processing(config),
        }
    }

    pub fn release_resources(&self) {
        match self {
            Port::Audio(p) => p.release_resources(),
            Port::Cv(p) => p.release_resources(),
            Port::Midi(p) => p.release_resources(),
        }
    }

    /// Sets the length of the coming cycle and clears it. Audio thread, before
    /// any node of the cycle runs.
    pub fn begin_cycle(&self, nframes: NFrames) {
        match self {
            Port::Audio(p) => p.begin_cycle(nframes),
            Port::Cv(p) => p.begin_cycle(nframes),
            Port::Midi(p) => p.begin_cycle(nframes),
        }
    }

    pub fn clear_buffer(&self, offset: NFrames, nframes: NFrames) {
        match self {
            Port::Audio(p) => p.clear_buffer(offset, nframes),
            Port::Cv(p) => p.clear_buffer(offset, nframes),
            Port::Midi(p) => p.clear_buffer(offset, nframes),
        }
    }

    pub fn process_block(&self, time_nfo: EngineProcessTimeInfo, mode: ProcessMode) {
        match self {
            Port::Audio(p) => p.process_block(time_nfo, mode),
            Port::Cv(p) => p.process_block(time_nfo, mode),
            Port::Midi(p) => p.process_block(time_nfo, mode),
        }
    }

    /// Audio/CV: any sample above the audibility threshold. MIDI: any active event.
    pub fn has_sound(&self) -> bool {
        match self {
            Port::Audio(p) => p.has_sound(),
            Port::Cv(p) => p.has_sound(),
            Port::Midi(p) => p.has_events(),
        }
    }
}

impl From<Arc<AudioPort>> for Port {
    fn from(port: Arc<AudioPort>) -> Self {
        Port::Audio(port)
    }
}

impl From<Arc<CvPort>> for Port {
    fn from(port: Arc<CvPort>) -> Self {
        Port::Cv(port)
    }
}

impl From<Arc<MidiPort>> for Port {
    fn from(port: Arc<MidiPort>) -> Self {
        Port::Midi(port)
    }
}
