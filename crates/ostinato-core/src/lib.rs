//! Real-time DSP graph kernel with latency compensation.
//!
//! # Primary API
//!
//! - [`Graph`]: node arena, edges, topological sort and route latencies
//! - [`GraphScheduler`]: publishes graphs to the audio thread, runs nodes inline or on workers
//! - [`GraphDispatcher`]: per-cycle entry point with latency preroll
//! - [`AudioPort`], [`CvPort`], [`MidiPort`]: typed buffers that sum their sources
//! - [`PortConnectionsManager`]: connection table with multipliers and enable flags
//! - [`Transport`]: timeline contract, implemented by [`TransportManager`]
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use ostinato_core::{EngineConfig, Graph, GraphDispatcher, GraphScheduler, SchedulerConfig,
//!     TransportManager};
//!
//! let transport = Arc::new(TransportManager::new());
//! let mut graph = Graph::new(transport.clone());
//! graph.add_node(Box::new(|| "synth".into()), Box::new(|_, _| {}), Box::new(|| 0));
//! graph.finalize().unwrap();
//!
//! let scheduler = Arc::new(GraphScheduler::new(SchedulerConfig::default()).unwrap());
//! scheduler.rechain(graph).unwrap();
//!
//! let mut dispatcher =
//!     GraphDispatcher::new(scheduler, transport.clone(), EngineConfig::new(48000, 256)).unwrap();
//! transport.request_roll();
//! assert_eq!(dispatcher.process(256).unwrap(), 256);
//! ```

pub mod config;
pub mod dsp;
pub mod error;
pub mod graph;
pub(crate) mod lockfree;
pub mod pdc;
pub mod port;
pub mod processors;
pub mod time;
pub mod transport;

pub use config::{EngineConfig, SchedulerConfig};
pub use error::{Error, Result};
pub use lockfree::{AtomicFlag, AtomicFloat, RtCell};
pub use time::{EngineProcessTimeInfo, NFrames, SignedFrame, UnsignedFrame};

pub use graph::{
    Graph, GraphDispatcher, GraphNode, GraphScheduler, LatencyGetter, NameGetter, NodeId,
    ProcessFunc, ProcessMode, MAX_QUEUED_JOBS,
};
pub use pdc::DelayBuffer;
pub use port::{
    AudioPort, CvPort, MidiPort, Port, PortConnection, PortConnectionsManager, PortFlow, PortId,
    PortInfo, PortRange, PortSource, PortType,
};
pub use processors::{AudioPassthroughProcessor, MidiPassthroughProcessor};
pub use transport::{PlayState, Transport, TransportManager};

pub use ostinato_midi as midi;
