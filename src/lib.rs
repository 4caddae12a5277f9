//! # Ostinato - Real-time DSP Graph Engine
//!
//! Latency-compensated processing graph with typed ports and MIDI queues.
//!
//! ## Architecture
//!
//! Ostinato is an umbrella crate over:
//! - **ostinato-core** - graph, scheduler, dispatcher, ports, connections, transport
//! - **ostinato-midi** - timestamped MIDI events and the lock-protected event vector
//!
//! ## Quick Start
//!
//! ```
//! use ostinato::prelude::*;
//! use std::sync::Arc;
//!
//! let mut engine = OstinatoEngine::builder().block_length(256).build().unwrap();
//!
//! let synth_out = Arc::new(AudioPort::new("Synth Out", PortFlow::Output));
//! let master_in = Arc::new(AudioPort::new("Master In", PortFlow::Input));
//! engine
//!     .connections()
//!     .connect(PortConnection::new(synth_out.info().id, master_in.info().id).with_multiplier(0.5))
//!     .unwrap();
//!
//! engine
//!     .graph(|graph| {
//!         graph.add_port(Port::Audio(synth_out.clone()));
//!         graph.add_port(Port::Audio(master_in.clone()));
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! engine.transport().request_roll();
//! engine.process(256).unwrap();
//! ```

/// Re-export of ostinato-core for direct access
pub use ostinato_core as core;

/// Re-export of ostinato-midi for direct access
pub use ostinato_midi as midi;

pub use ostinato_core::{
    // Lock-free primitives
    AtomicFlag,
    AtomicFloat,

    // Graph
    AudioPassthroughProcessor,
    DelayBuffer,
    EngineConfig,
    EngineProcessTimeInfo,
    Graph,
    GraphDispatcher,
    GraphNode,
    GraphScheduler,
    MidiPassthroughProcessor,
    NFrames,
    NodeId,
    ProcessMode,
    SchedulerConfig,

    // Ports
    AudioPort,
    CvPort,
    MidiPort,
    Port,
    PortConnection,
    PortConnectionsManager,
    PortFlow,
    PortId,
    PortInfo,
    PortRange,
    PortType,

    // Transport
    PlayState,
    Transport,
    TransportManager,
};

pub use ostinato_midi::{MidiEvent, MidiEventVector, MidiEvents, MidiTime};

mod error;
pub use error::{Error, Result};

mod builder;
mod engine;

pub use builder::OstinatoEngineBuilder;
pub use engine::OstinatoEngine;

/// Convenience prelude for common imports
pub mod prelude {
    // Main engine
    pub use crate::{OstinatoEngine, OstinatoEngineBuilder};

    // Graph
    pub use crate::core::{EngineProcessTimeInfo, Graph, NFrames, ProcessMode};

    // Ports
    pub use crate::core::{
        AudioPort, CvPort, MidiPort, Port, PortConnection, PortFlow, PortInfo, PortRange,
    };

    // Transport
    pub use crate::core::{Transport, TransportManager};

    // MIDI
    pub use crate::midi::{MidiEvent, MidiEvents};
}
