//! Error types for ostinato-core.

use thiserror::Error;

use crate::port::{PortId, PortType};
use crate::{NFrames, UnsignedFrame};

/// Error type for graph construction and engine setup.
///
/// None of these are produced while a cycle is running.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid loop range: start={start}, end={end}")]
    InvalidLoopRange {
        start: UnsignedFrame,
        end: UnsignedFrame,
    },

    #[error("Graph contains a cycle through node '{0}'")]
    GraphCycle(String),

    #[error("Unknown node: {0}")]
    UnknownNode(usize),

    #[error("Node {0} cannot connect to itself")]
    SelfEdge(usize),

    #[error("Edge {src} -> {dest} already exists")]
    DuplicateEdge { src: usize, dest: usize },

    #[error("Port {0} cannot connect to itself")]
    SelfConnection(PortId),

    #[error("Unknown port: {0}")]
    UnknownPort(PortId),

    #[error("Cannot connect {src_type:?} port {src} to {dest_type:?} port {dest}")]
    IncompatiblePorts {
        src: PortId,
        src_type: PortType,
        dest: PortId,
        dest_type: PortType,
    },

    #[error("Graph must be finalized before it can be processed")]
    GraphNotFinalized,

    #[error("Block of {nframes} frames exceeds the maximum block length {max}")]
    BlockLengthExceeded { nframes: NFrames, max: NFrames },

    #[error("Failed to spawn worker thread: {0}")]
    WorkerSpawn(String),
}

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;
