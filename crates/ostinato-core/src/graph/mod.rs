//! Latency-compensated processing graph.
//!
//! A [`Graph`] is an arena of [`GraphNode`]s connected by edges. Each node
//! wraps a process callback and reports its own playback latency. Once
//! finalized, the graph knows for every node the largest latency between
//! that node and the graph outputs (its route latency).
//!
//! Scheduling uses per-node atomic refcounts: a node becomes ready when its
//! last parent has finished. [`GraphScheduler`] runs ready nodes inline or
//! on a worker pool, and [`GraphDispatcher`] splits each hardware cycle into
//! chunks so that routes with less latency wait until the slower ones catch up.

mod collection;
mod dispatcher;
mod node;
mod scheduler;

pub use collection::Graph;
pub use dispatcher::GraphDispatcher;
pub use node::{GraphNode, LatencyGetter, NameGetter, NodeId, ProcessFunc, ProcessMode};
pub use scheduler::{GraphScheduler, MAX_QUEUED_JOBS};
