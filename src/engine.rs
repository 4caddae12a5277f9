//! OstinatoEngine that ties the graph, scheduler, transport and connections together.

use std::sync::Arc;

use crate::core::{
    EngineConfig, Graph, GraphDispatcher, GraphScheduler, NFrames, PortConnectionsManager,
    SchedulerConfig, TransportManager,
};
use crate::Result;

/// Owns one processing graph and everything needed to run it.
///
/// Control-thread methods take `&self`; [`process`](Self::process) is the
/// audio-thread entry and takes `&mut self`, as does
/// [`reconfigure`](Self::reconfigure), which must not overlap a cycle.
///
/// # Example
///
/// ```
/// use ostinato::prelude::*;
/// use std::sync::Arc;
///
/// let mut engine = OstinatoEngine::builder().block_length(128).build().unwrap();
///
/// let out = Arc::new(AudioPort::new("Master Out", PortFlow::Output));
/// engine
///     .graph(|graph| {
///         graph.add_port(Port::Audio(out.clone()));
///         Ok(())
///     })
///     .unwrap();
///
/// engine.transport().request_roll();
/// assert_eq!(engine.process(128).unwrap(), 128);
/// ```
pub struct OstinatoEngine {
    config: EngineConfig,
    transport: Arc<TransportManager>,
    connections: Arc<PortConnectionsManager>,
    scheduler: Arc<GraphScheduler>,
    dispatcher: GraphDispatcher,
}

impl OstinatoEngine {
    pub fn builder() -> crate::OstinatoEngineBuilder {
        crate::OstinatoEngineBuilder::default()
    }

    pub(crate) fn from_parts(config: EngineConfig, scheduler: SchedulerConfig) -> Result<Self> {
        let transport = Arc::new(TransportManager::new());
        let scheduler = Arc::new(GraphScheduler::new(scheduler)?);
        let dispatcher =
            GraphDispatcher::new(Arc::clone(&scheduler), Arc::clone(&transport), config)?;
        tracing::info!(
            "Engine ready: {} Hz, block {}, {} worker threads",
            config.sample_rate,
            config.block_length,
            scheduler.worker_threads()
        );
        Ok(Self {
            config,
            transport,
            connections: Arc::new(PortConnectionsManager::default()),
            scheduler,
            dispatcher,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    pub fn transport(&self) -> &Arc<TransportManager> {
        &self.transport
    }

    pub fn connections(&self) -> &Arc<PortConnectionsManager> {
        &self.connections
    }

    pub fn scheduler(&self) -> &Arc<GraphScheduler> {
        &self.scheduler
    }

    /// The graph currently run by the audio thread.
    pub fn current_graph(&self) -> Option<Arc<Graph>> {
        self.scheduler.graph()
    }

    /// Builds a fresh graph and swaps it in.
    ///
    /// `build` adds nodes, ports and node edges. Port edges come from
    /// [`connections`](Self::connections). The graph is then finalized,
    /// prepared and published; the previous one is dropped once no cycle
    /// uses it.
    pub fn graph<R>(&self, build: impl FnOnce(&mut Graph) -> Result<R>) -> Result<R> {
        let mut graph = Graph::new(self.transport.clone());
        let ret = build(&mut graph)?;
        graph.connect_ports(&self.connections)?;
        graph.finalize()?;
        graph.prepare_for_processing(&self.config);
        self.scheduler.rechain(graph)?;
        let dropped = self.scheduler.collect_garbage();
        if dropped > 0 {
            tracing::debug!("Dropped {} retired graphs", dropped);
        }
        Ok(ret)
    }

    /// Applies a new configuration between cycles.
    ///
    /// Port buffers of the running graph grow to the new
    /// `max_block_length`; the grown buffers are swapped in at the start of
    /// the next cycle, never during one. Buffers are not shrunk.
    pub fn reconfigure(&mut self, config: EngineConfig) -> Result<()> {
        config.validate()?;
        if let Some(graph) = self.scheduler.graph() {
            graph.prepare_for_processing(&config);
        }
        self.dispatcher.set_config(config)?;
        self.config = config;
        tracing::info!(
            "Engine reconfigured: {} Hz, block {}, max block {}",
            config.sample_rate,
            config.block_length,
            config.max_block_length
        );
        Ok(())
    }

    /// Raises or lowers the largest cycle [`process`](Self::process) accepts.
    pub fn set_max_block_length(&mut self, max_block_length: NFrames) -> Result<()> {
        self.reconfigure(EngineConfig {
            max_block_length,
            ..self.config
        })
    }

    /// Pushes multiplier and enable changes to the running graph without a rebuild.
    pub fn refresh_connections(&self) {
        if let Some(graph) = self.scheduler.graph() {
            graph.refresh_port_sources(&self.connections);
        }
    }

    /// Reports MIDI events dropped on full port queues since the last call.
    pub fn take_dropped_midi_events(&self) -> usize {
        self.scheduler
            .graph()
            .map_or(0, |graph| graph.take_dropped_midi_events())
    }

    /// Runs one cycle. Returns the frames the playhead moved.
    pub fn process(&mut self, nframes: NFrames) -> Result<NFrames> {
        Ok(self.dispatcher.process(nframes)?)
    }

    pub fn remaining_latency_preroll(&self) -> NFrames {
        self.dispatcher.remaining_latency_preroll()
    }

    pub fn cycle(&self) -> u64 {
        self.dispatcher.cycle()
    }
}
