//! Graph construction, validation and the per-node trigger protocol.

use std::collections::VecDeque;
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender};
use hashbrown::HashMap;

use super::node::{GraphNode, LatencyGetter, NameGetter, NodeId, ProcessFunc};
use crate::port::{Port, PortConnectionsManager, PortId, PortSource, PortType};
use crate::transport::Transport;
use crate::{EngineConfig, EngineProcessTimeInfo, Error, NFrames, Result};

/// Arena of [`GraphNode`]s with their edges.
///
/// Built on the control thread, then [`finalize`](Self::finalize)d and handed
/// to a [`GraphScheduler`](super::GraphScheduler). Topology never changes
/// after that; a new graph is built and swapped in instead.
pub struct Graph {
    nodes: Vec<GraphNode>,
    ports: HashMap<PortId, (NodeId, Port)>,
    transport: Arc<dyn Transport>,

    initial_nodes: Vec<NodeId>,
    terminal_nodes: Vec<NodeId>,
    topo_order: Vec<NodeId>,
    max_route_playback_latency: NFrames,
    finalized: bool,

    ready_tx: Sender<NodeId>,
    ready_rx: Receiver<NodeId>,
}

impl core::fmt::Debug for Graph {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Graph")
            .field("nodes", &self.nodes.len())
            .field("ports", &self.ports.len())
            .field("initial_nodes", &self.initial_nodes)
            .field("terminal_nodes", &self.terminal_nodes)
            .field("max_route_playback_latency", &self.max_route_playback_latency)
            .field("finalized", &self.finalized)
            .finish()
    }
}

impl Graph {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let (ready_tx, ready_rx) = bounded(1);
        Self {
            nodes: Vec::new(),
            ports: HashMap::new(),
            transport,
            initial_nodes: Vec::new(),
            terminal_nodes: Vec::new(),
            topo_order: Vec::new(),
            max_route_playback_latency: 0,
            finalized: false,
            ready_tx,
            ready_rx,
        }
    }

    /// Adds a node running `process_func` every chunk.
    pub fn add_node(
        &mut self,
        name_getter: NameGetter,
        process_func: ProcessFunc,
        latency_getter: LatencyGetter,
    ) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(GraphNode::new(
            id,
            name_getter,
            Arc::clone(&self.transport),
            process_func,
            latency_getter,
        ));
        self.finalized = false;
        id
    }

    /// Adds a node that sums the port's sources. Adding the same port twice
    /// returns the existing node.
    pub fn add_port(&mut self, port: Port) -> NodeId {
        if let Some((id, _)) = self.ports.get(&port.id()) {
            return *id;
        }
        let label = port.label().to_owned();
        let runner = port.clone();
        let id = self.add_node(
            Box::new(move || label.clone()),
            Box::new(move |time_nfo, mode| runner.process_block(time_nfo, mode)),
            Box::new(|| 0),
        );
        self.ports.insert(port.id(), (id, port));
        id
    }

    /// Adds the edge `src -> dest`: `dest` runs after `src` in every chunk.
    pub fn connect(&mut self, src: NodeId, dest: NodeId) -> Result<()> {
        if src >= self.nodes.len() {
            return Err(Error::UnknownNode(src));
        }
        if dest >= self.nodes.len() {
            return Err(Error::UnknownNode(dest));
        }
        if src == dest {
            return Err(Error::SelfEdge(src));
        }
        if self.nodes[src].childnodes.contains(&dest) {
            return Err(Error::DuplicateEdge { src, dest });
        }

        self.nodes[src].childnodes.push(dest);
        self.nodes[dest].parentnodes.push(src);
        self.nodes[dest].init_refcount += 1;
        self.finalized = false;
        Ok(())
    }

    /// Adds an edge for every connection between ports of this graph, then
    /// hands each port its sources.
    ///
    /// Both ends of every connection must have been added with
    /// [`add_port`](Self::add_port).
    pub fn connect_ports(&mut self, connections: &PortConnectionsManager) -> Result<()> {
        for conn in connections.connections() {
            let (src_node, src_type) = self.port_entry(conn.src)?;
            let (dest_node, dest_type) = self.port_entry(conn.dest)?;
            if src_type != dest_type {
                return Err(Error::IncompatiblePorts {
                    src: conn.src,
                    src_type,
                    dest: conn.dest,
                    dest_type,
                });
            }
            match self.connect(src_node, dest_node) {
                Ok(()) | Err(Error::DuplicateEdge { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        self.refresh_port_sources(connections);
        Ok(())
    }

    fn port_entry(&self, id: PortId) -> Result<(NodeId, PortType)> {
        self.ports
            .get(&id)
            .map(|(node, port)| (*node, port.port_type()))
            .ok_or(Error::UnknownPort(id))
    }

    /// Re-reads multipliers and enabled flags from `connections`.
    ///
    /// Safe while the graph is running. Connections without a matching edge
    /// in this graph are ignored until the graph is rebuilt.
    pub fn refresh_port_sources(&self, connections: &PortConnectionsManager) {
        for (dest_node, port) in self.ports.values() {
            let conns = connections.sources_of(port.id());
            let parents = &self.nodes[*dest_node].parentnodes;
            let sources = conns.iter().filter_map(|conn| {
                let (src_node, src_port) = self.ports.get(&conn.src)?;
                if !parents.contains(src_node) {
                    tracing::warn!(
                        "Connection {} -> {} has no graph edge, ignoring",
                        conn.src,
                        conn.dest
                    );
                    return None;
                }
                Some((src_port, conn.multiplier, conn.enabled))
            });

            match port {
                Port::Audio(dest) => dest.set_sources(
                    sources
                        .filter_map(|(src, multiplier, enabled)| match src {
                            Port::Audio(p) => Some(PortSource {
                                port: Arc::clone(p),
                                multiplier,
                                enabled,
                            }),
                            _ => None,
                        })
                        .collect(),
                ),
                Port::Cv(dest) => dest.set_sources(
                    sources
                        .filter_map(|(src, multiplier, enabled)| match src {
                            Port::Cv(p) => Some(PortSource {
                                port: Arc::clone(p),
                                multiplier,
                                enabled,
                            }),
                            _ => None,
                        })
                        .collect(),
                ),
                Port::Midi(dest) => dest.set_sources(
                    sources
                        .filter_map(|(src, multiplier, enabled)| match src {
                            Port::Midi(p) => Some(PortSource {
                                port: Arc::clone(p),
                                multiplier,
                                enabled,
                            }),
                            _ => None,
                        })
                        .collect(),
                ),
            }
        }
    }

    /// Validates the graph and prepares it for scheduling.
    ///
    /// Fails with [`Error::GraphCycle`] if the edges are not acyclic.
    pub fn finalize(&mut self) -> Result<()> {
        let mut indegree: Vec<usize> = self.nodes.iter().map(|n| n.init_refcount).collect();
        let mut queue: VecDeque<NodeId> = (0..self.nodes.len())
            .filter(|&id| indegree[id] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(id) = queue.pop_front() {
            order.push(id);
            for &child in &self.nodes[id].childnodes {
                indegree[child] -= 1;
                if indegree[child] == 0 {
                    queue.push_back(child);
                }
            }
        }

        if order.len() < self.nodes.len() {
            let stuck = indegree
                .iter()
                .position(|&d| d > 0)
                .map(|id| self.nodes[id].name())
                .unwrap_or_default();
            return Err(Error::GraphCycle(stuck));
        }

        self.initial_nodes.clear();
        self.terminal_nodes.clear();
        for node in &mut self.nodes {
            node.initial = node.parentnodes.is_empty();
            node.terminal = node.childnodes.is_empty();
            if node.initial {
                self.initial_nodes.push(node.id());
            }
            if node.terminal {
                self.terminal_nodes.push(node.id());
            }
            node.reset_refcount();
        }
        self.topo_order = order;

        let (ready_tx, ready_rx) = bounded(self.nodes.len().max(1));
        self.ready_tx = ready_tx;
        self.ready_rx = ready_rx;

        self.update_latencies();
        self.finalized = true;

        tracing::info!(
            "Graph finalized: {} nodes, {} initial, {} terminal, max route latency {}",
            self.nodes.len(),
            self.initial_nodes.len(),
            self.terminal_nodes.len(),
            self.max_route_playback_latency
        );
        Ok(())
    }

    /// Re-queries every node's latency and recomputes route latencies.
    pub fn update_latencies(&mut self) {
        for node in &mut self.nodes {
            node.playback_latency = node.single_playback_latency();
            node.route_playback_latency = 0;
        }

        for &id in self.topo_order.iter().rev() {
            let downstream = self.nodes[id]
                .childnodes
                .iter()
                .map(|&child| self.nodes[child].route_playback_latency)
                .max()
                .unwrap_or(0);
            self.nodes[id].set_route_playback_latency(downstream);
        }

        self.max_route_playback_latency = self
            .initial_nodes
            .iter()
            .map(|&id| self.nodes[id].route_playback_latency)
            .max()
            .unwrap_or(0);
        tracing::debug!(
            "Max route playback latency: {}",
            self.max_route_playback_latency
        );
    }

    /// Largest route latency of any initial node. Preroll length when rolling starts.
    pub fn max_route_playback_latency(&self) -> NFrames {
        self.max_route_playback_latency
    }

    /// Sizes every port for `config`. Safe while another graph sharing these
    /// ports is processing: grown buffers are swapped in at cycle start.
    pub fn prepare_for_processing(&self, config: &EngineConfig) {
        for (_, port) in self.ports.values() {
            port.prepare_for_processing(config);
        }
    }

    /// Frees port buffers from their next cycle start on.
    pub fn release_resources(&self) {
        for (_, port) in self.ports.values() {
            port.release_resources();
        }
    }

    /// Collects and resets the overflow counters of every MIDI port.
    ///
    /// Call from the control thread. Returns the total number of events
    /// dropped since the last call.
    pub fn take_dropped_midi_events(&self) -> usize {
        let mut total = 0;
        for (_, port) in self.ports.values() {
            if let Port::Midi(midi) = port {
                let events = midi.events();
                let dropped = events.active_events.take_dropped_count()
                    + events.queued_events.take_dropped_count();
                if dropped > 0 {
                    tracing::warn!("MIDI port {} dropped {} events", port.id(), dropped);
                }
                total += dropped;
            }
        }
        total
    }

    /// Starts a cycle of `nframes` on every port.
    pub fn clear_port_buffers(&self, nframes: NFrames) {
        for (_, port) in self.ports.values() {
            port.begin_cycle(nframes);
        }
    }

    pub fn set_bypass(&self, node: NodeId, bypass: bool) -> Result<()> {
        self.nodes
            .get(node)
            .ok_or(Error::UnknownNode(node))?
            .set_bypass(bypass);
        Ok(())
    }

    /// Runs one node and reports children that became ready.
    ///
    /// The node's refcount is restored for the next chunk before its children
    /// are released.
    #[inline]
    pub(crate) fn trigger_node(
        &self,
        id: NodeId,
        time_nfo: EngineProcessTimeInfo,
        remaining_preroll_frames: NFrames,
        mut on_ready: impl FnMut(NodeId),
    ) {
        let node = &self.nodes[id];
        node.process(time_nfo, remaining_preroll_frames);
        node.reset_refcount();
        for &child in &node.childnodes {
            if self.nodes[child].release_parent() {
                on_ready(child);
            }
        }
    }

    /// Runs every node on the calling thread, in dependency order.
    pub(crate) fn process_inline(
        &self,
        time_nfo: EngineProcessTimeInfo,
        remaining_preroll_frames: NFrames,
    ) {
        for &id in &self.initial_nodes {
            let queued = self.ready_tx.try_send(id);
            debug_assert!(queued.is_ok(), "ready queue full");
        }
        while let Ok(id) = self.ready_rx.try_recv() {
            self.trigger_node(id, time_nfo, remaining_preroll_frames, |child| {
                let queued = self.ready_tx.try_send(child);
                debug_assert!(queued.is_ok(), "ready queue full");
            });
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn initial_nodes(&self) -> &[NodeId] {
        &self.initial_nodes
    }

    pub fn terminal_nodes(&self) -> &[NodeId] {
        &self.terminal_nodes
    }

    /// Nodes in a valid execution order. Empty before finalize.
    pub fn topological_order(&self) -> &[NodeId] {
        &self.topo_order
    }

    pub fn port(&self, id: PortId) -> Option<&Port> {
        self.ports.get(&id).map(|(_, port)| port)
    }

    pub fn port_node(&self, id: PortId) -> Option<NodeId> {
        self.ports.get(&id).map(|(node, _)| *node)
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }
}
