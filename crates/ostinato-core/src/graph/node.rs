//! A single schedulable unit of work in the processing graph.

use core::fmt;
use core::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::transport::Transport;
use crate::{AtomicFlag, EngineProcessTimeInfo, NFrames, SignedFrame};

/// Index of a node inside its [`Graph`](super::Graph).
pub type NodeId = usize;

/// Whether a chunk advances the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessMode {
    /// Normal processing.
    Roll,
    /// The node is still waiting for latency preroll to reach it. Outputs
    /// should be filled with silence.
    NoRoll,
}

/// Work done by a node for one chunk.
pub type ProcessFunc = Box<dyn Fn(EngineProcessTimeInfo, ProcessMode) + Send + Sync>;
/// Display name, resolved lazily for logs.
pub type NameGetter = Box<dyn Fn() -> String + Send + Sync>;
/// The node's own playback latency in frames.
pub type LatencyGetter = Box<dyn Fn() -> NFrames + Send + Sync>;

/// Graph node.
///
/// Edges, refcounts and latencies are filled in while the owning graph is
/// built and finalized. During a cycle only `refcount` and `bypass` change.
pub struct GraphNode {
    id: NodeId,
    name_getter: NameGetter,
    process_func: ProcessFunc,
    latency_getter: LatencyGetter,
    transport: Arc<dyn Transport>,

    /// Nodes fed by this one.
    pub(crate) childnodes: Vec<NodeId>,
    /// Nodes feeding this one.
    pub(crate) parentnodes: Vec<NodeId>,

    /// Number of parents.
    pub(crate) init_refcount: usize,
    /// Parents still to run in the current chunk.
    pub(crate) refcount: AtomicUsize,

    pub(crate) playback_latency: NFrames,
    /// Own latency plus the largest route latency downstream.
    pub(crate) route_playback_latency: NFrames,

    pub(crate) terminal: bool,
    pub(crate) initial: bool,

    bypass: AtomicFlag,
}

impl fmt::Debug for GraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphNode")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("childnodes", &self.childnodes)
            .field("init_refcount", &self.init_refcount)
            .field("playback_latency", &self.playback_latency)
            .field("route_playback_latency", &self.route_playback_latency)
            .field("terminal", &self.terminal)
            .field("initial", &self.initial)
            .field("bypass", &self.bypass.get())
            .finish()
    }
}

impl GraphNode {
    pub(crate) fn new(
        id: NodeId,
        name_getter: NameGetter,
        transport: Arc<dyn Transport>,
        process_func: ProcessFunc,
        latency_getter: LatencyGetter,
    ) -> Self {
        Self {
            id,
            name_getter,
            process_func,
            latency_getter,
            transport,
            childnodes: Vec::new(),
            parentnodes: Vec::new(),
            init_refcount: 0,
            refcount: AtomicUsize::new(0),
            playback_latency: 0,
            route_playback_latency: 0,
            terminal: false,
            initial: false,
            bypass: AtomicFlag::new(false),
        }
    }

    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> String {
        (self.name_getter)()
    }

    pub fn childnodes(&self) -> &[NodeId] {
        &self.childnodes
    }

    pub fn parentnodes(&self) -> &[NodeId] {
        &self.parentnodes
    }

    pub fn init_refcount(&self) -> usize {
        self.init_refcount
    }

    pub fn refcount(&self) -> usize {
        self.refcount.load(Ordering::Acquire)
    }

    pub fn playback_latency(&self) -> NFrames {
        self.playback_latency
    }

    pub fn route_playback_latency(&self) -> NFrames {
        self.route_playback_latency
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    pub fn is_initial(&self) -> bool {
        self.initial
    }

    /// Queries the latency getter.
    #[inline]
    pub fn single_playback_latency(&self) -> NFrames {
        (self.latency_getter)()
    }

    /// Skips the process function while keeping the node in the schedule.
    /// Safe to call while the graph is running.
    pub fn set_bypass(&self, bypass: bool) {
        self.bypass.set(bypass);
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypass.get()
    }

    /// Merges the route latency seen through one child. The largest route wins.
    ///
    /// `dest_latency` is the child's route latency, or 0 for a terminal node.
    pub(crate) fn set_route_playback_latency(&mut self, dest_latency: NFrames) {
        let route = self.playback_latency + dest_latency;
        if route > self.route_playback_latency {
            self.route_playback_latency = route;
        }
    }

    /// Resets the refcount for the next chunk.
    #[inline]
    pub(crate) fn reset_refcount(&self) {
        self.refcount.store(self.init_refcount, Ordering::Release);
    }

    /// Decrements the refcount. Returns true when this was the last parent.
    #[inline]
    pub(crate) fn release_parent(&self) -> bool {
        self.refcount.fetch_sub(1, Ordering::AcqRel) == 1
    }

    /// Runs the node for one chunk.
    ///
    /// Nodes whose route latency is below `remaining_preroll_frames` have not
    /// been reached by preroll yet and run in [`ProcessMode::NoRoll`]. Others
    /// have their timeline position shifted by the latency still ahead of them
    /// and are split at loop points.
    pub fn process(&self, time_nfo: EngineProcessTimeInfo, remaining_preroll_frames: NFrames) {
        if self.bypass.get() {
            return;
        }

        if self.route_playback_latency < remaining_preroll_frames {
            (self.process_func)(time_nfo, ProcessMode::NoRoll);
            return;
        }

        let mut time_nfo = time_nfo;
        if self.transport.is_rolling() {
            self.compensate_latency(&mut time_nfo, remaining_preroll_frames);
            self.process_chunks_after_splitting_at_loop_points(time_nfo);
        } else {
            (self.process_func)(time_nfo, ProcessMode::Roll);
        }
    }

    /// Moves the chunk's timeline start to where the playhead will be once the
    /// remaining route latency has elapsed.
    fn compensate_latency(
        &self,
        time_nfo: &mut EngineProcessTimeInfo,
        remaining_preroll_frames: NFrames,
    ) {
        let ahead = self.route_playback_latency - remaining_preroll_frames;
        time_nfo.g_start_frame_w_offset = self
            .transport
            .playhead_position_after_adding_frames_in_audio_thread(ahead as SignedFrame);
        time_nfo.g_start_frame = time_nfo
            .g_start_frame_w_offset
            .saturating_sub(time_nfo.local_offset as u64);
    }

    /// Calls the process function once per span between loop points, in
    /// timeline order. After the loop end the timeline restarts at the loop start.
    fn process_chunks_after_splitting_at_loop_points(&self, mut time_nfo: EngineProcessTimeInfo) {
        loop {
            let met = self
                .transport
                .is_loop_point_met_in_audio_thread(time_nfo.g_start_frame_w_offset, time_nfo.nframes);
            if met == 0 {
                break;
            }

            (self.process_func)(
                EngineProcessTimeInfo {
                    nframes: met,
                    ..time_nfo
                },
                ProcessMode::Roll,
            );

            time_nfo.local_offset += met;
            time_nfo.nframes -= met;
            let (loop_start, _) = self.transport.loop_range_positions();
            time_nfo.g_start_frame_w_offset = loop_start;
            time_nfo.g_start_frame = loop_start.saturating_sub(time_nfo.local_offset as u64);
        }

        if time_nfo.nframes > 0 {
            (self.process_func)(time_nfo, ProcessMode::Roll);
        }
    }
}
