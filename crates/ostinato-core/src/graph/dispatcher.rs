//! Per-cycle entry point for the audio backend.

use std::sync::Arc;

use super::collection::Graph;
use super::scheduler::GraphScheduler;
use crate::transport::{Transport, TransportManager};
use crate::{EngineConfig, EngineProcessTimeInfo, Error, NFrames, Result};

/// Drives the active graph for each hardware cycle.
///
/// When the transport starts rolling, the first
/// [`max_route_playback_latency`](Graph::max_route_playback_latency) frames
/// are prerolled: the cycle is split so that every route starts rolling
/// exactly when its latency has been covered, and the playhead only advances
/// by the frames rolled after preroll.
pub struct GraphDispatcher {
    scheduler: Arc<GraphScheduler>,
    transport: Arc<TransportManager>,
    config: EngineConfig,
    remaining_latency_preroll: NFrames,
    cycle: u64,
}

impl GraphDispatcher {
    pub fn new(
        scheduler: Arc<GraphScheduler>,
        transport: Arc<TransportManager>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            scheduler,
            transport,
            config,
            remaining_latency_preroll: 0,
            cycle: 0,
        })
    }

    pub fn scheduler(&self) -> &Arc<GraphScheduler> {
        &self.scheduler
    }

    pub fn transport(&self) -> &Arc<TransportManager> {
        &self.transport
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Applies a new configuration from the next cycle on.
    ///
    /// Port buffers must already have been prepared for `config`; see
    /// [`Graph::prepare_for_processing`].
    pub fn set_config(&mut self, config: EngineConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Frames of latency preroll still to run.
    pub fn remaining_latency_preroll(&self) -> NFrames {
        self.remaining_latency_preroll
    }

    /// Number of completed cycles.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Processes one cycle of `nframes`. Returns the frames the playhead moved.
    ///
    /// Audio thread only.
    pub fn process(&mut self, nframes: NFrames) -> Result<NFrames> {
        if nframes > self.config.max_block_length {
            return Err(Error::BlockLengthExceeded {
                nframes,
                max: self.config.max_block_length,
            });
        }

        self.transport.process_commands();

        let guard = self.scheduler.current();
        let graph = (*guard).as_ref();

        if self.transport.update_play_state_in_audio_thread() {
            self.remaining_latency_preroll = graph.map_or(0, |g| g.max_route_playback_latency());
        }

        let frames_left = match graph {
            Some(graph) => self.run_cycle(graph, nframes),
            None => nframes,
        };

        let rolled = if self.transport.is_rolling() {
            frames_left
        } else {
            0
        };
        if rolled > 0 {
            self.transport.add_to_playhead_in_audio_thread(rolled);
        }

        self.cycle += 1;
        Ok(rolled)
    }

    /// Runs preroll chunks followed by the rest of the cycle. Returns the
    /// frames processed after preroll.
    fn run_cycle(&mut self, graph: &Arc<Graph>, nframes: NFrames) -> NFrames {
        graph.clear_port_buffers(nframes);

        let g_start_frame = self.transport.playhead_position_in_audio_thread();
        let mut frames_left = nframes;

        while self.remaining_latency_preroll > 0 && frames_left > 0 {
            let remaining = self.remaining_latency_preroll;
            let mut num_preroll_frames = frames_left.min(remaining);

            // stop the chunk where the next route starts rolling
            for &id in graph.initial_nodes() {
                let route = graph.nodes()[id].route_playback_latency();
                if remaining > route + num_preroll_frames {
                    continue;
                }
                if remaining > route {
                    num_preroll_frames = num_preroll_frames.min(remaining - route);
                }
            }

            let preroll_offset = nframes - frames_left;
            self.scheduler.run_graph_chunk(
                graph,
                EngineProcessTimeInfo::new(g_start_frame, preroll_offset, num_preroll_frames),
                remaining,
            );

            self.remaining_latency_preroll -= num_preroll_frames;
            frames_left -= num_preroll_frames;
        }

        if frames_left > 0 {
            let offset = nframes - frames_left;
            self.scheduler.run_graph_chunk(
                graph,
                EngineProcessTimeInfo::new(g_start_frame, offset, frames_left),
                0,
            );
        }

        frames_left
    }
}
