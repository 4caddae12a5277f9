//! Transport contract consumed by graph nodes, and its engine-side implementation.

mod fsm;
mod manager;

pub use fsm::{TransitionResult, TransportEvent, TransportFsm};
pub use manager::TransportManager;

use serde::{Deserialize, Serialize};

use crate::{NFrames, SignedFrame, UnsignedFrame};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlayState {
    RollRequested,
    Rolling,
    PauseRequested,
    #[default]
    Paused,
}

/// Read-only view of the timeline used for latency compensation and loop splitting.
///
/// Methods with the `_in_audio_thread` suffix are called from inside a cycle
/// and must not block.
pub trait Transport: Send + Sync {
    /// Loop start and end in frames.
    fn loop_range_positions(&self) -> (UnsignedFrame, UnsignedFrame);

    fn play_state(&self) -> PlayState;

    fn playhead_position_in_audio_thread(&self) -> UnsignedFrame;

    fn loop_enabled(&self) -> bool;

    /// `pos + frames`, wrapped back into the loop when the loop end is crossed.
    fn position_after_adding_frames(&self, pos: UnsignedFrame, frames: SignedFrame) -> UnsignedFrame {
        let moved = pos.saturating_add_signed(frames);
        if !self.loop_enabled() || frames <= 0 {
            return moved;
        }
        let (loop_start, loop_end) = self.loop_range_positions();
        if loop_end <= loop_start || pos >= loop_end || moved < loop_end {
            return moved;
        }
        loop_start + (moved - loop_end) % (loop_end - loop_start)
    }

    /// Playhead moved by `frames`, wrapped at the loop end.
    fn playhead_position_after_adding_frames_in_audio_thread(
        &self,
        frames: SignedFrame,
    ) -> UnsignedFrame {
        self.position_after_adding_frames(self.playhead_position_in_audio_thread(), frames)
    }

    /// Frames until (excluding) the loop end if it falls inside
    /// `(g_start_frame, g_start_frame + nframes]`, otherwise 0.
    fn is_loop_point_met_in_audio_thread(
        &self,
        g_start_frame: UnsignedFrame,
        nframes: NFrames,
    ) -> NFrames {
        if !self.loop_enabled() {
            return 0;
        }
        let (_, loop_end) = self.loop_range_positions();
        if loop_end > g_start_frame && loop_end <= g_start_frame + nframes as UnsignedFrame {
            (loop_end - g_start_frame) as NFrames
        } else {
            0
        }
    }

    fn is_rolling(&self) -> bool {
        self.play_state() == PlayState::Rolling
    }
}
