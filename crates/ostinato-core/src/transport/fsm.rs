//! Transport state machine.

use super::PlayState;
use crate::UnsignedFrame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    /// Ask the engine to start rolling at the next cycle.
    Play,
    /// Ask the engine to stop at the next cycle.
    Pause,
    /// Engine acknowledged a roll request.
    StartRolling,
    /// Engine acknowledged a pause request.
    FinishPause,
    Locate(UnsignedFrame),
    SetLoopRange {
        start: UnsignedFrame,
        end: UnsignedFrame,
    },
    SetLoopEnabled(bool),
    ToggleLoop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionResult {
    None,
    PlayStateChanged(PlayState),
    Located(UnsignedFrame),
    LoopRangeChanged {
        start: UnsignedFrame,
        end: UnsignedFrame,
    },
    LoopModeChanged(bool),
}

/// Play/pause handshake between control threads and the engine.
///
/// Control threads only request; the engine moves requests into their final
/// state at the start of a cycle.
#[derive(Debug, Clone)]
pub struct TransportFsm {
    play_state: PlayState,
    loop_enabled: bool,
    loop_range: (UnsignedFrame, UnsignedFrame),
}

impl Default for TransportFsm {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportFsm {
    pub fn new() -> Self {
        Self {
            play_state: PlayState::Paused,
            loop_enabled: false,
            loop_range: (0, 0),
        }
    }

    pub fn play_state(&self) -> PlayState {
        self.play_state
    }

    pub fn loop_enabled(&self) -> bool {
        self.loop_enabled
    }

    pub fn loop_range(&self) -> (UnsignedFrame, UnsignedFrame) {
        self.loop_range
    }

    pub fn transition(&mut self, event: TransportEvent) -> TransitionResult {
        use TransportEvent::*;

        match event {
            Play => match self.play_state {
                PlayState::Paused | PlayState::PauseRequested => {
                    self.set_play_state(PlayState::RollRequested)
                }
                PlayState::RollRequested | PlayState::Rolling => TransitionResult::None,
            },

            Pause => match self.play_state {
                PlayState::Rolling | PlayState::RollRequested => {
                    self.set_play_state(PlayState::PauseRequested)
                }
                PlayState::PauseRequested | PlayState::Paused => TransitionResult::None,
            },

            StartRolling => match self.play_state {
                PlayState::RollRequested => self.set_play_state(PlayState::Rolling),
                _ => TransitionResult::None,
            },

            FinishPause => match self.play_state {
                PlayState::PauseRequested => self.set_play_state(PlayState::Paused),
                _ => TransitionResult::None,
            },

            Locate(frame) => TransitionResult::Located(frame),

            SetLoopRange { start, end } => {
                if end <= start || self.loop_range == (start, end) {
                    TransitionResult::None
                } else {
                    self.loop_range = (start, end);
                    TransitionResult::LoopRangeChanged { start, end }
                }
            }

            SetLoopEnabled(enabled) => {
                if enabled == self.loop_enabled {
                    TransitionResult::None
                } else {
                    self.loop_enabled = enabled;
                    TransitionResult::LoopModeChanged(enabled)
                }
            }

            ToggleLoop => {
                self.loop_enabled = !self.loop_enabled;
                TransitionResult::LoopModeChanged(self.loop_enabled)
            }
        }
    }

    fn set_play_state(&mut self, state: PlayState) -> TransitionResult {
        self.play_state = state;
        TransitionResult::PlayStateChanged(state)
    }
}
