//! Transport manager with FSM-based play state.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::fsm::{TransitionResult, TransportEvent, TransportFsm};
use super::{PlayState, Transport};
use crate::{AtomicFlag, Error, NFrames, Result, SignedFrame, UnsignedFrame};

impl PlayState {
    fn to_u8(self) -> u8 {
        match self {
            PlayState::RollRequested => 0,
            PlayState::Rolling => 1,
            PlayState::PauseRequested => 2,
            PlayState::Paused => 3,
        }
    }

    fn from_u8(val: u8) -> Self {
        match val {
            0 => PlayState::RollRequested,
            1 => PlayState::Rolling,
            2 => PlayState::PauseRequested,
            _ => PlayState::Paused,
        }
    }
}

/// Transport owned by the engine.
///
/// Any thread may send requests; they are applied by the audio thread in
/// [`process_commands`](Self::process_commands) at the start of a cycle, so a
/// cycle always sees one consistent transport state.
pub struct TransportManager {
    command_tx: Sender<TransportEvent>,
    command_rx: Receiver<TransportEvent>,
    fsm: UnsafeCell<TransportFsm>,
    play_state: AtomicU8,
    playhead: AtomicU64,
    loop_enabled: AtomicFlag,
    loop_start: AtomicU64,
    loop_end: AtomicU64,
}

// SAFETY: the FSM cell is only touched by the audio thread in
// process_commands() and update_play_state_in_audio_thread(); every other
// field is an atomic or a channel endpoint.
unsafe impl Send for TransportManager {}
unsafe impl Sync for TransportManager {}

impl Default for TransportManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportManager {
    pub fn new() -> Self {
        let (command_tx, command_rx) = unbounded();
        Self {
            command_tx,
            command_rx,
            fsm: UnsafeCell::new(TransportFsm::new()),
            play_state: AtomicU8::new(PlayState::Paused.to_u8()),
            playhead: AtomicU64::new(0),
            loop_enabled: AtomicFlag::new(false),
            loop_start: AtomicU64::new(0),
            loop_end: AtomicU64::new(0),
        }
    }

    /// Queues a request. Any thread.
    fn send_command(&self, event: TransportEvent) {
        let _ = self.command_tx.send(event);
    }

    pub fn request_roll(&self) {
        self.send_command(TransportEvent::Play);
    }

    pub fn request_pause(&self) {
        self.send_command(TransportEvent::Pause);
    }

    pub fn move_playhead(&self, frame: UnsignedFrame) {
        self.send_command(TransportEvent::Locate(frame));
    }

    pub fn set_loop_range(&self, start: UnsignedFrame, end: UnsignedFrame) -> Result<()> {
        if end <= start {
            return Err(Error::InvalidLoopRange { start, end });
        }
        self.send_command(TransportEvent::SetLoopRange { start, end });
        Ok(())
    }

    pub fn set_loop_enabled(&self, enabled: bool) {
        self.send_command(TransportEvent::SetLoopEnabled(enabled));
    }

    pub fn toggle_loop(&self) {
        self.send_command(TransportEvent::ToggleLoop);
    }

    /// Applies queued requests in order.
    ///
    /// Audio thread only, once at the start of a cycle.
    pub fn process_commands(&self) {
        while let Ok(event) = self.command_rx.try_recv() {
            let fsm = unsafe { &mut *self.fsm.get() };
            let result = fsm.transition(event);
            self.apply_fsm_result(result);
        }
    }

    /// Completes pending play/pause requests. Returns true when rolling
    /// starts in this cycle, which is when latency preroll begins.
    ///
    /// Audio thread only, after [`process_commands`](Self::process_commands).
    pub fn update_play_state_in_audio_thread(&self) -> bool {
        let fsm = unsafe { &mut *self.fsm.get() };
        let event = match fsm.play_state() {
            PlayState::RollRequested => TransportEvent::StartRolling,
            PlayState::PauseRequested => TransportEvent::FinishPause,
            PlayState::Rolling | PlayState::Paused => return false,
        };
        let result = fsm.transition(event);
        self.apply_fsm_result(result);
        result == TransitionResult::PlayStateChanged(PlayState::Rolling)
    }

    /// Advances the playhead after a cycle rolled `frames`, wrapping at the loop end.
    pub fn add_to_playhead_in_audio_thread(&self, frames: NFrames) {
        let pos = self.position_after_adding_frames(
            self.playhead.load(Ordering::Acquire),
            frames as SignedFrame,
        );
        self.playhead.store(pos, Ordering::Release);
    }

    fn apply_fsm_result(&self, result: TransitionResult) {
        match result {
            TransitionResult::None => {}
            TransitionResult::PlayStateChanged(state) => {
                self.play_state.store(state.to_u8(), Ordering::Release);
            }
            TransitionResult::Located(frame) => {
                self.playhead.store(frame, Ordering::Release);
            }
            TransitionResult::LoopRangeChanged { start, end } => {
                self.loop_start.store(start, Ordering::Release);
                self.loop_end.store(end, Ordering::Release);
            }
            TransitionResult::LoopModeChanged(enabled) => {
                self.loop_enabled.set(enabled);
            }
        }
    }
}

impl Transport for TransportManager {
    fn loop_range_positions(&self) -> (UnsignedFrame, UnsignedFrame) {
        (
            self.loop_start.load(Ordering::Acquire),
            self.loop_end.load(Ordering::Acquire),
        )
    }

    fn play_state(&self) -> PlayState {
        PlayState::from_u8(self.play_state.load(Ordering::Acquire))
    }

    fn playhead_position_in_audio_thread(&self) -> UnsignedFrame {
        self.playhead.load(Ordering::Acquire)
    }

    fn loop_enabled(&self) -> bool {
        self.loop_enabled.get()
    }
}
