//! Transport integration tests
//!
//! Roll/pause requests applied at cycle start, seeking, and loop-point
//! splitting as seen by a node.

use std::sync::Arc;

use ostinato::core::{PlayState, Transport};
use ostinato::prelude::*;

use crate::helpers::*;

fn ramp_engine() -> (OstinatoEngine, Arc<AudioPort>) {
    let engine = test_engine();
    let out = Arc::new(AudioPort::new("Synth Out", PortFlow::Output));
    engine
        .graph(|graph| {
            add_ramp_source(graph, "synth", &out);
            Ok(())
        })
        .unwrap();
    (engine, out)
}

#[test]
fn test_requests_apply_at_cycle_start() {
    let (mut engine, _) = ramp_engine();
    let transport = engine.transport().clone();

    transport.request_roll();
    assert_eq!(transport.play_state(), PlayState::Paused);

    assert_eq!(engine.process(TEST_BLOCK_LENGTH).unwrap(), 128);
    assert_eq!(transport.play_state(), PlayState::Rolling);

    transport.request_pause();
    assert_eq!(engine.process(TEST_BLOCK_LENGTH).unwrap(), 0);
    assert!(!transport.is_rolling());
    assert_eq!(transport.playhead_position_in_audio_thread(), 128);
}

/// Paused cycles still run every node against the current playhead.
#[test]
fn test_paused_cycle_renders_playhead_position() {
    let (mut engine, out) = ramp_engine();
    engine.transport().move_playhead(300);

    assert_eq!(engine.process(TEST_BLOCK_LENGTH).unwrap(), 0);
    assert_signal_eq(&out.snapshot(), &ramp(300, 128));
    assert_eq!(engine.transport().playhead_position_in_audio_thread(), 300);
}

#[test]
fn test_seek_while_rolling() {
    let (mut engine, out) = ramp_engine();
    engine.transport().request_roll();
    engine.process(TEST_BLOCK_LENGTH).unwrap();

    engine.transport().move_playhead(400);
    engine.process(TEST_BLOCK_LENGTH).unwrap();
    assert_signal_eq(&out.snapshot(), &ramp(400, 128));
    assert_eq!(engine.transport().playhead_position_in_audio_thread(), 528);
}

/// A cycle crossing the loop end renders the same frames as two plain cycles:
/// one ending at the loop end, one starting at the loop start.
#[test]
fn test_loop_split_matches_unsplit_rendering() {
    let (mut looped, looped_out) = ramp_engine();
    let transport = looped.transport();
    transport.set_loop_range(100, 160).unwrap();
    transport.set_loop_enabled(true);
    transport.move_playhead(100);
    transport.request_roll();
    assert_eq!(looped.process(TEST_BLOCK_LENGTH).unwrap(), 128);

    let (mut plain, plain_out) = ramp_engine();
    plain.transport().move_playhead(100);
    plain.transport().request_roll();
    plain.process(TEST_BLOCK_LENGTH).unwrap();
    let unsplit = plain_out.snapshot();

    let out = looped_out.snapshot();
    assert_signal_eq(&out[..60], &unsplit[..60]);
    assert_signal_eq(&out[60..], &unsplit[..68]);

    // playhead wrapped: 68 frames past the loop start
    assert_eq!(looped.transport().playhead_position_in_audio_thread(), 168 - 60);
}

#[test]
fn test_loop_disabled_does_not_split() {
    let (mut engine, out) = ramp_engine();
    let transport = engine.transport();
    transport.set_loop_range(100, 160).unwrap();
    transport.move_playhead(100);
    transport.request_roll();
    engine.process(TEST_BLOCK_LENGTH).unwrap();

    assert_signal_eq(&out.snapshot(), &ramp(100, 128));
    assert_eq!(engine.transport().playhead_position_in_audio_thread(), 228);
}

#[test]
fn test_invalid_loop_range_rejected() {
    let engine = test_engine();
    assert!(matches!(
        engine.transport().set_loop_range(200, 100),
        Err(ostinato::core::Error::InvalidLoopRange { start: 200, end: 100 })
    ));
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// Without latency or loop, the playhead moves by exactly the frames rolled.
        #[test]
        fn prop_playhead_advances_by_rolled_frames(blocks in prop::collection::vec(1u32..=256, 1..12)) {
            let (mut engine, out) = ramp_engine();
            engine.transport().request_roll();

            let mut pos = 0u64;
            for nframes in blocks {
                prop_assert_eq!(engine.process(nframes).unwrap(), nframes);
                let snap = out.snapshot();
                prop_assert_eq!(snap.len(), nframes as usize);
                prop_assert!(approx::abs_diff_eq!(snap[0], ramp_value(pos), epsilon = FLOAT_EPSILON));
                pos += nframes as u64;
            }
            prop_assert_eq!(engine.transport().playhead_position_in_audio_thread(), pos);
        }
    }
}
