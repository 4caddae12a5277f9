//! Test helpers and fixtures for ostinato integration tests.
//!
//! Cycles are driven by hand through [`OstinatoEngine::process`]; no audio
//! backend is involved. Generators write a deterministic ramp keyed on the
//! timeline frame, so any misalignment between paths shows up as a value
//! mismatch.
//!
//! ## Tolerance Levels
//!
//! - `FLOAT_EPSILON` (1e-6): exact operations (passthrough, unity gain)
//! - `SILENCE_THRESHOLD` (1e-9): denormal-filled or cleared buffers

#![allow(dead_code)]

pub mod tolerances;

use std::sync::Arc;

use ostinato::core::{CvPort, NodeId, UnsignedFrame};
use ostinato::prelude::*;

pub use tolerances::*;

pub const TEST_SAMPLE_RATE: u32 = 48000;

/// Block length used by every scenario.
pub const TEST_BLOCK_LENGTH: NFrames = 128;

/// Engine running every node on the calling thread.
pub fn test_engine() -> OstinatoEngine {
    test_engine_with_workers(0)
}

/// Routes engine logs to the test harness. Filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn test_engine_with_workers(workers: usize) -> OstinatoEngine {
    init_tracing();
    OstinatoEngine::builder()
        .sample_rate(TEST_SAMPLE_RATE)
        .block_length(TEST_BLOCK_LENGTH)
        .worker_threads(workers)
        .build()
        .expect("Failed to create test engine")
}

/// Sample value of the test ramp at timeline frame `frame`.
pub fn ramp_value(frame: UnsignedFrame) -> f32 {
    (frame % 1000) as f32 * 1e-3
}

/// Ramp covering timeline frames `[start, start + len)`.
pub fn ramp(start: UnsignedFrame, len: usize) -> Vec<f32> {
    (start..start + len as UnsignedFrame).map(ramp_value).collect()
}

/// Adds `port` and a node that writes the ramp into it for the frames it is
/// asked to roll. No-roll chunks are left to the port.
pub fn add_ramp_source(graph: &mut Graph, name: &'static str, port: &Arc<AudioPort>) -> NodeId {
    let port_node = graph.add_port(Port::Audio(Arc::clone(port)));
    let target = Arc::clone(port);
    let gen = graph.add_node(
        Box::new(move || name.into()),
        Box::new(move |nfo: EngineProcessTimeInfo, mode| {
            if mode == ProcessMode::NoRoll {
                return;
            }
            // SAFETY: the port node runs after this one
            let buf = unsafe { target.buffer_mut() };
            for (i, s) in buf[nfo.range()].iter_mut().enumerate() {
                *s = ramp_value(nfo.g_start_frame_w_offset + i as UnsignedFrame);
            }
        }),
        Box::new(|| 0),
    );
    graph.connect(gen, port_node).expect("generator edge");
    gen
}

/// Adds `port` and a node that holds it at `value` for every rolled frame.
pub fn add_cv_constant(graph: &mut Graph, port: &Arc<CvPort>, value: f32) -> NodeId {
    let port_node = graph.add_port(Port::Cv(Arc::clone(port)));
    let target = Arc::clone(port);
    let gen = graph.add_node(
        Box::new(|| "cv constant".into()),
        Box::new(move |nfo: EngineProcessTimeInfo, _| {
            // SAFETY: the port node runs after this one
            unsafe { target.buffer_mut()[nfo.range()].fill(value) };
        }),
        Box::new(|| 0),
    );
    graph.connect(gen, port_node).expect("generator edge");
    gen
}

/// Writes `samples` into `port` starting at `offset`. Outside a cycle only.
pub fn feed(port: &AudioPort, offset: usize, samples: &[f32]) {
    // SAFETY: no cycle is running
    let buf = unsafe { port.buffer_mut() };
    buf[offset..offset + samples.len()].copy_from_slice(samples);
}

/// Applies pending requests and moves a requested roll to rolling, the way
/// a cycle start does.
pub fn start_rolling(transport: &TransportManager) {
    transport.request_roll();
    transport.process_commands();
    transport.update_play_state_in_audio_thread();
}

pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0_f32, f32::max)
}

/// Assert that a signal is near silent.
pub fn assert_silence(samples: &[f32]) {
    let max = peak(samples);
    assert!(
        max <= SILENCE_THRESHOLD,
        "Expected silence, but peak amplitude was {}",
        max
    );
}

/// Assert two signals match sample by sample.
pub fn assert_signal_eq(actual: &[f32], expected: &[f32]) {
    assert_eq!(actual.len(), expected.len(), "signal lengths differ");
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!(
            approx::abs_diff_eq!(a, e, epsilon = FLOAT_EPSILON),
            "sample {} differs: got {}, expected {}",
            i,
            a,
            e
        );
    }
}
