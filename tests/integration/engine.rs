//! Engine lifecycle integration tests
//!
//! Builder validation, block-length limits, empty engines and live
//! connection changes.

use std::sync::Arc;

use ostinato::prelude::*;
use ostinato::Error;

use crate::helpers::*;

#[test]
fn test_builder_applies_config() {
    let engine = OstinatoEngine::builder()
        .sample_rate(96000)
        .block_length(512)
        .max_block_length(1024)
        .build()
        .unwrap();

    assert_eq!(engine.sample_rate(), 96000);
    assert_eq!(engine.config().block_length, 512);
    assert_eq!(engine.config().max_block_length, 1024);
    assert_eq!(engine.scheduler().worker_threads(), 0);
}

#[test]
fn test_builder_rejects_invalid_config() {
    let result = OstinatoEngine::builder().sample_rate(1000).build();
    assert!(matches!(
        result,
        Err(Error::Core(ostinato::core::Error::InvalidConfig(_)))
    ));

    let result = OstinatoEngine::builder()
        .block_length(512)
        .max_block_length(256)
        .build();
    assert!(result.is_err());
}

#[test]
fn test_engine_without_graph_runs_cycles() {
    let mut engine = test_engine();
    assert!(engine.current_graph().is_none());

    engine.transport().request_roll();
    assert_eq!(engine.process(TEST_BLOCK_LENGTH).unwrap(), 128);
    assert_eq!(engine.cycle(), 1);
}

#[test]
fn test_oversized_block_rejected() {
    let mut engine = OstinatoEngine::builder()
        .block_length(128)
        .max_block_length(256)
        .build()
        .unwrap();

    assert!(matches!(
        engine.process(257),
        Err(Error::Core(ostinato::core::Error::BlockLengthExceeded {
            nframes: 257,
            max: 256
        }))
    ));
    // shorter blocks are fine
    assert_eq!(engine.process(100).unwrap(), 0);
}

#[test]
fn test_multiplier_change_without_rebuild() {
    let mut engine = test_engine();
    let src = Arc::new(AudioPort::new("Track Out", PortFlow::Output));
    let bus = Arc::new(AudioPort::new("Bus In", PortFlow::Input));
    engine
        .connections()
        .connect(PortConnection::new(src.info().id, bus.info().id))
        .unwrap();
    engine
        .graph(|graph| {
            add_ramp_source(graph, "track", &src);
            graph.add_port(Port::Audio(bus.clone()));
            Ok(())
        })
        .unwrap();
    let graph_before = engine.current_graph().unwrap();

    engine.process(TEST_BLOCK_LENGTH).unwrap();
    assert_signal_eq(&bus.snapshot(), &ramp(0, 128));

    engine
        .connections()
        .set_multiplier(src.info().id, bus.info().id, 0.25);
    engine.refresh_connections();
    engine.process(TEST_BLOCK_LENGTH).unwrap();

    let quarter: Vec<f32> = ramp(0, 128).iter().map(|s| s * 0.25).collect();
    assert_signal_eq(&bus.snapshot(), &quarter);
    assert!(Arc::ptr_eq(&graph_before, &engine.current_graph().unwrap()));
}

#[test]
fn test_variable_block_lengths() {
    let mut engine = test_engine();
    let out = Arc::new(AudioPort::new("Synth Out", PortFlow::Output));
    engine
        .graph(|graph| {
            add_ramp_source(graph, "synth", &out);
            Ok(())
        })
        .unwrap();
    engine.transport().request_roll();

    let mut pos = 0;
    for nframes in [128, 64, 200, 32] {
        assert_eq!(engine.process(nframes).unwrap(), nframes);
        assert_signal_eq(&out.snapshot(), &ramp(pos, nframes as usize));
        pos += nframes as u64;
    }
    assert_eq!(engine.transport().playhead_position_in_audio_thread(), pos);
}

#[test]
fn test_raise_max_block_length_at_runtime() {
    let mut engine = OstinatoEngine::builder()
        .block_length(128)
        .max_block_length(256)
        .build()
        .unwrap();
    let out = Arc::new(AudioPort::new("Synth Out", PortFlow::Output));
    engine
        .graph(|graph| {
            add_ramp_source(graph, "synth", &out);
            Ok(())
        })
        .unwrap();
    engine.transport().request_roll();
    assert_eq!(engine.process(256).unwrap(), 256);
    assert!(engine.process(512).is_err());

    engine.set_max_block_length(512).unwrap();
    assert_eq!(engine.config().max_block_length, 512);
    assert_eq!(engine.process(512).unwrap(), 512);
    assert_signal_eq(&out.snapshot(), &ramp(256, 512));

    // graphs built afterwards get the larger buffers too
    let late = Arc::new(AudioPort::new("Late Out", PortFlow::Output));
    engine
        .graph(|graph| {
            add_ramp_source(graph, "late", &late);
            Ok(())
        })
        .unwrap();
    assert_eq!(engine.process(512).unwrap(), 512);
    assert_signal_eq(&late.snapshot(), &ramp(768, 512));
}

#[test]
fn test_invalid_reconfigure_keeps_config() {
    let mut engine = OstinatoEngine::builder()
        .block_length(128)
        .max_block_length(256)
        .build()
        .unwrap();

    assert!(matches!(
        engine.set_max_block_length(64),
        Err(Error::Core(ostinato::core::Error::InvalidConfig(_)))
    ));
    assert_eq!(engine.config().max_block_length, 256);
    assert!(engine.process(257).is_err());
    assert_eq!(engine.process(256).unwrap(), 0);
}
