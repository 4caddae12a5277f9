//! Port integration tests
//!
//! Connection summing through a running engine, live connection updates,
//! clipping and UI snapshots.

use std::sync::Arc;

use ostinato::core::{CvPort, PortId, PortType};
use ostinato::prelude::*;

use crate::helpers::*;

/// Four CV sources into one port: three enabled, one disabled.
fn cv_mix_engine() -> (OstinatoEngine, Arc<CvPort>, Vec<PortId>) {
    let engine = test_engine();
    let dest = Arc::new(CvPort::new("Cutoff Mod", PortFlow::Input));
    let values = [0.1_f32, 0.2, 0.3, 0.4];
    let multipliers = [0.5_f32, 1.0, 0.25, 1.0];
    let sources: Vec<Arc<CvPort>> = (0..4)
        .map(|i| Arc::new(CvPort::new(format!("LFO {i}"), PortFlow::Output)))
        .collect();

    let conns = engine.connections();
    for (src, m) in sources.iter().zip(multipliers) {
        conns
            .connect(PortConnection::new(src.info().id, dest.info().id).with_multiplier(m))
            .unwrap();
    }
    conns.set_enabled(sources[3].info().id, dest.info().id, false);

    engine
        .graph(|graph| {
            for (src, value) in sources.iter().zip(values) {
                add_cv_constant(graph, src, value);
            }
            graph.add_port(Port::Cv(dest.clone()));
            Ok(())
        })
        .unwrap();
    let ids = sources.iter().map(|s| s.info().id).collect();
    (engine, dest, ids)
}

fn expected_cv_sum() -> f32 {
    let mut sum = 0.0_f32;
    sum += 0.1 * 0.5;
    sum += 0.2;
    sum += 0.3 * 0.25;
    sum
}

#[test]
fn test_cv_sum_skips_disabled_connection() {
    let (mut engine, dest, _) = cv_mix_engine();
    engine.process(TEST_BLOCK_LENGTH).unwrap();

    let out = dest.snapshot();
    assert_eq!(out.len(), TEST_BLOCK_LENGTH as usize);
    assert!(out.iter().all(|v| *v == expected_cv_sum()));
}

/// Disabling then re-enabling a connection restores identical output.
#[test]
fn test_toggling_connection_restores_output() {
    let (mut engine, dest, ids) = cv_mix_engine();
    engine.process(TEST_BLOCK_LENGTH).unwrap();
    let before = dest.snapshot();

    engine.connections().set_enabled(ids[1], dest.info().id, false);
    engine.refresh_connections();
    engine.process(TEST_BLOCK_LENGTH).unwrap();
    assert!(dest.snapshot().iter().all(|v| (*v - (0.05 + 0.075)).abs() < FLOAT_EPSILON));

    engine.connections().set_enabled(ids[1], dest.info().id, true);
    engine.refresh_connections();
    engine.process(TEST_BLOCK_LENGTH).unwrap();
    assert_eq!(dest.snapshot(), before);
}

/// A sum already inside the port range comes out of the clip step untouched.
#[test]
fn test_in_range_sum_is_bit_identical() {
    let (mut engine, dest, _) = cv_mix_engine();
    engine.process(TEST_BLOCK_LENGTH).unwrap();
    let expected = expected_cv_sum();
    for v in dest.snapshot() {
        assert_eq!(v.to_bits(), expected.to_bits());
    }
}

#[test]
fn test_cv_out_of_range_sum_is_clipped() {
    let mut engine = test_engine();
    let dest = Arc::new(CvPort::new("Pitch Mod", PortFlow::Input));
    let srcs: Vec<Arc<CvPort>> = (0..3)
        .map(|i| Arc::new(CvPort::new(format!("Env {i}"), PortFlow::Output)))
        .collect();
    for src in &srcs {
        engine
            .connections()
            .connect(PortConnection::new(src.info().id, dest.info().id))
            .unwrap();
    }
    engine
        .graph(|graph| {
            for src in &srcs {
                add_cv_constant(graph, src, 0.6);
            }
            graph.add_port(Port::Cv(dest.clone()));
            Ok(())
        })
        .unwrap();

    engine.process(TEST_BLOCK_LENGTH).unwrap();
    assert!(dest.snapshot().iter().all(|v| *v == 1.0));
}

#[test]
fn test_limited_audio_port_and_meter() {
    let engine = test_engine();
    let info = PortInfo::new("Master", PortType::Audio, PortFlow::Input)
        .with_limiting()
        .with_metering();
    let master = Arc::new(AudioPort::with_info(info));
    let srcs: Vec<Arc<AudioPort>> = (0..3)
        .map(|i| Arc::new(AudioPort::new(format!("Track {i}"), PortFlow::Output)))
        .collect();
    for src in &srcs {
        engine
            .connections()
            .connect(PortConnection::new(src.info().id, master.info().id))
            .unwrap();
    }
    engine
        .graph(|graph| {
            for src in &srcs {
                graph.add_port(Port::Audio(src.clone()));
            }
            graph.add_port(Port::Audio(master.clone()));
            Ok(())
        })
        .unwrap();

    // paused transport: sources are fed by hand before the cycle
    let graph = engine.current_graph().unwrap();
    graph.clear_port_buffers(TEST_BLOCK_LENGTH);
    for src in &srcs {
        feed(src, 0, &[0.9; TEST_BLOCK_LENGTH as usize]);
    }
    engine
        .scheduler()
        .run_chunk(EngineProcessTimeInfo::new(0, 0, TEST_BLOCK_LENGTH), 0);

    assert!(master.snapshot().iter().all(|v| *v == 2.0));
    assert!(master.meter_value() > 1.0);
}

#[test]
fn test_ring_snapshot_follows_cycles() {
    let mut engine = test_engine();
    let out = Arc::new(AudioPort::new("Synth Out", PortFlow::Output));
    engine
        .graph(|graph| {
            add_ramp_source(graph, "synth", &out);
            Ok(())
        })
        .unwrap();

    engine.process(TEST_BLOCK_LENGTH).unwrap();
    engine.process(TEST_BLOCK_LENGTH).unwrap();

    // paused: the playhead stays at 0, so both cycles carry the same ramp
    let snap = out.ring_snapshot();
    assert_eq!(snap.len(), 2 * TEST_BLOCK_LENGTH as usize);
    assert_signal_eq(&snap[..128], &ramp(0, 128));
    assert_signal_eq(&snap[128..], &ramp(0, 128));

    let mut drained = vec![0.0; 512];
    assert_eq!(out.read_ring(&mut drained), 256);
    assert!(out.ring_snapshot().is_empty());
}

#[test]
fn test_incompatible_connection_rejected() {
    let engine = test_engine();
    let audio = Arc::new(AudioPort::new("Audio Out", PortFlow::Output));
    let cv = Arc::new(CvPort::new("CV In", PortFlow::Input));
    engine
        .connections()
        .connect(PortConnection::new(audio.info().id, cv.info().id))
        .unwrap();

    let result = engine.graph(|graph| {
        graph.add_port(Port::Audio(audio.clone()));
        graph.add_port(Port::Cv(cv.clone()));
        Ok(())
    });
    assert!(matches!(
        result,
        Err(ostinato::Error::Core(ostinato::core::Error::IncompatiblePorts { .. }))
    ));
}
