//! Graph integration tests
//!
//! Latency alignment across parallel paths, refcount bookkeeping, the
//! passthrough end-to-end scenario and graph rebuilds.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ostinato::core::GraphDispatcher;
use ostinato::prelude::*;
use ostinato::{AudioPassthroughProcessor, Error};

use crate::helpers::*;

/// Two ramp generators meeting at `mix`: A directly, B behind a 64-frame delay.
fn alignment_engine(workers: usize) -> (OstinatoEngine, Arc<AudioPort>) {
    let engine = test_engine_with_workers(workers);
    let a_out = Arc::new(AudioPort::new("A Out", PortFlow::Output));
    let b_src = Arc::new(AudioPort::new("B Source", PortFlow::Output));
    let delay = AudioPassthroughProcessor::new("B", 1, 64);
    let mix = Arc::new(AudioPort::new("Mix", PortFlow::Input));

    let b_in = delay.input(0).unwrap().info().id;
    let b_out = delay.output(0).unwrap().info().id;
    let conns = engine.connections();
    conns.connect(PortConnection::new(a_out.info().id, mix.info().id)).unwrap();
    conns.connect(PortConnection::new(b_src.info().id, b_in)).unwrap();
    conns
        .connect(PortConnection::new(b_out, mix.info().id).with_multiplier(0.5))
        .unwrap();

    engine
        .graph(|graph| {
            add_ramp_source(graph, "A", &a_out);
            add_ramp_source(graph, "B source", &b_src);
            delay.add_to_graph(graph)?;
            graph.add_port(Port::Audio(mix.clone()));
            Ok(())
        })
        .unwrap();
    (engine, mix)
}

fn expected_mix(start: u64, len: usize) -> Vec<f32> {
    ramp(start, len).iter().map(|s| s * 1.5).collect()
}

/// Route latencies follow the slowest path.
#[test]
fn test_route_latency_is_slowest_path() {
    let (engine, mix) = alignment_engine(0);
    let graph = engine.current_graph().unwrap();

    assert_eq!(graph.max_route_playback_latency(), 64);
    let mix_node = graph.port_node(mix.info().id).unwrap();
    assert_eq!(graph.node(mix_node).unwrap().route_playback_latency(), 0);

    let routes: Vec<(String, NFrames)> = graph
        .initial_nodes()
        .iter()
        .map(|&id| {
            let node = graph.node(id).unwrap();
            (node.name(), node.route_playback_latency())
        })
        .collect();
    assert!(routes.contains(&("A".to_string(), 0)));
    assert!(routes.contains(&("B source".to_string(), 64)));
}

/// After a roll starts, the merge point stays silent for the preroll and the
/// delayed path lines up with the direct one afterwards.
#[test]
fn test_latency_alignment_after_roll_start() {
    let (mut engine, mix) = alignment_engine(0);

    engine.transport().request_roll();
    assert_eq!(engine.process(TEST_BLOCK_LENGTH).unwrap(), 64);
    let out = mix.snapshot();
    assert_silence(&out[..64]);
    assert_signal_eq(&out[64..], &expected_mix(0, 64));

    assert_eq!(engine.process(TEST_BLOCK_LENGTH).unwrap(), 128);
    assert_signal_eq(&mix.snapshot(), &expected_mix(64, 128));
    assert_eq!(engine.transport().playhead_position_in_audio_thread(), 192);
}

#[test]
fn test_worker_pool_matches_inline() {
    let (mut inline, inline_mix) = alignment_engine(0);
    let (mut pooled, pooled_mix) = alignment_engine(3);
    assert_eq!(pooled.scheduler().worker_threads(), 3);

    inline.transport().request_roll();
    pooled.transport().request_roll();
    for _ in 0..4 {
        assert_eq!(
            inline.process(TEST_BLOCK_LENGTH).unwrap(),
            pooled.process(TEST_BLOCK_LENGTH).unwrap()
        );
        assert_eq!(inline_mix.snapshot(), pooled_mix.snapshot());
    }
}

/// Every node is re-processable after a cycle.
#[test]
fn test_refcounts_restored_after_cycle() {
    for workers in [0, 2] {
        let (mut engine, _) = alignment_engine(workers);
        engine.transport().request_roll();
        for _ in 0..3 {
            engine.process(TEST_BLOCK_LENGTH).unwrap();
            let graph = engine.current_graph().unwrap();
            for node in graph.nodes() {
                assert_eq!(node.refcount(), node.init_refcount(), "node {}", node.name());
            }
        }
    }
}

/// A (latency 0) and B (latency 64) passthroughs summed into C, already rolling.
#[test]
fn test_end_to_end_passthrough_scenario() {
    let engine = test_engine();
    let a = AudioPassthroughProcessor::new("A", 1, 0);
    let b = AudioPassthroughProcessor::new("B", 1, 64);
    let c = Arc::new(AudioPort::new("C", PortFlow::Input));

    let conns = engine.connections();
    for proc in [&a, &b] {
        let out = proc.output(0).unwrap().info().id;
        conns.connect(PortConnection::new(out, c.info().id)).unwrap();
    }
    engine
        .graph(|graph| {
            a.add_to_graph(graph)?;
            b.add_to_graph(graph)?;
            graph.add_port(Port::Audio(c.clone()));
            Ok(())
        })
        .unwrap();

    start_rolling(engine.transport());
    let graph = engine.current_graph().unwrap();
    graph.clear_port_buffers(TEST_BLOCK_LENGTH);

    let a_input = ramp(0, 128);
    let b_input = ramp(500, 128);
    feed(a.input(0).unwrap(), 0, &a_input);
    feed(b.input(0).unwrap(), 0, &b_input);
    engine
        .scheduler()
        .run_chunk(EngineProcessTimeInfo::new(0, 0, TEST_BLOCK_LENGTH), 0);

    let out = c.snapshot();
    assert_signal_eq(&out[..64], &a_input[..64]);
    let summed: Vec<f32> = a_input[64..]
        .iter()
        .zip(&b_input[..64])
        .map(|(a, b)| a + b)
        .collect();
    assert_signal_eq(&out[64..], &summed);
}

#[test]
fn test_bypassed_node_still_releases_children() {
    let (mut engine, mix) = alignment_engine(0);
    let graph = engine.current_graph().unwrap();
    let a = graph
        .initial_nodes()
        .iter()
        .copied()
        .find(|&id| graph.node(id).unwrap().name() == "A")
        .unwrap();
    graph.set_bypass(a, true).unwrap();
    drop(graph);

    engine.transport().request_roll();
    engine.process(TEST_BLOCK_LENGTH).unwrap();
    engine.process(TEST_BLOCK_LENGTH).unwrap();

    // only the delayed path reaches the mix
    let expected: Vec<f32> = ramp(64, 128).iter().map(|s| s * 0.5).collect();
    assert_signal_eq(&mix.snapshot(), &expected);
}

#[test]
fn test_cycle_rejected_and_previous_graph_kept() {
    let (engine, _) = alignment_engine(0);
    let before = engine.current_graph().unwrap();

    let result = engine.graph(|graph| {
        let a = graph.add_node(Box::new(|| "a".into()), Box::new(|_, _| {}), Box::new(|| 0));
        let b = graph.add_node(Box::new(|| "b".into()), Box::new(|_, _| {}), Box::new(|| 0));
        graph.connect(a, b)?;
        graph.connect(b, a)?;
        Ok(())
    });

    assert!(matches!(
        result,
        Err(Error::Core(ostinato::core::Error::GraphCycle(_)))
    ));
    assert!(Arc::ptr_eq(&before, &engine.current_graph().unwrap()));
}

#[test]
fn test_rebuild_swaps_graph_between_cycles() {
    let (mut engine, mix) = alignment_engine(0);
    engine.transport().request_roll();
    engine.process(TEST_BLOCK_LENGTH).unwrap();
    let old = engine.current_graph().unwrap();

    // same ports, no delay: A and B source both reach the mix directly
    let conns = engine.connections();
    conns.clear();
    let a_out = Arc::new(AudioPort::new("A Out", PortFlow::Output));
    conns.connect(PortConnection::new(a_out.info().id, mix.info().id)).unwrap();
    engine
        .graph(|graph| {
            add_ramp_source(graph, "A", &a_out);
            graph.add_port(Port::Audio(mix.clone()));
            Ok(())
        })
        .unwrap();

    assert!(!Arc::ptr_eq(&old, &engine.current_graph().unwrap()));
    drop(old);
    engine.scheduler().collect_garbage();

    engine.process(TEST_BLOCK_LENGTH).unwrap();
    assert_signal_eq(&mix.snapshot(), &ramp(64, 128));
}

fn synth_graph(graph: &mut Graph, out: &Arc<AudioPort>) -> ostinato::Result<()> {
    add_ramp_source(graph, "synth", out);
    Ok(())
}

/// The control thread rebuilds around the same port while the audio thread
/// keeps running cycles on the old graph.
#[test]
fn test_rebuild_while_processing() {
    for workers in [0, 2] {
        let engine = test_engine_with_workers(workers);
        let out = Arc::new(AudioPort::new("Synth Out", PortFlow::Output));
        engine.graph(|graph| synth_graph(graph, &out)).unwrap();

        let mut audio = GraphDispatcher::new(
            Arc::clone(engine.scheduler()),
            Arc::clone(engine.transport()),
            *engine.config(),
        )
        .unwrap();
        let rebuilding = AtomicBool::new(true);

        std::thread::scope(|s| {
            s.spawn(|| {
                let mut cycles = 0;
                while rebuilding.load(Ordering::Acquire) || cycles < 50 {
                    assert_eq!(audio.process(TEST_BLOCK_LENGTH).unwrap(), 0);
                    cycles += 1;
                }
            });
            for _ in 0..200 {
                engine.graph(|graph| synth_graph(graph, &out)).unwrap();
            }
            rebuilding.store(false, Ordering::Release);
        });

        // the paused playhead keeps every cycle on the same ramp
        assert!(audio.cycle() >= 50);
        assert_signal_eq(&out.snapshot(), &ramp(0, TEST_BLOCK_LENGTH as usize));
    }
}
