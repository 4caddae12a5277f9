//! MIDI integration tests
//!
//! Queued events reaching the graph, channel filtering between ports and
//! delayed MIDI crossing cycle boundaries.

use std::sync::Arc;

use ostinato::prelude::*;
use ostinato::MidiPassthroughProcessor;

use crate::helpers::*;

fn times(events: &ostinato::MidiEventVector) -> Vec<u32> {
    events.to_vec().iter().map(|e| e.time).collect()
}

#[test]
fn test_dequeue_moves_only_current_window() {
    let mut engine = test_engine();
    let keys = Arc::new(MidiPort::new("Keys", PortFlow::Output));
    engine
        .graph(|graph| {
            graph.add_port(Port::Midi(keys.clone()));
            Ok(())
        })
        .unwrap();

    let events = keys.events();
    events.queued_events.add_note_on(1, 60, 100, 5);
    events.queued_events.add_note_on(1, 62, 100, 50);
    events.queued_events.add_note_on(1, 64, 100, 300);

    engine.process(64).unwrap();
    assert_eq!(times(&events.active_events), vec![5, 50]);
    assert_eq!(
        events.active_events.to_vec().iter().map(|e| e.note_number()).collect::<Vec<_>>(),
        vec![60, 62]
    );
    // re-timed for the next cycle
    assert_eq!(times(&events.queued_events), vec![236]);

    // the window is already drained
    assert_eq!(events.dequeue(0, 64), 0);
    assert_eq!(events.active_events.len(), 2);

    engine.process(64).unwrap();
    assert!(events.active_events.is_empty());
    assert_eq!(times(&events.queued_events), vec![172]);
}

#[test]
fn test_channel_filter_between_ports() {
    let mut engine = test_engine();
    let keys = Arc::new(MidiPort::new("Keys", PortFlow::Output));
    let synth = Arc::new(MidiPort::new("Synth In", PortFlow::Input));
    let mut channels = [false; 16];
    channels[0] = true;
    synth.set_channel_filter(Some(channels));

    engine
        .connections()
        .connect(PortConnection::new(keys.info().id, synth.info().id))
        .unwrap();
    engine
        .graph(|graph| {
            graph.add_port(Port::Midi(keys.clone()));
            graph.add_port(Port::Midi(synth.clone()));
            Ok(())
        })
        .unwrap();

    keys.events().queued_events.add_note_on(1, 60, 100, 3);
    keys.events().queued_events.add_note_on(2, 61, 100, 4);
    engine.process(TEST_BLOCK_LENGTH).unwrap();

    let received = synth.events().active_events.to_vec();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].channel(), Some(1));
    assert_eq!(keys.events().active_events.len(), 2);
    assert!(synth.take_activity());
}

/// Notes delayed past the cycle end come out in the cycle they fall in.
#[test]
fn test_delayed_midi_crosses_cycles() {
    let mut engine = test_engine();
    let keys = Arc::new(MidiPort::new("Keys", PortFlow::Output));
    let delay = MidiPassthroughProcessor::new("MIDI Delay", 1, 100);
    let synth = Arc::new(MidiPort::new("Synth In", PortFlow::Input));

    let conns = engine.connections();
    let delay_in = delay.input(0).unwrap().info().id;
    let delay_out = delay.output(0).unwrap().info().id;
    conns.connect(PortConnection::new(keys.info().id, delay_in)).unwrap();
    conns.connect(PortConnection::new(delay_out, synth.info().id)).unwrap();
    engine
        .graph(|graph| {
            graph.add_port(Port::Midi(keys.clone()));
            delay.add_to_graph(graph)?;
            graph.add_port(Port::Midi(synth.clone()));
            Ok(())
        })
        .unwrap();
    assert_eq!(engine.current_graph().unwrap().max_route_playback_latency(), 100);

    keys.events().queued_events.add_note_on(1, 60, 100, 10);
    keys.events().queued_events.add_note_on(1, 67, 100, 90);

    // global frames 10 and 90 arrive at 110 and 190
    let mut arrivals = Vec::new();
    for cycle in 0..4u32 {
        engine.process(64).unwrap();
        for ev in synth.events().active_events.to_vec() {
            arrivals.push((cycle * 64 + ev.time, ev.note_number()));
        }
    }
    assert_eq!(arrivals, vec![(110, 60), (190, 67)]);
}

#[test]
fn test_full_queue_drops_are_reported() {
    let engine = test_engine();
    let keys = Arc::new(MidiPort::new("Keys", PortFlow::Output));
    engine
        .graph(|graph| {
            graph.add_port(Port::Midi(keys.clone()));
            Ok(())
        })
        .unwrap();

    let queued = &keys.events().queued_events;
    for i in 0..ostinato::midi::MAX_MIDI_EVENTS + 10 {
        queued.add_note_on(1, 60, 100, i as u32);
    }
    assert_eq!(queued.len(), ostinato::midi::MAX_MIDI_EVENTS);
    assert_eq!(engine.take_dropped_midi_events(), 10);
    assert_eq!(engine.take_dropped_midi_events(), 0);
}

/// Events of a long cycle never leak into a shorter one.
#[test]
fn test_shorter_cycle_starts_without_stale_events() {
    let mut engine = test_engine();
    let keys = Arc::new(MidiPort::new("Keys", PortFlow::Output));
    engine
        .graph(|graph| {
            graph.add_port(Port::Midi(keys.clone()));
            Ok(())
        })
        .unwrap();

    keys.events().queued_events.add_note_on(1, 60, 100, 100);
    engine.process(128).unwrap();
    assert_eq!(times(&keys.events().active_events), vec![100]);

    engine.process(64).unwrap();
    assert!(keys.events().active_events.is_empty());
}
