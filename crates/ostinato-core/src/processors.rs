//! Passthrough processors with a configurable latency.
//!
//! Both copy their inputs to their outputs, delayed by the reported latency.
//! They stand in for latency-inducing processing wherever a graph needs a
//! node with ports on both sides.

use core::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::graph::{Graph, NodeId, ProcessMode};
use crate::pdc::DelayBuffer;
use crate::port::{AudioPort, MidiPort, Port, PortFlow};
use crate::{EngineProcessTimeInfo, NFrames, Result};

fn port_label(name: &str, dir: &str, index: usize, count: usize) -> String {
    if count == 1 {
        format!("{name} {dir}")
    } else {
        format!("{name} {dir} {}", index + 1)
    }
}

/// Copies N audio channels, delayed by `latency` frames.
pub struct AudioPassthroughProcessor {
    name: String,
    inputs: Vec<Arc<AudioPort>>,
    outputs: Vec<Arc<AudioPort>>,
    delays: Mutex<Vec<DelayBuffer>>,
    latency: AtomicU32,
}

impl AudioPassthroughProcessor {
    pub fn new(name: impl Into<String>, num_ports: usize, latency: NFrames) -> Arc<Self> {
        let name = name.into();
        let inputs = (0..num_ports)
            .map(|i| Arc::new(AudioPort::new(port_label(&name, "In", i, num_ports), PortFlow::Input)))
            .collect();
        let outputs = (0..num_ports)
            .map(|i| Arc::new(AudioPort::new(port_label(&name, "Out", i, num_ports), PortFlow::Output)))
            .collect();
        Arc::new(Self {
            name,
            inputs,
            outputs,
            delays: Mutex::new(vec![DelayBuffer::new(latency as usize); num_ports]),
            latency: AtomicU32::new(latency),
        })
    }

    /// Two-channel passthrough.
    pub fn stereo(name: impl Into<String>, latency: NFrames) -> Arc<Self> {
        Self::new(name, 2, latency)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input(&self, index: usize) -> Option<&Arc<AudioPort>> {
        self.inputs.get(index)
    }

    pub fn output(&self, index: usize) -> Option<&Arc<AudioPort>> {
        self.outputs.get(index)
    }

    pub fn num_ports(&self) -> usize {
        self.inputs.len()
    }

    pub fn latency(&self) -> NFrames {
        self.latency.load(Ordering::Acquire)
    }

    /// Changes the delay. Takes effect in the graph after
    /// [`Graph::update_latencies`] or a rebuild.
    pub fn set_latency(&self, latency: NFrames) {
        self.latency.store(latency, Ordering::Release);
        for delay in self.delays.lock().iter_mut() {
            delay.set_delay(latency as usize);
        }
    }

    /// Adds the ports and the processing node, wired in -> node -> out.
    pub fn add_to_graph(self: &Arc<Self>, graph: &mut Graph) -> Result<NodeId> {
        let name = self.name.clone();
        let runner = Arc::clone(self);
        let latency = Arc::clone(self);
        let node = graph.add_node(
            Box::new(move || name.clone()),
            Box::new(move |nfo, mode| runner.process(nfo, mode)),
            Box::new(move || latency.latency()),
        );
        for (input, output) in self.inputs.iter().zip(&self.outputs) {
            let in_node = graph.add_port(Port::Audio(Arc::clone(input)));
            let out_node = graph.add_port(Port::Audio(Arc::clone(output)));
            graph.connect(in_node, node)?;
            graph.connect(node, out_node)?;
        }
        Ok(node)
    }

    /// Delays each input chunk into its output. Nothing is written in no-roll mode.
    pub fn process(&self, time_nfo: EngineProcessTimeInfo, mode: ProcessMode) {
        if mode == ProcessMode::NoRoll {
            return;
        }
        // latency is being changed; the outputs keep their cleared contents
        let Some(mut delays) = self.delays.try_lock() else {
            return;
        };
        let range = time_nfo.range();
        for ((input, output), delay) in self.inputs.iter().zip(&self.outputs).zip(delays.iter_mut()) {
            // SAFETY: the input node finished before this one; the output
            // node runs after it
            let (src, dest) = unsafe { (input.buffer(), output.buffer_mut()) };
            if range.end > src.len() || range.end > dest.len() {
                continue;
            }
            delay.process_batch(&src[range.clone()], &mut dest[range.clone()]);
        }
    }
}

/// Copies N MIDI streams, delayed by `latency` frames.
///
/// Delayed events that land beyond the current chunk are queued on the
/// output port and come out in the chunk or cycle they fall in.
pub struct MidiPassthroughProcessor {
    name: String,
    inputs: Vec<Arc<MidiPort>>,
    outputs: Vec<Arc<MidiPort>>,
    latency: AtomicU32,
}

impl MidiPassthroughProcessor {
    pub fn new(name: impl Into<String>, num_ports: usize, latency: NFrames) -> Arc<Self> {
        let name = name.into();
        let inputs = (0..num_ports)
            .map(|i| Arc::new(MidiPort::new(port_label(&name, "In", i, num_ports), PortFlow::Input)))
            .collect();
        let outputs = (0..num_ports)
            .map(|i| Arc::new(MidiPort::new(port_label(&name, "Out", i, num_ports), PortFlow::Output)))
            .collect();
        Arc::new(Self {
            name,
            inputs,
            outputs,
            latency: AtomicU32::new(latency),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input(&self, index: usize) -> Option<&Arc<MidiPort>> {
        self.inputs.get(index)
    }

    pub fn output(&self, index: usize) -> Option<&Arc<MidiPort>> {
        self.outputs.get(index)
    }

    pub fn latency(&self) -> NFrames {
        self.latency.load(Ordering::Acquire)
    }

    pub fn set_latency(&self, latency: NFrames) {
        self.latency.store(latency, Ordering::Release);
    }

    pub fn add_to_graph(self: &Arc<Self>, graph: &mut Graph) -> Result<NodeId> {
        let name = self.name.clone();
        let runner = Arc::clone(self);
        let latency = Arc::clone(self);
        let node = graph.add_node(
            Box::new(move || name.clone()),
            Box::new(move |nfo, mode| runner.process(nfo, mode)),
            Box::new(move || latency.latency()),
        );
        for (input, output) in self.inputs.iter().zip(&self.outputs) {
            let in_node = graph.add_port(Port::Midi(Arc::clone(input)));
            let out_node = graph.add_port(Port::Midi(Arc::clone(output)));
            graph.connect(in_node, node)?;
            graph.connect(node, out_node)?;
        }
        Ok(node)
    }

    pub fn process(&self, time_nfo: EngineProcessTimeInfo, mode: ProcessMode) {
        if mode == ProcessMode::NoRoll {
            return;
        }
        let latency = self.latency();
        let window = time_nfo.local_offset..time_nfo.end_offset();
        for (input, output) in self.inputs.iter().zip(&self.outputs) {
            let out = output.events();
            input.events().active_events.foreach_event(|ev| {
                if !window.contains(&ev.time) {
                    return;
                }
                let mut delayed = *ev;
                delayed.time = ev.time.saturating_add(latency);
                if window.contains(&delayed.time) {
                    out.active_events.push_back(delayed);
                } else {
                    out.queued_events.push_back(delayed);
                }
            });
        }
    }
}
