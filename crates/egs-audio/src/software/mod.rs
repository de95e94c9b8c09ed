//! Software implementation of the engine's audio context.
//!
//! Nodes live in a slot map. Each block, the graph reachable from the
//! destination is processed inputs-first; parameters are evaluated per
//! sample from their schedules.

mod node;
mod param;

use std::collections::HashSet;
use std::sync::Arc;

use egs_engine::{AudioContext, GraphError};
use egs_ir::{NodeId, ParamKind, PcmBuffer, Waveform};
use log::trace;
use slotmap::SlotMap;

use node::{param_slot, Bandpass, BufferPlayer, Node, NodeKind, Oscillator, PARAMS};

/// Frames processed per block.
pub const BLOCK: usize = 128;

/// Graph-based renderer usable in real time or offline.
pub struct SoftwareContext {
    sample_rate: u32,
    nodes: SlotMap<NodeId, Node>,
    destination: NodeId,
    node_limit: Option<usize>,
    /// Frames rendered so far
    rendered: u64,
    /// Length of an offline context in frames
    offline_frames: Option<usize>,
    /// Last rendered block and how much of it `process` has handed out
    pending: [f32; BLOCK],
    pending_pos: usize,
    /// Cached render order, rebuilt after the edges change
    order: Vec<NodeId>,
    order_dirty: bool,
    seen: HashSet<NodeId>,
    /// Per-node scratch reused across blocks
    input: [f32; BLOCK],
    mods: [[f32; BLOCK]; PARAMS],
}

impl SoftwareContext {
    pub fn new(sample_rate: u32) -> Self {
        let mut nodes = SlotMap::with_key();
        let destination = nodes.insert(Node::new(NodeKind::Destination, 1.0, 0.0, 0.0));
        Self {
            sample_rate: sample_rate.max(1),
            nodes,
            destination,
            node_limit: None,
            rendered: 0,
            offline_frames: None,
            pending: [0.0; BLOCK],
            pending_pos: BLOCK,
            order: Vec::new(),
            order_dirty: true,
            seen: HashSet::new(),
            input: [0.0; BLOCK],
            mods: [[0.0; BLOCK]; PARAMS],
        }
    }

    /// A context that refuses to hold more than `limit` nodes.
    pub fn with_node_limit(sample_rate: u32, limit: usize) -> Self {
        Self { node_limit: Some(limit), ..Self::new(sample_rate) }
    }

    /// Number of live nodes, destination included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Length in frames if this is an offline context.
    pub fn offline_frames(&self) -> Option<usize> {
        self.offline_frames
    }

    fn add(&mut self, node: Node) -> Result<NodeId, GraphError> {
        if self.node_limit.is_some_and(|limit| self.nodes.len() >= limit) {
            return Err(GraphError::Exhausted);
        }
        Ok(self.nodes.insert(node))
    }

    /// Rebuild the render order if the edges changed: nodes reachable from
    /// the destination, each after everything it reads.
    fn refresh_order(&mut self) {
        fn visit(nodes: &SlotMap<NodeId, Node>, id: NodeId, seen: &mut HashSet<NodeId>, out: &mut Vec<NodeId>) {
            if !seen.insert(id) {
                return;
            }
            let Some(node) = nodes.get(id) else {
                return;
            };
            for &input in &node.inputs {
                visit(nodes, input, seen, out);
            }
            for &(_, input) in &node.param_inputs {
                visit(nodes, input, seen, out);
            }
            out.push(id);
        }

        if !self.order_dirty {
            return;
        }
        self.order.clear();
        self.seen.clear();
        visit(&self.nodes, self.destination, &mut self.seen, &mut self.order);
        self.order_dirty = false;
    }

    /// Render the next block of the destination's output.
    fn render_block(&mut self) -> [f32; BLOCK] {
        let rate = self.sample_rate as f64;
        let t0 = self.rendered as f64 / rate;

        self.refresh_order();
        for &id in &self.order {
            self.input.fill(0.0);
            for row in &mut self.mods {
                row.fill(0.0);
            }
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            for &src in &node.inputs {
                if let Some(src) = self.nodes.get(src) {
                    for (acc, s) in self.input.iter_mut().zip(src.out.iter()) {
                        *acc += s;
                    }
                }
            }
            for &(param, src) in &node.param_inputs {
                if let Some(src) = self.nodes.get(src) {
                    for (acc, s) in self.mods[param_slot(param)].iter_mut().zip(src.out.iter()) {
                        *acc += s;
                    }
                }
            }
            if let Some(node) = self.nodes.get_mut(id) {
                node.render(&self.input, &self.mods, t0, rate);
            }
        }

        for node in self.nodes.values_mut() {
            node.prune(t0);
        }
        self.rendered += BLOCK as u64;
        self.nodes.get(self.destination).map_or([0.0; BLOCK], |d| d.out)
    }

    /// Fill `out` with the next mono samples, advancing the clock.
    pub fn process(&mut self, out: &mut [f32]) {
        for sample in out.iter_mut() {
            if self.pending_pos == BLOCK {
                self.pending = self.render_block();
                self.pending_pos = 0;
            }
            *sample = self.pending[self.pending_pos];
            self.pending_pos += 1;
        }
    }
}

impl AudioContext for SoftwareContext {
    fn now(&self) -> f64 {
        let handed_out = self.rendered - (BLOCK - self.pending_pos) as u64;
        handed_out as f64 / self.sample_rate as f64
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn destination(&self) -> NodeId {
        self.destination
    }

    fn create_gain(&mut self, value: f32) -> Result<NodeId, GraphError> {
        self.add(Node::new(NodeKind::Gain, value, 0.0, 0.0))
    }

    fn create_oscillator(&mut self, waveform: &Waveform, frequency: f32) -> Result<NodeId, GraphError> {
        self.add(Node::new(NodeKind::Oscillator(Oscillator::new(waveform)), 1.0, frequency, 0.0))
    }

    fn create_bandpass(&mut self, frequency: f32, q: f32) -> Result<NodeId, GraphError> {
        self.add(Node::new(NodeKind::Bandpass(Bandpass::new()), 1.0, frequency, q))
    }

    fn create_buffer_source(&mut self, buffer: Arc<PcmBuffer>, looping: bool) -> Result<NodeId, GraphError> {
        self.add(Node::new(NodeKind::BufferSource(BufferPlayer::new(buffer, looping)), 1.0, 0.0, 0.0))
    }

    fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphError> {
        if !self.nodes.contains_key(from) {
            return Err(GraphError::UnknownNode);
        }
        let node = self.nodes.get_mut(to).ok_or(GraphError::UnknownNode)?;
        node.inputs.push(from);
        self.order_dirty = true;
        Ok(())
    }

    fn connect_param(&mut self, from: NodeId, to: NodeId, param: ParamKind) -> Result<(), GraphError> {
        if !self.nodes.contains_key(from) {
            return Err(GraphError::UnknownNode);
        }
        let node = self.nodes.get_mut(to).ok_or(GraphError::UnknownNode)?;
        node.param_inputs.push((param, from));
        self.order_dirty = true;
        Ok(())
    }

    fn disconnect(&mut self, node: NodeId) {
        if node == self.destination || self.nodes.remove(node).is_none() {
            return;
        }
        for other in self.nodes.values_mut() {
            other.inputs.retain(|&id| id != node);
            other.param_inputs.retain(|&(_, id)| id != node);
        }
        self.order_dirty = true;
        trace!("Disconnected node, {} left", self.nodes.len());
    }

    fn set_value_at_time(&mut self, node: NodeId, param: ParamKind, value: f32, time: f64) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.param_mut(param).set_value_at_time(value, time);
        }
    }

    fn linear_ramp_to_value_at_time(&mut self, node: NodeId, param: ParamKind, value: f32, time: f64) {
        let now = self.now();
        if let Some(n) = self.nodes.get_mut(node) {
            n.param_mut(param).linear_ramp_to_value_at_time(value, time, now);
        }
    }

    fn cancel_scheduled_values(&mut self, node: NodeId, param: ParamKind, time: f64) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.param_mut(param).cancel_scheduled_values(time);
        }
    }

    fn param_value(&self, node: NodeId, param: ParamKind) -> f32 {
        let now = self.now();
        self.nodes.get(node).map_or(0.0, |n| n.param(param).value_at(now))
    }

    fn start(&mut self, node: NodeId, when: f64) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.start = Some(when);
        }
    }

    fn stop(&mut self, node: NodeId, when: f64) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.stop = Some(when);
        }
    }

    fn has_ended(&self, node: NodeId) -> bool {
        let now = self.now();
        self.nodes.get(node).map_or(true, |n| n.has_ended(now))
    }

    fn offline(&self, duration: f64, sample_rate: u32) -> Result<Self, GraphError> {
        let frames = (duration.max(0.0) * sample_rate as f64 - 1e-9).ceil().max(0.0) as usize;
        Ok(Self {
            offline_frames: Some(frames),
            node_limit: self.node_limit,
            ..Self::new(sample_rate)
        })
    }

    fn render(&mut self) -> Result<PcmBuffer, GraphError> {
        let frames = self.offline_frames.ok_or(GraphError::NotOffline)?;
        let mut samples = vec![0.0f32; frames];
        self.process(&mut samples);
        Ok(PcmBuffer::new(self.sample_rate, samples))
    }
}
