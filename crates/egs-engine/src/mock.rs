//! Recording audio context for engine tests.

use std::sync::Arc;

use egs_formats::{split_egs, EgsWriter, EnvelopeWriter};
use egs_ir::{Document, Mode, NodeId, ParamKind, PcmBuffer, Waveform};
use slotmap::SlotMap;

use crate::context::{AudioContext, GraphError};

#[derive(Clone, Debug, PartialEq)]
pub enum MockKind {
    Destination,
    Gain,
    Oscillator { waveform: Waveform, frequency: f32 },
    Bandpass { frequency: f32, q: f32 },
    BufferSource { frames: usize, looping: bool },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Automation {
    Set { value: f32, time: f64 },
    Ramp { value: f32, time: f64 },
}

impl Automation {
    fn time(&self) -> f64 {
        match *self {
            Automation::Set { time, .. } | Automation::Ramp { time, .. } => time,
        }
    }

    fn value(&self) -> f32 {
        match *self {
            Automation::Set { value, .. } | Automation::Ramp { value, .. } => value,
        }
    }
}

#[derive(Clone, Debug)]
pub struct MockNode {
    pub kind: MockKind,
    pub initial: f32,
    pub automation: Vec<(ParamKind, Automation)>,
    pub start: Option<f64>,
    pub stop: Option<f64>,
    pub outputs: Vec<(NodeId, Option<ParamKind>)>,
}

impl MockNode {
    fn new(kind: MockKind, initial: f32) -> Self {
        Self { kind, initial, automation: Vec::new(), start: None, stop: None, outputs: Vec::new() }
    }

    pub fn events(&self, param: ParamKind) -> Vec<Automation> {
        self.automation.iter().filter(|(p, _)| *p == param).map(|(_, a)| *a).collect()
    }

    fn value_at(&self, param: ParamKind, now: f64) -> f32 {
        let mut events = self.events(param);
        events.sort_by(|a, b| a.time().total_cmp(&b.time()));
        let mut value = self.initial;
        let mut last_time = f64::NEG_INFINITY;
        for event in events {
            if event.time() <= now {
                value = event.value();
                last_time = event.time();
                continue;
            }
            if let Automation::Ramp { value: target, time } = event {
                let span = time - last_time;
                if span.is_finite() && span > 0.0 {
                    let t = ((now - last_time) / span) as f32;
                    value += (target - value) * t;
                }
            }
            break;
        }
        value
    }
}

/// Audio context that records every call and never makes sound.
#[derive(Debug)]
pub struct MockContext {
    pub now: f64,
    pub rate: u32,
    pub nodes: SlotMap<NodeId, MockNode>,
    pub destination: NodeId,
    /// Maximum live nodes, destination included
    pub limit: Option<usize>,
    pub duration: Option<f64>,
    pub disconnected: usize,
}

impl MockContext {
    pub fn new(rate: u32) -> Self {
        let mut nodes = SlotMap::with_key();
        let destination = nodes.insert(MockNode::new(MockKind::Destination, 1.0));
        Self { now: 0.0, rate, nodes, destination, limit: None, duration: None, disconnected: 0 }
    }

    pub fn with_limit(rate: u32, limit: usize) -> Self {
        Self { limit: Some(limit), ..Self::new(rate) }
    }

    fn add(&mut self, kind: MockKind, initial: f32) -> Result<NodeId, GraphError> {
        if self.limit.is_some_and(|l| self.nodes.len() >= l) {
            return Err(GraphError::Exhausted);
        }
        Ok(self.nodes.insert(MockNode::new(kind, initial)))
    }

    pub fn node(&self, id: NodeId) -> &MockNode {
        &self.nodes[id]
    }

    /// Live nodes of one kind, ignoring field values.
    pub fn count(&self, matches: impl Fn(&MockKind) -> bool) -> usize {
        self.nodes.values().filter(|n| matches(&n.kind)).count()
    }

    pub fn oscillators(&self) -> Vec<(NodeId, &MockNode)> {
        self.nodes.iter().filter(|(_, n)| matches!(n.kind, MockKind::Oscillator { .. })).collect()
    }
}

impl AudioContext for MockContext {
    fn now(&self) -> f64 {
        self.now
    }

    fn sample_rate(&self) -> u32 {
        self.rate
    }

    fn destination(&self) -> NodeId {
        self.destination
    }

    fn create_gain(&mut self, value: f32) -> Result<NodeId, GraphError> {
        self.add(MockKind::Gain, value)
    }

    fn create_oscillator(&mut self, waveform: &Waveform, frequency: f32) -> Result<NodeId, GraphError> {
        self.add(MockKind::Oscillator { waveform: waveform.clone(), frequency }, 0.0)
    }

    fn create_bandpass(&mut self, frequency: f32, q: f32) -> Result<NodeId, GraphError> {
        self.add(MockKind::Bandpass { frequency, q }, 0.0)
    }

    fn create_buffer_source(&mut self, buffer: Arc<PcmBuffer>, looping: bool) -> Result<NodeId, GraphError> {
        self.add(MockKind::BufferSource { frames: buffer.len(), looping }, 0.0)
    }

    fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphError> {
        if !self.nodes.contains_key(to) {
            return Err(GraphError::UnknownNode);
        }
        let node = self.nodes.get_mut(from).ok_or(GraphError::UnknownNode)?;
        node.outputs.push((to, None));
        Ok(())
    }

    fn connect_param(&mut self, from: NodeId, to: NodeId, param: ParamKind) -> Result<(), GraphError> {
        if !self.nodes.contains_key(to) {
            return Err(GraphError::UnknownNode);
        }
        let node = self.nodes.get_mut(from).ok_or(GraphError::UnknownNode)?;
        node.outputs.push((to, Some(param)));
        Ok(())
    }

    fn disconnect(&mut self, node: NodeId) {
        if self.nodes.remove(node).is_some() {
            self.disconnected += 1;
        }
        for other in self.nodes.values_mut() {
            other.outputs.retain(|(to, _)| *to != node);
        }
    }

    fn set_value_at_time(&mut self, node: NodeId, param: ParamKind, value: f32, time: f64) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.automation.push((param, Automation::Set { value, time }));
        }
    }

    fn linear_ramp_to_value_at_time(&mut self, node: NodeId, param: ParamKind, value: f32, time: f64) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.automation.push((param, Automation::Ramp { value, time }));
        }
    }

    fn cancel_scheduled_values(&mut self, node: NodeId, param: ParamKind, time: f64) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.automation.retain(|(p, a)| *p != param || a.time() < time);
        }
    }

    fn param_value(&self, node: NodeId, param: ParamKind) -> f32 {
        self.nodes.get(node).map_or(0.0, |n| n.value_at(param, self.now))
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
        match self.nodes.get(node) {
            Some(n) => n.stop.is_some_and(|t| t <= self.now),
            None => true,
        }
    }

    fn offline(&self, duration: f64, sample_rate: u32) -> Result<Self, GraphError> {
        Ok(Self { duration: Some(duration), ..Self::new(sample_rate) })
    }

    fn render(&mut self) -> Result<PcmBuffer, GraphError> {
        let duration = self.duration.ok_or(GraphError::NotOffline)?;
        let frames = (duration * self.rate as f64).round() as usize;
        Ok(PcmBuffer::silent(self.rate, frames))
    }
}

/// Wave config: flat full-scale level, the given shape, no pitch curve.
pub fn flat_wave(shape: u8) -> Vec<u8> {
    let mut config = EnvelopeWriter::new().initial(1.0).to_bytes();
    config.push(shape);
    config
}

/// A one-channel wave song over `events`.
pub fn wave_song(events: &[u8]) -> Arc<Document> {
    let bytes = EgsWriter::new().channel(0, 255, Mode::Wave, &flat_wave(0)).events(events).finish();
    Arc::new(split_egs(&bytes).unwrap())
}

/// A mono 16-bit WAV file.
pub fn wav_bytes(rate: u32, samples: &[i16]) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let mut out = Vec::with_capacity(44 + data_len as usize);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVEfmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&rate.to_le_bytes());
    out.extend_from_slice(&(rate * 2).to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}
