//! Voice: one sounding note and the graph nodes it owns.

use arrayvec::ArrayVec;
use egs_ir::{NodeId, ParamKind};

use crate::context::{AudioContext, GraphError};

/// Most nodes one voice builds (FM: carrier, modulator, depth gain, level gain).
pub(crate) const MAX_VOICE_NODES: usize = 6;

/// Most source nodes one voice starts.
pub(crate) const MAX_VOICE_SOURCES: usize = 2;

/// A live voice owned by a channel.
#[derive(Clone, Debug)]
pub(crate) struct Voice {
    nodes: ArrayVec<NodeId, MAX_VOICE_NODES>,
    sources: ArrayVec<NodeId, MAX_VOICE_SOURCES>,
    /// Level gain node, last in the chain
    gain: NodeId,
    /// Absolute start time
    pub start: f64,
    /// Absolute time the sources are scheduled to stop
    pub end: f64,
}

impl Voice {
    /// Whether every source has stopped.
    pub fn has_ended<C: AudioContext>(&self, ctx: &C) -> bool {
        self.sources.iter().all(|&s| ctx.has_ended(s))
    }

    #[cfg(test)]
    pub fn gain(&self) -> NodeId {
        self.gain
    }

    #[cfg(test)]
    pub fn sources(&self) -> &[NodeId] {
        &self.sources
    }

    /// Ramp the level to zero from `now` and stop the sources when it gets there.
    pub fn fade_out<C: AudioContext>(&mut self, ctx: &mut C, now: f64, fade: f64) {
        let current = ctx.param_value(self.gain, ParamKind::Gain);
        ctx.cancel_scheduled_values(self.gain, ParamKind::Gain, now);
        ctx.set_value_at_time(self.gain, ParamKind::Gain, current, now);
        ctx.linear_ramp_to_value_at_time(self.gain, ParamKind::Gain, 0.0, now + fade);
        let stop = now + fade;
        if stop < self.end {
            for &source in &self.sources {
                ctx.stop(source, stop);
            }
            self.end = stop;
        }
    }

    /// Remove every node of this voice from the graph.
    pub fn disconnect<C: AudioContext>(&self, ctx: &mut C) {
        for &node in &self.nodes {
            ctx.disconnect(node);
        }
    }
}

/// Collects the nodes of a voice under construction so a failure part way
/// through can take them all down again.
#[derive(Debug, Default)]
pub(crate) struct VoiceBuilder {
    nodes: ArrayVec<NodeId, MAX_VOICE_NODES>,
    sources: ArrayVec<NodeId, MAX_VOICE_SOURCES>,
}

impl VoiceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a processing node.
    pub fn node(&mut self, created: Result<NodeId, GraphError>) -> Result<NodeId, GraphError> {
        let node = created?;
        self.nodes.try_push(node).map_err(|_| GraphError::Exhausted)?;
        Ok(node)
    }

    /// Track a source node; the voice ends once all of its sources have.
    pub fn source(&mut self, created: Result<NodeId, GraphError>) -> Result<NodeId, GraphError> {
        let node = self.node(created)?;
        self.sources.try_push(node).map_err(|_| GraphError::Exhausted)?;
        Ok(node)
    }

    /// Schedule every source over `[start, end]` and hand the nodes to a voice.
    pub fn finish<C: AudioContext>(self, ctx: &mut C, gain: NodeId, start: f64, end: f64) -> Voice {
        for &source in &self.sources {
            ctx.start(source, start);
            ctx.stop(source, end);
        }
        Voice { nodes: self.nodes, sources: self.sources, gain, start, end }
    }

    /// Disconnect everything built so far.
    pub fn abort<C: AudioContext>(self, ctx: &mut C) {
        for node in self.nodes {
            ctx.disconnect(node);
        }
    }
}
