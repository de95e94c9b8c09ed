//! Host audio context seam.
//!
//! The engine never produces samples itself. It builds short-lived node
//! graphs through this trait and schedules their parameters ahead of time;
//! the host renders them.

use core::fmt;
use std::sync::Arc;

use egs_ir::{NodeId, ParamKind, PcmBuffer, Waveform};

/// Error type for graph operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GraphError {
    /// The host refuses to create more nodes
    Exhausted,
    /// The node handle is not (or no longer) part of the graph
    UnknownNode,
    /// Offline rendering requested on a real-time context
    NotOffline,
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphError::Exhausted => write!(f, "Audio graph exhausted"),
            GraphError::UnknownNode => write!(f, "Unknown audio node"),
            GraphError::NotOffline => write!(f, "Context cannot render offline"),
        }
    }
}

impl std::error::Error for GraphError {}

/// Operations the engine needs from the host audio system.
///
/// Times are absolute seconds on the context clock. Scheduled parameter
/// changes and source start/stop times take effect sample-accurately when
/// the host renders.
pub trait AudioContext {
    /// Current clock in seconds. Monotonic.
    fn now(&self) -> f64;

    fn sample_rate(&self) -> u32;

    /// Final output node.
    fn destination(&self) -> NodeId;

    fn create_gain(&mut self, value: f32) -> Result<NodeId, GraphError>;

    fn create_oscillator(&mut self, waveform: &Waveform, frequency: f32) -> Result<NodeId, GraphError>;

    fn create_bandpass(&mut self, frequency: f32, q: f32) -> Result<NodeId, GraphError>;

    fn create_buffer_source(&mut self, buffer: Arc<PcmBuffer>, looping: bool) -> Result<NodeId, GraphError>;

    /// Route `from`'s output into `to`'s input.
    fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphError>;

    /// Route `from`'s output into a parameter of `to`, summed with its
    /// scheduled value.
    fn connect_param(&mut self, from: NodeId, to: NodeId, param: ParamKind) -> Result<(), GraphError>;

    /// Remove a node and every connection to or from it.
    fn disconnect(&mut self, node: NodeId);

    fn set_value_at_time(&mut self, node: NodeId, param: ParamKind, value: f32, time: f64);

    /// Ramp linearly from the previous scheduled value to `value` at `time`.
    fn linear_ramp_to_value_at_time(&mut self, node: NodeId, param: ParamKind, value: f32, time: f64);

    /// Drop scheduled changes at or after `time`.
    fn cancel_scheduled_values(&mut self, node: NodeId, param: ParamKind, time: f64);

    /// Parameter value at `now()`.
    fn param_value(&self, node: NodeId, param: ParamKind) -> f32;

    /// Start a source node at `when`.
    fn start(&mut self, node: NodeId, when: f64);

    /// Stop a source node at `when`.
    fn stop(&mut self, node: NodeId, when: f64);

    /// Whether a source has finished playing. Unknown nodes count as ended.
    fn has_ended(&self, node: NodeId) -> bool;

    /// Create an offline context of the same kind, `duration` seconds long.
    fn offline(&self, duration: f64, sample_rate: u32) -> Result<Self, GraphError>
    where
        Self: Sized;

    /// Render an offline context's whole duration from its destination.
    fn render(&mut self) -> Result<PcmBuffer, GraphError>;
}
