//! Scheduling and synthesis engine for EGS sounds and songs.
//!
//! Turns decoded documents into scheduled node graphs on a host
//! [`AudioContext`]. A [`Bus`] owns one playing song, a [`SoundPool`]
//! resolves one-shot sounds to decoded buffers.

mod bus;
mod context;
mod frame;
mod frequency;
mod render;
mod settings;
mod sound_pool;
mod synth;

#[cfg(test)]
mod mock;

use core::fmt;

use egs_formats::FormatError;

pub use bus::Bus;
pub use context::{AudioContext, GraphError};
pub use frame::Frame;
pub use frequency::{cents_to_ratio, note_to_frequency};
pub use render::{render_blob, render_document};
pub use settings::EngineSettings;
pub use sound_pool::{EntryState, PoolEntry, ResourceStore, SoundPool};
pub use synth::Channel;

/// Error type for engine operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineError {
    /// A blob failed to decode
    Format(FormatError),
    /// The host graph refused an operation
    Graph(GraphError),
    /// The resource store has no blob for this key
    MissingResource { resource_id: u32, sub_index: u16 },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Format(e) => write!(f, "{}", e),
            EngineError::Graph(e) => write!(f, "{}", e),
            EngineError::MissingResource { resource_id, sub_index } => {
                write!(f, "Missing resource {}:{}", resource_id, sub_index)
            }
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Format(e) => Some(e),
            EngineError::Graph(e) => Some(e),
            EngineError::MissingResource { .. } => None,
        }
    }
}

impl From<FormatError> for EngineError {
    fn from(e: FormatError) -> Self {
        EngineError::Format(e)
    }
}

impl From<GraphError> for EngineError {
    fn from(e: GraphError) -> Self {
        EngineError::Graph(e)
    }
}
