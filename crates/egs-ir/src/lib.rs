//! Core data types for the EGS sound engine.
//!
//! This crate defines the decoded forms of sound blobs shared by the
//! format decoders, the synthesis engine and the audio backends. The
//! decoders emit these types and the engine consumes them.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod document;
mod envelope;
mod event;
mod format;
mod graph;
mod pcm;

pub use document::{ChannelConfig, Document, Mode};
pub use envelope::{lerp, Breakpoint, Envelope, EnvelopePoint, FLAG_HIGH, FLAG_INITIAL_LOW, FLAG_SUSTAIN};
pub use event::Event;
pub use format::SoundFormat;
pub use graph::{NodeId, ParamKind, Waveform, MAX_HARMONICS};
pub use pcm::PcmBuffer;
