//! Headless controller for EGS sound and song playback.
//!
//! Provides one API for playing one-shot sounds and songs over any
//! [`AudioContext`], a threaded real-time [`Player`] on the default
//! device, and offline rendering to frames or WAV bytes.

mod controller;
mod player;
mod render;
mod wav;

// Re-export common types so callers don't need the lower crates directly.
pub use egs_audio::SoftwareContext;
pub use egs_engine::{AudioContext, EngineError, EngineSettings, Frame, ResourceStore};
pub use egs_formats::FormatError;
pub use egs_ir::{Document, SoundFormat};

pub use controller::{Controller, ONE_SHOT_SUB_INDEX};
pub use player::{Command, Player};
pub use render::{render_song, render_to_wav, RenderError, DEFAULT_MAX_SECONDS};
pub use wav::{frames_to_wav, write_wav};
