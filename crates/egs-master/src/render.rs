//! Offline song rendering through the software context.

use std::sync::Arc;

use egs_audio::{SoftwareContext, BLOCK};
use egs_engine::{AudioContext, Bus, EngineError, EngineSettings, Frame};
use egs_formats::split_egs;
use log::debug;

use crate::wav;

/// Upper bound on a render when the caller gives none and the song repeats.
pub const DEFAULT_MAX_SECONDS: f64 = 600.0;

/// Play a song through a fresh software context and collect its frames.
///
/// Runs the same tick loop as real-time playback, one block at a time.
/// Stops when the song has finished sounding or after `max_seconds`.
pub fn render_song(
    bytes: &[u8],
    sample_rate: u32,
    max_seconds: Option<f64>,
    repeat: bool,
    settings: &EngineSettings,
) -> Result<Vec<Frame>, EngineError> {
    let document = Arc::new(split_egs(bytes)?);
    let mut ctx = SoftwareContext::new(sample_rate);
    let mut bus = Bus::new(document, repeat, &mut ctx, settings)?;

    let max_seconds = max_seconds.unwrap_or(DEFAULT_MAX_SECONDS).max(0.0);
    let max_frames = (max_seconds * ctx.sample_rate() as f64) as usize;
    let mut frames = Vec::new();
    let mut block = [0.0f32; BLOCK];

    while frames.len() < max_frames {
        bus.tick(&mut ctx);
        let n = BLOCK.min(max_frames - frames.len());
        ctx.process(&mut block[..n]);
        frames.extend(block[..n].iter().map(|&s| Frame::from_f32(s)));
        if !bus.signal_pending(&mut ctx) {
            break;
        }
    }
    bus.teardown(&mut ctx);
    debug!("Rendered {} frames at {} Hz", frames.len(), sample_rate);
    Ok(frames)
}

/// Render a song straight to WAV bytes.
pub fn render_to_wav(
    bytes: &[u8],
    sample_rate: u32,
    max_seconds: Option<f64>,
    repeat: bool,
    settings: &EngineSettings,
) -> Result<Vec<u8>, RenderError> {
    let frames = render_song(bytes, sample_rate, max_seconds, repeat, settings)?;
    Ok(wav::frames_to_wav(&frames, sample_rate)?)
}

/// Failure of [`render_to_wav`].
#[derive(Debug)]
pub enum RenderError {
    Engine(EngineError),
    Wav(binrw::Error),
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderError::Engine(e) => write!(f, "{}", e),
            RenderError::Wav(e) => write!(f, "WAV write failed: {}", e),
        }
    }
}

impl std::error::Error for RenderError {}

impl From<EngineError> for RenderError {
    fn from(e: EngineError) -> Self {
        RenderError::Engine(e)
    }
}

impl From<binrw::Error> for RenderError {
    fn from(e: binrw::Error) -> Self {
        RenderError::Wav(e)
    }
}
