//! Offline rendering of sample blobs.
//!
//! Drum notes and one-shot sounds play as PCM. WAV blobs decode directly;
//! EGS blobs play once through a fresh bus on an offline context sized to
//! the song's extent.

use std::sync::Arc;

use egs_formats::{detect_format, load_wav, song_extent, split_egs};
use egs_ir::{Document, PcmBuffer, SoundFormat};
use log::{debug, warn};

use crate::bus::Bus;
use crate::context::AudioContext;
use crate::settings::EngineSettings;
use crate::EngineError;

/// Decode or render a blob to PCM.
///
/// Returns `Ok(None)` for formats that have no PCM form here (MIDI and
/// unrecognized blobs).
pub fn render_blob<C: AudioContext>(
    ctx: &C,
    bytes: &[u8],
    settings: &EngineSettings,
) -> Result<Option<Arc<PcmBuffer>>, EngineError> {
    match detect_format(bytes) {
        SoundFormat::Wav => Ok(Some(Arc::new(load_wav(bytes)?))),
        SoundFormat::Egs => {
            let document = Arc::new(split_egs(bytes)?);
            Ok(Some(Arc::new(render_document(ctx, document, settings)?)))
        }
        format => {
            warn!("No PCM form for {} blob of {} bytes", format, bytes.len());
            Ok(None)
        }
    }
}

/// Play a document once on an offline context and return the mix.
pub fn render_document<C: AudioContext>(
    ctx: &C,
    document: Arc<Document>,
    settings: &EngineSettings,
) -> Result<PcmBuffer, EngineError> {
    let rate = ctx.sample_rate();
    let extent = song_extent(&document).max(1.0 / rate.max(1) as f64);
    debug!("Rendering {:.3}s offline at {} Hz", extent, rate);

    let mut offline = ctx.offline(extent, rate)?;
    let settings = EngineSettings { start_delay: 0.0, ..settings.clone() };
    let mut bus = Bus::new(document, false, &mut offline, &settings)?;
    bus.update(&mut offline, extent + settings.lookahead);
    Ok(offline.render()?)
}
