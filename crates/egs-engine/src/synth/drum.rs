//! Percussive sample playback keyed by note id.
//!
//! Config: repeated `noteId:u8 trimLow:u8 trimHigh:u8 len:u24 bytes[len]`
//! records. Each note's bytes are a WAV or nested EGS blob, rendered to PCM
//! the first time the note plays and reused after that.

use std::sync::Arc;

use egs_formats::{ByteReader, FormatError};
use egs_ir::{lerp, NodeId, ParamKind, PcmBuffer};
use log::warn;

use super::{NoteOn, VoiceBuilder};
use crate::context::AudioContext;
use crate::render::render_blob;
use crate::settings::EngineSettings;
use crate::EngineError;

/// Number of addressable drum notes.
pub(crate) const DRUM_NOTES: usize = 128;

#[derive(Clone, Debug)]
pub(crate) struct DrumNote {
    pub trim_low: f32,
    pub trim_high: f32,
    pub raw: Arc<[u8]>,
    pub rendered: Option<Arc<PcmBuffer>>,
}

#[derive(Clone, Debug)]
pub(crate) struct DrumSynth {
    trim: f32,
    notes: Vec<Option<DrumNote>>,
}

impl DrumSynth {
    pub fn decode(config: &[u8], trim: f32) -> Result<Self, FormatError> {
        let mut notes = vec![None; DRUM_NOTES];
        let mut reader = ByteReader::new(config);
        while !reader.is_empty() {
            let id = reader.read_u8()? as usize;
            let trim_low = reader.read_u8()? as f32 / 255.0;
            let trim_high = reader.read_u8()? as f32 / 255.0;
            let len = reader.read_u24_be()? as usize;
            let raw = reader.read_bytes(len)?;
            match notes.get_mut(id) {
                Some(slot) => *slot = Some(DrumNote { trim_low, trim_high, raw: Arc::from(raw), rendered: None }),
                None => warn!("Drum note {} out of range, skipped", id),
            }
        }
        Ok(Self { trim, notes })
    }

    pub fn note(&self, id: u8) -> Option<&DrumNote> {
        self.notes.get(id as usize).and_then(|n| n.as_ref())
    }

    /// The note's PCM, rendering it on first use.
    ///
    /// A failed render leaves the note unrendered so a later play retries.
    fn rendered<C: AudioContext>(
        &mut self,
        ctx: &C,
        id: u8,
        settings: &EngineSettings,
    ) -> Result<Option<Arc<PcmBuffer>>, EngineError> {
        let Some(note) = self.notes.get_mut(id as usize).and_then(|n| n.as_mut()) else {
            return Ok(None);
        };
        if let Some(buffer) = &note.rendered {
            return Ok(Some(Arc::clone(buffer)));
        }
        let buffer = render_blob(ctx, &note.raw, settings)?;
        note.rendered = buffer.clone();
        Ok(buffer)
    }

    /// Buffer source into a static gain. Returns `None` for notes with no sample.
    pub fn build<C: AudioContext>(
        &mut self,
        ctx: &mut C,
        voice: &mut VoiceBuilder,
        note: NoteOn,
        settings: &EngineSettings,
    ) -> Result<Option<(NodeId, f64)>, EngineError> {
        let Some(buffer) = self.rendered(&*ctx, note.note, settings)? else {
            return Ok(None);
        };
        let Some(entry) = self.note(note.note) else {
            return Ok(None);
        };
        let level = lerp(entry.trim_low, entry.trim_high, note.velocity) * self.trim;
        let end = note.when + buffer.duration();

        let source = voice.source(ctx.create_buffer_source(buffer, false))?;
        let gain = voice.node(ctx.create_gain(level))?;
        ctx.connect(source, gain)?;
        ctx.set_value_at_time(gain, ParamKind::Gain, level, note.when);
        Ok(Some((gain, end)))
    }
}
