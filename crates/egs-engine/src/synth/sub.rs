//! Subtractive synthesis: looped noise through a band-pass at the note pitch.
//!
//! Config: `levelEnvelope width:u16`. The width is stored but does not
//! affect the filter yet; Q comes from the engine settings.

use std::sync::Arc;

use egs_formats::{read_envelope, ByteReader, FormatError};
use egs_ir::{Envelope, NodeId, ParamKind, PcmBuffer};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{automate, voice_end, NoteOn, VoiceBuilder};
use crate::context::AudioContext;
use crate::frequency::note_to_frequency;
use crate::settings::EngineSettings;
use crate::EngineError;

/// White noise in `[-1, 1)` from a fixed seed.
pub(crate) fn noise_buffer(sample_rate: u32, seconds: f32, seed: u64) -> PcmBuffer {
    let frames = ((sample_rate as f32 * seconds) as usize).max(1);
    let mut rng = StdRng::seed_from_u64(seed);
    let samples = (0..frames).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
    PcmBuffer::new(sample_rate, samples)
}

#[derive(Clone, Debug)]
pub(crate) struct SubSynth {
    pub level: Envelope,
    pub width: u16,
    q: f32,
    noise: Arc<PcmBuffer>,
}

impl SubSynth {
    pub fn decode(config: &[u8], trim: f32, sample_rate: u32, settings: &EngineSettings) -> Result<Self, FormatError> {
        let mut reader = ByteReader::new(config);
        let mut level = read_envelope(&mut reader)?;
        level.scale(trim);
        let width = reader.read_u16_be()?;
        let noise = noise_buffer(sample_rate, settings.noise_seconds, settings.noise_seed);
        Ok(Self { level, width, q: settings.sub_filter_q, noise: Arc::new(noise) })
    }

    pub fn build<C: AudioContext>(
        &self,
        ctx: &mut C,
        voice: &mut VoiceBuilder,
        note: NoteOn,
    ) -> Result<(NodeId, f64), EngineError> {
        let source = voice.source(ctx.create_buffer_source(Arc::clone(&self.noise), true))?;
        let filter = voice.node(ctx.create_bandpass(note_to_frequency(note.note), self.q))?;
        let gain = voice.node(ctx.create_gain(0.0))?;
        ctx.connect(source, filter)?;
        ctx.connect(filter, gain)?;

        let level = self.level.apply(note.velocity, note.when, note.duration);
        automate(ctx, gain, ParamKind::Gain, &level);
        Ok((gain, voice_end(&level, &note)))
    }
}
