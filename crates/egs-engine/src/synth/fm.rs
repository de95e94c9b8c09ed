//! Two-operator frequency modulation.
//!
//! Config: `levelEnvelope rate:u16 depth:u16 depthEnvelope [pitchEnvelope]`,
//! rate and depth in 8.8 fixed point. The modulator runs at
//! `fundamental * rate` and its output, scaled by the depth curve times the
//! fundamental, drives the carrier's frequency input.

use egs_formats::{read_envelope, ByteReader, FormatError};
use egs_ir::{Envelope, NodeId, ParamKind, Waveform};

use super::wave::read_pitch;
use super::{automate, voice_end, NoteOn, VoiceBuilder};
use crate::context::AudioContext;
use crate::frequency::note_to_frequency;
use crate::settings::EngineSettings;
use crate::EngineError;

fn fixed_8_8(raw: u16) -> f32 {
    raw as f32 / 256.0
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct FmSynth {
    pub level: Envelope,
    /// Modulator to carrier frequency ratio
    pub rate: f32,
    /// Modulation index curve, pre-scaled by the peak depth
    pub depth: Envelope,
    pub pitch: Option<Envelope>,
}

impl FmSynth {
    pub fn decode(config: &[u8], trim: f32, settings: &EngineSettings) -> Result<Self, FormatError> {
        let mut reader = ByteReader::new(config);
        let mut level = read_envelope(&mut reader)?;
        level.scale(trim);
        let rate = fixed_8_8(reader.read_u16_be()?);
        let peak = fixed_8_8(reader.read_u16_be()?);
        let mut depth = read_envelope(&mut reader)?;
        depth.scale(peak);
        let pitch = read_pitch(&mut reader, settings)?;
        Ok(Self { level, rate, depth, pitch })
    }

    pub fn build<C: AudioContext>(
        &self,
        ctx: &mut C,
        voice: &mut VoiceBuilder,
        note: NoteOn,
    ) -> Result<(NodeId, f64), EngineError> {
        let fundamental = note_to_frequency(note.note);
        let carrier = voice.source(ctx.create_oscillator(&Waveform::Sine, fundamental))?;
        let modulator = voice.source(ctx.create_oscillator(&Waveform::Sine, fundamental * self.rate))?;
        let depth = voice.node(ctx.create_gain(0.0))?;
        let gain = voice.node(ctx.create_gain(0.0))?;
        ctx.connect(modulator, depth)?;
        ctx.connect_param(depth, carrier, ParamKind::Frequency)?;
        ctx.connect(carrier, gain)?;

        let mut depth_points = self.depth.apply(note.velocity, note.when, note.duration);
        for bp in &mut depth_points {
            bp.v *= fundamental;
        }
        automate(ctx, depth, ParamKind::Gain, &depth_points);

        let level = self.level.apply(note.velocity, note.when, note.duration);
        automate(ctx, gain, ParamKind::Gain, &level);

        if let Some(pitch) = &self.pitch {
            let detune = pitch.apply(note.velocity, note.when, note.duration);
            automate(ctx, carrier, ParamKind::Detune, &detune);
            automate(ctx, modulator, ParamKind::Detune, &detune);
        }
        Ok((gain, voice_end(&level, &note)))
    }
}
