//! Periodic waveform synthesis.
//!
//! Config: `levelEnvelope shape:u8 [harmonics] [pitchEnvelope]`. Shape 4
//! is a custom table of `count:u8` big-endian 16-bit harmonic amplitudes.

use egs_formats::{read_envelope, ByteReader, FormatError};
use egs_ir::{Envelope, NodeId, ParamKind, Waveform, MAX_HARMONICS};

use super::{automate, pitch_envelope, voice_end, NoteOn, VoiceBuilder};
use crate::context::AudioContext;
use crate::frequency::note_to_frequency;
use crate::settings::EngineSettings;
use crate::EngineError;

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct WaveSynth {
    /// Level curve, already scaled by the channel trim
    pub level: Envelope,
    pub waveform: Waveform,
    /// Detune curve in cents, absent when flat
    pub pitch: Option<Envelope>,
}

/// Read a shape selector and, for custom shapes, its harmonic table.
pub(crate) fn read_waveform(reader: &mut ByteReader<'_>) -> Result<Waveform, FormatError> {
    let selector = reader.read_u8()?;
    match Waveform::from_selector(selector) {
        Some(Waveform::Custom(_)) => {
            let count = (reader.read_u8()? as usize).min(MAX_HARMONICS);
            let mut amplitudes = Vec::with_capacity(count);
            for _ in 0..count {
                amplitudes.push(reader.read_u16_be()? as f32 / 65536.0);
            }
            Ok(Waveform::Custom(amplitudes))
        }
        Some(shape) => Ok(shape),
        None => Err(FormatError::MalformedContainer("unknown waveform shape")),
    }
}

/// Read a trailing optional pitch envelope.
pub(crate) fn read_pitch(reader: &mut ByteReader<'_>, settings: &EngineSettings) -> Result<Option<Envelope>, FormatError> {
    if reader.is_empty() {
        return Ok(None);
    }
    Ok(pitch_envelope(read_envelope(reader)?, settings.pitch_range_cents))
}

impl WaveSynth {
    pub fn decode(config: &[u8], trim: f32, settings: &EngineSettings) -> Result<Self, FormatError> {
        let mut reader = ByteReader::new(config);
        let mut level = read_envelope(&mut reader)?;
        level.scale(trim);
        let waveform = read_waveform(&mut reader)?;
        let pitch = read_pitch(&mut reader, settings)?;
        Ok(Self { level, waveform, pitch })
    }

    /// Oscillator into a level gain. Returns the gain and the stop time.
    pub fn build<C: AudioContext>(
        &self,
        ctx: &mut C,
        voice: &mut VoiceBuilder,
        note: NoteOn,
    ) -> Result<(NodeId, f64), EngineError> {
        let frequency = note_to_frequency(note.note);
        let osc = voice.source(ctx.create_oscillator(&self.waveform, frequency))?;
        let gain = voice.node(ctx.create_gain(0.0))?;
        ctx.connect(osc, gain)?;

        let level = self.level.apply(note.velocity, note.when, note.duration);
        automate(ctx, gain, ParamKind::Gain, &level);
        if let Some(pitch) = &self.pitch {
            let detune = pitch.apply(note.velocity, note.when, note.duration);
            automate(ctx, osc, ParamKind::Detune, &detune);
        }
        Ok((gain, voice_end(&level, &note)))
    }
}
