//! Channel synthesizers.
//!
//! A channel decodes its mode config once, at construction, into one of
//! four synth variants. Every note then builds a short-lived voice graph
//! ending in a level gain node routed into the bus output.

mod drum;
mod fm;
mod sub;
mod voice;
mod wave;

use egs_formats::FormatError;
use egs_ir::{Breakpoint, ChannelConfig, Envelope, Mode, NodeId, ParamKind};
use log::{trace, warn};

use crate::context::AudioContext;
use crate::settings::EngineSettings;
use crate::EngineError;

pub(crate) use drum::DrumSynth;
pub(crate) use fm::FmSynth;
pub(crate) use sub::SubSynth;
pub(crate) use voice::{Voice, VoiceBuilder};
pub(crate) use wave::WaveSynth;

/// One note request.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct NoteOn {
    pub note: u8,
    /// `[0, 1]`
    pub velocity: f32,
    /// Absolute start time
    pub when: f64,
    /// Seconds until note-off
    pub duration: f64,
}

/// Mode-specific decoded parameters.
#[derive(Debug)]
pub(crate) enum Synth {
    Drum(DrumSynth),
    Wave(WaveSynth),
    Fm(FmSynth),
    Sub(SubSynth),
}

/// A channel of a playing song: its synth and its live voices.
#[derive(Debug)]
pub struct Channel {
    id: u8,
    synth: Synth,
    voices: Vec<Voice>,
    settings: EngineSettings,
}

impl Channel {
    /// Decode a channel config.
    ///
    /// Returns `Ok(None)` for silent and unrecognized modes. A config that
    /// is truncated for its mode is an error.
    pub fn new(config: &ChannelConfig, sample_rate: u32, settings: &EngineSettings) -> Result<Option<Self>, FormatError> {
        let trim = config.gain();
        let synth = match config.mode {
            Mode::Noop => return Ok(None),
            Mode::Unknown(mode) => {
                warn!("Channel {}: unknown mode {}, channel is silent", config.id, mode);
                return Ok(None);
            }
            Mode::Drum => Synth::Drum(DrumSynth::decode(&config.config, trim)?),
            Mode::Wave => Synth::Wave(WaveSynth::decode(&config.config, trim, settings)?),
            Mode::Fm => Synth::Fm(FmSynth::decode(&config.config, trim, settings)?),
            Mode::Sub => Synth::Sub(SubSynth::decode(&config.config, trim, sample_rate, settings)?),
        };
        Ok(Some(Self { id: config.id, synth, voices: Vec::new(), settings: settings.clone() }))
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    /// Number of voices not yet reaped.
    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    /// Whether nothing is sounding or scheduled on this channel.
    pub fn is_finished(&self) -> bool {
        self.voices.is_empty()
    }

    /// Start a voice for one note, routed into `output`.
    ///
    /// `when` earlier than `now` is moved up to `now`. On error every node
    /// created for the voice is disconnected again and nothing is kept.
    #[allow(clippy::too_many_arguments)]
    pub fn play_note<C: AudioContext>(
        &mut self,
        ctx: &mut C,
        output: NodeId,
        now: f64,
        when: f64,
        note: u8,
        velocity: f32,
        duration: f64,
    ) -> Result<(), EngineError> {
        let note = NoteOn { note, velocity, when: when.max(now), duration: duration.max(0.0) };
        let mut builder = VoiceBuilder::new();
        let built = match &mut self.synth {
            Synth::Drum(drum) => drum.build(ctx, &mut builder, note, &self.settings),
            Synth::Wave(wave) => wave.build(ctx, &mut builder, note).map(Some),
            Synth::Fm(fm) => fm.build(ctx, &mut builder, note).map(Some),
            Synth::Sub(sub) => sub.build(ctx, &mut builder, note).map(Some),
        };
        match built {
            Ok(Some((gain, end))) => {
                if let Err(e) = ctx.connect(gain, output) {
                    builder.abort(ctx);
                    return Err(e.into());
                }
                let voice = builder.finish(ctx, gain, note.when, end);
                self.voices.push(voice);
                Ok(())
            }
            Ok(None) => {
                trace!("Channel {}: nothing to play for note {}", self.id, note.note);
                builder.abort(ctx);
                Ok(())
            }
            Err(e) => {
                builder.abort(ctx);
                Err(e)
            }
        }
    }

    /// Silence the channel.
    ///
    /// Voices that have not started yet are disconnected at once. Sounding
    /// voices fade to zero over `fade` seconds and are reaped once they end.
    pub fn cancel<C: AudioContext>(&mut self, ctx: &mut C, fade: f64) {
        let now = ctx.now();
        self.voices.retain_mut(|voice| {
            if voice.start > now {
                voice.disconnect(ctx);
                false
            } else {
                voice.fade_out(ctx, now, fade);
                true
            }
        });
    }

    /// Disconnect and drop every voice that has ended.
    pub fn reap<C: AudioContext>(&mut self, ctx: &mut C) {
        self.voices.retain(|voice| {
            if voice.has_ended(ctx) {
                voice.disconnect(ctx);
                false
            } else {
                true
            }
        });
    }

    /// Disconnect every voice, sounding or not.
    pub fn teardown<C: AudioContext>(&mut self, ctx: &mut C) {
        for voice in self.voices.drain(..) {
            voice.disconnect(ctx);
        }
    }

    #[cfg(test)]
    pub(crate) fn voices(&self) -> &[Voice] {
        &self.voices
    }
}

/// Schedule breakpoints on a parameter: a set for the first, ramps after.
pub(crate) fn automate<C: AudioContext>(ctx: &mut C, node: NodeId, param: ParamKind, points: &[Breakpoint]) {
    let mut points = points.iter();
    if let Some(first) = points.next() {
        ctx.set_value_at_time(node, param, first.v, first.t);
    }
    for bp in points {
        ctx.linear_ramp_to_value_at_time(node, param, bp.v, bp.t);
    }
}

/// Condition a raw pitch envelope into detune cents around zero.
///
/// A curve flat at the midpoint means no pitch modulation.
pub(crate) fn pitch_envelope(mut envelope: Envelope, range_cents: f32) -> Option<Envelope> {
    if envelope.is_flat_at(0.5) {
        return None;
    }
    envelope.bias(-0.5);
    envelope.scale(2.0 * range_cents);
    Some(envelope)
}

/// When a voice driven by `level` stops: its last breakpoint, or note-off if later.
pub(crate) fn voice_end(level: &[Breakpoint], note: &NoteOn) -> f64 {
    let last = level.last().map_or(note.when, |bp| bp.t);
    last.max(note.when + note.duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{flat_wave, wav_bytes, Automation, MockContext, MockKind};
    use egs_formats::{EgsWriter, EnvelopeWriter, EventWriter};
    use egs_ir::Waveform;

    fn config(mode: Mode, trim: u8, bytes: Vec<u8>) -> ChannelConfig {
        ChannelConfig { id: 0, trim, mode, config: bytes }
    }

    fn channel(mode: Mode, bytes: Vec<u8>) -> Channel {
        Channel::new(&config(mode, 255, bytes), 48000, &EngineSettings::default()).unwrap().unwrap()
    }

    fn drum_record(id: u8, trim_low: u8, trim_high: u8, blob: &[u8]) -> Vec<u8> {
        let len = blob.len() as u32;
        let mut out = vec![id, trim_low, trim_high, (len >> 16) as u8, (len >> 8) as u8, len as u8];
        out.extend_from_slice(blob);
        out
    }

    fn play(channel: &mut Channel, ctx: &mut MockContext, note: u8, velocity: f32, when: f64, duration: f64) {
        let output = ctx.destination;
        let now = ctx.now;
        channel.play_note(ctx, output, now, when, note, velocity, duration).unwrap();
    }

    fn frequency_of(ctx: &MockContext, node: NodeId) -> f32 {
        match ctx.node(node).kind {
            MockKind::Oscillator { frequency, .. } => frequency,
            _ => panic!("not an oscillator"),
        }
    }

    #[test]
    fn wave_pitch_envelope_automates_detune() {
        let mut bytes = flat_wave(1);
        bytes.extend(EnvelopeWriter::new().initial(0.5).point(100, 1.0).to_bytes());
        let mut ch = channel(Mode::Wave, bytes);
        let mut ctx = MockContext::new(48000);
        play(&mut ch, &mut ctx, 60, 1.0, 0.5, 0.2);

        let (_, osc) = ctx.oscillators()[0];
        assert!(matches!(osc.kind, MockKind::Oscillator { waveform: Waveform::Square, .. }));
        let detune = osc.events(ParamKind::Detune);
        assert_eq!(detune.len(), 2);
        assert_eq!(detune[0], Automation::Set { value: 0.0, time: 0.5 });
        match detune[1] {
            Automation::Ramp { value, time } => {
                assert!((value - 1200.0).abs() < 0.1);
                assert!((time - 0.6).abs() < 1e-6);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn flat_pitch_envelope_is_dropped() {
        let mut bytes = flat_wave(0);
        bytes.extend(EnvelopeWriter::new().initial(0.5).point(100, 0.5).to_bytes());
        let mut ch = channel(Mode::Wave, bytes);
        match &ch.synth {
            Synth::Wave(wave) => assert!(wave.pitch.is_none()),
            other => panic!("unexpected {:?}", other),
        }
        let mut ctx = MockContext::new(48000);
        play(&mut ch, &mut ctx, 60, 1.0, 0.0, 0.2);
        let (_, osc) = ctx.oscillators()[0];
        assert!(osc.events(ParamKind::Detune).is_empty());
    }

    #[test]
    fn custom_waveform_reads_harmonics() {
        let mut bytes = EnvelopeWriter::new().initial(1.0).to_bytes();
        bytes.extend([4, 2, 0x80, 0x00, 0x40, 0x00]);
        let ch = channel(Mode::Wave, bytes);
        match &ch.synth {
            Synth::Wave(wave) => assert_eq!(wave.waveform, Waveform::Custom(vec![0.5, 0.25])),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unknown_shape_is_malformed() {
        let mut bytes = EnvelopeWriter::new().initial(1.0).to_bytes();
        bytes.push(9);
        let result = Channel::new(&config(Mode::Wave, 255, bytes), 48000, &EngineSettings::default());
        assert!(result.is_err());
    }

    #[test]
    fn level_is_scaled_by_trim() {
        let mut ch = Channel::new(&config(Mode::Wave, 51, flat_wave(0)), 48000, &EngineSettings::default())
            .unwrap()
            .unwrap();
        let mut ctx = MockContext::new(48000);
        play(&mut ch, &mut ctx, 60, 1.0, 0.0, 0.2);
        let gain = ch.voices()[0].gain();
        match ctx.node(gain).events(ParamKind::Gain)[0] {
            Automation::Set { value, .. } => assert!((value - 0.2).abs() < 1e-3),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn fm_modulator_drives_carrier_frequency() {
        let mut bytes = EnvelopeWriter::new().initial(1.0).to_bytes();
        bytes.extend([0x02, 0x00, 0x01, 0x00]);
        bytes.extend(EnvelopeWriter::new().initial(0.5).to_bytes());
        let mut ch = channel(Mode::Fm, bytes);
        let mut ctx = MockContext::new(48000);
        play(&mut ch, &mut ctx, 69, 1.0, 0.0, 0.5);

        let voice = &ch.voices()[0];
        assert_eq!(voice.sources().len(), 2);
        let (carrier, modulator) = (voice.sources()[0], voice.sources()[1]);
        assert_eq!(frequency_of(&ctx, carrier), 440.0);
        assert_eq!(frequency_of(&ctx, modulator), 880.0);

        let (depth, route) = ctx.node(modulator).outputs[0];
        assert_eq!(route, None);
        assert_eq!(ctx.node(depth).outputs, vec![(carrier, Some(ParamKind::Frequency))]);
        match ctx.node(depth).events(ParamKind::Gain)[0] {
            Automation::Set { value, .. } => assert!((value - 220.0).abs() < 1e-3),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn fm_pitch_detunes_both_operators() {
        let mut bytes = EnvelopeWriter::new().initial(1.0).to_bytes();
        bytes.extend([0x01, 0x00, 0x01, 0x00]);
        bytes.extend(EnvelopeWriter::new().initial(1.0).to_bytes());
        bytes.extend(EnvelopeWriter::new().initial(0.0).point(50, 0.5).to_bytes());
        let mut ch = channel(Mode::Fm, bytes);
        let mut ctx = MockContext::new(48000);
        play(&mut ch, &mut ctx, 69, 1.0, 0.0, 0.5);

        let voice = &ch.voices()[0];
        for &osc in voice.sources() {
            let detune = ctx.node(osc).events(ParamKind::Detune);
            assert_eq!(detune.len(), 2);
            assert_eq!(detune[0], Automation::Set { value: -1200.0, time: 0.0 });
        }
    }

    #[test]
    fn sub_filters_looped_noise() {
        let mut bytes = EnvelopeWriter::new().initial(1.0).to_bytes();
        bytes.extend([0x12, 0x34]);
        let mut ch = channel(Mode::Sub, bytes);
        match &ch.synth {
            Synth::Sub(sub) => assert_eq!(sub.width, 0x1234),
            other => panic!("unexpected {:?}", other),
        }
        let mut ctx = MockContext::new(48000);
        play(&mut ch, &mut ctx, 69, 1.0, 0.0, 0.5);

        assert_eq!(ctx.count(|k| *k == MockKind::BufferSource { frames: 48000, looping: true }), 1);
        assert_eq!(ctx.count(|k| *k == MockKind::Bandpass { frequency: 440.0, q: 1.0 }), 1);
        let source = ch.voices()[0].sources()[0];
        assert!(ctx.node(source).stop.unwrap() >= 0.5);
    }

    #[test]
    fn noise_is_seeded() {
        let a = sub::noise_buffer(8000, 0.1, 7);
        let b = sub::noise_buffer(8000, 0.1, 7);
        assert_eq!(a, b);
        assert_eq!(a.len(), 800);
        assert!(a.samples.iter().all(|s| (-1.0..1.0).contains(s)));
        assert!(a.peak() > 0.5);
    }

    #[test]
    fn drum_plays_wav_with_velocity_trim() {
        let wav = wav_bytes(8000, &[1000; 100]);
        let mut ch = channel(Mode::Drum, drum_record(36, 0, 255, &wav));
        let mut ctx = MockContext::new(48000);
        play(&mut ch, &mut ctx, 36, 0.5, 1.0, 0.0);

        let voice = &ch.voices()[0];
        assert_eq!(voice.start, 1.0);
        assert!((voice.end - (1.0 + 100.0 / 8000.0)).abs() < 1e-9);
        assert_eq!(ctx.count(|k| *k == MockKind::BufferSource { frames: 100, looping: false }), 1);
        assert!((ctx.node(voice.gain()).initial - 0.5).abs() < 1e-3);
    }

    #[test]
    fn drum_without_sample_is_silent() {
        let wav = wav_bytes(8000, &[0; 10]);
        let mut ch = channel(Mode::Drum, drum_record(36, 255, 255, &wav));
        let mut ctx = MockContext::new(48000);
        play(&mut ch, &mut ctx, 38, 1.0, 0.0, 0.0);
        assert!(ch.is_finished());
        assert_eq!(ctx.nodes.len(), 1);
    }

    #[test]
    fn drum_renders_nested_song_once() {
        let mut events = EventWriter::new();
        events.note(0, 69, 127, 16).end();
        let nested = EgsWriter::new().channel(0, 255, Mode::Wave, &flat_wave(0)).events(events.as_bytes()).finish();
        let mut ch = channel(Mode::Drum, drum_record(40, 255, 255, &nested));
        let mut ctx = MockContext::new(48000);
        play(&mut ch, &mut ctx, 40, 1.0, 0.0, 0.0);
        play(&mut ch, &mut ctx, 40, 1.0, 0.5, 0.0);

        assert_eq!(ch.voice_count(), 2);
        let frames = (0.016f64 * 48000.0).round() as usize;
        assert_eq!(ctx.count(|k| *k == MockKind::BufferSource { frames, looping: false }), 2);
        match &ch.synth {
            Synth::Drum(drum) => assert!(drum.note(40).unwrap().rendered.is_some()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn drum_unsupported_blob_stays_unrendered() {
        let mut ch = channel(Mode::Drum, drum_record(40, 255, 255, b"MThd\0\0\0\x06"));
        let mut ctx = MockContext::new(48000);
        play(&mut ch, &mut ctx, 40, 1.0, 0.0, 0.0);
        assert!(ch.is_finished());
        match &ch.synth {
            Synth::Drum(drum) => assert!(drum.note(40).unwrap().rendered.is_none()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn drum_bad_wav_is_an_error_and_retryable() {
        let mut wav = wav_bytes(8000, &[0; 10]);
        wav.push(0);
        let mut ch = channel(Mode::Drum, drum_record(40, 255, 255, &wav));
        let mut ctx = MockContext::new(48000);
        let output = ctx.destination;
        assert!(ch.play_note(&mut ctx, output, 0.0, 0.0, 40, 1.0, 0.0).is_err());
        assert!(ch.play_note(&mut ctx, output, 0.0, 0.0, 40, 1.0, 0.0).is_err());
        assert_eq!(ctx.nodes.len(), 1);
    }

    #[test]
    fn drum_config_edge_cases() {
        let wav = wav_bytes(8000, &[0; 4]);
        assert!(DrumSynth::decode(&drum_record(200, 0, 0, &wav), 1.0).is_ok());
        let mut truncated = drum_record(36, 0, 0, &wav);
        truncated.pop();
        assert!(DrumSynth::decode(&truncated, 1.0).is_err());
        assert!(DrumSynth::decode(&[], 1.0).is_ok());
    }

    #[test]
    fn cancel_drops_future_voices_and_fades_sounding_ones() {
        let mut ch = channel(Mode::Wave, flat_wave(0));
        let mut ctx = MockContext::new(48000);
        play(&mut ch, &mut ctx, 60, 1.0, 0.0, 1.0);
        play(&mut ch, &mut ctx, 64, 1.0, 5.0, 1.0);
        assert_eq!(ch.voice_count(), 2);

        ctx.now = 0.5;
        ch.cancel(&mut ctx, 0.2);
        assert_eq!(ch.voice_count(), 1);
        let voice = &ch.voices()[0];
        assert!((voice.end - 0.7).abs() < 1e-9);
        assert_eq!(ctx.node(voice.sources()[0]).stop, Some(0.7));

        ctx.now = 0.6;
        let level = ctx.param_value(voice.gain(), ParamKind::Gain);
        assert!((level - 0.5).abs() < 1e-3);

        ctx.now = 0.7;
        ch.reap(&mut ctx);
        assert!(ch.is_finished());
        assert_eq!(ctx.nodes.len(), 1);
    }

    #[test]
    fn late_notes_start_now() {
        let mut ch = channel(Mode::Wave, flat_wave(0));
        let mut ctx = MockContext::new(48000);
        ctx.now = 2.0;
        play(&mut ch, &mut ctx, 60, 1.0, 1.5, 0.1);
        assert_eq!(ch.voices()[0].start, 2.0);
    }

    #[test]
    fn failed_voice_leaves_no_nodes() {
        let mut ch = channel(Mode::Fm, {
            let mut bytes = EnvelopeWriter::new().initial(1.0).to_bytes();
            bytes.extend([0x01, 0x00, 0x01, 0x00]);
            bytes.extend(EnvelopeWriter::new().initial(1.0).to_bytes());
            bytes
        });
        let mut ctx = MockContext::with_limit(48000, 3);
        let output = ctx.destination;
        let result = ch.play_note(&mut ctx, output, 0.0, 0.0, 60, 1.0, 0.1);
        assert_eq!(result, Err(EngineError::Graph(crate::GraphError::Exhausted)));
        assert_eq!(ctx.nodes.len(), 1);
        assert!(ch.is_finished());
    }

    #[test]
    fn voice_end_covers_note_and_envelope() {
        let note = NoteOn { note: 60, velocity: 1.0, when: 1.0, duration: 0.5 };
        assert_eq!(voice_end(&[Breakpoint { t: 1.0, v: 1.0 }], &note), 1.5);
        assert_eq!(voice_end(&[Breakpoint { t: 1.0, v: 1.0 }, Breakpoint { t: 2.0, v: 0.0 }], &note), 2.0);
    }
}
