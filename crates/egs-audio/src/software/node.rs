//! Node kinds of the software graph and their per-block processing.

use std::sync::Arc;

use biquad::{Biquad, Coefficients, DirectForm1, Hertz, Type};
use egs_engine::cents_to_ratio;
use egs_ir::{NodeId, ParamKind, PcmBuffer, Waveform};

use super::param::AudioParam;
use super::BLOCK;

/// Samples in one cycle of a custom waveform table.
const TABLE_LEN: usize = 2048;

/// Number of automatable parameters a node carries.
pub(crate) const PARAMS: usize = 4;

pub(crate) fn param_slot(param: ParamKind) -> usize {
    match param {
        ParamKind::Gain => 0,
        ParamKind::Frequency => 1,
        ParamKind::Detune => 2,
        ParamKind::Q => 3,
    }
}

/// Build one normalized cycle from sine harmonic amplitudes.
fn harmonic_table(amplitudes: &[f32]) -> Vec<f32> {
    let mut table: Vec<f32> = (0..TABLE_LEN)
        .map(|i| {
            let x = i as f32 / TABLE_LEN as f32;
            amplitudes
                .iter()
                .enumerate()
                .map(|(k, a)| a * libm::sinf(core::f32::consts::TAU * (k + 1) as f32 * x))
                .sum()
        })
        .collect();
    let peak = table.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    if peak > 0.0 {
        for s in &mut table {
            *s /= peak;
        }
    }
    table
}

/// Phase-accumulating oscillator.
#[derive(Clone, Debug)]
pub(crate) struct Oscillator {
    waveform: Waveform,
    table: Vec<f32>,
    phase: f64,
}

impl Oscillator {
    pub fn new(waveform: &Waveform) -> Self {
        let table = match waveform {
            Waveform::Custom(amplitudes) => harmonic_table(amplitudes),
            _ => Vec::new(),
        };
        Self { waveform: waveform.clone(), table, phase: 0.0 }
    }

    fn shape(&self, phase: f32) -> f32 {
        match self.waveform {
            Waveform::Sine => libm::sinf(core::f32::consts::TAU * phase),
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Sawtooth => 2.0 * phase - 1.0,
            Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
            Waveform::Custom(_) => {
                if self.table.is_empty() {
                    return 0.0;
                }
                let pos = phase * TABLE_LEN as f32;
                let i = pos as usize % TABLE_LEN;
                let frac = pos - pos.floor();
                let next = self.table[(i + 1) % TABLE_LEN];
                self.table[i] + (next - self.table[i]) * frac
            }
        }
    }

    /// Produce one sample at `frequency` Hz and advance.
    pub fn next(&mut self, frequency: f32, sample_rate: f64) -> f32 {
        let out = self.shape(self.phase as f32);
        self.phase += frequency as f64 / sample_rate;
        self.phase -= self.phase.floor();
        out
    }
}

/// Resampling playback of a PCM buffer.
#[derive(Clone, Debug)]
pub(crate) struct BufferPlayer {
    pub buffer: Arc<PcmBuffer>,
    pub looping: bool,
    position: f64,
}

impl BufferPlayer {
    pub fn new(buffer: Arc<PcmBuffer>, looping: bool) -> Self {
        Self { buffer, looping, position: 0.0 }
    }

    pub fn next(&mut self, sample_rate: f64) -> f32 {
        let len = self.buffer.len();
        if len == 0 {
            return 0.0;
        }
        if self.position >= len as f64 {
            if !self.looping {
                return 0.0;
            }
            self.position %= len as f64;
        }
        let i = self.position as usize;
        let frac = (self.position - i as f64) as f32;
        let a = self.buffer.samples[i];
        let b = match self.buffer.samples.get(i + 1) {
            Some(&b) => b,
            None if self.looping => self.buffer.samples[0],
            None => 0.0,
        };
        self.position += self.buffer.sample_rate as f64 / sample_rate;
        a + (b - a) * frac
    }
}

/// Band-pass biquad. Passes input through if the coefficients cannot be built.
#[derive(Clone, Debug)]
pub(crate) struct Bandpass {
    filter: Option<DirectForm1<f32>>,
    tuned: (f32, f32),
}

impl Bandpass {
    pub fn new() -> Self {
        Self { filter: None, tuned: (f32::NAN, f32::NAN) }
    }

    fn coefficients(frequency: f32, q: f32, sample_rate: f32) -> Option<Coefficients<f32>> {
        let fs = Hertz::<f32>::from_hz(sample_rate).ok()?;
        let nyquist = (sample_rate * 0.49).max(1.0);
        let f0 = Hertz::<f32>::from_hz(frequency.clamp(1.0, nyquist)).ok()?;
        Coefficients::<f32>::from_params(Type::BandPass, fs, f0, q.max(1e-3)).ok()
    }

    /// Retune when frequency or Q changed since the last block.
    pub fn tune(&mut self, frequency: f32, q: f32, sample_rate: f32) {
        if self.tuned == (frequency, q) {
            return;
        }
        self.tuned = (frequency, q);
        match (Self::coefficients(frequency, q, sample_rate), &mut self.filter) {
            (Some(coeffs), Some(filter)) => filter.update_coefficients(coeffs),
            (Some(coeffs), None) => self.filter = Some(DirectForm1::<f32>::new(coeffs)),
            (None, _) => self.filter = None,
        }
    }

    pub fn run(&mut self, input: f32) -> f32 {
        match &mut self.filter {
            Some(filter) => filter.run(input),
            None => input,
        }
    }
}

/// Whether a source scheduled over `[start, stop)` sounds at `time`.
fn is_playing(start: Option<f64>, stop: Option<f64>, time: f64) -> bool {
    match start {
        Some(start) => time >= start && stop.map_or(true, |stop| time < stop),
        None => false,
    }
}

#[derive(Clone, Debug)]
pub(crate) enum NodeKind {
    Destination,
    Gain,
    Oscillator(Oscillator),
    Bandpass(Bandpass),
    BufferSource(BufferPlayer),
}

/// A node in the software graph.
#[derive(Clone, Debug)]
pub(crate) struct Node {
    pub kind: NodeKind,
    /// Nodes whose output is summed into this node's input
    pub inputs: Vec<NodeId>,
    /// Nodes whose output is added to one of this node's parameters
    pub param_inputs: Vec<(ParamKind, NodeId)>,
    pub params: [AudioParam; PARAMS],
    pub start: Option<f64>,
    pub stop: Option<f64>,
    /// Output of the most recent block
    pub out: [f32; BLOCK],
}

impl Node {
    pub fn new(kind: NodeKind, gain: f32, frequency: f32, q: f32) -> Self {
        Self {
            kind,
            inputs: Vec::new(),
            param_inputs: Vec::new(),
            params: [AudioParam::new(gain), AudioParam::new(frequency), AudioParam::new(0.0), AudioParam::new(q)],
            start: None,
            stop: None,
            out: [0.0; BLOCK],
        }
    }

    pub fn param(&self, param: ParamKind) -> &AudioParam {
        &self.params[param_slot(param)]
    }

    pub fn param_mut(&mut self, param: ParamKind) -> &mut AudioParam {
        &mut self.params[param_slot(param)]
    }

    /// Whether a source has finished, judged from its schedule alone.
    pub fn has_ended(&self, now: f64) -> bool {
        let Some(start) = self.start else {
            return false;
        };
        if self.stop.is_some_and(|stop| stop <= now) {
            return true;
        }
        match &self.kind {
            NodeKind::BufferSource(player) if !player.looping => start + player.buffer.duration() <= now,
            _ => false,
        }
    }

    /// Render one block starting at `t0`.
    ///
    /// `input` is the summed audio input, `mods` the summed inputs per
    /// parameter slot.
    pub fn render(&mut self, input: &[f32; BLOCK], mods: &[[f32; BLOCK]; PARAMS], t0: f64, sample_rate: f64) {
        let dt = 1.0 / sample_rate;
        match &mut self.kind {
            NodeKind::Destination => self.out = *input,
            NodeKind::Gain => {
                let gain = &self.params[0];
                for i in 0..BLOCK {
                    let g = gain.value_at(t0 + i as f64 * dt) + mods[0][i];
                    self.out[i] = input[i] * g;
                }
            }
            NodeKind::Oscillator(osc) => {
                for i in 0..BLOCK {
                    let t = t0 + i as f64 * dt;
                    let playing = is_playing(self.start, self.stop, t);
                    self.out[i] = if playing {
                        let base = self.params[1].value_at(t) + mods[1][i];
                        let detune = self.params[2].value_at(t) + mods[2][i];
                        osc.next(base * cents_to_ratio(detune), sample_rate)
                    } else {
                        0.0
                    };
                }
            }
            NodeKind::Bandpass(filter) => {
                let frequency = self.params[1].value_at(t0) + mods[1][0];
                let q = self.params[3].value_at(t0) + mods[3][0];
                filter.tune(frequency, q, sample_rate as f32);
                for i in 0..BLOCK {
                    self.out[i] = filter.run(input[i]);
                }
            }
            NodeKind::BufferSource(player) => {
                for i in 0..BLOCK {
                    let t = t0 + i as f64 * dt;
                    let playing = is_playing(self.start, self.stop, t);
                    self.out[i] = if playing { player.next(sample_rate) } else { 0.0 };
                }
            }
        }
    }

    /// Drop automation that lies entirely before `time`.
    pub fn prune(&mut self, time: f64) {
        for param in &mut self.params {
            param.prune(time);
        }
    }
}
