//! Audio graph handles shared between the engine and its hosts.

use alloc::vec::Vec;

slotmap::new_key_type! {
    /// Handle to a node owned by an audio context.
    pub struct NodeId;
}

/// Upper bound on custom waveform harmonics (the count is stored in a byte).
pub const MAX_HARMONICS: usize = 255;

/// An automatable parameter of a graph node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// Gain node multiplier
    Gain,
    /// Oscillator or filter frequency in Hz
    Frequency,
    /// Oscillator detune in cents
    Detune,
    /// Filter quality factor
    Q,
}

/// Oscillator shape.
#[derive(Clone, Debug, PartialEq)]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
    Triangle,
    /// Sum of sine harmonics; `amplitudes[0]` is the fundamental.
    Custom(Vec<f32>),
}

impl Waveform {
    /// Decode a shape selector byte. `Custom` gets an empty table.
    pub fn from_selector(selector: u8) -> Option<Self> {
        match selector {
            0 => Some(Waveform::Sine),
            1 => Some(Waveform::Square),
            2 => Some(Waveform::Sawtooth),
            3 => Some(Waveform::Triangle),
            4 => Some(Waveform::Custom(Vec::new())),
            _ => None,
        }
    }
}
