//! Decoded EGS container.

use alloc::vec::Vec;

/// Synthesis mode of a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Silent placeholder channel
    Noop,
    /// Percussive sample playback keyed by note id
    Drum,
    /// Periodic waveform synthesis
    Wave,
    /// Two-operator frequency modulation
    Fm,
    /// Filtered noise (subtractive)
    Sub,
    /// Mode byte this engine does not know
    Unknown(u8),
}

impl Mode {
    /// Map a raw mode byte to a mode.
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0 => Mode::Noop,
            1 => Mode::Drum,
            2 => Mode::Wave,
            3 => Mode::Fm,
            4 => Mode::Sub,
            other => Mode::Unknown(other),
        }
    }

    /// The raw mode byte.
    pub fn to_byte(self) -> u8 {
        match self {
            Mode::Noop => 0,
            Mode::Drum => 1,
            Mode::Wave => 2,
            Mode::Fm => 3,
            Mode::Sub => 4,
            Mode::Unknown(b) => b,
        }
    }
}

/// Static configuration of one channel.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelConfig {
    /// Channel id as stored; not clamped.
    pub id: u8,
    /// Raw trim byte (0..=255 maps to 0.0..=1.0)
    pub trim: u8,
    /// Synthesis mode
    pub mode: Mode,
    /// Mode-specific configuration bytes
    pub config: Vec<u8>,
}

impl ChannelConfig {
    /// Static gain multiplier in `[0, 1]`.
    pub fn gain(&self) -> f32 {
        self.trim as f32 / 255.0
    }
}

/// An EGS document: channel configs plus the raw event stream.
///
/// Immutable once decoded; playback instances share it behind an `Arc`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Document {
    /// Channel configs in container order. Ids may have gaps.
    pub channels: Vec<ChannelConfig>,
    /// Event bytes, consumed only through an event cursor.
    pub events: Vec<u8>,
}

impl Document {
    /// Look up a channel config by id. The last record wins on duplicates.
    pub fn channel(&self, id: u8) -> Option<&ChannelConfig> {
        self.channels.iter().rev().find(|c| c.id == id)
    }

    /// One past the highest channel id present (0 if there are no channels).
    pub fn channel_span(&self) -> usize {
        self.channels
            .iter()
            .map(|c| c.id as usize + 1)
            .max()
            .unwrap_or(0)
    }
}
