//! Sound blob format tags.

use core::fmt;

/// Format of a raw sound blob, as determined by signature sniffing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SoundFormat {
    /// EGS container (channel configs + event stream)
    Egs,
    /// RIFF/WAVE audio
    Wav,
    /// Standard MIDI file (detected only, never decoded)
    Mid,
    /// Anything else
    Unknown,
}

impl SoundFormat {
    /// Short lowercase name, matching the conventional file extension.
    pub fn name(self) -> &'static str {
        match self {
            SoundFormat::Egs => "egs",
            SoundFormat::Wav => "wav",
            SoundFormat::Mid => "mid",
            SoundFormat::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SoundFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
