//! Format decoders for the EGS sound engine.
//!
//! Sniffs sound blobs, splits EGS containers into channel configs and an
//! event stream, decodes events lazily, decodes envelopes and the accepted
//! WAV subset. A matching encoder is provided for building test data.

mod egs_format;
mod envelope;
mod events;
mod reader;
mod sniff;
mod wav_format;
mod writer;

use core::fmt;
use egs_ir::SoundFormat;

pub use egs_format::{split_egs, EGS_SIGNATURE, EVENTS_SENTINEL};
pub use envelope::{decode_envelope, read_envelope};
pub use events::{song_extent, summarize, validate_events, EventCursor, StreamSummary};
pub use reader::ByteReader;
pub use sniff::detect_format;
pub use wav_format::{load_wav, MAX_WAV_RATE, MIN_WAV_RATE, WAV_HEADER_LEN};
pub use writer::{EgsWriter, EnvelopeWriter, EventWriter};

/// Error type for format decoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FormatError {
    /// Signature or declared-length violation
    MalformedContainer(&'static str),
    /// Signature not recognized or format not decodable
    UnsupportedFormat(SoundFormat),
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::MalformedContainer(why) => write!(f, "Malformed container: {}", why),
            FormatError::UnsupportedFormat(fmt) => write!(f, "Unsupported format: {}", fmt),
        }
    }
}

impl std::error::Error for FormatError {}

extern crate alloc;
