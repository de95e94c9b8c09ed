//! Signature sniffing.

use egs_ir::SoundFormat;

use crate::egs_format::EGS_SIGNATURE;

/// Classify a blob by its leading signature bytes only.
pub fn detect_format(data: &[u8]) -> SoundFormat {
    if data.starts_with(&EGS_SIGNATURE) {
        SoundFormat::Egs
    } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WAVE" {
        SoundFormat::Wav
    } else if data.starts_with(b"MThd") {
        SoundFormat::Mid
    } else {
        SoundFormat::Unknown
    }
}
