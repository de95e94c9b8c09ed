//! WAV decoding for the accepted subset: 16-bit little-endian mono LPCM
//! with a single `data` chunk directly after a 16-byte `fmt ` chunk,
//! running exactly to the end of the file.

use alloc::vec::Vec;
use binrw::io::Cursor;
use binrw::BinRead;
use egs_ir::PcmBuffer;

use crate::FormatError;

/// Bytes before the first sample.
pub const WAV_HEADER_LEN: usize = 44;
/// Lowest accepted sample rate.
pub const MIN_WAV_RATE: u32 = 200;
/// Highest accepted sample rate.
pub const MAX_WAV_RATE: u32 = 200_000;

#[derive(BinRead, Debug)]
#[br(little, magic = b"RIFF")]
struct WavHeader {
    _riff_size: u32,
    #[br(magic = b"WAVEfmt ")]
    fmt_size: u32,
    format: u16,
    channels: u16,
    sample_rate: u32,
    _byte_rate: u32,
    _block_align: u16,
    bits_per_sample: u16,
    #[br(magic = b"data")]
    data_size: u32,
}

impl WavHeader {
    fn check(&self, file_len: usize) -> Result<(), FormatError> {
        if self.fmt_size != 16 {
            return Err(FormatError::MalformedContainer("fmt chunk must be 16 bytes"));
        }
        if self.format != 1 || self.channels != 1 || self.bits_per_sample != 16 {
            return Err(FormatError::MalformedContainer("only 16-bit mono PCM is accepted"));
        }
        if !(MIN_WAV_RATE..=MAX_WAV_RATE).contains(&self.sample_rate) {
            return Err(FormatError::MalformedContainer("sample rate out of range"));
        }
        if self.data_size as usize != file_len - WAV_HEADER_LEN {
            return Err(FormatError::MalformedContainer("data length does not match file"));
        }
        if self.data_size % 2 != 0 {
            return Err(FormatError::MalformedContainer("odd data length"));
        }
        Ok(())
    }
}

/// Decode a WAV blob into a mono f32 buffer.
pub fn load_wav(data: &[u8]) -> Result<PcmBuffer, FormatError> {
    if data.len() < WAV_HEADER_LEN {
        return Err(FormatError::MalformedContainer("WAV shorter than its header"));
    }
    let header = WavHeader::read(&mut Cursor::new(data))
        .map_err(|_| FormatError::MalformedContainer("invalid WAV header"))?;
    header.check(data.len())?;

    let samples: Vec<f32> = data[WAV_HEADER_LEN..]
        .chunks_exact(2)
        .map(|c| i16::from_le_bytes([c[0], c[1]]) as f32 / 32768.0)
        .collect();
    Ok(PcmBuffer::new(header.sample_rate, samples))
}
