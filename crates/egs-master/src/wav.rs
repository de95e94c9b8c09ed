//! WAV encoding for 16-bit stereo PCM.

use std::io::{Cursor, Seek, Write};

use binrw::{BinResult, BinWrite};
use egs_engine::Frame;

const CHANNELS: u16 = 2;
const BITS_PER_SAMPLE: u16 = 16;

#[derive(BinWrite, Debug)]
#[bw(little, magic = b"RIFF")]
struct WavHeader {
    riff_size: u32,
    #[bw(magic = b"WAVEfmt ")]
    fmt_size: u32,
    format: u16,
    channels: u16,
    sample_rate: u32,
    byte_rate: u32,
    block_align: u16,
    bits_per_sample: u16,
    #[bw(magic = b"data")]
    data_size: u32,
}

impl WavHeader {
    fn stereo(frames: usize, sample_rate: u32) -> Self {
        let block_align = CHANNELS * (BITS_PER_SAMPLE / 8);
        let data_size = frames as u32 * block_align as u32;
        Self {
            riff_size: 36 + data_size,
            fmt_size: 16,
            format: 1,
            channels: CHANNELS,
            sample_rate,
            byte_rate: sample_rate * block_align as u32,
            block_align,
            bits_per_sample: BITS_PER_SAMPLE,
            data_size,
        }
    }
}

pub fn write_wav<W: Write + Seek>(w: &mut W, frames: &[Frame], sample_rate: u32) -> BinResult<()> {
    WavHeader::stereo(frames.len(), sample_rate).write(w)?;
    for frame in frames {
        w.write_all(&frame.left.to_le_bytes())?;
        w.write_all(&frame.right.to_le_bytes())?;
    }
    Ok(())
}

pub fn frames_to_wav(frames: &[Frame], sample_rate: u32) -> BinResult<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::with_capacity(44 + frames.len() * 4));
    write_wav(&mut cursor, frames, sample_rate)?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout() {
        let wav = frames_to_wav(&[Frame { left: 1, right: -1 }], 44100).unwrap();
        assert_eq!(wav.len(), 48);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(u32::from_le_bytes([wav[4], wav[5], wav[6], wav[7]]), 40);
        assert_eq!(&wav[8..16], b"WAVEfmt ");
        assert_eq!(u32::from_le_bytes([wav[24], wav[25], wav[26], wav[27]]), 44100);
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]), 4);
        assert_eq!(&wav[44..], &[1, 0, 0xff, 0xff]);
    }

    #[test]
    fn empty_render_is_header_only() {
        let wav = frames_to_wav(&[], 8000).unwrap();
        assert_eq!(wav.len(), 44);
    }
}
