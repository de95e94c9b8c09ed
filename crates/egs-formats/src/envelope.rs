//! Envelope decoding.
//!
//! `flags:u8 [initLow:u16] [initHigh:u16] [sustain:u8] count:u8` followed by
//! `count` points of `timeLow:varint valueLow:u16 [timeHigh:varint valueHigh:u16]`.
//! Times are integer milliseconds, values 16-bit fixed point.

use alloc::vec::Vec;
use egs_ir::{Envelope, EnvelopePoint, FLAG_HIGH, FLAG_INITIAL_LOW, FLAG_SUSTAIN};

use crate::reader::ByteReader;
use crate::FormatError;

fn value(raw: u16) -> f32 {
    raw as f32 / 65536.0
}

fn seconds(ms: u16) -> f32 {
    ms as f32 / 1000.0
}

/// Decode an envelope at `offset`, returning it with the offset just past it.
pub fn decode_envelope(data: &[u8], offset: usize) -> Result<(Envelope, usize), FormatError> {
    let mut reader = ByteReader::at(data, offset);
    let envelope = read_envelope(&mut reader)?;
    Ok((envelope, reader.position()))
}

/// Decode an envelope from the reader's current position.
pub fn read_envelope(reader: &mut ByteReader<'_>) -> Result<Envelope, FormatError> {
    let flags = reader.read_u8()?;
    let has_high = flags & FLAG_HIGH != 0;

    let initial_low = if flags & FLAG_INITIAL_LOW != 0 { value(reader.read_u16_be()?) } else { 0.0 };
    let initial_high = if has_high { value(reader.read_u16_be()?) } else { initial_low };
    let sustain = if flags & FLAG_SUSTAIN != 0 { Some(reader.read_u8()? as usize) } else { None };

    let count = reader.read_u8()? as usize;
    let mut points = Vec::with_capacity(count);
    for _ in 0..count {
        let time_low = seconds(reader.read_varint()?);
        let value_low = value(reader.read_u16_be()?);
        let (time_high, value_high) = if has_high {
            (seconds(reader.read_varint()?), value(reader.read_u16_be()?))
        } else {
            (time_low, value_low)
        };
        points.push(EnvelopePoint { time_low, time_high, value_low, value_high });
    }

    if sustain.is_some_and(|i| i >= points.len()) {
        return Err(FormatError::MalformedContainer("sustain index outside envelope"));
    }

    Ok(Envelope { flags, initial_low, initial_high, sustain, points })
}
