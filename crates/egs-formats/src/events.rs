//! Lazy event stream decoder.
//!
//! Grammar, one record per leading byte:
//! - `0x00` ends the stream.
//! - `0x01..=0x7F` is a delay. Bit 6 selects coarse units: the low six
//!   bits `m` give `(m + 1) << 6` ms, otherwise `m` ms. Runs of delay
//!   bytes coalesce into one `Delay` event.
//! - `0x8c`, `0x9c`, `0xAc` are notes on channel `c` followed by two bytes
//!   `a b`; duration units are 16, 64 and 512 ms.
//! - `0xB_`..`0xF_` are reserved with fixed payloads (0, 1, 2, 2 bytes, or
//!   a length byte plus that many for `0xF_`) and decode as `Future`.

use egs_ir::{Document, Event};

use crate::FormatError;

const SHORT_NOTE_MS: u32 = 16;
const MEDIUM_NOTE_MS: u32 = 64;
const LONG_NOTE_MS: u32 = 512;

const TRUNCATED: FormatError = FormatError::MalformedContainer("event record runs past end");

/// Restartable cursor over event bytes.
///
/// The cursor only moves forward. Its position can be saved and a new
/// cursor created with [`EventCursor::at`] to resume decoding later.
#[derive(Clone, Debug)]
pub struct EventCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> EventCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Resume at a previously saved position.
    pub fn at(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos: pos.min(data.len()) }
    }

    /// Rewind to the start of the stream.
    pub fn reset(&mut self) {
        self.pos = 0;
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Whether the next call to `next_event` returns `None`.
    pub fn is_finished(&self) -> bool {
        self.data.get(self.pos).map_or(true, |&b| b == 0)
    }

    /// Decode the next event, or `None` at end of stream.
    ///
    /// A terminator byte is not consumed, so the cursor stays finished
    /// until `reset`. Truncated records end the stream.
    pub fn next_event(&mut self) -> Option<Event<'a>> {
        match decode_at(self.data, self.pos) {
            Ok(Some((event, next))) => {
                self.pos = next;
                Some(event)
            }
            Ok(None) => None,
            Err(_) => {
                self.pos = self.data.len();
                None
            }
        }
    }
}

impl<'a> Iterator for EventCursor<'a> {
    type Item = Event<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_event()
    }
}

/// Check that every record in the stream is complete.
pub fn validate_events(data: &[u8]) -> Result<(), FormatError> {
    let mut pos = 0;
    while let Some((_, next)) = decode_at(data, pos)? {
        pos = next;
    }
    Ok(())
}

/// Milliseconds encoded by one delay byte.
fn delay_ms(byte: u8) -> u32 {
    let magnitude = (byte & 0x3f) as u32;
    if byte & 0x40 != 0 {
        (magnitude + 1) << 6
    } else {
        magnitude
    }
}

/// Velocity (7-bit) and duration (ms) of a note record.
fn note_fields(opcode: u8, a: u8, b: u8) -> (u32, u32) {
    let high = ((a as u32) << 6) & 0x40;
    match opcode & 0xf0 {
        0x80 => (high | (b as u32 >> 2), (b & 0x03) as u32 * SHORT_NOTE_MS),
        tier => {
            let mut velocity = high | ((b as u32 >> 2) & 0x38);
            velocity &= 0x78;
            velocity |= velocity >> 4;
            let unit = if tier == 0x90 { MEDIUM_NOTE_MS } else { LONG_NOTE_MS };
            (velocity, (b & 0x1f) as u32 * unit)
        }
    }
}

/// Payload length of a reserved opcode, given the bytes after it.
fn future_len(opcode: u8, rest: &[u8]) -> Result<usize, FormatError> {
    match opcode & 0xf0 {
        0xb0 => Ok(0),
        0xc0 => Ok(1),
        0xd0 | 0xe0 => Ok(2),
        _ => rest.first().map(|&n| 1 + n as usize).ok_or(TRUNCATED),
    }
}

fn decode_at(data: &[u8], pos: usize) -> Result<Option<(Event<'_>, usize)>, FormatError> {
    let lead = match data.get(pos) {
        None | Some(0) => return Ok(None),
        Some(&b) => b,
    };

    if lead & 0x80 == 0 {
        let mut ms = 0u64;
        let mut end = pos;
        while let Some(&b) = data.get(end) {
            if b == 0 || b & 0x80 != 0 {
                break;
            }
            ms += delay_ms(b) as u64;
            end += 1;
        }
        return Ok(Some((Event::Delay { seconds: ms as f64 / 1000.0 }, end)));
    }

    match lead & 0xf0 {
        0x80 | 0x90 | 0xa0 => {
            let payload = data.get(pos + 1..pos + 3).ok_or(TRUNCATED)?;
            let (a, b) = (payload[0], payload[1]);
            let (velocity, duration_ms) = note_fields(lead, a, b);
            let event = Event::Note {
                channel: lead & 0x0f,
                note: a >> 1,
                velocity: velocity as f32 / 127.0,
                duration: duration_ms as f64 / 1000.0,
            };
            Ok(Some((event, pos + 3)))
        }
        _ => {
            let len = future_len(lead, &data[pos + 1..])?;
            let end = pos + 1 + len;
            if end > data.len() {
                return Err(TRUNCATED);
            }
            Ok(Some((Event::Future(&data[pos..end]), end)))
        }
    }
}

/// Totals gathered from one pass over an event stream.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StreamSummary {
    pub notes: usize,
    pub future: usize,
    /// Sum of all delays in seconds
    pub length: f64,
    /// Latest time anything sounds: max of `length` and every note end
    pub extent: f64,
}

/// Walk the whole stream once and total it up.
pub fn summarize(data: &[u8]) -> StreamSummary {
    let mut summary = StreamSummary::default();
    for event in EventCursor::new(data) {
        match event {
            Event::Delay { seconds } => summary.length += seconds,
            Event::Note { duration, .. } => {
                summary.notes += 1;
                summary.extent = summary.extent.max(summary.length + duration);
            }
            Event::Wheel { .. } => {}
            Event::Future(_) => summary.future += 1,
        }
    }
    summary.extent = summary.extent.max(summary.length);
    summary
}

/// Seconds from the first event until the last note has ended.
pub fn song_extent(document: &Document) -> f64 {
    summarize(&document.events).extent
}
