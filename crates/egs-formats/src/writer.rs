//! Reference encoder for EGS containers, event streams and envelopes.
//!
//! Produces exactly the byte layouts the decoders accept. Used to build
//! fixtures and by tools that author sounds programmatically.

use alloc::vec::Vec;
use egs_ir::{Mode, FLAG_HIGH, FLAG_INITIAL_LOW, FLAG_SUSTAIN};

use crate::egs_format::{EGS_SIGNATURE, EVENTS_SENTINEL};

/// Builds an EGS container.
#[derive(Clone, Debug, Default)]
pub struct EgsWriter {
    records: Vec<u8>,
    events: Vec<u8>,
}

impl EgsWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a channel record. `config` must be shorter than 16 MiB.
    pub fn channel(mut self, id: u8, trim: u8, mode: Mode, config: &[u8]) -> Self {
        let len = (config.len() as u32).to_be_bytes();
        self.records.extend([id, trim, mode.to_byte(), len[1], len[2], len[3]]);
        self.records.extend_from_slice(config);
        self
    }

    pub fn events(mut self, events: &[u8]) -> Self {
        self.events = events.to_vec();
        self
    }

    pub fn finish(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(EGS_SIGNATURE.len() + self.records.len() + 1 + self.events.len());
        out.extend_from_slice(&EGS_SIGNATURE);
        out.extend(self.records);
        out.push(EVENTS_SENTINEL);
        out.extend(self.events);
        out
    }
}

/// Builds an event byte stream.
#[derive(Clone, Debug, Default)]
pub struct EventWriter {
    bytes: Vec<u8>,
}

impl EventWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a delay, split into coarse and fine bytes.
    pub fn delay_ms(&mut self, ms: u32) -> &mut Self {
        let mut left = ms;
        while left >= 64 {
            let units = (left / 64).min(64);
            self.bytes.push(0x40 | (units - 1) as u8);
            left -= units * 64;
        }
        if left > 0 {
            self.bytes.push(left as u8);
        }
        self
    }

    /// Append a note, picking the shortest encoding that holds the duration.
    ///
    /// `velocity` is 7-bit. Durations that are multiples of 16 ms up to 48 ms
    /// keep full velocity precision; longer notes keep 4 bits and round the
    /// duration to 64 ms or 512 ms units.
    pub fn note(&mut self, channel: u8, note: u8, velocity: u8, duration_ms: u32) -> &mut Self {
        let velocity = velocity.min(127);
        let a = (note.min(127) << 1) | ((velocity >> 6) & 1);
        if duration_ms % 16 == 0 && duration_ms <= 48 {
            let b = ((velocity & 0x3f) << 2) | (duration_ms / 16) as u8;
            self.bytes.extend([0x80 | (channel & 0x0f), a, b]);
        } else {
            let (opcode, unit) = if duration_ms <= 31 * 64 { (0x90, 64) } else { (0xa0, 512) };
            let code = ((duration_ms + unit / 2) / unit).min(31) as u8;
            let b = (((velocity >> 3) & 0x07) << 5) | code;
            self.bytes.extend([opcode | (channel & 0x0f), a, b]);
        }
        self
    }

    /// Append raw bytes (reserved opcodes and their payloads).
    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    /// Append the terminator.
    pub fn end(&mut self) -> &mut Self {
        self.bytes.push(0x00);
        self
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Builds an encoded envelope.
#[derive(Clone, Debug, Default)]
pub struct EnvelopeWriter {
    initial: Option<(f32, f32)>,
    high: bool,
    sustain: Option<u8>,
    points: Vec<((u16, f32), (u16, f32))>,
}

fn fixed(v: f32) -> u16 {
    (v * 65536.0).round().clamp(0.0, 65535.0) as u16
}

fn varint(out: &mut Vec<u8>, ms: u16) {
    let ms = ms.min(0x7fff);
    if ms < 0x80 {
        out.push(ms as u8);
    } else {
        out.extend([0x80 | (ms >> 8) as u8, ms as u8]);
    }
}

impl EnvelopeWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initial(mut self, value: f32) -> Self {
        self.initial = Some((value, value));
        self
    }

    /// Initial values for velocity 0 and 1.
    pub fn initial_pair(mut self, low: f32, high: f32) -> Self {
        self.initial = Some((low, high));
        self.high = true;
        self
    }

    /// Point `ms` after the previous one, same for every velocity.
    pub fn point(mut self, ms: u16, value: f32) -> Self {
        self.points.push(((ms, value), (ms, value)));
        self
    }

    /// Point with separate velocity-0 and velocity-1 time and value.
    pub fn point_pair(mut self, low: (u16, f32), high: (u16, f32)) -> Self {
        self.points.push((low, high));
        self.high = true;
        self
    }

    pub fn sustain(mut self, index: u8) -> Self {
        self.sustain = Some(index);
        self
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut flags = 0;
        if self.initial.is_some() {
            flags |= FLAG_INITIAL_LOW;
        }
        if self.high {
            flags |= FLAG_HIGH;
        }
        if self.sustain.is_some() {
            flags |= FLAG_SUSTAIN;
        }

        let mut out = alloc::vec![flags];
        let (init_low, init_high) = self.initial.unwrap_or((0.0, 0.0));
        if self.initial.is_some() {
            out.extend(fixed(init_low).to_be_bytes());
        }
        if self.high {
            out.extend(fixed(init_high).to_be_bytes());
        }
        if let Some(index) = self.sustain {
            out.push(index);
        }
        out.push(self.points.len().min(255) as u8);
        for ((t_low, v_low), (t_high, v_high)) in self.points.iter().take(255) {
            varint(&mut out, *t_low);
            out.extend(fixed(*v_low).to_be_bytes());
            if self.high {
                varint(&mut out, *t_high);
                out.extend(fixed(*v_high).to_be_bytes());
            }
        }
        out
    }
}
