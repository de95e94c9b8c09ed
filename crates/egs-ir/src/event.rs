//! Decoded events of an EGS event stream.

/// One decoded event.
///
/// Events borrow from the event bytes they were decoded from; they are
/// produced one at a time and never collected into a full list.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Event<'a> {
    /// Advance the stream clock.
    Delay { seconds: f64 },
    /// Start a note on a channel.
    Note {
        channel: u8,
        note: u8,
        /// Normalized to `[0, 1]`
        velocity: f32,
        /// Seconds
        duration: f64,
    },
    /// Pitch wheel change. Reserved; the decoder does not emit it yet.
    Wheel { channel: u8, value: f32 },
    /// Opcode reserved for future use, carried as raw bytes
    /// (opcode byte included) so it can be skipped.
    Future(&'a [u8]),
}
