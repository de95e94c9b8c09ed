//! Audio frame type.

/// A stereo audio frame (16-bit integer).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    pub left: i16,
    pub right: i16,
}

impl Frame {
    /// Create a silent frame.
    pub const fn silence() -> Self {
        Self { left: 0, right: 0 }
    }

    /// Create a mono frame (same value for both channels).
    pub const fn mono(value: i16) -> Self {
        Self { left: value, right: value }
    }

    /// Convert a mono f32 sample in `[-1, 1]`, clipping outside it.
    pub fn from_f32(sample: f32) -> Self {
        let v = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
        Self::mono(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_and_clips() {
        assert_eq!(Frame::from_f32(0.0), Frame::silence());
        assert_eq!(Frame::from_f32(1.0), Frame::mono(32767));
        assert_eq!(Frame::from_f32(4.0), Frame::mono(32767));
        assert_eq!(Frame::from_f32(-4.0), Frame::mono(-32768));
    }
}
