//! Equal-tempered pitch conversion.

/// MIDI note of the 440 Hz reference.
pub const A4_NOTE: u8 = 69;

/// Frequency of the reference note.
pub const A4_FREQUENCY: f32 = 440.0;

/// Frequency in Hz of a MIDI note number.
pub fn note_to_frequency(note: u8) -> f32 {
    A4_FREQUENCY * libm::powf(2.0, (note as f32 - A4_NOTE as f32) / 12.0)
}

/// Frequency ratio of a detune in cents.
pub fn cents_to_ratio(cents: f32) -> f32 {
    libm::powf(2.0, cents / 1200.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_note_is_440() {
        assert_eq!(note_to_frequency(69), 440.0);
    }

    #[test]
    fn octaves_double() {
        assert!((note_to_frequency(81) - 880.0).abs() < 1e-3);
        assert!((note_to_frequency(57) - 220.0).abs() < 1e-3);
    }

    #[test]
    fn semitone_ratio() {
        let ratio = note_to_frequency(70) / note_to_frequency(69);
        assert!((ratio - 1.059463).abs() < 1e-5);
    }

    #[test]
    fn middle_c() {
        assert!((note_to_frequency(60) - 261.6256).abs() < 1e-3);
    }

    #[test]
    fn cents() {
        assert_eq!(cents_to_ratio(0.0), 1.0);
        assert!((cents_to_ratio(1200.0) - 2.0).abs() < 1e-6);
        assert!((cents_to_ratio(-1200.0) - 0.5).abs() < 1e-6);
    }
}
