//! EGS container splitter.
//!
//! Layout: 4-byte signature, then channel records
//! `chid:u8 trim:u8 mode:u8 len:u24-BE config[len]`, then the sentinel
//! channel id `0xFF` followed by the event bytes.

use alloc::vec::Vec;
use egs_ir::{ChannelConfig, Document, Mode};

use crate::events::validate_events;
use crate::reader::ByteReader;
use crate::FormatError;

/// Leading bytes of every EGS container.
pub const EGS_SIGNATURE: [u8; 4] = [0x00, b'E', b'G', b'S'];

/// Channel id that ends the record list and introduces the event bytes.
pub const EVENTS_SENTINEL: u8 = 0xFF;

/// Split an EGS blob into channel configs and event bytes.
///
/// The event bytes are walked once so that truncated records fail here
/// rather than during playback.
pub fn split_egs(data: &[u8]) -> Result<Document, FormatError> {
    if !data.starts_with(&EGS_SIGNATURE) {
        return Err(FormatError::MalformedContainer("missing EGS signature"));
    }

    let mut reader = ByteReader::at(data, EGS_SIGNATURE.len());
    let mut channels = Vec::new();

    loop {
        let id = reader
            .read_u8()
            .map_err(|_| FormatError::MalformedContainer("missing event sentinel"))?;
        if id == EVENTS_SENTINEL {
            break;
        }
        let trim = reader.read_u8()?;
        let mode = Mode::from_byte(reader.read_u8()?);
        let len = reader.read_u24_be()? as usize;
        let config = reader
            .read_bytes(len)
            .map_err(|_| FormatError::MalformedContainer("channel config runs past end"))?;
        channels.push(ChannelConfig { id, trim, mode, config: config.to_vec() });
    }

    let events = reader.rest();
    validate_events(events)?;

    Ok(Document { channels, events: events.to_vec() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{EgsWriter, EventWriter};

    #[test]
    fn splits_records_and_events() {
        let mut events = EventWriter::new();
        events.delay_ms(10).note(1, 60, 100, 32).end();
        let bytes = EgsWriter::new()
            .channel(0, 255, Mode::Wave, &[1, 2, 3])
            .channel(1, 128, Mode::Drum, &[])
            .events(events.as_bytes())
            .finish();

        let doc = split_egs(&bytes).unwrap();
        assert_eq!(doc.channels.len(), 2);
        assert_eq!(doc.channels[0].mode, Mode::Wave);
        assert_eq!(doc.channels[0].config, vec![1, 2, 3]);
        assert_eq!(doc.channels[1].trim, 128);
        assert!(doc.channels[1].config.is_empty());
        assert_eq!(doc.events, events.as_bytes());
    }

    #[test]
    fn channel_ids_are_not_clamped() {
        let bytes = EgsWriter::new()
            .channel(40, 10, Mode::Unknown(9), &[7])
            .finish();
        let doc = split_egs(&bytes).unwrap();
        assert_eq!(doc.channels[0].id, 40);
        assert_eq!(doc.channels[0].mode, Mode::Unknown(9));
    }

    #[test]
    fn rejects_missing_signature() {
        assert_eq!(
            split_egs(b"RIFF"),
            Err(FormatError::MalformedContainer("missing EGS signature"))
        );
    }

    #[test]
    fn rejects_config_past_end() {
        let mut bytes = EGS_SIGNATURE.to_vec();
        bytes.extend([0, 255, 2, 0x00, 0x00, 0x10, 1, 2]);
        assert!(matches!(split_egs(&bytes), Err(FormatError::MalformedContainer(_))));
    }

    #[test]
    fn rejects_missing_sentinel() {
        let mut bytes = EGS_SIGNATURE.to_vec();
        bytes.extend([0, 255, 2, 0x00, 0x00, 0x00]);
        assert!(split_egs(&bytes).is_err());
    }

    #[test]
    fn rejects_truncated_note() {
        let mut bytes = EGS_SIGNATURE.to_vec();
        bytes.extend([EVENTS_SENTINEL, 0x80, 0x10]);
        assert!(split_egs(&bytes).is_err());
    }

    #[test]
    fn empty_event_stream_is_valid() {
        let mut bytes = EGS_SIGNATURE.to_vec();
        bytes.push(EVENTS_SENTINEL);
        let doc = split_egs(&bytes).unwrap();
        assert!(doc.channels.is_empty());
        assert!(doc.events.is_empty());
    }
}
