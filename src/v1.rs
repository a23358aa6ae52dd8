//! Decoder for SEGB v1 containers.
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! header (56 bytes):  [0x00 i32 end_of_data][0x04 48 reserved][0x34 "SEGB"]
//! entry  (32 bytes):  [u32 length][i32 state][f64 ts1][f64 ts2][u32 crc][i32 reserved]
//!                     followed by `length` payload bytes, padded to a multiple of 8
//! ```
//!
//! Entries start right after the header and are scanned sequentially until the
//! cursor reaches the header's end-of-data offset. There is no entry count and
//! no container-level timestamp.

use std::io::{Read, Seek};

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::codec::{self, Fields, MAGIC};
use crate::detect::V1_MAGIC_OFFSET;
use crate::error::Error;
use crate::types::EntryState;

/// Size of the v1 file header in bytes.
pub const HEADER_SIZE: usize = 56;

/// Size of the fixed portion of a v1 entry, before its payload.
pub const ENTRY_HEADER_SIZE: usize = 32;

/// Entries are padded so the next one starts on this boundary.
pub const ALIGNMENT: u64 = 8;

/// The v1 file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Absolute offset where the entry region ends.
    pub end_of_data_offset: i32,
    /// Reserved bytes, purpose unknown.
    pub reserved: [u8; 48],
    /// File magic, `SEGB` in a valid container.
    pub magic: [u8; 4],
}

impl Header {
    /// Split a raw 56-byte header into its fields.
    pub fn parse(buf: &[u8; HEADER_SIZE]) -> Header {
        let mut fields = Fields::new(buf);
        let header = Header {
            end_of_data_offset: fields.i32(),
            reserved: fields.bytes(),
            magic: fields.bytes(),
        };
        debug_assert_eq!(fields.position(), HEADER_SIZE);
        header
    }

    /// Whether the trailing magic reads `SEGB`.
    pub fn is_valid_magic(&self) -> bool {
        self.magic == MAGIC
    }
}

/// A v1 entry with every on-disk field preserved.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// Zero-based scan order.
    pub id: u32,
    /// Absolute offset of the entry's fixed header in the file.
    pub offset: u64,
    /// Payload length in bytes.
    pub length: u32,
    /// Raw state code; see [`Entry::state`].
    pub raw_state: i32,
    /// Creation time (Cocoa seconds). Surfaced as the canonical creation time.
    pub timestamp1: f64,
    /// Second timestamp (Cocoa seconds), meaning not established.
    pub timestamp2: f64,
    /// Stored CRC-32 of the payload.
    pub checksum: u32,
    /// Reserved field, purpose unknown.
    pub reserved: i32,
    /// Payload bytes, exactly `length` long.
    pub data: Bytes,
}

impl Entry {
    /// Canonical state decoded from `raw_state`.
    pub fn state(&self) -> EntryState {
        EntryState::from(self.raw_state)
    }

    /// Creation time decoded from `timestamp1`.
    pub fn created(&self) -> DateTime<Utc> {
        codec::cocoa_to_datetime(self.timestamp1)
    }

    /// Recompute the CRC-32 of the payload and compare it with the stored one.
    pub fn verify_crc(&self) -> bool {
        self.checksum == codec::crc32(&self.data)
    }

    /// Absolute offset one past the last payload byte (before padding).
    pub fn end_offset(&self) -> u64 {
        self.offset + ENTRY_HEADER_SIZE as u64 + u64::from(self.length)
    }
}

/// A decoded v1 container.
#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    /// The validated file header.
    pub header: Header,
    /// Entries in file order; `entries[i].id == i`.
    pub entries: Vec<Entry>,
}

/// Read and validate the v1 header at the start of `reader`.
///
/// # Errors
///
/// Returns [`Error::InvalidHeader`] if fewer than 56 bytes are available,
/// [`Error::InvalidMagic`] if the trailing magic is not `SEGB`, and
/// [`Error::Io`] on any other I/O failure.
pub fn read_header<R: Read + Seek>(reader: &mut R) -> Result<Header, Error> {
    let mut buf = [0u8; HEADER_SIZE];
    codec::read_exact_at(reader, 0, &mut buf).map_err(|e| {
        codec::map_truncation(e, || {
            Error::InvalidHeader(format!("v1 header needs {HEADER_SIZE} bytes"))
        })
    })?;
    let header = Header::parse(&buf);
    if !header.is_valid_magic() {
        return Err(Error::InvalidMagic {
            offset: V1_MAGIC_OFFSET,
            found: header.magic,
        });
    }
    Ok(header)
}

/// Decode a complete v1 container.
///
/// Reads the header from offset 0, then scans entries starting right after
/// it. After each payload the cursor moves to the next 8-byte boundary. The
/// scan stops once the cursor reaches or passes the end-of-data offset.
///
/// # Arguments
///
/// * `reader` - Seekable byte source holding a v1 container at offset 0.
///
/// # Returns
///
/// The header and all entries, in file order.
///
/// # Errors
///
/// Returns [`Error::InvalidMagic`] or [`Error::InvalidHeader`] for a bad
/// header, [`Error::CorruptEntry`] if an entry is truncated or would cross the
/// end-of-data offset, and [`Error::Io`] on I/O failure.
pub fn decode<R: Read + Seek>(reader: &mut R) -> Result<Container, Error> {
    let header = read_header(reader)?;
    let end = u64::try_from(header.end_of_data_offset).map_err(|_| {
        Error::InvalidHeader(format!(
            "negative end-of-data offset {}",
            header.end_of_data_offset
        ))
    })?;
    tracing::debug!(end_of_data = end, "decoding v1 container");

    let mut entries = Vec::new();
    let mut position = HEADER_SIZE as u64;
    while position < end {
        let id = entries.len() as u32;
        let entry = read_entry(reader, position, id, end)?;
        position = codec::align_up(entry.end_offset(), ALIGNMENT);
        entries.push(entry);
    }

    tracing::debug!(entries = entries.len(), "decoded v1 container");
    Ok(Container { header, entries })
}

/// Read one entry whose fixed header starts at `offset`.
fn read_entry<R: Read + Seek>(
    reader: &mut R,
    offset: u64,
    id: u32,
    end: u64,
) -> Result<Entry, Error> {
    let corrupt = |detail: String| Error::CorruptEntry { offset, detail };

    if offset + ENTRY_HEADER_SIZE as u64 > end {
        return Err(corrupt(format!(
            "entry header crosses end-of-data offset {end}"
        )));
    }

    let mut buf = [0u8; ENTRY_HEADER_SIZE];
    codec::read_exact_at(reader, offset, &mut buf)
        .map_err(|e| codec::map_truncation(e, || corrupt("truncated entry header".into())))?;
    let mut fields = Fields::new(&buf);
    let length = fields.u32();
    let raw_state = fields.i32();
    let timestamp1 = fields.f64();
    let timestamp2 = fields.f64();
    let checksum = fields.u32();
    let reserved = fields.i32();

    let payload_end = offset + ENTRY_HEADER_SIZE as u64 + u64::from(length);
    if payload_end > end {
        return Err(corrupt(format!(
            "payload of {length} bytes crosses end-of-data offset {end}"
        )));
    }

    // The declared length is untrusted; grow the buffer only as bytes arrive.
    let mut data = Vec::new();
    reader
        .by_ref()
        .take(u64::from(length))
        .read_to_end(&mut data)?;
    if data.len() < length as usize {
        return Err(corrupt("truncated payload".into()));
    }

    Ok(Entry {
        id,
        offset,
        length,
        raw_state,
        timestamp1,
        timestamp2,
        checksum,
        reserved,
        data: Bytes::from(data),
    })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    /// Helper: encode one v1 entry (fixed header + payload + padding to 8).
    fn encode_entry(payload: &[u8], state: i32, ts: f64) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&state.to_le_bytes());
        buf.extend_from_slice(&ts.to_le_bytes());
        buf.extend_from_slice(&ts.to_le_bytes());
        buf.extend_from_slice(&codec::crc32(payload).to_le_bytes());
        buf.extend_from_slice(&0i32.to_le_bytes());
        buf.extend_from_slice(payload);
        let pad = codec::padding(buf.len() as u64, 8) as usize;
        buf.extend(std::iter::repeat_n(0u8, pad));
        buf
    }

    /// Helper: build a full v1 container around the given payloads.
    fn container(payloads: &[&[u8]]) -> Vec<u8> {
        let mut body = Vec::new();
        for (i, payload) in payloads.iter().enumerate() {
            body.extend(encode_entry(payload, 1, 100.0 * (i as f64 + 1.0)));
        }
        let mut buf = vec![0u8; HEADER_SIZE];
        let end = (HEADER_SIZE + body.len()) as i32;
        buf[0..4].copy_from_slice(&end.to_le_bytes());
        buf[0x34..0x38].copy_from_slice(&MAGIC);
        buf.extend(body);
        buf
    }

    #[test]
    fn decodes_entries_in_file_order() {
        let buf = container(&[b"Here's to the crazy ones.", b"The misfits.", b"The rebels."]);
        let decoded = decode(&mut Cursor::new(buf)).expect("decode should succeed");

        assert_eq!(decoded.entries.len(), 3);
        let texts: Vec<&[u8]> = decoded.entries.iter().map(|e| &e.data[..]).collect();
        assert_eq!(
            texts,
            vec![
                &b"Here's to the crazy ones."[..],
                &b"The misfits."[..],
                &b"The rebels."[..]
            ]
        );
        for (i, entry) in decoded.entries.iter().enumerate() {
            assert_eq!(entry.id, i as u32);
            assert_eq!(entry.state(), EntryState::Written);
            assert!(entry.verify_crc(), "entry {i} should verify");
        }
    }

    #[test]
    fn entry_offsets_follow_eight_byte_alignment() {
        let buf = container(&[b"Here's to the crazy ones.", b"The misfits."]);
        let decoded = decode(&mut Cursor::new(buf)).unwrap();
        // 56 + 32 + 25 = 113 -> padded to 120.
        assert_eq!(decoded.entries[0].offset, 56);
        assert_eq!(decoded.entries[1].offset, 120);
    }

    #[test]
    fn last_entry_lands_on_end_of_data() {
        let buf = container(&[b"abc", b"defgh", b"i"]);
        let decoded = decode(&mut Cursor::new(buf)).unwrap();
        let last = decoded.entries.last().unwrap();
        assert_eq!(
            codec::align_up(last.end_offset(), ALIGNMENT),
            decoded.header.end_of_data_offset as u64
        );
    }

    #[test]
    fn empty_container_has_no_entries() {
        let buf = container(&[]);
        let decoded = decode(&mut Cursor::new(buf)).unwrap();
        assert!(decoded.entries.is_empty());
    }

    #[test]
    fn timestamps_are_preserved() {
        let buf = container(&[b"x"]);
        let decoded = decode(&mut Cursor::new(buf)).unwrap();
        let entry = &decoded.entries[0];
        assert_eq!(entry.timestamp1, 100.0);
        assert_eq!(entry.timestamp2, 100.0);
        assert_eq!(
            entry.created(),
            codec::cocoa_epoch() + chrono::TimeDelta::seconds(100)
        );
    }

    #[test]
    fn invalid_magic_is_rejected() {
        let mut buf = container(&[b"x"]);
        buf[0x34..0x38].copy_from_slice(b"BGES");
        let err = decode(&mut Cursor::new(buf)).unwrap_err();
        match err {
            Error::InvalidMagic { offset, found } => {
                assert_eq!(offset, 0x34);
                assert_eq!(&found, b"BGES");
            }
            other => panic!("expected InvalidMagic, got {other:?}"),
        }
    }

    #[test]
    fn short_header_is_invalid_header() {
        let err = decode(&mut Cursor::new(vec![0u8; 20])).unwrap_err();
        assert!(matches!(err, Error::InvalidHeader(_)), "got {err:?}");
    }

    #[test]
    fn negative_end_of_data_is_invalid_header() {
        let mut buf = container(&[]);
        buf[0..4].copy_from_slice(&(-1i32).to_le_bytes());
        let err = decode(&mut Cursor::new(buf)).unwrap_err();
        assert!(matches!(err, Error::InvalidHeader(_)), "got {err:?}");
    }

    #[test]
    fn payload_crossing_end_of_data_is_corrupt() {
        let mut buf = container(&[b"Here's to the crazy ones."]);
        // Claim a payload far longer than the region.
        buf[HEADER_SIZE..HEADER_SIZE + 4].copy_from_slice(&1000u32.to_le_bytes());
        let err = decode(&mut Cursor::new(buf)).unwrap_err();
        match err {
            Error::CorruptEntry { offset, .. } => assert_eq!(offset, HEADER_SIZE as u64),
            other => panic!("expected CorruptEntry, got {other:?}"),
        }
    }

    #[test]
    fn end_of_data_beyond_stream_is_corrupt() {
        let mut buf = container(&[b"abc"]);
        let fake_end = (buf.len() + 64) as i32;
        buf[0..4].copy_from_slice(&fake_end.to_le_bytes());
        let err = decode(&mut Cursor::new(buf)).unwrap_err();
        assert!(matches!(err, Error::CorruptEntry { .. }), "got {err:?}");
    }

    #[test]
    fn oversized_declared_payload_in_short_stream_is_truncated() {
        let claimed: u32 = 0x7FFF_0000;
        let mut buf = vec![0u8; HEADER_SIZE];
        let end = (HEADER_SIZE + ENTRY_HEADER_SIZE) as i32 + claimed as i32;
        buf[0..4].copy_from_slice(&end.to_le_bytes());
        buf[0x34..0x38].copy_from_slice(&MAGIC);
        let mut entry = encode_entry(&[0xAB; 32], 1, 0.0);
        entry[0..4].copy_from_slice(&claimed.to_le_bytes());
        buf.extend(entry);
        assert_eq!(buf.len(), 120);

        let err = decode(&mut Cursor::new(buf)).unwrap_err();
        match err {
            Error::CorruptEntry { offset, detail } => {
                assert_eq!(offset, HEADER_SIZE as u64);
                assert_eq!(detail, "truncated payload");
            }
            other => panic!("expected CorruptEntry, got {other:?}"),
        }
    }
}
