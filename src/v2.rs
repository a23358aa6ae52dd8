//! Decoder for SEGB v2 containers.
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! header  (32 bytes):  ["SEGB"][i32 entry_count][f64 created][16 reserved]
//! entries:             [u32 crc][4 reserved][payload ...] padded to a multiple of 4
//! trailer (16 bytes each, entry_count records, at end of file):
//!                      [i32 offset][i32 state][f64 created]
//! ```
//!
//! Record offsets are relative to the end of the header. Trailer records are
//! not stored in spatial order, so they are sorted by offset before entry
//! boundaries are derived: each entry runs up to the next record's offset, and
//! the last one runs up to the start of the trailer.

use std::io::{Read, Seek, SeekFrom};

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::codec::{self, Fields, MAGIC};
use crate::detect::V2_MAGIC_OFFSET;
use crate::error::Error;
use crate::types::EntryState;

/// Size of the v2 file header in bytes.
pub const HEADER_SIZE: usize = 32;

/// Size of one trailer record in bytes.
pub const TRAILER_RECORD_SIZE: usize = 16;

/// Checksum plus reserved bytes at the start of every raw entry.
pub const ENTRY_PREFIX_SIZE: usize = 8;

/// Entries are padded so the next one starts on this boundary.
pub const ALIGNMENT: u64 = 4;

/// The v2 file header.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    /// File magic, `SEGB` in a valid container.
    pub magic: [u8; 4],
    /// Number of trailer records.
    pub entry_count: i32,
    /// Container creation time (Cocoa seconds).
    pub creation_timestamp: f64,
    /// Reserved bytes, purpose unknown.
    pub reserved: [u8; 16],
}

impl Header {
    /// Split a raw 32-byte header into its fields.
    pub fn parse(buf: &[u8; HEADER_SIZE]) -> Header {
        let mut fields = Fields::new(buf);
        let header = Header {
            magic: fields.bytes(),
            entry_count: fields.i32(),
            creation_timestamp: fields.f64(),
            reserved: fields.bytes(),
        };
        debug_assert_eq!(fields.position(), HEADER_SIZE);
        header
    }

    /// Whether the leading magic reads `SEGB`.
    pub fn is_valid_magic(&self) -> bool {
        self.magic == MAGIC
    }

    /// Container creation time decoded from `creation_timestamp`.
    pub fn created(&self) -> DateTime<Utc> {
        codec::cocoa_to_datetime(self.creation_timestamp)
    }
}

/// One fixed-size trailer record describing an entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailerRecord {
    /// Entry offset relative to the end of the header.
    pub offset: i32,
    /// Raw state code; see [`TrailerRecord::state`].
    pub raw_state: i32,
    /// Entry creation time (Cocoa seconds).
    pub creation_timestamp: f64,
}

impl TrailerRecord {
    /// Split a raw 16-byte trailer record into its fields.
    pub fn parse(buf: &[u8; TRAILER_RECORD_SIZE]) -> TrailerRecord {
        let mut fields = Fields::new(buf);
        let record = TrailerRecord {
            offset: fields.i32(),
            raw_state: fields.i32(),
            creation_timestamp: fields.f64(),
        };
        debug_assert_eq!(fields.position(), TRAILER_RECORD_SIZE);
        record
    }

    /// Canonical state decoded from `raw_state`.
    pub fn state(&self) -> EntryState {
        EntryState::from(self.raw_state)
    }
}

/// A v2 entry with its trailer metadata and raw bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// Zero-based emission order; dense over emitted entries.
    pub id: u32,
    /// Position of the describing record in the offset-sorted trailer.
    pub record_index: u32,
    /// Absolute offset of the raw entry in the file.
    pub offset: u64,
    /// Raw state code from the trailer record.
    pub raw_state: i32,
    /// Creation time from the trailer record (Cocoa seconds).
    pub creation_timestamp: f64,
    /// Stored CRC-32.
    pub checksum: u32,
    /// Reserved bytes following the checksum.
    pub reserved: [u8; 4],
    /// Payload with trailing zero bytes removed.
    pub data: Bytes,
    /// The whole span: checksum, reserved bytes, and untrimmed payload.
    pub raw_data: Bytes,
}

impl Entry {
    /// Canonical state decoded from the trailer record's `raw_state`.
    pub fn state(&self) -> EntryState {
        EntryState::from(self.raw_state)
    }

    /// Entry creation time decoded from `creation_timestamp`.
    pub fn created(&self) -> DateTime<Utc> {
        codec::cocoa_to_datetime(self.creation_timestamp)
    }

    /// Payload including any trailing zero bytes that `data` trims away.
    pub fn payload_untrimmed(&self) -> Bytes {
        self.raw_data.slice(ENTRY_PREFIX_SIZE..)
    }

    /// Recompute the CRC-32 over the trimmed payload and compare.
    pub fn verify_crc(&self) -> bool {
        self.checksum == codec::crc32(&self.data)
    }

    /// Recompute the CRC-32 over the untrimmed payload and compare.
    ///
    /// Useful when a payload legitimately ends in zero bytes, which trimming
    /// cannot tell apart from alignment padding.
    pub fn verify_crc_untrimmed(&self) -> bool {
        self.checksum == codec::crc32(&self.raw_data[ENTRY_PREFIX_SIZE..])
    }
}

/// A decoded v2 container.
#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    /// The validated file header.
    pub header: Header,
    /// All trailer records, sorted by offset (including skipped ones).
    pub records: Vec<TrailerRecord>,
    /// Absolute offset where the trailer starts.
    pub trailer_offset: u64,
    /// Entries for records whose state is not `Unknown`, in offset order.
    pub entries: Vec<Entry>,
}

/// Read and validate the v2 header at the start of `reader`.
///
/// # Errors
///
/// Returns [`Error::InvalidHeader`] if fewer than 32 bytes are available,
/// [`Error::InvalidMagic`] if the leading magic is not `SEGB`, and
/// [`Error::Io`] on any other I/O failure.
pub fn read_header<R: Read + Seek>(reader: &mut R) -> Result<Header, Error> {
    let mut buf = [0u8; HEADER_SIZE];
    codec::read_exact_at(reader, 0, &mut buf).map_err(|e| {
        codec::map_truncation(e, || {
            Error::InvalidHeader(format!("v2 header needs {HEADER_SIZE} bytes"))
        })
    })?;
    let header = Header::parse(&buf);
    if !header.is_valid_magic() {
        return Err(Error::InvalidMagic {
            offset: V2_MAGIC_OFFSET,
            found: header.magic,
        });
    }
    Ok(header)
}

/// Locate and read the trailer described by `header`.
///
/// # Returns
///
/// The absolute trailer offset and the records in on-disk storage order.
///
/// # Errors
///
/// Returns [`Error::InvalidHeader`] if the entry count is negative or the
/// trailer would overlap the header, and [`Error::Io`] on I/O failure.
pub fn read_trailer<R: Read + Seek>(
    reader: &mut R,
    header: &Header,
) -> Result<(u64, Vec<TrailerRecord>), Error> {
    let count = usize::try_from(header.entry_count).map_err(|_| {
        Error::InvalidHeader(format!("negative entry count {}", header.entry_count))
    })?;

    let file_end = reader.seek(SeekFrom::End(0))?;
    let trailer_size = (count * TRAILER_RECORD_SIZE) as u64;
    let trailer_offset = file_end
        .checked_sub(trailer_size)
        .filter(|&offset| offset >= HEADER_SIZE as u64)
        .ok_or_else(|| {
            Error::InvalidHeader(format!(
                "trailer of {count} records does not fit in a {file_end}-byte file"
            ))
        })?;

    reader.seek(SeekFrom::Start(trailer_offset))?;
    let mut records = Vec::with_capacity(count);
    for i in 0..count {
        let offset = trailer_offset + (i * TRAILER_RECORD_SIZE) as u64;
        let buf = codec::read_array::<_, TRAILER_RECORD_SIZE>(reader).map_err(|e| {
            codec::map_truncation(e, || Error::CorruptEntry {
                offset,
                detail: "truncated trailer record".into(),
            })
        })?;
        records.push(TrailerRecord::parse(&buf));
    }
    Ok((trailer_offset, records))
}

/// Decode a complete v2 container.
///
/// Reads the header and trailer, sorts the trailer records by offset, derives
/// each entry's span from its sorted neighbour, and reads the spans. Records
/// whose state is `Unknown` still bound their neighbours' spans but produce no
/// entry; emitted entries are numbered densely in emission order.
///
/// # Arguments
///
/// * `reader` - Seekable byte source holding a v2 container at offset 0.
///
/// # Returns
///
/// The header, the sorted trailer, the trailer offset, and the emitted entries.
///
/// # Errors
///
/// Returns [`Error::InvalidMagic`] or [`Error::InvalidHeader`] for a bad
/// header, [`Error::CorruptEntry`] for a non-positive or out-of-range span or
/// a span shorter than its 8-byte prefix, and [`Error::Io`] on I/O failure.
pub fn decode<R: Read + Seek>(reader: &mut R) -> Result<Container, Error> {
    let header = read_header(reader)?;
    let (trailer_offset, mut records) = read_trailer(reader, &header)?;
    tracing::debug!(
        entry_count = header.entry_count,
        trailer_offset,
        "decoding v2 container"
    );

    // Stable, so equal offsets keep storage order; they are rejected below anyway.
    records.sort_by_key(|record| record.offset);

    let mut entries = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        if record.state() == EntryState::Unknown {
            if record.raw_state != EntryState::Unknown.raw() {
                tracing::warn!(
                    record_index = index,
                    raw_state = record.raw_state,
                    "unrecognised entry state, treating as unknown"
                );
            }
            tracing::debug!(
                record_index = index,
                offset = record.offset,
                "skipping trailer record with unknown state"
            );
            continue;
        }

        let next_offset = records.get(index + 1).map(|next| next.offset);
        let (start, length) = entry_span(record.offset, next_offset, trailer_offset)?;
        let id = entries.len() as u32;
        entries.push(read_entry(reader, record, index as u32, id, start, length)?);

        reader.seek(SeekFrom::Start(codec::align_up(start + length, ALIGNMENT)))?;
    }

    tracing::debug!(
        entries = entries.len(),
        skipped = records.len() - entries.len(),
        "decoded v2 container"
    );
    Ok(Container {
        header,
        records,
        trailer_offset,
        entries,
    })
}

/// Compute the absolute start and byte length of an entry's span.
///
/// `next_offset` is the offset of the following record in the sorted trailer,
/// or `None` for the last record, whose span ends at the trailer.
fn entry_span(
    offset: i32,
    next_offset: Option<i32>,
    trailer_offset: u64,
) -> Result<(u64, u64), Error> {
    let start = HEADER_SIZE as i64 + i64::from(offset);
    let length = match next_offset {
        Some(next) => i64::from(next) - i64::from(offset),
        None => trailer_offset as i64 - start,
    };
    let corrupt = |detail: String| Error::CorruptEntry {
        offset: start.max(0) as u64,
        detail,
    };

    if offset < 0 {
        return Err(corrupt(format!("negative entry offset {offset}")));
    }
    if length <= 0 {
        return Err(corrupt(format!("invalid entry length {length}")));
    }
    if start + length > trailer_offset as i64 {
        return Err(corrupt(format!(
            "entry of {length} bytes overruns trailer at {trailer_offset}"
        )));
    }
    if length < ENTRY_PREFIX_SIZE as i64 {
        return Err(corrupt(format!(
            "entry of {length} bytes is shorter than its {ENTRY_PREFIX_SIZE}-byte prefix"
        )));
    }
    Ok((start as u64, length as u64))
}

/// Read the span `[start, start + length)` and split it into an entry.
fn read_entry<R: Read + Seek>(
    reader: &mut R,
    record: &TrailerRecord,
    record_index: u32,
    id: u32,
    start: u64,
    length: u64,
) -> Result<Entry, Error> {
    let mut buf = vec![0u8; length as usize];
    codec::read_exact_at(reader, start, &mut buf).map_err(|e| {
        codec::map_truncation(e, || Error::CorruptEntry {
            offset: start,
            detail: "truncated entry data".into(),
        })
    })?;

    let raw_data = Bytes::from(buf);
    let mut fields = Fields::new(&raw_data);
    let checksum = fields.u32();
    let reserved = fields.bytes();

    let payload = &raw_data[ENTRY_PREFIX_SIZE..];
    let trimmed_len = payload
        .iter()
        .rposition(|&b| b != 0)
        .map_or(0, |last| last + 1);
    let data = raw_data.slice(ENTRY_PREFIX_SIZE..ENTRY_PREFIX_SIZE + trimmed_len);

    Ok(Entry {
        id,
        record_index,
        offset: start,
        raw_state: record.raw_state,
        creation_timestamp: record.creation_timestamp,
        checksum,
        reserved,
        data,
        raw_data,
    })
}
