//! Primitive codecs shared by the v1 and v2 decoders.
//!
//! This module is pure data transformation plus two thin read helpers over a
//! seekable byte source: little-endian field extraction from fixed-layout
//! buffers, CRC-32 (IEEE polynomial), Cocoa timestamp conversion, and alignment
//! arithmetic. It has no knowledge of either container layout.

use std::io::{self, Read, Seek, SeekFrom};

use chrono::{DateTime, Utc};

use crate::error::Error;

/// Magic bytes identifying a SEGB container (ASCII "SEGB").
pub const MAGIC: [u8; 4] = [0x53, 0x45, 0x47, 0x42];

/// Seconds between the Unix epoch and the Cocoa epoch (2001-01-01T00:00:00Z).
pub const COCOA_EPOCH_UNIX_SECS: i64 = 978_307_200;

/// Sequential little-endian field reader over a fixed-layout buffer.
///
/// Headers and records are read from the byte source in one `read_exact` into
/// a stack array of the layout's exact width, then split into fields here in
/// declaration order. Callers size the buffer from the layout, so every take
/// stays in bounds.
#[derive(Debug)]
pub(crate) struct Fields<'a> {
    buf: &'a [u8],
    cursor: usize,
}

impl<'a> Fields<'a> {
    /// Start reading fields at the beginning of `buf`.
    pub(crate) fn new(buf: &'a [u8]) -> Fields<'a> {
        Fields { buf, cursor: 0 }
    }

    /// Take the next `N` bytes verbatim.
    pub(crate) fn bytes<const N: usize>(&mut self) -> [u8; N] {
        let start = self.cursor;
        self.cursor += N;
        self.buf[start..self.cursor]
            .try_into()
            .expect("field width matches layout")
    }

    pub(crate) fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.bytes())
    }

    pub(crate) fn i32(&mut self) -> i32 {
        i32::from_le_bytes(self.bytes())
    }

    pub(crate) fn f64(&mut self) -> f64 {
        f64::from_le_bytes(self.bytes())
    }

    /// Number of bytes consumed so far.
    pub(crate) fn position(&self) -> usize {
        self.cursor
    }
}

/// Compute the CRC-32 (IEEE 802.3 polynomial) of `data`.
///
/// # Arguments
///
/// * `data` - Bytes to checksum.
///
/// # Returns
///
/// The 32-bit checksum, as stored in SEGB entries.
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// The Cocoa reference date, 2001-01-01T00:00:00Z.
pub fn cocoa_epoch() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(COCOA_EPOCH_UNIX_SECS, 0).expect("Cocoa epoch is representable")
}

/// Convert a Cocoa timestamp (floating-point seconds since 2001-01-01T00:00:00Z)
/// into an absolute UTC time.
///
/// The fractional part is truncated toward zero, so `1.9` and `-1.9` land one
/// whole second after and before the epoch respectively. NaN maps to the epoch.
/// Values beyond chrono's representable range saturate to
/// [`DateTime::<Utc>::MIN_UTC`] or [`DateTime::<Utc>::MAX_UTC`].
///
/// # Arguments
///
/// * `seconds` - Seconds relative to the Cocoa epoch.
///
/// # Returns
///
/// The corresponding `DateTime<Utc>` with whole-second precision.
pub fn cocoa_to_datetime(seconds: f64) -> DateTime<Utc> {
    // `as` truncates toward zero, saturates at the i64 bounds, and maps NaN to 0.
    let whole = seconds as i64;
    COCOA_EPOCH_UNIX_SECS
        .checked_add(whole)
        .and_then(|unix| DateTime::<Utc>::from_timestamp(unix, 0))
        .unwrap_or(if whole < 0 {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::<Utc>::MAX_UTC
        })
}

/// Number of filler bytes needed to move `position` up to the next multiple of
/// `alignment`. Zero when already aligned.
pub fn padding(position: u64, alignment: u64) -> u64 {
    (alignment - position % alignment) % alignment
}

/// Round `position` up to the next multiple of `alignment`.
pub fn align_up(position: u64, alignment: u64) -> u64 {
    position + padding(position, alignment)
}

/// Read exactly `N` bytes from the current position of `reader`.
pub(crate) fn read_array<R: Read, const N: usize>(reader: &mut R) -> io::Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

/// Seek to `offset` and fill `buf` completely.
pub(crate) fn read_exact_at<R: Read + Seek>(
    reader: &mut R,
    offset: u64,
    buf: &mut [u8],
) -> io::Result<()> {
    reader.seek(SeekFrom::Start(offset))?;
    reader.read_exact(buf)
}

/// Map an I/O error from a structured read into the crate error type.
///
/// Running out of bytes inside a header, record, or entry is a structural
/// problem with the container, so `UnexpectedEof` becomes the error built by
/// `on_eof`. Every other I/O failure propagates as [`Error::Io`].
pub(crate) fn map_truncation(err: io::Error, on_eof: impl FnOnce() -> Error) -> Error {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        on_eof()
    } else {
        Error::Io(err)
    }
}
