//! Canonical, version-agnostic decode results.
//!
//! Both decoders produce version-specific structures; the unification layer in
//! [`crate::decoder`] maps them onto the types defined here. Values are built
//! once per decode call and never mutated afterwards.

use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::codec;

/// On-disk revision of a SEGB container.
///
/// # Variants
///
/// * `V1` - 56-byte header with trailing magic, sequentially scanned entries.
/// * `V2` - 32-byte header with leading magic, entries located by a trailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Version {
    /// Magic at offset 0x34, 8-byte aligned entries.
    V1,
    /// Magic at offset 0x00, 4-byte aligned entries plus trailer.
    V2,
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::V1 => f.write_str("v1"),
            Version::V2 => f.write_str("v2"),
        }
    }
}

/// Lifecycle state of an entry, shared by both revisions.
///
/// Raw values `1` and `3` are the only recognised states; the documented
/// sentinel `4` and every other raw value map to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryState {
    /// Raw `0x01`.
    Written,
    /// Raw `0x03`.
    Deleted,
    /// Raw `0x04`, or any unrecognised raw value.
    Unknown,
}

impl EntryState {
    /// The canonical raw code for this state.
    pub fn raw(self) -> i32 {
        match self {
            EntryState::Written => 0x01,
            EntryState::Deleted => 0x03,
            EntryState::Unknown => 0x04,
        }
    }
}

impl From<i32> for EntryState {
    fn from(raw: i32) -> EntryState {
        match raw {
            0x01 => EntryState::Written,
            0x03 => EntryState::Deleted,
            _ => EntryState::Unknown,
        }
    }
}

impl fmt::Display for EntryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryState::Written => f.write_str("written"),
            EntryState::Deleted => f.write_str("deleted"),
            EntryState::Unknown => f.write_str("unknown"),
        }
    }
}

/// A decoded entry in canonical form.
///
/// # Fields
///
/// * `id` - Zero-based, dense sequence index in decode order.
/// * `state` - Lifecycle state.
/// * `created` - Entry creation time.
/// * `data` - Payload bytes (v2 payloads are right-trimmed of zero padding).
/// * `checksum` - Stored CRC-32, not verified during decode.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// Zero-based, dense sequence index in decode order.
    pub id: u32,
    /// Lifecycle state.
    pub state: EntryState,
    /// Entry creation time.
    pub created: DateTime<Utc>,
    /// Payload bytes.
    pub data: Bytes,
    /// Stored CRC-32 of the payload.
    pub checksum: u32,
}

impl Entry {
    /// Recompute the CRC-32 of `data` and compare it with the stored checksum.
    ///
    /// # Returns
    ///
    /// `true` if the checksums match.
    pub fn verify_crc(&self) -> bool {
        self.checksum == codec::crc32(&self.data)
    }
}

/// A fully decoded container in canonical form.
///
/// # Fields
///
/// * `version` - Revision the container was decoded as.
/// * `created` - Container creation time. Authoritative for v2; for v1 it is
///   the earliest entry creation time, or the Cocoa epoch when there are none.
/// * `entries` - Entries in decode order (`entries[i].id == i`).
#[derive(Debug, Clone, PartialEq)]
pub struct Segb {
    /// Revision the container was decoded as.
    pub version: Version,
    /// Container creation time.
    pub created: DateTime<Utc>,
    /// Entries in decode order.
    pub entries: Vec<Entry>,
}

impl Segb {
    /// Verify every entry's checksum.
    ///
    /// # Returns
    ///
    /// The ids of entries whose stored checksum does not match their data, in
    /// id order. Empty when all entries verify.
    pub fn verify_all(&self) -> Vec<u32> {
        self.entries
            .iter()
            .filter(|entry| !entry.verify_crc())
            .map(|entry| entry.id)
            .collect()
    }
}
