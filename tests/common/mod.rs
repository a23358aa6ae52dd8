//! Shared fixture builders for integration tests.
//!
//! Builds byte-exact v1 and v2 containers in memory so tests never depend on
//! checked-in binary files.

#![allow(dead_code)]

use chrono::{TimeZone, Utc};

/// Payload lines used by the end-to-end fixtures.
pub const POEM: [&str; 3] = ["Here's to the crazy ones.", "The misfits.", "The rebels."];

/// One entry to place in a fixture container.
#[derive(Debug, Clone)]
pub struct FixtureEntry {
    pub payload: Vec<u8>,
    pub state: i32,
    pub timestamp: f64,
}

impl FixtureEntry {
    pub fn written(payload: &[u8], timestamp: f64) -> FixtureEntry {
        FixtureEntry {
            payload: payload.to_vec(),
            state: 1,
            timestamp,
        }
    }
}

/// Cocoa seconds for midnight UTC on the given date.
pub fn cocoa_seconds(year: i32, month: u32, day: u32) -> f64 {
    let date = Utc
        .with_ymd_and_hms(year, month, day, 0, 0, 0)
        .single()
        .expect("valid date");
    (date.timestamp() - segb::codec::COCOA_EPOCH_UNIX_SECS) as f64
}

/// The three poem lines, dated like the reference fixtures.
pub fn poem_entries() -> Vec<FixtureEntry> {
    vec![
        FixtureEntry::written(POEM[0].as_bytes(), cocoa_seconds(2007, 1, 9)),
        FixtureEntry::written(POEM[1].as_bytes(), cocoa_seconds(2007, 6, 29)),
        FixtureEntry::written(POEM[2].as_bytes(), cocoa_seconds(2011, 10, 5)),
    ]
}

fn pad_to(buf: &mut Vec<u8>, alignment: usize) {
    while buf.len() % alignment != 0 {
        buf.push(0);
    }
}

/// Build a v1 container: 56-byte header, then each entry padded to 8 bytes.
pub fn build_v1(entries: &[FixtureEntry]) -> Vec<u8> {
    let mut buf = vec![0u8; 56];
    buf[0x34..0x38].copy_from_slice(b"SEGB");
    for entry in entries {
        buf.extend_from_slice(&(entry.payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&entry.state.to_le_bytes());
        buf.extend_from_slice(&entry.timestamp.to_le_bytes());
        buf.extend_from_slice(&entry.timestamp.to_le_bytes());
        buf.extend_from_slice(&segb::crc32(&entry.payload).to_le_bytes());
        buf.extend_from_slice(&0i32.to_le_bytes());
        buf.extend_from_slice(&entry.payload);
        pad_to(&mut buf, 8);
    }
    let end = buf.len() as i32;
    buf[0..4].copy_from_slice(&end.to_le_bytes());
    buf
}

/// Build a v2 container, writing trailer records in `trailer_order`
/// (indices into `entries`).
pub fn build_v2(entries: &[FixtureEntry], created: f64, trailer_order: &[usize]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(b"SEGB");
    buf.extend_from_slice(&(entries.len() as i32).to_le_bytes());
    buf.extend_from_slice(&created.to_le_bytes());
    buf.extend_from_slice(&[0u8; 16]);

    let mut offsets = Vec::with_capacity(entries.len());
    for entry in entries {
        offsets.push((buf.len() - 32) as i32);
        buf.extend_from_slice(&segb::crc32(&entry.payload).to_le_bytes());
        buf.extend_from_slice(&[0u8; 4]);
        buf.extend_from_slice(&entry.payload);
        pad_to(&mut buf, 4);
    }

    for &i in trailer_order {
        buf.extend_from_slice(&offsets[i].to_le_bytes());
        buf.extend_from_slice(&entries[i].state.to_le_bytes());
        buf.extend_from_slice(&entries[i].timestamp.to_le_bytes());
    }
    buf
}
