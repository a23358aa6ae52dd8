//! Error types for the SEGB decoder.
//!
//! This module defines the unified error enum used throughout the crate. All fallible
//! operations return `Result<T, Error>`. Decoding is fail-fast: the first error aborts
//! the whole decode and no partial result is returned.

/// Unified error type for all SEGB decoding operations.
///
/// Each variant represents a distinct failure mode:
///
/// - `Io` -> the underlying byte source failed (device error, seek failure)
/// - `InvalidMagic` -> the header does not carry `SEGB` where the version expects it
/// - `UnsupportedVersion` -> neither magic probe matched
/// - `InvalidHeader` -> header fields cannot describe a valid container
/// - `CorruptEntry` -> an entry or trailer record is structurally inconsistent
///
/// Checksum mismatches are not errors: verification is a caller-invoked boolean
/// check on the decoded entry.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An I/O error occurred while seeking or reading the byte source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The magic bytes at the version's expected location are not `SEGB`.
    #[error("invalid magic at offset {offset:#x}: {}", String::from_utf8_lossy(.found))]
    InvalidMagic {
        /// Absolute offset where the magic was expected.
        offset: u64,
        /// The four bytes actually found there.
        found: [u8; 4],
    },

    /// Neither the v1 nor the v2 magic marker is present.
    #[error("unsupported version: no SEGB magic at offset 0x00 or 0x34")]
    UnsupportedVersion,

    /// The container header is truncated or its fields are out of range.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// An entry or trailer record is structurally inconsistent (bad length,
    /// truncated read, overrun of the data region).
    #[error("corrupt entry at offset {offset}: {detail}")]
    CorruptEntry {
        /// Absolute offset of the entry or record being decoded.
        offset: u64,
        /// Human-readable description of the inconsistency.
        detail: String,
    },
}
