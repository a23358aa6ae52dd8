//! segb: a decoder for SEGB v1 and v2 append-only usage-event containers.
//!
//! The engine consumes any `Read + Seek` byte source and returns an in-memory
//! [`Segb`]. It never opens files or prints; see the `segb-dump` binary for that.

pub mod codec;
pub mod decoder;
pub mod detect;
pub mod dump;
pub mod error;
pub mod types;
pub mod v1;
pub mod v2;

pub use codec::{MAGIC, cocoa_to_datetime, crc32};
pub use decoder::{Decoded, decode, decode_versioned};
pub use detect::detect_version;
pub use error::Error;
pub use types::{Entry, EntryState, Segb, Version};
