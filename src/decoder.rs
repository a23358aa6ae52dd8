//! Top-level decode entry points and the unification layer.
//!
//! [`decode_versioned`] detects the revision and runs the matching decoder,
//! returning the version-specific result as a [`Decoded`] variant. The
//! `From<Decoded> for Segb` conversion maps either variant onto the canonical
//! model, and [`decode`] chains the two.

use std::io::{Read, Seek, SeekFrom};

use crate::codec;
use crate::detect;
use crate::error::Error;
use crate::types::{Entry, EntryState, Segb, Version};
use crate::v1;
use crate::v2;

/// Version-specific decode result.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// A decoded v1 container.
    V1(v1::Container),
    /// A decoded v2 container.
    V2(v2::Container),
}

impl Decoded {
    /// The container revision this result was decoded from.
    pub fn version(&self) -> Version {
        match self {
            Decoded::V1(_) => Version::V1,
            Decoded::V2(_) => Version::V2,
        }
    }
}

/// Detect the container revision and decode it with the matching decoder.
///
/// # Arguments
///
/// * `reader` - Seekable byte source. Its initial position is irrelevant.
///
/// # Returns
///
/// The version-specific header and entries.
///
/// # Errors
///
/// Returns [`Error::UnsupportedVersion`] if neither magic marker is present,
/// and propagates every error from detection and the chosen decoder.
pub fn decode_versioned<R: Read + Seek>(reader: &mut R) -> Result<Decoded, Error> {
    let version = detect::detect_version(reader)?.ok_or(Error::UnsupportedVersion)?;

    // Detection leaves the cursor at a probe offset.
    reader.seek(SeekFrom::Start(0))?;

    match version {
        Version::V1 => Ok(Decoded::V1(v1::decode(reader)?)),
        Version::V2 => Ok(Decoded::V2(v2::decode(reader)?)),
    }
}

/// Decode a SEGB container of either revision into the canonical model.
///
/// # Arguments
///
/// * `reader` - Seekable byte source. Its initial position is irrelevant.
///
/// # Returns
///
/// The canonical [`Segb`] with entries in decode order.
///
/// # Errors
///
/// See [`decode_versioned`].
pub fn decode<R: Read + Seek>(reader: &mut R) -> Result<Segb, Error> {
    decode_versioned(reader).map(Segb::from)
}

impl From<Decoded> for Segb {
    fn from(decoded: Decoded) -> Segb {
        match decoded {
            Decoded::V1(container) => Segb::from(container),
            Decoded::V2(container) => Segb::from(container),
        }
    }
}

impl From<v1::Container> for Segb {
    /// v1 has no container timestamp: `created` is the earliest entry
    /// creation time, or the Cocoa epoch when the container is empty.
    fn from(container: v1::Container) -> Segb {
        let entries: Vec<Entry> = container
            .entries
            .into_iter()
            .map(|entry| Entry {
                id: entry.id,
                state: EntryState::from(entry.raw_state),
                created: entry.created(),
                checksum: entry.checksum,
                data: entry.data,
            })
            .collect();

        let created = entries
            .iter()
            .map(|entry| entry.created)
            .min()
            .unwrap_or_else(codec::cocoa_epoch);

        Segb {
            version: Version::V1,
            created,
            entries,
        }
    }
}

impl From<v2::Container> for Segb {
    fn from(container: v2::Container) -> Segb {
        let created = container.header.created();
        let entries = container
            .entries
            .into_iter()
            .map(|entry| Entry {
                id: entry.id,
                state: EntryState::from(entry.raw_state),
                created: entry.created(),
                checksum: entry.checksum,
                data: entry.data,
            })
            .collect();

        Segb {
            version: Version::V2,
            created,
            entries,
        }
    }
}
