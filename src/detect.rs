//! Version detection by magic probing.
//!
//! A v2 container starts with `SEGB`; a v1 container carries `SEGB` at the end
//! of its 56-byte header (offset 0x34). The v2 probe runs first, so a stream
//! carrying both markers classifies as v2.

use std::io::{self, Read, Seek, SeekFrom};

use crate::codec::MAGIC;
use crate::error::Error;
use crate::types::Version;

/// Absolute offset of the magic in a v2 container.
pub const V2_MAGIC_OFFSET: u64 = 0x00;

/// Absolute offset of the magic in a v1 container.
pub const V1_MAGIC_OFFSET: u64 = 0x34;

/// Classify a byte source by probing both magic locations.
///
/// Seeks explicitly before each probe, so the incoming stream position does
/// not matter. The stream is left wherever the last probe ended; callers must
/// rewind before handing it to a decoder.
///
/// # Arguments
///
/// * `reader` - Seekable byte source to classify.
///
/// # Returns
///
/// `Some(version)` when a magic marker is found, `None` when the stream is
/// unsupported. A stream too short to hold the 4 magic bytes at a probe offset
/// simply does not match at that offset.
///
/// # Errors
///
/// Returns [`Error::Io`] if a seek or read fails for any reason other than
/// reaching end of stream.
pub fn detect_version<R: Read + Seek>(reader: &mut R) -> Result<Option<Version>, Error> {
    let version = if probe_magic(reader, V2_MAGIC_OFFSET)? {
        Some(Version::V2)
    } else if probe_magic(reader, V1_MAGIC_OFFSET)? {
        Some(Version::V1)
    } else {
        None
    };
    tracing::debug!(?version, "detected container version");
    Ok(version)
}

/// Check whether `MAGIC` sits at `offset`.
fn probe_magic<R: Read + Seek>(reader: &mut R, offset: u64) -> Result<bool, Error> {
    reader.seek(SeekFrom::Start(offset))?;
    let mut buf = [0u8; 4];
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => return Ok(false),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(Error::Io(e)),
        }
    }
    Ok(buf == MAGIC)
}
