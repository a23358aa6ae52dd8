//! Human-readable rendering of decoded containers.
//!
//! Used by the `segb-dump` binary. Rendering is pure: it builds a `String`
//! and never touches stdout.

use crate::types::Segb;

/// Bytes shown per hexdump line.
const HEXDUMP_WIDTH: usize = 16;

/// What to include for each entry in [`render`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumpOptions {
    /// Recompute and report each entry's checksum.
    pub verify_crc: bool,
    /// Append a hexdump of each entry's data.
    pub hexdump: bool,
}

impl Default for DumpOptions {
    fn default() -> DumpOptions {
        DumpOptions {
            verify_crc: true,
            hexdump: true,
        }
    }
}

/// Format `data` as a classic hexdump.
///
/// Each line holds a zero-padded 8-digit hex offset, up to 16 hex bytes padded
/// to full width, and the printable ASCII rendering (`.` for anything outside
/// 0x20..=0x7E).
///
/// # Returns
///
/// The dump, one `\n`-terminated line per 16 bytes. Empty input yields an
/// empty string.
pub fn hexdump(data: &[u8]) -> String {
    let mut out = String::new();
    for (line, chunk) in data.chunks(HEXDUMP_WIDTH).enumerate() {
        out.push_str(&format!("{:08x}: ", line * HEXDUMP_WIDTH));
        for column in 0..HEXDUMP_WIDTH {
            match chunk.get(column) {
                Some(byte) => out.push_str(&format!("{byte:02x} ")),
                None => out.push_str("   "),
            }
        }
        out.push(' ');
        out.extend(chunk.iter().map(|&byte| {
            if (0x20..=0x7e).contains(&byte) {
                byte as char
            } else {
                '.'
            }
        }));
        out.push('\n');
    }
    out
}

/// Render a full report for a decoded container.
///
/// # Arguments
///
/// * `segb` - The decoded container.
/// * `options` - Which per-entry sections to include.
///
/// # Returns
///
/// A multi-line report: version and creation time, then one block per entry.
pub fn render(segb: &Segb, options: &DumpOptions) -> String {
    let mut out = String::new();
    out.push_str(&format!("Version: {}\n", segb.version));
    out.push_str(&format!("Created: {}\n", segb.created));
    out.push_str(&format!("Entries: {}\n", segb.entries.len()));
    for entry in &segb.entries {
        out.push_str(&format!("Entry {}:\n", entry.id));
        out.push_str(&format!("  State: {}\n", entry.state));
        out.push_str(&format!("  Created: {}\n", entry.created));
        out.push_str(&format!("  Length: {}\n", entry.data.len()));
        if options.verify_crc {
            let status = if entry.verify_crc() { "ok" } else { "MISMATCH" };
            out.push_str(&format!("  CRC: {:#010x} ({status})\n", entry.checksum));
        }
        if options.hexdump {
            out.push_str(&hexdump(&entry.data));
        }
        out.push_str("--------------------\n");
    }
    out
}
