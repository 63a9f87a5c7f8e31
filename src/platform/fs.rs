// ThreadSleuth - platform/fs.rs
//
// Filesystem helpers. The core layer only ever sees fully-read text; this is
// where bytes come off disk.

use std::io::{self, Read};
use std::path::Path;

/// Read the full content of a file as a string.
///
/// For files with invalid UTF-8, uses lossy conversion.
pub fn read_file_lossy(path: &Path) -> io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Read at most `max_bytes` from the start of a file.
///
/// Used for dialect detection without loading the whole dump. A multi-byte
/// character cut at the boundary is replaced lossily.
pub fn read_prefix_lossy(path: &Path, max_bytes: usize) -> io::Result<String> {
    let file = std::fs::File::open(path)?;
    let mut buf = Vec::with_capacity(max_bytes.min(64 * 1024));
    file.take(max_bytes as u64).read_to_end(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
