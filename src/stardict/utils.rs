//! Low-level file helpers

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use super::error::{DictError, Result};

/// Open a file read-only, reporting a missing file as `NotFound` rather than
/// a bare I/O error.
pub fn open_read(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => DictError::NotFound(path.to_path_buf()),
        _ => DictError::Io(e),
    })
}

/// Read until the buffer is full or the reader is exhausted.
///
/// Plain `Read::read` may return short counts; record scanning needs the
/// whole window filled whenever the file still has bytes for it.
pub fn read_fill(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        let n = reader.read(&mut buf[total..])?;
        if n == 0 {
            break;
        }
        total += n;
    }
    Ok(total)
}

/// An I/O error describing data that ends before a structure is complete.
pub fn truncated(message: String) -> DictError {
    DictError::Io(io::Error::new(io::ErrorKind::UnexpectedEof, message))
}
