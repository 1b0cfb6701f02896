//! Primary index (.idx) record decoding

use std::fs::File;
use std::io::{self, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use byteorder::{BigEndian, ByteOrder};
use log::trace;

use super::entry::IndexEntry;
use super::error::{DictError, Result};
use super::metadata::OffsetBits;
use super::utils;

/// Byte separating the lemma from the trailer fields of an `.idx` record.
pub const LEMMA_TERMINATOR: u8 = 0;

/// Width in bytes of the data-size trailer field.
pub const SIZE_FIELD_WIDTH: usize = 4;

/// Scan window for a single record. Real lemmas are far shorter; a window
/// with no terminator signals corruption.
const BUFFER_SIZE: usize = 1024;

/// Decoder for the variable-length records of a `.idx` file.
///
/// Record layout:
/// - N bytes: UTF-8 lemma
/// - 1 byte:  0x00 terminator
/// - 4 or 8 bytes: data offset (big-endian, width per `idxoffsetbits`)
/// - 4 bytes: data size (big-endian)
///
/// This is a pure record decoder; ordering logic lives with the callers.
/// The file is opened lazily on first access and the handle is kept for the
/// lifetime of the index. Seeking and reading happen under one lock so
/// concurrent readers cannot interleave the pair.
pub struct WordIndex {
    path: PathBuf,
    offset_bits: OffsetBits,
    file: Mutex<Option<File>>,
}

impl WordIndex {
    pub fn new(path: PathBuf, offset_bits: OffsetBits) -> Self {
        Self {
            path,
            offset_bits,
            file: Mutex::new(None),
        }
    }

    /// Path of the underlying `.idx` file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Configured width of the record offset field.
    pub fn offset_bits(&self) -> OffsetBits {
        self.offset_bits
    }

    /// Total byte length of a record whose terminator sits at `lemma_len`.
    pub fn record_len_for(&self, lemma_len: usize) -> usize {
        lemma_len + 1 + self.offset_bits.field_width() + SIZE_FIELD_WIDTH
    }

    fn with_file<T>(&self, op: impl FnOnce(&mut File) -> io::Result<T>) -> Result<T> {
        let mut guard = self.file.lock().map_err(|_| DictError::LockPoisoned)?;
        let file = match &mut *guard {
            Some(file) => file,
            slot => slot.insert(utils::open_read(&self.path)?),
        };
        Ok(op(file)?)
    }

    /// Decode the record starting at byte `offset`.
    ///
    /// Returns `Ok(None)` at end-of-file. A non-empty window with no
    /// terminator, or a terminator whose trailer runs past the available
    /// bytes, is reported as truncation.
    pub fn record_at(&self, offset: u64) -> Result<Option<IndexEntry>> {
        let mut buf = [0u8; BUFFER_SIZE];
        let size_read = self.with_file(|file| {
            file.seek(SeekFrom::Start(offset))?;
            utils::read_fill(file, &mut buf)
        })?;
        if size_read == 0 {
            return Ok(None);
        }

        let window = &buf[..size_read];
        let Some(lemma_len) = window.iter().position(|&b| b == LEMMA_TERMINATOR) else {
            return Err(utils::truncated(format!(
                "no record terminator within {} bytes at index offset {}",
                size_read, offset
            )));
        };
        let record_len = self.record_len_for(lemma_len);
        if record_len > size_read {
            return Err(utils::truncated(format!(
                "record trailer at index offset {} runs past end of file",
                offset
            )));
        }

        let lemma = String::from_utf8_lossy(&window[..lemma_len]).into_owned();
        let trailer = &window[lemma_len + 1..record_len];
        let data_offset = match self.offset_bits {
            OffsetBits::Bits32 => u64::from(BigEndian::read_u32(&trailer[..4])),
            OffsetBits::Bits64 => BigEndian::read_u64(&trailer[..8]),
        };
        let data_size = BigEndian::read_u32(&trailer[self.offset_bits.field_width()..]);

        trace!(
            "Record at {}: `{}` -> offset {}, size {}",
            offset,
            lemma,
            data_offset,
            data_size
        );
        Ok(Some(IndexEntry::new(lemma, data_offset, data_size, record_len)))
    }
}
