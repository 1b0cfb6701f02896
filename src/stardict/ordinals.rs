//! Secondary ordinal index (.sparkidx) build and lookup

use std::fs::{self, File};
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use log::{debug, info, warn};

use super::entry::IndexEntry;
use super::error::{DictError, Result};
use super::utils;
use super::word_index::{WordIndex, LEMMA_TERMINATOR, SIZE_FIELD_WIDTH};

/// Size of a single pointer in the ordinal index file.
pub const POINTER_SIZE: u64 = 4;

/// Default coalescing window for build progress notifications.
pub const DEFAULT_PROGRESS_WINDOW: Duration = Duration::from_millis(200);

/// Buffer for the sequential scan of the `.idx` file during a build.
const BUILD_BUFFER_SIZE: usize = 4096;

/// The fixed-width side index that makes the variable-length primary index
/// binary-searchable.
///
/// The file is a flat array of 4-byte big-endian integers; entry `i` holds
/// the `.idx` byte offset at which record `i` begins, so resolving "the i-th
/// lemma in sorted order" costs one seek instead of a sequential scan.
pub struct OrdinalIndex {
    path: PathBuf,
    word_index: WordIndex,
    word_count: u64,
    file: Mutex<Option<File>>,
}

impl OrdinalIndex {
    pub fn new(path: PathBuf, word_index: WordIndex, word_count: u64) -> Self {
        Self {
            path,
            word_index,
            word_count,
            file: Mutex::new(None),
        }
    }

    /// Whether the index file has been built.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// The primary index this ordinal index points into.
    pub fn word_index(&self) -> &WordIndex {
        &self.word_index
    }

    fn with_file<T>(&self, op: impl FnOnce(&mut File) -> io::Result<T>) -> Result<T> {
        let mut guard = self.file.lock().map_err(|_| DictError::LockPoisoned)?;
        let file = match &mut *guard {
            Some(file) => file,
            slot => slot.insert(utils::open_read(&self.path)?),
        };
        Ok(op(file)?)
    }

    /// Number of entries in the index (file length / 4).
    pub fn len(&self) -> Result<u64> {
        self.with_file(|file| Ok(file.metadata()?.len() / POINTER_SIZE))
    }

    /// Resolve an ordinal position to its primary-index record.
    ///
    /// Returns `Ok(None)` for ordinals at or past the end of the index.
    pub fn entry_at(&self, ordinal: u64) -> Result<Option<IndexEntry>> {
        let mut buf = [0u8; POINTER_SIZE as usize];
        let size_read = self.with_file(|file| {
            file.seek(SeekFrom::Start(ordinal * POINTER_SIZE))?;
            utils::read_fill(file, &mut buf)
        })?;
        if size_read == 0 {
            return Ok(None);
        }
        if size_read < buf.len() {
            return Err(utils::truncated(format!(
                "ordinal index entry {} is cut short ({} of {} bytes)",
                ordinal, size_read, POINTER_SIZE
            )));
        }
        let pointer = u64::from(BigEndian::read_u32(&buf));
        self.word_index.record_at(pointer)
    }

    /// Scan the `.idx` file and (re)build the ordinal index.
    ///
    /// The scan walks the primary index in fixed-size buffers; each time a
    /// full record (terminator plus trailer) has been consumed, the byte
    /// offset at which that record began is appended as the next pointer.
    /// The new index is written to a temporary file next to the target and
    /// renamed over it on success, so an interrupted build never corrupts an
    /// existing index.
    ///
    /// `progress` receives `(records indexed so far, total entries)`; calls
    /// are coalesced to at most one per `window`, and a final call after the
    /// last record is guaranteed. Building is a long-running exclusive
    /// operation: no reader may use this dictionary until it returns.
    pub fn build(&self, window: Duration, mut progress: impl FnMut(u64, u64)) -> Result<u64> {
        info!("Building ordinal index at {}", self.path.display());
        let trailer_len = 1 + self.word_index.offset_bits().field_width() + SIZE_FIELD_WIDTH;
        let mut idx = utils::open_read(self.word_index.path())?;

        let tmp_path = {
            let mut s = self.path.clone().into_os_string();
            s.push(".tmp");
            PathBuf::from(s)
        };
        let mut out = BufWriter::new(File::create(&tmp_path)?);

        let mut buf = vec![0u8; BUILD_BUFFER_SIZE];
        let mut record_start: u64 = 0;
        let mut indexed: u64 = 0;
        let mut last_notified = Instant::now();

        loop {
            idx.seek(SeekFrom::Start(record_start))?;
            let size_read = utils::read_fill(&mut idx, &mut buf)?;
            if size_read == 0 {
                break;
            }
            let chunk = &buf[..size_read];

            let mut pos = 0; // start of the current record within the buffer
            let mut scan = 0;
            let mut emitted = false;
            while scan < size_read {
                if chunk[scan] != LEMMA_TERMINATOR {
                    scan += 1;
                    continue;
                }
                let record_len = scan + trailer_len - pos;
                if pos + record_len > size_read {
                    // Record straddles the buffer edge; refill from its start.
                    break;
                }
                let pointer = u32::try_from(record_start).map_err(|_| {
                    DictError::InvalidFormat(format!(
                        "index offset {} exceeds the 32-bit pointer range",
                        record_start
                    ))
                })?;
                out.write_u32::<BigEndian>(pointer)?;
                indexed += 1;
                if last_notified.elapsed() >= window {
                    progress(indexed, self.word_count);
                    last_notified = Instant::now();
                }
                record_start += record_len as u64;
                pos += record_len;
                scan = pos;
                emitted = true;
            }

            if !emitted {
                // A full buffer without one complete record means a lemma
                // longer than the scan window; a short buffer means the file
                // ends inside a record.
                if size_read == buf.len() {
                    return Err(DictError::InvalidFormat(format!(
                        "no complete record within {} bytes at index offset {}",
                        size_read, record_start
                    )));
                }
                return Err(utils::truncated(format!(
                    "primary index ends inside a record at offset {}",
                    record_start
                )));
            }
        }

        out.flush()?;
        drop(out);
        fs::rename(&tmp_path, &self.path)?;

        progress(indexed, self.word_count);
        if indexed != self.word_count {
            warn!(
                "Indexed {} records but the header declares {}",
                indexed, self.word_count
            );
        }
        debug!("Ordinal index built: {} pointers", indexed);

        // A stale read-only handle would keep serving the replaced file.
        let mut guard = self.file.lock().map_err(|_| DictError::LockPoisoned)?;
        *guard = None;

        info!("Ordinal index ready: {} entries", indexed);
        Ok(indexed)
    }
}
