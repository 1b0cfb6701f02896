//! Random-access reader for dictzip (.dict.dz) data files

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use flate2::read::DeflateDecoder;
use log::{debug, trace};

use super::error::{DictError, Result};
use super::utils;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const METHOD_DEFLATE: u8 = 8;

const FHCRC: u8 = 0x02;
const FEXTRA: u8 = 0x04;
const FNAME: u8 = 0x08;
const FCOMMENT: u8 = 0x10;

/// One independently-deflated block of the data stream, located by its
/// cumulative offset within the compressed payload area.
#[derive(Debug, Clone, Copy)]
struct Chunk {
    offset: u64,
    compressed_size: usize,
}

/// Random-access view of a dictzip file.
///
/// Dictzip is a gzip member whose `RA` extra field records a fixed
/// uncompressed chunk length and the compressed length of every chunk. Each
/// chunk is a self-contained raw-deflate stream, which is the property that
/// makes random access possible: a read touches only the chunks overlapping
/// the requested range, never the whole archive.
#[derive(Debug)]
pub struct DictZip {
    file: File,
    /// Uncompressed length of every chunk except possibly the last.
    chunk_len: usize,
    /// File offset where the first chunk's compressed bytes begin.
    data_start: u64,
    chunks: Vec<Chunk>,
}

impl DictZip {
    /// Open a dictzip file and parse its header.
    ///
    /// # Errors
    /// `InvalidFormat` if the magic bytes are wrong, the compression method
    /// is not deflate, or the `RA` chunk table is absent; `NotFound` if the
    /// file is missing.
    pub fn open(path: impl AsRef<Path>) -> Result<DictZip> {
        let path = path.as_ref();
        let mut file = utils::open_read(path)?;

        let mut magic = [0u8; 2];
        file.read_exact(&mut magic)?;
        if magic != GZIP_MAGIC {
            return Err(DictError::InvalidFormat(format!(
                "{} is not a gzip file",
                path.display()
            )));
        }
        let method = file.read_u8()?;
        if method != METHOD_DEFLATE {
            return Err(DictError::InvalidFormat(format!(
                "unsupported compression method {} in {}",
                method,
                path.display()
            )));
        }
        let flags = file.read_u8()?;
        // Modification time, extra flags, operating system: unused.
        let mut skipped = [0u8; 6];
        file.read_exact(&mut skipped)?;

        if flags & FEXTRA == 0 {
            return Err(DictError::InvalidFormat(format!(
                "{} has no extra field, missing dictzip chunk table",
                path.display()
            )));
        }
        let xlen = file.read_u16::<LittleEndian>()? as usize;
        let mut extra = vec![0u8; xlen];
        file.read_exact(&mut extra)?;
        let (chunk_len, chunk_sizes) = parse_chunk_table(&extra).ok_or_else(|| {
            DictError::InvalidFormat(format!(
                "{} has no RA subfield, missing dictzip chunk table",
                path.display()
            ))
        })?;
        if chunk_len == 0 {
            return Err(DictError::InvalidFormat(format!(
                "dictzip chunk length is zero in {}",
                path.display()
            )));
        }

        if flags & FNAME != 0 {
            skip_zero_terminated(&mut file)?;
        }
        if flags & FCOMMENT != 0 {
            skip_zero_terminated(&mut file)?;
        }
        if flags & FHCRC != 0 {
            file.read_u16::<LittleEndian>()?;
        }
        let data_start = file.stream_position()?;

        let mut chunks = Vec::with_capacity(chunk_sizes.len());
        let mut offset = 0u64;
        for compressed_size in chunk_sizes {
            chunks.push(Chunk {
                offset,
                compressed_size,
            });
            offset += compressed_size as u64;
        }

        debug!(
            "Opened dictzip {}: {} chunks of {} bytes, data at {}",
            path.display(),
            chunks.len(),
            chunk_len,
            data_start
        );
        Ok(DictZip {
            file,
            chunk_len,
            data_start,
            chunks,
        })
    }

    /// Uncompressed chunk length.
    pub fn chunk_len(&self) -> usize {
        self.chunk_len
    }

    /// Number of chunks in the archive.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Read `size` bytes at `offset` of the uncompressed data stream.
    ///
    /// Decompresses exactly the chunks overlapping the range and slices the
    /// requested window out of the concatenation. The read is atomic: either
    /// the full buffer is returned or an error; a range past the end of the
    /// stream is truncation, not a short read.
    pub fn read(&mut self, offset: u64, size: usize) -> Result<Vec<u8>> {
        if size == 0 {
            return Ok(Vec::new());
        }
        let first = (offset / self.chunk_len as u64) as usize;
        let last = ((offset + size as u64) / self.chunk_len as u64) as usize;
        let skip = (offset % self.chunk_len as u64) as usize;

        let mut assembled = Vec::with_capacity((last - first + 1) * self.chunk_len);
        for chunk_index in first..=last {
            // The range end may fall exactly on the final chunk boundary, in
            // which case the chunk after it does not exist and is not needed.
            let Some(chunk) = self.chunks.get(chunk_index) else {
                break;
            };
            let mut compressed = vec![0u8; chunk.compressed_size];
            self.file
                .seek(SeekFrom::Start(self.data_start + chunk.offset))?;
            self.file.read_exact(&mut compressed)?;

            let before = assembled.len();
            let mut decoder = DeflateDecoder::new(compressed.as_slice());
            decoder.read_to_end(&mut assembled)?;
            trace!(
                "Chunk {} inflated: {} -> {} bytes",
                chunk_index,
                chunk.compressed_size,
                assembled.len() - before
            );
        }

        if assembled.len() < skip + size {
            return Err(utils::truncated(format!(
                "read of {} bytes at offset {} runs past the end of the data stream",
                size, offset
            )));
        }
        Ok(assembled[skip..skip + size].to_vec())
    }
}

/// Walk the gzip extra field's subfields looking for the `RA` chunk table.
///
/// Subfield layout: 2 id bytes, 2-byte little-endian length, payload. The
/// `RA` payload is version(2), chunk length(2), chunk count(2), then one
/// 2-byte compressed length per chunk, all little-endian.
fn parse_chunk_table(extra: &[u8]) -> Option<(usize, Vec<usize>)> {
    let mut rest = extra;
    loop {
        if rest.len() < 4 {
            return None;
        }
        let (id, after_id) = rest.split_at(2);
        let len = u16::from_le_bytes([after_id[0], after_id[1]]) as usize;
        let payload = after_id.get(2..2 + len)?;
        if id != b"RA" {
            rest = &after_id[2 + len..];
            continue;
        }
        if payload.len() < 6 {
            return None;
        }
        let chunk_len = u16::from_le_bytes([payload[2], payload[3]]) as usize;
        let chunk_count = u16::from_le_bytes([payload[4], payload[5]]) as usize;
        let mut sizes = Vec::with_capacity(chunk_count);
        for i in 0..chunk_count {
            let at = 6 + 2 * i;
            let bytes = payload.get(at..at + 2)?;
            sizes.push(u16::from_le_bytes([bytes[0], bytes[1]]) as usize);
        }
        return Some((chunk_len, sizes));
    }
}

fn skip_zero_terminated(file: &mut File) -> Result<()> {
    loop {
        if file.read_u8()? == 0 {
            return Ok(());
        }
    }
}
