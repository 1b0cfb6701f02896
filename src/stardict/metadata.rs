//! Dictionary metadata (.ifo header) parsing

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{info, warn};

use super::error::{DictError, Result};

/// Width of the data-offset field in `.idx` records.
///
/// Dictionaries declaring `idxoffsetbits=64` store 64-bit offsets in network
/// byte order; everything else uses 32 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OffsetBits {
    #[default]
    Bits32,
    Bits64,
}

impl OffsetBits {
    /// Offset field width in bytes.
    pub fn field_width(&self) -> usize {
        match self {
            OffsetBits::Bits32 => 4,
            OffsetBits::Bits64 => 8,
        }
    }
}

/// Parsed `.ifo` metadata header.
///
/// The header is line-oriented UTF-8 `key=value` text. Only `wordcount` is
/// strictly required; every other field is optional and malformed values fall
/// back to their documented defaults.
#[derive(Debug, Clone)]
pub struct DictMetadata {
    pub book_name: String,
    /// Count of word entries in the `.idx` file.
    pub word_count: u64,
    /// Size in bytes of the (uncompressed) `.idx` file, as declared.
    pub idx_file_size: Option<u64>,
    pub idx_offset_bits: OffsetBits,
    pub version: Option<String>,
    pub author: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
    /// Entry-layout descriptor: when set, every entry's data shares the same
    /// (single- or multi-tag) sequence of typed fields, with the type
    /// identifiers omitted from the data file.
    pub same_type_sequence: Option<String>,
    base_path: PathBuf,
}

impl DictMetadata {
    /// Load and parse a `.ifo` file.
    ///
    /// # Errors
    /// Returns `NotFound` if the file is missing and `InvalidFormat` if the
    /// required `wordcount` field is absent or unusable. Malformed optional
    /// fields are logged and replaced with their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<DictMetadata> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => DictError::NotFound(path.to_path_buf()),
            _ => DictError::Io(e),
        })?;

        let mut book_name = None;
        let mut word_count = None;
        let mut idx_file_size = None;
        let mut idx_offset_bits = OffsetBits::default();
        let mut version = None;
        let mut author = None;
        let mut email = None;
        let mut website = None;
        let mut description = None;
        let mut date = None;
        let mut same_type_sequence = None;

        for line in text.lines() {
            let Some((key, value)) = line.split_once('=') else {
                // The magic first line and blank lines carry no key.
                continue;
            };
            match key {
                "bookname" => book_name = Some(value.to_string()),
                "wordcount" => word_count = Some(value.to_string()),
                "idxfilesize" => match value.parse::<u64>() {
                    Ok(n) => idx_file_size = Some(n),
                    Err(_) => warn!("Malformed idxfilesize `{}` in {}, ignoring", value, path.display()),
                },
                "idxoffsetbits" => match value.parse::<u32>() {
                    Ok(32) => idx_offset_bits = OffsetBits::Bits32,
                    Ok(64) => idx_offset_bits = OffsetBits::Bits64,
                    _ => warn!(
                        "Unsupported idxoffsetbits `{}` in {}, falling back to 32",
                        value,
                        path.display()
                    ),
                },
                "version" => version = Some(value.to_string()),
                "author" => author = Some(value.to_string()),
                "email" => email = Some(value.to_string()),
                "website" => website = Some(value.to_string()),
                "description" => description = Some(value.to_string()),
                "date" => date = Some(value.to_string()),
                "sametypesequence" => same_type_sequence = Some(value.to_string()),
                _ => {} // Unrecognized keys are ignored.
            }
        }

        let word_count = word_count
            .ok_or_else(|| {
                DictError::InvalidFormat(format!("missing required wordcount field in {}", path.display()))
            })?
            .parse::<u64>()
            .map_err(|_| {
                DictError::InvalidFormat(format!("unusable wordcount field in {}", path.display()))
            })?;
        if word_count == 0 {
            return Err(DictError::InvalidFormat(format!(
                "wordcount must be greater than zero in {}",
                path.display()
            )));
        }

        let book_name = book_name.unwrap_or_else(|| {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            warn!("Missing bookname in {}, using file stem `{}`", path.display(), stem);
            stem
        });

        let metadata = DictMetadata {
            book_name,
            word_count,
            idx_file_size,
            idx_offset_bits,
            version,
            author,
            email,
            website,
            description,
            date,
            same_type_sequence,
            base_path: path.with_extension(""),
        };

        info!(
            "Metadata loaded: `{}`, {} entries, {}-bit offsets",
            metadata.book_name,
            metadata.word_count,
            metadata.idx_offset_bits.field_width() * 8
        );
        Ok(metadata)
    }

    fn path_with_suffix(&self, suffix: &str) -> PathBuf {
        let mut s = self.base_path.clone().into_os_string();
        s.push(suffix);
        s.into()
    }

    /// Full path to the primary index file.
    pub fn idx_path(&self) -> PathBuf {
        self.path_with_suffix(".idx")
    }

    /// Full path to the compressed data file.
    pub fn dict_path(&self) -> PathBuf {
        self.path_with_suffix(".dict.dz")
    }

    /// Full path to the secondary (ordinal) index file.
    pub fn ordinal_index_path(&self) -> PathBuf {
        self.path_with_suffix(".sparkidx")
    }
}
