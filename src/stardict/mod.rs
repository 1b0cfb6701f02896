//! Core StarDict dictionary module

pub mod content;
pub mod entry;
pub mod error;
pub mod metadata;

mod dictzip;
mod finder;
mod ordinals;
mod utils;
mod word_index;

use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use log::info;

pub use dictzip::DictZip;
pub use entry::{IndexEntry, MatchMode};
pub use error::{DictError, Result};
pub use finder::{EntryFinder, MAX_SUGGESTIONS};
pub use metadata::{DictMetadata, OffsetBits};
pub use ordinals::{OrdinalIndex, DEFAULT_PROGRESS_WINDOW};
pub use word_index::WordIndex;

/// Separator between homograph definitions in raw `lookup` output.
pub const HOMOGRAPH_SEPARATOR: &[u8] = b"\n";

/// Separator between rendered homograph definitions.
const RENDERED_SEPARATOR: &str = "<br><br>";

/// A single dictionary: metadata, indexes and the compressed data file.
///
/// `Dictionary` owns one instance of every component and is the unit the
/// surrounding application operates on. The metadata header is parsed
/// eagerly; every file handle underneath is acquired lazily on first use and
/// held until the dictionary is dropped. Searches run through per-session
/// [`EntryFinder`] values, so concurrent readers each take their own.
pub struct Dictionary {
    metadata: DictMetadata,
    ordinals: OrdinalIndex,
    data: Mutex<Option<DictZip>>,
}

impl Dictionary {
    /// Open a dictionary given the path of its `.ifo` metadata file.
    ///
    /// The `.idx`, `.dict.dz` and `.sparkidx` paths are derived from the
    /// metadata path. Only the metadata is read here; a missing index or
    /// data file surfaces on first use.
    pub fn open(ifo_path: impl AsRef<Path>) -> Result<Dictionary> {
        let ifo_path = ifo_path.as_ref();
        info!("Opening dictionary: {}", ifo_path.display());
        let metadata = DictMetadata::load(ifo_path)?;
        let word_index = WordIndex::new(metadata.idx_path(), metadata.idx_offset_bits);
        let ordinals = OrdinalIndex::new(
            metadata.ordinal_index_path(),
            word_index,
            metadata.word_count,
        );
        Ok(Dictionary {
            metadata,
            ordinals,
            data: Mutex::new(None),
        })
    }

    /// The parsed metadata header.
    pub fn metadata(&self) -> &DictMetadata {
        &self.metadata
    }

    /// The dictionary title.
    pub fn book_name(&self) -> &str {
        &self.metadata.book_name
    }

    /// Declared number of entries.
    pub fn word_count(&self) -> u64 {
        self.metadata.word_count
    }

    /// Whether the ordinal index has been built yet.
    pub fn has_ordinal_index(&self) -> bool {
        self.ordinals.exists()
    }

    /// Start a search session over this dictionary's indexes.
    pub fn finder(&self) -> Result<EntryFinder<'_>> {
        EntryFinder::new(&self.ordinals, &self.metadata.book_name)
    }

    /// Build (or atomically rebuild) the ordinal index.
    ///
    /// A long-running exclusive operation; see [`OrdinalIndex::build`] for
    /// the progress-reporting contract. Returns the number of records
    /// indexed.
    pub fn build_ordinal_index(
        &self,
        window: Duration,
        progress: impl FnMut(u64, u64),
    ) -> Result<u64> {
        self.ordinals.build(window, progress)
    }

    /// All entries of the homograph run for `lemma`, in file order.
    fn homograph_run(&self, lemma: &str) -> Result<Vec<IndexEntry>> {
        let mut finder = self.finder()?;
        let Some(first) = finder.find_word(lemma)? else {
            return Ok(Vec::new());
        };
        let mut run = vec![first];
        while let Some(next) = finder.next_entry()? {
            if next.compare_to(lemma, MatchMode::Word) != Ordering::Equal {
                break;
            }
            run.push(next);
        }
        Ok(run)
    }

    fn read_entry_data(&self, entry: &IndexEntry) -> Result<Vec<u8>> {
        let result = (|| {
            let mut guard = self.data.lock().map_err(|_| DictError::LockPoisoned)?;
            let store = match &mut *guard {
                Some(store) => store,
                slot => slot.insert(DictZip::open(self.metadata.dict_path())?),
            };
            store.read(entry.data_offset(), entry.data_size() as usize)
        })();
        result.map_err(|source| DictError::Lookup {
            book: self.metadata.book_name.clone(),
            source: Box::new(source),
        })
    }

    /// Raw data bytes for `lemma`, or `Ok(None)` if the word is absent.
    ///
    /// Dictionaries may store the same headword several times; all members
    /// of the run are concatenated with [`HOMOGRAPH_SEPARATOR`] so the
    /// caller sees one logical unit.
    pub fn lookup(&self, lemma: &str) -> Result<Option<Vec<u8>>> {
        let run = self.homograph_run(lemma)?;
        if run.is_empty() {
            return Ok(None);
        }
        let mut raw = Vec::new();
        for (i, entry) in run.iter().enumerate() {
            if i > 0 {
                raw.extend_from_slice(HOMOGRAPH_SEPARATOR);
            }
            raw.extend_from_slice(&self.read_entry_data(entry)?);
        }
        Ok(Some(raw))
    }

    /// Formatted definitions for `lemma`, or `Ok(None)` if absent.
    ///
    /// Each homograph's data is split into typed segments per the header's
    /// entry-layout descriptor and formatted; members are joined with
    /// `<br><br>`.
    pub fn definitions(&self, lemma: &str) -> Result<Option<String>> {
        let run = self.homograph_run(lemma)?;
        if run.is_empty() {
            return Ok(None);
        }
        let mut rendered = Vec::with_capacity(run.len());
        for entry in &run {
            let raw = self.read_entry_data(entry)?;
            rendered.push(content::render(
                &raw,
                self.metadata.same_type_sequence.as_deref(),
            )?);
        }
        Ok(Some(rendered.join(RENDERED_SEPARATOR)))
    }

    /// Entries whose lemmas start with `prefix`, in index order.
    ///
    /// The ASCII-only case fold of the index order cannot normalize
    /// non-ASCII case, so a prefix containing non-ASCII letters is searched
    /// in its literal, lowercase, uppercase and title-case variants and the
    /// results merged without duplicates. Each variant's run is capped at
    /// [`MAX_SUGGESTIONS`].
    pub fn suggestions(&self, prefix: &str) -> Result<Vec<IndexEntry>> {
        let mut finder = self.finder()?;
        let mut result = Vec::new();
        let mut seen: HashSet<(String, u64)> = HashSet::new();
        for variant in prefix_variations(prefix) {
            while let Some(entry) = finder.next_suggestion(&variant)? {
                if seen.insert((entry.lemma().to_string(), entry.data_offset())) {
                    result.push(entry);
                }
            }
        }
        Ok(result)
    }
}

/// The case variants of a prefix that could match index entries the ASCII
/// fold alone cannot reach. Pure-ASCII prefixes need only themselves.
fn prefix_variations(prefix: &str) -> Vec<String> {
    if prefix.is_ascii() {
        return vec![prefix.to_string()];
    }
    let mut variants = vec![prefix.to_string()];
    for candidate in [
        prefix.to_lowercase(),
        prefix.to_uppercase(),
        capitalize_words(prefix),
    ] {
        if candidate != prefix && !variants.contains(&candidate) {
            variants.push(candidate);
        }
    }
    variants
}

/// Lowercase the string, then uppercase the first letter of every word.
fn capitalize_words(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_is_letter = false;
    for c in s.to_lowercase().chars() {
        if c.is_alphabetic() {
            if prev_is_letter {
                out.push(c);
            } else {
                out.extend(c.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            out.push(c);
            prev_is_letter = false;
        }
    }
    out
}
