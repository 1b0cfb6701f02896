//! # stardict-reader
//!
//! A reader for StarDict dictionary archives: the `.ifo` metadata header,
//! the sorted `.idx` word index and the dictzip-compressed `.dict.dz` data
//! file. Lookups are random-access: a lazily-built fixed-width side index
//! (`.sparkidx`) makes the variable-length word index binary-searchable, and
//! the data file's chunk table lets one entry be decompressed without
//! inflating the whole archive.
pub mod stardict;

// Re-export the main types for convenience
pub use stardict::{
    content, DictError, DictMetadata, DictZip, Dictionary, EntryFinder, IndexEntry, MatchMode,
    OffsetBits, OrdinalIndex, Result, WordIndex, DEFAULT_PROGRESS_WINDOW, MAX_SUGGESTIONS,
};
