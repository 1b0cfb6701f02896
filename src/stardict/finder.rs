//! Binary and prefix search over the ordinal index

use std::cmp::Ordering;

use log::trace;

use super::entry::{IndexEntry, MatchMode};
use super::error::{DictError, Result};
use super::ordinals::OrdinalIndex;

/// Maximum number of suggestions returned for one prefix.
pub const MAX_SUGGESTIONS: u32 = 40;

/// A single search session over one dictionary's indexes.
///
/// The finder carries mutable cursor state (the last visited ordinal, the
/// cached prefix and the count of suggestions already returned), so one
/// instance serves one caller at a time; concurrent queries each take their
/// own session. Underlying I/O and format failures are wrapped in
/// `DictError::Lookup`; "nothing matched" is an absent result, never an
/// error.
pub struct EntryFinder<'a> {
    ordinals: &'a OrdinalIndex,
    book_name: &'a str,
    size: u64,
    cursor: Option<u64>,
    matches_returned: u32,
    last_prefix: Option<String>,
}

impl<'a> EntryFinder<'a> {
    pub fn new(ordinals: &'a OrdinalIndex, book_name: &'a str) -> Result<Self> {
        let size = ordinals
            .len()
            .map_err(|e| wrap(book_name, e))?;
        Ok(Self {
            ordinals,
            book_name,
            size,
            cursor: None,
            matches_returned: 0,
            last_prefix: None,
        })
    }

    /// Number of entries visible to this session.
    pub fn size(&self) -> u64 {
        self.size
    }

    fn entry_at(&self, ordinal: u64) -> Result<Option<IndexEntry>> {
        self.ordinals
            .entry_at(ordinal)
            .map_err(|e| wrap(self.book_name, e))
    }

    /// Binary-search for an exact word match.
    ///
    /// On a hit the cursor is left on the *first* entry of the homograph run
    /// (distinct dictionaries legitimately store the same headword several
    /// times with different parts of speech), so `next_entry` walks the rest
    /// of the run in file order. Returns `Ok(None)` when the word is absent.
    pub fn find_word(&mut self, lemma: &str) -> Result<Option<IndexEntry>> {
        let (mut lo, mut hi) = (0u64, self.size);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let Some(entry) = self.entry_at(mid)? else {
                // The ordinal index claims more entries than it resolves;
                // treat the stale tail as no match, like a miss.
                return Ok(None);
            };
            match entry.compare_to(lemma, MatchMode::Word) {
                Ordering::Equal => {
                    trace!("`{}` hit at ordinal {}", lemma, mid);
                    return self.rewind_to_run_start(lemma, mid, entry).map(Some);
                }
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
            }
        }
        Ok(None)
    }

    /// Walk backward from a hit to the lowest ordinal still matching.
    fn rewind_to_run_start(
        &mut self,
        lemma: &str,
        hit: u64,
        hit_entry: IndexEntry,
    ) -> Result<IndexEntry> {
        let mut first = hit;
        let mut entry = hit_entry;
        while first > 0 {
            match self.entry_at(first - 1)? {
                Some(prev) if prev.compare_to(lemma, MatchMode::Word) == Ordering::Equal => {
                    first -= 1;
                    entry = prev;
                }
                _ => break,
            }
        }
        self.cursor = Some(first);
        Ok(entry)
    }

    /// Advance the cursor and return the entry there, or `Ok(None)` at the
    /// end of the index.
    pub fn next_entry(&mut self) -> Result<Option<IndexEntry>> {
        let next = self.cursor.map_or(0, |c| c + 1);
        if next >= self.size {
            return Ok(None);
        }
        match self.entry_at(next)? {
            Some(entry) => {
                self.cursor = Some(next);
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    /// Return the next entry matching `prefix`, restarting the search when
    /// the prefix differs from the previous call's.
    ///
    /// The first call for a prefix binary-searches for the leftmost match;
    /// repeated calls with the same prefix walk forward through the match
    /// run until it ends or `MAX_SUGGESTIONS` entries have been returned.
    /// Callers cancel a run by simply not calling again.
    pub fn next_suggestion(&mut self, prefix: &str) -> Result<Option<IndexEntry>> {
        if self.last_prefix.as_deref() != Some(prefix) {
            self.last_prefix = Some(prefix.to_string());
            self.matches_returned = 0;
            let found = self.find_first_prefix_match(prefix)?;
            if found.is_some() {
                self.matches_returned = 1;
            }
            return Ok(found);
        }
        if self.matches_returned >= MAX_SUGGESTIONS {
            return Ok(None);
        }
        let next = self.cursor.map_or(0, |c| c + 1);
        if next >= self.size {
            return Ok(None);
        }
        let Some(entry) = self.entry_at(next)? else {
            return Ok(None);
        };
        if entry.compare_to(prefix, MatchMode::Prefix) == Ordering::Equal {
            self.cursor = Some(next);
            self.matches_returned += 1;
            Ok(Some(entry))
        } else {
            // Leave the cursor on the last match; the run is over.
            Ok(None)
        }
    }

    /// Leftmost binary search in prefix mode.
    ///
    /// Prefix equality is not a total-order point but a contiguous band, so
    /// the search keeps narrowing toward the low side on every hit until the
    /// band's first member is isolated.
    fn find_first_prefix_match(&mut self, prefix: &str) -> Result<Option<IndexEntry>> {
        let (mut lo, mut hi) = (0u64, self.size);
        let mut result = None;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let Some(entry) = self.entry_at(mid)? else {
                return Ok(None);
            };
            match entry.compare_to(prefix, MatchMode::Prefix) {
                Ordering::Equal => {
                    self.cursor = Some(mid);
                    result = Some(entry);
                    hi = mid;
                }
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
            }
        }
        Ok(result)
    }
}

fn wrap(book_name: &str, source: DictError) -> DictError {
    DictError::Lookup {
        book: book_name.to_string(),
        source: Box::new(source),
    }
}
