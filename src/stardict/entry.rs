//! Index entries and the comparison rules that order them

use std::cmp::Ordering;

use super::error::{DictError, Result};

/// Comparison mode for index searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Compare whole lemmas. ASCII case differences are ignored first and
    /// only break ties, so case variants of a word sort together.
    Word,
    /// Compare only up to the query length, ignoring ASCII case. Equality
    /// means "the query is an ASCII-case-insensitive prefix of the lemma".
    Prefix,
}

impl TryFrom<u8> for MatchMode {
    type Error = DictError;
    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Self::Word),
            2 => Ok(Self::Prefix),
            _ => Err(DictError::InvalidArgument(format!("unknown match mode: {}", value))),
        }
    }
}

/// A single record of the `.idx` file: a lemma plus the location of its data
/// in the uncompressed `.dict` stream.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    lemma: String,
    data_offset: u64,
    data_size: u32,
    record_len: usize,
}

impl IndexEntry {
    pub fn new(lemma: String, data_offset: u64, data_size: u32, record_len: usize) -> Self {
        Self {
            lemma,
            data_offset,
            data_size,
            record_len,
        }
    }

    /// The headword string under which this entry is filed.
    pub fn lemma(&self) -> &str {
        &self.lemma
    }

    /// Offset of the entry's data in the uncompressed `.dict` stream.
    pub fn data_offset(&self) -> u64 {
        self.data_offset
    }

    /// Size in bytes of the entry's data.
    pub fn data_size(&self) -> u32 {
        self.data_size
    }

    /// Byte length of this entry's own `.idx` record, used for
    /// index-scanning arithmetic only.
    pub fn record_len(&self) -> usize {
        self.record_len
    }

    /// Compare this entry's lemma against a query string in the given mode.
    ///
    /// In `Word` mode the comparison is ASCII-case-insensitive with an exact
    /// comparison as the tie-break, which yields a total order. In `Prefix`
    /// mode the lemma is truncated to the query's character count first and
    /// no tie-break is applied, so equality is terminal: every lemma the
    /// query is an ASCII-case-insensitive prefix of compares equal, which is
    /// what lets the search find a contiguous run of matches.
    pub fn compare_to(&self, query: &str, mode: MatchMode) -> Ordering {
        match mode {
            MatchMode::Word => compare_word(&self.lemma, query),
            MatchMode::Prefix => compare_prefix(&self.lemma, query),
        }
    }
}

/// Identity is (lemma, offset, size); the record length is bookkeeping.
impl PartialEq for IndexEntry {
    fn eq(&self, other: &Self) -> bool {
        self.lemma == other.lemma
            && self.data_offset == other.data_offset
            && self.data_size == other.data_size
    }
}

impl Eq for IndexEntry {}

/// Whole-word comparison: ASCII-case-insensitive first, exact code-point
/// order as the tie-break.
pub(crate) fn compare_word(lemma: &str, query: &str) -> Ordering {
    match ascii_fold_cmp(lemma.chars(), query.chars()) {
        Ordering::Equal => lemma.cmp(query),
        other => other,
    }
}

/// Prefix comparison: the lemma truncated to the query's character count
/// (or taken whole if shorter), compared ASCII-case-insensitively.
pub(crate) fn compare_prefix(lemma: &str, query: &str) -> Ordering {
    let query_len = query.chars().count();
    ascii_fold_cmp(lemma.chars().take(query_len), query.chars())
}

/// Lexicographic comparison folding the case of ASCII characters only.
///
/// Non-ASCII code points compare raw and case-sensitively, mimicking glib's
/// `g_ascii_strcasecmp` that orders stock StarDict index files. Differences
/// are ranked by the lowercase forms, so `_` sorts between `Z` and `a` the
/// same way glib ranks it.
fn ascii_fold_cmp(
    mut a: impl Iterator<Item = char>,
    mut b: impl Iterator<Item = char>,
) -> Ordering {
    loop {
        match (a.next(), b.next()) {
            (Some(c1), Some(c2)) => {
                if c1 == c2 {
                    continue;
                }
                if !c1.is_ascii() || !c2.is_ascii() {
                    return c1.cmp(&c2);
                }
                if c1.to_ascii_uppercase() != c2.to_ascii_uppercase() {
                    let l1 = c1.to_ascii_lowercase();
                    let l2 = c2.to_ascii_lowercase();
                    if l1 != l2 {
                        return l1.cmp(&l2);
                    }
                }
            }
            (Some(_), None) => return Ordering::Greater,
            (None, Some(_)) => return Ordering::Less,
            (None, None) => return Ordering::Equal,
        }
    }
}
