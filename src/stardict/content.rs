//! Typed content segments of a dictionary entry
//!
//! Entry data in the `.dict` stream is a sequence of typed fields. How the
//! fields are delimited depends on the header's `sametypesequence`
//! descriptor:
//!
//! - absent: each field is `{ type tag byte, payload }`, lowercase tags
//!   carrying a null-terminated payload and uppercase tags a 4-byte
//!   big-endian size prefix;
//! - one character: the whole buffer is a single field of that type;
//! - several characters: the buffer holds exactly that sequence of fields
//!   with the tags omitted, and the last field's terminator or size marker
//!   is omitted too (it runs to the end of the buffer).

use byteorder::{BigEndian, ByteOrder};

use super::error::{DictError, Result};

/// One typed field of an entry's data.
#[derive(Debug, PartialEq, Eq)]
pub struct Segment<'a> {
    pub type_tag: char,
    pub payload: &'a [u8],
}

/// Split raw entry bytes into typed segments.
///
/// # Errors
/// `InvalidFormat` when a non-final field is missing its terminator or a
/// size-prefixed field runs past the end of the buffer.
pub fn split_segments<'a>(
    data: &'a [u8],
    same_type_sequence: Option<&str>,
) -> Result<Vec<Segment<'a>>> {
    match same_type_sequence {
        None | Some("") => split_tagged(data),
        Some(sequence) => split_sequenced(data, sequence),
    }
}

/// Heterogeneous entries carry their own type tags.
fn split_tagged(data: &[u8]) -> Result<Vec<Segment<'_>>> {
    let mut segments = Vec::new();
    let mut rest = data;
    while let Some((&tag, after_tag)) = rest.split_first() {
        let type_tag = char::from(tag);
        let (payload, remaining) = take_field(after_tag, type_tag, false)?;
        segments.push(Segment { type_tag, payload });
        rest = remaining;
    }
    Ok(segments)
}

/// Homogeneous entries take their tags from the descriptor instead.
fn split_sequenced<'a>(data: &'a [u8], sequence: &str) -> Result<Vec<Segment<'a>>> {
    let mut segments = Vec::new();
    let mut rest = data;
    let mut tags = sequence.chars().peekable();
    while let Some(type_tag) = tags.next() {
        let is_last = tags.peek().is_none();
        let (payload, remaining) = take_field(rest, type_tag, is_last)?;
        segments.push(Segment { type_tag, payload });
        rest = remaining;
    }
    Ok(segments)
}

/// Consume one field's payload. Lowercase tags are null-terminated strings,
/// uppercase tags are size-prefixed blobs; the final field of a sequenced
/// entry has neither and takes the rest of the buffer.
fn take_field<'a>(data: &'a [u8], type_tag: char, is_last: bool) -> Result<(&'a [u8], &'a [u8])> {
    if is_last {
        return Ok((data, &data[data.len()..]));
    }
    if type_tag.is_ascii_uppercase() {
        if data.len() < 4 {
            return Err(DictError::InvalidFormat(format!(
                "field `{}` is missing its size prefix",
                type_tag
            )));
        }
        let size = BigEndian::read_u32(&data[..4]) as usize;
        let payload = data.get(4..4 + size).ok_or_else(|| {
            DictError::InvalidFormat(format!(
                "field `{}` declares {} bytes but only {} remain",
                type_tag,
                size,
                data.len() - 4
            ))
        })?;
        Ok((payload, &data[4 + size..]))
    } else {
        match data.iter().position(|&b| b == 0) {
            Some(end) => Ok((&data[..end], &data[end + 1..])),
            // Tolerated: writers routinely drop the very last terminator.
            None => Ok((data, &data[data.len()..])),
        }
    }
}

/// Format one segment for display.
///
/// The mapping from a type tag to its formatting strategy is stable data, so
/// it lives in a plain match rather than any registry. Text-like tags decode
/// as UTF-8; binary media tags have no textual rendition and collapse to a
/// placeholder. The engine never interprets the markup itself.
pub fn format_segment(segment: &Segment<'_>) -> String {
    match segment.type_tag {
        'm' | 'l' | 'g' | 't' | 'x' | 'y' | 'k' | 'w' | 'h' | 'n' => {
            String::from_utf8_lossy(segment.payload).into_owned()
        }
        'W' => "[audio]".to_string(),
        'P' => "[picture]".to_string(),
        other => format!("[{} data]", other),
    }
}

/// Split and format a whole entry.
pub fn render(data: &[u8], same_type_sequence: Option<&str>) -> Result<String> {
    let segments = split_segments(data, same_type_sequence)?;
    Ok(segments.iter().map(format_segment).collect())
}
