//! Char-offset helpers.
//!
//! Findings address text by Unicode scalar offsets, while `str` slicing and
//! `regex` matches work in bytes. These helpers are the only place the two
//! are converted.

/// Number of chars in `text`.
#[must_use]
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Convert a char offset into a byte offset.
///
/// `char_idx == char_len(text)` maps to `text.len()`. Returns `None` past the end.
#[must_use]
pub fn char_to_byte(text: &str, char_idx: usize) -> Option<usize> {
    if char_idx == 0 {
        return Some(0);
    }
    let mut count = 0;
    for (byte_idx, _) in text.char_indices() {
        if count == char_idx {
            return Some(byte_idx);
        }
        count += 1;
    }
    (count == char_idx).then_some(text.len())
}

/// Convert a byte offset (on a char boundary) into a char offset.
#[must_use]
pub fn byte_to_char(text: &str, byte_idx: usize) -> usize {
    text[..byte_idx.min(text.len())].chars().count()
}

/// Slice `text` by char offsets `[start, end)`.
#[must_use]
pub fn slice_chars(text: &str, start: usize, end: usize) -> Option<&str> {
    if start > end {
        return None;
    }
    let from = char_to_byte(text, start)?;
    let to = char_to_byte(text, end)?;
    text.get(from..to)
}

/// Locate `needle` in `haystack`, searching from char offset `from` first and
/// then from the beginning. Returns the char span of the occurrence.
#[must_use]
pub fn locate(haystack: &str, needle: &str, from: usize) -> Option<(usize, usize)> {
    find_from(haystack, needle, from).or_else(|| find_from(haystack, needle, 0))
}

/// First occurrence of `needle` starting at or after char offset `from`.
#[must_use]
pub fn find_from(haystack: &str, needle: &str, from: usize) -> Option<(usize, usize)> {
    if needle.is_empty() {
        return None;
    }
    let byte_from = char_to_byte(haystack, from)?;
    let byte_start = byte_from + haystack[byte_from..].find(needle)?;
    let start = byte_to_char(haystack, byte_start);
    Some((start, start + char_len(needle)))
}
