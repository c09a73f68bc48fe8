// Segmenter
// Splits normalized document text into fixed-size, character-counted windows

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SegmentError {
    #[error("maximum segment length must be positive, got {0}")]
    InvalidMaxLength(usize),
}

/// A contiguous slice of the document. Offsets and lengths are in Unicode
/// scalar values, never bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub index: usize,
    pub char_start: usize,
    pub char_len: usize,
    pub text: String,
}

/// Lazy iterator over the segments of a text.
#[derive(Debug, Clone)]
pub struct Segments<'a> {
    rest: &'a str,
    max_chars: usize,
    index: usize,
    char_offset: usize,
}

impl<'a> Iterator for Segments<'a> {
    type Item = Segment;

    fn next(&mut self) -> Option<Segment> {
        if self.rest.is_empty() {
            return None;
        }

        let (split_at, char_len) = match self.rest.char_indices().nth(self.max_chars) {
            Some((byte_idx, _)) => (byte_idx, self.max_chars),
            None => (self.rest.len(), self.rest.chars().count()),
        };
        let (head, tail) = self.rest.split_at(split_at);

        let segment = Segment {
            index: self.index,
            char_start: self.char_offset,
            char_len,
            text: head.to_string(),
        };

        self.rest = tail;
        self.index += 1;
        self.char_offset += char_len;
        Some(segment)
    }
}

/// Iterate over `text` in windows of `max_chars` characters. The last window
/// may be shorter; empty text yields nothing.
pub fn segments(text: &str, max_chars: usize) -> Result<Segments<'_>, SegmentError> {
    if max_chars == 0 {
        return Err(SegmentError::InvalidMaxLength(max_chars));
    }
    Ok(Segments {
        rest: text,
        max_chars,
        index: 0,
        char_offset: 0,
    })
}

/// Eager form of [`segments`].
pub fn split_text(text: &str, max_chars: usize) -> Result<Vec<Segment>, SegmentError> {
    Ok(segments(text, max_chars)?.collect())
}

/// ceil(char_count / max_chars)
pub fn expected_segment_count(char_count: usize, max_chars: usize) -> usize {
    if max_chars == 0 {
        return 0;
    }
    char_count.div_ceil(max_chars)
}
