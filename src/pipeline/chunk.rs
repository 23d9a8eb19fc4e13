//! Fixed-size chunking of the combined dossier text.
//!
//! Chunks are measured in characters (Unicode scalar values), not bytes, and
//! carry no awareness of words or sentences: a chunk may end mid-word. Every
//! chunk borrows from the input, so concatenating them reproduces it exactly.

/// Default chunk size for general use.
pub const DEFAULT_CHUNK_CHARS: usize = 2000;

/// Chunk size used when submitting text for review.
pub const REVIEW_CHUNK_CHARS: usize = 3000;

/// Split `text` into contiguous slices of at most `max_chars` characters.
///
/// The last chunk may be shorter. An empty input yields no chunks. A
/// `max_chars` of zero is treated as one.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<&str> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::with_capacity(text.len() / max_chars + 1);
    let mut rest = text;

    while !rest.is_empty() {
        let split = rest
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let (head, tail) = rest.split_at(split);
        chunks.push(head);
        rest = tail;
    }

    chunks
}
