//! Fixed-size sliding-window text chunker.
//!
//! Splits extracted text into windows of exactly `chunk_size` characters,
//! each subsequent window starting `chunk_size - overlap` characters after
//! the previous one, so adjacent chunks share exactly `overlap` characters.
//! The final chunk is whatever remains and may be shorter.
//!
//! This is a pure transformation: same input, same chunks, no state. Each
//! chunk carries its character offsets and a SHA-256 hash of its text.

use sha2::{Digest, Sha256};

use crate::models::Chunk;

/// Split `text` into overlapping character windows.
///
/// `overlap` must be strictly less than `chunk_size` (validated in config).
/// Text no longer than `chunk_size` produces exactly one chunk. For longer
/// text the chunk count is `ceil((len - overlap) / (chunk_size - overlap))`.
///
/// Offsets and sizes are measured in characters, not bytes, so multi-byte
/// text never splits inside a code point.
pub fn chunk_text(document_id: &str, text: &str, chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    assert!(overlap < chunk_size, "overlap must be < chunk_size");

    // Byte offset of every char boundary, plus the end of the text.
    let mut boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    boundaries.push(text.len());
    let n_chars = boundaries.len() - 1;

    if n_chars <= chunk_size {
        return vec![make_chunk(document_id, 0, text, 0, n_chars)];
    }

    let stride = chunk_size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut index = 0usize;

    while start + chunk_size < n_chars {
        let piece = &text[boundaries[start]..boundaries[start + chunk_size]];
        chunks.push(make_chunk(document_id, index, piece, start, start + chunk_size));
        index += 1;
        start += stride;
    }

    // Final, possibly short, chunk.
    let piece = &text[boundaries[start]..];
    chunks.push(make_chunk(document_id, index, piece, start, n_chars));

    chunks
}

fn make_chunk(document_id: &str, index: usize, text: &str, start: usize, end: usize) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        document_id: document_id.to_string(),
        index,
        text: text.to_string(),
        start,
        end,
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reassemble the original text from each chunk's unique span: the
    /// whole first chunk, then everything past the overlap of each later one.
    fn reconstruct(chunks: &[Chunk], overlap: usize) -> String {
        let mut out = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            if i == 0 {
                out.push_str(&chunk.text);
            } else {
                out.extend(chunk.text.chars().skip(overlap));
            }
        }
        out
    }

    fn sample_text(chars: usize) -> String {
        // Repeating but position-dependent content, so overlap mistakes show.
        (0..chars)
            .map(|i| char::from(b'a' + (i % 23) as u8))
            .collect()
    }

    #[test]
    fn short_text_single_chunk() {
        let chunks = chunk_text("doc1", "tiny", 1000, 200);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].text, "tiny");
        assert_eq!((chunks[0].start, chunks[0].end), (0, 4));
    }

    #[test]
    fn text_exactly_chunk_size_is_one_chunk() {
        let text = sample_text(1000);
        let chunks = chunk_text("doc1", &text, 1000, 200);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn count_matches_formula() {
        for (len, size, overlap) in [
            (2600usize, 1000usize, 200usize),
            (2500, 1000, 200),
            (1001, 1000, 200),
            (5000, 700, 80),
            (10_000, 1000, 999),
        ] {
            let text = sample_text(len);
            let chunks = chunk_text("doc1", &text, size, overlap);
            let expected = (len - overlap).div_ceil(size - overlap);
            assert_eq!(
                chunks.len(),
                expected,
                "len={len} size={size} overlap={overlap}"
            );
        }
    }

    #[test]
    fn adjacent_chunks_share_exactly_the_overlap() {
        let text = sample_text(2600);
        let chunks = chunk_text("doc1", &text, 1000, 200);
        for pair in chunks.windows(2) {
            let tail: String = pair[0]
                .text
                .chars()
                .skip(pair[0].text.chars().count() - 200)
                .collect();
            let head: String = pair[1].text.chars().take(200).collect();
            assert_eq!(tail, head);
        }
    }

    #[test]
    fn unique_spans_reconstruct_original() {
        for (len, size, overlap) in [
            (2600usize, 1000usize, 200usize),
            (2500, 1000, 200),
            (431, 100, 37),
            (100, 1000, 200),
            (3, 2, 1),
        ] {
            let text = sample_text(len);
            let chunks = chunk_text("doc1", &text, size, overlap);
            assert_eq!(reconstruct(&chunks, overlap), text);
        }
    }

    #[test]
    fn multibyte_text_reconstructs() {
        let text: String = "αβγδε ζηθικ λμνξο ".repeat(80);
        let chunks = chunk_text("doc1", &text, 100, 30);
        assert_eq!(reconstruct(&chunks, 30), text);
        for chunk in &chunks[..chunks.len() - 1] {
            assert_eq!(chunk.text.chars().count(), 100);
        }
    }

    #[test]
    fn indices_contiguous_and_offsets_consistent() {
        let text = sample_text(4321);
        let chunks = chunk_text("doc1", &text, 500, 125);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
            assert_eq!(chunk.end - chunk.start, chunk.text.chars().count());
        }
        assert_eq!(chunks.last().unwrap().end, 4321);
    }

    #[test]
    fn deterministic_across_calls() {
        let text = sample_text(2600);
        let first = chunk_text("doc1", &text, 1000, 200);
        let second = chunk_text("doc1", &text, 1000, 200);
        assert_eq!(first, second);
    }
}
