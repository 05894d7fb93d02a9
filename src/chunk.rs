//! Boundary-preferring text chunker with fixed overlap.
//!
//! Splits extracted document text into [`Chunk`]s of at most `chunk_size`
//! characters. Consecutive chunks share exactly `overlap` characters, so
//! dropping the first `overlap` characters of every chunk after the first
//! and concatenating reproduces the source text (see [`reassemble`]).
//!
//! # Algorithm
//!
//! 1. If the remaining text fits in `chunk_size`, emit it as the final chunk.
//! 2. Otherwise look for a split point in the window
//!    `[start + overlap + min_advance, start + chunk_size]`, where
//!    `min_advance = max(1, (chunk_size - overlap) / 2)`.
//! 3. Try separators from coarsest to finest (paragraph, line, sentence,
//!    word). The last occurrence of the first separator found in the window
//!    wins; the separator stays at the end of the earlier chunk.
//! 4. If no separator occurs in the window, cut at `start + chunk_size`.
//! 5. The next chunk starts `overlap` characters before the cut.
//!
//! Sizes are measured in `char`s, so cuts never split a UTF-8 sequence.
//!
//! # Example
//!
//! ```rust
//! use quiz_rag::chunk::{chunk_text, reassemble, ChunkingParams};
//!
//! let params = ChunkingParams::new(20, 5);
//! let text = "First paragraph here.\n\nSecond paragraph follows.";
//! let chunks = chunk_text(text, &params).unwrap();
//! assert!(chunks.iter().all(|c| c.char_len() <= 20));
//! assert_eq!(reassemble(&chunks, 5), text);
//! ```

use serde::Serialize;

use crate::config::ChunkingConfig;
use crate::error::RetrievalError;

/// Split boundaries, coarsest first.
const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", "! ", "? ", " "];

/// Size and overlap of produced chunks, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingParams {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl ChunkingParams {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
        }
    }

    /// Rejects configurations that cannot make forward progress.
    pub fn validate(&self) -> Result<(), RetrievalError> {
        if self.chunk_size == 0 {
            return Err(RetrievalError::Chunking {
                message: "chunk_size must be > 0".to_string(),
            });
        }
        if self.overlap >= self.chunk_size {
            return Err(RetrievalError::Chunking {
                message: format!(
                    "overlap ({}) must be smaller than chunk_size ({})",
                    self.overlap, self.chunk_size
                ),
            });
        }
        Ok(())
    }
}

impl From<&ChunkingConfig> for ChunkingParams {
    fn from(config: &ChunkingConfig) -> Self {
        Self::new(config.chunk_size, config.overlap)
    }
}

/// A contiguous, immutable slice of the source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// Position in the chunk sequence, starting at 0.
    pub index: usize,
    /// Offset of the first character within the source text, in chars.
    pub start: usize,
    pub text: String,
}

impl Chunk {
    /// Length of the chunk in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Char offset one past the last character of the chunk.
    pub fn end(&self) -> usize {
        self.start + self.char_len()
    }
}

/// Split `text` into overlapping chunks.
///
/// Returns an empty vector for empty input. Fails only when `params` is
/// invalid.
pub fn chunk_text(text: &str, params: &ChunkingParams) -> Result<Vec<Chunk>, RetrievalError> {
    params.validate()?;

    if text.is_empty() {
        return Ok(Vec::new());
    }

    // Byte offset of every char, plus a trailing sentinel at text.len().
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let total = offsets.len() - 1;
    let min_advance = ((params.chunk_size - params.overlap) / 2).max(1);

    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let end = if total - start <= params.chunk_size {
            total
        } else {
            let lo = start + params.overlap + min_advance;
            let hi = start + params.chunk_size;
            find_split(text, &offsets, lo, hi, SEPARATORS)
        };

        chunks.push(Chunk {
            index: chunks.len(),
            start,
            text: text[offsets[start]..offsets[end]].to_string(),
        });

        if end == total {
            break;
        }
        start = end - params.overlap;
    }

    Ok(chunks)
}

/// Find a char index in `[lo, hi]` to cut at, trying `separators` in order.
///
/// Falls back to `hi` once every separator has been tried.
fn find_split(text: &str, offsets: &[usize], lo: usize, hi: usize, separators: &[&str]) -> usize {
    let Some((separator, finer)) = separators.split_first() else {
        return hi;
    };

    // Separators are ASCII, so their char length equals their byte length.
    let from = offsets[lo.saturating_sub(separator.len())];
    let haystack = &text[from..offsets[hi]];

    if let Some(pos) = haystack.rfind(separator) {
        let split_byte = from + pos + separator.len();
        if let Ok(split) = offsets.binary_search(&split_byte) {
            if split >= lo {
                return split;
            }
        }
    }

    find_split(text, offsets, lo, hi, finer)
}

/// Rebuild the source text from chunks produced with the given `overlap`.
pub fn reassemble(chunks: &[Chunk], overlap: usize) -> String {
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
