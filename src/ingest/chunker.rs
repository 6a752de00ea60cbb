//! Recursive text splitting
//!
//! Text is split on the coarsest separator present in it ("\n\n", then
//! "\n", ". ", " ", and finally single characters). Pieces that are still
//! too long are split again with the finer separators; short pieces are
//! merged greedily back up to `chunk_size` characters, carrying the last
//! `chunk_overlap` characters over into the next chunk.

use std::collections::VecDeque;

use crate::error::{DeskError, Result};

/// Separators tried from coarsest to finest
pub const DEFAULT_SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

/// Recursive character splitter
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(DeskError::InvalidInput(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(DeskError::InvalidInput(
                "chunk_overlap must be less than chunk_size".to_string(),
            ));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split `text` into trimmed, non-empty chunks of at most `chunk_size` chars
    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with(text, &self.separators)
    }

    fn split_with(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut finer: &[String] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = "";
                break;
            }
            if text.contains(sep.as_str()) {
                separator = sep;
                finer = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut pending: Vec<String> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(&piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }

            if !pending.is_empty() {
                chunks.extend(self.merge(&pending));
                pending.clear();
            }

            if finer.is_empty() {
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    chunks.push(trimmed.to_string());
                }
            } else {
                chunks.extend(self.split_with(&piece, finer));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge(&pending));
        }

        chunks
    }

    /// Greedily join adjacent pieces, keeping a tail of up to `chunk_overlap`
    fn merge(&self, pieces: &[String]) -> Vec<String> {
        let mut out = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);

            if total + len > self.chunk_size && !window.is_empty() {
                push_joined(&mut out, &window);

                while total > self.chunk_overlap
                    || (total + len > self.chunk_size && total > 0)
                {
                    match window.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }

            window.push_back(piece);
            total += len;
        }

        push_joined(&mut out, &window);
        out
    }
}

fn push_joined(out: &mut Vec<String>, window: &VecDeque<&str>) {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

/// Split on `separator`, re-attaching it to the start of each following piece
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }

    let mut parts = text.split(separator);
    let mut out = Vec::new();
    if let Some(first) = parts.next() {
        if !first.is_empty() {
            out.push(first.to_string());
        }
    }
    for part in parts {
        out.push(format!("{}{}", separator, part));
    }
    out
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split with a fresh splitter; invalid sizes yield no chunks
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    match TextSplitter::new(chunk_size, chunk_overlap) {
        Ok(splitter) => splitter.split(text),
        Err(_) => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = split_text("Refunds are processed within 5 days.", 1000, 150);
        assert_eq!(chunks, vec!["Refunds are processed within 5 days."]);
    }

    #[test]
    fn test_empty_text() {
        assert!(split_text("", 100, 10).is_empty());
        assert!(split_text("   \n\n  ", 100, 10).is_empty());
    }

    #[test]
    fn test_paragraphs_preferred() {
        let text = format!("{}\n\n{}", "a".repeat(60), "b".repeat(60));
        let chunks = split_text(&text, 100, 0);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "a".repeat(60));
        assert_eq!(chunks[1], "b".repeat(60));
    }

    #[test]
    fn test_chunks_never_exceed_size() {
        let text = "word ".repeat(500) + &"x".repeat(250);
        for chunk in split_text(&text, 100, 20) {
            assert!(chunk.chars().count() <= 100, "chunk too long: {}", chunk.len());
        }
    }

    #[test]
    fn test_overlap_carries_tail() {
        let text = (0..40).map(|i| format!("w{:02}", i)).collect::<Vec<_>>().join(" ");
        let chunks = split_text(&text, 40, 12);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let last_word = pair[0].split(' ').last().unwrap();
            assert!(pair[1].contains(last_word), "{:?}", pair);
        }
    }

    #[test]
    fn test_multibyte_text() {
        let text = "é".repeat(30);
        let chunks = split_text(&text, 10, 2);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        assert!(!chunks.is_empty());
    }

    #[test]
    fn test_invalid_sizes() {
        assert!(TextSplitter::new(0, 0).is_err());
        assert!(TextSplitter::new(100, 100).is_err());
        assert!(split_text("text", 10, 10).is_empty());
    }
}
