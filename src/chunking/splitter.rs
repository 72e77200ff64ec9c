use crate::{Error, Result};
use regex::Regex;
use std::sync::OnceLock;

/// Word-count windows of `size` words advancing by `size - overlap`
#[derive(Debug, Clone, Copy)]
pub struct FixedSplitter {
    size: usize,
    overlap: usize,
}

impl FixedSplitter {
    pub fn new(size: usize, overlap: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::Validation("chunk size must be positive".to_string()));
        }
        if overlap >= size {
            return Err(Error::Validation(format!(
                "overlap ({overlap}) must be less than chunk size ({size})"
            )));
        }
        Ok(Self { size, overlap })
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        let words: Vec<&str> = text.split_whitespace().collect();
        windows(&words, self.size, self.size - self.overlap)
            .map(|window| window.join(" "))
            .collect()
    }
}

/// Windows of up to `max_chunk_size` sentences advancing by `max_chunk_size - overlap`
#[derive(Debug, Clone, Copy)]
pub struct SentenceSplitter {
    max_chunk_size: usize,
    overlap: usize,
}

impl SentenceSplitter {
    pub fn new(max_chunk_size: usize, overlap: usize) -> Result<Self> {
        if max_chunk_size == 0 {
            return Err(Error::Validation(
                "max chunk size must be positive".to_string(),
            ));
        }
        if overlap >= max_chunk_size {
            return Err(Error::Validation(format!(
                "overlap ({overlap}) must be less than max chunk size ({max_chunk_size})"
            )));
        }
        Ok(Self {
            max_chunk_size,
            overlap,
        })
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        let sentences = split_sentences(text);
        let step = self.max_chunk_size - self.overlap;

        let mut chunks: Vec<String> = Vec::new();
        let mut start = 0;
        while start < sentences.len() {
            let end = (start + self.max_chunk_size).min(sentences.len());
            let window = &sentences[start..end];

            // a tail made only of overlap sentences repeats the previous chunk
            if !chunks.is_empty() && window.len() <= self.overlap {
                break;
            }

            let joined = window.join(" ");
            let joined = joined.trim();
            if !joined.is_empty() {
                chunks.push(joined.to_string());
            }
            start += step;
        }

        chunks
    }
}

fn windows<'a, T>(items: &'a [T], size: usize, step: usize) -> impl Iterator<Item = &'a [T]> + 'a {
    let mut start = 0;
    let mut done = items.is_empty();
    std::iter::from_fn(move || {
        if done {
            return None;
        }
        let end = (start + size).min(items.len());
        let window = &items[start..end];
        if end == items.len() {
            done = true;
        }
        start += step;
        Some(window)
    })
}

fn sentence_boundary() -> &'static Regex {
    static BOUNDARY: OnceLock<Regex> = OnceLock::new();
    BOUNDARY.get_or_init(|| Regex::new(r"[.!?]\s+").expect("sentence boundary pattern is valid"))
}

/// Splits at `.`, `!` or `?` followed by whitespace; the punctuation stays
/// with the sentence it ends.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let mut sentences = Vec::new();
    let mut start = 0;
    for boundary in sentence_boundary().find_iter(text) {
        // punctuation is one ASCII byte
        let end = boundary.start() + 1;
        sentences.push(&text[start..end]);
        start = boundary.end();
    }
    if start < text.len() {
        sentences.push(&text[start..]);
    }
    sentences
}

pub fn chunk_fixed(text: &str, size: usize, overlap: usize) -> Result<Vec<String>> {
    Ok(FixedSplitter::new(size, overlap)?.split(text))
}

pub fn chunk_sentences(text: &str, max_chunk_size: usize, overlap: usize) -> Result<Vec<String>> {
    Ok(SentenceSplitter::new(max_chunk_size, overlap)?.split(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_fixed_overlapping_windows() {
        let chunks = chunk_fixed("a b c d e", 2, 1).unwrap();
        assert_eq!(chunks, vec!["a b", "b c", "c d", "d e"]);
    }

    #[test]
    fn test_fixed_without_overlap_keeps_short_tail() {
        let chunks = chunk_fixed("a b c d e", 2, 0).unwrap();
        assert_eq!(chunks, vec!["a b", "c d", "e"]);
    }

    #[test]
    fn test_fixed_validation() {
        assert!(matches!(chunk_fixed("a b", 2, 2), Err(Error::Validation(_))));
        assert!(matches!(chunk_fixed("a b", 2, 3), Err(Error::Validation(_))));
        assert!(matches!(chunk_fixed("a b", 0, 0), Err(Error::Validation(_))));
    }

    #[test]
    fn test_fixed_empty_input() {
        assert!(chunk_fixed("", 3, 1).unwrap().is_empty());
        assert!(chunk_fixed(" \n\t ", 3, 1).unwrap().is_empty());
    }

    #[test]
    fn test_single_sentence_is_one_chunk() {
        let chunks = chunk_sentences("A bear lives in London.", 4, 1).unwrap();
        assert_eq!(chunks, vec!["A bear lives in London."]);
    }

    #[test]
    fn test_sentence_split_keeps_punctuation() {
        let sentences = split_sentences("Run! Where to? Home.  Now");
        assert_eq!(sentences, vec!["Run!", "Where to?", "Home.", "Now"]);
    }

    #[test]
    fn test_sentence_split_ignores_inner_periods() {
        let sentences = split_sentences("Version 2.5 shipped. Done.");
        assert_eq!(sentences, vec!["Version 2.5 shipped.", "Done."]);
    }

    #[test]
    fn test_sentence_tail_of_overlap_only_is_dropped() {
        // 4 sentences, windows of 2 stepping 1: the last window would only
        // hold the overlapped sentence
        let chunks = chunk_sentences("A. B. C. D.", 2, 1).unwrap();
        assert_eq!(chunks, vec!["A. B.", "B. C.", "C. D."]);
    }

    #[test]
    fn test_sentence_windows_with_tail() {
        let chunks = chunk_sentences("A. B. C. D. E.", 4, 1).unwrap();
        assert_eq!(chunks, vec!["A. B. C. D.", "D. E."]);
    }

    #[test]
    fn test_sentence_validation_and_empty() {
        assert!(matches!(chunk_sentences("A.", 0, 0), Err(Error::Validation(_))));
        assert!(matches!(chunk_sentences("A.", 2, 2), Err(Error::Validation(_))));
        assert!(chunk_sentences("", 4, 1).unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn prop_fixed_chunks_cover_every_word(
            words in proptest::collection::vec("[a-z]{1,6}", 0..40),
            size in 1usize..8,
            overlap_seed in 0usize..8,
        ) {
            let overlap = overlap_seed % size;
            let text = words.join(" ");
            let chunks = chunk_fixed(&text, size, overlap).unwrap();

            let mut seen: Vec<&str> = Vec::new();
            for chunk in &chunks {
                let n = chunk.split_whitespace().count();
                prop_assert!(n >= 1 && n <= size);
                seen.extend(chunk.split_whitespace());
            }
            if words.is_empty() {
                prop_assert!(chunks.is_empty());
            } else {
                prop_assert_eq!(chunks.last().unwrap().split_whitespace().last(), words.last().map(String::as_str));
                prop_assert_eq!(chunks.first().unwrap().split_whitespace().next(), words.first().map(String::as_str));
            }
        }
    }
}
