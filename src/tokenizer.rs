//! Text normalization shared by indexing and querying
//!
//! The lexical index only depends on the [`Tokenizer`] contract. The default
//! [`TextTokenizer`] strips punctuation, splits on whitespace, lower-cases,
//! drops stopwords and applies English stemming using tantivy's analyzer
//! pipeline.

use crate::Result;
use std::collections::BTreeSet;
use std::path::Path;
use tantivy::tokenizer::{
    Language, LowerCaser, Stemmer, StopWordFilter, TextAnalyzer, TokenStream, WhitespaceTokenizer,
};

/// Deterministic text to token-sequence normalization
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<String>;
}

/// English stopword list used when no stopword file is configured
pub const DEFAULT_STOPWORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "your", "yours",
    "yourself", "yourselves", "he", "him", "his", "himself", "she", "her", "hers", "herself",
    "it", "its", "itself", "they", "them", "their", "theirs", "themselves", "what", "which",
    "who", "whom", "this", "that", "these", "those", "am", "is", "are", "was", "were", "be",
    "been", "being", "have", "has", "had", "having", "do", "does", "did", "doing", "a", "an",
    "the", "and", "but", "if", "or", "because", "as", "until", "while", "of", "at", "by",
    "for", "with", "about", "against", "between", "into", "through", "during", "before",
    "after", "above", "below", "to", "from", "up", "down", "in", "out", "on", "off", "over",
    "under", "again", "further", "then", "once", "here", "there", "when", "where", "why",
    "how", "all", "any", "both", "each", "few", "more", "most", "other", "some", "such", "no",
    "nor", "not", "only", "own", "same", "so", "than", "too", "very", "s", "t", "can", "will",
    "just", "don", "should", "now",
];

#[derive(Clone)]
pub struct TextTokenizer {
    analyzer: TextAnalyzer,
}

impl TextTokenizer {
    pub fn new<I, S>(stopwords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let stopwords: BTreeSet<String> = stopwords
            .into_iter()
            .map(|w| w.into().trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();

        let analyzer = TextAnalyzer::builder(WhitespaceTokenizer::default())
            .filter(LowerCaser)
            .filter(StopWordFilter::remove(stopwords))
            .filter(Stemmer::new(Language::English))
            .build();

        Self { analyzer }
    }

    /// Reads one stopword per line; blank lines are ignored
    pub fn from_stopwords_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let words: Vec<String> = content.lines().map(str::to_string).collect();
        tracing::info!("[TOKENIZER] Loaded {} stopwords from {}", words.len(), path.display());
        Ok(Self::new(words))
    }

    pub fn from_optional_file(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_stopwords_file(path),
            None => Ok(Self::default()),
        }
    }
}

impl Default for TextTokenizer {
    fn default() -> Self {
        Self::new(DEFAULT_STOPWORDS.iter().copied())
    }
}

impl Tokenizer for TextTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        let stripped: String = text.chars().filter(|c| !c.is_ascii_punctuation()).collect();

        // token_stream needs &mut; the analyzer is cheap to clone
        let mut analyzer = self.analyzer.clone();
        let mut stream = analyzer.token_stream(&stripped);

        let mut tokens = Vec::new();
        while stream.advance() {
            let text = &stream.token().text;
            if !text.is_empty() {
                tokens.push(text.clone());
            }
        }
        tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercases_strips_punctuation_and_stems() {
        let tokenizer = TextTokenizer::default();
        let tokens = tokenizer.tokenize("The Bears, RUNNING wild!");
        assert_eq!(tokens, vec!["bear", "run", "wild"]);
    }

    #[test]
    fn test_stopwords_removed() {
        let tokenizer = TextTokenizer::default();
        assert!(tokenizer.tokenize("the and of a").is_empty());
        assert!(tokenizer.tokenize("   ").is_empty());
    }

    #[test]
    fn test_custom_stopwords() {
        let tokenizer = TextTokenizer::new(["bear"]);
        assert_eq!(tokenizer.tokenize("bear hunter"), vec!["hunter"]);
    }

    #[test]
    fn test_deterministic() {
        let tokenizer = TextTokenizer::default();
        let text = "A hunter fights a bear in the frozen wilderness.";
        assert_eq!(tokenizer.tokenize(text), tokenizer.tokenize(text));
    }

    #[test]
    fn test_stopwords_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stopwords.txt");
        std::fs::write(&path, "london\n\nbear\n").unwrap();

        let tokenizer = TextTokenizer::from_stopwords_file(&path).unwrap();
        assert_eq!(tokenizer.tokenize("a bear in london"), vec!["a", "in"]);
    }
}
