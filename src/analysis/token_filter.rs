//! Token filters transform a token stream.
//!
//! Filters skip tokens that an earlier filter already stopped, and they stop
//! tokens instead of removing them. [`PipelineAnalyzer`] drops stopped tokens
//! once every filter has run.
//!
//! [`PipelineAnalyzer`]: crate::analysis::analyzer::PipelineAnalyzer

use std::collections::HashSet;
use std::sync::Arc;

use lazy_static::lazy_static;
use rust_stemmers::{Algorithm, Stemmer};

use crate::analysis::token::TokenStream;
use crate::error::Result;

lazy_static! {
    /// Default English stop words.
    static ref ENGLISH_STOP_WORDS: HashSet<&'static str> = [
        "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is",
        "it", "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there",
        "these", "they", "this", "to", "was", "will", "with",
    ]
    .into_iter()
    .collect();
}

/// Trait for filters that transform token streams.
pub trait Filter: Send + Sync {
    /// Apply this filter to a token stream.
    fn filter(&self, tokens: TokenStream) -> Result<TokenStream>;

    /// Get the name of this filter (for debugging and configuration).
    fn name(&self) -> &'static str;
}

/// A filter that converts tokens to lowercase.
#[derive(Clone, Debug, Default)]
pub struct LowercaseFilter;

impl LowercaseFilter {
    /// Create a new lowercase filter.
    pub fn new() -> Self {
        LowercaseFilter
    }
}

impl Filter for LowercaseFilter {
    fn filter(&self, tokens: TokenStream) -> Result<TokenStream> {
        Ok(Box::new(tokens.map(|token| {
            if token.is_stopped() {
                token
            } else {
                let lowered = token.text.to_lowercase();
                token.with_text(lowered)
            }
        })))
    }

    fn name(&self) -> &'static str {
        "lowercase"
    }
}

/// A filter that stops common words.
#[derive(Clone, Debug)]
pub struct StopFilter {
    stop_words: Arc<HashSet<String>>,
}

impl StopFilter {
    /// Create a stop filter with the default English stop word list.
    pub fn new() -> Self {
        StopFilter {
            stop_words: Arc::new(ENGLISH_STOP_WORDS.iter().map(|w| w.to_string()).collect()),
        }
    }

    /// Create a stop filter with a custom word list.
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        StopFilter {
            stop_words: Arc::new(words.into_iter().map(Into::into).collect()),
        }
    }

    /// Whether `word` is in this filter's stop list.
    pub fn is_stop_word(&self, word: &str) -> bool {
        self.stop_words.contains(word)
    }
}

impl Default for StopFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl Filter for StopFilter {
    fn filter(&self, tokens: TokenStream) -> Result<TokenStream> {
        let stop_words = Arc::clone(&self.stop_words);
        Ok(Box::new(tokens.map(move |token| {
            if !token.is_stopped() && stop_words.contains(&token.text) {
                token.stop()
            } else {
                token
            }
        })))
    }

    fn name(&self) -> &'static str {
        "stop"
    }
}

/// A filter that reduces words to their stem using a Snowball stemmer.
pub struct StemFilter {
    stemmer: Stemmer,
}

impl StemFilter {
    /// Create an English stem filter.
    pub fn english() -> Self {
        StemFilter {
            stemmer: Stemmer::create(Algorithm::English),
        }
    }

    /// Create a stem filter for the given Snowball algorithm.
    pub fn with_algorithm(algorithm: Algorithm) -> Self {
        StemFilter {
            stemmer: Stemmer::create(algorithm),
        }
    }
}

impl std::fmt::Debug for StemFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StemFilter").finish()
    }
}

impl Filter for StemFilter {
    fn filter(&self, tokens: TokenStream) -> Result<TokenStream> {
        // Stemmer is not Clone, so the stream is materialized here.
        let stemmed: Vec<_> = tokens
            .map(|token| {
                if token.is_stopped() {
                    token
                } else {
                    let stem = self.stemmer.stem(&token.text).into_owned();
                    token.with_text(stem)
                }
            })
            .collect();

        Ok(Box::new(stemmed.into_iter()))
    }

    fn name(&self) -> &'static str {
        "stem"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::token::Token;

    fn stream(words: &[&str]) -> TokenStream {
        let tokens: Vec<Token> = words
            .iter()
            .enumerate()
            .map(|(i, w)| Token::new(*w, i))
            .collect();
        Box::new(tokens.into_iter())
    }

    #[test]
    fn test_lowercase_filter() {
        let tokens = vec![Token::new("Hello", 0), Token::new("WORLD", 1).stop()];
        let result: Vec<Token> = LowercaseFilter::new()
            .filter(Box::new(tokens.into_iter()))
            .unwrap()
            .collect();

        assert_eq!(result[0].text, "hello");
        // Stopped tokens are left untouched
        assert_eq!(result[1].text, "WORLD");
    }

    #[test]
    fn test_stop_filter_marks_tokens() {
        let result: Vec<Token> = StopFilter::new()
            .filter(stream(&["the", "quick", "fox"]))
            .unwrap()
            .collect();

        assert_eq!(result.len(), 3);
        assert!(result[0].is_stopped());
        assert!(!result[1].is_stopped());
    }

    #[test]
    fn test_custom_stop_words() {
        let filter = StopFilter::from_words(["quick"]);
        assert!(filter.is_stop_word("quick"));
        assert!(!filter.is_stop_word("the"));
    }

    #[test]
    fn test_stem_filter() {
        let result: Vec<Token> = StemFilter::english()
            .filter(stream(&["running", "connections"]))
            .unwrap()
            .collect();

        assert_eq!(result[0].text, "run");
        assert_eq!(result[1].text, "connect");
    }
}
