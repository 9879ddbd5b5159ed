//! Text analysis: tokenization, filtering and analysis pipelines.
//!
//! Documents and query text pass through the same [`Analyzer`] so that
//! indexed terms and query terms agree.

pub mod analyzer;
pub mod token;
pub mod token_filter;
pub mod tokenizer;

pub use analyzer::{Analyzer, EnglishAnalyzer, PipelineAnalyzer, StandardAnalyzer};
pub use token::{Token, TokenStream};
pub use token_filter::{Filter, LowercaseFilter, StemFilter, StopFilter};
pub use tokenizer::{RegexTokenizer, Tokenizer};
