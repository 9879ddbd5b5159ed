//! Query representation and parsing.

pub mod parser;
#[allow(clippy::module_inception)]
pub mod query;

pub use parser::QueryParser;
pub use query::{BooleanQuery, Occur, Query, TermQuery, WeightedTerm};
