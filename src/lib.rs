//! # Feedrank
//!
//! A BM25 ranking engine with relevance feedback.
//!
//! ## Features
//!
//! - Per-document length statistics stored next to every indexed field
//! - Lazily computed, generation-scoped field aggregates
//! - BM25 scoring over a small boolean query language
//! - Pseudo relevance feedback from the top results of a query
//! - Explicit up/down user feedback with per-document re-weighting
//! - Atomic, crash-safe snapshot commits on pluggable storage

pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod index;
pub mod query;
pub mod scoring;
pub mod search;
pub mod stats;
pub mod storage;

pub mod prelude {
    pub use crate::config::{EngineConfig, FeedbackConfig};
    pub use crate::error::{FeedrankError, Result};
    pub use crate::index::{Document, IndexWriter};
    pub use crate::search::{FeedbackSession, FeedbackSpec, SearchEngine, SearchResult};
    pub use crate::storage::{FileStorage, MemoryStorage, Storage};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
