//! Per-document term statistics and the statistics-aware reader.
//!
//! - [`codec`]: the fixed 8-byte side-field payload
//! - [`aggregate`]: corpus-wide totals and the generation-tagged cache
//! - [`reader`]: [`AugmentedIndexReader`], the handle the ranker reads through

pub mod aggregate;
pub mod codec;
pub mod reader;

pub use aggregate::{AggregateCache, FieldAggregate};
pub use codec::{DocStat, STATS_FIELD_SUFFIX};
pub use reader::AugmentedIndexReader;
