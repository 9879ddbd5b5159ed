//! The indexing engine: documents, the single writer and snapshot readers.

pub mod document;
pub mod reader;
pub mod snapshot;
pub mod writer;

pub use document::{Document, DocumentBuilder, Field, FieldOptions, FieldValue};
pub use reader::{IndexReader, Posting, SnapshotReader};
pub use snapshot::{Snapshot, SnapshotDocument};
pub use writer::{IndexWriter, WriterStats};
