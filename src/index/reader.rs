//! Read handles over committed snapshots.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{FeedrankError, Result};
use crate::index::document::{Document, Field, FieldOptions};
use crate::index::snapshot::{self, Snapshot, SnapshotDocument};
use crate::storage::Storage;

/// One entry of a posting list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: u32,
    pub term_freq: u32,
}

/// A read handle over one committed generation of an index.
///
/// Document ids are dense in `0..max_doc()` and stable for the lifetime of
/// the handle. Once [`close`](IndexReader::close) is called every method
/// fails with `IndexUnavailable`.
pub trait IndexReader: Send + Sync + std::fmt::Debug {
    /// The generation this handle reads.
    fn generation(&self) -> u64;

    /// Number of documents; valid ids are `0..max_doc`.
    fn max_doc(&self) -> Result<u32>;

    /// Check if the reader is closed.
    fn is_closed(&self) -> bool;

    /// Close the reader.
    fn close(&self) -> Result<()>;

    /// All stored fields of a document.
    fn document(&self, doc_id: u32) -> Result<Document>;

    /// A stored text field of a document.
    fn stored_field(&self, doc_id: u32, field: &str) -> Result<Option<String>>;

    /// A stored binary field of a document.
    fn binary_field(&self, doc_id: u32, field: &str) -> Result<Option<Vec<u8>>>;

    /// Number of documents containing `term` in `field`.
    fn doc_freq(&self, field: &str, term: &str) -> Result<u32>;

    /// Postings of `term` in `field`, sorted by document id.
    fn postings(&self, field: &str, term: &str) -> Result<Vec<Posting>>;

    /// The term-frequency vector of a document's field, if one was recorded.
    fn term_vector(&self, doc_id: u32, field: &str) -> Result<Option<Vec<(String, u32)>>>;

    /// All distinct indexed terms of `field`, sorted.
    fn terms(&self, field: &str) -> Result<Vec<String>>;
}

/// [`IndexReader`] over a fully loaded [`Snapshot`].
pub struct SnapshotReader {
    storage: Arc<dyn Storage>,
    snapshot: Snapshot,
    closed: AtomicBool,
}

impl std::fmt::Debug for SnapshotReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotReader")
            .field("generation", &self.snapshot.generation)
            .field("committed_at", &self.snapshot.committed_at)
            .field("documents", &self.snapshot.documents.len())
            .field("closed", &self.closed.load(Ordering::Acquire))
            .finish()
    }
}

impl SnapshotReader {
    /// Open the generation named by `CURRENT`.
    ///
    /// Fails with `IndexUnavailable` if nothing has been committed yet or the
    /// snapshot does not verify.
    pub fn open(storage: Arc<dyn Storage>) -> Result<Self> {
        let snapshot = Snapshot::load_current(storage.as_ref())?;
        tracing::debug!(
            generation = snapshot.generation,
            documents = snapshot.documents.len(),
            "opened index snapshot"
        );
        Ok(SnapshotReader {
            storage,
            snapshot,
            closed: AtomicBool::new(false),
        })
    }

    /// Whether this handle still reads the latest committed generation.
    pub fn is_current(&self) -> Result<bool> {
        self.check_closed()?;
        Ok(snapshot::current_generation(self.storage.as_ref())? == Some(self.snapshot.generation))
    }

    /// Whether the index is currently held by a writer.
    pub fn is_locked(&self) -> bool {
        self.storage.is_locked(snapshot::WRITE_LOCK)
    }

    fn check_closed(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(FeedrankError::unavailable("reader is closed"))
        } else {
            Ok(())
        }
    }

    fn doc(&self, doc_id: u32) -> Result<&SnapshotDocument> {
        self.check_closed()?;
        self.snapshot
            .documents
            .get(doc_id as usize)
            .ok_or_else(|| FeedrankError::index(format!("document {doc_id} does not exist")))
    }
}

impl IndexReader for SnapshotReader {
    fn generation(&self) -> u64 {
        self.snapshot.generation
    }

    fn max_doc(&self) -> Result<u32> {
        self.check_closed()?;
        Ok(self.snapshot.documents.len() as u32)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn document(&self, doc_id: u32) -> Result<Document> {
        let doc = self.doc(doc_id)?;
        let mut document = Document::new();
        for (name, value) in &doc.stored {
            document.add_field(Field::new(name.clone(), value.clone(), FieldOptions::STORED));
        }
        Ok(document)
    }

    fn stored_field(&self, doc_id: u32, field: &str) -> Result<Option<String>> {
        Ok(self
            .doc(doc_id)?
            .stored
            .iter()
            .filter(|(name, _)| name == field)
            .find_map(|(_, value)| value.as_text().map(str::to_string)))
    }

    fn binary_field(&self, doc_id: u32, field: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .doc(doc_id)?
            .stored
            .iter()
            .filter(|(name, _)| name == field)
            .find_map(|(_, value)| value.as_binary().map(<[u8]>::to_vec)))
    }

    fn doc_freq(&self, field: &str, term: &str) -> Result<u32> {
        self.check_closed()?;
        Ok(self
            .snapshot
            .postings
            .get(field)
            .and_then(|terms| terms.get(term))
            .map_or(0, |postings| postings.len() as u32))
    }

    fn postings(&self, field: &str, term: &str) -> Result<Vec<Posting>> {
        self.check_closed()?;
        Ok(self
            .snapshot
            .postings
            .get(field)
            .and_then(|terms| terms.get(term))
            .cloned()
            .unwrap_or_default())
    }

    fn term_vector(&self, doc_id: u32, field: &str) -> Result<Option<Vec<(String, u32)>>> {
        let doc = self.doc(doc_id)?;
        if !doc.term_vector_fields.iter().any(|name| name == field) {
            return Ok(None);
        }
        Ok(Some(doc.indexed.get(field).cloned().unwrap_or_default()))
    }

    fn terms(&self, field: &str) -> Result<Vec<String>> {
        self.check_closed()?;
        Ok(self
            .snapshot
            .postings
            .get(field)
            .map(|terms| terms.keys().cloned().collect())
            .unwrap_or_default())
    }
}
