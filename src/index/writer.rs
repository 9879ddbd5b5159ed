//! Single-writer index writer.
//!
//! An [`IndexWriter`] holds the storage's `write.lock` for its whole life,
//! so at most one writer exists per index. Changes are buffered in memory
//! and become visible to readers only through [`IndexWriter::commit`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use feedrank::analysis::EnglishAnalyzer;
//! use feedrank::index::{Document, IndexWriter};
//! use feedrank::storage::MemoryStorage;
//!
//! let storage = Arc::new(MemoryStorage::new());
//! let analyzer = Arc::new(EnglishAnalyzer::new().unwrap());
//! let mut writer = IndexWriter::open(storage, analyzer).unwrap();
//!
//! writer
//!     .add_document(Document::builder().add_text("content", "hello world").build())
//!     .unwrap();
//! assert_eq!(writer.commit().unwrap(), 1);
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use ahash::AHashMap;

use crate::analysis::Analyzer;
use crate::error::{FeedrankError, Result};
use crate::index::document::{Document, FieldValue};
use crate::index::snapshot::{self, Snapshot, SnapshotDocument};
use crate::stats::codec::{self, DocStat};
use crate::storage::{Storage, StorageLock};

/// Writer counters since the writer was opened.
#[derive(Debug, Clone, Default)]
pub struct WriterStats {
    pub docs_added: u64,
    pub docs_deleted: u64,
    pub commits: u64,
}

/// The exclusive write handle of an index.
pub struct IndexWriter {
    storage: Arc<dyn Storage>,
    analyzer: Arc<dyn Analyzer>,
    lock: Option<Box<dyn StorageLock>>,

    /// Committed documents followed by pending additions.
    documents: Vec<SnapshotDocument>,

    /// Generation of the last commit this writer knows about.
    generation: u64,

    /// Whether anything changed since the last commit.
    dirty: bool,

    pending_docs: usize,
    stats: WriterStats,
}

impl std::fmt::Debug for IndexWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexWriter")
            .field("analyzer", &self.analyzer.name())
            .field("generation", &self.generation)
            .field("documents", &self.documents.len())
            .field("pending_docs", &self.pending_docs)
            .field("closed", &self.is_closed())
            .field("stats", &self.stats)
            .finish()
    }
}

impl IndexWriter {
    /// Open the writer, taking the index's write lock.
    ///
    /// Fails with an `Index` error if another writer holds the lock.
    pub fn open(storage: Arc<dyn Storage>, analyzer: Arc<dyn Analyzer>) -> Result<Self> {
        let lock = storage
            .acquire_lock(snapshot::WRITE_LOCK)
            .map_err(|e| match e {
                FeedrankError::IndexUnavailable(_) => e,
                _ => FeedrankError::index(format!("index is locked by another writer: {e}")),
            })?;

        let (generation, documents) = match snapshot::current_generation(storage.as_ref())? {
            Some(generation) => (
                generation,
                Snapshot::load(storage.as_ref(), generation)?.documents,
            ),
            None => (0, Vec::new()),
        };

        tracing::debug!(generation, documents = documents.len(), "opened index writer");

        Ok(IndexWriter {
            storage,
            analyzer,
            lock: Some(lock),
            documents,
            generation,
            dirty: false,
            pending_docs: 0,
            stats: WriterStats::default(),
        })
    }

    /// Analyze and buffer a document.
    ///
    /// Every indexed field gets a statistics side field attached. Text fields
    /// that are tokenized record the analyzed token count and distinct term
    /// count; untokenized fields count as a single term.
    pub fn add_document(&mut self, doc: Document) -> Result<()> {
        self.check_closed()?;
        let analyzed = self.analyze_document(doc)?;
        self.documents.push(analyzed);
        self.pending_docs += 1;
        self.dirty = true;
        self.stats.docs_added += 1;
        Ok(())
    }

    fn analyze_document(&self, doc: Document) -> Result<SnapshotDocument> {
        let mut stored = Vec::new();
        let mut term_freqs: BTreeMap<String, AHashMap<String, u32>> = BTreeMap::new();
        let mut token_counts: BTreeMap<String, u32> = BTreeMap::new();
        let mut term_vector_fields = BTreeSet::new();

        for field in doc.fields() {
            codec::validate_field_name(&field.name)?;

            if field.options.indexed {
                let FieldValue::Text(text) = &field.value else {
                    return Err(FeedrankError::index(format!(
                        "binary field '{}' cannot be indexed",
                        field.name
                    )));
                };

                let terms = if field.options.tokenized {
                    self.analyzer.terms(text)?
                } else {
                    vec![text.clone()]
                };

                *token_counts.entry(field.name.clone()).or_default() += terms.len() as u32;
                let freqs = term_freqs.entry(field.name.clone()).or_default();
                for term in terms {
                    *freqs.entry(term).or_default() += 1;
                }

                if field.options.term_vectors {
                    term_vector_fields.insert(field.name.clone());
                }
            }

            if field.options.stored {
                stored.push((field.name.clone(), field.value.clone()));
            }
        }

        let mut indexed = BTreeMap::new();
        for (name, freqs) in term_freqs {
            let stat = DocStat::new(token_counts[&name], freqs.len() as u32);
            stored.push((
                codec::stats_field_name(&name),
                FieldValue::Binary(codec::encode(stat).to_vec()),
            ));

            let mut terms: Vec<(String, u32)> = freqs.into_iter().collect();
            terms.sort_unstable_by(|a, b| a.0.cmp(&b.0));
            indexed.insert(name, terms);
        }

        Ok(SnapshotDocument {
            stored,
            indexed,
            term_vector_fields: term_vector_fields.into_iter().collect(),
        })
    }

    /// Delete every document holding `key` as an indexed term of `field`.
    ///
    /// # Returns
    ///
    /// The number of documents removed from the pending state.
    pub fn delete_by_key(&mut self, field: &str, key: &str) -> Result<u64> {
        self.check_closed()?;
        let before = self.documents.len();
        self.documents.retain(|doc| !doc.has_term(field, key));
        let removed = (before - self.documents.len()) as u64;
        if removed > 0 {
            self.dirty = true;
            self.stats.docs_deleted += removed;
        }
        Ok(removed)
    }

    /// Replace the documents identified by `key` with `doc`.
    ///
    /// Statistics are never edited in place: the old documents are deleted
    /// and the new one is analyzed from scratch.
    pub fn update_document(&mut self, key_field: &str, key: &str, doc: Document) -> Result<()> {
        self.delete_by_key(key_field, key)?;
        self.add_document(doc)
    }

    /// Publish all buffered changes as a new generation.
    ///
    /// Deleted documents are dropped and the remaining ones get dense
    /// internal ids in the new snapshot.
    ///
    /// # Returns
    ///
    /// The committed generation.
    pub fn commit(&mut self) -> Result<u64> {
        self.check_closed()?;
        let generation = self.generation + 1;

        let snapshot = Snapshot::build(generation, self.documents.clone());
        snapshot.publish(self.storage.as_ref())?;

        tracing::info!(
            generation,
            documents = snapshot.documents.len(),
            added = self.pending_docs,
            "committed index generation"
        );

        self.generation = generation;
        self.pending_docs = 0;
        self.dirty = false;
        self.stats.commits += 1;
        Ok(generation)
    }

    /// Discard all changes since the last commit.
    pub fn rollback(&mut self) -> Result<()> {
        self.check_closed()?;
        self.documents = if self.generation == 0 {
            Vec::new()
        } else {
            Snapshot::load(self.storage.as_ref(), self.generation)?.documents
        };
        self.pending_docs = 0;
        self.dirty = false;
        Ok(())
    }

    /// Close the writer and release the lock. Uncommitted changes are lost.
    pub fn close(&mut self) -> Result<()> {
        if self.dirty {
            tracing::warn!(
                pending = self.pending_docs,
                "closing index writer with uncommitted changes"
            );
        }
        if let Some(mut lock) = self.lock.take() {
            lock.release()?;
        }
        Ok(())
    }

    /// Check if the writer is closed.
    pub fn is_closed(&self) -> bool {
        self.lock.is_none()
    }

    /// Number of documents added since the last commit.
    pub fn pending_docs(&self) -> usize {
        self.pending_docs
    }

    /// Number of live documents including pending ones.
    pub fn doc_count(&self) -> usize {
        self.documents.len()
    }

    /// Generation of the last commit.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Get writer statistics.
    pub fn stats(&self) -> &WriterStats {
        &self.stats
    }

    fn check_closed(&self) -> Result<()> {
        if self.is_closed() {
            Err(FeedrankError::index("writer is closed"))
        } else {
            Ok(())
        }
    }
}

impl Drop for IndexWriter {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::StandardAnalyzer;
    use crate::index::reader::{IndexReader, SnapshotReader};
    use crate::storage::MemoryStorage;

    fn writer(storage: &Arc<MemoryStorage>) -> IndexWriter {
        IndexWriter::open(
            storage.clone(),
            Arc::new(StandardAnalyzer::new().unwrap()),
        )
        .unwrap()
    }

    fn doc(id: &str, content: &str) -> Document {
        Document::builder()
            .add_keyword("docid", id)
            .add_text("content", content)
            .build()
    }

    #[test]
    fn test_single_writer() {
        let storage = Arc::new(MemoryStorage::new());
        let mut first = writer(&storage);

        let second = IndexWriter::open(storage.clone(), Arc::new(StandardAnalyzer::new().unwrap()));
        assert!(matches!(second, Err(FeedrankError::Index(_))));

        first.close().unwrap();
        assert!(first.is_closed());
        assert!(first.add_document(doc("1", "x")).is_err());
        let _reopened = writer(&storage);
    }

    #[test]
    fn test_statistics_side_fields() {
        let storage = Arc::new(MemoryStorage::new());
        let mut w = writer(&storage);
        w.add_document(doc("a", "red fish blue fish")).unwrap();
        w.commit().unwrap();

        let reader = SnapshotReader::open(storage.clone()).unwrap();
        let content = reader.binary_field(0, "content_etdat").unwrap();
        assert_eq!(
            codec::decode(content.as_deref()).unwrap(),
            DocStat::new(4, 3)
        );
        let id = reader.binary_field(0, "docid_etdat").unwrap();
        assert_eq!(codec::decode(id.as_deref()).unwrap(), DocStat::new(1, 1));
        assert_eq!(reader.doc_freq("content_etdat", "fish").unwrap(), 0);
    }

    #[test]
    fn test_reserved_field_name_rejected() {
        let storage = Arc::new(MemoryStorage::new());
        let mut w = writer(&storage);
        let bad = Document::builder().add_text("content_etdat", "x").build();
        assert!(w.add_document(bad).is_err());
        assert_eq!(w.pending_docs(), 0);
    }

    #[test]
    fn test_update_and_dense_ids() {
        let storage = Arc::new(MemoryStorage::new());
        let mut w = writer(&storage);
        w.add_document(doc("a", "alpha")).unwrap();
        w.add_document(doc("b", "beta")).unwrap();
        w.add_document(doc("c", "gamma")).unwrap();
        assert_eq!(w.commit().unwrap(), 1);

        assert_eq!(w.delete_by_key("docid", "a").unwrap(), 1);
        w.update_document("docid", "c", doc("c", "gamma delta")).unwrap();
        assert_eq!(w.commit().unwrap(), 2);

        let reader = SnapshotReader::open(storage.clone()).unwrap();
        assert_eq!(reader.max_doc().unwrap(), 2);
        assert_eq!(reader.stored_field(0, "docid").unwrap().as_deref(), Some("b"));
        assert_eq!(reader.stored_field(1, "docid").unwrap().as_deref(), Some("c"));
        assert_eq!(reader.doc_freq("content", "alpha").unwrap(), 0);
        assert_eq!(reader.doc_freq("content", "delta").unwrap(), 1);
    }

    #[test]
    fn test_rollback() {
        let storage = Arc::new(MemoryStorage::new());
        let mut w = writer(&storage);
        w.add_document(doc("a", "alpha")).unwrap();
        w.commit().unwrap();

        w.add_document(doc("b", "beta")).unwrap();
        w.delete_by_key("docid", "a").unwrap();
        w.rollback().unwrap();

        assert_eq!(w.pending_docs(), 0);
        assert_eq!(w.doc_count(), 1);
    }
}
