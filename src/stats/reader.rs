//! The statistics-aware read handle used by the ranker.
//!
//! [`AugmentedIndexReader`] wraps an engine [`IndexReader`] and adds what
//! BM25 needs on top of plain postings: per-document field lengths decoded
//! from the statistics side fields, and corpus-wide aggregates computed once
//! per index generation.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use feedrank::analysis::StandardAnalyzer;
//! use feedrank::index::{Document, IndexWriter, SnapshotReader};
//! use feedrank::stats::AugmentedIndexReader;
//! use feedrank::storage::MemoryStorage;
//!
//! let storage = Arc::new(MemoryStorage::new());
//! let mut writer = IndexWriter::open(storage.clone(), Arc::new(StandardAnalyzer::new().unwrap())).unwrap();
//! writer.add_document(Document::builder().add_text("content", "one two three").build()).unwrap();
//! writer.add_document(Document::builder().add_text("content", "four").build()).unwrap();
//! writer.commit().unwrap();
//!
//! let reader = AugmentedIndexReader::new(Arc::new(SnapshotReader::open(storage).unwrap()));
//! assert_eq!(reader.record_count("content").unwrap(), 2);
//! assert_eq!(reader.field_length("content").unwrap(), 4);
//! assert_eq!(reader.avg_field_length("content").unwrap(), 2.0);
//! assert_eq!(reader.doc_length(0, "content").unwrap(), 3);
//! ```

use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use rayon::prelude::*;

use crate::error::{FeedrankError, Result};
use crate::index::{IndexReader, Posting};
use crate::stats::aggregate::{self, AggregateCache, FieldAggregate};
use crate::stats::codec::{self, DocStat};

/// An index read handle extended with cached field statistics.
pub struct AugmentedIndexReader {
    reader: RwLock<Arc<dyn IndexReader>>,
    aggregates: AggregateCache<FieldAggregate>,
    uniq_terms: AggregateCache<u64>,
}

impl std::fmt::Debug for AugmentedIndexReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AugmentedIndexReader")
            .field("reader", &*self.reader.read())
            .field("aggregates", &self.aggregates)
            .field("uniq_terms", &self.uniq_terms)
            .finish()
    }
}

impl AugmentedIndexReader {
    /// Wrap an engine read handle.
    pub fn new(reader: Arc<dyn IndexReader>) -> Self {
        let generation = reader.generation();
        AugmentedIndexReader {
            reader: RwLock::new(reader),
            aggregates: AggregateCache::new(generation),
            uniq_terms: AggregateCache::new(generation),
        }
    }

    /// The wrapped handle, failing with `IndexUnavailable` once closed.
    pub fn handle(&self) -> Result<Arc<dyn IndexReader>> {
        let reader = Arc::clone(&*self.reader.read());
        if reader.is_closed() {
            return Err(FeedrankError::unavailable("index reader is closed"));
        }
        Ok(reader)
    }

    /// Generation of the wrapped handle.
    pub fn generation(&self) -> u64 {
        self.reader.read().generation()
    }

    /// Swap in a handle over a newer generation and drop stale aggregates.
    pub fn refresh(&self, reader: Arc<dyn IndexReader>) {
        let generation = reader.generation();
        let previous = std::mem::replace(&mut *self.reader.write(), reader);
        self.invalidate_for(generation);
        tracing::info!(
            from = previous.generation(),
            to = generation,
            "refreshed index reader"
        );
    }

    /// Drop every cached aggregate unless it belongs to `generation`.
    pub fn invalidate_for(&self, generation: u64) {
        let dropped = self.aggregates.invalidate_for(generation);
        self.uniq_terms.invalidate_for(generation);
        if dropped {
            tracing::debug!(generation, "invalidated field aggregates");
        }
    }

    /// Close the wrapped handle.
    pub fn close(&self) -> Result<()> {
        self.reader.read().close()
    }

    /// Number of documents in the current generation.
    pub fn max_doc(&self) -> Result<u32> {
        self.handle()?.max_doc()
    }

    /// The statistics of one document's field.
    ///
    /// Missing or malformed statistics are logged and read as zero; only a
    /// closed handle or a bad document id is an error.
    pub fn doc_stat(&self, doc_id: u32, field: &str) -> Result<DocStat> {
        let payload = self
            .handle()?
            .binary_field(doc_id, &codec::stats_field_name(field))?;
        match codec::decode(payload.as_deref()) {
            Ok(stat) => Ok(stat),
            Err(FeedrankError::CorruptStats(reason)) => {
                tracing::warn!(doc_id, field, %reason, "statistics unavailable, using zero");
                Ok(DocStat::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Token count of a document's field.
    pub fn doc_length(&self, doc_id: u32, field: &str) -> Result<u32> {
        Ok(self.doc_stat(doc_id, field)?.token_count)
    }

    /// Distinct term count of a document's field.
    pub fn doc_unique_term_count(&self, doc_id: u32, field: &str) -> Result<u32> {
        Ok(self.doc_stat(doc_id, field)?.unique_term_count)
    }

    /// The aggregate for `field`, scanning the corpus on first use.
    pub fn aggregate(&self, field: &str) -> Result<FieldAggregate> {
        self.aggregate_until(field, None)
    }

    /// Like [`aggregate`](Self::aggregate), but give up with a `Timeout`
    /// error if the scan is still running at `deadline`. An abandoned scan
    /// is not cached.
    pub fn aggregate_with_deadline(&self, field: &str, deadline: Instant) -> Result<FieldAggregate> {
        self.aggregate_until(field, Some(deadline))
    }

    fn aggregate_until(&self, field: &str, deadline: Option<Instant>) -> Result<FieldAggregate> {
        let reader = self.handle()?;
        self.aggregates
            .get_or_compute(field, reader.generation(), || {
                aggregate::scan_field(reader.as_ref(), field, deadline)
            })
    }

    /// Number of documents carrying statistics for `field`.
    pub fn record_count(&self, field: &str) -> Result<u32> {
        Ok(self.aggregate(field)?.record_count)
    }

    /// Sum of all token counts of `field`.
    pub fn field_length(&self, field: &str) -> Result<u64> {
        Ok(self.aggregate(field)?.total_length)
    }

    /// Average token count of `field`; 0.0 when no document carries it.
    pub fn avg_field_length(&self, field: &str) -> Result<f64> {
        Ok(self.aggregate(field)?.avg_length())
    }

    /// Compute the aggregates of `fields` ahead of the first query.
    ///
    /// Fields are scanned in parallel.
    pub fn warm(&self, fields: &[String]) -> Result<()> {
        let started = Instant::now();
        fields
            .par_iter()
            .map(|field| self.aggregate(field).map(|_| ()))
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!(
            fields = fields.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "warmed field aggregates"
        );
        Ok(())
    }

    /// Number of documents containing `term` in `field`.
    pub fn term_document_frequency(&self, field: &str, term: &str) -> Result<u32> {
        self.handle()?.doc_freq(field, term)
    }

    /// Postings of `term` in `field`.
    pub fn term_postings(&self, field: &str, term: &str) -> Result<Vec<Posting>> {
        self.handle()?.postings(field, term)
    }

    /// Total occurrences of `term` in `field` across the corpus.
    pub fn total_term_frequency(&self, field: &str, term: &str) -> Result<u64> {
        Ok(self
            .term_postings(field, term)?
            .iter()
            .map(|posting| u64::from(posting.term_freq))
            .sum())
    }

    /// Number of distinct indexed terms of `field`.
    pub fn uniq_term_count(&self, field: &str) -> Result<u64> {
        let reader = self.handle()?;
        self.uniq_terms.get_or_compute(field, reader.generation(), || {
            Ok(reader.terms(field)?.len() as u64)
        })
    }

    /// A stored text field of a document.
    pub fn stored_field(&self, doc_id: u32, field: &str) -> Result<Option<String>> {
        self.handle()?.stored_field(doc_id, field)
    }

    /// The term-frequency vector of a document's field.
    pub fn term_vector(&self, doc_id: u32, field: &str) -> Result<Option<Vec<(String, u32)>>> {
        self.handle()?.term_vector(doc_id, field)
    }
}
