//! High-level search engine and the feedback cycle.
//!
//! [`SearchEngine`] ties the read side together: a snapshot reader wrapped
//! in an [`AugmentedIndexReader`], the [`Ranker`] and the
//! [`FeedbackEngine`]. [`FeedbackSession`] drives the interactive loop
//!
//! ```text
//! Idle → QueryIssued → ResultsReady → FeedbackCollected → QueryReformulated → QueryIssued → …
//! ```
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use feedrank::config::EngineConfig;
//! use feedrank::index::Document;
//! use feedrank::search::{FeedbackSession, FeedbackSpec, SearchEngine};
//! use feedrank::storage::MemoryStorage;
//!
//! let storage = Arc::new(MemoryStorage::new());
//! let mut writer = SearchEngine::writer_for(storage.clone()).unwrap();
//! let corpus = [
//!     ("1", "rust ownership borrowing"),
//!     ("2", "rust cargo crates"),
//!     ("3", "python pip"),
//!     ("4", "java maven"),
//!     ("5", "go modules"),
//! ];
//! for (id, text) in corpus {
//!     writer
//!         .add_document(Document::builder().add_keyword("docid", id).add_text("content", text).build())
//!         .unwrap();
//! }
//! writer.commit().unwrap();
//!
//! let engine = SearchEngine::open(storage, EngineConfig::default()).unwrap();
//! let results = engine.search("rust").unwrap();
//! assert_eq!(results.len(), 2);
//!
//! let mut session = FeedbackSession::new(&engine);
//! session.issue("rust").unwrap();
//! let reranked = session.apply_feedback(&FeedbackSpec::parse("1").unwrap()).unwrap();
//! assert_eq!(reranked[0].external_id, "2");
//! ```

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::analysis::{Analyzer, EnglishAnalyzer};
use crate::config::EngineConfig;
use crate::error::{FeedrankError, Result};
use crate::index::{IndexWriter, SnapshotReader, snapshot};
use crate::query::{Query, QueryParser};
use crate::search::feedback::{FeedbackEngine, FeedbackSpec, FeedbackWeights};
use crate::search::ranker::Ranker;
use crate::search::result::SearchResult;
use crate::stats::AugmentedIndexReader;
use crate::storage::{FileStorage, Storage};

/// Statistics of one field, as reported to operators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldReport {
    pub generation: u64,
    pub documents: u32,
    pub field: String,
    pub record_count: u32,
    pub total_length: u64,
    pub avg_length: f64,
    pub unique_terms: u64,
}

/// The search facade over one index.
pub struct SearchEngine {
    storage: Arc<dyn Storage>,
    config: EngineConfig,
    analyzer: Arc<dyn Analyzer>,
    reader: Arc<AugmentedIndexReader>,
    ranker: Ranker,
    feedback: FeedbackEngine,

    /// Held shared by every search and exclusively by [`reload`](Self::reload),
    /// so one request never reads two generations.
    generation_guard: RwLock<()>,
}

impl std::fmt::Debug for SearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchEngine")
            .field("storage", &self.storage)
            .field("config", &self.config)
            .field("analyzer", &self.analyzer.name())
            .field("reader", &self.reader)
            .finish()
    }
}

impl SearchEngine {
    /// The analyzer used when none is given: tokenize, lowercase, drop stop
    /// words and stem.
    pub fn default_analyzer() -> Result<Arc<dyn Analyzer>> {
        Ok(Arc::new(EnglishAnalyzer::new()?))
    }

    /// Open a writer on `storage` with the default analyzer.
    pub fn writer_for(storage: Arc<dyn Storage>) -> Result<IndexWriter> {
        IndexWriter::open(storage, Self::default_analyzer()?)
    }

    /// Open the engine over the current generation of `storage`.
    ///
    /// Fails with `IndexUnavailable` if nothing has been committed.
    pub fn open(storage: Arc<dyn Storage>, config: EngineConfig) -> Result<Self> {
        Self::open_with_analyzer(storage, config, Self::default_analyzer()?)
    }

    /// Open the engine over an on-disk index directory.
    pub fn open_dir<P: AsRef<Path>>(path: P, config: EngineConfig) -> Result<Self> {
        let storage = Arc::new(FileStorage::open(path)?);
        Self::open(storage, config)
    }

    /// Open the engine with a custom analyzer. It must match the analyzer
    /// the index was written with.
    pub fn open_with_analyzer(
        storage: Arc<dyn Storage>,
        config: EngineConfig,
        analyzer: Arc<dyn Analyzer>,
    ) -> Result<Self> {
        config.validate()?;

        let snapshot_reader = SnapshotReader::open(Arc::clone(&storage))?;
        let reader = Arc::new(AugmentedIndexReader::new(Arc::new(snapshot_reader)));
        let parser = Arc::new(
            QueryParser::new(Arc::clone(&analyzer), config.default_field.clone())
                .with_keyword_field(config.id_field.clone()),
        );
        let ranker = Ranker::new(Arc::clone(&reader), parser, &config);
        let feedback = FeedbackEngine::new(config.feedback.clone(), config.default_field.clone());

        let engine = SearchEngine {
            storage,
            config,
            analyzer,
            reader,
            ranker,
            feedback,
            generation_guard: RwLock::new(()),
        };
        if engine.config.warm_on_open {
            engine.warm()?;
        }

        tracing::info!(
            generation = engine.reader.generation(),
            analyzer = engine.analyzer.name(),
            "opened search engine"
        );
        Ok(engine)
    }

    /// Get the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The statistics-aware reader.
    pub fn reader(&self) -> &Arc<AugmentedIndexReader> {
        &self.reader
    }

    /// Generation currently served.
    pub fn generation(&self) -> u64 {
        self.reader.generation()
    }

    /// Open a writer on this engine's storage, sharing its analyzer.
    pub fn writer(&self) -> Result<IndexWriter> {
        IndexWriter::open(Arc::clone(&self.storage), Arc::clone(&self.analyzer))
    }

    /// Rank free text.
    pub fn search(&self, text: &str) -> Result<Vec<SearchResult>> {
        let _guard = self.generation_guard.read();
        self.ranker.search_text(text, None)
    }

    /// Rank a parsed query, optionally re-ranked by feedback weights.
    pub fn search_query(
        &self,
        query: &Query,
        weights: Option<&FeedbackWeights>,
    ) -> Result<Vec<SearchResult>> {
        let _guard = self.generation_guard.read();
        self.ranker.search(query, weights)
    }

    /// Rank `text`, expand the query from its top results and rank again.
    ///
    /// If the first pass finds nothing usable for expansion its results are
    /// returned as they are.
    pub fn search_with_pseudo_feedback(&self, text: &str) -> Result<Vec<SearchResult>> {
        let _guard = self.generation_guard.read();
        let initial = self.ranker.search_text(text, None)?;
        match self.feedback.pseudo(&self.reader, &initial) {
            Ok(reformulated) => self.ranker.search(&reformulated.to_query(), None),
            Err(FeedrankError::EmptyFeedbackSet) => Ok(initial),
            Err(e) => Err(e),
        }
    }

    /// Rank the query reformulated from explicit user feedback.
    ///
    /// Fails with `EmptyFeedbackSet` when none of the referenced documents
    /// can be used; [`FeedbackSession`] turns that into the prior results.
    pub fn search_with_user_feedback(&self, spec: &FeedbackSpec) -> Result<Vec<SearchResult>> {
        let _guard = self.generation_guard.read();
        let (query, weights) = self.reformulate_user(spec)?;
        self.ranker.search(&query, Some(&weights))
    }

    fn reformulate_user(&self, spec: &FeedbackSpec) -> Result<(Query, FeedbackWeights)> {
        let (reformulated, weights) = self.feedback.user(&self.reader, spec)?;
        tracing::info!(
            feedback = %spec,
            terms = reformulated.terms.len(),
            boost = reformulated.boost,
            "reformulated query from user feedback"
        );
        Ok((reformulated.to_query(), weights))
    }

    /// Switch to the latest committed generation, if there is a newer one.
    ///
    /// # Returns
    ///
    /// Whether the engine moved to a new generation.
    pub fn reload(&self) -> Result<bool> {
        let _guard = self.generation_guard.write();
        let latest = snapshot::current_generation(self.storage.as_ref())?;
        if latest.is_none() || latest == Some(self.reader.generation()) {
            return Ok(false);
        }

        let snapshot_reader = SnapshotReader::open(Arc::clone(&self.storage))?;
        self.reader.refresh(Arc::new(snapshot_reader));
        if self.config.warm_on_open {
            self.reader.warm(&self.warm_fields())?;
        }
        Ok(true)
    }

    /// Compute field aggregates now instead of on the first query.
    pub fn warm(&self) -> Result<()> {
        self.reader.warm(&self.warm_fields())
    }

    fn warm_fields(&self) -> Vec<String> {
        vec![self.config.default_field.clone()]
    }

    /// Report the statistics of `field`.
    pub fn field_report(&self, field: &str) -> Result<FieldReport> {
        let _guard = self.generation_guard.read();
        let aggregate = self.reader.aggregate(field)?;
        Ok(FieldReport {
            generation: self.reader.generation(),
            documents: self.reader.max_doc()?,
            field: field.to_string(),
            record_count: aggregate.record_count,
            total_length: aggregate.total_length,
            avg_length: aggregate.avg_length(),
            unique_terms: self.reader.uniq_term_count(field)?,
        })
    }

    /// Close the engine's read handle. Later searches fail with
    /// `IndexUnavailable`.
    pub fn close(&self) -> Result<()> {
        self.reader.close()
    }
}

/// States of the feedback cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    QueryIssued,
    ResultsReady,
    FeedbackCollected,
    QueryReformulated,
}

/// One user's walk through the feedback cycle.
#[derive(Debug)]
pub struct FeedbackSession<'a> {
    engine: &'a SearchEngine,
    state: SessionState,
    query: Option<Query>,
    weights: Option<FeedbackWeights>,
    feedback: Option<FeedbackSpec>,
    results: Vec<SearchResult>,
}

impl<'a> FeedbackSession<'a> {
    /// Start an idle session.
    pub fn new(engine: &'a SearchEngine) -> Self {
        FeedbackSession {
            engine,
            state: SessionState::Idle,
            query: None,
            weights: None,
            feedback: None,
            results: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The query behind the current results.
    pub fn query(&self) -> Option<&Query> {
        self.query.as_ref()
    }

    /// The latest results.
    pub fn results(&self) -> &[SearchResult] {
        &self.results
    }

    fn expect_state(&self, allowed: &[SessionState], action: &str) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(FeedrankError::other(format!(
                "cannot {action} in state {:?}",
                self.state
            )))
        }
    }

    /// Issue a new free-text query.
    pub fn issue(&mut self, text: &str) -> Result<&[SearchResult]> {
        self.expect_state(&[SessionState::Idle, SessionState::ResultsReady], "issue a query")?;
        let query = self.engine.ranker.parse(text)?;
        self.query = Some(query);
        self.weights = None;
        self.run()
    }

    fn run(&mut self) -> Result<&[SearchResult]> {
        let previous = self.state;
        self.state = SessionState::QueryIssued;

        let Some(query) = self.query.as_ref() else {
            self.state = previous;
            return Err(FeedrankError::other("no query to run"));
        };
        match self.engine.search_query(query, self.weights.as_ref()) {
            Ok(results) => {
                self.results = results;
                self.state = SessionState::ResultsReady;
                Ok(&self.results)
            }
            Err(e) => {
                self.state = match previous {
                    SessionState::Idle => SessionState::Idle,
                    _ => SessionState::ResultsReady,
                };
                Err(e)
            }
        }
    }

    /// Record user feedback on the current results.
    pub fn collect_feedback(&mut self, spec: FeedbackSpec) -> Result<()> {
        self.expect_state(&[SessionState::ResultsReady], "collect feedback")?;
        self.feedback = Some(spec);
        self.state = SessionState::FeedbackCollected;
        Ok(())
    }

    /// Build the reformulated query from the collected feedback.
    ///
    /// # Returns
    ///
    /// `false` if the feedback referenced no usable documents; the session
    /// is then back at `ResultsReady` with its results unchanged.
    pub fn reformulate(&mut self) -> Result<bool> {
        self.expect_state(&[SessionState::FeedbackCollected], "reformulate")?;
        let Some(spec) = self.feedback.take() else {
            self.state = SessionState::ResultsReady;
            return Ok(false);
        };

        let reformulated = {
            let _guard = self.engine.generation_guard.read();
            self.engine.reformulate_user(&spec)
        };
        match reformulated {
            Ok((query, weights)) => {
                self.query = Some(query);
                self.weights = Some(weights);
                self.state = SessionState::QueryReformulated;
                Ok(true)
            }
            Err(FeedrankError::EmptyFeedbackSet) => {
                tracing::info!(feedback = %spec, "feedback had no usable documents");
                self.state = SessionState::ResultsReady;
                Ok(false)
            }
            Err(e) => {
                self.state = SessionState::ResultsReady;
                Err(e)
            }
        }
    }

    /// Expand the current query from its own top results.
    pub fn reformulate_pseudo(&mut self) -> Result<bool> {
        self.expect_state(&[SessionState::ResultsReady], "apply pseudo feedback")?;
        let reformulated = {
            let _guard = self.engine.generation_guard.read();
            self.engine.feedback.pseudo(&self.engine.reader, &self.results)
        };
        match reformulated {
            Ok(reformulated) => {
                self.query = Some(reformulated.to_query());
                self.weights = None;
                self.state = SessionState::QueryReformulated;
                Ok(true)
            }
            Err(FeedrankError::EmptyFeedbackSet) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Run the reformulated query.
    pub fn rerun(&mut self) -> Result<&[SearchResult]> {
        self.expect_state(&[SessionState::QueryReformulated], "rerun")?;
        self.run()
    }

    /// Collect, reformulate and rerun in one step.
    ///
    /// Feedback without usable documents returns the prior results.
    pub fn apply_feedback(&mut self, spec: &FeedbackSpec) -> Result<Vec<SearchResult>> {
        self.collect_feedback(spec.clone())?;
        if !self.reformulate()? {
            return Ok(self.results.clone());
        }
        Ok(self.rerun()?.to_vec())
    }
}
