//! BM25 ranking over the statistics-aware reader.

use std::sync::Arc;

use ahash::AHashMap;

use crate::config::EngineConfig;
use crate::error::{FeedrankError, Result};
use crate::query::{Query, QueryParser};
use crate::scoring::Bm25;
use crate::search::feedback::FeedbackWeights;
use crate::search::result::{SearchResult, make_snippet};
use crate::stats::{AugmentedIndexReader, FieldAggregate};

/// Ranking passes tried before giving up on a reader that keeps refreshing.
const MAX_RANKING_ATTEMPTS: u32 = 3;

/// Scores queries and returns the top-K documents.
///
/// For every distinct query term the ranker walks the term's postings and
/// adds the term's BM25 weight, scaled by the term's boost, to each
/// matching document's running total. Feedback weights, when given,
/// multiply a document's final total. Results are ordered by descending
/// score, ties by ascending internal id.
#[derive(Debug, Clone)]
pub struct Ranker {
    reader: Arc<AugmentedIndexReader>,
    parser: Arc<QueryParser>,
    bm25: Bm25,
    top_k: usize,
    snippet_length: usize,
    snippet_field: String,
    id_field: String,
}

impl Ranker {
    /// Create a ranker from the engine configuration.
    pub fn new(
        reader: Arc<AugmentedIndexReader>,
        parser: Arc<QueryParser>,
        config: &EngineConfig,
    ) -> Self {
        Ranker {
            reader,
            parser,
            bm25: Bm25::new(config.bm25),
            top_k: config.top_k,
            snippet_length: config.snippet_length,
            snippet_field: config.default_field.clone(),
            id_field: config.id_field.clone(),
        }
    }

    /// Maximum number of results returned.
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Parse `text` with the ranker's query parser.
    pub fn parse(&self, text: &str) -> Result<Query> {
        self.parser.parse(text)
    }

    /// Parse `text` and rank it.
    pub fn search_text(
        &self,
        text: &str,
        weights: Option<&FeedbackWeights>,
    ) -> Result<Vec<SearchResult>> {
        let query = self.parser.parse(text)?;
        self.search(&query, weights)
    }

    /// Rank a parsed query.
    ///
    /// # Arguments
    ///
    /// * `query` - The query to score
    /// * `weights` - Optional per-document feedback weights
    ///
    /// # Returns
    ///
    /// At most `top_k` results. A query matching nothing yields an empty list.
    ///
    /// If the reader is refreshed while ranking, the pass is discarded and
    /// repeated so that statistics, postings and stored fields all come from
    /// one generation.
    pub fn search(
        &self,
        query: &Query,
        weights: Option<&FeedbackWeights>,
    ) -> Result<Vec<SearchResult>> {
        for attempt in 1..=MAX_RANKING_ATTEMPTS {
            let generation = self.reader.generation();
            let ranked = self.rank_once(query, weights);
            if self.reader.generation() == generation {
                return ranked;
            }
            tracing::debug!(attempt, generation, "index refreshed while ranking, retrying");
        }
        Err(FeedrankError::unavailable(format!(
            "index generation changed during {MAX_RANKING_ATTEMPTS} ranking attempts"
        )))
    }

    fn rank_once(
        &self,
        query: &Query,
        weights: Option<&FeedbackWeights>,
    ) -> Result<Vec<SearchResult>> {
        let mut scores: AHashMap<u32, f64> = AHashMap::new();
        let mut aggregates: AHashMap<String, FieldAggregate> = AHashMap::new();

        for term in query.extract_terms() {
            let df = self.reader.term_document_frequency(&term.field, &term.term)?;
            if df == 0 {
                continue;
            }

            let aggregate = match aggregates.get(&term.field) {
                Some(aggregate) => *aggregate,
                None => {
                    let aggregate = self.reader.aggregate(&term.field)?;
                    aggregates.insert(term.field.clone(), aggregate);
                    aggregate
                }
            };
            let avg_doc_len = aggregate.avg_length();

            for posting in self.reader.term_postings(&term.field, &term.term)? {
                let doc_len = self.reader.doc_length(posting.doc_id, &term.field)?;
                let weight = self.bm25.score(
                    posting.term_freq,
                    aggregate.record_count,
                    doc_len,
                    avg_doc_len,
                    1,
                    df,
                );
                *scores.entry(posting.doc_id).or_insert(0.0) += weight * term.boost;
            }
        }

        let mut ranked: Vec<(u32, f64)> = scores
            .into_iter()
            .map(|(doc_id, score)| match weights.and_then(|w| w.get(doc_id)) {
                Some(weight) => (doc_id, score * weight),
                None => (doc_id, score),
            })
            .collect();
        ranked.sort_unstable_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.truncate(self.top_k);

        let results = ranked
            .into_iter()
            .map(|(doc_id, score)| self.to_result(doc_id, score))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            query = %query,
            results = results.len(),
            top_score = results.first().map(|r| r.score),
            reranked = weights.is_some(),
            "ranked query"
        );
        Ok(results)
    }

    fn to_result(&self, doc_id: u32, score: f64) -> Result<SearchResult> {
        let external_id = self
            .reader
            .stored_field(doc_id, &self.id_field)?
            .unwrap_or_default();
        let snippet = self
            .reader
            .stored_field(doc_id, &self.snippet_field)?
            .map(|text| make_snippet(&text, self.snippet_length))
            .unwrap_or_default();

        Ok(SearchResult {
            internal_id: doc_id,
            external_id,
            score,
            snippet,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::StandardAnalyzer;
    use crate::index::{Document, IndexWriter, SnapshotReader};
    use crate::storage::MemoryStorage;

    fn ranker(texts: &[&str], config: EngineConfig) -> Ranker {
        let storage = Arc::new(MemoryStorage::new());
        let analyzer = Arc::new(StandardAnalyzer::new().unwrap());
        let mut writer = IndexWriter::open(storage.clone(), analyzer.clone()).unwrap();
        for (i, text) in texts.iter().enumerate() {
            writer
                .add_document(
                    Document::builder()
                        .add_keyword("docid", format!("d{i}"))
                        .add_text("content", *text)
                        .build(),
                )
                .unwrap();
        }
        writer.commit().unwrap();

        let reader = Arc::new(AugmentedIndexReader::new(Arc::new(
            SnapshotReader::open(storage).unwrap(),
        )));
        let parser = Arc::new(QueryParser::new(analyzer, "content"));
        Ranker::new(reader, parser, &config)
    }

    #[test]
    fn test_scores_accumulate_across_terms() {
        let ranker = ranker(&["x y", "x z", "q r", "s w", "u v"], EngineConfig::default());

        let both = ranker.search_text("x y", None).unwrap();
        let only_x = ranker.search_text("x", None).unwrap();

        assert_eq!(both[0].internal_id, 0);
        assert_eq!(both[0].external_id, "d0");
        assert!(both[0].score > only_x[0].score);
        assert_eq!(both.len(), 2);
    }

    #[test]
    fn test_ties_break_by_internal_id() {
        let ranker = ranker(
            &["same words", "other", "same words", "filler", "more filler"],
            EngineConfig::default(),
        );
        let results = ranker.search_text("same", None).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].score, results[1].score);
        assert_eq!(results[0].internal_id, 0);
        assert_eq!(results[1].internal_id, 2);
    }

    #[test]
    fn test_top_k_truncates() {
        let config = EngineConfig {
            top_k: 2,
            ..EngineConfig::default()
        };
        let ranker = ranker(&["t", "t t", "t t t", "u", "v", "w", "y"], config);
        let results = ranker.search_text("t", None).unwrap();

        assert_eq!(results.len(), 2);
        assert!(results[0].score >= results[1].score);
    }

    #[test]
    fn test_feedback_weights_multiply() {
        let ranker = ranker(
            &["k k k", "k", "other", "more", "words", "here"],
            EngineConfig::default(),
        );
        let plain = ranker.search_text("k", None).unwrap();
        assert_eq!(plain[0].internal_id, 0);

        let mut weights = FeedbackWeights::new();
        weights.add(0, -1.0);
        weights.add(1, 2.0);
        let reranked = ranker.search_text("k", Some(&weights)).unwrap();

        assert_eq!(reranked[0].internal_id, 1);
        assert_eq!(reranked[1].internal_id, 0);
        assert!(reranked[1].score < 0.0);
    }

    #[test]
    fn test_no_matches_and_snippets() {
        let config = EngineConfig {
            snippet_length: 5,
            ..EngineConfig::default()
        };
        let ranker = ranker(&["a quick brown fox"], config);
        assert!(ranker.search_text("zebra", None).unwrap().is_empty());

        let results = ranker.search_text("fox", None).unwrap();
        assert_eq!(results[0].snippet, "a qui...");
    }

    #[test]
    fn test_search_never_mixes_generations() {
        let storage: Arc<dyn crate::storage::Storage> = Arc::new(MemoryStorage::new());
        let analyzer = Arc::new(StandardAnalyzer::new().unwrap());
        let mut writer = IndexWriter::open(storage.clone(), analyzer.clone()).unwrap();

        let mut readers = Vec::new();
        for generation in 0..40 {
            for key in ["d0", "d1", "f0", "f1"] {
                writer.delete_by_key("docid", key).unwrap();
            }
            let (first, second) = if generation % 2 == 0 { ("k k", "k") } else { ("k", "k k") };
            for (key, text) in [("d0", first), ("d1", second), ("f0", "m"), ("f1", "n")] {
                writer
                    .add_document(
                        Document::builder()
                            .add_keyword("docid", key)
                            .add_text("content", text)
                            .build(),
                    )
                    .unwrap();
            }
            writer.commit().unwrap();
            readers.push(Arc::new(SnapshotReader::open(storage.clone()).unwrap()));
        }

        let parser = Arc::new(QueryParser::new(analyzer, "content"));
        let config = EngineConfig::default();
        let expected: Vec<Vec<SearchResult>> = readers[..2]
            .iter()
            .map(|reader| {
                let reader = Arc::new(AugmentedIndexReader::new(reader.clone()));
                Ranker::new(reader, parser.clone(), &config)
                    .search_text("k", None)
                    .unwrap()
            })
            .collect();
        assert_ne!(expected[0], expected[1]);

        let shared = Arc::new(AugmentedIndexReader::new(readers[0].clone()));
        let ranker = Ranker::new(shared.clone(), parser, &config);
        let refresher = std::thread::spawn(move || {
            for reader in readers.into_iter().skip(1) {
                shared.refresh(reader);
                std::thread::sleep(std::time::Duration::from_millis(1));
            }
        });

        while !refresher.is_finished() {
            let results = ranker.search_text("k", None).unwrap();
            assert!(expected.contains(&results), "mixed generations: {results:?}");
        }
        refresher.join().unwrap();
    }
}
