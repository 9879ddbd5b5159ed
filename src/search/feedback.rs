//! Relevance feedback: term extraction and query reformulation.
//!
//! Both feedback loops share [`TermSelector`]: the term-frequency vectors of
//! a set of documents are merged, terms are ranked by merged frequency, and
//! every term whose frequency is at least `cutoff` times that of the top
//! term is kept, up to `max_terms`. The kept terms form a disjunctive
//! [`ReformulatedQuery`].
//!
//! User feedback arrives as a [`FeedbackSpec`], parsed once at the boundary:
//!
//! ```
//! use feedrank::search::feedback::{Direction, FeedbackSpec};
//!
//! let spec = FeedbackSpec::parse("-5,12,7").unwrap();
//! assert_eq!(spec.signals()[0].doc_id, 5);
//! assert_eq!(spec.signals()[0].direction, Direction::Down);
//! assert_eq!(spec.signals()[1].direction, Direction::Up);
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::config::FeedbackConfig;
use crate::error::{FeedrankError, Result};
use crate::query::{BooleanQuery, Occur, Query, TermQuery};
use crate::search::result::SearchResult;
use crate::stats::AugmentedIndexReader;

/// Whether the user liked a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
}

/// One feedback signal on one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackSignal {
    pub doc_id: u32,
    pub direction: Direction,
}

impl FeedbackSignal {
    pub fn up(doc_id: u32) -> Self {
        FeedbackSignal {
            doc_id,
            direction: Direction::Up,
        }
    }

    pub fn down(doc_id: u32) -> Self {
        FeedbackSignal {
            doc_id,
            direction: Direction::Down,
        }
    }
}

impl FromStr for FeedbackSignal {
    type Err = FeedrankError;

    /// Parse `12` or `+12` as up and `-12` as down.
    fn from_str(token: &str) -> Result<Self> {
        let token = token.trim();
        let (direction, digits) = match token.strip_prefix('-') {
            Some(rest) => (Direction::Down, rest),
            None => (Direction::Up, token.strip_prefix('+').unwrap_or(token)),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(FeedrankError::other(format!(
                "invalid feedback reference '{token}'"
            )));
        }
        let doc_id = digits.parse().map_err(|_| {
            FeedrankError::other(format!("feedback reference '{token}' is out of range"))
        })?;
        Ok(FeedbackSignal { doc_id, direction })
    }
}

impl fmt::Display for FeedbackSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            Direction::Up => write!(f, "{}", self.doc_id),
            Direction::Down => write!(f, "-{}", self.doc_id),
        }
    }
}

/// A typed list of feedback signals. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackSpec {
    signals: Vec<FeedbackSignal>,
}

impl FeedbackSpec {
    /// Parse a comma-separated list such as `-5,12,7`.
    ///
    /// Every token is parsed on its own, so a leading `-` only ever marks
    /// that one reference as "down". Malformed tokens are skipped with a
    /// warning.
    ///
    /// # Returns
    ///
    /// The parsed signals, or `EmptyFeedbackSet` if no token was valid.
    pub fn parse(text: &str) -> Result<Self> {
        let mut signals = Vec::new();
        for token in text.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            match token.parse::<FeedbackSignal>() {
                Ok(signal) => signals.push(signal),
                Err(e) => tracing::warn!(token, error = %e, "skipping feedback reference"),
            }
        }
        Self::from_signals(signals)
    }

    /// Build a spec from already typed signals.
    pub fn from_signals(signals: Vec<FeedbackSignal>) -> Result<Self> {
        if signals.is_empty() {
            return Err(FeedrankError::EmptyFeedbackSet);
        }
        Ok(FeedbackSpec { signals })
    }

    /// The signals in input order, duplicates included.
    pub fn signals(&self) -> &[FeedbackSignal] {
        &self.signals
    }

    /// Distinct referenced document ids in first-seen order.
    pub fn doc_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = Vec::with_capacity(self.signals.len());
        for signal in &self.signals {
            if !ids.contains(&signal.doc_id) {
                ids.push(signal.doc_id);
            }
        }
        ids
    }
}

impl fmt::Display for FeedbackSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, signal) in self.signals.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{signal}")?;
        }
        Ok(())
    }
}

/// Signed per-document weights applied multiplicatively by the ranker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedbackWeights {
    weights: AHashMap<u32, f64>,
}

impl FeedbackWeights {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `weight` to the document's running total.
    pub fn add(&mut self, doc_id: u32, weight: f64) {
        *self.weights.entry(doc_id).or_insert(0.0) += weight;
    }

    /// Accumulate every signal of `spec` using the configured weights.
    pub fn from_spec(spec: &FeedbackSpec, config: &FeedbackConfig) -> Self {
        let mut weights = Self::new();
        for signal in spec.signals() {
            let weight = match signal.direction {
                Direction::Up => config.up_weight,
                Direction::Down => config.down_weight,
            };
            weights.add(signal.doc_id, weight);
        }
        weights
    }

    pub fn get(&self, doc_id: u32) -> Option<f64> {
        self.weights.get(&doc_id).copied()
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

/// The output of term extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReformulatedQuery {
    pub field: String,

    /// Selected terms, most frequent first.
    pub terms: Vec<String>,

    /// Signed query-level boost accumulated from the feedback set.
    pub boost: f64,
}

impl ReformulatedQuery {
    /// The boost actually applied when ranking.
    ///
    /// Direction is carried by [`FeedbackWeights`]; at the query level only
    /// the magnitude counts, and a zero total leaves scores unscaled.
    pub fn effective_boost(&self) -> f64 {
        if self.boost == 0.0 || !self.boost.is_finite() {
            1.0
        } else {
            self.boost.abs()
        }
    }

    /// A disjunction over the selected terms.
    pub fn to_query(&self) -> Query {
        Query::Boolean(BooleanQuery {
            clauses: self
                .terms
                .iter()
                .map(|term| (Occur::Should, Query::Term(TermQuery::new(&self.field, term))))
                .collect(),
            boost: self.effective_boost(),
        })
    }
}

/// Top-term extraction over term-frequency vectors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TermSelector {
    pub cutoff: f64,
    pub max_terms: usize,
}

impl Default for TermSelector {
    fn default() -> Self {
        TermSelector {
            cutoff: 0.5,
            max_terms: 10,
        }
    }
}

impl TermSelector {
    pub fn new(cutoff: f64, max_terms: usize) -> Self {
        TermSelector { cutoff, max_terms }
    }

    /// Select top terms from already merged frequencies.
    ///
    /// Ties are broken lexicographically so the selection is deterministic.
    pub fn select(&self, merged: AHashMap<String, u64>) -> Vec<String> {
        let mut ranked: Vec<(String, u64)> = merged.into_iter().filter(|(_, f)| *f > 0).collect();
        ranked.sort_unstable_by(|a, b| match b.1.cmp(&a.1) {
            Ordering::Equal => a.0.cmp(&b.0),
            other => other,
        });

        let Some(top) = ranked.first().map(|(_, freq)| *freq as f64) else {
            return Vec::new();
        };

        ranked
            .into_iter()
            .take_while(|(_, freq)| *freq as f64 / top >= self.cutoff)
            .take(self.max_terms)
            .map(|(term, _)| term)
            .collect()
    }

    /// Merge the term vectors of `doc_ids` and select top terms.
    ///
    /// Documents that do not exist or have no term vector for `field` are
    /// skipped. If none remain the result is `EmptyFeedbackSet`.
    ///
    /// # Returns
    ///
    /// The selected terms and the number of documents that contributed.
    pub fn extract(
        &self,
        reader: &AugmentedIndexReader,
        doc_ids: &[u32],
        field: &str,
    ) -> Result<(Vec<String>, usize)> {
        let max_doc = reader.max_doc()?;
        let mut merged: AHashMap<String, u64> = AHashMap::new();
        let mut used = 0usize;

        for &doc_id in doc_ids {
            if doc_id >= max_doc {
                tracing::warn!(doc_id, max_doc, "feedback document does not exist");
                continue;
            }
            let Some(vector) = reader.term_vector(doc_id, field)? else {
                tracing::warn!(doc_id, field, "feedback document has no term vector");
                continue;
            };
            used += 1;
            for (term, freq) in vector {
                *merged.entry(term).or_insert(0) += u64::from(freq);
            }
        }

        if used == 0 {
            return Err(FeedrankError::EmptyFeedbackSet);
        }

        let terms = self.select(merged);
        if terms.is_empty() {
            return Err(FeedrankError::EmptyFeedbackSet);
        }
        Ok((terms, used))
    }
}

/// Builds reformulated queries for both feedback loops.
#[derive(Debug, Clone)]
pub struct FeedbackEngine {
    config: FeedbackConfig,
    selector: TermSelector,
    field: String,
}

impl FeedbackEngine {
    /// Create a feedback engine mining `field`.
    pub fn new<S: Into<String>>(config: FeedbackConfig, field: S) -> Self {
        let selector = TermSelector::new(config.top_term_cutoff, config.max_terms);
        FeedbackEngine {
            config,
            selector,
            field: field.into(),
        }
    }

    pub fn selector(&self) -> &TermSelector {
        &self.selector
    }

    /// Reformulate from the top results of a previous query.
    ///
    /// The boost is one relevance increment per result whose term vector
    /// was used.
    pub fn pseudo(
        &self,
        reader: &AugmentedIndexReader,
        results: &[SearchResult],
    ) -> Result<ReformulatedQuery> {
        if results.is_empty() {
            return Err(FeedrankError::EmptyFeedbackSet);
        }
        let doc_ids: Vec<u32> = results.iter().map(|r| r.internal_id).collect();
        let (terms, used) = self.selector.extract(reader, &doc_ids, &self.field)?;
        let boost = self.config.relevance_increment * used as f64;

        tracing::debug!(documents = used, ?terms, boost, "pseudo feedback reformulation");
        Ok(ReformulatedQuery {
            field: self.field.clone(),
            terms,
            boost,
        })
    }

    /// Reformulate from explicit user signals.
    ///
    /// # Returns
    ///
    /// The reformulated query, whose boost is the signed sum of per-signal
    /// query boosts, and the per-document weights for re-ranking.
    pub fn user(
        &self,
        reader: &AugmentedIndexReader,
        spec: &FeedbackSpec,
    ) -> Result<(ReformulatedQuery, FeedbackWeights)> {
        let (terms, _) = self.selector.extract(reader, &spec.doc_ids(), &self.field)?;
        let weights = FeedbackWeights::from_spec(spec, &self.config);
        let boost = spec
            .signals()
            .iter()
            .map(|signal| match signal.direction {
                Direction::Up => self.config.up_query_boost,
                Direction::Down => self.config.down_query_boost,
            })
            .sum();

        tracing::debug!(
            signals = spec.signals().len(),
            ?terms,
            boost,
            "user feedback reformulation"
        );
        Ok((
            ReformulatedQuery {
                field: self.field.clone(),
                terms,
                boost,
            },
            weights,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merged(pairs: &[(&str, u64)]) -> AHashMap<String, u64> {
        pairs.iter().map(|(t, f)| (t.to_string(), *f)).collect()
    }

    #[test]
    fn test_parse_signed_references() {
        let spec = FeedbackSpec::parse("-5,12, 7,+3").unwrap();
        assert_eq!(
            spec.signals(),
            &[
                FeedbackSignal::down(5),
                FeedbackSignal::up(12),
                FeedbackSignal::up(7),
                FeedbackSignal::up(3),
            ]
        );
        assert_eq!(spec.to_string(), "-5,12,7,3");
    }

    #[test]
    fn test_parse_skips_malformed_tokens() {
        let spec = FeedbackSpec::parse("x,--4,7-2,9").unwrap();
        assert_eq!(spec.signals(), &[FeedbackSignal::up(9)]);

        assert!(matches!(
            FeedbackSpec::parse("abc,,-"),
            Err(FeedrankError::EmptyFeedbackSet)
        ));
        assert!(matches!(
            FeedbackSpec::parse(""),
            Err(FeedrankError::EmptyFeedbackSet)
        ));
    }

    #[test]
    fn test_duplicate_signals_accumulate() {
        let config = FeedbackConfig::default();
        let spec = FeedbackSpec::parse("4,4,-6").unwrap();
        let weights = FeedbackWeights::from_spec(&spec, &config);

        let single = FeedbackWeights::from_spec(&FeedbackSpec::parse("4").unwrap(), &config);
        assert_eq!(weights.get(4), Some(2.0 * single.get(4).unwrap()));
        assert_eq!(weights.get(6), Some(-1.0));
        assert_eq!(weights.get(9), None);
        assert_eq!(spec.doc_ids(), vec![4, 6]);
    }

    #[test]
    fn test_select_applies_cutoff() {
        let selector = TermSelector::new(0.5, 10);
        let terms = selector.select(merged(&[("rust", 10), ("safe", 5), ("fast", 4), ("go", 1)]));
        assert_eq!(terms, vec!["rust", "safe"]);
    }

    #[test]
    fn test_select_caps_and_breaks_ties() {
        let selector = TermSelector::new(0.5, 2);
        let terms = selector.select(merged(&[("b", 3), ("a", 3), ("c", 3)]));
        assert_eq!(terms, vec!["a", "b"]);

        assert!(selector.select(AHashMap::new()).is_empty());
    }

    #[test]
    fn test_reformulated_query_boost() {
        let query = ReformulatedQuery {
            field: "content".to_string(),
            terms: vec!["x".to_string(), "y".to_string()],
            boost: -4.0,
        };
        assert_eq!(query.effective_boost(), 4.0);
        let built = query.to_query();
        assert_eq!(built.boost(), 4.0);
        assert_eq!(built.extract_terms().len(), 2);

        let neutral = ReformulatedQuery { boost: 0.0, ..query };
        assert_eq!(neutral.effective_boost(), 1.0);
    }
}
