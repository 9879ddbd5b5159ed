//! Term and boolean queries.

use std::fmt;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// How a clause participates in a boolean query.
///
/// Scoring is disjunctive: `Must` clauses are scored exactly like `Should`
/// clauses. The distinction is kept so parsed queries round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Occur {
    Should,
    Must,
}

/// A single term in a single field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermQuery {
    pub field: String,
    pub term: String,
    pub boost: f64,
}

impl TermQuery {
    /// Create a term query with boost 1.0.
    pub fn new<F: Into<String>, T: Into<String>>(field: F, term: T) -> Self {
        TermQuery {
            field: field.into(),
            term: term.into(),
            boost: 1.0,
        }
    }
}

/// A combination of sub-queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BooleanQuery {
    pub clauses: Vec<(Occur, Query)>,
    pub boost: f64,
}

impl Default for BooleanQuery {
    fn default() -> Self {
        Self::new()
    }
}

impl BooleanQuery {
    /// Create an empty boolean query.
    pub fn new() -> Self {
        BooleanQuery {
            clauses: Vec::new(),
            boost: 1.0,
        }
    }

    /// Add a clause.
    pub fn add_clause(&mut self, occur: Occur, query: Query) {
        self.clauses.push((occur, query));
    }

    /// Add an optional clause.
    pub fn should(mut self, query: Query) -> Self {
        self.add_clause(Occur::Should, query);
        self
    }

    /// Add a required clause.
    pub fn must(mut self, query: Query) -> Self {
        self.add_clause(Occur::Must, query);
        self
    }
}

/// A query the ranker can score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Query {
    Term(TermQuery),
    Boolean(BooleanQuery),
}

/// A distinct `(field, term)` pair with its accumulated boost.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedTerm {
    pub field: String,
    pub term: String,
    pub boost: f64,
}

impl Query {
    /// Shorthand for a term query.
    pub fn term<F: Into<String>, T: Into<String>>(field: F, term: T) -> Self {
        Query::Term(TermQuery::new(field, term))
    }

    /// The query's own boost.
    pub fn boost(&self) -> f64 {
        match self {
            Query::Term(q) => q.boost,
            Query::Boolean(q) => q.boost,
        }
    }

    /// Replace the query's own boost.
    pub fn with_boost(mut self, boost: f64) -> Self {
        match &mut self {
            Query::Term(q) => q.boost = boost,
            Query::Boolean(q) => q.boost = boost,
        }
        self
    }

    /// Whether the query has no terms at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Query::Term(_) => false,
            Query::Boolean(q) => q.clauses.iter().all(|(_, clause)| clause.is_empty()),
        }
    }

    /// Collect distinct `(field, term)` pairs in first-seen order.
    ///
    /// The boost of an occurrence is the product of the boosts on its path
    /// from the root. A term reached through several clauses gets the sum of
    /// those products, so duplicate clauses add up in the score.
    pub fn extract_terms(&self) -> Vec<WeightedTerm> {
        let mut terms = Vec::new();
        let mut index: AHashMap<(String, String), usize> = AHashMap::new();
        self.collect_terms(1.0, &mut terms, &mut index);
        terms
    }

    fn collect_terms(
        &self,
        parent_boost: f64,
        terms: &mut Vec<WeightedTerm>,
        index: &mut AHashMap<(String, String), usize>,
    ) {
        match self {
            Query::Term(q) => {
                let boost = parent_boost * q.boost;
                let key = (q.field.clone(), q.term.clone());
                match index.get(&key) {
                    Some(&i) => terms[i].boost += boost,
                    None => {
                        index.insert(key, terms.len());
                        terms.push(WeightedTerm {
                            field: q.field.clone(),
                            term: q.term.clone(),
                            boost,
                        });
                    }
                }
            }
            Query::Boolean(q) => {
                for (_, clause) in &q.clauses {
                    clause.collect_terms(parent_boost * q.boost, terms, index);
                }
            }
        }
    }
}

impl From<TermQuery> for Query {
    fn from(query: TermQuery) -> Self {
        Query::Term(query)
    }
}

impl From<BooleanQuery> for Query {
    fn from(query: BooleanQuery) -> Self {
        Query::Boolean(query)
    }
}

fn write_boost(f: &mut fmt::Formatter<'_>, boost: f64) -> fmt::Result {
    if boost != 1.0 {
        write!(f, "^{boost}")?;
    }
    Ok(())
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Term(q) => {
                write!(f, "{}:{}", q.field, q.term)?;
                write_boost(f, q.boost)
            }
            Query::Boolean(q) => {
                write!(f, "(")?;
                for (i, (occur, clause)) in q.clauses.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    if *occur == Occur::Must {
                        write!(f, "+")?;
                    }
                    write!(f, "{clause}")?;
                }
                write!(f, ")")?;
                write_boost(f, q.boost)
            }
        }
    }
}
