//! Okapi BM25 term weighting.
//!
//! ```text
//! K      = k1 * ((1 - b) + b * docLength / avgDocLength)
//! weight = (k1 + 1) * tf / (K + tf) * (k3 + 1) * qtf / (k3 + qtf)
//! score  = weight * ln((N - df + 0.5) / (df + 0.5))
//! ```
//!
//! When the average document length is zero the length normalization
//! collapses to `K = k1 * (1 - b)`. The logarithm argument is floored at
//! `1 + IDF_EPSILON`, so a term found in half the corpus or more still
//! weighs slightly positive and more occurrences never lower a score.
//!
//! # Examples
//!
//! ```
//! use feedrank::scoring::Bm25;
//!
//! let bm25 = Bm25::default();
//! let score = bm25.score(3, 1000, 100, 120.0, 1, 5);
//! assert!((score - 8.47).abs() < 0.01);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{FeedrankError, Result};

/// Margin above 1 for the smallest argument passed to `ln` in the idf factor.
pub const IDF_EPSILON: f64 = 1e-6;

/// BM25 tunables.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bm25Params {
    /// Term-frequency saturation.
    pub k1: f64,

    /// Query-term-frequency saturation.
    pub k3: f64,

    /// Length normalization strength, in `[0, 1]`.
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Bm25Params {
            k1: 1.2,
            k3: 8.0,
            b: 0.75,
        }
    }
}

impl Bm25Params {
    /// Check that the parameters are finite and in range.
    pub fn validate(&self) -> Result<()> {
        if !self.k1.is_finite() || self.k1 < 0.0 {
            return Err(FeedrankError::config(format!("bm25.k1 must be >= 0, got {}", self.k1)));
        }
        if !self.k3.is_finite() || self.k3 < 0.0 {
            return Err(FeedrankError::config(format!("bm25.k3 must be >= 0, got {}", self.k3)));
        }
        if !(0.0..=1.0).contains(&self.b) {
            return Err(FeedrankError::config(format!(
                "bm25.b must be within [0, 1], got {}",
                self.b
            )));
        }
        Ok(())
    }
}

/// The BM25 scoring function.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bm25 {
    params: Bm25Params,
}

impl Bm25 {
    /// Create a scorer with the given parameters.
    pub fn new(params: Bm25Params) -> Self {
        Bm25 { params }
    }

    /// Get the parameters.
    pub fn params(&self) -> &Bm25Params {
        &self.params
    }

    /// Weight of one term in one document.
    ///
    /// # Arguments
    ///
    /// * `tf` - Occurrences of the term in the document
    /// * `n` - Number of documents in the corpus
    /// * `doc_len` - Token count of the document's field
    /// * `avg_doc_len` - Average token count of the field
    /// * `qtf` - Occurrences of the term in the query
    /// * `df` - Number of documents containing the term
    pub fn score(&self, tf: u32, n: u32, doc_len: u32, avg_doc_len: f64, qtf: u32, df: u32) -> f64 {
        let Bm25Params { k1, k3, b } = self.params;
        let tf = f64::from(tf);
        let qtf = f64::from(qtf);

        let k = if avg_doc_len > 0.0 {
            k1 * ((1.0 - b) + b * f64::from(doc_len) / avg_doc_len)
        } else {
            k1 * (1.0 - b)
        };

        let doc_part = if k + tf > 0.0 {
            (k1 + 1.0) * tf / (k + tf)
        } else {
            0.0
        };
        let query_part = if k3 + qtf > 0.0 {
            (k3 + 1.0) * qtf / (k3 + qtf)
        } else {
            0.0
        };

        doc_part * query_part * Self::idf(n, df)
    }

    /// The idf factor `ln((N - df + 0.5) / (df + 0.5))`, floored just above
    /// zero.
    pub fn idf(n: u32, df: u32) -> f64 {
        let n = f64::from(n);
        let df = f64::from(df);
        let ratio = (n - df + 0.5) / (df + 0.5);
        ratio.max(1.0 + IDF_EPSILON).ln()
    }
}
