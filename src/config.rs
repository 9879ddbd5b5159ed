//! Engine configuration.
//!
//! [`EngineConfig`] is plain serde data with defaults for every field, so a
//! JSON file only needs to name what it overrides:
//!
//! ```
//! use feedrank::config::EngineConfig;
//!
//! let config: EngineConfig = serde_json::from_str(r#"{ "top_k": 5, "bm25": { "b": 0.5 } }"#).unwrap();
//! assert_eq!(config.top_k, 5);
//! assert_eq!(config.bm25.b, 0.5);
//! assert_eq!(config.bm25.k1, 1.2);
//! assert_eq!(config.feedback.max_terms, 10);
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FeedrankError, Result};
pub use crate::scoring::Bm25Params;
use crate::stats::codec;

/// Tunables of the relevance feedback loops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    /// Minimum frequency ratio to the top term for a term to be selected.
    pub top_term_cutoff: f64,

    /// Maximum number of terms in a reformulated query.
    pub max_terms: usize,

    /// Query boost contributed by each document in pseudo feedback.
    pub relevance_increment: f64,

    /// Per-document weight of one "up" signal.
    pub up_weight: f64,

    /// Per-document weight of one "down" signal.
    pub down_weight: f64,

    /// Query boost of one "up" signal.
    pub up_query_boost: f64,

    /// Query boost of one "down" signal.
    pub down_query_boost: f64,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        FeedbackConfig {
            top_term_cutoff: 0.5,
            max_terms: 10,
            relevance_increment: 1.0,
            up_weight: 1.0,
            down_weight: -1.0,
            up_query_boost: 2.0,
            down_query_boost: -2.0,
        }
    }
}

/// Configuration of a [`SearchEngine`](crate::search::SearchEngine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Field searched by unqualified query words and mined for feedback terms.
    pub default_field: String,

    /// Stored field holding the caller's document identifier.
    pub id_field: String,

    /// Maximum number of results per query.
    pub top_k: usize,

    /// Snippet length in grapheme clusters.
    pub snippet_length: usize,

    pub bm25: Bm25Params,

    pub feedback: FeedbackConfig,

    /// Compute field aggregates when the engine opens or reloads.
    pub warm_on_open: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            default_field: "content".to_string(),
            id_field: "docid".to_string(),
            top_k: 15,
            snippet_length: 150,
            bm25: Bm25Params::default(),
            feedback: FeedbackConfig::default(),
            warm_on_open: true,
        }
    }
}

impl EngineConfig {
    /// Load a configuration from a JSON file and validate it.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|e| {
            FeedrankError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: EngineConfig = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON.
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data)?;
        Ok(())
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        self.bm25.validate()?;

        for (name, field) in [("default_field", &self.default_field), ("id_field", &self.id_field)] {
            codec::validate_field_name(field)
                .map_err(|e| FeedrankError::config(format!("{name}: {e}")))?;
        }
        if self.top_k == 0 {
            return Err(FeedrankError::config("top_k must be at least 1"));
        }

        let feedback = &self.feedback;
        if !(feedback.top_term_cutoff > 0.0 && feedback.top_term_cutoff <= 1.0) {
            return Err(FeedrankError::config(format!(
                "feedback.top_term_cutoff must be within (0, 1], got {}",
                feedback.top_term_cutoff
            )));
        }
        if feedback.max_terms == 0 {
            return Err(FeedrankError::config("feedback.max_terms must be at least 1"));
        }
        let constants = [
            feedback.relevance_increment,
            feedback.up_weight,
            feedback.down_weight,
            feedback.up_query_boost,
            feedback.down_query_boost,
        ];
        if constants.iter().any(|value| !value.is_finite()) {
            return Err(FeedrankError::config("feedback weights must be finite"));
        }
        Ok(())
    }
}
