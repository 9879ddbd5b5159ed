//! Query parser for converting free text into [`Query`] values.
//!
//! Supported syntax:
//! - Simple terms: `hello`
//! - Field-specific terms: `title:hello`, `title:"hello world"`, `title:(a b)`
//! - Phrases: `"hello world"` (each analyzed term becomes a clause)
//! - Boosts: `hello^2.5`, `"hello world"^2`, `(a b)^0.5`
//! - Required clauses: `+hello`
//! - Grouping and connectors: `(rust OR go) AND book`
//!
//! Text is run through the same analyzer used at index time, so a word that
//! is a stop word simply disappears. A query that analyzes to nothing is an
//! empty boolean query, not an error.

use std::collections::HashSet;
use std::sync::Arc;

use crate::analysis::Analyzer;
use crate::error::{FeedrankError, Result};
use crate::query::query::{BooleanQuery, Occur, Query, TermQuery};

/// Deepest allowed nesting of groups and field prefixes.
pub const MAX_NESTING_DEPTH: usize = 128;

/// A free-text query parser bound to an analyzer.
pub struct QueryParser {
    analyzer: Arc<dyn Analyzer>,

    /// Field to search when none is given.
    default_field: String,

    /// Fields whose values are matched verbatim instead of analyzed.
    keyword_fields: HashSet<String>,
}

impl std::fmt::Debug for QueryParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryParser")
            .field("analyzer", &self.analyzer.name())
            .field("default_field", &self.default_field)
            .field("keyword_fields", &self.keyword_fields)
            .finish()
    }
}

impl QueryParser {
    /// Create a parser searching `default_field`.
    pub fn new<S: Into<String>>(analyzer: Arc<dyn Analyzer>, default_field: S) -> Self {
        QueryParser {
            analyzer,
            default_field: default_field.into(),
            keyword_fields: HashSet::new(),
        }
    }

    /// Match values of `field` verbatim.
    pub fn with_keyword_field<S: Into<String>>(mut self, field: S) -> Self {
        self.keyword_fields.insert(field.into());
        self
    }

    /// Get the default field.
    pub fn default_field(&self) -> &str {
        &self.default_field
    }

    /// Parse a query string.
    ///
    /// # Returns
    ///
    /// The parsed query, or `InvalidQuery` for empty input, unbalanced quotes
    /// or parentheses, an empty field name, a malformed boost or nesting
    /// deeper than [`MAX_NESTING_DEPTH`].
    pub fn parse(&self, text: &str) -> Result<Query> {
        if text.trim().is_empty() {
            return Err(FeedrankError::invalid_query("query is empty"));
        }

        let mut parser = QueryStringParser {
            input: text,
            pos: 0,
            depth: 0,
            owner: self,
        };
        let query = parser.parse_or(&self.default_field)?;

        parser.skip_whitespace();
        match parser.peek() {
            None => {}
            Some(')') => return Err(FeedrankError::invalid_query("unbalanced parentheses")),
            Some(c) => {
                return Err(FeedrankError::invalid_query(format!(
                    "unexpected '{c}' at offset {}",
                    parser.pos
                )));
            }
        }

        let query = match query {
            Some(query @ Query::Boolean(_)) => query,
            Some(query) => Query::Boolean(BooleanQuery::new().should(query)),
            None => Query::Boolean(BooleanQuery::new()),
        };
        tracing::trace!(input = text, parsed = %query, "parsed query");
        Ok(query)
    }

    fn analyze(&self, field: &str, text: &str) -> Result<Option<Query>> {
        let terms = if self.keyword_fields.contains(field) {
            vec![text.to_string()]
        } else {
            self.analyzer.terms(text)?
        };

        let mut queries: Vec<Query> = terms
            .into_iter()
            .map(|term| Query::Term(TermQuery::new(field, term)))
            .collect();
        Ok(match queries.len() {
            0 => None,
            1 => queries.pop(),
            _ => Some(Query::Boolean(BooleanQuery {
                clauses: queries.into_iter().map(|q| (Occur::Should, q)).collect(),
                boost: 1.0,
            })),
        })
    }
}

/// Recursive-descent state over one input string.
struct QueryStringParser<'a> {
    input: &'a str,
    pos: usize,
    depth: usize,
    owner: &'a QueryParser,
}

impl QueryStringParser<'_> {
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn enter(&mut self) -> Result<()> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(FeedrankError::invalid_query(format!(
                "query nests deeper than {MAX_NESTING_DEPTH} levels"
            )));
        }
        self.depth += 1;
        Ok(())
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    /// The next whitespace-delimited connector, if any.
    fn peek_connector(&self) -> Option<&'static str> {
        let rest = self.input[self.pos..].trim_start();
        for connector in ["AND", "OR"] {
            if let Some(after) = rest.strip_prefix(connector)
                && after.chars().next().is_none_or(|c| c.is_whitespace() || c == '(')
            {
                return Some(connector);
            }
        }
        None
    }

    fn consume_connector(&mut self, connector: &str) {
        self.skip_whitespace();
        self.pos += connector.len();
    }

    fn at_clause_end(&mut self) -> bool {
        self.skip_whitespace();
        matches!(self.peek(), None | Some(')'))
    }

    fn parse_or(&mut self, field: &str) -> Result<Option<Query>> {
        let mut alternatives = vec![self.parse_and(field)?];

        while self.peek_connector() == Some("OR") {
            self.consume_connector("OR");
            alternatives.push(self.parse_and(field)?);
        }

        let mut alternatives: Vec<Query> = alternatives.into_iter().flatten().collect();
        Ok(match alternatives.len() {
            0 => None,
            1 => alternatives.pop(),
            _ => Some(Query::Boolean(BooleanQuery {
                clauses: alternatives.into_iter().map(|q| (Occur::Should, q)).collect(),
                boost: 1.0,
            })),
        })
    }

    fn parse_and(&mut self, field: &str) -> Result<Option<Query>> {
        let mut clauses = Vec::new();
        let (occur, query) = self.parse_clause(field)?;
        clauses.push((occur, query));

        loop {
            if self.peek_connector() == Some("AND") {
                self.consume_connector("AND");
                if let Some((occur, _)) = clauses.last_mut() {
                    *occur = Occur::Must;
                }
                let (_, query) = self.parse_clause(field)?;
                clauses.push((Occur::Must, query));
            } else if self.peek_connector() == Some("OR") || self.at_clause_end() {
                break;
            } else {
                clauses.push(self.parse_clause(field)?);
            }
        }

        let mut clauses: Vec<(Occur, Query)> = clauses
            .into_iter()
            .filter_map(|(occur, query)| query.map(|q| (occur, q)))
            .collect();
        Ok(match clauses.len() {
            0 => None,
            1 if clauses[0].0 == Occur::Should => clauses.pop().map(|(_, q)| q),
            _ => Some(Query::Boolean(BooleanQuery {
                clauses,
                boost: 1.0,
            })),
        })
    }

    fn parse_clause(&mut self, field: &str) -> Result<(Occur, Option<Query>)> {
        self.skip_whitespace();
        let occur = if self.peek() == Some('+') {
            self.bump();
            Occur::Must
        } else {
            Occur::Should
        };

        let query = self.parse_primary(field)?;
        let boost = self.parse_boost()?;
        Ok((occur, query.map(|q| match boost {
            Some(boost) => {
                let own = q.boost();
                q.with_boost(own * boost)
            }
            None => q,
        })))
    }

    fn parse_primary(&mut self, field: &str) -> Result<Option<Query>> {
        match self.peek() {
            Some('(') => {
                self.enter()?;
                self.bump();
                let query = self.parse_or(field)?;
                self.skip_whitespace();
                if self.bump() != Some(')') {
                    return Err(FeedrankError::invalid_query("unbalanced parentheses"));
                }
                self.depth -= 1;
                Ok(query)
            }
            Some('"') => {
                let phrase = self.read_phrase()?;
                self.owner.analyze(field, &phrase)
            }
            Some(')') => Err(FeedrankError::invalid_query("unbalanced parentheses")),
            Some('^') => Err(FeedrankError::invalid_query("dangling '^' without a term")),
            None => Err(FeedrankError::invalid_query("expected a term")),
            Some(_) => {
                let word = self.read_word();
                if self.peek() == Some(':') {
                    self.bump();
                    if word.is_empty() {
                        return Err(FeedrankError::invalid_query("empty field name"));
                    }
                    return match self.peek() {
                        Some(c) if c.is_whitespace() => Err(FeedrankError::invalid_query(
                            format!("missing value for field '{word}'"),
                        )),
                        None => Err(FeedrankError::invalid_query(format!(
                            "missing value for field '{word}'"
                        ))),
                        _ => {
                            self.enter()?;
                            let query = self.parse_primary(&word);
                            self.depth -= 1;
                            query
                        }
                    };
                }
                if word.is_empty() {
                    return Err(FeedrankError::invalid_query(format!(
                        "unexpected character at offset {}",
                        self.pos
                    )));
                }
                self.owner.analyze(field, &word)
            }
        }
    }

    fn read_word(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_whitespace() || matches!(c, '(' | ')' | '"' | '^' | ':') {
                break;
            }
            self.bump();
        }
        self.input[start..self.pos].to_string()
    }

    fn read_phrase(&mut self) -> Result<String> {
        self.bump();
        let start = self.pos;
        while let Some(c) = self.bump() {
            if c == '"' {
                return Ok(self.input[start..self.pos - 1].to_string());
            }
        }
        Err(FeedrankError::invalid_query("unbalanced quotes"))
    }

    fn parse_boost(&mut self) -> Result<Option<f64>> {
        if self.peek() != Some('^') {
            return Ok(None);
        }
        self.bump();

        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '.') {
            self.bump();
        }
        let digits = &self.input[start..self.pos];
        if digits.is_empty() {
            return Err(FeedrankError::invalid_query("dangling '^' without a boost"));
        }

        match digits.parse::<f64>() {
            Ok(boost) if boost.is_finite() && boost > 0.0 => Ok(Some(boost)),
            _ => Err(FeedrankError::invalid_query(format!(
                "malformed boost '{digits}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{EnglishAnalyzer, StandardAnalyzer};

    fn parser() -> QueryParser {
        QueryParser::new(Arc::new(StandardAnalyzer::new().unwrap()), "content")
            .with_keyword_field("docid")
    }

    fn terms(query: &Query) -> Vec<(String, String, f64)> {
        query
            .extract_terms()
            .into_iter()
            .map(|t| (t.field, t.term, t.boost))
            .collect()
    }

    #[test]
    fn test_parse_simple_terms() {
        let query = parser().parse("Rust Programming").unwrap();
        assert_eq!(
            terms(&query),
            vec![
                ("content".to_string(), "rust".to_string(), 1.0),
                ("content".to_string(), "programming".to_string(), 1.0),
            ]
        );
    }

    #[test]
    fn test_parse_field_and_boost() {
        let query = parser().parse("title:Rust^2 docid:AbC").unwrap();
        assert_eq!(
            terms(&query),
            vec![
                ("title".to_string(), "rust".to_string(), 2.0),
                ("docid".to_string(), "AbC".to_string(), 1.0),
            ]
        );
    }

    #[test]
    fn test_parse_phrase_and_group() {
        let query = parser()
            .parse("\"memory safety\"^0.5 AND title:(fast OR small)")
            .unwrap();
        let extracted = terms(&query);
        assert_eq!(extracted.len(), 4);
        assert_eq!(extracted[0].2, 0.5);
        assert_eq!(extracted[2].0, "title");

        let Query::Boolean(root) = &query else {
            panic!("expected boolean query");
        };
        assert!(root.clauses.iter().all(|(occur, _)| *occur == Occur::Must));
    }

    #[test]
    fn test_parse_required_clause() {
        let query = parser().parse("+rust book").unwrap();
        let Query::Boolean(root) = &query else {
            panic!("expected boolean query");
        };
        assert_eq!(root.clauses[0].0, Occur::Must);
        assert_eq!(root.clauses[1].0, Occur::Should);
    }

    #[test]
    fn test_stop_words_only_is_empty() {
        let query = parser().parse("the and of").unwrap();
        assert!(query.is_empty());
        assert!(query.extract_terms().is_empty());
    }

    #[test]
    fn test_stemming_applies_to_queries() {
        let parser = QueryParser::new(Arc::new(EnglishAnalyzer::new().unwrap()), "content");
        let query = parser.parse("running").unwrap();
        assert_eq!(query.extract_terms()[0].term, "run");
    }

    #[test]
    fn test_invalid_queries() {
        let parser = parser();
        for bad in [
            "",
            "   ",
            "\"unterminated",
            "(rust",
            "rust)",
            ":rust",
            "title: rust",
            "rust^",
            "^2",
            "rust^abc",
            "rust^0",
        ] {
            assert!(
                matches!(parser.parse(bad), Err(FeedrankError::InvalidQuery(_))),
                "expected InvalidQuery for {bad:?}"
            );
        }
    }

    #[test]
    fn test_nesting_depth_is_limited() {
        let parser = parser();

        let deep = format!("{}x{}", "(".repeat(20_000), ")".repeat(20_000));
        assert!(matches!(parser.parse(&deep), Err(FeedrankError::InvalidQuery(_))));

        let prefixes = format!("{}x", "f:".repeat(20_000));
        assert!(matches!(parser.parse(&prefixes), Err(FeedrankError::InvalidQuery(_))));

        let allowed = format!(
            "{}x{}",
            "(".repeat(MAX_NESTING_DEPTH),
            ")".repeat(MAX_NESTING_DEPTH)
        );
        assert_eq!(parser.parse(&allowed).unwrap().extract_terms().len(), 1);
    }
}
