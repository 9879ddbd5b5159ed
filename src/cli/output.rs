//! Output formatting for CLI commands.

use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use crate::cli::args::{FeedrankArgs, OutputFormat};
use crate::error::Result;
use crate::search::{FieldReport, SearchResult};

/// Result structure for document indexing.
#[derive(Debug, Serialize, Deserialize)]
pub struct IndexingResult {
    pub documents_added: usize,
    pub lines_skipped: usize,
    pub generation: u64,
    pub duration_ms: u64,
}

/// Result structure for search and feedback commands.
#[derive(Debug, Serialize, Deserialize)]
pub struct RankedResults {
    pub query: String,
    pub generation: u64,
    pub duration_ms: u64,
    pub hits: Vec<SearchResult>,
}

/// Something the CLI can print for humans.
pub trait HumanOutput {
    fn write_human(&self, out: &mut dyn Write) -> io::Result<()>;
}

impl HumanOutput for IndexingResult {
    fn write_human(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "Indexed {} documents", self.documents_added)?;
        if self.lines_skipped > 0 {
            writeln!(out, "Skipped {} malformed lines", self.lines_skipped)?;
        }
        writeln!(out, "Generation: {}", self.generation)?;
        writeln!(out, "Duration: {}ms", self.duration_ms)
    }
}

impl HumanOutput for RankedResults {
    fn write_human(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "Results for {}", self.query)?;
        writeln!(out, "═══════════════")?;
        if self.hits.is_empty() {
            writeln!(out, "No documents matched.")?;
        }
        for (rank, hit) in self.hits.iter().enumerate() {
            writeln!(out)?;
            writeln!(
                out,
                "{:>3}. [{}] {} (score: {:.4})",
                rank + 1,
                hit.internal_id,
                hit.external_id,
                hit.score
            )?;
            if !hit.snippet.is_empty() {
                writeln!(out, "     {}", hit.snippet)?;
            }
        }
        writeln!(out)?;
        writeln!(
            out,
            "{} results from generation {} in {}ms",
            self.hits.len(),
            self.generation,
            self.duration_ms
        )
    }
}

impl HumanOutput for FieldReport {
    fn write_human(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "Index Statistics:")?;
        writeln!(out, "═════════════════")?;
        writeln!(out, "Generation:        {}", self.generation)?;
        writeln!(out, "Documents:         {}", self.documents)?;
        writeln!(out, "Field:             {}", self.field)?;
        writeln!(out, "Records:           {}", self.record_count)?;
        writeln!(out, "Total length:      {}", self.total_length)?;
        writeln!(out, "Average length:    {:.2}", self.avg_length)?;
        writeln!(out, "Unique terms:      {}", self.unique_terms)
    }
}

/// Output a result in the format selected on the command line.
pub fn output_result<T: Serialize + HumanOutput>(result: &T, args: &FeedrankArgs) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_result(&mut out, result, args.output_format)
}

/// Write a result to `out` in `format`.
pub fn write_result<T: Serialize + HumanOutput>(
    out: &mut dyn Write,
    result: &T,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Human => result.write_human(out)?,
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, result)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results() -> RankedResults {
        RankedResults {
            query: "rust".to_string(),
            generation: 3,
            duration_ms: 1,
            hits: vec![SearchResult {
                internal_id: 7,
                external_id: "doc-7".to_string(),
                score: 1.5,
                snippet: "rust ownership".to_string(),
            }],
        }
    }

    #[test]
    fn test_human_output() {
        let mut out = Vec::new();
        write_result(&mut out, &results(), OutputFormat::Human).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("[7] doc-7 (score: 1.5000)"));
        assert!(text.contains("rust ownership"));
        assert!(text.contains("1 results from generation 3"));
    }

    #[test]
    fn test_json_output() {
        let mut out = Vec::new();
        write_result(&mut out, &results(), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();

        assert_eq!(value["hits"][0]["external_id"], "doc-7");
        assert_eq!(value["hits"][0]["internal_id"], 7);
        assert_eq!(value["generation"], 3);
    }
}
