//! Command implementations for the feedrank CLI.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use crate::cli::args::*;
use crate::cli::output::*;
use crate::config::EngineConfig;
use crate::error::{FeedrankError, Result};
use crate::index::Document;
use crate::search::{FeedbackSpec, SearchEngine};
use crate::storage::FileStorage;

/// Execute a CLI command.
pub fn execute_command(args: FeedrankArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    match &args.command {
        Command::Index(index_args) => index_documents(index_args, config, &args),
        Command::Search(search_args) => search_index(search_args, config, &args),
        Command::Feedback(feedback_args) => search_with_feedback(feedback_args, config, &args),
        Command::Stats(stats_args) => show_stats(stats_args, config, &args),
    }
}

/// Load the engine configuration, falling back to defaults.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading configuration");
            EngineConfig::from_json_file(path)
        }
        None => Ok(EngineConfig::default()),
    }
}

fn with_limit(mut config: EngineConfig, limit: Option<usize>) -> Result<EngineConfig> {
    if let Some(limit) = limit {
        config.top_k = limit;
        config.validate()?;
    }
    Ok(config)
}

/// Convert one JSONL record into a document.
///
/// `id` (string or number) becomes the keyword id field and `content` the
/// default text field. Every other string member is indexed as text under
/// its own name.
pub fn document_from_json(value: &Value, config: &EngineConfig) -> Result<Document> {
    let object = value
        .as_object()
        .ok_or_else(|| FeedrankError::index("document must be a JSON object"))?;

    let id = match object.get("id") {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        _ => return Err(FeedrankError::index("document has no string or numeric \"id\"")),
    };
    let content = object
        .get("content")
        .and_then(Value::as_str)
        .ok_or_else(|| FeedrankError::index(format!("document {id} has no \"content\"")))?;

    let mut doc = Document::new();
    doc.add_keyword(config.id_field.as_str(), id);
    doc.add_text(config.default_field.as_str(), content);
    for (name, value) in object {
        if name == "id" || name == "content" {
            continue;
        }
        if let Some(text) = value.as_str() {
            doc.add_text(name.as_str(), text);
        }
    }
    Ok(doc)
}

/// Add documents from a JSONL file and commit.
fn index_documents(args: &IndexArgs, config: EngineConfig, cli_args: &FeedrankArgs) -> Result<()> {
    let start_time = Instant::now();
    let storage = Arc::new(FileStorage::new(&args.index_path)?);
    let mut writer = SearchEngine::writer_for(storage)?;

    let reader = BufReader::new(File::open(&args.document_file)?);
    let mut added = 0usize;
    let mut skipped = 0usize;

    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let doc = serde_json::from_str::<Value>(&line)
            .map_err(FeedrankError::from)
            .and_then(|value| document_from_json(&value, &config));
        let doc = match doc {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(line = line_num + 1, error = %e, "skipping document");
                skipped += 1;
                continue;
            }
        };

        if args.update {
            let key = doc.text(&config.id_field).unwrap_or_default().to_string();
            writer.update_document(&config.id_field, &key, doc)?;
        } else {
            writer.add_document(doc)?;
        }
        added += 1;
    }

    let generation = writer.commit()?;
    writer.close()?;

    output_result(
        &IndexingResult {
            documents_added: added,
            lines_skipped: skipped,
            generation,
            duration_ms: start_time.elapsed().as_millis() as u64,
        },
        cli_args,
    )
}

/// Rank a free-text query, optionally with pseudo feedback.
fn search_index(args: &SearchArgs, config: EngineConfig, cli_args: &FeedrankArgs) -> Result<()> {
    let config = with_limit(config, args.limit)?;
    let engine = SearchEngine::open_dir(&args.index_path, config)?;

    let start_time = Instant::now();
    let hits = if args.pseudo {
        engine.search_with_pseudo_feedback(&args.query)?
    } else {
        engine.search(&args.query)?
    };

    output_result(
        &RankedResults {
            query: args.query.clone(),
            generation: engine.generation(),
            duration_ms: start_time.elapsed().as_millis() as u64,
            hits,
        },
        cli_args,
    )
}

/// Rank the query reformulated from explicit feedback.
fn search_with_feedback(
    args: &FeedbackArgs,
    config: EngineConfig,
    cli_args: &FeedrankArgs,
) -> Result<()> {
    let spec = FeedbackSpec::parse(&args.spec)?;
    let config = with_limit(config, args.limit)?;
    let engine = SearchEngine::open_dir(&args.index_path, config)?;

    let start_time = Instant::now();
    let hits = engine.search_with_user_feedback(&spec)?;

    output_result(
        &RankedResults {
            query: format!("feedback {spec}"),
            generation: engine.generation(),
            duration_ms: start_time.elapsed().as_millis() as u64,
            hits,
        },
        cli_args,
    )
}

/// Show field statistics.
fn show_stats(args: &StatsArgs, config: EngineConfig, cli_args: &FeedrankArgs) -> Result<()> {
    let field = args
        .field
        .clone()
        .unwrap_or_else(|| config.default_field.clone());
    let engine = SearchEngine::open_dir(&args.index_path, config)?;
    output_result(&engine.field_report(&field)?, cli_args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_document_from_json() {
        let config = EngineConfig::default();
        let doc = document_from_json(
            &json!({ "id": 42, "content": "rust borrow checker", "title": "Ownership", "year": 2015 }),
            &config,
        )
        .unwrap();

        assert_eq!(doc.text("docid"), Some("42"));
        assert_eq!(doc.text("content"), Some("rust borrow checker"));
        assert_eq!(doc.text("title"), Some("Ownership"));
        assert!(doc.get("year").is_none());
    }

    #[test]
    fn test_document_from_json_rejects_incomplete_records() {
        let config = EngineConfig::default();
        assert!(document_from_json(&json!({ "content": "x" }), &config).is_err());
        assert!(document_from_json(&json!({ "id": "a" }), &config).is_err());
        assert!(document_from_json(&json!(["id", "content"]), &config).is_err());
    }

    #[test]
    fn test_index_then_search_commands() {
        let dir = TempDir::new().unwrap();
        let index_path = dir.path().join("index");
        let docs_path = dir.path().join("docs.jsonl");
        std::fs::write(
            &docs_path,
            "{\"id\": \"a\", \"content\": \"rust ownership\"}\n\
             not json\n\
             {\"id\": \"b\", \"content\": \"python packaging\"}\n\
             {\"id\": \"c\", \"content\": \"java build tools\"}\n",
        )
        .unwrap();

        let args = FeedrankArgs {
            verbose: 0,
            quiet: true,
            config: None,
            output_format: OutputFormat::Json,
            command: Command::Index(IndexArgs {
                index_path: index_path.clone(),
                document_file: docs_path,
                update: false,
            }),
        };
        execute_command(args).unwrap();

        let engine = SearchEngine::open_dir(&index_path, EngineConfig::default()).unwrap();
        assert_eq!(engine.reader().max_doc().unwrap(), 3);
        assert_eq!(engine.search("ownership").unwrap()[0].external_id, "a");
    }

    #[test]
    fn test_load_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{ "top_k": 4 }"#).unwrap();

        assert_eq!(load_config(Some(&path)).unwrap().top_k, 4);
        assert_eq!(load_config(None).unwrap(), EngineConfig::default());
        assert!(with_limit(EngineConfig::default(), Some(0)).is_err());
    }
}
