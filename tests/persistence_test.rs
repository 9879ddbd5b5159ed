use std::sync::Arc;

use tempfile::TempDir;

use feedrank::config::EngineConfig;
use feedrank::error::FeedrankError;
use feedrank::index::{Document, FieldValue};
use feedrank::search::SearchEngine;
use feedrank::stats::codec;
use feedrank::storage::{FileStorage, Storage};

fn doc(id: &str, text: &str) -> Document {
    Document::builder()
        .add_keyword("docid", id)
        .add_text("content", text)
        .build()
}

fn write(storage: Arc<dyn Storage>, docs: &[(&str, &str)]) -> u64 {
    let mut writer = SearchEngine::writer_for(storage).unwrap();
    for (id, text) in docs {
        writer.add_document(doc(id, text)).unwrap();
    }
    let generation = writer.commit().unwrap();
    writer.close().unwrap();
    generation
}

#[test]
fn test_reopen_from_disk() {
    let dir = TempDir::new().unwrap();
    let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(dir.path()).unwrap());
    write(
        storage,
        &[
            ("a", "persistent storage engine"),
            ("b", "volatile memory cache"),
            ("c", "network protocol stack"),
        ],
    );

    let engine = SearchEngine::open_dir(dir.path(), EngineConfig::default()).unwrap();
    let results = engine.search("storage").unwrap();
    assert_eq!(results[0].external_id, "a");
    assert_eq!(results[0].snippet, "persistent storage engine");

    let stat = engine.reader().doc_stat(0, "content").unwrap();
    assert_eq!(stat.token_count, 3);
    assert_eq!(stat.unique_term_count, 3);
}

#[test]
fn test_statistics_side_field_is_stored() {
    let dir = TempDir::new().unwrap();
    let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(dir.path()).unwrap());
    write(storage, &[("a", "one two two three")]);

    let engine = SearchEngine::open_dir(dir.path(), EngineConfig::default()).unwrap();
    let reader = engine.reader().handle().unwrap();
    let stored = reader.document(0).unwrap();

    let side = stored.get(&codec::stats_field_name("content")).unwrap();
    let FieldValue::Binary(bytes) = &side.value else {
        panic!("statistics must be binary");
    };
    let stat = codec::decode(Some(bytes.as_slice())).unwrap();
    assert_eq!((stat.token_count, stat.unique_term_count), (4, 3));

    // The side field is never searchable.
    assert_eq!(reader.doc_freq("content_etdat", "one").unwrap(), 0);
}

#[test]
fn test_missing_index_is_unavailable() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope");
    assert!(matches!(
        SearchEngine::open_dir(&missing, EngineConfig::default()),
        Err(e) if e.is_unavailable()
    ));

    // An existing directory without a commit is just as unusable.
    assert!(matches!(
        SearchEngine::open_dir(dir.path(), EngineConfig::default()),
        Err(FeedrankError::IndexUnavailable(_))
    ));
}

#[test]
fn test_single_writer_lock() {
    let dir = TempDir::new().unwrap();
    let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(dir.path()).unwrap());

    let first = SearchEngine::writer_for(storage.clone()).unwrap();
    assert!(matches!(
        SearchEngine::writer_for(storage.clone()),
        Err(FeedrankError::Index(_))
    ));
    drop(first);
    assert!(SearchEngine::writer_for(storage).is_ok());
}

#[test]
fn test_generations_and_retention() {
    let dir = TempDir::new().unwrap();
    let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(dir.path()).unwrap());

    assert_eq!(write(storage.clone(), &[("a", "first")]), 1);
    let engine = SearchEngine::open_dir(dir.path(), EngineConfig::default()).unwrap();

    assert_eq!(write(storage.clone(), &[("b", "second")]), 2);
    assert_eq!(write(storage.clone(), &[("c", "third")]), 3);

    let mut snapshots: Vec<String> = storage
        .list_files()
        .unwrap()
        .into_iter()
        .filter(|name| name.starts_with("snapshot_"))
        .collect();
    snapshots.sort();
    assert_eq!(snapshots, vec!["snapshot_2.bin", "snapshot_3.bin"]);

    // The open engine still serves generation 1 until it reloads.
    assert_eq!(engine.generation(), 1);
    assert!(engine.search("third").unwrap().is_empty());
    assert!(engine.reload().unwrap());
    assert_eq!(engine.generation(), 3);
    assert_eq!(engine.search("third").unwrap()[0].external_id, "c");
}

#[test]
fn test_update_replaces_document() {
    let dir = TempDir::new().unwrap();
    let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(dir.path()).unwrap());
    write(storage.clone(), &[("a", "old text"), ("b", "other words"), ("c", "more")]);

    let mut writer = SearchEngine::writer_for(storage).unwrap();
    writer.update_document("docid", "a", doc("a", "new text")).unwrap();
    writer.commit().unwrap();
    drop(writer);

    let engine = SearchEngine::open_dir(dir.path(), EngineConfig::default()).unwrap();
    assert_eq!(engine.reader().max_doc().unwrap(), 3);
    assert!(engine.search("old").unwrap().is_empty());
    assert_eq!(engine.search("new").unwrap()[0].external_id, "a");
}
