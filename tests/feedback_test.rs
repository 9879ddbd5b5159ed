use std::sync::Arc;

use feedrank::config::{EngineConfig, FeedbackConfig};
use feedrank::error::FeedrankError;
use feedrank::index::Document;
use feedrank::search::{
    FeedbackEngine, FeedbackSession, FeedbackSpec, SearchEngine, SessionState,
};
use feedrank::storage::{MemoryStorage, Storage};

const CORPUS: &[(&str, &str)] = &[
    ("kernel", "linux kernel scheduler kernel modules"),
    ("driver", "linux driver modules hardware"),
    ("web", "http server routing middleware"),
    ("db", "database index btree pages"),
    ("shell", "bash shell scripting pipes"),
    ("sched", "scheduler latency fairness kernel"),
];

fn engine() -> SearchEngine {
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let mut writer = SearchEngine::writer_for(storage.clone()).unwrap();
    for (id, text) in CORPUS {
        writer
            .add_document(
                Document::builder()
                    .add_keyword("docid", *id)
                    .add_text("content", *text)
                    .build(),
            )
            .unwrap();
    }
    writer.commit().unwrap();
    SearchEngine::open(storage, EngineConfig::default()).unwrap()
}

fn score_of(results: &[feedrank::search::SearchResult], id: &str) -> f64 {
    results
        .iter()
        .find(|r| r.external_id == id)
        .map(|r| r.score)
        .unwrap()
}

#[test]
fn test_pseudo_feedback_term_cutoff() {
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let mut writer = SearchEngine::writer_for(storage.clone()).unwrap();
    for (id, text) in [
        ("top", "alpha alpha alpha alpha beta beta gamma"),
        ("f1", "delta"),
        ("f2", "epsilon"),
    ] {
        writer
            .add_document(
                Document::builder()
                    .add_keyword("docid", id)
                    .add_text("content", text)
                    .build(),
            )
            .unwrap();
    }
    writer.commit().unwrap();
    let engine = SearchEngine::open(storage, EngineConfig::default()).unwrap();

    let results = engine.search("gamma").unwrap();
    let feedback = FeedbackEngine::new(FeedbackConfig::default(), "content");
    let reformulated = feedback.pseudo(engine.reader(), &results).unwrap();

    // beta is exactly half as frequent as alpha; gamma falls below the cutoff.
    assert_eq!(reformulated.terms, vec!["alpha", "beta"]);
    assert_eq!(reformulated.boost, 1.0);
}

#[test]
fn test_pseudo_feedback_without_results_returns_initial() {
    let engine = engine();
    assert!(engine.search_with_pseudo_feedback("nothing").unwrap().is_empty());
}

#[test]
fn test_pseudo_feedback_reaches_related_documents() {
    let engine = engine();
    let plain = engine.search("hardware").unwrap();
    assert_eq!(plain.len(), 1);

    let expanded = engine.search_with_pseudo_feedback("hardware").unwrap();
    let ids: Vec<&str> = expanded.iter().map(|r| r.external_id.as_str()).collect();
    assert_eq!(ids[0], "driver");
    assert!(ids.contains(&"kernel"));
}

#[test]
fn test_duplicate_up_signals_scale_scores() {
    let engine = engine();
    let once = engine
        .search_with_user_feedback(&FeedbackSpec::parse("1").unwrap())
        .unwrap();
    let twice = engine
        .search_with_user_feedback(&FeedbackSpec::parse("1,1").unwrap())
        .unwrap();

    // Both the query boost and the document weight double.
    let ratio = score_of(&twice, "driver") / score_of(&once, "driver");
    assert!((ratio - 4.0).abs() < 1e-9, "ratio was {ratio}");

    // Documents without a weight only see the boost.
    let ratio = score_of(&twice, "kernel") / score_of(&once, "kernel");
    assert!((ratio - 2.0).abs() < 1e-9, "ratio was {ratio}");
}

#[test]
fn test_down_signal_demotes_document() {
    let engine = engine();
    let results = engine
        .search_with_user_feedback(&FeedbackSpec::parse("-0,5").unwrap())
        .unwrap();

    let last = results.last().unwrap();
    assert_eq!(last.external_id, "kernel");
    assert!(last.score < 0.0);
    assert_eq!(results[0].external_id, "sched");
}

#[test]
fn test_unusable_feedback() {
    let engine = engine();
    assert!(matches!(
        engine.search_with_user_feedback(&FeedbackSpec::parse("100,200").unwrap()),
        Err(FeedrankError::EmptyFeedbackSet)
    ));
    assert!(matches!(
        FeedbackSpec::parse("x,y"),
        Err(FeedrankError::EmptyFeedbackSet)
    ));
}

#[test]
fn test_session_round_trip() {
    let engine = engine();
    let mut session = FeedbackSession::new(&engine);

    let initial = session.issue("linux").unwrap().to_vec();
    assert_eq!(initial.len(), 2);

    let spec = FeedbackSpec::parse(&initial[1].internal_id.to_string()).unwrap();
    let reranked = session.apply_feedback(&spec).unwrap();
    assert_eq!(reranked[0].internal_id, initial[1].internal_id);
    assert_eq!(session.state(), SessionState::ResultsReady);

    assert!(session.reformulate_pseudo().unwrap());
    assert_eq!(session.state(), SessionState::QueryReformulated);
    assert!(!session.rerun().unwrap().is_empty());
}

#[test]
fn test_down_vote_demotes_term_shared_by_all_documents() {
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let mut writer = SearchEngine::writer_for(storage.clone()).unwrap();
    for (id, text) in [("A", "x y"), ("B", "x z")] {
        writer
            .add_document(
                Document::builder()
                    .add_keyword("docid", id)
                    .add_text("content", text)
                    .build(),
            )
            .unwrap();
    }
    writer.commit().unwrap();
    let engine = SearchEngine::open(storage, EngineConfig::default()).unwrap();

    let results = engine
        .search_with_user_feedback(&FeedbackSpec::parse("-0,1").unwrap())
        .unwrap();
    assert_eq!(results[0].external_id, "B");
    assert!(results[0].score > 0.0);
    assert_eq!(results[1].external_id, "A");
    assert!(results[1].score < 0.0);
}

#[test]
fn test_pseudo_boost_counts_only_contributing_results() {
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let mut writer = SearchEngine::writer_for(storage.clone()).unwrap();
    writer
        .add_document(
            Document::builder()
                .add_keyword("docid", "text")
                .add_text("content", "alpha beta")
                .build(),
        )
        .unwrap();
    writer
        .add_document(Document::builder().add_keyword("docid", "bare").build())
        .unwrap();
    writer.commit().unwrap();
    let engine = SearchEngine::open(storage, EngineConfig::default()).unwrap();

    let mut results = engine.search("alpha").unwrap();
    assert_eq!(results.len(), 1);
    let template = results[0].clone();
    // A document without a term vector and one that does not exist.
    results.push(feedrank::search::SearchResult {
        internal_id: 1,
        external_id: "bare".to_string(),
        ..template.clone()
    });
    results.push(feedrank::search::SearchResult {
        internal_id: 99,
        external_id: "gone".to_string(),
        ..template
    });

    let feedback = FeedbackEngine::new(FeedbackConfig::default(), "content");
    let reformulated = feedback.pseudo(engine.reader(), &results).unwrap();
    assert_eq!(reformulated.terms, vec!["alpha", "beta"]);
    assert_eq!(reformulated.boost, 1.0);
}
