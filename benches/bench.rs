//! Criterion benchmarks for feedrank.
//!
//! Covers the hot paths of a query:
//! - BM25 term weighting
//! - Field aggregate computation
//! - Ranking with and without feedback

use std::hint::black_box;
use std::sync::Arc;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use feedrank::config::EngineConfig;
use feedrank::index::Document;
use feedrank::scoring::{Bm25, Bm25Params};
use feedrank::search::{FeedbackSpec, SearchEngine};
use feedrank::stats::aggregate::scan_field;
use feedrank::storage::{MemoryStorage, Storage};

/// Generate test documents for benchmarking.
fn generate_test_documents(count: usize) -> Vec<String> {
    let words = [
        "search",
        "engine",
        "index",
        "query",
        "document",
        "field",
        "term",
        "relevance",
        "feedback",
        "score",
        "ranking",
        "statistics",
        "length",
        "frequency",
        "retrieval",
        "boost",
    ];

    (0..count)
        .map(|i| {
            let doc_length = 20 + (i % 60);
            (0..doc_length)
                .map(|j| words[(i * 7 + j * 13 + j / 3) % words.len()])
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

fn build_engine(count: usize, warm_on_open: bool) -> (Arc<dyn Storage>, SearchEngine) {
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let mut writer = SearchEngine::writer_for(storage.clone()).unwrap();
    for (i, text) in generate_test_documents(count).into_iter().enumerate() {
        writer
            .add_document(
                Document::builder()
                    .add_keyword("docid", i.to_string())
                    .add_text("content", text)
                    .build(),
            )
            .unwrap();
    }
    writer.commit().unwrap();
    drop(writer);

    let config = EngineConfig {
        warm_on_open,
        ..EngineConfig::default()
    };
    let engine = SearchEngine::open(storage.clone(), config).unwrap();
    (storage, engine)
}

fn bench_bm25(c: &mut Criterion) {
    let bm25 = Bm25::new(Bm25Params::default());
    let mut group = c.benchmark_group("bm25");
    group.throughput(Throughput::Elements(1000));

    group.bench_function("score_1000", |b| {
        b.iter(|| {
            let mut total = 0.0;
            for tf in 1..=1000u32 {
                total += bm25.score(
                    black_box(tf % 17 + 1),
                    black_box(10_000),
                    black_box(tf % 300 + 10),
                    black_box(120.0),
                    1,
                    black_box(tf % 500 + 1),
                );
            }
            total
        })
    });
    group.finish();
}

fn bench_aggregates(c: &mut Criterion) {
    let (_storage, engine) = build_engine(2_000, false);

    let reader = engine.reader().handle().unwrap();

    c.bench_function("aggregate_scan_2000", |b| {
        b.iter(|| black_box(scan_field(reader.as_ref(), black_box("content"), None).unwrap()))
    });
}

fn bench_ranking(c: &mut Criterion) {
    let (_storage, engine) = build_engine(2_000, true);
    let mut group = c.benchmark_group("ranking");

    group.bench_function("search", |b| {
        b.iter(|| black_box(engine.search("relevance feedback ranking").unwrap()))
    });

    group.bench_function("pseudo_feedback", |b| {
        b.iter(|| black_box(engine.search_with_pseudo_feedback("relevance").unwrap()))
    });

    let spec = FeedbackSpec::parse("1,5,-9").unwrap();
    group.bench_function("user_feedback", |b| {
        b.iter(|| black_box(engine.search_with_user_feedback(&spec).unwrap()))
    });
    group.finish();
}

criterion_group!(benches, bench_bm25, bench_aggregates, bench_ranking);
criterion_main!(benches);
