//! # Reasoning Benchmarks
//!
//! Performance benchmarks for shingling, graph building and export.
//!
//! Run with: `cargo bench -p cairn-core`

use cairn_core::ngram::shingles;
use cairn_core::{
    Confidence, KnowledgeUnit, NGramSimilarityIndex, Promoter, ReasoningConfig,
    ReasoningGraphBuilder, RetrievalHit, Source, canonical_digest,
};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

const TOPICS: &[&str] = &["memory", "habit", "attention", "emotion", "will", "instinct"];

/// Create a corpus of N claims over a handful of recurring topics.
fn create_corpus(size: usize) -> Vec<KnowledgeUnit> {
    (0..size)
        .map(|i| {
            let topic = TOPICS[i % TOPICS.len()];
            KnowledgeUnit::new(
                format!("The study of {topic} shows effect number {} in trial {}.", i % 11, i),
                vec![Source {
                    path_relative: format!("doc{}.pdf", i % 13),
                    chunk_id: i.to_string(),
                    ..Source::default()
                }],
                Confidence::Medium,
                topic,
            )
        })
        .collect()
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_shingles(c: &mut Criterion) {
    let claim = "Memory is the retention of past impressions, and habit is its flywheel.";
    c.bench_function("shingles", |b| b.iter(|| black_box(shingles(black_box(claim)))));
}

fn bench_similarity_index(c: &mut Criterion) {
    let mut group = c.benchmark_group("similarity_index");

    for size in [100, 500].iter() {
        let corpus = create_corpus(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(NGramSimilarityIndex::build(&corpus)));
        });
    }

    group.finish();
}

fn bench_graph_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_build");
    group.sample_size(10);

    for size in [50, 200, 500].iter() {
        let corpus = create_corpus(*size);
        let builder = ReasoningGraphBuilder::new(ReasoningConfig::default());
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(builder.build(&corpus).expect("build")));
        });
    }

    group.finish();
}

fn bench_promotion(c: &mut Criterion) {
    let hits: Vec<RetrievalHit> = (0..1000)
        .map(|i| {
            RetrievalHit::new(
                format!("Preamble sentence {i}. Memory retention result {i} holds. Closing remark."),
                Source {
                    path_relative: format!("doc{i}.pdf"),
                    ..Source::default()
                },
                0.6,
            )
        })
        .collect();
    let promoter = Promoter::default();

    c.bench_function("prepare_1000_hits", |b| {
        b.iter(|| black_box(promoter.prepare(&hits, "memory retention").expect("prepare")));
    });
}

fn bench_canonical_digest(c: &mut Criterion) {
    let mut group = c.benchmark_group("canonical_digest");

    for size in [100, 500].iter() {
        let corpus = create_corpus(*size);
        let graph = ReasoningGraphBuilder::new(ReasoningConfig::default())
            .build(&corpus)
            .expect("build");
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(canonical_digest(&corpus, &graph.units).expect("digest")));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_shingles,
    bench_similarity_index,
    bench_graph_build,
    bench_promotion,
    bench_canonical_digest
);
criterion_main!(benches);
