use criterion::{criterion_group, criterion_main, Criterion};
use docsearch::{InvertedIndex, SearchServer};
use std::sync::Arc;

fn corpus() -> Vec<String> {
    (0..2_000)
        .map(|i| {
            (0..200)
                .map(|j| format!("w{}", (i * 31 + j * 17) % 997))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

fn bench_rebuild(c: &mut Criterion) {
    let docs = corpus();
    let index = InvertedIndex::new().unwrap();
    c.bench_function("rebuild_2000_docs", |b| b.iter(|| index.rebuild(&docs).unwrap()));
}

fn bench_search(c: &mut Criterion) {
    let index = InvertedIndex::new().unwrap();
    index.rebuild(&corpus()).unwrap();
    let server = SearchServer::new(Arc::new(index));
    let queries = ["w1 w2", "w17 w34 w51", "w996", "missing w5"];
    c.bench_function("search_batch", |b| b.iter(|| server.search(&queries)));
}

criterion_group!(benches, bench_rebuild, bench_search);
criterion_main!(benches);
