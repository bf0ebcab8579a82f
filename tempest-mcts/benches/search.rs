use criterion::{criterion_group, criterion_main, Criterion};
use tempest_core::Board;
use tempest_mcts::{SearchLimits, SearchParameters, Searcher};

fn bench_search(c: &mut Criterion) {
    tempest_core::attacks::init();

    c.bench_function("search_4k_nodes_startpos", |b| {
        b.iter(|| {
            let mut searcher = Searcher::new(16);
            searcher.set_position(Board::startpos());
            searcher.search(
                &SearchParameters::silent(Vec::new()),
                &SearchLimits::nodes(4_000),
            )
        })
    });

    c.bench_function("search_4k_nodes_kiwipete", |b| {
        b.iter(|| {
            let mut searcher = Searcher::new(16);
            searcher.set_position(Board::kiwipete());
            searcher.search(
                &SearchParameters::silent(Vec::new()),
                &SearchLimits::nodes(4_000),
            )
        })
    });
}

criterion_group!(benches, bench_search);
criterion_main!(benches);
