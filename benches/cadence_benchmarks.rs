//! # Cadence Performance Benchmarks
//!
//! Benchmarks for the paths that run on every user command or queue build.
//!
//! ## Benchmark Categories
//!
//! - **Sampler**: weighted queue building across catalog sizes
//! - **Shuffle**: Fisher-Yates with current-track tracking
//! - **Queue**: bulk album adds and shuffle toggling
//!
//! ## Running Benchmarks
//!
//! ```bash
//! cargo bench
//! cargo bench sampler
//! ```

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::hint::black_box;

use cadence::algorithm::{build_weighted, SamplerConfig};
use cadence::catalog::{Catalog, TrackRef};
use cadence::queue::QueueModel;
use cadence::scores::{ListeningScore, MemoryScoreStore, ScoreStore};
use cadence::shuffle::shuffle_tracking;

fn create_catalog(albums: usize, per_album: usize) -> Catalog {
    Catalog::from_albums((0..albums).map(|a| {
        (
            format!("/music/Artist {}/Album {a}", a % 37),
            (0..per_album).map(|t| format!("{t:02} Track.flac")).collect::<Vec<_>>(),
        )
    }))
}

/// Scores for roughly a third of the catalog, spread over the whole range
fn create_scores(catalog: &Catalog) -> MemoryScoreStore {
    let mut store = MemoryScoreStore::new();
    for (i, track) in catalog.tracks().enumerate().filter(|(i, _)| i % 3 == 0) {
        #[allow(clippy::cast_precision_loss)]
        let ratio = (i % 10) as f64 / 10.0;
        let entry = ListeningScore {
            count: 4,
            score_sum: 4.0 * ratio,
        };
        let _ = store.put(&track.path(), entry);
    }
    store
}

fn benchmark_sampler(c: &mut Criterion) {
    let mut group = c.benchmark_group("sampler");

    for albums in [10usize, 100, 1000] {
        let catalog = create_catalog(albums, 12);
        let scores = create_scores(&catalog);
        group.bench_with_input(
            BenchmarkId::new("build_weighted", catalog.track_count()),
            &catalog,
            |b, catalog| {
                let mut rng = StdRng::seed_from_u64(42);
                b.iter(|| build_weighted(black_box(catalog), &scores, SamplerConfig::default(), &mut rng));
            },
        );
    }

    group.finish();
}

fn benchmark_shuffle(c: &mut Criterion) {
    let mut group = c.benchmark_group("shuffle");

    for len in [50usize, 500, 5000] {
        let tracks: Vec<TrackRef> = (0..len).map(|i| TrackRef::new("/music/A", format!("{i}.mp3"))).collect();
        group.bench_with_input(BenchmarkId::new("shuffle_tracking", len), &tracks, |b, tracks| {
            let mut rng = StdRng::seed_from_u64(7);
            b.iter_batched(
                || tracks.clone(),
                |mut tracks| shuffle_tracking(&mut tracks, Some(len / 2), &mut rng),
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn benchmark_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue");
    let catalog = create_catalog(200, 12);
    let album_ids: Vec<String> = catalog.albums().map(|(id, _)| id.to_string()).collect();

    group.bench_function("add_200_albums", |b| {
        let mut rng = StdRng::seed_from_u64(1);
        b.iter(|| {
            let mut queue = QueueModel::new();
            for id in &album_ids {
                let _ = queue.add_album(&catalog, id, &mut rng);
            }
            black_box(queue.len())
        });
    });

    group.bench_function("toggle_shuffle_2400", |b| {
        let mut rng = StdRng::seed_from_u64(2);
        let mut queue = QueueModel::new();
        for id in &album_ids {
            let _ = queue.add_album(&catalog, id, &mut rng);
        }
        b.iter(|| {
            queue.toggle_shuffle(&mut rng);
            black_box(queue.current_index())
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark_sampler, benchmark_shuffle, benchmark_queue);
criterion_main!(benches);
