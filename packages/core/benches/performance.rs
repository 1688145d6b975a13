//! Performance benchmarks for ContentRepo core operations
//!
//! Run with: `cargo bench -p contentrepo-core`
//!
//! These benchmarks measure critical path performance against the in-memory
//! backend:
//! - Node creation (collision check, index assignment, insert)
//! - Path lookups through a two-level workspace overlay
//! - Publishing a workspace into live
//! - Rename cascades over a subtree

use contentrepo_core::config::ContentRepositoryConfig;
use contentrepo_core::services::ContentRepository;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;

/// Repository with `count` children below `/bench` in live
async fn setup_tree(count: usize) -> ContentRepository {
    let repository = ContentRepository::in_memory(ContentRepositoryConfig::default()).unwrap();
    let mut live = repository.create_context("live");
    let root = live.get_root_node().await.unwrap();
    let parent = live.create_node(&root, "bench", None).await.unwrap();
    for i in 0..count {
        live.create_node(&parent, &format!("node-{}", i), None)
            .await
            .unwrap();
    }
    repository
}

/// Benchmark child node creation
fn bench_create_node(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    c.bench_function("create_node", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let repository = setup_tree(0).await;
                let mut context = repository.create_context("live");
                let parent = context.get_node("/bench").await.unwrap().unwrap();

                let start = Instant::now();
                for i in 0..iters {
                    let node = context
                        .create_node(&parent, &format!("child-{}", i), None)
                        .await
                        .unwrap();
                    black_box(node);
                }
                start.elapsed()
            })
        })
    });
}

/// Benchmark path lookups from a branch on top of live
fn bench_overlay_lookup(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let repository = rt.block_on(setup_tree(500));

    c.bench_function("get_node_through_overlay", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let mut context = repository.create_context("user-bench");
                context.get_workspace(true).await.unwrap();

                let start = Instant::now();
                for i in 0..iters {
                    let path = format!("/bench/node-{}", i % 500);
                    black_box(context.get_node(&path).await.unwrap());
                }
                start.elapsed()
            })
        })
    });
}

/// Benchmark publishing 100 new records
fn bench_publish(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("publish");
    group.sample_size(10);
    group.bench_function("publish_100_nodes", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let mut total = Duration::ZERO;
                for _ in 0..iters {
                    let repository = setup_tree(0).await;
                    let mut context = repository.create_context("user-bench");
                    let parent = context.get_node("/bench").await.unwrap().unwrap();
                    for i in 0..100 {
                        context
                            .create_node(&parent, &format!("draft-{}", i), None)
                            .await
                            .unwrap();
                    }
                    let workspace = context.get_workspace(false).await.unwrap().unwrap();

                    let start = Instant::now();
                    let count = repository
                        .workspace_service()
                        .publish(&workspace, "live")
                        .await
                        .unwrap();
                    total += start.elapsed();
                    black_box(count);
                }
                total
            })
        })
    });
    group.finish();
}

/// Benchmark renaming a parent with 200 descendants
fn bench_rename_cascade(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("rename");
    group.sample_size(10);
    group.bench_function("set_path_200_descendants", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let mut total = Duration::ZERO;
                for _ in 0..iters {
                    let repository = setup_tree(200).await;
                    let mut context = repository.create_context("live");
                    let parent = context.get_node("/bench").await.unwrap().unwrap();

                    let start = Instant::now();
                    let moved = repository
                        .node_service()
                        .set_path(&parent, "/moved", true)
                        .await
                        .unwrap();
                    total += start.elapsed();
                    black_box(moved);
                }
                total
            })
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_create_node,
    bench_overlay_lookup,
    bench_publish,
    bench_rename_cascade
);
criterion_main!(benches);
