//! Benchmarks for dense and sparse accumulation.
//!
//! Run with: cargo bench -p projection-accumulate

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use mesh_types::FaceIdMap;
use projection_accumulate::{
    Accumulator, DenseAccumulator, ImageProjection, ProjectedValues, SparseAccumulator, SparseProjection,
};
use projection_raster::ExecutionContext;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// =============================================================================
// Synthetic Projections
// =============================================================================

/// `images` views, each touching `per_image` random faces with random classes.
fn views(faces: u32, classes: u32, images: usize, per_image: usize) -> Vec<ImageProjection> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..images)
        .map(|camera| {
            let start = rng.gen_range(0..faces);
            let pairs = (0..per_image as u32).map(|i| ((start + i) % faces, rng.gen_range(0..classes)));
            ImageProjection {
                camera_index: camera,
                values: ProjectedValues::Sparse(SparseProjection::from_pairs(pairs.collect::<Vec<_>>()).unwrap()),
            }
        })
        .collect()
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("accumulate_add");
    let ctx = ExecutionContext::cpu();
    let faces = 200_000_u32;

    for classes in [4_u32, 32] {
        let input = views(faces, classes, 64, 20_000);
        group.throughput(Throughput::Elements(64 * 20_000));

        group.bench_with_input(BenchmarkId::new("dense", classes), &input, |b, input| {
            b.iter(|| {
                let mut acc = DenseAccumulator::new(faces as usize, classes as usize, &ctx).unwrap();
                for v in input {
                    acc.add(black_box(v)).unwrap();
                }
                acc.normalized()
            });
        });

        group.bench_with_input(BenchmarkId::new("sparse", classes), &input, |b, input| {
            b.iter(|| {
                let mut acc = SparseAccumulator::new(faces as usize, classes as usize, &ctx).unwrap();
                for v in input {
                    acc.add(black_box(v)).unwrap();
                }
                acc.normalized()
            });
        });
    }

    group.finish();
}

fn bench_sparse_identity_classes(c: &mut Criterion) {
    let ctx = ExecutionContext::cpu();
    let faces = 100_000_u32;
    let images = 2_000_u32;
    let input = views(faces, images, images as usize, 2_000);

    c.bench_function("sparse_image_identity", |b| {
        b.iter(|| {
            let mut acc = SparseAccumulator::new(faces as usize, images as usize, &ctx).unwrap();
            for v in &input {
                acc.add(black_box(v)).unwrap();
            }
            acc.flush();
            acc
        });
    });
}

fn bench_merge(c: &mut Criterion) {
    let ctx = ExecutionContext::cpu();
    let mut local = DenseAccumulator::new(50_000, 8, &ctx).unwrap();
    for v in views(50_000, 8, 32, 10_000) {
        local.add(&v).unwrap();
    }
    let map = FaceIdMap::new((0..50_000).map(|f| f * 3).collect());

    c.bench_function("dense_merge", |b| {
        b.iter(|| {
            let mut global = DenseAccumulator::new(150_000, 8, &ctx).unwrap();
            global.merge(black_box(&local), &map).unwrap();
            global
        });
    });
}

criterion_group!(benches, bench_add, bench_sparse_identity_classes, bench_merge);
criterion_main!(benches);
