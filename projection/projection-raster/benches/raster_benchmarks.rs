//! Benchmarks for pix-to-face rasterization.
//!
//! Run with: cargo bench -p projection-raster

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use mesh_types::{IndexedMesh, planar_grid};
use nalgebra::{Rotation3, Translation3, Vector3};
use projection_raster::{ExecutionContext, RasterParams, Rasterizer, RenderCameras};
use sensor_types::{Camera, CameraIntrinsics, GeoAnchor};

// =============================================================================
// Scene Generation
// =============================================================================

fn nadir_cameras(count: usize, size: u32, extent: f64) -> Vec<Camera> {
    let down = Rotation3::from_axis_angle(&Vector3::x_axis(), std::f64::consts::PI);
    (0..count)
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let t = i as f64 / count.max(1) as f64;
            let center = Vector3::new(extent * t, extent * (1.0 - t), 30.0);
            let w2c = Translation3::from(-(down * center)).to_homogeneous() * down.to_homogeneous();
            Camera::new(
                CameraIntrinsics::ideal(f64::from(size), size, size),
                w2c,
                GeoAnchor::new(0.0, 0.0),
                format!("img_{i}"),
            )
            .unwrap()
        })
        .collect()
}

fn scene(cells: u32) -> (IndexedMesh, RenderCameras) {
    let mesh = planar_grid(cells, cells, 1.0);
    let cams = nadir_cameras(8, 256, f64::from(cells));
    let render = RenderCameras::from_cameras(cams.iter()).unwrap();
    (mesh, render)
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_pix_to_face(c: &mut Criterion) {
    let mut group = c.benchmark_group("pix_to_face");

    for cells in [16_u32, 64, 128] {
        let (mesh, cams) = scene(cells);
        group.throughput(Throughput::Elements(mesh.face_count() as u64));

        for cull in [false, true] {
            let raster = Rasterizer::new(
                ExecutionContext::cpu(),
                RasterParams::default().cull_to_frustum(cull),
            )
            .unwrap();
            let label = if cull { "culled" } else { "plain" };
            group.bench_with_input(BenchmarkId::new(label, cells), &cells, |b, _| {
                b.iter(|| raster.pix_to_face(black_box(&cams), black_box(&mesh)));
            });
        }
    }

    group.finish();
}

fn bench_scale(c: &mut Criterion) {
    let mut group = c.benchmark_group("pix_to_face_scale");
    let (mesh, cams) = scene(64);

    for scale in [0.25_f64, 0.5, 1.0] {
        let raster = Rasterizer::new(ExecutionContext::cpu(), RasterParams::default().scale(scale)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(scale), &scale, |b, _| {
            b.iter(|| raster.pix_to_face(black_box(&cams), black_box(&mesh)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_pix_to_face, bench_scale);
criterion_main!(benches);
