//! Chunking properties over a synthetic survey.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use mesh_types::{IndexedMesh, planar_grid};
use nalgebra::Matrix4;
use projection_chunk::{Chunk, ChunkParams, chunk_mesh};
use sensor_types::{Camera, CameraIntrinsics, CameraSet, GeoAnchor, LocalTangentPlane};

// =============================================================================
// Scene
// =============================================================================

/// A 3 x 3 flight grid of cameras every 40 m, centered on the origin.
fn survey() -> CameraSet {
    let plane = LocalTangentPlane::new(GeoAnchor::new(8.5, 47.3));
    let mut cameras = Vec::new();
    for row in -1..=1 {
        for col in -1..=1 {
            let anchor = plane.to_geodetic([f64::from(col) * 40.0, f64::from(row) * 40.0, 0.0]);
            cameras.push(
                Camera::new(
                    CameraIntrinsics::ideal(100.0, 64, 64),
                    Matrix4::identity(),
                    GeoAnchor::new(anchor.lon, anchor.lat),
                    format!("img_{row}_{col}.jpg"),
                )
                .unwrap(),
            );
        }
    }
    CameraSet::new(cameras)
}

/// A 120 m square of 5 m cells centered on the origin.
fn terrain() -> IndexedMesh {
    let mut mesh = planar_grid(24, 24, 5.0);
    for v in &mut mesh.vertices {
        v.position.x -= 60.0;
        v.position.y -= 60.0;
    }
    mesh
}

fn collect(mesh: &IndexedMesh, cameras: &CameraSet, params: &ChunkParams) -> Vec<Chunk> {
    chunk_mesh(mesh, cameras, params)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap()
}

/// Number of chunks holding each parent face.
fn count_by_face(chunks: &[Chunk], face_count: usize) -> Vec<usize> {
    let mut out = vec![0; face_count];
    for chunk in chunks {
        for parent in chunk.face_ids.iter() {
            out[parent as usize] += 1;
        }
    }
    out
}

// =============================================================================
// Properties
// =============================================================================

#[test]
fn same_seed_same_chunks() {
    let (mesh, cameras) = (terrain(), survey());
    let params = ChunkParams::default().num_clusters(3).buffer_meters(15.0).seed(17);

    let a = collect(&mesh, &cameras, &params);
    let b = collect(&mesh, &cameras, &params);
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(&b) {
        assert_eq!(x.cluster, y.cluster);
        assert_eq!(x.camera_indices, y.camera_indices);
        assert_eq!(x.face_ids, y.face_ids);
    }
}

#[test]
fn every_camera_lands_in_one_chunk() {
    let (mesh, cameras) = (terrain(), survey());
    let params = ChunkParams::default().num_clusters(4).buffer_meters(20.0);
    let chunks = collect(&mesh, &cameras, &params);

    let mut seen: Vec<usize> = chunks.iter().flat_map(|c| c.camera_indices.iter().copied()).collect();
    seen.sort_unstable();
    assert_eq!(seen, (0..cameras.len()).collect::<Vec<_>>());
}

#[test]
fn boundary_faces_shared_between_chunks() {
    let (mesh, cameras) = (terrain(), survey());
    let params = ChunkParams::default().num_clusters(3).buffer_meters(25.0).seed(2);
    let chunks = collect(&mesh, &cameras, &params);
    assert!(chunks.len() >= 2);

    let membership = count_by_face(&chunks, mesh.face_count());
    assert!(
        membership.iter().any(|&n| n >= 2),
        "a 25 m buffer around cameras 40 m apart must overlap"
    );
    // Every face lies within 25 m of some camera of the grid.
    assert!(membership.iter().all(|&n| n >= 1));
}

#[test]
fn chunk_faces_map_back_to_parent_geometry() {
    let (mesh, cameras) = (terrain(), survey());
    let chunks = collect(&mesh, &cameras, &ChunkParams::default().num_clusters(2).buffer_meters(10.0));

    for chunk in &chunks {
        for (local, parent) in chunk.face_ids.iter().enumerate() {
            let a = chunk.mesh.face_centroid(local).unwrap();
            let b = mesh.face_centroid(parent as usize).unwrap();
            assert!((a - b).norm() < 1e-12);
        }
    }
}

#[test]
fn single_camera_chunk() {
    let mesh = terrain();
    let cameras = CameraSet::single(survey().get(4).unwrap().clone());
    let params = ChunkParams::default().num_clusters(3).buffer_meters(12.0);
    let chunks = collect(&mesh, &cameras, &params);

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].camera_indices, vec![0]);
    assert!(chunks[0].face_count() < mesh.face_count());
}
