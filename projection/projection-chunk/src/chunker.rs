//! Cluster cameras and cut the mesh into buffered regions around them.

use mesh_types::{FaceIdMap, IndexedMesh};
use sensor_types::{CameraSet, GeoAnchor, LocalTangentPlane};
use tracing::{debug, info};

use crate::error::{ChunkError, ChunkResult};
use crate::hull::ConvexHull;
use crate::kmeans::{KMeans, kmeans};
use crate::params::{ChunkParams, MeshFrame};

/// One spatial chunk: a sub-mesh and the cameras that look at it.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Cluster id in `0..k`.
    pub cluster: usize,
    /// Extracted faces, re-indexed.
    pub mesh: IndexedMesh,
    /// Parent face index of each chunk face.
    pub face_ids: FaceIdMap,
    /// Cameras of the cluster, sharing the parent set's cameras.
    pub cameras: CameraSet,
    /// Parent index of each chunk camera.
    pub camera_indices: Vec<usize>,
}

impl Chunk {
    /// Number of faces in the chunk.
    #[must_use]
    pub fn face_count(&self) -> usize {
        self.mesh.face_count()
    }
}

/// Lazy iterator over the non-empty chunks of a scene.
///
/// Clustering runs when the iterator is built; each call to `next` extracts
/// one cluster's geometry. Clusters without cameras or without faces in
/// range are skipped. The iterator ends after the last cluster, or after
/// yielding an error.
#[derive(Debug)]
pub struct ChunkIter<'a> {
    mesh: &'a IndexedMesh,
    cameras: &'a CameraSet,
    plane: LocalTangentPlane,
    camera_points: Vec<[f64; 2]>,
    vertex_points: Vec<[f64; 2]>,
    clusters: KMeans,
    buffer: f64,
    next_cluster: usize,
    yielded: usize,
    skipped: usize,
    done: bool,
}

/// Partition a scene into spatial chunks.
///
/// Camera anchors are projected into the tangent plane centered on their
/// mean and clustered with seeded k-means. Each cluster's chunk holds every
/// face with at least one vertex within `buffer_meters` of the cluster's
/// camera hull, so faces near a boundary can belong to several chunks.
///
/// # Errors
///
/// Returns [`ChunkError::ZeroClusters`], [`ChunkError::InvalidBuffer`] or
/// [`ChunkError::NoCameras`] for bad inputs, and [`ChunkError::Mesh`] if the
/// mesh references missing vertices. All are raised before any extraction.
///
/// # Example
///
/// ```
/// use mesh_types::planar_grid;
/// use projection_chunk::{ChunkParams, chunk_mesh};
/// use sensor_types::CameraSet;
///
/// let mesh = planar_grid(4, 4, 1.0);
/// let cameras = CameraSet::default();
/// let err = chunk_mesh(&mesh, &cameras, &ChunkParams::default());
/// assert!(err.is_err());
/// ```
pub fn chunk_mesh<'a>(
    mesh: &'a IndexedMesh,
    cameras: &'a CameraSet,
    params: &ChunkParams,
) -> ChunkResult<ChunkIter<'a>> {
    params.validate()?;
    if cameras.is_empty() {
        return Err(ChunkError::NoCameras);
    }
    mesh.validate()?;

    let anchors = cameras.anchors();
    let plane = LocalTangentPlane::centered_on(&anchors).ok_or(ChunkError::NoCameras)?;
    let camera_points: Vec<[f64; 2]> = anchors.iter().map(|a| plane.to_planar(a)).collect();

    let vertex_points: Vec<[f64; 2]> = match params.mesh_frame {
        MeshFrame::Planar => mesh.vertices.iter().map(|v| [v.position.x, v.position.y]).collect(),
        MeshFrame::Geographic => mesh
            .vertices
            .iter()
            .map(|v| plane.to_planar(&GeoAnchor::new(v.position.x, v.position.y)))
            .collect(),
    };

    let clusters = kmeans(&camera_points, params.num_clusters, params.seed, params.max_iterations)
        .ok_or(ChunkError::NoCameras)?;
    debug!(
        cameras = cameras.len(),
        k = params.num_clusters,
        iterations = clusters.iterations,
        "clustered cameras"
    );

    Ok(ChunkIter {
        mesh,
        cameras,
        plane,
        camera_points,
        vertex_points,
        clusters,
        buffer: params.buffer_meters,
        next_cluster: 0,
        yielded: 0,
        skipped: 0,
        done: false,
    })
}

impl ChunkIter<'_> {
    /// Cluster id of each camera.
    #[must_use]
    pub fn assignment(&self) -> &[usize] {
        &self.clusters.assignment
    }

    /// Tangent plane used for clustering and buffering.
    #[must_use]
    pub const fn plane(&self) -> &LocalTangentPlane {
        &self.plane
    }

    /// Cluster centers in the planar frame.
    #[must_use]
    pub fn centers(&self) -> &[[f64; 2]] {
        &self.clusters.centers
    }

    /// Planar position of each camera.
    #[must_use]
    pub fn camera_points(&self) -> &[[f64; 2]] {
        &self.camera_points
    }

    /// Faces within the buffer of a hull, in parent order.
    fn faces_near(&self, hull: &ConvexHull) -> Vec<u32> {
        let Some((lo, hi)) = hull.bounds() else {
            return Vec::new();
        };
        let (lo, hi) = (
            [lo[0] - self.buffer, lo[1] - self.buffer],
            [hi[0] + self.buffer, hi[1] + self.buffer],
        );
        let near: Vec<bool> = self
            .vertex_points
            .iter()
            .map(|&p| {
                p[0] >= lo[0]
                    && p[0] <= hi[0]
                    && p[1] >= lo[1]
                    && p[1] <= hi[1]
                    && hull.distance_to(p) <= self.buffer
            })
            .collect();

        self.mesh
            .faces
            .iter()
            .enumerate()
            .filter(|(_, face)| face.iter().any(|&v| near[v as usize]))
            .filter_map(|(i, _)| u32::try_from(i).ok())
            .collect()
    }

    fn build(&self, cluster: usize) -> ChunkResult<Option<Chunk>> {
        let members = self.clusters.members(cluster);
        if members.is_empty() {
            debug!(cluster, "skipping cluster without cameras");
            return Ok(None);
        }

        let points: Vec<[f64; 2]> = members.iter().map(|&i| self.camera_points[i]).collect();
        let hull = ConvexHull::from_points(&points);
        let face_ids = self.faces_near(&hull);
        if face_ids.is_empty() {
            debug!(cluster, cameras = members.len(), "skipping cluster without faces");
            return Ok(None);
        }

        let (mesh, face_ids) = self.mesh.extract_faces(&face_ids)?.into_parts();
        let cameras = self.cameras.subset(&members)?;
        debug!(
            cluster,
            cameras = members.len(),
            faces = mesh.face_count(),
            hull_vertices = hull.len(),
            "extracted chunk"
        );
        Ok(Some(Chunk {
            cluster,
            mesh,
            face_ids,
            cameras,
            camera_indices: members,
        }))
    }
}

impl Iterator for ChunkIter<'_> {
    type Item = ChunkResult<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        while self.next_cluster < self.clusters.cluster_count() {
            let cluster = self.next_cluster;
            self.next_cluster += 1;
            match self.build(cluster) {
                Ok(Some(chunk)) => {
                    self.yielded += 1;
                    return Some(Ok(chunk));
                }
                Ok(None) => self.skipped += 1,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        self.done = true;
        info!(
            chunks = self.yielded,
            skipped = self.skipped,
            faces = self.mesh.face_count(),
            "chunking complete"
        );
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            (0, Some(0))
        } else {
            (0, Some(self.clusters.cluster_count() - self.next_cluster))
        }
    }
}

impl std::iter::FusedIterator for ChunkIter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use mesh_types::planar_grid;
    use sensor_types::{Camera, CameraIntrinsics};

    /// Camera anchored `east`/`north` meters from the origin of a plane at
    /// (0, 0). Close to the origin the offsets survive the tangent plane.
    fn camera_at(plane: &LocalTangentPlane, east: f64, north: f64) -> Camera {
        let anchor = plane.to_geodetic([east, north, 0.0]);
        Camera::new(
            CameraIntrinsics::ideal(10.0, 8, 8),
            nalgebra::Matrix4::identity(),
            GeoAnchor::new(anchor.lon, anchor.lat),
            format!("{east}_{north}"),
        )
        .unwrap()
    }

    /// Two pairs of cameras, symmetric about the origin so the mean anchor
    /// stays at (0, 0).
    fn two_groups() -> CameraSet {
        let plane = LocalTangentPlane::new(GeoAnchor::new(0.0, 0.0));
        [(-45.0, -0.5), (-44.0, 0.5), (45.0, -0.5), (44.0, 0.5)]
            .into_iter()
            .map(|(e, n)| camera_at(&plane, e, n))
            .collect()
    }

    /// 100 m x 10 m strip of 10 m cells centered on the origin.
    fn strip() -> IndexedMesh {
        let mut mesh = planar_grid(10, 1, 10.0);
        for v in &mut mesh.vertices {
            v.position.x -= 50.0;
            v.position.y -= 5.0;
        }
        mesh
    }

    #[test]
    fn test_validation_errors() {
        let mesh = planar_grid(2, 2, 1.0);
        let cams = two_groups();
        assert!(matches!(
            chunk_mesh(&mesh, &cams, &ChunkParams::default().num_clusters(0)),
            Err(ChunkError::ZeroClusters)
        ));
        assert!(matches!(
            chunk_mesh(&mesh, &cams, &ChunkParams::default().buffer_meters(f64::NAN)),
            Err(ChunkError::InvalidBuffer(_))
        ));
        assert!(matches!(
            chunk_mesh(&mesh, &CameraSet::default(), &ChunkParams::default()),
            Err(ChunkError::NoCameras)
        ));

        let broken = IndexedMesh::from_parts(mesh.vertices.clone(), vec![[0, 1, 99]]);
        assert!(matches!(
            chunk_mesh(&broken, &cams, &ChunkParams::default()),
            Err(ChunkError::Mesh(_))
        ));
    }

    #[test]
    fn test_two_clusters_split_mesh() {
        let mesh = strip();
        let cams = two_groups();
        let params = ChunkParams::default().num_clusters(2).buffer_meters(10.0).seed(1);
        let mut iter = chunk_mesh(&mesh, &cams, &params).unwrap();

        let assignment = iter.assignment().to_vec();
        assert_eq!(assignment[0], assignment[1]);
        assert_eq!(assignment[2], assignment[3]);
        assert_ne!(assignment[0], assignment[2]);

        let chunks: Vec<Chunk> = iter.by_ref().map(Result::unwrap).collect();
        assert_eq!(chunks.len(), 2);
        assert!(iter.next().is_none());

        for chunk in &chunks {
            assert_eq!(chunk.cameras.len(), 2);
            assert_eq!(chunk.face_ids.len(), chunk.face_count());
            // The two end cells of each side.
            assert_eq!(chunk.face_count(), 4);
            for &i in &chunk.camera_indices {
                assert_eq!(assignment[i], chunk.cluster);
            }
        }
    }

    #[test]
    fn test_surplus_clusters_skipped() {
        let mesh = strip();
        let cams = two_groups();
        let params = ChunkParams::default().num_clusters(6).buffer_meters(10.0);
        let chunks: Vec<Chunk> = chunk_mesh(&mesh, &cams, &params).unwrap().map(Result::unwrap).collect();
        assert!(chunks.len() <= cams.len());
        let cameras: usize = chunks.iter().map(|c| c.cameras.len()).sum();
        assert_eq!(cameras, cams.len());
    }

    #[test]
    fn test_far_mesh_yields_nothing() {
        let mut mesh = strip();
        for v in &mut mesh.vertices {
            v.position.x += 10_000.0;
        }
        let chunks: Vec<_> = chunk_mesh(&mesh, &two_groups(), &ChunkParams::default().num_clusters(2))
            .unwrap()
            .collect();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_geographic_frame() {
        let plane = LocalTangentPlane::new(GeoAnchor::new(0.0, 0.0));
        let cams: CameraSet = [camera_at(&plane, 0.0, 0.0)].into_iter().collect();
        // One face around the camera, in degrees.
        let d = 1e-5;
        let mesh = IndexedMesh::from_parts(
            vec![
                mesh_types::Vertex::from_coords(-d, -d, 0.0),
                mesh_types::Vertex::from_coords(d, -d, 0.0),
                mesh_types::Vertex::from_coords(0.0, d, 0.0),
            ],
            vec![[0, 1, 2]],
        );
        let params = ChunkParams::default().num_clusters(1).buffer_meters(5.0);
        let geographic = params.clone().mesh_frame(MeshFrame::Geographic);

        assert_eq!(chunk_mesh(&mesh, &cams, &geographic).unwrap().count(), 1);
        // Read as meters, the same vertices sit within a millimeter of the camera.
        assert_eq!(chunk_mesh(&mesh, &cams, &params).unwrap().count(), 1);

        let far = IndexedMesh::from_parts(
            mesh.vertices
                .iter()
                .map(|v| mesh_types::Vertex::from_coords(v.position.x + 0.01, v.position.y, 0.0))
                .collect(),
            vec![[0, 1, 2]],
        );
        // 0.01 degrees of longitude at the equator is about 1.1 km.
        assert_eq!(chunk_mesh(&far, &cams, &geographic).unwrap().count(), 0);
    }
}
