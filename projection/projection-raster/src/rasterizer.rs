//! Batched pix-to-face rasterization over a backend.

use std::sync::Arc;

use mesh_types::IndexedMesh;
use ml_types::FeatureImage;
use sensor_types::Camera;
use tracing::{debug, info};

use crate::backend::{Fragments, RasterBackend};
use crate::cpu::CpuRasterBackend;
use crate::error::{RasterError, RasterResult};
use crate::pix2face::{NO_FACE, PixToFace};
use crate::{ExecutionContext, RasterParams, RenderCameras};

/// Per-vertex feature values, interleaved by channel.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexFeatures {
    channels: usize,
    data: Vec<f32>,
}

impl VertexFeatures {
    /// Wrap `data` as `channels` values per vertex.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::InvalidParams`] for zero channels or a buffer
    /// that is not a whole number of vertices.
    pub fn new(channels: usize, data: Vec<f32>) -> RasterResult<Self> {
        if channels == 0 {
            return Err(RasterError::invalid_params("vertex features need at least one channel"));
        }
        if data.len() % channels != 0 {
            return Err(RasterError::invalid_params(format!(
                "{} feature values do not divide into {channels} channels",
                data.len()
            )));
        }
        Ok(Self { channels, data })
    }

    /// Channels per vertex.
    #[must_use]
    pub const fn channels(&self) -> usize {
        self.channels
    }

    /// Number of vertices covered.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.data.len() / self.channels
    }

    fn vertex(&self, index: u32) -> &[f32] {
        let start = index as usize * self.channels;
        &self.data[start..start + self.channels]
    }
}

/// Rasterizes meshes into per-camera visible-face maps.
///
/// Cameras are scaled by [`RasterParams::scale`], split into batches of
/// [`RasterParams::batch_size`], and handed to the backend. Packed face ids
/// are shifted back into the mesh's own index space, so every returned
/// [`PixToFace`] holds face ids in `[0, face_count)` or [`NO_FACE`].
///
/// # Example
///
/// ```
/// use mesh_types::planar_grid;
/// use nalgebra::{Matrix4, Rotation3, Translation3, Vector3};
/// use projection_raster::{ExecutionContext, RasterParams, Rasterizer, RenderCameras};
/// use sensor_types::{Camera, CameraIntrinsics, GeoAnchor};
///
/// // Grid on z = 0, camera 10 m above looking straight down.
/// let mesh = planar_grid(4, 4, 1.0);
/// let look_down = Rotation3::from_axis_angle(&Vector3::x_axis(), std::f64::consts::PI);
/// let w2c = Translation3::new(-2.0, 2.0, 10.0).to_homogeneous() * look_down.to_homogeneous();
/// let cam = Camera::new(CameraIntrinsics::ideal(40.0, 32, 32), w2c, GeoAnchor::new(0.0, 0.0), "nadir").unwrap();
///
/// let raster = Rasterizer::new(ExecutionContext::cpu(), RasterParams::default()).unwrap();
/// let p2f = raster.pix_to_face(&RenderCameras::from_camera(&cam), &mesh).unwrap();
/// assert_eq!(p2f.len(), 1);
/// assert!(p2f[0].covered_count() > 0);
/// ```
#[derive(Clone)]
pub struct Rasterizer {
    context: ExecutionContext,
    params: RasterParams,
    backend: Arc<dyn RasterBackend>,
}

impl std::fmt::Debug for Rasterizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rasterizer")
            .field("context", &self.context)
            .field("params", &self.params)
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl Rasterizer {
    /// Create a rasterizer on the context's backend.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::BackendUnavailable`] if the context requests a
    /// backend this build cannot run, or a parameter error from
    /// [`RasterParams::validate`].
    pub fn new(context: ExecutionContext, params: RasterParams) -> RasterResult<Self> {
        context.ensure_available()?;
        params.validate()?;
        info!(
            backend = context.backend().name(),
            parallel = context.parallel(),
            threads = rayon::current_num_threads(),
            batch_size = params.batch_size,
            "rasterizer ready"
        );
        Ok(Self {
            context,
            params,
            backend: Arc::new(CpuRasterBackend::new()),
        })
    }

    /// Replace the rasterization backend.
    #[must_use]
    pub fn with_backend(mut self, backend: impl RasterBackend + 'static) -> Self {
        self.backend = Arc::new(backend);
        self
    }

    /// Execution context in use.
    #[must_use]
    pub const fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// Rasterization parameters in use.
    #[must_use]
    pub const fn params(&self) -> &RasterParams {
        &self.params
    }

    /// Visible face per pixel for every camera, in input order.
    ///
    /// Output images have the scaled camera resolution. An empty camera
    /// batch yields an empty vector.
    ///
    /// # Errors
    ///
    /// Returns a backend error, or [`RasterError::BackendFailed`] if the
    /// backend returns malformed output or the mesh has more faces than a
    /// 32-bit face id can address.
    pub fn pix_to_face(&self, cameras: &RenderCameras, mesh: &IndexedMesh) -> RasterResult<Vec<PixToFace>> {
        let face_count = i32::try_from(mesh.face_count())
            .map_err(|_| RasterError::backend_failed("face count exceeds 32-bit face ids"))?;

        let mut out = Vec::with_capacity(cameras.len());
        self.for_each_batch(cameras, mesh, |_, fragments| {
            for (k, frag) in fragments.iter().enumerate() {
                out.push(deoffset(frag, k, face_count)?);
            }
            Ok(())
        })?;
        Ok(out)
    }

    /// Convert and rasterize domain cameras in one call.
    ///
    /// # Errors
    ///
    /// Returns the conversion errors of [`RenderCameras::from_cameras`]
    /// (other than an empty batch, which yields an empty vector) and the
    /// errors of [`Rasterizer::pix_to_face`].
    pub fn pix_to_face_cameras<'a>(
        &self,
        cameras: impl IntoIterator<Item = &'a Camera>,
        mesh: &IndexedMesh,
    ) -> RasterResult<Vec<PixToFace>> {
        match RenderCameras::from_cameras(cameras) {
            Ok(render) => self.pix_to_face(&render, mesh),
            Err(RasterError::EmptyBatch) => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }

    /// Render per-vertex features through each camera.
    ///
    /// Each covered pixel receives the perspective-correct barycentric blend
    /// of its visible face's vertex features; uncovered pixels are NaN.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::TextureMismatch`] if `features` does not cover
    /// every mesh vertex, plus the errors of [`Rasterizer::pix_to_face`].
    pub fn render_texture(
        &self,
        cameras: &RenderCameras,
        mesh: &IndexedMesh,
        features: &VertexFeatures,
    ) -> RasterResult<Vec<FeatureImage>> {
        let expected = mesh.vertex_count() * features.channels();
        if features.data.len() != expected {
            return Err(RasterError::TextureMismatch {
                expected,
                actual: features.data.len(),
            });
        }
        let face_count = i32::try_from(mesh.face_count())
            .map_err(|_| RasterError::backend_failed("face count exceeds 32-bit face ids"))?;

        let channels = features.channels();
        let mut out = Vec::with_capacity(cameras.len());
        self.for_each_batch(cameras, mesh, |_, fragments| {
            for (k, frag) in fragments.iter().enumerate() {
                let p2f = deoffset(frag, k, face_count)?;
                let mut data = vec![f32::NAN; p2f.as_slice().len() * channels];
                for (pixel, (&face, bary)) in p2f.as_slice().iter().zip(&frag.barycentric).enumerate() {
                    let Ok(face) = usize::try_from(face) else {
                        continue;
                    };
                    let tri = mesh.faces[face];
                    let dst = &mut data[pixel * channels..(pixel + 1) * channels];
                    dst.fill(0.0);
                    for (corner, &weight) in tri.iter().zip(bary) {
                        for (d, &v) in dst.iter_mut().zip(features.vertex(*corner)) {
                            *d += weight * v;
                        }
                    }
                }
                let image = FeatureImage::from_data(frag.width, frag.height, channels, data)
                    .map_err(|e| RasterError::backend_failed(e.to_string()))?;
                out.push(image);
            }
            Ok(())
        })?;
        Ok(out)
    }

    fn for_each_batch(
        &self,
        cameras: &RenderCameras,
        mesh: &IndexedMesh,
        mut sink: impl FnMut(usize, &[Fragments]) -> RasterResult<()>,
    ) -> RasterResult<()> {
        if cameras.is_empty() {
            return Ok(());
        }
        let scaled = cameras.scaled(self.params.scale)?;
        info!(
            backend = self.backend.name(),
            cameras = scaled.len(),
            faces = mesh.face_count(),
            height = scaled.height(),
            width = scaled.width(),
            "rasterizing"
        );

        let batch_size = self.params.batch_size;
        for start in (0..scaled.len()).step_by(batch_size) {
            let batch = scaled.slice(start, start + batch_size);
            let fragments = self
                .backend
                .rasterize_batch(&self.context, &batch, mesh, &self.params)?;
            if fragments.len() != batch.len() {
                return Err(RasterError::backend_failed(format!(
                    "backend returned {} images for {} cameras",
                    fragments.len(),
                    batch.len()
                )));
            }
            debug!(start, len = batch.len(), "batch done");
            sink(start, &fragments)?;
        }
        Ok(())
    }
}

/// Shift packed ids of batch camera `k` back into mesh face ids.
fn deoffset(frag: &Fragments, k: usize, face_count: i32) -> RasterResult<PixToFace> {
    let len = frag.width as usize * frag.height as usize;
    if frag.packed_faces.len() != len || frag.barycentric.len() != len {
        return Err(RasterError::backend_failed("fragment buffers do not match image size"));
    }
    let base = i64::try_from(k).unwrap_or(i64::MAX) * i64::from(face_count);
    let end = base + i64::from(face_count);

    let mut p2f = PixToFace::empty(frag.width, frag.height);
    for (dst, &packed) in p2f.faces_mut().iter_mut().zip(&frag.packed_faces) {
        if packed < 0 {
            continue;
        }
        if !(base..end).contains(&packed) {
            return Err(RasterError::backend_failed(format!(
                "packed face {packed} outside camera {k} range {base}..{end}"
            )));
        }
        *dst = i32::try_from(packed - base).unwrap_or(NO_FACE);
    }
    Ok(p2f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BackendType;
    use mesh_types::{Vertex, planar_grid};
    use nalgebra::{Matrix4, Rotation3, Translation3, Vector3};
    use sensor_types::{CameraIntrinsics, GeoAnchor};

    fn nadir(x: f64, y: f64, size: u32) -> Camera {
        let look_down = Rotation3::from_axis_angle(&Vector3::x_axis(), std::f64::consts::PI);
        // Camera center (x, y, 10): t = -R c.
        let center = Vector3::new(x, y, 10.0);
        let t = -(look_down * center);
        let w2c = Translation3::from(t).to_homogeneous() * look_down.to_homogeneous();
        Camera::new(
            CameraIntrinsics::ideal(f64::from(size), size, size),
            w2c,
            GeoAnchor::new(0.0, 0.0),
            format!("cam_{x}_{y}"),
        )
        .unwrap()
    }

    fn rasterizer(params: RasterParams) -> Rasterizer {
        Rasterizer::new(ExecutionContext::cpu(), params).unwrap()
    }

    #[test]
    fn test_gpu_unavailable() {
        let err = Rasterizer::new(ExecutionContext::new(BackendType::Gpu), RasterParams::default()).unwrap_err();
        assert_eq!(err, RasterError::BackendUnavailable(BackendType::Gpu));
    }

    #[test]
    fn test_ids_in_range() {
        let mesh = planar_grid(6, 6, 1.0);
        let cams = [nadir(3.0, 3.0, 24), nadir(1.0, 2.0, 24), nadir(5.0, 4.0, 24)];
        let p2f = rasterizer(RasterParams::default().batch_size(2))
            .pix_to_face_cameras(cams.iter(), &mesh)
            .unwrap();
        assert_eq!(p2f.len(), 3);
        for img in &p2f {
            assert!(img.covered_count() > 0);
            assert!(img.unique_faces().iter().all(|&f| (f as usize) < mesh.face_count()));
        }
    }

    #[test]
    fn test_batched_equals_single() {
        let mesh = planar_grid(5, 5, 1.0);
        let cams = [nadir(2.5, 2.5, 16), nadir(1.0, 1.0, 16), nadir(4.0, 2.0, 16), nadir(0.0, 5.0, 16)];
        let batched = rasterizer(RasterParams::default().batch_size(3))
            .pix_to_face_cameras(cams.iter(), &mesh)
            .unwrap();
        for (cam, img) in cams.iter().zip(&batched) {
            let single = rasterizer(RasterParams::default().batch_size(1))
                .pix_to_face(&RenderCameras::from_camera(cam), &mesh)
                .unwrap();
            assert_eq!(&single[0], img);
        }
    }

    #[test]
    fn test_culling_preserves_correspondences() {
        let mesh = planar_grid(20, 20, 1.0);
        let cams = [nadir(3.0, 3.0, 16), nadir(15.0, 12.0, 16)];
        let plain = rasterizer(RasterParams::default())
            .pix_to_face_cameras(cams.iter(), &mesh)
            .unwrap();
        let culled = rasterizer(RasterParams::default().cull_to_frustum(true))
            .pix_to_face_cameras(cams.iter(), &mesh)
            .unwrap();
        assert_eq!(plain, culled);
    }

    #[test]
    fn test_scale_changes_resolution() {
        let mesh = planar_grid(4, 4, 1.0);
        let cam = nadir(2.0, 2.0, 32);
        let p2f = rasterizer(RasterParams::default().scale(0.5))
            .pix_to_face(&RenderCameras::from_camera(&cam), &mesh)
            .unwrap();
        assert_eq!((p2f[0].width(), p2f[0].height()), (16, 16));
    }

    #[test]
    fn test_no_cameras() {
        let mesh = planar_grid(2, 2, 1.0);
        let p2f = rasterizer(RasterParams::default())
            .pix_to_face_cameras(std::iter::empty(), &mesh)
            .unwrap();
        assert!(p2f.is_empty());
    }

    #[test]
    fn test_render_texture_constant() {
        let mesh = planar_grid(3, 3, 1.0);
        let cam = nadir(1.5, 1.5, 16);
        let features = VertexFeatures::new(2, [0.25_f32, 4.0].repeat(mesh.vertex_count())).unwrap();
        let images = rasterizer(RasterParams::default())
            .render_texture(&RenderCameras::from_camera(&cam), &mesh, &features)
            .unwrap();
        let img = &images[0];
        let mut seen = 0;
        for y in 0..img.height() {
            for x in 0..img.width() {
                if img.is_missing(x, y) {
                    continue;
                }
                let px = img.pixel(x, y).unwrap();
                assert!((px[0] - 0.25).abs() < 1e-5);
                assert!((px[1] - 4.0).abs() < 1e-4);
                seen += 1;
            }
        }
        assert!(seen > 0);
    }

    #[test]
    fn test_render_texture_mismatch() {
        let mesh = IndexedMesh::from_parts(
            vec![Vertex::from_coords(0.0, 0.0, 0.0); 3],
            vec![[0, 1, 2]],
        );
        let features = VertexFeatures::new(1, vec![0.0; 2]).unwrap();
        let cam = nadir(0.0, 0.0, 8);
        let err = rasterizer(RasterParams::default())
            .render_texture(&RenderCameras::from_camera(&cam), &mesh, &features)
            .unwrap_err();
        assert_eq!(err, RasterError::TextureMismatch { expected: 3, actual: 2 });
    }

    #[test]
    fn test_vertex_features_validation() {
        assert!(VertexFeatures::new(0, vec![]).is_err());
        assert!(VertexFeatures::new(3, vec![0.0; 4]).is_err());
        assert_eq!(VertexFeatures::new(2, vec![0.0; 6]).unwrap().vertex_count(), 3);
    }

    #[test]
    fn test_faces_on_camera_plane_skipped() {
        // Identity pose sits on the z = 0 grid plane.
        let mesh = planar_grid(2, 2, 1.0);
        let cam = Camera::new(
            CameraIntrinsics::ideal(8.0, 8, 8),
            Matrix4::identity(),
            GeoAnchor::new(0.0, 0.0),
            "origin",
        )
        .unwrap();
        let p2f = rasterizer(RasterParams::default())
            .pix_to_face(&RenderCameras::from_camera(&cam), &mesh)
            .unwrap();
        assert_eq!(p2f[0].covered_count(), 0);
    }
}
