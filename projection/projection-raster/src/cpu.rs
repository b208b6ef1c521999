//! Portable CPU z-buffer backend.

use mesh_types::IndexedMesh;
use rayon::prelude::*;
use tracing::debug;

use crate::backend::{Fragments, RasterBackend};
use crate::error::RasterResult;
use crate::render::RenderCamera;
use crate::{ExecutionContext, RasterParams, RenderCameras};

/// Degenerate-triangle threshold on twice the screen-space area.
const AREA_EPSILON: f64 = 1e-12;

/// Scanline-free bounding-box rasterizer with a per-pixel depth test.
///
/// - Pixel centers sit at `(x + 0.5, y + 0.5)`.
/// - Coverage is edge-inclusive; both windings are rasterized.
/// - Depth is interpolated perspective-correctly.
/// - A strictly nearer fragment replaces the stored one, so among equal
///   depths the lower packed index (earlier face) wins.
/// - Triangles with any vertex nearer than the near plane are skipped
///   whole; they are not clipped against it.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuRasterBackend;

impl CpuRasterBackend {
    /// Create the backend.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl RasterBackend for CpuRasterBackend {
    fn name(&self) -> &'static str {
        "cpu-zbuffer"
    }

    fn rasterize_batch(
        &self,
        context: &ExecutionContext,
        cameras: &RenderCameras,
        mesh: &IndexedMesh,
        params: &RasterParams,
    ) -> RasterResult<Vec<Fragments>> {
        let width = cameras.width();
        let height = cameras.height();
        let face_count = mesh.face_count() as i64;

        let run = |(k, camera): (usize, &RenderCamera)| {
            #[allow(clippy::cast_possible_wrap)]
            let offset = k as i64 * face_count;
            rasterize_one(camera, mesh, width, height, offset, params)
        };

        let fragments: Vec<Fragments> = if context.parallel() {
            cameras.cameras().par_iter().enumerate().map(run).collect()
        } else {
            cameras.cameras().iter().enumerate().map(run).collect()
        };

        debug!(
            cameras = cameras.len(),
            faces = mesh.face_count(),
            width,
            height,
            "rasterized batch"
        );
        Ok(fragments)
    }
}

// =============================================================================
// Internal helpers
// =============================================================================

#[derive(Clone, Copy)]
struct ScreenVertex {
    u: f64,
    v: f64,
    depth: f64,
}

#[inline]
fn edge(a: ScreenVertex, b: ScreenVertex, px: f64, py: f64) -> f64 {
    (px - a.u) * (b.v - a.v) - (py - a.v) * (b.u - a.u)
}

fn project_vertices(camera: &RenderCamera, mesh: &IndexedMesh, near: f64) -> Vec<Option<ScreenVertex>> {
    mesh.vertices
        .iter()
        .map(|v| {
            let view = camera.to_view(&v.position);
            if view.z < near {
                return None;
            }
            camera
                .view_to_screen(&view)
                .map(|([u, v], depth)| ScreenVertex { u, v, depth })
        })
        .collect()
}

fn outside_frustum(tri: &[ScreenVertex; 3], width: f64, height: f64) -> bool {
    tri.iter().all(|p| p.u < 0.0)
        || tri.iter().all(|p| p.u > width)
        || tri.iter().all(|p| p.v < 0.0)
        || tri.iter().all(|p| p.v > height)
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap
)]
fn rasterize_one(
    camera: &RenderCamera,
    mesh: &IndexedMesh,
    width: u32,
    height: u32,
    offset: i64,
    params: &RasterParams,
) -> Fragments {
    let mut out = Fragments::empty(width, height);
    let screen = project_vertices(camera, mesh, params.near_plane);
    let (w, h) = (f64::from(width), f64::from(height));

    for (face_index, face) in mesh.faces.iter().enumerate() {
        let corner = |i: usize| screen.get(face[i] as usize).copied().flatten();
        let (Some(a), Some(b), Some(c)) = (corner(0), corner(1), corner(2)) else {
            continue;
        };
        let tri = [a, b, c];

        if params.cull_to_frustum && outside_frustum(&tri, w, h) {
            continue;
        }

        let area = edge(a, b, c.u, c.v);
        if area.abs() < AREA_EPSILON {
            continue;
        }

        let min_u = a.u.min(b.u).min(c.u);
        let max_u = a.u.max(b.u).max(c.u);
        let min_v = a.v.min(b.v).min(c.v);
        let max_v = a.v.max(b.v).max(c.v);

        // Pixel x covers centers at x + 0.5.
        let x0 = (min_u - 0.5).ceil().max(0.0);
        let x1 = (max_u - 0.5).floor().min(w - 1.0);
        let y0 = (min_v - 0.5).ceil().max(0.0);
        let y1 = (max_v - 0.5).floor().min(h - 1.0);
        if x0 > x1 || y0 > y1 {
            continue;
        }

        let packed = offset + face_index as i64;
        for y in (y0 as u32)..=(y1 as u32) {
            let py = f64::from(y) + 0.5;
            for x in (x0 as u32)..=(x1 as u32) {
                let px = f64::from(x) + 0.5;
                let w0 = edge(b, c, px, py) / area;
                let w1 = edge(c, a, px, py) / area;
                let w2 = edge(a, b, px, py) / area;
                if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                    continue;
                }

                let inv_depth = w0 / a.depth + w1 / b.depth + w2 / c.depth;
                let depth = 1.0 / inv_depth;
                let idx = y as usize * width as usize + x as usize;
                let depth_f32 = depth as f32;
                if depth_f32 < out.depth[idx] {
                    out.depth[idx] = depth_f32;
                    out.packed_faces[idx] = packed;
                    out.barycentric[idx] = [
                        (w0 / a.depth * depth) as f32,
                        (w1 / b.depth * depth) as f32,
                        (w2 / c.depth * depth) as f32,
                    ];
                }
            }
        }
    }

    out
}
