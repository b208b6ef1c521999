//! Per-image projection of labels onto visible faces.
//!
//! For one camera, the projector pairs every covered pixel of the camera's
//! [`PixToFace`] raster with the label image pixel at the same relative
//! position, then reduces all pixels of each face to one value:
//!
//! - [`Reduction::Dense`]: per-channel mean. Class ids become one-hot
//!   vectors over `num_classes`, so the mean is the class fraction. NaN
//!   feature channels are left out of their own channel's mean.
//! - [`Reduction::Sparse`]: the face's majority class id, lowest id on ties.
//!
//! [`Projections`] runs this lazily over a whole [`CameraSet`].

use std::collections::VecDeque;

use hashbrown::HashMap;
use mesh_types::IndexedMesh;
use ml_types::{FeatureImage, LabelImage, LabelKind};
use projection_raster::{PixToFace, Rasterizer, RenderCameras};
use sensor_types::{Camera, CameraSet};
use tracing::{debug, info, warn};

use crate::error::{AccumulateError, AccumulateResult};
use crate::params::{ProjectorParams, Reduction};

/// Per-camera label provider.
///
/// Returning `None` means the camera has no usable prediction; it yields an
/// empty projection rather than an error.
pub trait LabelSource {
    /// Label or feature image for camera `camera_index`.
    fn label_for(&mut self, camera_index: usize, camera: &Camera) -> Option<LabelKind>;
}

impl<F> LabelSource for F
where
    F: FnMut(usize, &Camera) -> Option<LabelKind>,
{
    fn label_for(&mut self, camera_index: usize, camera: &Camera) -> Option<LabelKind> {
        self(camera_index, camera)
    }
}

/// Mean value per touched face, `channels` values per face.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseProjection {
    channels: usize,
    faces: Vec<u32>,
    values: Vec<f64>,
}

impl DenseProjection {
    /// Build from strictly ascending faces and row-major values.
    ///
    /// # Errors
    ///
    /// - [`AccumulateError::InvalidParams`] if `values` does not hold
    ///   `channels` entries per face, or `faces` is not ascending
    /// - [`AccumulateError::DuplicateFace`] if a face is listed twice
    pub fn new(channels: usize, faces: Vec<u32>, values: Vec<f64>) -> AccumulateResult<Self> {
        if values.len() != faces.len() * channels {
            return Err(AccumulateError::invalid_params(format!(
                "{} values for {} faces of {channels} channels",
                values.len(),
                faces.len()
            )));
        }
        for pair in faces.windows(2) {
            if pair[0] == pair[1] {
                return Err(AccumulateError::DuplicateFace { face: pair[0] });
            }
            if pair[0] > pair[1] {
                return Err(AccumulateError::invalid_params(format!(
                    "faces must be ascending, found {} before {}",
                    pair[0], pair[1]
                )));
            }
        }
        Ok(Self {
            channels,
            faces,
            values,
        })
    }

    /// Values per face.
    #[must_use]
    pub const fn channels(&self) -> usize {
        self.channels
    }

    /// Touched faces, ascending.
    #[must_use]
    pub fn faces(&self) -> &[u32] {
        &self.faces
    }

    /// Iterate `(face, values)`.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &[f64])> + '_ {
        let channels = self.channels.max(1);
        self.faces
            .iter()
            .copied()
            .zip(self.values.chunks(channels))
    }
}

/// Majority class per touched face.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparseProjection {
    faces: Vec<u32>,
    classes: Vec<u32>,
}

impl SparseProjection {
    /// Build from `(face, class)` pairs, one per face, in any order.
    ///
    /// # Errors
    ///
    /// Returns [`AccumulateError::DuplicateFace`] if a face appears twice.
    ///
    /// # Example
    ///
    /// ```
    /// use projection_accumulate::SparseProjection;
    ///
    /// let p = SparseProjection::from_pairs([(4, 1), (2, 0)]).unwrap();
    /// assert_eq!(p.faces(), &[2, 4]);
    /// assert!(SparseProjection::from_pairs([(0, 1), (0, 2)]).is_err());
    /// ```
    pub fn from_pairs(pairs: impl IntoIterator<Item = (u32, u32)>) -> AccumulateResult<Self> {
        let mut pairs: Vec<(u32, u32)> = pairs.into_iter().collect();
        pairs.sort_unstable_by_key(|&(face, _)| face);
        if let Some(pair) = pairs.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(AccumulateError::DuplicateFace { face: pair[0].0 });
        }
        let (faces, classes) = pairs.into_iter().unzip();
        Ok(Self { faces, classes })
    }

    fn empty() -> Self {
        Self {
            faces: Vec::new(),
            classes: Vec::new(),
        }
    }

    /// Touched faces.
    #[must_use]
    pub fn faces(&self) -> &[u32] {
        &self.faces
    }

    /// Iterate `(face, class)`.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.faces.iter().copied().zip(self.classes.iter().copied())
    }
}

/// Reduced values of one kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectedValues {
    /// Per-channel means.
    Dense(DenseProjection),
    /// Majority classes.
    Sparse(SparseProjection),
}

/// The projection of one camera's labels onto the mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageProjection {
    /// Index of the camera in its set.
    pub camera_index: usize,
    /// Reduced per-face values.
    pub values: ProjectedValues,
}

impl ImageProjection {
    /// A projection touching no faces.
    #[must_use]
    pub fn empty(camera_index: usize, reduction: Reduction, channels: usize) -> Self {
        let values = match reduction {
            Reduction::Dense => ProjectedValues::Dense(DenseProjection {
                channels,
                faces: Vec::new(),
                values: Vec::new(),
            }),
            Reduction::Sparse => ProjectedValues::Sparse(SparseProjection::empty()),
        };
        Self {
            camera_index,
            values,
        }
    }

    /// Faces touched by at least one valid pixel.
    #[must_use]
    pub fn touched_faces(&self) -> &[u32] {
        match &self.values {
            ProjectedValues::Dense(d) => d.faces(),
            ProjectedValues::Sparse(s) => s.faces(),
        }
    }

    /// Number of touched faces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.touched_faces().len()
    }

    /// Returns `true` if no face was touched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.touched_faces().is_empty()
    }
}

/// Reduce one camera's labels over its pix-to-face raster.
///
/// `native_size` is the camera's `(width, height)` before any raster
/// scaling. The label image must match either it or the raster size.
///
/// # Errors
///
/// - [`AccumulateError::LabelShapeMismatch`] for an unsampleable label image
/// - [`AccumulateError::InvalidParams`] for dense class projection without
///   `num_classes`
/// - [`AccumulateError::ClassOutOfRange`] for a class id beyond `num_classes`
/// - [`AccumulateError::IncompatibleProjection`] for sparse reduction of a
///   feature image
pub fn project_image(
    camera_index: usize,
    pix_to_face: &PixToFace,
    labels: &LabelKind,
    native_size: (u32, u32),
    params: &ProjectorParams,
) -> AccumulateResult<ImageProjection> {
    let sampler = Sampler::new(camera_index, pix_to_face, labels.dimensions(), native_size)?;

    let values = match (labels, params.reduction) {
        (LabelKind::Classes(image), Reduction::Dense) => {
            let classes = params.num_classes.ok_or_else(|| {
                AccumulateError::invalid_params("dense class projection needs num_classes")
            })?;
            ProjectedValues::Dense(dense_classes(pix_to_face, image, &sampler, classes, params.skip_null)?)
        }
        (LabelKind::Features(image), Reduction::Dense) => {
            ProjectedValues::Dense(dense_features(pix_to_face, image, &sampler, params.skip_null))
        }
        (LabelKind::Classes(image), Reduction::Sparse) => ProjectedValues::Sparse(majority_classes(
            pix_to_face,
            image,
            &sampler,
            params.num_classes,
            params.skip_null,
        )?),
        (LabelKind::Features(_), Reduction::Sparse) => {
            return Err(AccumulateError::incompatible(
                "sparse reduction needs a class-id image",
            ));
        }
    };

    Ok(ImageProjection {
        camera_index,
        values,
    })
}

// =============================================================================
// Reductions
// =============================================================================

/// Maps raster pixels to label pixels at the same relative position.
struct Sampler {
    raster: (u64, u64),
    label: (u64, u64),
}

impl Sampler {
    fn new(
        camera: usize,
        pix_to_face: &PixToFace,
        label: (u32, u32),
        native: (u32, u32),
    ) -> AccumulateResult<Self> {
        let raster = (pix_to_face.width(), pix_to_face.height());
        if label != raster && label != native {
            return Err(AccumulateError::LabelShapeMismatch {
                camera,
                label_width: label.0,
                label_height: label.1,
                native_width: native.0,
                native_height: native.1,
                raster_width: raster.0,
                raster_height: raster.1,
            });
        }
        if label != raster {
            debug!(
                camera,
                label_width = label.0,
                raster_width = raster.0,
                "sampling label image at raster scale"
            );
        }
        Ok(Self {
            raster: (u64::from(raster.0), u64::from(raster.1)),
            label: (u64::from(label.0), u64::from(label.1)),
        })
    }

    /// Label pixel under the center of raster pixel `(x, y)`.
    #[allow(clippy::cast_possible_truncation)]
    fn label_pixel(&self, x: u32, y: u32) -> (u32, u32) {
        let map = |p: u32, raster: u64, label: u64| {
            ((((2 * u64::from(p) + 1) * label) / (2 * raster)).min(label - 1)) as u32
        };
        (map(x, self.raster.0, self.label.0), map(y, self.raster.1, self.label.1))
    }
}

fn class_at(image: &LabelImage, sampler: &Sampler, x: u32, y: u32, skip_null: bool) -> Option<u32> {
    let (lx, ly) = sampler.label_pixel(x, y);
    if skip_null {
        image.valid_at(lx, ly)
    } else {
        image.get(lx, ly)
    }
}

fn dense_classes(
    pix_to_face: &PixToFace,
    image: &LabelImage,
    sampler: &Sampler,
    num_classes: usize,
    skip_null: bool,
) -> AccumulateResult<DenseProjection> {
    let mut tallies: HashMap<u32, (Vec<u32>, u32)> = HashMap::new();
    for (x, y, face) in pix_to_face.covered() {
        let Some(class) = class_at(image, sampler, x, y, skip_null) else {
            continue;
        };
        if class as usize >= num_classes {
            return Err(AccumulateError::ClassOutOfRange {
                class,
                class_count: num_classes,
            });
        }
        let (hist, total) = tallies
            .entry(face)
            .or_insert_with(|| (vec![0; num_classes], 0));
        hist[class as usize] += 1;
        *total += 1;
    }

    let mut faces: Vec<u32> = tallies.keys().copied().collect();
    faces.sort_unstable();
    let mut values = Vec::with_capacity(faces.len() * num_classes);
    for face in &faces {
        let (hist, total) = &tallies[face];
        let total = f64::from(*total);
        values.extend(hist.iter().map(|&n| f64::from(n) / total));
    }

    Ok(DenseProjection {
        channels: num_classes,
        faces,
        values,
    })
}

fn dense_features(
    pix_to_face: &PixToFace,
    image: &FeatureImage,
    sampler: &Sampler,
    skip_null: bool,
) -> DenseProjection {
    let channels = image.channels();
    let mut tallies: HashMap<u32, (Vec<f64>, Vec<u32>)> = HashMap::new();
    for (x, y, face) in pix_to_face.covered() {
        let (lx, ly) = sampler.label_pixel(x, y);
        if skip_null && image.is_missing(lx, ly) {
            continue;
        }
        let Some(pixel) = image.pixel(lx, ly) else {
            continue;
        };
        let (sums, valid) = tallies
            .entry(face)
            .or_insert_with(|| (vec![0.0; channels], vec![0; channels]));
        for (c, &v) in pixel.iter().enumerate() {
            if !v.is_nan() {
                sums[c] += f64::from(v);
                valid[c] += 1;
            }
        }
    }

    let mut faces: Vec<u32> = tallies.keys().copied().collect();
    faces.sort_unstable();
    let mut values = Vec::with_capacity(faces.len() * channels);
    for face in &faces {
        let (sums, valid) = &tallies[face];
        values.extend(sums.iter().zip(valid).map(|(&s, &n)| {
            if n == 0 { f64::NAN } else { s / f64::from(n) }
        }));
    }

    DenseProjection {
        channels,
        faces,
        values,
    }
}

fn majority_classes(
    pix_to_face: &PixToFace,
    image: &LabelImage,
    sampler: &Sampler,
    num_classes: Option<usize>,
    skip_null: bool,
) -> AccumulateResult<SparseProjection> {
    let mut pairs: Vec<(u32, u32)> = Vec::new();
    for (x, y, face) in pix_to_face.covered() {
        let Some(class) = class_at(image, sampler, x, y, skip_null) else {
            continue;
        };
        if let Some(n) = num_classes {
            if class as usize >= n {
                return Err(AccumulateError::ClassOutOfRange {
                    class,
                    class_count: n,
                });
            }
        }
        pairs.push((face, class));
    }
    pairs.sort_unstable();

    // Runs of equal (face, class) in sorted order; the first longest run per
    // face is the lowest majority class.
    let mut out: Vec<(u32, u32)> = Vec::new();
    let mut best: Option<(u32, u32, usize)> = None;
    let mut i = 0;
    while i < pairs.len() {
        let (face, class) = pairs[i];
        let run = pairs[i..].iter().take_while(|&&p| p == (face, class)).count();
        match best {
            Some((f, _, n)) if f == face => {
                if run > n {
                    best = Some((face, class, run));
                }
            }
            _ => {
                if let Some((f, c, _)) = best {
                    out.push((f, c));
                }
                best = Some((face, class, run));
            }
        }
        i += run;
    }
    if let Some((f, c, _)) = best {
        out.push((f, c));
    }

    let (faces, classes) = out.into_iter().unzip();
    Ok(SparseProjection { faces, classes })
}

// =============================================================================
// Lazy projection over a camera set
// =============================================================================

/// Lazy per-camera projections over a [`CameraSet`].
///
/// Yields exactly one item per camera, in camera order. Cameras are
/// rasterized [`projection_raster::RasterParams::batch_size`] at a time.
/// The sequence consumes its label source and cannot be restarted; after an
/// error it ends.
pub struct Projections<'a, L> {
    rasterizer: &'a Rasterizer,
    mesh: &'a IndexedMesh,
    cameras: &'a CameraSet,
    labels: L,
    params: ProjectorParams,
    next_camera: usize,
    pending: VecDeque<AccumulateResult<ImageProjection>>,
    touched: usize,
}

impl<'a, L: LabelSource> Projections<'a, L> {
    /// Prepare a projection run.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`ProjectorParams::validate`].
    pub fn new(
        rasterizer: &'a Rasterizer,
        mesh: &'a IndexedMesh,
        cameras: &'a CameraSet,
        labels: L,
        params: ProjectorParams,
    ) -> AccumulateResult<Self> {
        params.validate()?;
        Ok(Self {
            rasterizer,
            mesh,
            cameras,
            labels,
            params,
            next_camera: 0,
            pending: VecDeque::new(),
            touched: 0,
        })
    }

    fn empty_channels(&self) -> usize {
        self.params.num_classes.unwrap_or(0)
    }

    fn fill(&mut self) {
        let cameras = self.cameras;
        let start = self.next_camera;
        let end = (start + self.rasterizer.params().batch_size).min(cameras.len());
        self.next_camera = end;

        let mut slots: Vec<Option<AccumulateResult<ImageProjection>>> = Vec::with_capacity(end - start);
        let mut labels: Vec<Option<LabelKind>> = Vec::with_capacity(end - start);
        // Cameras with labels, grouped by native size to keep batches homogeneous.
        let mut groups: Vec<((u32, u32), Vec<usize>)> = Vec::new();

        for index in start..end {
            let Some(camera) = cameras.get(index) else {
                break;
            };
            let label = self.labels.label_for(index, camera);
            if label.is_none() {
                warn!(camera = index, image = camera.image_key(), "no label image; empty projection");
                slots.push(Some(Ok(ImageProjection::empty(
                    index,
                    self.params.reduction,
                    self.empty_channels(),
                ))));
            } else {
                let size = camera.image_size();
                let slot = slots.len();
                match groups.iter_mut().find(|(s, _)| *s == size) {
                    Some((_, members)) => members.push(slot),
                    None => groups.push((size, vec![slot])),
                }
                slots.push(None);
            }
            labels.push(label);
        }

        for (size, members) in groups {
            let batch = members
                .iter()
                .filter_map(|&slot| cameras.get(start + slot));
            let rasters = RenderCameras::from_cameras(batch)
                .and_then(|render| self.rasterizer.pix_to_face(&render, self.mesh));
            let rasters = match rasters {
                Ok(r) => r,
                Err(err) => {
                    self.pending.push_back(Err(err.into()));
                    self.next_camera = self.cameras.len();
                    return;
                }
            };
            for (&slot, pix_to_face) in members.iter().zip(&rasters) {
                let result = match &labels[slot] {
                    Some(label) => project_image(start + slot, pix_to_face, label, size, &self.params),
                    None => continue,
                };
                slots[slot] = Some(result);
            }
        }

        for result in slots.into_iter().flatten() {
            let failed = result.is_err();
            if let Ok(p) = &result {
                self.touched += p.len();
            }
            self.pending.push_back(result);
            if failed {
                self.next_camera = self.cameras.len();
                break;
            }
        }
        debug!(start, end, "projected batch");

        if self.next_camera == self.cameras.len() {
            info!(
                images = self.cameras.len(),
                face_observations = self.touched,
                "projection pass complete"
            );
        }
    }
}

impl<L: LabelSource> Iterator for Projections<'_, L> {
    type Item = AccumulateResult<ImageProjection>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pending.is_empty() && self.next_camera < self.cameras.len() {
            self.fill();
        }
        self.pending.pop_front()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.pending.len() + (self.cameras.len() - self.next_camera);
        (0, Some(remaining))
    }
}

/// Project every camera eagerly and keep each view.
///
/// # Errors
///
/// Returns the first error of the underlying [`Projections`].
pub fn project_all<L: LabelSource>(
    rasterizer: &Rasterizer,
    mesh: &IndexedMesh,
    cameras: &CameraSet,
    labels: L,
    params: ProjectorParams,
) -> AccumulateResult<Vec<ImageProjection>> {
    Projections::new(rasterizer, mesh, cameras, labels, params)?.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use projection_raster::NO_FACE;

    fn p2f() -> PixToFace {
        // 3x2 raster: faces 0,0,1 / 1,NO_FACE,2
        PixToFace::from_data(3, 2, vec![0, 0, 1, 1, NO_FACE, 2]).unwrap()
    }

    #[test]
    fn test_dense_classes_one_hot_mean() {
        let labels = LabelImage::from_data(3, 2, vec![1, 2, 0, 0, 9, 2]).unwrap();
        let params = ProjectorParams::for_classes(3);
        let proj = project_image(4, &p2f(), &labels.into(), (3, 2), &params).unwrap();
        assert_eq!(proj.camera_index, 4);
        let ProjectedValues::Dense(d) = proj.values else {
            panic!("expected dense");
        };
        let rows: Vec<_> = d.iter().collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].0, 0);
        assert_relative_eq!(rows[0].1[1], 0.5);
        assert_relative_eq!(rows[0].1[2], 0.5);
        assert_relative_eq!(rows[1].1[0], 1.0);
        assert_relative_eq!(rows[2].1[2], 1.0);
    }

    #[test]
    fn test_null_pixels_skipped() {
        let labels = LabelImage::from_data(3, 2, vec![255, 255, 1, 1, 0, 255])
            .unwrap()
            .with_null_id(255);
        let params = ProjectorParams::for_classes(2);
        let proj = project_image(0, &p2f(), &labels.into(), (3, 2), &params).unwrap();
        // Faces 0 and 2 only see null pixels.
        assert_eq!(proj.touched_faces(), &[1]);
    }

    #[test]
    fn test_class_out_of_range() {
        let labels = LabelImage::from_data(3, 2, vec![0, 0, 7, 0, 0, 0]).unwrap();
        let err = project_image(0, &p2f(), &labels.into(), (3, 2), &ProjectorParams::for_classes(3)).unwrap_err();
        assert!(matches!(err, AccumulateError::ClassOutOfRange { class: 7, .. }));
    }

    #[test]
    fn test_dense_needs_class_count() {
        let labels = LabelImage::filled(3, 2, 0);
        let err = project_image(0, &p2f(), &labels.into(), (3, 2), &ProjectorParams::default()).unwrap_err();
        assert!(matches!(err, AccumulateError::InvalidParams(_)));
    }

    #[test]
    fn test_features_nan_channel_excluded() {
        let nan = f32::NAN;
        #[rustfmt::skip]
        let data = vec![
            1.0, nan,   3.0, 4.0,   5.0, 6.0,
            7.0, 8.0,   0.0, 0.0,   nan, nan,
        ];
        let image = FeatureImage::from_data(3, 2, 2, data).unwrap();
        let proj = project_image(0, &p2f(), &image.into(), (3, 2), &ProjectorParams::default()).unwrap();
        let ProjectedValues::Dense(d) = proj.values else {
            panic!("expected dense");
        };
        let rows: Vec<_> = d.iter().collect();
        // Face 2 only sees an all-NaN pixel.
        assert_eq!(d.faces(), &[0, 1]);
        assert_relative_eq!(rows[0].1[0], 2.0);
        assert_relative_eq!(rows[0].1[1], 4.0);
        assert_relative_eq!(rows[1].1[0], 6.0);
        assert_relative_eq!(rows[1].1[1], 7.0);
    }

    #[test]
    fn test_sparse_majority_ties_lowest() {
        let labels = LabelImage::from_data(3, 2, vec![5, 3, 4, 4, 0, 1]).unwrap();
        let params = ProjectorParams::default().reduction(Reduction::Sparse);
        let proj = project_image(0, &p2f(), &labels.into(), (3, 2), &params).unwrap();
        let ProjectedValues::Sparse(s) = proj.values else {
            panic!("expected sparse");
        };
        assert_eq!(s.iter().collect::<Vec<_>>(), vec![(0, 3), (1, 4), (2, 1)]);
    }

    #[test]
    fn test_sparse_rejects_features() {
        let image = FeatureImage::from_data(3, 2, 1, vec![0.0; 6]).unwrap();
        let params = ProjectorParams::default().reduction(Reduction::Sparse);
        let err = project_image(0, &p2f(), &image.into(), (3, 2), &params).unwrap_err();
        assert!(matches!(err, AccumulateError::IncompatibleProjection(_)));
    }

    #[test]
    fn test_native_label_sampled_at_raster_scale() {
        // Native 6x4 labels against a half-scale 3x2 raster.
        let mut data = vec![0; 24];
        // Label pixel under raster (2, 1) center is (5, 3).
        data[3 * 6 + 5] = 1;
        let labels = LabelImage::from_data(6, 4, data).unwrap();
        let proj = project_image(0, &p2f(), &labels.into(), (6, 4), &ProjectorParams::for_classes(2)).unwrap();
        let ProjectedValues::Dense(d) = proj.values else {
            panic!("expected dense");
        };
        let face2 = d.iter().find(|(f, _)| *f == 2).unwrap();
        assert_relative_eq!(face2.1[1], 1.0);
    }

    #[test]
    fn test_label_shape_mismatch() {
        let labels = LabelImage::filled(5, 5, 0);
        let err = project_image(2, &p2f(), &labels.into(), (6, 4), &ProjectorParams::for_classes(1)).unwrap_err();
        assert!(matches!(err, AccumulateError::LabelShapeMismatch { camera: 2, .. }));
    }
}
