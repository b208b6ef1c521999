//! Terrain height rasters.
//!
//! A digital terrain model (DTM) gives the bare-ground height for each cell
//! of a planar grid. It is used to decide which faces sit close to the
//! ground.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{SensorError, SensorResult};

/// A north-up terrain raster.
///
/// Heights are stored in row-major order, row 0 being the northern edge.
/// Cell `(col, row)` covers `x` in `[origin_x + col * cell, origin_x + (col + 1) * cell)`
/// and `y` in `(origin_y - (row + 1) * cell, origin_y - row * cell]`.
/// No-data cells are `NaN`.
///
/// # Example
///
/// ```
/// use sensor_types::TerrainRaster;
///
/// let dtm = TerrainRaster::new(vec![1.0, 2.0, 3.0, 4.0], 2, 2, [0.0, 20.0], 10.0).unwrap();
/// assert_eq!(dtm.height_at(5.0, 15.0), Some(1.0));
/// assert_eq!(dtm.height_at(15.0, 5.0), Some(4.0));
/// assert_eq!(dtm.height_at(25.0, 5.0), None);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TerrainRaster {
    heights: Vec<f32>,
    width: u32,
    height: u32,
    origin: [f64; 2],
    cell_size: f64,
}

impl TerrainRaster {
    /// Build a raster from row-major heights.
    ///
    /// `origin` is the planar position of the north-west corner.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::BufferSizeMismatch`] if `heights` does not hold
    /// `width * height` values, or [`SensorError::InvalidCoordinate`] for a
    /// non-positive cell size or non-finite origin.
    pub fn new(
        heights: Vec<f32>,
        width: u32,
        height: u32,
        origin: [f64; 2],
        cell_size: f64,
    ) -> SensorResult<Self> {
        let expected = width as usize * height as usize;
        if heights.len() != expected {
            return Err(SensorError::buffer_mismatch(expected, heights.len()));
        }
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(SensorError::InvalidCoordinate(format!(
                "cell size must be positive, got {cell_size}"
            )));
        }
        if !(origin[0].is_finite() && origin[1].is_finite()) {
            return Err(SensorError::InvalidCoordinate(
                "raster origin must be finite".to_string(),
            ));
        }
        Ok(Self {
            heights,
            width,
            height,
            origin,
            cell_size,
        })
    }

    /// A raster with one constant height.
    ///
    /// # Errors
    ///
    /// Same as [`TerrainRaster::new`].
    pub fn flat(
        value: f32,
        width: u32,
        height: u32,
        origin: [f64; 2],
        cell_size: f64,
    ) -> SensorResult<Self> {
        Self::new(
            vec![value; width as usize * height as usize],
            width,
            height,
            origin,
            cell_size,
        )
    }

    /// Width in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Cell size in planar units.
    #[must_use]
    pub const fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Height at a cell, or `None` if out of bounds or no-data.
    #[must_use]
    pub fn get(&self, col: u32, row: u32) -> Option<f32> {
        if col >= self.width || row >= self.height {
            return None;
        }
        let idx = row as usize * self.width as usize + col as usize;
        self.heights.get(idx).copied().filter(|h| !h.is_nan())
    }

    /// Cell containing the planar point `(x, y)`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn cell_of(&self, x: f64, y: f64) -> Option<(u32, u32)> {
        let col = ((x - self.origin[0]) / self.cell_size).floor();
        let row = ((self.origin[1] - y) / self.cell_size).floor();
        if !(col.is_finite() && row.is_finite()) || col < 0.0 || row < 0.0 {
            return None;
        }
        if col >= f64::from(self.width) || row >= f64::from(self.height) {
            return None;
        }
        Some((col as u32, row as u32))
    }

    /// Ground height beneath the planar point `(x, y)` (nearest cell).
    #[must_use]
    pub fn height_at(&self, x: f64, y: f64) -> Option<f32> {
        let (col, row) = self.cell_of(x, y)?;
        self.get(col, row)
    }
}
