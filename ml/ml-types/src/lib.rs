//! Per-pixel prediction types for multi-view projection.
//!
//! These are the outputs of an image classifier, as consumed by the
//! projection pipeline:
//!
//! - [`LabelImage`] - Per-pixel class ids with an optional null code
//! - [`FeatureImage`] - Per-pixel multi-channel scores
//! - [`LabelKind`] - Either of the above, as delivered for one camera
//!
//! # Layer 0 Crate
//!
//! This is a Layer 0 crate with **zero Bevy dependencies**. It can be used in:
//! - Inference servers
//! - Dataset tools
//! - Aggregation pipelines
//!
//! # Design Philosophy
//!
//! These are **perception output types**. Raw sensor data belongs in
//! `sensor-types`.
//!
//! # Example
//!
//! ```
//! use ml_types::{LabelImage, LabelKind};
//!
//! let mask = LabelImage::from_data(2, 1, vec![3, 0]).unwrap().with_null_id(0);
//! let kind = LabelKind::Classes(mask);
//! assert_eq!(kind.as_classes().and_then(|m| m.valid_at(0, 0)), Some(3));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod error;
mod feature;
mod labels;
mod segmentation;

pub use error::{MlTypesError, MlTypesResult};
pub use feature::FeatureImage;
pub use labels::LabelKind;
pub use segmentation::LabelImage;
