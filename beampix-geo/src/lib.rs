//! beampix-geo: Alignment geometry, pixel masks, and coordinate transforms.
//!
//! The alignment and noise-scan tools exchange TOML artifacts (per-step
//! geometry files, per-section pixel masks). This crate owns those formats,
//! the per-step [`AlignmentStore`], and the local-to-global coordinate map.
//!

pub mod alignment;
pub mod error;
pub mod mask;
pub mod transform;

pub use alignment::{AlignmentStore, AlignmentTransform, GeometryFile, SensorAlignment};
pub use error::{Error, Result};
pub use mask::{MaskFile, PixelMask, SensorMask};
pub use transform::{to_global, to_local};
