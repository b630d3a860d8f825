//! Core grid-regression processing modules

pub mod composite;
pub mod grid;
pub mod grid_regression;
pub mod interpolate;
pub mod mask;
pub mod pipeline;
pub mod regression;
pub mod sample;

// Re-export main types
pub use composite::{apply_correction, passthrough};
pub use grid::{partition_region, TileGrid};
pub use grid_regression::{AcceptanceThresholds, GridRegression, GridRegressionSummary};
pub use interpolate::{
    InterpolationMethod, InterpolationParams, SurfaceInterpolator, SurfaceSample,
};
pub use mask::build_validity_mask;
pub use pipeline::{GridNormalizer, NormalizationParams, NormalizationProduct};
pub use regression::{fit_line, pearson, LinearFit, RegressionMethod};
pub use sample::sample_tile;
