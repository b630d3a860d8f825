//! gridnorm: A Fast, Modular Grid-Correlation Radiometric Normalization Engine
//!
//! Corrects a raster band against an already atmospherically corrected
//! reference band of the same or similar spectral properties. The approach
//! assumes enough surfaces kept their reflectance between the two
//! acquisitions: a local linear relationship `reference = a + b * input` is
//! fitted over a grid of tiles, tiles with too few valid pixels or weak
//! correlation are rejected, and the accepted per-tile coefficients are
//! interpolated into smooth correction surfaces applied over the whole
//! image. Changing pixels (clouds, cloud shadows, vegetation) are excluded
//! from the fit through user-supplied mask layers.

pub mod types;
pub mod io;
pub mod core;

// Re-export main types and functions for easier access
pub use types::{
    MaskImage, NormError, NormResult, RasterImage, RasterValue, RegionGeometry, SampleSet,
    SkipReason, Tile, TileFit, TileOutcome,
};

pub use crate::core::{
    AcceptanceThresholds, GridNormalizer, GridRegression, GridRegressionSummary,
    InterpolationMethod, InterpolationParams, LinearFit, NormalizationParams,
    NormalizationProduct, RegressionMethod, SurfaceInterpolator, SurfaceSample, TileGrid,
};

pub use io::{normalize_from_store, MemoryStore, PixelWindow, RasterStore};
