use crate::core::composite;
use crate::core::grid::partition_region;
use crate::core::grid_regression::{AcceptanceThresholds, GridRegression, GridRegressionSummary};
use crate::core::interpolate::{
    InterpolationMethod, InterpolationParams, SurfaceInterpolator, SurfaceSample,
};
use crate::core::mask::build_validity_mask;
use crate::core::regression::RegressionMethod;
use crate::types::{NormError, NormResult, RasterImage, RegionGeometry, TileOutcome};
use serde::{Deserialize, Serialize};

/// End-to-end normalization parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizationParams {
    /// Approximate grid tile size in map units (6000 in m means box 6x6 km)
    pub grid_size: f64,
    /// Minimal number of valid pixels in a tile
    pub min_pixels: usize,
    /// Minimal correlation coefficient R to accept a tile
    pub min_r: f64,
    pub regression: RegressionMethod,
    pub interpolation: InterpolationMethod,
    /// Tikhonov regularization weight for the surface fit
    pub lambda: f64,
}

impl Default for NormalizationParams {
    fn default() -> Self {
        Self {
            grid_size: 6000.0,
            min_pixels: 300,
            min_r: 0.9,
            regression: RegressionMethod::default(),
            interpolation: InterpolationMethod::default(),
            lambda: 0.1,
        }
    }
}

/// Result of a normalization run
#[derive(Debug, Clone)]
pub struct NormalizationProduct {
    /// Corrected band, or the unchanged input band on the degraded path
    pub output: RasterImage,
    /// Interpolated intercept surface (absent on the degraded path)
    pub a_surface: Option<RasterImage>,
    /// Interpolated slope surface (absent on the degraded path)
    pub b_surface: Option<RasterImage>,
    /// Per-tile records and skip counters
    pub summary: GridRegressionSummary,
    /// True when no tile was accepted and the output is the uncorrected input
    pub degraded: bool,
}

/// Spatially variable correlation based radiometric normalization.
///
/// Fits `reference = a + b * input` per grid tile, interpolates the accepted
/// coefficients into smooth correction surfaces and composites the corrected
/// band. The mask, region and all intermediate results are explicit values
/// threaded through the stages, so concurrent or repeated runs never
/// interfere.
pub struct GridNormalizer {
    params: NormalizationParams,
}

impl GridNormalizer {
    /// Normalizer with the default parameters
    pub fn new() -> Self {
        Self {
            params: NormalizationParams::default(),
        }
    }

    pub fn with_params(params: NormalizationParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &NormalizationParams {
        &self.params
    }

    /// Runs the full normalization pipeline.
    ///
    /// Precondition violations (empty region, band shape mismatch) abort
    /// before any tile work. Zero accepted tiles is not an error: the input
    /// band is returned unchanged with `degraded` set, and a warning names
    /// the thresholds to tune.
    pub fn normalize(
        &self,
        input: &RasterImage,
        reference: &RasterImage,
        aux_layers: &[RasterImage],
        geometry: &RegionGeometry,
    ) -> NormResult<NormalizationProduct> {
        if geometry.is_empty() {
            return Err(NormError::InvalidInput(
                "The working region is empty".to_string(),
            ));
        }
        let dim = (geometry.rows, geometry.cols);
        if input.dim() != dim {
            return Err(NormError::GeometryMismatch(format!(
                "input band {:?} does not match the region {:?}",
                input.dim(),
                dim
            )));
        }
        if reference.dim() != dim {
            return Err(NormError::GeometryMismatch(format!(
                "reference band {:?} does not match the region {:?}",
                reference.dim(),
                dim
            )));
        }

        log::info!(
            "*** Processing raster pair: {} x {} pixels ***",
            geometry.rows,
            geometry.cols
        );
        log::debug!("Parameters: {:?}", self.params);

        let mask = build_validity_mask(input, reference, aux_layers)?;
        let grid = partition_region(geometry, self.params.grid_size)?;

        let thresholds = AcceptanceThresholds {
            min_pixels: self.params.min_pixels,
            min_r: self.params.min_r,
        };
        let summary = GridRegression::new(thresholds, self.params.regression)
            .run(&grid, input, reference, &mask)?;

        if summary.accepted == 0 {
            log::warn!("*** There were no tiles with valid correlation ***");
            log::warn!(
                "The source band is copied to the output as is. This is probably not \
                 the result you expect; try to decrease the minimal correlation \
                 (min_r = {}) or adjust min_pixels = {} / grid_size = {}.",
                self.params.min_r,
                self.params.min_pixels,
                self.params.grid_size
            );
            return Ok(NormalizationProduct {
                output: composite::passthrough(input),
                a_surface: None,
                b_surface: None,
                summary,
                degraded: true,
            });
        }

        let mut a_samples = Vec::with_capacity(summary.accepted);
        let mut b_samples = Vec::with_capacity(summary.accepted);
        for (tile, fit) in grid.tiles.iter().zip(&summary.fits) {
            if let TileOutcome::Accepted { a, b, .. } = fit.outcome {
                a_samples.push(SurfaceSample {
                    x: tile.center_x,
                    y: tile.center_y,
                    value: a,
                });
                b_samples.push(SurfaceSample {
                    x: tile.center_x,
                    y: tile.center_y,
                    value: b,
                });
            }
        }

        log::info!("*** Interpolating regression parameters ***");
        let interpolator = SurfaceInterpolator::new(InterpolationParams {
            method: self.params.interpolation,
            lambda: self.params.lambda,
            ew_step: self.params.grid_size,
            ns_step: self.params.grid_size,
        });
        log::info!("a (intercept)");
        let a_surface = interpolator.interpolate(&a_samples, geometry)?;
        log::info!("b (slope)");
        let b_surface = interpolator.interpolate(&b_samples, geometry)?;
        log_surface_stats("a (intercept)", &a_surface);
        log_surface_stats("b (slope)", &b_surface);

        log::info!("*** Creating corrected output band ***");
        let output = composite::apply_correction(input, &a_surface, &b_surface)?;

        Ok(NormalizationProduct {
            output,
            a_surface: Some(a_surface),
            b_surface: Some(b_surface),
            summary,
            degraded: false,
        })
    }
}

impl Default for GridNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Univariate statistics of a correction surface, for tuning and debugging
fn log_surface_stats(label: &str, surface: &RasterImage) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    let mut count = 0usize;
    for &v in surface.iter() {
        if v.is_finite() {
            let v = v as f64;
            min = min.min(v);
            max = max.max(v);
            sum += v;
            sum_sq += v * v;
            count += 1;
        }
    }
    if count == 0 {
        log::debug!("{}: no finite cells", label);
        return;
    }
    let mean = sum / count as f64;
    let variance = (sum_sq / count as f64 - mean * mean).max(0.0);
    log::info!(
        "{}: min={:.6} max={:.6} mean={:.6} stddev={:.6} (n={})",
        label,
        min,
        max,
        mean,
        variance.sqrt(),
        count
    );
}
