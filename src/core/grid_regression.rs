use crate::core::grid::TileGrid;
use crate::core::regression::{self, RegressionMethod};
use crate::core::sample;
use crate::types::{
    MaskImage, NormError, NormResult, RasterImage, SkipReason, Tile, TileFit, TileOutcome,
};
use serde::{Deserialize, Serialize};

/// Acceptance thresholds for per-tile fits
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AcceptanceThresholds {
    /// Minimal number of valid pixels in a tile
    pub min_pixels: usize,
    /// Minimal correlation coefficient R to accept (R, not R squared)
    pub min_r: f64,
}

impl Default for AcceptanceThresholds {
    fn default() -> Self {
        Self {
            min_pixels: 300,
            min_r: 0.9,
        }
    }
}

/// Aggregate outcome of the per-tile regression pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridRegressionSummary {
    /// One record per tile, in ascending tile id order
    pub fits: Vec<TileFit>,
    pub accepted: usize,
    pub skipped_few_pixels: usize,
    pub skipped_low_correlation: usize,
    pub skipped_degenerate: usize,
}

impl GridRegressionSummary {
    pub fn skipped(&self) -> usize {
        self.skipped_few_pixels + self.skipped_low_correlation + self.skipped_degenerate
    }
}

/// Per-tile regression driver.
///
/// Samples each tile, applies the acceptance thresholds and records one
/// immutable [`TileFit`] per tile. Tiles are independent, so the loop runs
/// across the rayon pool when the `parallel` feature is on; results are
/// collected in tile order either way, keeping the output bit-identical to
/// the sequential build.
pub struct GridRegression {
    thresholds: AcceptanceThresholds,
    method: RegressionMethod,
}

impl GridRegression {
    pub fn new(thresholds: AcceptanceThresholds, method: RegressionMethod) -> Self {
        Self { thresholds, method }
    }

    /// Runs the regression over every tile of the grid.
    ///
    /// Zero accepted tiles is a distinct outcome, not an error; the caller
    /// decides whether to fall back to an uncorrected output.
    pub fn run(
        &self,
        grid: &TileGrid,
        input: &RasterImage,
        reference: &RasterImage,
        mask: &MaskImage,
    ) -> NormResult<GridRegressionSummary> {
        if mask.dim() != input.dim() || reference.dim() != input.dim() {
            return Err(NormError::GeometryMismatch(format!(
                "input {:?}, reference {:?} and mask {:?} must share one grid",
                input.dim(),
                reference.dim(),
                mask.dim()
            )));
        }

        log::info!("*** Processing grid tiles ***");
        log::info!(
            "{} tiles, method: {}, min pixels: {}, min R: {}",
            grid.len(),
            self.method,
            self.thresholds.min_pixels,
            self.thresholds.min_r
        );

        let fits = self.fit_tiles(grid, input, reference, mask);

        let mut summary = GridRegressionSummary {
            fits,
            accepted: 0,
            skipped_few_pixels: 0,
            skipped_low_correlation: 0,
            skipped_degenerate: 0,
        };
        for fit in &summary.fits {
            match fit.outcome {
                TileOutcome::Accepted { .. } => summary.accepted += 1,
                TileOutcome::Skipped { reason, .. } => match reason {
                    SkipReason::TooFewPixels => summary.skipped_few_pixels += 1,
                    SkipReason::LowCorrelation => summary.skipped_low_correlation += 1,
                    SkipReason::DegenerateFit => summary.skipped_degenerate += 1,
                },
            }
        }

        if summary.skipped() > 0 {
            log::info!(
                "({} skipped: {} too few valid pixels + {} low correlation + {} degenerate)",
                summary.skipped(),
                summary.skipped_few_pixels,
                summary.skipped_low_correlation,
                summary.skipped_degenerate
            );
        }
        log::info!(
            "*** Regression computed in {} of {} grid tiles. (method: {}) ***",
            summary.accepted,
            grid.len(),
            self.method
        );

        Ok(summary)
    }

    #[cfg(feature = "parallel")]
    fn fit_tiles(
        &self,
        grid: &TileGrid,
        input: &RasterImage,
        reference: &RasterImage,
        mask: &MaskImage,
    ) -> Vec<TileFit> {
        use rayon::prelude::*;

        grid.tiles
            .par_iter()
            .map(|tile| self.fit_tile(tile, input, reference, mask))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn fit_tiles(
        &self,
        grid: &TileGrid,
        input: &RasterImage,
        reference: &RasterImage,
        mask: &MaskImage,
    ) -> Vec<TileFit> {
        grid.tiles
            .iter()
            .map(|tile| self.fit_tile(tile, input, reference, mask))
            .collect()
    }

    fn fit_tile(
        &self,
        tile: &Tile,
        input: &RasterImage,
        reference: &RasterImage,
        mask: &MaskImage,
    ) -> TileFit {
        let sample = sample::sample_tile(tile, input, reference, mask);
        let n = sample.len();

        if n < self.thresholds.min_pixels {
            log::debug!(
                "Tile {}: too few valid pixels ({} < {}), skipped",
                tile.id,
                n,
                self.thresholds.min_pixels
            );
            return TileFit {
                tile_id: tile.id,
                n,
                outcome: TileOutcome::Skipped {
                    reason: SkipReason::TooFewPixels,
                    r: None,
                },
            };
        }

        let r = match regression::pearson(&sample) {
            Some(r) => r,
            None => {
                log::debug!("Tile {}: degenerate sample, skipped", tile.id);
                return TileFit {
                    tile_id: tile.id,
                    n,
                    outcome: TileOutcome::Skipped {
                        reason: SkipReason::DegenerateFit,
                        r: None,
                    },
                };
            }
        };

        if r < self.thresholds.min_r {
            log::debug!("Tile {}: low correlation, skipped. R={}", tile.id, r);
            return TileFit {
                tile_id: tile.id,
                n,
                outcome: TileOutcome::Skipped {
                    reason: SkipReason::LowCorrelation,
                    r: Some(r),
                },
            };
        }

        match regression::fit_line(&sample, self.method) {
            Some(fit) => {
                log::debug!(
                    "Tile {}: done. a={} b={} R={} n={}",
                    tile.id,
                    fit.intercept,
                    fit.slope,
                    r,
                    n
                );
                TileFit {
                    tile_id: tile.id,
                    n,
                    outcome: TileOutcome::Accepted {
                        a: fit.intercept,
                        b: fit.slope,
                        r,
                    },
                }
            }
            None => {
                log::debug!("Tile {}: no fit for method {}, skipped", tile.id, self.method);
                TileFit {
                    tile_id: tile.id,
                    n,
                    outcome: TileOutcome::Skipped {
                        reason: SkipReason::DegenerateFit,
                        r: Some(r),
                    },
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::grid::partition_region;
    use crate::core::mask::build_validity_mask;
    use crate::types::RegionGeometry;
    use ndarray::Array2;

    fn linear_pair(rows: usize, cols: usize, a: f32, b: f32) -> (RasterImage, RasterImage) {
        let input = Array2::from_shape_fn((rows, cols), |(i, j)| {
            0.1 + 0.8 * (((i * 31 + j * 17) % 1000) as f32 / 1000.0)
        });
        let reference = input.mapv(|v| a + b * v);
        (input, reference)
    }

    #[test]
    fn test_tiles_processed_in_id_order() {
        let geom = RegionGeometry::new(90, 90, 1.0, 1.0);
        let (input, reference) = linear_pair(90, 90, 0.2, 1.5);
        let mask = build_validity_mask(&input, &reference, &[]).unwrap();
        let grid = partition_region(&geom, 30.0).unwrap();

        let thresholds = AcceptanceThresholds {
            min_pixels: 10,
            min_r: 0.9,
        };
        let summary = GridRegression::new(thresholds, RegressionMethod::LeastSquares)
            .run(&grid, &input, &reference, &mask)
            .unwrap();

        assert_eq!(summary.fits.len(), grid.len());
        for (idx, fit) in summary.fits.iter().enumerate() {
            assert_eq!(fit.tile_id, idx + 1);
        }
        assert_eq!(summary.accepted, grid.len());
    }

    #[test]
    fn test_skip_counters_split_by_reason() {
        let geom = RegionGeometry::new(60, 60, 1.0, 1.0);
        let (input, reference) = linear_pair(60, 60, 0.0, 1.0);
        // Mask away the left half: those tiles starve below min_pixels
        let mut aux = Array2::from_elem((60, 60), 1.0_f32);
        for i in 0..60 {
            for j in 0..30 {
                aux[[i, j]] = 0.0;
            }
        }
        let mask = build_validity_mask(&input, &reference, &[aux]).unwrap();
        let grid = partition_region(&geom, 30.0).unwrap();

        let thresholds = AcceptanceThresholds {
            min_pixels: 100,
            min_r: 0.9,
        };
        let summary = GridRegression::new(thresholds, RegressionMethod::LeastSquares)
            .run(&grid, &input, &reference, &mask)
            .unwrap();

        assert!(summary.skipped_few_pixels > 0);
        assert!(summary.accepted > 0);
        assert_eq!(summary.accepted + summary.skipped(), grid.len());
    }

    #[test]
    fn test_constant_tile_is_degenerate_not_fatal() {
        let geom = RegionGeometry::new(20, 20, 1.0, 1.0);
        let input = Array2::from_elem((20, 20), 5.0_f32);
        let reference = Array2::from_elem((20, 20), 7.0_f32);
        let mask = build_validity_mask(&input, &reference, &[]).unwrap();
        let grid = partition_region(&geom, 20.0).unwrap();

        let thresholds = AcceptanceThresholds {
            min_pixels: 10,
            min_r: 0.9,
        };
        let summary = GridRegression::new(thresholds, RegressionMethod::Orthogonal)
            .run(&grid, &input, &reference, &mask)
            .unwrap();

        assert_eq!(summary.accepted, 0);
        assert_eq!(summary.skipped_degenerate, 1);
    }
}
