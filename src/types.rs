use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Real-valued raster sample. Non-finite values (NaN) encode null / no-data.
pub type RasterValue = f32;

/// 2D raster data array (rows x cols)
pub type RasterImage = Array2<RasterValue>;

/// Boolean validity raster, true where a pixel is usable for regression
pub type MaskImage = Array2<bool>;

/// Geometry of the working region: pixel counts and resolution in map units.
///
/// The origin is the top-left (north-west) corner; `north` is the northing of
/// the top edge and `west` the easting of the left edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionGeometry {
    pub rows: usize,
    pub cols: usize,
    /// North-south pixel resolution in map units
    pub ns_res: f64,
    /// East-west pixel resolution in map units
    pub ew_res: f64,
    pub west: f64,
    pub north: f64,
}

impl RegionGeometry {
    /// Region anchored at easting/northing origin (0, rows * ns_res)
    pub fn new(rows: usize, cols: usize, ns_res: f64, ew_res: f64) -> Self {
        Self {
            rows,
            cols,
            ns_res,
            ew_res,
            west: 0.0,
            north: rows as f64 * ns_res,
        }
    }

    /// Region anchored at an explicit north-west corner
    pub fn with_origin(
        rows: usize,
        cols: usize,
        ns_res: f64,
        ew_res: f64,
        west: f64,
        north: f64,
    ) -> Self {
        Self {
            rows,
            cols,
            ns_res,
            ew_res,
            west,
            north,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    /// East-west extent in map units
    pub fn width(&self) -> f64 {
        self.cols as f64 * self.ew_res
    }

    /// North-south extent in map units
    pub fn height(&self) -> f64 {
        self.rows as f64 * self.ns_res
    }

    /// Map coordinates of the center of pixel (row, col)
    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.west + (col as f64 + 0.5) * self.ew_res,
            self.north - (row as f64 + 0.5) * self.ns_res,
        )
    }
}

/// One rectangular tile of the working region.
///
/// Pixel bounds are clipped to the region, so edge tiles may be smaller than
/// the nominal tile size. Ids are 1-based in row-major order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tile {
    pub id: usize,
    /// First raster row covered by the tile
    pub row0: usize,
    /// First raster column covered by the tile
    pub col0: usize,
    /// Tile height in pixels after clipping
    pub height: usize,
    /// Tile width in pixels after clipping
    pub width: usize,
    /// Easting of the tile center in map units
    pub center_x: f64,
    /// Northing of the tile center in map units
    pub center_y: f64,
}

/// Paired (input, reference) sample values drawn from one tile.
///
/// Invariant: `x` and `y` always have equal length and pairs stay aligned.
#[derive(Debug, Clone, Default)]
pub struct SampleSet {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl SampleSet {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            x: Vec::with_capacity(capacity),
            y: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, x: f64, y: f64) {
        self.x.push(x);
        self.y.push(y);
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Why a tile did not contribute a fitted (a, b)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// Fewer valid pixels than the acceptance threshold
    TooFewPixels,
    /// Correlation coefficient below the acceptance threshold
    LowCorrelation,
    /// Degenerate sample (zero variance or zero covariance), no fit possible
    DegenerateFit,
}

/// Terminal outcome of the regression over one tile
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TileOutcome {
    /// Tile passed all thresholds and contributed intercept `a`, slope `b`
    Accepted { a: f64, b: f64, r: f64 },
    /// Tile skipped; `r` is present when correlation was computed before the skip
    Skipped { reason: SkipReason, r: Option<f64> },
}

/// Per-tile regression record. Immutable once computed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileFit {
    pub tile_id: usize,
    /// Number of valid pixel pairs sampled from the tile
    pub n: usize,
    pub outcome: TileOutcome,
}

impl TileFit {
    pub fn accepted(&self) -> bool {
        matches!(self.outcome, TileOutcome::Accepted { .. })
    }
}

/// Error types for normalization processing
#[derive(Debug, thiserror::Error)]
pub enum NormError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Geometry mismatch: {0}")]
    GeometryMismatch(String),

    #[error("Interpolation error: {0}")]
    Interpolation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Processing error: {0}")]
    Processing(String),
}

/// Result type for normalization operations
pub type NormResult<T> = Result<T, NormError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_center() {
        let geom = RegionGeometry::new(100, 200, 30.0, 30.0);
        let (x, y) = geom.pixel_center(0, 0);
        assert_eq!(x, 15.0);
        assert_eq!(y, 100.0 * 30.0 - 15.0);
    }

    #[test]
    fn test_sample_set_pairing() {
        let mut s = SampleSet::default();
        s.push(1.0, 2.0);
        s.push(3.0, 4.0);
        assert_eq!(s.len(), 2);
        assert_eq!(s.x.len(), s.y.len());
    }
}
