use crate::types::{NormError, NormResult, RegionGeometry, Tile};
use serde::{Deserialize, Serialize};

/// Tile lattice covering the working region without gaps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileGrid {
    /// Number of tile rows
    pub grid_rows: usize,
    /// Number of tile columns
    pub grid_cols: usize,
    /// Nominal tile height in pixels (edge tiles are clipped)
    pub tile_height: usize,
    /// Nominal tile width in pixels (edge tiles are clipped)
    pub tile_width: usize,
    /// Tile descriptors, ids 1..=grid_rows*grid_cols in row-major order
    pub tiles: Vec<Tile>,
}

impl TileGrid {
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

/// Divides the working region into a near-square lattice of tiles whose size
/// approximates `tile_size` map units, aligned to the pixel grid.
///
/// Row and column counts come from rounding the region extent against the
/// target size (minimum 1 each); the nominal pixel dimensions get one extra
/// pixel so the lattice covers the region without leaving a ragged strip.
/// The actual tile size may therefore exceed the target slightly, which is
/// reported rather than silently swallowed.
pub fn partition_region(geometry: &RegionGeometry, tile_size: f64) -> NormResult<TileGrid> {
    if geometry.is_empty() {
        return Err(NormError::InvalidInput(
            "Cannot partition an empty region".to_string(),
        ));
    }
    if !(tile_size > 0.0) {
        return Err(NormError::InvalidInput(format!(
            "Grid tile size must be positive, got {}",
            tile_size
        )));
    }

    log::info!("*** Creating the grid ***");
    let grid_rows = ((geometry.rows as f64 * geometry.ns_res / tile_size).round() as usize).max(1);
    let grid_cols = ((geometry.cols as f64 * geometry.ew_res / tile_size).round() as usize).max(1);
    let tile_height = (geometry.rows as f64 / grid_rows as f64).round() as usize + 1;
    let tile_width = (geometry.cols as f64 / grid_cols as f64).round() as usize + 1;

    log::info!("Grid size: {} rows, {} cols.", grid_rows, grid_cols);
    log::info!(
        "Actual grid tile size (W x H): {} x {} map units ({} x {} px)",
        geometry.ew_res * tile_width as f64,
        geometry.ns_res * tile_height as f64,
        tile_width,
        tile_height
    );

    let mut tiles = Vec::with_capacity(grid_rows * grid_cols);
    for gr in 0..grid_rows {
        for gc in 0..grid_cols {
            let row0 = (gr * tile_height).min(geometry.rows);
            let col0 = (gc * tile_width).min(geometry.cols);
            let height = (geometry.rows - row0).min(tile_height);
            let width = (geometry.cols - col0).min(tile_width);
            let center_x = geometry.west + (col0 as f64 + width as f64 / 2.0) * geometry.ew_res;
            let center_y = geometry.north - (row0 as f64 + height as f64 / 2.0) * geometry.ns_res;
            tiles.push(Tile {
                id: gr * grid_cols + gc + 1,
                row0,
                col0,
                height,
                width,
                center_x,
                center_y,
            });
        }
    }

    Ok(TileGrid {
        grid_rows,
        grid_cols,
        tile_height,
        tile_width,
        tiles,
    })
}
