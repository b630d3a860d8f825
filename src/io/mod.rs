//! Interface boundary to the surrounding raster storage system.
//!
//! The normalization core operates on in-memory arrays; whatever system owns
//! the persistent rasters implements [`RasterStore`] and hands the core plain
//! grids. Storage failures surface as [`NormError::Storage`] and abort the
//! current run; retry policy belongs to the storage collaborator.

use std::collections::HashMap;

use ndarray::s;

use crate::core::pipeline::{GridNormalizer, NormalizationProduct};
use crate::types::{NormError, NormResult, RasterImage, RegionGeometry};

/// Pixel window into the working region (end-exclusive bounds)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelWindow {
    pub row0: usize,
    pub col0: usize,
    pub rows: usize,
    pub cols: usize,
}

/// Raster storage collaborator.
pub trait RasterStore {
    /// Geometry of the working region all rasters share
    fn geometry(&self) -> NormResult<RegionGeometry>;

    /// Reads a full named raster
    fn read_raster(&self, name: &str) -> NormResult<RasterImage>;

    /// Reads a sub-extent of a named raster
    fn read_raster_region(&self, name: &str, window: PixelWindow) -> NormResult<RasterImage> {
        let full = self.read_raster(name)?;
        let (rows, cols) = full.dim();
        if window.row0 + window.rows > rows || window.col0 + window.cols > cols {
            return Err(NormError::Storage(format!(
                "Window {:?} exceeds raster map <{}> ({} x {})",
                window, name, rows, cols
            )));
        }
        Ok(full
            .slice(s![
                window.row0..window.row0 + window.rows,
                window.col0..window.col0 + window.cols
            ])
            .to_owned())
    }

    /// Writes a named raster
    fn write_raster(&mut self, name: &str, data: RasterImage) -> NormResult<()>;
}

/// In-memory raster store for tests and embedding.
#[derive(Debug)]
pub struct MemoryStore {
    geometry: RegionGeometry,
    rasters: HashMap<String, RasterImage>,
}

impl MemoryStore {
    pub fn new(geometry: RegionGeometry) -> Self {
        Self {
            geometry,
            rasters: HashMap::new(),
        }
    }

    pub fn insert(&mut self, name: &str, data: RasterImage) {
        self.rasters.insert(name.to_string(), data);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rasters.contains_key(name)
    }
}

impl RasterStore for MemoryStore {
    fn geometry(&self) -> NormResult<RegionGeometry> {
        Ok(self.geometry.clone())
    }

    fn read_raster(&self, name: &str) -> NormResult<RasterImage> {
        self.rasters
            .get(name)
            .cloned()
            .ok_or_else(|| NormError::Storage(format!("Raster map <{}> not found", name)))
    }

    fn write_raster(&mut self, name: &str, data: RasterImage) -> NormResult<()> {
        self.rasters.insert(name.to_string(), data);
        Ok(())
    }
}

/// Reads the named bands from the store, runs the normalization pipeline and
/// writes the corrected band back under `output`.
pub fn normalize_from_store<S: RasterStore>(
    store: &mut S,
    normalizer: &GridNormalizer,
    input: &str,
    reference: &str,
    aux_layers: &[&str],
    output: &str,
) -> NormResult<NormalizationProduct> {
    let geometry = store.geometry()?;
    let input_band = store.read_raster(input)?;
    let reference_band = store.read_raster(reference)?;
    let aux: Vec<RasterImage> = aux_layers
        .iter()
        .map(|name| store.read_raster(name))
        .collect::<NormResult<_>>()?;

    let product = normalizer.normalize(&input_band, &reference_band, &aux, &geometry)?;
    store.write_raster(output, product.output.clone())?;
    log::info!("Output map created: {}", output);
    Ok(product)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_missing_raster_is_a_storage_error() {
        let store = MemoryStore::new(RegionGeometry::new(4, 4, 1.0, 1.0));
        match store.read_raster("nope") {
            Err(NormError::Storage(_)) => {}
            other => panic!("expected storage error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_window_read() {
        let mut store = MemoryStore::new(RegionGeometry::new(4, 4, 1.0, 1.0));
        let band = Array2::from_shape_fn((4, 4), |(i, j)| (i * 4 + j) as f32);
        store.insert("band", band);
        let window = PixelWindow {
            row0: 1,
            col0: 2,
            rows: 2,
            cols: 2,
        };
        let sub = store.read_raster_region("band", window).unwrap();
        assert_eq!(sub.dim(), (2, 2));
        assert_eq!(sub[[0, 0]], 6.0);
        assert_eq!(sub[[1, 1]], 11.0);
    }

    #[test]
    fn test_window_out_of_bounds() {
        let mut store = MemoryStore::new(RegionGeometry::new(4, 4, 1.0, 1.0));
        store.insert("band", Array2::zeros((4, 4)));
        let window = PixelWindow {
            row0: 3,
            col0: 0,
            rows: 2,
            cols: 4,
        };
        assert!(store.read_raster_region("band", window).is_err());
    }
}
