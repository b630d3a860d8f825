use crate::types::{MaskImage, RasterImage, SampleSet, Tile};
use ndarray::s;

/// Extracts the valid (input, reference) pixel pairs of one tile.
///
/// A pair is included iff the pixel lies inside the tile bounds, the mask
/// marks it valid, and both raw values are strictly positive. The positive
/// filter is stricter than the mask alone: once nulls are read into arrays
/// as zeros, a zero-valued "valid" pixel is indistinguishable from no-data,
/// so it is excluded as well.
///
/// Pairs are collected in row-major order, keeping runs deterministic.
pub fn sample_tile(
    tile: &Tile,
    input: &RasterImage,
    reference: &RasterImage,
    mask: &MaskImage,
) -> SampleSet {
    let r1 = tile.row0 + tile.height;
    let c1 = tile.col0 + tile.width;
    let xw = input.slice(s![tile.row0..r1, tile.col0..c1]);
    let yw = reference.slice(s![tile.row0..r1, tile.col0..c1]);
    let mw = mask.slice(s![tile.row0..r1, tile.col0..c1]);

    let mut sample = SampleSet::with_capacity(tile.height * tile.width / 4);
    for i in 0..tile.height {
        for j in 0..tile.width {
            if !mw[[i, j]] {
                continue;
            }
            let x = xw[[i, j]];
            let y = yw[[i, j]];
            if x > 0.0 && y > 0.0 {
                sample.push(x as f64, y as f64);
            }
        }
    }
    sample
}
