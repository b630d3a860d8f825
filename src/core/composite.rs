use crate::types::{NormError, NormResult, RasterImage};
use ndarray::Zip;

/// Applies the correction surfaces to the input band.
///
/// `output = b_surface * input + a_surface` at every pixel, independent of
/// any mask: the correction covers the whole image, not just the pixels that
/// fed the regression. Null (NaN) input pixels stay null in the output.
pub fn apply_correction(
    input: &RasterImage,
    a_surface: &RasterImage,
    b_surface: &RasterImage,
) -> NormResult<RasterImage> {
    if a_surface.dim() != input.dim() || b_surface.dim() != input.dim() {
        return Err(NormError::GeometryMismatch(format!(
            "correction surfaces {:?}/{:?} do not match the input band {:?}",
            a_surface.dim(),
            b_surface.dim(),
            input.dim()
        )));
    }

    let mut output = RasterImage::zeros(input.dim());
    Zip::from(&mut output)
        .and(input)
        .and(a_surface)
        .and(b_surface)
        .for_each(|o, &x, &a, &b| {
            *o = b * x + a;
        });
    Ok(output)
}

/// Degraded fallback when no tile produced an accepted fit: the input band
/// is passed through bit-exact, uncorrected.
pub fn passthrough(input: &RasterImage) -> RasterImage {
    input.clone()
}
