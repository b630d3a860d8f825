use crate::types::{MaskImage, NormError, NormResult, RasterImage};
use ndarray::Array2;

/// Builds the aggregate validity mask for regression sampling.
///
/// A pixel is valid iff the input and reference bands are both non-null
/// (finite) there, and every auxiliary change layer holds a value strictly
/// greater than zero at that pixel. Auxiliary layers follow the 0/null =
/// discard, 1-255 = keep convention, so cloud masks, change masks and
/// no-data masks can all be supplied as-is.
///
/// The returned mask replaces whatever mask a previous run produced; it is
/// never merged with earlier state.
pub fn build_validity_mask(
    input: &RasterImage,
    reference: &RasterImage,
    aux_layers: &[RasterImage],
) -> NormResult<MaskImage> {
    let dim = input.dim();
    if reference.dim() != dim {
        return Err(NormError::GeometryMismatch(format!(
            "reference band is {:?}, input band is {:?}",
            reference.dim(),
            dim
        )));
    }
    for (idx, layer) in aux_layers.iter().enumerate() {
        if layer.dim() != dim {
            return Err(NormError::GeometryMismatch(format!(
                "mask layer {} is {:?}, input band is {:?}",
                idx,
                layer.dim(),
                dim
            )));
        }
    }

    if aux_layers.is_empty() {
        log::warn!(
            "No mask layers supplied! The mask will be created only based on \
             valid (non-null) pixels of the input and reference bands."
        );
    }
    log::info!(
        "Creating aggregate validity mask ({} auxiliary layer(s))",
        aux_layers.len()
    );

    let (rows, cols) = dim;
    let mut mask = Array2::from_elem(dim, false);
    let mut valid_count = 0usize;

    for i in 0..rows {
        for j in 0..cols {
            let mut valid = input[[i, j]].is_finite() && reference[[i, j]].is_finite();
            if valid {
                for layer in aux_layers {
                    let v = layer[[i, j]];
                    if !(v.is_finite() && v > 0.0) {
                        valid = false;
                        break;
                    }
                }
            }
            if valid {
                mask[[i, j]] = true;
                valid_count += 1;
            }
        }
    }

    log::debug!(
        "Validity mask: {} of {} pixels usable",
        valid_count,
        rows * cols
    );
    Ok(mask)
}
