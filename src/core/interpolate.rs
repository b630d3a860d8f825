use crate::types::{NormError, NormResult, RasterImage, RegionGeometry};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

/// Interpolation basis for the correction surfaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterpolationMethod {
    /// Bilinear tent basis
    Bilinear,
    /// Smoothing bicubic B-spline basis
    Bicubic,
}

impl Default for InterpolationMethod {
    fn default() -> Self {
        InterpolationMethod::Bicubic
    }
}

impl std::fmt::Display for InterpolationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InterpolationMethod::Bilinear => write!(f, "bilinear"),
            InterpolationMethod::Bicubic => write!(f, "bicubic"),
        }
    }
}

/// Spline surface fitting parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterpolationParams {
    pub method: InterpolationMethod,
    /// Tikhonov regularization weight on the lattice coefficients
    pub lambda: f64,
    /// Control lattice spacing, east-west (map units)
    pub ew_step: f64,
    /// Control lattice spacing, north-south (map units)
    pub ns_step: f64,
}

impl Default for InterpolationParams {
    fn default() -> Self {
        Self {
            method: InterpolationMethod::default(),
            lambda: 0.1,
            ew_step: 6000.0,
            ns_step: 6000.0,
        }
    }
}

/// A scattered observation: map-unit position and value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceSample {
    pub x: f64,
    pub y: f64,
    pub value: f64,
}

/// Hard bound on the control lattice size; the normal-equation matrix is
/// dense, so the solve is cubic in the knot count.
const MAX_KNOTS: usize = 2500;

/// Fits a smooth surface through scattered samples and rasterizes it.
///
/// The surface is a tensor-product spline on a uniform control lattice whose
/// spacing is the configured step (the grid tile size is the natural
/// choice). Lattice coefficients come from a least-squares fit against the
/// samples with Tikhonov weight `lambda`, so the surface approximates, not
/// necessarily matches, each sample value.
///
/// Samples are centered on their mean before the solve and the mean is added
/// back on evaluation. Away from any sample the coefficients relax to zero
/// under the regularization, so the surface tends deterministically toward
/// the mean sample value outside the data hull.
pub struct SurfaceInterpolator {
    params: InterpolationParams,
}

impl SurfaceInterpolator {
    pub fn new(params: InterpolationParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &InterpolationParams {
        &self.params
    }

    /// Interpolates the samples into a dense raster over the region.
    pub fn interpolate(
        &self,
        samples: &[SurfaceSample],
        geometry: &RegionGeometry,
    ) -> NormResult<RasterImage> {
        if samples.is_empty() {
            return Err(NormError::InvalidInput(
                "No samples to interpolate".to_string(),
            ));
        }
        if geometry.is_empty() {
            return Err(NormError::InvalidInput(
                "Cannot interpolate over an empty region".to_string(),
            ));
        }
        if !(self.params.ew_step > 0.0) || !(self.params.ns_step > 0.0) {
            return Err(NormError::InvalidInput(format!(
                "Interpolation step must be positive, got {} x {}",
                self.params.ew_step, self.params.ns_step
            )));
        }
        if !(self.params.lambda >= 0.0) {
            return Err(NormError::InvalidInput(format!(
                "Regularization weight must be non-negative, got {}",
                self.params.lambda
            )));
        }

        let lattice = Lattice::new(geometry, &self.params);
        let knots = lattice.num_knots();
        if knots > MAX_KNOTS {
            return Err(NormError::Interpolation(format!(
                "Control lattice of {} knots exceeds the supported {}; increase the step size",
                knots, MAX_KNOTS
            )));
        }
        log::debug!(
            "Control lattice: {} x {} knots, method: {}, lambda: {}",
            lattice.ny,
            lattice.nx,
            self.params.method,
            self.params.lambda
        );

        let mean = samples.iter().map(|s| s.value).sum::<f64>() / samples.len() as f64;

        // Normal equations A^T A + lambda I over the lattice coefficients
        let mut ata = Array2::<f64>::zeros((knots, knots));
        let mut atv = vec![0.0_f64; knots];
        let mut idx = [0_usize; 16];
        let mut w = [0.0_f64; 16];
        for s in samples {
            let m = lattice.basis_at(s.x, s.y, &mut idx, &mut w);
            let centered = s.value - mean;
            for a in 0..m {
                atv[idx[a]] += w[a] * centered;
                for b in 0..m {
                    ata[[idx[a], idx[b]]] += w[a] * w[b];
                }
            }
        }
        for d in 0..knots {
            ata[[d, d]] += self.params.lambda;
        }

        let coeff = cholesky_solve(ata, atv)?;
        Ok(self.evaluate(&lattice, &coeff, mean, geometry))
    }

    fn evaluate(
        &self,
        lattice: &Lattice,
        coeff: &[f64],
        mean: f64,
        geometry: &RegionGeometry,
    ) -> RasterImage {
        let mut surface = RasterImage::zeros((geometry.rows, geometry.cols));

        #[cfg(feature = "parallel")]
        {
            use ndarray::parallel::prelude::*;

            surface
                .axis_iter_mut(Axis(0))
                .into_par_iter()
                .enumerate()
                .for_each(|(i, mut row)| {
                    fill_surface_row(i, &mut row, lattice, coeff, mean, geometry);
                });
        }

        #[cfg(not(feature = "parallel"))]
        for (i, mut row) in surface.axis_iter_mut(Axis(0)).enumerate() {
            fill_surface_row(i, &mut row, lattice, coeff, mean, geometry);
        }

        surface
    }
}

fn fill_surface_row(
    row_index: usize,
    row: &mut ndarray::ArrayViewMut1<f32>,
    lattice: &Lattice,
    coeff: &[f64],
    mean: f64,
    geometry: &RegionGeometry,
) {
    let mut idx = [0_usize; 16];
    let mut w = [0.0_f64; 16];
    for j in 0..geometry.cols {
        let (x, y) = geometry.pixel_center(row_index, j);
        let m = lattice.basis_at(x, y, &mut idx, &mut w);
        let mut value = mean;
        for a in 0..m {
            value += w[a] * coeff[idx[a]];
        }
        row[j] = value as f32;
    }
}

/// Uniform control lattice with one knot of margin around the region (two for
/// the cubic basis), so every in-region evaluation has full basis support.
struct Lattice {
    x0: f64,
    y0: f64,
    hx: f64,
    hy: f64,
    nx: usize,
    ny: usize,
    method: InterpolationMethod,
}

impl Lattice {
    fn new(geometry: &RegionGeometry, params: &InterpolationParams) -> Self {
        let nx = (geometry.width() / params.ew_step).ceil() as usize + 4;
        let ny = (geometry.height() / params.ns_step).ceil() as usize + 4;
        let south = geometry.north - geometry.height();
        Self {
            x0: geometry.west - params.ew_step,
            y0: south - params.ns_step,
            hx: params.ew_step,
            hy: params.ns_step,
            nx,
            ny,
            method: params.method,
        }
    }

    fn num_knots(&self) -> usize {
        self.nx * self.ny
    }

    /// Tensor-product basis at (x, y): writes flattened knot indices and
    /// weights, returns how many entries are set (4 bilinear, 16 bicubic).
    fn basis_at(&self, x: f64, y: f64, idx: &mut [usize; 16], w: &mut [f64; 16]) -> usize {
        let (bx, wx, cx) = basis_1d((x - self.x0) / self.hx, self.nx, self.method);
        let (by, wy, cy) = basis_1d((y - self.y0) / self.hy, self.ny, self.method);
        let mut m = 0;
        for b in 0..cy {
            for a in 0..cx {
                idx[m] = (by + b) * self.nx + (bx + a);
                w[m] = wy[b] * wx[a];
                m += 1;
            }
        }
        m
    }
}

/// One-dimensional basis weights at lattice coordinate `u`.
///
/// The support index is clamped into the lattice, with the local coordinate
/// recomputed against the clamped knot; points nudged past the margin by
/// rounding evaluate as the polynomial extension of the edge span.
fn basis_1d(u: f64, n: usize, method: InterpolationMethod) -> (usize, [f64; 4], usize) {
    match method {
        InterpolationMethod::Bilinear => {
            let i = (u.floor() as isize).clamp(0, n as isize - 2) as usize;
            let t = u - i as f64;
            (i, [1.0 - t, t, 0.0, 0.0], 2)
        }
        InterpolationMethod::Bicubic => {
            let i = (u.floor() as isize).clamp(1, n as isize - 3) as usize;
            let t = u - i as f64;
            let t2 = t * t;
            let t3 = t2 * t;
            let omt = 1.0 - t;
            (
                i - 1,
                [
                    omt * omt * omt / 6.0,
                    (3.0 * t3 - 6.0 * t2 + 4.0) / 6.0,
                    (-3.0 * t3 + 3.0 * t2 + 3.0 * t + 1.0) / 6.0,
                    t3 / 6.0,
                ],
                4,
            )
        }
    }
}

/// Solves the symmetric positive definite system via Cholesky factorization.
fn cholesky_solve(mut a: Array2<f64>, mut b: Vec<f64>) -> NormResult<Vec<f64>> {
    let n = b.len();
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= a[[i, k]] * a[[j, k]];
            }
            if i == j {
                if sum <= 0.0 {
                    return Err(NormError::Interpolation(
                        "Normal equations are not positive definite; \
                         increase the regularization weight"
                            .to_string(),
                    ));
                }
                a[[i, i]] = sum.sqrt();
            } else {
                a[[i, j]] = sum / a[[j, j]];
            }
        }
    }
    // L z = b
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= a[[i, k]] * b[k];
        }
        b[i] = sum / a[[i, i]];
    }
    // L^T c = z
    for i in (0..n).rev() {
        let mut sum = b[i];
        for k in (i + 1)..n {
            sum -= a[[k, i]] * b[k];
        }
        b[i] = sum / a[[i, i]];
    }
    Ok(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_single_sample_yields_constant_surface() {
        let geom = RegionGeometry::new(20, 20, 1.0, 1.0);
        for method in [InterpolationMethod::Bilinear, InterpolationMethod::Bicubic] {
            let params = InterpolationParams {
                method,
                lambda: 0.1,
                ew_step: 20.0,
                ns_step: 20.0,
            };
            let samples = [SurfaceSample {
                x: 10.0,
                y: 10.0,
                value: 1.5,
            }];
            let surface = SurfaceInterpolator::new(params)
                .interpolate(&samples, &geom)
                .unwrap();
            for &v in surface.iter() {
                assert_relative_eq!(v as f64, 1.5, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_uniform_samples_yield_constant_surface() {
        let geom = RegionGeometry::new(30, 30, 1.0, 1.0);
        let params = InterpolationParams {
            method: InterpolationMethod::Bicubic,
            lambda: 0.1,
            ew_step: 10.0,
            ns_step: 10.0,
        };
        let mut samples = Vec::new();
        for i in 0..3 {
            for j in 0..3 {
                samples.push(SurfaceSample {
                    x: 5.0 + j as f64 * 10.0,
                    y: 5.0 + i as f64 * 10.0,
                    value: 0.75,
                });
            }
        }
        let surface = SurfaceInterpolator::new(params)
            .interpolate(&samples, &geom)
            .unwrap();
        for &v in surface.iter() {
            assert_relative_eq!(v as f64, 0.75, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_surface_approximates_samples() {
        let geom = RegionGeometry::new(40, 40, 1.0, 1.0);
        let params = InterpolationParams {
            method: InterpolationMethod::Bilinear,
            lambda: 1e-6,
            ew_step: 10.0,
            ns_step: 10.0,
        };
        // Gentle ramp sampled on a 4x4 lattice of pixel centers
        let mut samples = Vec::new();
        for i in 0..4 {
            for j in 0..4 {
                let x = 4.5 + j as f64 * 10.0;
                let y = 4.5 + i as f64 * 10.0;
                samples.push(SurfaceSample {
                    x,
                    y,
                    value: 1.0 + 0.01 * x + 0.02 * y,
                });
            }
        }
        let surface = SurfaceInterpolator::new(params)
            .interpolate(&samples, &geom)
            .unwrap();
        for s in &samples {
            let col = (s.x - 0.5).round() as usize;
            let row = (geom.north - s.y - 0.5).round() as usize;
            assert_relative_eq!(surface[[row, col]] as f64, s.value, epsilon = 0.05);
        }
    }

    #[test]
    fn test_no_samples_is_an_error() {
        let geom = RegionGeometry::new(10, 10, 1.0, 1.0);
        let result = SurfaceInterpolator::new(InterpolationParams::default())
            .interpolate(&[], &geom);
        assert!(result.is_err());
    }

    #[test]
    fn test_lattice_too_dense_is_an_error() {
        let geom = RegionGeometry::new(1000, 1000, 1.0, 1.0);
        let params = InterpolationParams {
            method: InterpolationMethod::Bicubic,
            lambda: 0.1,
            ew_step: 5.0,
            ns_step: 5.0,
        };
        let samples = [SurfaceSample {
            x: 500.0,
            y: 500.0,
            value: 1.0,
        }];
        let result = SurfaceInterpolator::new(params).interpolate(&samples, &geom);
        assert!(matches!(result, Err(NormError::Interpolation(_))));
    }
}
