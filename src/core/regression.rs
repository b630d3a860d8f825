use crate::types::SampleSet;
use serde::{Deserialize, Serialize};

/// Available regression methods for the per-tile line fit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegressionMethod {
    /// Ordinary least squares of y on x (minimizes vertical residuals)
    LeastSquares,
    /// Total least squares (minimizes perpendicular distance)
    Orthogonal,
    /// Theil-Sen estimator (median of pairwise slopes, outlier-robust)
    TheilSen,
}

impl Default for RegressionMethod {
    fn default() -> Self {
        RegressionMethod::Orthogonal
    }
}

impl std::fmt::Display for RegressionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegressionMethod::LeastSquares => write!(f, "least_squares"),
            RegressionMethod::Orthogonal => write!(f, "orthogonal"),
            RegressionMethod::TheilSen => write!(f, "theil_sen"),
        }
    }
}

/// Fitted line y = intercept + slope * x
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    pub intercept: f64,
    pub slope: f64,
}

/// Upper bound on points entering the pairwise Theil-Sen slope enumeration.
/// Larger samples are thinned by an even stride before the O(n^2) step, so a
/// tile of tens of thousands of pixels stays at roughly half a million pairs.
const THEIL_SEN_MAX_POINTS: usize = 1000;

struct SampleMoments {
    mean_x: f64,
    mean_y: f64,
    /// Sample variance of x (n-1 divisor)
    sxx: f64,
    /// Sample variance of y (n-1 divisor)
    syy: f64,
    /// Sample covariance of x and y (n-1 divisor)
    sxy: f64,
}

fn moments(sample: &SampleSet) -> Option<SampleMoments> {
    let n = sample.len();
    if n < 2 {
        return None;
    }
    let nf = n as f64;
    let mean_x = sample.x.iter().sum::<f64>() / nf;
    let mean_y = sample.y.iter().sum::<f64>() / nf;

    let mut sxx = 0.0;
    let mut syy = 0.0;
    let mut sxy = 0.0;
    for (&x, &y) in sample.x.iter().zip(sample.y.iter()) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }
    let denom = nf - 1.0;
    Some(SampleMoments {
        mean_x,
        mean_y,
        sxx: sxx / denom,
        syy: syy / denom,
        sxy: sxy / denom,
    })
}

/// Pearson correlation coefficient of the full sample.
///
/// Computed independently of whichever method fits the line. Returns `None`
/// for degenerate samples (fewer than two pairs, or zero variance in either
/// coordinate).
pub fn pearson(sample: &SampleSet) -> Option<f64> {
    let m = moments(sample)?;
    let denom = (m.sxx * m.syy).sqrt();
    if denom > 0.0 {
        Some(m.sxy / denom)
    } else {
        None
    }
}

/// Fits a line through the sample with the selected method.
///
/// Returns `None` when the sample is degenerate for that method: fewer than
/// two pairs, zero x-variance for least squares, zero covariance for the
/// orthogonal fit, or no finite pairwise slope for Theil-Sen. A no-fit is a
/// per-tile outcome, never a run-level failure.
pub fn fit_line(sample: &SampleSet, method: RegressionMethod) -> Option<LinearFit> {
    match method {
        RegressionMethod::LeastSquares => fit_least_squares(sample),
        RegressionMethod::Orthogonal => fit_orthogonal(sample),
        RegressionMethod::TheilSen => fit_theil_sen(sample),
    }
}

fn fit_least_squares(sample: &SampleSet) -> Option<LinearFit> {
    let m = moments(sample)?;
    if m.sxx == 0.0 {
        return None;
    }
    let slope = m.sxy / m.sxx;
    Some(LinearFit {
        intercept: m.mean_y - slope * m.mean_x,
        slope,
    })
}

fn fit_orthogonal(sample: &SampleSet) -> Option<LinearFit> {
    let m = moments(sample)?;
    if m.sxy == 0.0 {
        return None;
    }
    let d = m.syy - m.sxx;
    let slope = (d + (d * d + 4.0 * m.sxy * m.sxy).sqrt()) / (2.0 * m.sxy);
    Some(LinearFit {
        intercept: m.mean_y - slope * m.mean_x,
        slope,
    })
}

fn fit_theil_sen(sample: &SampleSet) -> Option<LinearFit> {
    let n = sample.len();
    if n < 2 {
        return None;
    }

    // Deterministic thinning: an even stride over the row-major sample keeps
    // the pair enumeration bounded without any randomness.
    let stride = (n + THEIL_SEN_MAX_POINTS - 1) / THEIL_SEN_MAX_POINTS;
    let mut xs = Vec::with_capacity(n / stride + 1);
    let mut ys = Vec::with_capacity(n / stride + 1);
    for i in (0..n).step_by(stride) {
        xs.push(sample.x[i]);
        ys.push(sample.y[i]);
    }

    let k = xs.len();
    let mut slopes = Vec::with_capacity(k * (k - 1) / 2);
    for i in 0..k {
        for j in (i + 1)..k {
            let dx = xs[j] - xs[i];
            if dx != 0.0 {
                slopes.push((ys[j] - ys[i]) / dx);
            }
        }
    }
    if slopes.is_empty() {
        return None;
    }

    let slope = median(&mut slopes);
    let intercept = median(&mut ys) - slope * median(&mut xs);
    Some(LinearFit { intercept, slope })
}

fn median(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        (values[mid - 1] + values[mid]) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn exact_line(n: usize, a: f64, b: f64) -> SampleSet {
        let mut s = SampleSet::default();
        for i in 0..n {
            let x = 1.0 + i as f64 * 0.5;
            s.push(x, a + b * x);
        }
        s
    }

    #[test]
    fn test_least_squares_recovers_exact_line() {
        let s = exact_line(25, 0.3, 1.7);
        let fit = fit_line(&s, RegressionMethod::LeastSquares).unwrap();
        assert_relative_eq!(fit.slope, 1.7, epsilon = 1e-12);
        assert_relative_eq!(fit.intercept, 0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_pearson_on_exact_line_is_one() {
        let s = exact_line(25, 0.3, 1.7);
        assert_relative_eq!(pearson(&s).unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_pearson_degenerate_sample() {
        let mut s = SampleSet::default();
        s.push(2.0, 1.0);
        s.push(2.0, 3.0);
        s.push(2.0, 5.0);
        // Zero x-variance
        assert!(pearson(&s).is_none());
        assert!(fit_line(&s, RegressionMethod::LeastSquares).is_none());
    }

    #[test]
    fn test_orthogonal_zero_covariance_is_no_fit() {
        let mut s = SampleSet::default();
        // Symmetric cross: Sxy is exactly zero
        s.push(1.0, 2.0);
        s.push(3.0, 2.0);
        s.push(2.0, 1.0);
        s.push(2.0, 3.0);
        assert!(fit_line(&s, RegressionMethod::Orthogonal).is_none());
    }

    #[test]
    fn test_orthogonal_recovers_exact_line() {
        let s = exact_line(25, 0.2, 1.5);
        let fit = fit_line(&s, RegressionMethod::Orthogonal).unwrap();
        assert_relative_eq!(fit.slope, 1.5, epsilon = 1e-9);
        assert_relative_eq!(fit.intercept, 0.2, epsilon = 1e-9);
    }

    #[test]
    fn test_orthogonal_swap_inverts_the_line() {
        let mut s = SampleSet::default();
        for i in 0..40 {
            let x = 1.0 + i as f64 * 0.25;
            // Mild deterministic scatter around the line
            let noise = 0.05 * ((i * 7 % 11) as f64 - 5.0) / 5.0;
            s.push(x, 0.4 + 1.3 * x + noise);
        }
        let fit = fit_line(&s, RegressionMethod::Orthogonal).unwrap();

        let swapped = SampleSet {
            x: s.y.clone(),
            y: s.x.clone(),
        };
        let inv = fit_line(&swapped, RegressionMethod::Orthogonal).unwrap();

        // The perpendicular fit is symmetric in x and y: swapping the roles
        // yields the algebraic inverse of the same line.
        assert_relative_eq!(inv.slope, 1.0 / fit.slope, epsilon = 1e-9);
        assert_relative_eq!(inv.intercept, -fit.intercept / fit.slope, epsilon = 1e-9);
    }

    #[test]
    fn test_theil_sen_recovers_exact_line() {
        let s = exact_line(30, -0.4, 2.1);
        let fit = fit_line(&s, RegressionMethod::TheilSen).unwrap();
        assert_relative_eq!(fit.slope, 2.1, epsilon = 1e-12);
        assert_relative_eq!(fit.intercept, -0.4, epsilon = 1e-12);
    }

    #[test]
    fn test_theil_sen_thinning_stays_deterministic() {
        let s = exact_line(5000, 0.1, 0.9);
        let first = fit_line(&s, RegressionMethod::TheilSen).unwrap();
        let second = fit_line(&s, RegressionMethod::TheilSen).unwrap();
        assert_eq!(first.slope.to_bits(), second.slope.to_bits());
        assert_eq!(first.intercept.to_bits(), second.intercept.to_bits());
        assert_relative_eq!(first.slope, 0.9, epsilon = 1e-9);
    }

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&mut [4.0, 1.0, 3.0, 2.0]), 2.5);
    }
}
