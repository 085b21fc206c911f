use nalgebra::{DMatrix, DVector};

/// Determinants below this are treated as degenerate.
pub const DET_FLOOR: f64 = 1e-10;
/// Regime likelihoods never drop below this, so no regime is ever
/// assigned exactly zero posterior mass.
pub const LIKELIHOOD_FLOOR: f64 = 1e-10;

/// Escalating ridge terms tried before giving up on a true inverse.
const RIDGE_STEPS: [f64; 4] = [1e-8, 1e-6, 1e-4, 1e-2];

fn is_finite_matrix(m: &DMatrix<f64>) -> bool {
    m.iter().all(|v| v.is_finite())
}

/// Inverse that never fails. Tries a plain LU inverse, then retries with
/// escalating ridge regularization, and as a last resort returns a scaled
/// identity so downstream Kalman math stays finite.
pub fn guarded_inverse(m: &DMatrix<f64>) -> DMatrix<f64> {
    let n = m.nrows();
    if is_finite_matrix(m) {
        if let Some(inv) = m.clone().try_inverse() {
            if is_finite_matrix(&inv) {
                return inv;
            }
        }
        for ridge in RIDGE_STEPS {
            let regularized = m + DMatrix::identity(n, n) * ridge;
            if let Some(inv) = regularized.try_inverse() {
                if is_finite_matrix(&inv) {
                    return inv;
                }
            }
        }
    }
    // Identity scaled by the mean diagonal keeps the gain magnitude sane.
    let diag_mean = (m.diagonal().iter().map(|v| v.abs()).sum::<f64>() / n as f64).max(DET_FLOOR);
    DMatrix::identity(n, n) / diag_mean
}

/// Determinant floored above zero.
pub fn guarded_determinant(m: &DMatrix<f64>) -> f64 {
    if !is_finite_matrix(m) {
        return DET_FLOOR;
    }
    let det = m.determinant();
    if !det.is_finite() || det < DET_FLOOR {
        DET_FLOOR
    } else {
        det
    }
}

/// Force symmetry after update steps that accumulate asymmetric rounding.
pub fn symmetrize(m: &DMatrix<f64>) -> DMatrix<f64> {
    (m + m.transpose()) * 0.5
}

/// Gaussian density of an innovation under covariance `cov`, floored at
/// [`LIKELIHOOD_FLOOR`] so posterior mass never collapses to exactly zero.
pub fn gaussian_likelihood(innovation: &DVector<f64>, cov: &DMatrix<f64>) -> f64 {
    let dim = innovation.len() as f64;
    let inv = guarded_inverse(cov);
    let det = guarded_determinant(cov);

    let mahalanobis = (innovation.transpose() * &inv * innovation)[(0, 0)];
    if !mahalanobis.is_finite() || mahalanobis < 0.0 {
        return LIKELIHOOD_FLOOR;
    }

    let norm = ((2.0 * std::f64::consts::PI).powf(dim) * det).sqrt();
    let density = (-0.5 * mahalanobis).exp() / norm.max(DET_FLOOR);
    if !density.is_finite() {
        return LIKELIHOOD_FLOOR;
    }
    density.max(LIKELIHOOD_FLOOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverse_of_identity_is_identity() {
        let m = DMatrix::<f64>::identity(7, 7);
        let inv = guarded_inverse(&m);
        assert!((inv - DMatrix::<f64>::identity(7, 7)).norm() < 1e-12);
    }

    #[test]
    fn inverse_of_singular_matrix_is_finite() {
        let m = DMatrix::<f64>::zeros(4, 4);
        let inv = guarded_inverse(&m);
        assert!(inv.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn inverse_recovers_general_matrix_above_2x2() {
        // 3x3 with a known inverse; the guarded path must not degrade to
        // an identity placeholder at this size.
        let m = DMatrix::from_row_slice(3, 3, &[2.0, 0.0, 0.0, 0.0, 4.0, 0.0, 0.0, 0.0, 8.0]);
        let inv = guarded_inverse(&m);
        assert!((inv[(0, 0)] - 0.5).abs() < 1e-12);
        assert!((inv[(1, 1)] - 0.25).abs() < 1e-12);
        assert!((inv[(2, 2)] - 0.125).abs() < 1e-12);
    }

    #[test]
    fn determinant_is_floored() {
        let m = DMatrix::<f64>::zeros(3, 3);
        assert_eq!(guarded_determinant(&m), DET_FLOOR);
    }

    #[test]
    fn likelihood_is_floored_for_huge_innovation() {
        let innovation = DVector::from_element(7, 1e6);
        let cov = DMatrix::<f64>::identity(7, 7);
        let like = gaussian_likelihood(&innovation, &cov);
        assert_eq!(like, LIKELIHOOD_FLOOR);
    }

    #[test]
    fn likelihood_ranks_tighter_covariance_higher_at_zero_innovation() {
        let innovation = DVector::zeros(7);
        let tight = DMatrix::<f64>::identity(7, 7) * 0.25;
        let wide = DMatrix::<f64>::identity(7, 7) * 4.0;
        assert!(gaussian_likelihood(&innovation, &tight) > gaussian_likelihood(&innovation, &wide));
    }
}
