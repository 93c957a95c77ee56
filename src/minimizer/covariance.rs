//! Covariance estimates for the varying parameters.

use ndarray::{Array1, Array2, Axis};

use crate::error::Result;
use crate::problem::Problem;
use crate::utils::{invert_spd, jacobian};

/// Covariance from the Jacobian at the best point:
///   covar = inv(JᵀJ) · χ²_red
///
/// Returns `Ok(None)` when `JᵀJ` is singular, when there are no degrees of
/// freedom left, or when the result is not finite.
pub fn covariance_at<P: Problem + ?Sized>(problem: &P, best: &Array1<f64>, chisqr: f64) -> Result<Option<Array2<f64>>> {
    let n = problem.residual_count();
    let k = problem.parameter_count();
    if k == 0 {
        return Ok(Some(Array2::zeros((0, 0))));
    }
    if n <= k {
        tracing::warn!(ndata = n, nvarys = k, "no degrees of freedom left, covariance unavailable");
        return Ok(None);
    }

    let jac = jacobian(problem, best, None)?;
    Ok(calculate_covariance(&jac, chisqr / (n - k) as f64))
}

/// Scaled inverse of `JᵀJ`, or `None` with a warning when it does not exist.
pub fn calculate_covariance(jacobian: &Array2<f64>, redchi: f64) -> Option<Array2<f64>> {
    let jtj = jacobian.t().dot(jacobian);
    let Some(inverse) = invert_spd(&jtj) else {
        tracing::warn!("JᵀJ is singular, covariance unavailable");
        return None;
    };
    let covar = inverse * redchi;
    if covar.iter().any(|v| !v.is_finite()) || covar.diag().iter().any(|&v| v < 0.0) {
        tracing::warn!("covariance estimate is not finite");
        return None;
    }
    Some(covar)
}

/// Sample covariance of a chain (`samples × parameters`).
pub fn sample_covariance(chain: &Array2<f64>) -> Option<Array2<f64>> {
    let m = chain.nrows();
    if m < 2 {
        return None;
    }
    let mean = chain.mean_axis(Axis(0))?;
    let centered = chain - &mean;
    Some(centered.t().dot(&centered) / (m - 1) as f64)
}

/// Per-column median of a chain.
pub fn column_medians(chain: &Array2<f64>) -> Array1<f64> {
    chain
        .axis_iter(Axis(1))
        .map(|column| {
            let mut sorted = column.to_vec();
            sorted.sort_by(f64::total_cmp);
            let m = sorted.len();
            match m {
                0 => f64::NAN,
                _ if m % 2 == 1 => sorted[m / 2],
                _ => 0.5 * (sorted[m / 2 - 1] + sorted[m / 2]),
            }
        })
        .collect()
}

/// Square roots of the diagonal; NaN when no covariance exists.
pub fn standard_errors(covar: Option<&Array2<f64>>, k: usize) -> Array1<f64> {
    match covar {
        Some(c) => c.diag().mapv(f64::sqrt),
        None => Array1::from_elem(k, f64::NAN),
    }
}
