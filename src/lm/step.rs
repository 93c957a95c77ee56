//! Step calculation for the Levenberg-Marquardt algorithm.
//!
//! Solves `(JᵀJ + λ D) δ = -Jᵀr`, with `D` the diagonal of `JᵀJ` (Marquardt
//! scaling), by Cholesky factorization.

use ndarray::{Array1, Array2};

use crate::utils::cholesky_solve;

/// Floor for the scaling diagonal so that a flat direction still gets damped.
const MIN_DIAGONAL: f64 = 1e-12;

/// Result of a Levenberg-Marquardt step calculation.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub step: Array1<f64>,

    /// Reduction of `Σr²` predicted by the linearized model.
    pub predicted_reduction: f64,

    /// The damping parameter used to calculate the step
    pub lambda: f64,
}

/// Handles step calculation for the Levenberg-Marquardt algorithm.
pub struct LmStep;

impl LmStep {
    /// Calculate the damped Gauss-Newton step.
    ///
    /// Returns `None` when the damped normal matrix is not positive definite;
    /// the caller raises the damping and retries.
    pub fn calculate_step(j_t_j: &Array2<f64>, j_t_r: &Array1<f64>, lambda: f64) -> Option<StepResult> {
        let mut augmented = j_t_j.clone();
        for i in 0..augmented.nrows() {
            augmented[[i, i]] += lambda * j_t_j[[i, i]].max(MIN_DIAGONAL);
        }

        let step = cholesky_solve(&augmented, &-j_t_r)?;
        let predicted_reduction = Self::predicted_reduction(j_t_j, j_t_r, &step);

        Some(StepResult {
            step,
            predicted_reduction,
            lambda,
        })
    }

    /// `‖r‖² − ‖r + Jδ‖² = −2 δᵀJᵀr − δᵀJᵀJδ`
    pub fn predicted_reduction(j_t_j: &Array2<f64>, j_t_r: &Array1<f64>, step: &Array1<f64>) -> f64 {
        -2.0 * step.dot(j_t_r) - step.dot(&j_t_j.dot(step))
    }
}
