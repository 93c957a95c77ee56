//! Finite difference methods for numerical differentiation.

use crate::error::{Result, SpectraFitError};
use crate::problem::Problem;
use ndarray::{Array1, Array2};

/// Default relative step, the square root of machine epsilon.
const DEFAULT_EPSILON: f64 = 1.490_116_119_384_765_6e-8;

fn step_size(value: f64, eps: f64) -> f64 {
    if value.abs() > eps {
        value.abs() * eps
    } else {
        eps
    }
}

/// Compute the Jacobian matrix using forward finite differences.
///
/// `J[i,j] = ∂residual[i]/∂param[j]`, with a step scaled to the magnitude of
/// each parameter.
pub fn jacobian<P: Problem + ?Sized>(
    problem: &P,
    params: &Array1<f64>,
    epsilon: Option<f64>,
) -> Result<Array2<f64>> {
    let residuals = problem.eval(params)?;
    jacobian_from(problem, params, &residuals, epsilon)
}

/// Forward-difference Jacobian reusing residuals already evaluated at
/// `params`; costs one evaluation per parameter.
pub fn jacobian_from<P: Problem + ?Sized>(
    problem: &P,
    params: &Array1<f64>,
    residuals: &Array1<f64>,
    epsilon: Option<f64>,
) -> Result<Array2<f64>> {
    let eps = epsilon.unwrap_or(DEFAULT_EPSILON);
    let n_params = params.len();
    let n_residuals = residuals.len();

    if n_residuals != problem.residual_count() {
        return Err(SpectraFitError::DimensionMismatch(format!(
            "Expected {} residuals, got {}",
            problem.residual_count(),
            n_residuals
        )));
    }

    let mut jac = Array2::zeros((n_residuals, n_params));
    for j in 0..n_params {
        let mut perturbed = params.clone();
        let h = step_size(params[j], eps);
        perturbed[j] += h;

        let shifted = problem.eval(&perturbed)?;
        for i in 0..n_residuals {
            jac[[i, j]] = (shifted[i] - residuals[i]) / h;
        }
    }

    Ok(jac)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    // r1 = x^2 - 1, r2 = y^2 - 2
    struct TestProblem;

    impl Problem for TestProblem {
        fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
            let x = params[0];
            let y = params[1];
            Ok(array![x.powi(2) - 1.0, y.powi(2) - 2.0])
        }

        fn parameter_count(&self) -> usize {
            2
        }

        fn residual_count(&self) -> usize {
            2
        }
    }

    #[test]
    fn test_jacobian() {
        let jac = jacobian(&TestProblem, &array![2.0, 3.0], None).unwrap();

        assert_eq!(jac.shape(), &[2, 2]);
        assert_relative_eq!(jac[[0, 0]], 4.0, epsilon = 1e-5);
        assert_relative_eq!(jac[[0, 1]], 0.0, epsilon = 1e-5);
        assert_relative_eq!(jac[[1, 0]], 0.0, epsilon = 1e-5);
        assert_relative_eq!(jac[[1, 1]], 6.0, epsilon = 1e-5);
    }

    #[test]
    fn test_residual_length_checked() {
        let wrong = array![1.0, 2.0, 3.0];
        assert!(jacobian_from(&TestProblem, &array![1.0, 1.0], &wrong, None).is_err());
    }
}
