//! The least-squares problem seen by every solver.
//!
//! A [`Problem`] maps a vector of optimizer coordinates to a vector of
//! residuals. Solvers only talk to this trait, so the same code drives the
//! composite spectral objective, the bounded wrapper around it and the small
//! analytic problems used in tests.

use ndarray::{Array1, Array2};

use crate::error::Result;

/// A nonlinear least-squares problem.
pub trait Problem {
    /// Evaluate the residuals at the given parameters.
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>>;

    /// Get the number of parameters in the problem.
    fn parameter_count(&self) -> usize;

    /// Get the number of residuals in the problem.
    fn residual_count(&self) -> usize;

    /// Evaluate the Jacobian matrix at the given parameters.
    ///
    /// The default implementation uses forward differences.
    fn jacobian(&self, params: &Array1<f64>) -> Result<Array2<f64>>
    where
        Self: Sized,
    {
        crate::utils::jacobian(self, params, None)
    }

    /// Sum of squared residuals.
    fn eval_cost(&self, params: &Array1<f64>) -> Result<f64> {
        let residuals = self.eval(params)?;
        Ok(residuals.iter().map(|r| r.powi(2)).sum())
    }
}

impl<P: Problem + ?Sized> Problem for &P {
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
        (**self).eval(params)
    }

    fn parameter_count(&self) -> usize {
        (**self).parameter_count()
    }

    fn residual_count(&self) -> usize {
        (**self).residual_count()
    }
}
