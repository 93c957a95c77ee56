//! Implementation of the Levenberg-Marquardt algorithm.

use ndarray::{Array1, Array2, Axis};
use std::fmt;

use crate::error::{Result, SpectraFitError};
use crate::observer::{FitObserver, IterationReport, NoopObserver, ObserverAction};
use crate::problem::Problem;
use crate::utils::finite_difference::jacobian_from;

use super::config::LmConfig;
use super::convergence::{ConvergenceCriteria, ConvergenceStatus};
use super::step::LmStep;
use super::trust_region::TrustRegion;

/// Result of the Levenberg-Marquardt optimization.
#[derive(Debug, Clone)]
pub struct LmResult {
    /// Optimized parameter values
    pub params: Array1<f64>,

    /// Residuals at the solution
    pub residuals: Array1<f64>,

    /// Sum of squared residuals
    pub cost: f64,

    /// Number of accepted steps
    pub iterations: usize,

    /// Number of function evaluations
    pub func_evals: usize,

    pub status: ConvergenceStatus,
}

impl LmResult {
    pub fn success(&self) -> bool {
        self.status.is_converged()
    }
}

impl fmt::Display for LmResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Optimization Result:")?;
        writeln!(f, "  Status: {}", self.status.description())?;
        writeln!(f, "  Cost: {:.6e}", self.cost)?;
        writeln!(f, "  Iterations: {}", self.iterations)?;
        writeln!(f, "  Function evaluations: {}", self.func_evals)?;
        writeln!(f, "  Parameters: {:?}", self.params)?;
        Ok(())
    }
}

/// The Levenberg-Marquardt optimizer.
#[derive(Debug, Clone, Default)]
pub struct LevenbergMarquardt {
    config: LmConfig,
}

impl LevenbergMarquardt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: LmConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LmConfig {
        &self.config
    }

    /// Set the evaluation budget.
    pub fn with_max_nfev(mut self, max_nfev: usize) -> Self {
        self.config.max_nfev = Some(max_nfev);
        self
    }

    /// Set the tolerance for the relative reduction of the sum of squares.
    pub fn with_ftol(mut self, ftol: f64) -> Self {
        self.config.ftol = ftol;
        self
    }

    /// Set the tolerance for the relative parameter change.
    pub fn with_xtol(mut self, xtol: f64) -> Self {
        self.config.xtol = xtol;
        self
    }

    /// Set the orthogonality tolerance.
    pub fn with_gtol(mut self, gtol: f64) -> Self {
        self.config.gtol = gtol;
        self
    }

    /// Set the initial value for the damping parameter.
    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.config.initial_lambda = lambda;
        self
    }

    /// Set the relative forward-difference step.
    pub fn with_epsfcn(mut self, epsfcn: f64) -> Self {
        self.config.epsfcn = Some(epsfcn);
        self
    }

    /// Minimize the sum of squared residuals for the given problem.
    pub fn minimize<P: Problem + ?Sized>(&self, problem: &P, initial_params: Array1<f64>) -> Result<LmResult> {
        self.minimize_with_observer(problem, initial_params, &mut NoopObserver)
    }

    /// Minimize, reporting every accepted step to `observer`.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` for a wrong starting vector, `LinearAlgebra` when
    /// the starting cost is not finite, and any error from the problem itself.
    /// Running out of budget is not an error.
    pub fn minimize_with_observer<P, O>(
        &self,
        problem: &P,
        initial_params: Array1<f64>,
        observer: &mut O,
    ) -> Result<LmResult>
    where
        P: Problem + ?Sized,
        O: FitObserver + ?Sized,
    {
        let n_params = problem.parameter_count();
        if initial_params.len() != n_params {
            return Err(SpectraFitError::DimensionMismatch(format!(
                "Expected {} parameters, got {}",
                n_params,
                initial_params.len()
            )));
        }

        let budget = self.config.budget(n_params);
        let criteria = ConvergenceCriteria::new(self.config.xtol, self.config.ftol);
        let mut region = TrustRegion::from_config(&self.config);

        let mut params = initial_params;
        let mut residuals = problem.eval(&params)?;
        let mut cost = sum_of_squares(&residuals);
        let mut func_evals = 1;
        let mut iterations = 0;

        if !cost.is_finite() {
            return Err(SpectraFitError::LinearAlgebra(
                "initial sum of squares is not finite".to_string(),
            ));
        }

        let finish = |params, residuals, cost, iterations, func_evals, status: ConvergenceStatus| {
            tracing::debug!(
                iterations,
                nfev = func_evals,
                cost,
                status = status.description(),
                "levenberg-marquardt finished"
            );
            Ok(LmResult {
                params,
                residuals,
                cost,
                iterations,
                func_evals,
                status,
            })
        };

        if n_params == 0 || cost == 0.0 {
            return finish(
                params,
                residuals,
                cost,
                iterations,
                func_evals,
                ConvergenceStatus::FunctionValueConvergence,
            );
        }

        loop {
            if func_evals + n_params > budget {
                return finish(
                    params,
                    residuals,
                    cost,
                    iterations,
                    func_evals,
                    ConvergenceStatus::MaxEvaluationsReached,
                );
            }
            let jacobian = jacobian_from(problem, &params, &residuals, self.config.epsfcn)?;
            func_evals += n_params;

            let j_t_j = jacobian.t().dot(&jacobian);
            let j_t_r = jacobian.t().dot(&residuals);

            if orthogonality(&jacobian, &j_t_r, cost) <= self.config.gtol {
                return finish(
                    params,
                    residuals,
                    cost,
                    iterations,
                    func_evals,
                    ConvergenceStatus::GradientConvergence,
                );
            }

            // Retry with growing damping until a step is accepted.
            let status = loop {
                let step = match LmStep::calculate_step(&j_t_j, &j_t_r, region.lambda) {
                    Some(step) => step,
                    None => {
                        if region.is_saturated() {
                            break ConvergenceStatus::Stalled;
                        }
                        region.increase();
                        continue;
                    }
                };

                if func_evals >= budget {
                    break ConvergenceStatus::MaxEvaluationsReached;
                }
                let new_params = &params + &step.step;
                let new_residuals = problem.eval(&new_params)?;
                func_evals += 1;
                let new_cost = sum_of_squares(&new_residuals);

                let gain = TrustRegion::gain_ratio(cost, new_cost, step.predicted_reduction);
                if region.update_lambda(gain) {
                    let status = criteria.check(&params, &new_params, cost, new_cost);
                    params = new_params;
                    residuals = new_residuals;
                    cost = new_cost;
                    iterations += 1;

                    let report = IterationReport {
                        iteration: iterations,
                        nfev: func_evals,
                        cost,
                        params: &params,
                    };
                    if observer.on_iteration(&report) == ObserverAction::Abort {
                        break ConvergenceStatus::UserAbort;
                    }
                    break status;
                }

                if criteria.relative_step(&params, &step.step) < self.config.xtol {
                    break ConvergenceStatus::ParameterConvergence;
                }
                if region.is_saturated() {
                    break ConvergenceStatus::Stalled;
                }
            };

            if status.is_terminated() {
                return finish(params, residuals, cost, iterations, func_evals, status);
            }
        }
    }
}

fn sum_of_squares(residuals: &Array1<f64>) -> f64 {
    residuals.iter().map(|r| r * r).sum()
}

/// Largest cosine between the residual vector and a Jacobian column.
fn orthogonality(jacobian: &Array2<f64>, j_t_r: &Array1<f64>, cost: f64) -> f64 {
    let r_norm = cost.sqrt();
    jacobian
        .axis_iter(Axis(1))
        .zip(j_t_r.iter())
        .map(|(column, g)| {
            let c_norm = column.dot(&column).sqrt();
            if c_norm == 0.0 {
                0.0
            } else {
                (g / (c_norm * r_norm)).abs()
            }
        })
        .fold(0.0, f64::max)
}
