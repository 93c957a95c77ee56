//! Basin Hopping algorithm for global optimization.
//!
//! Alternates random hops with local Levenberg-Marquardt minimization and
//! accepts the new basin by the Metropolis criterion.

use ndarray::Array1;
use rand::distributions::{Distribution, Uniform};
use rand::Rng;

use crate::error::{Result, SpectraFitError};
use crate::global_opt::{make_rng, GlobalOptResult, GlobalOptimizer};
use crate::lm::{LevenbergMarquardt, LmConfig};
use crate::minimizer::TerminationReason;
use crate::observer::{FitObserver, IterationReport, NoopObserver, ObserverAction};
use crate::parameters::Bounds;
use crate::problem::Problem;

/// Basin Hopping algorithm for global optimization.
#[derive(Debug, Clone)]
pub struct BasinHopping {
    /// Temperature for Metropolis acceptance
    pub temperature: f64,

    /// Half-width of the uniform hop in each coordinate
    pub step_size: f64,

    /// Number of hops
    pub niter: usize,

    /// Stop after this many hops without a new best basin
    pub niter_success: Option<usize>,

    /// Local optimizer configuration
    pub local_config: LmConfig,

    pub seed: Option<u64>,
}

impl Default for BasinHopping {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            step_size: 0.5,
            niter: 100,
            niter_success: None,
            local_config: LmConfig::default(),
            seed: None,
        }
    }
}

impl BasinHopping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_step_size(mut self, step_size: f64) -> Self {
        self.step_size = step_size;
        self
    }

    pub fn with_niter(mut self, niter: usize) -> Self {
        self.niter = niter;
        self
    }

    pub fn with_niter_success(mut self, niter_success: Option<usize>) -> Self {
        self.niter_success = niter_success;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Perturb a solution by a uniform random step in every coordinate.
    fn perturb_solution(&self, solution: &Array1<f64>, rng: &mut impl Rng) -> Array1<f64> {
        let step = Uniform::new_inclusive(-self.step_size, self.step_size);
        solution.mapv(|x| x + step.sample(rng))
    }

    /// Local minimization with whatever budget is left.
    fn local_minimize<P: Problem + ?Sized>(
        &self,
        problem: &P,
        start: Array1<f64>,
        remaining: usize,
    ) -> Result<(Array1<f64>, f64, usize)> {
        let mut config = self.local_config.clone();
        config.max_nfev = Some(config.max_nfev.map_or(remaining, |m| m.min(remaining)));
        match LevenbergMarquardt::with_config(config).minimize_with_observer(problem, start.clone(), &mut NoopObserver) {
            Ok(result) => Ok((result.params, result.cost, result.func_evals)),
            // A hop into a region where the model is not finite is a rejected hop.
            Err(SpectraFitError::LinearAlgebra(_)) => Ok((start, f64::INFINITY, 1)),
            Err(e) => Err(e),
        }
    }
}

impl GlobalOptimizer for BasinHopping {
    fn optimize<P, O>(
        &self,
        problem: &P,
        initial: &Array1<f64>,
        _bounds: &[Bounds],
        max_nfev: usize,
        observer: &mut O,
    ) -> Result<GlobalOptResult>
    where
        P: Problem + ?Sized,
        O: FitObserver + ?Sized,
    {
        if initial.len() != problem.parameter_count() {
            return Err(SpectraFitError::DimensionMismatch(format!(
                "Expected {} parameters, got {}",
                problem.parameter_count(),
                initial.len()
            )));
        }

        let mut rng = make_rng(self.seed);
        let (mut current_params, mut current_cost, mut func_evals) =
            self.local_minimize(problem, initial.clone(), max_nfev)?;
        if !current_cost.is_finite() {
            return Err(SpectraFitError::LinearAlgebra(
                "initial sum of squares is not finite".to_string(),
            ));
        }

        let mut best_params = current_params.clone();
        let mut best_cost = current_cost;
        let mut iterations = 0;
        let mut no_improvement = 0;

        let termination = loop {
            if iterations >= self.niter || initial.is_empty() {
                break TerminationReason::Converged;
            }
            if self.niter_success.map_or(false, |n| no_improvement >= n) {
                break TerminationReason::Converged;
            }
            // A local search needs at least a Jacobian and one step.
            if func_evals + initial.len() + 2 > max_nfev {
                break TerminationReason::MaxEvalsReached;
            }

            let candidate = self.perturb_solution(&current_params, &mut rng);
            let (candidate_params, candidate_cost, evals) =
                self.local_minimize(problem, candidate, max_nfev - func_evals)?;
            func_evals += evals;

            let accept = if candidate_cost <= current_cost {
                true
            } else if candidate_cost.is_finite() && self.temperature > 0.0 {
                let probability = (-(candidate_cost - current_cost) / self.temperature).exp();
                rng.gen::<f64>() < probability
            } else {
                false
            };

            if accept {
                current_params = candidate_params;
                current_cost = candidate_cost;
            }
            if accept && current_cost < best_cost {
                best_params = current_params.clone();
                best_cost = current_cost;
                no_improvement = 0;
            } else {
                no_improvement += 1;
            }
            iterations += 1;

            let report = IterationReport {
                iteration: iterations,
                nfev: func_evals,
                cost: best_cost,
                params: &best_params,
            };
            if observer.on_iteration(&report) == ObserverAction::Abort {
                break TerminationReason::UserAbort;
            }
        };

        tracing::debug!(hops = iterations, nfev = func_evals, cost = best_cost, "basin hopping finished");
        Ok(GlobalOptResult {
            params: best_params,
            cost: best_cost,
            iterations,
            func_evals,
            termination,
            message: format!("Basin hopping stopped: {}", termination),
            chain: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::global_opt::test_problems::MultiMinima;
    use ndarray::array;

    #[test]
    fn test_basin_hopping_escapes_local_minimum() {
        // (1.3, π) is a local basin with residual about 1.19
        let optimizer = BasinHopping::new()
            .with_step_size(2.0)
            .with_niter(50)
            .with_seed(Some(11));
        let result = optimizer
            .optimize(&MultiMinima, &array![1.3, 3.1], &[], 100_000, &mut NoopObserver)
            .unwrap();
        assert!(result.cost < 0.06, "cost {}", result.cost);
    }

    #[test]
    fn test_abort_after_first_hop() {
        let mut observer = |_: &IterationReport<'_>| ObserverAction::Abort;
        let result = BasinHopping::new()
            .with_seed(Some(1))
            .optimize(&MultiMinima, &array![0.0, 0.0], &[], 100_000, &mut observer)
            .unwrap();
        assert_eq!(result.termination, TerminationReason::UserAbort);
        assert_eq!(result.iterations, 1);
    }
}
