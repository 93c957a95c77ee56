//! Affine-invariant ensemble sampler (Goodman & Weare stretch move).
//!
//! Samples the posterior `ln p = -Σr²/2` under a flat prior inside the
//! parameter bounds. The best sample is the maximum-likelihood point; the
//! flattened chain is returned for medians and covariances.

use ndarray::{Array1, Array2};
use rand::Rng;
use rand_distr::StandardNormal;

use crate::error::{Result, SpectraFitError};
use crate::global_opt::{calculate_cost, make_rng, GlobalOptResult, GlobalOptimizer};
use crate::minimizer::TerminationReason;
use crate::observer::{FitObserver, IterationReport, ObserverAction};
use crate::parameters::Bounds;
use crate::problem::Problem;

/// Ensemble MCMC sampler.
#[derive(Debug, Clone)]
pub struct EnsembleSampler {
    /// Number of walkers; `None` uses `max(2 (n + 1), 8)`.
    pub nwalkers: Option<usize>,
    /// Stretch moves per walker.
    pub steps: usize,
    /// Leading steps discarded from the chain.
    pub burn: usize,
    /// Keep every `thin`-th step.
    pub thin: usize,
    /// Stretch scale `a`.
    pub scale: f64,
    pub seed: Option<u64>,
}

impl Default for EnsembleSampler {
    fn default() -> Self {
        Self {
            nwalkers: None,
            steps: 500,
            burn: 100,
            thin: 1,
            scale: 2.0,
            seed: None,
        }
    }
}

impl EnsembleSampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nwalkers(mut self, nwalkers: usize) -> Self {
        self.nwalkers = Some(nwalkers);
        self
    }

    pub fn with_steps(mut self, steps: usize) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_burn(mut self, burn: usize) -> Self {
        self.burn = burn;
        self
    }

    pub fn with_thin(mut self, thin: usize) -> Self {
        self.thin = thin.max(1);
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    fn walkers_for(&self, n: usize) -> usize {
        self.nwalkers.unwrap_or_else(|| (2 * (n + 1)).max(8))
    }
}

/// Log-probability: flat prior in the box, Gaussian likelihood.
fn log_prob<P: Problem + ?Sized>(problem: &P, point: &Array1<f64>, bounds: &[Bounds]) -> Result<(f64, f64)> {
    if point.iter().zip(bounds.iter()).any(|(x, b)| !b.contains(*x)) {
        return Ok((f64::NEG_INFINITY, f64::INFINITY));
    }
    let cost = calculate_cost(problem, point)?;
    Ok((-0.5 * cost, cost))
}

impl GlobalOptimizer for EnsembleSampler {
    fn optimize<P, O>(
        &self,
        problem: &P,
        initial: &Array1<f64>,
        bounds: &[Bounds],
        max_nfev: usize,
        observer: &mut O,
    ) -> Result<GlobalOptResult>
    where
        P: Problem + ?Sized,
        O: FitObserver + ?Sized,
    {
        let n = problem.parameter_count();
        if initial.len() != n || bounds.len() != n {
            return Err(SpectraFitError::DimensionMismatch(format!(
                "Expected {} starting values and bounds, got {} and {}",
                n,
                initial.len(),
                bounds.len()
            )));
        }
        let nwalkers = self.walkers_for(n);
        if nwalkers < 2 * n || nwalkers < 2 {
            return Err(SpectraFitError::InvalidInput(format!(
                "the ensemble needs at least {} walkers, got {}",
                (2 * n).max(2),
                nwalkers
            )));
        }

        let mut rng = make_rng(self.seed);

        // Small ball around the starting point, kept inside the bounds.
        let mut walkers: Vec<Array1<f64>> = (0..nwalkers)
            .map(|w| {
                if w == 0 {
                    return initial.clone();
                }
                initial
                    .iter()
                    .zip(bounds.iter())
                    .map(|(x, b)| {
                        let noise: f64 = rng.sample(StandardNormal);
                        b.clamp(x + 1e-4 * x.abs().max(1.0) * noise)
                    })
                    .collect()
            })
            .collect();

        let mut lnp = Vec::with_capacity(nwalkers);
        let mut best_params = initial.clone();
        let mut best_cost = f64::INFINITY;
        let mut func_evals = 0;
        for walker in &walkers {
            if func_evals >= max_nfev {
                break;
            }
            let (lp, cost) = log_prob(problem, walker, bounds)?;
            func_evals += 1;
            if cost < best_cost {
                best_cost = cost;
                best_params = walker.clone();
            }
            lnp.push(lp);
        }
        walkers.truncate(lnp.len());
        if walkers.len() == nwalkers && !best_cost.is_finite() {
            return Err(SpectraFitError::LinearAlgebra(
                "no walker starts at a finite sum of squares".to_string(),
            ));
        }

        let mut chain: Vec<Array1<f64>> = Vec::new();
        let mut accepted = 0usize;
        let mut proposed = 0usize;
        let mut iterations = 0;
        let dim = n as f64;

        let termination = loop {
            if iterations >= self.steps {
                break TerminationReason::Converged;
            }
            if walkers.len() < nwalkers || func_evals + nwalkers > max_nfev {
                break TerminationReason::MaxEvalsReached;
            }

            for k in 0..nwalkers {
                let mut j = rng.gen_range(0..nwalkers - 1);
                if j >= k {
                    j += 1;
                }
                let u: f64 = rng.gen();
                let z = ((self.scale - 1.0) * u + 1.0).powi(2) / self.scale;
                let proposal = &walkers[j] + &((&walkers[k] - &walkers[j]) * z);

                let (lp, cost) = log_prob(problem, &proposal, bounds)?;
                func_evals += 1;
                proposed += 1;

                let log_accept = (dim - 1.0) * z.ln() + lp - lnp[k];
                if lp.is_finite() && rng.gen::<f64>().ln() < log_accept {
                    if cost < best_cost {
                        best_cost = cost;
                        best_params = proposal.clone();
                    }
                    walkers[k] = proposal;
                    lnp[k] = lp;
                    accepted += 1;
                }
            }
            iterations += 1;

            if iterations > self.burn && (iterations - self.burn) % self.thin.max(1) == 0 {
                chain.extend(walkers.iter().cloned());
            }

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

        // Short runs that never get past the burn-in still report the ensemble.
        if chain.is_empty() {
            chain.extend(walkers.iter().cloned());
        }
        let mut flat = Array2::zeros((chain.len(), n));
        for (i, sample) in chain.iter().enumerate() {
            flat.row_mut(i).assign(sample);
        }

        let acceptance = if proposed > 0 {
            accepted as f64 / proposed as f64
        } else {
            0.0
        };
        tracing::debug!(
            steps = iterations,
            nfev = func_evals,
            samples = chain.len(),
            acceptance,
            "ensemble sampler finished"
        );

        Ok(GlobalOptResult {
            params: best_params,
            cost: best_cost,
            iterations,
            func_evals,
            termination,
            message: format!("Ensemble sampler stopped: {} (acceptance {:.3})", termination, acceptance),
            chain: (!chain.is_empty()).then_some(flat),
        })
    }
}
