//! Nelder-Mead downhill simplex.
//!
//! Derivative-free local search. Runs in whatever coordinates the problem
//! exposes; the minimizer hands it the unbounded internal coordinates so that
//! the simplex can move freely.

use ndarray::Array1;

use crate::error::{Result, SpectraFitError};
use crate::global_opt::{calculate_cost, GlobalOptResult, GlobalOptimizer};
use crate::minimizer::TerminationReason;
use crate::observer::{FitObserver, IterationReport, ObserverAction};
use crate::parameters::Bounds;
use crate::problem::Problem;

/// Nelder-Mead simplex optimizer.
#[derive(Debug, Clone)]
pub struct NelderMead {
    /// Reflection coefficient
    pub alpha: f64,
    /// Expansion coefficient
    pub gamma: f64,
    /// Contraction coefficient
    pub rho: f64,
    /// Shrink coefficient
    pub sigma: f64,
    /// Absolute spread of the simplex vertices at which to stop.
    pub xatol: f64,
    /// Spread of the vertex costs, relative to the best cost, at which to stop.
    pub fatol: f64,
}

impl Default for NelderMead {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            gamma: 2.0,
            rho: 0.5,
            sigma: 0.5,
            xatol: 1e-8,
            fatol: 1e-10,
        }
    }
}

impl NelderMead {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_xatol(mut self, xatol: f64) -> Self {
        self.xatol = xatol;
        self
    }

    pub fn with_fatol(mut self, fatol: f64) -> Self {
        self.fatol = fatol;
        self
    }

    /// Initial simplex: the start point plus one vertex per coordinate,
    /// displaced by 5 % (or 0.00025 for zero coordinates).
    fn initial_simplex(initial: &Array1<f64>) -> Vec<Array1<f64>> {
        let mut simplex = vec![initial.clone()];
        for i in 0..initial.len() {
            let mut vertex = initial.clone();
            vertex[i] = if vertex[i] != 0.0 { 1.05 * vertex[i] } else { 0.00025 };
            simplex.push(vertex);
        }
        simplex
    }

    fn converged(&self, simplex: &[Array1<f64>], costs: &[f64]) -> bool {
        let best = &simplex[0];
        let x_spread = simplex[1..]
            .iter()
            .flat_map(|v| v.iter().zip(best.iter()).map(|(a, b)| (a - b).abs()))
            .fold(0.0, f64::max);
        let f_spread = costs[1..]
            .iter()
            .map(|c| (c - costs[0]).abs())
            .fold(0.0, f64::max);
        x_spread <= self.xatol || f_spread <= self.fatol * costs[0].abs().max(f64::MIN_POSITIVE)
    }
}

impl GlobalOptimizer for NelderMead {
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
        let n = problem.parameter_count();
        if initial.len() != n {
            return Err(SpectraFitError::DimensionMismatch(format!(
                "Expected {} parameters, got {}",
                n,
                initial.len()
            )));
        }

        let mut simplex = Self::initial_simplex(initial);
        let mut costs = Vec::with_capacity(simplex.len());
        let mut func_evals = 0;
        for vertex in &simplex {
            if func_evals >= max_nfev {
                break;
            }
            costs.push(calculate_cost(problem, vertex)?);
            func_evals += 1;
        }
        if costs.len() < simplex.len() {
            simplex.truncate(costs.len());
            let best = crate::global_opt::argmin(&costs);
            let (params, cost) = match simplex.get(best) {
                Some(vertex) => (vertex.clone(), costs[best]),
                None => (initial.clone(), f64::INFINITY),
            };
            tracing::debug!(nfev = func_evals, cost, "nelder-mead stopped while building the simplex");
            return Ok(GlobalOptResult {
                params,
                cost,
                iterations: 0,
                func_evals,
                termination: TerminationReason::MaxEvalsReached,
                message: format!("Nelder-Mead stopped: {}", TerminationReason::MaxEvalsReached),
                chain: None,
            });
        }
        let mut iterations = 0;

        let termination = loop {
            // Sort vertices by cost, best first.
            let mut order: Vec<usize> = (0..simplex.len()).collect();
            order.sort_by(|&a, &b| costs[a].total_cmp(&costs[b]));
            simplex = order.iter().map(|&i| simplex[i].clone()).collect();
            costs = order.iter().map(|&i| costs[i]).collect();

            if n == 0 || self.converged(&simplex, &costs) {
                break TerminationReason::Converged;
            }
            if func_evals + 2 > max_nfev {
                break TerminationReason::MaxEvalsReached;
            }

            let worst = n;
            let centroid = simplex[..n]
                .iter()
                .fold(Array1::zeros(n), |acc: Array1<f64>, v| acc + v)
                / n as f64;

            let reflected = &centroid + &((&centroid - &simplex[worst]) * self.alpha);
            let f_reflected = calculate_cost(problem, &reflected)?;
            func_evals += 1;

            if f_reflected < costs[0] {
                let expanded = &centroid + &((&reflected - &centroid) * self.gamma);
                let f_expanded = calculate_cost(problem, &expanded)?;
                func_evals += 1;
                if f_expanded < f_reflected {
                    simplex[worst] = expanded;
                    costs[worst] = f_expanded;
                } else {
                    simplex[worst] = reflected;
                    costs[worst] = f_reflected;
                }
            } else if f_reflected < costs[n - 1] {
                simplex[worst] = reflected;
                costs[worst] = f_reflected;
            } else {
                // Contract toward the better of the reflected and worst points.
                let (towards, f_towards) = if f_reflected < costs[worst] {
                    (reflected, f_reflected)
                } else {
                    (simplex[worst].clone(), costs[worst])
                };
                let contracted = &centroid + &((&towards - &centroid) * self.rho);
                let f_contracted = calculate_cost(problem, &contracted)?;
                func_evals += 1;

                if f_contracted < f_towards {
                    simplex[worst] = contracted;
                    costs[worst] = f_contracted;
                } else {
                    if func_evals + n > max_nfev {
                        break TerminationReason::MaxEvalsReached;
                    }
                    let best = simplex[0].clone();
                    for i in 1..simplex.len() {
                        simplex[i] = &best + &((&simplex[i] - &best) * self.sigma);
                        costs[i] = calculate_cost(problem, &simplex[i])?;
                    }
                    func_evals += n;
                }
            }

            iterations += 1;
            let best = crate::global_opt::argmin(&costs);
            let report = IterationReport {
                iteration: iterations,
                nfev: func_evals,
                cost: costs[best],
                params: &simplex[best],
            };
            if observer.on_iteration(&report) == ObserverAction::Abort {
                break TerminationReason::UserAbort;
            }
        };

        let best = crate::global_opt::argmin(&costs);
        tracing::debug!(iterations, nfev = func_evals, cost = costs[best], "nelder-mead finished");
        Ok(GlobalOptResult {
            params: simplex[best].clone(),
            cost: costs[best],
            iterations,
            func_evals,
            termination,
            message: format!("Nelder-Mead stopped: {}", termination),
            chain: None,
        })
    }
}
