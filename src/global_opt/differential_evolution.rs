//! Differential Evolution algorithm for global optimization.
//!
//! Population-based search over a finite box. Every parameter needs finite
//! bounds; the minimizer polishes the best member with Levenberg-Marquardt.

use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{Result, SpectraFitError};
use crate::global_opt::{
    argmin, calculate_cost, clip_to_bounds, make_rng, random_point, GlobalOptResult, GlobalOptimizer,
};
use crate::minimizer::TerminationReason;
use crate::observer::{FitObserver, IterationReport, ObserverAction};
use crate::parameters::Bounds;
use crate::problem::Problem;

/// Differential Evolution algorithm for global optimization.
#[derive(Debug, Clone)]
pub struct DifferentialEvolution {
    /// Population size multiplier (population size = multiplier * parameter count)
    pub pop_size_multiplier: usize,

    /// Differential weight (F) in range [0, 2]
    pub differential_weight: f64,

    /// Crossover probability (CR) in range [0, 1]
    pub crossover_prob: f64,

    /// Strategy for creating candidate solutions
    pub strategy: DEStrategy,

    /// Relative spread of the population costs at which to stop.
    pub tol: f64,

    /// Maximum number of generations.
    pub max_generations: usize,

    pub seed: Option<u64>,
}

/// Strategies for creating candidate solutions in Differential Evolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DEStrategy {
    /// DE/rand/1: x_r1 + F * (x_r2 - x_r3)
    Rand1,

    /// DE/rand/2: x_r1 + F * (x_r2 - x_r3) + F * (x_r4 - x_r5)
    Rand2,

    /// DE/best/1: x_best + F * (x_r1 - x_r2)
    Best1,

    /// DE/best/2: x_best + F * (x_r1 - x_r2) + F * (x_r3 - x_r4)
    Best2,

    /// DE/current-to-best/1: x_i + F * (x_best - x_i) + F * (x_r1 - x_r2)
    CurrentToBest1,
}

impl DEStrategy {
    /// Number of distinct random members the strategy draws.
    fn members(&self) -> usize {
        match self {
            DEStrategy::Rand1 => 3,
            DEStrategy::Rand2 => 5,
            DEStrategy::Best1 | DEStrategy::CurrentToBest1 => 2,
            DEStrategy::Best2 => 4,
        }
    }
}

impl Default for DifferentialEvolution {
    fn default() -> Self {
        Self {
            pop_size_multiplier: 15,
            differential_weight: 0.8,
            crossover_prob: 0.7,
            strategy: DEStrategy::Best1,
            tol: 0.01,
            max_generations: 1000,
            seed: None,
        }
    }
}

impl DifferentialEvolution {
    /// Create a new DifferentialEvolution optimizer with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategy(mut self, strategy: DEStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the population size multiplier.
    pub fn with_population_multiplier(mut self, multiplier: usize) -> Self {
        self.pop_size_multiplier = multiplier;
        self
    }

    /// Set the differential weight (F).
    pub fn with_differential_weight(mut self, weight: f64) -> Self {
        self.differential_weight = weight;
        self
    }

    /// Set the crossover probability (CR).
    pub fn with_crossover_probability(mut self, prob: f64) -> Self {
        self.crossover_prob = prob;
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    pub fn with_max_generations(mut self, generations: usize) -> Self {
        self.max_generations = generations;
        self
    }

    /// Set the random seed for reproducibility.
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Create a trial vector using the configured strategy and binomial
    /// crossover.
    fn create_trial_vector(
        &self,
        target_idx: usize,
        best_idx: usize,
        population: &[Array1<f64>],
        bounds: &[Bounds],
        rng: &mut impl Rng,
    ) -> Array1<f64> {
        let n_params = population[0].len();
        let f = self.differential_weight;

        let mut candidates: Vec<usize> = (0..population.len())
            .filter(|&i| i != target_idx && i != best_idx)
            .collect();
        candidates.shuffle(rng);
        let r = &candidates[..self.strategy.members()];
        let diff = |a: usize, b: usize| &population[a] - &population[b];

        let mut trial = match self.strategy {
            DEStrategy::Rand1 => &population[r[0]] + &(diff(r[1], r[2]) * f),
            DEStrategy::Rand2 => &population[r[0]] + &((diff(r[1], r[2]) + diff(r[3], r[4])) * f),
            DEStrategy::Best1 => &population[best_idx] + &(diff(r[0], r[1]) * f),
            DEStrategy::Best2 => &population[best_idx] + &((diff(r[0], r[1]) + diff(r[2], r[3])) * f),
            DEStrategy::CurrentToBest1 => {
                &population[target_idx] + &((diff(best_idx, target_idx) + diff(r[0], r[1])) * f)
            }
        };

        let target = &population[target_idx];
        let j_rand = rng.gen_range(0..n_params);
        for j in 0..n_params {
            if rng.gen::<f64>() > self.crossover_prob && j != j_rand {
                trial[j] = target[j];
            }
        }

        clip_to_bounds(&trial, bounds)
    }
}

impl GlobalOptimizer for DifferentialEvolution {
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
        let n_params = problem.parameter_count();
        if n_params != bounds.len() || n_params != initial.len() {
            return Err(SpectraFitError::DimensionMismatch(format!(
                "Expected {} bounds and starting values, got {} and {}",
                n_params,
                bounds.len(),
                initial.len()
            )));
        }
        if let Some(b) = bounds.iter().find(|b| !b.is_finite()) {
            return Err(SpectraFitError::InvalidInput(format!(
                "differential evolution needs finite bounds, got [{}, {}]",
                b.min, b.max
            )));
        }

        if n_params == 0 {
            let cost = calculate_cost(problem, initial)?;
            return Ok(GlobalOptResult {
                params: initial.clone(),
                cost,
                iterations: 0,
                func_evals: 1,
                termination: TerminationReason::Converged,
                message: "Differential evolution stopped: nothing to vary".to_string(),
                chain: None,
            });
        }

        let mut rng = make_rng(self.seed);
        let pop_size = (self.pop_size_multiplier * n_params).max(self.strategy.members() + 2);

        // Seed the population with the starting point.
        let mut population: Vec<Array1<f64>> = Vec::with_capacity(pop_size);
        population.push(clip_to_bounds(initial, bounds));
        while population.len() < pop_size {
            population.push(random_point(bounds, &mut rng));
        }

        let mut func_evals = 0;
        let mut costs = Vec::with_capacity(pop_size);
        for member in &population {
            if func_evals >= max_nfev {
                break;
            }
            costs.push(calculate_cost(problem, member)?);
            func_evals += 1;
        }
        population.truncate(costs.len());

        let mut iterations = 0;
        let termination = loop {
            if population.len() < pop_size || func_evals >= max_nfev {
                break TerminationReason::MaxEvalsReached;
            }

            let finite: Vec<f64> = costs.iter().copied().filter(|c| c.is_finite()).collect();
            if finite.len() == costs.len() {
                let mean = finite.iter().sum::<f64>() / finite.len() as f64;
                let std = (finite.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / finite.len() as f64).sqrt();
                if std <= self.tol * mean.abs() {
                    break TerminationReason::Converged;
                }
            }
            if iterations >= self.max_generations {
                break TerminationReason::Converged;
            }

            let mut exhausted = false;
            for i in 0..pop_size {
                if func_evals >= max_nfev {
                    exhausted = true;
                    break;
                }
                let best_idx = argmin(&costs);
                let trial = self.create_trial_vector(i, best_idx, &population, bounds, &mut rng);
                let trial_cost = calculate_cost(problem, &trial)?;
                func_evals += 1;

                if trial_cost <= costs[i] {
                    population[i] = trial;
                    costs[i] = trial_cost;
                }
            }
            iterations += 1;

            let best_idx = argmin(&costs);
            let report = IterationReport {
                iteration: iterations,
                nfev: func_evals,
                cost: costs[best_idx],
                params: &population[best_idx],
            };
            if observer.on_iteration(&report) == ObserverAction::Abort {
                break TerminationReason::UserAbort;
            }
            if exhausted {
                break TerminationReason::MaxEvalsReached;
            }
        };

        let best_idx = argmin(&costs);
        let (params, cost) = match population.get(best_idx) {
            Some(best) if !costs.is_empty() => (best.clone(), costs[best_idx]),
            _ => (clip_to_bounds(initial, bounds), f64::INFINITY),
        };
        tracing::debug!(generations = iterations, nfev = func_evals, cost, "differential evolution finished");

        Ok(GlobalOptResult {
            params,
            cost,
            iterations,
            func_evals,
            termination,
            message: format!("Differential evolution stopped: {}", termination),
            chain: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::global_opt::test_problems::MultiMinima;
    use crate::observer::NoopObserver;
    use ndarray::array;

    fn box_bounds() -> Vec<Bounds> {
        vec![Bounds::new(-10.0, 10.0).unwrap(), Bounds::new(-10.0, 10.0).unwrap()]
    }

    #[test]
    fn test_differential_evolution() {
        let optimizer = DifferentialEvolution::new().with_seed(Some(42)).with_tol(1e-6);
        let result = optimizer
            .optimize(&MultiMinima, &array![5.0, 5.0], &box_bounds(), 20_000, &mut NoopObserver)
            .unwrap();

        // The single residual is about 0.206 at the global minimum, so the cost is about 0.042
        assert!(result.cost < 0.06, "cost {}", result.cost);
        assert!(result.params[0] < 0.0);
    }

    #[test]
    fn test_seed_reproducible() {
        let optimizer = DifferentialEvolution::new().with_seed(Some(3));
        let a = optimizer
            .optimize(&MultiMinima, &array![1.0, 1.0], &box_bounds(), 500, &mut NoopObserver)
            .unwrap();
        let b = optimizer
            .optimize(&MultiMinima, &array![1.0, 1.0], &box_bounds(), 500, &mut NoopObserver)
            .unwrap();
        assert_eq!(a.params, b.params);
        assert!(a.func_evals <= 500);
    }

    #[test]
    fn test_requires_finite_bounds() {
        let bounds = vec![Bounds::new(-1.0, 1.0).unwrap(), Bounds::unbounded()];
        let result = DifferentialEvolution::new().optimize(
            &MultiMinima,
            &array![0.0, 0.0],
            &bounds,
            100,
            &mut NoopObserver,
        );
        assert!(matches!(result, Err(SpectraFitError::InvalidInput(_))));
    }
}
