//! Alternative and global optimization methods.
//!
//! These solvers complement Levenberg-Marquardt for fits with many local
//! minima or for posterior sampling. They all work on the scalar cost
//! `Σr²` of a [`Problem`], respect the same evaluation budget and report
//! progress to a [`FitObserver`].

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;

use crate::error::Result;
use crate::minimizer::TerminationReason;
use crate::observer::FitObserver;
use crate::parameters::Bounds;
use crate::problem::Problem;

mod basin_hopping;
mod differential_evolution;
mod emcee;
mod nelder_mead;

pub use basin_hopping::BasinHopping;
pub use differential_evolution::{DEStrategy, DifferentialEvolution};
pub use emcee::EnsembleSampler;
pub use nelder_mead::NelderMead;

/// Trait for the alternative optimization methods.
pub trait GlobalOptimizer {
    /// Minimize the sum of squares of `problem`, starting from `initial`
    /// where the method uses a starting point.
    ///
    /// `bounds` is given per parameter in the coordinates of `problem`.
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
        O: FitObserver + ?Sized;
}

/// Result of a global optimization.
#[derive(Debug, Clone)]
pub struct GlobalOptResult {
    /// The best parameters found
    pub params: Array1<f64>,

    /// The best cost found
    pub cost: f64,

    pub iterations: usize,

    pub func_evals: usize,

    pub termination: TerminationReason,

    /// A message describing the result
    pub message: String,

    /// Flattened chain (`samples × parameters`) for sampling methods.
    pub chain: Option<Array2<f64>>,
}

impl fmt::Display for GlobalOptResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Global Optimization Result:")?;
        writeln!(f, "  Termination: {}", self.termination)?;
        writeln!(f, "  Cost: {:.6e}", self.cost)?;
        writeln!(f, "  Iterations: {}", self.iterations)?;
        writeln!(f, "  Function evaluations: {}", self.func_evals)?;
        writeln!(f, "  Message: {}", self.message)?;
        writeln!(f, "  Parameters: {:?}", self.params)?;
        Ok(())
    }
}

/// Seeded generator, or one seeded from the OS when `seed` is `None`.
pub(crate) fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Sum of squared residuals; non-finite costs become `+inf` so that they
/// never win a comparison.
fn calculate_cost<P: Problem + ?Sized>(problem: &P, point: &Array1<f64>) -> Result<f64> {
    let cost = problem.eval_cost(point)?;
    Ok(if cost.is_nan() { f64::INFINITY } else { cost })
}

/// Random point within finite bounds.
fn random_point(bounds: &[Bounds], rng: &mut impl Rng) -> Array1<f64> {
    bounds
        .iter()
        .map(|b| {
            if b.max > b.min {
                rng.gen_range(b.min..b.max)
            } else {
                b.min
            }
        })
        .collect()
}

/// Clip a point to the given bounds.
fn clip_to_bounds(point: &Array1<f64>, bounds: &[Bounds]) -> Array1<f64> {
    point
        .iter()
        .zip(bounds.iter())
        .map(|(x, b)| b.clamp(*x))
        .collect()
}

/// Index of the smallest cost.
fn argmin(costs: &[f64]) -> usize {
    costs
        .iter()
        .enumerate()
        .fold((0, f64::INFINITY), |(best, best_cost), (i, &c)| {
            if c < best_cost {
                (i, c)
            } else {
                (best, best_cost)
            }
        })
        .0
}
