//! Optimizer adapter.
//!
//! [`Minimizer`] drives one of the registered methods over a
//! [`CompositeObjective`] and packs the outcome into a [`MinimizerResult`]:
//! best values, evaluation count, termination reason and, when it can be
//! estimated, the covariance of the varying parameters.
//!
//! Running out of budget or being aborted by the observer is never an error;
//! it shows up as [`TerminationReason`] on the result.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, SpectraFitError};
use crate::global_opt::{
    BasinHopping, DifferentialEvolution, EnsembleSampler, GlobalOptResult, GlobalOptimizer, NelderMead,
};
use crate::lm::{LevenbergMarquardt, LmConfig};
use crate::objective::CompositeObjective;
use crate::observer::{FitObserver, NoopObserver};
use crate::problem::Problem;

pub mod bounded;
pub mod covariance;

pub use bounded::BoundedProblem;
use bounded::ExternalObserver;
pub use covariance::{calculate_covariance, column_medians, sample_covariance, standard_errors};

/// Why a solver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    Converged,
    MaxEvalsReached,
    UserAbort,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TerminationReason::Converged => "converged",
            TerminationReason::MaxEvalsReached => "max_evals_reached",
            TerminationReason::UserAbort => "user_abort",
        })
    }
}

/// Registered optimization methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Method {
    /// Levenberg-Marquardt.
    #[default]
    LeastSq,
    NelderMead,
    DifferentialEvolution,
    BasinHopping,
    /// Affine-invariant ensemble sampling.
    Emcee,
}

impl Method {
    /// Canonical name, as written to reports.
    pub fn name(&self) -> &'static str {
        match self {
            Method::LeastSq => "leastsq",
            Method::NelderMead => "nelder",
            Method::DifferentialEvolution => "differential_evolution",
            Method::BasinHopping => "basinhopping",
            Method::Emcee => "emcee",
        }
    }
}

impl FromStr for Method {
    type Err = SpectraFitError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "leastsq" | "least_squares" | "lm" => Ok(Method::LeastSq),
            "nelder" | "nelder_mead" => Ok(Method::NelderMead),
            "differential_evolution" | "de" => Ok(Method::DifferentialEvolution),
            "basinhopping" | "basin_hopping" => Ok(Method::BasinHopping),
            "emcee" | "ensemble" => Ok(Method::Emcee),
            _ => Err(SpectraFitError::UnknownMethod(s.to_string())),
        }
    }
}

impl TryFrom<String> for Method {
    type Error = SpectraFitError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Method> for String {
    fn from(method: Method) -> Self {
        method.name().to_string()
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of one optimizer run, in external coordinates.
#[derive(Debug, Clone)]
pub struct MinimizerResult {
    pub method: Method,
    /// Starting values of the varying parameters.
    pub init_values: Array1<f64>,
    /// Values with the smallest sum of squares seen.
    pub best_values: Array1<f64>,
    /// Final iterate; the posterior median for sampling methods.
    pub model_values: Array1<f64>,
    /// Concatenated residual at `best_values`.
    pub residual: Array1<f64>,
    pub chisqr: f64,
    pub nfev: usize,
    pub iterations: usize,
    pub termination: TerminationReason,
    pub message: String,
    /// Covariance of the varying parameters, `None` when not estimable.
    pub covariance: Option<Array2<f64>>,
    /// Standard errors of the varying parameters (NaN when unavailable).
    pub stderr: Array1<f64>,
    /// Flattened sampler chain.
    pub chain: Option<Array2<f64>>,
}

impl MinimizerResult {
    pub fn success(&self) -> bool {
        self.termination == TerminationReason::Converged
    }

    pub fn ndata(&self) -> usize {
        self.residual.len()
    }

    pub fn nvarys(&self) -> usize {
        self.best_values.len()
    }
}

impl fmt::Display for MinimizerResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Fit Result ({}):", self.method)?;
        writeln!(f, "  Termination: {}", self.termination)?;
        writeln!(f, "  Message: {}", self.message)?;
        writeln!(f, "  Chi-square: {:.6e}", self.chisqr)?;
        writeln!(f, "  Function evaluations: {}", self.nfev)?;
        writeln!(f, "  Best values: {:?}", self.best_values)?;
        writeln!(f, "  Standard errors: {:?}", self.stderr)?;
        Ok(())
    }
}

/// What a method produced before the common post-processing.
struct RawOutcome {
    best: Array1<f64>,
    model: Array1<f64>,
    nfev: usize,
    iterations: usize,
    termination: TerminationReason,
    message: String,
    chain: Option<Array2<f64>>,
}

/// Runs a registered method over a composite objective.
#[derive(Debug, Clone, Default)]
pub struct Minimizer {
    method: Method,
    max_nfev: Option<usize>,
    seed: Option<u64>,
    lm_config: LmConfig,
}

impl Minimizer {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    /// Evaluation budget; defaults to `2000 * (k + 1)`.
    pub fn with_max_nfev(mut self, max_nfev: Option<usize>) -> Self {
        self.max_nfev = max_nfev;
        self
    }

    /// Seed for the stochastic methods.
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_lm_config(mut self, config: LmConfig) -> Self {
        self.lm_config = config;
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn minimize(&self, objective: &CompositeObjective) -> Result<MinimizerResult> {
        self.minimize_with_observer(objective, &mut NoopObserver)
    }

    /// Run the configured method starting from the graph's initial values.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for differential evolution without finite bounds,
    /// `LinearAlgebra` when the starting point does not give a finite sum of
    /// squares, and any evaluation error of the objective.
    pub fn minimize_with_observer<O>(&self, objective: &CompositeObjective, observer: &mut O) -> Result<MinimizerResult>
    where
        O: FitObserver + ?Sized,
    {
        let graph = objective.graph();
        let k = graph.n_varying();
        let init = graph.initial_values();
        let bounds = graph.bounds();
        let budget = self.max_nfev.unwrap_or_else(|| LmConfig::default_max_nfev(k));

        tracing::info!(
            method = %self.method,
            nvarys = k,
            ndata = objective.residual_count(),
            max_nfev = budget,
            "starting fit"
        );

        let raw = if k == 0 {
            RawOutcome {
                best: init.clone(),
                model: init.clone(),
                nfev: 1,
                iterations: 0,
                termination: TerminationReason::Converged,
                message: "No varying parameters".to_string(),
                chain: None,
            }
        } else {
            match self.method {
                Method::LeastSq => self.run_least_squares(objective, &init, budget, observer)?,
                Method::NelderMead => {
                    self.run_internal(&NelderMead::new(), objective, &init, budget, observer)?
                }
                Method::BasinHopping => {
                    let hopper = BasinHopping::new().with_seed(self.seed);
                    self.run_internal(&hopper, objective, &init, budget, observer)?
                }
                Method::DifferentialEvolution => {
                    self.run_differential_evolution(objective, &init, budget, observer)?
                }
                Method::Emcee => {
                    let sampler = EnsembleSampler::new().with_seed(self.seed);
                    let result = sampler.optimize(objective, &init, &bounds, budget, observer)?;
                    let model = match &result.chain {
                        Some(chain) => column_medians(chain),
                        None => result.params.clone(),
                    };
                    RawOutcome {
                        best: result.params,
                        model,
                        nfev: result.func_evals,
                        iterations: result.iterations,
                        termination: result.termination,
                        message: result.message,
                        chain: result.chain,
                    }
                }
            }
        };

        let residual = objective.eval(&raw.best)?;
        let chisqr = residual.iter().map(|r| r * r).sum::<f64>();
        let covariance = match (&raw.chain, k) {
            (Some(chain), k) if k > 0 => sample_covariance(chain),
            _ => covariance::covariance_at(objective, &raw.best, chisqr)?,
        };
        let stderr = standard_errors(covariance.as_ref(), k);

        tracing::info!(
            termination = %raw.termination,
            nfev = raw.nfev,
            chisqr,
            "fit finished"
        );

        Ok(MinimizerResult {
            method: self.method,
            init_values: init,
            best_values: raw.best,
            model_values: raw.model,
            residual,
            chisqr,
            nfev: raw.nfev,
            iterations: raw.iterations,
            termination: raw.termination,
            message: raw.message,
            covariance,
            stderr,
            chain: raw.chain,
        })
    }

    fn run_least_squares<O>(
        &self,
        objective: &CompositeObjective,
        init: &Array1<f64>,
        budget: usize,
        observer: &mut O,
    ) -> Result<RawOutcome>
    where
        O: FitObserver + ?Sized,
    {
        let bounded = BoundedProblem::new(objective, &objective.graph().bounds())?;
        let start = bounded.to_internal(init)?;
        let mut config = self.lm_config.clone();
        config.max_nfev = Some(budget);

        let mut external = ExternalObserver::new(observer, bounded.transforms());
        let result = LevenbergMarquardt::with_config(config).minimize_with_observer(&bounded, start, &mut external)?;
        let best = bounded.to_external(&result.params);
        Ok(RawOutcome {
            model: best.clone(),
            best,
            nfev: result.func_evals,
            iterations: result.iterations,
            termination: result.status.termination(),
            message: result.status.description().to_string(),
            chain: None,
        })
    }

    /// Methods that work in internal coordinates and ignore bounds.
    fn run_internal<G, O>(
        &self,
        optimizer: &G,
        objective: &CompositeObjective,
        init: &Array1<f64>,
        budget: usize,
        observer: &mut O,
    ) -> Result<RawOutcome>
    where
        G: GlobalOptimizer,
        O: FitObserver + ?Sized,
    {
        let bounded = BoundedProblem::new(objective, &objective.graph().bounds())?;
        let start = bounded.to_internal(init)?;
        let mut external = ExternalObserver::new(observer, bounded.transforms());
        let result = optimizer.optimize(&bounded, &start, &[], budget, &mut external)?;
        let best = bounded.to_external(&result.params);
        Ok(RawOutcome {
            model: best.clone(),
            best,
            nfev: result.func_evals,
            iterations: result.iterations,
            termination: result.termination,
            message: result.message,
            chain: None,
        })
    }

    /// Population search over the bounds, then a Levenberg-Marquardt polish
    /// of the best member with the remaining budget.
    fn run_differential_evolution<O>(
        &self,
        objective: &CompositeObjective,
        init: &Array1<f64>,
        budget: usize,
        observer: &mut O,
    ) -> Result<RawOutcome>
    where
        O: FitObserver + ?Sized,
    {
        let bounds = objective.graph().bounds();
        let de = DifferentialEvolution::new().with_seed(self.seed);
        let GlobalOptResult {
            params,
            cost,
            iterations,
            func_evals,
            termination,
            message,
            ..
        } = de.optimize(objective, init, &bounds, budget, &mut *observer)?;

        let remaining = budget.saturating_sub(func_evals);
        if termination == TerminationReason::UserAbort || remaining <= params.len() + 1 {
            return Ok(RawOutcome {
                model: params.clone(),
                best: params,
                nfev: func_evals,
                iterations,
                termination,
                message,
                chain: None,
            });
        }

        let bounded = BoundedProblem::new(objective, &bounds)?;
        let start = bounded.to_internal(&params)?;
        let mut config = self.lm_config.clone();
        config.max_nfev = Some(remaining);
        let mut external = ExternalObserver::new(observer, bounded.transforms());
        let polish = LevenbergMarquardt::with_config(config).minimize_with_observer(&bounded, start, &mut external)?;

        let nfev = func_evals + polish.func_evals;
        let polish_termination = polish.status.termination();
        let termination = match (termination, polish_termination) {
            (_, TerminationReason::UserAbort) => TerminationReason::UserAbort,
            (TerminationReason::MaxEvalsReached, _) => TerminationReason::MaxEvalsReached,
            (_, reason) => reason,
        };
        let best = if polish.cost <= cost {
            bounded.to_external(&polish.params)
        } else {
            params
        };
        Ok(RawOutcome {
            model: best.clone(),
            best,
            nfev,
            iterations: iterations + polish.iterations,
            termination,
            message: format!("{}; polish: {}", message, polish.status.description()),
            chain: None,
        })
    }
}

/// Minimize `objective` with `method` and the default settings.
pub fn minimize(objective: &CompositeObjective, method: Method, max_nfev: Option<usize>) -> Result<MinimizerResult> {
    Minimizer::new(method).with_max_nfev(max_nfev).minimize(objective)
}
