//! Profile confidence intervals from the F-test.
//!
//! Each varying parameter is held fixed at trial values away from the best
//! fit while the others are re-optimized with Levenberg-Marquardt. The
//! increase of χ² is turned into a probability with the F distribution,
//!
//!   F = (χ²_new / χ²_best − 1) · (n − k),  p = cdf_F(1, n − k)(F),
//!
//! and the crossing of each requested probability is found by bisection.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, FisherSnedecor};
use std::collections::BTreeMap;

use crate::error::{Result, SpectraFitError};
use crate::minimizer::{Method, Minimizer};
use crate::objective::CompositeObjective;
use crate::problem::Problem;

/// Settings of the profile search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceSettings {
    /// Probability levels to bracket.
    pub probabilities: Vec<f64>,
    /// Maximum number of outward steps per direction.
    pub maxiter: usize,
    /// Stop stepping when the probability changes less than this, relatively.
    pub min_rel_change: f64,
    /// Record every profile evaluation.
    pub trace: bool,
    /// Evaluation budget of each re-optimization; `None` uses the solver default.
    pub max_nfev: Option<usize>,
}

impl Default for ConfidenceSettings {
    fn default() -> Self {
        Self {
            probabilities: vec![0.6827, 0.9545, 0.9973],
            maxiter: 200,
            min_rel_change: 1e-5,
            trace: false,
            max_nfev: None,
        }
    }
}

impl ConfidenceSettings {
    pub fn with_probabilities(mut self, probabilities: Vec<f64>) -> Self {
        self.probabilities = probabilities;
        self
    }

    pub fn with_maxiter(mut self, maxiter: usize) -> Self {
        self.maxiter = maxiter;
        self
    }

    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }
}

/// Bracket of one parameter at one probability. Unreachable ends are ±∞.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceLevel {
    pub probability: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Profile evaluations of one parameter, as columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfileTrace {
    /// Values of every varying parameter at each evaluation, keyed by name.
    pub columns: BTreeMap<String, Vec<f64>>,
    pub probability: Vec<f64>,
}

/// Confidence intervals of all varying parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfidenceIntervals {
    /// Best value and brackets per parameter, in coordinate order.
    pub parameters: Vec<(String, f64, Vec<ConfidenceLevel>)>,
    /// Present only when tracing was requested.
    pub trace: Option<BTreeMap<String, ProfileTrace>>,
}

impl ConfidenceIntervals {
    pub fn get(&self, name: &str) -> Option<&[ConfidenceLevel]> {
        self.parameters
            .iter()
            .find(|(n, _, _)| n == name)
            .map(|(_, _, levels)| levels.as_slice())
    }
}

/// Profile search around `best` for every varying parameter of `objective`.
///
/// `stderr` seeds the step size; NaN entries fall back to a fraction of the
/// value.
///
/// # Errors
///
/// `InvalidInput` for probabilities outside (0, 1). Degenerate profiles
/// never fail; they give ±∞ ends.
pub fn confidence_intervals(
    objective: &CompositeObjective,
    best: &Array1<f64>,
    stderr: &Array1<f64>,
    settings: &ConfidenceSettings,
) -> Result<ConfidenceIntervals> {
    if let Some(p) = settings.probabilities.iter().find(|p| !(**p > 0.0 && **p < 1.0)) {
        return Err(SpectraFitError::InvalidInput(format!(
            "confidence probability {} is not in (0, 1)",
            p
        )));
    }

    let profiler = Profiler::new(objective, best, settings)?;
    let names: Vec<String> = objective.graph().varying_names().iter().map(|s| s.to_string()).collect();
    let mut result = ConfidenceIntervals {
        parameters: Vec::with_capacity(names.len()),
        trace: settings.trace.then(BTreeMap::new),
    };

    for (j, name) in names.iter().enumerate() {
        let mut trace = ProfileTrace::default();
        let levels = match &profiler {
            Some(profiler) => profiler.profile(j, stderr.get(j).copied().unwrap_or(f64::NAN), &mut trace)?,
            None => unbounded_levels(&settings.probabilities),
        };
        tracing::debug!(parameter = %name, "confidence interval done");
        result.parameters.push((name.clone(), best[j], levels));
        if let Some(traces) = result.trace.as_mut() {
            traces.insert(name.clone(), trace);
        }
    }
    Ok(result)
}

fn unbounded_levels(probabilities: &[f64]) -> Vec<ConfidenceLevel> {
    probabilities
        .iter()
        .map(|&probability| ConfidenceLevel {
            probability,
            lower: f64::NEG_INFINITY,
            upper: f64::INFINITY,
        })
        .collect()
}

struct Profiler<'a> {
    objective: &'a CompositeObjective,
    best: &'a Array1<f64>,
    settings: &'a ConfidenceSettings,
    best_chisqr: f64,
    dof: f64,
    f_dist: FisherSnedecor,
}

impl<'a> Profiler<'a> {
    /// `None` when there are no degrees of freedom to test against.
    fn new(
        objective: &'a CompositeObjective,
        best: &'a Array1<f64>,
        settings: &'a ConfidenceSettings,
    ) -> Result<Option<Self>> {
        let ndata = objective.residual_count();
        let nvarys = objective.parameter_count();
        let best_chisqr = objective.eval_cost(best)?;
        if ndata <= nvarys || !(best_chisqr > 0.0 && best_chisqr.is_finite()) {
            tracing::warn!(ndata, nvarys, chisqr = best_chisqr, "profile test undefined, intervals unbounded");
            return Ok(None);
        }
        let dof = (ndata - nvarys) as f64;
        let f_dist = FisherSnedecor::new(1.0, dof).map_err(|e| SpectraFitError::Computation(e.to_string()))?;
        Ok(Some(Self {
            objective,
            best,
            settings,
            best_chisqr,
            dof,
            f_dist,
        }))
    }

    /// Probability that parameter `j` held at `value` is still compatible
    /// with the best fit. NaN when the re-optimization fails.
    fn probability(&self, j: usize, value: f64, trace: &mut ProfileTrace) -> Result<f64> {
        let graph = self.objective.graph();
        let name = graph.varying_names()[j].to_string();
        let fixed = graph.with_initial_values(self.best)?.with_fixed(&name, value)?;
        let profile = self.objective.with_graph(fixed);

        let minimizer = Minimizer::new(Method::LeastSq).with_max_nfev(self.settings.max_nfev);
        let (chisqr, values) = match minimizer.minimize(&profile) {
            Ok(result) => {
                let mut values = result.best_values.to_vec();
                values.insert(j, value);
                (result.chisqr, values)
            }
            Err(SpectraFitError::LinearAlgebra(_)) => (f64::NAN, vec![f64::NAN; self.best.len()]),
            Err(e) => return Err(e),
        };

        let f_stat = ((chisqr / self.best_chisqr - 1.0) * self.dof).max(0.0);
        let probability = if chisqr.is_finite() {
            self.f_dist.cdf(f_stat)
        } else {
            f64::NAN
        };

        if self.settings.trace {
            for (column, v) in graph.varying_names().iter().zip(values) {
                trace.columns.entry(column.to_string()).or_default().push(v);
            }
            trace.probability.push(probability);
        }
        Ok(probability)
    }

    fn profile(&self, j: usize, stderr: f64, trace: &mut ProfileTrace) -> Result<Vec<ConfidenceLevel>> {
        let start = self.best[j];
        let step = if stderr > 0.0 && stderr < start.abs() {
            stderr
        } else {
            (start.abs() * 0.2).max(0.001)
        };

        let mut lower = Vec::with_capacity(self.settings.probabilities.len());
        let mut upper = Vec::with_capacity(self.settings.probabilities.len());
        for (direction, ends) in [(-1.0, &mut lower), (1.0, &mut upper)] {
            let (limit, limit_prob) = self.find_limit(j, start, step * direction, trace)?;
            for &target in &self.settings.probabilities {
                let end = if limit_prob >= target {
                    self.bisect(j, start, limit, target, trace)?
                } else {
                    tracing::warn!(
                        parameter = %self.objective.graph().varying_names()[j],
                        probability = target,
                        "confidence level not reached"
                    );
                    direction * f64::INFINITY
                };
                ends.push(end);
            }
        }

        Ok(self
            .settings
            .probabilities
            .iter()
            .zip(lower.into_iter().zip(upper))
            .map(|(&probability, (lower, upper))| ConfidenceLevel {
                probability,
                lower,
                upper,
            })
            .collect())
    }

    /// Step outward until the largest requested probability is exceeded, the
    /// bound is hit, `maxiter` steps are spent or the probability stalls.
    fn find_limit(&self, j: usize, start: f64, step: f64, trace: &mut ProfileTrace) -> Result<(f64, f64)> {
        let bounds = self.objective.graph().bounds()[j];
        let max_prob = self.settings.probabilities.iter().copied().fold(0.0, f64::max);

        let mut limit = start;
        let mut old_prob = 0.0;
        for _ in 0..self.settings.maxiter {
            limit += step;
            let clamped = bounds.clamp(limit);
            let bound_reached = clamped != limit;
            limit = clamped;

            let new_prob = self.probability(j, limit, trace)?;
            if !new_prob.is_finite() {
                return Ok((limit, f64::NAN));
            }
            let rel_change = (new_prob - old_prob) / new_prob.max(old_prob).max(1e-12);
            old_prob = new_prob;
            if new_prob >= max_prob || bound_reached || rel_change < self.settings.min_rel_change {
                break;
            }
        }
        Ok((limit, old_prob))
    }

    /// Bisection for `probability(value) == target` between the best value
    /// (probability 0) and `limit`.
    fn bisect(&self, j: usize, start: f64, limit: f64, target: f64, trace: &mut ProfileTrace) -> Result<f64> {
        let (mut inside, mut outside) = (start, limit);
        let tolerance = 1e-6 * (limit - start).abs().max(f64::MIN_POSITIVE);
        for _ in 0..60 {
            if (outside - inside).abs() <= tolerance {
                break;
            }
            let middle = 0.5 * (inside + outside);
            let p = self.probability(j, middle, trace)?;
            if p.is_nan() || p >= target {
                outside = middle;
            } else {
                inside = middle;
            }
        }
        Ok(0.5 * (inside + outside))
    }
}
