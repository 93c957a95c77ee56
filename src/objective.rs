//! The composite residual function: data minus the sum of all peaks.
//!
//! [`CompositeObjective`] owns the parameter graph and the (policy-filtered)
//! datasets. In global mode it concatenates the per-dataset residuals and
//! records where each dataset starts, so results can be split again.

use ndarray::{concatenate, Array1, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, SpectraFitError};
use crate::parameters::ParameterGraph;
use crate::problem::Problem;

/// How non-finite values in the data are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NanPolicy {
    /// Let them flow into the residual.
    Propagate,
    /// Reject the data at construction.
    #[default]
    Raise,
    /// Drop the affected samples once, before fitting.
    Omit,
}

impl FromStr for NanPolicy {
    type Err = SpectraFitError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "propagate" => Ok(NanPolicy::Propagate),
            "raise" => Ok(NanPolicy::Raise),
            "omit" => Ok(NanPolicy::Omit),
            other => Err(SpectraFitError::InvalidInput(format!("unknown nan_policy '{}'", other))),
        }
    }
}

impl fmt::Display for NanPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NanPolicy::Propagate => "propagate",
            NanPolicy::Raise => "raise",
            NanPolicy::Omit => "omit",
        })
    }
}

/// One spectrum: energy axis, intensity and optional weights.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub x: Array1<f64>,
    pub y: Array1<f64>,
    pub weights: Option<Array1<f64>>,
}

impl Dataset {
    pub fn new(x: Array1<f64>, y: Array1<f64>) -> Result<Self> {
        if x.len() != y.len() {
            return Err(SpectraFitError::DimensionMismatch(format!(
                "x has {} samples but y has {}",
                x.len(),
                y.len()
            )));
        }
        Ok(Self { x, y, weights: None })
    }

    /// Attach per-sample weights multiplying the residual.
    pub fn with_weights(mut self, weights: Array1<f64>) -> Result<Self> {
        if weights.len() != self.x.len() {
            return Err(SpectraFitError::DimensionMismatch(format!(
                "{} weights for {} samples",
                weights.len(),
                self.x.len()
            )));
        }
        self.weights = Some(weights);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    fn is_finite_at(&self, i: usize) -> bool {
        self.x[i].is_finite()
            && self.y[i].is_finite()
            && self.weights.as_ref().map_or(true, |w| w[i].is_finite())
    }

    /// Apply `policy`, returning the dataset the objective will use.
    ///
    /// # Errors
    ///
    /// `NonFiniteData` under `Raise`, `InvalidInput` when `Omit` leaves no
    /// samples.
    pub fn apply_policy(&self, policy: NanPolicy, label: &str) -> Result<Self> {
        let bad = (0..self.len()).filter(|&i| !self.is_finite_at(i)).count();
        match policy {
            NanPolicy::Propagate => Ok(self.clone()),
            NanPolicy::Raise if bad > 0 => Err(SpectraFitError::NonFiniteData(format!(
                "{} contains {} non-finite sample(s)",
                label, bad
            ))),
            NanPolicy::Raise => Ok(self.clone()),
            NanPolicy::Omit => {
                if bad == 0 {
                    return Ok(self.clone());
                }
                let keep: Vec<usize> = (0..self.len()).filter(|&i| self.is_finite_at(i)).collect();
                if keep.is_empty() {
                    return Err(SpectraFitError::InvalidInput(format!(
                        "{} has no finite samples left",
                        label
                    )));
                }
                tracing::debug!(dataset = label, omitted = bad, "omitting non-finite samples");
                let pick = |a: &Array1<f64>| keep.iter().map(|&i| a[i]).collect::<Array1<f64>>();
                Ok(Self {
                    x: pick(&self.x),
                    y: pick(&self.y),
                    weights: self.weights.as_ref().map(pick),
                })
            }
        }
    }
}

/// Weighted residual of the summed model against one or more datasets.
#[derive(Debug, Clone)]
pub struct CompositeObjective {
    graph: ParameterGraph,
    datasets: Vec<Dataset>,
    /// Start offset of each dataset in the concatenated residual, plus the
    /// total length.
    offsets: Vec<usize>,
    policy: NanPolicy,
}

impl CompositeObjective {
    /// # Errors
    ///
    /// `DimensionMismatch` when the number of datasets differs from the
    /// graph's, plus any policy error from [`Dataset::apply_policy`].
    pub fn new(graph: ParameterGraph, datasets: &[Dataset], policy: NanPolicy) -> Result<Self> {
        if datasets.len() != graph.n_datasets() {
            return Err(SpectraFitError::DimensionMismatch(format!(
                "parameter graph expects {} dataset(s), got {}",
                graph.n_datasets(),
                datasets.len()
            )));
        }

        let datasets = datasets
            .iter()
            .enumerate()
            .map(|(d, data)| {
                if data.is_empty() {
                    return Err(SpectraFitError::InvalidInput(format!("dataset {} is empty", d + 1)));
                }
                data.apply_policy(policy, &format!("dataset {}", d + 1))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut offsets = Vec::with_capacity(datasets.len() + 1);
        let mut total = 0;
        for data in &datasets {
            offsets.push(total);
            total += data.len();
        }
        offsets.push(total);

        Ok(Self {
            graph,
            datasets,
            offsets,
            policy,
        })
    }

    /// Same data against a different graph (e.g. one with a parameter held
    /// fixed).
    pub fn with_graph(&self, graph: ParameterGraph) -> Self {
        Self {
            graph,
            datasets: self.datasets.clone(),
            offsets: self.offsets.clone(),
            policy: self.policy,
        }
    }

    pub fn graph(&self) -> &ParameterGraph {
        &self.graph
    }

    /// Datasets after the NaN policy was applied.
    pub fn datasets(&self) -> &[Dataset] {
        &self.datasets
    }

    pub fn policy(&self) -> NanPolicy {
        self.policy
    }

    /// Dataset start offsets in the concatenated residual, followed by the
    /// total length.
    pub fn boundaries(&self) -> &[usize] {
        &self.offsets
    }

    fn model_for(&self, dataset: usize, resolved: &[f64]) -> Array1<f64> {
        let data = &self.datasets[dataset];
        let mut total = Array1::zeros(data.len());
        for peak in self.graph.peaks(dataset) {
            total += &peak.kind.evaluate(&data.x, &peak.values(resolved));
        }
        total
    }

    /// Summed model per dataset.
    pub fn model(&self, params: &Array1<f64>) -> Result<Vec<Array1<f64>>> {
        let resolved = self.graph.resolve_values(params)?;
        Ok((0..self.datasets.len())
            .map(|d| self.model_for(d, &resolved))
            .collect())
    }

    /// Per-peak components per dataset, keyed `{model}_{peak}`.
    pub fn components(&self, params: &Array1<f64>) -> Result<Vec<Vec<(String, Array1<f64>)>>> {
        let resolved = self.graph.resolve_values(params)?;
        Ok((0..self.datasets.len())
            .map(|d| {
                let x = &self.datasets[d].x;
                self.graph
                    .peaks(d)
                    .iter()
                    .map(|peak| (peak.component_name(), peak.kind.evaluate(x, &peak.values(&resolved))))
                    .collect()
            })
            .collect())
    }

    /// Residuals split per dataset.
    pub fn residuals(&self, params: &Array1<f64>) -> Result<Vec<Array1<f64>>> {
        let resolved = self.graph.resolve_values(params)?;
        Ok((0..self.datasets.len())
            .map(|d| {
                let data = &self.datasets[d];
                let mut residual = &data.y - &self.model_for(d, &resolved);
                if let Some(weights) = &data.weights {
                    residual *= weights;
                }
                residual
            })
            .collect())
    }
}

impl Problem for CompositeObjective {
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
        let parts = self.residuals(params)?;
        if parts.len() == 1 {
            return Ok(parts.into_iter().next().unwrap_or_default());
        }
        let views: Vec<_> = parts.iter().map(|p| p.view()).collect();
        concatenate(Axis(0), &views).map_err(|e| SpectraFitError::Computation(e.to_string()))
    }

    fn parameter_count(&self) -> usize {
        self.graph.n_varying()
    }

    fn residual_count(&self) -> usize {
        self.offsets.last().copied().unwrap_or(0)
    }
}
