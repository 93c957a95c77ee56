//! Versioned JSON record of a fit.
//!
//! The layout mirrors what downstream tooling reads:
//!
//! ```text
//! version, settings, data_statistic,
//! fit_insights { configurations, statistics, variables, correlations },
//! confidence_interval, [confidence_trace], linear_correlation, fit_result
//! ```
//!
//! NaN is written as `null`. Unreachable confidence bounds are written as
//! the strings `"-Infinity"` and `"Infinity"`.

use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

use crate::aggregate::{FitMode, FitResult};
use crate::error::Result;
use crate::minimizer::{Method, TerminationReason};
use crate::project::Settings;
use crate::statistics::{CorrelationMatrix, DescriptiveStatistics, GoodnessOfFit, ProfileTrace};
use crate::VERSION;

/// Writes ±∞ as strings and NaN as null.
fn serialize_bound<S: Serializer>(value: &f64, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    if value.is_nan() {
        serializer.serialize_none()
    } else if *value == f64::INFINITY {
        serializer.serialize_str("Infinity")
    } else if *value == f64::NEG_INFINITY {
        serializer.serialize_str("-Infinity")
    } else {
        serializer.serialize_f64(*value)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Configurations {
    pub method: Method,
    pub n_evals: usize,
    pub n_data_points: usize,
    pub n_variables: usize,
    pub variable_names: Vec<String>,
    pub degrees_of_freedom: usize,
    pub termination_reason: TerminationReason,
    pub message: String,
    #[serde(flatten)]
    pub mode: FitMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VariableEntry {
    pub init_value: f64,
    pub model_value: f64,
    pub best_value: f64,
    pub error_absolute: f64,
    pub error_relative: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FitInsights {
    pub configurations: Configurations,
    pub statistics: GoodnessOfFit,
    pub variables: BTreeMap<String, VariableEntry>,
    pub correlations: CorrelationMatrix,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IntervalEntry {
    pub probability: f64,
    #[serde(serialize_with = "serialize_bound")]
    pub lower: f64,
    #[serde(serialize_with = "serialize_bound")]
    pub upper: f64,
}

/// Serializable summary of a [`FitResult`].
#[derive(Debug, Clone, Serialize)]
pub struct FitReport {
    pub version: String,
    pub settings: Settings,
    pub data_statistic: BTreeMap<String, DescriptiveStatistics>,
    pub fit_insights: FitInsights,
    pub confidence_interval: BTreeMap<String, Vec<IntervalEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_trace: Option<BTreeMap<String, ProfileTrace>>,
    pub linear_correlation: CorrelationMatrix,
    pub fit_result: BTreeMap<String, Vec<f64>>,
}

impl FitReport {
    pub fn new(settings: &Settings, result: &FitResult) -> Self {
        let minimizer = &result.minimizer;
        let stats = &result.statistics;

        let configurations = Configurations {
            method: minimizer.method,
            n_evals: minimizer.nfev,
            n_data_points: stats.goodness.n_data_points,
            n_variables: stats.goodness.n_variables,
            variable_names: result
                .parameters
                .iter()
                .filter(|p| p.vary)
                .map(|p| p.name.clone())
                .collect(),
            degrees_of_freedom: stats.goodness.degrees_of_freedom,
            termination_reason: minimizer.termination,
            message: minimizer.message.clone(),
            mode: result.mode,
        };

        let variables = result
            .parameters
            .iter()
            .map(|p| {
                let entry = VariableEntry {
                    init_value: p.init_value,
                    model_value: p.model_value,
                    best_value: p.best_value,
                    error_absolute: p.error_absolute,
                    error_relative: p.error_relative,
                };
                (p.name.clone(), entry)
            })
            .collect();

        let (confidence_interval, confidence_trace) = match &stats.confidence {
            Some(ci) => {
                let levels = ci
                    .parameters
                    .iter()
                    .map(|(name, _, levels)| {
                        let entries = levels
                            .iter()
                            .map(|l| IntervalEntry {
                                probability: l.probability,
                                lower: l.lower,
                                upper: l.upper,
                            })
                            .collect();
                        (name.clone(), entries)
                    })
                    .collect();
                (levels, ci.trace.clone())
            }
            None => (BTreeMap::new(), None),
        };

        Self {
            version: VERSION.to_string(),
            settings: settings.clone(),
            data_statistic: stats.data.clone(),
            fit_insights: FitInsights {
                configurations,
                statistics: stats.goodness,
                variables,
                correlations: stats.correlation.clone(),
            },
            confidence_interval,
            confidence_trace,
            linear_correlation: stats.linear_correlation.clone(),
            fit_result: result
                .columns()
                .into_iter()
                .map(|(name, values)| (name, values.to_vec()))
                .collect(),
        }
    }

    pub fn to_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
