//! Fit projects: settings, peaks and data, and the pipeline that turns them
//! into a [`FitResult`].

use serde::{Deserialize, Serialize};

use crate::aggregate::{
    input_columns, parameter_estimates, result_columns, split_datasets, FitMode, FitResult,
};
use crate::error::{Result, SpectraFitError};
use crate::minimizer::{Method, Minimizer};
use crate::objective::{CompositeObjective, Dataset, NanPolicy};
use crate::observer::{FitObserver, NoopObserver};
use crate::parameters::{peaks_from_mapping, PeakSpec};
use crate::report::FitReport;
use crate::statistics::{
    confidence_intervals, linear_correlation, parameter_correlation, ConfidenceSettings, DescriptiveStatistics,
    GoodnessOfFit, StatisticsBlock,
};

/// The data to fit. `Multiple` always selects a global fit.
#[derive(Debug, Clone, PartialEq)]
pub enum FitTarget {
    Single(Dataset),
    Multiple(Vec<Dataset>),
}

impl FitTarget {
    pub fn mode(&self) -> FitMode {
        match self {
            FitTarget::Single(_) => FitMode::Local,
            FitTarget::Multiple(datasets) => FitMode::Global {
                datasets: datasets.len(),
            },
        }
    }

    pub fn datasets(&self) -> &[Dataset] {
        match self {
            FitTarget::Single(dataset) => std::slice::from_ref(dataset),
            FitTarget::Multiple(datasets) => datasets,
        }
    }
}

/// Fit settings. Every field has a default, so a partial mapping is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub method: Method,
    pub nan_policy: NanPolicy,
    /// `None` uses `2000 * (k + 1)`.
    pub max_nfev: Option<usize>,
    pub seed: Option<u64>,
    /// Profile confidence intervals are computed only when present.
    pub confidence_interval: Option<ConfidenceSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            method: Method::LeastSq,
            nan_policy: NanPolicy::Raise,
            max_nfev: None,
            seed: None,
            confidence_interval: None,
        }
    }
}

impl Settings {
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_nan_policy(mut self, policy: NanPolicy) -> Self {
        self.nan_policy = policy;
        self
    }

    pub fn with_max_nfev(mut self, max_nfev: Option<usize>) -> Self {
        self.max_nfev = max_nfev;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_confidence_interval(mut self, settings: Option<ConfidenceSettings>) -> Self {
        self.confidence_interval = settings;
        self
    }
}

/// Settings, peak declarations and the data they are fit to.
#[derive(Debug, Clone)]
pub struct FitProject {
    pub settings: Settings,
    pub peaks: Vec<PeakSpec>,
    pub target: FitTarget,
}

impl FitProject {
    pub fn new(peaks: Vec<PeakSpec>, target: FitTarget) -> Self {
        Self {
            settings: Settings::default(),
            peaks,
            target,
        }
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Build a project from a `{settings, fitting: {peaks}}` mapping.
    ///
    /// # Errors
    ///
    /// `UnknownMethod` for an unregistered method name, `InvalidInput` when
    /// `fitting.peaks` is missing, and the parse errors of
    /// [`peaks_from_mapping`].
    pub fn from_mapping(value: &serde_json::Value, target: FitTarget) -> Result<Self> {
        let settings = match value.get("settings") {
            Some(raw) => {
                if let Some(method) = raw.get("method").and_then(|m| m.as_str()) {
                    method.parse::<Method>()?;
                }
                serde_json::from_value(raw.clone())?
            }
            None => Settings::default(),
        };

        let peaks = value
            .get("fitting")
            .and_then(|f| f.get("peaks"))
            .ok_or_else(|| SpectraFitError::InvalidInput("mapping has no 'fitting.peaks' entry".to_string()))?;

        Ok(Self {
            settings,
            peaks: peaks_from_mapping(peaks)?,
            target,
        })
    }

    pub fn mode(&self) -> FitMode {
        self.target.mode()
    }

    /// Parameter graph and aggregate objective for the target.
    pub fn objective(&self) -> Result<CompositeObjective> {
        if self.target.datasets().is_empty() {
            return Err(SpectraFitError::InvalidInput("no datasets to fit".to_string()));
        }
        let graph = self.mode().build_graph(&self.peaks)?;
        CompositeObjective::new(graph, self.target.datasets(), self.settings.nan_policy)
    }

    pub fn fit(&self) -> Result<FitResult> {
        self.fit_with_observer(&mut NoopObserver)
    }

    /// Run the complete pipeline, reporting every iteration to `observer`.
    pub fn fit_with_observer<O>(&self, observer: &mut O) -> Result<FitResult>
    where
        O: FitObserver + ?Sized,
    {
        let mode = self.mode();
        let objective = self.objective()?;
        let graph = objective.graph();

        let minimizer = Minimizer::new(self.settings.method)
            .with_max_nfev(self.settings.max_nfev)
            .with_seed(self.settings.seed);
        let result = minimizer.minimize_with_observer(&objective, observer)?;

        let parameters = parameter_estimates(graph, &result)?;
        let datasets = split_datasets(&objective, &result)?;

        let data = input_columns(self.target.datasets(), mode)
            .into_iter()
            .map(|(name, values)| (name, DescriptiveStatistics::from_values(&values)))
            .collect();

        let confidence = match &self.settings.confidence_interval {
            Some(ci) if graph.n_varying() > 0 => Some(confidence_intervals(
                &objective,
                &result.best_values,
                &result.stderr,
                ci,
            )?),
            _ => None,
        };

        let statistics = StatisticsBlock {
            data,
            goodness: GoodnessOfFit::new(&result.residual, graph.n_varying()),
            correlation: parameter_correlation(graph, result.covariance.as_ref()),
            linear_correlation: linear_correlation(&result_columns(mode, &datasets)),
            confidence,
        };

        tracing::info!(
            mode = %mode,
            chisqr = statistics.goodness.chi_square,
            redchi = statistics.goodness.reduced_chi_square,
            "fit finished"
        );

        Ok(FitResult {
            mode,
            minimizer: result,
            parameters,
            datasets,
            statistics,
        })
    }

    /// Report for a result of this project.
    pub fn report(&self, result: &FitResult) -> FitReport {
        FitReport::new(&self.settings, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;
    use serde_json::json;

    fn gaussian_data() -> Dataset {
        let x = Array1::linspace(-2.0, 2.0, 81);
        let sigma = 0.5 / (2.0 * (2.0f64).ln()).sqrt();
        let y = x.mapv(|v| {
            let norm = 1.0 / (sigma * (2.0 * std::f64::consts::PI).sqrt());
            norm * (-(v - 0.1) * (v - 0.1) / (2.0 * sigma * sigma)).exp()
        });
        Dataset::new(x, y).unwrap()
    }

    #[test]
    fn test_settings_defaults() {
        let settings: Settings = serde_json::from_value(json!({"method": "nelder"})).unwrap();
        assert_eq!(settings.method, Method::NelderMead);
        assert_eq!(settings.nan_policy, NanPolicy::Raise);
        assert!(settings.confidence_interval.is_none());
    }

    #[test]
    fn test_from_mapping() {
        let mapping = json!({
            "settings": {"method": "LeastSq", "max_nfev": 500},
            "fitting": {"peaks": {
                "1": {"gaussian": {
                    "amplitude": {"value": 0.8, "min": 0.0, "max": 5.0},
                    "center": {"value": 0.0},
                    "fwhmg": {"value": 0.6, "min": 0.1, "max": 2.0}
                }}
            }}
        });
        let project = FitProject::from_mapping(&mapping, FitTarget::Single(gaussian_data())).unwrap();
        assert_eq!(project.settings.max_nfev, Some(500));
        assert_eq!(project.peaks.len(), 1);

        let result = project.fit().unwrap();
        assert!(result.minimizer.success());
        assert!((result.parameter("gaussian_center_1").unwrap().best_value - 0.1).abs() < 1e-6);
        assert!(result.statistics.data.contains_key("energy"));
        assert!(result.statistics.data.contains_key("intensity"));
    }

    #[test]
    fn test_unknown_method() {
        let mapping = json!({
            "settings": {"method": "simplex-annealing"},
            "fitting": {"peaks": {"1": {"gaussian": {"amplitude": {"value": 1.0}}}}}
        });
        let err = FitProject::from_mapping(&mapping, FitTarget::Single(gaussian_data())).unwrap_err();
        assert!(matches!(err, SpectraFitError::UnknownMethod(_)));
    }

    #[test]
    fn test_missing_peaks() {
        let err = FitProject::from_mapping(&json!({}), FitTarget::Single(gaussian_data())).unwrap_err();
        assert!(matches!(err, SpectraFitError::InvalidInput(_)));
    }

    #[test]
    fn test_empty_multiple_target() {
        let project = FitProject::new(vec![PeakSpec::new(1, "gaussian")], FitTarget::Multiple(Vec::new()));
        assert!(project.fit().is_err());
    }
}
