//! Local and global fits.
//!
//! A fit is [`FitMode::Local`] for one spectrum and [`FitMode::Global`] when
//! several spectra are fit together. In global mode the objective
//! concatenates the per-dataset residuals; the result is split back at the
//! recorded boundaries into one [`DatasetFit`] per spectrum.

use ndarray::{s, Array1};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Result, SpectraFitError};
use crate::minimizer::MinimizerResult;
use crate::objective::{CompositeObjective, Dataset};
use crate::parameters::{ParameterGraph, PeakSpec};
use crate::statistics::{GoodnessOfFit, StatisticsBlock};

/// Whether one or several spectra are fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum FitMode {
    Local,
    Global { datasets: usize },
}

impl FitMode {
    pub fn n_datasets(&self) -> usize {
        match self {
            FitMode::Local => 1,
            FitMode::Global { datasets } => *datasets,
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self, FitMode::Global { .. })
    }

    /// Parameter graph for this mode.
    pub fn build_graph(&self, peaks: &[PeakSpec]) -> Result<ParameterGraph> {
        match self {
            FitMode::Local => ParameterGraph::build(peaks),
            FitMode::Global { datasets } => ParameterGraph::build_global(peaks, *datasets),
        }
    }

    /// Column key, suffixed with the 1-based dataset index in global mode.
    pub fn column(&self, base: &str, dataset: usize) -> String {
        match self {
            FitMode::Local => base.to_string(),
            FitMode::Global { .. } => format!("{}_{}", base, dataset + 1),
        }
    }
}

impl fmt::Display for FitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitMode::Local => write!(f, "local"),
            FitMode::Global { datasets } => write!(f, "global ({} datasets)", datasets),
        }
    }
}

/// Slice a concatenated vector at `boundaries` (start offsets followed by
/// the total length).
///
/// # Errors
///
/// `DimensionMismatch` when the last boundary differs from the length.
pub fn split_at_boundaries(values: &Array1<f64>, boundaries: &[usize]) -> Result<Vec<Array1<f64>>> {
    if boundaries.last().copied().unwrap_or(0) != values.len() {
        return Err(SpectraFitError::DimensionMismatch(format!(
            "boundaries end at {:?} but the vector has {} entries",
            boundaries.last(),
            values.len()
        )));
    }
    Ok(boundaries
        .windows(2)
        .map(|w| values.slice(s![w[0]..w[1]]).to_owned())
        .collect())
}

/// Result table entry for one parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterEstimate {
    pub name: String,
    pub init_value: f64,
    /// Value at the final iterate, or the posterior median.
    pub model_value: f64,
    pub best_value: f64,
    /// Standard error; NaN when unavailable or for fixed parameters.
    pub error_absolute: f64,
    /// `|error_absolute / best_value|`.
    pub error_relative: f64,
    pub vary: bool,
    pub expr: Option<String>,
}

/// The fit restricted to one dataset.
#[derive(Debug, Clone)]
pub struct DatasetFit {
    /// 0-based dataset index.
    pub index: usize,
    pub x: Array1<f64>,
    pub y: Array1<f64>,
    pub fit: Array1<f64>,
    pub residual: Array1<f64>,
    /// Per-peak contributions keyed `{model}_{peak}`.
    pub components: Vec<(String, Array1<f64>)>,
    pub goodness: GoodnessOfFit,
}

/// Complete outcome of a fit.
#[derive(Debug, Clone)]
pub struct FitResult {
    pub mode: FitMode,
    pub minimizer: MinimizerResult,
    /// Every parameter of the graph, in creation order.
    pub parameters: Vec<ParameterEstimate>,
    pub datasets: Vec<DatasetFit>,
    pub statistics: StatisticsBlock,
}

impl FitResult {
    /// Best value of every parameter by name.
    pub fn best_values(&self) -> BTreeMap<String, f64> {
        self.parameters
            .iter()
            .map(|p| (p.name.clone(), p.best_value))
            .collect()
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterEstimate> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// The per-dataset fits.
    pub fn split(&self) -> &[DatasetFit] {
        &self.datasets
    }

    /// Named result columns; see [`result_columns`].
    pub fn columns(&self) -> Vec<(String, Array1<f64>)> {
        result_columns(self.mode, &self.datasets)
    }
}

/// True when every axis equals the first one.
fn shares_x<'a, I>(axes: I) -> bool
where
    I: IntoIterator<Item = &'a Array1<f64>>,
{
    let mut axes = axes.into_iter();
    match axes.next() {
        Some(first) => axes.all(|x| x == first),
        None => true,
    }
}

/// Result columns: energy, intensity, residual, fit and one per component,
/// suffixed per dataset in global mode. A single `energy` column is used
/// when all datasets share the same axis.
pub fn result_columns(mode: FitMode, datasets: &[DatasetFit]) -> Vec<(String, Array1<f64>)> {
    let shared_x = shares_x(datasets.iter().map(|d| &d.x));

    let mut columns = Vec::new();
    if shared_x {
        if let Some(first) = datasets.first() {
            columns.push(("energy".to_string(), first.x.clone()));
        }
    }
    for data in datasets {
        let d = data.index;
        if !shared_x {
            columns.push((mode.column("energy", d), data.x.clone()));
        }
        columns.push((mode.column("intensity", d), data.y.clone()));
        columns.push((mode.column("residual", d), data.residual.clone()));
        columns.push((mode.column("fit", d), data.fit.clone()));
        for (name, values) in &data.components {
            columns.push((mode.column(name, d), values.clone()));
        }
    }
    columns
}

/// Input columns for the descriptive statistics.
pub fn input_columns(datasets: &[Dataset], mode: FitMode) -> Vec<(String, Array1<f64>)> {
    let shared_x = shares_x(datasets.iter().map(|d| &d.x));
    let mut columns = Vec::new();
    for (d, data) in datasets.iter().enumerate() {
        if !shared_x || d == 0 {
            let name = if shared_x { "energy".to_string() } else { mode.column("energy", d) };
            columns.push((name, data.x.clone()));
        }
        columns.push((mode.column("intensity", d), data.y.clone()));
    }
    columns
}

/// Parameter table from the optimizer result.
///
/// Errors of derived parameters come from linear propagation through their
/// expressions.
pub fn parameter_estimates(graph: &ParameterGraph, result: &MinimizerResult) -> Result<Vec<ParameterEstimate>> {
    let best = graph.resolve_values(&result.best_values)?;
    let model = graph.resolve_values(&result.model_values)?;
    let errors = match &result.covariance {
        Some(covar) => graph.propagate_errors(&result.best_values, covar)?,
        None => vec![f64::NAN; graph.len()],
    };

    Ok(graph
        .parameters()
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let error_absolute = if p.is_varying() || p.is_derived() {
                errors[i]
            } else {
                f64::NAN
            };
            ParameterEstimate {
                name: p.name.clone(),
                init_value: p.value,
                model_value: model[i],
                best_value: best[i],
                error_absolute,
                error_relative: (error_absolute / best[i]).abs(),
                vary: p.is_varying(),
                expr: p.expr.as_ref().map(|e| e.to_string()),
            }
        })
        .collect())
}

/// Split the aggregate result into per-dataset fits at the objective's
/// boundaries.
pub fn split_datasets(objective: &CompositeObjective, result: &MinimizerResult) -> Result<Vec<DatasetFit>> {
    let graph = objective.graph();
    let residuals = split_at_boundaries(&result.residual, objective.boundaries())?;
    let fits = objective.model(&result.best_values)?;
    let components = objective.components(&result.best_values)?;

    Ok(objective
        .datasets()
        .iter()
        .zip(residuals)
        .zip(fits.into_iter().zip(components))
        .enumerate()
        .map(|(d, ((data, residual), (fit, components)))| {
            // Varying parameters that act on this dataset.
            let nvarys = graph
                .varying_indices()
                .iter()
                .filter(|&&i| graph.parameters()[i].origin.dataset.map_or(true, |ds| ds == d + 1))
                .count();
            DatasetFit {
                index: d,
                x: data.x.clone(),
                y: data.y.clone(),
                goodness: GoodnessOfFit::new(&residual, nvarys),
                fit,
                residual,
                components,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::minimizer::{Method, Minimizer};
    use crate::objective::NanPolicy;
    use crate::parameters::AttributeSpec;
    use ndarray::array;

    #[test]
    fn test_split_inverts_concatenation() {
        let values = array![1.0, 2.0, 3.0, 4.0, 5.0];
        let parts = split_at_boundaries(&values, &[0, 2, 5]).unwrap();
        assert_eq!(parts, vec![array![1.0, 2.0], array![3.0, 4.0, 5.0]]);
        assert!(split_at_boundaries(&values, &[0, 2, 4]).is_err());
    }

    #[test]
    fn test_column_names() {
        assert_eq!(FitMode::Local.column("fit", 0), "fit");
        assert_eq!(FitMode::Global { datasets: 2 }.column("fit", 1), "fit_2");
    }

    #[test]
    fn test_separate_axes_get_suffixed_energy_columns() {
        let mode = FitMode::Global { datasets: 2 };
        let axes = [array![0.0, 1.0, 2.0], array![0.5, 1.5, 2.5]];
        let fits: Vec<DatasetFit> = axes
            .iter()
            .enumerate()
            .map(|(index, x)| DatasetFit {
                index,
                x: x.clone(),
                y: Array1::ones(3),
                fit: Array1::ones(3),
                residual: Array1::zeros(3),
                components: Vec::new(),
                goodness: GoodnessOfFit::from_chisqr(0.0, 3, 0),
            })
            .collect();

        let names: Vec<String> = result_columns(mode, &fits).into_iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            vec!["energy_1", "intensity_1", "residual_1", "fit_1", "energy_2", "intensity_2", "residual_2", "fit_2"]
        );

        let inputs: Vec<Dataset> = axes
            .iter()
            .map(|x| Dataset::new(x.clone(), Array1::ones(3)).unwrap())
            .collect();
        let names: Vec<String> = input_columns(&inputs, mode).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["energy_1", "intensity_1", "energy_2", "intensity_2"]);

        // Same axis on both: one shared column.
        let shared = vec![fits[0].clone(), DatasetFit { index: 1, ..fits[0].clone() }];
        let columns = result_columns(mode, &shared);
        assert_eq!(columns[0].0, "energy");
        assert_eq!(columns.iter().filter(|(n, _)| n.starts_with("energy")).count(), 1);
    }

    #[test]
    fn test_global_result_columns() {
        let x = Array1::linspace(-1.0, 1.0, 21);
        let peaks = vec![PeakSpec::new(1, "gaussian")
            .with_attribute("amplitude", AttributeSpec::value(1.0))
            .with_attribute("center", AttributeSpec::value(0.0).shared())
            .with_attribute("fwhmg", AttributeSpec::fixed(0.5))];
        let mode = FitMode::Global { datasets: 2 };
        let graph = mode.build_graph(&peaks).unwrap();
        let datasets = vec![
            Dataset::new(x.clone(), x.mapv(|v| (-v * v * 10.0).exp())).unwrap(),
            Dataset::new(x.clone(), x.mapv(|v| 2.0 * (-v * v * 10.0).exp())).unwrap(),
        ];
        let objective = CompositeObjective::new(graph, &datasets, NanPolicy::Raise).unwrap();
        let result = Minimizer::new(Method::LeastSq).minimize(&objective).unwrap();

        let split = split_datasets(&objective, &result).unwrap();
        assert_eq!(split.len(), 2);
        assert_eq!(split.iter().map(|d| d.residual.len()).sum::<usize>(), result.residual.len());

        let estimates = parameter_estimates(objective.graph(), &result).unwrap();
        let fit = FitResult {
            mode,
            minimizer: result,
            parameters: estimates,
            datasets: split,
            statistics: StatisticsBlock {
                data: BTreeMap::new(),
                goodness: GoodnessOfFit::from_chisqr(0.0, 42, 3),
                correlation: crate::statistics::linear_correlation(&[]),
                linear_correlation: crate::statistics::linear_correlation(&[]),
                confidence: None,
            },
        };
        let names: Vec<String> = fit.columns().into_iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            vec![
                "energy",
                "intensity_1",
                "residual_1",
                "fit_1",
                "gaussian_1_1",
                "intensity_2",
                "residual_2",
                "fit_2",
                "gaussian_1_2"
            ]
        );
        assert!(fit.parameter("gaussian_center_1").is_some());
        assert!(fit.parameter("gaussian_amplitude_1_2").is_some());
        assert!(fit.parameter("gaussian_fwhmg_1_1").unwrap().error_absolute.is_nan());
    }
}
