//! The flattened parameter set of a fit.
//!
//! [`ParameterGraph`] turns ordered [`PeakSpec`]s into named parameters,
//! partitions them into varying, fixed and derived ones and orders the derived
//! ones so that every expression is evaluated after the parameters it reads.
//! The optimizer only ever sees the varying coordinates; everything else is
//! recovered with [`ParameterGraph::resolve_values`].

use ndarray::{Array1, Array2};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::{Result, SpectraFitError};
use crate::models::ModelKind;
use crate::parameters::bounds::Bounds;
use crate::parameters::expression::{EvaluationContext, Expression, ExpressionError};
use crate::parameters::spec::{AttributeSpec, PeakSpec};

/// Where a parameter comes from.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterOrigin {
    pub peak_index: usize,
    pub model: ModelKind,
    pub attribute: &'static str,
    /// 1-based dataset index for per-dataset parameters in global mode.
    pub dataset: Option<usize>,
}

/// A single named parameter of the graph.
#[derive(Debug, Clone)]
pub struct GraphParameter {
    pub name: String,
    /// Initial value; for derived parameters the value resolved from the
    /// initial free values.
    pub value: f64,
    pub bounds: Bounds,
    pub vary: bool,
    pub expr: Option<Expression>,
    pub origin: ParameterOrigin,
}

impl GraphParameter {
    pub fn is_derived(&self) -> bool {
        self.expr.is_some()
    }

    /// Free and under optimizer control.
    pub fn is_varying(&self) -> bool {
        self.vary && self.expr.is_none()
    }
}

/// Source of one attribute value when a peak is evaluated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Slot {
    Parameter(usize),
    /// Unspecified attribute held at the model default.
    Constant(f64),
}

/// A peak bound to parameter slots for one dataset.
#[derive(Debug, Clone)]
pub struct PeakBinding {
    pub index: usize,
    pub kind: ModelKind,
    /// One slot per attribute, in signature order.
    pub slots: Vec<Slot>,
}

impl PeakBinding {
    /// `{model}_{peak}`, the component key in results.
    pub fn component_name(&self) -> String {
        format!("{}_{}", self.kind.tag(), self.index)
    }

    /// Attribute values for this peak from a dense resolved vector.
    pub fn values(&self, resolved: &[f64]) -> Vec<f64> {
        self.slots
            .iter()
            .map(|slot| match slot {
                Slot::Parameter(i) => resolved[*i],
                Slot::Constant(v) => *v,
            })
            .collect()
    }
}

/// Expression context over a dense value vector.
struct DenseContext<'a> {
    index: &'a HashMap<String, usize>,
    values: &'a [f64],
}

impl EvaluationContext for DenseContext<'_> {
    fn get_variable(&self, name: &str) -> std::result::Result<f64, ExpressionError> {
        self.index
            .get(name)
            .map(|&i| self.values[i])
            .ok_or_else(|| ExpressionError::UndefinedVariable {
                name: name.to_string(),
            })
    }
}

/// Flattened, validated parameter set with its dependency order.
#[derive(Debug, Clone)]
pub struct ParameterGraph {
    parameters: Vec<GraphParameter>,
    index: HashMap<String, usize>,
    /// Optimizer coordinates, in creation order.
    varying: Vec<usize>,
    /// Derived parameters in topological order.
    order: Vec<usize>,
    /// Peak bindings per dataset; a single entry in local mode.
    datasets: Vec<Vec<PeakBinding>>,
    global: bool,
}

impl ParameterGraph {
    /// Build the graph for a single dataset.
    ///
    /// # Errors
    ///
    /// `UnknownModel`, `UnknownAttribute`, `DuplicateParameter`,
    /// `Expression`, `UndefinedReference`, `CyclicExpression` or
    /// `InvalidBounds`, all before any numeric work.
    pub fn build(peaks: &[PeakSpec]) -> Result<Self> {
        Self::build_inner(peaks, 1, false)
    }

    /// Build the graph for `n_datasets` spectra fitted together.
    ///
    /// Shared attributes become one parameter named like a local one; every
    /// other attribute becomes one parameter per dataset with a trailing
    /// `_{d}`. Expression references to per-dataset names are rewritten to the
    /// parameter of the same dataset.
    pub fn build_global(peaks: &[PeakSpec], n_datasets: usize) -> Result<Self> {
        if n_datasets == 0 {
            return Err(SpectraFitError::InvalidInput(
                "global fit needs at least one dataset".to_string(),
            ));
        }
        Self::build_inner(peaks, n_datasets, true)
    }

    fn build_inner(peaks: &[PeakSpec], n_datasets: usize, global: bool) -> Result<Self> {
        // Resolve kinds and collect the base names that exist per dataset.
        let mut resolved_peaks = Vec::with_capacity(peaks.len());
        let mut per_dataset: HashSet<String> = HashSet::new();
        for peak in peaks {
            let kind = ModelKind::from_tag(&peak.model)?;
            let mut attributes = Vec::with_capacity(peak.attributes.len());
            for (name, spec) in &peak.attributes {
                let position = kind
                    .attribute_index(name)
                    .ok_or_else(|| SpectraFitError::UnknownAttribute {
                        model: kind.tag().to_string(),
                        attribute: name.clone(),
                    })?;
                let base = format!("{}_{}_{}", kind.tag(), name, peak.index);
                if global && !spec.is_shared() {
                    per_dataset.insert(base.clone());
                }
                attributes.push((position, base, spec));
            }
            resolved_peaks.push((peak.index, kind, attributes));
        }

        let mut parameters: Vec<GraphParameter> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut datasets: Vec<Vec<PeakBinding>> = (0..n_datasets)
            .map(|_| Vec::with_capacity(resolved_peaks.len()))
            .collect();

        for (peak_index, kind, attributes) in &resolved_peaks {
            let signature = kind.attributes();
            let mut slots: Vec<Vec<Slot>> = (0..n_datasets)
                .map(|_| signature.iter().map(|a| Slot::Constant(a.default)).collect())
                .collect();

            for (position, base, spec) in attributes {
                let default = signature[*position].default;
                let copies: Vec<Option<usize>> = if global && !spec.is_shared() {
                    (1..=n_datasets).map(Some).collect()
                } else {
                    vec![None]
                };

                for dataset in copies {
                    let name = match dataset {
                        Some(d) => format!("{}_{}", base, d),
                        None => base.clone(),
                    };
                    if index.contains_key(&name) {
                        return Err(SpectraFitError::DuplicateParameter(name));
                    }
                    let origin = ParameterOrigin {
                        peak_index: *peak_index,
                        model: *kind,
                        attribute: signature[*position].name,
                        dataset,
                    };
                    let parameter =
                        Self::make_parameter(&name, spec, default, origin, dataset, &per_dataset)?;

                    let slot = Slot::Parameter(parameters.len());
                    match dataset {
                        Some(d) => slots[d - 1][*position] = slot,
                        None => slots.iter_mut().for_each(|s| s[*position] = slot),
                    }
                    index.insert(name, parameters.len());
                    parameters.push(parameter);
                }
            }

            for (d, dataset_slots) in slots.into_iter().enumerate() {
                datasets[d].push(PeakBinding {
                    index: *peak_index,
                    kind: *kind,
                    slots: dataset_slots,
                });
            }
        }

        for parameter in &parameters {
            if let Some(expr) = &parameter.expr {
                for reference in expr.variables() {
                    if !index.contains_key(&reference) {
                        return Err(SpectraFitError::UndefinedReference {
                            name: parameter.name.clone(),
                            reference,
                        });
                    }
                }
            }
        }

        let order = topological_order(&parameters, &index)?;
        let varying = parameters
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_varying())
            .map(|(i, _)| i)
            .collect();

        let mut graph = Self {
            parameters,
            index,
            varying,
            order,
            datasets,
            global,
        };
        graph.refresh_derived()?;

        tracing::debug!(
            parameters = graph.parameters.len(),
            varying = graph.varying.len(),
            derived = graph.order.len(),
            datasets = n_datasets,
            "built parameter graph"
        );
        Ok(graph)
    }

    fn make_parameter(
        name: &str,
        spec: &AttributeSpec,
        default: f64,
        origin: ParameterOrigin,
        dataset: Option<usize>,
        per_dataset: &HashSet<String>,
    ) -> Result<GraphParameter> {
        match spec {
            AttributeSpec::Free {
                value,
                min,
                max,
                vary,
                ..
            } => {
                let value = value.unwrap_or(default);
                let invalid = || SpectraFitError::InvalidBounds {
                    name: name.to_string(),
                    min: *min,
                    value,
                    max: *max,
                };
                let bounds = Bounds::new(*min, *max).map_err(|_| invalid())?;
                if !value.is_finite() || (*vary && !bounds.contains(value)) {
                    return Err(invalid());
                }
                Ok(GraphParameter {
                    name: name.to_string(),
                    value,
                    bounds,
                    vary: *vary,
                    expr: None,
                    origin,
                })
            }
            AttributeSpec::Derived { expr, .. } => {
                let parsed = Expression::parse(expr).map_err(|source| SpectraFitError::Expression {
                    name: name.to_string(),
                    source,
                })?;
                let parsed = match dataset {
                    Some(d) => parsed.rename_variables(&|var: &str| {
                        if per_dataset.contains(var) {
                            format!("{}_{}", var, d)
                        } else {
                            var.to_string()
                        }
                    }),
                    None => {
                        // A shared expression has no dataset to bind to.
                        if let Some(var) = parsed.variables().into_iter().find(|v| per_dataset.contains(v)) {
                            return Err(SpectraFitError::InvalidInput(format!(
                                "shared parameter '{}' references per-dataset parameter '{}'",
                                name, var
                            )));
                        }
                        parsed
                    }
                };
                Ok(GraphParameter {
                    name: name.to_string(),
                    value: f64::NAN,
                    bounds: Bounds::unbounded(),
                    vary: false,
                    expr: Some(parsed),
                    origin,
                })
            }
        }
    }

    /// Recompute the stored value of every derived parameter.
    fn refresh_derived(&mut self) -> Result<()> {
        let initial = self.initial_values();
        let resolved = self.resolve_values(&initial)?;
        for &i in &self.order {
            self.parameters[i].value = resolved[i];
        }
        Ok(())
    }

    pub fn is_global(&self) -> bool {
        self.global
    }

    pub fn n_datasets(&self) -> usize {
        self.datasets.len()
    }

    /// Peak bindings for the 0-based `dataset`.
    pub fn peaks(&self, dataset: usize) -> &[PeakBinding] {
        &self.datasets[dataset]
    }

    pub fn parameters(&self) -> &[GraphParameter] {
        &self.parameters
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&GraphParameter> {
        self.index.get(name).map(|&i| &self.parameters[i])
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Reverse lookup from a parameter name to its peak, model and attribute.
    pub fn origin(&self, name: &str) -> Option<&ParameterOrigin> {
        self.get(name).map(|p| &p.origin)
    }

    /// All parameter names in creation order.
    pub fn names(&self) -> Vec<&str> {
        self.parameters.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn n_varying(&self) -> usize {
        self.varying.len()
    }

    /// Dense indices of the varying parameters.
    pub fn varying_indices(&self) -> &[usize] {
        &self.varying
    }

    /// Names of the optimizer coordinates.
    pub fn varying_names(&self) -> Vec<&str> {
        self.varying
            .iter()
            .map(|&i| self.parameters[i].name.as_str())
            .collect()
    }

    pub fn initial_values(&self) -> Array1<f64> {
        self.varying.iter().map(|&i| self.parameters[i].value).collect()
    }

    pub fn bounds(&self) -> Vec<Bounds> {
        self.varying.iter().map(|&i| self.parameters[i].bounds).collect()
    }

    /// Dense values of all parameters for the given varying coordinates.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` when `values` does not match the varying count,
    /// `Expression` when a derived expression fails to evaluate.
    pub fn resolve_values(&self, values: &Array1<f64>) -> Result<Vec<f64>> {
        if values.len() != self.varying.len() {
            return Err(SpectraFitError::DimensionMismatch(format!(
                "expected {} varying values, got {}",
                self.varying.len(),
                values.len()
            )));
        }

        let mut resolved: Vec<f64> = self.parameters.iter().map(|p| p.value).collect();
        for (k, &i) in self.varying.iter().enumerate() {
            resolved[i] = values[k];
        }

        for &i in &self.order {
            let parameter = &self.parameters[i];
            if let Some(expr) = &parameter.expr {
                let context = DenseContext {
                    index: &self.index,
                    values: &resolved,
                };
                let value = expr
                    .evaluate(&context)
                    .map_err(|source| SpectraFitError::Expression {
                        name: parameter.name.clone(),
                        source,
                    })?;
                resolved[i] = value;
            }
        }
        Ok(resolved)
    }

    /// Name to value for every parameter.
    pub fn resolve(&self, values: &Array1<f64>) -> Result<BTreeMap<String, f64>> {
        let resolved = self.resolve_values(values)?;
        Ok(self
            .parameters
            .iter()
            .zip(resolved)
            .map(|(p, v)| (p.name.clone(), v))
            .collect())
    }

    /// Sensitivity of every parameter to the varying coordinates,
    /// `∂resolved_i / ∂values_j`, by central differences for derived rows.
    pub fn sensitivity(&self, values: &Array1<f64>) -> Result<Array2<f64>> {
        let n = self.parameters.len();
        let k = self.varying.len();
        let mut jac = Array2::zeros((n, k));
        for (j, &i) in self.varying.iter().enumerate() {
            jac[[i, j]] = 1.0;
        }
        if self.order.is_empty() {
            return Ok(jac);
        }

        for j in 0..k {
            let step = f64::EPSILON.sqrt() * values[j].abs().max(1.0);
            let mut up = values.clone();
            let mut down = values.clone();
            up[j] += step;
            down[j] -= step;
            let plus = self.resolve_values(&up)?;
            let minus = self.resolve_values(&down)?;
            for &i in &self.order {
                jac[[i, j]] = (plus[i] - minus[i]) / (2.0 * step);
            }
        }
        Ok(jac)
    }

    /// Standard errors of all parameters from the covariance of the varying
    /// coordinates, by linear propagation. Fixed parameters get NaN.
    pub fn propagate_errors(&self, values: &Array1<f64>, covariance: &Array2<f64>) -> Result<Vec<f64>> {
        let jac = self.sensitivity(values)?;
        let propagated = jac.dot(covariance).dot(&jac.t());
        Ok(self
            .parameters
            .iter()
            .enumerate()
            .map(|(i, p)| {
                if p.is_varying() || p.is_derived() {
                    propagated[[i, i]].max(0.0).sqrt()
                } else {
                    f64::NAN
                }
            })
            .collect())
    }

    /// A copy whose varying parameters start at `values`, clamped to their
    /// bounds.
    pub fn with_initial_values(&self, values: &Array1<f64>) -> Result<Self> {
        if values.len() != self.varying.len() {
            return Err(SpectraFitError::DimensionMismatch(format!(
                "expected {} varying values, got {}",
                self.varying.len(),
                values.len()
            )));
        }
        let mut graph = self.clone();
        for (k, &i) in self.varying.iter().enumerate() {
            let parameter = &mut graph.parameters[i];
            parameter.value = parameter.bounds.clamp(values[k]);
        }
        graph.refresh_derived()?;
        Ok(graph)
    }

    /// A copy with the free parameter `name` held at `value`.
    ///
    /// # Errors
    ///
    /// `ParameterNotFound` for an unknown name, `InvalidInput` for a derived
    /// parameter.
    pub fn with_fixed(&self, name: &str, value: f64) -> Result<Self> {
        let i = self
            .position(name)
            .ok_or_else(|| SpectraFitError::ParameterNotFound(name.to_string()))?;
        if self.parameters[i].is_derived() {
            return Err(SpectraFitError::InvalidInput(format!(
                "cannot fix derived parameter '{}'",
                name
            )));
        }
        let mut graph = self.clone();
        graph.parameters[i].value = value;
        graph.parameters[i].vary = false;
        graph.varying.retain(|&v| v != i);
        graph.refresh_derived()?;
        Ok(graph)
    }
}

/// Order derived parameters so that dependencies come first.
fn topological_order(parameters: &[GraphParameter], index: &HashMap<String, usize>) -> Result<Vec<usize>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        New,
        Active,
        Done,
    }

    fn visit(
        i: usize,
        parameters: &[GraphParameter],
        index: &HashMap<String, usize>,
        marks: &mut [Mark],
        stack: &mut Vec<usize>,
        order: &mut Vec<usize>,
    ) -> Result<()> {
        match marks[i] {
            Mark::Done => return Ok(()),
            Mark::Active => {
                let start = stack.iter().position(|&s| s == i).unwrap_or(0);
                let cycle = stack[start..]
                    .iter()
                    .map(|&s| parameters[s].name.clone())
                    .collect();
                return Err(SpectraFitError::CyclicExpression(cycle));
            }
            Mark::New => {}
        }

        let expr = match &parameters[i].expr {
            Some(expr) => expr,
            None => {
                marks[i] = Mark::Done;
                return Ok(());
            }
        };

        marks[i] = Mark::Active;
        stack.push(i);
        for reference in expr.variables() {
            if let Some(&j) = index.get(&reference) {
                visit(j, parameters, index, marks, stack, order)?;
            }
        }
        stack.pop();
        marks[i] = Mark::Done;
        order.push(i);
        Ok(())
    }

    let mut marks = vec![Mark::New; parameters.len()];
    let mut stack = Vec::new();
    let mut order = Vec::new();
    for i in 0..parameters.len() {
        visit(i, parameters, index, &mut marks, &mut stack, &mut order)?;
    }
    Ok(order)
}
