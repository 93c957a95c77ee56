//! Unconstrained view of a bounded problem.
//!
//! Solvers that cannot handle bounds themselves work on internal
//! coordinates; every evaluation maps them back through
//! [`BoundsTransform::to_external`] so that the objective only ever sees
//! values inside the bounds.

use ndarray::Array1;

use crate::error::{Result, SpectraFitError};
use crate::observer::{FitObserver, IterationReport, ObserverAction};
use crate::parameters::{Bounds, BoundsTransform};
use crate::problem::Problem;

/// A problem evaluated in internal (unbounded) coordinates.
pub struct BoundedProblem<'a, P: Problem + ?Sized> {
    inner: &'a P,
    transforms: Vec<BoundsTransform>,
}

impl<'a, P: Problem + ?Sized> BoundedProblem<'a, P> {
    /// # Errors
    ///
    /// `DimensionMismatch` when `bounds` does not have one entry per
    /// parameter.
    pub fn new(inner: &'a P, bounds: &[Bounds]) -> Result<Self> {
        if bounds.len() != inner.parameter_count() {
            return Err(SpectraFitError::DimensionMismatch(format!(
                "{} bounds for {} parameters",
                bounds.len(),
                inner.parameter_count()
            )));
        }
        Ok(Self {
            inner,
            transforms: bounds.iter().copied().map(BoundsTransform::new).collect(),
        })
    }

    pub fn transforms(&self) -> &[BoundsTransform] {
        &self.transforms
    }

    pub fn to_external(&self, internal: &Array1<f64>) -> Array1<f64> {
        to_external(&self.transforms, internal)
    }

    /// # Errors
    ///
    /// `Bounds` when a value lies outside its bounds or is infinite.
    pub fn to_internal(&self, external: &Array1<f64>) -> Result<Array1<f64>> {
        external
            .iter()
            .zip(self.transforms.iter())
            .map(|(x, t)| t.to_internal(*x).map_err(SpectraFitError::from))
            .collect()
    }
}

impl<P: Problem + ?Sized> Problem for BoundedProblem<'_, P> {
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
        self.inner.eval(&self.to_external(params))
    }

    fn parameter_count(&self) -> usize {
        self.inner.parameter_count()
    }

    fn residual_count(&self) -> usize {
        self.inner.residual_count()
    }
}

fn to_external(transforms: &[BoundsTransform], internal: &Array1<f64>) -> Array1<f64> {
    internal
        .iter()
        .zip(transforms.iter())
        .map(|(v, t)| t.to_external(*v))
        .collect()
}

/// Forwards reports to the caller's observer in external coordinates.
pub(crate) struct ExternalObserver<'a, O: FitObserver + ?Sized> {
    inner: &'a mut O,
    transforms: &'a [BoundsTransform],
}

impl<'a, O: FitObserver + ?Sized> ExternalObserver<'a, O> {
    pub(crate) fn new(inner: &'a mut O, transforms: &'a [BoundsTransform]) -> Self {
        Self { inner, transforms }
    }
}

impl<O: FitObserver + ?Sized> FitObserver for ExternalObserver<'_, O> {
    fn on_iteration(&mut self, report: &IterationReport<'_>) -> ObserverAction {
        let external = to_external(self.transforms, report.params);
        self.inner.on_iteration(&IterationReport {
            iteration: report.iteration,
            nfev: report.nfev,
            cost: report.cost,
            params: &external,
        })
    }
}
