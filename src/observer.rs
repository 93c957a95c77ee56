//! Per-iteration progress reporting.
//!
//! Solvers hand an [`IterationReport`] to a caller-supplied [`FitObserver`]
//! once per iteration. Returning [`ObserverAction::Abort`] stops the solver,
//! which then finishes with `TerminationReason::UserAbort`.

use ndarray::Array1;

/// Snapshot of solver progress after one iteration.
#[derive(Debug, Clone)]
pub struct IterationReport<'a> {
    pub iteration: usize,
    /// Objective evaluations spent so far.
    pub nfev: usize,
    /// Sum of squared residuals (or negative log-likelihood scale for samplers)
    /// at the current point.
    pub cost: f64,
    /// Current varying-parameter values in external coordinates.
    pub params: &'a Array1<f64>,
}

/// What the solver should do after reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverAction {
    Continue,
    Abort,
}

/// Receives progress from the solvers.
pub trait FitObserver {
    fn on_iteration(&mut self, report: &IterationReport<'_>) -> ObserverAction;
}

/// Observer that ignores every report.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl FitObserver for NoopObserver {
    fn on_iteration(&mut self, _report: &IterationReport<'_>) -> ObserverAction {
        ObserverAction::Continue
    }
}

impl<F> FitObserver for F
where
    F: FnMut(&IterationReport<'_>) -> ObserverAction,
{
    fn on_iteration(&mut self, report: &IterationReport<'_>) -> ObserverAction {
        self(report)
    }
}
