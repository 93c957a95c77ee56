//! Convergence criteria for the least-squares iteration.

use ndarray::Array1;

use crate::minimizer::TerminationReason;

/// Possible convergence states of the iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceStatus {
    /// The algorithm is still running.
    Running,

    /// Converged due to a small parameter change.
    ParameterConvergence,

    /// Converged due to a small relative reduction of the sum of squares.
    FunctionValueConvergence,

    /// Residuals are orthogonal to the Jacobian columns.
    GradientConvergence,

    /// Damping saturated without finding a descent step.
    Stalled,

    /// The evaluation budget was spent.
    MaxEvaluationsReached,

    /// The observer asked to stop.
    UserAbort,
}

impl ConvergenceStatus {
    /// Returns true if the optimization has terminated.
    pub fn is_terminated(&self) -> bool {
        !matches!(self, ConvergenceStatus::Running)
    }

    /// Returns true if the optimization has converged.
    pub fn is_converged(&self) -> bool {
        matches!(
            self,
            ConvergenceStatus::ParameterConvergence
                | ConvergenceStatus::FunctionValueConvergence
                | ConvergenceStatus::GradientConvergence
                | ConvergenceStatus::Stalled
        )
    }

    /// Map to the reason reported to callers.
    pub fn termination(&self) -> TerminationReason {
        match self {
            ConvergenceStatus::MaxEvaluationsReached => TerminationReason::MaxEvalsReached,
            ConvergenceStatus::UserAbort => TerminationReason::UserAbort,
            _ => TerminationReason::Converged,
        }
    }

    /// Returns a description of the convergence status.
    pub fn description(&self) -> &'static str {
        match self {
            ConvergenceStatus::Running => "Optimization is still running",
            ConvergenceStatus::ParameterConvergence => "Converged: small parameter change",
            ConvergenceStatus::FunctionValueConvergence => "Converged: small reduction of the sum of squares",
            ConvergenceStatus::GradientConvergence => "Converged: residuals orthogonal to the Jacobian",
            ConvergenceStatus::Stalled => "Converged: no further descent step exists",
            ConvergenceStatus::MaxEvaluationsReached => "Terminated: evaluation budget spent",
            ConvergenceStatus::UserAbort => "Terminated: aborted by observer",
        }
    }
}

/// Tolerances that decide when an accepted step ends the iteration.
#[derive(Debug, Clone)]
pub struct ConvergenceCriteria {
    pub xtol: f64,
    pub ftol: f64,
}

impl Default for ConvergenceCriteria {
    fn default() -> Self {
        Self { xtol: 1e-8, ftol: 1e-8 }
    }
}

impl ConvergenceCriteria {
    pub fn new(xtol: f64, ftol: f64) -> Self {
        Self { xtol, ftol }
    }

    /// Relative size of a step, `max_j |Δx_j| / (|x_j| + xtol)`.
    pub fn relative_step(&self, params: &Array1<f64>, step: &Array1<f64>) -> f64 {
        step.iter()
            .zip(params.iter())
            .map(|(dx, x)| dx.abs() / (x.abs() + self.xtol))
            .fold(0.0, f64::max)
    }

    /// Check an accepted step from `params` to `new_params`.
    pub fn check(&self, params: &Array1<f64>, new_params: &Array1<f64>, cost: f64, new_cost: f64) -> ConvergenceStatus {
        if new_cost == 0.0 {
            return ConvergenceStatus::FunctionValueConvergence;
        }

        let step = new_params - params;
        if self.relative_step(params, &step) < self.xtol {
            return ConvergenceStatus::ParameterConvergence;
        }

        let cost_change = (cost - new_cost).abs() / cost.max(f64::MIN_POSITIVE);
        if cost_change < self.ftol {
            return ConvergenceStatus::FunctionValueConvergence;
        }

        ConvergenceStatus::Running
    }
}
