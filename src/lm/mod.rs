//! Levenberg-Marquardt algorithm implementation.
//!
//! The default solver of the crate: a damped Gauss-Newton iteration with a
//! gain-ratio trust region, forward-difference Jacobians and an evaluation
//! budget. Bounds are handled one level up, by the minimizer's internal
//! coordinate transform.

pub mod algorithm;
pub mod config;
pub mod convergence;
pub mod step;
pub mod trust_region;

pub use algorithm::{LevenbergMarquardt, LmResult};
pub use config::LmConfig;
pub use convergence::{ConvergenceCriteria, ConvergenceStatus};
pub use step::{LmStep, StepResult};
pub use trust_region::TrustRegion;
