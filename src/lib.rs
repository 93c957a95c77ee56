//! # spectrafit-rs
//!
//! `spectrafit-rs` fits sums of analytic line shapes to 1-D intensity versus
//! energy spectra, one at a time or several spectra globally with shared
//! parameters, and reports the fit together with its statistics.
//!
//! The library provides:
//! - A closed registry of peak, step, background and Mössbauer line shapes
//! - A parameter graph with bounds, fixed values and derived expressions
//! - Levenberg-Marquardt, Nelder-Mead, differential evolution, basin hopping
//!   and an ensemble MCMC sampler behind one [`Minimizer`]
//! - Goodness of fit, correlations and profile confidence intervals
//! - A versioned JSON [`FitReport`]
//!
//! ## Basic Usage
//!
//! ```rust
//! use ndarray::Array1;
//! use spectrafit_rs::{AttributeSpec, Dataset, FitProject, FitTarget, PeakSpec};
//!
//! let x = Array1::linspace(-1.0, 1.0, 201);
//! let y = spectrafit_rs::models::peak::gaussian(&x, 2.0, 0.1, 0.4);
//!
//! let peaks = vec![PeakSpec::new(1, "gaussian")
//!     .with_attribute("amplitude", AttributeSpec::bounded(1.0, 0.0, 10.0))
//!     .with_attribute("center", AttributeSpec::value(0.0))
//!     .with_attribute("fwhmg", AttributeSpec::bounded(0.3, 0.01, 2.0))];
//!
//! let project = FitProject::new(peaks, FitTarget::Single(Dataset::new(x, y).unwrap()));
//! let result = project.fit().unwrap();
//! assert!(result.minimizer.success());
//! assert!((result.parameter("gaussian_amplitude_1").unwrap().best_value - 2.0).abs() < 1e-6);
//!
//! let json = project.report(&result).to_json().unwrap();
//! assert!(json.contains("fit_insights"));
//! ```

pub mod error;

// Parameter system
pub mod parameters;

pub mod models;
pub mod objective;
pub mod observer;
pub mod problem;

// Solvers
pub mod global_opt;
pub mod lm;
pub mod minimizer;

pub mod aggregate;
pub mod project;
pub mod report;
pub mod statistics;

pub(crate) mod utils;

// Re-exports for convenience
pub use aggregate::{DatasetFit, FitMode, FitResult, ParameterEstimate};
pub use error::{Result, SpectraFitError};
pub use minimizer::{minimize, Method, Minimizer, MinimizerResult, TerminationReason};
pub use models::ModelKind;
pub use objective::{CompositeObjective, Dataset, NanPolicy};
pub use observer::{FitObserver, IterationReport, ObserverAction};
pub use parameters::{AttributeSpec, ParameterGraph, PeakSpec};
pub use problem::Problem;
pub use project::{FitProject, FitTarget, Settings};
pub use report::FitReport;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
