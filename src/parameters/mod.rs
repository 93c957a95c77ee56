//! # Parameter Graph
//!
//! Turns a declarative peak specification into a flat, named, bounded and
//! possibly algebraically linked parameter set.
//!
//! - [`PeakSpec`] and [`AttributeSpec`]: what the caller declares per peak
//! - [`Expression`]: the restricted arithmetic used by derived parameters
//! - [`Bounds`] and [`BoundsTransform`]: box constraints and the internal
//!   coordinates bounded solvers work in
//! - [`ParameterGraph`]: the validated result, resolving every parameter from
//!   the optimizer's varying coordinates
//!
//! ```rust
//! use spectrafit_rs::parameters::{AttributeSpec, ParameterGraph, PeakSpec};
//! use ndarray::array;
//!
//! let peaks = vec![
//!     PeakSpec::new(1, "pseudovoigt")
//!         .with_attribute("amplitude", AttributeSpec::bounded(1.0, 0.0, 2.0))
//!         .with_attribute("center", AttributeSpec::value(0.0)),
//!     PeakSpec::new(2, "pseudovoigt")
//!         .with_attribute("amplitude", AttributeSpec::expr("pseudovoigt_amplitude_1 / 3")),
//! ];
//!
//! let graph = ParameterGraph::build(&peaks).unwrap();
//! assert_eq!(graph.varying_names(), vec!["pseudovoigt_amplitude_1", "pseudovoigt_center_1"]);
//!
//! let values = graph.resolve(&array![1.5, 0.1]).unwrap();
//! assert_eq!(values["pseudovoigt_amplitude_2"], 0.5);
//! ```

pub mod bounds;
pub mod expression;
pub mod graph;
pub mod spec;

pub use bounds::{Bounds, BoundsError, BoundsTransform};
pub use expression::{EvaluationContext, Expression, ExpressionError};
pub use graph::{GraphParameter, ParameterGraph, ParameterOrigin, PeakBinding, Slot};
pub use spec::{peaks_from_mapping, AttributeSpec, PeakSpec};
