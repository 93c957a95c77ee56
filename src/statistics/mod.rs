//! Post-fit statistics.
//!
//! - [`descriptive`]: summary of the raw input columns
//! - [`goodness`]: χ², reduced χ², AIC and BIC
//! - [`correlation`]: parameter correlation from the covariance and Pearson
//!   correlation between result columns
//! - [`confidence`]: F-test profile confidence intervals

pub mod confidence;
pub mod correlation;
pub mod descriptive;
pub mod goodness;

pub use confidence::{confidence_intervals, ConfidenceIntervals, ConfidenceLevel, ConfidenceSettings, ProfileTrace};
pub use correlation::{linear_correlation, parameter_correlation, pearson, CorrelationMatrix};
pub use descriptive::DescriptiveStatistics;
pub use goodness::GoodnessOfFit;

use std::collections::BTreeMap;

/// Everything computed after the optimizer returned.
#[derive(Debug, Clone)]
pub struct StatisticsBlock {
    /// Per input column.
    pub data: BTreeMap<String, DescriptiveStatistics>,
    pub goodness: GoodnessOfFit,
    pub correlation: CorrelationMatrix,
    pub linear_correlation: CorrelationMatrix,
    pub confidence: Option<ConfidenceIntervals>,
}
