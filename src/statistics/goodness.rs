//! Chi-square family and information criteria.

use ndarray::Array1;
use serde::Serialize;

/// Floor for χ² inside the logarithm of the information criteria.
const CHISQR_FLOOR: f64 = 1e-250;

/// Goodness of fit of one residual vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GoodnessOfFit {
    pub chi_square: f64,
    /// NaN when there are no degrees of freedom.
    pub reduced_chi_square: f64,
    pub akaike_information: f64,
    pub bayesian_information: f64,
    #[serde(skip)]
    pub n_data_points: usize,
    #[serde(skip)]
    pub n_variables: usize,
    #[serde(skip)]
    pub degrees_of_freedom: usize,
}

impl GoodnessOfFit {
    /// Statistics for `residual` with `nvarys` varying parameters.
    pub fn new(residual: &Array1<f64>, nvarys: usize) -> Self {
        let chi_square = residual.iter().map(|r| r * r).sum::<f64>();
        Self::from_chisqr(chi_square, residual.len(), nvarys)
    }

    pub fn from_chisqr(chi_square: f64, ndata: usize, nvarys: usize) -> Self {
        let dof = ndata.saturating_sub(nvarys);
        let reduced_chi_square = if dof == 0 {
            f64::NAN
        } else {
            chi_square / dof as f64
        };

        let n = ndata as f64;
        let k = nvarys as f64;
        let neg2_log_likelihood = n * (chi_square.max(CHISQR_FLOOR) / n).ln();

        Self {
            chi_square,
            reduced_chi_square,
            akaike_information: neg2_log_likelihood + 2.0 * k,
            bayesian_information: neg2_log_likelihood + n.ln() * k,
            n_data_points: ndata,
            n_variables: nvarys,
            degrees_of_freedom: dof,
        }
    }
}
