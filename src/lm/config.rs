//! Configuration options for the Levenberg-Marquardt algorithm.

/// Configuration options for the Levenberg-Marquardt algorithm.
#[derive(Debug, Clone)]
pub struct LmConfig {
    /// Evaluation budget; `None` means `2000 * (n + 1)`.
    pub max_nfev: Option<usize>,

    /// Relative tolerance for the reduction of the sum of squares. Default: 1e-8
    pub ftol: f64,

    /// Relative tolerance for the parameter change. Default: 1e-8
    pub xtol: f64,

    /// Tolerance for the cosine between residual and Jacobian columns. Default: 0
    pub gtol: f64,

    /// Initial value for the damping parameter. Default: 1e-3
    pub initial_lambda: f64,

    /// Factor by which to increase lambda. Default: 10.0
    pub lambda_up_factor: f64,

    /// Factor by which to decrease lambda. Default: 0.1
    pub lambda_down_factor: f64,

    /// Minimum value for lambda. Default: 1e-12
    pub min_lambda: f64,

    /// Maximum value for lambda. Default: 1e12
    pub max_lambda: f64,

    /// Relative forward-difference step; `None` uses `sqrt(f64::EPSILON)`.
    pub epsfcn: Option<f64>,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            max_nfev: None,
            ftol: 1e-8,
            xtol: 1e-8,
            gtol: 0.0,
            initial_lambda: 1e-3,
            lambda_up_factor: 10.0,
            lambda_down_factor: 0.1,
            min_lambda: 1e-12,
            max_lambda: 1e12,
            epsfcn: None,
        }
    }
}

impl LmConfig {
    /// Default evaluation budget for `n` varying parameters.
    pub fn default_max_nfev(n: usize) -> usize {
        2000 * (n + 1)
    }

    /// Budget in effect for `n` varying parameters.
    pub fn budget(&self, n: usize) -> usize {
        self.max_nfev.unwrap_or_else(|| Self::default_max_nfev(n))
    }
}
