//! Step functions rising from 0 to `amplitude` around `center`.

use ndarray::Array1;
use statrs::function::erf::erf;
use std::f64::consts::PI;

use super::TINY;

/// Error-function step: `amplitude * (1 + erf((x - center) / sigma)) / 2`
pub fn erf_step(x: &Array1<f64>, amplitude: f64, center: f64, sigma: f64) -> Array1<f64> {
    let sigma = sigma.max(TINY);
    x.mapv(|xi| amplitude * 0.5 * (1.0 + erf((xi - center) / sigma)))
}

/// Arctangent step: `amplitude * (1/2 + atan((x - center) / sigma) / pi)`
pub fn atan_step(x: &Array1<f64>, amplitude: f64, center: f64, sigma: f64) -> Array1<f64> {
    let sigma = sigma.max(TINY);
    x.mapv(|xi| amplitude * (0.5 + ((xi - center) / sigma).atan() / PI))
}

/// Logistic step: `amplitude * (1 - 1 / (1 + exp((x - center) / sigma)))`
pub fn log_step(x: &Array1<f64>, amplitude: f64, center: f64, sigma: f64) -> Array1<f64> {
    let sigma = sigma.max(TINY);
    x.mapv(|xi| amplitude * (1.0 - 1.0 / (1.0 + ((xi - center) / sigma).exp())))
}

/// Heaviside step, taking the half value exactly at `center`.
pub fn heaviside(x: &Array1<f64>, amplitude: f64, center: f64) -> Array1<f64> {
    x.mapv(|xi| {
        if xi > center {
            amplitude
        } else if xi == center {
            0.5 * amplitude
        } else {
            0.0
        }
    })
}
