//! Background families: exponential decay, power law, straight line,
//! constant and low-order polynomials.

use ndarray::Array1;

/// `amplitude * exp(-x / decay)`
pub fn exponential(x: &Array1<f64>, amplitude: f64, decay: f64) -> Array1<f64> {
    x.mapv(|xi| amplitude * (-xi / decay).exp())
}

/// `amplitude * x^exponent`
pub fn power(x: &Array1<f64>, amplitude: f64, exponent: f64) -> Array1<f64> {
    x.mapv(|xi| amplitude * xi.powf(exponent))
}

/// `slope * x + intercept`
pub fn linear(x: &Array1<f64>, slope: f64, intercept: f64) -> Array1<f64> {
    x.mapv(|xi| slope * xi + intercept)
}

/// Flat offset of height `amplitude`.
pub fn constant(x: &Array1<f64>, amplitude: f64) -> Array1<f64> {
    Array1::from_elem(x.len(), amplitude)
}

/// Polynomial with coefficients in ascending order, evaluated by Horner's rule.
pub fn polynomial(x: &Array1<f64>, coefficients: &[f64]) -> Array1<f64> {
    x.mapv(|xi| coefficients.iter().rev().fold(0.0, |acc, c| acc * xi + c))
}
