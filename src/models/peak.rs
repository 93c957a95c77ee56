//! Area-normalized peak shapes.
//!
//! Every profile integrates to `amplitude` over the real line, so amplitudes
//! of different shapes are directly comparable.
//!
//! Widths are given as full widths at half maximum:
//! - `fwhmg`: Gaussian FWHM, `sigma = fwhmg / (2 sqrt(2 ln 2))`
//! - `fwhml`: Lorentzian FWHM, `gamma = fwhml / 2`

use ndarray::Array1;
use std::f64::consts::{LN_2, PI, SQRT_2};

use super::faddeeva::faddeeva_re;
use super::TINY;

/// Convert a Gaussian FWHM to the standard deviation.
pub fn fwhm_to_sigma(fwhmg: f64) -> f64 {
    fwhmg / (2.0 * (2.0 * LN_2).sqrt())
}

/// Gaussian profile at a single point.
#[inline]
pub fn gaussian_point(x: f64, amplitude: f64, center: f64, fwhmg: f64) -> f64 {
    let sigma = fwhm_to_sigma(fwhmg).max(TINY);
    let arg = (x - center) / sigma;
    amplitude / (sigma * (2.0 * PI).sqrt()) * (-0.5 * arg * arg).exp()
}

/// Lorentzian profile at a single point.
#[inline]
pub fn lorentzian_point(x: f64, amplitude: f64, center: f64, fwhml: f64) -> f64 {
    let gamma = (0.5 * fwhml).max(TINY);
    let dx = x - center;
    amplitude / PI * gamma / (dx * dx + gamma * gamma)
}

/// Voigt profile at a single point, the convolution of a Gaussian of FWHM
/// `fwhmg` with a Lorentzian of FWHM `fwhml`.
///
/// Falls back to the pure Lorentzian when the Gaussian width vanishes.
#[inline]
pub fn voigt_point(x: f64, amplitude: f64, center: f64, fwhmg: f64, fwhml: f64) -> f64 {
    let sigma = fwhm_to_sigma(fwhmg);
    if sigma <= TINY {
        return lorentzian_point(x, amplitude, center, fwhml);
    }
    let gamma = 0.5 * fwhml.abs();
    let scale = sigma * SQRT_2;
    amplitude * faddeeva_re((x - center) / scale, gamma / scale) / (sigma * (2.0 * PI).sqrt())
}

/// Total width and Lorentzian fraction of the Thompson-Cox-Hastings
/// pseudo-Voigt approximation.
pub fn pseudovoigt_mixing(fwhmg: f64, fwhml: f64) -> (f64, f64) {
    let g = fwhmg.abs();
    let l = fwhml.abs();
    let f = (g.powi(5)
        + 2.69269 * g.powi(4) * l
        + 2.42843 * g.powi(3) * l.powi(2)
        + 4.47163 * g.powi(2) * l.powi(3)
        + 0.07842 * g * l.powi(4)
        + l.powi(5))
    .powf(0.2)
    .max(TINY);
    let ratio = l / f;
    let eta = 1.36603 * ratio - 0.47719 * ratio.powi(2) + 0.11116 * ratio.powi(3);
    (f, eta)
}

/// Gaussian peak.
///
/// # Arguments
///
/// * `x` - Energy axis
/// * `amplitude` - Integrated area
/// * `center` - Peak position
/// * `fwhmg` - Full width at half maximum
pub fn gaussian(x: &Array1<f64>, amplitude: f64, center: f64, fwhmg: f64) -> Array1<f64> {
    x.mapv(|xi| gaussian_point(xi, amplitude, center, fwhmg))
}

/// Lorentzian (Cauchy) peak.
pub fn lorentzian(x: &Array1<f64>, amplitude: f64, center: f64, fwhml: f64) -> Array1<f64> {
    x.mapv(|xi| lorentzian_point(xi, amplitude, center, fwhml))
}

/// Voigt peak evaluated through the Faddeeva function.
pub fn voigt(x: &Array1<f64>, amplitude: f64, center: f64, fwhmg: f64, fwhml: f64) -> Array1<f64> {
    x.mapv(|xi| voigt_point(xi, amplitude, center, fwhmg, fwhml))
}

/// Pseudo-Voigt peak: `eta * L(f) + (1 - eta) * G(f)` with a shared center
/// and the total width `f` derived from both component widths.
pub fn pseudovoigt(
    x: &Array1<f64>,
    amplitude: f64,
    center: f64,
    fwhmg: f64,
    fwhml: f64,
) -> Array1<f64> {
    let (f, eta) = pseudovoigt_mixing(fwhmg, fwhml);
    x.mapv(|xi| {
        eta * lorentzian_point(xi, amplitude, center, f)
            + (1.0 - eta) * gaussian_point(xi, amplitude, center, f)
    })
}
