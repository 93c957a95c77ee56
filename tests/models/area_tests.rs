//! Normalization of the peak shapes

use approx::assert_relative_eq;
use ndarray::Array1;
use spectrafit_rs::models::peak;

use crate::test_helpers::trapezoid;

#[test]
fn test_gaussian_area_equals_amplitude() {
    for &(amplitude, center, fwhm) in &[(1.0, 0.0, 1.0), (3.5, -2.0, 0.2), (0.25, 7.0, 4.0)] {
        let x = Array1::linspace(center - 10.0 * fwhm, center + 10.0 * fwhm, 20001);
        let y = peak::gaussian(&x, amplitude, center, fwhm);
        assert_relative_eq!(trapezoid(&x, &y), amplitude, max_relative = 1e-6);
    }
}

#[test]
fn test_lorentzian_family_areas() {
    let x = Array1::linspace(-2000.0, 2000.0, 400_001);
    let amplitude = 2.0;

    let lorentzian = peak::lorentzian(&x, amplitude, 0.0, 1.0);
    assert_relative_eq!(trapezoid(&x, &lorentzian), amplitude, max_relative = 1e-2);

    let voigt = peak::voigt(&x, amplitude, 0.0, 0.8, 0.6);
    assert_relative_eq!(trapezoid(&x, &voigt), amplitude, max_relative = 1e-2);

    let pseudovoigt = peak::pseudovoigt(&x, amplitude, 0.0, 0.8, 0.6);
    assert_relative_eq!(trapezoid(&x, &pseudovoigt), amplitude, max_relative = 1e-2);
}

#[test]
fn test_gaussian_peak_position() {
    let x = Array1::linspace(-5.0, 5.0, 1001);
    let y = peak::gaussian(&x, 1.0, 1.3, 0.7);
    let argmax = y
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap();
    assert_relative_eq!(x[argmax], 1.3, epsilon = 1e-9);
}
