//! Amplitude behaviour of every registered family

use approx::assert_relative_eq;
use ndarray::Array1;
use spectrafit_rs::error::SpectraFitError;
use spectrafit_rs::models::{self, ModelKind};
use std::collections::HashMap;

fn with_amplitude(kind: ModelKind, amplitude: f64) -> Vec<f64> {
    let mut values = kind.defaults();
    values[kind.attribute_index("amplitude").unwrap()] = amplitude;
    values
}

#[test]
fn test_zero_amplitude_gives_zeros() {
    let x = Array1::linspace(0.5, 5.0, 50);
    for kind in ModelKind::ALL.iter().filter(|k| k.has_amplitude()) {
        let y = kind.evaluate(&x, &with_amplitude(*kind, 0.0));
        assert!(y.iter().all(|v| *v == 0.0), "{} is not zero", kind);
    }
}

#[test]
fn test_amplitude_scales_linearly() {
    let x = Array1::linspace(0.5, 5.0, 50);
    for kind in ModelKind::ALL.iter().filter(|k| k.has_amplitude()) {
        let single = kind.evaluate(&x, &with_amplitude(*kind, 1.0));
        let scaled = kind.evaluate(&x, &with_amplitude(*kind, 3.0));
        for (a, b) in single.iter().zip(scaled.iter()) {
            assert_relative_eq!(*b, 3.0 * a, max_relative = 1e-12, epsilon = 1e-300);
        }
    }
}

#[test]
fn test_tags_are_case_insensitive() {
    assert_eq!(ModelKind::from_tag("PseudoVoigt").unwrap(), ModelKind::PseudoVoigt);
    assert!(matches!(
        ModelKind::from_tag("sawtooth"),
        Err(SpectraFitError::UnknownModel(_))
    ));
}

#[test]
fn test_unknown_attribute() {
    let x = Array1::linspace(-1.0, 1.0, 5);
    let attributes: HashMap<String, f64> = [("sigma".to_string(), 1.0)].into_iter().collect();
    assert!(matches!(
        models::evaluate("gaussian", &x, &attributes),
        Err(SpectraFitError::UnknownAttribute { .. })
    ));
}
