//! Goodness of fit, correlations and confidence intervals of complete fits

use approx::assert_relative_eq;
use ndarray::Array1;
use spectrafit_rs::models::peak;
use spectrafit_rs::statistics::ConfidenceSettings;
use spectrafit_rs::{AttributeSpec, FitProject, FitResult, FitTarget, Settings};

use crate::test_helpers::{dataset, pseudovoigt_peak, with_noise};

fn three_peaks(settings: Settings) -> FitResult {
    let x = Array1::linspace(-3.0, 3.0, 577);
    let clean = &(&peak::pseudovoigt(&x, 1.0, -1.5, 0.3, 0.2) + &peak::pseudovoigt(&x, 2.0, 0.0, 0.4, 0.1))
        + &peak::pseudovoigt(&x, 0.7, 1.6, 0.2, 0.3);
    let y = with_noise(&clean, 5e-3, 3);

    let peaks = vec![
        pseudovoigt_peak(1, [0.8, -1.4, 0.25, 0.25]).with_attribute(
            "center",
            AttributeSpec::bounded(-1.4, -2.0, -1.0),
        ),
        pseudovoigt_peak(2, [1.8, 0.1, 0.3, 0.15]),
        pseudovoigt_peak(3, [0.6, 1.5, 0.25, 0.25]).with_attribute(
            "center",
            AttributeSpec::bounded(1.5, 1.0, 2.0),
        ),
    ];
    FitProject::new(peaks, FitTarget::Single(dataset(x, y)))
        .with_settings(settings)
        .fit()
        .unwrap()
}

#[test]
fn test_degrees_of_freedom_and_criteria() {
    let result = three_peaks(Settings::default());
    let goodness = &result.statistics.goodness;
    assert_eq!(goodness.n_data_points, 577);
    assert_eq!(goodness.n_variables, 12);
    assert_eq!(goodness.degrees_of_freedom, 565);
    assert_relative_eq!(goodness.reduced_chi_square, goodness.chi_square / 565.0);
    // noise of 5e-3 gives a reduced chi-square near its variance
    assert!(goodness.reduced_chi_square < 1e-4);
    assert!(goodness.bayesian_information > goodness.akaike_information);
}

#[test]
fn test_parameter_correlation_is_symmetric() {
    let result = three_peaks(Settings::default());
    let corr = &result.statistics.correlation;
    assert_eq!(corr.len(), 12);
    for a in &corr.names {
        assert_eq!(corr.get(a, a), Some(1.0));
        for b in &corr.names {
            let (ab, ba) = (corr.get(a, b).unwrap(), corr.get(b, a).unwrap());
            assert_relative_eq!(ab, ba, epsilon = 1e-12);
            assert!((-1.0..=1.0).contains(&ab));
        }
    }
}

#[test]
fn test_linear_correlation_over_columns() {
    let result = three_peaks(Settings::default());
    let corr = &result.statistics.linear_correlation;
    assert_relative_eq!(corr.get("intensity", "intensity").unwrap(), 1.0, epsilon = 1e-12);
    assert!(corr.get("fit", "intensity").unwrap() > 0.99);
    assert!(corr.get("pseudovoigt_2", "fit").is_some());
}

#[test]
fn test_descriptive_statistics_of_inputs() {
    let result = three_peaks(Settings::default());
    let energy = &result.statistics.data["energy"];
    assert_eq!(energy.count, 577);
    assert_relative_eq!(energy.mean, 0.0, epsilon = 1e-12);
    assert_relative_eq!(energy.min, -3.0);
    assert_relative_eq!(energy.max, 3.0);
    assert_relative_eq!(energy.deciles[4], 0.0, epsilon = 1e-12);
}

#[test]
fn test_confidence_intervals_bracket_the_best_values() {
    let settings = Settings::default()
        .with_confidence_interval(Some(ConfidenceSettings::default().with_probabilities(vec![0.6827, 0.9545])));
    let result = three_peaks(settings);
    let ci = result.statistics.confidence.as_ref().unwrap();
    assert_eq!(ci.parameters.len(), 12);
    assert!(ci.trace.is_none());

    let amplitude = result.parameter("pseudovoigt_amplitude_2").unwrap();
    let levels = ci.get("pseudovoigt_amplitude_2").unwrap();
    assert!(levels[0].lower < amplitude.best_value && amplitude.best_value < levels[0].upper);
    assert!(levels[1].lower < levels[0].lower && levels[0].upper < levels[1].upper);
    // one sigma profile width matches the linearized standard error
    assert_relative_eq!(
        0.5 * (levels[0].upper - levels[0].lower),
        amplitude.error_absolute,
        max_relative = 0.2
    );
}
