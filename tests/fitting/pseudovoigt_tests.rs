//! Recovery of pseudo-Voigt peaks

use approx::assert_relative_eq;
use ndarray::Array1;
use spectrafit_rs::models::peak;
use spectrafit_rs::{
    AttributeSpec, FitProject, FitTarget, IterationReport, NanPolicy, ObserverAction, Settings, TerminationReason,
};

use crate::test_helpers::{dataset, pseudovoigt_peak, with_noise};

const TRUTH: [f64; 4] = [1.2, 0.05, 0.25, 0.15];

fn axis() -> Array1<f64> {
    Array1::linspace(-1.0, 1.0, 2001)
}

#[test]
fn test_pseudovoigt_recovery() {
    let x = axis();
    let clean = peak::pseudovoigt(&x, TRUTH[0], TRUTH[1], TRUTH[2], TRUTH[3]);
    let y = with_noise(&clean, 1e-4, 42);

    let project = FitProject::new(
        vec![pseudovoigt_peak(1, [1.0, 0.0, 0.2, 0.2])],
        FitTarget::Single(dataset(x, y)),
    );
    let result = project.fit().unwrap();

    assert_eq!(result.minimizer.termination, TerminationReason::Converged);
    let names = ["amplitude", "center", "fwhmg", "fwhml"];
    for (name, truth) in names.iter().zip(TRUTH.iter()) {
        let estimate = result.parameter(&format!("pseudovoigt_{}_1", name)).unwrap();
        assert_relative_eq!(estimate.best_value, *truth, max_relative = 1e-2);
        assert!(estimate.error_absolute.is_finite());
    }
    assert_eq!(result.statistics.goodness.degrees_of_freedom, 2001 - 4);
}

#[test]
fn test_derived_amplitude_holds_at_every_iterate() {
    let x = axis();
    let y = &peak::pseudovoigt(&x, 0.9, -0.3, 0.2, 0.1) + &peak::pseudovoigt(&x, 0.3, 0.4, 0.2, 0.1);

    let peaks = vec![
        pseudovoigt_peak(1, [0.6, -0.25, 0.15, 0.15]),
        pseudovoigt_peak(2, [0.2, 0.35, 0.15, 0.15])
            .with_attribute("amplitude", AttributeSpec::expr("pseudovoigt_amplitude_1 / 3")),
    ];
    let project = FitProject::new(peaks, FitTarget::Single(dataset(x, y)));
    let graph = project.objective().unwrap().graph().clone();

    let mut iterations = 0;
    let mut worst = 0.0f64;
    let mut check = |report: &IterationReport<'_>| {
        let values = graph.resolve(report.params).unwrap();
        let expected = values["pseudovoigt_amplitude_1"] / 3.0;
        worst = worst.max((values["pseudovoigt_amplitude_2"] - expected).abs());
        iterations += 1;
        ObserverAction::Continue
    };
    let result = project.fit_with_observer(&mut check).unwrap();

    assert!(iterations > 0);
    assert!(worst <= 1e-12);
    let a1 = result.parameter("pseudovoigt_amplitude_1").unwrap().best_value;
    let a2 = result.parameter("pseudovoigt_amplitude_2").unwrap();
    assert_relative_eq!(a2.best_value, a1 / 3.0, max_relative = 1e-12);
    assert!(!a2.vary);
    assert!(a2.expr.as_deref().unwrap().contains("pseudovoigt_amplitude_1"));
}

#[test]
fn test_observer_abort() {
    let x = axis();
    let y = peak::pseudovoigt(&x, TRUTH[0], TRUTH[1], TRUTH[2], TRUTH[3]);
    let project = FitProject::new(
        vec![pseudovoigt_peak(1, [1.0, 0.0, 0.2, 0.2])],
        FitTarget::Single(dataset(x, y)),
    );
    let mut stop = |_: &IterationReport<'_>| ObserverAction::Abort;
    let result = project.fit_with_observer(&mut stop).unwrap();
    assert_eq!(result.minimizer.termination, TerminationReason::UserAbort);
}

#[test]
fn test_omit_policy_drops_missing_samples() {
    let x = axis();
    let mut y = peak::pseudovoigt(&x, TRUTH[0], TRUTH[1], TRUTH[2], TRUTH[3]);
    y[10] = f64::NAN;
    y[1500] = f64::INFINITY;

    let peaks = vec![pseudovoigt_peak(1, [1.0, 0.0, 0.2, 0.2])];
    let raise = FitProject::new(peaks.clone(), FitTarget::Single(dataset(x.clone(), y.clone())));
    assert!(raise.fit().is_err());

    let omit = FitProject::new(peaks, FitTarget::Single(dataset(x, y)))
        .with_settings(Settings::default().with_nan_policy(NanPolicy::Omit));
    let result = omit.fit().unwrap();
    assert_eq!(result.minimizer.ndata(), 1999);
    assert_relative_eq!(
        result.parameter("pseudovoigt_center_1").unwrap().best_value,
        TRUTH[1],
        max_relative = 1e-6
    );
}

#[test]
fn test_narrow_peak_started_at_truth() {
    let x = axis();
    let y = peak::pseudovoigt(&x, 1.0, 0.0, 0.03, 0.02);
    let peak = spectrafit_rs::PeakSpec::new(1, "pseudovoigt")
        .with_attribute("amplitude", AttributeSpec::bounded(1.0, 0.0, 2.0))
        .with_attribute("center", AttributeSpec::bounded(0.0, -2.0, 2.0))
        .with_attribute("fwhmg", AttributeSpec::bounded(0.03, 0.02, 0.4))
        .with_attribute("fwhml", AttributeSpec::bounded(0.02, 0.01, 0.4));

    let result = FitProject::new(vec![peak], FitTarget::Single(dataset(x, y)))
        .fit()
        .unwrap();
    assert_eq!(result.minimizer.termination, TerminationReason::Converged);
    for (name, truth) in [("amplitude", 1.0), ("fwhmg", 0.03), ("fwhml", 0.02)] {
        let best = result.parameter(&format!("pseudovoigt_{}_1", name)).unwrap().best_value;
        assert_relative_eq!(best, truth, max_relative = 1e-2);
    }
    let center = result.parameter("pseudovoigt_center_1").unwrap().best_value;
    assert!(center.abs() < 1e-4);
}
