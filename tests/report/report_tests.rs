//! Report layout and float round-trips

use ndarray::Array1;
use serde_json::Value;
use spectrafit_rs::models::peak;
use spectrafit_rs::statistics::ConfidenceSettings;
use spectrafit_rs::{AttributeSpec, FitProject, FitTarget, PeakSpec, Settings, VERSION};

use crate::test_helpers::{dataset, with_noise};

fn project(settings: Settings) -> FitProject {
    let x = Array1::linspace(-1.0, 1.0, 201);
    let y = with_noise(&peak::lorentzian(&x, 0.7, 0.1, 0.3), 1e-3, 11);
    let peaks = vec![
        PeakSpec::new(1, "lorentzian")
            .with_attribute("amplitude", AttributeSpec::bounded(0.5, 0.0, 2.0))
            .with_attribute("center", AttributeSpec::value(0.0))
            .with_attribute("fwhml", AttributeSpec::bounded(0.2, 0.01, 1.0)),
        PeakSpec::new(2, "constant").with_attribute("amplitude", AttributeSpec::fixed(0.0)),
    ];
    FitProject::new(peaks, FitTarget::Single(dataset(x, y))).with_settings(settings)
}

#[test]
fn test_best_values_round_trip_bit_for_bit() {
    let project = project(Settings::default());
    let result = project.fit().unwrap();
    let text = project.report(&result).to_json().unwrap();
    let parsed: Value = serde_json::from_str(&text).unwrap();

    for estimate in &result.parameters {
        let written = parsed["fit_insights"]["variables"][&estimate.name]["best_value"]
            .as_f64()
            .unwrap();
        assert_eq!(written.to_bits(), estimate.best_value.to_bits(), "{}", estimate.name);
    }

    let fit: Vec<f64> = serde_json::from_value(parsed["fit_result"]["fit"].clone()).unwrap();
    let expected = &result.datasets[0].fit;
    assert!(fit.iter().zip(expected.iter()).all(|(a, b)| a.to_bits() == b.to_bits()));
}

#[test]
fn test_report_layout() {
    let project = project(Settings::default());
    let result = project.fit().unwrap();
    let value = project.report(&result).to_value().unwrap();

    assert_eq!(value["version"], VERSION);
    assert_eq!(value["settings"]["method"], "leastsq");
    assert!(value["data_statistic"]["intensity"]["50%"].is_number());

    let config = &value["fit_insights"]["configurations"];
    assert_eq!(config["mode"], "local");
    assert_eq!(config["termination_reason"], "converged");
    assert_eq!(config["n_data_points"], 201);
    assert_eq!(config["n_variables"], 3);
    assert_eq!(config["degrees_of_freedom"], 198);

    // fixed parameters have no error
    let constant = &value["fit_insights"]["variables"]["constant_amplitude_2"];
    assert!(constant["error_absolute"].is_null());
    assert!(value["fit_insights"]["correlations"]["constant_amplitude_2"]["lorentzian_center_1"].is_null());

    let columns = value["fit_result"].as_object().unwrap();
    for key in ["energy", "intensity", "residual", "fit", "lorentzian_1", "constant_2"] {
        assert!(columns.contains_key(key), "missing column {}", key);
    }
    assert!(value.get("confidence_trace").is_none());
}

#[test]
fn test_confidence_interval_section() {
    let ci = ConfidenceSettings::default()
        .with_probabilities(vec![0.6827])
        .with_trace(true);
    let project = project(Settings::default().with_confidence_interval(Some(ci)));
    let result = project.fit().unwrap();
    let value = project.report(&result).to_value().unwrap();

    let center = value["confidence_interval"]["lorentzian_center_1"].as_array().unwrap();
    assert_eq!(center.len(), 1);
    assert_eq!(center[0]["probability"], 0.6827);
    assert!(center[0]["lower"].as_f64().unwrap() < center[0]["upper"].as_f64().unwrap());

    let trace = &value["confidence_trace"]["lorentzian_center_1"];
    let probability = trace["probability"].as_array().unwrap();
    assert!(!probability.is_empty());
    assert_eq!(
        trace["columns"]["lorentzian_amplitude_1"].as_array().unwrap().len(),
        probability.len()
    );
}
