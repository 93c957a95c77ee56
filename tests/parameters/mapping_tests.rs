//! Building projects from nested mappings

use serde_json::json;
use spectrafit_rs::error::SpectraFitError;
use spectrafit_rs::{FitProject, FitTarget, Method, NanPolicy};

use crate::test_helpers::dataset;

fn target() -> FitTarget {
    let x = ndarray::Array1::linspace(0.0, 1.0, 11);
    FitTarget::Single(dataset(x.clone(), x))
}

#[test]
fn test_peaks_are_ordered_numerically() {
    let mapping = json!({
        "fitting": {"peaks": {
            "10": {"Lorentzian": {"Amplitude": {"value": 1.0}}},
            "2": {"gaussian": {"center": {"value": 0.5, "min": 0.0, "max": 1.0}}}
        }}
    });
    let project = FitProject::from_mapping(&mapping, target()).unwrap();
    let indices: Vec<usize> = project.peaks.iter().map(|p| p.index).collect();
    assert_eq!(indices, vec![2, 10]);
    assert_eq!(project.peaks[1].model, "lorentzian");
    assert!(project.peaks[1].attributes.contains_key("amplitude"));

    let objective = project.objective().unwrap();
    assert_eq!(
        objective.graph().varying_names(),
        vec!["gaussian_center_2", "lorentzian_amplitude_10"]
    );
}

#[test]
fn test_settings_are_read() {
    let mapping = json!({
        "settings": {
            "method": "Nelder_Mead",
            "nan_policy": "omit",
            "seed": 7,
            "confidence_interval": {"probabilities": [0.9], "trace": true}
        },
        "fitting": {"peaks": {"1": {"constant": {"amplitude": {"value": 0.0}}}}}
    });
    let project = FitProject::from_mapping(&mapping, target()).unwrap();
    assert_eq!(project.settings.method, Method::NelderMead);
    assert_eq!(project.settings.nan_policy, NanPolicy::Omit);
    assert_eq!(project.settings.seed, Some(7));

    let ci = project.settings.confidence_interval.as_ref().unwrap();
    assert_eq!(ci.probabilities, vec![0.9]);
    assert!(ci.trace);
    assert_eq!(ci.maxiter, 200);
}

#[test]
fn test_mapping_errors() {
    let unknown_model = json!({"fitting": {"peaks": {"1": {"sawtooth": {}}}}});
    assert!(matches!(
        FitProject::from_mapping(&unknown_model, target()).and_then(|p| p.objective()),
        Err(SpectraFitError::UnknownModel(_))
    ));

    let unknown_method = json!({
        "settings": {"method": "gradient_descent"},
        "fitting": {"peaks": {"1": {"constant": {}}}}
    });
    assert!(matches!(
        FitProject::from_mapping(&unknown_method, target()),
        Err(SpectraFitError::UnknownMethod(_))
    ));
}
