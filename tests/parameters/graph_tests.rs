//! Resolution, cycles and global naming

use approx::assert_relative_eq;
use ndarray::array;
use spectrafit_rs::error::SpectraFitError;
use spectrafit_rs::{AttributeSpec, ParameterGraph, PeakSpec};

#[test]
fn test_resolve_matches_substitution_over_a_dag() {
    // a -> b, a -> c, (b, c) -> d
    let peaks = vec![
        PeakSpec::new(1, "gaussian")
            .with_attribute("amplitude", AttributeSpec::value(2.0))
            .with_attribute("center", AttributeSpec::value(0.5))
            .with_attribute("fwhmg", AttributeSpec::value(1.0)),
        PeakSpec::new(2, "gaussian")
            .with_attribute("amplitude", AttributeSpec::expr("gaussian_amplitude_1 * 0.5"))
            .with_attribute("center", AttributeSpec::expr("gaussian_center_1 + 1.5"))
            .with_attribute("fwhmg", AttributeSpec::fixed(0.4)),
        PeakSpec::new(3, "gaussian")
            .with_attribute(
                "amplitude",
                AttributeSpec::expr("(gaussian_amplitude_2 + gaussian_center_2) / gaussian_fwhmg_2"),
            )
            .with_attribute("center", AttributeSpec::expr("-gaussian_center_1")),
    ];
    let graph = ParameterGraph::build(&peaks).unwrap();
    assert_eq!(
        graph.varying_names(),
        vec!["gaussian_amplitude_1", "gaussian_center_1", "gaussian_fwhmg_1"]
    );

    let (a, c, w) = (3.0, -0.25, 0.8);
    let resolved = graph.resolve(&array![a, c, w]).unwrap();
    assert_relative_eq!(resolved["gaussian_amplitude_2"], a * 0.5);
    assert_relative_eq!(resolved["gaussian_center_2"], c + 1.5);
    assert_relative_eq!(resolved["gaussian_amplitude_3"], (a * 0.5 + c + 1.5) / 0.4);
    assert_relative_eq!(resolved["gaussian_center_3"], -c);
    assert_relative_eq!(resolved["gaussian_fwhmg_2"], 0.4);
}

#[test]
fn test_self_reference_is_a_cycle() {
    let peaks = vec![PeakSpec::new(1, "lorentzian")
        .with_attribute("amplitude", AttributeSpec::expr("lorentzian_amplitude_1 + 1"))];
    assert!(matches!(
        ParameterGraph::build(&peaks),
        Err(SpectraFitError::CyclicExpression(_))
    ));
}

#[test]
fn test_mutual_reference_is_a_cycle() {
    let peaks = vec![
        PeakSpec::new(1, "lorentzian").with_attribute("center", AttributeSpec::expr("lorentzian_center_2")),
        PeakSpec::new(2, "lorentzian").with_attribute("center", AttributeSpec::expr("lorentzian_center_1 * 2")),
    ];
    match ParameterGraph::build(&peaks) {
        Err(SpectraFitError::CyclicExpression(names)) => {
            assert!(names.iter().any(|n| n == "lorentzian_center_1"));
            assert!(names.iter().any(|n| n == "lorentzian_center_2"));
        }
        other => panic!("expected a cycle, got {:?}", other.map(|g| g.len())),
    }
}

#[test]
fn test_validation_errors() {
    let unknown = vec![PeakSpec::new(1, "sawtooth")];
    assert!(matches!(
        ParameterGraph::build(&unknown),
        Err(SpectraFitError::UnknownModel(_))
    ));

    let bad_bounds = vec![PeakSpec::new(1, "gaussian").with_attribute("amplitude", AttributeSpec::bounded(5.0, 0.0, 1.0))];
    assert!(matches!(
        ParameterGraph::build(&bad_bounds),
        Err(SpectraFitError::InvalidBounds { .. })
    ));

    let undefined =
        vec![PeakSpec::new(1, "gaussian").with_attribute("center", AttributeSpec::expr("gaussian_center_9"))];
    assert!(matches!(
        ParameterGraph::build(&undefined),
        Err(SpectraFitError::UndefinedReference { .. })
    ));
}

#[test]
fn test_global_expressions_follow_the_dataset() {
    let peaks = vec![
        PeakSpec::new(1, "gaussian")
            .with_attribute("amplitude", AttributeSpec::value(1.0))
            .with_attribute("center", AttributeSpec::value(0.0).shared()),
        PeakSpec::new(2, "gaussian").with_attribute("amplitude", AttributeSpec::expr("gaussian_amplitude_1 / 2")),
    ];
    let graph = ParameterGraph::build_global(&peaks, 2).unwrap();
    assert_eq!(
        graph.varying_names(),
        vec!["gaussian_amplitude_1_1", "gaussian_amplitude_1_2", "gaussian_center_1"]
    );

    let resolved = graph.resolve(&array![4.0, 6.0, 0.0]).unwrap();
    assert_relative_eq!(resolved["gaussian_amplitude_2_1"], 2.0);
    assert_relative_eq!(resolved["gaussian_amplitude_2_2"], 3.0);
}
