//! Global fits over several spectra

use approx::assert_relative_eq;
use ndarray::{array, Array1};
use spectrafit_rs::aggregate::split_at_boundaries;
use spectrafit_rs::models::peak;
use spectrafit_rs::{
    AttributeSpec, CompositeObjective, FitMode, FitProject, FitTarget, NanPolicy, ParameterGraph, PeakSpec, Problem,
};

use crate::test_helpers::dataset;

fn peaks() -> Vec<PeakSpec> {
    vec![PeakSpec::new(1, "gaussian")
        .with_attribute("amplitude", AttributeSpec::bounded(1.0, 0.0, 10.0))
        .with_attribute("center", AttributeSpec::value(0.0).shared())
        .with_attribute("fwhmg", AttributeSpec::fixed(0.4))]
}

#[test]
fn test_split_equals_local_residuals() {
    let x1 = Array1::linspace(-1.0, 1.0, 41);
    let x2 = Array1::linspace(-2.0, 2.0, 57);
    let data = vec![
        dataset(x1.clone(), peak::gaussian(&x1, 1.1, 0.2, 0.4)),
        dataset(x2.clone(), peak::gaussian(&x2, 2.3, 0.2, 0.4)),
    ];

    let global_graph = ParameterGraph::build_global(&peaks(), 2).unwrap();
    assert_eq!(
        global_graph.varying_names(),
        vec!["gaussian_amplitude_1_1", "gaussian_amplitude_1_2", "gaussian_center_1"]
    );
    let global = CompositeObjective::new(global_graph, &data, NanPolicy::Raise).unwrap();
    let params = array![1.5, 2.5, 0.1];
    let residual = global.eval(&params).unwrap();
    assert_eq!(residual.len(), 41 + 57);
    assert_eq!(global.boundaries(), &[0, 41, 98]);

    let parts = split_at_boundaries(&residual, global.boundaries()).unwrap();
    for (d, part) in parts.iter().enumerate() {
        let local_graph = ParameterGraph::build(&peaks()).unwrap();
        let local = CompositeObjective::new(local_graph, &data[d..d + 1], NanPolicy::Raise).unwrap();
        let expected = local.eval(&array![params[d], params[2]]).unwrap();
        assert_eq!(part, &expected);
    }
}

#[test]
fn test_global_fit_shares_center() {
    let x = Array1::linspace(-1.5, 1.5, 301);
    let amplitudes = [0.8, 1.6, 2.4];
    let data: Vec<_> = amplitudes
        .iter()
        .map(|&a| dataset(x.clone(), peak::gaussian(&x, a, -0.15, 0.4)))
        .collect();

    let project = FitProject::new(peaks(), FitTarget::Multiple(data));
    assert_eq!(project.mode(), FitMode::Global { datasets: 3 });
    let result = project.fit().unwrap();

    assert!(result.minimizer.success());
    assert_relative_eq!(
        result.parameter("gaussian_center_1").unwrap().best_value,
        -0.15,
        epsilon = 1e-6
    );
    for (d, truth) in amplitudes.iter().enumerate() {
        let name = format!("gaussian_amplitude_1_{}", d + 1);
        assert_relative_eq!(result.parameter(&name).unwrap().best_value, *truth, max_relative = 1e-6);
    }

    assert_eq!(result.datasets.len(), 3);
    let total: usize = result.split().iter().map(|d| d.residual.len()).sum();
    assert_eq!(total, result.minimizer.residual.len());
    // shared center plus the dataset's own amplitude
    assert_eq!(result.datasets[0].goodness.n_variables, 2);
    assert_eq!(result.statistics.goodness.n_variables, 4);

    let columns: Vec<String> = result.columns().into_iter().map(|(name, _)| name).collect();
    assert_eq!(columns[0], "energy");
    assert!(columns.contains(&"fit_3".to_string()));
    assert!(columns.contains(&"gaussian_1_2".to_string()));
}
