//! Parameter and component correlation matrices.

use ndarray::{Array1, Array2};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::parameters::ParameterGraph;

/// Square correlation matrix with named rows and columns.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    pub names: Vec<String>,
    pub values: Array2<f64>,
}

impl CorrelationMatrix {
    pub fn get(&self, row: &str, column: &str) -> Option<f64> {
        let i = self.names.iter().position(|n| n == row)?;
        let j = self.names.iter().position(|n| n == column)?;
        Some(self.values[[i, j]])
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Serialized as `{row: {column: value}}`, NaN as null.
impl Serialize for CorrelationMatrix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        struct Row<'a>(&'a [String], ndarray::ArrayView1<'a, f64>);

        impl Serialize for Row<'_> {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                let mut map = serializer.serialize_map(Some(self.0.len()))?;
                for (name, value) in self.0.iter().zip(self.1.iter()) {
                    map.serialize_entry(name, value)?;
                }
                map.end()
            }
        }

        let mut map = serializer.serialize_map(Some(self.names.len()))?;
        for (i, name) in self.names.iter().enumerate() {
            map.serialize_entry(name, &Row(&self.names, self.values.row(i)))?;
        }
        map.end()
    }
}

/// Correlation between all free parameters (varying and fixed).
///
/// Entries involving a fixed parameter, a zero variance or a missing
/// covariance are NaN; varying parameters get a unit diagonal.
pub fn parameter_correlation(graph: &ParameterGraph, covariance: Option<&Array2<f64>>) -> CorrelationMatrix {
    let free: Vec<usize> = (0..graph.len())
        .filter(|&i| !graph.parameters()[i].is_derived())
        .collect();
    let coordinate = |i: usize| graph.varying_indices().iter().position(|&v| v == i);

    let n = free.len();
    let mut values = Array2::from_elem((n, n), f64::NAN);
    if let Some(covar) = covariance {
        for (a, &i) in free.iter().enumerate() {
            for (b, &j) in free.iter().enumerate() {
                let (Some(p), Some(q)) = (coordinate(i), coordinate(j)) else {
                    continue;
                };
                let denom = (covar[[p, p]] * covar[[q, q]]).sqrt();
                values[[a, b]] = if p == q && denom > 0.0 {
                    1.0
                } else if denom > 0.0 {
                    (covar[[p, q]] / denom).clamp(-1.0, 1.0)
                } else {
                    f64::NAN
                };
            }
        }
    }

    CorrelationMatrix {
        names: free.iter().map(|&i| graph.parameters()[i].name.clone()).collect(),
        values,
    }
}

/// Pearson correlation between named columns. Constant columns and
/// columns of different lengths give NaN.
pub fn linear_correlation(columns: &[(String, Array1<f64>)]) -> CorrelationMatrix {
    let n = columns.len();
    let mut values = Array2::from_elem((n, n), f64::NAN);
    for a in 0..n {
        for b in a..n {
            let r = pearson(&columns[a].1, &columns[b].1);
            values[[a, b]] = r;
            values[[b, a]] = r;
        }
    }
    CorrelationMatrix {
        names: columns.iter().map(|(name, _)| name.clone()).collect(),
        values,
    }
}

/// Pearson correlation over the positions where both values are finite.
pub fn pearson(x: &Array1<f64>, y: &Array1<f64>) -> f64 {
    if x.len() != y.len() {
        return f64::NAN;
    }
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y.iter())
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(&a, &b)| (a, b))
        .collect();
    if pairs.len() < 2 {
        return f64::NAN;
    }

    let m = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / m;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / m;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in &pairs {
        let dx = a - mean_x;
        let dy = b - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return f64::NAN;
    }
    (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0)
}
