//! Summary statistics of the input columns.

use ndarray::Array1;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Percentiles reported besides min and max.
pub const DECILES: [f64; 9] = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9];

/// Count, mean, sample standard deviation, extremes and deciles of one
/// column. NaN entries are skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptiveStatistics {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub deciles: [f64; 9],
}

impl DescriptiveStatistics {
    pub fn from_values(values: &Array1<f64>) -> Self {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        sorted.sort_by(f64::total_cmp);
        let count = sorted.len();

        if count == 0 {
            return Self {
                count,
                mean: f64::NAN,
                std: f64::NAN,
                min: f64::NAN,
                max: f64::NAN,
                deciles: [f64::NAN; 9],
            };
        }

        let mean = sorted.iter().sum::<f64>() / count as f64;
        let std = if count > 1 {
            (sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64).sqrt()
        } else {
            f64::NAN
        };

        let mut deciles = [0.0; 9];
        for (slot, &q) in deciles.iter_mut().zip(DECILES.iter()) {
            *slot = quantile_sorted(&sorted, q);
        }

        Self {
            count,
            mean,
            std,
            min: sorted[0],
            max: sorted[count - 1],
            deciles,
        }
    }
}

/// Linear interpolation between closest ranks on sorted data.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let position = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lower = position.floor() as usize;
            let upper = (lower + 1).min(n - 1);
            let fraction = position - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
        }
    }
}

impl Serialize for DescriptiveStatistics {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(5 + DECILES.len()))?;
        map.serialize_entry("count", &self.count)?;
        map.serialize_entry("mean", &self.mean)?;
        map.serialize_entry("std", &self.std)?;
        map.serialize_entry("min", &self.min)?;
        for (q, value) in DECILES.iter().zip(self.deciles.iter()) {
            map.serialize_entry(&format!("{:.0}%", q * 100.0), value)?;
        }
        map.serialize_entry("max", &self.max)?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_summary() {
        let stats = DescriptiveStatistics::from_values(&array![4.0, 1.0, 3.0, 2.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0]);
        assert_eq!(stats.count, 11);
        assert_relative_eq!(stats.mean, 6.0);
        assert_relative_eq!(stats.std, 11.0f64.sqrt(), epsilon = 1e-12);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 11.0);
        assert_relative_eq!(stats.deciles[0], 2.0);
        assert_relative_eq!(stats.deciles[4], 6.0);
        assert_relative_eq!(stats.deciles[8], 10.0);
    }

    #[test]
    fn test_interpolated_deciles() {
        let stats = DescriptiveStatistics::from_values(&array![0.0, 10.0]);
        assert_relative_eq!(stats.deciles[2], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_nan_skipped() {
        let stats = DescriptiveStatistics::from_values(&array![1.0, f64::NAN, 3.0]);
        assert_eq!(stats.count, 2);
        assert_relative_eq!(stats.mean, 2.0);

        let empty = DescriptiveStatistics::from_values(&array![f64::NAN]);
        assert_eq!(empty.count, 0);
        assert!(empty.mean.is_nan());
    }

    #[test]
    fn test_serialized_keys() {
        let stats = DescriptiveStatistics::from_values(&array![1.0, 2.0, 3.0]);
        let value = serde_json::to_value(&stats).unwrap();
        for key in ["count", "mean", "std", "min", "10%", "50%", "90%", "max"] {
            assert!(value.get(key).is_some(), "missing {}", key);
        }
    }
}
