//! Declarative peak specifications as they arrive from the input mapping.
//!
//! ```json
//! {
//!   "1": { "pseudovoigt": { "amplitude": { "value": 1, "min": 0, "max": 2, "vary": true },
//!                           "center":    { "value": 0 } } },
//!   "2": { "pseudovoigt": { "amplitude": { "expr": "pseudovoigt_amplitude_1 / 3" } } }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::{INFINITY, NEG_INFINITY};

use crate::error::{Result, SpectraFitError};

/// How one model attribute is determined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawAttributeSpec", into = "RawAttributeSpec")]
pub enum AttributeSpec {
    /// Optimizer-controlled (or fixed when `vary` is false).
    Free {
        /// Starting value; `None` takes the model default.
        value: Option<f64>,
        min: f64,
        max: f64,
        vary: bool,
        /// One parameter for all datasets in global mode.
        shared: bool,
    },
    /// Computed from other parameters.
    Derived { expr: String, shared: bool },
}

impl AttributeSpec {
    /// Varying, unbounded attribute starting at `value`.
    pub fn value(value: f64) -> Self {
        AttributeSpec::Free {
            value: Some(value),
            min: NEG_INFINITY,
            max: INFINITY,
            vary: true,
            shared: false,
        }
    }

    /// Varying attribute starting at `value` inside `[min, max]`.
    pub fn bounded(value: f64, min: f64, max: f64) -> Self {
        AttributeSpec::Free {
            value: Some(value),
            min,
            max,
            vary: true,
            shared: false,
        }
    }

    /// Attribute held at `value`.
    pub fn fixed(value: f64) -> Self {
        AttributeSpec::Free {
            value: Some(value),
            min: NEG_INFINITY,
            max: INFINITY,
            vary: false,
            shared: false,
        }
    }

    pub fn expr(expr: &str) -> Self {
        AttributeSpec::Derived {
            expr: expr.to_string(),
            shared: false,
        }
    }

    /// Mark the attribute as shared across datasets.
    pub fn shared(self) -> Self {
        match self {
            AttributeSpec::Free {
                value,
                min,
                max,
                vary,
                ..
            } => AttributeSpec::Free {
                value,
                min,
                max,
                vary,
                shared: true,
            },
            AttributeSpec::Derived { expr, .. } => AttributeSpec::Derived { expr, shared: true },
        }
    }

    pub fn is_shared(&self) -> bool {
        match self {
            AttributeSpec::Free { shared, .. } | AttributeSpec::Derived { shared, .. } => *shared,
        }
    }
}

/// Wire shape of an attribute: `value`/`min`/`max`/`vary` or `expr`.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAttributeSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    vary: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    shared: Option<bool>,
}

impl TryFrom<RawAttributeSpec> for AttributeSpec {
    type Error = SpectraFitError;

    fn try_from(raw: RawAttributeSpec) -> Result<Self> {
        let shared = raw.shared.unwrap_or(false);
        match raw.expr {
            Some(expr) => {
                if raw.value.is_some() || raw.min.is_some() || raw.max.is_some() || raw.vary.is_some() {
                    return Err(SpectraFitError::InvalidInput(format!(
                        "attribute with expr '{}' must not also set value, min, max or vary",
                        expr
                    )));
                }
                Ok(AttributeSpec::Derived { expr, shared })
            }
            None => Ok(AttributeSpec::Free {
                value: raw.value,
                min: raw.min.unwrap_or(NEG_INFINITY),
                max: raw.max.unwrap_or(INFINITY),
                vary: raw.vary.unwrap_or(true),
                shared,
            }),
        }
    }
}

impl From<AttributeSpec> for RawAttributeSpec {
    fn from(spec: AttributeSpec) -> Self {
        match spec {
            AttributeSpec::Free {
                value,
                min,
                max,
                vary,
                shared,
            } => RawAttributeSpec {
                value,
                min: min.is_finite().then_some(min),
                max: max.is_finite().then_some(max),
                vary: Some(vary),
                expr: None,
                shared: shared.then_some(true),
            },
            AttributeSpec::Derived { expr, shared } => RawAttributeSpec {
                expr: Some(expr),
                shared: shared.then_some(true),
                ..Default::default()
            },
        }
    }
}

/// One peak: index, model tag and its attribute specifications.
#[derive(Debug, Clone, PartialEq)]
pub struct PeakSpec {
    pub index: usize,
    /// Lower-cased model tag, resolved against the registry at build time.
    pub model: String,
    /// Lower-cased attribute name to specification.
    pub attributes: BTreeMap<String, AttributeSpec>,
}

impl PeakSpec {
    pub fn new(index: usize, model: &str) -> Self {
        Self {
            index,
            model: model.trim().to_lowercase(),
            attributes: BTreeMap::new(),
        }
    }

    /// Add an attribute; the name is normalized to lower case.
    pub fn with_attribute(mut self, name: &str, spec: AttributeSpec) -> Self {
        self.attributes.insert(name.trim().to_lowercase(), spec);
        self
    }
}

/// Parse the `fitting.peaks` mapping into peaks ordered by index.
///
/// # Errors
///
/// `InvalidInput` for non-numeric indices or a peak without exactly one model
/// tag, `DuplicateParameter` when two attribute names collide after
/// lower-casing, `Json` for malformed attribute objects.
pub fn peaks_from_mapping(value: &serde_json::Value) -> Result<Vec<PeakSpec>> {
    let raw: BTreeMap<String, BTreeMap<String, BTreeMap<String, AttributeSpec>>> =
        serde_json::from_value(value.clone())?;

    let mut peaks = Vec::with_capacity(raw.len());
    for (key, models) in raw {
        let index: usize = key
            .trim()
            .parse()
            .map_err(|_| SpectraFitError::InvalidInput(format!("peak index '{}' is not an integer", key)))?;

        let mut models = models.into_iter();
        let (tag, attributes) = match (models.next(), models.next()) {
            (Some(entry), None) => entry,
            _ => {
                return Err(SpectraFitError::InvalidInput(format!(
                    "peak '{}' must name exactly one model",
                    key
                )))
            }
        };

        let mut peak = PeakSpec::new(index, &tag);
        for (name, spec) in attributes {
            let lower = name.trim().to_lowercase();
            if peak.attributes.contains_key(&lower) {
                return Err(SpectraFitError::DuplicateParameter(format!(
                    "{}_{}_{}",
                    peak.model, lower, index
                )));
            }
            peak.attributes.insert(lower, spec);
        }
        peaks.push(peak);
    }

    peaks.sort_by_key(|p| p.index);
    Ok(peaks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attribute_defaults() {
        let spec: AttributeSpec = serde_json::from_value(json!({ "value": 2.0 })).unwrap();
        assert_eq!(spec, AttributeSpec::value(2.0));

        let spec: AttributeSpec = serde_json::from_value(json!({})).unwrap();
        assert_eq!(
            spec,
            AttributeSpec::Free {
                value: None,
                min: NEG_INFINITY,
                max: INFINITY,
                vary: true,
                shared: false
            }
        );
    }

    #[test]
    fn test_expr_excludes_value() {
        let spec: AttributeSpec = serde_json::from_value(json!({ "expr": "a / 3" })).unwrap();
        assert_eq!(spec, AttributeSpec::expr("a / 3"));

        let both = serde_json::from_value::<AttributeSpec>(json!({ "expr": "a", "value": 1.0 }));
        assert!(both.is_err());
        let unknown = serde_json::from_value::<AttributeSpec>(json!({ "valu": 1.0 }));
        assert!(unknown.is_err());
    }

    #[test]
    fn test_serialize_skips_infinite_bounds() {
        let text = serde_json::to_value(AttributeSpec::value(1.0)).unwrap();
        assert_eq!(text, json!({ "value": 1.0, "vary": true }));
    }

    #[test]
    fn test_peaks_from_mapping() {
        let mapping = json!({
            "2": { "Gaussian": { "Amplitude": { "expr": "gaussian_amplitude_1 / 3" } } },
            "1": { "gaussian": { "amplitude": { "value": 1.0, "min": 0.0, "max": 2.0 },
                                 "center": { "value": 0.5, "vary": false } } }
        });
        let peaks = peaks_from_mapping(&mapping).unwrap();
        assert_eq!(peaks.len(), 2);
        assert_eq!(peaks[0].index, 1);
        assert_eq!(peaks[1].model, "gaussian");
        assert!(peaks[1].attributes.contains_key("amplitude"));
        assert_eq!(
            peaks[0].attributes["center"],
            AttributeSpec::Free {
                value: Some(0.5),
                min: NEG_INFINITY,
                max: INFINITY,
                vary: false,
                shared: false
            }
        );
    }

    #[test]
    fn test_peaks_from_mapping_errors() {
        let two_models = json!({ "1": { "gaussian": {}, "lorentzian": {} } });
        assert!(peaks_from_mapping(&two_models).is_err());

        let bad_index = json!({ "first": { "gaussian": {} } });
        assert!(peaks_from_mapping(&bad_index).is_err());

        let collision = json!({ "1": { "gaussian": { "Center": {}, "center": {} } } });
        assert!(matches!(
            peaks_from_mapping(&collision),
            Err(SpectraFitError::DuplicateParameter(_))
        ));
    }
}
