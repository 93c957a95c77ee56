//! Model registry: the closed set of line-shape and background families.
//!
//! A model tag is resolved to a [`ModelKind`] once, when the parameter graph
//! is built. Each kind has a fixed attribute signature ([`AttributeDef`]) and
//! evaluates from a slice of attribute values in signature order, so the
//! optimizer's hot loop never touches strings.
//!
//! ```
//! use std::collections::HashMap;
//! use ndarray::Array1;
//! use spectrafit_rs::models::{self, ModelKind};
//!
//! let kind = ModelKind::from_tag("Gaussian").unwrap();
//! assert_eq!(kind.tag(), "gaussian");
//!
//! let x = Array1::linspace(-1.0, 1.0, 5);
//! let attributes: HashMap<String, f64> = [("amplitude".to_string(), 0.0)].into_iter().collect();
//! let y = models::evaluate("gaussian", &x, &attributes).unwrap();
//! assert!(y.iter().all(|v| *v == 0.0));
//! ```

pub mod background;
pub mod faddeeva;
pub mod moessbauer;
pub mod peak;
pub mod step;

use ndarray::Array1;
use std::collections::HashMap;
use std::fmt;

use crate::error::{Result, SpectraFitError};

/// Floor applied to widths so that a vanishing width never divides by zero.
pub(crate) const TINY: f64 = f64::EPSILON;

/// One entry of a model's attribute signature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttributeDef {
    pub name: &'static str,
    pub default: f64,
}

const fn attr(name: &'static str, default: f64) -> AttributeDef {
    AttributeDef { name, default }
}

const GAUSSIAN: &[AttributeDef] = &[attr("amplitude", 1.0), attr("center", 0.0), attr("fwhmg", 1.0)];
const LORENTZIAN: &[AttributeDef] = &[attr("amplitude", 1.0), attr("center", 0.0), attr("fwhml", 1.0)];
const VOIGT: &[AttributeDef] = &[
    attr("amplitude", 1.0),
    attr("center", 0.0),
    attr("fwhmg", 1.0),
    attr("fwhml", 1.0),
];
const EXPONENTIAL: &[AttributeDef] = &[attr("amplitude", 1.0), attr("decay", 1.0)];
const POWER: &[AttributeDef] = &[attr("amplitude", 1.0), attr("exponent", 1.0)];
const LINEAR: &[AttributeDef] = &[attr("slope", 1.0), attr("intercept", 0.0)];
const CONSTANT: &[AttributeDef] = &[attr("amplitude", 1.0)];
const POLYNOM2: &[AttributeDef] = &[
    attr("coefficient0", 0.0),
    attr("coefficient1", 1.0),
    attr("coefficient2", 0.0),
];
const POLYNOM3: &[AttributeDef] = &[
    attr("coefficient0", 0.0),
    attr("coefficient1", 1.0),
    attr("coefficient2", 0.0),
    attr("coefficient3", 0.0),
];
const SMOOTH_STEP: &[AttributeDef] = &[attr("amplitude", 1.0), attr("center", 0.0), attr("sigma", 1.0)];
const HEAVISIDE: &[AttributeDef] = &[attr("amplitude", 1.0), attr("center", 0.0)];
const SINGLET: &[AttributeDef] = &[
    attr("amplitude", 1.0),
    attr("isomer_shift", 0.0),
    attr("fwhml", 0.2),
    attr("fwhmg", 0.0),
    attr("background", 0.0),
];
const DOUBLET: &[AttributeDef] = &[
    attr("amplitude", 1.0),
    attr("isomer_shift", 0.0),
    attr("quadrupole_split", 1.0),
    attr("fwhml", 0.2),
    attr("fwhmg", 0.0),
    attr("background", 0.0),
];
const SEXTET: &[AttributeDef] = &[
    attr("amplitude", 1.0),
    attr("isomer_shift", 0.0),
    attr("quadrupole_shift", 0.0),
    attr("magnetic_field", 33.0),
    attr("intensity_ratio", 2.0),
    attr("fwhml", 0.2),
    attr("fwhmg", 0.0),
    attr("background", 0.0),
];
const OCTET: &[AttributeDef] = &[
    attr("amplitude", 1.0),
    attr("isomer_shift", 0.0),
    attr("quadrupole_shift", 0.0),
    attr("magnetic_field", 33.0),
    attr("intensity_ratio", 2.0),
    attr("forbidden_ratio", 1.0),
    attr("fwhml", 0.2),
    attr("fwhmg", 0.0),
    attr("background", 0.0),
];

/// Supported model families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    Gaussian,
    Lorentzian,
    Voigt,
    PseudoVoigt,
    Exponential,
    Power,
    Linear,
    Constant,
    Polynom2,
    Polynom3,
    Erf,
    Atan,
    Log,
    Heaviside,
    MoessbauerSinglet,
    MoessbauerDoublet,
    MoessbauerSextet,
    MoessbauerOctet,
}

impl ModelKind {
    /// Every registered family.
    pub const ALL: [ModelKind; 18] = [
        ModelKind::Gaussian,
        ModelKind::Lorentzian,
        ModelKind::Voigt,
        ModelKind::PseudoVoigt,
        ModelKind::Exponential,
        ModelKind::Power,
        ModelKind::Linear,
        ModelKind::Constant,
        ModelKind::Polynom2,
        ModelKind::Polynom3,
        ModelKind::Erf,
        ModelKind::Atan,
        ModelKind::Log,
        ModelKind::Heaviside,
        ModelKind::MoessbauerSinglet,
        ModelKind::MoessbauerDoublet,
        ModelKind::MoessbauerSextet,
        ModelKind::MoessbauerOctet,
    ];

    /// Resolve a case-insensitive tag (or alias) to its family.
    ///
    /// # Errors
    ///
    /// `UnknownModel` naming the offending tag.
    pub fn from_tag(tag: &str) -> Result<Self> {
        let kind = match tag.trim().to_lowercase().as_str() {
            "gaussian" => ModelKind::Gaussian,
            "lorentzian" => ModelKind::Lorentzian,
            "voigt" => ModelKind::Voigt,
            "pseudovoigt" | "pseudo_voigt" => ModelKind::PseudoVoigt,
            "exponential" => ModelKind::Exponential,
            "power" | "powerlaw" | "power_law" => ModelKind::Power,
            "linear" => ModelKind::Linear,
            "constant" => ModelKind::Constant,
            "polynom2" => ModelKind::Polynom2,
            "polynom3" => ModelKind::Polynom3,
            "erf" => ModelKind::Erf,
            "atan" | "arctan" => ModelKind::Atan,
            "log" | "logistic" => ModelKind::Log,
            "heaviside" => ModelKind::Heaviside,
            "moessbauer_singlet" => ModelKind::MoessbauerSinglet,
            "moessbauer_doublet" => ModelKind::MoessbauerDoublet,
            "moessbauer_sextet" => ModelKind::MoessbauerSextet,
            "moessbauer_octet" => ModelKind::MoessbauerOctet,
            _ => return Err(SpectraFitError::UnknownModel(tag.to_string())),
        };
        Ok(kind)
    }

    /// Canonical tag, used as the `{model}` part of parameter names.
    pub fn tag(&self) -> &'static str {
        match self {
            ModelKind::Gaussian => "gaussian",
            ModelKind::Lorentzian => "lorentzian",
            ModelKind::Voigt => "voigt",
            ModelKind::PseudoVoigt => "pseudovoigt",
            ModelKind::Exponential => "exponential",
            ModelKind::Power => "power",
            ModelKind::Linear => "linear",
            ModelKind::Constant => "constant",
            ModelKind::Polynom2 => "polynom2",
            ModelKind::Polynom3 => "polynom3",
            ModelKind::Erf => "erf",
            ModelKind::Atan => "atan",
            ModelKind::Log => "log",
            ModelKind::Heaviside => "heaviside",
            ModelKind::MoessbauerSinglet => "moessbauer_singlet",
            ModelKind::MoessbauerDoublet => "moessbauer_doublet",
            ModelKind::MoessbauerSextet => "moessbauer_sextet",
            ModelKind::MoessbauerOctet => "moessbauer_octet",
        }
    }

    /// Attribute signature in evaluation order.
    pub fn attributes(&self) -> &'static [AttributeDef] {
        match self {
            ModelKind::Gaussian => GAUSSIAN,
            ModelKind::Lorentzian => LORENTZIAN,
            ModelKind::Voigt | ModelKind::PseudoVoigt => VOIGT,
            ModelKind::Exponential => EXPONENTIAL,
            ModelKind::Power => POWER,
            ModelKind::Linear => LINEAR,
            ModelKind::Constant => CONSTANT,
            ModelKind::Polynom2 => POLYNOM2,
            ModelKind::Polynom3 => POLYNOM3,
            ModelKind::Erf | ModelKind::Atan | ModelKind::Log => SMOOTH_STEP,
            ModelKind::Heaviside => HEAVISIDE,
            ModelKind::MoessbauerSinglet => SINGLET,
            ModelKind::MoessbauerDoublet => DOUBLET,
            ModelKind::MoessbauerSextet => SEXTET,
            ModelKind::MoessbauerOctet => OCTET,
        }
    }

    /// Position of `name` in the signature.
    pub fn attribute_index(&self, name: &str) -> Option<usize> {
        self.attributes().iter().position(|a| a.name == name)
    }

    /// Default values in signature order.
    pub fn defaults(&self) -> Vec<f64> {
        self.attributes().iter().map(|a| a.default).collect()
    }

    /// Whether the family carries an `amplitude` attribute.
    pub fn has_amplitude(&self) -> bool {
        self.attribute_index("amplitude").is_some()
    }

    /// Evaluate the family on `x` with attribute values in signature order.
    ///
    /// # Panics
    ///
    /// Debug builds assert that `values` matches the signature length; the
    /// parameter graph guarantees this for every resolved peak.
    pub fn evaluate(&self, x: &Array1<f64>, values: &[f64]) -> Array1<f64> {
        debug_assert_eq!(values.len(), self.attributes().len());
        let v = values;
        match self {
            ModelKind::Gaussian => peak::gaussian(x, v[0], v[1], v[2]),
            ModelKind::Lorentzian => peak::lorentzian(x, v[0], v[1], v[2]),
            ModelKind::Voigt => peak::voigt(x, v[0], v[1], v[2], v[3]),
            ModelKind::PseudoVoigt => peak::pseudovoigt(x, v[0], v[1], v[2], v[3]),
            ModelKind::Exponential => background::exponential(x, v[0], v[1]),
            ModelKind::Power => background::power(x, v[0], v[1]),
            ModelKind::Linear => background::linear(x, v[0], v[1]),
            ModelKind::Constant => background::constant(x, v[0]),
            ModelKind::Polynom2 | ModelKind::Polynom3 => background::polynomial(x, v),
            ModelKind::Erf => step::erf_step(x, v[0], v[1], v[2]),
            ModelKind::Atan => step::atan_step(x, v[0], v[1], v[2]),
            ModelKind::Log => step::log_step(x, v[0], v[1], v[2]),
            ModelKind::Heaviside => step::heaviside(x, v[0], v[1]),
            ModelKind::MoessbauerSinglet => {
                let lines = moessbauer::singlet_lines(v[1]);
                moessbauer::multiplet(x, &lines, v[0], v[2], v[3], v[4])
            }
            ModelKind::MoessbauerDoublet => {
                let lines = moessbauer::doublet_lines(v[1], v[2]);
                moessbauer::multiplet(x, &lines, v[0], v[3], v[4], v[5])
            }
            ModelKind::MoessbauerSextet => {
                let lines = moessbauer::sextet_lines(v[1], v[2], v[3], v[4]);
                moessbauer::multiplet(x, &lines, v[0], v[5], v[6], v[7])
            }
            ModelKind::MoessbauerOctet => {
                let lines = moessbauer::octet_lines(v[1], v[2], v[3], v[4], v[5]);
                moessbauer::multiplet(x, &lines, v[0], v[6], v[7], v[8])
            }
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Evaluate a model by tag with named attributes.
///
/// Attribute names are case-insensitive; omitted attributes take the family
/// default.
///
/// # Errors
///
/// `UnknownModel` for an unsupported tag, `UnknownAttribute` for a name
/// outside the family's signature.
pub fn evaluate(tag: &str, x: &Array1<f64>, attributes: &HashMap<String, f64>) -> Result<Array1<f64>> {
    let kind = ModelKind::from_tag(tag)?;
    let mut values = kind.defaults();
    for (name, value) in attributes {
        let lower = name.to_lowercase();
        let index = kind
            .attribute_index(&lower)
            .ok_or_else(|| SpectraFitError::UnknownAttribute {
                model: kind.tag().to_string(),
                attribute: lower.clone(),
            })?;
        values[index] = *value;
    }
    Ok(kind.evaluate(x, &values))
}
