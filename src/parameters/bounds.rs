//! Parameter bounds and the Minuit-style internal/external transform.
//!
//! Bounded solvers work on unbounded internal coordinates. The transform maps
//! them back to external values that always lie inside `[min, max]`:
//!
//! * both bounds: `ext = min + (sin(int) + 1) (max - min) / 2`
//! * lower only:  `ext = min - 1 + sqrt(int² + 1)`
//! * upper only:  `ext = max + 1 - sqrt(int² + 1)`

use std::f64::{INFINITY, NEG_INFINITY};
use thiserror::Error;

/// Errors that can occur when working with parameter bounds
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BoundsError {
    #[error("Invalid bounds: min ({min}) must not exceed max ({max})")]
    InvalidBounds { min: f64, max: f64 },

    #[error("Parameter value {value} is outside bounds: [{min}, {max}]")]
    ValueOutsideBounds { value: f64, min: f64, max: f64 },

    #[error("Infinite parameter value is not allowed")]
    InfiniteValue,
}

/// Closed interval `[min, max]`; infinite ends mean unbounded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Minimum allowed value for the parameter
    pub min: f64,

    /// Maximum allowed value for the parameter
    pub max: f64,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            min: NEG_INFINITY,
            max: INFINITY,
        }
    }
}

impl Bounds {
    /// Create bounds, rejecting `min > max` and NaN ends.
    ///
    /// # Examples
    ///
    /// ```
    /// use spectrafit_rs::parameters::bounds::Bounds;
    ///
    /// let bounds = Bounds::new(0.0, 10.0).unwrap();
    /// assert_eq!(bounds.min, 0.0);
    /// assert!(Bounds::new(1.0, 0.0).is_err());
    /// ```
    pub fn new(min: f64, max: f64) -> Result<Self, BoundsError> {
        if min.is_nan() || max.is_nan() || min > max {
            return Err(BoundsError::InvalidBounds { min, max });
        }
        Ok(Self { min, max })
    }

    /// Unbounded interval `(-∞, ∞)`.
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Both ends finite.
    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }

    pub fn has_lower_bound(&self) -> bool {
        self.min.is_finite()
    }

    pub fn has_upper_bound(&self) -> bool {
        self.max.is_finite()
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

/// Maps between the solver's internal coordinate and the bounded external value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundsTransform {
    bounds: Bounds,
}

impl BoundsTransform {
    pub fn new(bounds: Bounds) -> Self {
        Self { bounds }
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Transform an internal value to the external (bounded) value.
    pub fn to_external(&self, internal: f64) -> f64 {
        let b = &self.bounds;
        match (b.has_lower_bound(), b.has_upper_bound()) {
            (false, false) => internal,
            (true, false) => b.min - 1.0 + (internal * internal + 1.0).sqrt(),
            (false, true) => b.max + 1.0 - (internal * internal + 1.0).sqrt(),
            (true, true) => b.min + (internal.sin() + 1.0) * (b.max - b.min) / 2.0,
        }
    }

    /// Transform an external value to its internal coordinate.
    ///
    /// # Errors
    ///
    /// Fails when the value is infinite or outside the bounds.
    pub fn to_internal(&self, external: f64) -> Result<f64, BoundsError> {
        let b = &self.bounds;
        if !external.is_finite() {
            return Err(BoundsError::InfiniteValue);
        }
        if !b.contains(external) {
            return Err(BoundsError::ValueOutsideBounds {
                value: external,
                min: b.min,
                max: b.max,
            });
        }

        let internal = match (b.has_lower_bound(), b.has_upper_bound()) {
            (false, false) => external,
            (true, false) => ((external - b.min + 1.0).powi(2) - 1.0).sqrt(),
            (false, true) => ((b.max - external + 1.0).powi(2) - 1.0).sqrt(),
            (true, true) => {
                if b.max == b.min {
                    0.0
                } else {
                    let scaled = 2.0 * (external - b.min) / (b.max - b.min) - 1.0;
                    scaled.clamp(-1.0, 1.0).asin()
                }
            }
        };
        Ok(internal)
    }
}
