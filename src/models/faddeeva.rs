//! Faddeeva function `w(z) = exp(-z²) erfc(-iz)` for the upper half plane.
//!
//! Uses Humlíček's four-region rational approximation (J. Quant. Spectrosc.
//! Radiat. Transfer 27, 437 (1982)), accurate to about 1e-4 relative, which is
//! below the noise floor of any measured line shape.

use nalgebra::{Complex, ComplexField};

/// Evaluate `w(x + iy)` for `y >= 0`.
///
/// Negative `y` is reflected to `|y|`; line shapes only need the upper half
/// plane.
pub fn faddeeva(x: f64, y: f64) -> Complex<f64> {
    let y = y.abs();
    let t = Complex::new(y, -x);
    let s = x.abs() + y;

    if s >= 15.0 {
        // Region I
        t * 0.5641896 / (0.5 + t * t)
    } else if s >= 5.5 {
        // Region II
        let u = t * t;
        t * (1.410474 + u * 0.5641896) / (0.75 + u * (3.0 + u))
    } else if y >= 0.195 * x.abs() - 0.176 {
        // Region III
        let num = (((t * 0.5642236 + 3.778987) * t + 11.96482) * t + 20.20933) * t + 16.4955;
        let den = ((((t + 6.699398) * t + 21.69274) * t + 39.27121) * t + 38.82363) * t + 16.4955;
        num / den
    } else {
        // Region IV
        let u = t * t;
        let num = t
            * (36183.31
                - u * (3321.9905
                    - u * (1540.787
                        - u * (219.0313 - u * (35.76683 - u * (1.320522 - u * 0.56419))))));
        let den = 32066.6
            - u * (24322.84
                - u * (9022.228
                    - u * (2186.181
                        - u * (364.2191 - u * (61.57037 - u * (1.841439 - u))))));
        u.exp() - num / den
    }
}

/// Real part of `w(z)`, the quantity the Voigt profile needs.
pub fn faddeeva_re(x: f64, y: f64) -> f64 {
    faddeeva(x, y).re
}
