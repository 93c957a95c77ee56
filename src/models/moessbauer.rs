//! ⁵⁷Fe Mössbauer multiplets on a velocity axis (mm/s).
//!
//! Each multiplet is a sum of Lorentzian lines (Voigt when `fwhmg > 0`) whose
//! areas add up to `amplitude`, plus a flat `background`.
//!
//! Magnetic splitting uses the first-order Zeeman energies
//! `E(m) = -g μ_N B m` of the I = 1/2 ground and I = 3/2 excited states. A
//! transition `m_e → m_g` appears at
//!
//! ```text
//! v = δ + (c / E_γ) μ_N B (g_g m_g − g_e m_e) ± ε
//! ```
//!
//! where the quadrupole shift ε adds to the |m_e| = 3/2 lines and subtracts
//! from the |m_e| = 1/2 lines.

use ndarray::Array1;

use super::peak::voigt_point;
use super::TINY;

/// Nuclear magneton in eV/T.
const NUCLEAR_MAGNETON: f64 = 3.152_451_258e-8;

/// 14.4 keV transition energy of ⁵⁷Fe in eV.
const GAMMA_ENERGY: f64 = 14_412.5;

/// Speed of light in mm/s.
const SPEED_OF_LIGHT: f64 = 2.997_924_58e11;

/// Ground-state g-factor (μ = +0.09044 μ_N, I = 1/2).
const G_GROUND: f64 = 0.090_44 / 0.5;

/// Excited-state g-factor (μ = −0.1549 μ_N, I = 3/2).
const G_EXCITED: f64 = -0.154_9 / 1.5;

/// Doppler velocity per tesla and unit of `g m`.
const VELOCITY_PER_TESLA: f64 = NUCLEAR_MAGNETON * SPEED_OF_LIGHT / GAMMA_ENERGY;

/// A single absorption line: position and relative intensity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub position: f64,
    pub weight: f64,
}

fn zeeman_line(
    m_excited: f64,
    m_ground: f64,
    isomer_shift: f64,
    quadrupole_shift: f64,
    magnetic_field: f64,
    weight: f64,
) -> Line {
    let zeeman = VELOCITY_PER_TESLA * magnetic_field * (G_GROUND * m_ground - G_EXCITED * m_excited);
    let quadrupole = if m_excited.abs() > 1.0 {
        quadrupole_shift
    } else {
        -quadrupole_shift
    };
    Line {
        position: isomer_shift + zeeman + quadrupole,
        weight,
    }
}

/// Single line at the isomer shift.
pub fn singlet_lines(isomer_shift: f64) -> [Line; 1] {
    [Line {
        position: isomer_shift,
        weight: 1.0,
    }]
}

/// Quadrupole doublet: two equal lines at `δ ± ΔE_Q / 2`.
pub fn doublet_lines(isomer_shift: f64, quadrupole_split: f64) -> [Line; 2] {
    let half = 0.5 * quadrupole_split;
    [
        Line {
            position: isomer_shift - half,
            weight: 1.0,
        },
        Line {
            position: isomer_shift + half,
            weight: 1.0,
        },
    ]
}

/// Magnetic sextet with intensities `3 : r : 1 : 1 : r : 3`.
///
/// `intensity_ratio = 2` is the powder average; 0 and 4 correspond to the
/// field parallel and perpendicular to the γ beam.
pub fn sextet_lines(
    isomer_shift: f64,
    quadrupole_shift: f64,
    magnetic_field: f64,
    intensity_ratio: f64,
) -> [Line; 6] {
    let line = |m_e: f64, m_g: f64, weight: f64| {
        zeeman_line(m_e, m_g, isomer_shift, quadrupole_shift, magnetic_field, weight)
    };
    [
        line(-1.5, -0.5, 3.0),
        line(-0.5, -0.5, intensity_ratio),
        line(0.5, -0.5, 1.0),
        line(-0.5, 0.5, 1.0),
        line(0.5, 0.5, intensity_ratio),
        line(1.5, 0.5, 3.0),
    ]
}

/// Sextet plus the two Δm = ±2 transitions that appear when the electric
/// field gradient mixes the nuclear sublevels.
pub fn octet_lines(
    isomer_shift: f64,
    quadrupole_shift: f64,
    magnetic_field: f64,
    intensity_ratio: f64,
    forbidden_ratio: f64,
) -> [Line; 8] {
    let [l1, l2, l3, l4, l5, l6] =
        sextet_lines(isomer_shift, quadrupole_shift, magnetic_field, intensity_ratio);
    let line = |m_e: f64, m_g: f64| {
        zeeman_line(m_e, m_g, isomer_shift, quadrupole_shift, magnetic_field, forbidden_ratio)
    };
    [l1, l2, line(-1.5, 0.5), l3, l4, line(1.5, -0.5), l5, l6]
}

/// Sum of line profiles sharing one width, normalized to a total area of
/// `amplitude`, on top of a constant background.
pub fn multiplet(
    x: &Array1<f64>,
    lines: &[Line],
    amplitude: f64,
    fwhml: f64,
    fwhmg: f64,
    background: f64,
) -> Array1<f64> {
    let total: f64 = lines.iter().map(|l| l.weight).sum();
    let scale = amplitude / if total.abs() > TINY { total } else { TINY };
    x.mapv(|xi| {
        background
            + lines
                .iter()
                .map(|l| voigt_point(xi, scale * l.weight, l.position, fwhmg, fwhml))
                .sum::<f64>()
    })
}
