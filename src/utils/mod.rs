//! Numerical helpers shared by the solvers.

pub mod finite_difference;
pub mod matrix_convert;

pub use finite_difference::jacobian;
pub use matrix_convert::{cholesky_solve, invert_spd};
