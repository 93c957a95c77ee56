//! Conversions between ndarray and nalgebra.
//!
//! The crate keeps its data in ndarray; factorizations go through nalgebra.

use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2};

/// Convert an ndarray matrix to a nalgebra matrix.
pub fn ndarray_to_nalgebra(arr: &Array2<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(arr.nrows(), arr.ncols(), |i, j| arr[[i, j]])
}

/// Convert a nalgebra matrix to an ndarray matrix.
pub fn nalgebra_to_ndarray(mat: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn((mat.nrows(), mat.ncols()), |(i, j)| mat[(i, j)])
}

pub fn ndarray_vec_to_nalgebra(arr: &Array1<f64>) -> DVector<f64> {
    DVector::from_iterator(arr.len(), arr.iter().copied())
}

pub fn nalgebra_vec_to_ndarray(vec: &DVector<f64>) -> Array1<f64> {
    vec.iter().copied().collect()
}

/// Solve `a x = b` for symmetric positive definite `a` by Cholesky.
///
/// Returns `None` when `a` is not positive definite.
pub fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let cholesky = ndarray_to_nalgebra(a).cholesky()?;
    let x = cholesky.solve(&ndarray_vec_to_nalgebra(b));
    x.iter().all(|v| v.is_finite()).then(|| nalgebra_vec_to_ndarray(&x))
}

/// Inverse of a symmetric positive definite matrix, `None` when singular.
pub fn invert_spd(a: &Array2<f64>) -> Option<Array2<f64>> {
    let inverse = ndarray_to_nalgebra(a).cholesky()?.inverse();
    inverse
        .iter()
        .all(|v| v.is_finite())
        .then(|| nalgebra_to_ndarray(&inverse))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_round_trip() {
        let a = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let m = ndarray_to_nalgebra(&a);
        assert_eq!(m[(1, 2)], 6.0);
        assert_eq!(nalgebra_to_ndarray(&m), a);

        let v = array![1.0, -2.0];
        assert_eq!(nalgebra_vec_to_ndarray(&ndarray_vec_to_nalgebra(&v)), v);
    }

    #[test]
    fn test_cholesky_solve_and_inverse() {
        let a = array![[4.0, 2.0], [2.0, 3.0]];
        let x = cholesky_solve(&a, &array![2.0, 1.0]).unwrap();
        assert_relative_eq!(x[0], 0.5, epsilon = 1e-12);
        assert_relative_eq!(x[1], 0.0, epsilon = 1e-12);

        let inv = invert_spd(&a).unwrap();
        let identity = a.dot(&inv);
        assert_relative_eq!(identity[[0, 0]], 1.0, epsilon = 1e-12);
        assert_relative_eq!(identity[[0, 1]], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_singular_matrix() {
        let a = array![[1.0, 1.0], [1.0, 1.0]];
        assert!(invert_spd(&a).is_none());
        assert!(cholesky_solve(&a, &array![1.0, 1.0]).is_none());
    }
}
