//! Basic Matrix Operations
//!
//! Determinant, inverse and symmetrization.

use hydroquad_foundation::Mat2;

use crate::error::LinalgError;

/// Relative tolerance below which a determinant counts as numerically zero.
///
/// Compared against `det / ‖A‖_F²`, which is scale invariant.
pub const SINGULAR_RTOL: f64 = 100.0 * f64::EPSILON;

/// Determinant of a 2x2 matrix: `a00 * a11 - a10 * a01`.
#[inline]
pub fn determinant_mat2(a: &Mat2) -> f64 {
    a.0[0] * a.0[3] - a.0[1] * a.0[2]
}

/// Inverse of a 2x2 matrix as `adj(A) / det(A)`.
///
/// # Errors
///
/// [`LinalgError::SingularMatrix`] when the determinant is exactly zero or
/// not finite. Nearly singular matrices are still inverted; callers that need
/// to treat them as degenerate check [`is_near_singular_mat2`] first.
#[inline]
pub fn inverse_mat2(a: &Mat2) -> Result<Mat2, LinalgError> {
    let det = determinant_mat2(a);
    if det == 0.0 || !det.is_finite() {
        return Err(LinalgError::SingularMatrix { det });
    }
    let t = 1.0 / det;
    Ok(Mat2([a.0[3] * t, -a.0[1] * t, -a.0[2] * t, a.0[0] * t]))
}

/// Scale-invariant singularity check.
///
/// True when `|det(A)| <= SINGULAR_RTOL * ‖A‖_F²`, when any entry is not
/// finite, or for the zero matrix.
#[inline]
pub fn is_near_singular_mat2(a: &Mat2) -> bool {
    if !a.is_finite() {
        return true;
    }
    let det = determinant_mat2(a);
    det.abs() <= SINGULAR_RTOL * a.frobenius_norm_squared()
}

/// Replace a row-major `n x n` matrix with its symmetric part `(D + Dᵗ) / 2`.
///
/// The layout is irrelevant as long as it is consistent: the operation is
/// the same for row- and column-major storage.
pub fn symmetrize(d: &mut [f64], n: usize) {
    debug_assert!(d.len() >= n * n);
    for i in 0..n {
        for j in 0..i {
            let a = 0.5 * (d[i * n + j] + d[j * n + i]);
            d[i * n + j] = a;
            d[j * n + i] = a;
        }
    }
}

/// Symmetric part of a 2x2 matrix.
#[inline]
pub fn symmetrize_mat2(m: Mat2) -> Mat2 {
    let mut out = m;
    symmetrize(&mut out.0, 2);
    out
}
