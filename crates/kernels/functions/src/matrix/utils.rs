//! Conversions between [`Mat2`] and nalgebra, used as a reference in tests.
//!
//! Both sides are column-major, so the conversions are plain slice copies.

use hydroquad_foundation::Mat2;
use nalgebra as na;

#[inline]
pub fn to_na_mat2(mat: &Mat2) -> na::Matrix2<f64> {
    na::Matrix2::from_column_slice(&mat.0)
}

#[inline]
pub fn from_na_mat2(mat: &na::Matrix2<f64>) -> Mat2 {
    Mat2([mat[(0, 0)], mat[(1, 0)], mat[(0, 1)], mat[(1, 1)]])
}
