//! 2x2 Matrix Operations
//!
//! Low-level matrix arithmetic used by the dense kernels and the
//! quadrature-point physics. All matrices use column-major storage:
//! `[col0_row0, col0_row1, col1_row0, col1_row1]`.

use std::ops::{Add, AddAssign, Mul};

/// A 2-vector.
pub type Vec2 = [f64; 2];

/// Column-major 2x2 matrix.
///
/// Entry `(row, col)` lives at index `row + 2 * col`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[repr(transparent)]
pub struct Mat2(pub [f64; 4]);

impl Mat2 {
    /// The 2x2 identity.
    pub const IDENTITY: Mat2 = Mat2([1.0, 0.0, 0.0, 1.0]);

    /// The 2x2 zero matrix.
    pub const ZERO: Mat2 = Mat2([0.0; 4]);

    /// Build a matrix from its two columns.
    #[inline]
    pub const fn from_columns(c0: Vec2, c1: Vec2) -> Self {
        Mat2([c0[0], c0[1], c1[0], c1[1]])
    }

    /// Build a matrix from row-major entries `[[a, b], [c, d]]`.
    #[inline]
    pub const fn from_rows(r0: Vec2, r1: Vec2) -> Self {
        Mat2([r0[0], r1[0], r0[1], r1[1]])
    }

    /// Diagonal matrix `diag(a, b)`.
    #[inline]
    pub const fn diagonal(a: f64, b: f64) -> Self {
        Mat2([a, 0.0, 0.0, b])
    }

    /// Entry at `(row, col)`.
    #[inline]
    pub fn at(&self, row: usize, col: usize) -> f64 {
        self.0[row + 2 * col]
    }

    /// Column `col` as a vector.
    #[inline]
    pub fn column(&self, col: usize) -> Vec2 {
        [self.0[2 * col], self.0[2 * col + 1]]
    }

    #[inline]
    pub fn transpose(&self) -> Mat2 {
        Mat2([self.0[0], self.0[2], self.0[1], self.0[3]])
    }

    /// Matrix product `self * rhs`.
    #[inline]
    pub fn mul_mat(&self, rhs: &Mat2) -> Mat2 {
        let a = &self.0;
        let b = &rhs.0;
        Mat2([
            a[0] * b[0] + a[2] * b[1],
            a[1] * b[0] + a[3] * b[1],
            a[0] * b[2] + a[2] * b[3],
            a[1] * b[2] + a[3] * b[3],
        ])
    }

    /// Product with a transposed right operand: `self * rhsᵗ`.
    #[inline]
    pub fn mul_transpose(&self, rhs: &Mat2) -> Mat2 {
        self.mul_mat(&rhs.transpose())
    }

    /// Matrix-vector product `self * v`.
    #[inline]
    pub fn transform(&self, v: Vec2) -> Vec2 {
        [
            self.0[0] * v[0] + self.0[2] * v[1],
            self.0[1] * v[0] + self.0[3] * v[1],
        ]
    }

    /// `self += c * other`.
    #[inline]
    pub fn add_scaled(&mut self, c: f64, other: &Mat2) {
        for (d, a) in self.0.iter_mut().zip(other.0.iter()) {
            *d += c * a;
        }
    }

    /// Sum of squared entries.
    #[inline]
    pub fn frobenius_norm_squared(&self) -> f64 {
        self.0.iter().map(|x| x * x).sum()
    }

    /// Largest absolute entry.
    #[inline]
    pub fn max_abs(&self) -> f64 {
        self.0.iter().fold(0.0_f64, |m, x| m.max(x.abs()))
    }

    /// True when every entry is finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|x| x.is_finite())
    }
}

impl Mul for Mat2 {
    type Output = Mat2;

    fn mul(self, rhs: Mat2) -> Mat2 {
        self.mul_mat(&rhs)
    }
}

impl Mul<f64> for Mat2 {
    type Output = Mat2;

    fn mul(self, s: f64) -> Mat2 {
        Mat2(self.0.map(|x| x * s))
    }
}

impl Add for Mat2 {
    type Output = Mat2;

    fn add(self, rhs: Mat2) -> Mat2 {
        Mat2([
            self.0[0] + rhs.0[0],
            self.0[1] + rhs.0[1],
            self.0[2] + rhs.0[2],
            self.0[3] + rhs.0[3],
        ])
    }
}

impl AddAssign for Mat2 {
    fn add_assign(&mut self, rhs: Mat2) {
        self.add_scaled(1.0, &rhs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_major_layout() {
        let m = Mat2::from_rows([1.0, 2.0], [3.0, 4.0]);
        assert_eq!(m.0, [1.0, 3.0, 2.0, 4.0]);
        assert_eq!(m.at(0, 1), 2.0);
        assert_eq!(m.at(1, 0), 3.0);
        assert_eq!(m.column(1), [2.0, 4.0]);
    }

    #[test]
    fn test_mul_against_hand_computed() {
        let a = Mat2::from_rows([1.0, 2.0], [3.0, 4.0]);
        let b = Mat2::from_rows([0.0, 1.0], [1.0, 0.0]);
        // Swaps columns of a
        assert_eq!(a * b, Mat2::from_rows([2.0, 1.0], [4.0, 3.0]));
        assert_eq!(a.mul_transpose(&b), a * b.transpose());
    }

    #[test]
    fn test_transform_and_add_scaled() {
        let a = Mat2::from_rows([1.0, 2.0], [3.0, 4.0]);
        assert_eq!(a.transform([1.0, -1.0]), [-1.0, -1.0]);

        let mut s = Mat2::diagonal(-0.4, -0.4);
        s.add_scaled(2.0, &Mat2::IDENTITY);
        assert_eq!(s, Mat2::diagonal(1.6, 1.6));
        assert_eq!(a.max_abs(), 4.0);
        assert_eq!(Mat2::IDENTITY.frobenius_norm_squared(), 2.0);
    }
}
