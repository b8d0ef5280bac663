//! Matrix Decomposition Operations
//!
//! Closed-form symmetric eigensystem and singular values of 2x2 matrices.

use hydroquad_foundation::Mat2;

/// Eigenvalues and eigenvectors of a symmetric 2x2 matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SymmetricEigen2 {
    /// Eigenvalues, ascending: `values[0] <= values[1]`.
    pub values: [f64; 2],
    /// Orthonormal eigenvectors as columns, paired with `values`.
    pub vectors: Mat2,
}

impl SymmetricEigen2 {
    /// Eigenvector of the smallest eigenvalue.
    #[inline]
    pub fn min_vector(&self) -> [f64; 2] {
        self.vectors.column(0)
    }
}

/// Which singular value [`singular_value_mat2`] returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SingularValue {
    Largest,
    Smallest,
}

/// `x` with its sign flipped when `x` and `y` have strictly opposite signs.
#[inline]
fn copy_sign_nonzero(x: f64, y: f64) -> f64 {
    if (x < 0.0 && y > 0.0) || (x > 0.0 && y < 0.0) {
        -x
    } else {
        x
    }
}

/// One Jacobi rotation diagonalizing `[[d1, d12], [d12, d2]]`.
///
/// Returns the rotation `(c, s)` and the rotated diagonal `(d1', d2')`.
/// Uses the half-angle form from Parlett, "The Symmetric Eigenvalue
/// Problem", pp. 189-190, which avoids cancellation in `d2 - d1`.
#[inline]
fn jacobi_rotation(d12: f64, d1: f64, d2: f64) -> ((f64, f64), (f64, f64)) {
    const SQRT_1_EPS: f64 = 1.0e8;

    if d12 == 0.0 {
        return ((1.0, 0.0), (d1, d2));
    }

    let zeta = (d2 - d1) / (2.0 * d12);
    let t = if zeta.abs() < SQRT_1_EPS {
        copy_sign_nonzero(1.0 / (zeta.abs() + (1.0 + zeta * zeta).sqrt()), zeta)
    } else {
        copy_sign_nonzero(0.5 / zeta.abs(), zeta)
    };
    let c = (1.0 / (1.0 + t * t)).sqrt();
    let s = c * t;
    let shift = t * d12;
    ((c, s), (d1 - shift, d2 + shift))
}

/// Eigensystem of a symmetric 2x2 matrix.
///
/// Reads the diagonal and the upper off-diagonal entry (`d.at(0, 1)`); the
/// lower one is ignored. Eigenvalues come back ascending and the eigenvector
/// columns are signed by the rotation that produced them, so the result is a
/// proper rotation (or its column swap) and always orthonormal.
pub fn symmetric_eigen_mat2(d: &Mat2) -> SymmetricEigen2 {
    let ((c, s), (d0, d3)) = jacobi_rotation(d.at(0, 1), d.at(0, 0), d.at(1, 1));
    if d0 <= d3 {
        SymmetricEigen2 {
            values: [d0, d3],
            vectors: Mat2([c, -s, s, c]),
        }
    } else {
        SymmetricEigen2 {
            values: [d3, d0],
            vectors: Mat2([s, c, c, -s]),
        }
    }
}

/// Decompose `x = m * 2^e` with `m ∈ [0.5, 1)`, returning `e`.
///
/// `x` must be positive and finite.
fn frexp_exponent(x: f64) -> i32 {
    let biased = ((x.to_bits() >> 52) & 0x7ff) as i32;
    if biased == 0 {
        // Subnormal: renormalize first
        frexp_exponent(x * 2f64.powi(54)) - 54
    } else {
        biased - 1022
    }
}

/// Exact power of two `2^e` for `e` in `[-1074, 1023]`.
fn pow2(e: i32) -> f64 {
    if e >= -1022 {
        f64::from_bits(((e + 1023) as u64) << 52)
    } else {
        f64::from_bits(1u64 << (e + 1074))
    }
}

/// Power-of-two scale `mult` such that `d_max / mult ∈ [0.5, 1)`.
///
/// At the top of the exponent range the scale is halved so it stays finite.
/// Returns `1.0` when `d_max` is zero.
fn scaling_factor(d_max: f64) -> f64 {
    if d_max > 0.0 {
        pow2(frexp_exponent(d_max).min(f64::MAX_EXP - 1))
    } else {
        1.0
    }
}

/// Largest or smallest singular value of a 2x2 matrix.
///
/// Entries are divided by a power-of-two scale derived from the largest
/// absolute entry before squaring, then the result is scaled back, so the
/// computation neither overflows nor loses bits to the rescale. Returns `0.0`
/// for the zero matrix.
pub fn singular_value_mat2(a: &Mat2, which: SingularValue) -> f64 {
    let mult = scaling_factor(a.max_abs());
    let [d0, d1, d2, d3] = a.0.map(|x| x / mult);

    let t = 0.5 * ((d0 + d2) * (d0 - d2) + (d1 - d3) * (d1 + d3));
    let s = d0 * d2 + d1 * d3;
    let s = (0.5 * (d0 * d0 + d1 * d1 + d2 * d2 + d3 * d3) + (t * t + s * s).sqrt()).sqrt();

    if s == 0.0 {
        return 0.0;
    }
    // s is the largest singular value, |det| / s the smallest
    let t = (d0 * d3 - d1 * d2).abs() / s;
    let (largest, smallest) = if t > s { (t, s) } else { (s, t) };
    match which {
        SingularValue::Largest => largest * mult,
        SingularValue::Smallest => smallest * mult,
    }
}
