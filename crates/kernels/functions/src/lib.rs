//! Hydroquad Kernel Functions
//!
//! Small dense linear-algebra kernels evaluated at every quadrature point.
//! Everything here is pure and allocation-free; the only runtime size
//! parameter (in [`symmetrize`] and [`norm2`]) bounds loops.
//!
//! - [`matrix`] - determinant, inverse, symmetrization, symmetric
//!   eigensystem and singular values of 2x2 matrices
//! - [`math`] - overflow-safe 2-norm and the smoothed step function

pub mod error;
pub mod math;
pub mod matrix;

pub use error::LinalgError;
pub use math::{norm2, smooth_step_01};
pub use matrix::{
    SingularValue, SymmetricEigen2, determinant_mat2, inverse_mat2, is_near_singular_mat2,
    singular_value_mat2, symmetric_eigen_mat2, symmetrize, symmetrize_mat2,
};
