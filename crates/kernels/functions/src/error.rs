//! Errors raised by the dense kernels.

use thiserror::Error;

/// Linear-algebra failures.
///
/// Only inversion can fail; every other kernel is total over finite input.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum LinalgError {
    /// The matrix has a zero (or non-finite) determinant and cannot be
    /// inverted.
    #[error("matrix is singular (determinant = {det})")]
    SingularMatrix {
        /// The offending determinant.
        det: f64,
    },
}
