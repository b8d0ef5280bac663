//! Runtime errors for the quadrature update.
//!
//! # Error Categories
//!
//! - **Configuration errors**: [`Error::UnsupportedShape`], [`Error::InvalidConfig`],
//!   [`Error::ConfigParse`]
//! - **Contract errors**: [`Error::SizeMismatch`]
//! - **Geometry errors**: [`Error::DegenerateReference`]
//! - **Numeric errors**: [`Error::Linalg`]
//!
//! # Error Handling Policy
//!
//! Degenerate geometry met *during* an update is not an error: the affected
//! points report a zero time-step bound and the count is surfaced in the
//! [`UpdateReport`](crate::UpdateReport). Everything that makes the update
//! itself meaningless (a missing kernel, a buffer of the wrong length, an
//! invalid reference mesh) fails loudly through this type.

use hydroquad_foundation::ShapeError;
use hydroquad_functions::LinalgError;
use thiserror::Error;

use crate::kernel::{KernelError, KernelFamily};

/// Runtime result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while configuring or running the quadrature update.
#[derive(Debug, Error)]
pub enum Error {
    /// No specialized kernel is registered for the requested combination.
    ///
    /// Raised when the updater is built, so a bad polynomial order is
    /// reported before any state is touched.
    #[error("no {family} kernel registered for vdim={vdim} dofs_1d={dofs_1d} quad_1d={quad_1d}")]
    UnsupportedShape {
        /// Kernel family that missed.
        family: KernelFamily,
        /// Field components (0 when the family does not depend on it).
        vdim: usize,
        /// Dofs per axis (0 when the family does not depend on it).
        dofs_1d: usize,
        /// Quadrature points per axis.
        quad_1d: usize,
    },

    /// A buffer handed across an interface has the wrong length.
    #[error("{buffer}: expected length {expected}, got {actual}")]
    SizeMismatch {
        /// Name of the offending buffer.
        buffer: &'static str,
        /// Length implied by the mesh and the kernel shape.
        expected: usize,
        /// Length actually received.
        actual: usize,
    },

    /// A configuration value was rejected by validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The initial mesh has an inverted or collapsed quadrature point.
    ///
    /// The reference configuration defines `Jac0inv` and `rho0DetJ0w`, so
    /// unlike the current configuration it must be valid everywhere.
    #[error("degenerate reference Jacobian in zone {zone} at point {point}")]
    DegenerateReference {
        /// Zone index.
        zone: usize,
        /// Quadrature point index within the zone.
        point: usize,
    },

    /// Configuration JSON could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// A dense kernel failed.
    #[error(transparent)]
    Linalg(#[from] LinalgError),
}

impl From<KernelError> for Error {
    fn from(err: KernelError) -> Self {
        match err {
            KernelError::SizeMismatch {
                buffer,
                expected,
                actual,
            } => Error::SizeMismatch {
                buffer,
                expected,
                actual,
            },
            KernelError::Shape(ShapeError::LengthMismatch {
                expected, actual, ..
            }) => Error::SizeMismatch {
                buffer: "tensor view",
                expected,
                actual,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_shape_names_the_combination() {
        let err = Error::UnsupportedShape {
            family: KernelFamily::GradientInterpolation,
            vdim: 2,
            dofs_1d: 6,
            quad_1d: 10,
        };
        let msg = err.to_string();
        assert!(msg.contains("gradient interpolation"));
        assert!(msg.contains("dofs_1d=6"));
        assert!(msg.contains("quad_1d=10"));
    }

    #[test]
    fn test_kernel_error_converts_to_size_mismatch() {
        let err: Error = KernelError::SizeMismatch {
            buffer: "energy",
            expected: 16,
            actual: 15,
        }
        .into();
        assert!(matches!(
            err,
            Error::SizeMismatch {
                buffer: "energy",
                expected: 16,
                actual: 15
            }
        ));
    }
}
