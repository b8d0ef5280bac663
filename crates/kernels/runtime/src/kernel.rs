//! Kernel abstractions for shape-specialized execution.
//!
//! The update runs three kernel families, each specialized at compile time
//! for one discrete shape (dofs per axis, points per axis) through const
//! generics and selected at runtime by [`ShapeKey`]:
//!
//! ```text
//! restrict(e) ──► ScalarInterpolation   ──► e(q)  ──┐
//! restrict(x) ──► GradientInterpolation ──► J(q)  ──┼──► QuadratureKernel ──► stress, dt(q)
//! restrict(v) ──► GradientInterpolation ──► ∇v(q) ──┘
//! ```
//!
//! Every kernel is a pure function of its inputs that writes disjoint output
//! chunks, so the [`KernelRegistry`](crate::KernelRegistry) can hand out
//! shared references and kernels are `Send + Sync`.

use std::fmt;
use std::time::Instant;

use hydroquad_foundation::{ShapeError, ShapeKey};
use thiserror::Error;

use crate::basis::BasisTable;
use crate::executor::ChunkConfig;
use crate::physics::{PhysicsParams, PointInputs, PointOutputs};

// ============================================================================
// Kernel Families
// ============================================================================

/// The three kernel families looked up by the update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelFamily {
    /// Nodal scalar field to point values.
    ScalarInterpolation,
    /// Nodal 2-vector field to point gradients.
    GradientInterpolation,
    /// Per-point stress, viscosity and time-step bound.
    QuadratureUpdate,
}

impl fmt::Display for KernelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KernelFamily::ScalarInterpolation => "scalar interpolation",
            KernelFamily::GradientInterpolation => "gradient interpolation",
            KernelFamily::QuadratureUpdate => "quadrature update",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Results and Errors
// ============================================================================

/// Execution statistics returned after a kernel completes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KernelStats {
    /// Elements (interpolation) or zones (point physics) processed.
    pub work_items: usize,
    /// Points whose time-step bound was forced to zero by degenerate geometry.
    pub degenerate_points: usize,
    /// Wall-clock execution time in nanoseconds.
    pub execution_ns: Option<u64>,
}

impl KernelStats {
    /// Measured execution time, zero when the kernel did not time itself.
    pub fn elapsed_ns(&self) -> u64 {
        self.execution_ns.unwrap_or(0)
    }
}

/// Nanoseconds since `start`, saturating at `u64::MAX`.
pub(crate) fn elapsed_ns(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_nanos()).unwrap_or(u64::MAX)
}

/// Errors raised by kernel execution.
///
/// Kernels only fail on contract violations: every numeric corner case is
/// handled in-line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KernelError {
    /// An input or output buffer does not match the kernel shape.
    #[error("{buffer}: expected length {expected}, got {actual}")]
    SizeMismatch {
        buffer: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A tensor view could not be built over a buffer.
    #[error(transparent)]
    Shape(#[from] ShapeError),
}

/// Length check shared by every kernel entry point.
pub(crate) fn expect_len(
    buffer: &'static str,
    expected: usize,
    actual: usize,
) -> Result<(), KernelError> {
    if expected == actual {
        Ok(())
    } else {
        Err(KernelError::SizeMismatch {
            buffer,
            expected,
            actual,
        })
    }
}

// ============================================================================
// Kernel Traits
// ============================================================================

/// Evaluates a `vdim`-component nodal field at the quadrature points.
///
/// Input `x(dx, dy, c, e)`, output `y(qx, qy, c, e)`, first index fastest.
pub trait ScalarInterpolation: Send + Sync {
    /// Shape this kernel is specialized for: `(vdim, D1D, Q1D)`.
    fn key(&self) -> ShapeKey;

    /// Elements processed per batch sharing one basis load.
    fn batch_size(&self) -> usize;

    fn execute(
        &self,
        basis: &BasisTable,
        num_elements: usize,
        x: &[f64],
        y: &mut [f64],
        chunk: &ChunkConfig,
    ) -> Result<KernelStats, KernelError>;
}

/// Evaluates the reference gradient of a 2-component nodal field.
///
/// Input `x(dx, dy, c, e)`, output `y(qx, qy, c, d, e)` where `d` is the
/// reference direction of the derivative.
pub trait GradientInterpolation: Send + Sync {
    /// Shape this kernel is specialized for: `(2, D1D, Q1D)`.
    fn key(&self) -> ShapeKey;

    /// Elements processed per batch sharing one basis load.
    fn batch_size(&self) -> usize;

    fn execute(
        &self,
        basis: &BasisTable,
        num_elements: usize,
        x: &[f64],
        y: &mut [f64],
        chunk: &ChunkConfig,
    ) -> Result<KernelStats, KernelError>;
}

/// Per-point physics: stress, artificial viscosity and time-step bound.
pub trait QuadratureKernel: Send + Sync {
    /// Shape this kernel is specialized for: `(0, 0, Q1D)`.
    fn key(&self) -> ShapeKey;

    /// Update every point of every zone.
    ///
    /// `outputs.dt_est` must be seeded by the caller; each point only ever
    /// lowers its entry.
    fn execute(
        &self,
        params: &PhysicsParams,
        inputs: &PointInputs<'_>,
        outputs: &mut PointOutputs<'_>,
        chunk: &ChunkConfig,
    ) -> Result<KernelStats, KernelError>;
}
