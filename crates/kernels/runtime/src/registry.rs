//! Shape-keyed kernel dispatch.
//!
//! The registry maps a runtime `(vdim, dofs per axis, points per axis)`
//! combination to one compile-time specialized kernel per family. It is
//! built once, then moved into the [`QuadratureUpdater`](crate::QuadratureUpdater),
//! which only ever reads it.
//!
//! # Supported shapes
//!
//! | Family | `(vdim, D1D, Q1D)` | Batch |
//! |--------|--------------------|-------|
//! | scalar interpolation | `(1, 2, 4)`, `(1, 3, 6)`, `(1, 4, 8)` | 8, 4, 2 |
//! | gradient interpolation | `(2, 3, 4)`, `(2, 4, 6)`, `(2, 5, 8)` | 1 |
//! | quadrature update | `Q1D ∈ {4, 6, 8}` | - |

use hydroquad_foundation::{DIM, ShapeKey};
use indexmap::IndexMap;
use tracing::debug;

use crate::error::{Error, Result};
use crate::interpolation::{GradientInterpolator, ScalarInterpolator};
use crate::kernel::{GradientInterpolation, KernelFamily, QuadratureKernel, ScalarInterpolation};
use crate::physics::QUpdateKernel;

/// Registry of specialized kernels, one map per family.
#[derive(Default)]
pub struct KernelRegistry {
    scalar: IndexMap<ShapeKey, Box<dyn ScalarInterpolation>>,
    gradient: IndexMap<ShapeKey, Box<dyn GradientInterpolation>>,
    quadrature: IndexMap<ShapeKey, Box<dyn QuadratureKernel>>,
}

impl KernelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every specialization shipped with the crate.
    pub fn with_supported_kernels() -> Self {
        let mut registry = Self::new();

        registry.register_scalar(Box::new(ScalarInterpolator::<1, 2, 4, 8>));
        registry.register_scalar(Box::new(ScalarInterpolator::<1, 3, 6, 4>));
        registry.register_scalar(Box::new(ScalarInterpolator::<1, 4, 8, 2>));

        registry.register_gradient(Box::new(GradientInterpolator::<3, 4, 1>));
        registry.register_gradient(Box::new(GradientInterpolator::<4, 6, 1>));
        registry.register_gradient(Box::new(GradientInterpolator::<5, 8, 1>));

        registry.register_quadrature(Box::new(QUpdateKernel::<4>));
        registry.register_quadrature(Box::new(QUpdateKernel::<6>));
        registry.register_quadrature(Box::new(QUpdateKernel::<8>));

        debug!(kernels = registry.len(), "kernel registry populated");
        registry
    }

    /// Register a scalar interpolation kernel under its own key.
    ///
    /// Returns the kernel previously registered for that key, if any.
    pub fn register_scalar(
        &mut self,
        kernel: Box<dyn ScalarInterpolation>,
    ) -> Option<Box<dyn ScalarInterpolation>> {
        self.scalar.insert(kernel.key(), kernel)
    }

    pub fn register_gradient(
        &mut self,
        kernel: Box<dyn GradientInterpolation>,
    ) -> Option<Box<dyn GradientInterpolation>> {
        self.gradient.insert(kernel.key(), kernel)
    }

    pub fn register_quadrature(
        &mut self,
        kernel: Box<dyn QuadratureKernel>,
    ) -> Option<Box<dyn QuadratureKernel>> {
        self.quadrature.insert(kernel.key(), kernel)
    }

    /// Scalar interpolation for a `vdim`-component field.
    pub fn scalar(
        &self,
        vdim: usize,
        dofs_1d: usize,
        quad_1d: usize,
    ) -> Result<&dyn ScalarInterpolation> {
        ShapeKey::from_sizes(vdim, dofs_1d, quad_1d)
            .and_then(|key| self.scalar.get(&key))
            .map(|kernel| kernel.as_ref())
            .ok_or(Error::UnsupportedShape {
                family: KernelFamily::ScalarInterpolation,
                vdim,
                dofs_1d,
                quad_1d,
            })
    }

    /// Gradient interpolation for a 2-component field.
    pub fn gradient(&self, dofs_1d: usize, quad_1d: usize) -> Result<&dyn GradientInterpolation> {
        ShapeKey::from_sizes(DIM, dofs_1d, quad_1d)
            .and_then(|key| self.gradient.get(&key))
            .map(|kernel| kernel.as_ref())
            .ok_or(Error::UnsupportedShape {
                family: KernelFamily::GradientInterpolation,
                vdim: DIM,
                dofs_1d,
                quad_1d,
            })
    }

    /// Point physics for `quad_1d` points per axis.
    pub fn quadrature(&self, quad_1d: usize) -> Result<&dyn QuadratureKernel> {
        ShapeKey::from_sizes(0, 0, quad_1d)
            .and_then(|key| self.quadrature.get(&key))
            .map(|kernel| kernel.as_ref())
            .ok_or(Error::UnsupportedShape {
                family: KernelFamily::QuadratureUpdate,
                vdim: 0,
                dofs_1d: 0,
                quad_1d,
            })
    }

    /// Registered keys of one family, in registration order.
    pub fn keys(&self, family: KernelFamily) -> Vec<ShapeKey> {
        match family {
            KernelFamily::ScalarInterpolation => self.scalar.keys().copied().collect(),
            KernelFamily::GradientInterpolation => self.gradient.keys().copied().collect(),
            KernelFamily::QuadratureUpdate => self.quadrature.keys().copied().collect(),
        }
    }

    /// Total number of registered kernels.
    pub fn len(&self) -> usize {
        self.scalar.len() + self.gradient.len() + self.quadrature.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for KernelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelRegistry")
            .field("scalar", &self.scalar.keys().collect::<Vec<_>>())
            .field("gradient", &self.gradient.keys().collect::<Vec<_>>())
            .field("quadrature", &self.quadrature.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_kernels_resolve() {
        let registry = KernelRegistry::with_supported_kernels();
        assert_eq!(registry.len(), 9);

        for (d1d_e, d1d_v, q1d, nbz) in [(2, 3, 4, 8), (3, 4, 6, 4), (4, 5, 8, 2)] {
            let scalar = registry.scalar(1, d1d_e, q1d).unwrap();
            assert_eq!(scalar.key(), ShapeKey::new(1, d1d_e as u8, q1d as u8));
            assert_eq!(scalar.batch_size(), nbz);

            let gradient = registry.gradient(d1d_v, q1d).unwrap();
            assert_eq!(gradient.batch_size(), 1);

            let physics = registry.quadrature(q1d).unwrap();
            assert_eq!(physics.key(), ShapeKey::quadrature(q1d as u8));
        }
    }

    #[test]
    fn test_missing_combination_is_an_error() {
        let registry = KernelRegistry::with_supported_kernels();
        assert!(matches!(
            registry.gradient(6, 10),
            Err(Error::UnsupportedShape {
                family: KernelFamily::GradientInterpolation,
                dofs_1d: 6,
                quad_1d: 10,
                ..
            })
        ));
        assert!(registry.scalar(2, 2, 4).is_err());
        assert!(registry.quadrature(5).is_err());
        // Sizes that do not even fit a key
        assert!(registry.quadrature(64).is_err());
    }

    #[test]
    fn test_register_replaces_and_keeps_order() {
        let mut registry = KernelRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.register_quadrature(Box::new(QUpdateKernel::<6>)).is_none());
        assert!(registry.register_quadrature(Box::new(QUpdateKernel::<4>)).is_none());
        assert!(registry.register_quadrature(Box::new(QUpdateKernel::<6>)).is_some());
        assert_eq!(
            registry.keys(KernelFamily::QuadratureUpdate),
            vec![ShapeKey::quadrature(6), ShapeKey::quadrature(4)]
        );
    }
}
