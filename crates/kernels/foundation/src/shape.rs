//! Discrete shape keys for kernel specialization.
//!
//! A [`ShapeKey`] names one point in the (vector dimension, dofs per axis,
//! quadrature points per axis) space. Kernels are specialized at compile time
//! for a fixed key and looked up at runtime by it.

use std::fmt;

/// Key identifying a specialized tensor-product kernel.
///
/// The packed form `(vdim << 8) | (dofs_1d << 4) | quad_1d` is used for
/// diagnostics, which limits every component to `0..16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeKey {
    /// Vector dimension of the interpolated field (0 when not applicable).
    pub vdim: u8,
    /// Degrees of freedom per axis (`D1D`).
    pub dofs_1d: u8,
    /// Quadrature points per axis (`Q1D`).
    pub quad_1d: u8,
}

impl ShapeKey {
    pub const fn new(vdim: u8, dofs_1d: u8, quad_1d: u8) -> Self {
        Self {
            vdim,
            dofs_1d,
            quad_1d,
        }
    }

    /// Key for kernels that only depend on the number of points per axis.
    pub const fn quadrature(quad_1d: u8) -> Self {
        Self::new(0, 0, quad_1d)
    }

    /// Build a key from runtime sizes, rejecting values that do not fit.
    pub fn from_sizes(vdim: usize, dofs_1d: usize, quad_1d: usize) -> Option<Self> {
        let fits = |n: usize| n < 16;
        if fits(vdim) && fits(dofs_1d) && fits(quad_1d) {
            Some(Self::new(vdim as u8, dofs_1d as u8, quad_1d as u8))
        } else {
            None
        }
    }

    /// Packed `0xVDQ` representation.
    pub const fn packed(&self) -> u32 {
        ((self.vdim as u32) << 8) | ((self.dofs_1d as u32) << 4) | self.quad_1d as u32
    }

    /// Quadrature points per element (`Q1D^2`).
    pub const fn points_per_element(&self) -> usize {
        (self.quad_1d as usize) * (self.quad_1d as usize)
    }

    /// Dofs per element and component (`D1D^2`).
    pub const fn dofs_per_element(&self) -> usize {
        (self.dofs_1d as usize) * (self.dofs_1d as usize)
    }
}

impl fmt::Display for ShapeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "vdim={} dofs_1d={} quad_1d={} (0x{:X})",
            self.vdim,
            self.dofs_1d,
            self.quad_1d,
            self.packed()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_matches_hex_layout() {
        assert_eq!(ShapeKey::new(1, 2, 4).packed(), 0x124);
        assert_eq!(ShapeKey::new(0, 5, 8).packed(), 0x58);
        assert_eq!(ShapeKey::quadrature(6).packed(), 0x6);
    }

    #[test]
    fn test_from_sizes_rejects_overflowing_components() {
        assert_eq!(ShapeKey::from_sizes(1, 3, 6), Some(ShapeKey::new(1, 3, 6)));
        assert_eq!(ShapeKey::from_sizes(1, 3, 16), None);
    }

    #[test]
    fn test_display_names_every_component() {
        let s = ShapeKey::new(1, 3, 6).to_string();
        assert!(s.contains("dofs_1d=3"));
        assert!(s.contains("quad_1d=6"));
        assert!(s.contains("0x136"));
    }
}
