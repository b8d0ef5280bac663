//! Hydroquad Foundation
//!
//! Core value types shared across the quadrature-update stack:
//!
//! - [`Mat2`] / [`Vec2`] - column-major 2x2 matrices and 2-vectors
//! - [`ShapeKey`] - discrete (vdim, dofs per axis, points per axis) key used
//!   to select specialized kernels
//! - [`Shape`], [`View`], [`ViewMut`] - fixed-rank views over flat buffers
//!   with first-index-fastest layout

pub mod matrix_ops;
pub mod shape;
pub mod view;

pub use matrix_ops::{Mat2, Vec2};
pub use shape::ShapeKey;
pub use view::{Shape, ShapeError, View, ViewMut};

/// Spatial dimension of the quadrature-update pipeline.
pub const DIM: usize = 2;

/// Number of entries in a `DIM x DIM` tensor.
pub const DIM_SQ: usize = DIM * DIM;
