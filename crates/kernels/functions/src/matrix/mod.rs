//! Matrix Operations
//!
//! Dense 2x2 kernels: determinant, inverse, symmetrization, symmetric
//! eigensystem and singular values.

mod basic;
mod decomp;

#[cfg(test)]
mod utils;

pub use basic::*;
pub use decomp::*;
