//! Sum-factorized dof → quadrature-point kernels.
//!
//! Both kernels contract one axis at a time instead of evaluating the full
//! 2-D basis, so an element costs `O(D1D·Q1D·(D1D + Q1D))` instead of
//! `O(D1D²·Q1D²)`:
//!
//! ```text
//! pass 1 (x axis):  DQ[dy][qx]  = Σ_dx B[qx][dx] · x(dx, dy)
//! pass 2 (y axis):  y(qx, qy)   = Σ_dy B[qy][dy] · DQ[dy][qx]
//! ```
//!
//! The gradient kernel runs pass 1 with both `B` and `G` and combines them in
//! pass 2 so that `d = 0` differentiates along `ξx` and `d = 1` along `ξy`.
//!
//! Elements are processed in batches of `NBZ`; each batch copies the basis
//! tables into stack arrays once and reuses them for every element of the
//! batch. Batches write disjoint output chunks and run in parallel.

use std::time::Instant;

use hydroquad_foundation::{DIM, ShapeKey, View, ViewMut};
use rayon::prelude::*;
use tracing::{instrument, trace};

use crate::basis::BasisTable;
use crate::executor::ChunkConfig;
use crate::kernel::{
    GradientInterpolation, KernelError, KernelStats, ScalarInterpolation, elapsed_ns, expect_len,
};

/// Copy a point-fastest `[Q1D × D1D]` table into `b[q][d]`.
#[inline]
fn load_basis<const D1D: usize, const Q1D: usize>(table: &[f64]) -> [[f64; D1D]; Q1D] {
    let mut b = [[0.0; D1D]; Q1D];
    for (q, row) in b.iter_mut().enumerate() {
        for (d, value) in row.iter_mut().enumerate() {
            *value = table[q + Q1D * d];
        }
    }
    b
}

fn check_basis(basis: &BasisTable, dofs_1d: usize, quad_1d: usize) -> Result<(), KernelError> {
    expect_len("basis dofs_1d", dofs_1d, basis.dofs_1d())?;
    expect_len("basis quad_1d", quad_1d, basis.quad_1d())
}

// ============================================================================
// Scalar Interpolation
// ============================================================================

/// Values of a `VDIM`-component field at the quadrature points.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarInterpolator<const VDIM: usize, const D1D: usize, const Q1D: usize, const NBZ: usize>;

impl<const VDIM: usize, const D1D: usize, const Q1D: usize, const NBZ: usize>
    ScalarInterpolator<VDIM, D1D, Q1D, NBZ>
{
    const DOFS_PER_ELEMENT: usize = D1D * D1D * VDIM;
    const POINTS_PER_ELEMENT: usize = Q1D * Q1D * VDIM;
}

impl<const VDIM: usize, const D1D: usize, const Q1D: usize, const NBZ: usize> ScalarInterpolation
    for ScalarInterpolator<VDIM, D1D, Q1D, NBZ>
{
    fn key(&self) -> ShapeKey {
        ShapeKey::new(VDIM as u8, D1D as u8, Q1D as u8)
    }

    fn batch_size(&self) -> usize {
        NBZ
    }

    #[instrument(skip_all, name = "scalar_interpolation", fields(vdim = VDIM, d1d = D1D, q1d = Q1D, elements = num_elements))]
    fn execute(
        &self,
        basis: &BasisTable,
        num_elements: usize,
        x: &[f64],
        y: &mut [f64],
        chunk: &ChunkConfig,
    ) -> Result<KernelStats, KernelError> {
        check_basis(basis, D1D, Q1D)?;
        expect_len("nodal input", Self::DOFS_PER_ELEMENT * num_elements, x.len())?;
        expect_len("point output", Self::POINTS_PER_ELEMENT * num_elements, y.len())?;

        let start = Instant::now();
        let batches = num_elements.div_ceil(NBZ);
        if num_elements > 0 {
            y.par_chunks_mut(NBZ * Self::POINTS_PER_ELEMENT)
                .zip(x.par_chunks(NBZ * Self::DOFS_PER_ELEMENT))
                .with_min_len(chunk.min_len(batches))
                .try_for_each(|(y_batch, x_batch)| -> Result<(), KernelError> {
                    let b = load_basis::<D1D, Q1D>(basis.values());
                    let nb = y_batch.len() / Self::POINTS_PER_ELEMENT;
                    let x = View::new(x_batch, [D1D, D1D, VDIM, nb])?;
                    let mut y = ViewMut::new(y_batch, [Q1D, Q1D, VDIM, nb])?;

                    for e in 0..nb {
                        for c in 0..VDIM {
                            let mut dq = [[0.0; Q1D]; D1D];
                            for (dy, dq_row) in dq.iter_mut().enumerate() {
                                for (qx, out) in dq_row.iter_mut().enumerate() {
                                    let mut s = 0.0;
                                    for dx in 0..D1D {
                                        s += b[qx][dx] * x.at([dx, dy, c, e]);
                                    }
                                    *out = s;
                                }
                            }
                            for qy in 0..Q1D {
                                for qx in 0..Q1D {
                                    let mut s = 0.0;
                                    for dy in 0..D1D {
                                        s += b[qy][dy] * dq[dy][qx];
                                    }
                                    y.set([qx, qy, c, e], s);
                                }
                            }
                        }
                    }
                    Ok(())
                })?;
        }

        let execution_ns = elapsed_ns(start);
        trace!(batches, execution_ns, "scalar interpolation complete");
        Ok(KernelStats {
            work_items: num_elements,
            degenerate_points: 0,
            execution_ns: Some(execution_ns),
        })
    }
}

// ============================================================================
// Gradient Interpolation
// ============================================================================

/// Reference gradient of a 2-component field at the quadrature points.
///
/// Output `y(qx, qy, c, d, e) = ∂x_c / ∂ξ_d`, which for the position field is
/// the column-major Jacobian `J(c, d)` of each point.
#[derive(Debug, Clone, Copy, Default)]
pub struct GradientInterpolator<const D1D: usize, const Q1D: usize, const NBZ: usize>;

impl<const D1D: usize, const Q1D: usize, const NBZ: usize> GradientInterpolator<D1D, Q1D, NBZ> {
    const DOFS_PER_ELEMENT: usize = D1D * D1D * DIM;
    const POINTS_PER_ELEMENT: usize = Q1D * Q1D * DIM * DIM;
}

impl<const D1D: usize, const Q1D: usize, const NBZ: usize> GradientInterpolation
    for GradientInterpolator<D1D, Q1D, NBZ>
{
    fn key(&self) -> ShapeKey {
        ShapeKey::new(DIM as u8, D1D as u8, Q1D as u8)
    }

    fn batch_size(&self) -> usize {
        NBZ
    }

    #[instrument(skip_all, name = "gradient_interpolation", fields(d1d = D1D, q1d = Q1D, elements = num_elements))]
    fn execute(
        &self,
        basis: &BasisTable,
        num_elements: usize,
        x: &[f64],
        y: &mut [f64],
        chunk: &ChunkConfig,
    ) -> Result<KernelStats, KernelError> {
        check_basis(basis, D1D, Q1D)?;
        expect_len("nodal input", Self::DOFS_PER_ELEMENT * num_elements, x.len())?;
        expect_len("point output", Self::POINTS_PER_ELEMENT * num_elements, y.len())?;

        let start = Instant::now();
        let batches = num_elements.div_ceil(NBZ);
        if num_elements > 0 {
            y.par_chunks_mut(NBZ * Self::POINTS_PER_ELEMENT)
                .zip(x.par_chunks(NBZ * Self::DOFS_PER_ELEMENT))
                .with_min_len(chunk.min_len(batches))
                .try_for_each(|(y_batch, x_batch)| -> Result<(), KernelError> {
                    let b = load_basis::<D1D, Q1D>(basis.values());
                    let g = load_basis::<D1D, Q1D>(basis.derivatives());
                    let nb = y_batch.len() / Self::POINTS_PER_ELEMENT;
                    let x = View::new(x_batch, [D1D, D1D, DIM, nb])?;
                    let mut y = ViewMut::new(y_batch, [Q1D, Q1D, DIM, DIM, nb])?;

                    for e in 0..nb {
                        for c in 0..DIM {
                            // Values and x-derivatives along the first axis
                            let mut dq_value = [[0.0; Q1D]; D1D];
                            let mut dq_deriv = [[0.0; Q1D]; D1D];
                            for dy in 0..D1D {
                                for qx in 0..Q1D {
                                    let mut value = 0.0;
                                    let mut deriv = 0.0;
                                    for dx in 0..D1D {
                                        let coords = x.at([dx, dy, c, e]);
                                        value += b[qx][dx] * coords;
                                        deriv += g[qx][dx] * coords;
                                    }
                                    dq_value[dy][qx] = value;
                                    dq_deriv[dy][qx] = deriv;
                                }
                            }

                            for qy in 0..Q1D {
                                for qx in 0..Q1D {
                                    let mut du_dx = 0.0;
                                    let mut du_dy = 0.0;
                                    for dy in 0..D1D {
                                        du_dx += dq_deriv[dy][qx] * b[qy][dy];
                                        du_dy += dq_value[dy][qx] * g[qy][dy];
                                    }
                                    y.set([qx, qy, c, 0, e], du_dx);
                                    y.set([qx, qy, c, 1, e], du_dy);
                                }
                            }
                        }
                    }
                    Ok(())
                })?;
        }

        let execution_ns = elapsed_ns(start);
        trace!(batches, execution_ns, "gradient interpolation complete");
        Ok(KernelStats {
            work_items: num_elements,
            degenerate_points: 0,
            execution_ns: Some(execution_ns),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis::{QuadratureRule, gauss_legendre, gauss_lobatto_nodes};

    /// Nodal values of `f` on the tensor grid of `nodes`, element-local layout.
    fn nodal_values(nodes: &[f64], f: impl Fn(f64, f64) -> f64) -> Vec<f64> {
        let mut out = Vec::with_capacity(nodes.len() * nodes.len());
        for &ty in nodes {
            for &tx in nodes {
                out.push(f(tx, ty));
            }
        }
        out
    }

    fn bilinear(tx: f64, ty: f64) -> f64 {
        1.5 - 2.0 * tx + 0.25 * ty + 3.0 * tx * ty
    }

    #[test]
    fn test_scalar_reproduces_bilinear_field() {
        let rule = QuadratureRule::gauss_legendre(4);
        let basis = BasisTable::l2(2, &rule);
        let element = nodal_values(&gauss_legendre(2).0, bilinear);

        // Nine elements: one full batch of eight plus a partial batch
        let num_elements = 9;
        let x: Vec<f64> = (0..num_elements)
            .flat_map(|e| element.iter().map(move |v| v + e as f64))
            .collect();
        let mut y = vec![0.0; 16 * num_elements];

        let kernel = ScalarInterpolator::<1, 2, 4, 8>;
        let stats = kernel
            .execute(&basis, num_elements, &x, &mut y, &ChunkConfig::default())
            .unwrap();
        assert_eq!(stats.work_items, 9);

        let points = rule.points();
        for e in 0..num_elements {
            for qy in 0..4 {
                for qx in 0..4 {
                    let expected = bilinear(points[qx], points[qy]) + e as f64;
                    let got = y[qx + 4 * qy + 16 * e];
                    assert!((got - expected).abs() < 1e-13, "e={e} q=({qx},{qy})");
                }
            }
        }
    }

    #[test]
    fn test_scalar_parallel_matches_serial_bitwise() {
        let rule = QuadratureRule::gauss_legendre(6);
        let basis = BasisTable::l2(3, &rule);
        let num_elements = 11;
        let x: Vec<f64> = (0..9 * num_elements).map(|i| (i as f64 * 0.7).cos()).collect();

        let kernel = ScalarInterpolator::<1, 3, 6, 4>;
        let mut serial = vec![0.0; 36 * num_elements];
        let mut parallel = vec![0.0; 36 * num_elements];
        kernel
            .execute(&basis, num_elements, &x, &mut serial, &ChunkConfig::default())
            .unwrap();
        kernel
            .execute(&basis, num_elements, &x, &mut parallel, &ChunkConfig::fine_grained())
            .unwrap();
        assert!(serial.iter().zip(&parallel).all(|(a, b)| a.to_bits() == b.to_bits()));
    }

    #[test]
    fn test_scalar_components_are_independent() {
        let rule = QuadratureRule::gauss_legendre(4);
        let basis = BasisTable::l2(2, &rule);
        // Component 0 is constant 2, component 1 is constant -1
        let x = [[2.0; 4], [-1.0; 4]].concat();
        let mut y = vec![0.0; 32];
        ScalarInterpolator::<2, 2, 4, 8>
            .execute(&basis, 1, &x, &mut y, &ChunkConfig::default())
            .unwrap();
        assert!(y[..16].iter().all(|v| (v - 2.0).abs() < 1e-14));
        assert!(y[16..].iter().all(|v| (v + 1.0).abs() < 1e-14));
    }

    #[test]
    fn test_gradient_of_affine_map_is_constant() {
        let rule = QuadratureRule::gauss_legendre(4);
        let basis = BasisTable::h1(3, &rule);
        let nodes = gauss_lobatto_nodes(3);

        // x(ξ) = A ξ + b with A = [[2, 0.5], [-1, 3]]
        let a = [[2.0, 0.5], [-1.0, 3.0]];
        let x = [
            nodal_values(&nodes, |tx, ty| a[0][0] * tx + a[0][1] * ty + 1.0),
            nodal_values(&nodes, |tx, ty| a[1][0] * tx + a[1][1] * ty - 4.0),
        ]
        .concat();
        let mut y = vec![0.0; 64];

        GradientInterpolator::<3, 4, 1>
            .execute(&basis, 1, &x, &mut y, &ChunkConfig::default())
            .unwrap();

        let view = View::new(&y, [4, 4, 2, 2, 1]).unwrap();
        for qy in 0..4 {
            for qx in 0..4 {
                for c in 0..2 {
                    for d in 0..2 {
                        assert!((view.at([qx, qy, c, d, 0]) - a[c][d]).abs() < 1e-13);
                    }
                }
            }
        }
    }

    #[test]
    fn test_gradient_of_bilinear_term() {
        let rule = QuadratureRule::gauss_legendre(6);
        let basis = BasisTable::h1(4, &rule);
        let nodes = gauss_lobatto_nodes(4);
        // Component 0 is ξx·ξy, component 1 is zero
        let x = [nodal_values(&nodes, |tx, ty| tx * ty), vec![0.0; 16]].concat();
        let mut y = vec![0.0; 144];

        GradientInterpolator::<4, 6, 1>
            .execute(&basis, 1, &x, &mut y, &ChunkConfig::fine_grained())
            .unwrap();

        let view = View::new(&y, [6, 6, 2, 2, 1]).unwrap();
        let points = rule.points();
        for qy in 0..6 {
            for qx in 0..6 {
                assert!((view.at([qx, qy, 0, 0, 0]) - points[qy]).abs() < 1e-13);
                assert!((view.at([qx, qy, 0, 1, 0]) - points[qx]).abs() < 1e-13);
                assert!(view.at([qx, qy, 1, 0, 0]).abs() < 1e-13);
            }
        }
    }

    #[test]
    fn test_shape_contract_violations() {
        let rule = QuadratureRule::gauss_legendre(4);
        let basis = BasisTable::h1(3, &rule);
        let mut y = vec![0.0; 64];

        let err = GradientInterpolator::<3, 4, 1>
            .execute(&basis, 1, &[0.0; 17], &mut y, &ChunkConfig::default())
            .unwrap_err();
        assert_eq!(
            err,
            KernelError::SizeMismatch {
                buffer: "nodal input",
                expected: 18,
                actual: 17
            }
        );

        let wrong_basis = BasisTable::h1(4, &rule);
        assert!(
            GradientInterpolator::<3, 4, 1>
                .execute(&wrong_basis, 1, &[0.0; 18], &mut y, &ChunkConfig::default())
                .is_err()
        );
    }

    #[test]
    fn test_keys() {
        assert_eq!(
            ScalarInterpolator::<1, 2, 4, 8>.key(),
            ShapeKey::new(1, 2, 4)
        );
        assert_eq!(GradientInterpolator::<5, 8, 1>.key(), ShapeKey::new(2, 5, 8));
        assert_eq!(ScalarInterpolator::<1, 4, 8, 2>.batch_size(), 2);
    }
}
