//! Quadrature-point physics.
//!
//! For every `(zone, point)` the kernel turns the interpolated Jacobian,
//! velocity gradient and energy into the point's contribution to the force
//! operator and its local time-step bound:
//!
//! ```text
//! J, detJ ──► ρ = ρ0·detJ0·w / (w·detJ)
//!              e = max(0, e)     p = (γ−1)ρe     c = √(γ(γ−1)e)
//!              σ = −p·I
//!              σ += μ_v · sym(∇v·J⁻¹)                       (viscosity)
//!              1/dt = c/h_min + 2.5·μ_v/(ρ·h_min²)
//!              σJ⁻ᵀ·w·detJ ──► stressJinvT planes
//! ```
//!
//! # Layouts
//!
//! With `n = nzones · nqp` and `zq = z · nqp + q`:
//!
//! | Buffer | Index |
//! |--------|-------|
//! | `jacobian`, `velocity_gradient` | `q + nqp·(c + 2d) + 4·nqp·z` for `(c, d)` |
//! | `jac0inv` | `4·zq + k`, column-major |
//! | `energy`, `rho0_detj0w`, `dt_est` | `zq` |
//! | `stress_jinv_t` | `zq + n·(gd + 2·vd)` for component `(vd, gd)` |
//!
//! # Degenerate geometry
//!
//! A point whose Jacobian is numerically singular is not inverted: its
//! stress entries are zero and its time-step bound is zero. A zone with any
//! negative Jacobian determinant sets every one of its points' bounds to
//! zero, which signals the driver to retry with a smaller step.

use std::time::Instant;

use hydroquad_foundation::{DIM_SQ, Mat2, ShapeKey};
use hydroquad_functions::{
    SingularValue, determinant_mat2, inverse_mat2, is_near_singular_mat2, norm2,
    singular_value_mat2, smooth_step_01, symmetric_eigen_mat2, symmetrize_mat2,
};
use rayon::prelude::*;
use tracing::{instrument, trace};

use crate::config::HydroConfig;
use crate::executor::ChunkConfig;
use crate::kernel::{KernelError, KernelStats, QuadratureKernel, elapsed_ns, expect_len};

/// Half-width of the smoothed shock switch on the compression eigenvalue.
const SHOCK_SWITCH_EPS: f64 = 1e-12;

/// Scalar constants of the point update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsParams {
    pub gamma: f64,
    pub cfl: f64,
    /// Initial mesh length scale.
    pub h0: f64,
    /// Kinematic polynomial order, as a divisor of the smallest singular value.
    pub h1order: f64,
    pub use_viscosity: bool,
}

impl PhysicsParams {
    pub fn new(config: &HydroConfig, h0: f64) -> Self {
        Self {
            gamma: config.gamma,
            cfl: config.cfl,
            h0,
            h1order: config.h1order(),
            use_viscosity: config.use_viscosity,
        }
    }
}

/// Read-only per-point inputs of one update.
#[derive(Debug, Clone, Copy)]
pub struct PointInputs<'a> {
    pub num_zones: usize,
    /// Quadrature weights, one per point of the reference square.
    pub weights: &'a [f64],
    /// Inverse reference Jacobians.
    pub jac0inv: &'a [f64],
    pub rho0_detj0w: &'a [f64],
    pub energy: &'a [f64],
    /// Current Jacobians `∂x/∂ξ`.
    pub jacobian: &'a [f64],
    /// Velocity gradients `∂v/∂ξ`.
    pub velocity_gradient: &'a [f64],
}

/// Per-point outputs of one update.
#[derive(Debug)]
pub struct PointOutputs<'a> {
    /// Time-step bounds, seeded by the caller.
    pub dt_est: &'a mut [f64],
    pub stress_jinv_t: &'a mut [f64],
}

/// One point's inputs, gathered from the strided buffers.
#[derive(Debug, Clone, Copy)]
struct PointSample {
    jacobian: Mat2,
    velocity_gradient: Mat2,
    jac0inv: Mat2,
    rho0_detj0w: f64,
    weight: f64,
    energy: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PointResult {
    /// Jacobian too close to singular to invert.
    Degenerate,
    Regular {
        stress_jinv_t: Mat2,
        /// Inverse of the point's unscaled time-step bound.
        inv_dt: f64,
    },
}

/// Stress and inverse time step of a single point.
fn point_update(params: &PhysicsParams, sample: &PointSample) -> PointResult {
    let jac = sample.jacobian;
    if is_near_singular_mat2(&jac) {
        return PointResult::Degenerate;
    }
    let Ok(jinv) = inverse_mat2(&jac) else {
        return PointResult::Degenerate;
    };
    let det_j = determinant_mat2(&jac);

    let gamma = params.gamma;
    let rho = sample.rho0_detj0w / (sample.weight * det_j);
    let energy = sample.energy.max(0.0);
    let pressure = (gamma - 1.0) * rho * energy;
    let sound_speed = (gamma * (gamma - 1.0) * energy).sqrt();

    let mut stress = Mat2::diagonal(-pressure, -pressure);

    let mut visc_coeff = 0.0;
    if params.use_viscosity {
        let sgrad_v = symmetrize_mat2(sample.velocity_gradient * jinv);
        let eigen = symmetric_eigen_mat2(&sgrad_v);
        let mu = eigen.values[0];
        let compr_dir = eigen.min_vector();

        // Length scale along the compression direction, relative to the
        // initial mesh
        let jpi = jac * sample.jac0inv;
        let ph_dir = jpi.transform(compr_dir);
        let h = params.h0 * norm2(&ph_dir) / norm2(&compr_dir);

        visc_coeff = 2.0 * rho * h * h * mu.abs();
        visc_coeff += 0.5
            * rho
            * h
            * sound_speed
            * (1.0 - smooth_step_01(mu - 2.0 * SHOCK_SWITCH_EPS, SHOCK_SWITCH_EPS));
        stress.add_scaled(visc_coeff, &sgrad_v);
    }

    let sv = singular_value_mat2(&jac, SingularValue::Smallest);
    let h_min = sv / params.h1order;
    let inv_dt = sound_speed / h_min + 2.5 * visc_coeff / (rho * h_min * h_min);

    PointResult::Regular {
        stress_jinv_t: stress.mul_transpose(&jinv) * (sample.weight * det_j),
        inv_dt,
    }
}

/// Point `q` of a zone block stored as four strided planes.
#[inline]
fn strided_mat2(block: &[f64], nqp: usize, q: usize) -> Mat2 {
    Mat2([block[q], block[q + nqp], block[q + 2 * nqp], block[q + 3 * nqp]])
}

/// Update every point of zone `z`. Returns the number of points whose
/// time-step bound was forced to zero.
fn update_zone(
    params: &PhysicsParams,
    inputs: &PointInputs<'_>,
    nqp: usize,
    z: usize,
    dt_est: &mut [f64],
    stress: [&mut [f64]; DIM_SQ],
) -> usize {
    let block = DIM_SQ * nqp;
    let jacobians = &inputs.jacobian[block * z..block * (z + 1)];
    let velocity_gradients = &inputs.velocity_gradient[block * z..block * (z + 1)];
    let jac0inv = &inputs.jac0inv[block * z..block * (z + 1)];
    let rho0_detj0w = &inputs.rho0_detj0w[nqp * z..nqp * (z + 1)];
    let energy = &inputs.energy[nqp * z..nqp * (z + 1)];

    let min_det_j = (0..nqp)
        .map(|q| determinant_mat2(&strided_mat2(jacobians, nqp, q)))
        .fold(f64::INFINITY, f64::min);
    let [s00, s01, s10, s11] = stress;

    let mut degenerate = 0;
    for q in 0..nqp {
        let sample = PointSample {
            jacobian: strided_mat2(jacobians, nqp, q),
            velocity_gradient: strided_mat2(velocity_gradients, nqp, q),
            jac0inv: Mat2([
                jac0inv[DIM_SQ * q],
                jac0inv[DIM_SQ * q + 1],
                jac0inv[DIM_SQ * q + 2],
                jac0inv[DIM_SQ * q + 3],
            ]),
            rho0_detj0w: rho0_detj0w[q],
            weight: inputs.weights[q],
            energy: energy[q],
        };

        match point_update(params, &sample) {
            PointResult::Degenerate => {
                s00[q] = 0.0;
                s01[q] = 0.0;
                s10[q] = 0.0;
                s11[q] = 0.0;
                dt_est[q] = 0.0;
                degenerate += 1;
            }
            PointResult::Regular {
                stress_jinv_t,
                inv_dt,
            } => {
                s00[q] = stress_jinv_t.at(0, 0);
                s01[q] = stress_jinv_t.at(0, 1);
                s10[q] = stress_jinv_t.at(1, 0);
                s11[q] = stress_jinv_t.at(1, 1);
                if min_det_j < 0.0 {
                    dt_est[q] = 0.0;
                    degenerate += 1;
                } else if inv_dt > 0.0 {
                    dt_est[q] = dt_est[q].min(params.cfl / inv_dt);
                }
            }
        }
    }
    degenerate
}

// ============================================================================
// Kernel
// ============================================================================

/// Point physics specialized for `Q1D` points per axis.
#[derive(Debug, Clone, Copy, Default)]
pub struct QUpdateKernel<const Q1D: usize>;

impl<const Q1D: usize> QUpdateKernel<Q1D> {
    const NQP: usize = Q1D * Q1D;
}

impl<const Q1D: usize> QuadratureKernel for QUpdateKernel<Q1D> {
    fn key(&self) -> ShapeKey {
        ShapeKey::quadrature(Q1D as u8)
    }

    #[instrument(skip_all, name = "quadrature_update", fields(q1d = Q1D, zones = inputs.num_zones))]
    fn execute(
        &self,
        params: &PhysicsParams,
        inputs: &PointInputs<'_>,
        outputs: &mut PointOutputs<'_>,
        chunk: &ChunkConfig,
    ) -> Result<KernelStats, KernelError> {
        let nqp = Self::NQP;
        let num_zones = inputs.num_zones;
        let n = num_zones * nqp;

        expect_len("weights", nqp, inputs.weights.len())?;
        expect_len("jac0inv", DIM_SQ * n, inputs.jac0inv.len())?;
        expect_len("rho0DetJ0w", n, inputs.rho0_detj0w.len())?;
        expect_len("energy", n, inputs.energy.len())?;
        expect_len("jacobian", DIM_SQ * n, inputs.jacobian.len())?;
        expect_len("velocity gradient", DIM_SQ * n, inputs.velocity_gradient.len())?;
        expect_len("dt_est", n, outputs.dt_est.len())?;
        expect_len("stressJinvT", DIM_SQ * n, outputs.stress_jinv_t.len())?;

        let start = Instant::now();
        let degenerate_points: usize = if num_zones == 0 {
            0
        } else {
            let (s00, rest) = outputs.stress_jinv_t.split_at_mut(n);
            let (s01, rest) = rest.split_at_mut(n);
            let (s10, s11) = rest.split_at_mut(n);
            (
                outputs.dt_est.par_chunks_mut(nqp),
                s00.par_chunks_mut(nqp),
                s01.par_chunks_mut(nqp),
                s10.par_chunks_mut(nqp),
                s11.par_chunks_mut(nqp),
            )
                .into_par_iter()
                .enumerate()
                .with_min_len(chunk.min_len(num_zones))
                .map(|(z, (dt, a, b, c, d))| update_zone(params, inputs, nqp, z, dt, [a, b, c, d]))
                .sum()
        };

        let execution_ns = elapsed_ns(start);
        trace!(degenerate_points, execution_ns, "quadrature update complete");
        Ok(KernelStats {
            work_items: num_zones,
            degenerate_points,
            execution_ns: Some(execution_ns),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GAMMA: f64 = 1.4;

    fn params(use_viscosity: bool) -> PhysicsParams {
        PhysicsParams {
            gamma: GAMMA,
            cfl: 0.5,
            h0: 0.5,
            h1order: 2.0,
            use_viscosity,
        }
    }

    fn identity_sample() -> PointSample {
        PointSample {
            jacobian: Mat2::IDENTITY,
            velocity_gradient: Mat2::ZERO,
            jac0inv: Mat2::IDENTITY,
            rho0_detj0w: 0.25,
            weight: 0.25,
            energy: 1.0,
        }
    }

    fn regular(result: PointResult) -> (Mat2, f64) {
        match result {
            PointResult::Regular {
                stress_jinv_t,
                inv_dt,
            } => (stress_jinv_t, inv_dt),
            PointResult::Degenerate => panic!("unexpected degenerate point"),
        }
    }

    #[test]
    fn test_identity_point_without_viscosity() {
        let (stress, inv_dt) = regular(point_update(&params(false), &identity_sample()));
        // p = 0.4, weight·detJ = 0.25
        assert!((stress.at(0, 0) + 0.1).abs() < 1e-15);
        assert!((stress.at(1, 1) + 0.1).abs() < 1e-15);
        assert_eq!(stress.at(0, 1), 0.0);
        // h_min = 1/2, c = √0.56
        assert!((inv_dt - 2.0 * 0.56f64.sqrt()).abs() < 1e-14);
    }

    #[test]
    fn test_shock_term_active_at_rest() {
        // ∇v = 0 gives μ = 0, where the smoothed switch is still fully on
        let (stress, inv_dt) = regular(point_update(&params(true), &identity_sample()));
        let c = 0.56f64.sqrt();
        assert!((stress.at(0, 0) + 0.1).abs() < 1e-15);
        // visc = 0.5·ρ·h·c = 0.25c, 1/dt = c/h_min + 2.5·visc/h_min² = 4.5c
        assert!((inv_dt - 4.5 * c).abs() < 1e-14);
    }

    #[test]
    fn test_uniform_compression_point() {
        let sample = PointSample {
            velocity_gradient: Mat2::diagonal(-1.0, -1.0),
            ..identity_sample()
        };
        let (stress, inv_dt) = regular(point_update(&params(true), &sample));
        let c = 0.56f64.sqrt();
        let visc = 2.0 * 0.25 + 0.25 * c;
        let expected_stress = -(0.4 + visc) * 0.25;
        assert!((stress.at(0, 0) - expected_stress).abs() < 1e-14);
        assert!((stress.at(1, 1) - expected_stress).abs() < 1e-14);
        assert!((inv_dt - (2.0 * c + 10.0 * visc)).abs() < 1e-13);
    }

    #[test]
    fn test_negative_energy_is_clamped() {
        let sample = PointSample {
            energy: -3.0,
            ..identity_sample()
        };
        let (stress, inv_dt) = regular(point_update(&params(false), &sample));
        assert_eq!(stress, Mat2::ZERO);
        assert_eq!(inv_dt, 0.0);
    }

    #[test]
    fn test_collapsed_point_is_degenerate() {
        let sample = PointSample {
            jacobian: Mat2::diagonal(0.0, 1.0),
            ..identity_sample()
        };
        assert_eq!(point_update(&params(true), &sample), PointResult::Degenerate);

        let sample = PointSample {
            jacobian: Mat2([f64::NAN, 0.0, 0.0, 1.0]),
            ..identity_sample()
        };
        assert_eq!(point_update(&params(true), &sample), PointResult::Degenerate);
    }

    #[test]
    fn test_nearly_singular_point_is_degenerate() {
        // det ≈ 1e-15 is positive but below 100·ε·‖J‖²
        let sample = PointSample {
            jacobian: Mat2::from_rows([1.0, 1.0], [1.0, 1.0 + 1e-15]),
            ..identity_sample()
        };
        assert!(determinant_mat2(&sample.jacobian) > 0.0);
        assert_eq!(point_update(&params(true), &sample), PointResult::Degenerate);
    }

    #[test]
    fn test_stretched_point_compression_along_long_axis() {
        // J = diag(2, 1), ∇v = diag(-1, 0): sgrad = diag(-1/2, 0), so μ = -1/2
        // along ξx, which the current map stretches to h = 2·h0 = 1
        let sample = PointSample {
            jacobian: Mat2::diagonal(2.0, 1.0),
            velocity_gradient: Mat2::diagonal(-1.0, 0.0),
            ..identity_sample()
        };
        let (stress, inv_dt) = regular(point_update(&params(true), &sample));
        let c = 0.56f64.sqrt();
        // ρ = 1/2, visc = 2·ρ·h²·|μ| + ½·ρ·h·c, h_min = 1/2
        let visc = 0.5 + 0.25 * c;
        assert!((inv_dt - (2.0 * c + 20.0 * visc)).abs() < 1e-13);
        assert!((inv_dt - (10.0 + 7.0 * c)).abs() < 1e-13);

        // σ = diag(-p - visc/2, -p), σ·J⁻ᵀ·w·detJ with w·detJ = 1/2
        let p = 0.2;
        assert!((stress.at(0, 0) - (-p - 0.5 * visc) * 0.5 * 0.5).abs() < 1e-14);
        assert!((stress.at(1, 1) - (-p) * 0.5).abs() < 1e-14);
    }

    #[test]
    fn test_reference_map_enters_length_scale() {
        // Same current state, but the reference zone was already stretched:
        // J·Jac0inv = I, so h falls back to h0
        let sample = PointSample {
            jacobian: Mat2::diagonal(2.0, 1.0),
            velocity_gradient: Mat2::diagonal(-1.0, 0.0),
            jac0inv: Mat2::diagonal(0.5, 1.0),
            ..identity_sample()
        };
        let (_, inv_dt) = regular(point_update(&params(true), &sample));
        let c = 0.56f64.sqrt();
        // h = 1/2: visc = 2·½·¼·½ + ½·½·½·c
        let visc = 0.125 + 0.125 * c;
        assert!((inv_dt - (2.0 * c + 20.0 * visc)).abs() < 1e-13);
    }

    #[test]
    fn test_sheared_point_uses_smallest_eigenvector() {
        // J = [[2, 1], [0, 1]] and ∇v = S·J with S = [[0, -1], [-1, 0]], so
        // sgrad = S: μ = -1 along (1, 1)/√2, mapped by J to (3, 1)/√2 and
        // h = √5·h0. The other eigenvector gives h0, and Jᵀ gives 2·h0.
        let jacobian = Mat2::from_rows([2.0, 1.0], [0.0, 1.0]);
        let sample = PointSample {
            jacobian,
            velocity_gradient: Mat2::from_rows([0.0, -1.0], [-2.0, -1.0]),
            ..identity_sample()
        };
        let (_, inv_dt) = regular(point_update(&params(true), &sample));

        let c = 0.56f64.sqrt();
        let rho = 0.5;
        let h = 0.5 * 5f64.sqrt();
        let visc = 2.0 * rho * h * h + 0.5 * rho * h * c;
        // Smallest singular value of J: √(3 - √5)
        let h_min = (3.0 - 5f64.sqrt()).sqrt() / 2.0;
        let expected = c / h_min + 2.5 * visc / (rho * h_min * h_min);
        assert!(
            (inv_dt - expected).abs() < 1e-12 * expected,
            "expected {expected}, got {inv_dt}"
        );
    }

    /// Two zones of 4x4 points; zone 1 has one inverted point.
    struct TwoZones {
        weights: Vec<f64>,
        jac0inv: Vec<f64>,
        rho0_detj0w: Vec<f64>,
        energy: Vec<f64>,
        jacobian: Vec<f64>,
        velocity_gradient: Vec<f64>,
    }

    impl TwoZones {
        const NQP: usize = 16;

        fn new() -> Self {
            let nqp = Self::NQP;
            let n = 2 * nqp;
            let weights = vec![1.0 / 16.0; nqp];
            let mut jacobian = vec![0.0; 4 * n];
            for z in 0..2 {
                for q in 0..nqp {
                    jacobian[q + 4 * nqp * z] = 1.0;
                    jacobian[q + 3 * nqp + 4 * nqp * z] = 1.0;
                }
            }
            // Mirror point 5 of zone 1 along x
            jacobian[5 + 4 * nqp] = -1.0;

            Self {
                jac0inv: Mat2::IDENTITY.0.repeat(n),
                rho0_detj0w: vec![1.0 / 16.0; n],
                energy: (0..n).map(|i| 1.0 + 0.01 * i as f64).collect(),
                velocity_gradient: vec![0.0; 4 * n],
                weights,
                jacobian,
            }
        }

        fn inputs(&self) -> PointInputs<'_> {
            PointInputs {
                num_zones: 2,
                weights: &self.weights,
                jac0inv: &self.jac0inv,
                rho0_detj0w: &self.rho0_detj0w,
                energy: &self.energy,
                jacobian: &self.jacobian,
                velocity_gradient: &self.velocity_gradient,
            }
        }
    }

    fn run(chunk: &ChunkConfig) -> (Vec<f64>, Vec<f64>, KernelStats) {
        let zones = TwoZones::new();
        let mut dt_est = vec![1.0; 32];
        let mut stress = vec![0.0; 128];
        let stats = QUpdateKernel::<4>
            .execute(
                &params(true),
                &zones.inputs(),
                &mut PointOutputs {
                    dt_est: &mut dt_est,
                    stress_jinv_t: &mut stress,
                },
                chunk,
            )
            .unwrap();
        (dt_est, stress, stats)
    }

    #[test]
    fn test_inverted_point_zeroes_whole_zone() {
        let (dt_est, stress, stats) = run(&ChunkConfig::default());
        assert_eq!(stats.work_items, 2);
        assert_eq!(stats.degenerate_points, 16);
        assert!(dt_est[..16].iter().all(|&dt| dt > 0.0 && dt < 1.0));
        assert!(dt_est[16..].iter().all(|&dt| dt == 0.0));
        assert!(stress.iter().all(|s| s.is_finite()));
        // Off-diagonal planes stay zero for diagonal Jacobians
        assert!(stress[32..96].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_parallel_matches_serial_bitwise() {
        let (dt_a, stress_a, _) = run(&ChunkConfig::default());
        let (dt_b, stress_b, _) = run(&ChunkConfig::fine_grained());
        assert!(dt_a.iter().zip(&dt_b).all(|(a, b)| a.to_bits() == b.to_bits()));
        assert!(stress_a.iter().zip(&stress_b).all(|(a, b)| a.to_bits() == b.to_bits()));
    }

    #[test]
    fn test_dt_est_never_increases() {
        let zones = TwoZones::new();
        let mut dt_est = vec![1e-9; 32];
        let mut stress = vec![0.0; 128];
        QUpdateKernel::<4>
            .execute(
                &params(false),
                &zones.inputs(),
                &mut PointOutputs {
                    dt_est: &mut dt_est,
                    stress_jinv_t: &mut stress,
                },
                &ChunkConfig::default(),
            )
            .unwrap();
        assert!(dt_est[..16].iter().all(|&dt| dt == 1e-9));
    }

    #[test]
    fn test_size_mismatch() {
        let zones = TwoZones::new();
        let mut dt_est = vec![1.0; 31];
        let mut stress = vec![0.0; 128];
        let err = QUpdateKernel::<4>
            .execute(
                &params(false),
                &zones.inputs(),
                &mut PointOutputs {
                    dt_est: &mut dt_est,
                    stress_jinv_t: &mut stress,
                },
                &ChunkConfig::default(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            KernelError::SizeMismatch {
                buffer: "dt_est",
                ..
            }
        ));
    }
}
