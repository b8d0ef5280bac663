//! Per-point state carried between updates.
//!
//! [`ReferenceGeometry`] is computed once from the initial mesh and never
//! changes; [`StressField`] and the scalar time-step estimate are rewritten
//! by every update.

use hydroquad_foundation::{DIM_SQ, Mat2};
use hydroquad_functions::{determinant_mat2, inverse_mat2, is_near_singular_mat2};
use tracing::debug;

use crate::config::HydroConfig;
use crate::error::{Error, Result};
use crate::orchestrator::Discretization;
use crate::reductions;
use crate::registry::KernelRegistry;

/// Reference-configuration data: `Jac0inv`, `rho0DetJ0w` and `h0`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceGeometry {
    num_zones: usize,
    points_per_zone: usize,
    jac0inv: Vec<f64>,
    rho0_detj0w: Vec<f64>,
    h0: f64,
}

impl ReferenceGeometry {
    /// Wrap precomputed reference data.
    ///
    /// `jac0inv` holds `4 * num_zones * points_per_zone` column-major
    /// matrices, `rho0_detj0w` one value per point.
    pub fn new(
        num_zones: usize,
        points_per_zone: usize,
        jac0inv: Vec<f64>,
        rho0_detj0w: Vec<f64>,
        h0: f64,
    ) -> Result<Self> {
        let n = num_zones * points_per_zone;
        for (buffer, expected, actual) in [
            ("jac0inv", DIM_SQ * n, jac0inv.len()),
            ("rho0DetJ0w", n, rho0_detj0w.len()),
        ] {
            if expected != actual {
                return Err(Error::SizeMismatch {
                    buffer,
                    expected,
                    actual,
                });
            }
        }
        if !(h0.is_finite() && h0 > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "initial length scale must be positive, got {h0}"
            )));
        }
        Ok(Self {
            num_zones,
            points_per_zone,
            jac0inv,
            rho0_detj0w,
            h0,
        })
    }

    /// Compute the reference data from the initial H1 positions.
    ///
    /// `rho0` holds the initial density at every point (`zq` layout). The
    /// Jacobians go through the same restriction and gradient kernel as the
    /// update itself. `h0` is the square root of the average zone volume,
    /// divided by the kinematic order.
    ///
    /// # Errors
    ///
    /// [`Error::DegenerateReference`] for the first point with a
    /// non-positive or numerically singular Jacobian, and
    /// [`Error::UnsupportedShape`] when no gradient kernel matches the
    /// configured orders.
    pub fn from_initial_state(
        config: &HydroConfig,
        discretization: &Discretization,
        registry: &KernelRegistry,
        positions: &[f64],
        rho0: &[f64],
    ) -> Result<Self> {
        config.validate()?;
        discretization.validate(config)?;

        let quad_1d = config.quad_1d();
        let nqp = quad_1d * quad_1d;
        let gradient = registry.gradient(config.h1_dofs_1d(), quad_1d)?;
        let h1 = discretization.h1_restriction.as_ref();
        let num_zones = h1.num_elements();
        if num_zones == 0 {
            return Err(Error::InvalidConfig("mesh has no zones".into()));
        }
        let n = num_zones * nqp;
        if rho0.len() != n {
            return Err(Error::SizeMismatch {
                buffer: "rho0",
                expected: n,
                actual: rho0.len(),
            });
        }

        let mut local = vec![0.0; h1.local_size()];
        h1.restrict(positions, &mut local, &config.chunk)?;
        let mut jacobians = vec![0.0; DIM_SQ * n];
        gradient.execute(
            &discretization.h1_basis,
            num_zones,
            &local,
            &mut jacobians,
            &config.chunk,
        )?;

        let mut jac0inv = vec![0.0; DIM_SQ * n];
        let mut rho0_detj0w = vec![0.0; n];
        let mut volumes = vec![0.0; n];
        for z in 0..num_zones {
            let block = &jacobians[DIM_SQ * nqp * z..DIM_SQ * nqp * (z + 1)];
            for q in 0..nqp {
                let zq = z * nqp + q;
                let jac = Mat2([
                    block[q],
                    block[q + nqp],
                    block[q + 2 * nqp],
                    block[q + 3 * nqp],
                ]);
                let det = determinant_mat2(&jac);
                if det <= 0.0 || is_near_singular_mat2(&jac) {
                    return Err(Error::DegenerateReference { zone: z, point: q });
                }
                let inv = inverse_mat2(&jac)?;
                jac0inv[DIM_SQ * zq..DIM_SQ * (zq + 1)].copy_from_slice(&inv.0);

                let weighted = det * discretization.weights[q];
                volumes[zq] = weighted;
                rho0_detj0w[zq] = rho0[zq] * weighted;
            }
        }

        let volume = reductions::sum(&volumes);
        let h0 = (volume / num_zones as f64).sqrt() / config.h1order();
        debug!(num_zones, volume, h0, "reference geometry computed");

        Self::new(num_zones, nqp, jac0inv, rho0_detj0w, h0)
    }

    pub fn num_zones(&self) -> usize {
        self.num_zones
    }

    pub fn points_per_zone(&self) -> usize {
        self.points_per_zone
    }

    pub fn jac0inv(&self) -> &[f64] {
        &self.jac0inv
    }

    /// Inverse reference Jacobian of point `q` in zone `z`.
    pub fn jac0inv_at(&self, z: usize, q: usize) -> Mat2 {
        let zq = z * self.points_per_zone + q;
        let mut m = Mat2::ZERO;
        m.0.copy_from_slice(&self.jac0inv[DIM_SQ * zq..DIM_SQ * (zq + 1)]);
        m
    }

    pub fn rho0_detj0w(&self) -> &[f64] {
        &self.rho0_detj0w
    }

    /// Initial mesh length scale.
    pub fn h0(&self) -> f64 {
        self.h0
    }
}

/// `stressJinvT` in structure-of-arrays layout.
///
/// Component `(vd, gd)` of point `zq` lives at `zq + n * (gd + 2 * vd)`.
#[derive(Debug, Clone, PartialEq)]
pub struct StressField {
    num_zones: usize,
    points_per_zone: usize,
    data: Vec<f64>,
}

impl StressField {
    pub fn zeros(num_zones: usize, points_per_zone: usize) -> Self {
        Self {
            num_zones,
            points_per_zone,
            data: vec![0.0; DIM_SQ * num_zones * points_per_zone],
        }
    }

    /// `stressJinvT` of point `q` in zone `z`.
    pub fn get(&self, z: usize, q: usize) -> Mat2 {
        let n = self.num_zones * self.points_per_zone;
        let zq = z * self.points_per_zone + q;
        let plane = |vd: usize, gd: usize| self.data[zq + n * (gd + 2 * vd)];
        Mat2::from_rows([plane(0, 0), plane(0, 1)], [plane(1, 0), plane(1, 1)])
    }

    /// Raw planes, for force assembly.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn num_zones(&self) -> usize {
        self.num_zones
    }

    pub fn points_per_zone(&self) -> usize {
        self.points_per_zone
    }
}

/// Everything the update reads and writes besides the state vector.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadratureData {
    pub(crate) geometry: ReferenceGeometry,
    pub(crate) stress: StressField,
    pub(crate) dt_est: f64,
}

impl QuadratureData {
    /// Fresh data with a zero stress field and an unbounded time step.
    pub fn new(geometry: ReferenceGeometry) -> Self {
        let stress = StressField::zeros(geometry.num_zones, geometry.points_per_zone);
        Self {
            geometry,
            stress,
            dt_est: f64::INFINITY,
        }
    }

    pub fn geometry(&self) -> &ReferenceGeometry {
        &self.geometry
    }

    pub fn stress(&self) -> &StressField {
        &self.stress
    }

    /// Time-step estimate of the last update; seeds the next one.
    pub fn dt_est(&self) -> f64 {
        self.dt_est
    }

    /// Forget the previous estimate so the next update starts unbounded.
    pub fn reset_dt_est(&mut self) {
        self.dt_est = f64::INFINITY;
    }
}
