//! The quadrature update.
//!
//! [`QuadratureUpdater`] owns the kernel registry, the discretization and
//! the per-point data, and recomputes the stress field and time-step
//! estimate from a state vector whenever the caller's flag says the data is
//! stale:
//!
//! ```text
//! state = [ x | v | e ]
//!           │   │   └─ L2 restrict ──► scalar interpolation ──► e(q)
//!           │   └───── H1 restrict ──► gradient interpolation ─► ∇v(q)
//!           └───────── H1 restrict ──► gradient interpolation ─► J(q)
//!                                                   │
//!                          point physics ◄──────────┘
//!                               │
//!              stressJinvT ◄────┴────► dt(q) ──► tree min ──► dt_est
//! ```
//!
//! Every stage is data-parallel. The only cross-zone step is the final
//! minimum, which uses a fixed reduction tree so the reported time step and
//! limiting point never depend on the thread count.

use std::time::Instant;

use hydroquad_foundation::DIM;
use tracing::{debug, instrument, trace, warn};

use crate::basis::{BasisTable, QuadratureRule, gauss_lobatto_nodes};
use crate::config::HydroConfig;
use crate::error::{Error, Result};
use crate::kernel::{KernelFamily, KernelStats, elapsed_ns};
use crate::mesh::CartesianMesh;
use crate::physics::{PhysicsParams, PointInputs, PointOutputs};
use crate::quadrature_data::{QuadratureData, ReferenceGeometry, StressField};
use crate::reductions;
use crate::registry::KernelRegistry;
use crate::restriction::ElementRestriction;

// ============================================================================
// Discretization
// ============================================================================

/// Spaces, basis tables and weights the update runs on.
pub struct Discretization {
    /// Kinematic space, two components.
    pub h1_restriction: Box<dyn ElementRestriction>,
    /// Thermodynamic space, one component.
    pub l2_restriction: Box<dyn ElementRestriction>,
    pub h1_basis: BasisTable,
    pub l2_basis: BasisTable,
    /// 2-D quadrature weights, `Q1D²` of them.
    pub weights: Vec<f64>,
}

impl Discretization {
    /// Continuous H1 / discontinuous L2 spaces on a Cartesian mesh, with the
    /// orders and point count from `config`.
    pub fn cartesian(mesh: &CartesianMesh, config: &HydroConfig) -> Result<Self> {
        let rule = QuadratureRule::gauss_legendre(config.quad_1d());
        let h1_dofs_1d = config.h1_dofs_1d();
        let l2_dofs_1d = config.l2_dofs_1d();
        Ok(Self {
            h1_restriction: Box::new(mesh.h1_restriction(h1_dofs_1d, DIM)?),
            l2_restriction: Box::new(mesh.l2_restriction(l2_dofs_1d)?),
            h1_basis: BasisTable::h1(h1_dofs_1d, &rule),
            l2_basis: BasisTable::l2(l2_dofs_1d, &rule),
            weights: rule.weights_2d(),
        })
    }

    /// Initial positions of a Cartesian mesh on the H1 nodes used by
    /// [`Discretization::cartesian`].
    pub fn cartesian_positions(mesh: &CartesianMesh, config: &HydroConfig) -> Vec<f64> {
        mesh.h1_positions(&gauss_lobatto_nodes(config.h1_dofs_1d()))
    }

    /// Check every piece against the shapes implied by `config`.
    pub fn validate(&self, config: &HydroConfig) -> Result<()> {
        let h1 = self.h1_restriction.as_ref();
        let l2 = self.l2_restriction.as_ref();
        let quad_1d = config.quad_1d();
        let h1_dofs_1d = config.h1_dofs_1d();
        let l2_dofs_1d = config.l2_dofs_1d();

        if h1.vdim() != DIM || l2.vdim() != 1 {
            return Err(Error::InvalidConfig(format!(
                "expected H1 vdim {DIM} and L2 vdim 1, got {} and {}",
                h1.vdim(),
                l2.vdim()
            )));
        }
        if h1.num_elements() != l2.num_elements() {
            return Err(Error::InvalidConfig(format!(
                "H1 and L2 restrictions disagree on the zone count: {} vs {}",
                h1.num_elements(),
                l2.num_elements()
            )));
        }

        let checks = [
            ("H1 dofs per element", h1_dofs_1d * h1_dofs_1d, h1.dofs_per_element()),
            ("L2 dofs per element", l2_dofs_1d * l2_dofs_1d, l2.dofs_per_element()),
            ("H1 basis dofs_1d", h1_dofs_1d, self.h1_basis.dofs_1d()),
            ("H1 basis quad_1d", quad_1d, self.h1_basis.quad_1d()),
            ("L2 basis dofs_1d", l2_dofs_1d, self.l2_basis.dofs_1d()),
            ("L2 basis quad_1d", quad_1d, self.l2_basis.quad_1d()),
            ("quadrature weights", quad_1d * quad_1d, self.weights.len()),
        ];
        for (buffer, expected, actual) in checks {
            if expected != actual {
                return Err(Error::SizeMismatch {
                    buffer,
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }

    pub fn num_zones(&self) -> usize {
        self.h1_restriction.num_elements()
    }
}

impl std::fmt::Debug for Discretization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Discretization")
            .field("zones", &self.num_zones())
            .field("h1_dofs", &self.h1_restriction.global_size())
            .field("l2_dofs", &self.l2_restriction.global_size())
            .field("points", &self.weights.len())
            .finish()
    }
}

// ============================================================================
// Reporting
// ============================================================================

/// Accumulated cost of the quadrature updates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimingData {
    /// Zones processed over all updates.
    pub quad_tstep: u64,
    /// Wall-clock nanoseconds spent in updates.
    pub update_ns: u64,
    /// Part of `update_ns` spent in the interpolation kernels.
    pub interpolation_ns: u64,
    /// Part of `update_ns` spent in the point physics kernel.
    pub physics_ns: u64,
    /// Number of updates that actually ran.
    pub updates: u64,
}

impl TimingData {
    /// Account for one completed update of `zones` zones.
    pub fn record(&mut self, zones: usize, elapsed_ns: u64) {
        self.quad_tstep += zones as u64;
        self.update_ns = self.update_ns.saturating_add(elapsed_ns);
        self.updates += 1;
    }

    /// Attribute one kernel execution to its family.
    pub fn record_kernel(&mut self, family: KernelFamily, stats: &KernelStats) {
        let slot = match family {
            KernelFamily::ScalarInterpolation | KernelFamily::GradientInterpolation => {
                &mut self.interpolation_ns
            }
            KernelFamily::QuadratureUpdate => &mut self.physics_ns,
        };
        *slot = slot.saturating_add(stats.elapsed_ns());
    }
}

/// Summary of one update that ran.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateReport {
    /// Reduced time-step estimate.
    pub dt: f64,
    /// Flat `z * nqp + q` index of the point that lowered `dt` below the
    /// previous estimate; `None` when the estimate carried over unchanged.
    pub limiting_point: Option<usize>,
    /// Points whose bound was forced to zero by degenerate geometry.
    pub degenerate_points: usize,
    pub zones: usize,
}

/// What [`QuadratureUpdater::update`] did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UpdateOutcome {
    /// The data was already current; nothing ran.
    Cached,
    Updated(UpdateReport),
}

impl UpdateOutcome {
    pub fn report(&self) -> Option<&UpdateReport> {
        match self {
            UpdateOutcome::Cached => None,
            UpdateOutcome::Updated(report) => Some(report),
        }
    }
}

// ============================================================================
// Updater
// ============================================================================

/// Element-local and point buffers reused across updates.
#[derive(Debug)]
struct Scratch {
    energy_local: Vec<f64>,
    position_local: Vec<f64>,
    velocity_local: Vec<f64>,
    energy_points: Vec<f64>,
    jacobians: Vec<f64>,
    velocity_gradients: Vec<f64>,
    dt_points: Vec<f64>,
}

/// Stateful driver of the quadrature update.
#[derive(Debug)]
pub struct QuadratureUpdater {
    config: HydroConfig,
    registry: KernelRegistry,
    discretization: Discretization,
    data: QuadratureData,
    params: PhysicsParams,
    scratch: Scratch,
    timing: TimingData,
}

impl QuadratureUpdater {
    /// Assemble an updater, resolving every kernel it will need.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedShape`] when `registry` lacks a kernel for the
    /// configured orders; [`Error::SizeMismatch`] / [`Error::InvalidConfig`]
    /// when the discretization or geometry disagree with `config`.
    pub fn new(
        config: HydroConfig,
        discretization: Discretization,
        registry: KernelRegistry,
        geometry: ReferenceGeometry,
    ) -> Result<Self> {
        config.validate()?;
        discretization.validate(&config)?;

        let quad_1d = config.quad_1d();
        registry.scalar(1, config.l2_dofs_1d(), quad_1d)?;
        registry.gradient(config.h1_dofs_1d(), quad_1d)?;
        registry.quadrature(quad_1d)?;

        let num_zones = discretization.num_zones();
        let nqp = quad_1d * quad_1d;
        for (buffer, expected, actual) in [
            ("geometry zones", num_zones, geometry.num_zones()),
            ("geometry points per zone", nqp, geometry.points_per_zone()),
        ] {
            if expected != actual {
                return Err(Error::SizeMismatch {
                    buffer,
                    expected,
                    actual,
                });
            }
        }

        let n = num_zones * nqp;
        let scratch = Scratch {
            energy_local: vec![0.0; discretization.l2_restriction.local_size()],
            position_local: vec![0.0; discretization.h1_restriction.local_size()],
            velocity_local: vec![0.0; discretization.h1_restriction.local_size()],
            energy_points: vec![0.0; n],
            jacobians: vec![0.0; DIM * DIM * n],
            velocity_gradients: vec![0.0; DIM * DIM * n],
            dt_points: vec![0.0; n],
        };
        let params = PhysicsParams::new(&config, geometry.h0());
        debug!(num_zones, quad_1d, h0 = params.h0, "quadrature updater ready");

        Ok(Self {
            config,
            registry,
            discretization,
            data: QuadratureData::new(geometry),
            params,
            scratch,
            timing: TimingData::default(),
        })
    }

    /// Length of the `[x | v | e]` state vector.
    pub fn state_len(&self) -> usize {
        2 * self.discretization.h1_restriction.global_size()
            + self.discretization.l2_restriction.global_size()
    }

    pub fn num_zones(&self) -> usize {
        self.discretization.num_zones()
    }

    /// Recompute stress and time-step estimate if `is_current` is false.
    ///
    /// On success `is_current` is set. When it was already set, nothing runs
    /// and [`UpdateOutcome::Cached`] is returned. Every point's bound is
    /// seeded with the previous estimate, so the estimate only decreases
    /// until [`reset_time_step_estimate`](Self::reset_time_step_estimate).
    #[instrument(skip_all, name = "update_quadrature_data", fields(zones = self.num_zones()))]
    pub fn update(&mut self, state: &[f64], is_current: &mut bool) -> Result<UpdateOutcome> {
        if *is_current {
            trace!("quadrature data is current");
            return Ok(UpdateOutcome::Cached);
        }

        let expected = self.state_len();
        if state.len() != expected {
            return Err(Error::SizeMismatch {
                buffer: "state vector",
                expected,
                actual: state.len(),
            });
        }

        let start = Instant::now();
        let Self {
            config,
            registry,
            discretization,
            data,
            params,
            scratch,
            timing,
        } = self;
        let chunk = config.chunk;
        let quad_1d = config.quad_1d();
        let num_zones = discretization.num_zones();

        let h1_len = discretization.h1_restriction.global_size();
        let (positions, rest) = state.split_at(h1_len);
        let (velocities, energies) = rest.split_at(h1_len);

        let scalar = registry.scalar(1, config.l2_dofs_1d(), quad_1d)?;
        let gradient = registry.gradient(config.h1_dofs_1d(), quad_1d)?;
        let physics = registry.quadrature(quad_1d)?;

        discretization
            .l2_restriction
            .restrict(energies, &mut scratch.energy_local, &chunk)?;
        let energy_stats = scalar.execute(
            &discretization.l2_basis,
            num_zones,
            &scratch.energy_local,
            &mut scratch.energy_points,
            &chunk,
        )?;
        trace!("energy interpolated");

        discretization
            .h1_restriction
            .restrict(positions, &mut scratch.position_local, &chunk)?;
        let position_stats = gradient.execute(
            &discretization.h1_basis,
            num_zones,
            &scratch.position_local,
            &mut scratch.jacobians,
            &chunk,
        )?;
        trace!("position gradient interpolated");

        discretization
            .h1_restriction
            .restrict(velocities, &mut scratch.velocity_local, &chunk)?;
        let velocity_stats = gradient.execute(
            &discretization.h1_basis,
            num_zones,
            &scratch.velocity_local,
            &mut scratch.velocity_gradients,
            &chunk,
        )?;
        trace!("velocity gradient interpolated");

        let seed = data.dt_est;
        scratch.dt_points.fill(seed);
        let inputs = PointInputs {
            num_zones,
            weights: &discretization.weights,
            jac0inv: data.geometry.jac0inv(),
            rho0_detj0w: data.geometry.rho0_detj0w(),
            energy: &scratch.energy_points,
            jacobian: &scratch.jacobians,
            velocity_gradient: &scratch.velocity_gradients,
        };
        let mut outputs = PointOutputs {
            dt_est: &mut scratch.dt_points,
            stress_jinv_t: data.stress.as_mut_slice(),
        };
        let stats = physics.execute(params, &inputs, &mut outputs, &chunk)?;

        let limit = reductions::min_indexed(&scratch.dt_points);
        let dt = limit.map_or(seed, |l| l.value);
        let limiting_point = limit.filter(|l| l.value < seed).map(|l| l.index);
        data.dt_est = dt;
        *is_current = true;

        if stats.degenerate_points > 0 {
            warn!(
                degenerate_points = stats.degenerate_points,
                "degenerate geometry forced dt_est to zero"
            );
        }

        timing.record_kernel(KernelFamily::ScalarInterpolation, &energy_stats);
        timing.record_kernel(KernelFamily::GradientInterpolation, &position_stats);
        timing.record_kernel(KernelFamily::GradientInterpolation, &velocity_stats);
        timing.record_kernel(KernelFamily::QuadratureUpdate, &stats);
        let elapsed_ns = elapsed_ns(start);
        timing.record(num_zones, elapsed_ns);
        debug!(num_zones, dt, elapsed_ns, "quadrature data updated");

        Ok(UpdateOutcome::Updated(UpdateReport {
            dt,
            limiting_point,
            degenerate_points: stats.degenerate_points,
            zones: num_zones,
        }))
    }

    /// Make the next update start from an unbounded estimate.
    pub fn reset_time_step_estimate(&mut self) {
        self.data.reset_dt_est();
    }

    /// Time-step estimate of the last update.
    pub fn dt_est(&self) -> f64 {
        self.data.dt_est()
    }

    pub fn stress(&self) -> &StressField {
        self.data.stress()
    }

    pub fn quadrature_data(&self) -> &QuadratureData {
        &self.data
    }

    pub fn timing(&self) -> &TimingData {
        &self.timing
    }

    pub fn config(&self) -> &HydroConfig {
        &self.config
    }

    pub fn registry(&self) -> &KernelRegistry {
        &self.registry
    }
}
