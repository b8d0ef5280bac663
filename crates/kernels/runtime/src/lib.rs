//! Hydroquad Runtime.
//!
//! Quadrature-point update of a 2-D high-order Lagrangian hydrodynamics
//! scheme. Given the state vector `[x | v | e]` it produces, at every
//! quadrature point of every zone, the stress contribution to the force
//! operator (`stressJinvT`) and a CFL-limited time-step bound, then reduces
//! the bounds to one `dt_est`.
//!
//! # Architecture
//!
//! - [`config`] - [`HydroConfig`]: material constants, orders, scheduling
//! - [`basis`] - 1-D quadrature rules and basis tables
//! - [`mesh`] / [`restriction`] - Cartesian meshes and element restrictions
//! - [`kernel`] - kernel traits and statistics
//! - [`interpolation`] - tensor-product value and gradient interpolation
//! - [`physics`] - per-point stress, viscosity and time-step bound
//! - [`registry`] - shape-keyed dispatch to specialized kernels
//! - [`reductions`] - deterministic tree sums and minima
//! - [`quadrature_data`] - reference geometry and per-point outputs
//! - [`orchestrator`] - [`QuadratureUpdater`], the stateful update driver
//! - [`executor`] - [`ChunkConfig`] for data-parallel scheduling
//! - [`error`] - error types
//!
//! # Example
//!
//! ```
//! use hydroquad_runtime::{
//!     CartesianMesh, Discretization, HydroConfig, KernelRegistry, QuadratureUpdater,
//!     ReferenceGeometry, UpdateOutcome,
//! };
//!
//! let config = HydroConfig::default();
//! let mesh = CartesianMesh::unit_square(4)?;
//! let discretization = Discretization::cartesian(&mesh, &config)?;
//! let registry = KernelRegistry::with_supported_kernels();
//!
//! let positions = Discretization::cartesian_positions(&mesh, &config);
//! let nqp = config.quad_1d() * config.quad_1d();
//! let rho0 = vec![1.0; mesh.num_zones() * nqp];
//! let geometry =
//!     ReferenceGeometry::from_initial_state(&config, &discretization, &registry, &positions, &rho0)?;
//! let mut updater = QuadratureUpdater::new(config, discretization, registry, geometry)?;
//!
//! let mut state = positions.clone();
//! state.resize(2 * positions.len(), 0.0);
//! state.resize(updater.state_len(), 1.0);
//!
//! let mut is_current = false;
//! let outcome = updater.update(&state, &mut is_current)?;
//! assert!(matches!(outcome, UpdateOutcome::Updated(_)));
//! assert!(updater.dt_est() > 0.0);
//! # Ok::<(), hydroquad_runtime::Error>(())
//! ```

pub mod basis;
pub mod config;
pub mod error;
pub mod executor;
pub mod interpolation;
pub mod kernel;
pub mod mesh;
pub mod orchestrator;
pub mod physics;
pub mod quadrature_data;
pub mod reductions;
pub mod registry;
pub mod restriction;

pub use basis::{BasisTable, QuadratureRule};
pub use config::HydroConfig;
pub use error::{Error, Result};
pub use executor::ChunkConfig;
pub use interpolation::{GradientInterpolator, ScalarInterpolator};
pub use kernel::{
    GradientInterpolation, KernelError, KernelFamily, KernelStats, QuadratureKernel,
    ScalarInterpolation,
};
pub use mesh::CartesianMesh;
pub use orchestrator::{
    Discretization, QuadratureUpdater, TimingData, UpdateOutcome, UpdateReport,
};
pub use physics::{PhysicsParams, PointInputs, PointOutputs, QUpdateKernel};
pub use quadrature_data::{QuadratureData, ReferenceGeometry, StressField};
pub use registry::KernelRegistry;
pub use restriction::{ElementRestriction, IndexedRestriction};
