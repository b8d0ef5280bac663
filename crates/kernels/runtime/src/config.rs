//! Update configuration.
//!
//! [`HydroConfig`] carries the material constants, the discretization orders
//! and the scheduling knobs. It deserializes from JSON with every field
//! optional:
//!
//! ```json
//! { "gamma": 1.4, "cfl": 0.5, "use_viscosity": true, "order_v": 2, "order_e": 1 }
//! ```
//!
//! Derived kernel shapes:
//!
//! | Quantity | Value |
//! |----------|-------|
//! | H1 dofs per axis | `order_v + 1` |
//! | L2 dofs per axis | `order_e + 1` |
//! | Points per axis | `quad_order_1d`, else `(3·order_v + order_e − 1)/2 + 1` |

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::executor::ChunkConfig;

/// Material, discretization and scheduling settings for one simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HydroConfig {
    /// Adiabatic index of the ideal gas.
    pub gamma: f64,
    /// CFL safety factor applied to every point's time-step bound.
    pub cfl: f64,
    /// Whether to add the tensor artificial viscosity.
    pub use_viscosity: bool,
    /// Polynomial order of the kinematic (H1) space.
    pub order_v: u32,
    /// Polynomial order of the thermodynamic (L2) space.
    pub order_e: u32,
    /// Override for the number of quadrature points per axis.
    pub quad_order_1d: Option<u32>,
    /// Parallel scheduling of zones and elements.
    pub chunk: ChunkConfig,
}

impl Default for HydroConfig {
    fn default() -> Self {
        Self {
            gamma: 1.4,
            cfl: 0.5,
            use_viscosity: true,
            order_v: 2,
            order_e: 1,
            quad_order_1d: None,
            chunk: ChunkConfig::default(),
        }
    }
}

impl HydroConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the update cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !(self.gamma.is_finite() && self.gamma > 1.0) {
            return Err(Error::InvalidConfig(format!(
                "gamma must be a finite value > 1, got {}",
                self.gamma
            )));
        }
        if !(self.cfl > 0.0 && self.cfl <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "cfl must be in (0, 1], got {}",
                self.cfl
            )));
        }
        if self.order_v == 0 {
            return Err(Error::InvalidConfig("order_v must be at least 1".into()));
        }
        if self.quad_order_1d == Some(0) {
            return Err(Error::InvalidConfig(
                "quad_order_1d must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// H1 dofs per axis (`D1D` of the position and velocity fields).
    pub fn h1_dofs_1d(&self) -> usize {
        self.order_v as usize + 1
    }

    /// L2 dofs per axis (`D1D` of the energy field).
    pub fn l2_dofs_1d(&self) -> usize {
        self.order_e as usize + 1
    }

    /// Quadrature points per axis (`Q1D`).
    pub fn quad_1d(&self) -> usize {
        match self.quad_order_1d {
            Some(q) => q as usize,
            None => {
                let order = 3 * self.order_v as usize + self.order_e as usize;
                order.saturating_sub(1) / 2 + 1
            }
        }
    }

    /// Kinematic order as used in the minimum length scale `h_min = sv / h1order`.
    pub fn h1order(&self) -> f64 {
        f64::from(self.order_v)
    }
}
