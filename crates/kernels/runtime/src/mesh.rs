//! Structured quadrilateral meshes.
//!
//! A [`CartesianMesh`] is an `nx × ny` grid of axis-aligned zones over
//! `[0, lx] × [0, ly]`. It builds the element maps for a continuous H1 space
//! and a discontinuous L2 space, and the initial H1 nodal coordinates.
//! Zones are numbered `ex + nx * ey`, local dofs lexicographically.

use crate::error::{Error, Result};
use crate::restriction::IndexedRestriction;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CartesianMesh {
    nx: usize,
    ny: usize,
    lx: f64,
    ly: f64,
}

impl CartesianMesh {
    pub fn new(nx: usize, ny: usize, lx: f64, ly: f64) -> Result<Self> {
        if nx == 0 || ny == 0 {
            return Err(Error::InvalidConfig(format!(
                "mesh needs at least one zone per axis, got {nx}x{ny}"
            )));
        }
        if !(lx > 0.0 && ly > 0.0 && lx.is_finite() && ly.is_finite()) {
            return Err(Error::InvalidConfig(format!(
                "mesh extents must be positive, got {lx}x{ly}"
            )));
        }
        Ok(Self { nx, ny, lx, ly })
    }

    /// Unit square split into `n × n` zones.
    pub fn unit_square(n: usize) -> Result<Self> {
        Self::new(n, n, 1.0, 1.0)
    }

    pub fn num_zones(&self) -> usize {
        self.nx * self.ny
    }

    /// Zone size along each axis.
    pub fn spacing(&self) -> [f64; 2] {
        [self.lx / self.nx as f64, self.ly / self.ny as f64]
    }

    /// Global H1 nodes per axis for `dofs_1d` nodes per zone edge.
    fn h1_nodes_per_axis(&self, dofs_1d: usize) -> [usize; 2] {
        let p = dofs_1d.saturating_sub(1);
        [self.nx * p + 1, self.ny * p + 1]
    }

    /// Scalar dofs of the continuous space.
    pub fn h1_num_dofs(&self, dofs_1d: usize) -> usize {
        let [gx, gy] = self.h1_nodes_per_axis(dofs_1d);
        gx * gy
    }

    /// Continuous element map: neighbouring zones share edge and corner nodes.
    pub fn h1_restriction(&self, dofs_1d: usize, vdim: usize) -> Result<IndexedRestriction> {
        if dofs_1d < 2 {
            return Err(Error::InvalidConfig(format!(
                "continuous space needs at least 2 dofs per axis, got {dofs_1d}"
            )));
        }
        let p = dofs_1d - 1;
        let [gx_count, _] = self.h1_nodes_per_axis(dofs_1d);
        let mut indices = Vec::with_capacity(self.num_zones() * dofs_1d * dofs_1d);
        for ey in 0..self.ny {
            for ex in 0..self.nx {
                for j in 0..dofs_1d {
                    for i in 0..dofs_1d {
                        indices.push((ex * p + i) + gx_count * (ey * p + j));
                    }
                }
            }
        }
        IndexedRestriction::new(self.h1_num_dofs(dofs_1d), vdim, dofs_1d * dofs_1d, indices)
    }

    /// Discontinuous element map: every zone owns its dofs.
    pub fn l2_restriction(&self, dofs_1d: usize) -> Result<IndexedRestriction> {
        let nd = dofs_1d * dofs_1d;
        let ndofs = self.num_zones() * nd;
        IndexedRestriction::new(ndofs, 1, nd, (0..ndofs).collect())
    }

    /// Initial H1 coordinates, byNODES (`x` of every node, then `y`).
    ///
    /// `nodes_1d` are the per-zone node positions on `[0, 1]`, e.g. GLL nodes.
    pub fn h1_positions(&self, nodes_1d: &[f64]) -> Vec<f64> {
        let dofs_1d = nodes_1d.len();
        if dofs_1d == 0 {
            return Vec::new();
        }
        let p = dofs_1d.saturating_sub(1).max(1);
        let [gx_count, gy_count] = self.h1_nodes_per_axis(dofs_1d);
        let [hx, hy] = self.spacing();

        let coordinate = |g: usize, zones: usize, h: f64| {
            let zone = (g / p).min(zones - 1);
            let local = g - zone * p;
            (zone as f64 + nodes_1d[local]) * h
        };

        let ndofs = gx_count * gy_count;
        let mut positions = vec![0.0; 2 * ndofs];
        for gy in 0..gy_count {
            let y = coordinate(gy, self.ny, hy);
            for gx in 0..gx_count {
                let node = gx + gx_count * gy;
                positions[node] = coordinate(gx, self.nx, hx);
                positions[node + ndofs] = y;
            }
        }
        positions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::restriction::ElementRestriction;

    #[test]
    fn test_h1_restriction_shares_edges() {
        let mesh = CartesianMesh::new(2, 1, 2.0, 1.0).unwrap();
        let r = mesh.h1_restriction(2, 1).unwrap();
        assert_eq!(mesh.h1_num_dofs(2), 6);
        assert_eq!(r.num_elements(), 2);
        // Node grid is 3 x 2; the middle column is shared
        assert_eq!(r.indices(), &[0, 1, 3, 4, 1, 2, 4, 5]);
    }

    #[test]
    fn test_l2_restriction_is_discontinuous() {
        let mesh = CartesianMesh::unit_square(2).unwrap();
        let r = mesh.l2_restriction(2).unwrap();
        assert_eq!(r.global_size(), 16);
        assert_eq!(r.indices()[4..8], [4, 5, 6, 7]);
    }

    #[test]
    fn test_h1_positions_follow_nodes() {
        let mesh = CartesianMesh::new(2, 1, 2.0, 0.5).unwrap();
        let positions = mesh.h1_positions(&[0.0, 0.5, 1.0]);
        let ndofs = mesh.h1_num_dofs(3);
        assert_eq!(ndofs, 15);
        assert_eq!(&positions[..5], &[0.0, 0.5, 1.0, 1.5, 2.0]);
        // Top row, y components
        assert_eq!(&positions[ndofs + 10..ndofs + 15], &[0.5; 5]);
        assert_eq!(positions[ndofs + 5], 0.25);
    }

    #[test]
    fn test_new_rejects_empty_mesh() {
        assert!(CartesianMesh::new(0, 1, 1.0, 1.0).is_err());
        assert!(CartesianMesh::new(1, 1, -1.0, 1.0).is_err());
        assert!(CartesianMesh::unit_square(1).unwrap().h1_restriction(1, 2).is_err());
    }
}
