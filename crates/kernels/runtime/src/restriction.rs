//! Global-to-element restriction of nodal fields.
//!
//! Global vectors store `vdim` components one after another ("byNODES"):
//! component `c` of dof `i` lives at `i + c * ndofs`. Element-local vectors
//! use the lexicographic layout the interpolation kernels expect:
//!
//! ```text
//! local[i + nd * (c + vdim * e)] = global[map[i + nd * e] + c * ndofs]
//! ```

use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::executor::ChunkConfig;

/// Gathers the element-local copy of a global nodal vector.
pub trait ElementRestriction: Send + Sync {
    fn num_elements(&self) -> usize;

    /// Dofs per element and component (`D1D²` for tensor-product elements).
    fn dofs_per_element(&self) -> usize;

    /// Field components.
    fn vdim(&self) -> usize;

    /// Length of the global vector, all components included.
    fn global_size(&self) -> usize;

    /// Length of the element-local vector.
    fn local_size(&self) -> usize {
        self.dofs_per_element() * self.vdim() * self.num_elements()
    }

    /// Gather `global` into `local`.
    fn restrict(&self, global: &[f64], local: &mut [f64], chunk: &ChunkConfig) -> Result<()>;
}

/// Restriction through an explicit per-element index map.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedRestriction {
    ndofs: usize,
    vdim: usize,
    dofs_per_element: usize,
    indices: Vec<usize>,
}

impl IndexedRestriction {
    /// Build from the flat map `indices[i + dofs_per_element * e]`.
    ///
    /// Fails when the map does not cover whole elements or points past
    /// `ndofs`.
    pub fn new(
        ndofs: usize,
        vdim: usize,
        dofs_per_element: usize,
        indices: Vec<usize>,
    ) -> Result<Self> {
        if dofs_per_element == 0 || indices.len() % dofs_per_element != 0 {
            return Err(Error::InvalidConfig(format!(
                "element map of length {} does not split into elements of {} dofs",
                indices.len(),
                dofs_per_element
            )));
        }
        if vdim == 0 {
            return Err(Error::InvalidConfig("restriction vdim must be at least 1".into()));
        }
        if let Some(&bad) = indices.iter().find(|&&i| i >= ndofs) {
            return Err(Error::InvalidConfig(format!(
                "element map references dof {bad} of {ndofs}"
            )));
        }
        Ok(Self {
            ndofs,
            vdim,
            dofs_per_element,
            indices,
        })
    }

    /// Same element map for a field with a different number of components.
    pub fn with_vdim(&self, vdim: usize) -> Result<Self> {
        Self::new(self.ndofs, vdim, self.dofs_per_element, self.indices.clone())
    }

    /// Scalar dofs in the global space.
    pub fn ndofs(&self) -> usize {
        self.ndofs
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }
}

impl ElementRestriction for IndexedRestriction {
    fn num_elements(&self) -> usize {
        self.indices.len() / self.dofs_per_element
    }

    fn dofs_per_element(&self) -> usize {
        self.dofs_per_element
    }

    fn vdim(&self) -> usize {
        self.vdim
    }

    fn global_size(&self) -> usize {
        self.ndofs * self.vdim
    }

    fn restrict(&self, global: &[f64], local: &mut [f64], chunk: &ChunkConfig) -> Result<()> {
        for (buffer, expected, actual) in [
            ("global vector", self.global_size(), global.len()),
            ("local vector", self.local_size(), local.len()),
        ] {
            if expected != actual {
                return Err(Error::SizeMismatch {
                    buffer,
                    expected,
                    actual,
                });
            }
        }

        let nd = self.dofs_per_element;
        let ne = self.num_elements();
        if ne == 0 {
            return Ok(());
        }
        local
            .par_chunks_mut(nd * self.vdim)
            .zip(self.indices.par_chunks(nd))
            .with_min_len(chunk.min_len(ne))
            .for_each(|(element, map)| {
                for (c, component) in element.chunks_mut(nd).enumerate() {
                    let offset = c * self.ndofs;
                    for (dst, &idx) in component.iter_mut().zip(map) {
                        *dst = global[idx + offset];
                    }
                }
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_segment_map() -> IndexedRestriction {
        // Two elements sharing dof 1: [0, 1] and [1, 2]
        IndexedRestriction::new(3, 1, 2, vec![0, 1, 1, 2]).unwrap()
    }

    #[test]
    fn test_restrict_scalar_shares_dofs() {
        let r = two_segment_map();
        let mut local = vec![0.0; r.local_size()];
        r.restrict(&[10.0, 20.0, 30.0], &mut local, &ChunkConfig::default())
            .unwrap();
        assert_eq!(local, vec![10.0, 20.0, 20.0, 30.0]);
    }

    #[test]
    fn test_restrict_by_nodes_components() {
        let r = two_segment_map().with_vdim(2).unwrap();
        assert_eq!(r.global_size(), 6);
        // x components then y components
        let global = [0.0, 1.0, 2.0, 100.0, 101.0, 102.0];
        let mut local = vec![0.0; r.local_size()];
        r.restrict(&global, &mut local, &ChunkConfig::fine_grained())
            .unwrap();
        assert_eq!(
            local,
            vec![0.0, 1.0, 100.0, 101.0, 1.0, 2.0, 101.0, 102.0]
        );
    }

    #[test]
    fn test_restrict_checks_lengths() {
        let r = two_segment_map();
        let mut local = vec![0.0; 3];
        assert!(matches!(
            r.restrict(&[0.0; 3], &mut local, &ChunkConfig::default()),
            Err(Error::SizeMismatch {
                buffer: "local vector",
                expected: 4,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_new_rejects_bad_maps() {
        assert!(IndexedRestriction::new(3, 1, 2, vec![0, 1, 2]).is_err());
        assert!(IndexedRestriction::new(3, 1, 2, vec![0, 3]).is_err());
        assert!(IndexedRestriction::new(3, 0, 2, vec![0, 1]).is_err());
    }
}
