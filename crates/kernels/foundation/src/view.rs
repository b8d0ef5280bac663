//! Fixed-rank views over flat buffers.
//!
//! The tensor-product kernels address flat `f64` buffers through
//! multi-index coordinates such as `(qx, qy, component, element)`. A
//! [`Shape`] owns the extents and computes offsets with the first index
//! varying fastest; [`View`] and [`ViewMut`] pair a shape with a borrowed
//! buffer whose length was checked once at construction.
//!
//! ```text
//! Shape([Q1D, Q1D, VDIM, NE])
//!
//! offset(qx, qy, c, e) = qx + Q1D * (qy + Q1D * (c + VDIM * e))
//! ```

use thiserror::Error;

/// Errors raised when a buffer does not match the requested shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    /// Buffer length differs from the product of the extents.
    #[error("buffer of length {actual} cannot be viewed as {extents:?} (needs {expected})")]
    LengthMismatch {
        extents: Vec<usize>,
        expected: usize,
        actual: usize,
    },
}

/// Extents of a rank-`N` array with first-index-fastest layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape<const N: usize> {
    extents: [usize; N],
}

impl<const N: usize> Shape<N> {
    pub const fn new(extents: [usize; N]) -> Self {
        Self { extents }
    }

    pub fn extents(&self) -> [usize; N] {
        self.extents
    }

    /// Extent along `axis`.
    pub fn extent(&self, axis: usize) -> usize {
        self.extents[axis]
    }

    /// Total number of entries.
    pub fn len(&self) -> usize {
        self.extents.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flat offset of a multi-index.
    #[inline]
    pub fn offset(&self, index: [usize; N]) -> usize {
        let mut offset = 0;
        let mut stride = 1;
        for axis in 0..N {
            debug_assert!(
                index[axis] < self.extents[axis],
                "index {} out of bounds for axis {} of extent {}",
                index[axis],
                axis,
                self.extents[axis]
            );
            offset += index[axis] * stride;
            stride *= self.extents[axis];
        }
        offset
    }

    fn check(&self, actual: usize) -> Result<(), ShapeError> {
        let expected = self.len();
        if actual == expected {
            Ok(())
        } else {
            Err(ShapeError::LengthMismatch {
                extents: self.extents.to_vec(),
                expected,
                actual,
            })
        }
    }
}

/// Read-only rank-`N` view.
#[derive(Debug, Clone, Copy)]
pub struct View<'a, const N: usize> {
    data: &'a [f64],
    shape: Shape<N>,
}

impl<'a, const N: usize> View<'a, N> {
    /// View `data` with the given extents; fails if the length differs.
    pub fn new(data: &'a [f64], extents: [usize; N]) -> Result<Self, ShapeError> {
        let shape = Shape::new(extents);
        shape.check(data.len())?;
        Ok(Self { data, shape })
    }

    pub fn shape(&self) -> Shape<N> {
        self.shape
    }

    #[inline]
    pub fn at(&self, index: [usize; N]) -> f64 {
        self.data[self.shape.offset(index)]
    }

    pub fn as_slice(&self) -> &'a [f64] {
        self.data
    }
}

/// Mutable rank-`N` view.
#[derive(Debug)]
pub struct ViewMut<'a, const N: usize> {
    data: &'a mut [f64],
    shape: Shape<N>,
}

impl<'a, const N: usize> ViewMut<'a, N> {
    pub fn new(data: &'a mut [f64], extents: [usize; N]) -> Result<Self, ShapeError> {
        let shape = Shape::new(extents);
        shape.check(data.len())?;
        Ok(Self { data, shape })
    }

    pub fn shape(&self) -> Shape<N> {
        self.shape
    }

    #[inline]
    pub fn at(&self, index: [usize; N]) -> f64 {
        self.data[self.shape.offset(index)]
    }

    #[inline]
    pub fn set(&mut self, index: [usize; N], value: f64) {
        let offset = self.shape.offset(index);
        self.data[offset] = value;
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data[..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_index_fastest() {
        let shape = Shape::new([4, 4, 2, 3]);
        assert_eq!(shape.offset([1, 0, 0, 0]), 1);
        assert_eq!(shape.offset([0, 1, 0, 0]), 4);
        assert_eq!(shape.offset([0, 0, 1, 0]), 16);
        assert_eq!(shape.offset([0, 0, 0, 1]), 32);
        assert_eq!(shape.len(), 96);
    }

    #[test]
    fn test_view_rejects_wrong_length() {
        let data = vec![0.0; 10];
        let err = View::new(&data, [3, 3]).unwrap_err();
        assert_eq!(
            err,
            ShapeError::LengthMismatch {
                extents: vec![3, 3],
                expected: 9,
                actual: 10
            }
        );
    }

    #[test]
    fn test_view_mut_roundtrip_through_offsets() {
        let mut data = vec![0.0; 6];
        let mut view = ViewMut::new(&mut data, [2, 3]).unwrap();
        view.set([1, 2], 7.0);
        assert_eq!(view.at([1, 2]), 7.0);
        assert_eq!(data[5], 7.0);
    }
}
