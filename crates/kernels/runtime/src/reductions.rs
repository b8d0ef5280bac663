//! Deterministic reductions over per-point results.
//!
//! The global time step is the minimum over every `(zone, point)` bound, and
//! the reference volume is a sum over every point. Both must not depend on
//! how rayon split the work, so they run over a fixed binary tree whose
//! pairing is determined by index:
//!
//! ```text
//! Points: [p0, p1, p2, p3, p4]
//!
//! Level 0: p0∘p1  p2∘p3  p4
//! Level 1: (p0∘p1)∘(p2∘p3)  p4
//! Level 2: ((p0∘p1)∘(p2∘p3))∘p4
//! ```
//!
//! | Function | Notes |
//! |----------|-------|
//! | [`sum`] | Fixed-tree reduction for deterministic floating-point |
//! | [`min`] | `+∞` for an empty slice |
//! | [`min_indexed`] | Lowest index wins ties |

use std::cmp::Ordering;

/// Result of a min reduction that tracks the winning index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexedValue<T> {
    /// The index of the winning element
    pub index: usize,
    /// The value at that index
    pub value: T,
}

impl<T> IndexedValue<T> {
    pub fn new(index: usize, value: T) -> Self {
        Self { index, value }
    }
}

// ============================================================================
// Core Tree Reduction
// ============================================================================

/// Deterministic tree reduction with a binary operation.
///
/// Returns `None` for an empty slice. Odd elements are carried up a level
/// unchanged.
pub fn tree_reduce<T, F>(values: &[T], op: F) -> Option<T>
where
    T: Copy,
    F: Fn(T, T) -> T,
{
    match values {
        [] => return None,
        [only] => return Some(*only),
        _ => {}
    }

    let mut current: Vec<T> = values.to_vec();
    let mut next: Vec<T> = Vec::with_capacity(values.len().div_ceil(2));

    while current.len() > 1 {
        next.clear();

        let mut i = 0;
        while i + 1 < current.len() {
            next.push(op(current[i], current[i + 1]));
            i += 2;
        }

        // Carry forward odd element
        if i < current.len() {
            next.push(current[i]);
        }

        std::mem::swap(&mut current, &mut next);
    }

    current.first().copied()
}

/// Deterministic tree reduction that tracks the winning index.
///
/// `cmp(a, b) == Less` means `a` wins. On `Equal` the lower index wins, so
/// the result is unique even with repeated values.
pub fn tree_reduce_indexed<T, F>(values: &[T], cmp: F) -> Option<IndexedValue<T>>
where
    T: Copy,
    F: Fn(T, T) -> Ordering,
{
    let indexed: Vec<IndexedValue<T>> = values
        .iter()
        .enumerate()
        .map(|(i, &v)| IndexedValue::new(i, v))
        .collect();

    tree_reduce(&indexed, |a, b| match cmp(a.value, b.value) {
        Ordering::Less => a,
        Ordering::Greater => b,
        Ordering::Equal => {
            if a.index <= b.index {
                a
            } else {
                b
            }
        }
    })
}

// ============================================================================
// Reduction Operations
// ============================================================================

/// Deterministic sum using fixed-tree reduction.
pub fn sum(values: &[f64]) -> f64 {
    tree_reduce(values, |a, b| a + b).unwrap_or(0.0)
}

/// Deterministic minimum with index tracking.
///
/// Uses the IEEE total order, so `-0.0` ranks below `0.0` and a NaN never
/// wins over a number.
pub fn min_indexed(values: &[f64]) -> Option<IndexedValue<f64>> {
    tree_reduce_indexed(values, |a, b| {
        match (a.is_nan(), b.is_nan()) {
            (false, true) => Ordering::Less,
            (true, false) => Ordering::Greater,
            _ => a.total_cmp(&b),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_reduce_empty_and_single() {
        assert_eq!(tree_reduce(&[] as &[f64], |a, b| a + b), None);
        assert_eq!(tree_reduce(&[3.0], |a, b| a + b), Some(3.0));
    }

    #[test]
    fn test_tree_reduce_fixed_pairing() {
        // ((a-b)-(c-d))-e exposes the tree shape
        let values = [10.0, 1.0, 5.0, 2.0, 4.0];
        assert_eq!(tree_reduce(&values, |a, b| a - b), Some((9.0 - 3.0) - 4.0));
    }

    #[test]
    fn test_sum_is_deterministic() {
        let values: Vec<f64> = (0..1001).map(|i| (i as f64 * 0.37).sin()).collect();
        assert_eq!(sum(&values).to_bits(), sum(&values).to_bits());
        assert_eq!(sum(&[]), 0.0);
    }

    #[test]
    fn test_min_indexed_lowest_index_wins_ties() {
        let values = [0.5, 0.2, 0.7, 0.2, 0.9];
        let result = min_indexed(&values).unwrap();
        assert_eq!(result.index, 1);
        assert_eq!(result.value, 0.2);
    }

    #[test]
    fn test_min_indexed_ignores_nan_and_handles_infinity() {
        let result = min_indexed(&[f64::NAN, 2.0, f64::INFINITY]).unwrap();
        assert_eq!((result.index, result.value), (1, 2.0));
        assert!(min_indexed(&[]).is_none());
        assert_eq!(min_indexed(&[f64::INFINITY, 0.0]).unwrap().value, 0.0);
    }
}
