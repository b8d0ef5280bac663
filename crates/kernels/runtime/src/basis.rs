//! 1-D quadrature rules and Lagrange basis tables.
//!
//! Tensor-product kernels only ever see 1-D tables: the values `B` and the
//! derivatives `G` of the `D1D` nodal basis functions at the `Q1D` points,
//! stored point-fastest:
//!
//! ```text
//! b(q, d) = b[q + Q1D * d]        q ∈ [0, Q1D), d ∈ [0, D1D)
//! ```
//!
//! Everything lives on the reference interval `[0, 1]`, so the 2-D weights
//! of one reference square sum to one.
//!
//! H1 fields use Lagrange polynomials on Gauss–Lobatto–Legendre nodes
//! (endpoints included, so neighbouring elements share dofs); L2 fields use
//! Gauss–Legendre nodes.

use std::f64::consts::PI;

use crate::error::{Error, Result};

const NEWTON_TOL: f64 = 1e-15;
const NEWTON_MAX_ITER: usize = 100;

/// Legendre polynomials `(P_n(x), P_{n-1}(x))` by the three-term recurrence.
fn legendre_pair(n: usize, x: f64) -> (f64, f64) {
    let mut p_prev = 1.0;
    if n == 0 {
        return (p_prev, 0.0);
    }
    let mut p = x;
    for k in 2..=n {
        let kf = k as f64;
        let p_next = ((2.0 * kf - 1.0) * x * p - (kf - 1.0) * p_prev) / kf;
        p_prev = p;
        p = p_next;
    }
    (p, p_prev)
}

/// Gauss–Legendre points and weights on `[0, 1]`, points ascending.
///
/// Roots of `P_n` by Newton iteration from the Chebyshev-like guess
/// `cos(π (i + 3/4) / (n + 1/2))`.
pub fn gauss_legendre(n: usize) -> (Vec<f64>, Vec<f64>) {
    let mut points = Vec::with_capacity(n);
    let mut weights = Vec::with_capacity(n);
    let nf = n as f64;

    for i in 0..n {
        let mut x = (PI * (i as f64 + 0.75) / (nf + 0.5)).cos();
        let mut dp = 1.0;
        for _ in 0..NEWTON_MAX_ITER {
            let (p, p_prev) = legendre_pair(n, x);
            dp = nf * (x * p - p_prev) / (x * x - 1.0);
            let dx = p / dp;
            x -= dx;
            if dx.abs() <= NEWTON_TOL {
                break;
            }
        }
        // Recompute the derivative at the converged root for the weight
        let (p, p_prev) = legendre_pair(n, x);
        if x * x != 1.0 {
            dp = nf * (x * p - p_prev) / (x * x - 1.0);
        }
        // x descends from +1; map to ascending points on [0, 1]
        points.push(0.5 * (1.0 - x));
        weights.push(1.0 / ((1.0 - x * x) * dp * dp));
    }

    (points, weights)
}

/// Gauss–Lobatto–Legendre nodes on `[0, 1]`, ascending, endpoints included.
///
/// Interior nodes are the roots of `P'_{n-1}`, found with the fixed-point
/// form `x ← x − (x P_{n-1} − P_{n-2}) / (n P_{n-1})` which leaves `±1`
/// invariant. A single node sits at the midpoint.
pub fn gauss_lobatto_nodes(n: usize) -> Vec<f64> {
    match n {
        0 => return Vec::new(),
        1 => return vec![0.5],
        _ => {}
    }

    let degree = n - 1;
    let nf = n as f64;
    (0..n)
        .map(|i| {
            let mut x = (PI * i as f64 / degree as f64).cos();
            for _ in 0..NEWTON_MAX_ITER {
                let (p, p_prev) = legendre_pair(degree, x);
                let dx = (x * p - p_prev) / (nf * p);
                x -= dx;
                if dx.abs() <= NEWTON_TOL {
                    break;
                }
            }
            0.5 * (1.0 - x)
        })
        .collect()
}

/// Lagrange basis on `nodes` evaluated at `points`.
///
/// Returns `(values, derivatives)`, each `points.len() * nodes.len()` long
/// in the `b[q + Q1D * d]` layout.
pub fn lagrange_tables(nodes: &[f64], points: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let nd = nodes.len();
    let nq = points.len();
    let mut values = vec![0.0; nq * nd];
    let mut derivatives = vec![0.0; nq * nd];

    for (d, &xd) in nodes.iter().enumerate() {
        for (q, &t) in points.iter().enumerate() {
            let mut value = 1.0;
            let mut derivative = 0.0;
            for (k, &xk) in nodes.iter().enumerate() {
                if k == d {
                    continue;
                }
                let denom = xd - xk;
                // Product rule, accumulated alongside the product itself
                derivative = derivative * (t - xk) / denom + value / denom;
                value *= (t - xk) / denom;
            }
            values[q + nq * d] = value;
            derivatives[q + nq * d] = derivative;
        }
    }

    (values, derivatives)
}

// ============================================================================
// Quadrature Rule
// ============================================================================

/// Tensor-product Gauss–Legendre rule on the reference square.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadratureRule {
    points: Vec<f64>,
    weights: Vec<f64>,
}

impl QuadratureRule {
    /// `n` points per axis.
    pub fn gauss_legendre(n: usize) -> Self {
        let (points, weights) = gauss_legendre(n);
        Self { points, weights }
    }

    /// Points per axis.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 1-D points on `[0, 1]`.
    pub fn points(&self) -> &[f64] {
        &self.points
    }

    /// 1-D weights, summing to one.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// 2-D weights `w[qx + Q1D * qy] = w_x * w_y`.
    pub fn weights_2d(&self) -> Vec<f64> {
        self.weights
            .iter()
            .flat_map(|&wy| self.weights.iter().map(move |&wx| wx * wy))
            .collect()
    }
}

// ============================================================================
// Basis Table
// ============================================================================

/// Values and derivatives of a 1-D nodal basis at the quadrature points.
#[derive(Debug, Clone, PartialEq)]
pub struct BasisTable {
    dofs_1d: usize,
    quad_1d: usize,
    values: Vec<f64>,
    derivatives: Vec<f64>,
}

impl BasisTable {
    /// Wrap externally built tables, checking both are `quad_1d * dofs_1d`.
    pub fn new(
        dofs_1d: usize,
        quad_1d: usize,
        values: Vec<f64>,
        derivatives: Vec<f64>,
    ) -> Result<Self> {
        let expected = dofs_1d * quad_1d;
        for (buffer, actual) in [
            ("basis values", values.len()),
            ("basis derivatives", derivatives.len()),
        ] {
            if actual != expected {
                return Err(Error::SizeMismatch {
                    buffer,
                    expected,
                    actual,
                });
            }
        }
        Ok(Self {
            dofs_1d,
            quad_1d,
            values,
            derivatives,
        })
    }

    /// Lagrange basis on arbitrary nodes.
    pub fn lagrange(nodes: &[f64], rule: &QuadratureRule) -> Self {
        let (values, derivatives) = lagrange_tables(nodes, rule.points());
        Self {
            dofs_1d: nodes.len(),
            quad_1d: rule.len(),
            values,
            derivatives,
        }
    }

    /// Continuous basis of the kinematic space: Lagrange on GLL nodes.
    pub fn h1(dofs_1d: usize, rule: &QuadratureRule) -> Self {
        Self::lagrange(&gauss_lobatto_nodes(dofs_1d), rule)
    }

    /// Discontinuous basis of the thermodynamic space: Lagrange on Gauss nodes.
    pub fn l2(dofs_1d: usize, rule: &QuadratureRule) -> Self {
        Self::lagrange(&gauss_legendre(dofs_1d).0, rule)
    }

    pub fn dofs_1d(&self) -> usize {
        self.dofs_1d
    }

    pub fn quad_1d(&self) -> usize {
        self.quad_1d
    }

    /// `B`, point-fastest.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// `G`, point-fastest.
    pub fn derivatives(&self) -> &[f64] {
        &self.derivatives
    }

    #[inline]
    pub fn value(&self, q: usize, d: usize) -> f64 {
        self.values[q + self.quad_1d * d]
    }

    #[inline]
    pub fn derivative(&self, q: usize, d: usize) -> f64 {
        self.derivatives[q + self.quad_1d * d]
    }
}
