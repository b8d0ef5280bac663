//! Scalar Math Kernels
//!
//! The overflow-safe Euclidean norm and the smoothed 0→1 step used to switch
//! the shock viscosity on without a hard branch.

/// Euclidean norm with incremental rescaling.
///
/// Keeps a running scale (the largest magnitude seen so far) and a sum of
/// squares relative to it, so neither `1e150` nor `1e-170` entries overflow
/// or underflow when squared. Zero entries are skipped.
///
/// Returns `0.0` for an empty slice and `|v[0]|` for a singleton.
pub fn norm2(v: &[f64]) -> f64 {
    match v {
        [] => return 0.0,
        [x] => return x.abs(),
        _ => {}
    }

    let mut scale = 0.0_f64;
    let mut sum = 0.0_f64;
    for &x in v {
        if x == 0.0 {
            continue;
        }
        let abs = x.abs();
        if scale <= abs {
            let r = scale / abs;
            sum = 1.0 + sum * (r * r);
            scale = abs;
        } else {
            let r = abs / scale;
            sum += r * r;
        }
    }
    scale * sum.sqrt()
}

/// Smooth transition between 0 and 1 for `x` in `[-eps, eps]`.
///
/// Flat 0 at or below `-eps`, flat 1 at or above `eps`, and the cubic
/// Hermite blend `(3 - 2y) y²` with `y = (x + eps) / (2 eps)` in between.
/// The blend is `C¹` at both ends and equals `0.5` at `x = 0`.
#[inline]
pub fn smooth_step_01(x: f64, eps: f64) -> f64 {
    let y = (x + eps) / (2.0 * eps);
    if y < 0.0 {
        return 0.0;
    }
    if y > 1.0 {
        return 1.0;
    }
    (3.0 - 2.0 * y) * y * y
}
