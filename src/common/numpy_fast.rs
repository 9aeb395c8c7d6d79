use interp::interp as interp_linear;

/// Looks up `x` in a breakpoint table, holding the end values outside the table.
///
/// # Arguments
///
/// * `x` - Point to evaluate.
/// * `xp` - Breakpoints, sorted ascending.
/// * `fp` - Values at each breakpoint.
///
/// # Returns
///
/// The linearly interpolated value, or the first/last value when `x` lies outside `xp`.
///
/// # Examples
///
/// ```rust
/// use openpilot_longitudinal::common::numpy_fast::interp;
///
/// let bp = [0.0, 10.0, 20.0];
/// let v = [1.0, 0.5, 0.0];
/// assert!((interp(5.0, &bp, &v) - 0.75).abs() < 1e-9);
/// assert!((interp(-3.0, &bp, &v) - 1.0).abs() < 1e-9);
/// assert!(interp(40.0, &bp, &v).abs() < 1e-9);
/// ```
pub fn interp(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    match (xp.first(), xp.last()) {
        (Some(&lo), Some(&hi)) => interp_linear(xp, fp, x.clamp(lo, hi)),
        _ => 0.0,
    }
}
