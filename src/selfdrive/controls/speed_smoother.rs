/// Advances a speed trajectory one step toward a target under acceleration and jerk limits.
///
/// The acceleration is first jerk limited around `a_start`, then held inside
/// `[a_min, a_max]`; when the two conflict the acceleration envelope wins, and
/// `a_max` wins over `a_min`. The returned velocity never passes `v_target`.
///
/// # Arguments
///
/// * `v_start` - Velocity at the start of the step, in m/s.
/// * `a_start` - Acceleration at the start of the step, in m/s^2.
/// * `v_target` - Velocity to approach, in m/s.
/// * `a_max` - Highest allowed acceleration, in m/s^2.
/// * `a_min` - Lowest allowed acceleration, in m/s^2.
/// * `j_max` - Highest allowed jerk, in m/s^3.
/// * `j_min` - Lowest allowed jerk, in m/s^3.
/// * `dt` - Step duration, in seconds.
///
/// # Returns
///
/// Velocity and acceleration at the end of the step.
///
/// # Examples
///
/// ```rust
/// use openpilot_longitudinal::selfdrive::controls::speed_smoother::speed_smoother;
///
/// let (v, a) = speed_smoother(20.0, 0.0, 25.0, 0.5, -0.5, 0.5, -0.5, 0.2);
/// assert!((a - 0.1).abs() < 1e-12);
/// assert!((v - 20.01).abs() < 1e-12);
/// ```
#[allow(clippy::too_many_arguments)]
pub fn speed_smoother(
    v_start: f64,
    a_start: f64,
    v_target: f64,
    a_max: f64,
    a_min: f64,
    j_max: f64,
    j_min: f64,
    dt: f64,
) -> (f64, f64) {
    if dt <= 0.0 {
        return (v_start, a_start.max(a_min).min(a_max));
    }

    // acceleration that closes the gap within this step
    let a_des = (v_target - v_start) / dt;
    let a_jerk = a_des.max(a_start + j_min * dt).min(a_start + j_max * dt);
    let mut a = a_jerk.max(a_min).min(a_max);
    let mut v = v_start + 0.5 * (a_start + a) * dt;

    let overshoot_up = v_start <= v_target && v > v_target;
    let overshoot_down = v_start >= v_target && v < v_target;
    if overshoot_up || overshoot_down {
        v = v_target;
        a = 0.0_f64.max(a_min).min(a_max);
    }

    (v, a)
}
