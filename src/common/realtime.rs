//! Cycle periods and the monotonic clock used to timestamp them.

use std::sync::OnceLock;
use std::time::Instant;

/// Period of the actuation sub-step the plan is interpolated over, in seconds.
pub const DT_PLAN: f64 = 0.05;
/// Nominal radar cycle period, in seconds.
pub const DT_RADAR: f64 = 0.05;

static BOOT: OnceLock<Instant> = OnceLock::new();

/// Returns the seconds elapsed on the monotonic clock since the first call in this process.
///
/// # Examples
///
/// ```rust
/// use openpilot_longitudinal::common::realtime::sec_since_boot;
///
/// let t0 = sec_since_boot();
/// let t1 = sec_since_boot();
/// assert!(t1 >= t0);
/// ```
pub fn sec_since_boot() -> f64 {
    BOOT.get_or_init(Instant::now).elapsed().as_secs_f64()
}
