//! Unit conversion factors shared across the driving stack.

/// Miles per hour to meters per second.
pub const MPH_TO_MS: f64 = 1.609344 / 3.6;
/// Kilometers per hour to meters per second.
pub const KPH_TO_MS: f64 = 1.0 / 3.6;
/// Degrees to radians.
pub const DEG_TO_RAD: f64 = std::f64::consts::PI / 180.0;

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_speed_conversions() {
        assert_abs_diff_eq!(90.0 * KPH_TO_MS, 25.0, epsilon = 1e-9);
        assert_abs_diff_eq!(60.0 * MPH_TO_MS, 26.8224, epsilon = 1e-4);
    }

    #[test]
    fn test_deg_to_rad() {
        assert_abs_diff_eq!(180.0 * DEG_TO_RAD, std::f64::consts::PI, epsilon = 1e-12);
    }
}
