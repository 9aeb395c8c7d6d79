use serde::Deserialize;

use self::toyota::values::CarFingerprint;

pub mod toyota;

/// Static vehicle parameters the longitudinal stack depends on.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CarParams {
    /// Platform the stack is running on; selects the radar layout.
    pub car_fingerprint: CarFingerprint,
    /// Steering wheel to road wheel angle ratio.
    pub steer_ratio: f64,
    /// Distance between the axles in meters.
    pub wheelbase: f64,
    /// Acceleration requested while the controller is in the starting state, in m/s^2.
    pub start_accel: f64,
}

impl CarParams {
    /// Creates a new `CarParams` instance.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use openpilot_longitudinal::selfdrive::car::CarParams;
    /// use openpilot_longitudinal::selfdrive::car::toyota::values::CarFingerprint;
    ///
    /// let cp = CarParams::new(CarFingerprint::Prius, 15.74, 2.70, 0.0);
    /// assert_eq!(cp.steer_ratio, 15.74);
    /// ```
    pub fn new(
        car_fingerprint: CarFingerprint,
        steer_ratio: f64,
        wheelbase: f64,
        start_accel: f64,
    ) -> Self {
        CarParams {
            car_fingerprint,
            steer_ratio,
            wheelbase,
            start_accel,
        }
    }
}
