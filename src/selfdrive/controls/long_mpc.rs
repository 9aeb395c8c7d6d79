//! Interface to the lead-following model predictive controller.
//!
//! The solver itself lives outside this crate. The planner runs one instance
//! per lead and only relies on the trait below.

use ndarray::Array1;

use crate::selfdrive::controls::radar_helpers::Lead;
use crate::selfdrive::messaging::CarState;

/// Optimized trajectory over the MPC horizon.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MpcSolution {
    /// Time of each knot, in seconds from now.
    pub t: Array1<f64>,
    /// Ego velocity at each knot, in m/s.
    pub v_ego: Array1<f64>,
    /// Ego acceleration at each knot, in m/s^2.
    pub a_ego: Array1<f64>,
}

impl MpcSolution {
    /// Lowest acceleration among the first `n` knots, or 0 for an empty solution.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ndarray::arr1;
    /// use openpilot_longitudinal::selfdrive::controls::long_mpc::MpcSolution;
    ///
    /// let sol = MpcSolution {
    ///     t: arr1(&[0.0, 0.2, 0.4]),
    ///     v_ego: arr1(&[10.0, 9.8, 9.2]),
    ///     a_ego: arr1(&[-1.0, -3.0, -0.5]),
    /// };
    /// assert_eq!(sol.min_accel(1), -1.0);
    /// assert_eq!(sol.min_accel(usize::MAX), -3.0);
    /// assert_eq!(MpcSolution::default().min_accel(3), 0.0);
    /// ```
    pub fn min_accel(&self, n: usize) -> f64 {
        self.a_ego
            .iter()
            .take(n)
            .copied()
            .reduce(f64::min)
            .unwrap_or(0.0)
    }
}

/// Result of one MPC step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MpcPlan {
    /// Velocity to command now, in m/s.
    pub v_mpc: f64,
    /// Acceleration to command now, in m/s^2.
    pub a_mpc: f64,
    /// Velocity a short horizon ahead, in m/s.
    pub v_mpc_future: f64,
    /// The lead was acquired this step.
    pub new_lead: bool,
    /// A lead is being followed.
    pub has_lead: bool,
    pub solution: MpcSolution,
}

/// A lead-following trajectory solver.
///
/// # Examples
///
/// ```rust
/// use openpilot_longitudinal::selfdrive::controls::long_mpc::{LongitudinalMpc, MpcPlan};
/// use openpilot_longitudinal::selfdrive::controls::radar_helpers::Lead;
/// use openpilot_longitudinal::selfdrive::messaging::CarState;
///
/// /// Holds the current speed whenever a lead is present.
/// struct HoldSpeed {
///     v: f64,
/// }
///
/// impl LongitudinalMpc for HoldSpeed {
///     fn set_cur_state(&mut self, v: f64, _a: f64) {
///         self.v = v;
///     }
///
///     fn update(&mut self, _cs: &CarState, lead: &Lead, v_cruise_setpoint: f64) -> MpcPlan {
///         MpcPlan {
///             v_mpc: self.v,
///             v_mpc_future: self.v.min(v_cruise_setpoint),
///             has_lead: lead.status,
///             ..MpcPlan::default()
///         }
///     }
/// }
///
/// let mut mpc = HoldSpeed { v: 0.0 };
/// mpc.set_cur_state(12.0, 0.0);
/// let plan = mpc.update(&CarState::default(), &Lead::new(), 20.0);
/// assert_eq!(plan.v_mpc, 12.0);
/// assert!(!plan.has_lead);
/// ```
pub trait LongitudinalMpc {
    /// Sets the velocity and acceleration the next trajectory starts from.
    fn set_cur_state(&mut self, v: f64, a: f64);

    /// Solves for a trajectory following `lead` without exceeding `v_cruise_setpoint`.
    fn update(&mut self, car_state: &CarState, lead: &Lead, v_cruise_setpoint: f64) -> MpcPlan;
}
