//! Forward collision warning.
//!
//! The warning fires when the lead-following MPC plans a hard deceleration and a
//! set of persistence counters agree the lead is real, close, in path and being
//! approached.

use log::info;

use crate::common::numpy_fast::interp;
use crate::selfdrive::controls::long_mpc::MpcSolution;

/// Deceleration threshold versus lead speed.
const FCW_A_ACT_V: [f64; 2] = [-3.0, -2.0];
const FCW_A_ACT_BP: [f64; 2] = [0.0, 30.0];

/// Time to collision reported when the gap is not closing, in seconds.
const MAX_TTC: f64 = 5.0;
/// Minimum time between two warnings, in seconds.
const FCW_COOLDOWN: f64 = 5.0;
/// Every counter must reach this before a planned deceleration can warn.
const COUNTER_THRESHOLD: f64 = 10.0;
/// Planned deceleration that warns on its own, in m/s^2.
const HARD_DECEL: f64 = -3.0;
/// MPC knots considered for the deceleration delta.
const MPC_KNOTS: usize = 15;

/// Counters tracking how long the current lead has looked threatening.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FcwCounters {
    pub ttc: f64,
    pub v_lead_max: f64,
    pub v_ego_lead: f64,
    pub lead_seen: f64,
    pub y_lead: f64,
    pub vlat_lead: f64,
    pub blinkers: f64,
    pub v_ego: f64,
}

impl FcwCounters {
    fn all_above(&self, threshold: f64) -> bool {
        [
            self.ttc,
            self.v_lead_max,
            self.v_ego_lead,
            self.lead_seen,
            self.y_lead,
            self.vlat_lead,
            self.blinkers,
            self.v_ego,
        ]
        .iter()
        .all(|&c| c >= threshold)
    }
}

/// Counts one more cycle while `cond` holds, and restarts from zero otherwise.
fn persist(counter: f64, cond: bool) -> f64 {
    if cond { counter + 1.0 } else { 0.0 }
}

/// A forward collision warning decision maker.
pub trait CollisionWarning {
    /// Forgets everything learned about the previous lead.
    fn reset_lead(&mut self, cur_time: f64);

    /// Decides whether to warn this cycle.
    ///
    /// # Arguments
    ///
    /// * `mpc_solution` - Trajectory planned against the lead.
    /// * `cur_time` - Current time in seconds.
    /// * `v_ego` - Ego speed.
    /// * `a_ego` - Ego acceleration.
    /// * `x_lead` - Distance to the lead.
    /// * `v_lead` - Lead speed.
    /// * `a_lead` - Lead acceleration.
    /// * `y_lead` - Lateral offset of the lead.
    /// * `vlat_lead` - Lateral speed of the lead.
    /// * `fcw_lead` - Whether the lead is eligible for a warning.
    /// * `blinkers` - Whether a turn signal is on.
    #[allow(clippy::too_many_arguments)]
    fn update(
        &mut self,
        mpc_solution: &MpcSolution,
        cur_time: f64,
        v_ego: f64,
        a_ego: f64,
        x_lead: f64,
        v_lead: f64,
        a_lead: f64,
        y_lead: f64,
        vlat_lead: f64,
        fcw_lead: bool,
        blinkers: bool,
    ) -> bool;
}

/// Computes the time to collision with a lead, capped at 5 seconds.
///
/// # Examples
///
/// ```rust
/// use openpilot_longitudinal::selfdrive::controls::fcw::calc_ttc;
///
/// // closing at 10 m/s on a lead 10 m ahead
/// assert!((calc_ttc(20.0, 0.0, 10.0, 10.0, 0.0) - 1.0).abs() < 1e-9);
/// // lead pulling away
/// assert_eq!(calc_ttc(10.0, 0.0, 10.0, 20.0, 0.0), 5.0);
/// ```
pub fn calc_ttc(v_ego: f64, a_ego: f64, x_lead: f64, v_lead: f64, a_lead: f64) -> f64 {
    let v_rel = v_ego - v_lead;
    // a closing gap caused by a braking lead can last at most until the lead stops
    let t_decel = 2.0;
    let a_rel = (a_ego - a_lead).min(v_lead / t_decel);

    let delta = v_rel.powi(2) + 2.0 * x_lead * a_rel;
    if delta < 0.1 || delta.sqrt() + v_rel < 0.1 {
        MAX_TTC
    } else {
        (2.0 * x_lead / (delta.sqrt() + v_rel)).min(MAX_TTC)
    }
}

/// Forward collision warning based on planned deceleration and lead persistence.
#[derive(Debug, Clone, Default)]
pub struct FcwChecker {
    /// Minimum planned acceleration when the last warning fired.
    pub last_fcw_a: f64,
    /// Highest speed the current lead has been seen at.
    pub v_lead_max: f64,
    /// Time the current lead was acquired.
    pub lead_seen_t: f64,
    /// Time of the last warning.
    pub last_fcw_time: f64,
    /// Minimum acceleration of the latest MPC solution.
    pub last_min_a: f64,
    /// Persistence counters.
    pub counters: FcwCounters,
}

impl FcwChecker {
    /// Creates a new `FcwChecker` instance.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use openpilot_longitudinal::selfdrive::controls::fcw::FcwChecker;
    ///
    /// let checker = FcwChecker::new();
    /// assert_eq!(checker.last_fcw_time, 0.0);
    /// ```
    pub fn new() -> Self {
        Self::default()
    }
}

impl CollisionWarning for FcwChecker {
    fn reset_lead(&mut self, cur_time: f64) {
        self.last_fcw_a = 0.0;
        self.v_lead_max = 0.0;
        self.lead_seen_t = cur_time;
        self.last_min_a = 0.0;
        // blinker and speed history belong to the ego car, not the lead
        self.counters = FcwCounters {
            blinkers: self.counters.blinkers,
            v_ego: self.counters.v_ego,
            ..FcwCounters::default()
        };
    }

    fn update(
        &mut self,
        mpc_solution: &MpcSolution,
        cur_time: f64,
        v_ego: f64,
        a_ego: f64,
        x_lead: f64,
        v_lead: f64,
        a_lead: f64,
        y_lead: f64,
        vlat_lead: f64,
        fcw_lead: bool,
        blinkers: bool,
    ) -> bool {
        self.last_min_a = mpc_solution.min_accel(usize::MAX);
        self.v_lead_max = self.v_lead_max.max(v_lead);

        let c = &mut self.counters;
        // ~3 seconds without blinkers at 20Hz
        c.blinkers = if blinkers {
            0.0
        } else {
            c.blinkers + 10.0 / (20.0 * 3.0)
        };
        c.v_ego = persist(c.v_ego, v_ego > 5.0);

        if !fcw_lead {
            return false;
        }

        let ttc = calc_ttc(v_ego, a_ego, x_lead, v_lead, a_lead);
        c.ttc = persist(c.ttc, ttc < 2.5);
        c.v_lead_max = persist(c.v_lead_max, self.v_lead_max > 2.5);
        c.v_ego_lead = persist(c.v_ego_lead, v_ego > v_lead);
        c.lead_seen += 0.33;
        c.y_lead = persist(c.y_lead, y_lead.abs() < 1.0);
        c.vlat_lead = persist(c.vlat_lead, vlat_lead.abs() < 0.4);

        let a_thr = interp(v_lead, &FCW_A_ACT_BP, &FCW_A_ACT_V);
        let a_delta = mpc_solution.min_accel(MPC_KNOTS) - a_ego.min(0.0);

        let fcw_allowed = c.all_above(COUNTER_THRESHOLD);
        let future_fcw = (self.last_min_a < HARD_DECEL || a_delta < a_thr) && fcw_allowed;

        if future_fcw && self.last_fcw_time + FCW_COOLDOWN < cur_time {
            self.last_fcw_time = cur_time;
            self.last_fcw_a = self.last_min_a;
            info!(
                "FCW triggered: min_a {:.2} a_delta {:.2} a_thr {:.2} counters {:?}",
                self.last_min_a, a_delta, a_thr, self.counters
            );
            return true;
        }

        false
    }
}
