//! Longitudinal planner.
//!
//! Every time a new radar state arrives the planner computes a cruise-only
//! trajectory, runs one MPC per lead, and commands whichever of the three
//! proposals is slowest. The chosen acceleration is then integrated over one
//! actuation step to give the next cycle a continuous starting point.

use log::{debug, warn};
use serde::Deserialize;
use std::time::Duration;

use crate::common::conversions::{DEG_TO_RAD, KPH_TO_MS, MPH_TO_MS};
use crate::common::numpy_fast::interp;
use crate::common::realtime::{sec_since_boot, DT_PLAN};
use crate::selfdrive::car::CarParams;
use crate::selfdrive::controls::fcw::{CollisionWarning, FcwChecker};
use crate::selfdrive::controls::long_mpc::{LongitudinalMpc, MpcPlan};
use crate::selfdrive::controls::longcontrol::{LongCtrlState, MIN_CAN_SPEED};
use crate::selfdrive::controls::speed_smoother::speed_smoother;
use crate::selfdrive::messaging::{
    CarState, ControlsState, LiveMapData, LongitudinalPlanSource, Plan, PlanPublisher, RadarError,
    RadarState, Service,
};

/// Speed reported when no curvature limit applies.
pub const NO_CURVATURE_SPEED: f64 = 200.0 * MPH_TO_MS;

/// Duration of the first MPC step, in seconds.
pub const LON_MPC_STEP: f64 = 0.2;
/// Smooth deceleration applied while the driver is distracted, in m/s^2.
pub const AWARENESS_DECEL: f64 = -0.2;

/// Oldest map data still used, in seconds.
const MAP_MAX_AGE: f64 = 10.0;
/// Radar sweep timeout used when none, or an unusable one, is configured.
const DEFAULT_RADAR_SWEEP_TIMEOUT: Duration = Duration::from_millis(150);

// lookup tables VS speed to determine min and max accels in cruise
// make sure these accelerations are smaller than mpc limits
const A_CRUISE_MIN_V: [f64; 5] = [-1.0, -0.8, -0.67, -0.5, -0.30];
const A_CRUISE_MIN_BP: [f64; 5] = [0.0, 5.0, 10.0, 20.0, 40.0];

// need fast accel at very low speed for stop and go
const A_CRUISE_MAX_V: [f64; 5] = [1.1, 1.1, 0.8, 0.5, 0.3];
const A_CRUISE_MAX_V_FOLLOWING: [f64; 5] = [1.6, 1.6, 1.2, 0.7, 0.3];
const A_CRUISE_MAX_BP: [f64; 5] = [0.0, 5.0, 10.0, 20.0, 40.0];

// total acceleration budget for turns
const A_TOTAL_MAX_V: [f64; 3] = [1.5, 1.9, 3.2];
const A_TOTAL_MAX_BP: [f64; 3] = [0.0, 20.0, 40.0];

/// Looks up the cruise acceleration envelope for the current speed.
///
/// # Arguments
///
/// * `v_ego` - Ego vehicle speed in m/s.
/// * `following` - Whether a lead is being closely and compatibly followed.
///
/// # Returns
///
/// `[a_min, a_max]` in m/s^2.
///
/// # Examples
///
/// ```rust
/// use openpilot_longitudinal::selfdrive::controls::planner::calc_cruise_accel_limits;
///
/// let [a_min, a_max] = calc_cruise_accel_limits(20.0, false);
/// assert!((a_min + 0.5).abs() < 1e-9 && (a_max - 0.5).abs() < 1e-9);
///
/// let [_, a_max_following] = calc_cruise_accel_limits(20.0, true);
/// assert!((a_max_following - 0.7).abs() < 1e-9);
/// ```
pub fn calc_cruise_accel_limits(v_ego: f64, following: bool) -> [f64; 2] {
    let a_cruise_min = interp(v_ego, &A_CRUISE_MIN_BP, &A_CRUISE_MIN_V);

    let a_cruise_max = if following {
        interp(v_ego, &A_CRUISE_MAX_BP, &A_CRUISE_MAX_V_FOLLOWING)
    } else {
        interp(v_ego, &A_CRUISE_MAX_BP, &A_CRUISE_MAX_V)
    };
    [a_cruise_min, a_cruise_max]
}

/// Limits the longitudinal acceleration to what the tires can give on top of the
/// current lateral acceleration, so the car doesn't accelerate when losing the
/// lead in a turn.
///
/// # Arguments
///
/// * `v_ego` - Ego vehicle speed in m/s.
/// * `angle_steers` - Steering wheel angle in degrees.
/// * `a_target` - `[a_min, a_max]` to limit.
/// * `cp` - Vehicle parameters providing steer ratio and wheelbase.
///
/// # Examples
///
/// ```rust
/// use openpilot_longitudinal::selfdrive::car::CarParams;
/// use openpilot_longitudinal::selfdrive::car::toyota::values::CarFingerprint;
/// use openpilot_longitudinal::selfdrive::controls::planner::limit_accel_in_turns;
///
/// let cp = CarParams::new(CarFingerprint::Prius, 15.74, 2.70, 0.0);
/// let straight = limit_accel_in_turns(20.0, 0.0, [-0.5, 5.0], &cp);
/// assert_eq!(straight[0], -0.5);
/// assert!((straight[1] - 1.9).abs() < 1e-9);
///
/// // hard left at speed leaves no budget for acceleration
/// let turning = limit_accel_in_turns(20.0, 90.0, [-0.5, 5.0], &cp);
/// assert_eq!(turning[1], 0.0);
/// ```
pub fn limit_accel_in_turns(
    v_ego: f64,
    angle_steers: f64,
    a_target: [f64; 2],
    cp: &CarParams,
) -> [f64; 2] {
    let a_total_max = interp(v_ego, &A_TOTAL_MAX_BP, &A_TOTAL_MAX_V);
    let a_y = v_ego.powi(2) * angle_steers * DEG_TO_RAD / (cp.steer_ratio * cp.wheelbase);
    let a_x_allowed = (a_total_max.powi(2) - a_y.powi(2)).max(0.0).sqrt();

    [a_target[0], a_target[1].min(a_x_allowed)]
}

/// Derives `[j_min, j_max]` from the acceleration envelope, never narrower than ±0.1 m/s^3.
///
/// # Examples
///
/// ```rust
/// use openpilot_longitudinal::selfdrive::controls::planner::calc_jerk_limits;
///
/// assert_eq!(calc_jerk_limits([-0.5, 0.7]), [-0.5, 0.7]);
/// assert_eq!(calc_jerk_limits([0.0, 0.0]), [-0.1, 0.1]);
/// ```
pub fn calc_jerk_limits(accel_limits: [f64; 2]) -> [f64; 2] {
    // TODO: make a separate lookup for jerk tuning
    [accel_limits[0].min(-0.1), accel_limits[1].max(0.1)]
}

/// Highest speed at which a curve of the given curvature stays within the lateral acceleration budget.
///
/// The budget shrinks with speed: ~2.6 m/s^2 at 25 mph, ~1.85 m/s^2 at 75 mph.
///
/// # Examples
///
/// ```rust
/// use openpilot_longitudinal::selfdrive::controls::planner::{calc_curvature_speed, NO_CURVATURE_SPEED};
///
/// assert!(calc_curvature_speed(20.0, 0.01) < 15.0);
/// assert_eq!(calc_curvature_speed(20.0, 0.0), NO_CURVATURE_SPEED);
/// ```
pub fn calc_curvature_speed(v_ego: f64, curvature: f64) -> f64 {
    let a_y_max = 2.975 - v_ego * 0.0375;
    let v_curvature = (a_y_max / curvature.abs().max(1e-4)).sqrt();
    v_curvature.min(NO_CURVATURE_SPEED)
}

/// Integrates the chosen acceleration over one actuation step.
///
/// The acceleration is interpolated a fraction `DT_PLAN / LON_MPC_STEP` of the way
/// toward `a_target`, and the velocity advanced by the trapezoidal average.
///
/// # Returns
///
/// `(v_start, a_start)` for the next cycle.
///
/// # Examples
///
/// ```rust
/// use openpilot_longitudinal::selfdrive::controls::planner::integrate_start;
///
/// let (v, a) = integrate_start(10.0, 0.0, 1.0);
/// assert!((a - 0.25).abs() < 1e-12);
/// assert!((v - 10.00625).abs() < 1e-12);
/// ```
pub fn integrate_start(v_start: f64, a_start: f64, a_target: f64) -> (f64, f64) {
    let a_acc_sol = a_start + (DT_PLAN / LON_MPC_STEP) * (a_target - a_start);
    let v_acc_sol = v_start + DT_PLAN * (a_acc_sol + a_start) / 2.0;
    (v_acc_sol, a_acc_sol)
}

/// One proposed trajectory start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub source: LongitudinalPlanSource,
    pub v: f64,
    pub a: f64,
    /// Inactive candidates never win.
    pub active: bool,
}

/// Picks the active candidate with the lowest velocity.
///
/// On equal velocities the candidate listed first wins.
///
/// # Examples
///
/// ```rust
/// use openpilot_longitudinal::selfdrive::controls::planner::{slowest_candidate, Candidate};
/// use openpilot_longitudinal::selfdrive::messaging::LongitudinalPlanSource;
///
/// let candidates = [
///     Candidate { source: LongitudinalPlanSource::Cruise, v: 20.0, a: 0.5, active: true },
///     Candidate { source: LongitudinalPlanSource::Mpc1, v: 18.0, a: -1.0, active: true },
///     Candidate { source: LongitudinalPlanSource::Mpc2, v: 10.0, a: -3.0, active: false },
/// ];
/// let best = slowest_candidate(&candidates).unwrap();
/// assert_eq!(best.source, LongitudinalPlanSource::Mpc1);
/// ```
pub fn slowest_candidate(candidates: &[Candidate]) -> Option<Candidate> {
    candidates
        .iter()
        .filter(|c| c.active)
        .fold(None, |best, c| match best {
            Some(b) if c.v < b.v => Some(*c),
            Some(b) => Some(b),
            None => Some(*c),
        })
}

fn default_radar_sweep_timeout() -> f64 {
    DEFAULT_RADAR_SWEEP_TIMEOUT.as_secs_f64()
}

/// Tunable planner behavior, loaded from the parameter store.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlannerParams {
    /// Publish forward collision warnings even when longitudinal control is off.
    #[serde(default)]
    pub fcw_enabled: bool,
    /// Lower the cruise setpoint to the mapped speed limit.
    #[serde(default)]
    pub limit_set_speed: bool,
    /// Offset added to the mapped speed limit, in m/s.
    #[serde(default)]
    pub speed_limit_offset: Option<f64>,
    /// Consume live map data for speed limits and curvature.
    #[serde(default)]
    pub use_map_data: bool,
    /// Longest wait for a full radar sweep, in seconds.
    #[serde(default = "default_radar_sweep_timeout")]
    pub radar_sweep_timeout: f64,
}

impl PlannerParams {
    /// Radar sweep timeout as a [`Duration`].
    ///
    /// Negative, non-finite or out of range values fall back to 150 ms.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use openpilot_longitudinal::selfdrive::controls::planner::PlannerParams;
    ///
    /// let pp = PlannerParams {
    ///     radar_sweep_timeout: f64::INFINITY,
    ///     ..PlannerParams::default()
    /// };
    /// assert_eq!(pp.sweep_timeout(), Duration::from_millis(150));
    /// ```
    pub fn sweep_timeout(&self) -> Duration {
        match Duration::try_from_secs_f64(self.radar_sweep_timeout) {
            Ok(timeout) => timeout,
            Err(err) => {
                warn!(
                    "radar_sweep_timeout {} unusable ({}), using {:?}",
                    self.radar_sweep_timeout, err, DEFAULT_RADAR_SWEEP_TIMEOUT
                );
                DEFAULT_RADAR_SWEEP_TIMEOUT
            }
        }
    }

    fn set_speed_limit_active(&self) -> bool {
        self.limit_set_speed && self.speed_limit_offset.is_some()
    }
}

impl Default for PlannerParams {
    fn default() -> Self {
        PlannerParams {
            fcw_enabled: false,
            limit_set_speed: false,
            speed_limit_offset: None,
            use_map_data: false,
            radar_sweep_timeout: default_radar_sweep_timeout(),
        }
    }
}

/// Trajectory state carried from one planning cycle to the next.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerCycleState {
    /// Velocity the next cycle's trajectories start from.
    pub v_acc_start: f64,
    /// Acceleration the next cycle's trajectories start from.
    pub a_acc_start: f64,
    /// Chosen target velocity.
    pub v_acc: f64,
    /// Chosen target acceleration.
    pub a_acc: f64,
    /// Velocity estimate a short horizon ahead.
    pub v_acc_future: f64,
    /// Cruise-only trajectory velocity.
    pub v_cruise: f64,
    /// Cruise-only trajectory acceleration.
    pub a_cruise: f64,
    pub longitudinal_plan_source: LongitudinalPlanSource,
}

impl Default for PlannerCycleState {
    fn default() -> Self {
        PlannerCycleState {
            v_acc_start: 0.0,
            a_acc_start: 0.0,
            v_acc: 0.0,
            a_acc: 0.0,
            v_acc_future: 0.0,
            v_cruise: 0.0,
            a_cruise: 0.0,
            longitudinal_plan_source: LongitudinalPlanSource::Cruise,
        }
    }
}

/// Everything the planner reads in one cycle.
#[derive(Debug, Default)]
pub struct PlannerInputs {
    /// Current time in seconds since boot.
    pub cur_time: f64,
    pub car_state: Service<CarState>,
    pub controls_state: Service<ControlsState>,
    pub radar_state: Service<RadarState>,
    pub live_map_data: Option<Service<LiveMapData>>,
    /// Timestamp of the latest model message, echoed in the plan.
    pub md_mono_time: u64,
}

/// Longitudinal planner arbitrating between cruise and two lead MPCs.
pub struct Planner<M, F = FcwChecker> {
    cp: CarParams,
    params: PlannerParams,
    mpc1: M,
    mpc2: M,
    mpc1_plan: MpcPlan,
    mpc2_plan: MpcPlan,
    fcw_checker: F,
    state: PlannerCycleState,
}

impl<M: LongitudinalMpc, F: CollisionWarning> Planner<M, F> {
    /// Creates a new `Planner` with zeroed cycle state.
    ///
    /// # Arguments
    ///
    /// * `cp` - Vehicle parameters.
    /// * `params` - Planner parameters.
    /// * `mpc1` - Solver following the first lead.
    /// * `mpc2` - Solver following the second lead.
    /// * `fcw_checker` - Forward collision warning decision maker.
    pub fn new(cp: CarParams, params: PlannerParams, mpc1: M, mpc2: M, fcw_checker: F) -> Self {
        Planner {
            cp,
            params,
            mpc1,
            mpc2,
            mpc1_plan: MpcPlan::default(),
            mpc2_plan: MpcPlan::default(),
            fcw_checker,
            state: PlannerCycleState::default(),
        }
    }

    /// State carried between cycles.
    pub fn state(&self) -> &PlannerCycleState {
        &self.state
    }

    /// Map data usable this cycle, if any.
    fn valid_map_data<'a>(&self, sm: &'a PlannerInputs) -> Option<&'a LiveMapData> {
        if !self.params.use_map_data {
            return None;
        }
        let map = sm.live_map_data.as_ref()?;
        let fresh = sm.cur_time - map.rcv_time < MAP_MAX_AGE;
        (map.msg.map_valid && fresh).then_some(&map.msg)
    }

    fn choose_solution(&mut self, v_cruise_setpoint: f64, enabled: bool) {
        if enabled {
            let candidates = [
                Candidate {
                    source: LongitudinalPlanSource::Cruise,
                    v: self.state.v_cruise,
                    a: self.state.a_cruise,
                    active: true,
                },
                Candidate {
                    source: LongitudinalPlanSource::Mpc1,
                    v: self.mpc1_plan.v_mpc,
                    a: self.mpc1_plan.a_mpc,
                    active: self.mpc1_plan.has_lead,
                },
                Candidate {
                    source: LongitudinalPlanSource::Mpc2,
                    v: self.mpc2_plan.v_mpc,
                    a: self.mpc2_plan.a_mpc,
                    active: self.mpc2_plan.has_lead,
                },
            ];

            if let Some(slowest) = slowest_candidate(&candidates) {
                self.state.longitudinal_plan_source = slowest.source;
                self.state.v_acc = slowest.v;
                self.state.a_acc = slowest.a;
            }
        }

        self.state.v_acc_future = self
            .mpc1_plan
            .v_mpc_future
            .min(self.mpc2_plan.v_mpc_future)
            .min(v_cruise_setpoint);
    }

    /// Runs one planning cycle. Gets called when a new radar state is available.
    pub fn update(&mut self, sm: &PlannerInputs) -> Plan {
        let cur_time = sm.cur_time;
        let cs = &sm.car_state.msg;
        let v_ego = cs.v_ego;

        let long_control_state = sm.controls_state.msg.long_control_state;
        let force_slow_decel = sm.controls_state.msg.force_decel;
        let mut v_cruise_setpoint = sm.controls_state.msg.v_cruise * KPH_TO_MS;

        let lead_1 = &sm.radar_state.msg.lead_one;
        let lead_2 = &sm.radar_state.msg.lead_two;

        let enabled = long_control_state.is_planning();
        let following = lead_1.is_pulling_away(v_ego);

        let mut v_speedlimit = NO_CURVATURE_SPEED;
        let mut v_curvature = NO_CURVATURE_SPEED;

        let live_map = self.valid_map_data(sm);
        let map_valid = live_map.is_some();

        // Speed limit and curvature
        if let (true, Some(map)) = (self.params.set_speed_limit_active(), live_map) {
            if let (true, Some(offset)) = (map.speed_limit_valid, self.params.speed_limit_offset) {
                v_speedlimit = map.speed_limit + offset;
            }
            if map.curvature_valid {
                v_curvature = calc_curvature_speed(v_ego, map.curvature);
            }
        }

        let decel_for_turn = v_curvature < v_cruise_setpoint.min(v_speedlimit).min(v_ego + 1.0);
        v_cruise_setpoint = v_cruise_setpoint.min(v_curvature).min(v_speedlimit);

        // Calculate speed for normal cruise control
        if enabled {
            let accel_limits = calc_cruise_accel_limits(v_ego, following);
            let jerk_limits = calc_jerk_limits(accel_limits);
            let mut accel_limits =
                limit_accel_in_turns(v_ego, cs.steering_angle, accel_limits, &self.cp);

            if force_slow_decel {
                // if required so, force a smooth deceleration
                accel_limits[1] = accel_limits[1].min(AWARENESS_DECEL);
                accel_limits[0] = accel_limits[0].min(accel_limits[1]);
            }

            // Change accel limits based on time remaining to turn
            if let (true, Some(map)) = (decel_for_turn, live_map) {
                let time_to_turn = (map.dist_to_turn / self.state.v_cruise.max(1.0)).max(1.0);
                let required_decel = ((v_curvature - self.state.v_cruise) / time_to_turn).min(0.0);
                accel_limits[0] = accel_limits[0].max(required_decel);
            }

            let (v_cruise, a_cruise) = speed_smoother(
                self.state.v_acc_start,
                self.state.a_acc_start,
                v_cruise_setpoint,
                accel_limits[1],
                accel_limits[0],
                jerk_limits[1],
                jerk_limits[0],
                LON_MPC_STEP,
            );
            // cruise speed can't be negative even if the user is distracted
            self.state.v_cruise = v_cruise.max(0.0);
            self.state.a_cruise = a_cruise;
        } else {
            let starting = long_control_state == LongCtrlState::Starting;
            let a_ego = cs.a_ego.min(0.0);
            let reset_speed = if starting { MIN_CAN_SPEED } else { v_ego };
            let reset_accel = if starting { self.cp.start_accel } else { a_ego };
            self.state.v_acc = reset_speed;
            self.state.a_acc = reset_accel;
            self.state.v_acc_start = reset_speed;
            self.state.a_acc_start = reset_accel;
            self.state.v_cruise = reset_speed;
            self.state.a_cruise = reset_accel;
        }

        let (v_start, a_start) = (self.state.v_acc_start, self.state.a_acc_start);
        self.mpc1.set_cur_state(v_start, a_start);
        self.mpc2.set_cur_state(v_start, a_start);

        self.mpc1_plan = self.mpc1.update(cs, lead_1, v_cruise_setpoint);
        self.mpc2_plan = self.mpc2.update(cs, lead_2, v_cruise_setpoint);

        self.choose_solution(v_cruise_setpoint, enabled);

        // determine fcw
        if self.mpc1_plan.new_lead {
            self.fcw_checker.reset_lead(cur_time);
        }

        let blinkers = cs.left_blinker || cs.right_blinker;
        let fcw = self.fcw_checker.update(
            &self.mpc1_plan.solution,
            cur_time,
            v_ego,
            cs.a_ego,
            lead_1.d_rel,
            lead_1.v_lead,
            lead_1.a_lead_k,
            lead_1.y_rel,
            lead_1.v_lat,
            lead_1.fcw,
            blinkers,
        ) && !cs.brake_pressed;

        let radar_dead = !sm.radar_state.alive;
        let radar_errors = &sm.radar_state.msg.radar_errors;
        let radar_fault = radar_errors.contains(&RadarError::Fault);
        let radar_can_error = radar_errors.contains(&RadarError::CanError);

        let valid = sm.car_state.alive_and_valid()
            && sm.controls_state.alive_and_valid()
            && sm.radar_state.alive_and_valid();
        if !valid {
            debug!(
                "plan invalid: carState {} controlsState {} radarState {}",
                sm.car_state.alive_and_valid(),
                sm.controls_state.alive_and_valid(),
                sm.radar_state.alive_and_valid()
            );
        }

        // Send out fcw
        let fcw = fcw && (self.params.fcw_enabled || long_control_state != LongCtrlState::Off);

        let plan = Plan {
            log_mono_time: (cur_time * 1e9) as u64,
            md_mono_time: sm.md_mono_time,
            radar_state_mono_time: sm.radar_state.log_mono_time,
            v_cruise: self.state.v_cruise,
            a_cruise: self.state.a_cruise,
            v_start: self.state.v_acc_start,
            a_start: self.state.a_acc_start,
            v_target: self.state.v_acc,
            a_target: self.state.a_acc,
            v_target_future: self.state.v_acc_future,
            has_lead: self.mpc1_plan.has_lead,
            longitudinal_plan_source: self.state.longitudinal_plan_source,
            v_curvature,
            decel_for_turn,
            map_valid,
            radar_valid: !(radar_dead || radar_fault),
            radar_can_error,
            processing_delay: cur_time - sm.radar_state.rcv_time,
            fcw,
            valid,
        };

        // Interpolate one actuation step and save as starting point for next iteration
        let (v_acc_sol, a_acc_sol) = integrate_start(v_start, a_start, self.state.a_acc);
        self.state.v_acc_start = v_acc_sol;
        self.state.a_acc_start = a_acc_sol;

        plan
    }

    /// Runs one cycle at the current time and publishes the resulting plan.
    ///
    /// `sm.cur_time` is overwritten with [`sec_since_boot`], so the service
    /// receive times in `sm` must come from the same clock.
    pub fn update_and_publish(&mut self, mut sm: PlannerInputs, publisher: &PlanPublisher) {
        sm.cur_time = sec_since_boot();
        publisher.send(self.update(&sm));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selfdrive::car::toyota::values::CarFingerprint;
    use crate::selfdrive::controls::long_mpc::MpcSolution;
    use crate::selfdrive::controls::radar_helpers::Lead;
    use approx::assert_abs_diff_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// MPC that proposes the start speed plus a fixed offset whenever its lead is present.
    struct ScriptedMpc {
        dv: f64,
        a: f64,
        v_future: f64,
        new_lead: bool,
        v_start: f64,
    }

    impl ScriptedMpc {
        fn new(dv: f64, a: f64) -> Self {
            ScriptedMpc {
                dv,
                a,
                v_future: 100.0,
                new_lead: false,
                v_start: 0.0,
            }
        }
    }

    impl LongitudinalMpc for ScriptedMpc {
        fn set_cur_state(&mut self, v: f64, _a: f64) {
            self.v_start = v;
        }

        fn update(
            &mut self,
            _car_state: &CarState,
            lead: &Lead,
            _v_cruise_setpoint: f64,
        ) -> MpcPlan {
            MpcPlan {
                v_mpc: self.v_start + self.dv,
                a_mpc: self.a,
                v_mpc_future: self.v_future,
                new_lead: self.new_lead,
                has_lead: lead.status,
                solution: MpcSolution::default(),
            }
        }
    }

    /// Warning that fires on demand and records lead resets.
    #[derive(Default)]
    struct ScriptedFcw {
        fire: bool,
        resets: Rc<RefCell<Vec<f64>>>,
    }

    impl CollisionWarning for ScriptedFcw {
        fn reset_lead(&mut self, cur_time: f64) {
            self.resets.borrow_mut().push(cur_time);
        }

        fn update(
            &mut self,
            _mpc_solution: &MpcSolution,
            _cur_time: f64,
            _v_ego: f64,
            _a_ego: f64,
            _x_lead: f64,
            _v_lead: f64,
            _a_lead: f64,
            _y_lead: f64,
            _vlat_lead: f64,
            _fcw_lead: bool,
            _blinkers: bool,
        ) -> bool {
            self.fire
        }
    }

    fn car_params() -> CarParams {
        CarParams::new(CarFingerprint::Prius, 15.74, 2.70, 0.6)
    }

    fn planner(
        params: PlannerParams,
        mpc1: ScriptedMpc,
        mpc2: ScriptedMpc,
    ) -> Planner<ScriptedMpc, ScriptedFcw> {
        Planner::new(car_params(), params, mpc1, mpc2, ScriptedFcw::default())
    }

    fn inputs(v_ego: f64, state: LongCtrlState, v_cruise_kph: f64) -> PlannerInputs {
        PlannerInputs {
            cur_time: 100.0,
            car_state: Service::fresh(
                CarState {
                    v_ego,
                    ..CarState::default()
                },
                100.0,
            ),
            controls_state: Service::fresh(
                ControlsState {
                    long_control_state: state,
                    v_cruise: v_cruise_kph,
                    force_decel: false,
                },
                100.0,
            ),
            radar_state: Service::fresh(RadarState::default(), 99.98),
            live_map_data: None,
            md_mono_time: 42,
        }
    }

    fn lead(d_rel: f64, v_lead: f64) -> Lead {
        Lead {
            d_rel,
            v_lead,
            v_lead_k: v_lead,
            status: true,
            ..Lead::new()
        }
    }

    #[test]
    fn test_calc_cruise_accel_limits() {
        let [a_min, a_max] = calc_cruise_accel_limits(15.0, false);
        assert_abs_diff_eq!(a_min, -0.585, epsilon = 1e-9);
        assert_abs_diff_eq!(a_max, 0.65, epsilon = 1e-9);

        let [_, a_max] = calc_cruise_accel_limits(0.0, true);
        assert_abs_diff_eq!(a_max, 1.6, epsilon = 1e-9);

        let [a_min, a_max] = calc_cruise_accel_limits(60.0, false);
        assert_abs_diff_eq!(a_min, -0.3, epsilon = 1e-9);
        assert_abs_diff_eq!(a_max, 0.3, epsilon = 1e-9);
    }

    #[test]
    fn test_limit_accel_in_turns_straight_keeps_total_budget() {
        let cp = car_params();
        for v_ego in [0.0, 10.0, 20.0, 30.0, 45.0] {
            let a_total_max = interp(v_ego, &A_TOTAL_MAX_BP, &A_TOTAL_MAX_V);
            let limits = limit_accel_in_turns(v_ego, 0.0, [-1.0, 10.0], &cp);
            assert_eq!(limits[1], a_total_max);
            assert_eq!(limits[0], -1.0);
        }
    }

    #[test]
    fn test_limit_accel_in_turns_partial_budget() {
        let cp = car_params();
        let v_ego = 20.0;
        let angle = 2.0;
        let a_y = v_ego * v_ego * angle * DEG_TO_RAD / (cp.steer_ratio * cp.wheelbase);
        let expected = (1.9_f64.powi(2) - a_y.powi(2)).sqrt();

        let limits = limit_accel_in_turns(v_ego, angle, [-1.0, 10.0], &cp);
        assert_abs_diff_eq!(limits[1], expected, epsilon = 1e-6);
        assert!(limits[1] < 1.9);

        // a smaller requested maximum is kept
        let limits = limit_accel_in_turns(v_ego, angle, [-1.0, 0.5], &cp);
        assert_eq!(limits[1], 0.5);

        // the sign of the angle does not matter
        let left = limit_accel_in_turns(v_ego, angle, [-1.0, 10.0], &cp);
        let right = limit_accel_in_turns(v_ego, -angle, [-1.0, 10.0], &cp);
        assert_abs_diff_eq!(left[1], right[1], epsilon = 1e-12);
    }

    #[test]
    fn test_calc_jerk_limits_never_degenerate() {
        assert_eq!(calc_jerk_limits([-0.05, 0.05]), [-0.1, 0.1]);
        assert_eq!(calc_jerk_limits([-1.0, 1.6]), [-1.0, 1.6]);
    }

    #[test]
    fn test_calc_curvature_speed() {
        let v = 222.5_f64.sqrt();
        for curvature in [0.01, -0.01] {
            assert_abs_diff_eq!(calc_curvature_speed(20.0, curvature), v, epsilon = 1e-9);
        }
        assert_eq!(calc_curvature_speed(20.0, 0.0), NO_CURVATURE_SPEED);
    }

    #[test]
    fn test_integrate_start() {
        let (v, a) = integrate_start(15.0, -1.0, 1.0);
        let a_expected = -1.0 + (DT_PLAN / LON_MPC_STEP) * 2.0;
        assert_eq!(a, a_expected);
        assert_eq!(v, 15.0 + DT_PLAN * (a_expected - 1.0) / 2.0);

        let (v, a) = integrate_start(15.0, 0.5, 0.5);
        assert_eq!(a, 0.5);
        assert_abs_diff_eq!(v, 15.025, epsilon = 1e-12);
    }

    #[test]
    fn test_slowest_candidate() {
        use LongitudinalPlanSource::*;
        let c = |source, v, active| Candidate {
            source,
            v,
            a: 0.0,
            active,
        };

        let only_cruise = [
            c(Cruise, 30.0, true),
            c(Mpc1, 10.0, false),
            c(Mpc2, 5.0, false),
        ];
        assert_eq!(slowest_candidate(&only_cruise).unwrap().source, Cruise);

        let mpc2_slowest = [
            c(Cruise, 30.0, true),
            c(Mpc1, 10.0, true),
            c(Mpc2, 5.0, true),
        ];
        assert_eq!(slowest_candidate(&mpc2_slowest).unwrap().source, Mpc2);

        let tie = [
            c(Cruise, 10.0, true),
            c(Mpc1, 10.0, true),
            c(Mpc2, 10.0, true),
        ];
        assert_eq!(slowest_candidate(&tie).unwrap().source, Cruise);

        let mpc_tie = [
            c(Cruise, 12.0, true),
            c(Mpc1, 10.0, true),
            c(Mpc2, 10.0, true),
        ];
        assert_eq!(slowest_candidate(&mpc_tie).unwrap().source, Mpc1);

        assert!(slowest_candidate(&[]).is_none());
    }

    #[test]
    fn test_cruise_approaches_setpoint() {
        let mut p = planner(
            PlannerParams::default(),
            ScriptedMpc::new(0.0, 0.0),
            ScriptedMpc::new(0.0, 0.0),
        );
        p.update(&inputs(20.0, LongCtrlState::Off, 90.0));
        assert_eq!(p.state().v_acc_start, 20.0);

        let sm = inputs(20.0, LongCtrlState::Pid, 90.0);
        let mut prev_v_target = 20.0;
        let mut prev_v_start = p.state().v_acc_start;
        for _ in 0..60 {
            let plan = p.update(&sm);
            assert_eq!(
                plan.longitudinal_plan_source,
                LongitudinalPlanSource::Cruise
            );
            assert!(!plan.has_lead);
            assert!(plan.v_target >= prev_v_target);
            assert!(plan.v_target < 25.0);
            assert!(plan.a_target <= 0.5 + 1e-9);
            assert_abs_diff_eq!(plan.v_target_future, 25.0, epsilon = 1e-9);

            let v_start = p.state().v_acc_start;
            assert!(v_start >= prev_v_start);
            assert!(v_start - prev_v_start <= 0.5 * DT_PLAN + 1e-9);
            prev_v_target = plan.v_target;
            prev_v_start = v_start;
        }
        assert!(prev_v_target > 21.0);
    }

    #[test]
    fn test_lead_mpc_wins_when_slower() {
        let mut p = planner(
            PlannerParams::default(),
            ScriptedMpc::new(-1.0, -1.5),
            ScriptedMpc::new(-2.0, -2.5),
        );
        let mut sm = inputs(20.0, LongCtrlState::Off, 90.0);
        p.update(&sm);

        sm.controls_state.msg.long_control_state = LongCtrlState::Pid;
        sm.radar_state.msg.lead_one = lead(10.0, 15.0);
        let plan = p.update(&sm);
        assert_eq!(plan.longitudinal_plan_source, LongitudinalPlanSource::Mpc1);
        assert!(plan.has_lead);
        assert_abs_diff_eq!(plan.v_target, 19.0, epsilon = 1e-9);
        assert_eq!(plan.a_target, -1.5);

        // a second, more restrictive lead takes over
        sm.radar_state.msg.lead_two = lead(25.0, 12.0);
        let plan = p.update(&sm);
        assert_eq!(plan.longitudinal_plan_source, LongitudinalPlanSource::Mpc2);
        assert_eq!(plan.a_target, -2.5);
        assert!(plan.has_lead);
    }

    #[test]
    fn test_lead_mpc_faster_than_cruise_loses() {
        let mut p = planner(
            PlannerParams::default(),
            ScriptedMpc::new(3.0, 1.0),
            ScriptedMpc::new(0.0, 0.0),
        );
        let mut sm = inputs(20.0, LongCtrlState::Off, 72.0);
        p.update(&sm);
        sm.controls_state.msg.long_control_state = LongCtrlState::Stopping;
        sm.radar_state.msg.lead_one = lead(60.0, 25.0);

        let plan = p.update(&sm);
        assert_eq!(
            plan.longitudinal_plan_source,
            LongitudinalPlanSource::Cruise
        );
        assert!(plan.has_lead);
    }

    #[test]
    fn test_disabled_resets_to_ego() {
        let mut p = planner(
            PlannerParams::default(),
            ScriptedMpc::new(0.0, 0.0),
            ScriptedMpc::new(0.0, 0.0),
        );
        let mut sm = inputs(12.0, LongCtrlState::Off, 90.0);
        sm.car_state.msg.a_ego = 0.8;
        let plan = p.update(&sm);
        assert_eq!(plan.v_target, 12.0);
        assert_eq!(plan.a_target, 0.0);
        assert_eq!(plan.v_start, 12.0);
        assert_eq!(plan.v_cruise, 12.0);

        sm.car_state.msg.a_ego = -1.0;
        let plan = p.update(&sm);
        assert_eq!(plan.a_target, -1.0);
        assert_eq!(plan.a_start, -1.0);
        assert_eq!(p.state().a_acc_start, -1.0);
        assert_abs_diff_eq!(p.state().v_acc_start, 12.0 - DT_PLAN, epsilon = 1e-12);
    }

    #[test]
    fn test_starting_uses_min_can_speed() {
        let mut p = planner(
            PlannerParams::default(),
            ScriptedMpc::new(0.0, 0.0),
            ScriptedMpc::new(0.0, 0.0),
        );
        let plan = p.update(&inputs(0.0, LongCtrlState::Starting, 30.0));
        assert_eq!(plan.v_target, MIN_CAN_SPEED);
        assert_eq!(plan.a_target, 0.6);
        assert_eq!(plan.v_start, MIN_CAN_SPEED);
        assert_eq!(plan.a_start, 0.6);
        assert_eq!(p.state().a_acc_start, 0.6);
    }

    #[test]
    fn test_force_decel_caps_cruise_accel() {
        let mut p = planner(
            PlannerParams::default(),
            ScriptedMpc::new(0.0, 0.0),
            ScriptedMpc::new(0.0, 0.0),
        );
        let mut sm = inputs(20.0, LongCtrlState::Off, 90.0);
        p.update(&sm);

        sm.controls_state.msg.long_control_state = LongCtrlState::Pid;
        sm.controls_state.msg.force_decel = true;
        for _ in 0..100 {
            let plan = p.update(&sm);
            assert!(plan.a_cruise <= AWARENESS_DECEL);
            assert!(plan.v_cruise >= 0.0);
        }
        assert!(p.state().v_cruise < 20.0);
    }

    #[test]
    fn test_cruise_velocity_never_negative() {
        let mut p = planner(
            PlannerParams::default(),
            ScriptedMpc::new(0.0, 0.0),
            ScriptedMpc::new(0.0, 0.0),
        );
        let mut sm = inputs(0.1, LongCtrlState::Off, 0.0);
        p.update(&sm);

        sm.controls_state.msg.long_control_state = LongCtrlState::Pid;
        sm.controls_state.msg.force_decel = true;
        for _ in 0..200 {
            let plan = p.update(&sm);
            assert!(plan.v_cruise >= 0.0);
        }
    }

    #[test]
    fn test_v_target_future_takes_lowest() {
        let mut mpc1 = ScriptedMpc::new(0.0, 0.0);
        mpc1.v_future = 14.0;
        let mut mpc2 = ScriptedMpc::new(0.0, 0.0);
        mpc2.v_future = 11.0;
        let mut p = planner(PlannerParams::default(), mpc1, mpc2);

        let plan = p.update(&inputs(15.0, LongCtrlState::Pid, 90.0));
        assert_eq!(plan.v_target_future, 11.0);

        let plan = p.update(&inputs(15.0, LongCtrlState::Pid, 36.0));
        assert_abs_diff_eq!(plan.v_target_future, 10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_fcw_gating() {
        let mut p = planner(
            PlannerParams::default(),
            ScriptedMpc::new(0.0, 0.0),
            ScriptedMpc::new(0.0, 0.0),
        );
        p.fcw_checker.fire = true;

        let mut sm = inputs(20.0, LongCtrlState::Pid, 90.0);
        assert!(p.update(&sm).fcw);

        sm.car_state.msg.brake_pressed = true;
        assert!(!p.update(&sm).fcw);

        sm.car_state.msg.brake_pressed = false;
        sm.controls_state.msg.long_control_state = LongCtrlState::Off;
        assert!(!p.update(&sm).fcw);

        p.params.fcw_enabled = true;
        assert!(p.update(&sm).fcw);

        p.fcw_checker.fire = false;
        assert!(!p.update(&sm).fcw);
    }

    #[test]
    fn test_new_lead_resets_fcw() {
        let mut mpc1 = ScriptedMpc::new(0.0, 0.0);
        mpc1.new_lead = true;
        let mut p = planner(PlannerParams::default(), mpc1, ScriptedMpc::new(0.0, 0.0));
        let resets = p.fcw_checker.resets.clone();

        p.update(&inputs(20.0, LongCtrlState::Pid, 90.0));
        assert_eq!(*resets.borrow(), vec![100.0]);

        p.mpc1.new_lead = false;
        p.update(&inputs(20.0, LongCtrlState::Pid, 90.0));
        assert_eq!(resets.borrow().len(), 1);
    }

    #[test]
    fn test_diagnostic_fields() {
        let mut p = planner(
            PlannerParams::default(),
            ScriptedMpc::new(0.0, 0.0),
            ScriptedMpc::new(0.0, 0.0),
        );
        let mut sm = inputs(20.0, LongCtrlState::Pid, 90.0);
        let plan = p.update(&sm);
        assert!(plan.valid);
        assert!(plan.radar_valid);
        assert!(!plan.radar_can_error);
        assert!(!plan.map_valid);
        assert!(!plan.decel_for_turn);
        assert_eq!(plan.v_curvature, NO_CURVATURE_SPEED);
        assert_abs_diff_eq!(plan.processing_delay, 0.02, epsilon = 1e-9);
        assert_eq!(plan.md_mono_time, 42);
        assert_eq!(plan.radar_state_mono_time, sm.radar_state.log_mono_time);
        assert_eq!(plan.log_mono_time, 100_000_000_000);

        sm.radar_state.msg.radar_errors.insert(RadarError::CanError);
        let plan = p.update(&sm);
        assert!(plan.radar_can_error);
        assert!(plan.radar_valid);

        sm.radar_state.msg.radar_errors.insert(RadarError::Fault);
        let plan = p.update(&sm);
        assert!(!plan.radar_valid);
        assert!(plan.valid);

        sm.radar_state.msg.radar_errors.clear();
        sm.radar_state.alive = false;
        let plan = p.update(&sm);
        assert!(!plan.radar_valid);
        assert!(!plan.valid);

        sm.radar_state.alive = true;
        sm.car_state.valid = false;
        let plan = p.update(&sm);
        assert!(plan.radar_valid);
        assert!(!plan.valid);
    }

    fn curvy_map(rcv_time: f64) -> Service<LiveMapData> {
        Service::fresh(
            LiveMapData {
                map_valid: true,
                speed_limit_valid: true,
                speed_limit: 22.0,
                curvature_valid: true,
                curvature: 0.01,
                dist_to_turn: 100.0,
            },
            rcv_time,
        )
    }

    #[test]
    fn test_map_data_ignored_unless_enabled() {
        let mut p = planner(
            PlannerParams {
                limit_set_speed: true,
                speed_limit_offset: Some(1.0),
                ..PlannerParams::default()
            },
            ScriptedMpc::new(0.0, 0.0),
            ScriptedMpc::new(0.0, 0.0),
        );
        let mut sm = inputs(20.0, LongCtrlState::Pid, 90.0);
        sm.live_map_data = Some(curvy_map(99.0));

        let plan = p.update(&sm);
        assert!(!plan.map_valid);
        assert!(!plan.decel_for_turn);
        assert_abs_diff_eq!(plan.v_target_future, 25.0, epsilon = 1e-9);
    }

    #[test]
    fn test_map_curvature_limits_setpoint() {
        let mut p = planner(
            PlannerParams {
                limit_set_speed: true,
                speed_limit_offset: Some(1.0),
                use_map_data: true,
                ..PlannerParams::default()
            },
            ScriptedMpc::new(0.0, 0.0),
            ScriptedMpc::new(0.0, 0.0),
        );
        let mut sm = inputs(20.0, LongCtrlState::Off, 90.0);
        sm.live_map_data = Some(curvy_map(99.0));
        p.update(&sm);

        sm.controls_state.msg.long_control_state = LongCtrlState::Pid;
        let plan = p.update(&sm);
        let v_curvature = calc_curvature_speed(20.0, 0.01);
        assert!(plan.map_valid);
        assert!(plan.decel_for_turn);
        assert_abs_diff_eq!(plan.v_curvature, v_curvature, epsilon = 1e-9);
        assert_abs_diff_eq!(plan.v_target_future, v_curvature, epsilon = 1e-9);
        assert!(plan.a_cruise < 0.0);
        // never asks for more braking than the cruise envelope
        assert!(plan.a_cruise >= -0.5 - 1e-9);

        // stale map data is dropped
        sm.live_map_data = Some(curvy_map(80.0));
        let plan = p.update(&sm);
        assert!(!plan.map_valid);
        assert_eq!(plan.v_curvature, NO_CURVATURE_SPEED);
    }

    #[test]
    fn test_speed_limit_lowers_setpoint() {
        let mut p = planner(
            PlannerParams {
                limit_set_speed: true,
                speed_limit_offset: Some(1.0),
                use_map_data: true,
                ..PlannerParams::default()
            },
            ScriptedMpc::new(0.0, 0.0),
            ScriptedMpc::new(0.0, 0.0),
        );
        let mut sm = inputs(20.0, LongCtrlState::Pid, 90.0);
        let mut map = curvy_map(99.0);
        map.msg.curvature_valid = false;
        sm.live_map_data = Some(map);

        let plan = p.update(&sm);
        assert!(!plan.decel_for_turn);
        assert_abs_diff_eq!(plan.v_target_future, 23.0, epsilon = 1e-9);
    }

    #[test]
    fn test_start_anchor_follows_continuity_law() {
        let mut p = planner(
            PlannerParams::default(),
            ScriptedMpc::new(-1.0, -2.0),
            ScriptedMpc::new(0.0, 0.0),
        );
        let mut sm = inputs(20.0, LongCtrlState::Off, 90.0);
        p.update(&sm);
        sm.controls_state.msg.long_control_state = LongCtrlState::Pid;
        sm.radar_state.msg.lead_one = lead(10.0, 15.0);

        for _ in 0..5 {
            let before = p.state().clone();
            let plan = p.update(&sm);
            assert_eq!(plan.v_start, before.v_acc_start);
            assert_eq!(plan.a_start, before.a_acc_start);
            let (v, a) = integrate_start(before.v_acc_start, before.a_acc_start, plan.a_target);
            assert_eq!(p.state().v_acc_start, v);
            assert_eq!(p.state().a_acc_start, a);
        }
    }

    #[test]
    fn test_update_and_publish_stamps_current_time() {
        let mut p = planner(
            PlannerParams::default(),
            ScriptedMpc::new(0.0, 0.0),
            ScriptedMpc::new(0.0, 0.0),
        );
        let (publisher, plans) = PlanPublisher::new();
        let now = sec_since_boot();
        let mut sm = inputs(20.0, LongCtrlState::Pid, 90.0);
        sm.radar_state = Service::fresh(RadarState::default(), now);

        p.update_and_publish(sm, &publisher);
        let plan = plans.try_recv().unwrap();
        assert!(plan.processing_delay >= 0.0);
        assert!(plan.processing_delay < 1.0);
        assert!(plan.log_mono_time >= (now * 1e9) as u64);
        assert!(plans.try_recv().is_err());
    }
}
