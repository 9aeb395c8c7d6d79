//! Messages exchanged between the radar, planner and control processes.

use log::debug;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::mpsc::{Receiver, Sender};
use thiserror::Error;

use crate::selfdrive::controls::longcontrol::LongCtrlState;
use crate::selfdrive::controls::radar_helpers::Lead;

/// Faults a radar can report alongside its points.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum RadarError {
    /// The radar CAN messages were stale or failed validation.
    #[error("radar CAN messages stale or invalid")]
    CanError,
    /// The radar reported a hardware fault.
    #[error("radar hardware fault")]
    Fault,
}

/// One tracked radar object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RadarPoint {
    /// Identity of the object, stable while it is continuously tracked.
    pub track_id: u64,
    /// Longitudinal distance from the front of the car, in meters.
    pub d_rel: f64,
    /// Lateral offset in the car frame, left positive, in meters.
    pub y_rel: f64,
    /// Relative longitudinal speed, in m/s.
    pub v_rel: f64,
    /// Relative acceleration, when the sensor measures it.
    pub a_rel: Option<f64>,
    /// Relative lateral speed, when the sensor measures it.
    pub yv_rel: Option<f64>,
    /// Whether the sensor validated this reading directly.
    pub measured: bool,
}

/// Output of one radar sweep.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RadarData {
    /// Tracked points keyed by track id.
    pub points: BTreeMap<u64, RadarPoint>,
    pub errors: BTreeSet<RadarError>,
}

/// Vehicle state as reported by the car interface.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CarState {
    /// Ego speed in m/s.
    pub v_ego: f64,
    /// Ego acceleration in m/s^2.
    pub a_ego: f64,
    /// Steering wheel angle in degrees, left positive.
    pub steering_angle: f64,
    pub left_blinker: bool,
    pub right_blinker: bool,
    pub brake_pressed: bool,
}

/// State of the control process relevant to planning.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlsState {
    pub long_control_state: LongCtrlState,
    /// Cruise set speed in km/h.
    pub v_cruise: f64,
    /// Driver distraction or similar override requesting a gentle deceleration.
    pub force_decel: bool,
}

impl Default for ControlsState {
    fn default() -> Self {
        ControlsState {
            long_control_state: LongCtrlState::Off,
            v_cruise: 0.0,
            force_decel: false,
        }
    }
}

/// Lead summaries produced by the radar state stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RadarState {
    pub lead_one: Lead,
    pub lead_two: Lead,
    pub radar_errors: BTreeSet<RadarError>,
}

/// Scalar map attributes for the road ahead.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveMapData {
    pub map_valid: bool,
    pub speed_limit_valid: bool,
    /// Speed limit in m/s.
    pub speed_limit: f64,
    pub curvature_valid: bool,
    /// Road curvature in 1/m.
    pub curvature: f64,
    /// Distance to the next turn in meters.
    pub dist_to_turn: f64,
}

/// A received message together with its freshness bookkeeping.
#[derive(Debug, Default)]
pub struct Service<T> {
    pub msg: T,
    /// Received within its expected period.
    pub alive: bool,
    /// Marked valid by its publisher.
    pub valid: bool,
    /// Receive time in seconds since boot.
    pub rcv_time: f64,
    /// Publisher timestamp in nanoseconds.
    pub log_mono_time: u64,
}

impl<T> Service<T> {
    /// Wraps a message that arrived fresh and valid at `rcv_time`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use openpilot_longitudinal::selfdrive::messaging::{CarState, Service};
    ///
    /// let cs = Service::fresh(CarState::default(), 1.5);
    /// assert!(cs.alive && cs.valid);
    /// assert_eq!(cs.log_mono_time, 1_500_000_000);
    /// ```
    pub fn fresh(msg: T, rcv_time: f64) -> Self {
        Service {
            msg,
            alive: true,
            valid: true,
            rcv_time,
            log_mono_time: (rcv_time * 1e9) as u64,
        }
    }

    /// Whether the message is both alive and valid.
    pub fn alive_and_valid(&self) -> bool {
        self.alive && self.valid
    }
}

/// Candidate that produced the longitudinal target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LongitudinalPlanSource {
    Cruise,
    Mpc1,
    Mpc2,
}

/// Longitudinal plan sent to the controls process.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plan {
    /// Publish time in nanoseconds.
    pub log_mono_time: u64,
    /// Echo of the model message timestamp.
    pub md_mono_time: u64,
    /// Echo of the radar state message timestamp.
    pub radar_state_mono_time: u64,

    pub v_cruise: f64,
    pub a_cruise: f64,
    pub v_start: f64,
    pub a_start: f64,
    pub v_target: f64,
    pub a_target: f64,
    pub v_target_future: f64,
    pub has_lead: bool,
    pub longitudinal_plan_source: LongitudinalPlanSource,

    pub v_curvature: f64,
    pub decel_for_turn: bool,
    pub map_valid: bool,

    pub radar_valid: bool,
    pub radar_can_error: bool,
    /// Seconds between the radar state arriving and the plan being produced.
    pub processing_delay: f64,

    pub fcw: bool,
    pub valid: bool,
}

/// Ordered single-writer publisher for plans.
///
/// Sending never blocks and never fails: plans published after every
/// receiver has gone away are dropped.
#[derive(Debug)]
pub struct PlanPublisher {
    sock: Sender<Plan>,
}

impl PlanPublisher {
    /// Creates a publisher and the receiving end for its consumer.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use openpilot_longitudinal::selfdrive::messaging::PlanPublisher;
    ///
    /// let (publisher, plans) = PlanPublisher::new();
    /// drop(plans);
    /// ```
    pub fn new() -> (Self, Receiver<Plan>) {
        let (sock, rx) = std::sync::mpsc::channel();
        (PlanPublisher { sock }, rx)
    }

    /// Publishes a plan without waiting for it to be consumed.
    pub fn send(&self, plan: Plan) {
        if self.sock.send(plan).is_err() {
            debug!("plan dropped, no subscriber");
        }
    }
}
