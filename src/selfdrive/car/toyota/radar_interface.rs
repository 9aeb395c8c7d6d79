//! Toyota radar point tracking.
//!
//! The radar reports up to sixteen objects, each in its own message slot, with a
//! second band of messages carrying a corroboration score per slot. Objects are
//! kept while they are either validated by the radar or corroborated by a high
//! score and a recent validated history.

use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use crate::common::realtime::DT_RADAR;
use crate::selfdrive::can::parser::{CanParser, SignalTable};
use crate::selfdrive::car::toyota::values::RadarLayout;
use crate::selfdrive::car::CarParams;
use crate::selfdrive::controls::planner::PlannerParams;
use crate::selfdrive::messaging::{RadarData, RadarError, RadarPoint};

/// Distance reported by the radar when a slot holds no target.
const NO_TARGET_DIST: f64 = 255.0;
/// Score above which an unvalidated detection counts as corroborated.
const MIN_SCORE: f64 = 50.0;

/// Decoded signals of one radar slot, with the parser defaults for signals never received.
#[derive(Debug, Clone, Copy, PartialEq)]
struct RadarSlot {
    long_dist: f64,
    new_track: bool,
    lat_dist: f64,
    rel_speed: f64,
    valid: bool,
    score: f64,
}

impl RadarSlot {
    fn read(table: &SignalTable, a_msg: u32, score_msg: u32) -> Self {
        let signal = |id: u32, name: &str, default: f64| table.value(id, name).unwrap_or(default);
        RadarSlot {
            long_dist: signal(a_msg, "LONG_DIST", NO_TARGET_DIST),
            new_track: signal(a_msg, "NEW_TRACK", 1.0) != 0.0,
            lat_dist: signal(a_msg, "LAT_DIST", 0.0),
            rel_speed: signal(a_msg, "REL_SPEED", 0.0),
            valid: signal(a_msg, "VALID", 0.0) != 0.0,
            score: signal(score_msg, "SCORE", 0.0),
        }
    }
}

/// Applies one sweep's reading to a slot's hysteresis counter.
///
/// # Arguments
///
/// * `count` - Counter value before this sweep.
/// * `long_dist` - Longitudinal distance reported for the slot.
/// * `new_track` - Whether the radar flagged a new track in the slot.
/// * `valid` - Whether the radar validated the reading.
///
/// # Returns
///
/// The updated counter, never below zero.
///
/// # Examples
///
/// ```rust
/// use openpilot_longitudinal::selfdrive::car::toyota::radar_interface::update_valid_count;
///
/// assert_eq!(update_valid_count(3, 40.0, false, true), 4);
/// assert_eq!(update_valid_count(3, 40.0, false, false), 2);
/// assert_eq!(update_valid_count(0, 40.0, false, false), 0);
/// assert_eq!(update_valid_count(3, 255.0, false, true), 0);
/// assert_eq!(update_valid_count(3, 40.0, true, true), 0);
/// ```
pub fn update_valid_count(count: u32, long_dist: f64, new_track: bool, valid: bool) -> u32 {
    if long_dist >= NO_TARGET_DIST || new_track {
        0
    } else if valid {
        count + 1
    } else {
        count.saturating_sub(1)
    }
}

/// Whether a slot holds a detection this sweep.
///
/// A validated reading is always accepted; otherwise the slot needs a score
/// above 50, a real distance and a non-zero hysteresis counter.
///
/// # Examples
///
/// ```rust
/// use openpilot_longitudinal::selfdrive::car::toyota::radar_interface::is_detected;
///
/// assert!(is_detected(true, 0.0, 255.0, 0));
/// assert!(is_detected(false, 60.0, 100.0, 1));
/// assert!(!is_detected(false, 40.0, 100.0, 1));
/// assert!(!is_detected(false, 60.0, 100.0, 0));
/// ```
pub fn is_detected(valid: bool, score: f64, long_dist: f64, count: u32) -> bool {
    valid || (score > MIN_SCORE && long_dist < NO_TARGET_DIST && count > 0)
}

/// Tracks radar points across sweeps.
#[derive(Debug)]
pub struct RadarInterface {
    /// Tracked points keyed by their slot message id.
    pts: BTreeMap<u32, RadarPoint>,
    /// Next track id to hand out.
    track_id: u64,
    /// Hysteresis counter per slot message id.
    valid_cnt: BTreeMap<u32, u32>,
    layout: RadarLayout,
    no_radar: bool,
    sweep_timeout: Duration,
}

impl RadarInterface {
    /// Creates a new `RadarInterface` for the platform in `cp`.
    ///
    /// # Arguments
    ///
    /// * `cp` - Vehicle parameters; the fingerprint selects the message layout.
    /// * `params` - Planner parameters; `radar_sweep_timeout` bounds the wait for a
    ///   full sweep before a CAN error is reported.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use openpilot_longitudinal::selfdrive::car::CarParams;
    /// use openpilot_longitudinal::selfdrive::car::toyota::radar_interface::RadarInterface;
    /// use openpilot_longitudinal::selfdrive::car::toyota::values::CarFingerprint;
    /// use openpilot_longitudinal::selfdrive::controls::planner::PlannerParams;
    ///
    /// let cp = CarParams::new(CarFingerprint::Rav4, 16.3, 2.65, 0.0);
    /// let ri = RadarInterface::new(&cp, &PlannerParams::default());
    /// assert_eq!(ri.track_count(), 0);
    /// assert!((ri.sweep_timeout().as_secs_f64() - 0.15).abs() < 1e-6);
    /// ```
    pub fn new(cp: &CarParams, params: &PlannerParams) -> Self {
        let layout = RadarLayout::for_car(cp.car_fingerprint);
        let valid_cnt = layout.a_msgs.clone().map(|id| (id, 0)).collect();
        RadarInterface {
            pts: BTreeMap::new(),
            track_id: 0,
            valid_cnt,
            layout,
            no_radar: !cp.car_fingerprint.has_radar(),
            sweep_timeout: params.sweep_timeout(),
        }
    }

    /// Longest wait for a full sweep.
    pub fn sweep_timeout(&self) -> Duration {
        self.sweep_timeout
    }

    /// Waits for a full radar sweep and returns the tracked points.
    ///
    /// On platforms without radar this only waits one radar period and
    /// returns an empty, error-free result.
    pub fn update<P: CanParser>(&mut self, parser: &mut P) -> RadarData {
        if self.no_radar {
            std::thread::sleep(Duration::from_secs_f64(DT_RADAR));
            return RadarData::default();
        }

        let (updated_messages, sweep_complete) = self.wait_for_sweep(parser);

        let mut errors = BTreeSet::new();
        if !sweep_complete {
            warn!(
                "radar sweep incomplete after {:?}, {} messages seen",
                self.sweep_timeout,
                updated_messages.len()
            );
            errors.insert(RadarError::CanError);
        }
        if !parser.can_valid() {
            warn!("radar CAN invalid");
            errors.insert(RadarError::CanError);
        }

        self.process_sweep(parser.table(), &updated_messages);

        RadarData {
            points: self
                .pts
                .values()
                .map(|pt| (pt.track_id, pt.clone()))
                .collect(),
            errors,
        }
    }

    /// Collects updated ids until the last score message arrives or the timeout passes.
    fn wait_for_sweep<P: CanParser>(&self, parser: &mut P) -> (BTreeSet<u32>, bool) {
        let deadline = Instant::now() + self.sweep_timeout;
        let last_msg = self.layout.last_msg();
        let mut updated_messages = BTreeSet::new();

        loop {
            let now = Instant::now();
            if now >= deadline {
                return (updated_messages, false);
            }
            updated_messages.extend(parser.update(deadline - now));
            if updated_messages.contains(&last_msg) {
                return (updated_messages, true);
            }
        }
    }

    /// Applies the updated slots to the tracked set.
    ///
    /// The new points and counters are built aside and swapped in once every slot is processed.
    fn process_sweep(&mut self, table: &SignalTable, updated_messages: &BTreeSet<u32>) {
        let mut pts = self.pts.clone();
        let mut valid_cnt = self.valid_cnt.clone();
        let mut track_id = self.track_id;

        for &ii in updated_messages
            .iter()
            .filter(|ii| self.layout.a_msgs.contains(*ii))
        {
            let cpt = RadarSlot::read(table, ii, self.layout.score_msg(ii));

            let cnt = valid_cnt.entry(ii).or_insert(0);
            *cnt = update_valid_count(*cnt, cpt.long_dist, cpt.new_track, cpt.valid);

            if is_detected(cpt.valid, cpt.score, cpt.long_dist, *cnt) {
                let needs_id = cpt.new_track || !pts.contains_key(&ii);
                let pt = pts.entry(ii).or_insert_with(|| RadarPoint {
                    track_id,
                    d_rel: 0.0,
                    y_rel: 0.0,
                    v_rel: 0.0,
                    a_rel: None,
                    yv_rel: None,
                    measured: false,
                });
                if needs_id {
                    pt.track_id = track_id;
                    debug!("radar slot {:#x} new track {}", ii, track_id);
                    track_id += 1;
                }
                // from front of car
                pt.d_rel = cpt.long_dist;
                // in car frame's y axis, left is positive
                pt.y_rel = -cpt.lat_dist;
                pt.v_rel = cpt.rel_speed;
                pt.a_rel = None;
                pt.yv_rel = None;
                pt.measured = cpt.valid;
            } else {
                pts.remove(&ii);
            }
        }

        self.pts = pts;
        self.valid_cnt = valid_cnt;
        self.track_id = track_id;
    }

    /// Hysteresis counter of the slot at message id `slot`.
    pub fn valid_count(&self, slot: u32) -> Option<u32> {
        self.valid_cnt.get(&slot).copied()
    }

    /// Number of currently tracked points.
    pub fn track_count(&self) -> usize {
        self.pts.len()
    }
}
