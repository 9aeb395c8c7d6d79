use serde::Serialize;

/// Lowest speed the car accepts as a command, in m/s.
pub const MIN_CAN_SPEED: f64 = 0.3;

/// State of the longitudinal controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LongCtrlState {
    /// Not engaged.
    Off,
    /// Tracking the planned speed.
    Pid,
    /// Bringing the car to a stop.
    Stopping,
    /// Pulling away from standstill.
    Starting,
}

impl LongCtrlState {
    /// Whether the planner should run the full trajectory arbitration in this state.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use openpilot_longitudinal::selfdrive::controls::longcontrol::LongCtrlState;
    ///
    /// assert!(LongCtrlState::Pid.is_planning());
    /// assert!(LongCtrlState::Stopping.is_planning());
    /// assert!(!LongCtrlState::Starting.is_planning());
    /// assert!(!LongCtrlState::Off.is_planning());
    /// ```
    pub fn is_planning(self) -> bool {
        matches!(self, LongCtrlState::Pid | LongCtrlState::Stopping)
    }
}
