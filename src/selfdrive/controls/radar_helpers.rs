//! Lead vehicle summaries shared by the radar state stage and the planner.

/// Leads further away than this are not considered followed, in meters.
const FOLLOWING_MAX_DIST: f64 = 45.0;

/// Summary of one lead vehicle as selected from the radar tracks.
#[derive(Debug, Clone, PartialEq)]
pub struct Lead {
    /// Relative longitudinal distance to the lead vehicle.
    pub d_rel: f64,
    /// Negative lateral distance to the lead vehicle.
    pub y_rel: f64,
    /// Relative speed to the lead vehicle.
    pub v_rel: f64,
    /// Relative acceleration to the lead vehicle.
    pub a_rel: f64,
    /// Lead vehicle speed.
    pub v_lead: f64,
    /// Lead vehicle acceleration.
    pub a_lead: f64,
    /// Distance from the lead to the predicted path.
    pub d_path: f64,
    /// Filtered lateral velocity.
    pub v_lat: f64,
    /// Filtered lead vehicle speed.
    pub v_lead_k: f64,
    /// Filtered lead vehicle acceleration.
    pub a_lead_k: f64,
    /// Whether a lead vehicle is present.
    pub status: bool,
    /// Whether this lead may raise a forward collision warning.
    pub fcw: bool,
}

impl Lead {
    /// Creates an absent lead with every measurement zeroed.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use openpilot_longitudinal::selfdrive::controls::radar_helpers::Lead;
    ///
    /// let lead = Lead::new();
    /// assert!(!lead.status);
    /// assert_eq!(lead.d_rel, 0.0);
    /// ```
    pub fn new() -> Self {
        Lead {
            d_rel: 0.0,
            y_rel: 0.0,
            v_rel: 0.0,
            a_rel: 0.0,
            v_lead: 0.0,
            a_lead: 0.0,
            d_path: 0.0,
            v_lat: 0.0,
            v_lead_k: 0.0,
            a_lead_k: 0.0,
            status: false,
            fcw: false,
        }
    }

    /// Whether the lead is close, pulling away and accelerating, so cruise may
    /// use the more generous following acceleration.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use openpilot_longitudinal::selfdrive::controls::radar_helpers::Lead;
    ///
    /// let lead = Lead { status: true, d_rel: 30.0, v_lead_k: 22.0, a_lead_k: 0.3, ..Lead::new() };
    /// assert!(lead.is_pulling_away(20.0));
    /// assert!(!lead.is_pulling_away(25.0));
    /// ```
    pub fn is_pulling_away(&self, v_ego: f64) -> bool {
        self.status
            && self.d_rel < FOLLOWING_MAX_DIST
            && self.v_lead_k > v_ego
            && self.a_lead_k > 0.0
    }
}

impl Default for Lead {
    fn default() -> Self {
        Self::new()
    }
}
