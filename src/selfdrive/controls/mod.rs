pub mod fcw;
pub mod long_mpc;
pub mod longcontrol;
pub mod planner;
pub mod radar_helpers;
pub mod speed_smoother;
