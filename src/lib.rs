//! # openpilot-longitudinal
//!
//! `openpilot-longitudinal` is a Rust crate that provides the longitudinal half of an openpilot-style
//! driver assistance stack: turning raw Toyota radar CAN traffic into tracked radar points, and turning
//! vehicle state, lead summaries and the driver's cruise setpoint into a smooth speed and acceleration
//! plan every control cycle.
//!
//! ## Modules
//!
//! `openpilot-longitudinal` is organized into several modules, each serving a specific purpose:
//!
//! - [RadarInterface](selfdrive/car/toyota/radar_interface/struct.RadarInterface.html): Waits for a full radar
//!   sweep, applies per-slot hysteresis and hands out stable track ids.
//!
//! - [CanParser](selfdrive/can/parser/trait.CanParser.html): The decoded CAN signal source the radar reads from,
//!   with [QueuedCanParser](selfdrive/can/parser/struct.QueuedCanParser.html) as an in-process implementation.
//!
//! - [Planner](selfdrive/controls/planner/struct.Planner.html): Arbitrates between cruise and two lead-following
//!   MPC solutions and keeps the plan continuous between cycles.
//!
//! - [speed_smoother](selfdrive/controls/speed_smoother/fn.speed_smoother.html): Jerk and acceleration limited
//!   step toward a target speed.
//!
//! - [FcwChecker](selfdrive/controls/fcw/struct.FcwChecker.html): Forward collision warning with persistence
//!   counters and a cooldown.
//!
//! - [params](common/params/index.html): TOML loading for vehicle and planner parameters.
//!
//! ## Usage
//!
//! To use the `openpilot-longitudinal` crate in your project, add the following line to your `Cargo.toml` file:
//!
//! ```toml
//! [dependencies]
//! openpilot-longitudinal = "0.1.0"
//! ```
//!
//! Logging goes through the [`log`](https://docs.rs/log) facade, so install whichever logger the
//! host process uses.
//!
//! ## Example
//!
//! ```rust
//! use openpilot_longitudinal::selfdrive::can::parser::{DecodedMessage, QueuedCanParser};
//! use openpilot_longitudinal::selfdrive::car::CarParams;
//! use openpilot_longitudinal::selfdrive::car::toyota::radar_interface::RadarInterface;
//! use openpilot_longitudinal::selfdrive::car::toyota::values::CarFingerprint;
//! use openpilot_longitudinal::selfdrive::controls::planner::PlannerParams;
//!
//! let cp = CarParams::new(CarFingerprint::Prius, 15.74, 2.70, 0.6);
//! let mut radar = RadarInterface::new(&cp, &PlannerParams::default());
//!
//! // one target in the first slot, and the last score message closing the sweep
//! let mut can = QueuedCanParser::new();
//! can.push_batch(vec![
//!     DecodedMessage::new(0x210, &[("LONG_DIST", 40.0), ("NEW_TRACK", 0.0), ("VALID", 1.0)]),
//!     DecodedMessage::new(0x22f, &[("SCORE", 0.0)]),
//! ]);
//!
//! let rr = radar.update(&mut can);
//! assert!(rr.errors.is_empty());
//! assert_eq!(rr.points.len(), 1);
//! ```
//!
//! ## License
//!
//! This project is licensed under the [MIT License](LICENSE).

pub mod common;
pub mod selfdrive;
