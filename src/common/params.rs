//! Parameter file loading.
//!
//! Vehicle and planner parameters are stored as TOML and deserialized into the
//! strongly typed structs that consume them, e.g.
//! [`CarParams`](crate::selfdrive::car::CarParams) and
//! [`PlannerParams`](crate::selfdrive::controls::planner::PlannerParams).

use log::info;
use serde::de::DeserializeOwned;
use std::fs::read_to_string;
use std::path::Path;
use thiserror::Error;

/// An error that occurs during loading of a parameter file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Cannot load the parameter file: {0}")]
    FileLoadError(#[from] std::io::Error),

    #[error("Cannot read the parameter file: {0}")]
    DeserialiseError(#[from] toml::de::Error),
}

/// Loads a parameter struct from a TOML file.
///
/// # Arguments
///
/// * `path` - Path of the parameter file.
///
/// # Returns
///
/// The parsed parameters, or a [`LoadError`] if the file cannot be read or parsed.
pub fn load<P, T>(path: T) -> Result<P, LoadError>
where
    P: DeserializeOwned,
    T: AsRef<Path>,
{
    let params_str = read_to_string(path.as_ref())?;
    let params = load_str(&params_str)?;
    info!("Loaded parameters from {:?}", path.as_ref());
    Ok(params)
}

/// Parses a parameter struct from TOML text.
///
/// # Examples
///
/// ```rust
/// use openpilot_longitudinal::common::params::load_str;
/// use openpilot_longitudinal::selfdrive::car::CarParams;
///
/// let cp: CarParams = load_str(
///     r#"
///     car_fingerprint = "PRIUS"
///     steer_ratio = 15.74
///     wheelbase = 2.70
///     start_accel = 0.0
///     "#,
/// )
/// .unwrap();
/// assert_eq!(cp.wheelbase, 2.70);
/// ```
pub fn load_str<P>(params_str: &str) -> Result<P, LoadError>
where
    P: DeserializeOwned,
{
    Ok(toml::from_str(params_str)?)
}
