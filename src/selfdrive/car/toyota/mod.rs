pub mod radar_interface;
pub mod values;
