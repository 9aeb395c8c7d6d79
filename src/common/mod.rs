pub mod conversions;
pub mod numpy_fast;
pub mod params;
pub mod realtime;
