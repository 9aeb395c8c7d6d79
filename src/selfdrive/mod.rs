pub mod can;
pub mod car;
pub mod controls;
pub mod messaging;
