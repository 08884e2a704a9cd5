pub mod config;
pub mod export;
pub mod fleet;
pub mod netatmo;
pub mod station;
