mod auth;
mod client;
mod device;
mod measurement_type;
mod time_series;

pub use auth::*;
pub use client::*;
pub use device::*;
pub use measurement_type::*;
pub use time_series::*;
