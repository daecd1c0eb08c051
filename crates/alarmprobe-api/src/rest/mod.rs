// REST gateway client modules
//
// Generic JSON verbs with status assertions live in `client`; the device
// endpoints consumed by the alarm scenario are inherent methods in `devices`.

pub mod client;
pub mod devices;
pub mod models;

pub use client::RestClient;
pub use models::{AdminState, Device, NewDevice};
