// ── Domain model ──
//
// Devices come from the REST gateway's wire types; alarms are decoded from
// the message stream. Both are read-only from this crate's point of view.

mod alarm;
mod correlation;
mod device;

pub use alarm::AlarmEvent;
pub use correlation::CorrelationKey;
pub use device::{AdminState, Device, NewDevice, ensure_admin_state};
