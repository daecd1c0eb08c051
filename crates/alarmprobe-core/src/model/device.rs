// ── Device domain types ──

pub use alarmprobe_api::{AdminState, Device, NewDevice};

use crate::error::CoreError;

/// Check that `device` reports `expected` as its administrative state.
pub fn ensure_admin_state(device: &Device, expected: AdminState) -> Result<(), CoreError> {
    if device.admin_state == expected {
        Ok(())
    } else {
        Err(CoreError::AdminState {
            device_id: device.id.clone(),
            expected,
            actual: device.admin_state,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn device(state: AdminState) -> Device {
        Device {
            id: "abc123".into(),
            device_type: "simulated_olt".into(),
            admin_state: state,
            oper_status: None,
            connect_status: None,
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn enabled_device_passes() {
        assert!(ensure_admin_state(&device(AdminState::Enabled), AdminState::Enabled).is_ok());
    }

    #[test]
    fn disabled_device_reports_both_states() {
        let err = ensure_admin_state(&device(AdminState::Disabled), AdminState::Enabled)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Device abc123 has admin_state DISABLED, expected ENABLED"
        );
    }
}
