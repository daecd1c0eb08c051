// Wire types for the device endpoints of the REST gateway.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Administrative state of a device as reported by the platform.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AdminState {
    #[default]
    Unknown,
    Preprovisioned,
    Enabled,
    Disabled,
    DownloadingImage,
    Deleted,
}

/// A provisioned device, referenced by its platform-assigned `id`.
///
/// Only the fields the alarm scenario reads are typed; everything else the
/// gateway returns is kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,

    #[serde(rename = "type", default)]
    pub device_type: String,

    #[serde(default)]
    pub admin_state: AdminState,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oper_status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_status: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body of a device-creation request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NewDevice {
    #[serde(rename = "type")]
    pub device_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_and_port: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
}

impl NewDevice {
    pub fn of_type(device_type: impl Into<String>) -> Self {
        Self {
            device_type: device_type.into(),
            ..Self::default()
        }
    }
}
