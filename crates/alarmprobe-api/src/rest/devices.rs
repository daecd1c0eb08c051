// Device endpoints
//
// Liveness, creation, activation and lookup of devices on the gateway's
// `/api/v1/local` surface.

use reqwest::StatusCode;
use tracing::debug;

use super::client::RestClient;
use super::models::{Device, NewDevice};
use crate::error::Error;

const API_ROOT: &str = "/api/v1";
const DEVICES: &str = "/api/v1/local/devices";

impl RestClient {
    /// Probe the API root; succeeds when the gateway answers 200.
    pub async fn check_api(&self) -> Result<(), Error> {
        self.get(API_ROOT, StatusCode::OK).await?;
        Ok(())
    }

    /// Create a device. The platform assigns the id.
    pub async fn create_device(&self, device: &NewDevice) -> Result<Device, Error> {
        let body = serde_json::to_value(device).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: String::new(),
        })?;
        let created = self.post(DEVICES, Some(&body), StatusCode::OK).await?;
        let created: Device = Self::decode(created)?;
        debug!(device_id = %created.id, device_type = %created.device_type, "device created");
        Ok(created)
    }

    /// Fetch a single device by id.
    pub async fn get_device(&self, id: &str) -> Result<Device, Error> {
        let value = self.get(&device_path(id, ""), StatusCode::OK).await?;
        Self::decode(value)
    }

    /// Request activation of a device.
    pub async fn activate_device(&self, id: &str) -> Result<(), Error> {
        self.post(&device_path(id, "/activate"), None, StatusCode::OK)
            .await?;
        Ok(())
    }

    /// Request deactivation of a device.
    pub async fn disable_device(&self, id: &str) -> Result<(), Error> {
        self.post(&device_path(id, "/disable"), None, StatusCode::OK)
            .await?;
        Ok(())
    }

    /// Remove a device. It must be disabled first.
    pub async fn delete_device(&self, id: &str) -> Result<(), Error> {
        self.delete(&device_path(id, "/delete"), StatusCode::OK)
            .await?;
        Ok(())
    }
}

fn device_path(id: &str, suffix: &str) -> String {
    format!("{DEVICES}/{id}{suffix}")
}
