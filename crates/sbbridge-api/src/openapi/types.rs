// Wire types for the SwitchBot OpenAPI.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The `{ statusCode, body, message }` envelope every endpoint returns.
///
/// The body stays untyped: its shape depends on the device type and is
/// interpreted by the core's status decoder.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub status_code: i64,
    #[serde(default)]
    pub body: Value,
    #[serde(default)]
    pub message: String,
}

/// `POST /devices/{id}/commands` request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRequest {
    pub command: String,
    pub parameter: Value,
    pub command_type: String,
}

impl CommandRequest {
    /// A standard command with the `"default"` parameter.
    pub fn simple(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            parameter: Value::String("default".into()),
            command_type: "command".into(),
        }
    }

    /// A standard command carrying an explicit parameter.
    pub fn with_parameter(command: impl Into<String>, parameter: impl Into<Value>) -> Self {
        Self {
            parameter: parameter.into(),
            ..Self::simple(command)
        }
    }

    /// A user-defined button learned on an IR remote.
    pub fn customize(button: impl Into<String>) -> Self {
        Self {
            command_type: "customize".into(),
            ..Self::simple(button)
        }
    }
}

/// `GET /devices` body.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceList {
    #[serde(default)]
    pub device_list: Vec<PhysicalDevice>,
    #[serde(default)]
    pub infrared_remote_list: Vec<InfraredRemote>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhysicalDevice {
    pub device_id: String,
    #[serde(default)]
    pub device_name: String,
    #[serde(default)]
    pub device_type: Option<String>,
    #[serde(default)]
    pub hub_device_id: Option<String>,
    #[serde(default)]
    pub enable_cloud_service: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfraredRemote {
    pub device_id: String,
    #[serde(default)]
    pub device_name: String,
    #[serde(default)]
    pub remote_type: String,
    #[serde(default)]
    pub hub_device_id: Option<String>,
}
