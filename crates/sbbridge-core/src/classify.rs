// ── Vendor status-code classification ──
//
// Maps the integer `statusCode` of a cloud envelope (or the HTTP status of
// a failed request) to a classification the engine acts on.

use serde::Serialize;
use strum::Display;
use tracing::{error, info};

use crate::error::CoreError;
use crate::model::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum StatusClass {
    Success,
    Retryable,
    DeviceOffline,
    HubOffline,
    Unsupported,
    DeviceNotFound,
    Malformed,
    Unauthorized,
    RateLimited,
    ProtocolError,
    Unknown,
}

impl StatusClass {
    /// Classify a vendor envelope code or an HTTP status code.
    pub fn from_code(code: i64) -> Self {
        match code {
            100 | 200 => Self::Success,
            151 | 160 => Self::Unsupported,
            152 => Self::DeviceNotFound,
            161 => Self::DeviceOffline,
            171 => Self::HubOffline,
            190 => Self::Malformed,
            401 | 403 => Self::Unauthorized,
            429 => Self::RateLimited,
            400 | 404 | 406 | 415 | 422 | 500 => Self::ProtocolError,
            _ => Self::Unknown,
        }
    }

    pub fn is_success(self) -> bool {
        self == Self::Success
    }

    /// 161/171: the offline-default policy applies.
    pub fn is_offline(self) -> bool {
        matches!(self, Self::DeviceOffline | Self::HubOffline)
    }
}

/// Outcome of one dispatch or status query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandResult {
    pub transport: Transport,
    pub status_code: i64,
    pub class: StatusClass,
    pub message: String,
}

impl CommandResult {
    pub fn new(transport: Transport, status_code: i64, message: impl Into<String>) -> Self {
        Self {
            transport,
            status_code,
            class: StatusClass::from_code(status_code),
            message: message.into(),
        }
    }

    /// A BLE exchange that completed with an OK reply.
    pub fn ble_ok() -> Self {
        Self::new(Transport::Ble, 100, "ble ok")
    }

    /// Outcome of a request that failed below the vendor envelope.
    pub fn from_error(transport: Transport, err: &CoreError) -> Self {
        let status_code = match err {
            CoreError::Transport {
                status: Some(s), ..
            } => i64::from(*s),
            _ => 0,
        };
        let class = if err.is_retryable() {
            StatusClass::Retryable
        } else if status_code == 0 {
            StatusClass::Unknown
        } else {
            StatusClass::from_code(status_code)
        };
        Self {
            transport,
            status_code,
            class,
            message: err.to_string(),
        }
    }

    /// Emit the log line the classification calls for.
    pub fn log(&self, device: &str) {
        let code = self.status_code;
        let transport = self.transport;
        match self.class {
            StatusClass::Success => {}
            StatusClass::Unknown => info!(
                device,
                code,
                %transport,
                message = %self.message,
                "unrecognized status code, please report a bug"
            ),
            StatusClass::DeviceOffline => error!(device, code, %transport, "device is offline"),
            StatusClass::HubOffline => error!(device, code, %transport, "hub is offline"),
            class => error!(
                device,
                code,
                %transport,
                %class,
                message = %self.message,
                "vendor rejected request"
            ),
        }
    }

    /// Convert a non-success outcome into the matching error.
    pub fn into_result(self) -> Result<Self, CoreError> {
        match self.class {
            StatusClass::Success => Ok(self),
            StatusClass::DeviceOffline => Err(CoreError::DeviceOffline),
            StatusClass::HubOffline => Err(CoreError::HubOffline),
            _ => Err(CoreError::VendorRejected {
                code: self.status_code,
                message: self.message,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table() {
        let cases = [
            (100, StatusClass::Success),
            (200, StatusClass::Success),
            (151, StatusClass::Unsupported),
            (152, StatusClass::DeviceNotFound),
            (160, StatusClass::Unsupported),
            (161, StatusClass::DeviceOffline),
            (171, StatusClass::HubOffline),
            (190, StatusClass::Malformed),
            (401, StatusClass::Unauthorized),
            (403, StatusClass::Unauthorized),
            (429, StatusClass::RateLimited),
            (500, StatusClass::ProtocolError),
            (422, StatusClass::ProtocolError),
            (999, StatusClass::Unknown),
        ];
        for (code, expected) in cases {
            assert_eq!(StatusClass::from_code(code), expected, "code {code}");
        }
    }

    #[test]
    fn offline_codes_map_to_offline_errors() {
        let r = CommandResult::new(Transport::Cloud, 161, "offline");
        assert!(r.class.is_offline());
        assert!(matches!(r.into_result(), Err(CoreError::DeviceOffline)));

        let r = CommandResult::new(Transport::Cloud, 171, "hub offline");
        assert!(matches!(r.into_result(), Err(CoreError::HubOffline)));
    }

    #[test]
    fn transport_failures_carry_http_status() {
        let err = CoreError::from(sbbridge_api::Error::Http {
            status: 500,
            body: "oops".into(),
        });
        let r = CommandResult::from_error(Transport::Cloud, &err);
        assert_eq!(r.status_code, 500);
        assert_eq!(r.class, StatusClass::ProtocolError);

        let err = CoreError::TransportTimeout {
            transport: Transport::Ble,
        };
        assert_eq!(
            CommandResult::from_error(Transport::Ble, &err).class,
            StatusClass::Retryable
        );
    }

    #[test]
    fn class_names_are_camel_case() {
        assert_eq!(StatusClass::DeviceNotFound.to_string(), "deviceNotFound");
    }
}
