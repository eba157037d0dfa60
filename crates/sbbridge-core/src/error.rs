// ── Core error types ──
//
// Domain errors from sbbridge-core. Consumers never see reqwest or
// btleplug failures directly; `From<sbbridge_api::Error>` folds them into
// the transport taxonomy below.

use thiserror::Error;

use crate::model::{DeviceKind, Field, Transport};

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Transport errors ─────────────────────────────────────────────
    /// No usable transport (no adapter, cloud disabled, no token).
    #[error("No transport available: {reason}")]
    TransportUnavailable { reason: String },

    #[error("{transport} request timed out")]
    TransportTimeout { transport: Transport },

    #[error("{transport} transport error: {message}")]
    Transport {
        transport: Transport,
        message: String,
        /// Worth retrying locally before falling back.
        retryable: bool,
        /// HTTP status code, if the failure carried one.
        status: Option<u16>,
    },

    // ── Vendor outcomes ──────────────────────────────────────────────
    #[error("Command rejected by vendor (code {code}): {message}")]
    VendorRejected { code: i64, message: String },

    #[error("Device is offline")]
    DeviceOffline,

    #[error("Hub is offline")]
    HubOffline,

    /// Payload did not carry what the archetype expects.
    #[error("Payload does not match a {kind} device: {reason}")]
    DecodeMismatch { kind: DeviceKind, reason: String },

    #[error("Invalid webhook: {reason}")]
    InvalidWebhook { reason: String },

    // ── Accessory errors ─────────────────────────────────────────────
    #[error("Unknown characteristic: {name}")]
    UnknownCharacteristic { name: String },

    #[error("Characteristic {field} is read-only on {kind} devices")]
    ReadOnly { field: Field, kind: DeviceKind },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: Field, reason: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Context cache error: {0}")]
    Cache(String),

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Transport failures eligible for local retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::TransportTimeout { .. } => true,
            Self::Transport { retryable, .. } => *retryable,
            _ => false,
        }
    }

    /// Failures that should appear as a communication error on the accessory.
    pub fn is_communication_failure(&self) -> bool {
        matches!(
            self,
            Self::TransportUnavailable { .. }
                | Self::TransportTimeout { .. }
                | Self::Transport { .. }
                | Self::DeviceOffline
                | Self::HubOffline
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<sbbridge_api::Error> for CoreError {
    fn from(err: sbbridge_api::Error) -> Self {
        use sbbridge_api::Error as E;

        let transport = match err {
            E::Ble(_)
            | E::NoAdapter
            | E::PeripheralNotFound { .. }
            | E::BleProtocol(_)
            | E::Timeout { .. } => Transport::Ble,
            _ => Transport::Cloud,
        };

        if err.is_timeout() {
            return CoreError::TransportTimeout { transport };
        }

        match err {
            E::NoAdapter => CoreError::TransportUnavailable {
                reason: "no Bluetooth adapter".into(),
            },
            E::Signing(message) => CoreError::Config { message },
            E::InvalidUrl(e) => CoreError::Config {
                message: format!("invalid cloud URL: {e}"),
            },
            other => CoreError::Transport {
                transport,
                retryable: other.is_transient(),
                status: other.http_status(),
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_keeps_its_status() {
        let err = CoreError::from(sbbridge_api::Error::RateLimited);
        assert!(matches!(
            err,
            CoreError::Transport {
                transport: Transport::Cloud,
                status: Some(429),
                retryable: false,
                ..
            }
        ));
    }

    #[test]
    fn ble_errors_are_tagged_ble() {
        let err = CoreError::from(sbbridge_api::Error::PeripheralNotFound {
            address: "C0:FF:EE:00:00:01".into(),
        });
        assert!(err.is_retryable());
        assert!(matches!(err, CoreError::Transport { transport: Transport::Ble, .. }));
    }

    #[test]
    fn timeouts_become_transport_timeout() {
        let err = CoreError::from(sbbridge_api::Error::Timeout { timeout_secs: 5 });
        assert!(matches!(err, CoreError::TransportTimeout { .. }));
        assert!(err.is_communication_failure());
    }

    #[test]
    fn missing_adapter_is_unavailable() {
        let err = CoreError::from(sbbridge_api::Error::NoAdapter);
        assert!(matches!(err, CoreError::TransportUnavailable { .. }));
        assert!(!err.is_retryable());
    }
}
