use thiserror::Error;

/// Top-level error type for the `sbbridge-api` crate.
///
/// Covers every failure mode of the two transports: the cloud OpenAPI
/// (HTTP, envelope parsing, request signing) and the local BLE adapter.
/// `sbbridge-core` maps these into its own taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Token or signature rejected by the cloud API (HTTP 401/403).
    #[error("Authentication failed (HTTP {status}): {message}")]
    Authentication { status: u16, message: String },

    /// Building the signed request headers failed.
    #[error("Request signing failed: {0}")]
    Signing(String),

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Rate limited by the cloud API (the daily request quota is exhausted).
    #[error("Rate limited by the cloud API")]
    RateLimited,

    /// Any other non-2xx HTTP response.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Bluetooth ───────────────────────────────────────────────────
    /// Error reported by the platform BLE stack.
    #[error("BLE error: {0}")]
    Ble(#[from] btleplug::Error),

    /// No Bluetooth adapter is present on this host.
    #[error("No Bluetooth adapter available")]
    NoAdapter,

    /// The peripheral was not seen during discovery.
    #[error("BLE peripheral {address} not found")]
    PeripheralNotFound { address: String },

    /// The peripheral does not expose the SwitchBot command characteristic.
    #[error("BLE protocol error: {0}")]
    BleProtocol(String),
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. }
            | Self::Ble(_)
            | Self::PeripheralNotFound { .. } => true,
            _ => false,
        }
    }

    /// Returns `true` for timeouts on either transport.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout(),
            Self::Timeout { .. } => true,
            _ => false,
        }
    }

    /// HTTP status code, when the failure carried one.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Authentication { status, .. } | Self::Http { status, .. } => Some(*status),
            Self::RateLimited => Some(429),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
