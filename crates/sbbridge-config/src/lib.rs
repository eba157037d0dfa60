//! Configuration for the sbbridge daemon.
//!
//! TOML file + environment loading, credential resolution (env, keyring,
//! plaintext) and translation of device entries into validated
//! `sbbridge_core::DeviceConfig` values. Core never reads files itself.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use macaddr::MacAddr6;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use sbbridge_api::Credentials;
use sbbridge_core::{
    ConnectionType, DeviceConfig, DeviceKind, DeviceOptions, TemperatureUnit, TransportConfig,
};

const KEYRING_SERVICE: &str = "sbbridge";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no cloud token configured (set {env}, store it in the keyring, or add cloud.token)")]
    NoCredentials { env: String },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub cloud: CloudConfig,

    #[serde(default)]
    pub server: ServerConfig,

    /// Platform-wide transport defaults, overridden per device.
    #[serde(default)]
    pub defaults: TransportOverrides,

    #[serde(default)]
    pub devices: Vec<DeviceEntry>,
}

/// Cloud OpenAPI access.
#[derive(Debug, Deserialize, Serialize)]
pub struct CloudConfig {
    /// API token (plaintext, prefer keyring or env var).
    pub token: Option<String>,

    /// v1.1 signing secret (plaintext, prefer keyring or env var).
    pub secret: Option<String>,

    /// Environment variable holding the token.
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Environment variable holding the signing secret.
    #[serde(default = "default_secret_env")]
    pub secret_env: String,

    /// Override the API root (tests, proxies).
    pub base_url: Option<String>,

    #[serde(default, with = "humantime_opt", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            token: None,
            secret: None,
            token_env: default_token_env(),
            secret_env: default_secret_env(),
            base_url: None,
            timeout: None,
        }
    }
}

fn default_token_env() -> String {
    "SWITCHBOT_TOKEN".into()
}
fn default_secret_env() -> String {
    "SWITCHBOT_SECRET".into()
}

/// Local HTTP surface: accessory endpoints and the webhook receiver.
#[derive(Debug, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// Where device context is persisted between runs.
    pub context_path: Option<PathBuf>,

    /// Skip the context cache entirely.
    #[serde(default)]
    pub no_context: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            context_path: None,
            no_context: false,
        }
    }
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8581))
}

/// Transport settings that may be set platform-wide or per device.
/// Unset values fall through to the next layer.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_type: Option<ConnectionType>,

    #[serde(with = "humantime_opt", skip_serializing_if = "Option::is_none")]
    pub refresh_rate: Option<Duration>,

    #[serde(with = "humantime_opt", skip_serializing_if = "Option::is_none")]
    pub scan_duration: Option<Duration>,

    #[serde(with = "humantime_opt", skip_serializing_if = "Option::is_none")]
    pub push_rate: Option<Duration>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,

    #[serde(with = "humantime_opt", skip_serializing_if = "Option::is_none")]
    pub retry_delay: Option<Duration>,

    #[serde(with = "humantime_opt", skip_serializing_if = "Option::is_none")]
    pub follow_up_delay: Option<Duration>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub offline: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_disabled: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_unit: Option<TemperatureUnit>,
}

impl TransportOverrides {
    /// Values set here win; the rest come from `fallback`.
    pub fn or(&self, fallback: &Self) -> Self {
        Self {
            connection_type: self.connection_type.or(fallback.connection_type),
            refresh_rate: self.refresh_rate.or(fallback.refresh_rate),
            scan_duration: self.scan_duration.or(fallback.scan_duration),
            push_rate: self.push_rate.or(fallback.push_rate),
            max_retries: self.max_retries.or(fallback.max_retries),
            retry_delay: self.retry_delay.or(fallback.retry_delay),
            follow_up_delay: self.follow_up_delay.or(fallback.follow_up_delay),
            offline: self.offline.or(fallback.offline),
            cloud_disabled: self.cloud_disabled.or(fallback.cloud_disabled),
            temperature_unit: self.temperature_unit.or(fallback.temperature_unit),
        }
    }

    /// Apply the set values on top of `base`.
    pub fn apply(&self, base: TransportConfig) -> TransportConfig {
        TransportConfig {
            connection_type: self.connection_type.unwrap_or(base.connection_type),
            refresh_rate: self.refresh_rate.unwrap_or(base.refresh_rate),
            scan_duration: self.scan_duration.unwrap_or(base.scan_duration),
            push_rate: self.push_rate.unwrap_or(base.push_rate),
            max_retries: self.max_retries.unwrap_or(base.max_retries),
            retry_delay: self.retry_delay.unwrap_or(base.retry_delay),
            follow_up_delay: self.follow_up_delay.unwrap_or(base.follow_up_delay),
            offline: self.offline.unwrap_or(base.offline),
            cloud_disabled: self.cloud_disabled.unwrap_or(base.cloud_disabled),
            temperature_unit: self.temperature_unit.unwrap_or(base.temperature_unit),
        }
    }
}

/// One `[[devices]]` entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceEntry {
    /// Cloud device id (the MAC without separators for physical devices).
    pub id: String,

    pub name: Option<String>,

    /// Archetype (`lock`, `air-conditioner`) or the vendor's type string
    /// (`Smart Lock`, `Air Conditioner`).
    #[serde(rename = "type")]
    pub device_type: String,

    /// BLE address. Derived from `id` when omitted.
    pub address: Option<String>,

    #[serde(flatten)]
    pub options: DeviceOptions,

    #[serde(flatten)]
    pub transport: TransportOverrides,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "sbbridge", "sbbridge").map_or_else(
        || fallback_dir(".config").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default location of the persisted device context.
pub fn default_context_path() -> PathBuf {
    ProjectDirs::from("com", "sbbridge", "sbbridge").map_or_else(
        || fallback_dir(".local/share").join("context.json"),
        |dirs| dirs.data_dir().join("context.json"),
    )
}

fn fallback_dir(base: &str) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(base);
    p.push("sbbridge");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load defaults, then `path`, then `SBBRIDGE_*` variables
/// (`SBBRIDGE_DEFAULTS__REFRESH_RATE=60s`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading configuration");
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("SBBRIDGE_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

impl Config {
    /// Context cache location, `None` when disabled.
    pub fn context_path(&self) -> Option<PathBuf> {
        if self.server.no_context {
            return None;
        }
        Some(
            self.server
                .context_path
                .clone()
                .unwrap_or_else(default_context_path),
        )
    }

    /// Whether any configured device may talk to the cloud.
    pub fn needs_cloud(&self) -> bool {
        self.devices.iter().any(|d| {
            let t = d.transport.or(&self.defaults).apply(TransportConfig::default());
            t.cloud_enabled()
        })
    }
}

// ── Credential resolution ───────────────────────────────────────────

/// Look one secret up: env var → system keyring → plaintext.
fn resolve_secret(env_name: &str, keyring_user: &str, plaintext: Option<&str>) -> Option<SecretString> {
    // 1. Environment
    if let Ok(val) = std::env::var(env_name)
        && !val.is_empty()
    {
        return Some(SecretString::from(val));
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, keyring_user)
        && let Ok(secret) = entry.get_password()
    {
        return Some(SecretString::from(secret));
    }

    // 3. Plaintext in config
    plaintext.map(|s| SecretString::from(s.to_owned()))
}

/// Build cloud credentials. A token with a secret signs requests (v1.1);
/// a bare token uses v1.0.
pub fn resolve_credentials(cloud: &CloudConfig) -> Result<Credentials, ConfigError> {
    let token = resolve_secret(&cloud.token_env, "cloud/token", cloud.token.as_deref())
        .ok_or_else(|| ConfigError::NoCredentials {
            env: cloud.token_env.clone(),
        })?;

    match resolve_secret(&cloud.secret_env, "cloud/secret", cloud.secret.as_deref()) {
        Some(secret) => Ok(Credentials::Signed { token, secret }),
        None => Ok(Credentials::Token(token)),
    }
}

/// HTTP transport settings for the shared cloud client.
pub fn api_transport(cloud: &CloudConfig) -> sbbridge_api::TransportConfig {
    let mut transport = sbbridge_api::TransportConfig::default();
    if let Some(timeout) = cloud.timeout {
        transport.timeout = timeout;
    }
    transport
}

// ── Device resolution ───────────────────────────────────────────────

/// Resolve one entry: device values → platform defaults → built-in defaults.
pub fn resolve_device(
    entry: &DeviceEntry,
    defaults: &TransportOverrides,
) -> Result<DeviceConfig, ConfigError> {
    let field = |name: &str| format!("devices.{}.{name}", entry.id);

    let kind = parse_kind(&entry.device_type).ok_or_else(|| ConfigError::Validation {
        field: field("type"),
        reason: format!("unknown device type '{}'", entry.device_type),
    })?;

    let transport = entry.transport.or(defaults).apply(TransportConfig::default());

    let address = match entry.address.as_deref() {
        Some(raw) => Some(parse_address(raw).ok_or_else(|| ConfigError::Validation {
            field: field("address"),
            reason: format!("'{raw}' is not a MAC address"),
        })?),
        None if transport.ble_enabled() => parse_address(&entry.id),
        None => None,
    };

    let device = DeviceConfig {
        id: entry.id.clone(),
        name: entry.name.clone().unwrap_or_else(|| entry.id.clone()),
        kind,
        address,
        transport,
        options: entry.options.clone(),
    };
    device.validate().map_err(|e| ConfigError::Validation {
        field: format!("devices.{}", entry.id),
        reason: e.to_string(),
    })?;
    Ok(device)
}

/// Resolve every configured device, rejecting duplicate ids.
pub fn resolve_devices(config: &Config) -> Result<Vec<DeviceConfig>, ConfigError> {
    let mut devices: Vec<DeviceConfig> = Vec::with_capacity(config.devices.len());
    for entry in &config.devices {
        if devices.iter().any(|d| d.id == entry.id) {
            return Err(ConfigError::Validation {
                field: "devices".into(),
                reason: format!("device id '{}' appears more than once", entry.id),
            });
        }
        devices.push(resolve_device(entry, &config.defaults)?);
    }
    Ok(devices)
}

/// Accept both the archetype name and the vendor's type string.
pub fn parse_kind(raw: &str) -> Option<DeviceKind> {
    DeviceKind::from_str(raw)
        .ok()
        .or_else(|| DeviceKind::from_vendor_type(raw))
}

/// Parse `C0:FF:EE:00:00:01`, `c0-ff-ee-00-00-01` or `C0FFEE000001`.
pub fn parse_address(raw: &str) -> Option<MacAddr6> {
    let hex: Vec<u8> = raw
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | '.'))
        .map(|c| c.to_digit(16).and_then(|d| u8::try_from(d).ok()))
        .collect::<Option<_>>()?;
    if hex.len() != 12 {
        return None;
    }
    let mut bytes = [0u8; 6];
    for (byte, pair) in bytes.iter_mut().zip(hex.chunks_exact(2)) {
        *byte = (pair[0] << 4) | pair[1];
    }
    Some(MacAddr6::from(bytes))
}

// ── Duration (de)serialization ──────────────────────────────────────

/// `Option<Duration>` as a humantime string (`"90s"`, `"5m"`) or whole seconds.
mod humantime_opt {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Secs(u64),
        Text(String),
    }

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_str(&humantime::format_duration(*d).to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        match Option::<Raw>::deserialize(d)? {
            None => Ok(None),
            Some(Raw::Secs(secs)) => Ok(Some(Duration::from_secs(secs))),
            Some(Raw::Text(text)) => humantime::parse_duration(&text)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}
