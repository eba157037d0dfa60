//! CLI error types with miette diagnostics.
//!
//! Maps config, transport and core errors into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use sbbridge_config::ConfigError;
use sbbridge_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Cloud ────────────────────────────────────────────────────────
    #[error("Could not reach the SwitchBot cloud")]
    #[diagnostic(
        code(sbbridge::connection_failed),
        help("Check network access to api.switch-bot.com, or cloud.base_url in the config.")
    )]
    ConnectionFailed {
        #[source]
        source: sbbridge_api::Error,
    },

    #[error("Cloud authentication failed")]
    #[diagnostic(
        code(sbbridge::auth_failed),
        help(
            "Verify the token (and secret, for signed requests) from the SwitchBot app:\n\
             Profile > Preferences > Developer Options."
        )
    )]
    AuthFailed { message: String },

    #[error("No cloud token configured")]
    #[diagnostic(
        code(sbbridge::no_credentials),
        help(
            "Set {env}, store it in the system keyring (service 'sbbridge', user 'cloud/token'),\n\
             or add `token` under [cloud] in the config file."
        )
    )]
    NoCredentials { env: String },

    #[error("Cloud API error ({code}): {message}")]
    #[diagnostic(code(sbbridge::api_error))]
    ApiError { code: String, message: String },

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(sbbridge::timeout),
        help("Increase cloud.timeout or check connectivity.")
    )]
    Timeout { seconds: u64 },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(sbbridge::validation))]
    Validation { field: String, reason: String },

    #[error(transparent)]
    #[diagnostic(code(sbbridge::config))]
    Config(Box<figment::Error>),

    // ── Server ───────────────────────────────────────────────────────
    #[error("Cannot listen on {addr}")]
    #[diagnostic(
        code(sbbridge::bind),
        help("Another process may own the port. Pick another with --listen or server.listen.")
    )]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Cannot render TOML: {0}")]
    #[diagnostic(code(sbbridge::toml))]
    Toml(#[from] toml::ser::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Bind { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::Config(_) => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── Conversions ──────────────────────────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::NoCredentials { env } => Self::NoCredentials { env },
            ConfigError::Figment(e) => Self::Config(e),
        }
    }
}

impl From<sbbridge_api::Error> for CliError {
    fn from(err: sbbridge_api::Error) -> Self {
        use sbbridge_api::Error as E;

        if matches!(&err, E::Transport(e) if e.is_connect() || e.is_timeout()) {
            return Self::ConnectionFailed { source: err };
        }

        match err {
            E::Authentication { message, .. } => Self::AuthFailed { message },
            E::Timeout { timeout_secs } => Self::Timeout {
                seconds: timeout_secs,
            },
            E::RateLimited => Self::ApiError {
                code: "429".into(),
                message: "daily request quota exhausted".into(),
            },
            E::Http { status, body } => Self::ApiError {
                code: status.to_string(),
                message: body,
            },
            other => Self::ApiError {
                code: "client".into(),
                message: other.to_string(),
            },
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Config { message } => Self::Validation {
                field: "devices".into(),
                reason: message,
            },
            other => Self::ApiError {
                code: "core".into(),
                message: other.to_string(),
            },
        }
    }
}
