//! `sbbridge check`: resolve the configuration without touching any device.

use tabled::Tabled;

use sbbridge_api::Credentials;
use sbbridge_config::{Config, ConfigError};
use sbbridge_core::DeviceConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct ResolvedRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Connection")]
    connection: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Refresh")]
    refresh: String,
    #[tabled(rename = "Push")]
    push: String,
    #[tabled(rename = "Offline")]
    offline: String,
}

impl From<&DeviceConfig> for ResolvedRow {
    fn from(d: &DeviceConfig) -> Self {
        let t = &d.transport;
        Self {
            id: d.id.clone(),
            name: d.name.clone(),
            kind: d.kind.to_string(),
            connection: if t.cloud_disabled {
                format!("{} (cloud disabled)", t.connection_type)
            } else {
                t.connection_type.to_string()
            },
            address: d.address.map_or_else(|| "-".into(), |a| a.to_string()),
            refresh: output::duration(t.refresh_rate),
            push: output::duration(t.push_rate),
            offline: if t.offline { "defaults" } else { "fault" }.into(),
        }
    }
}

fn credential_summary(config: &Config) -> String {
    match sbbridge_config::resolve_credentials(&config.cloud) {
        Ok(Credentials::Signed { .. }) => "signed (v1.1)".into(),
        Ok(Credentials::Token(_)) => "token (v1.0)".into(),
        Err(ConfigError::NoCredentials { env }) if config.needs_cloud() => {
            format!("MISSING (set {env})")
        }
        Err(_) => "not configured".into(),
    }
}

pub fn handle(config: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let devices = sbbridge_config::resolve_devices(config)?;
    let rows: Vec<ResolvedRow> = devices.iter().map(ResolvedRow::from).collect();

    let context = config
        .context_path()
        .map_or_else(|| "disabled".into(), |p| p.display().to_string());
    let summary = [
        format!("Listen:      {}", config.server.listen),
        format!("Context:     {context}"),
        format!("Credentials: {}", credential_summary(config)),
        format!("Devices:     {}", devices.len()),
    ]
    .join("\n");

    output::print_output(&summary, global.quiet);
    if !rows.is_empty() {
        output::print_output(&output::render_table(&rows), global.quiet);
    }

    if config.needs_cloud() {
        sbbridge_config::resolve_credentials(&config.cloud)?;
    }
    Ok(())
}
