//! `sbbridge devices`: list what the cloud account knows about.

use serde::Serialize;
use tabled::Tabled;

use sbbridge_api::openapi::{InfraredRemote, PhysicalDevice};
use sbbridge_config::{Config, parse_kind};

use crate::cli::{DevicesArgs, GlobalOpts};
use crate::commands::cloud_client;
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    device_type: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Hub")]
    hub: String,
}

impl DeviceRow {
    fn new(id: &str, name: &str, device_type: &str, hub: Option<&str>) -> Self {
        Self {
            id: id.to_owned(),
            name: name.to_owned(),
            device_type: device_type.to_owned(),
            kind: parse_kind(device_type).map_or_else(|| "unsupported".into(), |k| k.to_string()),
            hub: hub.filter(|h| !h.is_empty() && *h != "000000000000").unwrap_or("-").to_owned(),
        }
    }
}

impl From<&PhysicalDevice> for DeviceRow {
    fn from(d: &PhysicalDevice) -> Self {
        Self::new(
            &d.device_id,
            &d.device_name,
            d.device_type.as_deref().unwrap_or("-"),
            d.hub_device_id.as_deref(),
        )
    }
}

impl From<&InfraredRemote> for DeviceRow {
    fn from(r: &InfraredRemote) -> Self {
        Self::new(
            &r.device_id,
            &r.device_name,
            &r.remote_type,
            r.hub_device_id.as_deref(),
        )
    }
}

// ── TOML snippet ────────────────────────────────────────────────────

#[derive(Serialize)]
struct Snippet {
    devices: Vec<SnippetEntry>,
}

#[derive(Serialize)]
struct SnippetEntry {
    id: String,
    name: String,
    #[serde(rename = "type")]
    kind: String,
}

fn snippet(rows: &[DeviceRow]) -> Result<String, CliError> {
    let devices = rows
        .iter()
        .filter(|r| r.kind != "unsupported")
        .map(|r| SnippetEntry {
            id: r.id.clone(),
            name: r.name.clone(),
            kind: r.kind.clone(),
        })
        .collect();
    Ok(toml::to_string_pretty(&Snippet { devices })?)
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: DevicesArgs, config: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let client = cloud_client(config)?;
    let list = client.list_devices().await?;

    let rows: Vec<DeviceRow> = list
        .device_list
        .iter()
        .map(DeviceRow::from)
        .chain(list.infrared_remote_list.iter().map(DeviceRow::from))
        .collect();

    let rendered = if args.toml {
        snippet(&rows)?
    } else {
        output::render_table(&rows)
    };
    output::print_output(&rendered, global.quiet);
    Ok(())
}
