//! Subcommand handlers.

pub mod check;
pub mod devices;
pub mod run;

use std::sync::Arc;

use tracing::debug;

use sbbridge_api::OpenApiClient;
use sbbridge_config::Config;

use crate::error::CliError;

/// Build the shared cloud client from the `[cloud]` section.
pub(crate) fn cloud_client(config: &Config) -> Result<Arc<OpenApiClient>, CliError> {
    let credentials = sbbridge_config::resolve_credentials(&config.cloud)?;
    let transport = sbbridge_config::api_transport(&config.cloud);

    let client = match config.cloud.base_url.as_deref() {
        Some(base) => OpenApiClient::with_base_url(base, credentials, &transport)?,
        None => OpenApiClient::new(credentials, &transport)?,
    };
    debug!(base_url = %client.base_url(), "cloud client ready");
    Ok(Arc::new(client))
}
