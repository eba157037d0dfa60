//! `sbbridge run`: start every engine and serve until interrupted.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use sbbridge_api::BleClient;
use sbbridge_config::Config;
use sbbridge_core::{BleApi, CloudApi, ContextCache, Transports, WebhookRouter};

use crate::accessory::Bridge;
use crate::cli::RunArgs;
use crate::commands::cloud_client;
use crate::error::CliError;
use crate::server::{self, AppState};

pub async fn handle(args: RunArgs, config: Config) -> Result<(), CliError> {
    let devices = sbbridge_config::resolve_devices(&config)?;
    if devices.is_empty() {
        warn!("no devices configured; only the webhook endpoint will be useful");
    }

    let cloud: Option<Arc<dyn CloudApi>> = if config.needs_cloud() {
        Some(cloud_client(&config)? as Arc<dyn CloudApi>)
    } else {
        None
    };

    // One adapter for the whole process. Without one, dual-mode devices
    // still work over the cloud.
    let ble: Option<Arc<dyn BleApi>> = if devices.iter().any(|d| d.transport.ble_enabled()) {
        match BleClient::new().await {
            Ok(client) => Some(Arc::new(client) as Arc<dyn BleApi>),
            Err(e) => {
                warn!(error = %e, "Bluetooth unavailable, BLE transports disabled");
                None
            }
        }
    } else {
        None
    };

    let cache = config.context_path().map(|path| {
        info!(path = %path.display(), "using context cache");
        Arc::new(ContextCache::open(path))
    });

    let webhook = WebhookRouter::new();
    let transports = Transports {
        cloud,
        ble,
        webhook: Some(webhook.clone()),
        cache,
    };
    let bridge = Bridge::build(devices, &transports)?;

    let listen = args.listen.unwrap_or(config.server.listen);
    let listener = TcpListener::bind(listen)
        .await
        .map_err(|source| CliError::Bind {
            addr: listen.to_string(),
            source,
        })?;

    bridge.start().await;
    info!(devices = bridge.len(), "sbbridge running");

    let cancel = CancellationToken::new();
    let state = AppState {
        bridge: bridge.clone(),
        webhook,
    };
    let server = tokio::spawn(server::serve(listener, state, cancel.clone()));

    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    cancel.cancel();
    bridge.shutdown().await;
    match server.await {
        Ok(result) => result?,
        Err(e) => warn!(error = %e, "server task ended abnormally"),
    }
    Ok(())
}
