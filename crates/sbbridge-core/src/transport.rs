// ── Transport seams ──
//
// The engine only sees these traits. The binary hands in the real
// `OpenApiClient` / `BleClient`; tests hand in fakes.

use std::time::Duration;

use async_trait::async_trait;
use macaddr::MacAddr6;

use sbbridge_api::{Advertisement, ApiResponse, BleClient, BleModel, CommandRequest, OpenApiClient};

use crate::error::CoreError;

/// Cloud status and command endpoints.
#[async_trait]
pub trait CloudApi: Send + Sync {
    async fn status(&self, device_id: &str) -> Result<ApiResponse, CoreError>;

    async fn command(
        &self,
        device_id: &str,
        command: &CommandRequest,
    ) -> Result<ApiResponse, CoreError>;
}

/// Local BLE listener and command writer.
#[async_trait]
pub trait BleApi: Send + Sync {
    /// Wait up to `window` for a matching advertisement.
    async fn scan(
        &self,
        address: MacAddr6,
        models: &[BleModel],
        window: Duration,
    ) -> Result<Option<Advertisement>, CoreError>;

    /// Write one command frame and return the device's reply.
    async fn write(&self, address: MacAddr6, frame: &[u8]) -> Result<Vec<u8>, CoreError>;
}

#[async_trait]
impl CloudApi for OpenApiClient {
    async fn status(&self, device_id: &str) -> Result<ApiResponse, CoreError> {
        Ok(self.get_status(device_id).await?)
    }

    async fn command(
        &self,
        device_id: &str,
        command: &CommandRequest,
    ) -> Result<ApiResponse, CoreError> {
        Ok(self.send_command(device_id, command).await?)
    }
}

#[async_trait]
impl BleApi for BleClient {
    async fn scan(
        &self,
        address: MacAddr6,
        models: &[BleModel],
        window: Duration,
    ) -> Result<Option<Advertisement>, CoreError> {
        Ok(self.scan_for(address, models, window).await?)
    }

    async fn write(&self, address: MacAddr6, frame: &[u8]) -> Result<Vec<u8>, CoreError> {
        Ok(self.write_command(address, frame).await?)
    }
}
