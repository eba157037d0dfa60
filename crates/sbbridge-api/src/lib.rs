// sbbridge-api: Async transport clients for SwitchBot devices (cloud OpenAPI + BLE)

pub mod ble;
pub mod error;
pub mod openapi;
pub mod transport;

pub use ble::{Advertisement, BleClient, BleModel, ServiceData};
pub use error::Error;
pub use openapi::{ApiResponse, CommandRequest, Credentials, OpenApiClient};
pub use transport::TransportConfig;
