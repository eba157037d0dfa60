// SwitchBot cloud OpenAPI client.

pub mod auth;
mod client;
pub mod types;

pub use auth::Credentials;
pub use client::OpenApiClient;
pub use types::{ApiResponse, CommandRequest, DeviceList, InfraredRemote, PhysicalDevice};
