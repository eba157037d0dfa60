// sbbridge-core: Per-device state synchronization between the transports and the accessory host.

pub mod cache;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod projector;
pub mod store;
pub mod strategy;
pub mod transport;
pub mod webhook;

// ── Primary re-exports ──────────────────────────────────────────────
pub use cache::ContextCache;
pub use classify::{CommandResult, StatusClass};
pub use config::{
    BotMode, ConnectionType, DeviceConfig, DeviceOptions, TemperatureUnit, TransportConfig,
};
pub use engine::{DeviceEngine, FlushOutcome, RefreshOutcome, Transports};
pub use error::CoreError;
pub use model::{DeviceKind, DeviceState, Field, FieldValue, Payload, Transport};
pub use projector::{Accessory, NullAccessory, Projector};
pub use store::StateSnapshot;
pub use transport::{BleApi, CloudApi};
pub use webhook::{Delivery, WebhookRouter};
