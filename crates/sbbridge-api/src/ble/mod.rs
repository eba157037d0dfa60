// BLE transport: passive advertisement listening plus GATT command writes.
//
// One adapter is opened per process and left scanning. Each caller gets
// its own event stream from the adapter, so many devices can wait on their
// scan windows at once without sharing a queue.

pub mod advertisement;

use std::time::Duration;

use btleplug::api::{
    Central as _, CentralEvent, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use macaddr::MacAddr6;
use tokio::time::timeout;
use tokio_stream::StreamExt as _;
use tracing::{debug, trace};
use uuid::{Uuid, uuid};

pub use advertisement::{
    Advertisement, BleLockState, BleModel, DoorState, LightLevel, ServiceData,
    decode_advertisement,
};

use crate::error::Error;

const CHR_UUID_RX: Uuid = uuid!("cba20002-224d-11e6-9fb8-0002a5d5c51b");
const CHR_UUID_TX: Uuid = uuid!("cba20003-224d-11e6-9fb8-0002a5d5c51b");
const COMMAND_RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);
const RESPONSE_OK: u8 = 0x01;

/// Shared handle to the host Bluetooth adapter.
#[derive(Clone)]
pub struct BleClient {
    adapter: Adapter,
}

impl std::fmt::Debug for BleClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BleClient").finish_non_exhaustive()
    }
}

impl BleClient {
    /// Open the first adapter and start a passive scan.
    pub async fn new() -> Result<Self, Error> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(Error::NoAdapter)?;

        adapter.start_scan(ScanFilter::default()).await?;
        debug!("BLE scan started");
        Ok(Self { adapter })
    }

    /// Wait up to `window` for an advertisement from `address` whose model
    /// is one of `models`.
    ///
    /// Returns `Ok(None)` when the window closes without a match.
    pub async fn scan_for(
        &self,
        address: MacAddr6,
        models: &[BleModel],
        window: Duration,
    ) -> Result<Option<Advertisement>, Error> {
        let mut events = self.adapter.events().await?;

        let listen = async {
            while let Some(event) = events.next().await {
                let id = match event {
                    CentralEvent::DeviceDiscovered(id)
                    | CentralEvent::DeviceUpdated(id)
                    | CentralEvent::ServiceDataAdvertisement { id, .. }
                    | CentralEvent::ManufacturerDataAdvertisement { id, .. } => id,
                    _ => continue,
                };

                if let Some(ad) = self.advertisement_for(&id, address).await?
                    && models.contains(&ad.model)
                {
                    return Ok(Some(ad));
                }
            }
            Ok::<_, Error>(None)
        };

        match timeout(window, listen).await {
            Ok(result) => result,
            Err(_) => {
                trace!(%address, "scan window elapsed");
                Ok(None)
            }
        }
    }

    async fn advertisement_for(
        &self,
        id: &PeripheralId,
        address: MacAddr6,
    ) -> Result<Option<Advertisement>, Error> {
        let peripheral = self.adapter.peripheral(id).await?;
        let seen: MacAddr6 = peripheral.address().into_inner().into();
        if seen != address {
            return Ok(None);
        }

        let Some(props) = peripheral.properties().await? else {
            return Ok(None);
        };

        Ok(decode_advertisement(
            seen,
            props.rssi,
            &props.service_data,
            &props.manufacturer_data,
        ))
    }

    /// Write one command frame to the device and wait for its reply.
    ///
    /// The frame is the raw `0x57 …` request; the first reply byte is the
    /// device's result code.
    pub async fn write_command(&self, address: MacAddr6, frame: &[u8]) -> Result<Vec<u8>, Error> {
        let peripheral = self.find_peripheral(address).await?;

        peripheral.connect().await?;
        let result = Self::exchange(&peripheral, frame).await;
        if let Err(e) = peripheral.disconnect().await {
            debug!(%address, error = %e, "disconnect failed (non-fatal)");
        }
        result
    }

    async fn find_peripheral(&self, address: MacAddr6) -> Result<Peripheral, Error> {
        for peripheral in self.adapter.peripherals().await? {
            let seen: MacAddr6 = peripheral.address().into_inner().into();
            if seen == address {
                return Ok(peripheral);
            }
        }
        Err(Error::PeripheralNotFound {
            address: address.to_string(),
        })
    }

    async fn exchange(peripheral: &Peripheral, frame: &[u8]) -> Result<Vec<u8>, Error> {
        peripheral.discover_services().await?;
        let characteristics = peripheral.characteristics();

        let rx = characteristics
            .iter()
            .find(|c| c.uuid == CHR_UUID_RX)
            .ok_or_else(|| Error::BleProtocol("RX characteristic not found".into()))?;
        let tx = characteristics
            .iter()
            .find(|c| c.uuid == CHR_UUID_TX)
            .ok_or_else(|| Error::BleProtocol("TX characteristic not found".into()))?;

        peripheral.subscribe(tx).await?;
        let mut notifications = peripheral.notifications().await?;

        peripheral
            .write(rx, frame, WriteType::WithResponse)
            .await?;

        let reply = timeout(COMMAND_RESPONSE_TIMEOUT, async {
            while let Some(n) = notifications.next().await {
                if n.uuid == CHR_UUID_TX {
                    return Some(n.value);
                }
            }
            None
        })
        .await
        .map_err(|_| Error::Timeout {
            timeout_secs: COMMAND_RESPONSE_TIMEOUT.as_secs(),
        })?
        .ok_or_else(|| Error::BleProtocol("notification stream closed".into()))?;

        match reply.first() {
            Some(&RESPONSE_OK) => Ok(reply),
            Some(code) => Err(Error::BleProtocol(format!(
                "device rejected command (0x{code:02x})"
            ))),
            None => Err(Error::BleProtocol("empty reply".into())),
        }
    }
}
