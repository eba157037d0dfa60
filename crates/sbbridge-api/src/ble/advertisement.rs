//! Decoder for SwitchBot BLE advertisements.
//!
//! Reference:
//!     - https://github.com/OpenWonderLabs/SwitchBotAPI-BLE/blob/latest/README.md
//!
//! The first service-data byte carries the model; the remaining service-data
//! bytes and, for newer models, the manufacturer data (company id already
//! stripped by the platform stack) carry the state.

use std::collections::HashMap;

use macaddr::MacAddr6;
use serde::Serialize;
use uuid::{Uuid, uuid};

pub const SWITCHBOT_COMPANY_ID: u16 = 0x0969;
pub const SWITCHBOT_SERVICE_DATA_UUID: Uuid = uuid!("0000fd3d-0000-1000-8000-00805f9b34fb");

/// Advertised model byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BleModel {
    Bot,
    Meter,
    MeterPlus,
    OutdoorMeter,
    Motion,
    Contact,
    PlugMiniUs,
    PlugMiniJp,
    Lock,
}

impl BleModel {
    pub fn from_byte(v: u8) -> Option<Self> {
        match v & 0x7f {
            0x48 => Some(Self::Bot),
            0x54 => Some(Self::Meter),
            0x69 => Some(Self::MeterPlus),
            0x77 => Some(Self::OutdoorMeter),
            0x73 => Some(Self::Motion),
            0x64 => Some(Self::Contact),
            0x67 => Some(Self::PlugMiniUs),
            0x6a => Some(Self::PlugMiniJp),
            0x6f => Some(Self::Lock),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Self::Bot => 0x48,
            Self::Meter => 0x54,
            Self::MeterPlus => 0x69,
            Self::OutdoorMeter => 0x77,
            Self::Motion => 0x73,
            Self::Contact => 0x64,
            Self::PlugMiniUs => 0x67,
            Self::PlugMiniJp => 0x6a,
            Self::Lock => 0x6f,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LightLevel {
    Dark,
    Bright,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DoorState {
    Closed,
    Open,
    TimeoutNotClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BleLockState {
    Locked,
    Unlocked,
    Locking,
    Unlocking,
    LockingStop,
    UnlockingStop,
    NotFullyLocked,
}

/// Typed service-data record, one variant per model family.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "model", rename_all = "camelCase")]
pub enum ServiceData {
    Bot {
        switch_mode: bool,
        on: bool,
        battery: Option<u8>,
    },
    Meter {
        temperature_c: f64,
        humidity: u8,
        battery: Option<u8>,
    },
    Motion {
        movement: bool,
        battery: Option<u8>,
        light_level: Option<LightLevel>,
    },
    Contact {
        movement: bool,
        battery: Option<u8>,
        door: DoorState,
        light_level: LightLevel,
    },
    PlugMini {
        on: bool,
        power_watts: f64,
    },
    Lock {
        battery: Option<u8>,
        calibrated: bool,
        state: BleLockState,
        door_open: bool,
    },
}

/// One decoded advertisement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Advertisement {
    pub address: MacAddr6,
    pub model: BleModel,
    pub rssi: Option<i16>,
    pub data: ServiceData,
}

/// Decode the SwitchBot payload out of a peripheral's advertised properties.
///
/// Returns `None` for non-SwitchBot peripherals, unknown models and
/// truncated frames; the caller treats those as "not our device".
pub fn decode_advertisement(
    address: MacAddr6,
    rssi: Option<i16>,
    service_data: &HashMap<Uuid, Vec<u8>>,
    manufacturer_data: &HashMap<u16, Vec<u8>>,
) -> Option<Advertisement> {
    let service = service_data.get(&SWITCHBOT_SERVICE_DATA_UUID)?;
    let model = BleModel::from_byte(*service.first()?)?;
    let manufacturer = manufacturer_data
        .get(&SWITCHBOT_COMPANY_ID)
        .map(Vec::as_slice);

    let data = decode_service_data(model, service, manufacturer)?;
    Some(Advertisement {
        address,
        model,
        rssi,
        data,
    })
}

/// Decode raw frames for a known model.
pub fn decode_service_data(
    model: BleModel,
    service: &[u8],
    manufacturer: Option<&[u8]>,
) -> Option<ServiceData> {
    match model {
        BleModel::Bot => {
            let [_, b1, b2, ..] = *service else { return None };
            Some(ServiceData::Bot {
                switch_mode: b1 & 0x80 != 0,
                on: b1 & 0x40 == 0,
                battery: Some(b2 & 0x7f),
            })
        }
        BleModel::Meter | BleModel::MeterPlus => {
            let [_, _, b2, b3, b4, b5, ..] = *service else {
                return None;
            };
            Some(ServiceData::Meter {
                temperature_c: decode_temperature(b3, b4),
                humidity: b5 & 0x7f,
                battery: Some(b2 & 0x7f),
            })
        }
        BleModel::OutdoorMeter => {
            let m = manufacturer?;
            let (&t0, &t1, &h) = (m.get(8)?, m.get(9)?, m.get(10)?);
            Some(ServiceData::Meter {
                temperature_c: decode_temperature(t0, t1),
                humidity: h & 0x7f,
                battery: service.get(2).map(|b| b & 0x7f),
            })
        }
        BleModel::Motion => {
            let [_, b1, b2, _, _, b5, ..] = *service else {
                return None;
            };
            let light_level = match b5 & 0x03 {
                1 => Some(LightLevel::Dark),
                2 => Some(LightLevel::Bright),
                _ => None,
            };
            Some(ServiceData::Motion {
                movement: b1 & 0x40 != 0,
                battery: Some(b2 & 0x7f),
                light_level,
            })
        }
        BleModel::Contact => {
            let [_, b1, b2, b3, ..] = *service else {
                return None;
            };
            let door = match (b3 >> 1) & 0x03 {
                0 => DoorState::Closed,
                1 => DoorState::Open,
                _ => DoorState::TimeoutNotClosed,
            };
            let light_level = if b3 & 0x01 == 0 {
                LightLevel::Dark
            } else {
                LightLevel::Bright
            };
            Some(ServiceData::Contact {
                movement: b1 & 0x40 != 0,
                battery: Some(b2 & 0x7f),
                door,
                light_level,
            })
        }
        BleModel::PlugMiniUs | BleModel::PlugMiniJp => {
            let m = manufacturer?;
            let (&state, &p0, &p1) = (m.get(7)?, m.get(10)?, m.get(11)?);
            let raw = u16::from_be_bytes([p0 & 0x7f, p1]);
            Some(ServiceData::PlugMini {
                on: state == 0x80,
                power_watts: f64::from(raw) / 10.0,
            })
        }
        BleModel::Lock => {
            let m = manufacturer?;
            let &b7 = m.get(7)?;
            let state = match (b7 & 0x70) >> 4 {
                0 => BleLockState::Locked,
                1 => BleLockState::Unlocked,
                2 => BleLockState::Locking,
                3 => BleLockState::Unlocking,
                4 => BleLockState::LockingStop,
                5 => BleLockState::UnlockingStop,
                _ => BleLockState::NotFullyLocked,
            };
            Some(ServiceData::Lock {
                battery: service.get(2).map(|b| b & 0x7f),
                calibrated: b7 & 0x80 != 0,
                state,
                door_open: b7 & 0x04 != 0,
            })
        }
    }
}

/// Sign bit in the high byte, integer part in its low 7 bits, tenths in
/// the low nibble of the first byte.
fn decode_temperature(decimal: u8, integral: u8) -> f64 {
    let value = f64::from(integral & 0x7f) + f64::from(decimal & 0x0f) / 10.0;
    if integral & 0x80 == 0 { -value } else { value }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn model_byte_ignores_encryption_flag() {
        assert_eq!(BleModel::from_byte(0x73), Some(BleModel::Motion));
        assert_eq!(BleModel::from_byte(0xf3), Some(BleModel::Motion));
        assert_eq!(BleModel::from_byte(0x01), None);
        assert_eq!(BleModel::Lock.as_byte(), 0x6f);
    }

    #[test]
    fn decodes_meter_temperature_and_humidity() {
        // 23.4 °C, 45 %, battery 87
        let frame = [0x54, 0x00, 87, 0x04, 0x80 | 23, 45];
        let data = decode_service_data(BleModel::Meter, &frame, None).unwrap();
        assert_eq!(
            data,
            ServiceData::Meter {
                temperature_c: 23.4,
                humidity: 45,
                battery: Some(87),
            }
        );
    }

    #[test]
    fn decodes_negative_temperature() {
        let frame = [0x54, 0x00, 50, 0x05, 3, 80];
        let Some(ServiceData::Meter { temperature_c, .. }) =
            decode_service_data(BleModel::Meter, &frame, None)
        else {
            panic!("expected meter");
        };
        assert!((temperature_c - -3.5).abs() < f64::EPSILON);
    }

    #[test]
    fn decodes_motion_with_dark_light_level() {
        let frame = [0x73, 0x40, 5, 0x00, 0x00, 0x01];
        let data = decode_service_data(BleModel::Motion, &frame, None).unwrap();
        assert_eq!(
            data,
            ServiceData::Motion {
                movement: true,
                battery: Some(5),
                light_level: Some(LightLevel::Dark),
            }
        );
    }

    #[test]
    fn decodes_contact_open_door() {
        let frame = [0x64, 0x00, 90, 0b0000_0011];
        let data = decode_service_data(BleModel::Contact, &frame, None).unwrap();
        assert_eq!(
            data,
            ServiceData::Contact {
                movement: false,
                battery: Some(90),
                door: DoorState::Open,
                light_level: LightLevel::Bright,
            }
        );
    }

    #[test]
    fn decodes_lock_state_from_manufacturer_data() {
        let service = [0x6f, 0x80, 64];
        let manufacturer = [0, 0, 0, 0, 0, 0, 1, 0b1001_0100];
        let data = decode_service_data(BleModel::Lock, &service, Some(&manufacturer)).unwrap();
        assert_eq!(
            data,
            ServiceData::Lock {
                battery: Some(64),
                calibrated: true,
                state: BleLockState::Unlocked,
                door_open: true,
            }
        );
    }

    #[test]
    fn plug_requires_manufacturer_data() {
        assert_eq!(decode_service_data(BleModel::PlugMiniUs, &[0x67], None), None);

        let manufacturer = [0, 0, 0, 0, 0, 0, 9, 0x80, 0, 0, 0x00, 0x7b];
        let data =
            decode_service_data(BleModel::PlugMiniUs, &[0x67], Some(&manufacturer)).unwrap();
        assert_eq!(
            data,
            ServiceData::PlugMini {
                on: true,
                power_watts: 12.3,
            }
        );
    }

    #[test]
    fn truncated_frames_are_rejected() {
        assert_eq!(decode_service_data(BleModel::Meter, &[0x54, 0, 1], None), None);
        assert_eq!(decode_service_data(BleModel::Bot, &[0x48], None), None);
    }

    #[test]
    fn advertisement_without_switchbot_service_data_is_ignored() {
        let addr: MacAddr6 = "AA:BB:CC:DD:EE:FF".parse().unwrap();
        assert!(decode_advertisement(addr, None, &HashMap::new(), &HashMap::new()).is_none());

        let mut service = HashMap::new();
        service.insert(SWITCHBOT_SERVICE_DATA_UUID, vec![0x48, 0x00, 77]);
        let ad = decode_advertisement(addr, Some(-60), &service, &HashMap::new()).unwrap();
        assert_eq!(ad.model, BleModel::Bot);
        assert_eq!(ad.rssi, Some(-60));
    }
}
