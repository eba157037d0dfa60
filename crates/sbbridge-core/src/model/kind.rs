use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use sbbridge_api::BleModel;

use super::Field;

/// Device archetype. Selects the decode/encode/offline strategy.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum DeviceKind {
    Lock,
    Motion,
    Contact,
    Meter,
    Plug,
    Bot,
    RobotVacuumCleaner,
    // ── IR remotes (cloud only, no status) ──
    AirConditioner,
    Fan,
    Light,
    WaterHeater,
    Others,
}

impl DeviceKind {
    /// Map a cloud `deviceType` / `remoteType` string to an archetype.
    pub fn from_vendor_type(s: &str) -> Option<Self> {
        let kind = match s {
            "Smart Lock" | "Smart Lock Pro" | "Smart Lock Ultra" => Self::Lock,
            "Motion Sensor" => Self::Motion,
            "Contact Sensor" => Self::Contact,
            "Meter" | "MeterPlus" | "Meter Plus" | "WoIOSensor" | "MeterPro" | "Hub 2" => {
                Self::Meter
            }
            "Plug" | "Plug Mini (US)" | "Plug Mini (JP)" => Self::Plug,
            "Bot" => Self::Bot,
            "Robot Vacuum Cleaner S1"
            | "Robot Vacuum Cleaner S1 Plus"
            | "K10+"
            | "K10+ Pro"
            | "Robot Vacuum Cleaner S10" => Self::RobotVacuumCleaner,
            "Air Conditioner" | "DIY Air Conditioner" => Self::AirConditioner,
            "Fan" | "DIY Fan" => Self::Fan,
            "Light" | "DIY Light" => Self::Light,
            "Water Heater" | "DIY Water Heater" => Self::WaterHeater,
            "Others" | "Others/DIY" => Self::Others,
            _ => return None,
        };
        Some(kind)
    }

    /// IR remotes are driven through a hub and never report status.
    pub fn is_ir(self) -> bool {
        matches!(
            self,
            Self::AirConditioner | Self::Fan | Self::Light | Self::WaterHeater | Self::Others
        )
    }

    /// Whether the device reports a battery level.
    pub fn has_battery(self) -> bool {
        matches!(
            self,
            Self::Lock
                | Self::Motion
                | Self::Contact
                | Self::Meter
                | Self::Bot
                | Self::RobotVacuumCleaner
        )
    }

    /// Advertised BLE models that belong to this archetype.
    pub fn ble_models(self) -> &'static [BleModel] {
        match self {
            Self::Lock => &[BleModel::Lock],
            Self::Motion => &[BleModel::Motion],
            Self::Contact => &[BleModel::Contact],
            Self::Meter => &[BleModel::Meter, BleModel::MeterPlus, BleModel::OutdoorMeter],
            Self::Plug => &[BleModel::PlugMiniUs, BleModel::PlugMiniJp],
            Self::Bot => &[BleModel::Bot],
            _ => &[],
        }
    }

    /// The characteristic that represents the device on the accessory.
    pub fn primary_field(self) -> Field {
        match self {
            Self::Lock => Field::LockCurrentState,
            Self::Motion => Field::MotionDetected,
            Self::Contact => Field::ContactSensorState,
            Self::Meter => Field::CurrentTemperature,
            Self::AirConditioner | Self::Fan | Self::WaterHeater => Field::Active,
            Self::Plug | Self::Bot | Self::RobotVacuumCleaner | Self::Light | Self::Others => {
                Field::On
            }
        }
    }

    /// Characteristics the accessory may write.
    pub fn writable_fields(self) -> &'static [Field] {
        match self {
            Self::Lock => &[Field::LockTargetState],
            Self::Motion | Self::Contact | Self::Meter => &[],
            Self::Plug | Self::Bot | Self::Others => &[Field::On],
            Self::RobotVacuumCleaner => &[Field::On, Field::RotationSpeed],
            Self::AirConditioner => &[
                Field::Active,
                Field::TargetHeaterCoolerState,
                Field::CoolingThresholdTemperature,
                Field::RotationSpeed,
            ],
            Self::Fan => &[Field::Active, Field::RotationSpeed, Field::SwingMode],
            Self::Light => &[Field::On, Field::Brightness],
            Self::WaterHeater => &[Field::Active],
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn parses_config_names() {
        assert_eq!(DeviceKind::from_str("lock").unwrap(), DeviceKind::Lock);
        assert_eq!(
            DeviceKind::from_str("robot-vacuum-cleaner").unwrap(),
            DeviceKind::RobotVacuumCleaner
        );
        assert_eq!(DeviceKind::AirConditioner.to_string(), "air-conditioner");
    }

    #[test]
    fn vendor_types_map_to_archetypes() {
        assert_eq!(DeviceKind::from_vendor_type("Smart Lock"), Some(DeviceKind::Lock));
        assert_eq!(DeviceKind::from_vendor_type("DIY Fan"), Some(DeviceKind::Fan));
        assert_eq!(DeviceKind::from_vendor_type("Curtain3"), None);
    }

    #[test]
    fn ir_remotes_have_no_ble_models() {
        assert!(DeviceKind::Fan.is_ir());
        assert!(DeviceKind::Fan.ble_models().is_empty());
        assert!(!DeviceKind::Lock.is_ir());
    }
}
