//! Characteristic value constants used by the accessory side.

pub const LOCK_UNSECURED: i64 = 0;
pub const LOCK_SECURED: i64 = 1;
pub const LOCK_JAMMED: i64 = 2;
pub const LOCK_UNKNOWN: i64 = 3;

/// Contact sensor: door closed.
pub const CONTACT_DETECTED: i64 = 0;
/// Contact sensor: door open.
pub const CONTACT_NOT_DETECTED: i64 = 1;

pub const BATTERY_NORMAL: i64 = 0;
pub const BATTERY_LOW: i64 = 1;
/// Below this level the low-battery flag is raised.
pub const LOW_BATTERY_THRESHOLD: i64 = 10;
pub const DEFAULT_BATTERY_LEVEL: i64 = 100;

pub const NOT_CHARGING: i64 = 0;
pub const CHARGING: i64 = 1;

pub const INACTIVE: i64 = 0;
pub const ACTIVE: i64 = 1;

pub const SWING_DISABLED: i64 = 0;
pub const SWING_ENABLED: i64 = 1;

pub const TARGET_AUTO: i64 = 0;
pub const TARGET_HEAT: i64 = 1;
pub const TARGET_COOL: i64 = 2;

pub const CURRENT_INACTIVE: i64 = 0;
pub const CURRENT_IDLE: i64 = 1;
pub const CURRENT_HEATING: i64 = 2;
pub const CURRENT_COOLING: i64 = 3;

pub const MIN_LUX: f64 = 0.0001;
pub const MAX_LUX: f64 = 100_000.0;
