//! GATT layout and discovery defaults shared by every transport

use std::time::Duration;

use uuid::Uuid;

// ----------------------------------------------------------------------------
// BLE Service and Characteristic UUIDs
// ----------------------------------------------------------------------------

/// Drone control service UUID (Nordic UART Service layout)
pub const DRONE_SERVICE_UUID: Uuid = Uuid::from_u128(0x6E400001_B5A3_F393_E0A9_E50E24DCCA9E);

/// Characteristic the controller writes commands to
pub const COMMAND_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x6E400002_B5A3_F393_E0A9_E50E24DCCA9E);

/// Characteristic the drone pushes status text on
pub const STATUS_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x6E400003_B5A3_F393_E0A9_E50E24DCCA9E);

// ----------------------------------------------------------------------------
// Discovery Defaults
// ----------------------------------------------------------------------------

/// Advertised local name of the flight computer
pub const DEFAULT_DEVICE_NAME: &str = "RaspberryPiDrone";

/// Bounded wait for name discovery during `connect()`
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(10);

/// Listening window for a plain device scan
pub const DEFAULT_SCAN_WINDOW: Duration = Duration::from_secs(5);

/// Throttle step used by up/down controls
pub const THROTTLE_STEP: u8 = 10;

/// Motor offset bounds accepted by the flight controller
pub const MOTOR_OFFSET_RANGE: std::ops::RangeInclusive<i16> = -200..=200;

// ----------------------------------------------------------------------------
// GATT Targets
// ----------------------------------------------------------------------------

/// A characteristic addressed within a service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GattTarget {
    pub service: Uuid,
    pub characteristic: Uuid,
}

impl GattTarget {
    pub const fn new(service: Uuid, characteristic: Uuid) -> Self {
        Self {
            service,
            characteristic,
        }
    }
}

impl std::fmt::Display for GattTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.service, self.characteristic)
    }
}
