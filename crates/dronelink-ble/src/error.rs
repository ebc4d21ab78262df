//! Error types for the BLE transport

use dronelink_core::TransportError;
use thiserror::Error;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Errors specific to the btleplug transport
#[derive(Error, Debug)]
pub enum BleTransportError {
    #[error("Failed to create BLE manager: {0}")]
    ManagerInit(String),

    #[error("No BLE adapter at index {index} ({available} available)")]
    AdapterNotAvailable { index: usize, available: usize },

    #[error("Failed to scan: {0}")]
    ScanFailed(String),

    #[error("Device {name:?} not found within {timeout_ms}ms")]
    DeviceNotFound { name: String, timeout_ms: u64 },

    #[error("Device not known to this adapter: {id}")]
    UnknownDevice { id: String },

    #[error("Failed to connect to {device}: {reason}")]
    ConnectionFailed { device: String, reason: String },

    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout { timeout_ms: u64 },

    #[error("Failed to discover services: {0}")]
    ServiceDiscoveryFailed(String),

    #[error("Characteristic not found: {characteristic}")]
    CharacteristicNotFound { characteristic: String },

    #[error("Failed to write to characteristic: {0}")]
    WriteFailed(String),

    #[error("Failed to read characteristic: {0}")]
    ReadFailed(String),

    #[error("Failed to subscribe to notifications: {0}")]
    SubscriptionFailed(String),

    #[error("Failed to get notifications stream: {0}")]
    NotificationStreamFailed(String),

    #[error("Failed to disconnect: {0}")]
    DisconnectFailed(String),

    #[error("Failed to get BLE events: {0}")]
    EventStreamFailed(String),
}

/// Result type for btleplug transport internals
pub type Result<T> = core::result::Result<T, BleTransportError>;

impl From<BleTransportError> for TransportError {
    fn from(err: BleTransportError) -> Self {
        let reason = err.to_string();
        match err {
            BleTransportError::ManagerInit(_) | BleTransportError::AdapterNotAvailable { .. } => {
                TransportError::AdapterUnavailable { reason }
            }
            BleTransportError::ScanFailed(_) | BleTransportError::EventStreamFailed(_) => {
                TransportError::ScanFailed { reason }
            }
            BleTransportError::DeviceNotFound { name, .. } => TransportError::DeviceNotFound { name },
            BleTransportError::UnknownDevice { id } => TransportError::UnknownDevice { id },
            BleTransportError::ConnectionFailed { device, reason } => {
                TransportError::ConnectionFailed { device, reason }
            }
            BleTransportError::ConnectionTimeout { timeout_ms } => TransportError::Timeout {
                duration_ms: timeout_ms,
            },
            BleTransportError::ServiceDiscoveryFailed(_) => TransportError::ConnectionFailed {
                device: "peripheral".to_string(),
                reason,
            },
            BleTransportError::CharacteristicNotFound { characteristic } => {
                TransportError::CharacteristicNotFound { characteristic }
            }
            BleTransportError::WriteFailed(_) => TransportError::WriteFailed { reason },
            BleTransportError::ReadFailed(_) => TransportError::ReadFailed { reason },
            BleTransportError::SubscriptionFailed(_)
            | BleTransportError::NotificationStreamFailed(_) => {
                TransportError::SubscriptionFailed { reason }
            }
            BleTransportError::DisconnectFailed(_) => TransportError::DisconnectFailed { reason },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_keeps_category() {
        let err: TransportError = BleTransportError::ConnectionTimeout { timeout_ms: 5000 }.into();
        assert_eq!(err, TransportError::Timeout { duration_ms: 5000 });

        let err: TransportError = BleTransportError::WriteFailed("gatt busy".into()).into();
        assert_eq!(
            err,
            TransportError::WriteFailed {
                reason: "Failed to write to characteristic: gatt busy".into()
            }
        );

        let err: TransportError = BleTransportError::AdapterNotAvailable {
            index: 1,
            available: 0,
        }
        .into();
        assert!(matches!(err, TransportError::AdapterUnavailable { .. }));
    }
}
