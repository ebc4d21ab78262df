//! Mapping between btleplug types and the drone link's types

use std::collections::BTreeSet;

use btleplug::api::{CentralState, Characteristic, PeripheralProperties};
use dronelink_core::{AdapterState, DeviceHandle, GattTarget};

/// Map the platform radio state onto [`AdapterState`]
///
/// btleplug reports fewer states than CoreBluetooth; anything it cannot
/// name is `Unknown`, which is treated as not ready.
pub fn adapter_state_from(state: CentralState) -> AdapterState {
    match state {
        CentralState::PoweredOn => AdapterState::PoweredOn,
        CentralState::PoweredOff => AdapterState::PoweredOff,
        _ => AdapterState::Unknown,
    }
}

/// Discovery filter: the advertised local name must equal `wanted` exactly
pub fn matches_name(local_name: Option<&str>, wanted: &str) -> bool {
    local_name == Some(wanted)
}

/// Build a handle from a peripheral's id and advertisement
pub fn device_handle(id: String, properties: &PeripheralProperties) -> DeviceHandle {
    let name = properties
        .local_name
        .clone()
        .unwrap_or_else(|| id.clone());
    let handle = DeviceHandle::new(id, name);
    match properties.rssi {
        Some(rssi) => handle.with_rssi(rssi),
        None => handle,
    }
}

/// Find the characteristic addressed by `target`
pub fn find_characteristic(
    characteristics: &BTreeSet<Characteristic>,
    target: GattTarget,
) -> Option<Characteristic> {
    characteristics
        .iter()
        .find(|c| c.uuid == target.characteristic && c.service_uuid == target.service)
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_filter_is_exact() {
        assert!(matches_name(Some("RaspberryPiDrone"), "RaspberryPiDrone"));
        assert!(!matches_name(Some("RaspberryPiDrone2"), "RaspberryPiDrone"));
        assert!(!matches_name(Some("raspberrypidrone"), "RaspberryPiDrone"));
        assert!(!matches_name(None, "RaspberryPiDrone"));
    }

    #[test]
    fn test_adapter_state_mapping() {
        assert_eq!(adapter_state_from(CentralState::PoweredOn), AdapterState::PoweredOn);
        assert_eq!(adapter_state_from(CentralState::PoweredOff), AdapterState::PoweredOff);
        assert_eq!(adapter_state_from(CentralState::Unknown), AdapterState::Unknown);
    }

    #[test]
    fn test_device_handle_falls_back_to_id() {
        let properties = PeripheralProperties {
            rssi: Some(-70),
            ..Default::default()
        };
        let handle = device_handle("hci0/dev_AA".to_string(), &properties);
        assert_eq!(handle.name, "hci0/dev_AA");
        assert_eq!(handle.rssi, Some(-70));
    }
}
