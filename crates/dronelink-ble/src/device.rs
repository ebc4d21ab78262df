//! Peripherals seen by the adapter, keyed by handle id

use std::collections::HashMap;
use std::sync::Arc;

use btleplug::platform::Peripheral;
use dronelink_core::DeviceHandle;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{BleTransportError, Result};

/// Shared map from [`DeviceHandle::id`] to the platform peripheral
#[derive(Clone, Default)]
pub struct DeviceRegistry {
    peripherals: Arc<RwLock<HashMap<String, Peripheral>>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, id: String, peripheral: Peripheral) {
        let mut peripherals = self.peripherals.write().await;
        if peripherals.insert(id.clone(), peripheral).is_none() {
            debug!("Registered peripheral {}", id);
        }
    }

    /// Look up the peripheral behind a handle
    pub async fn get(&self, device: &DeviceHandle) -> Result<Peripheral> {
        self.peripherals
            .read()
            .await
            .get(&device.id)
            .cloned()
            .ok_or_else(|| BleTransportError::UnknownDevice {
                id: device.id.clone(),
            })
    }
}
