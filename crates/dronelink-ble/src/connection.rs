//! BLE link management and characteristic I/O

use btleplug::api::{Characteristic, Peripheral as _, WriteType};
use btleplug::platform::Peripheral;
use dronelink_core::{DeviceHandle, GattTarget, NotificationStream};
use futures::future;
use futures::stream::StreamExt;
use tokio::time::timeout;
use tracing::{debug, error, info};

use crate::config::BleTransportConfig;
use crate::device::DeviceRegistry;
use crate::error::{BleTransportError, Result};
use crate::protocol::find_characteristic;

// ----------------------------------------------------------------------------
// Connection Management
// ----------------------------------------------------------------------------

/// Connects to discovered peripherals and moves bytes over their characteristics
pub struct BleConnection {
    config: BleTransportConfig,
    registry: DeviceRegistry,
}

impl BleConnection {
    pub fn new(config: BleTransportConfig, registry: DeviceRegistry) -> Self {
        Self { config, registry }
    }

    /// Bring the link up and resolve services and characteristics
    pub async fn connect(&self, device: &DeviceHandle) -> Result<()> {
        let peripheral = self.registry.get(device).await?;

        if peripheral.is_connected().await.unwrap_or(false) {
            debug!("{} already linked, reusing", device);
        } else {
            match timeout(self.config.connection_timeout, peripheral.connect()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!("Failed to connect to {}: {}", device, e);
                    return Err(BleTransportError::ConnectionFailed {
                        device: device.to_string(),
                        reason: e.to_string(),
                    });
                }
                Err(_) => {
                    error!("Connection to {} timed out", device);
                    return Err(BleTransportError::ConnectionTimeout {
                        timeout_ms: self.config.connection_timeout.as_millis() as u64,
                    });
                }
            }
        }

        // Some stacks report the link before the GATT table is readable
        if !self.config.settle_delay.is_zero() {
            tokio::time::sleep(self.config.settle_delay).await;
        }

        peripheral
            .discover_services()
            .await
            .map_err(|e| BleTransportError::ServiceDiscoveryFailed(e.to_string()))?;

        info!(
            "Connected to {} ({} characteristics)",
            device,
            peripheral.characteristics().len()
        );
        Ok(())
    }

    async fn resolve(
        &self,
        device: &DeviceHandle,
        target: GattTarget,
    ) -> Result<(Peripheral, Characteristic)> {
        let peripheral = self.registry.get(device).await?;
        let characteristic = find_characteristic(&peripheral.characteristics(), target)
            .ok_or_else(|| BleTransportError::CharacteristicNotFound {
                characteristic: target.to_string(),
            })?;
        Ok((peripheral, characteristic))
    }

    /// Write without response
    pub async fn write(&self, device: &DeviceHandle, target: GattTarget, payload: &[u8]) -> Result<()> {
        let (peripheral, characteristic) = self.resolve(device, target).await?;
        peripheral
            .write(&characteristic, payload, WriteType::WithoutResponse)
            .await
            .map_err(|e| BleTransportError::WriteFailed(e.to_string()))?;
        debug!("Wrote {} bytes to {}", payload.len(), device);
        Ok(())
    }

    pub async fn read(&self, device: &DeviceHandle, target: GattTarget) -> Result<Vec<u8>> {
        let (peripheral, characteristic) = self.resolve(device, target).await?;
        peripheral
            .read(&characteristic)
            .await
            .map_err(|e| BleTransportError::ReadFailed(e.to_string()))
    }

    /// Enable notifications and return only this characteristic's payloads
    pub async fn subscribe(
        &self,
        device: &DeviceHandle,
        target: GattTarget,
    ) -> Result<NotificationStream> {
        let (peripheral, characteristic) = self.resolve(device, target).await?;

        peripheral
            .subscribe(&characteristic)
            .await
            .map_err(|e| BleTransportError::SubscriptionFailed(e.to_string()))?;

        let notifications = peripheral
            .notifications()
            .await
            .map_err(|e| BleTransportError::NotificationStreamFailed(e.to_string()))?;

        let uuid = characteristic.uuid;
        debug!("Subscribed to {} on {}", target, device);
        Ok(notifications
            .filter_map(move |n| future::ready((n.uuid == uuid).then_some(n.value)))
            .boxed())
    }

    pub async fn unsubscribe(&self, device: &DeviceHandle, target: GattTarget) -> Result<()> {
        let (peripheral, characteristic) = self.resolve(device, target).await?;
        peripheral
            .unsubscribe(&characteristic)
            .await
            .map_err(|e| BleTransportError::SubscriptionFailed(e.to_string()))?;
        debug!("Unsubscribed from {} on {}", target, device);
        Ok(())
    }

    /// Release the link
    pub async fn disconnect(&self, device: &DeviceHandle) -> Result<()> {
        let peripheral = self.registry.get(device).await?;
        peripheral
            .disconnect()
            .await
            .map_err(|e| BleTransportError::DisconnectFailed(e.to_string()))?;
        info!("Disconnected from {}", device);
        Ok(())
    }
}
