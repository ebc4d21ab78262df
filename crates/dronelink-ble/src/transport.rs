//! [`DroneTransport`] over btleplug

use std::time::Duration;

use async_trait::async_trait;
use dronelink_core::{
    AdapterState, DeviceHandle, DroneTransport, GattTarget, NotificationStream, TransportResult,
};
use tokio::sync::watch;

use crate::config::BleTransportConfig;
use crate::connection::BleConnection;
use crate::device::DeviceRegistry;
use crate::discovery::BleDiscovery;
use crate::error::Result;

/// BLE central transport backed by the platform Bluetooth stack
pub struct BtleplugTransport {
    discovery: BleDiscovery,
    connection: BleConnection,
}

impl BtleplugTransport {
    /// Open the configured adapter
    pub async fn new(config: BleTransportConfig) -> Result<Self> {
        let registry = DeviceRegistry::new();
        let discovery = BleDiscovery::initialize(config.clone(), registry.clone()).await?;
        let connection = BleConnection::new(config, registry);
        Ok(Self {
            discovery,
            connection,
        })
    }
}

#[async_trait]
impl DroneTransport for BtleplugTransport {
    async fn adapter_state(&self) -> AdapterState {
        self.discovery.adapter_state().await
    }

    fn subscribe_adapter_state(&self) -> watch::Receiver<AdapterState> {
        self.discovery.subscribe_adapter_state()
    }

    async fn scan(&self, window: Duration) -> TransportResult<Vec<DeviceHandle>> {
        Ok(self.discovery.scan(window).await?)
    }

    async fn discover_by_name(
        &self,
        name: &str,
        timeout: Duration,
    ) -> TransportResult<DeviceHandle> {
        Ok(self.discovery.discover_by_name(name, timeout).await?)
    }

    async fn stop_scan(&self) -> TransportResult<()> {
        Ok(self.discovery.stop_scan().await?)
    }

    async fn connect(&self, device: &DeviceHandle) -> TransportResult<()> {
        Ok(self.connection.connect(device).await?)
    }

    async fn write(
        &self,
        device: &DeviceHandle,
        target: GattTarget,
        payload: &[u8],
    ) -> TransportResult<()> {
        Ok(self.connection.write(device, target, payload).await?)
    }

    async fn read(&self, device: &DeviceHandle, target: GattTarget) -> TransportResult<Vec<u8>> {
        Ok(self.connection.read(device, target).await?)
    }

    async fn subscribe(
        &self,
        device: &DeviceHandle,
        target: GattTarget,
    ) -> TransportResult<NotificationStream> {
        Ok(self.connection.subscribe(device, target).await?)
    }

    async fn unsubscribe(&self, device: &DeviceHandle, target: GattTarget) -> TransportResult<()> {
        Ok(self.connection.unsubscribe(device, target).await?)
    }

    async fn disconnect(&self, device: &DeviceHandle) -> TransportResult<()> {
        Ok(self.connection.disconnect(device).await?)
    }
}
