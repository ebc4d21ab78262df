//! BLE adapter setup, power-state tracking and device discovery

use std::cmp::Reverse;
use std::sync::Arc;
use std::time::Duration;

use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use dronelink_core::{AdapterState, DeviceHandle, DRONE_SERVICE_UUID};
use futures::stream::{Stream, StreamExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::config::BleTransportConfig;
use crate::device::DeviceRegistry;
use crate::error::{BleTransportError, Result};
use crate::protocol::{adapter_state_from, device_handle, matches_name};

// ----------------------------------------------------------------------------
// Discovery Implementation
// ----------------------------------------------------------------------------

/// Owns the local adapter and finds drones advertising by name
pub struct BleDiscovery {
    config: BleTransportConfig,
    adapter: Adapter,
    registry: DeviceRegistry,
    state_tx: Arc<watch::Sender<AdapterState>>,
    state_watcher: JoinHandle<()>,
}

impl BleDiscovery {
    /// Open the configured adapter and start tracking its power state
    pub async fn initialize(config: BleTransportConfig, registry: DeviceRegistry) -> Result<Self> {
        let manager = Manager::new()
            .await
            .map_err(|e| BleTransportError::ManagerInit(e.to_string()))?;

        let adapters = manager
            .adapters()
            .await
            .map_err(|e| BleTransportError::ManagerInit(e.to_string()))?;

        let available = adapters.len();
        let adapter = adapters
            .into_iter()
            .nth(config.adapter_index)
            .ok_or(BleTransportError::AdapterNotAvailable {
                index: config.adapter_index,
                available,
            })?;

        let initial = match adapter.adapter_state().await {
            Ok(state) => adapter_state_from(state),
            Err(e) => {
                warn!("Could not read BLE adapter state: {}", e);
                AdapterState::Unknown
            }
        };
        let (state_tx, _) = watch::channel(initial);
        let state_tx = Arc::new(state_tx);

        let events = adapter
            .events()
            .await
            .map_err(|e| BleTransportError::EventStreamFailed(e.to_string()))?;
        let state_watcher = tokio::spawn(watch_adapter_state(events, Arc::clone(&state_tx)));

        info!("BLE adapter initialized (state: {})", initial);
        Ok(Self {
            config,
            adapter,
            registry,
            state_tx,
            state_watcher,
        })
    }

    /// Query the adapter, publishing the result if it changed
    pub async fn adapter_state(&self) -> AdapterState {
        match self.adapter.adapter_state().await {
            Ok(state) => {
                let state = adapter_state_from(state);
                self.state_tx.send_if_modified(|current| {
                    let changed = *current != state;
                    *current = state;
                    changed
                });
                state
            }
            Err(e) => {
                debug!("Adapter state query failed, using last known: {}", e);
                *self.state_tx.borrow()
            }
        }
    }

    pub fn subscribe_adapter_state(&self) -> watch::Receiver<AdapterState> {
        self.state_tx.subscribe()
    }

    fn scan_filter(&self) -> ScanFilter {
        let services = if self.config.filter_by_service {
            vec![DRONE_SERVICE_UUID]
        } else {
            Vec::new()
        };
        ScanFilter { services }
    }

    async fn start_scan(&self) -> Result<()> {
        self.adapter
            .start_scan(self.scan_filter())
            .await
            .map_err(|e| BleTransportError::ScanFailed(format!("Failed to start BLE scan: {}", e)))?;
        debug!("Started BLE scan");
        Ok(())
    }

    /// Stop scanning
    pub async fn stop_scan(&self) -> Result<()> {
        self.adapter
            .stop_scan()
            .await
            .map_err(|e| BleTransportError::ScanFailed(format!("Failed to stop BLE scan: {}", e)))?;
        debug!("Stopped BLE scan");
        Ok(())
    }

    async fn stop_scan_logged(&self) {
        if let Err(e) = self.stop_scan().await {
            warn!("{}", e);
        }
    }

    /// Scan until a peripheral advertising `name` appears or `timeout` elapses
    pub async fn discover_by_name(&self, name: &str, timeout: Duration) -> Result<DeviceHandle> {
        let deadline = Instant::now() + timeout;
        let mut events = self
            .adapter
            .events()
            .await
            .map_err(|e| BleTransportError::EventStreamFailed(e.to_string()))?;
        self.start_scan().await?;

        // A cached peripheral may already match
        if let Some(device) = self.find_known(name).await {
            self.stop_scan_logged().await;
            return Ok(device);
        }

        loop {
            match timeout_at(deadline, events.next()).await {
                Ok(Some(CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id))) => {
                    if let Some(device) = self.check_peripheral(&id, name).await {
                        self.stop_scan_logged().await;
                        return Ok(device);
                    }
                }
                Ok(Some(_)) => {}
                Ok(None) => {
                    warn!("BLE event stream closed during discovery");
                    break;
                }
                Err(_) => break,
            }
        }

        self.stop_scan_logged().await;
        Err(BleTransportError::DeviceNotFound {
            name: name.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        })
    }

    /// List every peripheral heard during `window`, strongest signal first
    pub async fn scan(&self, window: Duration) -> Result<Vec<DeviceHandle>> {
        self.start_scan().await?;
        tokio::time::sleep(window).await;
        self.stop_scan().await?;

        let peripherals = self
            .adapter
            .peripherals()
            .await
            .map_err(|e| BleTransportError::ScanFailed(e.to_string()))?;

        let mut devices = Vec::with_capacity(peripherals.len());
        for peripheral in peripherals {
            let Ok(Some(properties)) = peripheral.properties().await else {
                continue;
            };
            let handle = device_handle(peripheral.id().to_string(), &properties);
            self.registry.insert(handle.id.clone(), peripheral).await;
            devices.push(handle);
        }
        devices.sort_by_key(|d| Reverse(d.rssi));
        info!("Scan heard {} device(s)", devices.len());
        Ok(devices)
    }

    async fn find_known(&self, name: &str) -> Option<DeviceHandle> {
        let peripherals = self.adapter.peripherals().await.unwrap_or_default();
        for peripheral in peripherals {
            if let Some(device) = self.match_peripheral(peripheral, name).await {
                return Some(device);
            }
        }
        None
    }

    async fn check_peripheral(&self, id: &PeripheralId, name: &str) -> Option<DeviceHandle> {
        let peripheral = self.adapter.peripheral(id).await.ok()?;
        self.match_peripheral(peripheral, name).await
    }

    async fn match_peripheral(&self, peripheral: Peripheral, name: &str) -> Option<DeviceHandle> {
        let properties = peripheral.properties().await.ok().flatten()?;
        if !matches_name(properties.local_name.as_deref(), name) {
            return None;
        }
        let device = device_handle(peripheral.id().to_string(), &properties);
        info!("Discovered {} (rssi {:?})", device, device.rssi);
        self.registry.insert(device.id.clone(), peripheral).await;
        Some(device)
    }
}

impl Drop for BleDiscovery {
    fn drop(&mut self) {
        self.state_watcher.abort();
    }
}

/// Publish `StateUpdate` events until the adapter's event stream ends
async fn watch_adapter_state<S>(mut events: S, state_tx: Arc<watch::Sender<AdapterState>>)
where
    S: Stream<Item = CentralEvent> + Unpin,
{
    while let Some(event) = events.next().await {
        if let CentralEvent::StateUpdate(state) = event {
            let state = adapter_state_from(state);
            info!("BLE adapter state changed: {}", state);
            state_tx.send_replace(state);
        }
    }
    debug!("BLE adapter event stream ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use btleplug::api::CentralState;
    use futures::stream;

    #[test]
    fn test_state_updates_are_published() {
        let (state_tx, rx) = watch::channel(AdapterState::PoweredOn);
        let events = stream::iter(vec![
            CentralEvent::StateUpdate(CentralState::PoweredOff),
            CentralEvent::StateUpdate(CentralState::PoweredOn),
            CentralEvent::StateUpdate(CentralState::PoweredOff),
        ]);

        tokio_test::block_on(watch_adapter_state(events, Arc::new(state_tx)));

        assert_eq!(*rx.borrow(), AdapterState::PoweredOff);
    }
}
