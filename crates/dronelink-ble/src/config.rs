//! BLE transport configuration

use std::time::Duration;

use dronelink_core::config::duration_ms;

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Configuration for the btleplug transport
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BleTransportConfig {
    /// Maximum time to wait for the link to come up
    #[serde(with = "duration_ms", rename = "connection_timeout_ms")]
    pub connection_timeout: Duration,
    /// Pause after connecting before resolving services
    #[serde(with = "duration_ms", rename = "settle_delay_ms")]
    pub settle_delay: Duration,
    /// Which local adapter to use when several are present
    pub adapter_index: usize,
    /// Only report advertisements carrying the drone service UUID
    pub filter_by_service: bool,
}

impl Default for BleTransportConfig {
    fn default() -> Self {
        Self {
            connection_timeout: Duration::from_secs(5),
            settle_delay: Duration::from_millis(500),
            adapter_index: 0,
            filter_by_service: false,
        }
    }
}

impl BleTransportConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set connection timeout
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set the post-connect settle delay
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Select a local adapter by position
    pub fn with_adapter_index(mut self, index: usize) -> Self {
        self.adapter_index = index;
        self
    }

    /// Restrict scanning to the drone service UUID
    pub fn with_service_filter(mut self, enabled: bool) -> Self {
        self.filter_by_service = enabled;
        self
    }
}
