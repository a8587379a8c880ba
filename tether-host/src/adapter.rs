//! Wi-Fi adapter abstraction (external collaborator)
//!
//! Host platforms implement this over their native Wi-Fi stack. Calls may
//! block; the supervisor always invokes them off the core task.

use crate::error::AdapterError;

/// One network from a scan.
#[derive(Debug, Clone)]
pub struct ScanResult {
    pub ssid: String,
    pub rssi: Option<i16>,
}

/// Scan/associate primitives of the host Wi-Fi interface.
///
/// Link-change and scan-cache-updated events are delivered separately,
/// through the core [`Handle`](crate::Handle).
pub trait WifiAdapter: Send + Sync + 'static {
    /// Scan for networks, optionally filtered to one SSID.
    fn scan(&self, ssid_filter: Option<&str>) -> Result<Vec<ScanResult>, AdapterError>;

    /// Join a network.
    fn associate(&self, ssid: &str, password: &str) -> Result<(), AdapterError>;

    /// Leave the current network.
    fn disassociate(&self) -> Result<(), AdapterError>;

    /// SSID of the currently joined network, if any.
    fn current_ssid(&self) -> Option<String>;
}
