//! Shared fakes for unit tests. Compiled only under `cfg(test)`.

use std::sync::{Arc, Mutex, MutexGuard};

use tether_proto::Notification;
use uuid::Uuid;

use crate::adapter::{ScanResult, WifiAdapter};
use crate::error::AdapterError;
use crate::transport::PeripheralLink;

#[derive(Debug, Default)]
pub(crate) struct MockLinkState {
    pub sent: Vec<Notification>,
    pub busy: bool,
    pub starts: u32,
    pub stops: u32,
    pub advertised: Option<Uuid>,
}

/// Records every call; `busy` makes `notify` report a full link.
#[derive(Clone, Default)]
pub(crate) struct MockLink {
    inner: Arc<Mutex<MockLinkState>>,
}

impl MockLink {
    pub fn state(&self) -> MutexGuard<'_, MockLinkState> {
        self.inner.lock().unwrap()
    }

    pub fn set_busy(&self, busy: bool) {
        self.state().busy = busy;
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.state().sent.clone()
    }
}

impl PeripheralLink for MockLink {
    fn start_advertising(&mut self, service_id: Uuid) {
        let mut state = self.state();
        state.starts += 1;
        state.advertised = Some(service_id);
    }

    fn stop_advertising(&mut self) {
        let mut state = self.state();
        state.stops += 1;
        state.advertised = None;
    }

    fn notify(&mut self, notification: Notification) -> bool {
        let mut state = self.state();
        if state.busy {
            return false;
        }
        state.sent.push(notification);
        true
    }
}

#[derive(Debug, Default)]
pub(crate) struct MockWifiState {
    /// Networks the next scans will report.
    pub visible: Vec<String>,
    pub current: Option<String>,
    pub fail_scan: bool,
    pub fail_associate: bool,
    pub scans: u32,
    pub associates: Vec<(String, String)>,
    pub disassociates: u32,
}

/// In-memory Wi-Fi adapter. `associate` joins whatever it is asked to join
/// unless told to fail.
#[derive(Clone, Default)]
pub(crate) struct MockWifi {
    inner: Arc<Mutex<MockWifiState>>,
}

impl MockWifi {
    pub fn state(&self) -> MutexGuard<'_, MockWifiState> {
        self.inner.lock().unwrap()
    }

    pub fn set_visible(&self, ssids: &[&str]) {
        self.state().visible = ssids.iter().map(|s| s.to_string()).collect();
    }

    pub fn set_current(&self, ssid: Option<&str>) {
        self.state().current = ssid.map(str::to_string);
    }
}

impl WifiAdapter for MockWifi {
    fn scan(&self, ssid_filter: Option<&str>) -> Result<Vec<ScanResult>, AdapterError> {
        let mut state = self.state();
        state.scans += 1;
        if state.fail_scan {
            return Err(AdapterError::ScanFailed("scan unavailable".into()));
        }
        Ok(state
            .visible
            .iter()
            .filter(|ssid| ssid_filter.is_none_or(|f| f == ssid.as_str()))
            .map(|ssid| ScanResult {
                ssid: ssid.clone(),
                rssi: None,
            })
            .collect())
    }

    fn associate(&self, ssid: &str, password: &str) -> Result<(), AdapterError> {
        let mut state = self.state();
        state
            .associates
            .push((ssid.to_string(), password.to_string()));
        if state.fail_associate {
            return Err(AdapterError::AssociateFailed("refused".into()));
        }
        state.current = Some(ssid.to_string());
        Ok(())
    }

    fn disassociate(&self) -> Result<(), AdapterError> {
        let mut state = self.state();
        state.disassociates += 1;
        state.current = None;
        Ok(())
    }

    fn current_ssid(&self) -> Option<String> {
        self.state().current.clone()
    }
}
