//! Persisted settings - abstract key-value store and a typed view over it
//!
//! The GUI layer owns richer preference UX; the core only needs string
//! key-value persistence. `FileStore` keeps the map in a JSON file,
//! `MemoryStore` backs tests.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use log::warn;
use uuid::Uuid;

/// Abstract key-value persistence (external collaborator).
pub trait SettingsStore: Send + 'static {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
    fn remove(&mut self, key: &str);
}

mod keys {
    pub const SERVICE_ID: &str = "service_identifier";
    pub const SHARED_SECRET: &str = "shared_secret";
    pub const REMOTE_ENDPOINT: &str = "remote_endpoint_id";
    pub const SETUP_COMPLETE: &str = "setup_complete";
    pub const HOTSPOT_SSID: &str = "hotspot_ssid";
    pub const HOTSPOT_PASSWORD: &str = "hotspot_password";
    pub const TRUSTED_NAMES: &str = "trusted_network_names";
    pub const TRUSTED_PASSWORDS: &str = "trusted_network_passwords";
    pub const AUTO_CONNECT: &str = "auto_connect";
    pub const SLEEP_DISCONNECT: &str = "sleep_disconnect";
    pub const MIN_BATTERY: &str = "min_battery";
    pub const TELEMETRY_VISIBLE: &str = "telemetry_visible";
}

/// The companion phone's hotspot credentials, shared over the paired link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotspotCredentials {
    pub ssid: String,
    pub password: String,
}

/// A user-managed Wi-Fi network preferred over the hotspot when visible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedNetwork {
    pub ssid: String,
    pub password: String,
}

/// Typed accessors over a [`SettingsStore`].
pub struct Settings<S: SettingsStore> {
    store: S,
}

impl<S: SettingsStore> Settings<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn service_id(&self) -> Option<Uuid> {
        self.store.get(keys::SERVICE_ID)?.parse().ok()
    }

    pub fn shared_secret(&self) -> Option<String> {
        self.store.get(keys::SHARED_SECRET)
    }

    pub fn remote_endpoint(&self) -> Option<String> {
        self.store.get(keys::REMOTE_ENDPOINT)
    }

    pub fn set_session(&mut self, service_id: Uuid, shared_secret: &str) {
        self.store.set(keys::SERVICE_ID, &service_id.to_string());
        self.store.set(keys::SHARED_SECRET, shared_secret);
        self.store.remove(keys::REMOTE_ENDPOINT);
        self.store.remove(keys::SETUP_COMPLETE);
    }

    pub fn set_remote_endpoint(&mut self, id: &str) {
        self.store.set(keys::REMOTE_ENDPOINT, id);
    }

    pub fn setup_complete(&self) -> bool {
        self.get_bool(keys::SETUP_COMPLETE, false)
    }

    pub fn set_setup_complete(&mut self, v: bool) {
        self.set_bool(keys::SETUP_COMPLETE, v);
    }

    pub fn hotspot_credentials(&self) -> Option<HotspotCredentials> {
        let ssid = self.store.get(keys::HOTSPOT_SSID)?;
        let password = self.store.get(keys::HOTSPOT_PASSWORD)?;
        Some(HotspotCredentials { ssid, password })
    }

    pub fn set_hotspot_credentials(&mut self, creds: &HotspotCredentials) {
        self.store.set(keys::HOTSPOT_SSID, &creds.ssid);
        self.store.set(keys::HOTSPOT_PASSWORD, &creds.password);
    }

    /// Trusted networks are persisted as parallel name/password arrays.
    pub fn trusted_networks(&self) -> Vec<TrustedNetwork> {
        let names = self.get_list(keys::TRUSTED_NAMES);
        let passwords = self.get_list(keys::TRUSTED_PASSWORDS);
        names
            .into_iter()
            .zip(passwords)
            .map(|(ssid, password)| TrustedNetwork { ssid, password })
            .collect()
    }

    pub fn set_trusted_networks(&mut self, networks: &[TrustedNetwork]) {
        let names: Vec<&str> = networks.iter().map(|n| n.ssid.as_str()).collect();
        let passwords: Vec<&str> = networks.iter().map(|n| n.password.as_str()).collect();
        self.set_list(keys::TRUSTED_NAMES, &names);
        self.set_list(keys::TRUSTED_PASSWORDS, &passwords);
    }

    pub fn auto_connect(&self) -> bool {
        self.get_bool(keys::AUTO_CONNECT, true)
    }

    pub fn set_auto_connect(&mut self, v: bool) {
        self.set_bool(keys::AUTO_CONNECT, v);
    }

    pub fn sleep_disconnect(&self) -> bool {
        self.get_bool(keys::SLEEP_DISCONNECT, true)
    }

    pub fn set_sleep_disconnect(&mut self, v: bool) {
        self.set_bool(keys::SLEEP_DISCONNECT, v);
    }

    /// Battery threshold (raw percent) below which the hotspot is dropped.
    pub fn min_battery(&self) -> i8 {
        self.store
            .get(keys::MIN_BATTERY)
            .and_then(|v| v.parse().ok())
            .unwrap_or(20)
    }

    pub fn set_min_battery(&mut self, v: i8) {
        self.store.set(keys::MIN_BATTERY, &v.to_string());
    }

    pub fn telemetry_visible(&self) -> bool {
        self.get_bool(keys::TELEMETRY_VISIBLE, true)
    }

    pub fn set_telemetry_visible(&mut self, v: bool) {
        self.set_bool(keys::TELEMETRY_VISIBLE, v);
    }

    /// Full unlink: forget the session, the bound endpoint and the hotspot
    /// credentials. Trusted networks and preferences survive.
    pub fn clear_session(&mut self) {
        for key in [
            keys::SERVICE_ID,
            keys::SHARED_SECRET,
            keys::REMOTE_ENDPOINT,
            keys::SETUP_COMPLETE,
            keys::HOTSPOT_SSID,
            keys::HOTSPOT_PASSWORD,
        ] {
            self.store.remove(key);
        }
    }

    fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.store.get(key).as_deref() {
            Some("true") => true,
            Some("false") => false,
            _ => default,
        }
    }

    fn set_bool(&mut self, key: &str, v: bool) {
        self.store.set(key, if v { "true" } else { "false" });
    }

    fn get_list(&self, key: &str) -> Vec<String> {
        self.store
            .get(key)
            .and_then(|v| serde_json::from_str(&v).ok())
            .unwrap_or_default()
    }

    fn set_list(&mut self, key: &str, items: &[&str]) {
        let json = serde_json::to_string(items).expect("string list serializes");
        self.store.set(key, &json);
    }
}

/// In-memory store for tests.
#[derive(Default)]
pub struct MemoryStore {
    map: HashMap<String, String>,
}

impl SettingsStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.map.insert(key.to_string(), value.to_string());
    }

    fn remove(&mut self, key: &str) {
        self.map.remove(key);
    }
}

/// JSON-file-backed store, written through on every mutation.
pub struct FileStore {
    path: PathBuf,
    map: HashMap<String, String>,
}

impl FileStore {
    /// Load the store from `path`, or start empty if it does not exist or
    /// cannot be parsed.
    pub fn load(path: PathBuf) -> Self {
        let map = fs::read_to_string(&path)
            .ok()
            .and_then(|data| serde_json::from_str(&data).ok())
            .unwrap_or_default();
        Self { path, map }
    }

    fn save(&self) {
        if let Some(parent) = self.path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!("failed to create settings directory: {e}");
                return;
            }
        }
        let data = serde_json::to_string_pretty(&self.map).expect("settings map serializes");
        if let Err(e) = fs::write(&self.path, data) {
            warn!("failed to write settings file: {e}");
        }
    }
}

impl SettingsStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.map.insert(key.to_string(), value.to_string());
        self.save();
    }

    fn remove(&mut self, key: &str) {
        if self.map.remove(key).is_some() {
            self.save();
        }
    }
}
