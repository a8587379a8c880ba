//! Tether Host Library
//!
//! The desktop half of phone tethering: pairs with a companion phone over a
//! BLE peripheral service and supervises the connection to its Wi-Fi
//! hotspot.
//!
//! This crate provides:
//! - A single-task core ([`HostCore`]) that owns all connection state and
//!   is driven through a cloneable [`Handle`]
//! - Traits for the platform pieces it does not own: the peripheral radio
//!   ([`PeripheralLink`]), the Wi-Fi interface ([`WifiAdapter`]) and
//!   settings persistence ([`SettingsStore`])
//! - The pairing session and settings layers shared by UIs and the CLI
//!
//! Wire-format types (command frames, the crypto codec, pairing payloads)
//! live in `tether-proto`.

pub mod adapter;
pub mod core;
pub mod error;
pub mod session;
pub mod settings;
pub mod state;
pub mod supervisor;
pub mod transport;

mod protocol;
#[cfg(test)]
mod testkit;

pub use adapter::{ScanResult, WifiAdapter};
pub use core::{Handle, HostCore};
pub use error::{AdapterError, HostError};
pub use session::PairingSession;
pub use settings::{
    FileStore, HotspotCredentials, MemoryStore, Settings, SettingsStore, TrustedNetwork,
};
pub use state::{
    ConnectionState, HotspotState, LinkState, PairingPhase, PhoneTelemetry, TransportPower,
};
pub use supervisor::Notice;
pub use transport::PeripheralLink;
