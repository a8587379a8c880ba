//! Shared connection state - one instance, mutated only on the core task

use log::warn;
use tether_proto::{bucket_battery, TelemetryUpdate};

/// Transport radio availability. Each non-`On` case is a distinct
/// user-surfaced condition (off vs. permission vs. unsupported vs. transient).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportPower {
    Off,
    Unauthorized,
    Unsupported,
    Unknown,
    On,
}

/// Pairing lifecycle. Transitions are monotonic except on full reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PairingPhase {
    Unpaired,
    AwaitingHandshake,
    Paired,
}

/// Whether the remote endpoint is actively subscribed to notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    EndpointConnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotspotState {
    Idle,
    Connecting,
    Connected,
}

/// Phone-reported metrics. `-1` / `"unknown"` until the first report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneTelemetry {
    pub signal: i8,
    pub network_type: String,
    /// Bucketed to {0,25,50,75,100} for display; -1 until reported.
    pub battery: i8,
}

impl Default for PhoneTelemetry {
    fn default() -> Self {
        Self {
            signal: -1,
            network_type: "unknown".to_string(),
            battery: -1,
        }
    }
}

/// The process-wide connection state.
#[derive(Debug)]
pub struct ConnectionState {
    pub pairing: PairingPhase,
    pub link: LinkState,
    hotspot: HotspotState,
    pub telemetry: PhoneTelemetry,
    /// Sticky until battery rises back above the threshold.
    pub low_battery_latch: bool,
    /// Suppresses auto-reconnect until the next link-change evaluation.
    pub recently_user_disconnected: bool,
    pub sleeping: bool,
    /// The endpoint believes the host is on the hotspot (dedupes
    /// IndicateConnectedHotspot notifications).
    pub notified_connected: bool,
}

impl ConnectionState {
    pub fn new(pairing: PairingPhase) -> Self {
        Self {
            pairing,
            link: LinkState::Disconnected,
            hotspot: HotspotState::Idle,
            telemetry: PhoneTelemetry::default(),
            low_battery_latch: false,
            recently_user_disconnected: false,
            sleeping: false,
            notified_connected: false,
        }
    }

    pub fn hotspot(&self) -> HotspotState {
        self.hotspot
    }

    /// Invariant: the hotspot may only be Connecting/Connected while the
    /// endpoint link is up.
    pub fn set_hotspot(&mut self, next: HotspotState) -> bool {
        if next != HotspotState::Idle && self.link != LinkState::EndpointConnected {
            warn!("refusing hotspot {next:?} while the endpoint link is down");
            return false;
        }
        self.hotspot = next;
        true
    }

    /// Pairing only moves forward; going back requires [`Self::reset`].
    pub fn advance_pairing(&mut self, next: PairingPhase) {
        if next < self.pairing {
            warn!("ignoring pairing regression {:?} -> {next:?}", self.pairing);
            return;
        }
        self.pairing = next;
    }

    /// Apply a telemetry update. `-1` fields leave the current value
    /// unchanged; battery is bucketed for display.
    pub fn apply_telemetry(&mut self, update: &TelemetryUpdate) {
        if update.signal != -1 {
            self.telemetry.signal = update.signal;
        }
        if update.network_type != "-1" {
            self.telemetry.network_type = update.network_type.clone();
        }
        if update.battery != -1 {
            self.telemetry.battery = bucket_battery(update.battery);
        }
    }

    /// Full reset back to an unpaired state. Link state is left alone: the
    /// endpoint may still be subscribed while it processes the reset notice.
    pub fn reset(&mut self) {
        self.pairing = PairingPhase::Unpaired;
        self.hotspot = HotspotState::Idle;
        self.telemetry = PhoneTelemetry::default();
        self.low_battery_latch = false;
        self.recently_user_disconnected = false;
        self.notified_connected = false;
    }
}
