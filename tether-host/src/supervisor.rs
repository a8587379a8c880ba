//! Hotspot connection supervisor: the connect/retry pipeline, link-drop
//! debounce, auto-enable policy, low-battery and trusted-network rules.
//!
//! Everything here runs on the core task. Adapter calls go through
//! `spawn_blocking` workers that report back as events; a generation
//! counter per pipeline lets a later decision cancel earlier workers and
//! timers without tracking task handles.

use std::time::Duration;

use log::{debug, info, warn};
use tether_proto::Notification;

use crate::adapter::WifiAdapter;
use crate::core::{Event, HostCore};
use crate::error::AdapterError;
use crate::settings::{HotspotCredentials, SettingsStore, TrustedNetwork};
use crate::state::{HotspotState, LinkState, TransportPower};
use crate::transport::PeripheralLink;

/// Wait between scan attempts while the phone brings its hotspot up.
pub(crate) const RETRY_DELAY: Duration = Duration::from_secs(10);
/// Scan retries after the initial attempt.
pub(crate) const RETRY_LIMIT: u32 = 3;
/// Grace period before treating a link change as a real hotspot drop.
pub(crate) const LINK_DROP_DEBOUNCE: Duration = Duration::from_secs(5);
/// Settle time before auto-enabling the hotspot on a link change.
pub(crate) const AUTO_ENABLE_DEBOUNCE: Duration = Duration::from_secs(8);

/// Generation counters for the supervisor's cancellable pipelines.
#[derive(Debug, Default)]
pub(crate) struct SupervisorState {
    pub connect_generation: u64,
    pub retry_count: u32,
    pub link_drop_generation: u64,
    pub auto_generation: u64,
    pub trusted_generation: u64,
    /// The user asked for the hotspot while on a trusted network; do not
    /// switch back for this connection.
    pub hotspot_over_trusted: bool,
}

/// Result of one scan-then-associate attempt.
#[derive(Debug)]
pub(crate) enum AttemptOutcome {
    Associated,
    SsidNotFound,
    Failed(AdapterError),
}

/// User-visible conditions surfaced outside the protocol, e.g. as desktop
/// notifications. Each is independently clearable by the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Hotspot was dropped because the phone battery fell to or below the
    /// configured threshold.
    LowBattery { battery: i8, threshold: i8 },
    /// A connect request gave up without reaching the hotspot.
    HotspotConnectFailed,
    /// The radio power state changed.
    Transport(TransportPower),
}

impl<L: PeripheralLink, W: WifiAdapter, S: SettingsStore> HostCore<L, W, S> {
    /// Start connecting to the phone hotspot. No-op while a connection is
    /// already in progress or established.
    pub(crate) fn connect(&mut self) {
        let Some(credentials) = self.credentials.clone() else {
            warn!("connect requested before hotspot credentials were shared");
            return;
        };
        if self.state.hotspot() != HotspotState::Idle {
            debug!("connect requested while {:?}", self.state.hotspot());
            return;
        }
        if !self.state.set_hotspot(HotspotState::Connecting) {
            return;
        }
        self.sup.retry_count = 0;
        self.sup.hotspot_over_trusted = self.current_trusted().is_some();
        self.notify_phone(Notification::EnableHotspot);
        let generation = self.bump_connect_generation();
        info!("connecting to hotspot {}", credentials.ssid);
        self.spawn_connect_attempt(generation, credentials);
    }

    /// Drop the hotspot. `system_controlling` additionally disassociates the
    /// Wi-Fi interface; a user-initiated disconnect suppresses auto-reconnect
    /// until the next link-change evaluation.
    pub(crate) fn disconnect(&mut self, user_initiated: bool, system_controlling: bool) {
        self.bump_connect_generation();
        if system_controlling {
            let adapter = self.adapter.clone();
            tokio::spawn(async move {
                let result = tokio::task::spawn_blocking(move || adapter.disassociate())
                    .await
                    .unwrap_or(Err(AdapterError::InterfaceUnavailable));
                if let Err(error) = result {
                    warn!("disassociate failed: {error}");
                }
            });
        }
        if self.state.hotspot() != HotspotState::Idle {
            self.notify_phone(Notification::DisableHotspot);
        }
        self.state.set_hotspot(HotspotState::Idle);
        self.state.notified_connected = false;
        if user_initiated {
            self.state.recently_user_disconnected = true;
        }
    }

    pub(crate) fn on_connect_attempt_done(&mut self, generation: u64, outcome: AttemptOutcome) {
        if generation != self.sup.connect_generation
            || self.state.hotspot() != HotspotState::Connecting
        {
            debug!("dropping stale connect attempt result");
            return;
        }
        match outcome {
            AttemptOutcome::Associated => {
                if self.state.set_hotspot(HotspotState::Connected) {
                    info!("hotspot connected");
                    self.indicate_connected();
                }
            }
            AttemptOutcome::SsidNotFound => {
                if self.sup.retry_count < RETRY_LIMIT {
                    self.sup.retry_count += 1;
                    debug!(
                        "hotspot not visible yet, retry {} of {RETRY_LIMIT} in {RETRY_DELAY:?}",
                        self.sup.retry_count
                    );
                    self.handle
                        .schedule(RETRY_DELAY, Event::ConnectRetryTimer { generation });
                } else {
                    self.fail_connect("hotspot never became visible");
                }
            }
            AttemptOutcome::Failed(error) => {
                self.fail_connect(&error.to_string());
            }
        }
    }

    pub(crate) fn on_connect_retry(&mut self, generation: u64) {
        if generation != self.sup.connect_generation
            || self.state.hotspot() != HotspotState::Connecting
        {
            return;
        }
        match self.credentials.clone() {
            Some(credentials) => self.spawn_connect_attempt(generation, credentials),
            None => self.fail_connect("credentials cleared mid-connect"),
        }
    }

    /// The platform reported a network link change. Classifies it against
    /// the supervised hotspot and re-evaluates auto-enable.
    pub(crate) fn on_link_changed(&mut self) {
        let current = self.adapter.current_ssid().filter(|s| !s.is_empty());
        let target = self.credentials.as_ref().map(|c| c.ssid.clone());

        match (self.state.hotspot(), target) {
            (HotspotState::Connected, Some(target)) if current.as_deref() != Some(&*target) => {
                // could be a transient drop; re-check after a grace period
                self.sup.link_drop_generation += 1;
                debug!("hotspot link changed, confirming drop in {LINK_DROP_DEBOUNCE:?}");
                self.handle.schedule(
                    LINK_DROP_DEBOUNCE,
                    Event::LinkDropDebounce {
                        generation: self.sup.link_drop_generation,
                    },
                );
            }
            (HotspotState::Idle, Some(target)) if current.as_deref() == Some(&*target) => {
                // already on the hotspot without the supervisor's help
                if self.state.set_hotspot(HotspotState::Connected) {
                    info!("already associated to hotspot {target}");
                    self.indicate_connected();
                }
            }
            _ => {}
        }
        self.eval_auto_enable(false);
    }

    pub(crate) fn on_link_drop_debounce(&mut self, generation: u64) {
        if generation != self.sup.link_drop_generation
            || self.state.hotspot() != HotspotState::Connected
        {
            return;
        }
        let current = self.adapter.current_ssid();
        let target = self.credentials.as_ref().map(|c| c.ssid.clone());
        if current.is_some() && current == target {
            debug!("hotspot link recovered within the grace period");
            return;
        }
        info!("hotspot link lost");
        self.state.set_hotspot(HotspotState::Idle);
        self.state.notified_connected = false;
        self.notify_phone(Notification::DisableHotspot);
        self.eval_auto_enable(false);
    }

    /// Auto-enable policy. A non-immediate call schedules a debounced
    /// re-evaluation; only the immediate form may actually connect.
    pub(crate) fn eval_auto_enable(&mut self, immediate: bool) {
        if !immediate {
            self.sup.auto_generation += 1;
            self.handle.schedule(
                AUTO_ENABLE_DEBOUNCE,
                Event::AutoEnableTimer {
                    generation: self.sup.auto_generation,
                },
            );
            return;
        }
        if !self.settings.auto_connect()
            || self.state.sleeping
            || self.state.low_battery_latch
            || self.state.hotspot() != HotspotState::Idle
            || self.state.link != LinkState::EndpointConnected
            || self.credentials.is_none()
        {
            return;
        }
        if self.state.recently_user_disconnected {
            debug!("skipping auto-connect: user disconnected recently");
            self.state.recently_user_disconnected = false;
            return;
        }
        if self.adapter.current_ssid().filter(|s| !s.is_empty()).is_some() {
            return;
        }
        info!("auto-enabling hotspot");
        self.connect();
    }

    pub(crate) fn on_auto_enable_timer(&mut self, generation: u64) {
        if generation == self.sup.auto_generation {
            self.eval_auto_enable(true);
        }
    }

    /// Low-battery policy, evaluated on every telemetry battery report with
    /// the raw (unbucketed) value.
    pub(crate) fn eval_low_battery(&mut self, battery: i8) {
        let threshold = self.settings.min_battery();
        if battery > threshold {
            if self.state.low_battery_latch {
                info!("phone battery recovered at {battery}%");
                self.state.low_battery_latch = false;
            }
            return;
        }
        if self.state.low_battery_latch {
            return;
        }
        self.state.low_battery_latch = true;
        if self.state.hotspot() != HotspotState::Idle {
            warn!("phone battery at {battery}% (threshold {threshold}%), dropping hotspot");
            self.disconnect(false, true);
            self.notice(Notice::LowBattery { battery, threshold });
        }
    }

    /// The platform's scan cache changed. If a trusted network is now in
    /// range while we are on the hotspot, prefer it.
    pub(crate) fn on_scan_cache_updated(&mut self, visible: Vec<String>) {
        if self.state.hotspot() != HotspotState::Connected || self.sup.hotspot_over_trusted {
            return;
        }
        let Some(trusted) = self
            .settings
            .trusted_networks()
            .into_iter()
            .find(|network| visible.iter().any(|ssid| ssid == &network.ssid))
        else {
            return;
        };
        info!("trusted network {} in range, leaving the hotspot", trusted.ssid);
        self.sup.trusted_generation += 1;
        self.spawn_trusted_switch(self.sup.trusted_generation, trusted);
    }

    pub(crate) fn on_trusted_switch_done(&mut self, generation: u64, ssid: String, ok: bool) {
        if generation != self.sup.trusted_generation {
            return;
        }
        if !ok {
            warn!("could not join trusted network {ssid}, staying on the hotspot");
            return;
        }
        if self.state.hotspot() == HotspotState::Connected {
            info!("joined trusted network {ssid}");
            self.state.set_hotspot(HotspotState::Idle);
            self.state.notified_connected = false;
            self.notify_phone(Notification::DisableHotspot);
        }
    }

    pub(crate) fn on_sleep(&mut self) {
        self.state.sleeping = true;
        if self.settings.sleep_disconnect() && self.state.hotspot() != HotspotState::Idle {
            info!("host going to sleep, dropping hotspot");
            self.disconnect(false, true);
        }
    }

    pub(crate) fn on_wake(&mut self) {
        self.state.sleeping = false;
        self.eval_auto_enable(false);
    }

    fn fail_connect(&mut self, why: &str) {
        warn!("hotspot connect failed: {why}");
        self.state.set_hotspot(HotspotState::Idle);
        self.state.notified_connected = false;
        self.notify_phone(Notification::DisableHotspot);
        self.notice(Notice::HotspotConnectFailed);
    }

    fn indicate_connected(&mut self) {
        if !self.state.notified_connected {
            self.notify_phone(Notification::IndicateConnectedHotspot);
            self.state.notified_connected = true;
        }
    }

    pub(crate) fn bump_connect_generation(&mut self) -> u64 {
        self.sup.connect_generation += 1;
        self.sup.connect_generation
    }

    fn current_trusted(&self) -> Option<TrustedNetwork> {
        let current = self.adapter.current_ssid()?;
        self.settings
            .trusted_networks()
            .into_iter()
            .find(|network| network.ssid == current)
    }

    fn spawn_connect_attempt(&self, generation: u64, credentials: HotspotCredentials) {
        let adapter = self.adapter.clone();
        let handle = self.handle.clone();
        tokio::spawn(async move {
            let outcome =
                tokio::task::spawn_blocking(move || attempt(adapter.as_ref(), &credentials))
                    .await
                    .unwrap_or(AttemptOutcome::Failed(AdapterError::InterfaceUnavailable));
            handle.send(Event::ConnectAttemptDone {
                generation,
                outcome,
            });
        });
    }

    fn spawn_trusted_switch(&self, generation: u64, network: TrustedNetwork) {
        let adapter = self.adapter.clone();
        let handle = self.handle.clone();
        tokio::spawn(async move {
            let ssid = network.ssid.clone();
            let ok = tokio::task::spawn_blocking(move || {
                adapter.associate(&network.ssid, &network.password).is_ok()
            })
            .await
            .unwrap_or(false);
            handle.send(Event::TrustedSwitchDone {
                generation,
                ssid,
                ok,
            });
        });
    }
}

/// One blocking scan-then-associate pass against the adapter.
fn attempt<W: WifiAdapter>(adapter: &W, credentials: &HotspotCredentials) -> AttemptOutcome {
    match adapter.scan(Some(&credentials.ssid)) {
        Ok(networks) if networks.iter().any(|n| n.ssid == credentials.ssid) => {
            match adapter.associate(&credentials.ssid, &credentials.password) {
                Ok(()) => AttemptOutcome::Associated,
                Err(error) => AttemptOutcome::Failed(error),
            }
        }
        Ok(_) => AttemptOutcome::SsidNotFound,
        Err(error) => AttemptOutcome::Failed(error),
    }
}
