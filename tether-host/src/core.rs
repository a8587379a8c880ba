//! The host core: a single task that owns all connection state and
//! serializes every input (transport callbacks, platform signals, timers,
//! worker results) through one event queue.

use std::sync::Arc;
use std::time::Duration;

use log::info;
use tether_proto::pairing::PairingPayload;
use tether_proto::Notification;
use tokio::sync::{mpsc, oneshot};

use crate::adapter::WifiAdapter;
use crate::error::HostError;
use crate::session::PairingSession;
use crate::settings::{HotspotCredentials, Settings, SettingsStore};
use crate::state::{ConnectionState, HotspotState, LinkState, PairingPhase, TransportPower};
use crate::supervisor::{AttemptOutcome, Notice, SupervisorState};
use crate::transport::{PeripheralLink, Transport};

/// Everything the core reacts to. Constructed by [`Handle`] methods and by
/// the supervisor's timers and workers.
pub(crate) enum Event {
    PowerChanged(TransportPower),
    EndpointSubscribed {
        id: String,
    },
    EndpointUnsubscribed {
        id: String,
    },
    ReadyToSend,
    WriteReceived {
        sender: String,
        frame: String,
        reply: oneshot::Sender<Result<(), HostError>>,
    },
    LinkChanged,
    ScanCacheUpdated {
        visible: Vec<String>,
    },
    Sleep,
    Wake,
    PrepareNewConnection {
        reply: oneshot::Sender<PairingPayload>,
    },
    SetTelemetryVisible(bool),
    ConnectAttemptDone {
        generation: u64,
        outcome: AttemptOutcome,
    },
    ConnectRetryTimer {
        generation: u64,
    },
    LinkDropDebounce {
        generation: u64,
    },
    AutoEnableTimer {
        generation: u64,
    },
    TrustedSwitchDone {
        generation: u64,
        ssid: String,
        ok: bool,
    },
    Shutdown,
}

/// Cloneable sender half of the core. Platform glue (transport callbacks,
/// power and network monitors, the UI) talks to the core through this.
#[derive(Clone)]
pub struct Handle {
    tx: mpsc::UnboundedSender<Event>,
}

impl Handle {
    pub(crate) fn send(&self, event: Event) {
        // a send after shutdown is fine to drop
        let _ = self.tx.send(event);
    }

    /// Fire `event` after `after`, measured from now. Receivers guard with
    /// a generation counter, so a stale timer is harmless.
    pub(crate) fn schedule(&self, after: Duration, event: Event) {
        let tx = self.tx.clone();
        // the deadline is fixed here, not when the task is first polled
        let sleep = tokio::time::sleep(after);
        tokio::spawn(async move {
            sleep.await;
            let _ = tx.send(event);
        });
    }

    pub fn power_changed(&self, power: TransportPower) {
        self.send(Event::PowerChanged(power));
    }

    pub fn endpoint_subscribed(&self, id: impl Into<String>) {
        self.send(Event::EndpointSubscribed { id: id.into() });
    }

    pub fn endpoint_unsubscribed(&self, id: impl Into<String>) {
        self.send(Event::EndpointUnsubscribed { id: id.into() });
    }

    pub fn ready_to_send(&self) {
        self.send(Event::ReadyToSend);
    }

    /// Deliver one inbound write and wait for its accept/reject response.
    pub async fn write(&self, sender: &str, frame: &str) -> Result<(), HostError> {
        let (reply, response) = oneshot::channel();
        self.send(Event::WriteReceived {
            sender: sender.to_string(),
            frame: frame.to_string(),
            reply,
        });
        response.await.map_err(|_| HostError::Stopped)?
    }

    pub fn link_changed(&self) {
        self.send(Event::LinkChanged);
    }

    pub fn scan_cache_updated(&self, visible: Vec<String>) {
        self.send(Event::ScanCacheUpdated { visible });
    }

    pub fn sleep(&self) {
        self.send(Event::Sleep);
    }

    pub fn wake(&self) {
        self.send(Event::Wake);
    }

    /// Discard any existing session and start advertising a fresh one.
    /// Returns the payload to present to the phone (e.g. as a QR code).
    pub async fn prepare_for_new_connection(&self) -> Result<PairingPayload, HostError> {
        let (reply, response) = oneshot::channel();
        self.send(Event::PrepareNewConnection { reply });
        response.await.map_err(|_| HostError::Stopped)
    }

    pub fn set_telemetry_visible(&self, visible: bool) {
        self.send(Event::SetTelemetryVisible(visible));
    }

    pub fn shutdown(&self) {
        self.send(Event::Shutdown);
    }
}

/// The core actor. Construct it, keep a [`Handle`], then hand the core to
/// [`HostCore::run`] on the runtime.
pub struct HostCore<L: PeripheralLink, W: WifiAdapter, S: SettingsStore> {
    pub(crate) state: ConnectionState,
    pub(crate) settings: Settings<S>,
    pub(crate) session: Option<PairingSession>,
    /// Cached copy of the stored hotspot credentials.
    pub(crate) credentials: Option<HotspotCredentials>,
    pub(crate) transport: Transport<L>,
    pub(crate) adapter: Arc<W>,
    pub(crate) sup: SupervisorState,
    pub(crate) handle: Handle,
    rx: mpsc::UnboundedReceiver<Event>,
    notices: Option<mpsc::UnboundedSender<Notice>>,
}

impl<L: PeripheralLink, W: WifiAdapter, S: SettingsStore> HostCore<L, W, S> {
    /// Rebuilds the host state from settings: a stored session that
    /// completed setup comes back `Paired`, one that never saw its
    /// handshake comes back still awaiting it.
    pub fn new(link: L, adapter: W, settings: Settings<S>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = PairingSession::load(&settings);
        let credentials = settings.hotspot_credentials();
        let pairing = match &session {
            Some(session) if session.remote_endpoint.is_some() && settings.setup_complete() => {
                PairingPhase::Paired
            }
            Some(_) => PairingPhase::AwaitingHandshake,
            None => PairingPhase::Unpaired,
        };
        let mut transport = Transport::new(link);
        if let Some(session) = &session {
            // registers the service; actual advertising waits for power
            transport.start_advertising(session.service_id);
        }
        HostCore {
            state: ConnectionState::new(pairing),
            settings,
            session,
            credentials,
            transport,
            adapter: Arc::new(adapter),
            sup: SupervisorState::default(),
            handle: Handle { tx },
            rx,
            notices: None,
        }
    }

    pub fn handle(&self) -> Handle {
        self.handle.clone()
    }

    /// Stream of user-visible notices. Call at most once, before `run`.
    pub fn subscribe_notices(&mut self) -> mpsc::UnboundedReceiver<Notice> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.notices = Some(tx);
        rx
    }

    pub async fn run(mut self) {
        while let Some(event) = self.rx.recv().await {
            if !self.handle_event(event) {
                break;
            }
        }
        info!("host core stopped");
    }

    fn handle_event(&mut self, event: Event) -> bool {
        match event {
            Event::PowerChanged(power) => self.handle_power(power),
            Event::EndpointSubscribed { id } => self.handle_subscribed(&id),
            Event::EndpointUnsubscribed { id } => self.handle_unsubscribed(&id),
            Event::ReadyToSend => self.transport.on_ready(self.state.link),
            Event::WriteReceived {
                sender,
                frame,
                reply,
            } => {
                let result = self.handle_write(&sender, &frame);
                let _ = reply.send(result);
            }
            Event::LinkChanged => self.on_link_changed(),
            Event::ScanCacheUpdated { visible } => self.on_scan_cache_updated(visible),
            Event::Sleep => self.on_sleep(),
            Event::Wake => self.on_wake(),
            Event::PrepareNewConnection { reply } => {
                let _ = reply.send(self.prepare_new_connection());
            }
            Event::SetTelemetryVisible(visible) => {
                self.settings.set_telemetry_visible(visible);
                self.notify_phone(if visible {
                    Notification::EnableTelemetry
                } else {
                    Notification::DisableTelemetry
                });
            }
            Event::ConnectAttemptDone {
                generation,
                outcome,
            } => self.on_connect_attempt_done(generation, outcome),
            Event::ConnectRetryTimer { generation } => self.on_connect_retry(generation),
            Event::LinkDropDebounce { generation } => self.on_link_drop_debounce(generation),
            Event::AutoEnableTimer { generation } => self.on_auto_enable_timer(generation),
            Event::TrustedSwitchDone {
                generation,
                ssid,
                ok,
            } => self.on_trusted_switch_done(generation, ssid, ok),
            Event::Shutdown => return false,
        }
        true
    }

    fn handle_power(&mut self, power: TransportPower) {
        info!("radio power is {power:?}");
        self.transport.set_power(power);
        if power == TransportPower::On {
            if let Some(session) = &self.session {
                let service_id = session.service_id;
                self.transport.start_advertising(service_id);
            }
        } else {
            // the radio took the endpoint link with it; downgrade without
            // touching the Wi-Fi interface
            self.bump_connect_generation();
            self.state.link = LinkState::Disconnected;
            self.state.set_hotspot(HotspotState::Idle);
            self.state.notified_connected = false;
        }
        self.notice(Notice::Transport(power));
    }

    fn handle_subscribed(&mut self, id: &str) {
        let bound = self
            .session
            .as_ref()
            .and_then(|session| session.remote_endpoint.clone());
        if self.transport.on_subscribed(id, bound.as_deref(), &mut self.state)
            && self.settings.telemetry_visible()
        {
            self.notify_phone(Notification::EnableTelemetry);
        }
    }

    fn handle_unsubscribed(&mut self, id: &str) {
        let was_connected = self.state.link == LinkState::EndpointConnected;
        self.transport.on_unsubscribed(id, &mut self.state);
        if was_connected && self.state.link == LinkState::Disconnected {
            // endpoint gone: stop supervising, but leave the interface alone
            self.bump_connect_generation();
            if self.state.hotspot() != HotspotState::Idle {
                info!("endpoint link lost, releasing hotspot supervision");
                self.state.set_hotspot(HotspotState::Idle);
                self.state.notified_connected = false;
            }
        }
    }

    fn prepare_new_connection(&mut self) -> PairingPayload {
        if self.session.is_some() {
            self.reset_session();
        }
        let session = PairingSession::prepare(&mut self.settings);
        self.state.reset();
        self.state.advance_pairing(PairingPhase::AwaitingHandshake);
        self.transport.arm();
        self.transport.start_advertising(session.service_id);
        let payload = session.payload();
        self.session = Some(session);
        payload
    }

    /// Unlink: tell the phone, drop the hotspot, forget the session. The
    /// stored user preferences (trusted networks, policies) survive.
    pub(crate) fn reset_session(&mut self) {
        info!("unlinking: clearing session and credentials");
        if self.state.hotspot() != HotspotState::Idle {
            self.disconnect(false, true);
        }
        self.bump_connect_generation();
        self.notify_phone(Notification::IndicateReset);
        self.transport.teardown();
        self.settings.clear_session();
        self.session = None;
        self.credentials = None;
        self.state.reset();
    }

    pub(crate) fn notify_phone(&mut self, notification: Notification) {
        self.transport.send(notification, self.state.link);
    }

    pub(crate) fn notice(&mut self, notice: Notice) {
        if let Some(tx) = &self.notices {
            let _ = tx.send(notice);
        }
    }
}

#[cfg(test)]
impl<L: PeripheralLink, W: WifiAdapter, S: SettingsStore> HostCore<L, W, S> {
    /// Drain and handle queued events until the queue stays empty. Blocking
    /// workers inhibit paused-clock auto-advance, so their results are
    /// always seen; pending long timers are not (advance the clock first).
    pub(crate) async fn settle(&mut self) {
        loop {
            tokio::task::yield_now().await;
            match tokio::time::timeout(Duration::from_millis(250), self.rx.recv()).await {
                Ok(Some(event)) => {
                    self.handle_event(event);
                }
                _ => break,
            }
        }
    }
}
