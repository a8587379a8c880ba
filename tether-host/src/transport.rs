//! Peripheral transport: advertising lifecycle, single-subscriber policy
//! and the ordered outbound notification queue.

use std::collections::VecDeque;

use log::{debug, info, warn};
use tether_proto::Notification;
use uuid::Uuid;

use crate::state::{ConnectionState, LinkState, TransportPower};

/// Peripheral-role radio the host advertises and notifies through.
///
/// `notify` makes exactly one delivery attempt; `false` means the link was
/// busy and the transport will retry when the platform reports ready-to-send.
pub trait PeripheralLink: Send + 'static {
    fn start_advertising(&mut self, service_id: Uuid);
    fn stop_advertising(&mut self);
    fn notify(&mut self, notification: Notification) -> bool;
}

/// Wraps the platform link with the queueing and power rules the protocol
/// expects. Owned by the core task, never shared.
pub struct Transport<L: PeripheralLink> {
    link: L,
    power: TransportPower,
    advertising: bool,
    service_id: Option<Uuid>,
    /// Identity of the endpoint currently holding the link.
    endpoint: Option<String>,
    tearing_down: bool,
    queue: VecDeque<Notification>,
}

impl<L: PeripheralLink> Transport<L> {
    pub fn new(link: L) -> Self {
        Transport {
            link,
            power: TransportPower::Unknown,
            advertising: false,
            service_id: None,
            endpoint: None,
            tearing_down: false,
            queue: VecDeque::new(),
        }
    }

    pub fn power(&self) -> TransportPower {
        self.power
    }

    /// Radio power report from the platform. Anything but `On` also means
    /// whatever advertisement was running is gone.
    pub fn set_power(&mut self, power: TransportPower) {
        if power != TransportPower::On {
            self.advertising = false;
            self.endpoint = None;
        }
        self.power = power;
    }

    /// Clears the teardown mark (and any notifications queued for a prior
    /// session) so a fresh session can advertise.
    pub fn arm(&mut self) {
        self.tearing_down = false;
        self.queue.clear();
    }

    pub fn start_advertising(&mut self, service_id: Uuid) {
        if self.tearing_down {
            debug!("not advertising: transport is being torn down");
            return;
        }
        if self.power != TransportPower::On {
            debug!("not advertising: radio is {:?}", self.power);
            self.service_id = Some(service_id);
            return;
        }
        self.service_id = Some(service_id);
        if self.advertising {
            return;
        }
        info!("advertising pairing service {service_id}");
        self.link.start_advertising(service_id);
        self.advertising = true;
    }

    /// Stops advertising and drops the service registration. Safe to call
    /// repeatedly and in any transport state.
    pub fn teardown(&mut self) {
        self.tearing_down = true;
        self.service_id = None;
        if self.advertising {
            self.link.stop_advertising();
            self.advertising = false;
        }
    }

    /// A remote endpoint subscribed to notifications. Returns `true` if it
    /// was accepted as the session peer.
    pub fn on_subscribed(
        &mut self,
        endpoint: &str,
        bound_endpoint: Option<&str>,
        state: &mut ConnectionState,
    ) -> bool {
        if self.power != TransportPower::On {
            warn!("ignoring subscriber {endpoint}: radio is {:?}", self.power);
            return false;
        }
        if let Some(bound) = bound_endpoint {
            if bound != endpoint {
                warn!("ignoring subscriber {endpoint}: session is bound to {bound}");
                return false;
            }
        }
        if state.link == LinkState::EndpointConnected {
            warn!("ignoring subscriber {endpoint}: an endpoint is already connected");
            return false;
        }
        info!("endpoint {endpoint} subscribed");
        if self.advertising {
            self.link.stop_advertising();
            self.advertising = false;
        }
        self.endpoint = Some(endpoint.to_string());
        state.link = LinkState::EndpointConnected;
        self.pump();
        true
    }

    /// The subscribed endpoint went away. Only the endpoint holding the
    /// link may drop it; unsubscribes from previously rejected subscribers
    /// are ignored, mirroring the subscribe-side identity check.
    /// Re-advertises the session service unless the transport is being
    /// torn down.
    pub fn on_unsubscribed(&mut self, endpoint: &str, state: &mut ConnectionState) {
        if state.link != LinkState::EndpointConnected {
            debug!("unsubscribe from {endpoint} with no endpoint connected");
            return;
        }
        if self.endpoint.as_deref() != Some(endpoint) {
            warn!("ignoring unsubscribe from {endpoint}: it does not hold the link");
            return;
        }
        self.endpoint = None;
        info!("endpoint {endpoint} unsubscribed");
        state.link = LinkState::Disconnected;
        if let (false, Some(service_id)) = (self.tearing_down, self.service_id) {
            self.start_advertising(service_id);
        }
    }

    /// Sends a notification to the phone, preserving order. Delivered
    /// immediately only when an endpoint is subscribed and nothing is
    /// already queued ahead of it.
    pub fn send(&mut self, notification: Notification, link: LinkState) {
        if link == LinkState::EndpointConnected
            && self.power == TransportPower::On
            && self.queue.is_empty()
        {
            if !self.link.notify(notification) {
                debug!("link busy, queueing {notification:?}");
                self.queue.push_back(notification);
            }
        } else {
            debug!("no subscriber ready, queueing {notification:?}");
            self.queue.push_back(notification);
        }
    }

    /// Platform reported the link can take another notification.
    pub fn on_ready(&mut self, link: LinkState) {
        if link != LinkState::EndpointConnected {
            return;
        }
        self.pump();
    }

    // One delivery attempt for the head of the queue. A failed attempt puts
    // it back at the front so ordering holds.
    fn pump(&mut self) {
        if let Some(notification) = self.queue.pop_front() {
            if !self.link.notify(notification) {
                self.queue.push_front(notification);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn pending(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::PairingPhase;
    use crate::testkit::MockLink;

    fn on_transport(link: &MockLink) -> Transport<MockLink> {
        let mut transport = Transport::new(link.clone());
        transport.set_power(TransportPower::On);
        transport
    }

    #[test]
    fn advertising_is_idempotent_and_power_gated() {
        let link = MockLink::default();
        let mut transport = Transport::new(link.clone());
        let service_id = Uuid::new_v4();

        transport.start_advertising(service_id);
        assert_eq!(link.state().starts, 0, "radio not on yet");

        transport.set_power(TransportPower::On);
        transport.start_advertising(service_id);
        transport.start_advertising(service_id);
        assert_eq!(link.state().starts, 1);
    }

    #[test]
    fn send_queues_until_subscriber_then_flushes_in_order() {
        let link = MockLink::default();
        let mut transport = on_transport(&link);
        let mut state = ConnectionState::new(PairingPhase::Unpaired);

        transport.send(Notification::EnableHotspot, state.link);
        transport.send(Notification::EnableTelemetry, state.link);
        assert_eq!(transport.pending(), 2);

        assert!(transport.on_subscribed("phone-a", None, &mut state));
        // subscribe flushes one, ready-to-send drains the rest
        assert_eq!(link.state().sent, vec![Notification::EnableHotspot]);
        transport.on_ready(state.link);
        assert_eq!(
            link.state().sent,
            vec![Notification::EnableHotspot, Notification::EnableTelemetry]
        );
        assert_eq!(transport.pending(), 0);
    }

    #[test]
    fn busy_link_requeues_at_the_front() {
        let link = MockLink::default();
        let mut transport = on_transport(&link);
        let mut state = ConnectionState::new(PairingPhase::Unpaired);
        assert!(transport.on_subscribed("phone-a", None, &mut state));

        link.set_busy(true);
        transport.send(Notification::EnableHotspot, state.link);
        transport.send(Notification::DisableHotspot, state.link);
        assert_eq!(transport.pending(), 2);

        link.set_busy(false);
        transport.on_ready(state.link);
        transport.on_ready(state.link);
        assert_eq!(
            link.state().sent,
            vec![Notification::EnableHotspot, Notification::DisableHotspot]
        );
    }

    #[test]
    fn second_subscriber_is_rejected() {
        let link = MockLink::default();
        let mut transport = on_transport(&link);
        let mut state = ConnectionState::new(PairingPhase::Unpaired);

        assert!(transport.on_subscribed("phone-a", None, &mut state));
        assert!(!transport.on_subscribed("phone-b", None, &mut state));
        assert_eq!(state.link, LinkState::EndpointConnected);
    }

    #[test]
    fn bound_session_only_accepts_its_own_endpoint() {
        let link = MockLink::default();
        let mut transport = on_transport(&link);
        let mut state = ConnectionState::new(PairingPhase::Unpaired);

        assert!(!transport.on_subscribed("phone-b", Some("phone-a"), &mut state));
        assert_eq!(state.link, LinkState::Disconnected);
        assert!(transport.on_subscribed("phone-a", Some("phone-a"), &mut state));
    }

    #[test]
    fn only_the_link_holder_can_unsubscribe() {
        let link = MockLink::default();
        let mut transport = on_transport(&link);
        let mut state = ConnectionState::new(PairingPhase::Unpaired);

        assert!(transport.on_subscribed("phone-a", None, &mut state));
        assert!(!transport.on_subscribed("phone-b", None, &mut state));

        transport.on_unsubscribed("phone-b", &mut state);
        assert_eq!(state.link, LinkState::EndpointConnected);

        transport.on_unsubscribed("phone-a", &mut state);
        assert_eq!(state.link, LinkState::Disconnected);
    }

    #[test]
    fn unsubscribe_restarts_advertising_unless_torn_down() {
        let link = MockLink::default();
        let mut transport = on_transport(&link);
        let mut state = ConnectionState::new(PairingPhase::Unpaired);
        transport.start_advertising(Uuid::new_v4());
        assert!(transport.on_subscribed("phone-a", None, &mut state));
        assert_eq!(link.state().stops, 1);

        transport.on_unsubscribed("phone-a", &mut state);
        assert_eq!(state.link, LinkState::Disconnected);
        assert_eq!(link.state().starts, 2);

        assert!(transport.on_subscribed("phone-a", None, &mut state));
        transport.teardown();
        transport.on_unsubscribed("phone-a", &mut state);
        assert_eq!(link.state().starts, 2, "no re-advertise after teardown");
    }

    #[test]
    fn teardown_is_idempotent() {
        let link = MockLink::default();
        let mut transport = on_transport(&link);
        transport.start_advertising(Uuid::new_v4());

        transport.teardown();
        transport.teardown();
        assert_eq!(link.state().stops, 1);
    }
}
