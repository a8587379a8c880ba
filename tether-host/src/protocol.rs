//! Inbound command handling: authorization, decrypting shared credentials
//! and dispatch into the supervisor.

use log::{debug, info, warn};
use tether_proto::{crypto, Command, TelemetryUpdate};

use crate::adapter::WifiAdapter;
use crate::core::HostCore;
use crate::error::HostError;
use crate::settings::{HotspotCredentials, SettingsStore};
use crate::state::{PairingPhase, TransportPower};
use crate::transport::PeripheralLink;

impl<L: PeripheralLink, W: WifiAdapter, S: SettingsStore> HostCore<L, W, S> {
    /// Handle one inbound write. The returned error becomes the write
    /// response on the transport; failures mutate no state.
    pub(crate) fn handle_write(&mut self, sender: &str, frame: &str) -> Result<(), HostError> {
        if self.transport.power() != TransportPower::On {
            debug!("radio is {:?}, dropping write from {sender}", self.transport.power());
            return Ok(());
        }
        let command = Command::parse(frame)?;
        if command.requires_auth() {
            let bound = self
                .session
                .as_ref()
                .and_then(|session| session.remote_endpoint.as_deref());
            if bound != Some(sender) {
                warn!("rejecting {command:?} from unauthorized sender {sender}");
                return Err(HostError::Unauthorized);
            }
        }
        match command {
            Command::Handshake => self.handle_handshake(sender),
            Command::ShareHotspotCredentials {
                iv_hex,
                ciphertext_b64,
            } => self.handle_credentials(&iv_hex, &ciphertext_b64),
            Command::SharePhoneTelemetry(update) => {
                self.handle_telemetry(&update);
                Ok(())
            }
            Command::RequestConnectToHotspot => {
                self.connect();
                Ok(())
            }
            Command::RequestDisconnectFromHotspot => {
                self.disconnect(true, true);
                Ok(())
            }
            Command::RequestUnlink => {
                self.reset_session();
                Ok(())
            }
        }
    }

    // Binds the sender as the session peer. Valid exactly once per session:
    // a paired or already-bound session rejects further handshakes.
    fn handle_handshake(&mut self, sender: &str) -> Result<(), HostError> {
        if self.state.pairing != PairingPhase::AwaitingHandshake {
            warn!("handshake from {sender} outside the pairing window");
            return Err(HostError::Unsupported("pairing is single-use"));
        }
        let Some(session) = self.session.as_mut() else {
            return Err(HostError::Unsupported("no pairing session"));
        };
        if !session.bind_endpoint(&mut self.settings, sender) {
            return Err(HostError::Unsupported("session already bound"));
        }
        info!("handshake accepted from {sender}");
        Ok(())
    }

    fn handle_credentials(&mut self, iv_hex: &str, ciphertext_b64: &str) -> Result<(), HostError> {
        let session = self
            .session
            .as_ref()
            .ok_or(HostError::Unsupported("no pairing session"))?;
        let plaintext = crypto::decrypt(&session.shared_secret, iv_hex, ciphertext_b64)?;
        let credentials = parse_credential_payload(&plaintext)?;
        info!("received hotspot credentials for {}", credentials.ssid);
        self.settings.set_hotspot_credentials(&credentials);
        self.credentials = Some(credentials);
        if self.state.pairing != PairingPhase::Paired {
            self.state.advance_pairing(PairingPhase::Paired);
            self.settings.set_setup_complete(true);
            info!("pairing complete");
        }
        Ok(())
    }

    fn handle_telemetry(&mut self, update: &TelemetryUpdate) {
        self.state.apply_telemetry(update);
        if update.battery != -1 {
            self.eval_low_battery(update.battery);
        }
    }
}

/// Decrypted credential payloads are `ssid password`; an SSID containing
/// spaces arrives double-quoted. The password is everything after the SSID.
fn parse_credential_payload(plaintext: &str) -> Result<HotspotCredentials, HostError> {
    let plaintext = plaintext.trim();
    let (ssid, password) = match plaintext.strip_prefix('"') {
        Some(rest) => {
            let end = rest.find('"').ok_or(HostError::BadCredentials)?;
            (&rest[..end], rest[end + 1..].trim_start())
        }
        None => plaintext.split_once(' ').ok_or(HostError::BadCredentials)?,
    };
    if ssid.is_empty() || password.is_empty() {
        return Err(HostError::BadCredentials);
    }
    Ok(HotspotCredentials {
        ssid: ssid.to_string(),
        password: password.to_string(),
    })
}
