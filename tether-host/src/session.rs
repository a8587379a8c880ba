//! Pairing session - the persisted identity of the paired remote endpoint

use log::{info, warn};
use rand::{distributions::Alphanumeric, Rng};
use uuid::Uuid;

use tether_proto::pairing::{create_pairing_token, PairingPayload};

use crate::settings::{Settings, SettingsStore};

/// One pairing: the advertised service identifier, the shared secret the
/// companion uses as the credential cipher key, and - after the first
/// successful handshake - the bound remote endpoint identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingSession {
    pub service_id: Uuid,
    pub shared_secret: String,
    /// Set exactly once, on first handshake. Immutable until reset.
    pub remote_endpoint: Option<String>,
}

impl PairingSession {
    /// Load the persisted session, if one exists.
    pub fn load<S: SettingsStore>(settings: &Settings<S>) -> Option<Self> {
        Some(Self {
            service_id: settings.service_id()?,
            shared_secret: settings.shared_secret()?,
            remote_endpoint: settings.remote_endpoint(),
        })
    }

    /// Create and persist a fresh session: new random service identifier,
    /// new shared secret, no bound endpoint. Any previous session's values
    /// are overwritten.
    pub fn prepare<S: SettingsStore>(settings: &mut Settings<S>) -> Self {
        let service_id = Uuid::new_v4();
        let shared_secret = generate_secret();
        settings.set_session(service_id, &shared_secret);

        info!("prepared new pairing session {service_id}");

        Self {
            service_id,
            shared_secret,
            remote_endpoint: None,
        }
    }

    /// The out-of-band payload (QR contents) for this session.
    pub fn payload(&self) -> PairingPayload {
        PairingPayload::new(self.service_id, &self.shared_secret)
    }

    /// Copy/paste token form of the payload.
    pub fn token(&self) -> String {
        create_pairing_token(self.service_id, &self.shared_secret)
    }

    /// Bind the remote endpoint identity. Succeeds only while unbound;
    /// rebinding requires a full session reset.
    pub fn bind_endpoint<S: SettingsStore>(&mut self, settings: &mut Settings<S>, id: &str) -> bool {
        if let Some(bound) = &self.remote_endpoint {
            warn!("refusing to rebind endpoint {id} over {bound}");
            return false;
        }
        self.remote_endpoint = Some(id.to_string());
        settings.set_remote_endpoint(id);
        info!("bound remote endpoint {id}");
        true
    }
}

/// 32 random alphanumeric characters: usable directly as an AES-256 key
/// (the companion uses the secret's raw bytes, no KDF).
fn generate_secret() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}
