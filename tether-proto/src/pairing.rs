//! Pairing payload - the out-of-band record handed to the companion
//!
//! The payload is a flat string-keyed map (rendered as a QR code by the
//! GUI layer). The token form is a single base64url string for copy/paste.

use uuid::Uuid;

/// What the companion needs to pair: the advertised service identifier and
/// the shared secret used as the credential cipher key.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PairingPayload {
    #[serde(rename = "serviceIdentifier")]
    pub service_id: String,
    #[serde(rename = "sharedSecret")]
    pub shared_secret: String,
}

impl PairingPayload {
    pub fn new(service_id: Uuid, shared_secret: &str) -> Self {
        Self {
            service_id: service_id.to_string(),
            shared_secret: shared_secret.to_string(),
        }
    }
}

/// Create a pairing token: base64url over `service-id bytes || secret bytes`.
pub fn create_pairing_token(service_id: Uuid, shared_secret: &str) -> String {
    let mut data = Vec::with_capacity(16 + shared_secret.len());
    data.extend_from_slice(service_id.as_bytes());
    data.extend_from_slice(shared_secret.as_bytes());
    data_encoding::BASE64URL_NOPAD.encode(&data)
}

/// Parse a pairing token back into its service identifier and shared secret.
pub fn parse_pairing_token(token: &str) -> Result<(Uuid, String), &'static str> {
    let data = data_encoding::BASE64URL_NOPAD
        .decode(token.as_bytes())
        .map_err(|_| "invalid base64url")?;

    if data.len() <= 16 {
        return Err("token too short");
    }

    let id_bytes: [u8; 16] = data[0..16].try_into().unwrap();
    let secret = String::from_utf8(data[16..].to_vec()).map_err(|_| "secret is not utf-8")?;

    Ok((Uuid::from_bytes(id_bytes), secret))
}
