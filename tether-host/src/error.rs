//! Error taxonomy for the host core
//!
//! Everything here is locally absorbed: a reject NACKs the single request,
//! an adapter failure ends as "stay disconnected and retry later". Nothing
//! is fatal to the process.

use tether_proto::crypto::DecodeError;
use tether_proto::FrameError;

/// Wi-Fi adapter failures, surfaced by the supervisor as connect failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdapterError {
    #[error("wifi interface unavailable")]
    InterfaceUnavailable,
    #[error("scan failed: {0}")]
    ScanFailed(String),
    #[error("associate failed: {0}")]
    AssociateFailed(String),
    #[error("disassociate failed: {0}")]
    DisassociateFailed(String),
}

/// Why an inbound write was rejected (the NACK returned to the transport).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("protocol error: {0}")]
    Protocol(#[from] FrameError),
    /// Sender identity is not the bound remote endpoint.
    #[error("unauthorized sender")]
    Unauthorized,
    #[error("crypto error: {0}")]
    Crypto(#[from] DecodeError),
    /// Valid command, wrong lifecycle phase (e.g. a second handshake).
    #[error("not supported: {0}")]
    Unsupported(&'static str),
    /// Decrypted credential payload did not contain `ssid password`.
    #[error("malformed credential payload")]
    BadCredentials,
    #[error("adapter error: {0}")]
    Adapter(#[from] AdapterError),
    /// The core event loop is no longer running.
    #[error("host core stopped")]
    Stopped,
}
