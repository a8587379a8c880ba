//! Tether wire protocol - command frames, notification codes and telemetry
//!
//! Frames arrive over the transport's write characteristic as ASCII text,
//! space-delimited: `<code> <args...>`. One write is one frame. Outbound
//! notifications are a single ASCII digit with no arguments.

pub mod crypto;
pub mod pairing;

// Command codes (latest protocol revision)
pub const CMD_HANDSHAKE: u8 = 0;
pub const CMD_SHARE_CREDENTIALS: u8 = 1;
pub const CMD_SHARE_TELEMETRY: u8 = 2;
pub const CMD_CONNECT_HOTSPOT: u8 = 3;
pub const CMD_DISCONNECT_HOTSPOT: u8 = 4;
pub const CMD_UNLINK: u8 = 5;

/// Network types a companion may report. `"-1"` is the leave-unchanged
/// sentinel, `"unknown"` the not-yet-determined value.
pub const NETWORK_TYPES: &[&str] = &[
    "-1", "GPRS", "E", "2G", "3G", "H", "H+", "4G", "5G", "LTE", "unknown",
];

/// Frame-level parse failures. All of these reject the single request and
/// mutate no state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// First token is numeric but not a known command code.
    #[error("unknown command code {0}")]
    UnknownCommand(u32),
    /// Empty frame, non-numeric field, bad arg count, or out-of-range value.
    #[error("malformed frame")]
    Malformed,
}

/// A telemetry update as reported by the companion. A value of `-1`
/// (or `"-1"` for the network type) means "leave the current value unchanged".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryUpdate {
    pub signal: i8,
    pub network_type: String,
    pub battery: i8,
}

/// A parsed, validated inbound command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Handshake,
    ShareHotspotCredentials { iv_hex: String, ciphertext_b64: String },
    SharePhoneTelemetry(TelemetryUpdate),
    RequestConnectToHotspot,
    RequestDisconnectFromHotspot,
    RequestUnlink,
}

impl Command {
    /// Parse a raw frame into a command, validating arg counts and ranges.
    pub fn parse(frame: &str) -> Result<Command, FrameError> {
        let mut tokens = frame.split_whitespace();
        let code: u32 = tokens
            .next()
            .ok_or(FrameError::Malformed)?
            .parse()
            .map_err(|_| FrameError::Malformed)?;
        let args: Vec<&str> = tokens.collect();

        if code > CMD_UNLINK as u32 {
            return Err(FrameError::UnknownCommand(code));
        }

        match code as u8 {
            CMD_HANDSHAKE => {
                expect_args(&args, 0)?;
                Ok(Command::Handshake)
            }
            CMD_SHARE_CREDENTIALS => {
                expect_args(&args, 2)?;
                Ok(Command::ShareHotspotCredentials {
                    iv_hex: args[0].to_string(),
                    ciphertext_b64: args[1].to_string(),
                })
            }
            CMD_SHARE_TELEMETRY => Ok(Command::SharePhoneTelemetry(parse_telemetry(&args)?)),
            CMD_CONNECT_HOTSPOT => {
                expect_args(&args, 0)?;
                Ok(Command::RequestConnectToHotspot)
            }
            CMD_DISCONNECT_HOTSPOT => {
                expect_args(&args, 0)?;
                Ok(Command::RequestDisconnectFromHotspot)
            }
            CMD_UNLINK => {
                expect_args(&args, 0)?;
                Ok(Command::RequestUnlink)
            }
            // unreachable after the range check, kept for exhaustiveness
            _ => Err(FrameError::UnknownCommand(code)),
        }
    }

    /// Whether the sender identity must match the bound remote endpoint.
    /// Handshake is the sole exception: it is how the identity gets bound.
    pub fn requires_auth(&self) -> bool {
        !matches!(self, Command::Handshake)
    }
}

fn expect_args(args: &[&str], n: usize) -> Result<(), FrameError> {
    if args.len() == n {
        Ok(())
    } else {
        Err(FrameError::Malformed)
    }
}

fn parse_telemetry(args: &[&str]) -> Result<TelemetryUpdate, FrameError> {
    expect_args(args, 3)?;

    let signal: i8 = args[0].parse().map_err(|_| FrameError::Malformed)?;
    if !(-1..=3).contains(&signal) {
        return Err(FrameError::Malformed);
    }

    let network_type = args[1];
    if !NETWORK_TYPES.contains(&network_type) {
        return Err(FrameError::Malformed);
    }

    let battery: i16 = args[2].parse().map_err(|_| FrameError::Malformed)?;
    if !(-1..=100).contains(&battery) {
        return Err(FrameError::Malformed);
    }

    Ok(TelemetryUpdate {
        signal,
        network_type: network_type.to_string(),
        battery: battery as i8,
    })
}

/// Bucket a reported battery percentage to the nearest multiple of 25.
///
/// Defined as `((value + 12) / 25) * 25` in integer arithmetic, so the
/// result is always one of {0, 25, 50, 75, 100} and bucketing is idempotent.
/// The `-1` unchanged sentinel must be handled before calling this.
pub fn bucket_battery(level: i8) -> i8 {
    ((level as i16 + 12) / 25 * 25) as i8
}

/// Outbound notification codes, sent to the companion as a single ASCII digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    EnableHotspot,
    DisableHotspot,
    IndicateConnectedHotspot,
    EnableTelemetry,
    DisableTelemetry,
    IndicateReset,
}

impl Notification {
    pub fn code(self) -> u8 {
        match self {
            Notification::EnableHotspot => 0,
            Notification::DisableHotspot => 1,
            Notification::IndicateConnectedHotspot => 2,
            Notification::EnableTelemetry => 3,
            Notification::DisableTelemetry => 4,
            Notification::IndicateReset => 5,
        }
    }

    /// Wire form: the digit as ASCII, no arguments.
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            Notification::EnableHotspot => b"0",
            Notification::DisableHotspot => b"1",
            Notification::IndicateConnectedHotspot => b"2",
            Notification::EnableTelemetry => b"3",
            Notification::DisableTelemetry => b"4",
            Notification::IndicateReset => b"5",
        }
    }
}
