//! Payload parsing for the non-status control commands.

use tracing::warn;

use super::protocol::Command;
use crate::error::{PrinterError, Result};

/// Size of the get-name payload (two 32-byte fields).
pub const NAME_PAYLOAD_SIZE: usize = 64;

const NAME_FIELD_SIZE: usize = 32;

/// Model and serial reported by get-name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub model: String,
    pub serial: String,
}

impl std::fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.model, self.serial)
    }
}

/// Parse the get-name payload.
///
/// Layout (64 bytes):
/// - Bytes 0-31: model name (ASCII, NUL-padded)
/// - Bytes 32-63: serial number (ASCII, NUL-padded)
pub fn parse_device_info(payload: &[u8]) -> Result<DeviceInfo> {
    if payload.len() != NAME_PAYLOAD_SIZE {
        return Err(PrinterError::protocol(format!(
            "Invalid name payload: expected {NAME_PAYLOAD_SIZE} bytes, got {}",
            payload.len()
        )));
    }

    Ok(DeviceInfo {
        model: nul_padded(&payload[..NAME_FIELD_SIZE])?,
        serial: nul_padded(&payload[NAME_FIELD_SIZE..])?,
    })
}

fn nul_padded(field: &[u8]) -> Result<String> {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    let text = std::str::from_utf8(&field[..end])
        .map_err(|_| PrinterError::protocol("Non-ASCII text in name payload"))?;
    if !text.is_ascii() {
        return Err(PrinterError::protocol("Non-ASCII text in name payload"));
    }
    Ok(text.to_string())
}

/// Parse the query-state payload (`04 <state> 00`) and return the state byte.
pub fn parse_query_state(payload: &[u8]) -> Result<u8> {
    match payload {
        [0x04, state, 0x00] => Ok(*state),
        _ => Err(PrinterError::protocol(format!(
            "Unexpected query-state reply: {payload:02X?}"
        ))),
    }
}

/// Check the acknowledgement payload of a command that carries no data.
///
/// print-start and print-stop echo their code followed by two zero bytes;
/// the session-open pair answers with nothing (0x0101) or a single 0x10
/// (0x0100). Some firmware answers 0x0100 with 0x00, which is accepted.
pub fn check_ack(command: Command, payload: &[u8]) -> Result<()> {
    let ok = match command {
        Command::PrintStart => payload == [0x02, 0x00, 0x00],
        Command::PrintStop => payload == [0x03, 0x00, 0x00],
        Command::SessionNotify => payload.is_empty(),
        Command::SessionOpen => match payload {
            [0x10] => true,
            [0x00] => {
                warn!("Session-open acknowledged with 0x00 (normally 0x10)");
                true
            }
            _ => false,
        },
        Command::GetStatus | Command::QueryState | Command::GetName => true,
    };

    if ok {
        Ok(())
    } else {
        Err(PrinterError::protocol(format!(
            "Unexpected acknowledgement for {command:?}: {payload:02X?}"
        )))
    }
}
