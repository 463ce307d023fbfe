//! TPRT control frame building and parsing.
//!
//! Frame layout (all integers big-endian):
//!
//! ```text
//! 0x00  magic        "TPRT" request / "tprt" response
//! 0x04  marker       00 00 00 00
//! 0x08  marker       00 00 00 01
//! 0x0c  marker       00 00 00 20
//! 0x10  command
//! 0x14  payload length
//! 0x18  device IPv4
//! 0x1c  token
//! 0x20  payload...
//! ```

use std::net::Ipv4Addr;

use crate::error::{PrinterError, Result};

/// Magic of frames sent to the device.
pub const REQUEST_MAGIC: [u8; 4] = *b"TPRT";

/// Magic of frames sent back by the device (case flipped as acknowledgement).
pub const RESPONSE_MAGIC: [u8; 4] = *b"tprt";

/// Fixed header size; also the absolute offset of the first payload byte.
pub const HEADER_SIZE: usize = 0x20;

/// Control and data channel port.
pub const DEVICE_PORT: u16 = 9100;

// Constant header words at 0x04, 0x08, 0x0c
const MARKERS: [u32; 3] = [0x00, 0x01, 0x20];

/// Control command codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    GetStatus,
    PrintStart,
    PrintStop,
    QueryState,
    GetName,
    /// Session-open variant answered with a one-byte payload.
    SessionOpen,
    /// Session-open variant answered with an empty payload.
    SessionNotify,
}

impl Command {
    /// Wire code of the command.
    pub const fn code(self) -> u32 {
        match self {
            Command::GetStatus => 0x01,
            Command::PrintStart => 0x02,
            Command::PrintStop => 0x03,
            Command::QueryState => 0x04,
            Command::GetName => 0x05,
            Command::SessionOpen => 0x0100,
            Command::SessionNotify => 0x0101,
        }
    }

    /// Look up a command by wire code.
    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0x01 => Command::GetStatus,
            0x02 => Command::PrintStart,
            0x03 => Command::PrintStop,
            0x04 => Command::QueryState,
            0x05 => Command::GetName,
            0x0100 => Command::SessionOpen,
            0x0101 => Command::SessionNotify,
            _ => return None,
        })
    }
}

/// A request or response on the control channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlFrame {
    pub magic: [u8; 4],
    pub command: u32,
    pub address: Ipv4Addr,
    pub token: u32,
    pub payload: Vec<u8>,
}

impl ControlFrame {
    /// Command of the frame, if it is one we know.
    pub fn command(&self) -> Option<Command> {
        Command::from_code(self.command)
    }

    /// True when the magic carries the device's acknowledgement case.
    pub fn is_response(&self) -> bool {
        self.magic == RESPONSE_MAGIC
    }

    /// Serialize header and payload.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let payload_len = u32::try_from(self.payload.len()).map_err(|_| {
            PrinterError::encoding(format!(
                "Payload of {} bytes does not fit the length field",
                self.payload.len()
            ))
        })?;

        let mut packet = Vec::with_capacity(HEADER_SIZE + self.payload.len());
        packet.extend_from_slice(&self.magic);
        for marker in MARKERS {
            packet.extend_from_slice(&marker.to_be_bytes());
        }
        packet.extend_from_slice(&self.command.to_be_bytes());
        packet.extend_from_slice(&payload_len.to_be_bytes());
        packet.extend_from_slice(&self.address.octets());
        packet.extend_from_slice(&self.token.to_be_bytes());
        packet.extend_from_slice(&self.payload);
        Ok(packet)
    }
}

/// Build a request frame.
pub fn encode_request(command: Command, token: u32, address: Ipv4Addr, payload: &[u8]) -> Result<Vec<u8>> {
    ControlFrame {
        magic: REQUEST_MAGIC,
        command: command.code(),
        address,
        token,
        payload: payload.to_vec(),
    }
    .to_bytes()
}

/// Parse a response frame from the device.
pub fn decode_response(packet: &[u8]) -> Result<ControlFrame> {
    decode_frame(packet, RESPONSE_MAGIC)
}

/// Parse a request frame (what the device sees).
pub fn decode_request(packet: &[u8]) -> Result<ControlFrame> {
    decode_frame(packet, REQUEST_MAGIC)
}

/// Flip a request's magic into the response case, the way the device
/// acknowledges a frame it echoes back.
pub fn acknowledge(packet: &mut [u8]) {
    for byte in packet.iter_mut().take(REQUEST_MAGIC.len()) {
        *byte = byte.to_ascii_lowercase();
    }
}

fn decode_frame(packet: &[u8], magic: [u8; 4]) -> Result<ControlFrame> {
    if packet.len() < HEADER_SIZE {
        return Err(PrinterError::protocol(format!(
            "Frame too small: {} bytes (header is {HEADER_SIZE})",
            packet.len()
        )));
    }

    if packet[0..4] != magic {
        return Err(PrinterError::protocol(format!(
            "Invalid magic: {:02X?} (expected {:02X?})",
            &packet[0..4],
            magic
        )));
    }

    for (i, marker) in MARKERS.iter().enumerate() {
        let at = 4 + i * 4;
        let value = read_u32(packet, at);
        if value != *marker {
            return Err(PrinterError::protocol(format!(
                "Unexpected header word at {at:#04x}: {value:#010x} (expected {marker:#010x})"
            )));
        }
    }

    let command = read_u32(packet, 0x10);
    let payload_len = read_u32(packet, 0x14) as usize;
    let actual = packet.len() - HEADER_SIZE;
    if payload_len != actual {
        return Err(PrinterError::protocol(format!(
            "Payload length mismatch: header declares {payload_len}, frame carries {actual}"
        )));
    }

    Ok(ControlFrame {
        magic,
        command,
        address: Ipv4Addr::new(packet[0x18], packet[0x19], packet[0x1a], packet[0x1b]),
        token: read_u32(packet, 0x1c),
        payload: packet[HEADER_SIZE..].to_vec(),
    })
}

fn read_u32(packet: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([packet[at], packet[at + 1], packet[at + 2], packet[at + 3]])
}
