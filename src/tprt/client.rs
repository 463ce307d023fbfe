//! Control channel client: one request, one response per command.

use std::net::Ipv4Addr;

use tracing::{debug, info, warn};

use super::device::{DeviceInfo, check_ack, parse_device_info, parse_query_state};
use super::protocol::{Command, ControlFrame, decode_response, encode_request};
use super::status::{DeviceStatus, interpret};
use crate::error::{PrinterError, Result};
use crate::transport::Transport;

/// TPRT control client.
///
/// Stateless towards the device: every call is a complete round-trip, so
/// repeating a command (print-stop after a finished job, for instance) does
/// not disturb anything on this side.
pub struct ControlClient<T: Transport> {
    transport: T,
    address: Ipv4Addr,
    token: u32,
}

impl<T: Transport> ControlClient<T> {
    /// Create a client. `address` is embedded in every request for
    /// correlation; `token` is the opaque session token.
    pub fn new(transport: T, address: Ipv4Addr, token: u32) -> Self {
        Self {
            transport,
            address,
            token,
        }
    }

    /// Underlying transport (the data channel is opened through it).
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consume the client and return the transport.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Send a command and return the device's response frame.
    pub async fn request(&mut self, command: Command, payload: &[u8]) -> Result<ControlFrame> {
        let packet = encode_request(command, self.token, self.address, payload)?;
        let reply = self.transport.exchange(&packet).await?;
        let frame = decode_response(&reply)?;

        if frame.command != command.code() {
            return Err(PrinterError::protocol(format!(
                "Response command {:#06x} does not match request {:#06x}",
                frame.command,
                command.code()
            )));
        }
        if frame.token != self.token {
            debug!("Token not echoed: sent {:#010x}, got {:#010x}", self.token, frame.token);
        }

        Ok(frame)
    }

    /// Read and interpret the device status.
    pub async fn status(&mut self) -> Result<DeviceStatus> {
        let frame = self.request(Command::GetStatus, &[]).await?;
        let status = interpret(&frame.payload)?;
        debug!(
            "Status: tape={}, feeding={}, print_complete={}",
            status.tape, status.feeding, status.print_complete
        );
        Ok(status)
    }

    /// Announce a print job.
    pub async fn start_print(&mut self) -> Result<()> {
        self.acknowledged(Command::PrintStart).await
    }

    /// End a print job.
    pub async fn stop_print(&mut self) -> Result<()> {
        self.acknowledged(Command::PrintStop).await
    }

    /// Announce the data stream (0x0101 then 0x0100).
    pub async fn open_session(&mut self) -> Result<()> {
        self.acknowledged(Command::SessionNotify).await?;
        self.acknowledged(Command::SessionOpen).await
    }

    /// Raw state byte of query-state.
    pub async fn query_state(&mut self) -> Result<u8> {
        let frame = self.request(Command::QueryState, &[]).await?;
        parse_query_state(&frame.payload)
    }

    /// Model and serial number.
    pub async fn device_info(&mut self) -> Result<DeviceInfo> {
        let frame = self.request(Command::GetName, &[]).await?;
        let info = parse_device_info(&frame.payload)?;
        info!("Device: {info}");
        Ok(info)
    }

    async fn acknowledged(&mut self, command: Command) -> Result<()> {
        let frame = self.request(command, &[]).await?;
        check_ack(command, &frame.payload).inspect_err(|e| warn!("{e}"))
    }
}
