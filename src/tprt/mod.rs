//! TPRT control protocol (UDP port 9100).
//!
//! Fixed 32-byte header frames, reconstructed from packet captures of the
//! vendor software talking to the printer.
//!
//! # Example
//!
//! ```ignore
//! use tprt_label::tprt::ControlClient;
//! use tprt_label::transport::NetTransport;
//!
//! let transport = NetTransport::new(addr, 9100, Duration::from_secs(3));
//! let mut client = ControlClient::new(transport, addr, 0);
//! let status = client.status().await?;
//! ```

mod client;
mod device;
pub mod protocol;
pub mod status;

pub use client::ControlClient;
pub use device::{DeviceInfo, parse_device_info, parse_query_state};
pub use protocol::{Command, ControlFrame, DEVICE_PORT, decode_response, encode_request};
pub use status::{DeviceStatus, TapeWidth, interpret};
