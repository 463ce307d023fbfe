//! Error types and handling.

use std::fmt;

use thiserror::Error;

/// Physical condition the operator has to fix before printing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceFault {
    /// No tape cassette loaded.
    NoTape,
    /// Cassette cover is open.
    CoverOpen,
}

impl fmt::Display for DeviceFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceFault::NoTape => write!(f, "no tape"),
            DeviceFault::CoverOpen => write!(f, "cover is open"),
        }
    }
}

/// Errors raised while talking to the printer or building its data.
#[derive(Error, Debug)]
pub enum PrinterError {
    /// Connect, send or receive failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// No answer in time (lost datagram, stalled connect/write, poll bound hit)
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Raw socket error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed frame or unexpected acknowledgement
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Status byte outside the known baseline
    #[error("Unrecognized device state at offset {offset:#04x}: expected {expected:#04x}, got {actual:#04x}")]
    UnrecognizedState { offset: usize, expected: u8, actual: u8 },

    /// Tape width class not in the lookup table
    #[error("Unknown tape width class: {0:#04x}")]
    UnknownTapeWidth(u8),

    /// Cover open, tape missing
    #[error("Device fault: {0}")]
    DeviceFault(DeviceFault),

    /// Raster or parameter out of representable range
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Caller interrupted the job
    #[error("Job cancelled")]
    Cancelled,
}

/// Result type alias for PrinterError
pub type Result<T> = std::result::Result<T, PrinterError>;

impl PrinterError {
    /// Create a transport error with message
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a timeout error with message
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a protocol error with message
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create an encoding error with message
    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding(msg.into())
    }

    /// True for failures of the socket layer rather than of the device or data.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_) | Self::Io(_))
    }
}

impl From<std::convert::Infallible> for PrinterError {
    fn from(never: std::convert::Infallible) -> Self {
        match never {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_fault_message() {
        let err = PrinterError::DeviceFault(DeviceFault::NoTape);
        assert_eq!(err.to_string(), "Device fault: no tape");

        let err = PrinterError::DeviceFault(DeviceFault::CoverOpen);
        assert_eq!(err.to_string(), "Device fault: cover is open");
    }

    #[test]
    fn test_unrecognized_state_message() {
        let err = PrinterError::UnrecognizedState {
            offset: 0x2b,
            expected: 0x00,
            actual: 0x40,
        };
        assert_eq!(
            err.to_string(),
            "Unrecognized device state at offset 0x2b: expected 0x00, got 0x40"
        );
    }

    #[test]
    fn test_transport_classification() {
        assert!(PrinterError::timeout("recv").is_transport());
        assert!(PrinterError::transport("connect").is_transport());
        assert!(!PrinterError::protocol("magic").is_transport());
        assert!(!PrinterError::Cancelled.is_transport());
    }
}
