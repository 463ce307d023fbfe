pub mod config;
pub mod error;
pub mod job;
pub mod label;
pub mod raster;
pub mod tprt;
pub mod transport;

pub use error::{DeviceFault, PrinterError, Result};
