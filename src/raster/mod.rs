//! Raster label stream: preamble, dot lines and termination, sent over
//! the TCP data channel after the control handshake.

pub mod analyzer;
pub mod encoder;
pub mod job;

pub use analyzer::{StreamRecord, StreamSummary, analyze};
pub use encoder::{LineFeed, encode_job, encode_line, encode_preamble, encode_termination, encoded_len};
pub use job::{Bitmap, MAX_WIDTH_DOTS, RasterJob, dots_to_mm, mm_to_dots, stripes};
