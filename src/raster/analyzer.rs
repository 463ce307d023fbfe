//! Decoder for raster streams, used to check encoder output and captured
//! TCP dumps.

use std::fmt;

use tracing::trace;

use super::encoder::{FORM_FEED, LINE_HEADER_SIZE, LineFeed, OP_LENGTH, OP_RESET, RECORD_CLOSE, record_trailer};
use crate::error::{PrinterError, Result};

const ESC: u8 = 0x1b;
const RECORD: u8 = 0x7b;
const LINE: u8 = 0x2e;

/// One element of a raster stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamRecord {
    /// `1B 7B` configuration record (trailer and close already verified).
    Escape { opcode: u8, params: Vec<u8> },
    /// `1B 2E` raster line.
    Line {
        feed: LineFeed,
        width_dots: u16,
        dots: Vec<u8>,
    },
    /// End of label data.
    FormFeed,
}

/// Decoded stream.
#[derive(Debug, Clone, Default)]
pub struct StreamSummary {
    pub records: Vec<StreamRecord>,
    /// Raster line count.
    pub lines: u32,
    /// Print length from the 0x4C record, if present.
    pub declared_length: Option<u32>,
}

impl StreamSummary {
    /// Stream ends with form feed and reset.
    pub fn is_terminated(&self) -> bool {
        matches!(
            self.records.as_slice(),
            [.., StreamRecord::FormFeed, StreamRecord::Escape { opcode: OP_RESET, params }] if params.is_empty()
        )
    }

    /// Declared print length matches the number of lines sent.
    pub fn is_consistent(&self) -> bool {
        self.declared_length == Some(self.lines)
    }
}

impl fmt::Display for StreamSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Raster Stream ===")?;
        for record in &self.records {
            if let StreamRecord::Escape { opcode, params } = record {
                writeln!(f, "Record {opcode:#04x}: {params:02X?}")?;
            }
        }
        if let Some(length) = self.declared_length {
            writeln!(f, "Declared length: {length} lines")?;
        }
        writeln!(f, "Raster lines: {}", self.lines)?;
        writeln!(f, "Terminated: {}", self.is_terminated())
    }
}

fn malformed(at: usize, what: &str, data: &[u8]) -> PrinterError {
    let end = data.len().min(at + 16);
    PrinterError::protocol(format!("{what} at offset {at}: {:02X?}...", &data[at..end]))
}

/// Decode a complete raster stream.
pub fn analyze(data: &[u8]) -> Result<StreamSummary> {
    let mut summary = StreamSummary::default();
    let mut i = 0;

    while i < data.len() {
        match (data[i], data.get(i + 1)) {
            (ESC, Some(&RECORD)) => {
                let len = *data.get(i + 2).ok_or_else(|| malformed(i, "Truncated record", data))? as usize;
                let body = data
                    .get(i + 3..i + 3 + len)
                    .ok_or_else(|| malformed(i, "Truncated record", data))?;
                // opcode, trailer and close at minimum
                let [opcode, params @ .., trailer, close] = body else {
                    return Err(malformed(i, "Record too short", data));
                };
                if *close != RECORD_CLOSE {
                    return Err(malformed(i, "Record not closed by 0x7d", data));
                }
                if record_trailer(*opcode, params) != *trailer {
                    return Err(malformed(i, "Record trailer mismatch", data));
                }

                if *opcode == OP_LENGTH {
                    if let Ok(bytes) = <[u8; 4]>::try_from(params) {
                        summary.declared_length = Some(u32::from_le_bytes(bytes));
                    }
                }
                trace!("Record {opcode:#04x}: {params:02X?}");
                summary.records.push(StreamRecord::Escape {
                    opcode: *opcode,
                    params: params.to_vec(),
                });
                i += 3 + len;
            }
            (ESC, Some(&LINE)) => {
                let header = data
                    .get(i..i + LINE_HEADER_SIZE)
                    .ok_or_else(|| malformed(i, "Truncated line header", data))?;
                if header[2] != 0x00 || header[5] != 0x01 {
                    return Err(malformed(i, "Unexpected line header", data));
                }
                let width_dots = u16::from_le_bytes([header[6], header[7]]);
                let bytes = usize::from(width_dots).div_ceil(8);
                let start = i + LINE_HEADER_SIZE;
                let dots = data
                    .get(start..start + bytes)
                    .ok_or_else(|| malformed(i, "Truncated line data", data))?;

                summary.records.push(StreamRecord::Line {
                    feed: LineFeed([header[3], header[4]]),
                    width_dots,
                    dots: dots.to_vec(),
                });
                summary.lines += 1;
                i = start + bytes;
            }
            (FORM_FEED, _) => {
                summary.records.push(StreamRecord::FormFeed);
                i += 1;
            }
            _ => return Err(malformed(i, "Unexpected byte", data)),
        }
    }

    Ok(summary)
}
