//! Raster stream encoding for the TCP data channel.
//!
//! Stream layout:
//!
//! ```text
//! preamble     escape records: 1B 7B <len> <opcode> <params..> <trailer> 7D
//! lines        1B 2E 00 <feed a> <feed b> 01 <width lo> <width hi> <dots..>
//! termination  0C 1B 7B 03 40 40 7D
//! ```
//!
//! `<len>` counts every byte after itself, the closing 7D included. The
//! trailer of every captured record equals the wrapping sum of opcode and
//! parameters; captured records keep their trailer verbatim and only the
//! length record computes it.

use tracing::debug;

use super::job::RasterJob;
use crate::error::{PrinterError, Result};
use crate::tprt::TapeWidth;

pub const RECORD_OPEN: [u8; 2] = [0x1b, 0x7b];
pub const RECORD_CLOSE: u8 = 0x7d;
pub const LINE_OPEN: [u8; 2] = [0x1b, 0x2e];
pub const FORM_FEED: u8 = 0x0c;

/// Size of the per-line header.
pub const LINE_HEADER_SIZE: usize = 8;

/// Opcode of the print length record.
pub const OP_LENGTH: u8 = 0x4c;
/// Opcode of the tape width record.
pub const OP_TAPE: u8 = 0x54;
/// Opcode of the device reset record.
pub const OP_RESET: u8 = 0x40;

/// Form feed plus reset record.
pub const TERMINATION: [u8; 7] = [FORM_FEED, 0x1b, 0x7b, 0x03, OP_RESET, OP_RESET, RECORD_CLOSE];

/// Escape record copied from captured traffic.
#[derive(Debug, Clone, Copy)]
struct Captured {
    opcode: u8,
    params: &'static [u8],
    trailer: u8,
}

const fn captured(opcode: u8, params: &'static [u8], trailer: u8) -> Captured {
    Captured {
        opcode,
        params,
        trailer,
    }
}

// Sent before the tape record
static PREAMBLE_HEAD: [Captured; 4] = [
    captured(0x43, &[0x02, 0x02, 0x01, 0x01], 0x49),
    captured(0x47, &[], 0x47),
    captured(0x44, &[0x05], 0x49),
    captured(0x73, &[0x00], 0x73),
];

// Sent between the tape record and the length record
static PREAMBLE_TAIL: [Captured; 2] = [
    captured(0x6c, &[0x05, 0x05], 0x76),
    captured(0x7b, &[0x00, 0x00, 0x53, 0x54], 0x22),
];

// Only cassettes with a captured width record can be printed on.
static TAPE_RECORDS: [(TapeWidth, Captured); 2] = [
    (TapeWidth::W12, captured(OP_TAPE, &[0x40, 0x00], 0x94)),
    (TapeWidth::W24, captured(OP_TAPE, &[0x2a, 0x00], 0x7e)),
];

/// Fixed preamble size; independent of tape and length.
pub const PREAMBLE_SIZE: usize = 66;

/// Sub-pixel feed bytes of the line header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineFeed(pub [u8; 2]);

impl LineFeed {
    /// No extra feed between lines.
    pub const NONE: LineFeed = LineFeed([0x00, 0x00]);
    /// Feed seen in captures of the vendor test print.
    pub const FINE: LineFeed = LineFeed([0x0a, 0x0a]);
}

impl Default for LineFeed {
    fn default() -> Self {
        Self::NONE
    }
}

/// Trailer byte of an escape record: wrapping sum of opcode and parameters.
pub fn record_trailer(opcode: u8, params: &[u8]) -> u8 {
    params.iter().fold(opcode, |sum, &b| sum.wrapping_add(b))
}

fn push_record(out: &mut Vec<u8>, opcode: u8, params: &[u8], trailer: u8) {
    out.extend_from_slice(&RECORD_OPEN);
    // opcode + params + trailer + close
    out.push((params.len() + 3) as u8);
    out.push(opcode);
    out.extend_from_slice(params);
    out.push(trailer);
    out.push(RECORD_CLOSE);
}

fn push_captured(out: &mut Vec<u8>, record: &Captured) {
    push_record(out, record.opcode, record.params, record.trailer);
}

/// Width record for a cassette.
fn tape_record(tape: TapeWidth) -> Result<&'static Captured> {
    TAPE_RECORDS
        .iter()
        .find(|(t, _)| *t == tape)
        .map(|(_, record)| record)
        .ok_or_else(|| PrinterError::encoding(format!("No width record known for {tape} tape")))
}

/// Device configuration records ahead of the raster lines.
pub fn encode_preamble(tape: TapeWidth, length_dots: u32) -> Result<Vec<u8>> {
    let tape_record = tape_record(tape)?;

    let mut out = Vec::with_capacity(PREAMBLE_SIZE);
    for record in &PREAMBLE_HEAD {
        push_captured(&mut out, record);
    }
    push_captured(&mut out, tape_record);
    for record in &PREAMBLE_TAIL {
        push_captured(&mut out, record);
    }

    let length = length_dots.to_le_bytes();
    push_record(&mut out, OP_LENGTH, &length, record_trailer(OP_LENGTH, &length));

    Ok(out)
}

/// Pack dots `i*8 .. i*8+8` of line `y` into one byte.
///
/// The device expects the byte built the way its vendor tool builds it: for
/// each dot, OR in a nibble when the dot is set, then shift left once. The
/// result is truncated to 8 bits, so the first dot of the group never
/// survives and later dots smear across four bits.
fn pack_byte(i: u32, y: u32, width_dots: u32, pixel: &impl Fn(u32, u32) -> bool) -> u8 {
    let mut chunk: u32 = 0;
    for k in 0..8 {
        let x = i * 8 + k;
        if x < width_dots && pixel(x, y) {
            chunk |= 0x0f;
        }
        chunk <<= 1;
    }
    chunk as u8
}

fn push_line(out: &mut Vec<u8>, width_dots: u16, feed: LineFeed, y: u32, pixel: &impl Fn(u32, u32) -> bool) {
    let [lo, hi] = width_dots.to_le_bytes();
    out.extend_from_slice(&LINE_OPEN);
    out.extend_from_slice(&[0x00, feed.0[0], feed.0[1], 0x01, lo, hi]);

    let width = u32::from(width_dots);
    for i in 0..width.div_ceil(8) {
        out.push(pack_byte(i, y, width, pixel));
    }
}

/// One raster line: 8-byte header followed by `ceil(width_dots / 8)` bytes.
pub fn encode_line(width_dots: u16, feed: LineFeed, y: u32, pixel: impl Fn(u32, u32) -> bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(LINE_HEADER_SIZE + usize::from(width_dots).div_ceil(8));
    push_line(&mut out, width_dots, feed, y, &pixel);
    out
}

/// Trailer that ends the label and resets the device.
pub fn encode_termination() -> [u8; 7] {
    TERMINATION
}

/// Byte count of the full stream for a job; depends only on its geometry.
pub fn encoded_len(job: &RasterJob) -> usize {
    PREAMBLE_SIZE + job.length_dots() as usize * (LINE_HEADER_SIZE + job.width_bytes()) + TERMINATION.len()
}

/// Complete data-channel stream: preamble, every line, termination.
pub fn encode_job(job: &RasterJob, tape: TapeWidth, feed: LineFeed) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(encoded_len(job));
    out.extend_from_slice(&encode_preamble(tape, job.length_dots())?);

    let pixel = |x, y| job.pixel(x, y);
    for y in 0..job.length_dots() {
        push_line(&mut out, job.width_dots(), feed, y, &pixel);
    }
    out.extend_from_slice(&TERMINATION);

    debug!(
        "Encoded {} lines of {} dots for {tape} tape ({} bytes)",
        job.length_dots(),
        job.width_dots(),
        out.len()
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::job::stripes;

    #[test]
    fn test_captured_trailers_follow_sum_rule() {
        let records = PREAMBLE_HEAD
            .iter()
            .chain(PREAMBLE_TAIL.iter())
            .chain(TAPE_RECORDS.iter().map(|(_, r)| r));
        for record in records {
            assert_eq!(
                record_trailer(record.opcode, record.params),
                record.trailer,
                "opcode {:#04x}",
                record.opcode
            );
        }
        assert_eq!(record_trailer(OP_RESET, &[]), TERMINATION[5]);
    }

    #[test]
    fn test_preamble_matches_capture() {
        // 12mm test print, 0xe2 lines
        let expected: Vec<u8> = [
            &[0x1b, 0x7b, 0x07, 0x43, 0x02, 0x02, 0x01, 0x01, 0x49, 0x7d][..],
            &[0x1b, 0x7b, 0x03, 0x47, 0x47, 0x7d],
            &[0x1b, 0x7b, 0x04, 0x44, 0x05, 0x49, 0x7d],
            &[0x1b, 0x7b, 0x04, 0x73, 0x00, 0x73, 0x7d],
            &[0x1b, 0x7b, 0x05, 0x54, 0x40, 0x00, 0x94, 0x7d],
            &[0x1b, 0x7b, 0x05, 0x6c, 0x05, 0x05, 0x76, 0x7d],
            &[0x1b, 0x7b, 0x07, 0x7b, 0x00, 0x00, 0x53, 0x54, 0x22, 0x7d],
            &[0x1b, 0x7b, 0x07, 0x4c, 0xe2, 0x00, 0x00, 0x00, 0x2e, 0x7d],
        ]
        .concat();

        assert_eq!(encode_preamble(TapeWidth::W12, 0xe2).unwrap(), expected);
    }

    #[test]
    fn test_preamble_length_constant() {
        for tape in [TapeWidth::W12, TapeWidth::W24] {
            for length in [0, 1, 425, 0x0102_0304, u32::MAX] {
                assert_eq!(encode_preamble(tape, length).unwrap().len(), PREAMBLE_SIZE);
            }
        }
    }

    #[test]
    fn test_preamble_length_record() {
        let preamble = encode_preamble(TapeWidth::W24, 0x0102_0304).unwrap();
        let record = &preamble[PREAMBLE_SIZE - 10..];
        assert_eq!(record[3], OP_LENGTH);
        assert_eq!(&record[4..8], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(record[8], 0x4c + 0x04 + 0x03 + 0x02 + 0x01);
        // Tape record follows the four head records (30 bytes)
        assert_eq!(&preamble[33..37], &[0x54, 0x2a, 0x00, 0x7e]);
    }

    #[test]
    fn test_preamble_unmapped_tape() {
        for tape in [TapeWidth::W6, TapeWidth::W9, TapeWidth::W18, TapeWidth::W36] {
            assert!(matches!(encode_preamble(tape, 10), Err(PrinterError::Encoding(_))));
        }
    }

    #[test]
    fn test_line_header() {
        let line = encode_line(384, LineFeed::NONE, 0, |_, _| false);
        assert_eq!(&line[..8], &[0x1b, 0x2e, 0x00, 0x00, 0x00, 0x01, 0x80, 0x01]);

        let line = encode_line(144, LineFeed::FINE, 0, |_, _| false);
        assert_eq!(&line[..8], &[0x1b, 0x2e, 0x00, 0x0a, 0x0a, 0x01, 0x90, 0x00]);
    }

    #[test]
    fn test_line_length_independent_of_content() {
        for width in [1u16, 7, 8, 9, 215, 384] {
            let expected = 8 + usize::from(width).div_ceil(8);
            assert_eq!(encode_line(width, LineFeed::NONE, 0, |_, _| false).len(), expected);
            assert_eq!(encode_line(width, LineFeed::NONE, 3, |_, _| true).len(), expected);
            assert_eq!(encode_line(width, LineFeed::NONE, 5, |x, y| (x ^ y) & 1 == 0).len(), expected);
        }
    }

    #[test]
    fn test_bit_packing_single_dot() {
        // Dot k of a group lands at bits (8-k)..(8-k+3), truncated to a byte
        let expected = [0x00, 0x80, 0xc0, 0xe0, 0xf0, 0x78, 0x3c, 0x1e];
        for (k, want) in expected.into_iter().enumerate() {
            let line = encode_line(8, LineFeed::NONE, 0, |x, _| x == k as u32);
            assert_eq!(line[8], want, "dot {k}");
        }
    }

    #[test]
    fn test_bit_packing_all_dots() {
        let line = encode_line(16, LineFeed::NONE, 0, |_, _| true);
        assert_eq!(&line[8..], &[0xfe, 0xfe]);
    }

    #[test]
    fn test_bit_packing_ignores_dots_past_width() {
        // Width 12: dots 12..16 of the second byte are never consulted
        let line = encode_line(12, LineFeed::NONE, 0, |x, _| x >= 12);
        assert_eq!(&line[8..], &[0x00, 0x00]);
    }

    #[test]
    fn test_stripe_pattern_line() {
        // Reference output for line 0 of the stripe pattern: dots 0, 32, 64..
        // sit at k = 0 and vanish; line 1 puts them at k = 7 of the prior byte.
        let line0 = encode_line(64, LineFeed::NONE, 0, stripes);
        assert_eq!(&line0[8..], &[0x00; 8]);

        let line1 = encode_line(64, LineFeed::NONE, 1, stripes);
        assert_eq!(&line1[8..], &[0x00, 0x00, 0x00, 0x1e, 0x00, 0x00, 0x00, 0x1e]);
    }

    #[test]
    fn test_termination() {
        assert_eq!(encode_termination(), [0x0c, 0x1b, 0x7b, 0x03, 0x40, 0x40, 0x7d]);
    }

    #[test]
    fn test_encode_job_layout() {
        let job = RasterJob::new(30.0).unwrap();
        let stream = encode_job(&job, TapeWidth::W24, LineFeed::NONE).unwrap();

        assert_eq!(stream.len(), encoded_len(&job));
        assert_eq!(stream.len(), PREAMBLE_SIZE + 425 * (8 + 48) + 7);
        assert_eq!(&stream[stream.len() - 7..], &TERMINATION);
        assert_eq!(&stream[PREAMBLE_SIZE..PREAMBLE_SIZE + 2], &LINE_OPEN);
    }

    #[test]
    fn test_encode_job_length_does_not_depend_on_pixels() {
        let blank = RasterJob::new(10.0).unwrap().with_pixels(|_, _| false);
        let full = RasterJob::new(10.0).unwrap().with_pixels(|_, _| true);
        let a = encode_job(&blank, TapeWidth::W12, LineFeed::FINE).unwrap();
        let b = encode_job(&full, TapeWidth::W12, LineFeed::FINE).unwrap();
        assert_eq!(a.len(), b.len());
        assert_ne!(a, b);
    }
}
