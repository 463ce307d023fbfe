//! get-status payload interpretation.
//!
//! Offsets below are absolute frame offsets as they appear in packet
//! captures; the payload starts at [`HEADER_SIZE`] (0x20).
//!
//! ```text
//! 0x20  14 00 00 XX 00 YY 00 00  40 00 00 00 00 ZZ 00 00
//! 0x30  00 00 00 00
//! ```
//!
//! Only the bytes listed in the offset constants carry state we understand.
//! Every other byte must match the captured baseline; anything else means the
//! device is in a state nobody has decoded yet, and we refuse to guess.

use super::protocol::HEADER_SIZE;
use crate::error::{DeviceFault, PrinterError, Result};

/// Size of the get-status payload.
pub const STATUS_PAYLOAD_SIZE: usize = 0x14;

/// Nonzero while the feed motor is running.
pub const FEEDING_OFFSET: usize = 0x21;
/// Media condition: 0x00 nominal, 0x06 no tape, 0x21 cover open.
pub const MEDIA_OFFSET: usize = 0x22;
/// Tape width class (1..=6).
pub const TAPE_CLASS_OFFSET: usize = 0x23;
/// Secondary cover flag: 0x00 nominal, 0x80 open.
pub const COVER_OFFSET: usize = 0x25;
/// 0 while a print is in progress, nonzero once it completed.
pub const PRINT_DONE_OFFSET: usize = 0x2d;

const MEDIA_NOMINAL: u8 = 0x00;
const MEDIA_NO_TAPE: u8 = 0x06;
const MEDIA_COVER_OPEN: u8 = 0x21;
const COVER_NOMINAL: u8 = 0x00;
const COVER_OPEN: u8 = 0x80;

/// Captured idle payload; reference for every byte we do not interpret.
const BASELINE: [u8; STATUS_PAYLOAD_SIZE] = [
    0x14, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x40, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00,
];

/// Tape cassette widths the device reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TapeWidth {
    W6,
    W9,
    W12,
    W18,
    W24,
    W36,
}

impl TapeWidth {
    pub const ALL: [TapeWidth; 6] = [
        TapeWidth::W6,
        TapeWidth::W9,
        TapeWidth::W12,
        TapeWidth::W18,
        TapeWidth::W24,
        TapeWidth::W36,
    ];

    /// Decode the width class byte of a status payload.
    pub fn from_class(class: u8) -> Result<Self> {
        Ok(match class {
            0x01 => TapeWidth::W6,
            0x02 => TapeWidth::W9,
            0x03 => TapeWidth::W12,
            0x04 => TapeWidth::W18,
            0x05 => TapeWidth::W24,
            0x06 => TapeWidth::W36,
            other => return Err(PrinterError::UnknownTapeWidth(other)),
        })
    }

    /// Look up a cassette by its nominal width.
    pub fn from_mm(mm: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.mm() == mm)
    }

    /// Width class byte as reported by the device.
    pub fn class(self) -> u8 {
        match self {
            TapeWidth::W6 => 0x01,
            TapeWidth::W9 => 0x02,
            TapeWidth::W12 => 0x03,
            TapeWidth::W18 => 0x04,
            TapeWidth::W24 => 0x05,
            TapeWidth::W36 => 0x06,
        }
    }

    /// Nominal cassette width in millimeters.
    pub fn mm(self) -> u32 {
        match self {
            TapeWidth::W6 => 6,
            TapeWidth::W9 => 9,
            TapeWidth::W12 => 12,
            TapeWidth::W18 => 18,
            TapeWidth::W24 => 24,
            TapeWidth::W36 => 36,
        }
    }

    /// Printable band across the tape, in dots (multiple of 8).
    ///
    /// Measured printable widths are 5.0/7.0/10.0/15.2/20.0/26.0 mm; at
    /// 360 dpi (floored) these are 70/99/141/215/283/368 dots.
    pub fn printable_dots(self) -> u16 {
        let dots: u16 = match self {
            TapeWidth::W6 => 70,
            TapeWidth::W9 => 99,
            TapeWidth::W12 => 141,
            TapeWidth::W18 => 215,
            TapeWidth::W24 => 283,
            TapeWidth::W36 => 368,
        };
        dots.div_ceil(8) * 8
    }
}

impl std::fmt::Display for TapeWidth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}mm", self.mm())
    }
}

/// Decoded get-status payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceStatus {
    pub tape: TapeWidth,
    /// Feed motor running.
    pub feeding: bool,
    /// Previous print finished (0x2d nonzero).
    pub print_complete: bool,
}

impl DeviceStatus {
    /// A print is still in progress.
    pub fn printing(&self) -> bool {
        !self.print_complete
    }
}

/// Interpret a get-status payload.
///
/// Fault precedence: no tape, cover open, unknown width, then any other
/// byte that deviates from the baseline.
pub fn interpret(payload: &[u8]) -> Result<DeviceStatus> {
    let payload: &[u8; STATUS_PAYLOAD_SIZE] = payload.try_into().map_err(|_| {
        PrinterError::protocol(format!(
            "Invalid status payload: expected {STATUS_PAYLOAD_SIZE} bytes, got {}",
            payload.len()
        ))
    })?;
    let at = |offset: usize| payload[offset - HEADER_SIZE];

    if at(MEDIA_OFFSET) == MEDIA_NO_TAPE {
        return Err(PrinterError::DeviceFault(DeviceFault::NoTape));
    }
    if at(MEDIA_OFFSET) == MEDIA_COVER_OPEN || at(COVER_OFFSET) == COVER_OPEN {
        return Err(PrinterError::DeviceFault(DeviceFault::CoverOpen));
    }

    let tape = TapeWidth::from_class(at(TAPE_CLASS_OFFSET))?;

    for (index, &actual) in payload.iter().enumerate() {
        let offset = HEADER_SIZE + index;
        let expected = match offset {
            FEEDING_OFFSET | TAPE_CLASS_OFFSET | PRINT_DONE_OFFSET => continue,
            MEDIA_OFFSET => MEDIA_NOMINAL,
            COVER_OFFSET => COVER_NOMINAL,
            _ => BASELINE[index],
        };
        if actual != expected {
            return Err(PrinterError::UnrecognizedState {
                offset,
                expected,
                actual,
            });
        }
    }

    Ok(DeviceStatus {
        tape,
        feeding: at(FEEDING_OFFSET) != 0,
        print_complete: at(PRINT_DONE_OFFSET) != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tprt::protocol::{decode_response, tests::STATUS_CAPTURE};

    fn payload_with(changes: &[(usize, u8)]) -> [u8; STATUS_PAYLOAD_SIZE] {
        let mut payload = BASELINE;
        payload[TAPE_CLASS_OFFSET - HEADER_SIZE] = 0x04;
        for &(offset, value) in changes {
            payload[offset - HEADER_SIZE] = value;
        }
        payload
    }

    #[test]
    fn test_idle_capture() {
        let frame = decode_response(&STATUS_CAPTURE).unwrap();
        let status = interpret(&frame.payload).unwrap();
        assert_eq!(status.tape, TapeWidth::W18);
        assert!(!status.feeding);
        assert!(status.printing());
    }

    #[test]
    fn test_no_tape() {
        let err = interpret(&payload_with(&[(MEDIA_OFFSET, 0x06)])).unwrap_err();
        assert!(matches!(err, PrinterError::DeviceFault(DeviceFault::NoTape)));
    }

    #[test]
    fn test_cover_open_either_flag() {
        let err = interpret(&payload_with(&[(MEDIA_OFFSET, 0x21)])).unwrap_err();
        assert!(matches!(err, PrinterError::DeviceFault(DeviceFault::CoverOpen)));

        let err = interpret(&payload_with(&[(COVER_OFFSET, 0x80)])).unwrap_err();
        assert!(matches!(err, PrinterError::DeviceFault(DeviceFault::CoverOpen)));
    }

    #[test]
    fn test_fault_precedence() {
        // No tape wins over cover, width and baseline deviations
        let payload = payload_with(&[
            (MEDIA_OFFSET, 0x06),
            (COVER_OFFSET, 0x80),
            (TAPE_CLASS_OFFSET, 0x00),
            (0x2b, 0x40),
        ]);
        assert!(matches!(
            interpret(&payload),
            Err(PrinterError::DeviceFault(DeviceFault::NoTape))
        ));

        // Cover wins over width and baseline deviations
        let payload = payload_with(&[(COVER_OFFSET, 0x80), (TAPE_CLASS_OFFSET, 0x09), (0x2b, 0x40)]);
        assert!(matches!(
            interpret(&payload),
            Err(PrinterError::DeviceFault(DeviceFault::CoverOpen))
        ));

        // Width wins over baseline deviations
        let payload = payload_with(&[(TAPE_CLASS_OFFSET, 0x09), (0x2b, 0x40)]);
        assert!(matches!(interpret(&payload), Err(PrinterError::UnknownTapeWidth(0x09))));
    }

    #[test]
    fn test_width_classes() {
        let expected = [(1, 6), (2, 9), (3, 12), (4, 18), (5, 24), (6, 36)];
        for (class, mm) in expected {
            let status = interpret(&payload_with(&[(TAPE_CLASS_OFFSET, class)])).unwrap();
            assert_eq!(status.tape.mm(), mm);
            assert_eq!(status.tape.class(), class);
        }

        for class in [0x00, 0x07, 0x40, 0xff] {
            assert!(matches!(
                TapeWidth::from_class(class),
                Err(PrinterError::UnknownTapeWidth(c)) if c == class
            ));
        }
    }

    #[test]
    fn test_tape_exhausted_capture_is_unrecognized() {
        let payload = [
            0x14, 0x00, 0x42, 0x04, 0x00, 0x00, 0x00, 0x00, 0x40, 0x00, 0x00, 0x40, 0x00, 0x00, 0x42, 0x00, 0x40,
            0x00, 0x00, 0x00,
        ];
        let err = interpret(&payload).unwrap_err();
        assert!(matches!(
            err,
            PrinterError::UnrecognizedState {
                offset: 0x22,
                expected: 0x00,
                actual: 0x42
            }
        ));
    }

    #[test]
    fn test_baseline_deviation_reports_offset() {
        let err = interpret(&payload_with(&[(0x30, 0x42)])).unwrap_err();
        assert!(matches!(
            err,
            PrinterError::UnrecognizedState {
                offset: 0x30,
                expected: 0x00,
                actual: 0x42
            }
        ));
    }

    #[test]
    fn test_flags() {
        // Captured while printing: 0x21 = 2, 0x2d = 0
        let status = interpret(&payload_with(&[(FEEDING_OFFSET, 0x02)])).unwrap();
        assert!(status.feeding);
        assert!(status.printing());

        // Captured after completion
        let status = interpret(&payload_with(&[(PRINT_DONE_OFFSET, 0x01)])).unwrap();
        assert!(!status.feeding);
        assert!(status.print_complete);
    }

    #[test]
    fn test_wrong_payload_size() {
        assert!(matches!(interpret(&[0x14; 19]), Err(PrinterError::Protocol(_))));
        assert!(matches!(interpret(&[]), Err(PrinterError::Protocol(_))));
    }

    #[test]
    fn test_printable_dots() {
        let dots: Vec<u16> = TapeWidth::ALL.iter().map(|t| t.printable_dots()).collect();
        assert_eq!(dots, vec![72, 104, 144, 216, 288, 368]);
        assert!(dots.iter().all(|d| d % 8 == 0));
    }

    #[test]
    fn test_from_mm() {
        assert_eq!(TapeWidth::from_mm(24), Some(TapeWidth::W24));
        assert_eq!(TapeWidth::from_mm(4), None);
    }
}
