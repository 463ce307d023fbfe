//! Ready-made label layouts.

use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::mono_font::ascii::FONT_10X20;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
use embedded_graphics::text::{Alignment, Baseline, Text, TextStyleBuilder};
use qrcode::QrCode;
use tracing::debug;

use super::LabelCanvas;
use crate::error::{PrinterError, Result};
use crate::raster::{dots_to_mm, mm_to_dots};

// FONT_10X20 cell
const GLYPH_WIDTH: u32 = 10;
const GLYPH_HEIGHT: u32 = 20;

// Modules of blank border around a QR code
const QR_QUIET_ZONE: u32 = 4;

fn fill(canvas: &mut LabelCanvas, x: u32, y: u32, width: u32, height: u32, on: bool) -> Result<()> {
    Rectangle::new(point(x, y), Size::new(width, height))
        .into_styled(PrimitiveStyle::with_fill(BinaryColor::from(on)))
        .draw(canvas)?;
    Ok(())
}

fn point(x: u32, y: u32) -> Point {
    Point::new(
        i32::try_from(x).unwrap_or(i32::MAX),
        i32::try_from(y).unwrap_or(i32::MAX),
    )
}

fn mm(value: f64) -> u32 {
    mm_to_dots(value)
}

/// `text` in FONT_10X20, centered on a canvas sized to fit it.
fn text_canvas(text: &str, margin: u32) -> Result<LabelCanvas> {
    let chars = u32::try_from(text.chars().count())
        .map_err(|_| PrinterError::encoding("Label text too long"))?;
    let width = chars
        .checked_mul(GLYPH_WIDTH)
        .and_then(|w| w.checked_add(margin))
        .ok_or_else(|| PrinterError::encoding("Label text too long"))?;
    let mut canvas = LabelCanvas::new(width, GLYPH_HEIGHT + margin)?;

    let style = TextStyleBuilder::new()
        .alignment(Alignment::Center)
        .baseline(Baseline::Middle)
        .build();
    Text::with_text_style(
        text,
        canvas.bounding_box().center(),
        MonoTextStyle::new(&FONT_10X20, BinaryColor::On),
        style,
    )
    .draw(&mut canvas)?;
    Ok(canvas)
}

/// Calibration label: 1 mm outline, 0.5 mm squares on a 1 mm grid, a
/// 1 cm square with a 5 mm hole at the origin, and a boxed "Ag" in the
/// middle scaled to the tape.
pub fn test_pattern(tape_dots: u16, length_dots: u32) -> Result<LabelCanvas> {
    let height = u32::from(tape_dots);
    let mut canvas = LabelCanvas::new(length_dots, height)?;

    fill(&mut canvas, 0, 0, length_dots, height, true)?;
    fill(
        &mut canvas,
        mm(1.0),
        mm(1.0),
        length_dots.saturating_sub(mm(2.0)),
        height.saturating_sub(mm(2.0)),
        false,
    )?;

    let square = mm(0.5);
    let columns = dots_to_mm(length_dots).ceil() as u32;
    let rows = dots_to_mm(height).ceil() as u32;
    for y_mm in 0..rows {
        for x_mm in 0..columns {
            fill(&mut canvas, mm(f64::from(x_mm)), mm(f64::from(y_mm)), square, square, true)?;
        }
    }

    fill(&mut canvas, 0, 0, mm(10.0), mm(10.0), true)?;
    fill(&mut canvas, mm(2.5), mm(2.5), mm(5.0), mm(5.0), false)?;

    // Outlined text box, 2 px of space on each side of the glyphs
    let glyphs = text_canvas("Ag", 4)?;
    let (w, h) = (glyphs.width(), glyphs.height());
    let mut boxed = LabelCanvas::new(w, h)?;
    fill(&mut boxed, 0, 0, w, h, true)?;
    fill(&mut boxed, 1, 1, w - 2, h - 2, false)?;
    boxed.overlay_or(&glyphs, 0, 0);

    let r = (height.min(length_dots) / h).max(1);
    let text = boxed.scaled(r)?;
    canvas.overlay_or(
        &text,
        length_dots.saturating_sub(text.width()) / 2,
        height.saturating_sub(text.height()) / 2,
    );

    debug!("Test pattern {length_dots}x{height} dots, text scaled x{r}");
    Ok(canvas)
}

/// QR code of `text` filling the tape height, followed by `text` itself
/// scaled to the tape.
pub fn qr_label(text: &str, tape_dots: u16) -> Result<LabelCanvas> {
    if text.is_empty() {
        return Err(PrinterError::encoding("QR label text is empty"));
    }
    let side = u32::from(tape_dots);

    let code = QrCode::new(text.as_bytes())
        .map_err(|e| PrinterError::encoding(format!("QR code generation failed: {e}")))?;
    let modules = u32::try_from(code.width()).unwrap_or(u32::MAX);
    let cell = side / modules.saturating_add(2 * QR_QUIET_ZONE);
    if cell == 0 {
        return Err(PrinterError::encoding(format!(
            "QR code of {modules} modules does not fit {side} dots"
        )));
    }

    let mut qr = LabelCanvas::new(side, side)?;
    let offset = (side - modules * cell) / 2;
    for qy in 0..code.width() {
        for qx in 0..code.width() {
            if code[(qx, qy)] == qrcode::Color::Dark {
                let x = offset + qx as u32 * cell;
                let y = offset + qy as u32 * cell;
                fill(&mut qr, x, y, cell, cell, true)?;
            }
        }
    }

    let caption = text_canvas(text, 0)?;
    let caption = caption.scaled((side / GLYPH_HEIGHT).max(1))?;

    let width = side
        .checked_add(caption.width())
        .ok_or_else(|| PrinterError::encoding("QR label too long"))?;
    let mut canvas = LabelCanvas::new(width, side)?;
    canvas.overlay_or(&qr, 0, 0);
    canvas.overlay_or(&caption, side, side.saturating_sub(caption.height()) / 2);

    debug!("QR label: {modules} modules of {cell} dots, {width}x{side} dots");
    Ok(canvas)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(canvas: &LabelCanvas, x0: u32, y0: u32, x1: u32, y1: u32) -> usize {
        (y0..y1)
            .flat_map(|y| (x0..x1).map(move |x| (x, y)))
            .filter(|(x, y)| canvas.get(*x, *y))
            .count()
    }

    #[test]
    fn test_pattern_layout_on_24mm() {
        let canvas = test_pattern(288, mm_to_dots(30.0)).unwrap();
        assert_eq!((canvas.width(), canvas.height()), (425, 288));

        // Outline along every edge
        assert!(canvas.get(424, 100));
        assert!(canvas.get(200, 287));
        assert!(canvas.get(200, 0));

        // Square with a hole at the origin
        assert!(canvas.get(10, 10));
        assert!(!canvas.get(50, 50));
        assert!(canvas.get(140, 140));

        // Grid square at 27 mm, gap between grid squares
        assert!(canvas.get(mm_to_dots(27.0) + 1, mm_to_dots(3.0) + 1));
        assert!(!canvas.get(mm_to_dots(27.0) + 10, mm_to_dots(3.0) + 10));

        // Text box centered: 24 px box scaled x12 fills the tape height
        let left = (425 - 288) / 2;
        assert!(canvas.get(left, 144));
        assert!(canvas.get(left + 287, 144));
        assert!(count(&canvas, left + 12, 12, left + 276, 276) > 0);
    }

    #[test]
    fn test_pattern_prints_within_head() {
        let canvas = test_pattern(288, 425).unwrap();
        let bitmap = canvas.to_bitmap().unwrap();
        assert_eq!((bitmap.width(), bitmap.height()), (288, 425));
        // Last canvas column is the first line printed
        assert!(bitmap.get(100, 0));
    }

    #[test]
    fn test_pattern_short_label() {
        let canvas = test_pattern(104, 10).unwrap();
        assert_eq!((canvas.width(), canvas.height()), (10, 104));
        assert!(canvas.get(0, 0));
    }

    #[test]
    fn test_qr_label_layout() {
        let canvas = qr_label("tprt", 288).unwrap();
        // Square code, then 4 glyphs scaled x14
        assert_eq!(canvas.height(), 288);
        assert_eq!(canvas.width(), 288 + 4 * 10 * 14);

        // Quiet zone stays blank, finder pattern is dark
        assert_eq!(count(&canvas, 0, 0, 288, 10), 0);
        assert!(count(&canvas, 20, 20, 100, 100) > 0);
        assert!(count(&canvas, 288, 0, canvas.width(), 288) > 0);
    }

    #[test]
    fn test_qr_label_rejects_empty_and_oversized() {
        assert!(matches!(qr_label("", 288), Err(PrinterError::Encoding(_))));

        let long = "x".repeat(400);
        assert!(matches!(qr_label(&long, 72), Err(PrinterError::Encoding(_))));
    }
}
