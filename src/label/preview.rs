//! PNG preview of a label, as it reads on the tape.

use std::path::Path;

use image::{GrayImage, ImageEncoder, Luma};
use tracing::info;

use super::LabelCanvas;
use crate::error::{PrinterError, Result};

/// Encode `canvas` as an 8-bit grayscale PNG, black dots on white.
pub fn render_png(canvas: &LabelCanvas) -> Result<Vec<u8>> {
    let (width, height) = (canvas.width(), canvas.height());
    let mut img = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let color = if canvas.get(x, y) { 0u8 } else { 255u8 };
            img.put_pixel(x, y, Luma([color]));
        }
    }

    let mut png_bytes = Vec::new();
    image::codecs::png::PngEncoder::new(&mut png_bytes)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::L8)
        .map_err(|e: image::ImageError| PrinterError::encoding(format!("PNG encoding failed: {e}")))?;
    Ok(png_bytes)
}

/// Render `canvas` and write it to `path`.
pub fn write_preview(canvas: &LabelCanvas, path: &Path) -> Result<()> {
    let png = render_png(canvas)?;
    std::fs::write(path, &png)?;
    info!("Preview ({}x{} dots) written to {:?}", canvas.width(), canvas.height(), path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_png_pixels() {
        let mut canvas = LabelCanvas::new(3, 2).unwrap();
        canvas.set(2, 1, true);

        let png = render_png(&canvas).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");

        let decoded = image::load_from_memory(&png).unwrap().to_luma8();
        assert_eq!(decoded.dimensions(), (3, 2));
        assert_eq!(decoded.get_pixel(2, 1), &Luma([0]));
        assert_eq!(decoded.get_pixel(0, 0), &Luma([255]));
    }

    #[test]
    fn test_write_preview() {
        let path = std::env::temp_dir().join(format!("tprt-label-preview-{}.png", std::process::id()));
        let canvas = LabelCanvas::new(16, 8).unwrap();
        write_preview(&canvas, &path).unwrap();

        let written = std::fs::read(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(written, render_png(&canvas).unwrap());
    }
}
