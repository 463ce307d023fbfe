//! Drawable label surface.
//!
//! A `LabelCanvas` is laid out the way the label reads: `x` runs along the
//! tape (label length), `y` across it. [`LabelCanvas::to_bitmap`] turns it
//! into print order, one raster line per column, last column first.

use embedded_graphics::Pixel;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::{DrawTarget, OriginDimensions, Size};

use crate::error::{PrinterError, Result};
use crate::raster::Bitmap;

/// Monochrome drawing surface for one label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelCanvas {
    width: u32,
    height: u32,
    dots: Vec<bool>,
}

impl LabelCanvas {
    /// Blank canvas of `width` dots along the tape by `height` across it.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let size = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| PrinterError::encoding(format!("Canvas too large: {width}x{height} dots")))?;

        Ok(Self {
            width,
            height,
            dots: vec![false; size],
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Dot at (x, y); outside the canvas is blank.
    pub fn get(&self, x: u32, y: u32) -> bool {
        self.index(x, y).is_some_and(|i| self.dots[i])
    }

    /// Set a dot; writes outside the canvas are ignored.
    pub fn set(&mut self, x: u32, y: u32, on: bool) {
        if let Some(i) = self.index(x, y) {
            self.dots[i] = on;
        }
    }

    /// Blow every dot up to an `r` x `r` block.
    pub fn scaled(&self, r: u32) -> Result<Self> {
        let overflow = || PrinterError::encoding(format!("Cannot scale {}x{} by {r}", self.width, self.height));
        let width = self.width.checked_mul(r).ok_or_else(overflow)?;
        let height = self.height.checked_mul(r).ok_or_else(overflow)?;

        let mut scaled = Self::new(width, height)?;
        for y in 0..height {
            for x in 0..width {
                scaled.set(x, y, self.get(x / r, y / r));
            }
        }
        Ok(scaled)
    }

    /// Rotate a quarter turn counter-clockwise.
    pub fn rotated(&self) -> Self {
        let mut rotated = Self {
            width: self.height,
            height: self.width,
            dots: vec![false; self.dots.len()],
        };
        for y in 0..rotated.height {
            for x in 0..rotated.width {
                rotated.set(x, y, self.get(rotated.height - 1 - y, x));
            }
        }
        rotated
    }

    /// OR `other` into this canvas with its top-left corner at (px, py).
    /// Parts falling outside are clipped.
    pub fn overlay_or(&mut self, other: &Self, px: u32, py: u32) {
        for y in 0..other.height {
            for x in 0..other.width {
                if other.get(x, y) {
                    if let (Some(tx), Some(ty)) = (px.checked_add(x), py.checked_add(y)) {
                        self.set(tx, ty, true);
                    }
                }
            }
        }
    }

    /// Print order: bitmap row `n` is canvas column `width - 1 - n`, and
    /// bitmap dot `x` is canvas row `x`.
    pub fn to_bitmap(&self) -> Result<Bitmap> {
        let mut bitmap = Bitmap::new(self.height, self.width)?;
        for line in 0..self.width {
            let column = self.width - 1 - line;
            for x in 0..self.height {
                if self.get(column, x) {
                    bitmap.set(x, line, true);
                }
            }
        }
        Ok(bitmap)
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y as usize * self.width as usize + x as usize)
    }
}

impl DrawTarget for LabelCanvas {
    type Color = BinaryColor;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> std::result::Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if let (Ok(x), Ok(y)) = (u32::try_from(point.x), u32::try_from(point.y)) {
                self.set(x, y, color.is_on());
            }
        }
        Ok(())
    }
}

impl OriginDimensions for LabelCanvas {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}
