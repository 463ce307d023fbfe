//! Print requests and dot geometry.

use std::fmt;

use crate::error::{PrinterError, Result};

/// Print head resolution.
pub const DOTS_PER_INCH: f64 = 360.0;

/// Widest line the head can address.
pub const MAX_WIDTH_DOTS: u16 = 384;

/// Convert millimeters to dots at 360 dpi, rounded to the nearest dot.
pub fn mm_to_dots(mm: f64) -> u32 {
    (mm * DOTS_PER_INCH / 25.4).round() as u32
}

/// Convert dots back to millimeters.
pub fn dots_to_mm(dots: u32) -> f64 {
    f64::from(dots) * 25.4 / DOTS_PER_INCH
}

/// Default test pattern: diagonal stripes every 32 dots.
pub fn stripes(x: u32, y: u32) -> bool {
    (x + y) % 32 == 0
}

type PixelRule = Box<dyn Fn(u32, u32) -> bool + Send + Sync>;

/// Monochrome image, `width` dots across the tape by `height` lines along it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    dots: Vec<bool>,
}

impl Bitmap {
    /// Blank image; `width` is capped at what the head can address.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width > u32::from(MAX_WIDTH_DOTS) {
            return Err(PrinterError::encoding(format!(
                "Bitmap too wide: {width} dots (at most {MAX_WIDTH_DOTS})"
            )));
        }
        let size = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| PrinterError::encoding(format!("Bitmap too large: {width}x{height} dots")))?;

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

    /// Dot at (x, y); outside the image is blank.
    pub fn get(&self, x: u32, y: u32) -> bool {
        self.index(x, y).is_some_and(|i| self.dots[i])
    }

    /// Set a dot; writes outside the image are ignored.
    pub fn set(&mut self, x: u32, y: u32, on: bool) {
        if let Some(i) = self.index(x, y) {
            self.dots[i] = on;
        }
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y as usize * self.width as usize + x as usize)
    }
}

/// One label to print.
///
/// Consumed once by the encoder; `y` runs along the tape (one line per
/// step), `x` across it.
pub struct RasterJob {
    width_dots: u16,
    length_dots: u32,
    pixels: PixelRule,
}

impl RasterJob {
    /// A full-width label of `length_mm`, filled with the stripe pattern.
    pub fn new(length_mm: f64) -> Result<Self> {
        if !length_mm.is_finite() || length_mm < 0.0 {
            return Err(PrinterError::encoding(format!("Invalid label length: {length_mm} mm")));
        }
        let length_dots = length_mm * DOTS_PER_INCH / 25.4;
        if length_dots.round() > f64::from(u32::MAX) {
            return Err(PrinterError::encoding(format!("Label too long: {length_mm} mm")));
        }

        Ok(Self {
            width_dots: MAX_WIDTH_DOTS,
            length_dots: mm_to_dots(length_mm),
            pixels: Box::new(stripes),
        })
    }

    /// A label carrying `bitmap`, one line per bitmap row.
    pub fn from_bitmap(bitmap: Bitmap) -> Result<Self> {
        let width = u16::try_from(bitmap.width())
            .map_err(|_| PrinterError::encoding(format!("Bitmap too wide: {} dots", bitmap.width())))?;
        let length_dots = bitmap.height();

        Self {
            width_dots: MAX_WIDTH_DOTS,
            length_dots,
            pixels: Box::new(move |x, y| bitmap.get(x, y)),
        }
        .with_width(width)
    }

    /// An empty label; the device only feeds and cuts.
    pub fn blank() -> Self {
        Self {
            width_dots: MAX_WIDTH_DOTS,
            length_dots: 0,
            pixels: Box::new(|_, _| false),
        }
    }

    /// Narrow the line width (at most 384 dots).
    pub fn with_width(mut self, width_dots: u16) -> Result<Self> {
        if width_dots == 0 || width_dots > MAX_WIDTH_DOTS {
            return Err(PrinterError::encoding(format!(
                "Line width {width_dots} dots outside 1..={MAX_WIDTH_DOTS}"
            )));
        }
        self.width_dots = width_dots;
        Ok(self)
    }

    /// Replace the pixel rule.
    pub fn with_pixels(mut self, rule: impl Fn(u32, u32) -> bool + Send + Sync + 'static) -> Self {
        self.pixels = Box::new(rule);
        self
    }

    pub fn width_dots(&self) -> u16 {
        self.width_dots
    }

    /// Bytes of dot data per line.
    pub fn width_bytes(&self) -> usize {
        usize::from(self.width_dots).div_ceil(8)
    }

    /// Number of lines, i.e. label length in dots.
    pub fn length_dots(&self) -> u32 {
        self.length_dots
    }

    /// Whether the dot at (x, y) is printed.
    pub fn pixel(&self, x: u32, y: u32) -> bool {
        (self.pixels)(x, y)
    }
}

impl fmt::Debug for RasterJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterJob")
            .field("width_dots", &self.width_dots)
            .field("length_dots", &self.length_dots)
            .finish_non_exhaustive()
    }
}
