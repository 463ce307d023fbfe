//! Label drawing: canvas, stock layouts and PNG preview.

mod canvas;
mod pattern;
mod preview;

pub use canvas::LabelCanvas;
pub use pattern::{qr_label, test_pattern};
pub use preview::{render_png, write_preview};
