// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! In-memory canvas backed by an RGBA image.

use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect as PixelRect;

use super::color::Color;
use crate::geometry::{Rect, Size};
use crate::host::Canvas;

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// A [`Canvas`] that rasterizes into an [`RgbaImage`].
///
/// Used by the simulated host and for PNG snapshots of the overlay.
#[derive(Debug, Clone)]
pub struct RasterCanvas {
    image: RgbaImage,
    display_rect: Rect,
    pointer_passthrough: bool,
    removed: bool,
}

impl Default for RasterCanvas {
    fn default() -> Self {
        Self {
            image: RgbaImage::new(0, 0),
            display_rect: Rect::default(),
            pointer_passthrough: false,
            removed: false,
        }
    }
}

impl RasterCanvas {
    /// Create an empty canvas.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The rasterized overlay.
    #[must_use]
    pub const fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Current drawing size.
    #[must_use]
    pub fn drawing_size(&self) -> Size {
        Size::new(self.image.width(), self.image.height())
    }

    /// Current placement on the page.
    #[must_use]
    pub const fn display_rect(&self) -> Rect {
        self.display_rect
    }

    /// Whether pointer events pass through.
    #[must_use]
    pub const fn pointer_passthrough(&self) -> bool {
        self.pointer_passthrough
    }

    /// Whether [`Canvas::remove`] was called.
    #[must_use]
    pub const fn is_removed(&self) -> bool {
        self.removed
    }

    /// Number of non-transparent pixels.
    #[must_use]
    pub fn painted_pixels(&self) -> usize {
        self.image.pixels().filter(|p| p.0[3] != 0).count()
    }

    fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }
}

impl Canvas for RasterCanvas {
    fn set_drawing_size(&mut self, size: Size) {
        self.image = RgbaImage::new(size.width, size.height);
    }

    fn set_display_rect(&mut self, rect: Rect) {
        self.display_rect = rect;
    }

    fn set_pointer_passthrough(&mut self, passthrough: bool) {
        self.pointer_passthrough = passthrough;
    }

    fn clear(&mut self) {
        for pixel in self.image.pixels_mut() {
            *pixel = TRANSPARENT;
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn fill_circle(&mut self, center: (f32, f32), radius: f32, color: Color) {
        if self.is_empty() {
            return;
        }
        let center = (center.0.round() as i32, center.1.round() as i32);
        draw_filled_circle_mut(&mut self.image, center, radius.round().max(1.0) as i32, color.to_rgba());
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn stroke_line(&mut self, from: (f32, f32), to: (f32, f32), width: f32, color: Color) {
        if self.is_empty() {
            return;
        }
        let (dx, dy) = (to.0 - from.0, to.1 - from.1);
        let len = dx.hypot(dy);
        if len == 0.0 {
            return;
        }
        // Offset parallel segments along the normal to get the stroke width
        let (nx, ny) = (-dy / len, dx / len);
        let passes = width.round().max(1.0) as u32;
        let rgba = color.to_rgba();
        for pass in 0..passes {
            let offset = pass as f32 - (passes - 1) as f32 / 2.0;
            draw_line_segment_mut(
                &mut self.image,
                (from.0 + nx * offset, from.1 + ny * offset),
                (to.0 + nx * offset, to.1 + ny * offset),
                rgba,
            );
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn stroke_rect(&mut self, xyxy: [f32; 4], width: f32, color: Color) {
        if self.is_empty() {
            return;
        }
        let max_x = self.image.width() as i32 - 1;
        let max_y = self.image.height() as i32 - 1;
        let x1 = (xyxy[0].round() as i32).clamp(0, max_x);
        let y1 = (xyxy[1].round() as i32).clamp(0, max_y);
        let x2 = (xyxy[2].round() as i32).clamp(0, max_x);
        let y2 = (xyxy[3].round() as i32).clamp(0, max_y);

        let thickness = width.round().max(1.0) as i32;
        for t in 0..thickness {
            let tx1 = (x1 + t).min(x2);
            let ty1 = (y1 + t).min(y2);
            let tx2 = (x2 - t).max(tx1);
            let ty2 = (y2 - t).max(ty1);
            if tx2 > tx1 && ty2 > ty1 {
                let rect = PixelRect::at(tx1, ty1).of_size((tx2 - tx1) as u32, (ty2 - ty1) as u32);
                draw_hollow_rect_mut(&mut self.image, rect, color.to_rgba());
            }
        }
    }

    fn remove(&mut self) {
        self.removed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_and_clear() {
        let mut canvas = RasterCanvas::new();
        canvas.set_drawing_size(Size::new(64, 48));
        assert_eq!(canvas.drawing_size(), Size::new(64, 48));

        canvas.fill_circle((32.0, 24.0), 4.0, Color::GREEN);
        assert!(canvas.painted_pixels() > 0);

        canvas.clear();
        assert_eq!(canvas.painted_pixels(), 0);
        assert_eq!(canvas.drawing_size(), Size::new(64, 48));
    }

    #[test]
    fn test_line_and_rect_paint() {
        let mut canvas = RasterCanvas::new();
        canvas.set_drawing_size(Size::new(32, 32));
        canvas.stroke_line((0.0, 0.0), (31.0, 31.0), 3.0, Color::BLUE);
        canvas.stroke_rect([4.0, 4.0, 20.0, 20.0], 2.0, Color::RED);
        assert_eq!(canvas.image().get_pixel(10, 4), &Color::RED.to_rgba());
        assert!(canvas.painted_pixels() > 31);
    }

    #[test]
    fn test_draw_on_empty_canvas_is_noop() {
        let mut canvas = RasterCanvas::new();
        canvas.fill_circle((0.0, 0.0), 2.0, Color::RED);
        canvas.stroke_rect([0.0, 0.0, 5.0, 5.0], 1.0, Color::RED);
        assert_eq!(canvas.painted_pixels(), 0);
    }
}
