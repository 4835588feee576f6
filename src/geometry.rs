// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Sizes and rectangles shared by the video, the surface, and the host.

use serde::{Deserialize, Serialize};

/// Intrinsic (decoded) pixel dimensions of a video or drawing surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Size {
    /// Create a new size.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A size with a zero dimension cannot back a drawing surface.
    ///
    /// Videos report `0x0` until metadata has loaded, which is the "not ready" condition.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A position in CSS pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// An on-page rectangle in CSS pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge.
    pub left: f64,
    /// Top edge.
    pub top: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

impl Rect {
    /// Create a new rectangle.
    #[must_use]
    pub const fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Shift the rectangle by an offset.
    ///
    /// Used to turn a viewport-relative bounding rect into page coordinates by adding
    /// the current scroll offset.
    #[must_use]
    pub fn translate(&self, offset: Point) -> Self {
        Self {
            left: self.left + offset.x,
            top: self.top + offset.y,
            ..*self
        }
    }

    /// Right edge.
    #[must_use]
    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    /// Bottom edge.
    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_is_empty() {
        assert!(Size::new(0, 0).is_empty());
        assert!(Size::new(1280, 0).is_empty());
        assert!(!Size::new(1280, 720).is_empty());
    }

    #[test]
    fn test_rect_translate() {
        let rect = Rect::new(100.0, 200.0, 640.0, 360.0).translate(Point::new(0.0, 50.0));
        assert_eq!(rect, Rect::new(100.0, 250.0, 640.0, 360.0));
        assert_eq!(rect.right(), 740.0);
        assert_eq!(rect.bottom(), 610.0);
    }
}
