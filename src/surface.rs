// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! The overlay canvas and its registration with the tracked video.
//!
//! [`OverlaySurface`] owns at most one [`Canvas`]. While attached, its drawing size equals
//! the video's intrinsic size (keypoint pixels map 1:1) and its display rect equals the
//! video's rendered box in page coordinates.

use log::debug;

use crate::error::Result;
use crate::geometry::{Rect, Size};
use crate::host::{Canvas, HostPage, VideoHandle};
use crate::visualizer::Color;

/// Observable geometry of the surface.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SurfaceState {
    /// Resolution used for drawing coordinates.
    pub drawing_size: Size,
    /// On-page placement.
    pub display_rect: Rect,
    /// Whether a canvas is currently in the document.
    pub attached: bool,
}

/// Owner of the single overlay canvas.
#[derive(Default)]
pub struct OverlaySurface {
    canvas: Option<Box<dyn Canvas>>,
    state: SurfaceState,
}

impl OverlaySurface {
    /// Create an empty, detached surface owner.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a canvas registered with `video`.
    ///
    /// Any previous canvas is destroyed first. Returns `Ok(None)` without touching the page
    /// when the video has no decoded dimensions yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the host fails to create the canvas.
    pub fn create(
        &mut self,
        host: &dyn HostPage,
        video: &VideoHandle,
    ) -> Result<Option<SurfaceState>> {
        self.destroy();

        let drawing_size = video.intrinsic_size();
        if drawing_size.is_empty() {
            return Ok(None);
        }

        let mut canvas = host.create_canvas()?;
        canvas.set_pointer_passthrough(true);
        canvas.set_drawing_size(drawing_size);
        let display_rect = video.client_rect().translate(host.scroll_offset());
        canvas.set_display_rect(display_rect);

        self.canvas = Some(canvas);
        self.state = SurfaceState {
            drawing_size,
            display_rect,
            attached: true,
        };
        debug!(
            "overlay surface created at {:?} with {}x{} drawing size",
            display_rect, drawing_size.width, drawing_size.height
        );
        Ok(Some(self.state))
    }

    /// Re-read the video's geometry and apply whatever changed.
    ///
    /// Returns `true` if the size or rect was updated. Does nothing while detached, or
    /// while the video transiently reports `0x0` (the last good size is kept).
    pub fn resync(&mut self, host: &dyn HostPage, video: &VideoHandle) -> bool {
        let Some(canvas) = self.canvas.as_mut() else {
            return false;
        };

        let mut changed = false;
        let drawing_size = video.intrinsic_size();
        if !drawing_size.is_empty() && drawing_size != self.state.drawing_size {
            canvas.set_drawing_size(drawing_size);
            self.state.drawing_size = drawing_size;
            changed = true;
        }

        let display_rect = video.client_rect().translate(host.scroll_offset());
        if display_rect != self.state.display_rect {
            canvas.set_display_rect(display_rect);
            self.state.display_rect = display_rect;
            changed = true;
        }
        changed
    }

    /// Wipe all drawing, keeping size and position.
    pub fn clear(&mut self) {
        if let Some(canvas) = self.canvas.as_mut() {
            canvas.clear();
        }
    }

    /// Draw a filled point.
    pub fn draw_point(&mut self, x: f32, y: f32, radius: f32, color: Color) {
        if let Some(canvas) = self.canvas.as_mut() {
            canvas.fill_circle((x, y), radius, color);
        }
    }

    /// Draw a line segment.
    pub fn draw_line(&mut self, from: (f32, f32), to: (f32, f32), width: f32, color: Color) {
        if let Some(canvas) = self.canvas.as_mut() {
            canvas.stroke_line(from, to, width, color);
        }
    }

    /// Draw a hollow rectangle from `[x1, y1, x2, y2]`.
    pub fn draw_rect(&mut self, xyxy: [f32; 4], width: f32, color: Color) {
        if let Some(canvas) = self.canvas.as_mut() {
            canvas.stroke_rect(xyxy, width, color);
        }
    }

    /// Remove the canvas from the page. Safe to call repeatedly.
    pub fn destroy(&mut self) {
        if let Some(mut canvas) = self.canvas.take() {
            canvas.remove();
            debug!("overlay surface destroyed");
        }
        self.state = SurfaceState::default();
    }

    /// Current geometry.
    #[must_use]
    pub const fn state(&self) -> SurfaceState {
        self.state
    }

    /// Whether a canvas is attached.
    #[must_use]
    pub const fn is_attached(&self) -> bool {
        self.state.attached
    }
}

impl Drop for OverlaySurface {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::sim::SimulatedPage;

    #[test]
    fn test_create_registers_with_video() {
        let page = SimulatedPage::new();
        page.scroll_to(Point::new(0.0, 40.0));
        let video = page.insert_video(Size::new(1280, 720), Rect::new(100.0, 200.0, 640.0, 360.0));

        let mut surface = OverlaySurface::new();
        let state = surface.create(&page, &video.handle()).unwrap().unwrap();

        assert_eq!(state.drawing_size, Size::new(1280, 720));
        assert_eq!(state.display_rect, Rect::new(100.0, 240.0, 640.0, 360.0));
        assert_eq!(page.canvas_count(), 1);
        assert!(page.canvas(0).unwrap().pointer_passthrough);
    }

    #[test]
    fn test_create_not_ready() {
        let page = SimulatedPage::new();
        let video = page.insert_video(Size::new(0, 0), Rect::new(0.0, 0.0, 640.0, 360.0));

        let mut surface = OverlaySurface::new();
        assert!(surface.create(&page, &video.handle()).unwrap().is_none());
        assert_eq!(page.canvas_count(), 0);
        assert!(!surface.is_attached());
    }

    #[test]
    fn test_create_replaces_existing_canvas() {
        let page = SimulatedPage::new();
        let video = page.insert_video(Size::new(640, 360), Rect::new(0.0, 0.0, 640.0, 360.0));

        let mut surface = OverlaySurface::new();
        surface.create(&page, &video.handle()).unwrap();
        surface.create(&page, &video.handle()).unwrap();
        assert_eq!(page.canvas_count(), 1);
    }

    #[test]
    fn test_resync_is_idempotent() {
        let page = SimulatedPage::new();
        let video = page.insert_video(Size::new(640, 360), Rect::new(0.0, 0.0, 640.0, 360.0));
        let mut surface = OverlaySurface::new();
        surface.create(&page, &video.handle()).unwrap();

        video.set_intrinsic_size(Size::new(1920, 1080));
        video.set_client_rect(Rect::new(0.0, 0.0, 1280.0, 720.0));
        assert!(surface.resync(&page, &video.handle()));
        assert!(!surface.resync(&page, &video.handle()));
        assert_eq!(surface.state().drawing_size, Size::new(1920, 1080));
        assert_eq!(page.canvas(0).unwrap().drawing_size, Size::new(1920, 1080));
    }

    #[test]
    fn test_destroy_twice() {
        let page = SimulatedPage::new();
        let video = page.insert_video(Size::new(640, 360), Rect::new(0.0, 0.0, 640.0, 360.0));
        let mut surface = OverlaySurface::new();
        surface.create(&page, &video.handle()).unwrap();

        surface.destroy();
        let once = surface.state();
        surface.destroy();
        assert_eq!(surface.state(), once);
        assert_eq!(page.canvas_count(), 0);

        // Drawing on a destroyed surface is a no-op.
        surface.draw_point(1.0, 1.0, 2.0, Color::RED);
    }
}
