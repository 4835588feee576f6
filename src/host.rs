// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Boundary between the overlay core and the page that hosts the video.
//!
//! The core never looks elements up by global ID. Everything it touches on the page is
//! an explicit handle obtained from a [`HostPage`]: videos ([`VideoHandle`]), the canvas
//! ([`Canvas`]), and observer registrations ([`Subscription`]).

use std::fmt;
use std::rc::Rc;

use crate::control::OverlayStatus;
use crate::error::Result;
use crate::geometry::{Point, Rect, Size};
use crate::visualizer::Color;

/// Stable identity of a video element for the lifetime of the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VideoId(pub u64);

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "video#{}", self.0)
    }
}

/// A video element owned by the host page.
pub trait Video {
    /// Identity used to detect element replacement.
    fn id(&self) -> VideoId;
    /// Decoded frame size; `0x0` until metadata has loaded.
    fn intrinsic_size(&self) -> Size;
    /// Rendered box in viewport coordinates.
    fn client_rect(&self) -> Rect;
    /// Whether playback is paused.
    fn is_paused(&self) -> bool;
    /// Whether playback reached the end.
    fn is_ended(&self) -> bool;

    /// A frame can be sampled: dimensions known and playback running.
    fn is_decodable(&self) -> bool {
        !self.intrinsic_size().is_empty() && !self.is_paused() && !self.is_ended()
    }
}

/// Shared handle to a host video. The overlay only keeps `Weak` copies.
pub type VideoHandle = Rc<dyn Video>;

/// Native observation primitives a geometry watcher registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometrySource {
    /// The video's decoded size changed (`resize` / `loadedmetadata`).
    IntrinsicResize,
    /// The video element's box changed size.
    ElementResize,
    /// Attributes of the player container changed (fullscreen, theater mode).
    LayoutMutation,
    /// The page scrolled.
    Scroll,
    /// The window resized.
    WindowResize,
}

impl GeometrySource {
    /// Every source, in registration order.
    pub const ALL: [Self; 5] = [
        Self::IntrinsicResize,
        Self::ElementResize,
        Self::LayoutMutation,
        Self::Scroll,
        Self::WindowResize,
    ];
}

/// Callback invoked by a native observer.
pub type ChangeCallback = Rc<dyn Fn()>;

/// A live observer or listener registration.
///
/// `cancel` must unregister the native primitive and drop the callback. Implementations
/// also cancel on drop so a forgotten handle cannot leak.
pub trait Subscription {
    /// Unregister. Calling more than once is a no-op.
    fn cancel(&mut self);
}

/// Drawing surface inserted into the page.
///
/// Coordinates passed to the draw calls are in drawing-size pixels.
pub trait Canvas {
    /// Set the intrinsic drawing resolution. Resizing wipes the contents.
    fn set_drawing_size(&mut self, size: Size);
    /// Position and size the element in page coordinates.
    fn set_display_rect(&mut self, rect: Rect);
    /// Let pointer events fall through to the page underneath.
    fn set_pointer_passthrough(&mut self, passthrough: bool);
    /// Wipe all drawing.
    fn clear(&mut self);
    /// Draw a filled circle.
    fn fill_circle(&mut self, center: (f32, f32), radius: f32, color: Color);
    /// Draw a line segment.
    fn stroke_line(&mut self, from: (f32, f32), to: (f32, f32), width: f32, color: Color);
    /// Draw a hollow rectangle from `[x1, y1, x2, y2]`.
    fn stroke_rect(&mut self, xyxy: [f32; 4], width: f32, color: Color);
    /// Detach the element from the document.
    fn remove(&mut self);
}

/// The page hosting the video.
pub trait HostPage {
    /// Every element matching `selector`, in document order.
    fn video_candidates(&self, selector: &str) -> Vec<VideoHandle>;

    /// Current page scroll offset.
    fn scroll_offset(&self) -> Point;

    /// Create a canvas and insert it into the document.
    ///
    /// # Errors
    ///
    /// Returns an error if the host cannot create or insert the element.
    fn create_canvas(&self) -> Result<Box<dyn Canvas>>;

    /// Register one native observation primitive for `video`.
    ///
    /// # Errors
    ///
    /// Returns an error if the primitive cannot be created.
    fn subscribe(
        &self,
        source: GeometrySource,
        video: &VideoHandle,
        callback: ChangeCallback,
    ) -> Result<Box<dyn Subscription>>;

    /// Deliver a status notification to the control panel.
    fn notify_status(&self, status: &OverlayStatus);
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Still(Size, bool);

    impl Video for Still {
        fn id(&self) -> VideoId {
            VideoId(1)
        }
        fn intrinsic_size(&self) -> Size {
            self.0
        }
        fn client_rect(&self) -> Rect {
            Rect::default()
        }
        fn is_paused(&self) -> bool {
            self.1
        }
        fn is_ended(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_is_decodable() {
        assert!(Still(Size::new(640, 480), false).is_decodable());
        assert!(!Still(Size::new(640, 480), true).is_decodable());
        assert!(!Still(Size::new(0, 0), false).is_decodable());
    }

    #[test]
    fn test_video_id_display() {
        assert_eq!(VideoId(7).to_string(), "video#7");
    }
}
