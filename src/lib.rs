// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

#![allow(clippy::multiple_crate_versions)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # Pose Overlay
//!
//! Draws pose-estimation keypoints on a transparent canvas laid exactly over a video
//! element, and keeps the two aligned while the host page resizes, scrolls, re-lays out,
//! or swaps the video for a new element.
//!
//! The library is host-agnostic: it talks to the page through the [`HostPage`], [`Video`],
//! and [`Canvas`] traits. [`sim::SimulatedPage`] implements them in memory (tests and the
//! `pose-overlay simulate` command), and the `web` feature adds a browser backend for
//! `wasm32`.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::rc::Rc;
//! use pose_overlay::sim::{FrameClock, SimulatedPage, SyntheticEstimator};
//! use pose_overlay::{FrameRequest, OverlayConfig, OverlaySession, Rect, Size};
//!
//! let page = SimulatedPage::new();
//! page.insert_video(Size::new(1280, 720), Rect::new(100.0, 200.0, 640.0, 360.0));
//!
//! let mut session = OverlaySession::new(
//!     Rc::new(page.clone()),
//!     Rc::new(SyntheticEstimator::new(0)),
//!     OverlayConfig::default(),
//! );
//! session.start();
//!
//! let mut clock = FrameClock::default();
//! for _ in 0..10 {
//!     if session.on_frame(clock.tick()) == FrameRequest::Stop {
//!         break;
//!     }
//! }
//! assert_eq!(session.surface_state().drawing_size, Size::new(1280, 720));
//! session.stop();
//! assert_eq!(page.canvas_count(), 0);
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`session`] | [`OverlaySession`] lifecycle and video-swap recovery |
//! | [`control`] | Panel commands, status messages, [`OverlayController`] |
//! | [`locator`] | [`VideoLocator`] picks the current video |
//! | [`surface`] | [`OverlaySurface`] owns the overlay canvas |
//! | [`watcher`] | [`GeometryWatcher`] observes size and layout changes |
//! | [`render_loop`] | [`PoseRenderLoop`] estimate → draw cycle |
//! | [`pose`] | Pose data model and the [`PoseEstimator`] trait |
//! | [`visualizer`] | Skeleton drawing, colors, raster canvas |
//! | [`host`] | Host page abstraction |
//! | [`config`] | [`OverlayConfig`] |
//! | [`error`] | Error types ([`OverlayError`], [`Result`]) |
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `annotate` | PNG snapshots of the overlay raster (default) |
//! | `visualize` | Live preview window for `simulate` |
//! | `web` | Browser backend (`wasm32` only) |
//!
//! ## License
//!
//! This project is licensed under [AGPL-3.0](https://ultralytics.com/license).

// Modules
pub mod config;
pub mod control;
pub mod error;
pub mod geometry;
pub mod host;
pub mod locator;
pub mod pose;
pub mod render_loop;
pub mod session;
pub mod sim;
pub mod surface;
pub mod visualizer;
pub mod watcher;
#[cfg(all(feature = "web", target_arch = "wasm32"))]
pub mod web;

// Re-export main types for convenience
pub use config::OverlayConfig;
pub use control::{ControlAction, ControlCommand, OverlayController, OverlayStatus, PageClaim};
pub use error::{OverlayError, Result};
pub use geometry::{Point, Rect, Size};
pub use host::{
    Canvas, ChangeCallback, GeometrySource, HostPage, Subscription, Video, VideoHandle, VideoId,
};
pub use locator::VideoLocator;
pub use pose::{BoundingBox, EstimateFuture, EstimateParams, Keypoint, Pose, PoseEstimator};
pub use render_loop::{LoopStats, LoopToken, PoseRenderLoop, TickOutcome};
pub use session::{FrameRequest, OverlaySession, SessionState};
pub use surface::{OverlaySurface, SurfaceState};
pub use visualizer::{RenderStyle, RenderSummary};
pub use watcher::GeometryWatcher;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(VERSION.contains('.'));
    }

    #[test]
    fn test_name() {
        assert_eq!(NAME, "pose-overlay");
    }
}
