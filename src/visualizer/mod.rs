// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Visualization tools for the pose overlay.

/// Color definitions and palettes.
pub mod color;
/// Raster canvas backend.
pub mod raster;
/// Pose rendering.
pub mod render;
/// COCO limb topology.
pub mod skeleton;

#[cfg(feature = "visualize")]
pub mod viewer;

pub use color::Color;
pub use raster::RasterCanvas;
pub use render::{RenderStyle, RenderSummary, draw_poses};

#[cfg(feature = "visualize")]
pub use viewer::Viewer;
