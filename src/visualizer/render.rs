// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Pose rendering onto the overlay surface.

use log::warn;
use serde::Deserialize;

use super::color::Color;
use super::skeleton::{KPT_COLOR_INDICES, LIMB_COLOR_INDICES, SKELETON};
use crate::pose::Pose;
use crate::surface::OverlaySurface;

/// Stroke sizes and optional layers.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct RenderStyle {
    /// Keypoint dot radius in drawing pixels.
    pub keypoint_radius: f32,
    /// Limb and box stroke width in drawing pixels.
    pub line_width: f32,
    /// Connect COCO keypoints with limb lines.
    pub draw_skeleton: bool,
    /// Outline the pose bounding box when the model reports a valid one.
    pub draw_bounding_box: bool,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            keypoint_radius: 4.0,
            line_width: 2.0,
            draw_skeleton: true,
            draw_bounding_box: true,
        }
    }
}

/// Counts of what a render pass drew.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderSummary {
    /// Keypoint dots drawn.
    pub keypoints: usize,
    /// Limb lines drawn.
    pub limbs: usize,
    /// Bounding boxes drawn.
    pub boxes: usize,
    /// Bounding boxes rejected as out of range.
    pub rejected_boxes: usize,
}

/// Draw `poses` onto `surface`. The caller clears the surface first.
///
/// Only keypoints scoring above `threshold` are drawn; a limb needs both ends visible.
/// An invalid bounding box is logged and skipped while the pose's keypoints still draw.
pub fn draw_poses(
    surface: &mut OverlaySurface,
    poses: &[Pose],
    threshold: f32,
    style: &RenderStyle,
) -> RenderSummary {
    let mut summary = RenderSummary::default();
    let drawing_size = surface.state().drawing_size;

    for (pose_idx, pose) in poses.iter().enumerate() {
        if style.draw_bounding_box {
            if let Some(bbox) = pose.bounding_box {
                match bbox.validate() {
                    Ok(()) => {
                        let xyxy = bbox.to_pixels(drawing_size.width, drawing_size.height);
                        surface.draw_rect(xyxy, style.line_width, Color::from_index(pose_idx));
                        summary.boxes += 1;
                    }
                    Err(e) => {
                        warn!("Skipping bounding box of pose {pose_idx}: {e}");
                        summary.rejected_boxes += 1;
                    }
                }
            }
        }

        let coco = pose.is_coco();
        if style.draw_skeleton && coco {
            for (limb_idx, &[a, b]) in SKELETON.iter().enumerate() {
                let (from, to) = (&pose.keypoints[a], &pose.keypoints[b]);
                if from.is_visible(threshold) && to.is_visible(threshold) {
                    let color = Color::from_pose_index(LIMB_COLOR_INDICES[limb_idx]);
                    surface.draw_line((from.x, from.y), (to.x, to.y), style.line_width, color);
                    summary.limbs += 1;
                }
            }
        }

        for (kpt_idx, kp) in pose.visible_keypoints(threshold) {
            let color = if coco {
                Color::from_pose_index(KPT_COLOR_INDICES[kpt_idx])
            } else {
                Color::GREEN
            };
            surface.draw_point(kp.x, kp.y, style.keypoint_radius, color);
            summary.keypoints += 1;
        }
    }

    summary
}
