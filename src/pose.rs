// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Pose data returned by the external estimation model.
//!
//! The shapes mirror what browser pose-detection libraries hand back: keypoints in
//! pixel coordinates of the decoded frame and an optional bounding box in normalized
//! `[0, 1]` coordinates.

use futures::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};

use crate::error::{OverlayError, Result};
use crate::host::VideoHandle;

/// Number of keypoints in the COCO / `MoveNet` layout.
pub const COCO_KEYPOINT_COUNT: usize = 17;

/// A single joint position with a confidence score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    /// X coordinate in drawing-space pixels.
    pub x: f32,
    /// Y coordinate in drawing-space pixels.
    pub y: f32,
    /// Confidence score (0.0 to 1.0).
    #[serde(default)]
    pub score: f32,
    /// Joint name, when the model provides one (e.g. `left_wrist`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Keypoint {
    /// Create an unnamed keypoint.
    #[must_use]
    pub const fn new(x: f32, y: f32, score: f32) -> Self {
        Self {
            x,
            y,
            score,
            name: None,
        }
    }

    /// Attach a joint name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Whether the keypoint should be rendered under `threshold`.
    ///
    /// Strictly above: a score equal to the threshold is hidden.
    #[must_use]
    pub fn is_visible(&self, threshold: f32) -> bool {
        self.score > threshold
    }
}

/// Normalized bounding box of one detected body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    /// Left edge (0.0 to 1.0).
    pub x_min: f32,
    /// Top edge (0.0 to 1.0).
    pub y_min: f32,
    /// Right edge (0.0 to 1.0).
    pub x_max: f32,
    /// Bottom edge (0.0 to 1.0).
    pub y_max: f32,
}

impl BoundingBox {
    /// Create a new bounding box.
    #[must_use]
    pub const fn new(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    /// Check that every edge lies in `[0, 1]` and the box is not inverted.
    ///
    /// Out-of-range boxes are rejected, never clamped.
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError::InvalidBoundingBox`] naming the first offending edge.
    pub fn validate(&self) -> Result<()> {
        let edges = [
            ("xMin", self.x_min),
            ("yMin", self.y_min),
            ("xMax", self.x_max),
            ("yMax", self.y_max),
        ];
        for (name, value) in edges {
            if !(0.0..=1.0).contains(&value) {
                return Err(OverlayError::InvalidBoundingBox(format!(
                    "{name} {value} outside [0, 1]"
                )));
            }
        }
        if self.x_min > self.x_max || self.y_min > self.y_max {
            return Err(OverlayError::InvalidBoundingBox(format!(
                "inverted box ({}, {}) -> ({}, {})",
                self.x_min, self.y_min, self.x_max, self.y_max
            )));
        }
        Ok(())
    }

    /// Scale to pixel coordinates `[x1, y1, x2, y2]`.
    #[must_use]
    pub fn to_pixels(&self, width: u32, height: u32) -> [f32; 4] {
        let (w, h) = (width as f32, height as f32);
        [self.x_min * w, self.y_min * h, self.x_max * w, self.y_max * h]
    }
}

/// One detected body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pose {
    /// Keypoints in model order.
    pub keypoints: Vec<Keypoint>,
    /// Overall pose score, when the model reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    /// Normalized bounding box, when the model reports one.
    #[serde(default, rename = "box", alias = "boundingBox", skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
}

impl Pose {
    /// Create a pose from keypoints.
    #[must_use]
    pub const fn new(keypoints: Vec<Keypoint>) -> Self {
        Self {
            keypoints,
            score: None,
            bounding_box: None,
        }
    }

    /// Attach a bounding box.
    #[must_use]
    pub const fn with_bounding_box(mut self, bounding_box: BoundingBox) -> Self {
        self.bounding_box = Some(bounding_box);
        self
    }

    /// Keypoints above `threshold`, with their model index.
    pub fn visible_keypoints(&self, threshold: f32) -> impl Iterator<Item = (usize, &Keypoint)> {
        self.keypoints
            .iter()
            .enumerate()
            .filter(move |(_, kp)| kp.is_visible(threshold))
    }

    /// Whether the keypoints follow the 17-point COCO layout.
    #[must_use]
    pub fn is_coco(&self) -> bool {
        self.keypoints.len() == COCO_KEYPOINT_COUNT
    }
}

/// Options passed to every estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateParams {
    /// Maximum number of poses to return.
    pub max_poses: usize,
    /// Minimum keypoint score the model should report.
    pub score_threshold: f32,
}

/// Future resolved by a pose estimate.
pub type EstimateFuture = LocalBoxFuture<'static, Result<Vec<Pose>>>;

/// The external pose-estimation model.
///
/// Opaque to the overlay: an estimate may reject, may resolve to an empty list, and may
/// take several animation frames to settle.
pub trait PoseEstimator {
    /// Start estimating poses on the current frame of `video`.
    fn estimate(&self, video: &VideoHandle, params: EstimateParams) -> EstimateFuture;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypoint_visibility_is_strict() {
        let kp = Keypoint::new(10.0, 20.0, 0.3);
        assert!(!kp.is_visible(0.3));
        assert!(kp.is_visible(0.29));
    }

    #[test]
    fn test_bounding_box_rejects_out_of_range() {
        let bbox = BoundingBox::new(-0.2, 0.0, 0.5, 1.0);
        let err = bbox.validate().unwrap_err();
        assert!(err.to_string().contains("xMin"));

        assert!(BoundingBox::new(0.0, 0.0, 1.0, 1.01).validate().is_err());
        assert!(BoundingBox::new(0.0, f32::NAN, 1.0, 1.0).validate().is_err());
        assert!(BoundingBox::new(0.6, 0.0, 0.5, 1.0).validate().is_err());
        assert!(BoundingBox::new(0.0, 0.0, 1.0, 1.0).validate().is_ok());
    }

    #[test]
    fn test_bounding_box_to_pixels() {
        let bbox = BoundingBox::new(0.25, 0.5, 0.75, 1.0);
        assert_eq!(bbox.to_pixels(1280, 720), [320.0, 360.0, 960.0, 720.0]);
    }

    #[test]
    fn test_pose_from_js_shape() {
        let json = r#"{
            "keypoints": [{"x": 1.0, "y": 2.0, "score": 0.9, "name": "nose"}],
            "score": 0.8,
            "box": {"xMin": 0.1, "yMin": 0.2, "xMax": 0.3, "yMax": 0.4, "width": 0.2, "height": 0.2}
        }"#;
        let pose: Pose = serde_json::from_str(json).unwrap();
        assert_eq!(pose.keypoints[0].name.as_deref(), Some("nose"));
        assert_eq!(pose.bounding_box, Some(BoundingBox::new(0.1, 0.2, 0.3, 0.4)));
        assert!(!pose.is_coco());
    }

    #[test]
    fn test_visible_keypoints_keep_index() {
        let pose = Pose::new(vec![
            Keypoint::new(0.0, 0.0, 0.1),
            Keypoint::new(1.0, 1.0, 0.9),
        ]);
        let visible: Vec<usize> = pose.visible_keypoints(0.5).map(|(i, _)| i).collect();
        assert_eq!(visible, vec![1]);
    }
}
