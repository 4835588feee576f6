// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Overlay configuration.
//!
//! This module defines [`OverlayConfig`], which controls which videos are tracked, how
//! poses are requested and filtered, how long a video swap may take to settle, and how
//! poses are drawn. It can be built in code or loaded from TOML.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{OverlayError, Result};
use crate::pose::EstimateParams;
use crate::visualizer::RenderStyle;

/// Configuration for an overlay session.
///
/// # Example
///
/// ```rust
/// use pose_overlay::OverlayConfig;
///
/// let config = OverlayConfig::new()
///     .with_score_threshold(0.4)
///     .with_max_poses(2)
///     .with_settle(50.0, 40);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// CSS selector for candidate video elements.
    pub video_selector: String,
    /// Keypoints must score strictly above this to be drawn (0.0 to 1.0).
    pub score_threshold: f32,
    /// Maximum poses requested per estimate.
    pub max_poses: usize,
    /// Delay between settling attempts after a video swap, in milliseconds of frame time.
    pub settle_interval_ms: f64,
    /// Settling attempts before giving up and reporting "not ready".
    pub settle_max_attempts: u32,
    /// Drawing style.
    pub style: RenderStyle,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            video_selector: "video".to_string(),
            score_threshold: 0.3,
            max_poses: 6,
            settle_interval_ms: 100.0,
            settle_max_attempts: 20,
            style: RenderStyle::default(),
        }
    }
}

impl OverlayConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError::ConfigError`] on malformed TOML or invalid values.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or fails [`Self::from_toml_str`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Set the CSS selector for candidate videos.
    #[must_use]
    pub fn with_video_selector(mut self, selector: impl Into<String>) -> Self {
        self.video_selector = selector.into();
        self
    }

    /// Set the keypoint score threshold.
    #[must_use]
    pub const fn with_score_threshold(mut self, threshold: f32) -> Self {
        self.score_threshold = threshold;
        self
    }

    /// Set the maximum number of poses per estimate.
    #[must_use]
    pub const fn with_max_poses(mut self, max_poses: usize) -> Self {
        self.max_poses = max_poses;
        self
    }

    /// Set the settling interval and attempt bound.
    #[must_use]
    pub const fn with_settle(mut self, interval_ms: f64, max_attempts: u32) -> Self {
        self.settle_interval_ms = interval_ms;
        self.settle_max_attempts = max_attempts;
        self
    }

    /// Set the drawing style.
    #[must_use]
    pub const fn with_style(mut self, style: RenderStyle) -> Self {
        self.style = style;
        self
    }

    /// Parameters passed to every estimate.
    #[must_use]
    pub const fn estimate_params(&self) -> EstimateParams {
        EstimateParams {
            max_poses: self.max_poses,
            score_threshold: self.score_threshold,
        }
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError::ConfigError`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.video_selector.trim().is_empty() {
            return Err(OverlayError::ConfigError(
                "video_selector must not be empty".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.score_threshold) {
            return Err(OverlayError::ConfigError(format!(
                "score_threshold {} outside [0, 1]",
                self.score_threshold
            )));
        }
        if self.max_poses == 0 {
            return Err(OverlayError::ConfigError(
                "max_poses must be at least 1".to_string(),
            ));
        }
        if self.settle_max_attempts == 0 {
            return Err(OverlayError::ConfigError(
                "settle_max_attempts must be at least 1".to_string(),
            ));
        }
        if self.settle_interval_ms.is_nan() || self.settle_interval_ms < 0.0 {
            return Err(OverlayError::ConfigError(format!(
                "settle_interval_ms {} must be non-negative",
                self.settle_interval_ms
            )));
        }
        if self.style.keypoint_radius.is_nan()
            || self.style.line_width.is_nan()
            || self.style.keypoint_radius <= 0.0
            || self.style.line_width <= 0.0
        {
            return Err(OverlayError::ConfigError(
                "style.keypoint_radius and style.line_width must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OverlayConfig::default();
        assert_eq!(config.video_selector, "video");
        assert!((config.score_threshold - 0.3).abs() < f32::EPSILON);
        assert_eq!(config.max_poses, 6);
        assert_eq!(config.settle_max_attempts, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_partial() {
        let config = OverlayConfig::from_toml_str(
            r#"
            score_threshold = 0.5
            settle_max_attempts = 5

            [style]
            draw_skeleton = false
            "#,
        )
        .unwrap();
        assert!((config.score_threshold - 0.5).abs() < f32::EPSILON);
        assert_eq!(config.settle_max_attempts, 5);
        assert!(!config.style.draw_skeleton);
        assert!(config.style.draw_bounding_box);
        assert_eq!(config.max_poses, 6);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(OverlayConfig::new().with_score_threshold(1.5).validate().is_err());
        assert!(OverlayConfig::new().with_max_poses(0).validate().is_err());
        assert!(OverlayConfig::new().with_settle(100.0, 0).validate().is_err());
        assert!(OverlayConfig::new().with_video_selector(" ").validate().is_err());
        assert!(OverlayConfig::from_toml_str("score_threshold = -0.1").is_err());
        assert!(OverlayConfig::from_toml_str("max_poses = \"many\"").is_err());
    }

    #[test]
    fn test_estimate_params() {
        let params = OverlayConfig::new().with_max_poses(2).estimate_params();
        assert_eq!(params.max_poses, 2);
    }
}
