// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Error types for the overlay library.
//!
//! A video that is absent or has no decoded dimensions yet is *not* an error: it is
//! reported through [`crate::OverlayStatus`] and retried. Errors here are reserved for
//! host failures, rejected data, and bad configuration.

use std::fmt;

/// Result type alias for overlay operations.
pub type Result<T> = std::result::Result<T, OverlayError>;

/// Main error type for the overlay library.
#[derive(Debug)]
pub enum OverlayError {
    /// The host page refused an operation (element lookup, insertion, listener).
    HostError(String),
    /// Canvas creation or a drawing call failed.
    CanvasError(String),
    /// Registering or cancelling a geometry observer failed.
    ObserverError(String),
    /// The external pose-estimation model rejected.
    EstimationError(String),
    /// A pose bounding box was outside the normalized range.
    InvalidBoundingBox(String),
    /// Invalid configuration provided.
    ConfigError(String),
    /// Error encoding a raster snapshot.
    ImageError(String),
    /// Malformed control or status message.
    ProtocolError(String),
    /// Wrapped `std::io::Error`
    Io(std::io::Error),
}

impl fmt::Display for OverlayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HostError(msg) => write!(f, "Host error: {msg}"),
            Self::CanvasError(msg) => write!(f, "Canvas error: {msg}"),
            Self::ObserverError(msg) => write!(f, "Observer error: {msg}"),
            Self::EstimationError(msg) => write!(f, "Estimation error: {msg}"),
            Self::InvalidBoundingBox(msg) => write!(f, "Invalid bounding box: {msg}"),
            Self::ConfigError(msg) => write!(f, "Config error: {msg}"),
            Self::ImageError(msg) => write!(f, "Image error: {msg}"),
            Self::ProtocolError(msg) => write!(f, "Protocol error: {msg}"),
            Self::Io(err) => write!(f, "IO error: {err}"),
        }
    }
}

impl std::error::Error for OverlayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for OverlayError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<image::ImageError> for OverlayError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageError(err.to_string())
    }
}

impl From<toml::de::Error> for OverlayError {
    fn from(err: toml::de::Error) -> Self {
        Self::ConfigError(err.to_string())
    }
}

impl From<serde_json::Error> for OverlayError {
    fn from(err: serde_json::Error) -> Self {
        Self::ProtocolError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OverlayError::EstimationError("model warming up".to_string());
        assert_eq!(err.to_string(), "Estimation error: model warming up");

        let err = OverlayError::InvalidBoundingBox("xMin -0.2".to_string());
        assert_eq!(err.to_string(), "Invalid bounding box: xMin -0.2");
    }

    #[test]
    fn test_io_error_source() {
        use std::error::Error;

        let err = OverlayError::from(std::io::Error::other("disk"));
        assert!(err.source().is_some());
        assert!(OverlayError::HostError("x".into()).source().is_none());
    }
}
