// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Picks the "current" video on the host page.

use crate::host::{HostPage, VideoHandle};

/// Finds the most recently inserted video matching a selector.
///
/// Pages can briefly hold several candidates (an ad swapping out for the main video);
/// the last one in document order wins. `None` means "not ready", not failure.
#[derive(Debug, Clone)]
pub struct VideoLocator {
    selector: String,
}

impl VideoLocator {
    /// Create a locator for `selector`.
    #[must_use]
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
        }
    }

    /// The current video, if any. Side-effect free.
    pub fn locate(&self, host: &dyn HostPage) -> Option<VideoHandle> {
        host.video_candidates(&self.selector).pop()
    }

    /// CSS selector used for candidates.
    #[must_use]
    pub fn selector(&self) -> &str {
        &self.selector
    }
}
