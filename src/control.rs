// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Control commands from the panel, status notifications back to it, and the
//! per-page controller that owns the one overlay session.

use std::cell::Cell;
use std::rc::Rc;

use log::info;
use serde::{Deserialize, Serialize};

use crate::config::OverlayConfig;
use crate::error::{OverlayError, Result};
use crate::host::HostPage;
use crate::pose::PoseEstimator;
use crate::session::{FrameRequest, OverlaySession, SessionState};

/// Status shown when the overlay is running.
pub const STATUS_ACTIVE: &str = "Pose overlay active";
/// Status shown while no usable video is present.
pub const STATUS_NOT_READY: &str = "Video not ready, waiting for video to load...";
/// Status shown after the overlay stops.
pub const STATUS_STOPPED: &str = "Pose overlay stopped";

/// Requested action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlAction {
    /// Start the overlay.
    Start,
    /// Stop the overlay.
    Stop,
}

/// The single logical command delivered by the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlCommand {
    /// What to do.
    pub action: ControlAction,
}

impl ControlCommand {
    /// Parse a command from its JSON event payload.
    ///
    /// # Errors
    ///
    /// Returns [`crate::OverlayError::ProtocolError`] on malformed JSON or an unknown action.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Status notification the panel displays verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayStatus {
    /// Whether the overlay is drawing.
    pub is_active: bool,
    /// Human-readable message.
    pub message: String,
}

impl OverlayStatus {
    /// Overlay running.
    #[must_use]
    pub fn active() -> Self {
        Self {
            is_active: true,
            message: STATUS_ACTIVE.to_string(),
        }
    }

    /// Waiting for a usable video.
    #[must_use]
    pub fn not_ready() -> Self {
        Self {
            is_active: false,
            message: STATUS_NOT_READY.to_string(),
        }
    }

    /// Overlay stopped.
    #[must_use]
    pub fn stopped() -> Self {
        Self {
            is_active: false,
            message: STATUS_STOPPED.to_string(),
        }
    }

    /// Serialize for a page event payload.
    ///
    /// # Errors
    ///
    /// Returns [`crate::OverlayError::ProtocolError`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

thread_local! {
    static PAGE_CLAIMED: Cell<bool> = const { Cell::new(false) };
}

/// Exclusive hold on the page's single overlay controller slot.
///
/// A page runs on one thread, so the claim is per thread. Dropping it frees the slot.
#[derive(Debug)]
pub struct PageClaim(());

impl PageClaim {
    /// Claim the slot.
    ///
    /// # Errors
    ///
    /// Returns an error if another claim on this page is still held.
    pub fn acquire() -> Result<Self> {
        if PAGE_CLAIMED.with(|claimed| claimed.replace(true)) {
            return Err(OverlayError::ProtocolError(
                "an overlay controller is already installed on this page".to_string(),
            ));
        }
        Ok(Self(()))
    }

    /// Whether a claim is currently held on this page.
    #[must_use]
    pub fn is_held() -> bool {
        PAGE_CLAIMED.with(Cell::get)
    }
}

impl Drop for PageClaim {
    fn drop(&mut self) {
        PAGE_CLAIMED.with(|claimed| claimed.set(false));
    }
}

/// Owns the page's overlay session and applies panel commands to it.
///
/// Only one session exists per controller, so repeated `start` commands never create a
/// second canvas or loop.
pub struct OverlayController {
    session: OverlaySession,
}

impl OverlayController {
    /// Create a controller for `host`.
    #[must_use]
    pub fn new(
        host: Rc<dyn HostPage>,
        estimator: Rc<dyn PoseEstimator>,
        config: OverlayConfig,
    ) -> Self {
        Self {
            session: OverlaySession::new(host, estimator, config),
        }
    }

    /// Apply a command. Returns whether frames should be driven afterwards.
    pub fn handle(&mut self, command: ControlCommand) -> FrameRequest {
        info!("control command: {:?}", command.action);
        match command.action {
            ControlAction::Start => self.session.start(),
            ControlAction::Stop => {
                self.session.stop();
                FrameRequest::Stop
            }
        }
    }

    /// Parse and apply a JSON command.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not a valid command.
    pub fn handle_json(&mut self, json: &str) -> Result<FrameRequest> {
        Ok(self.handle(ControlCommand::from_json(json)?))
    }

    /// The page is being navigated away from.
    pub fn on_page_hide(&mut self) {
        self.session.stop();
    }

    /// Animation-frame entry point.
    pub fn on_frame(&mut self, timestamp_ms: f64) -> FrameRequest {
        self.session.on_frame(timestamp_ms)
    }

    /// Current session state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.session.state()
    }

    /// The owned session.
    #[must_use]
    pub const fn session(&self) -> &OverlaySession {
        &self.session
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parse() {
        let cmd = ControlCommand::from_json(r#"{"action":"start"}"#).unwrap();
        assert_eq!(cmd.action, ControlAction::Start);
        assert!(ControlCommand::from_json(r#"{"action":"pause"}"#).is_err());
    }

    #[test]
    fn test_page_claim_is_exclusive() {
        let first = PageClaim::acquire().unwrap();
        assert!(PageClaim::is_held());
        assert!(matches!(PageClaim::acquire(), Err(OverlayError::ProtocolError(_))));

        drop(first);
        assert!(!PageClaim::is_held());
        let _second = PageClaim::acquire().unwrap();
    }

    #[test]
    fn test_status_json_shape() {
        let json = OverlayStatus::active().to_json().unwrap();
        assert_eq!(json, r#"{"isActive":true,"message":"Pose overlay active"}"#);
    }
}
