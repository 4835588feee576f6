// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! The overlay session: lifecycle, video-swap recovery, and resource teardown.
//!
//! ```text
//! Stopped --start()--> Starting --video ready--> Active
//!    ^                    |                       |  \
//!    |        settle window exhausted             |   video replaced: tear down,
//!    +--------------------+                       |   settle, re-attach (Active)
//!    +-------------------- stop() / page hide ----+
//! ```
//!
//! Teardown always runs loop → watcher → surface, so the loop can never draw on a
//! surface that is being destroyed.
//!
//! A swap whose replacement is ready on the first attempt keeps the "active" status. Once an
//! attempt finds no ready video the status drops to "not ready" until the overlay is back.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use log::{debug, error, info, warn};

use crate::config::OverlayConfig;
use crate::control::OverlayStatus;
use crate::error::Result;
use crate::geometry::Size;
use crate::host::{ChangeCallback, HostPage, Video, VideoHandle, VideoId};
use crate::locator::VideoLocator;
use crate::pose::PoseEstimator;
use crate::render_loop::{LoopStats, PoseRenderLoop};
use crate::surface::{OverlaySurface, SurfaceState};
use crate::watcher::GeometryWatcher;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No resources held.
    Stopped,
    /// Waiting for a usable video; nothing inserted into the page yet.
    Starting,
    /// Tracking a video (or recovering from a swap).
    Active,
}

/// Whether the frame driver should schedule another animation frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRequest {
    /// Schedule the next frame.
    Continue,
    /// Stop driving frames.
    Stop,
}

/// The video currently being tracked. Replaced as a whole, never edited in place.
#[derive(Clone)]
struct TrackedVideo {
    video: Weak<dyn Video>,
    id: VideoId,
    intrinsic_size: Size,
}

impl TrackedVideo {
    fn new(video: &VideoHandle) -> Self {
        Self {
            video: Rc::downgrade(video),
            id: video.id(),
            intrinsic_size: video.intrinsic_size(),
        }
    }
}

/// Bounded retry after a swap (or at start) while the new video's size settles.
#[derive(Debug, Default)]
struct SettleWindow {
    attempts: u32,
    next_attempt_ms: Option<f64>,
}

/// Coordinates locator, surface, watcher, and render loop for one page.
pub struct OverlaySession {
    host: Rc<dyn HostPage>,
    estimator: Rc<dyn PoseEstimator>,
    config: OverlayConfig,
    locator: VideoLocator,
    state: SessionState,
    tracked: Option<TrackedVideo>,
    surface: Rc<RefCell<OverlaySurface>>,
    watcher: GeometryWatcher,
    render_loop: PoseRenderLoop,
    settle: Option<SettleWindow>,
    degraded: bool,
    status: Option<OverlayStatus>,
    swaps: u64,
}

impl OverlaySession {
    /// Create a stopped session.
    #[must_use]
    pub fn new(
        host: Rc<dyn HostPage>,
        estimator: Rc<dyn PoseEstimator>,
        config: OverlayConfig,
    ) -> Self {
        let locator = VideoLocator::new(config.video_selector.clone());
        Self {
            host,
            estimator,
            config,
            locator,
            state: SessionState::Stopped,
            tracked: None,
            surface: Rc::new(RefCell::new(OverlaySurface::new())),
            watcher: GeometryWatcher::new(),
            render_loop: PoseRenderLoop::new(),
            settle: None,
            degraded: false,
            status: None,
            swaps: 0,
        }
    }

    /// Begin overlaying the current video.
    ///
    /// Attaches immediately when a ready video exists. Otherwise the session waits in
    /// `Starting` with a "not ready" status, retrying on frames until the settle window
    /// runs out. Calling `start` on a running session does nothing.
    pub fn start(&mut self) -> FrameRequest {
        if self.state != SessionState::Stopped {
            debug!("start ignored: session is {:?}", self.state);
            return FrameRequest::Continue;
        }
        info!("overlay session starting");
        self.state = SessionState::Starting;
        if !self.try_attach() {
            self.settle = Some(SettleWindow::default());
            self.set_status(OverlayStatus::not_ready());
        }
        FrameRequest::Continue
    }

    /// Stop and release every resource. A no-op when already stopped.
    pub fn stop(&mut self) {
        if self.state == SessionState::Stopped {
            return;
        }
        self.release();
        self.settle = None;
        self.degraded = false;
        self.state = SessionState::Stopped;
        info!("overlay session stopped");
        self.set_status(OverlayStatus::stopped());
    }

    /// Animation-frame entry point.
    pub fn on_frame(&mut self, timestamp_ms: f64) -> FrameRequest {
        match self.state {
            SessionState::Stopped => return FrameRequest::Stop,
            SessionState::Starting => self.settle_step(timestamp_ms),
            SessionState::Active => self.active_frame(timestamp_ms),
        }
        if self.state == SessionState::Stopped {
            FrameRequest::Stop
        } else {
            FrameRequest::Continue
        }
    }

    /// The host page announced a video change; re-check on the next frame.
    ///
    /// Identity is re-validated every frame anyway, so this only shortens a settle wait.
    pub fn notify_video_changed(&mut self) {
        if let Some(window) = self.settle.as_mut() {
            window.next_attempt_ms = None;
        }
    }

    fn active_frame(&mut self, now: f64) {
        let Some(tracked) = self.tracked.clone() else {
            if self.degraded {
                if self.try_attach() {
                    info!("overlay recovered from degraded state");
                }
            } else {
                self.settle_step(now);
            }
            return;
        };

        let current = self.locator.locate(self.host.as_ref());
        let video = match current {
            Some(video) if video.id() == tracked.id && tracked.video.strong_count() > 0 => video,
            other => {
                match &other {
                    Some(video) => info!("video replaced: {} -> {}", tracked.id, video.id()),
                    None => info!("tracked {} left the page", tracked.id),
                }
                self.swaps += 1;
                self.release();
                self.settle = Some(SettleWindow::default());
                self.settle_step(now);
                return;
            }
        };

        let size = video.intrinsic_size();
        if !size.is_empty() && size != tracked.intrinsic_size {
            debug!(
                "{} intrinsic size {}x{} -> {}x{}",
                tracked.id,
                tracked.intrinsic_size.width,
                tracked.intrinsic_size.height,
                size.width,
                size.height
            );
            self.tracked = Some(TrackedVideo::new(&video));
        }
        self.surface.borrow_mut().resync(self.host.as_ref(), &video);

        self.render_loop.tick(&self.surface);
    }

    fn settle_step(&mut self, now: f64) {
        let interval = self.config.settle_interval_ms;
        let window = self.settle.get_or_insert_with(SettleWindow::default);
        if window.next_attempt_ms.is_some_and(|next| now < next) {
            return;
        }
        window.attempts += 1;
        window.next_attempt_ms = Some(now + interval);
        let attempts = window.attempts;

        if self.try_attach() {
            debug!("video settled after {attempts} attempt(s)");
            return;
        }
        // No canvas is on the page while settling.
        self.set_status(OverlayStatus::not_ready());
        if attempts < self.config.settle_max_attempts {
            return;
        }

        self.settle = None;
        if self.state == SessionState::Starting {
            warn!("no ready video after {attempts} attempts; giving up");
            self.release();
            self.state = SessionState::Stopped;
        } else {
            warn!("video did not settle after {attempts} attempts; overlay degraded");
            self.degraded = true;
        }
    }

    /// Locate a ready video and bring up surface, watcher, and loop against it.
    fn try_attach(&mut self) -> bool {
        let Some(video) = self.locator.locate(self.host.as_ref()) else {
            return false;
        };
        match self.attach(&video) {
            Ok(attached) => attached,
            Err(e) => {
                error!("failed to attach overlay to {}: {e}", video.id());
                self.release();
                false
            }
        }
    }

    fn attach(&mut self, video: &VideoHandle) -> Result<bool> {
        let created = self
            .surface
            .borrow_mut()
            .create(self.host.as_ref(), video)?;
        if created.is_none() {
            return Ok(false);
        }

        self.watcher
            .attach(self.host.as_ref(), video, self.resync_callback(video))?;
        self.render_loop.start(
            video,
            Rc::clone(&self.estimator),
            self.config.estimate_params(),
            self.config.style,
        );

        self.tracked = Some(TrackedVideo::new(video));
        self.settle = None;
        self.degraded = false;
        self.state = SessionState::Active;
        info!("overlay attached to {}", video.id());
        self.set_status(OverlayStatus::active());
        Ok(true)
    }

    /// Geometry callback: resync the surface against the tracked video.
    ///
    /// Holds only weak references so a registration can never keep the page, the video,
    /// or the surface alive. If the surface is mid-draw the next frame resyncs instead.
    fn resync_callback(&self, video: &VideoHandle) -> ChangeCallback {
        let host = Rc::downgrade(&self.host);
        let surface = Rc::downgrade(&self.surface);
        let video = Rc::downgrade(video);
        Rc::new(move || {
            let (Some(host), Some(surface), Some(video)) =
                (host.upgrade(), surface.upgrade(), video.upgrade())
            else {
                return;
            };
            if let Ok(mut surface) = surface.try_borrow_mut() {
                surface.resync(host.as_ref(), &video);
            };
        })
    }

    fn release(&mut self) {
        self.render_loop.stop();
        self.watcher.detach();
        self.surface.borrow_mut().destroy();
        self.tracked = None;
    }

    fn set_status(&mut self, status: OverlayStatus) {
        if self.status.as_ref() != Some(&status) {
            self.host.notify_status(&status);
            self.status = Some(status);
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Last status sent to the panel.
    #[must_use]
    pub const fn status(&self) -> Option<&OverlayStatus> {
        self.status.as_ref()
    }

    /// Geometry of the overlay surface.
    #[must_use]
    pub fn surface_state(&self) -> SurfaceState {
        self.surface.borrow().state()
    }

    /// The tracked video, if attached.
    #[must_use]
    pub fn tracked_video(&self) -> Option<VideoId> {
        self.tracked.as_ref().map(|t| t.id)
    }

    /// Last intrinsic size recorded for the tracked video.
    #[must_use]
    pub fn tracked_size(&self) -> Option<Size> {
        self.tracked.as_ref().map(|t| t.intrinsic_size)
    }

    /// Whether a swap failed to settle and the session is waiting for a usable video.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Whether a settle window is open.
    #[must_use]
    pub const fn is_settling(&self) -> bool {
        self.settle.is_some()
    }

    /// Whether the geometry watcher is attached.
    #[must_use]
    pub const fn is_watching(&self) -> bool {
        self.watcher.is_attached()
    }

    /// Estimates currently in flight.
    #[must_use]
    pub fn estimates_in_flight(&self) -> usize {
        self.render_loop.in_flight()
    }

    /// Render loop counters.
    #[must_use]
    pub const fn loop_stats(&self) -> LoopStats {
        self.render_loop.stats()
    }

    /// Video replacements detected.
    #[must_use]
    pub const fn swaps(&self) -> u64 {
        self.swaps
    }

    /// Session configuration.
    #[must_use]
    pub const fn config(&self) -> &OverlayConfig {
        &self.config
    }
}

impl Drop for OverlaySession {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use crate::sim::{FrameClock, SimulatedPage, SyntheticEstimator};

    fn session(page: &SimulatedPage, config: OverlayConfig) -> OverlaySession {
        OverlaySession::new(
            Rc::new(page.clone()),
            Rc::new(SyntheticEstimator::new(0)),
            config,
        )
    }

    #[test]
    fn test_start_without_video_is_not_ready() {
        let page = SimulatedPage::new();
        let mut session = session(&page, OverlayConfig::default());

        assert_eq!(session.start(), FrameRequest::Continue);
        assert_eq!(session.state(), SessionState::Starting);
        assert_eq!(session.status(), Some(&OverlayStatus::not_ready()));
        assert_eq!(page.canvas_count(), 0);
    }

    #[test]
    fn test_starting_gives_up_after_bound() {
        let page = SimulatedPage::new();
        let mut session = session(&page, OverlayConfig::default().with_settle(0.0, 3));
        let mut clock = FrameClock::default();

        session.start();
        for _ in 0..2 {
            assert_eq!(session.on_frame(clock.tick()), FrameRequest::Continue);
        }
        assert_eq!(session.on_frame(clock.tick()), FrameRequest::Stop);
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(page.listener_count(), 0);
    }

    #[test]
    fn test_starting_attaches_when_video_appears() {
        let page = SimulatedPage::new();
        let mut session = session(&page, OverlayConfig::default());
        let mut clock = FrameClock::default();
        session.start();

        page.insert_video(Size::new(640, 360), Rect::new(0.0, 0.0, 640.0, 360.0));
        session.on_frame(clock.tick());
        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(page.last_status(), Some(OverlayStatus::active()));
    }

    #[test]
    fn test_start_twice_keeps_one_canvas() {
        let page = SimulatedPage::new();
        page.insert_video(Size::new(640, 360), Rect::new(0.0, 0.0, 640.0, 360.0));
        let mut session = session(&page, OverlayConfig::default());

        session.start();
        session.start();
        assert_eq!(page.canvases_created(), 1);
        assert_eq!(page.listener_count(), 5);
    }

    #[test]
    fn test_stop_releases_everything() {
        let page = SimulatedPage::new();
        page.insert_video(Size::new(640, 360), Rect::new(0.0, 0.0, 640.0, 360.0));
        let mut session = session(&page, OverlayConfig::default());

        session.start();
        session.stop();
        session.stop();
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(page.canvas_count(), 0);
        assert_eq!(page.listener_count(), 0);
        assert_eq!(session.on_frame(16.0), FrameRequest::Stop);
        let stopped = page
            .statuses()
            .iter()
            .filter(|s| **s == OverlayStatus::stopped())
            .count();
        assert_eq!(stopped, 1);
    }

    #[test]
    fn test_drop_releases_page_resources() {
        let page = SimulatedPage::new();
        page.insert_video(Size::new(640, 360), Rect::new(0.0, 0.0, 640.0, 360.0));
        let mut session = session(&page, OverlayConfig::default());
        session.start();
        drop(session);

        assert_eq!(page.canvas_count(), 0);
        assert_eq!(page.listener_count(), 0);
    }
}
