// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! The estimate → draw cycle, one step per animation frame.
//!
//! The loop is an explicit task owned by [`PoseRenderLoop`]. It holds at most one
//! in-flight estimate future, polled once per frame, so two estimates never overlap and
//! draws stay ordered by frame. Cancellation goes through a [`LoopToken`]: once cancelled,
//! a pending estimate is dropped and a result that resolves later is never drawn.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::task::noop_waker_ref;
use log::{debug, warn};

use crate::host::{Video, VideoHandle};
use crate::pose::{EstimateFuture, EstimateParams, PoseEstimator};
use crate::surface::OverlaySurface;
use crate::visualizer::{RenderStyle, RenderSummary, draw_poses};

/// Ownership token for a running loop.
///
/// Clones share the same flag. Cancelling stops the loop at its next step and discards any
/// estimate result that has not been drawn yet.
#[derive(Debug, Clone)]
pub struct LoopToken {
    live: Rc<Cell<bool>>,
}

impl LoopToken {
    fn new() -> Self {
        Self {
            live: Rc::new(Cell::new(true)),
        }
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.live.set(false);
    }

    /// Whether the loop may still draw.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live.get()
    }
}

/// What one step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The loop is not running; do not schedule another frame for it.
    Stopped,
    /// The video cannot be sampled right now (no size, paused, ended, or gone).
    Skipped,
    /// An estimate is still in flight.
    Pending,
    /// An estimate resolved and was drawn.
    Rendered(RenderSummary),
    /// The estimate rejected; nothing was drawn.
    Failed,
}

impl TickOutcome {
    /// Whether the driver should schedule the next frame.
    #[must_use]
    pub const fn reschedule(&self) -> bool {
        !matches!(self, Self::Stopped)
    }
}

/// Running counters, kept across restarts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Steps taken while running.
    pub ticks: u64,
    /// Estimates issued.
    pub estimates: u64,
    /// Estimates drawn.
    pub rendered: u64,
    /// Estimates that rejected.
    pub failures: u64,
    /// Steps skipped for a non-decodable video.
    pub skipped: u64,
    /// Resolved or in-flight estimates thrown away by a stop.
    pub discarded: u64,
}

struct LoopTask {
    token: LoopToken,
    video: Weak<dyn Video>,
    estimator: Rc<dyn PoseEstimator>,
    params: EstimateParams,
    style: RenderStyle,
    pending: Option<EstimateFuture>,
}

/// Self-rescheduling estimate/draw loop bound to one video.
#[derive(Default)]
pub struct PoseRenderLoop {
    task: Option<LoopTask>,
    stats: LoopStats,
}

impl PoseRenderLoop {
    /// Create an idle loop.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the loop to `video`, replacing any running task.
    pub fn start(
        &mut self,
        video: &VideoHandle,
        estimator: Rc<dyn PoseEstimator>,
        params: EstimateParams,
        style: RenderStyle,
    ) -> LoopToken {
        self.stop();
        let token = LoopToken::new();
        self.task = Some(LoopTask {
            token: token.clone(),
            video: Rc::downgrade(video),
            estimator,
            params,
            style,
            pending: None,
        });
        debug!("render loop started for {}", video.id());
        token
    }

    /// Cancel the task and drop any in-flight estimate. Idempotent.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.token.cancel();
            if task.pending.is_some() {
                self.stats.discarded += 1;
                debug!("render loop stopped with an estimate in flight; result discarded");
            }
        }
    }

    /// Run one step against `surface`.
    pub fn tick(&mut self, surface: &RefCell<OverlaySurface>) -> TickOutcome {
        let Some(task) = self.task.as_mut() else {
            return TickOutcome::Stopped;
        };
        if !task.token.is_live() {
            self.stop();
            return TickOutcome::Stopped;
        }
        self.stats.ticks += 1;

        let mut pending = match task.pending.take() {
            Some(pending) => pending,
            None => {
                let Some(video) = task.video.upgrade().filter(|v| v.is_decodable()) else {
                    self.stats.skipped += 1;
                    return TickOutcome::Skipped;
                };
                self.stats.estimates += 1;
                task.estimator.estimate(&video, task.params)
            }
        };

        let mut cx = Context::from_waker(noop_waker_ref());
        let result = match pending.poll_unpin(&mut cx) {
            Poll::Pending => {
                task.pending = Some(pending);
                return TickOutcome::Pending;
            }
            Poll::Ready(result) => result,
        };

        // The token may have been cancelled while the estimate was running.
        if !task.token.is_live() {
            self.stats.discarded += 1;
            self.task = None;
            return TickOutcome::Stopped;
        }

        let Ok(mut surface) = surface.try_borrow_mut() else {
            debug!("overlay surface busy; dropping this frame's poses");
            return TickOutcome::Skipped;
        };
        surface.clear();
        match result {
            Ok(poses) => {
                let summary =
                    draw_poses(&mut surface, &poses, task.params.score_threshold, &task.style);
                self.stats.rendered += 1;
                TickOutcome::Rendered(summary)
            }
            Err(e) => {
                warn!("Pose estimation failed, skipping frame: {e}");
                self.stats.failures += 1;
                TickOutcome::Failed
            }
        }
    }

    /// Whether a task is bound.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Estimates currently in flight (0 or 1).
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.task
            .as_ref()
            .map_or(0, |task| usize::from(task.pending.is_some()))
    }

    /// Counters since construction.
    #[must_use]
    pub const fn stats(&self) -> LoopStats {
        self.stats
    }
}

impl Drop for PoseRenderLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Rect, Size};
    use crate::sim::{SimulatedPage, SyntheticEstimator};

    const PARAMS: EstimateParams = EstimateParams {
        max_poses: 1,
        score_threshold: 0.3,
    };

    fn setup() -> (SimulatedPage, crate::sim::SimVideo, RefCell<OverlaySurface>) {
        let page = SimulatedPage::new();
        let video = page.insert_video(Size::new(640, 480), Rect::new(0.0, 0.0, 640.0, 480.0));
        let mut surface = OverlaySurface::new();
        surface.create(&page, &video.handle()).unwrap();
        (page, video, RefCell::new(surface))
    }

    #[test]
    fn test_idle_loop_does_not_reschedule() {
        let (_page, _video, surface) = setup();
        let mut render_loop = PoseRenderLoop::new();
        assert_eq!(render_loop.tick(&surface), TickOutcome::Stopped);
        assert!(!TickOutcome::Stopped.reschedule());
    }

    #[test]
    fn test_ready_estimate_draws_each_tick() {
        let (page, video, surface) = setup();
        let mut render_loop = PoseRenderLoop::new();
        render_loop.start(
            &video.handle(),
            Rc::new(SyntheticEstimator::new(0)),
            PARAMS,
            RenderStyle::default(),
        );

        for _ in 0..3 {
            assert!(matches!(render_loop.tick(&surface), TickOutcome::Rendered(_)));
        }
        assert_eq!(render_loop.stats().rendered, 3);
        assert_eq!(page.canvas(0).unwrap().count(|op| *op == crate::sim::DrawOp::Clear), 3);
    }

    #[test]
    fn test_paused_video_skips_but_keeps_running() {
        let (_page, video, surface) = setup();
        let estimator = Rc::new(SyntheticEstimator::new(0));
        let mut render_loop = PoseRenderLoop::new();
        render_loop.start(&video.handle(), estimator.clone(), PARAMS, RenderStyle::default());

        video.set_paused(true);
        assert_eq!(render_loop.tick(&surface), TickOutcome::Skipped);
        assert!(render_loop.tick(&surface).reschedule());
        assert_eq!(estimator.calls(), 0);

        video.set_paused(false);
        assert!(matches!(render_loop.tick(&surface), TickOutcome::Rendered(_)));
    }

    #[test]
    fn test_cancelled_token_stops_loop() {
        let (_page, video, surface) = setup();
        let mut render_loop = PoseRenderLoop::new();
        let token = render_loop.start(
            &video.handle(),
            Rc::new(SyntheticEstimator::new(0)),
            PARAMS,
            RenderStyle::default(),
        );

        token.cancel();
        assert_eq!(render_loop.tick(&surface), TickOutcome::Stopped);
        assert!(!render_loop.is_running());
    }

    #[test]
    fn test_failure_keeps_loop_alive() {
        let (_page, video, surface) = setup();
        let mut render_loop = PoseRenderLoop::new();
        render_loop.start(
            &video.handle(),
            Rc::new(SyntheticEstimator::new(2)),
            PARAMS,
            RenderStyle::default(),
        );

        assert_eq!(render_loop.tick(&surface), TickOutcome::Failed);
        assert_eq!(render_loop.tick(&surface), TickOutcome::Failed);
        assert!(matches!(render_loop.tick(&surface), TickOutcome::Rendered(_)));
        assert_eq!(render_loop.stats().failures, 2);
    }
}
