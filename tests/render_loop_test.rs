// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Estimate ordering and cancellation with estimates that resolve on demand.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use futures::FutureExt;
use futures::channel::oneshot;
use pose_overlay::sim::{DrawOp, FrameClock, SimulatedPage};
use pose_overlay::{
    EstimateFuture, EstimateParams, FrameRequest, Keypoint, OverlayConfig, OverlayError,
    OverlaySession, OverlaySurface, Pose, PoseEstimator, PoseRenderLoop, Rect, RenderStyle,
    Result, SessionState, Size, TickOutcome, VideoHandle,
};

/// Decrements the outstanding counter when its estimate future is dropped.
struct InFlight(Rc<Cell<usize>>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.set(self.0.get() - 1);
    }
}

/// An estimator whose results are delivered by the test.
#[derive(Default)]
struct ManualEstimator {
    senders: RefCell<VecDeque<oneshot::Sender<Result<Vec<Pose>>>>>,
    outstanding: Rc<Cell<usize>>,
    max_outstanding: Cell<usize>,
    issued: Cell<usize>,
}

impl ManualEstimator {
    fn resolve(&self, result: Result<Vec<Pose>>) {
        if let Some(tx) = self.senders.borrow_mut().pop_front() {
            let _ = tx.send(result);
        }
    }
}

impl PoseEstimator for ManualEstimator {
    fn estimate(&self, _video: &VideoHandle, _params: EstimateParams) -> EstimateFuture {
        let (tx, rx) = oneshot::channel();
        self.senders.borrow_mut().push_back(tx);
        self.issued.set(self.issued.get() + 1);
        self.outstanding.set(self.outstanding.get() + 1);
        self.max_outstanding
            .set(self.max_outstanding.get().max(self.outstanding.get()));

        let guard = InFlight(Rc::clone(&self.outstanding));
        async move {
            let _guard = guard;
            rx.await
                .unwrap_or_else(|_| Err(OverlayError::EstimationError("dropped".to_string())))
        }
        .boxed_local()
    }
}

fn one_pose() -> Vec<Pose> {
    vec![Pose::new(vec![Keypoint::new(32.0, 32.0, 0.9)])]
}

fn active_session(page: &SimulatedPage, estimator: &Rc<ManualEstimator>) -> OverlaySession {
    page.insert_video(Size::new(640, 480), Rect::new(0.0, 0.0, 640.0, 480.0));
    let mut session = OverlaySession::new(
        Rc::new(page.clone()),
        Rc::clone(estimator) as Rc<dyn PoseEstimator>,
        OverlayConfig::default(),
    );
    session.start();
    assert_eq!(session.state(), SessionState::Active);
    session
}

#[test]
fn test_slow_estimate_is_never_overlapped() {
    let page = SimulatedPage::new();
    let estimator = Rc::new(ManualEstimator::default());
    let mut session = active_session(&page, &estimator);
    let mut clock = FrameClock::default();

    for _ in 0..20 {
        assert_eq!(session.on_frame(clock.tick()), FrameRequest::Continue);
    }
    assert_eq!(estimator.issued.get(), 1);
    assert_eq!(session.estimates_in_flight(), 1);
    assert_eq!(page.canvas(0).unwrap().draw_count(), 0);

    estimator.resolve(Ok(one_pose()));
    session.on_frame(clock.tick());
    assert_eq!(session.loop_stats().rendered, 1);
    assert_eq!(session.estimates_in_flight(), 0);

    // The next estimate starts on the following frame.
    session.on_frame(clock.tick());
    assert_eq!(estimator.issued.get(), 2);
    assert_eq!(estimator.max_outstanding.get(), 1);
}

#[test]
fn test_results_drawn_in_issue_order() {
    let page = SimulatedPage::new();
    let estimator = Rc::new(ManualEstimator::default());
    let mut session = active_session(&page, &estimator);
    let mut clock = FrameClock::default();

    for x in [10.0, 20.0, 30.0] {
        session.on_frame(clock.tick());
        estimator.resolve(Ok(vec![Pose::new(vec![Keypoint::new(x, 5.0, 0.9)])]));
        session.on_frame(clock.tick());
    }

    let centers: Vec<f32> = page
        .canvas(0)
        .unwrap()
        .ops
        .iter()
        .filter_map(|op| match op {
            DrawOp::Point { center, .. } => Some(center.0),
            _ => None,
        })
        .collect();
    assert_eq!(centers, vec![10.0, 20.0, 30.0]);
}

#[test]
fn test_stop_with_pending_estimate_never_draws() {
    let page = SimulatedPage::new();
    let estimator = Rc::new(ManualEstimator::default());
    let mut session = active_session(&page, &estimator);
    let mut clock = FrameClock::default();

    session.on_frame(clock.tick());
    assert_eq!(session.estimates_in_flight(), 1);

    session.stop();
    assert_eq!(estimator.outstanding.get(), 0);
    assert_eq!(session.loop_stats().discarded, 1);

    estimator.resolve(Ok(one_pose()));
    assert_eq!(session.on_frame(clock.tick()), FrameRequest::Stop);
    assert_eq!(session.loop_stats().rendered, 0);
    assert_eq!(page.canvas_count(), 0);
}

#[test]
fn test_cancelled_token_discards_late_result() {
    let page = SimulatedPage::new();
    let video = page.insert_video(Size::new(64, 64), Rect::new(0.0, 0.0, 64.0, 64.0));
    let surface = RefCell::new(OverlaySurface::new());
    surface.borrow_mut().create(&page, &video.handle()).unwrap();

    let estimator = Rc::new(ManualEstimator::default());
    let mut render_loop = PoseRenderLoop::new();
    let token = render_loop.start(
        &video.handle(),
        Rc::clone(&estimator) as Rc<dyn PoseEstimator>,
        EstimateParams {
            max_poses: 1,
            score_threshold: 0.3,
        },
        RenderStyle::default(),
    );

    assert_eq!(render_loop.tick(&surface), TickOutcome::Pending);
    token.cancel();
    estimator.resolve(Ok(one_pose()));

    assert_eq!(render_loop.tick(&surface), TickOutcome::Stopped);
    assert!(!render_loop.is_running());
    assert_eq!(render_loop.stats().discarded, 1);
    let canvas = page.canvas(0).unwrap();
    assert!(canvas.ops.is_empty());
}

#[test]
fn test_rejected_estimate_clears_previous_poses() {
    let page = SimulatedPage::new();
    let estimator = Rc::new(ManualEstimator::default());
    let mut session = active_session(&page, &estimator);
    let mut clock = FrameClock::default();

    session.on_frame(clock.tick());
    estimator.resolve(Ok(one_pose()));
    session.on_frame(clock.tick());
    assert_eq!(page.canvas(0).unwrap().draw_count(), 1);

    session.on_frame(clock.tick());
    estimator.resolve(Err(OverlayError::EstimationError("backend lost".to_string())));
    session.on_frame(clock.tick());

    let canvas = page.canvas(0).unwrap();
    assert_eq!(canvas.ops.last(), Some(&DrawOp::Clear));
    assert_eq!(canvas.image.pixels().filter(|p| p.0[3] > 0).count(), 0);
    assert_eq!(session.state(), SessionState::Active);
}
