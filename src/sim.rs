// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! In-memory host page for tests and the `simulate` command.
//!
//! [`SimulatedPage`] keeps videos in document order, records every canvas it hands out
//! along with the draw calls made on it, and dispatches geometry events only when told to
//! via [`SimulatedPage::fire`]. Nothing fires on its own.

use std::cell::{Cell, RefCell};
use std::f32::consts::TAU;
use std::rc::{Rc, Weak};

use futures::FutureExt;
use image::RgbaImage;

use crate::control::OverlayStatus;
use crate::error::{OverlayError, Result};
use crate::geometry::{Point, Rect, Size};
use crate::host::{
    Canvas, ChangeCallback, GeometrySource, HostPage, Subscription, Video, VideoHandle, VideoId,
};
use crate::pose::{BoundingBox, EstimateFuture, EstimateParams, Keypoint, Pose, PoseEstimator};
use crate::visualizer::{Color, RasterCanvas};

/// A draw call recorded on a simulated canvas.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    /// `clear()`
    Clear,
    /// `fill_circle()`
    Point {
        /// Center in drawing pixels.
        center: (f32, f32),
        /// Fill color.
        color: Color,
    },
    /// `stroke_line()`
    Line {
        /// Start point.
        from: (f32, f32),
        /// End point.
        to: (f32, f32),
    },
    /// `stroke_rect()`
    Rect {
        /// `[x1, y1, x2, y2]`
        xyxy: [f32; 4],
    },
}

impl DrawOp {
    /// Whether the op paints (anything but `Clear`).
    #[must_use]
    pub const fn is_draw(&self) -> bool {
        !matches!(self, Self::Clear)
    }
}

/// Snapshot of a canvas handed out by the page.
#[derive(Debug, Clone)]
pub struct CanvasSnapshot {
    /// Creation order across the page's lifetime.
    pub serial: usize,
    /// Drawing resolution.
    pub drawing_size: Size,
    /// Page placement.
    pub display_rect: Rect,
    /// Whether pointer events fall through.
    pub pointer_passthrough: bool,
    /// Every call recorded on the canvas.
    pub ops: Vec<DrawOp>,
    /// Rasterized contents.
    pub image: RgbaImage,
}

impl CanvasSnapshot {
    /// Count recorded ops matching `pred`.
    pub fn count(&self, pred: impl Fn(&DrawOp) -> bool) -> usize {
        self.ops.iter().filter(|op| pred(op)).count()
    }

    /// Count painting ops.
    #[must_use]
    pub fn draw_count(&self) -> usize {
        self.count(DrawOp::is_draw)
    }
}

struct CanvasRecord {
    serial: usize,
    raster: RasterCanvas,
    ops: Vec<DrawOp>,
}

struct Listener {
    id: u64,
    source: GeometrySource,
    video: VideoId,
    callback: ChangeCallback,
}

#[derive(Default)]
struct PageInner {
    videos: Vec<Rc<SimVideoInner>>,
    next_video_id: u64,
    scroll: Point,
    canvases: Vec<Rc<RefCell<CanvasRecord>>>,
    canvases_created: usize,
    listeners: Vec<Listener>,
    next_listener_id: u64,
    statuses: Vec<OverlayStatus>,
}

/// Simulated host page. Cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct SimulatedPage {
    inner: Rc<RefCell<PageInner>>,
}

impl SimulatedPage {
    /// Create an empty page.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a video to the document.
    pub fn insert_video(&self, intrinsic: Size, rect: Rect) -> SimVideo {
        let mut inner = self.inner.borrow_mut();
        inner.next_video_id += 1;
        let video = Rc::new(SimVideoInner {
            id: VideoId(inner.next_video_id),
            intrinsic: Cell::new(intrinsic),
            rect: Cell::new(rect),
            paused: Cell::new(false),
            ended: Cell::new(false),
        });
        inner.videos.push(Rc::clone(&video));
        SimVideo { inner: video }
    }

    /// Remove a video from the document.
    pub fn remove_video(&self, video: &SimVideo) {
        self.inner
            .borrow_mut()
            .videos
            .retain(|v| v.id != video.inner.id);
    }

    /// Replace `old` with a fresh element, as players do on quality or ad transitions.
    pub fn replace_video(&self, old: &SimVideo, intrinsic: Size, rect: Rect) -> SimVideo {
        self.remove_video(old);
        self.insert_video(intrinsic, rect)
    }

    /// Set the scroll offset without notifying listeners.
    pub fn scroll_to(&self, offset: Point) {
        self.inner.borrow_mut().scroll = offset;
    }

    /// Dispatch `source` to every matching listener.
    ///
    /// Callbacks run after the page's own state is released, so they may call back into
    /// the page.
    pub fn fire(&self, source: GeometrySource) -> usize {
        let callbacks: Vec<ChangeCallback> = self
            .inner
            .borrow()
            .listeners
            .iter()
            .filter(|l| l.source == source)
            .map(|l| Rc::clone(&l.callback))
            .collect();
        for callback in &callbacks {
            callback();
        }
        callbacks.len()
    }

    /// Dispatch every geometry source.
    pub fn fire_all(&self) -> usize {
        GeometrySource::ALL.iter().map(|&s| self.fire(s)).sum()
    }

    /// Registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.borrow().listeners.len()
    }

    /// Listeners registered for `video`.
    #[must_use]
    pub fn listeners_for(&self, video: &SimVideo) -> usize {
        let id = video.inner.id;
        self.inner
            .borrow()
            .listeners
            .iter()
            .filter(|l| l.video == id)
            .count()
    }

    /// Canvases currently in the document.
    #[must_use]
    pub fn canvas_count(&self) -> usize {
        self.inner.borrow().canvases.len()
    }

    /// Canvases ever inserted.
    #[must_use]
    pub fn canvases_created(&self) -> usize {
        self.inner.borrow().canvases_created
    }

    /// Snapshot of the `index`-th canvas currently in the document.
    #[must_use]
    pub fn canvas(&self, index: usize) -> Option<CanvasSnapshot> {
        let inner = self.inner.borrow();
        let record = inner.canvases.get(index)?.borrow();
        Some(CanvasSnapshot {
            serial: record.serial,
            drawing_size: record.raster.drawing_size(),
            display_rect: record.raster.display_rect(),
            pointer_passthrough: record.raster.pointer_passthrough(),
            ops: record.ops.clone(),
            image: record.raster.image().clone(),
        })
    }

    /// Every status notification delivered so far.
    #[must_use]
    pub fn statuses(&self) -> Vec<OverlayStatus> {
        self.inner.borrow().statuses.clone()
    }

    /// Most recent status notification.
    #[must_use]
    pub fn last_status(&self) -> Option<OverlayStatus> {
        self.inner.borrow().statuses.last().cloned()
    }
}

impl HostPage for SimulatedPage {
    fn video_candidates(&self, _selector: &str) -> Vec<VideoHandle> {
        self.inner
            .borrow()
            .videos
            .iter()
            .map(|v| Rc::clone(v) as VideoHandle)
            .collect()
    }

    fn scroll_offset(&self) -> Point {
        self.inner.borrow().scroll
    }

    fn create_canvas(&self) -> Result<Box<dyn Canvas>> {
        let mut inner = self.inner.borrow_mut();
        let record = Rc::new(RefCell::new(CanvasRecord {
            serial: inner.canvases_created,
            raster: RasterCanvas::new(),
            ops: Vec::new(),
        }));
        inner.canvases_created += 1;
        inner.canvases.push(Rc::clone(&record));
        Ok(Box::new(SimCanvas {
            page: Rc::downgrade(&self.inner),
            record,
            removed: false,
        }))
    }

    fn subscribe(
        &self,
        source: GeometrySource,
        video: &VideoHandle,
        callback: ChangeCallback,
    ) -> Result<Box<dyn Subscription>> {
        let mut inner = self.inner.borrow_mut();
        inner.next_listener_id += 1;
        let id = inner.next_listener_id;
        inner.listeners.push(Listener {
            id,
            source,
            video: video.id(),
            callback,
        });
        Ok(Box::new(SimSubscription {
            page: Rc::downgrade(&self.inner),
            id,
        }))
    }

    fn notify_status(&self, status: &OverlayStatus) {
        self.inner.borrow_mut().statuses.push(status.clone());
    }
}

struct SimSubscription {
    page: Weak<RefCell<PageInner>>,
    id: u64,
}

impl Subscription for SimSubscription {
    fn cancel(&mut self) {
        if let Some(page) = self.page.upgrade() {
            let id = self.id;
            // Drop the callback outside the page borrow.
            let removed: Vec<Listener> = {
                let mut inner = page.borrow_mut();
                let (gone, kept): (Vec<Listener>, Vec<Listener>) = std::mem::take(&mut inner.listeners)
                    .into_iter()
                    .partition(|l| l.id == id);
                inner.listeners = kept;
                gone
            };
            drop(removed);
        }
        self.page = Weak::new();
    }
}

impl Drop for SimSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

struct SimCanvas {
    page: Weak<RefCell<PageInner>>,
    record: Rc<RefCell<CanvasRecord>>,
    removed: bool,
}

impl Canvas for SimCanvas {
    fn set_drawing_size(&mut self, size: Size) {
        self.record.borrow_mut().raster.set_drawing_size(size);
    }

    fn set_display_rect(&mut self, rect: Rect) {
        self.record.borrow_mut().raster.set_display_rect(rect);
    }

    fn set_pointer_passthrough(&mut self, passthrough: bool) {
        self.record
            .borrow_mut()
            .raster
            .set_pointer_passthrough(passthrough);
    }

    fn clear(&mut self) {
        let mut record = self.record.borrow_mut();
        record.raster.clear();
        record.ops.push(DrawOp::Clear);
    }

    fn fill_circle(&mut self, center: (f32, f32), radius: f32, color: Color) {
        let mut record = self.record.borrow_mut();
        record.raster.fill_circle(center, radius, color);
        record.ops.push(DrawOp::Point { center, color });
    }

    fn stroke_line(&mut self, from: (f32, f32), to: (f32, f32), width: f32, color: Color) {
        let mut record = self.record.borrow_mut();
        record.raster.stroke_line(from, to, width, color);
        record.ops.push(DrawOp::Line { from, to });
    }

    fn stroke_rect(&mut self, xyxy: [f32; 4], width: f32, color: Color) {
        let mut record = self.record.borrow_mut();
        record.raster.stroke_rect(xyxy, width, color);
        record.ops.push(DrawOp::Rect { xyxy });
    }

    fn remove(&mut self) {
        if self.removed {
            return;
        }
        self.removed = true;
        self.record.borrow_mut().raster.remove();
        if let Some(page) = self.page.upgrade() {
            page.borrow_mut()
                .canvases
                .retain(|c| !Rc::ptr_eq(c, &self.record));
        }
    }
}

struct SimVideoInner {
    id: VideoId,
    intrinsic: Cell<Size>,
    rect: Cell<Rect>,
    paused: Cell<bool>,
    ended: Cell<bool>,
}

impl Video for SimVideoInner {
    fn id(&self) -> VideoId {
        self.id
    }

    fn intrinsic_size(&self) -> Size {
        self.intrinsic.get()
    }

    fn client_rect(&self) -> Rect {
        self.rect.get()
    }

    fn is_paused(&self) -> bool {
        self.paused.get()
    }

    fn is_ended(&self) -> bool {
        self.ended.get()
    }
}

/// Test-side handle to a simulated video.
#[derive(Clone)]
pub struct SimVideo {
    inner: Rc<SimVideoInner>,
}

impl SimVideo {
    /// The handle the overlay sees.
    #[must_use]
    pub fn handle(&self) -> VideoHandle {
        Rc::clone(&self.inner) as VideoHandle
    }

    /// Element identity.
    #[must_use]
    pub fn id(&self) -> VideoId {
        self.inner.id
    }

    /// Change the decoded size (metadata load, quality switch).
    pub fn set_intrinsic_size(&self, size: Size) {
        self.inner.intrinsic.set(size);
    }

    /// Change the rendered box (viewport coordinates).
    pub fn set_client_rect(&self, rect: Rect) {
        self.inner.rect.set(rect);
    }

    /// Pause or resume playback.
    pub fn set_paused(&self, paused: bool) {
        self.inner.paused.set(paused);
    }

    /// Mark playback as ended.
    pub fn set_ended(&self, ended: bool) {
        self.inner.ended.set(ended);
    }
}

/// Frame timestamps at a fixed refresh rate.
#[derive(Debug, Clone, Copy)]
pub struct FrameClock {
    now_ms: f64,
    step_ms: f64,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(60.0)
    }
}

impl FrameClock {
    /// A clock ticking at `hz` frames per second.
    #[must_use]
    pub fn new(hz: f64) -> Self {
        Self {
            now_ms: 0.0,
            step_ms: 1000.0 / hz,
        }
    }

    /// Timestamp of the next frame.
    pub fn tick(&mut self) -> f64 {
        self.now_ms += self.step_ms;
        self.now_ms
    }
}

/// Joint offsets of the synthetic figure from its center, as fractions of frame height.
const FIGURE: [(f32, f32); 17] = [
    (0.0, -0.36),   // nose
    (-0.02, -0.38), // left eye
    (0.02, -0.38),  // right eye
    (-0.05, -0.37), // left ear
    (0.05, -0.37),  // right ear
    (-0.1, -0.25),  // left shoulder
    (0.1, -0.25),   // right shoulder
    (-0.14, -0.1),  // left elbow
    (0.14, -0.1),   // right elbow
    (-0.16, 0.04),  // left wrist
    (0.16, 0.04),   // right wrist
    (-0.07, 0.05),  // left hip
    (0.07, 0.05),   // right hip
    (-0.08, 0.24),  // left knee
    (0.08, 0.24),   // right knee
    (-0.09, 0.42),  // left ankle
    (0.09, 0.42),   // right ankle
];

/// A stand-in model producing one swaying 17-keypoint figure per frame.
///
/// The first `fail_first` estimates reject, like a model that is still warming up.
pub struct SyntheticEstimator {
    calls: Cell<u64>,
    fail_first: u64,
}

impl SyntheticEstimator {
    /// Create an estimator that rejects its first `fail_first` calls.
    #[must_use]
    pub const fn new(fail_first: u64) -> Self {
        Self {
            calls: Cell::new(0),
            fail_first,
        }
    }

    /// Estimates issued so far.
    #[must_use]
    pub fn calls(&self) -> u64 {
        self.calls.get()
    }

    #[allow(clippy::cast_precision_loss)]
    fn figure(&self, size: Size, call: u64) -> Pose {
        let (w, h) = (size.width as f32, size.height as f32);
        let sway = (call as f32 / 30.0 * TAU).sin() * 0.05 * w;
        let (cx, cy) = (w / 2.0 + sway, h / 2.0);
        let keypoints = FIGURE
            .iter()
            .enumerate()
            .map(|(i, &(dx, dy))| {
                // Wrists flicker below threshold every few frames.
                let score = if (9..=10).contains(&i) && call % 4 == 0 { 0.2 } else { 0.9 };
                Keypoint::new(cx + dx * h, cy + dy * h, score)
            })
            .collect();
        let half_w = 0.2 * h / w;
        let x_center = cx / w;
        Pose::new(keypoints).with_bounding_box(BoundingBox::new(
            (x_center - half_w).max(0.0),
            0.1,
            (x_center + half_w).min(1.0),
            0.95,
        ))
    }
}

impl PoseEstimator for SyntheticEstimator {
    fn estimate(&self, video: &VideoHandle, params: EstimateParams) -> EstimateFuture {
        let call = self.calls.get();
        self.calls.set(call + 1);
        let result = if call < self.fail_first {
            Err(OverlayError::EstimationError(format!(
                "model warming up ({}/{})",
                call + 1,
                self.fail_first
            )))
        } else {
            let mut poses = vec![self.figure(video.intrinsic_size(), call)];
            poses.truncate(params.max_poses);
            Ok(poses)
        };
        futures::future::ready(result).boxed_local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_in_document_order() {
        let page = SimulatedPage::new();
        let first = page.insert_video(Size::new(640, 360), Rect::default());
        let second = page.insert_video(Size::new(1280, 720), Rect::default());

        let ids: Vec<VideoId> = page.video_candidates("video").iter().map(|v| v.id()).collect();
        assert_eq!(ids, vec![first.id(), second.id()]);

        page.remove_video(&second);
        assert_eq!(page.video_candidates("video").len(), 1);
    }

    #[test]
    fn test_subscription_cancel_removes_listener() {
        let page = SimulatedPage::new();
        let video = page.insert_video(Size::new(640, 360), Rect::default());
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);

        let mut sub = page
            .subscribe(GeometrySource::Scroll, &video.handle(), Rc::new(move || counter.set(counter.get() + 1)))
            .unwrap();
        assert_eq!(page.fire(GeometrySource::Scroll), 1);
        sub.cancel();
        sub.cancel();
        assert_eq!(page.fire(GeometrySource::Scroll), 0);
        assert_eq!(hits.get(), 1);
        assert_eq!(page.listener_count(), 0);
    }

    #[test]
    fn test_canvas_remove_leaves_document() {
        let page = SimulatedPage::new();
        let mut canvas = page.create_canvas().unwrap();
        assert_eq!(page.canvas_count(), 1);
        canvas.remove();
        canvas.remove();
        assert_eq!(page.canvas_count(), 0);
        assert_eq!(page.canvases_created(), 1);
    }

    #[test]
    fn test_synthetic_estimator_warm_up() {
        let page = SimulatedPage::new();
        let video = page.insert_video(Size::new(1280, 720), Rect::default());
        let estimator = SyntheticEstimator::new(1);
        let params = EstimateParams {
            max_poses: 1,
            score_threshold: 0.3,
        };

        assert!(estimator.estimate(&video.handle(), params).now_or_never().unwrap().is_err());
        let poses = estimator
            .estimate(&video.handle(), params)
            .now_or_never()
            .unwrap()
            .unwrap();
        assert_eq!(poses.len(), 1);
        assert!(poses[0].is_coco());
        assert!(poses[0].bounding_box.unwrap().validate().is_ok());
        assert_eq!(estimator.calls(), 2);
    }
}
