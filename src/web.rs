// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Browser backend: the host traits implemented on the live DOM with `web-sys`.
//!
//! [`install`] wires one [`OverlayController`] into the page:
//!
//! - `pose-overlay-control` `CustomEvent`s (detail `{"action": "start" | "stop"}`) drive it,
//! - status changes go out as `pose-overlay-status` events (detail `{isActive, message}`),
//! - `pagehide` stops the session,
//! - frames are driven with `requestAnimationFrame` while the session asks for them.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::f64::consts::TAU;
use std::rc::Rc;

use futures::FutureExt;
use js_sys::{Array, Function, JSON, Promise};
use log::{Level, LevelFilter, Log, Metadata, Record, debug, error};
use wasm_bindgen::JsCast as _;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    CanvasRenderingContext2d, CustomEvent, CustomEventInit, Document, Event, EventTarget,
    HtmlCanvasElement, HtmlVideoElement, MutationObserver, MutationObserverInit, ResizeObserver,
    Window,
};

use crate::config::OverlayConfig;
use crate::control::{ControlAction, ControlCommand, OverlayController, OverlayStatus, PageClaim};
use crate::error::{OverlayError, Result};
use crate::geometry::{Point, Rect, Size};
use crate::host::{
    Canvas, ChangeCallback, GeometrySource, HostPage, Subscription, Video, VideoHandle, VideoId,
};
use crate::pose::{EstimateFuture, EstimateParams, Pose, PoseEstimator};
use crate::session::FrameRequest;
use crate::visualizer::Color;

/// Event the panel dispatches on `window` to start or stop the overlay.
pub const CONTROL_EVENT: &str = "pose-overlay-control";
/// Event dispatched on `window` whenever the overlay status changes.
pub const STATUS_EVENT: &str = "pose-overlay-status";

const CANVAS_Z_INDEX: &str = "2147483646";

fn js_error(context: &str, err: &JsValue) -> String {
    format!("{context}: {err:?}")
}

fn host_err(context: &str) -> impl FnOnce(JsValue) -> OverlayError + '_ {
    move |e| OverlayError::HostError(js_error(context, &e))
}

/// A `<video>` element on the page.
pub struct WebVideo {
    id: VideoId,
    element: HtmlVideoElement,
}

impl WebVideo {
    /// The underlying element.
    #[must_use]
    pub const fn element(&self) -> &HtmlVideoElement {
        &self.element
    }
}

impl Video for WebVideo {
    fn id(&self) -> VideoId {
        self.id
    }

    fn intrinsic_size(&self) -> Size {
        Size::new(self.element.video_width(), self.element.video_height())
    }

    fn client_rect(&self) -> Rect {
        let r = self.element.get_bounding_client_rect();
        Rect::new(r.left(), r.top(), r.width(), r.height())
    }

    fn is_paused(&self) -> bool {
        self.element.paused()
    }

    fn is_ended(&self) -> bool {
        self.element.ended()
    }
}

/// The live document as a [`HostPage`].
///
/// Video handles are cached per element so the same element always maps to the same
/// [`VideoId`] and handle; entries are dropped once the element leaves the document.
pub struct WebPage {
    window: Window,
    document: Document,
    videos: RefCell<Vec<Rc<WebVideo>>>,
    next_id: Cell<u64>,
}

impl WebPage {
    /// Bind to the current window.
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError::HostError`] outside a browsing context.
    pub fn new() -> Result<Self> {
        let window = web_sys::window()
            .ok_or_else(|| OverlayError::HostError("no window".to_string()))?;
        let document = window
            .document()
            .ok_or_else(|| OverlayError::HostError("no document".to_string()))?;
        Ok(Self {
            window,
            document,
            videos: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
        })
    }

    /// Element behind a handle this page produced.
    #[must_use]
    pub fn element_for(&self, id: VideoId) -> Option<HtmlVideoElement> {
        self.videos
            .borrow()
            .iter()
            .find(|v| v.id == id)
            .map(|v| v.element.clone())
    }

    fn handle_for(&self, element: HtmlVideoElement) -> Rc<WebVideo> {
        let mut videos = self.videos.borrow_mut();
        if let Some(known) = videos.iter().find(|v| v.element == element) {
            return Rc::clone(known);
        }
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        let video = Rc::new(WebVideo {
            id: VideoId(id),
            element,
        });
        videos.push(Rc::clone(&video));
        video
    }

    fn dispatch(&self, name: &str, detail: &JsValue) -> std::result::Result<(), JsValue> {
        let init = CustomEventInit::new();
        init.set_detail(detail);
        let event = CustomEvent::new_with_event_init_dict(name, &init)?;
        self.window.dispatch_event(&event)?;
        Ok(())
    }
}

impl HostPage for WebPage {
    fn video_candidates(&self, selector: &str) -> Vec<VideoHandle> {
        self.videos.borrow_mut().retain(|v| v.element.is_connected());

        let list = match self.document.query_selector_all(selector) {
            Ok(list) => list,
            Err(e) => {
                error!("{}", js_error("querySelectorAll failed", &e));
                return Vec::new();
            }
        };
        (0..list.length())
            .filter_map(|i| list.item(i))
            .filter_map(|node| node.dyn_into::<HtmlVideoElement>().ok())
            .map(|element| self.handle_for(element) as VideoHandle)
            .collect()
    }

    fn scroll_offset(&self) -> Point {
        Point::new(
            self.window.scroll_x().unwrap_or(0.0),
            self.window.scroll_y().unwrap_or(0.0),
        )
    }

    fn create_canvas(&self) -> Result<Box<dyn Canvas>> {
        let element: HtmlCanvasElement = self
            .document
            .create_element("canvas")
            .map_err(host_err("create canvas"))?
            .unchecked_into();
        let context: CanvasRenderingContext2d = element
            .get_context("2d")
            .map_err(host_err("get 2d context"))?
            .ok_or_else(|| OverlayError::CanvasError("2d context unavailable".to_string()))?
            .unchecked_into();

        let style = element.style();
        for (name, value) in [
            ("position", "absolute"),
            ("margin", "0"),
            ("padding", "0"),
            ("z-index", CANVAS_Z_INDEX),
        ] {
            style
                .set_property(name, value)
                .map_err(host_err("style canvas"))?;
        }

        let body = self
            .document
            .body()
            .ok_or_else(|| OverlayError::HostError("document has no body".to_string()))?;
        body.append_child(&element)
            .map_err(host_err("insert canvas"))?;

        Ok(Box::new(WebCanvas {
            element,
            context,
            size: Size::default(),
        }))
    }

    fn subscribe(
        &self,
        source: GeometrySource,
        video: &VideoHandle,
        callback: ChangeCallback,
    ) -> Result<Box<dyn Subscription>> {
        let element = self.element_for(video.id()).ok_or_else(|| {
            OverlayError::ObserverError(format!("{} is not on this page", video.id()))
        })?;
        let closure = Closure::<dyn FnMut()>::new(move || callback());

        let registration = match source {
            GeometrySource::IntrinsicResize => {
                listen(&element, &["resize", "loadedmetadata"], &closure)?
            }
            GeometrySource::ElementResize => {
                let observer = ResizeObserver::new(closure.as_ref().unchecked_ref())
                    .map_err(observer_err("ResizeObserver"))?;
                observer.observe(&element);
                Registration::Resize(observer)
            }
            GeometrySource::LayoutMutation => {
                let observer = MutationObserver::new(closure.as_ref().unchecked_ref())
                    .map_err(observer_err("MutationObserver"))?;
                let init = MutationObserverInit::new();
                init.set_attributes(true);
                init.set_attribute_filter(&Array::of2(&"class".into(), &"style".into()));
                let target = element
                    .parent_element()
                    .unwrap_or_else(|| element.clone().unchecked_into());
                observer
                    .observe_with_options(&target, &init)
                    .map_err(observer_err("MutationObserver.observe"))?;
                Registration::Mutation(observer)
            }
            GeometrySource::Scroll => listen(&self.window, &["scroll"], &closure)?,
            GeometrySource::WindowResize => listen(&self.window, &["resize"], &closure)?,
        };

        Ok(Box::new(WebSubscription {
            registration: Some(registration),
            closure: Some(closure),
        }))
    }

    fn notify_status(&self, status: &OverlayStatus) {
        let detail = status
            .to_json()
            .ok()
            .and_then(|json| JSON::parse(&json).ok())
            .unwrap_or(JsValue::NULL);
        if let Err(e) = self.dispatch(STATUS_EVENT, &detail) {
            error!("{}", js_error("status dispatch failed", &e));
        }
    }
}

fn observer_err(context: &str) -> impl FnOnce(JsValue) -> OverlayError + '_ {
    move |e| OverlayError::ObserverError(js_error(context, &e))
}

fn listen(
    target: &EventTarget,
    events: &[&'static str],
    closure: &Closure<dyn FnMut()>,
) -> Result<Registration> {
    for event in events {
        target
            .add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())
            .map_err(observer_err("addEventListener"))?;
    }
    Ok(Registration::Listener {
        target: target.clone(),
        events: events.to_vec(),
    })
}

enum Registration {
    Listener {
        target: EventTarget,
        events: Vec<&'static str>,
    },
    Resize(ResizeObserver),
    Mutation(MutationObserver),
}

/// One native observer or listener, with the closure it keeps alive.
struct WebSubscription {
    registration: Option<Registration>,
    closure: Option<Closure<dyn FnMut()>>,
}

impl Subscription for WebSubscription {
    fn cancel(&mut self) {
        let (Some(registration), Some(closure)) = (self.registration.take(), self.closure.take())
        else {
            return;
        };
        match registration {
            Registration::Listener { target, events } => {
                for event in events {
                    let _ = target
                        .remove_event_listener_with_callback(event, closure.as_ref().unchecked_ref());
                }
            }
            Registration::Resize(observer) => observer.disconnect(),
            Registration::Mutation(observer) => observer.disconnect(),
        }
    }
}

impl Drop for WebSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// A 2D `<canvas>` positioned over the video.
struct WebCanvas {
    element: HtmlCanvasElement,
    context: CanvasRenderingContext2d,
    size: Size,
}

impl WebCanvas {
    fn set_style(&self, name: &str, value: &str) {
        if let Err(e) = self.element.style().set_property(name, value) {
            debug!("{}", js_error("canvas style", &e));
        }
    }
}

impl Canvas for WebCanvas {
    fn set_drawing_size(&mut self, size: Size) {
        self.element.set_width(size.width);
        self.element.set_height(size.height);
        self.size = size;
    }

    fn set_display_rect(&mut self, rect: Rect) {
        self.set_style("left", &format!("{}px", rect.left));
        self.set_style("top", &format!("{}px", rect.top));
        self.set_style("width", &format!("{}px", rect.width));
        self.set_style("height", &format!("{}px", rect.height));
    }

    fn set_pointer_passthrough(&mut self, passthrough: bool) {
        self.set_style("pointer-events", if passthrough { "none" } else { "auto" });
    }

    fn clear(&mut self) {
        self.context.clear_rect(
            0.0,
            0.0,
            f64::from(self.size.width),
            f64::from(self.size.height),
        );
    }

    fn fill_circle(&mut self, center: (f32, f32), radius: f32, color: Color) {
        self.context.begin_path();
        let arc = self.context.arc(
            f64::from(center.0),
            f64::from(center.1),
            f64::from(radius),
            0.0,
            TAU,
        );
        if arc.is_ok() {
            self.context.set_fill_style_str(&color.to_css());
            self.context.fill();
        }
    }

    fn stroke_line(&mut self, from: (f32, f32), to: (f32, f32), width: f32, color: Color) {
        self.context.begin_path();
        self.context.move_to(f64::from(from.0), f64::from(from.1));
        self.context.line_to(f64::from(to.0), f64::from(to.1));
        self.context.set_stroke_style_str(&color.to_css());
        self.context.set_line_width(f64::from(width));
        self.context.stroke();
    }

    fn stroke_rect(&mut self, xyxy: [f32; 4], width: f32, color: Color) {
        let [x1, y1, x2, y2] = xyxy.map(f64::from);
        self.context.set_stroke_style_str(&color.to_css());
        self.context.set_line_width(f64::from(width));
        self.context.stroke_rect(x1, y1, x2 - x1, y2 - y1);
    }

    fn remove(&mut self) {
        self.element.remove();
    }
}

/// A JavaScript pose model: `(video, {maxPoses, scoreThreshold}) => Promise<Pose[]>`.
pub struct JsEstimator {
    page: Rc<WebPage>,
    estimate: Function,
}

impl JsEstimator {
    /// Wrap `estimate`, resolving video handles through `page`.
    #[must_use]
    pub const fn new(page: Rc<WebPage>, estimate: Function) -> Self {
        Self { page, estimate }
    }
}

fn estimation_err(context: &str) -> impl FnOnce(JsValue) -> OverlayError + '_ {
    move |e| OverlayError::EstimationError(js_error(context, &e))
}

impl PoseEstimator for JsEstimator {
    fn estimate(&self, video: &VideoHandle, params: EstimateParams) -> EstimateFuture {
        let call = self
            .page
            .element_for(video.id())
            .ok_or_else(|| OverlayError::EstimationError(format!("{} is gone", video.id())))
            .and_then(|element| {
                let params = serde_json::to_string(&params)?;
                let params = JSON::parse(&params).map_err(estimation_err("params"))?;
                self.estimate
                    .call2(&JsValue::NULL, &element, &params)
                    .map_err(estimation_err("estimatePoses threw"))
            });

        async move {
            let value = JsFuture::from(Promise::resolve(&call?))
                .await
                .map_err(estimation_err("estimatePoses rejected"))?;
            let json: String = JSON::stringify(&value)
                .map_err(estimation_err("poses not serializable"))?
                .into();
            serde_json::from_str::<Vec<Pose>>(&json)
                .map_err(|e| OverlayError::EstimationError(format!("malformed poses: {e}")))
        }
        .boxed_local()
    }
}

/// Routes the `log` facade to the browser console.
struct ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = JsValue::from_str(&format!("[pose-overlay] {}", record.args()));
        match record.level() {
            Level::Error => web_sys::console::error_1(&line),
            Level::Warn => web_sys::console::warn_1(&line),
            Level::Info => web_sys::console::info_1(&line),
            Level::Debug | Level::Trace => web_sys::console::debug_1(&line),
        }
    }

    fn flush(&self) {}
}

static LOGGER: ConsoleLogger = ConsoleLogger;

type FrameClosure = Closure<dyn FnMut(f64)>;

/// Shared state behind the installed event handlers.
struct Driver {
    _claim: PageClaim,
    window: Window,
    controller: RefCell<OverlayController>,
    commands: RefCell<VecDeque<ControlCommand>>,
    frame: RefCell<Option<FrameClosure>>,
    scheduled: Cell<bool>,
}

impl Driver {
    /// Queue a command and apply it unless the controller is mid-frame.
    fn submit(self: &Rc<Self>, command: ControlCommand) {
        self.commands.borrow_mut().push_back(command);
        self.pump();
    }

    fn pump(self: &Rc<Self>) {
        let Ok(mut controller) = self.controller.try_borrow_mut() else {
            return;
        };
        let mut wants_frames = false;
        loop {
            // Status events dispatched by `handle` may queue more commands.
            let next = self.commands.borrow_mut().pop_front();
            let Some(command) = next else {
                break;
            };
            wants_frames = controller.handle(command) == FrameRequest::Continue;
        }
        drop(controller);
        if wants_frames {
            self.schedule();
        }
    }

    fn page_hide(&self) {
        match self.controller.try_borrow_mut() {
            Ok(mut controller) => controller.on_page_hide(),
            Err(_) => self.commands.borrow_mut().push_back(ControlCommand {
                action: ControlAction::Stop,
            }),
        }
    }

    fn schedule(self: &Rc<Self>) {
        if self.scheduled.get() {
            return;
        }
        let frame = self.frame.borrow();
        let Some(callback) = frame.as_ref() else {
            return;
        };
        match self
            .window
            .request_animation_frame(callback.as_ref().unchecked_ref())
        {
            Ok(_) => self.scheduled.set(true),
            Err(e) => error!("{}", js_error("requestAnimationFrame failed", &e)),
        }
    }

    fn on_frame(self: &Rc<Self>, timestamp_ms: f64) {
        self.scheduled.set(false);
        self.pump();
        let request = match self.controller.try_borrow_mut() {
            Ok(mut controller) => controller.on_frame(timestamp_ms),
            Err(_) => FrameRequest::Continue,
        };
        if request == FrameRequest::Continue {
            self.schedule();
        }
    }
}

/// Install the overlay on the current page.
///
/// `estimate` is the page's pose model, called as `estimate(video, params)` and expected to
/// return (a Promise of) an array of poses. `config_toml` optionally overrides defaults.
///
/// # Errors
///
/// Fails if the overlay is already installed on this page, outside a browsing context, on
/// invalid configuration, or if listeners cannot be registered.
#[wasm_bindgen]
pub fn install(estimate: Function, config_toml: Option<String>) -> std::result::Result<(), JsValue> {
    let claim = PageClaim::acquire().map_err(|e| JsValue::from_str(&e.to_string()))?;
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Info);
    }

    let config = match config_toml {
        Some(toml) => OverlayConfig::from_toml_str(&toml),
        None => Ok(OverlayConfig::default()),
    }
    .map_err(|e| JsValue::from_str(&e.to_string()))?;
    let page = Rc::new(WebPage::new().map_err(|e| JsValue::from_str(&e.to_string()))?);
    let window = page.window.clone();

    let estimator = Rc::new(JsEstimator::new(Rc::clone(&page), estimate));
    let driver = Rc::new(Driver {
        _claim: claim,
        window: window.clone(),
        controller: RefCell::new(OverlayController::new(page, estimator, config)),
        commands: RefCell::new(VecDeque::new()),
        frame: RefCell::new(None),
        scheduled: Cell::new(false),
    });

    // The frame closure holds the driver weakly so the driver can own the closure.
    let weak = Rc::downgrade(&driver);
    *driver.frame.borrow_mut() = Some(Closure::<dyn FnMut(f64)>::new(move |ts: f64| {
        if let Some(driver) = weak.upgrade() {
            driver.on_frame(ts);
        }
    }));

    let control_driver = Rc::clone(&driver);
    let on_control = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
        let Some(detail) = event.dyn_ref::<CustomEvent>().map(CustomEvent::detail) else {
            return;
        };
        let parsed = JSON::stringify(&detail)
            .map_err(|e| js_error("control detail", &e))
            .and_then(|json| {
                ControlCommand::from_json(&String::from(json)).map_err(|e| e.to_string())
            });
        match parsed {
            Ok(command) => control_driver.submit(command),
            Err(e) => error!("ignoring control event: {e}"),
        }
    });
    window.add_event_listener_with_callback(CONTROL_EVENT, on_control.as_ref().unchecked_ref())?;
    on_control.forget();

    let hide_driver = Rc::clone(&driver);
    let on_page_hide = Closure::<dyn FnMut(Event)>::new(move |_event: Event| {
        hide_driver.page_hide();
    });
    window.add_event_listener_with_callback("pagehide", on_page_hide.as_ref().unchecked_ref())?;
    on_page_hide.forget();

    debug!("pose overlay installed");
    Ok(())
}
