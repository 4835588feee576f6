// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Geometry change observation for the tracked video.
//!
//! The watcher registers one native primitive per [`GeometrySource`] and funnels all of
//! them into a single `on_change` callback. Every registration goes through a shared
//! liveness flag, so an event the host already queued before [`GeometryWatcher::detach`]
//! cannot reach `on_change` afterwards.

use std::cell::Cell;
use std::rc::Rc;

use log::debug;

use crate::error::Result;
use crate::host::{ChangeCallback, GeometrySource, HostPage, Subscription, VideoHandle, VideoId};

struct Attachment {
    video: VideoId,
    live: Rc<Cell<bool>>,
    subscriptions: Vec<Box<dyn Subscription>>,
}

impl Attachment {
    fn teardown(mut self) {
        self.live.set(false);
        for sub in &mut self.subscriptions {
            sub.cancel();
        }
    }
}

/// Observes one video's size and layout. At most one attachment at a time.
#[derive(Default)]
pub struct GeometryWatcher {
    attachment: Option<Attachment>,
}

impl GeometryWatcher {
    /// Create a detached watcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start observing `video`, detaching any previous attachment first.
    ///
    /// If any registration fails, the ones already made are torn down before returning.
    ///
    /// # Errors
    ///
    /// Returns the host's error for the failed registration.
    pub fn attach(
        &mut self,
        host: &dyn HostPage,
        video: &VideoHandle,
        on_change: ChangeCallback,
    ) -> Result<()> {
        self.detach();

        let live = Rc::new(Cell::new(true));
        let mut attachment = Attachment {
            video: video.id(),
            live: Rc::clone(&live),
            subscriptions: Vec::with_capacity(GeometrySource::ALL.len()),
        };

        for source in GeometrySource::ALL {
            let live = Rc::clone(&live);
            let on_change = Rc::clone(&on_change);
            let gated: ChangeCallback = Rc::new(move || {
                if live.get() {
                    on_change();
                }
            });
            match host.subscribe(source, video, gated) {
                Ok(sub) => attachment.subscriptions.push(sub),
                Err(e) => {
                    attachment.teardown();
                    return Err(e);
                }
            }
        }

        debug!("geometry watcher attached to {}", attachment.video);
        self.attachment = Some(attachment);
        Ok(())
    }

    /// Remove every registration. Safe to call when detached.
    pub fn detach(&mut self) {
        if let Some(attachment) = self.attachment.take() {
            debug!("geometry watcher detached from {}", attachment.video);
            attachment.teardown();
        }
    }

    /// Whether a video is being observed.
    #[must_use]
    pub const fn is_attached(&self) -> bool {
        self.attachment.is_some()
    }

    /// The observed video.
    #[must_use]
    pub fn video(&self) -> Option<VideoId> {
        self.attachment.as_ref().map(|a| a.video)
    }
}

impl Drop for GeometryWatcher {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Rect, Size};
    use crate::sim::SimulatedPage;

    fn counter() -> (Rc<Cell<usize>>, ChangeCallback) {
        let hits = Rc::new(Cell::new(0));
        let inner = Rc::clone(&hits);
        (hits, Rc::new(move || inner.set(inner.get() + 1)))
    }

    #[test]
    fn test_every_source_reaches_callback() {
        let page = SimulatedPage::new();
        let video = page.insert_video(Size::new(640, 360), Rect::default());
        let (hits, on_change) = counter();

        let mut watcher = GeometryWatcher::new();
        watcher.attach(&page, &video.handle(), on_change).unwrap();
        assert_eq!(page.listener_count(), GeometrySource::ALL.len());

        page.fire_all();
        assert_eq!(hits.get(), GeometrySource::ALL.len());
    }

    #[test]
    fn test_detach_is_leak_free() {
        let page = SimulatedPage::new();
        let video = page.insert_video(Size::new(640, 360), Rect::default());
        let (hits, on_change) = counter();

        let mut watcher = GeometryWatcher::new();
        watcher.attach(&page, &video.handle(), on_change).unwrap();
        watcher.detach();
        watcher.detach();

        assert_eq!(page.listener_count(), 0);
        assert_eq!(page.fire_all(), 0);
        assert_eq!(hits.get(), 0);
        assert!(!watcher.is_attached());
    }

    #[test]
    fn test_second_attach_replaces_first() {
        let page = SimulatedPage::new();
        let first = page.insert_video(Size::new(640, 360), Rect::default());
        let second = page.insert_video(Size::new(1280, 720), Rect::default());
        let (first_hits, first_cb) = counter();
        let (second_hits, second_cb) = counter();

        let mut watcher = GeometryWatcher::new();
        watcher.attach(&page, &first.handle(), first_cb).unwrap();
        watcher.attach(&page, &second.handle(), second_cb).unwrap();

        assert_eq!(page.listeners_for(&first), 0);
        assert_eq!(page.listeners_for(&second), GeometrySource::ALL.len());
        page.fire(GeometrySource::Scroll);
        assert_eq!(first_hits.get(), 0);
        assert_eq!(second_hits.get(), 1);
        assert_eq!(watcher.video(), Some(second.id()));
    }

    #[test]
    fn test_callback_released_after_detach() {
        let page = SimulatedPage::new();
        let video = page.insert_video(Size::new(640, 360), Rect::default());
        let (hits, on_change) = counter();
        let weak = Rc::downgrade(&on_change);

        let mut watcher = GeometryWatcher::new();
        watcher.attach(&page, &video.handle(), on_change).unwrap();
        watcher.detach();

        assert!(weak.upgrade().is_none());
        assert_eq!(hits.get(), 0);
    }
}
