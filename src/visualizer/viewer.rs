// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Preview window for a simulated overlay raster.

use std::time::{Duration, Instant};

use image::RgbaImage;
use minifb::{Key, Window, WindowOptions};

use crate::error::{OverlayError, Result};

/// A minifb window showing the overlay canvas over a dark backdrop.
pub struct Viewer {
    window: Window,
    width: usize,
    height: usize,
    buffer: Vec<u32>,
}

impl Viewer {
    /// Open a preview window.
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError::CanvasError`] if the window cannot be created.
    pub fn new(title: &str, width: usize, height: usize) -> Result<Self> {
        let mut window = Window::new(
            title,
            width,
            height,
            WindowOptions {
                resize: true,
                ..WindowOptions::default()
            },
        )
        .map_err(|e| OverlayError::CanvasError(format!("Failed to create window: {e}")))?;

        window.set_target_fps(60);

        Ok(Self {
            window,
            width,
            height,
            buffer: Vec::new(),
        })
    }

    /// Whether the window is still open and no quit key is held.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.window.is_open()
            && !self.window.is_key_down(Key::Escape)
            && !self.window.is_key_down(Key::Q)
    }

    /// Show `image`, alpha-blended onto black. Returns `false` once the user closed the window.
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError::CanvasError`] if the window rejects the frame.
    pub fn update(&mut self, image: &RgbaImage) -> Result<bool> {
        if !self.is_open() {
            return Ok(false);
        }

        self.width = image.width() as usize;
        self.height = image.height() as usize;
        self.buffer.clear();
        self.buffer.extend(image.pixels().map(|p| {
            let [r, g, b, a] = p.0;
            let blend = |c: u8| u32::from(c) * u32::from(a) / 255;
            // 0x00RRGGBB
            (blend(r) << 16) | (blend(g) << 8) | blend(b)
        }));

        self.window
            .update_with_buffer(&self.buffer, self.width, self.height)
            .map_err(|e| OverlayError::CanvasError(format!("Failed to update window: {e}")))?;
        Ok(true)
    }

    /// Keep the last frame on screen for `duration`, or until the window closes.
    pub fn wait(&mut self, duration: Duration) -> bool {
        if self.buffer.is_empty() {
            return true;
        }
        let start = Instant::now();
        while start.elapsed() < duration {
            if !self.is_open() {
                return false;
            }
            let _ = self
                .window
                .update_with_buffer(&self.buffer, self.width, self.height);
        }
        true
    }
}
