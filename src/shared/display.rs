// This is free and unencumbered software released into the public domain.

use crate::shared::{CameraError, Rect, Size};
use image::{Rgba, RgbaImage, imageops};
use std::{
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
};

/// The window the preview is drawn into.
pub trait Display: Send {
    /// Absolute window rectangle on screen.
    fn rect(&self) -> Rect;

    /// Alpha-blends `image` onto the back buffer, centered on the window.
    fn blit_centered(&mut self, image: &RgbaImage);

    /// Flips the back buffer to the screen.
    fn present(&mut self) -> Result<(), CameraError>;
}

#[derive(Debug)]
struct Surface {
    rect: Rect,
    back: RgbaImage,
    front: RgbaImage,
    presented: u64,
}

/// Software display backed by two RGBA buffers.
///
/// Clones share the same surface, so a handle kept by the host can inspect
/// what the adapter drew.
#[derive(Clone, Debug)]
pub struct MemoryDisplay {
    surface: Arc<Mutex<Surface>>,
}

impl MemoryDisplay {
    pub const BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 255]);

    pub fn new(size: Size) -> Self {
        Self::with_rect(Rect::new(0, 0, size.width, size.height))
    }

    pub fn with_rect(rect: Rect) -> Self {
        let back = RgbaImage::from_pixel(rect.width, rect.height, Self::BACKGROUND);
        Self {
            surface: Arc::new(Mutex::new(Surface {
                rect,
                front: back.clone(),
                back,
                presented: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Surface> {
        self.surface.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Number of buffer flips so far.
    pub fn presented(&self) -> u64 {
        self.lock().presented
    }

    /// Copy of the last presented buffer.
    pub fn snapshot(&self) -> RgbaImage {
        self.lock().front.clone()
    }

    pub fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<(), CameraError> {
        self.snapshot().save(path)?;
        Ok(())
    }
}

impl Display for MemoryDisplay {
    fn rect(&self) -> Rect {
        self.lock().rect
    }

    fn blit_centered(&mut self, image: &RgbaImage) {
        let mut surface = self.lock();
        let x = (surface.back.width() as i64 - image.width() as i64) / 2;
        let y = (surface.back.height() as i64 - image.height() as i64) / 2;
        imageops::overlay(&mut surface.back, image, x, y);
    }

    fn present(&mut self) -> Result<(), CameraError> {
        let mut surface = self.lock();
        let surface = &mut *surface;
        surface.front.clone_from(&surface.back);
        surface.presented += 1;
        Ok(())
    }
}
