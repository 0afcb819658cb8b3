// This is free and unencumbered software released into the public domain.

use crate::shared::{CameraDevice, CameraError, Display, Rect, Rotation};
use image::{RgbaImage, imageops};
use std::{
    sync::{
        Arc, Mutex, MutexGuard,
        mpsc::{RecvTimeoutError, SyncSender, sync_channel},
    },
    thread::JoinHandle,
    time::Duration,
};

/// Everything a frame update touches: device, window and overlay.
///
/// Shared between the adapter and the preview worker behind one mutex.
pub(crate) struct PreviewSurface {
    pub(crate) device: Box<dyn CameraDevice>,
    pub(crate) window: Option<Box<dyn Display>>,
    pub(crate) overlay: Option<RgbaImage>,
    pub(crate) rect: Rect,
    pub(crate) rotation: Rotation,
}

impl std::fmt::Debug for PreviewSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewSurface")
            .field("device", &self.device)
            .field("window", &self.window.as_ref().map(|w| w.rect()))
            .field("overlay", &self.overlay.as_ref().map(|o| o.dimensions()))
            .field("rect", &self.rect)
            .field("rotation", &self.rotation)
            .finish()
    }
}

impl PreviewSurface {
    pub(crate) fn new(device: Box<dyn CameraDevice>) -> Self {
        Self {
            device,
            window: None,
            overlay: None,
            rect: Rect::default(),
            rotation: Rotation::None,
        }
    }

    /// Pulls one frame, fits it to the preview rect, rotates it, and presents
    /// it under the current overlay.
    pub(crate) fn update(&mut self) -> Result<(), CameraError> {
        let Some(window) = self.window.as_mut() else {
            return Err(CameraError::invalid_state("no preview window"));
        };
        if self.rect.size().is_empty() {
            return Err(CameraError::invalid_state("preview rectangle is empty"));
        }

        let frame = self.device.capture_frame()?.to_rgba_image()?;
        let fitted = imageops::resize(
            &frame,
            self.rect.width,
            self.rect.height,
            imageops::FilterType::CatmullRom,
        );
        let rotated = match self.rotation {
            Rotation::None => fitted,
            Rotation::Cw90 => imageops::rotate90(&fitted),
            Rotation::Cw180 => imageops::rotate180(&fitted),
            Rotation::Cw270 => imageops::rotate270(&fitted),
        };

        window.blit_centered(&rotated);
        if let Some(overlay) = self.overlay.as_ref() {
            window.blit_centered(overlay);
        }
        window.present()
    }
}

pub(crate) fn lock_surface(surface: &Mutex<PreviewSurface>) -> MutexGuard<'_, PreviewSurface> {
    surface.lock().unwrap_or_else(|p| p.into_inner())
}

/// Background thread refreshing the preview until stopped.
#[derive(Debug)]
pub(crate) struct PreviewWorker {
    stop_tx: SyncSender<()>,
    join: Option<JoinHandle<()>>,
}

impl PreviewWorker {
    pub(crate) fn spawn(surface: Arc<Mutex<PreviewSurface>>, interval: Duration) -> Self {
        let (stop_tx, stop_rx) = sync_channel::<()>(1);

        let join = std::thread::spawn(move || {
            tracing::debug!(target: "booth_camera_module", "preview worker started");
            loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        if let Err(err) = lock_surface(&surface).update() {
                            tracing::warn!(target: "booth_camera_module", %err, "preview frame dropped");
                        }
                    },
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            tracing::debug!(target: "booth_camera_module", "preview worker stopped");
        });

        Self {
            stop_tx,
            join: Some(join),
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.join.as_ref().is_some_and(|j| !j.is_finished())
    }

    /// Signals the worker and waits for it to exit.
    pub(crate) fn stop(&mut self) {
        let _ = self.stop_tx.try_send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

impl Drop for PreviewWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
