// This is free and unencumbered software released into the public domain.

use crate::shared::{
    CameraConfig, CameraDevice, CameraError, Clock, Display, ImageEffect, PreviewMode,
    PreviewSurface, PreviewWorker, Rect, Rotation, Size, StreamConfig, SystemClock, Transform,
    build_overlay, lock_surface, overlay_size,
};
use bytes::Bytes;
use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

/// Overlay opacity hosts use when they have no preference.
pub const DEFAULT_OVERLAY_ALPHA: u8 = 60;

const ONE_SECOND: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq, derive_more::Display)]
pub enum AdapterState {
    #[display("uninitialized")]
    Uninitialized,
    #[display("configured")]
    Configured,
    #[display("previewing")]
    Previewing,
    #[display("capturing")]
    Capturing,
    #[display("stopped")]
    Stopped,
    #[display("closed")]
    Closed,
}

/// The camera interface a photobooth host drives.
pub trait PhotoboothCamera: Send {
    /// Builds the preview and capture configurations. No device I/O.
    fn initialize(&mut self) -> Result<(), CameraError>;

    /// Starts the live preview in `window`. Does nothing if already running.
    fn preview(&mut self, window: Box<dyn Display>, flip: bool) -> Result<(), CameraError>;

    /// Counts down `timeout` seconds over the preview, then shows the smile
    /// message for one second.
    fn preview_countdown(&mut self, timeout: i64, alpha: u8) -> Result<(), CameraError>;

    /// Keeps the preview up for `timeout` seconds, then shows the smile
    /// message for one second.
    fn preview_wait(&mut self, timeout: i64, alpha: u8) -> Result<(), CameraError>;

    /// Takes one still and appends it to the capture list.
    fn capture(&mut self, effect: Option<&str>) -> Result<(), CameraError>;

    fn stop_preview(&mut self) -> Result<(), CameraError>;

    /// Releases the camera for good.
    fn quit(&mut self) -> Result<(), CameraError>;

    /// Where the preview lands in the window, for frames no larger than
    /// `max_size`.
    fn get_rect(&self, max_size: Size) -> Result<Rect, CameraError>;

    fn captures(&self) -> &[Bytes];

    /// Hands the captured stills over to the caller, oldest first.
    fn take_captures(&mut self) -> Vec<Bytes>;

    fn drop_captures(&mut self);

    fn state(&self) -> AdapterState;

    fn has_overlay(&self) -> bool;
}

/// Preview flip as seen on screen, expressed on the sensor axes.
fn preview_transform(rotation: Rotation, flip: bool) -> Transform {
    if rotation.is_transposing() {
        Transform::new(false, flip)
    } else {
        Transform::hflip(flip)
    }
}

/// Adapts a [`CameraDevice`] to the [`PhotoboothCamera`] lifecycle.
pub struct CameraAdapter {
    config: CameraConfig,
    state: AdapterState,
    preview_config: Option<StreamConfig>,
    capture_config: Option<StreamConfig>,
    preview_flip: bool,
    surface: Arc<Mutex<PreviewSurface>>,
    worker: Option<PreviewWorker>,
    captures: Vec<Bytes>,
    clock: Arc<dyn Clock>,
    interrupt: Option<Arc<AtomicBool>>,
}

impl std::fmt::Debug for CameraAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraAdapter")
            .field("state", &self.state)
            .field("preview_config", &self.preview_config)
            .field("capture_config", &self.capture_config)
            .field("preview_flip", &self.preview_flip)
            .field("surface", &*lock_surface(&self.surface))
            .field("captures", &self.captures.len())
            .finish()
    }
}

impl CameraAdapter {
    pub fn new(device: Box<dyn CameraDevice>, config: CameraConfig) -> Self {
        Self {
            preview_flip: config.preview_flip,
            config,
            state: AdapterState::Uninitialized,
            preview_config: None,
            capture_config: None,
            surface: Arc::new(Mutex::new(PreviewSurface::new(device))),
            worker: None,
            captures: Vec::new(),
            clock: Arc::new(SystemClock),
            interrupt: None,
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Aborts countdowns and waits with [`CameraError::Interrupted`] once
    /// `flag` is set.
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    pub fn preview_config(&self) -> Option<StreamConfig> {
        self.preview_config
    }

    pub fn capture_config(&self) -> Option<StreamConfig> {
        self.capture_config
    }

    pub fn is_worker_running(&self) -> bool {
        self.worker.as_ref().is_some_and(PreviewWorker::is_running)
    }

    /// Renders one preview frame with the current overlay.
    pub fn update_preview(&mut self) -> Result<(), CameraError> {
        lock_surface(&self.surface).update()
    }

    fn ensure_open(&self) -> Result<(), CameraError> {
        match self.state {
            AdapterState::Closed => Err(CameraError::invalid_state("camera has been closed")),
            AdapterState::Uninitialized => {
                Err(CameraError::invalid_state("camera is not initialized"))
            },
            _ => Ok(()),
        }
    }

    fn preview_rect(&self, window: Rect, max_size: Size) -> Rect {
        let area = window.inset(self.config.border);
        let bounds = Size::new(
            area.width.min(max_size.width),
            area.height.min(max_size.height),
        );
        let fitted = self.config.resolution.fit_inside(bounds);
        area.centered(self.config.preview_rotation.apply(fitted))
    }

    fn stop_worker(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            worker.stop();
        }
    }

    /// Sized from the rotated frame as it appears on screen, not from the
    /// pre-rotation rectangle that `get_rect` reports.
    fn show_overlay(&mut self, text: &str, alpha: u8) -> Result<(), CameraError> {
        let mut surface = lock_surface(&self.surface);
        if surface.window.is_none() {
            return Ok(());
        }
        let footprint = surface.rotation.apply(surface.rect.size());
        surface.overlay = Some(build_overlay(
            overlay_size(footprint),
            text,
            alpha,
            self.config.overlay_color,
        ));
        if self.config.preview_mode == PreviewMode::Inline {
            surface.update()?;
        }
        Ok(())
    }

    fn hide_overlay(&mut self) -> Result<(), CameraError> {
        let mut surface = lock_surface(&self.surface);
        if surface.overlay.take().is_some()
            && self.config.preview_mode == PreviewMode::Inline
            && surface.device.is_started()
        {
            surface.update()?;
        }
        Ok(())
    }

    /// Keeps the preview on screen until `deadline`.
    fn hold_until(&mut self, deadline: Instant) -> Result<(), CameraError> {
        let interval = self.config.frame_interval();
        loop {
            let now = self.clock.now();
            if now >= deadline {
                return Ok(());
            }
            if self
                .interrupt
                .as_ref()
                .is_some_and(|flag| flag.load(Ordering::SeqCst))
            {
                return Err(CameraError::Interrupted);
            }
            if self.config.preview_mode == PreviewMode::Inline {
                self.update_preview()?;
            }
            self.clock.sleep((deadline - now).min(interval));
        }
    }

    fn check_timed_preview(&self, timeout: i64) -> Result<u64, CameraError> {
        if timeout < 1 {
            return Err(CameraError::invalid_argument(format!(
                "timeout shall be greater than 0, got {timeout}"
            )));
        }
        if self.state != AdapterState::Previewing {
            return Err(CameraError::invalid_state(format!(
                "preview shall be started first (camera is {})",
                self.state
            )));
        }
        Ok(timeout as u64)
    }

    fn run_countdown(&mut self, seconds: u64, alpha: u8) -> Result<(), CameraError> {
        for remaining in (1..=seconds).rev() {
            tracing::debug!(target: "booth_camera_module", remaining, "countdown");
            self.show_overlay(&remaining.to_string(), alpha)?;
            let deadline = self.clock.now() + ONE_SECOND;
            self.hold_until(deadline)?;
            self.hide_overlay()?;
        }
        self.smile(alpha)
    }

    fn run_wait(&mut self, seconds: u64, alpha: u8) -> Result<(), CameraError> {
        let deadline = self
            .clock
            .now()
            .checked_add(Duration::from_secs(seconds))
            .ok_or_else(|| {
                CameraError::invalid_argument(format!("timeout of {seconds}s is out of range"))
            })?;
        self.hold_until(deadline)?;
        self.smile(alpha)
    }

    fn smile(&mut self, alpha: u8) -> Result<(), CameraError> {
        let text = self.config.smile_text.clone();
        self.show_overlay(&text, alpha)?;
        let deadline = self.clock.now() + ONE_SECOND;
        self.hold_until(deadline)
    }

    fn log_effect(effect: Option<&str>) {
        match effect.unwrap_or("none").parse::<ImageEffect>() {
            Ok(ImageEffect::None) => {},
            Ok(effect) => {
                tracing::info!(target: "booth_camera_module", %effect, "capture effects are not implemented, capturing without")
            },
            Err(err) => tracing::info!(target: "booth_camera_module", %err),
        }
    }

    fn acquire_still(
        &self,
        preview: StreamConfig,
        still: StreamConfig,
    ) -> Result<Bytes, CameraError> {
        let mut surface = lock_surface(&self.surface);
        let mut device = scopeguard::guard(&mut surface.device, |device| {
            // Leave the device stopped and ready for the next preview.
            if let Err(err) = device.stop() {
                tracing::warn!(target: "booth_camera_module", %err, "failed to stop camera after capture");
            }
            if let Err(err) = device.configure(&preview) {
                tracing::warn!(target: "booth_camera_module", %err, "failed to restore preview configuration");
            }
        });

        device.switch_mode(&still)?;
        if !device.is_started() {
            device.start()?;
        }
        device.capture_still(self.config.capture_format)
    }
}

impl PhotoboothCamera for CameraAdapter {
    fn initialize(&mut self) -> Result<(), CameraError> {
        match self.state {
            AdapterState::Closed => {
                return Err(CameraError::invalid_state("camera has been closed"));
            },
            AdapterState::Previewing | AdapterState::Capturing => {
                return Err(CameraError::invalid_state(
                    "stop the preview before initializing",
                ));
            },
            _ => {},
        }

        let resolution = self.config.preview_rotation.apply(self.config.resolution);
        self.preview_config = Some(StreamConfig::preview(
            resolution,
            preview_transform(self.config.preview_rotation, self.preview_flip),
        ));
        self.capture_config = Some(StreamConfig::still(
            resolution,
            Transform::hflip(self.config.capture_flip),
        ));
        if self.state == AdapterState::Uninitialized {
            self.state = AdapterState::Configured;
        }

        tracing::info!(
            target: "booth_camera_module",
            %resolution,
            rotation = %self.config.preview_rotation,
            mode = %self.config.preview_mode,
            "camera initialized"
        );
        Ok(())
    }

    fn preview(&mut self, window: Box<dyn Display>, flip: bool) -> Result<(), CameraError> {
        if self.state == AdapterState::Previewing {
            tracing::debug!(target: "booth_camera_module", "preview already running");
            return Ok(());
        }
        self.ensure_open()?;

        let mut preview_config = self
            .preview_config
            .ok_or_else(|| CameraError::invalid_state("camera is not initialized"))?;
        if self.preview_flip != flip {
            self.preview_flip = flip;
            preview_config =
                preview_config.with_transform(preview_transform(self.config.preview_rotation, flip));
            self.preview_config = Some(preview_config);
        }

        let rect = self.preview_rect(window.rect(), self.config.max_resolution);
        {
            let mut surface = lock_surface(&self.surface);
            surface.window = Some(window);
            surface.rect = rect;
            surface.rotation = self.config.preview_rotation;
            surface.overlay = None;

            let started = surface
                .device
                .switch_mode(&preview_config)
                .and_then(|()| surface.device.start())
                .and_then(|()| surface.update());
            if let Err(err) = started {
                if surface.device.is_started() {
                    if let Err(err) = surface.device.stop() {
                        tracing::warn!(target: "booth_camera_module", %err, "failed to stop camera after preview error");
                    }
                }
                surface.window = None;
                return Err(err);
            }
        }

        if self.config.preview_mode == PreviewMode::Threaded {
            self.worker = Some(PreviewWorker::spawn(
                Arc::clone(&self.surface),
                self.config.frame_interval(),
            ));
        }
        self.state = AdapterState::Previewing;

        tracing::info!(target: "booth_camera_module", %rect, flip, "preview started");
        Ok(())
    }

    fn preview_countdown(&mut self, timeout: i64, alpha: u8) -> Result<(), CameraError> {
        let seconds = self.check_timed_preview(timeout)?;
        let result = self.run_countdown(seconds, alpha);
        let hidden = self.hide_overlay();
        result.and(hidden)
    }

    fn preview_wait(&mut self, timeout: i64, alpha: u8) -> Result<(), CameraError> {
        let seconds = self.check_timed_preview(timeout)?;
        let result = self.run_wait(seconds, alpha);
        let hidden = self.hide_overlay();
        result.and(hidden)
    }

    fn capture(&mut self, effect: Option<&str>) -> Result<(), CameraError> {
        self.ensure_open()?;
        let (Some(preview), Some(still)) = (self.preview_config, self.capture_config) else {
            return Err(CameraError::invalid_state("camera is not initialized"));
        };

        Self::log_effect(effect);

        self.stop_worker();
        lock_surface(&self.surface).overlay = None;
        self.state = AdapterState::Capturing;
        let result = self.acquire_still(preview, still);
        self.state = AdapterState::Stopped;

        let picture = result?;
        tracing::info!(
            target: "booth_camera_module",
            bytes = picture.len(),
            format = %self.config.capture_format,
            "picture captured"
        );
        self.captures.push(picture);
        Ok(())
    }

    fn stop_preview(&mut self) -> Result<(), CameraError> {
        if self.state == AdapterState::Closed {
            return Ok(());
        }
        self.stop_worker();

        let mut surface = lock_surface(&self.surface);
        surface.overlay = None;
        if surface.device.is_started() {
            surface.device.stop()?;
        }
        drop(surface);

        if self.state == AdapterState::Previewing {
            self.state = AdapterState::Stopped;
            tracing::info!(target: "booth_camera_module", "stopped preview");
        }
        Ok(())
    }

    fn quit(&mut self) -> Result<(), CameraError> {
        if self.state == AdapterState::Closed {
            return Ok(());
        }
        self.stop_worker();

        let mut surface = lock_surface(&self.surface);
        surface.overlay = None;
        surface.window = None;
        let closed = surface.device.close();
        drop(surface);

        self.state = AdapterState::Closed;
        tracing::info!(target: "booth_camera_module", "camera closed");
        closed
    }

    fn get_rect(&self, max_size: Size) -> Result<Rect, CameraError> {
        let surface = lock_surface(&self.surface);
        let window = surface
            .window
            .as_ref()
            .ok_or_else(|| CameraError::invalid_state("no preview window"))?;
        Ok(self.preview_rect(window.rect(), max_size))
    }

    fn captures(&self) -> &[Bytes] {
        &self.captures
    }

    fn take_captures(&mut self) -> Vec<Bytes> {
        std::mem::take(&mut self.captures)
    }

    fn drop_captures(&mut self) {
        self.captures.clear();
    }

    fn state(&self) -> AdapterState {
        self.state
    }

    fn has_overlay(&self) -> bool {
        lock_surface(&self.surface).overlay.is_some()
    }
}

impl Drop for CameraAdapter {
    fn drop(&mut self) {
        self.stop_worker();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::{
        ManualClock, MemoryDisplay, StreamMode, drivers::test_pattern::TestPatternDevice,
    };

    fn adapter(config: CameraConfig) -> (CameraAdapter, TestPatternDevice, ManualClock) {
        let device = TestPatternDevice::new();
        let clock = ManualClock::new();
        let adapter = CameraAdapter::new(Box::new(device.clone()), config.with_border(0))
            .with_clock(clock.clone());
        (adapter, device, clock)
    }

    fn window() -> Box<dyn Display> {
        Box::new(MemoryDisplay::new(Size::new(160, 120)))
    }

    #[test]
    fn initialize_swaps_resolution_for_quarter_turns() {
        let (mut cam, _, _) = adapter(CameraConfig::new(64, 48).with_rotation(Rotation::Cw90));
        cam.initialize().unwrap();
        assert_eq!(cam.state(), AdapterState::Configured);
        assert_eq!(cam.preview_config().unwrap().size(), Size::new(48, 64));
        assert_eq!(cam.capture_config().unwrap().mode(), StreamMode::Still);
    }

    #[test]
    fn flip_change_replaces_preview_config() {
        let (mut cam, device, _) = adapter(CameraConfig::new(64, 48));
        cam.initialize().unwrap();
        let before = cam.preview_config().unwrap();
        cam.preview(window(), true).unwrap();
        let after = cam.preview_config().unwrap();
        assert!(!before.transform().hflip);
        assert!(after.transform().hflip);
        assert_eq!(device.config(), Some(after));
    }

    #[test]
    fn rotated_flip_uses_the_vertical_sensor_axis() {
        let (mut cam, _, _) = adapter(CameraConfig::new(64, 48).with_rotation(Rotation::Cw270));
        cam.initialize().unwrap();
        cam.preview(window(), true).unwrap();
        assert_eq!(cam.preview_config().unwrap().transform(), Transform::new(false, true));
    }

    #[test]
    fn overlay_covers_the_rotated_picture_not_the_swapped_rect() {
        let (mut cam, _, _) = adapter(CameraConfig::new(64, 48).with_rotation(Rotation::Cw90));
        cam.initialize().unwrap();
        cam.preview(window(), false).unwrap();
        assert_eq!(cam.get_rect(Size::new(1000, 1000)).unwrap().size(), Size::new(120, 160));

        cam.show_overlay("3", DEFAULT_OVERLAY_ALPHA).unwrap();
        let overlay = lock_surface(&cam.surface)
            .overlay
            .as_ref()
            .map(|image| image.dimensions());
        assert_eq!(overlay, Some((160, 128)));
    }

    #[test]
    fn get_rect_fits_resolution_inside_window() {
        let (mut cam, _, _) = adapter(CameraConfig::new(64, 48));
        cam.initialize().unwrap();
        assert!(cam.get_rect(Size::new(100, 100)).is_err());
        cam.preview(window(), false).unwrap();
        assert_eq!(cam.get_rect(Size::new(1000, 1000)).unwrap(), Rect::new(0, 0, 160, 120));
        assert_eq!(cam.get_rect(Size::new(80, 80)).unwrap(), Rect::new(40, 30, 80, 60));
    }

    #[test]
    fn get_rect_is_transposed_for_quarter_turns() {
        let (mut cam, _, _) = adapter(CameraConfig::new(64, 48).with_rotation(Rotation::Cw90));
        cam.initialize().unwrap();
        cam.preview(window(), false).unwrap();
        let rect = cam.get_rect(Size::new(80, 80)).unwrap();
        assert_eq!(rect.size(), Size::new(60, 80));
    }

    #[test]
    fn countdown_takes_timeout_plus_smile_second() {
        let (mut cam, _, clock) = adapter(CameraConfig::new(64, 48));
        cam.initialize().unwrap();
        cam.preview(window(), false).unwrap();
        cam.preview_countdown(3, DEFAULT_OVERLAY_ALPHA).unwrap();
        assert_eq!(clock.elapsed(), Duration::from_secs(4));
        assert!(!cam.has_overlay());
    }

    #[test]
    fn wait_takes_timeout_plus_smile_second() {
        let (mut cam, device, clock) = adapter(CameraConfig::new(64, 48));
        cam.initialize().unwrap();
        cam.preview(window(), false).unwrap();
        let frames = device.frames_captured();
        cam.preview_wait(2, DEFAULT_OVERLAY_ALPHA).unwrap();
        assert_eq!(clock.elapsed(), Duration::from_secs(3));
        assert!(device.frames_captured() > frames);
        assert!(!cam.has_overlay());
    }

    #[test]
    fn failed_frame_during_countdown_still_clears_overlay() {
        let (mut cam, device, _) = adapter(CameraConfig::new(64, 48));
        cam.initialize().unwrap();
        cam.preview(window(), false).unwrap();
        // Pull the device out from under the adapter.
        device.clone().stop().unwrap();
        assert!(cam.preview_countdown(1, DEFAULT_OVERLAY_ALPHA).is_err());
        assert!(!cam.has_overlay());
    }

    #[test]
    fn capture_before_initialize_is_refused() {
        let (mut cam, device, _) = adapter(CameraConfig::new(64, 48));
        assert!(matches!(cam.capture(None), Err(CameraError::InvalidState(_))));
        assert_eq!(device.stills_captured(), 0);
    }

    #[test]
    fn capture_without_preview_still_works() {
        let (mut cam, device, _) = adapter(CameraConfig::new(64, 48));
        cam.initialize().unwrap();
        cam.capture(None).unwrap();
        assert_eq!(cam.captures().len(), 1);
        assert!(!device.is_started());
        assert_eq!(device.current_mode(), Some(StreamMode::Preview));
    }

    #[test]
    fn take_captures_transfers_ownership() {
        let (mut cam, _, _) = adapter(CameraConfig::new(64, 48));
        cam.initialize().unwrap();
        cam.capture(None).unwrap();
        cam.capture(Some("none")).unwrap();
        let taken = cam.take_captures();
        assert_eq!(taken.len(), 2);
        assert!(cam.captures().is_empty());

        cam.capture(None).unwrap();
        cam.drop_captures();
        assert!(cam.captures().is_empty());
    }

    #[test]
    fn quit_closes_device_and_is_idempotent() {
        let (mut cam, device, _) = adapter(CameraConfig::new(64, 48));
        cam.initialize().unwrap();
        cam.preview(window(), false).unwrap();
        cam.quit().unwrap();
        cam.quit().unwrap();
        cam.stop_preview().unwrap();
        assert!(device.is_closed());
        assert_eq!(cam.state(), AdapterState::Closed);
        assert!(matches!(cam.preview(window(), false), Err(CameraError::InvalidState(_))));
        assert!(matches!(cam.initialize(), Err(CameraError::InvalidState(_))));
    }

    #[test]
    fn threaded_preview_runs_and_stops_worker() {
        let config = CameraConfig::new(64, 48)
            .with_preview_mode(PreviewMode::Threaded)
            .with_frame_interval(Duration::from_millis(1));
        let (mut cam, device, _) = adapter(config);
        cam.initialize().unwrap();
        cam.preview(window(), false).unwrap();
        assert!(cam.is_worker_running());

        let start = Instant::now();
        while device.frames_captured() < 3 && start.elapsed() < Duration::from_secs(5) {
            std::thread::sleep(Duration::from_millis(2));
        }
        assert!(device.frames_captured() >= 3);

        cam.preview_countdown(1, DEFAULT_OVERLAY_ALPHA).unwrap();
        assert!(!cam.has_overlay());

        cam.stop_preview().unwrap();
        assert!(!cam.is_worker_running());
        let frames = device.frames_captured();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(device.frames_captured(), frames);
    }
}
