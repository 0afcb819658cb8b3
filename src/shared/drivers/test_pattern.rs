// This is free and unencumbered software released into the public domain.

use crate::shared::{
    CameraBackend, CameraDevice, CameraError, Frame, StillFormat, StreamConfig, StreamMode,
    Transform,
};
use bytes::Bytes;
use image::{DynamicImage, RgbImage, imageops};
use std::{
    any::Any,
    io::Cursor,
    sync::{Arc, Mutex, MutexGuard},
};

#[derive(Debug, Default)]
struct State {
    config: Option<StreamConfig>,
    started: bool,
    closed: bool,
    frames: u64,
    stills: u64,
}

/// Synthetic camera producing gradient frames.
///
/// Clones share one device, so a test can keep a handle after giving the
/// device to an adapter.
#[derive(Clone, Debug, Default)]
pub struct TestPatternDevice {
    state: Arc<Mutex<State>>,
}

impl TestPatternDevice {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn config(&self) -> Option<StreamConfig> {
        self.lock().config
    }

    pub fn frames_captured(&self) -> u64 {
        self.lock().frames
    }

    pub fn stills_captured(&self) -> u64 {
        self.lock().stills
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// The gradient used for both preview frames and stills.
    pub fn render(config: &StreamConfig, blue: u8) -> RgbImage {
        let size = config.size();
        let (w, h) = (size.width.max(1), size.height.max(1));
        let mut image = RgbImage::from_fn(size.width, size.height, |x, y| {
            image::Rgb([(x * 255 / w) as u8, (y * 255 / h) as u8, blue])
        });
        apply_transform(&mut image, config.transform());
        image
    }

    fn running_config(state: &State, mode: StreamMode) -> Result<StreamConfig, CameraError> {
        if state.closed {
            return Err(CameraError::Closed);
        }
        if !state.started {
            return Err(CameraError::invalid_state("device is not started"));
        }
        match state.config {
            Some(config) if config.mode() == mode => Ok(config),
            Some(config) => Err(CameraError::invalid_state(format!(
                "device is in {} mode, {mode} required",
                config.mode()
            ))),
            None => Err(CameraError::invalid_state("device is not configured")),
        }
    }
}

fn apply_transform(image: &mut RgbImage, transform: Transform) {
    if transform.hflip {
        imageops::flip_horizontal_in_place(image);
    }
    if transform.vflip {
        imageops::flip_vertical_in_place(image);
    }
}

impl CameraDevice for TestPatternDevice {
    fn backend(&self) -> CameraBackend {
        CameraBackend::TestPattern
    }

    fn configure(&mut self, config: &StreamConfig) -> Result<(), CameraError> {
        let mut state = self.lock();
        if state.closed {
            return Err(CameraError::Closed);
        }
        if state.started {
            return Err(CameraError::invalid_state("cannot configure a running device"));
        }
        state.config = Some(*config);
        Ok(())
    }

    fn start(&mut self) -> Result<(), CameraError> {
        let mut state = self.lock();
        if state.closed {
            return Err(CameraError::Closed);
        }
        if state.config.is_none() {
            return Err(CameraError::invalid_state("device is not configured"));
        }
        state.started = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CameraError> {
        self.lock().started = false;
        Ok(())
    }

    fn is_started(&self) -> bool {
        self.lock().started
    }

    fn current_mode(&self) -> Option<StreamMode> {
        self.lock().config.map(|c| c.mode())
    }

    fn capture_frame(&mut self) -> Result<Frame, CameraError> {
        let mut state = self.lock();
        let config = Self::running_config(&state, StreamMode::Preview)?;
        state.frames += 1;
        let image = Self::render(&config, (state.frames % 256) as u8);
        let (width, height) = image.dimensions();
        Ok(Frame::new_rgb8(image.into_raw(), width, height, width as usize * 3)
            .with_timestamp_ns(state.frames))
    }

    fn capture_still(&mut self, format: StillFormat) -> Result<Bytes, CameraError> {
        let mut state = self.lock();
        let config = Self::running_config(&state, StreamMode::Still)?;
        let image = DynamicImage::ImageRgb8(Self::render(&config, 128));
        let mut buf = Cursor::new(Vec::new());
        image.write_to(&mut buf, format.image_format())?;
        state.stills += 1;
        Ok(Bytes::from(buf.into_inner()))
    }

    fn close(&mut self) -> Result<(), CameraError> {
        let mut state = self.lock();
        state.started = false;
        state.closed = true;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::Size;

    fn preview() -> StreamConfig {
        StreamConfig::preview(Size::new(8, 4), Transform::default())
    }

    #[test]
    fn frames_require_a_running_preview() {
        let mut dev = TestPatternDevice::new();
        assert!(matches!(dev.capture_frame(), Err(CameraError::InvalidState(_))));
        dev.configure(&preview()).unwrap();
        dev.start().unwrap();
        let frame = dev.capture_frame().unwrap();
        assert_eq!((frame.width, frame.height), (8, 4));
        assert_eq!(dev.frames_captured(), 1);
    }

    #[test]
    fn configure_is_refused_while_running() {
        let mut dev = TestPatternDevice::new();
        dev.configure(&preview()).unwrap();
        dev.start().unwrap();
        assert!(dev.configure(&preview()).is_err());

        let still = StreamConfig::still(Size::new(16, 8), Transform::default());
        dev.switch_mode(&still).unwrap();
        assert!(dev.is_started());
        assert_eq!(dev.current_mode(), Some(StreamMode::Still));
    }

    #[test]
    fn still_is_encoded_in_requested_format() {
        let mut dev = TestPatternDevice::new();
        dev.configure(&StreamConfig::still(Size::new(16, 8), Transform::default()))
            .unwrap();
        dev.start().unwrap();
        let jpeg = dev.capture_still(StillFormat::Jpeg).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        let png = dev.capture_still(StillFormat::Png).unwrap();
        assert_eq!(&png[1..4], b"PNG");
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 8));
    }

    #[test]
    fn hflip_mirrors_the_gradient() {
        let plain = TestPatternDevice::render(&preview(), 0);
        let flipped =
            TestPatternDevice::render(&preview().with_transform(Transform::hflip(true)), 0);
        assert_eq!(plain.get_pixel(0, 0), flipped.get_pixel(7, 0));
    }

    #[test]
    fn closed_device_refuses_everything() {
        let mut dev = TestPatternDevice::new();
        dev.close().unwrap();
        assert!(matches!(dev.configure(&preview()), Err(CameraError::Closed)));
        assert!(matches!(dev.start(), Err(CameraError::Closed)));
        assert!(dev.is_closed());
    }
}
