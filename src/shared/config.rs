// This is free and unencumbered software released into the public domain.

use crate::shared::{CameraError, Rotation, Size, StillFormat};
use serde::Deserialize;
use std::{path::Path, time::Duration};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, derive_more::Display)]
#[serde(rename_all = "kebab-case")]
pub enum CameraBackend {
    #[default]
    #[display("test-pattern")]
    TestPattern,
    #[display("ffmpeg")]
    Ffmpeg,
}

/// How the live preview is kept on screen while the countdown runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, derive_more::Display)]
#[serde(rename_all = "lowercase")]
pub enum PreviewMode {
    /// Frames are rendered by the countdown loop on the caller's thread.
    #[default]
    #[display("inline")]
    Inline,
    /// A background worker renders frames while the caller counts down.
    #[display("threaded")]
    Threaded,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub backend: CameraBackend,
    pub device: Option<String>,
    pub resolution: Size,
    pub preview_rotation: Rotation,
    pub preview_flip: bool,
    pub capture_flip: bool,
    pub preview_mode: PreviewMode,
    pub max_resolution: Size,
    pub border: u32,
    pub frame_interval_ms: u64,
    pub smile_text: String,
    pub overlay_color: [u8; 3],
    pub capture_format: StillFormat,
    pub diagnostics: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            backend: CameraBackend::default(),
            device: None,
            resolution: Size::new(1920, 1080),
            preview_rotation: Rotation::None,
            preview_flip: false,
            capture_flip: false,
            preview_mode: PreviewMode::default(),
            max_resolution: Self::MAX_RESOLUTION,
            border: 50,
            frame_interval_ms: 33,
            smile_text: "Smile!".into(),
            overlay_color: [255, 255, 255],
            capture_format: StillFormat::default(),
            diagnostics: false,
        }
    }
}

impl CameraConfig {
    /// Largest sensor mode of the reference camera module (v3).
    pub const MAX_RESOLUTION: Size = Size::new(4608, 2592);

    pub fn new(width: u32, height: u32) -> Self {
        Self {
            resolution: Size::new(width, height),
            ..Default::default()
        }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CameraError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, CameraError> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| CameraError::invalid_config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CameraError> {
        if self.resolution.is_empty() {
            return Err(CameraError::invalid_config(format!(
                "resolution must be non-zero, got {}",
                self.resolution
            )));
        }
        if self.max_resolution.is_empty() {
            return Err(CameraError::invalid_config("max_resolution must be non-zero"));
        }
        if self.frame_interval_ms == 0 {
            return Err(CameraError::invalid_config("frame_interval_ms must be positive"));
        }
        Ok(())
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }

    pub fn with_backend(mut self, backend: CameraBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.preview_rotation = rotation;
        self
    }

    pub fn with_flip(mut self, preview: bool, capture: bool) -> Self {
        self.preview_flip = preview;
        self.capture_flip = capture;
        self
    }

    pub fn with_preview_mode(mut self, mode: PreviewMode) -> Self {
        self.preview_mode = mode;
        self
    }

    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval_ms = (interval.as_millis() as u64).max(1);
        self
    }

    pub fn with_smile_text(mut self, text: impl Into<String>) -> Self {
        self.smile_text = text.into();
        self
    }

    pub fn with_capture_format(mut self, format: StillFormat) -> Self {
        self.capture_format = format;
        self
    }

    pub fn with_border(mut self, border: u32) -> Self {
        self.border = border;
        self
    }

    pub fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.diagnostics = enabled;
        self
    }
}
