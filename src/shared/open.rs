// This is free and unencumbered software released into the public domain.

use super::{
    CameraAdapter, CameraBackend, CameraConfig, CameraDevice, CameraError, PhotoboothCamera,
    drivers::test_pattern::TestPatternDevice,
};

/// Obtains a handle on the camera library selected by `config`, or `None`
/// when it cannot be opened. The reason is logged.
pub fn camera_proxy(config: &CameraConfig) -> Option<Box<dyn CameraDevice>> {
    match open_camera(config) {
        Ok(device) => {
            tracing::info!(target: "booth_camera_module", backend = %config.backend, "using camera backend");
            Some(device)
        },
        Err(err) => {
            tracing::warn!(target: "booth_camera_module", backend = %config.backend, %err, "camera backend unavailable");
            None
        },
    }
}

pub fn open_camera(config: &CameraConfig) -> Result<Box<dyn CameraDevice>, CameraError> {
    match config.backend {
        CameraBackend::TestPattern => Ok(Box::new(TestPatternDevice::new())),
        CameraBackend::Ffmpeg => {
            if cfg!(feature = "ffmpeg") {
                #[cfg(feature = "ffmpeg")]
                return Ok(Box::new(super::drivers::ffmpeg::FfmpegCameraDevice::open(
                    config,
                )?));
            }
            Err(CameraError::unsupported("built without the ffmpeg feature"))
        },
    }
}

/// Startup hook for the host: builds the adapter for `config`.
///
/// Fails with [`CameraError::NoCamera`] when no device could be obtained.
pub fn setup_camera(config: CameraConfig) -> Result<Box<dyn PhotoboothCamera>, CameraError> {
    config.validate()?;
    let device = camera_proxy(&config).ok_or(CameraError::NoCamera)?;
    Ok(Box::new(CameraAdapter::new(device, config)))
}
