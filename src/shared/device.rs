// This is free and unencumbered software released into the public domain.

use crate::shared::{CameraBackend, CameraError, Frame, StillFormat, StreamConfig, StreamMode};
use bytes::Bytes;
use std::any::Any;

/// The camera library as seen by the adapter.
///
/// A device holds at most one [`StreamConfig`] at a time. `configure` is only
/// valid while stopped; `switch_mode` handles the running case by stopping,
/// reconfiguring and restarting.
pub trait CameraDevice: Send {
    fn backend(&self) -> CameraBackend;

    fn configure(&mut self, config: &StreamConfig) -> Result<(), CameraError>;

    fn switch_mode(&mut self, config: &StreamConfig) -> Result<(), CameraError> {
        if self.is_started() {
            self.stop()?;
            self.configure(config)?;
            self.start()
        } else {
            self.configure(config)
        }
    }

    fn start(&mut self) -> Result<(), CameraError>;

    fn stop(&mut self) -> Result<(), CameraError>;

    fn is_started(&self) -> bool;

    fn current_mode(&self) -> Option<StreamMode>;

    /// Pulls one frame from the running preview stream.
    fn capture_frame(&mut self) -> Result<Frame, CameraError>;

    /// Acquires one encoded still. The device must be running in still mode.
    fn capture_still(&mut self, format: StillFormat) -> Result<Bytes, CameraError>;

    /// Releases the device for good. Later calls fail with [`CameraError::Closed`].
    fn close(&mut self) -> Result<(), CameraError>;

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl std::fmt::Debug for dyn CameraDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraDevice")
            .field("backend", &self.backend())
            .field("started", &self.is_started())
            .field("mode", &self.current_mode())
            .finish()
    }
}
