// This is free and unencumbered software released into the public domain.

//! CLI helpers (error reporting, verbosity handling).
//!
//! This module must compile even when the crate feature `cli` is disabled,
//! because the library is built in non-CLI configurations.

#[cfg(feature = "cli")]
use crate::shared::CameraError;

#[cfg(feature = "cli")]
use clientele::SysexitsError::{self, *};

#[cfg(feature = "cli")]
use clientele::StandardOptions;

/// Log filter matching the verbosity flags.
#[cfg(feature = "cli")]
pub fn log_filter(flags: &StandardOptions) -> &'static str {
    match flags.verbose {
        _ if flags.debug => "booth_camera_module=trace,info",
        0 => "warn",
        1 => "booth_camera_module=info,warn",
        2 => "booth_camera_module=debug,info",
        _ => "booth_camera_module=trace,info",
    }
}

/// Installs the global `tracing` subscriber. `RUST_LOG` overrides the flags.
#[cfg(feature = "cli")]
pub fn init_tracing_subscriber(flags: &StandardOptions) -> Result<(), CameraError> {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_filter(flags)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| CameraError::other(format!("failed to initialize logging: {e}")))
}

#[cfg(feature = "cli")]
pub fn handle_error(err: &CameraError, flags: &StandardOptions) -> SysexitsError {
    tracing::error!(target: "booth_camera_module", %err, "camera command failed");
    if flags.debug || flags.verbose >= 2 {
        tracing::debug!(target: "booth_camera_module", ?err, "detailed error");
    }

    report_error(err, flags);
    map_error_to_sysexit(err)
}

#[cfg(feature = "cli")]
pub fn info_user(flags: &StandardOptions, msg: &str) {
    if flags.debug || flags.verbose >= 1 {
        eprintln!("INFO: {msg}");
    }
    tracing::info!(target: "booth_camera_module", "{msg}");
}

#[cfg(feature = "cli")]
pub fn warn_user(flags: &StandardOptions, msg: &str) {
    if flags.debug || flags.verbose >= 1 {
        eprintln!("WARN: {msg}");
    }
    tracing::warn!(target: "booth_camera_module", "{msg}");
}

#[cfg(feature = "cli")]
fn report_error(err: &CameraError, flags: &StandardOptions) {
    use std::error::Error as _;
    use std::io::Write;

    let mut stderr = std::io::stderr();
    let _ = writeln!(stderr, "ERROR: {err}");

    if flags.debug || flags.verbose >= 2 {
        let mut source = err.source();
        while let Some(cause) = source {
            let _ = writeln!(stderr, "  Caused by: {}", cause);
            source = cause.source();
        }
    }
}

#[cfg(feature = "cli")]
pub fn map_error_to_sysexit(err: &CameraError) -> SysexitsError {
    match err {
        CameraError::NoCamera => EX_UNAVAILABLE,
        CameraError::InvalidArgument(_) => EX_USAGE,
        CameraError::InvalidState(_) => EX_SOFTWARE,
        CameraError::Unsupported(_) => EX_UNAVAILABLE,
        CameraError::InvalidConfig(_) => EX_CONFIG,
        CameraError::Closed => EX_UNAVAILABLE,
        CameraError::Interrupted => EX_TEMPFAIL,
        CameraError::Timeout(_) => EX_TEMPFAIL,
        CameraError::DriverError { .. } => EX_SOFTWARE,
        CameraError::Encode(_) => EX_DATAERR,
        CameraError::Io(_) => EX_IOERR,
        CameraError::Other(_) => EX_SOFTWARE,
    }
}
