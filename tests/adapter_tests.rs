// This is free and unencumbered software released into the public domain.

//! Lifecycle tests for the camera adapter against the test-pattern device.

use booth_camera_module::shared::{
    AdapterState, CameraAdapter, CameraConfig, CameraDevice, CameraError, DEFAULT_OVERLAY_ALPHA,
    ManualClock, MemoryDisplay, PhotoboothCamera, PreviewMode, Size, StreamMode,
    drivers::test_pattern::TestPatternDevice,
};
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

struct Rig {
    camera: CameraAdapter,
    device: TestPatternDevice,
    display: MemoryDisplay,
    clock: ManualClock,
}

fn rig(mode: PreviewMode) -> Rig {
    let device = TestPatternDevice::new();
    let clock = ManualClock::new();
    let config = CameraConfig::new(96, 64)
        .with_preview_mode(mode)
        .with_frame_interval(Duration::from_millis(100))
        .with_border(10);
    let camera = CameraAdapter::new(Box::new(device.clone()), config).with_clock(clock.clone());
    Rig {
        camera,
        device,
        display: MemoryDisplay::new(Size::new(200, 150)),
        clock,
    }
}

fn previewing(mode: PreviewMode) -> Rig {
    let mut rig = rig(mode);
    rig.camera.initialize().unwrap();
    rig.camera
        .preview(Box::new(rig.display.clone()), false)
        .unwrap();
    rig
}

#[test]
fn non_positive_timeouts_are_invalid_arguments() {
    let mut rig = previewing(PreviewMode::Inline);
    for timeout in [0, -1, -30, i64::MIN] {
        let err = rig
            .camera
            .preview_countdown(timeout, DEFAULT_OVERLAY_ALPHA)
            .unwrap_err();
        assert!(
            matches!(err, CameraError::InvalidArgument(_)),
            "timeout {timeout} gave {err:?}"
        );
        let err = rig
            .camera
            .preview_wait(timeout, DEFAULT_OVERLAY_ALPHA)
            .unwrap_err();
        assert!(matches!(err, CameraError::InvalidArgument(_)));
    }
    assert_eq!(rig.clock.elapsed(), Duration::ZERO);
}

#[test]
fn countdown_before_preview_is_invalid_state() {
    let mut rig = rig(PreviewMode::Inline);
    rig.camera.initialize().unwrap();
    let err = rig
        .camera
        .preview_countdown(3, DEFAULT_OVERLAY_ALPHA)
        .unwrap_err();
    assert!(matches!(err, CameraError::InvalidState(_)));
    assert!(matches!(
        rig.camera.preview_wait(3, DEFAULT_OVERLAY_ALPHA),
        Err(CameraError::InvalidState(_))
    ));
}

#[test]
fn countdown_after_stop_is_invalid_state() {
    let mut rig = previewing(PreviewMode::Inline);
    rig.camera.stop_preview().unwrap();
    assert_eq!(rig.camera.state(), AdapterState::Stopped);
    assert!(matches!(
        rig.camera.preview_countdown(1, DEFAULT_OVERLAY_ALPHA),
        Err(CameraError::InvalidState(_))
    ));
}

#[test]
fn capture_appends_one_buffer_and_leaves_device_stopped() {
    let mut rig = previewing(PreviewMode::Inline);
    rig.camera
        .preview_countdown(2, DEFAULT_OVERLAY_ALPHA)
        .unwrap();
    rig.camera.capture(None).unwrap();

    assert_eq!(rig.camera.captures().len(), 1);
    assert_eq!(rig.device.stills_captured(), 1);
    assert!(!rig.device.is_started());
    assert_eq!(rig.device.current_mode(), Some(StreamMode::Preview));
    assert_eq!(rig.camera.state(), AdapterState::Stopped);

    let picture = image::load_from_memory(&rig.camera.captures()[0]).unwrap();
    assert_eq!((picture.width(), picture.height()), (96, 64));

    // The next shot starts a fresh preview.
    rig.camera
        .preview(Box::new(rig.display.clone()), false)
        .unwrap();
    rig.camera.capture(None).unwrap();
    assert_eq!(rig.camera.captures().len(), 2);
}

#[test]
fn overlay_is_cleared_after_countdown_and_wait() {
    for mode in [PreviewMode::Inline, PreviewMode::Threaded] {
        let mut rig = previewing(mode);
        rig.camera
            .preview_countdown(2, DEFAULT_OVERLAY_ALPHA)
            .unwrap();
        assert!(!rig.camera.has_overlay(), "{mode} countdown");
        rig.camera.preview_wait(1, DEFAULT_OVERLAY_ALPHA).unwrap();
        assert!(!rig.camera.has_overlay(), "{mode} wait");
        rig.camera.stop_preview().unwrap();
    }
}

#[test]
fn countdown_renders_frames_inline() {
    let mut rig = previewing(PreviewMode::Inline);
    let before = rig.display.presented();
    rig.camera
        .preview_countdown(3, DEFAULT_OVERLAY_ALPHA)
        .unwrap();
    assert_eq!(rig.clock.elapsed(), Duration::from_secs(4));
    // At 100ms per frame, four seconds render at least forty frames.
    assert!(rig.display.presented() - before >= 40);
}

#[test]
fn second_preview_is_a_no_op() {
    let mut rig = previewing(PreviewMode::Inline);
    let frames = rig.device.frames_captured();
    let config = rig.camera.preview_config();

    let other = MemoryDisplay::new(Size::new(50, 50));
    rig.camera.preview(Box::new(other.clone()), true).unwrap();

    assert_eq!(rig.device.frames_captured(), frames);
    assert_eq!(rig.camera.preview_config(), config);
    assert_eq!(other.presented(), 0);
    assert_eq!(rig.camera.state(), AdapterState::Previewing);
}

#[test]
fn unknown_effect_captures_the_same_picture() {
    let mut plain = previewing(PreviewMode::Inline);
    plain.camera.capture(None).unwrap();

    let mut odd = previewing(PreviewMode::Inline);
    odd.camera.capture(Some("Sepia-Deluxe")).unwrap();

    let mut known = previewing(PreviewMode::Inline);
    known.camera.capture(Some("EMBOSS")).unwrap();

    assert_eq!(plain.camera.captures(), odd.camera.captures());
    assert_eq!(plain.camera.captures(), known.camera.captures());
}

#[test]
fn preview_draws_the_camera_image_centered() {
    let rig = previewing(PreviewMode::Inline);
    let rect = rig.camera.get_rect(CameraConfig::MAX_RESOLUTION).unwrap();
    // 96x64 fitted into 180x130 keeps 3:2.
    assert_eq!(rect.size(), Size::new(180, 120));

    let shot = rig.display.snapshot();
    assert_eq!(shot.get_pixel(0, 0), &MemoryDisplay::BACKGROUND);
    assert_ne!(shot.get_pixel(100, 75), &MemoryDisplay::BACKGROUND);
}

#[test]
fn threaded_capture_stops_the_worker_first() {
    let mut rig = previewing(PreviewMode::Threaded);
    assert!(rig.camera.is_worker_running());
    rig.camera
        .preview_countdown(1, DEFAULT_OVERLAY_ALPHA)
        .unwrap();
    rig.camera.capture(Some("none")).unwrap();
    assert!(!rig.camera.is_worker_running());
    assert_eq!(rig.camera.captures().len(), 1);
    assert!(!rig.device.is_started());
}

#[test]
fn quit_releases_the_device() {
    let mut rig = previewing(PreviewMode::Threaded);
    rig.camera.quit().unwrap();
    assert!(rig.device.is_closed());
    assert!(!rig.camera.is_worker_running());
    assert!(matches!(
        rig.camera.capture(None),
        Err(CameraError::InvalidState(_))
    ));
    rig.camera.quit().unwrap();
}

#[test]
fn wait_beyond_the_clock_range_is_invalid_argument() {
    for mode in [PreviewMode::Inline, PreviewMode::Threaded] {
        let mut rig = previewing(mode);
        let err = rig
            .camera
            .preview_wait(i64::MAX, DEFAULT_OVERLAY_ALPHA)
            .unwrap_err();
        assert!(matches!(err, CameraError::InvalidArgument(_)), "{mode}: {err:?}");
        assert_eq!(rig.camera.state(), AdapterState::Previewing);
        assert!(!rig.camera.has_overlay());
        assert_eq!(rig.clock.elapsed(), Duration::ZERO);
        rig.camera.stop_preview().unwrap();
    }
}

#[test]
fn interrupt_aborts_a_running_countdown() {
    for mode in [PreviewMode::Inline, PreviewMode::Threaded] {
        let device = TestPatternDevice::new();
        let clock = ManualClock::new();
        let interrupt = Arc::new(AtomicBool::new(false));
        let config = CameraConfig::new(96, 64)
            .with_preview_mode(mode)
            .with_frame_interval(Duration::from_millis(100));
        let mut camera = CameraAdapter::new(Box::new(device.clone()), config)
            .with_clock(clock.clone())
            .with_interrupt(Arc::clone(&interrupt));
        camera.initialize().unwrap();
        camera
            .preview(Box::new(MemoryDisplay::new(Size::new(200, 150))), false)
            .unwrap();

        interrupt.store(true, Ordering::SeqCst);
        let err = camera
            .preview_countdown(600, DEFAULT_OVERLAY_ALPHA)
            .unwrap_err();
        assert!(matches!(err, CameraError::Interrupted), "{mode}: {err:?}");
        assert!(clock.elapsed() < Duration::from_secs(1));
        assert!(!camera.has_overlay());

        camera.quit().unwrap();
        assert!(device.is_closed());
    }
}

#[test]
fn failed_preview_leaves_no_window_behind() {
    let mut rig = rig(PreviewMode::Inline);
    rig.camera.initialize().unwrap();
    // Smaller than the border, so there is no room for the picture.
    let tiny = MemoryDisplay::new(Size::new(8, 8));
    assert!(rig.camera.preview(Box::new(tiny.clone()), false).is_err());

    assert_eq!(rig.camera.state(), AdapterState::Configured);
    assert!(!rig.device.is_started());
    assert_eq!(tiny.presented(), 0);
    assert!(matches!(
        rig.camera.get_rect(CameraConfig::MAX_RESOLUTION),
        Err(CameraError::InvalidState(_))
    ));

    // A proper window afterwards works.
    rig.camera
        .preview(Box::new(rig.display.clone()), false)
        .unwrap();
    assert_eq!(rig.camera.state(), AdapterState::Previewing);
}
