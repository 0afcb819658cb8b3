// This is free and unencumbered software released into the public domain.

use booth_camera_module::{
    cli,
    shared::{
        CameraAdapter, CameraBackend, CameraConfig, CameraError, DEFAULT_OVERLAY_ALPHA,
        MemoryDisplay, PhotoboothCamera, PreviewMode, Rotation, Size, camera_proxy,
    },
};
use clap::Parser;
use clientele::{
    StandardOptions,
    SysexitsError::{self, *},
};
use std::{
    error::Error as StdError,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};

/// Runs one photobooth shot: preview, countdown, capture.
#[derive(Debug, Parser)]
struct Options {
    #[clap(flatten)]
    flags: StandardOptions,

    /// JSON camera configuration; command-line options override it
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(long, value_enum)]
    backend: Option<BackendArg>,

    #[arg(long)]
    device: Option<String>,

    #[arg(short, long = "size", value_parser = parse_dimensions)]
    size: Option<Size>,

    #[arg(long, value_parser = parse_rotation)]
    rotation: Option<Rotation>,

    /// Render the preview on a background thread
    #[arg(long)]
    threaded: bool,

    /// Mirror the preview
    #[arg(long)]
    flip: bool,

    /// Countdown length in seconds
    #[arg(long, default_value_t = 3, allow_negative_numbers = true)]
    countdown: i64,

    /// Plain wait instead of a numeric countdown
    #[arg(long)]
    wait: bool,

    #[arg(long)]
    effect: Option<String>,

    #[arg(long = "window", value_parser = parse_dimensions, default_value = "800x480")]
    window: Size,

    /// Directory receiving the captured picture
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Also save the last preview frame as PNG
    #[arg(long, value_name = "FILE")]
    snapshot: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum BackendArg {
    TestPattern,
    Ffmpeg,
}

impl From<BackendArg> for CameraBackend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::TestPattern => CameraBackend::TestPattern,
            BackendArg::Ffmpeg => CameraBackend::Ffmpeg,
        }
    }
}

pub fn main() -> Result<SysexitsError, Box<dyn StdError>> {
    let options = Options::parse();

    if options.flags.version {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        return Ok(EX_OK);
    }

    if options.flags.license {
        println!("{}", env!("CARGO_PKG_LICENSE"));
        return Ok(EX_OK);
    }

    if let Err(err) = cli::init_tracing_subscriber(&options.flags) {
        eprintln!("WARN: {err}");
    }

    let exit_code = match run_demo(&options) {
        Ok(()) => EX_OK,
        Err(err) => cli::handle_error(&err, &options.flags),
    };

    Ok(exit_code)
}

fn load_config(opts: &Options) -> Result<CameraConfig, CameraError> {
    let mut config = match opts.config.as_ref() {
        Some(path) => CameraConfig::from_json_file(path)?,
        None => CameraConfig::default(),
    };
    if let Some(backend) = opts.backend {
        config = config.with_backend(backend.into());
    }
    if let Some(device) = opts.device.as_ref() {
        config = config.with_device(device.clone());
    }
    if let Some(size) = opts.size {
        config.resolution = size;
    }
    if let Some(rotation) = opts.rotation {
        config = config.with_rotation(rotation);
    }
    if opts.threaded {
        config = config.with_preview_mode(PreviewMode::Threaded);
    }
    Ok(config.with_diagnostics(opts.flags.debug || opts.flags.verbose >= 3))
}

fn run_demo(opts: &Options) -> Result<(), CameraError> {
    let config = load_config(opts)?;
    cli::info_user(
        &opts.flags,
        &format!("starting {} camera at {}", config.backend, config.resolution),
    );

    let quit = Arc::new(AtomicBool::new(false));
    {
        let quit2 = Arc::clone(&quit);
        ctrlc::set_handler(move || {
            quit2.store(true, Ordering::SeqCst);
        })
        .map_err(|e| CameraError::other(format!("{e}")))?;
    }

    config.validate()?;
    let format = config.capture_format;
    let display = MemoryDisplay::new(opts.window);
    let device = camera_proxy(&config).ok_or(CameraError::NoCamera)?;
    let mut camera = CameraAdapter::new(device, config).with_interrupt(Arc::clone(&quit));

    let shot = take_shot(&mut camera, &display, opts, &quit);
    let quit_result = camera.quit();
    shot?;
    quit_result?;

    if let Some(path) = opts.snapshot.as_ref() {
        display.save_snapshot(path)?;
        cli::info_user(&opts.flags, &format!("preview saved to {}", path.display()));
    }

    std::fs::create_dir_all(&opts.output)?;
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    for (i, picture) in camera.take_captures().into_iter().enumerate() {
        let path = opts
            .output
            .join(format!("booth-{stamp}-{i}.{}", format.extension()));
        std::fs::write(&path, &picture)?;
        println!("{}", path.display());
    }
    if display.presented() == 0 {
        cli::warn_user(&opts.flags, "no preview frame was presented");
    }

    Ok(())
}

fn take_shot(
    camera: &mut dyn PhotoboothCamera,
    display: &MemoryDisplay,
    opts: &Options,
    quit: &AtomicBool,
) -> Result<(), CameraError> {
    camera.initialize()?;
    camera.preview(Box::new(display.clone()), opts.flip)?;
    if opts.wait {
        camera.preview_wait(opts.countdown, DEFAULT_OVERLAY_ALPHA)?;
    } else {
        camera.preview_countdown(opts.countdown, DEFAULT_OVERLAY_ALPHA)?;
    }
    if quit.load(Ordering::SeqCst) {
        return Err(CameraError::Interrupted);
    }
    camera.capture(opts.effect.as_deref())
}

fn parse_dimensions(s: &str) -> Result<Size, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {s:?}"))?;
    let width = w.trim().parse::<u32>().map_err(|e| format!("width: {e}"))?;
    let height = h.trim().parse::<u32>().map_err(|e| format!("height: {e}"))?;
    if width == 0 || height == 0 {
        return Err("dimensions must be non-zero".into());
    }
    Ok(Size::new(width, height))
}

fn parse_rotation(s: &str) -> Result<Rotation, String> {
    let degrees = s.trim().parse::<u16>().map_err(|e| e.to_string())?;
    Rotation::try_from(degrees).map_err(|e| e.to_string())
}
