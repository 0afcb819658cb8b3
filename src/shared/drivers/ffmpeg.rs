// This is free and unencumbered software released into the public domain.

use crate::shared::{
    CameraBackend, CameraConfig, CameraDevice, CameraError, Frame, StillFormat, StreamConfig,
    StreamMode, Transform,
};
use bytes::Bytes;
use std::{
    any::Any,
    env,
    io::Read,
    process::{Child, Command, Stdio},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::{Receiver, RecvTimeoutError, SyncSender, TrySendError, sync_channel},
    },
    thread::JoinHandle,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

const FRAME_TIMEOUT: Duration = Duration::from_secs(3);
const INPUT_FRAMERATE: u32 = 30;

/// Capture device driving an external `ffmpeg` process.
///
/// Preview mode keeps one `ffmpeg` child streaming raw rgb24 frames; a reader
/// thread hands the newest one over a single-slot channel. Still mode runs a
/// one-shot `ffmpeg` per capture and returns its encoded stdout.
pub struct FfmpegCameraDevice {
    device: String,
    diagnostics: bool,
    config: Option<StreamConfig>,
    started: bool,
    closed: bool,
    child: Option<Child>,
    stop: Arc<AtomicBool>,
    reader_join: Option<JoinHandle<()>>,
    frame_rx: Option<Receiver<Frame>>,
}

impl core::fmt::Debug for FfmpegCameraDevice {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FfmpegCameraDevice")
            .field("device", &self.device)
            .field("config", &self.config)
            .field("started", &self.started)
            .field("child", &self.child.as_ref().map(|_| "<child>"))
            .finish()
    }
}

impl FfmpegCameraDevice {
    /// Checks that `ffmpeg` can be spawned at all before handing out a device.
    pub fn open(config: &CameraConfig) -> Result<Self, CameraError> {
        let status = Command::new("ffmpeg")
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| CameraError::driver("probing ffmpeg", e))?;
        if !status.success() {
            return Err(CameraError::unsupported("ffmpeg -version failed"));
        }

        Ok(Self {
            device: config.device.as_deref().unwrap_or("").trim().to_string(),
            diagnostics: config.diagnostics,
            config: None,
            started: false,
            closed: false,
            child: None,
            stop: Arc::new(AtomicBool::new(false)),
            reader_join: None,
            frame_rx: None,
        })
    }

    #[inline]
    fn now_ns_best_effort() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0)
    }

    fn ensure_open(&self) -> Result<(), CameraError> {
        if self.closed {
            Err(CameraError::Closed)
        } else {
            Ok(())
        }
    }

    fn start_stream(&mut self, config: StreamConfig) -> Result<(), CameraError> {
        self.stop.store(false, Ordering::Relaxed);

        let mut child = spawn_ffmpeg(&self.device, &config, &rawvideo_output(), self.diagnostics)?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CameraError::other("ffmpeg stdout not piped"))?;

        let size = config.size();
        let (width, height) = (size.width, size.height);
        let stride = width as usize * 3;
        let frame_size = stride * height as usize;

        let (frame_tx, frame_rx) = sync_channel::<Frame>(1);
        let stop = Arc::clone(&self.stop);

        let join = std::thread::spawn(move || {
            let mut reader = std::io::BufReader::new(stdout);

            while !stop.load(Ordering::Relaxed) {
                let mut buf = vec![0u8; frame_size];
                match reader.read_exact(&mut buf) {
                    Ok(()) => {
                        let frame = Frame::new_rgb8(buf, width, height, stride)
                            .with_timestamp_ns(FfmpegCameraDevice::now_ns_best_effort());
                        if !offer_frame(&frame_tx, frame) {
                            break;
                        }
                    },
                    Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                    Err(e) => {
                        tracing::warn!(target: "booth_camera_module", error = %e, "ffmpeg read failed");
                        break;
                    },
                }
            }
        });

        self.reader_join = Some(join);
        self.frame_rx = Some(frame_rx);
        self.child = Some(child);
        Ok(())
    }

    fn stop_child(&mut self) {
        if let Some(mut child) = self.child.take() {
            #[cfg(unix)]
            {
                unsafe {
                    let _ = libc::kill(child.id() as i32, libc::SIGTERM);
                }
                let start = std::time::Instant::now();
                while start.elapsed() < Duration::from_millis(900) {
                    if let Ok(Some(_)) = child.try_wait() {
                        break;
                    }
                    std::thread::sleep(Duration::from_millis(20));
                }
            }
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Hands a frame to the consumer; a full slot drops the new frame.
/// Returns false once the consumer is gone.
fn offer_frame(frame_tx: &SyncSender<Frame>, frame: Frame) -> bool {
    match frame_tx.try_send(frame) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            tracing::trace!(target: "booth_camera_module", "preview frame dropped");
            true
        },
        Err(TrySendError::Disconnected(_)) => false,
    }
}

impl CameraDevice for FfmpegCameraDevice {
    fn backend(&self) -> CameraBackend {
        CameraBackend::Ffmpeg
    }

    fn configure(&mut self, config: &StreamConfig) -> Result<(), CameraError> {
        self.ensure_open()?;
        if self.started {
            return Err(CameraError::invalid_state("cannot configure a running device"));
        }
        self.config = Some(*config);
        Ok(())
    }

    fn start(&mut self) -> Result<(), CameraError> {
        self.ensure_open()?;
        if self.started {
            return Ok(());
        }
        let config = self
            .config
            .ok_or_else(|| CameraError::invalid_state("device is not configured"))?;
        if config.mode() == StreamMode::Preview {
            self.start_stream(config)?;
        }
        self.started = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CameraError> {
        self.stop.store(true, Ordering::Relaxed);
        // The reader exits on its next frame once the receiver is gone.
        self.frame_rx = None;
        self.stop_child();
        if let Some(j) = self.reader_join.take() {
            let _ = j.join();
        }
        self.started = false;
        Ok(())
    }

    fn is_started(&self) -> bool {
        self.started
    }

    fn current_mode(&self) -> Option<StreamMode> {
        self.config.map(|c| c.mode())
    }

    fn capture_frame(&mut self) -> Result<Frame, CameraError> {
        self.ensure_open()?;
        let rx = self
            .frame_rx
            .as_ref()
            .ok_or_else(|| CameraError::invalid_state("preview stream is not running"))?;
        match rx.recv_timeout(FRAME_TIMEOUT) {
            Ok(frame) => Ok(frame),
            Err(RecvTimeoutError::Timeout) => Err(CameraError::Timeout("a preview frame")),
            Err(RecvTimeoutError::Disconnected) => {
                Err(CameraError::other("ffmpeg preview stream ended"))
            },
        }
    }

    fn capture_still(&mut self, format: StillFormat) -> Result<Bytes, CameraError> {
        self.ensure_open()?;
        let config = match self.config {
            Some(config) if self.started && config.mode() == StreamMode::Still => config,
            _ => return Err(CameraError::invalid_state("device is not running in still mode")),
        };

        let mut child = spawn_ffmpeg(&self.device, &config, &still_output(format), self.diagnostics)?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| CameraError::other("ffmpeg stdout not piped"))?;
        let mut buf = Vec::new();
        stdout
            .read_to_end(&mut buf)
            .map_err(|e| CameraError::driver("reading ffmpeg still", e))?;
        let status = child
            .wait()
            .map_err(|e| CameraError::driver("waiting for ffmpeg", e))?;
        if !status.success() || buf.is_empty() {
            return Err(CameraError::other(format!("ffmpeg still capture failed ({status})")));
        }
        Ok(Bytes::from(buf))
    }

    fn close(&mut self) -> Result<(), CameraError> {
        self.stop()?;
        self.closed = true;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Drop for FfmpegCameraDevice {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn rawvideo_output() -> Vec<String> {
    vec![
        "-pix_fmt".into(),
        "rgb24".into(),
        "-f".into(),
        "rawvideo".into(),
        "pipe:1".into(),
    ]
}

fn still_output(format: StillFormat) -> Vec<String> {
    let codec = match format {
        StillFormat::Jpeg => "mjpeg",
        StillFormat::Png => "png",
    };
    vec![
        "-frames:v".into(),
        "1".into(),
        "-f".into(),
        "image2pipe".into(),
        "-vcodec".into(),
        codec.into(),
        "pipe:1".into(),
    ]
}

fn video_filter(config: &StreamConfig) -> String {
    let size = config.size();
    let mut filters = vec![format!("scale={}:{}", size.width, size.height)];
    let Transform { hflip, vflip } = config.transform();
    if hflip {
        filters.push("hflip".into());
    }
    if vflip {
        filters.push("vflip".into());
    }
    filters.join(",")
}

fn spawn_ffmpeg(
    device: &str,
    config: &StreamConfig,
    output: &[String],
    diagnostics: bool,
) -> Result<Child, CameraError> {
    let size = config.size();

    let mut ffargs: Vec<String> = vec![
        "-hide_banner".into(),
        "-nostdin".into(),
        "-nostats".into(),
        "-f".into(),
        ffmpeg_format().into(),
        "-loglevel".into(),
        "error".into(),
        "-video_size".into(),
        size.to_string(),
        "-framerate".into(),
        INPUT_FRAMERATE.to_string(),
        "-i".into(),
        get_input_device(device),
    ];
    ffargs.push("-vf".into());
    ffargs.push(video_filter(config));
    ffargs.extend(output.iter().cloned());

    let stderr = if diagnostics || env::var_os("BOOTH_CAMERA_FFMPEG_STDERR").is_some() {
        Stdio::inherit()
    } else {
        Stdio::null()
    };

    tracing::debug!(target: "booth_camera_module", args = ?ffargs, "spawning ffmpeg");

    Command::new("ffmpeg")
        .args(&ffargs)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(stderr)
        .spawn()
        .map_err(|e| CameraError::driver("spawning ffmpeg", e))
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "macos")] {
        fn ffmpeg_format() -> &'static str {
            "avfoundation"
        }

        fn get_input_device(device: &str) -> String {
            match device.strip_prefix("avf:").unwrap_or(device) {
                "" => "0".to_string(),
                d => d.to_string(),
            }
        }
    } else if #[cfg(target_os = "windows")] {
        fn ffmpeg_format() -> &'static str {
            "dshow"
        }

        fn get_input_device(device: &str) -> String {
            device.strip_prefix("dshow:").unwrap_or(device).to_string()
        }
    } else {
        fn ffmpeg_format() -> &'static str {
            "v4l2"
        }

        fn get_input_device(device: &str) -> String {
            let d = device.strip_prefix("file:").unwrap_or(device);
            if d.is_empty() {
                "/dev/video0".to_string()
            } else if d.chars().all(|c| c.is_ascii_digit()) {
                format!("/dev/video{d}")
            } else {
                d.to_string()
            }
        }
    }
}
