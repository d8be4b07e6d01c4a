//! Video decode collaborator: ffmpeg child process → latest RGBA frame.
//!
//! The decoder runs on its own worker thread and only ever publishes the most recent frame plus
//! a "frame available" notification. Uploading the frame into a GPU texture is the render
//! thread's job.

use serde::{Deserialize, Serialize};
use std::{
    ffi::OsStr,
    io::{self, Read},
    path::{Path, PathBuf},
    process::{Child, Command, Stdio},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
    thread,
    time::Duration,
};

pub mod signal;

pub use signal::{frame_signal, FrameSignal, FrameWaiter};

/// Column-major 4x4 identity.
pub const IDENTITY_TRANSFORM: [f32; 16] = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>, // RGBA, row-major, tightly packed
    /// 1-based publication sequence number.
    pub seq: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoConfig {
    /// Output width (pixels).
    #[serde(default = "default_width")]
    pub width: u32,

    /// Output height (pixels).
    #[serde(default = "default_height")]
    pub height: u32,

    /// Nominal fps, used to derive playback position from the decoded frame count.
    #[serde(default = "default_fps")]
    pub fps: u32,

    /// Input file path.
    pub file: String,

    /// Whether to loop the video.
    #[serde(default = "default_loop", rename = "loop")]
    pub r#loop: bool,

    /// Optional explicit ffmpeg binary path.
    #[serde(default)]
    pub ffmpeg_path: Option<String>,

    /// Sample-space transform reported for this source (column-major 4x4).
    ///
    /// Forwarded verbatim to the shader; it is not required to be square or orthonormal.
    #[serde(default = "default_transform")]
    pub sample_transform: [f32; 16],
}

fn default_width() -> u32 {
    640
}
fn default_height() -> u32 {
    360
}
fn default_fps() -> u32 {
    30
}
fn default_loop() -> bool {
    true
}
fn default_transform() -> [f32; 16] {
    IDENTITY_TRANSFORM
}

impl VideoConfig {
    pub fn validate(&self) -> Result<(), VideoError> {
        if self.file.trim().is_empty() {
            return Err(VideoError::InvalidConfig("file is empty".into()));
        }
        if self.width == 0 || self.height == 0 {
            return Err(VideoError::InvalidConfig("width/height must be > 0".into()));
        }
        if self.fps == 0 {
            return Err(VideoError::InvalidConfig("fps must be > 0".into()));
        }
        if self.sample_transform.iter().any(|v| !v.is_finite()) {
            return Err(VideoError::InvalidConfig(
                "sample_transform must be finite".into(),
            ));
        }
        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum VideoError {
    #[error(
        "ffmpeg not found (set VIDCOMP_FFMPEG, config.ffmpeg_path, or ensure bundled ffmpeg exists)"
    )]
    FfmpegNotFound,

    #[error("failed to spawn ffmpeg: {0}")]
    Spawn(#[from] io::Error),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

/// Anything that can hand the compositor decoded frames.
///
/// `VideoDecoder` is the production implementation; tests and embedders can provide their own.
pub trait FrameProducer {
    /// The latest frame, if one was published since the last call.
    fn take_frame(&mut self) -> Option<VideoFrame>;

    /// Playback position in seconds.
    fn position_secs(&self) -> f32;

    /// Sample-space transform for the current frame (column-major 4x4).
    fn sample_transform(&self) -> [f32; 16];

    /// Nominal frame size before the first frame arrives.
    fn frame_size(&self) -> (u32, u32);
}

#[derive(Debug, Default)]
struct Latest {
    frame: Option<VideoFrame>,
    published: u64,
}

pub struct VideoDecoder {
    cfg: VideoConfig,
    latest: Arc<Mutex<Latest>>,
    last_taken: u64,
    signal: FrameSignal,
    stop: Arc<AtomicBool>,
    child: ChildSlot,
    worker: Option<thread::JoinHandle<()>>,
}

/// The running ffmpeg process, shared so `Drop` can kill it while the worker blocks on its pipe.
type ChildSlot = Arc<Mutex<Option<Child>>>;

impl std::fmt::Debug for VideoDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The worker owns an OS process; report only what is useful in logs.
        f.debug_struct("VideoDecoder")
            .field("file", &self.cfg.file)
            .field("last_taken", &self.last_taken)
            .field("running", &self.worker.is_some())
            .finish()
    }
}

impl VideoDecoder {
    /// Start decoding. `signal` is notified after every published frame.
    pub fn from_config(cfg: VideoConfig, signal: FrameSignal) -> Result<Self, VideoError> {
        cfg.validate()?;

        let latest = Arc::new(Mutex::new(Latest::default()));
        let stop = Arc::new(AtomicBool::new(false));
        let child: ChildSlot = Arc::new(Mutex::new(None));

        let cfg_for_thread = cfg.clone();
        let latest_for_thread = Arc::clone(&latest);
        let stop_for_thread = Arc::clone(&stop);
        let child_for_thread = Arc::clone(&child);
        let signal_for_thread = signal.clone();

        let worker = thread::Builder::new()
            .name(format!("vidcomp-decode:{}", cfg.file))
            .spawn(move || {
                decode_loop(
                    cfg_for_thread,
                    latest_for_thread,
                    stop_for_thread,
                    child_for_thread,
                    signal_for_thread,
                );
            })?;

        tracing::info!(file = %cfg.file, w = cfg.width, h = cfg.height, fps = cfg.fps, "video decoder started");

        Ok(Self {
            cfg,
            latest,
            last_taken: 0,
            signal,
            stop,
            child,
            worker: Some(worker),
        })
    }

    pub fn from_json_path(path: impl AsRef<Path>, signal: FrameSignal) -> Result<Self, VideoError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| VideoError::InvalidConfig(format!("read json: {e}")))?;
        let cfg: VideoConfig = serde_json::from_str(&text)
            .map_err(|e| VideoError::InvalidConfig(format!("parse json: {e}")))?;
        Self::from_config(cfg, signal)
    }

    pub fn config(&self) -> &VideoConfig {
        &self.cfg
    }

    /// A waiter connected to this decoder's frame signal.
    pub fn frame_waiter(&self) -> FrameWaiter {
        self.signal.waiter()
    }

    fn published(&self) -> u64 {
        lock_latest(&self.latest).published
    }
}

impl FrameProducer for VideoDecoder {
    fn take_frame(&mut self) -> Option<VideoFrame> {
        let guard = lock_latest(&self.latest);
        let frame = guard.frame.as_ref()?;
        if frame.seq <= self.last_taken {
            return None;
        }
        self.last_taken = frame.seq;
        Some(frame.clone())
    }

    fn position_secs(&self) -> f32 {
        self.published() as f32 / self.cfg.fps.max(1) as f32
    }

    fn sample_transform(&self) -> [f32; 16] {
        self.cfg.sample_transform
    }

    fn frame_size(&self) -> (u32, u32) {
        (self.cfg.width, self.cfg.height)
    }
}

impl Drop for VideoDecoder {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        // Unblocks a worker waiting on a stalled pipe: the read sees EOF once ffmpeg is gone.
        kill_child(&self.child);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
        tracing::debug!(file = %self.cfg.file, "video decoder stopped");
    }
}

fn lock_latest(latest: &Mutex<Latest>) -> MutexGuard<'_, Latest> {
    latest.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn kill_child(slot: &Mutex<Option<Child>>) {
    let taken = slot
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .take();
    if let Some(mut child) = taken {
        let _ = child.kill();
        let _ = child.wait();
    }
}

// ---------------- internal ----------------

fn decode_loop(
    cfg: VideoConfig,
    latest: Arc<Mutex<Latest>>,
    stop: Arc<AtomicBool>,
    child_slot: ChildSlot,
    signal: FrameSignal,
) {
    let frame_len = (cfg.width as usize) * (cfg.height as usize) * 4;
    let mut buf = vec![0u8; frame_len];

    // Log a spawn failure once per failure streak, not once per retry.
    let mut logged_spawn_error = false;

    while !stop.load(Ordering::SeqCst) {
        let ffmpeg = resolve_ffmpeg_path(cfg.ffmpeg_path.as_deref())
            .unwrap_or_else(|| PathBuf::from("ffmpeg"));

        let mut child = match spawn_ffmpeg(&ffmpeg, &cfg) {
            Ok(c) => {
                logged_spawn_error = false;
                c
            }
            Err(e) => {
                if !logged_spawn_error {
                    tracing::warn!(ffmpeg = %ffmpeg.display(), error = %e, "failed to spawn ffmpeg");
                    logged_spawn_error = true;
                }

                if !cfg.r#loop {
                    return;
                }

                thread::sleep(Duration::from_millis(500));
                continue;
            }
        };

        let Some(mut stdout) = child.stdout.take() else {
            tracing::warn!("ffmpeg stdout was not captured");
            let _ = child.kill();
            let _ = child.wait();
            return;
        };
        *child_slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(child);

        loop {
            if stop.load(Ordering::SeqCst) {
                kill_child(&child_slot);
                return;
            }

            match stdout.read_exact(&mut buf) {
                Ok(()) => {
                    {
                        let mut guard = lock_latest(&latest);
                        guard.published += 1;
                        let seq = guard.published;
                        guard.frame = Some(VideoFrame {
                            width: cfg.width,
                            height: cfg.height,
                            bytes: buf.clone(),
                            seq,
                        });
                    }
                    signal.notify();
                }
                Err(e) => {
                    kill_child(&child_slot);

                    if cfg.r#loop {
                        tracing::debug!(file = %cfg.file, "end of stream, looping");
                        break;
                    }
                    tracing::debug!(file = %cfg.file, error = %e, "end of stream");
                    // Keep the last frame in `latest` and exit the worker.
                    return;
                }
            }
        }
    }
}

/// Spawn ffmpeg configured to:
/// - read the input at (approx) real-time speed (`-re`), trusting source timestamps/fps
/// - scale to cfg.width x cfg.height
/// - flip vertically, so the resulting RGBA is GL-friendly (bottom-left origin in UVs)
fn spawn_ffmpeg(ffmpeg: &Path, cfg: &VideoConfig) -> io::Result<Child> {
    let mut cmd = Command::new(ffmpeg);

    cmd.arg("-hide_banner").arg("-loglevel").arg("error");
    cmd.arg("-re");

    if cfg.r#loop {
        cmd.arg("-stream_loop").arg("-1");
    }

    cmd.arg("-i")
        .arg(&cfg.file)
        .arg("-vf")
        .arg(format!("scale={}:{},vflip", cfg.width, cfg.height))
        .arg("-pix_fmt")
        .arg("rgba")
        .arg("-f")
        .arg("rawvideo")
        .arg("pipe:1")
        .stdout(Stdio::piped())
        .stderr(Stdio::null());

    cmd.spawn()
}

fn resolve_ffmpeg_path(explicit: Option<&str>) -> Option<PathBuf> {
    // Priority:
    // 1) explicit config path
    // 2) VIDCOMP_FFMPEG env var
    // 3) bundled ffmpeg near executable (vendor/ffmpeg/ffmpeg)
    // 4) workspace dev path (vendor/ffmpeg/ffmpeg)
    if let Some(p) = explicit {
        return Some(PathBuf::from(p));
    }

    if let Some(p) = std::env::var_os("VIDCOMP_FFMPEG") {
        return Some(PathBuf::from(p));
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(exe_dir) = exe.parent() {
            let candidate = exe_dir
                .join("..")
                .join("vendor")
                .join("ffmpeg")
                .join(ffmpeg_filename());
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    // crates/vidcomp-input-video -> workspace root is ../..
    let manifest_dir = PathBuf::from(option_env!("CARGO_MANIFEST_DIR")?);
    let workspace_root = manifest_dir.parent()?.parent()?.to_path_buf();
    let candidate = workspace_root
        .join("vendor")
        .join("ffmpeg")
        .join(ffmpeg_filename());
    if candidate.exists() {
        return Some(candidate);
    }

    None
}

fn ffmpeg_filename() -> &'static OsStr {
    #[cfg(windows)]
    {
        OsStr::new("ffmpeg.exe")
    }
    #[cfg(not(windows))]
    {
        OsStr::new("ffmpeg")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(file: &str) -> VideoConfig {
        serde_json::from_str(&format!(r#"{{ "file": "{file}" }}"#)).unwrap()
    }

    #[test]
    fn config_defaults_apply() {
        let c = cfg("clip.mp4");
        assert_eq!((c.width, c.height, c.fps), (640, 360, 30));
        assert!(c.r#loop);
        assert_eq!(c.sample_transform, IDENTITY_TRANSFORM);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn empty_file_is_rejected_before_spawning() {
        let (sig, _w) = frame_signal();
        let err = VideoDecoder::from_config(cfg("  "), sig).unwrap_err();
        assert!(matches!(err, VideoError::InvalidConfig(_)), "{err}");
    }

    #[test]
    fn non_square_transform_is_kept_verbatim() {
        let json = r#"{ "file": "a.mp4", "sample_transform":
            [0.5, 0, 0, 0,  0, -1, 0, 0,  0, 0, 1, 0,  0.25, 1, 0, 1] }"#;
        let c: VideoConfig = serde_json::from_str(json).unwrap();
        assert_eq!(c.sample_transform[0], 0.5);
        assert_eq!(c.sample_transform[5], -1.0);
        assert_eq!(c.sample_transform[12], 0.25);
    }

    /// Stand-in ffmpeg: writes one 2x2 RGBA frame, then stalls with the pipe open.
    #[cfg(unix)]
    fn stalling_ffmpeg() -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        use std::time::{SystemTime, UNIX_EPOCH};

        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let path = std::env::temp_dir().join(format!("vidcomp_stalling_ffmpeg_{ts}.sh"));
        std::fs::write(&path, "#!/bin/sh\nhead -c 16 /dev/zero\nexec sleep 30\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn frames_are_taken_once_and_drop_does_not_wait_for_a_stalled_pipe() {
        let script = stalling_ffmpeg();
        let mut c = cfg("clip.mp4");
        c.width = 2;
        c.height = 2;
        c.fps = 4;
        c.r#loop = false;
        c.ffmpeg_path = Some(script.to_string_lossy().into_owned());

        let (sig, waiter) = frame_signal();
        let mut decoder = VideoDecoder::from_config(c, sig).unwrap();
        assert!(waiter.wait_timeout(Duration::from_secs(10)));

        let frame = decoder.take_frame().expect("first frame");
        assert_eq!((frame.width, frame.height, frame.seq), (2, 2, 1));
        assert_eq!(frame.bytes.len(), 16);
        assert!(decoder.take_frame().is_none());
        assert_eq!(decoder.position_secs(), 0.25);

        let started = std::time::Instant::now();
        drop(decoder);
        assert!(started.elapsed() < Duration::from_secs(10));

        let _ = std::fs::remove_file(script);
    }

    #[test]
    fn explicit_ffmpeg_path_wins() {
        let p = resolve_ffmpeg_path(Some("/opt/ffmpeg/bin/ffmpeg")).unwrap();
        assert_eq!(p, PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
    }
}
