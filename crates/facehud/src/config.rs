use std::path::PathBuf;
use std::time::Duration;

use crate::engine::OverlapPolicy;

/// Runtime configuration, loaded from `FACEHUD_*` environment variables.
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Capture resolution requested from the driver.
    pub capture_width: u32,
    pub capture_height: u32,
    /// Directory containing the five ONNX model files.
    pub model_dir: PathBuf,
    /// Gallery manifest (TOML) path.
    pub manifest_path: PathBuf,
    /// Annotation tick period.
    pub tick_interval: Duration,
    /// Euclidean acceptance threshold for identity matches.
    pub match_threshold: f32,
    /// Display (overlay) resolution; defaults to the capture resolution.
    pub display_width: Option<u32>,
    pub display_height: Option<u32>,
    /// TTF font for overlay text.
    pub font_path: PathBuf,
    /// Where to write the annotated snapshot each tick, if anywhere.
    pub snapshot_path: Option<PathBuf>,
    /// Frames discarded at startup for auto-exposure settling.
    pub warmup_frames: usize,
    /// What to do when a tick fires while the previous one is in flight.
    pub overlap: OverlapPolicy,
}

impl Config {
    /// Load configuration from `FACEHUD_*` environment variables with
    /// defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("facehud");

        let model_dir = std::env::var("FACEHUD_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("models"));

        let manifest_path = std::env::var("FACEHUD_MANIFEST")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("gallery.toml"));

        let overlap = match std::env::var("FACEHUD_OVERLAP").as_deref() {
            Ok("queue") => OverlapPolicy::Queue,
            Ok("drop") | Err(_) => OverlapPolicy::Drop,
            Ok(other) => {
                tracing::warn!(value = other, "unknown FACEHUD_OVERLAP, using drop");
                OverlapPolicy::Drop
            }
        };

        Self {
            camera_device: std::env::var("FACEHUD_CAMERA_DEVICE")
                .unwrap_or_else(|_| "/dev/video0".to_string()),
            capture_width: env_u32("FACEHUD_CAPTURE_WIDTH", 640),
            capture_height: env_u32("FACEHUD_CAPTURE_HEIGHT", 480),
            model_dir,
            manifest_path,
            tick_interval: Duration::from_millis(env_u64("FACEHUD_TICK_INTERVAL_MS", 200)),
            match_threshold: env_f32("FACEHUD_MATCH_THRESHOLD", 0.6),
            display_width: opt_env_u32("FACEHUD_DISPLAY_WIDTH"),
            display_height: opt_env_u32("FACEHUD_DISPLAY_HEIGHT"),
            font_path: std::env::var("FACEHUD_FONT_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    PathBuf::from("/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf")
                }),
            snapshot_path: std::env::var("FACEHUD_SNAPSHOT_PATH").ok().map(PathBuf::from),
            warmup_frames: env_usize("FACEHUD_WARMUP_FRAMES", 4),
            overlap,
        }
    }

    /// Overlay dimensions: explicit overrides, otherwise the negotiated
    /// capture resolution.
    pub fn display_dims(&self, capture: (u32, u32)) -> (u32, u32) {
        (
            self.display_width.unwrap_or(capture.0),
            self.display_height.unwrap_or(capture.1),
        )
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn opt_env_u32(key: &str) -> Option<u32> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
