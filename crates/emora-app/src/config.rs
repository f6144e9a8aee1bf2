use anyhow::bail;
use emora_core::Precedence;
use std::path::PathBuf;

/// Which detector backends to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorChoice {
    /// Load whichever backends have their model files present.
    Auto,
    Neural,
    Cascade,
}

/// Application configuration, loaded from environment variables.
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Directory containing the ONNX / SeetaFace model files.
    pub model_dir: PathBuf,
    /// Directory containing overlay assets (label font, emoji sprites).
    pub asset_dir: PathBuf,
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Directory accepted captures are written into.
    pub capture_dir: PathBuf,
    /// Detector backend selection.
    pub detector: DetectorChoice,
    /// Which backend's results win in comparison mode.
    pub precedence: Precedence,
    /// Single-person privacy mask applied before detection.
    pub single_person_mode: bool,
    /// Preview tick period in milliseconds.
    pub tick_ms: u64,
    /// Number of warmup frames to discard at startup (camera AGC/AE).
    pub warmup_frames: usize,
}

impl Config {
    /// Load configuration from `EMORA_*` environment variables with
    /// defaults. Unknown detector or precedence names are rejected.
    pub fn from_env() -> anyhow::Result<Self> {
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("emora");

        let db_path = std::env::var("EMORA_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("emotions.db"));

        let capture_dir = std::env::var("EMORA_CAPTURE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("captures"));

        let detector = match std::env::var("EMORA_DETECTOR").as_deref() {
            Err(_) | Ok("auto") => DetectorChoice::Auto,
            Ok("neural") => DetectorChoice::Neural,
            Ok("cascade") => DetectorChoice::Cascade,
            Ok(other) => bail!("unknown detector backend: {other} (expected auto|neural|cascade)"),
        };

        let precedence = match std::env::var("EMORA_DETECTOR_PRECEDENCE").as_deref() {
            Err(_) | Ok("neural") => Precedence::PreferNeural,
            Ok("cascade") => Precedence::PreferCascade,
            Ok(other) => bail!("unknown detector precedence: {other} (expected neural|cascade)"),
        };

        Ok(Self {
            camera_device: std::env::var("EMORA_CAMERA_DEVICE")
                .unwrap_or_else(|_| "/dev/video0".to_string()),
            model_dir: std::env::var("EMORA_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("models")),
            asset_dir: std::env::var("EMORA_ASSET_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("assets")),
            db_path,
            capture_dir,
            detector,
            precedence,
            single_person_mode: std::env::var("EMORA_SINGLE_PERSON")
                .map(|v| v != "0")
                .unwrap_or(false),
            tick_ms: env_u64("EMORA_TICK_MS", 20),
            warmup_frames: env_usize("EMORA_WARMUP_FRAMES", 4),
        })
    }

    /// Path to the neural face detection model.
    pub fn neural_model_path(&self) -> String {
        self.model_dir
            .join("scrfd_500m.onnx")
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the SeetaFace cascade model.
    pub fn cascade_model_path(&self) -> String {
        self.model_dir
            .join("seeta_fd_frontal_v1.0.bin")
            .to_string_lossy()
            .into_owned()
    }
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
