use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Client configuration: config file, then `FRAS_*` environment overrides.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Base URL of the attendance service.
    pub server_url: String,
    /// Minimum seconds between two check attempts.
    pub cooldown_secs: u64,
    /// Timeout in seconds for every HTTP request.
    pub request_timeout_secs: u64,
    /// Timeout in seconds for one face description.
    pub describe_timeout_secs: u64,
    /// Minimum hand presence score.
    pub hand_confidence: f32,
    /// Minimum face detection score.
    pub face_confidence: f32,
    /// Frames to discard after opening the camera (AGC/AE stabilization).
    pub warmup_frames: usize,
    /// Frames to capture per registration attempt.
    pub frames_per_register: usize,
    /// Where to write the preview image, if anywhere.
    pub preview_path: Option<PathBuf>,
    /// Write the preview every N frames.
    pub preview_every: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            camera_device: "/dev/video0".to_string(),
            model_dir: fras_core::default_model_dir(),
            server_url: "http://127.0.0.1:8000".to_string(),
            cooldown_secs: 5,
            request_timeout_secs: 10,
            describe_timeout_secs: 5,
            hand_confidence: 0.6,
            face_confidence: 0.5,
            warmup_frames: 4,
            frames_per_register: 5,
            preview_path: None,
            preview_every: 15,
        }
    }
}

impl Config {
    /// Load the config file (if any) and apply `FRAS_*` environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let lookup = |key: &str| std::env::var(key).ok();
        let config = match config_path(lookup) {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        Ok(config.with_overrides(lookup))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Apply `FRAS_*` overrides; unparseable values are ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = lookup("FRAS_CAMERA_DEVICE") {
            self.camera_device = v;
        }
        if let Some(v) = lookup("FRAS_MODEL_DIR") {
            self.model_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("FRAS_SERVER_URL") {
            self.server_url = v;
        }
        if let Some(v) = lookup("FRAS_PREVIEW_PATH") {
            self.preview_path = (!v.is_empty()).then(|| PathBuf::from(v));
        }
        self.cooldown_secs = parsed(&lookup, "FRAS_COOLDOWN_SECS", self.cooldown_secs);
        self.request_timeout_secs =
            parsed(&lookup, "FRAS_REQUEST_TIMEOUT_SECS", self.request_timeout_secs);
        self.describe_timeout_secs =
            parsed(&lookup, "FRAS_DESCRIBE_TIMEOUT_SECS", self.describe_timeout_secs);
        self.hand_confidence = parsed(&lookup, "FRAS_HAND_CONFIDENCE", self.hand_confidence);
        self.face_confidence = parsed(&lookup, "FRAS_FACE_CONFIDENCE", self.face_confidence);
        self.warmup_frames = parsed(&lookup, "FRAS_WARMUP_FRAMES", self.warmup_frames);
        self.frames_per_register =
            parsed(&lookup, "FRAS_FRAMES_PER_REGISTER", self.frames_per_register);
        self.preview_every = parsed(&lookup, "FRAS_PREVIEW_EVERY", self.preview_every).max(1);
        self
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn describe_timeout(&self) -> Duration {
        Duration::from_secs(self.describe_timeout_secs)
    }

    /// Path to the hand landmark model.
    pub fn hand_model_path(&self) -> String {
        self.model_path("hand_landmark.onnx")
    }

    /// Path to the RFB-320 face locator.
    pub fn face_locator_path(&self) -> String {
        self.model_path("face_locator.onnx")
    }

    /// Path to the 128-d face encoder.
    pub fn face_encoder_path(&self) -> String {
        self.model_path("face_encoder.onnx")
    }

    fn model_path(&self, file: &str) -> String {
        self.model_dir.join(file).to_string_lossy().into_owned()
    }
}

/// `$FRAS_CONFIG`, else `$XDG_CONFIG_HOME/fras/config.toml`, else `~/.config/fras/config.toml`.
fn config_path(lookup: impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
    if let Some(path) = lookup("FRAS_CONFIG") {
        return Some(PathBuf::from(path));
    }
    let base = lookup("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| lookup("HOME").map(|home| PathBuf::from(home).join(".config")))?;
    Some(base.join("fras").join("config.toml"))
}

fn parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
