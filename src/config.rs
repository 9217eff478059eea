//! Configuration types for a scanning session.
//!
//! Loads settings from config.json at startup. Every field carries a serde
//! default so a partial file (or no file at all) still yields a usable
//! configuration. The loaded value is immutable and handed to each component
//! at construction.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Errors raised while loading or validating the configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config file {0}: {1}")]
    Parse(String, serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub camera: CameraConfig,
    pub motion: MotionConfig,
    pub isolator: IsolatorConfig,
    pub ocr: OcrConfig,
    pub sets: SetConfig,
    pub catalog: CatalogConfig,
    pub retry: RetryConfig,
    pub output: OutputConfig,
    pub session: SessionConfig,
    pub cues: CueConfig,
    pub logging: LoggingConfig,
}

/// How frames are obtained from the camera.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraMode {
    /// Poll a still-image URL, one request per frame
    Snapshot,
    /// Read a multipart MJPEG stream
    Mjpeg,
    /// Replay image files from a directory
    Replay,
    /// Local camera device (USB webcam) by index
    Device,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub mode: CameraMode,
    /// Snapshot or stream URL (snapshot / mjpeg modes)
    pub url: String,
    /// Directory of frames to replay (replay mode)
    pub replay_dir: PathBuf,
    /// Camera index (device mode)
    pub device_index: i32,
    /// Connect timeout for the camera endpoint (seconds)
    pub connect_timeout_secs: u64,
    /// Longest wait for a response or for more stream data (seconds)
    pub read_timeout_secs: u64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            mode: CameraMode::Snapshot,
            url: "http://127.0.0.1:8080/shot.jpg".to_string(),
            replay_dir: PathBuf::from("frames"),
            device_index: 0,
            connect_timeout_secs: 10,
            read_timeout_secs: 10,
        }
    }
}

/// Motion detection parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// ROI extends this many pixels left and right of the frame centre
    pub roi_half_width: u32,
    /// ROI extends this many pixels above and below the frame centre
    pub roi_half_height: u32,
    /// Gaussian kernel size of the difference blur (odd, in pixels)
    pub blur_kernel: u32,
    /// Intensity cutoff applied to the blurred difference image
    pub diff_threshold: u8,
    /// Number of 3x3 dilation passes
    pub dilate_iterations: u32,
    /// Contours with a smaller enclosed area are treated as noise
    pub min_contour_area: f64,
    /// Pause after a trigger before grabbing the capture frame (milliseconds)
    pub settle_delay_ms: u64,
    /// How often a manual capture checks for the operator's request (milliseconds)
    pub manual_poll_ms: u64,
    /// Write an annotated preview image while detecting
    pub preview: bool,
    /// Write the preview every N evaluated frame pairs
    pub preview_every: u32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            roi_half_width: 50,
            roi_half_height: 100,
            blur_kernel: 21,
            diff_threshold: 25,
            dilate_iterations: 2,
            min_contour_area: 2000.0,
            settle_delay_ms: 1000,
            manual_poll_ms: 50,
            preview: true,
            preview_every: 10,
        }
    }
}

/// Which side of the threshold the card sits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// Bright backdrop, card darker than the cutoff
    LightBackground,
    /// Dark backdrop, card brighter than the cutoff
    DarkBackground,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct IsolatorConfig {
    pub threshold: u8,
    pub polarity: Polarity,
}

impl Default for IsolatorConfig {
    fn default() -> Self {
        Self {
            threshold: 240,
            polarity: Polarity::LightBackground,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrBackend {
    Azure,
    Tesseract,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub backend: OcrBackend,
    /// Azure endpoint; falls back to $VISION_ENDPOINT
    pub endpoint: Option<String>,
    /// Azure subscription key; falls back to $VISION_KEY
    pub key: Option<String>,
    /// Tesseract executable (tesseract backend)
    pub tesseract_path: PathBuf,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            backend: OcrBackend::Azure,
            endpoint: None,
            key: None,
            tesseract_path: PathBuf::from("tesseract"),
        }
    }
}

impl OcrConfig {
    pub fn resolved_endpoint(&self) -> Option<String> {
        self.endpoint
            .clone()
            .or_else(|| std::env::var("VISION_ENDPOINT").ok())
    }

    pub fn resolved_key(&self) -> Option<String> {
        self.key.clone().or_else(|| std::env::var("VISION_KEY").ok())
    }
}

/// Set tokens recognised in card text, and their catalog identifiers.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SetConfig {
    /// Closed enumeration of tokens matched in OCR text
    pub tokens: Vec<String>,
    /// Token → catalog set identifier
    pub ids: BTreeMap<String, String>,
}

const DEFAULT_TOKENS: [&str; 13] = [
    "SVI", "PAL", "OBF", "MEW", "PAR", "PAF", "TEF", "TWM", "SFA", "SCR", "SSP", "PRE", "JTG",
];

const DEFAULT_SET_IDS: [(&str, &str); 14] = [
    ("PRE", "sv08.5"),
    ("PAR", "sv04"),
    ("MEW", "sv03.5"),
    ("JTG", "sv09"),
    ("OBF", "sv03"),
    ("PAL", "sv02"),
    ("PAF", "sv04.5"),
    ("SVP", "svp"),
    ("SVI", "sv01"),
    ("SFA", "sv06.5"),
    ("SCR", "sv07"),
    ("SSP", "sv08"),
    ("TEF", "sv05"),
    ("TWM", "sv06"),
];

impl Default for SetConfig {
    fn default() -> Self {
        Self {
            tokens: DEFAULT_TOKENS.iter().map(|t| t.to_string()).collect(),
            ids: DEFAULT_SET_IDS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Base URL; the card key is appended as `/{set_id}-{card_id}`
    pub base_url: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.tcgdex.net/v2/en/cards".to_string(),
        }
    }
}

/// Bounded retry applied to OCR and catalog calls.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub backoff_factor: u32,
    /// Whole-request timeout for each attempt (seconds)
    pub timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff_ms: 500,
            backoff_factor: 2,
            timeout_secs: 15,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    /// Keep raw captures and crops under `<dir>/captures`
    pub save_captures: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
            save_captures: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub max_cycles: u32,
    /// Consecutive OCR/lookup service failures tolerated before the session ends
    pub max_service_failures: u32,
    /// Listen on stdin for manual-capture / cancel keys
    pub operator_keys: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_cycles: 10,
            max_service_failures: 3,
            operator_keys: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CueConfig {
    pub enabled: bool,
    pub player: String,
    pub success_sound: PathBuf,
    pub failure_sound: PathBuf,
}

fn default_player() -> String {
    if cfg!(target_os = "macos") {
        "afplay".to_string()
    } else {
        "aplay".to_string()
    }
}

impl Default for CueConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            player: default_player(),
            success_sound: PathBuf::from("assets/success.wav"),
            failure_sound: PathBuf::from("assets/failure.wav"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Parses and validates a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        let config: AppConfig = serde_json::from_str(&content)
            .map_err(|e| ConfigError::Parse(path.display().to_string(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads from an explicit path, or from the first config.json found in the
    /// working directory or the user config directory. Defaults when none exist.
    pub fn discover(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        if let Some(path) = explicit {
            return Ok((Self::load(path)?, Some(path.to_path_buf())));
        }

        for candidate in crate::paths::config_candidates() {
            if candidate.exists() {
                return Ok((Self::load(&candidate)?, Some(candidate)));
            }
        }

        Ok((Self::default(), None))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.motion.roi_half_width == 0 || self.motion.roi_half_height == 0 {
            return Err(ConfigError::Invalid(
                "motion ROI half extents must be positive".into(),
            ));
        }
        if self.motion.blur_kernel % 2 == 0 {
            return Err(ConfigError::Invalid("motion.blur_kernel must be odd".into()));
        }
        if self.motion.min_contour_area < 0.0 {
            return Err(ConfigError::Invalid(
                "motion.min_contour_area must not be negative".into(),
            ));
        }
        if self.sets.tokens.is_empty() {
            return Err(ConfigError::Invalid("sets.tokens must not be empty".into()));
        }
        for token in &self.sets.tokens {
            if token.is_empty() || !token.chars().all(|c| c.is_ascii_uppercase()) {
                return Err(ConfigError::Invalid(format!(
                    "set token {:?} must be non-empty uppercase ASCII",
                    token
                )));
            }
        }
        if let Some((token, _)) = self.sets.ids.iter().find(|(_, id)| id.is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "set token {} maps to an empty identifier",
                token
            )));
        }
        if self.camera.read_timeout_secs == 0 {
            return Err(ConfigError::Invalid("camera.read_timeout_secs must be positive".into()));
        }
        if self.retry.backoff_factor == 0 {
            return Err(ConfigError::Invalid("retry.backoff_factor must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        AppConfig::default().validate().unwrap();
    }

    #[test]
    fn test_every_default_token_has_an_identifier() {
        let sets = SetConfig::default();
        for token in &sets.tokens {
            let id = sets.ids.get(token).expect("token missing from mapping");
            assert!(!id.is_empty());
        }
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "session": { "max_cycles": 3 } }"#).unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.session.max_cycles, 3);
        assert_eq!(config.session.max_service_failures, 3);
        assert_eq!(config.motion.roi_half_height, 100);
        assert_eq!(config.isolator.threshold, 240);
    }

    #[test]
    fn test_lowercase_token_rejected() {
        let mut config = AppConfig::default();
        config.sets.tokens.push("svi".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_unparsable_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(AppConfig::load(&path), Err(ConfigError::Parse(_, _))));
    }

    #[test]
    fn test_camera_mode_snake_case() {
        let camera: CameraConfig =
            serde_json::from_str(r#"{ "mode": "mjpeg", "url": "http://cam/stream" }"#).unwrap();
        assert_eq!(camera.mode, CameraMode::Mjpeg);
        assert_eq!(camera.connect_timeout_secs, 10);
        assert_eq!(camera.read_timeout_secs, 10);

        let camera: CameraConfig = serde_json::from_str(r#"{ "mode": "device", "device_index": 1 }"#).unwrap();
        assert_eq!(camera.mode, CameraMode::Device);
        assert_eq!(camera.device_index, 1);
    }

    #[test]
    fn test_even_blur_kernel_rejected() {
        let mut config = AppConfig::default();
        config.motion.blur_kernel = 20;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
