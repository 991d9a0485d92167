//! Scanner configuration.
//!
//! Configuration is loaded from environment variables with fallback to defaults.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::info;

use crate::decode::DetectorPreference;
use crate::types::Facing;

pub const DEFAULT_VERIFY_PATH: &str = "/redemption/verify-token";

/// Scanner configuration.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Base address of the redemption backend (no trailing slash needed)
    pub backend_url: Option<String>,

    /// Session token forwarded in the `auth` header
    pub session_token: Option<String>,

    /// Path of the verification endpoint under `backend_url`
    pub verify_path: String,

    /// Explicit camera index; overrides facing-based selection
    pub camera_index: Option<u32>,

    /// Preferred camera facing
    pub facing: Facing,

    /// Requested capture resolution (closest supported is used)
    pub frame_width: u32,
    pub frame_height: u32,

    /// Window refresh rate; one decode tick per refresh
    pub target_fps: u32,

    /// Longest side of the downscaled manual snapshot
    pub snapshot_max_dim: u32,

    /// Which decoding backend to use
    pub detector: DetectorPreference,

    /// Verification request timeout
    pub request_timeout: Duration,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            backend_url: None,
            session_token: None,
            verify_path: DEFAULT_VERIFY_PATH.to_string(),
            camera_index: None,
            facing: Facing::Rear,
            frame_width: 1280,
            frame_height: 720,
            target_fps: 30,
            snapshot_max_dim: 800,
            detector: DetectorPreference::Auto,
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl ScannerConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup (tests use a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let optional = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let config = ScannerConfig {
            backend_url: optional("SCANNER_BACKEND_URL"),
            session_token: optional("SCANNER_SESSION_TOKEN"),
            verify_path: optional("SCANNER_VERIFY_PATH").unwrap_or(defaults.verify_path),
            camera_index: optional("SCANNER_CAMERA_INDEX")
                .map(|v| parse_value("SCANNER_CAMERA_INDEX", &v))
                .transpose()?,
            facing: parse_or("SCANNER_FACING", optional("SCANNER_FACING"), defaults.facing)?,
            frame_width: parse_or("SCANNER_FRAME_WIDTH", optional("SCANNER_FRAME_WIDTH"), defaults.frame_width)?,
            frame_height: parse_or("SCANNER_FRAME_HEIGHT", optional("SCANNER_FRAME_HEIGHT"), defaults.frame_height)?,
            target_fps: parse_or("SCANNER_TARGET_FPS", optional("SCANNER_TARGET_FPS"), defaults.target_fps)?,
            snapshot_max_dim: parse_or(
                "SCANNER_SNAPSHOT_MAX_DIM",
                optional("SCANNER_SNAPSHOT_MAX_DIM"),
                defaults.snapshot_max_dim,
            )?,
            detector: parse_or("SCANNER_DETECTOR", optional("SCANNER_DETECTOR"), defaults.detector)?,
            request_timeout: Duration::from_secs(parse_or(
                "SCANNER_REQUEST_TIMEOUT_SECS",
                optional("SCANNER_REQUEST_TIMEOUT_SECS"),
                defaults.request_timeout.as_secs(),
            )?),
        };

        if config.frame_width == 0 || config.frame_height == 0 {
            return Err(ConfigError::InvalidValue("SCANNER_FRAME_WIDTH/SCANNER_FRAME_HEIGHT".to_string()));
        }
        if config.target_fps == 0 {
            return Err(ConfigError::InvalidValue("SCANNER_TARGET_FPS".to_string()));
        }
        if config.snapshot_max_dim == 0 {
            return Err(ConfigError::InvalidValue("SCANNER_SNAPSHOT_MAX_DIM".to_string()));
        }

        Ok(config)
    }

    /// Full verification URL, if a backend is configured.
    pub fn verify_url(&self) -> Option<String> {
        let base = self.backend_url.as_deref()?;
        let path = self.verify_path.trim_start_matches('/');
        Some(format!("{}/{}", base.trim_end_matches('/'), path))
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.parse().map_err(|_| ConfigError::InvalidValue(key.to_string()))
}

fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        Some(v) => parse_value(key, &v),
        None => {
            info!("{key} not set, using default");
            Ok(default)
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}
