// Error types. Every variant states *where* things went wrong.
use thiserror::Error;

use crate::config::ConfigError;

/// Camera acquisition and capture failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraError {
    /// The user (or the OS) refused access to the camera.
    #[error("camera permission denied: {0}")]
    PermissionDenied(String),

    /// No usable capture device, or it could not be opened/streamed.
    #[error("camera unavailable: {0}")]
    DeviceUnavailable(String),

    /// Grabbing/decoding a single frame failed. Never fatal.
    #[error("camera frame error: {0}")]
    Frame(String),
}

/// Reasons a scan session ends up in `Errored`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error(transparent)]
    Camera(#[from] CameraError),

    /// Transport or server failure while verifying a decoded code.
    #[error("verification failed: {0}")]
    Verification(String),
}

/// Top-level failures of the desktop binary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("window error: {0}")]
    Window(String),

    #[error("async runtime error: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("http client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}
