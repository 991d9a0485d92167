//! Live camera QR capture for coupon/permit redemption.
//!
//! A camera is opened, frames are decoded continuously, and each newly seen
//! code is submitted once to the redemption backend for verification.
//!
//! ```text
//! ScanSession ──► CameraHandle ──► FrameLoop ──► DecodeEngine
//!      ▲                                             │
//!      │                                             ▼
//!      └──── VerificationOutcome ◄── Verifier ◄── Debounce
//! ```

pub mod camera;
pub mod config;
pub mod debounce;
pub mod decode;
pub mod error;
pub mod frame_loop;
pub mod session;
pub mod state;
pub mod types;
pub mod verify;
pub mod vision;

#[cfg(feature = "desktop")]
pub mod webcam;

pub use camera::{CameraHandle, CameraOpener, CaptureDevice};
pub use config::ScannerConfig;
pub use decode::{Decode, DecodeEngine, DetectorPreference};
pub use error::{CameraError, ScanError};
pub use session::{ScanSession, SessionOptions};
pub use state::{ScanState, Verdict};
pub use types::{DecodedPayload, Facing, RasterFrame};
pub use verify::{HttpVerifier, VerificationOutcome, Verifier};
