// Opens a physical camera through nokhwa and converts frames into the
// 0x00RRGGBB buffer both the decoders and the window consume.

use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    utils::{
        ApiBackend, CameraFormat, CameraIndex, CameraInfo, FrameFormat, RequestedFormat,
        RequestedFormatType, Resolution,
    },
};
use tracing::{info, warn};

use crate::camera::{CameraOpener, CaptureDevice};
use crate::error::CameraError;
use crate::types::{Facing, RasterFrame};

const REAR_HINTS: [&str; 4] = ["back", "rear", "environment", "world"];
const FRONT_HINTS: [&str; 4] = ["front", "user", "face", "integrated"];

/// Picks and opens a webcam at a target resolution (falls back if not exact).
pub struct WebcamOpener {
    index: Option<u32>,
    width: u32,
    height: u32,
    fps: u32,
}

impl WebcamOpener {
    pub fn new(index: Option<u32>, width: u32, height: u32, fps: u32) -> Self {
        Self { index, width, height, fps }
    }

    /// Choose the device: explicit index wins, then a name matching the facing, then the first one.
    fn choose(&self, facing: Facing) -> Result<CameraIndex, CameraError> {
        if let Some(i) = self.index {
            return Ok(CameraIndex::Index(i));
        }

        let devices = nokhwa::query(ApiBackend::Auto).map_err(|e| classify(e.to_string()))?;
        if devices.is_empty() {
            return Err(CameraError::DeviceUnavailable("no capture device found".into()));
        }

        let hints: &[&str] = match facing {
            Facing::Rear => &REAR_HINTS,
            Facing::Front => &FRONT_HINTS,
            Facing::Any => &[],
        };
        let matched = devices.iter().find(|info| matches_hint(info, hints));
        let chosen = matched.unwrap_or(&devices[0]);
        info!(name = %chosen.human_name(), matched = matched.is_some(), "selected camera");
        Ok(chosen.index().clone())
    }
}

fn matches_hint(info: &CameraInfo, hints: &[&str]) -> bool {
    let label = format!("{} {}", info.human_name(), info.description()).to_ascii_lowercase();
    hints.iter().any(|h| label.contains(h))
}

/// Permission problems are reported differently from missing hardware.
fn classify(message: String) -> CameraError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not authorized") {
        CameraError::PermissionDenied(message)
    } else {
        CameraError::DeviceUnavailable(message)
    }
}

impl CameraOpener for WebcamOpener {
    type Device = Webcam;

    fn open(&mut self, facing: Facing) -> Result<Webcam, CameraError> {
        let idx = self.choose(facing)?;

        let fmt = CameraFormat::new(
            Resolution::new(self.width, self.height),
            FrameFormat::MJPEG,
            self.fps,
        );

        // Ask for RGB frames, closest to what we requested.
        let req = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(fmt));

        // Creating the camera fails if no device exists or access is refused.
        let mut cam = Camera::new(idx, req).map_err(|e| classify(format!("create camera: {e}")))?;

        cam.open_stream().map_err(|e| classify(format!("open stream: {e}")))?;

        // The actual stream might choose a slightly different resolution.
        let actual = cam.resolution();
        info!(width = actual.width(), height = actual.height(), "camera stream started");

        Ok(Webcam { cam })
    }
}

/// A small wrapper around nokhwa::Camera.
pub struct Webcam {
    cam: Camera,
}

impl CaptureDevice for Webcam {
    /// Blocks until the camera has a new frame.
    fn grab(&mut self) -> Result<Option<RasterFrame>, CameraError> {
        let frame = self
            .cam
            .frame()
            .map_err(|e| CameraError::Frame(format!("fetch frame: {e}")))?;

        // Handles various raw formats (MJPEG/YUYV) into ImageBuffer<Rgb<u8>, Vec<u8>>.
        let rgb_img = frame
            .decode_image::<RgbFormat>()
            .map_err(|e| CameraError::Frame(format!("decode rgb: {e}")))?;

        // Pack as 0x00RRGGBB by hand; nokhwa may pin a different `image` version.
        let (w, h) = rgb_img.dimensions();
        let raw = rgb_img.into_raw();
        let pixels = raw
            .chunks_exact(3)
            .map(|p| ((p[0] as u32) << 16) | ((p[1] as u32) << 8) | p[2] as u32)
            .collect();

        Ok(Some(RasterFrame { width: w as usize, height: h as usize, pixels }))
    }

    fn release(&mut self) {
        if let Err(e) = self.cam.stop_stream() {
            warn!("stopping camera stream: {e}");
        }
    }
}
