// The camera resource handle.
// One live capture stream, owned by exactly one scan session. The stream is
// released exactly once: on `close()`, or on drop if nobody closed it.

use tracing::{debug, info};

use crate::error::CameraError;
use crate::types::{Facing, RasterFrame};

/// A live capture stream.
pub trait CaptureDevice {
    /// Pull the next frame. `Ok(None)` means the stream has nothing yet.
    fn grab(&mut self) -> Result<Option<RasterFrame>, CameraError>;

    /// Stop the stream's tracks and give the device back to the OS.
    fn release(&mut self);
}

/// Something that can acquire a capture stream.
pub trait CameraOpener {
    type Device: CaptureDevice;

    fn open(&mut self, facing: Facing) -> Result<Self::Device, CameraError>;
}

/// Exclusive owner of one open capture stream.
pub struct CameraHandle<C: CaptureDevice> {
    device: Option<C>,
    last: Option<RasterFrame>,
    width: usize,   // 0 until the first frame arrives
    height: usize,
    frames: u64,
}

impl<C: CaptureDevice> CameraHandle<C> {
    /// Acquire a stream through `opener`.
    pub fn open<O>(opener: &mut O, facing: Facing) -> Result<Self, CameraError>
    where
        O: CameraOpener<Device = C>,
    {
        let device = opener.open(facing)?;
        info!(?facing, "camera opened");
        Ok(Self::from_device(device))
    }

    pub fn from_device(device: C) -> Self {
        Self { device: Some(device), last: None, width: 0, height: 0, frames: 0 }
    }

    pub fn is_open(&self) -> bool {
        self.device.is_some()
    }

    /// Resolution the stream is actually delivering (0x0 before the first frame).
    pub fn resolution(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn frames_received(&self) -> u64 {
        self.frames
    }

    /// Most recent good frame. Pulls a fresh one from the stream first;
    /// a failed grab keeps the previous frame current.
    pub fn current_frame(&mut self) -> Option<&RasterFrame> {
        let device = self.device.as_mut()?;
        match device.grab() {
            Ok(Some(frame)) if !frame.is_empty() => {
                self.width = frame.width;
                self.height = frame.height;
                self.frames += 1;
                self.last = Some(frame);
            }
            Ok(_) => {}
            Err(e) => debug!("frame grab skipped: {e}"),
        }
        self.last.as_ref()
    }

    /// Last frame seen, without touching the stream.
    pub fn last_frame(&self) -> Option<&RasterFrame> {
        if self.is_open() { self.last.as_ref() } else { None }
    }

    /// Release the device. Safe to call any number of times.
    pub fn close(&mut self) {
        if let Some(mut device) = self.device.take() {
            device.release();
            self.last = None;
            info!(frames = self.frames, "camera released");
        }
    }
}

impl<C: CaptureDevice> Drop for CameraHandle<C> {
    fn drop(&mut self) {
        self.close();
    }
}
