// The frame decode loop.
// One iteration per display refresh. A paused or camera-less tick does no
// work; a decode miss is not an error. Only `cancel` stops the loop.

use tracing::debug;

use crate::camera::{CameraHandle, CaptureDevice};
use crate::decode::Decode;
use crate::types::DecodedPayload;

/// What one tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    /// The loop is not scheduled; nothing ran.
    Cancelled,
    /// Paused, no camera, or no frame yet.
    Idle,
    /// A frame was offered to the decoder and nothing was found.
    Miss,
    Decoded(DecodedPayload),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub ticks: u64,
    pub idle_ticks: u64,
    pub attempts: u64,
    pub hits: u64,
}

#[derive(Debug, Default)]
pub struct FrameLoop {
    scheduled: bool,
    stats: LoopStats,
}

impl FrameLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule ticks. Statistics restart with each arming.
    pub fn arm(&mut self) {
        self.scheduled = true;
        self.stats = LoopStats::default();
    }

    /// No tick does any work after this.
    pub fn cancel(&mut self) {
        if self.scheduled {
            debug!(ticks = self.stats.ticks, attempts = self.stats.attempts, "frame loop cancelled");
        }
        self.scheduled = false;
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduled
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    pub fn tick<C, D>(&mut self, paused: bool, camera: Option<&mut CameraHandle<C>>, decoder: &D) -> Tick
    where
        C: CaptureDevice,
        D: Decode,
    {
        if !self.scheduled {
            return Tick::Cancelled;
        }
        self.stats.ticks += 1;

        let frame = match camera {
            Some(cam) if !paused => cam.current_frame(),
            _ => None,
        };
        let Some(frame) = frame else {
            self.stats.idle_ticks += 1;
            return Tick::Idle;
        };

        self.stats.attempts += 1;
        match decoder.try_decode(frame) {
            Some(payload) => {
                self.stats.hits += 1;
                Tick::Decoded(payload)
            }
            None => Tick::Miss,
        }
    }
}
