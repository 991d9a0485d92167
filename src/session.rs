//! Scan session controller.
//!
//! Owns the camera, the frame loop and the dedup gate, and drives them from
//! the transition table in [`crate::state`]. Call [`ScanSession::tick`] once
//! per display refresh. Verification runs on a tokio runtime; its result
//! comes back over a channel tagged with the session epoch, so responses
//! that outlive a reset or teardown are dropped without a transition.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::camera::{CameraHandle, CameraOpener};
use crate::debounce::Debounce;
use crate::decode::{self, Decode, DecodeEngine};
use crate::frame_loop::{FrameLoop, LoopStats, Tick};
use crate::state::{Effects, Event, ScanState, transition};
use crate::types::{DecodedPayload, Facing, RasterFrame};
use crate::verify::{VerificationOutcome, Verifier};

/// Session knobs that do not belong to any collaborator.
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub facing: Facing,
    /// Longest side of the manual snapshot copy.
    pub snapshot_max_dim: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self { facing: Facing::Rear, snapshot_max_dim: 800 }
    }
}

pub struct ScanSession<O, V, D = DecodeEngine>
where
    O: CameraOpener,
    V: Verifier,
    D: Decode,
{
    opener: O,
    verifier: Arc<V>,
    decoder: D,
    runtime: Handle,
    options: SessionOptions,

    state: ScanState,
    camera: Option<CameraHandle<O::Device>>,
    frame_loop: FrameLoop,
    debounce: Debounce,

    epoch: u64,
    outcomes_tx: UnboundedSender<(u64, VerificationOutcome)>,
    outcomes_rx: UnboundedReceiver<(u64, VerificationOutcome)>,
    verifications: u64,
    last_code: Option<DecodedPayload>,
}

impl<O, V, D> ScanSession<O, V, D>
where
    O: CameraOpener,
    V: Verifier,
    D: Decode,
{
    pub fn new(opener: O, verifier: V, decoder: D, runtime: Handle, options: SessionOptions) -> Self {
        let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();
        info!(decoder = decoder.name(), "scan session created");
        Self {
            opener,
            verifier: Arc::new(verifier),
            decoder,
            runtime,
            options,
            state: ScanState::Idle,
            camera: None,
            frame_loop: FrameLoop::new(),
            debounce: Debounce::new(),
            epoch: 0,
            outcomes_tx,
            outcomes_rx,
            verifications: 0,
            last_code: None,
        }
    }

    pub fn state(&self) -> &ScanState {
        &self.state
    }

    /// Most recent payload handed to the verifier.
    pub fn last_code(&self) -> Option<&DecodedPayload> {
        self.last_code.as_ref()
    }

    pub fn camera_open(&self) -> bool {
        self.camera.as_ref().is_some_and(|c| c.is_open())
    }

    /// Last camera frame, for display.
    pub fn preview(&self) -> Option<&RasterFrame> {
        self.camera.as_ref().and_then(|c| c.last_frame())
    }

    pub fn loop_stats(&self) -> LoopStats {
        self.frame_loop.stats()
    }

    /// Number of verification calls issued over the session's lifetime.
    pub fn verifications_issued(&self) -> u64 {
        self.verifications
    }

    pub fn decoder_name(&self) -> &'static str {
        self.decoder.name()
    }

    /// User gesture: acquire the camera and start scanning.
    pub fn start(&mut self) {
        if !self.apply(Event::Start) {
            return;
        }
        let event = match CameraHandle::open(&mut self.opener, self.options.facing) {
            Ok(handle) => {
                self.camera = Some(handle);
                Event::CameraOpened
            }
            Err(e) => {
                warn!("camera acquisition failed: {e}");
                Event::CameraFailed(e)
            }
        };
        self.apply(event);
    }

    pub fn pause(&mut self) {
        self.apply(Event::Pause);
    }

    pub fn resume(&mut self) {
        self.apply(Event::Resume);
    }

    pub fn toggle_pause(&mut self) {
        if self.state.loop_paused() { self.resume() } else { self.pause() }
    }

    /// Back to scanning after a verdict, without re-opening the camera.
    pub fn rescan(&mut self) {
        self.apply(Event::Rescan);
    }

    /// Full teardown to idle: camera closed, loop stopped, dedup forgotten.
    pub fn reset(&mut self) {
        self.apply(Event::Reset);
    }

    /// The owner is going away. Same cleanup as reset.
    pub fn teardown(&mut self) {
        self.apply(Event::Teardown);
    }

    /// One display refresh: collect a finished verification, then run one loop iteration.
    pub fn tick(&mut self) -> &ScanState {
        self.drain_outcomes();

        let paused = self.state.loop_paused();
        if let Tick::Decoded(payload) = self.frame_loop.tick(paused, self.camera.as_mut(), &self.decoder) {
            self.offer(payload);
        }
        &self.state
    }

    /// Manual fallback: decode one downscaled copy of the current frame.
    /// A hit goes through the same gate as the continuous loop.
    pub fn snapshot(&mut self) -> Option<DecodedPayload> {
        let frame = self.camera.as_mut()?.current_frame()?;
        let found = decode::snapshot_decode(&self.decoder, frame, self.options.snapshot_max_dim);
        match &found {
            Some(payload) => {
                info!(%payload, "snapshot decoded a code");
                self.offer(payload.clone());
            }
            None => debug!("snapshot found no code"),
        }
        found
    }

    fn offer(&mut self, payload: DecodedPayload) {
        if !self.state.accepts_payloads() {
            return;
        }
        if self.debounce.accept(&payload) {
            info!(%payload, "code accepted");
            self.apply(Event::Accepted(payload));
        }
    }

    fn drain_outcomes(&mut self) {
        while let Ok((epoch, outcome)) = self.outcomes_rx.try_recv() {
            if epoch != self.epoch {
                debug!(epoch, current = self.epoch, "discarding stale verification result");
                continue;
            }
            self.debounce.complete();
            self.apply(Event::Verified(outcome));
        }
    }

    /// Run one transition. Returns false if the event was ignored.
    fn apply(&mut self, event: Event) -> bool {
        let Some(t) = transition(&self.state, &event) else {
            debug!(state = self.state.label(), ?event, "event ignored");
            return false;
        };
        info!(from = self.state.label(), to = t.next.label(), "scan state");
        self.state = t.next;
        self.run_effects(t.effects);
        debug_assert!(self.camera.is_none() || self.state.holds_camera());
        true
    }

    fn run_effects(&mut self, effects: Effects) {
        if effects.discard_pending {
            self.epoch += 1;
        }
        if effects.cancel_loop {
            self.frame_loop.cancel();
        }
        if effects.release_camera {
            if let Some(mut camera) = self.camera.take() {
                camera.close();
            }
        }
        if effects.clear_dedup {
            self.debounce.reset();
        }
        if effects.arm_loop {
            self.frame_loop.arm();
        }
        if let Some(payload) = effects.submit {
            self.submit(payload);
        }
    }

    fn submit(&mut self, payload: DecodedPayload) {
        self.verifications += 1;
        self.last_code = Some(payload.clone());

        let verifier = Arc::clone(&self.verifier);
        let tx = self.outcomes_tx.clone();
        let epoch = self.epoch;
        self.runtime.spawn(async move {
            let outcome = verifier.verify(&payload).await;
            // The session may be gone; nobody to tell.
            let _ = tx.send((epoch, outcome));
        });
    }
}

impl<O, V, D> Drop for ScanSession<O, V, D>
where
    O: CameraOpener,
    V: Verifier,
    D: Decode,
{
    fn drop(&mut self) {
        if self.camera.is_some() || self.frame_loop.is_scheduled() {
            self.teardown();
        }
    }
}
