//! Scan session state machine.
//!
//! Every "event X in state Y" decision lives in [`transition`]. It is pure:
//! the controller applies the returned [`Effects`] and swaps in the new state.

use serde_json::Value;

use crate::error::{CameraError, ScanError};
use crate::types::DecodedPayload;
use crate::verify::VerificationOutcome;

/// Terminal-for-display result of a verification.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Validated(Value),
    NotFound(Option<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScanState {
    Idle,
    AcquiringCamera,
    Scanning { paused: bool },
    Verifying,
    Done(Verdict),
    Errored(ScanError),
}

impl ScanState {
    /// May the decode loop hand payloads to the dedup gate in this state?
    pub fn accepts_payloads(&self) -> bool {
        matches!(self, ScanState::Scanning { paused: false })
    }

    /// Whether the loop should skip work this tick.
    pub fn loop_paused(&self) -> bool {
        matches!(self, ScanState::Scanning { paused: true })
    }

    /// States in which a camera may be held.
    pub fn holds_camera(&self) -> bool {
        matches!(
            self,
            ScanState::AcquiringCamera | ScanState::Scanning { .. } | ScanState::Verifying | ScanState::Done(_)
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            ScanState::Idle => "idle",
            ScanState::AcquiringCamera => "acquiring-camera",
            ScanState::Scanning { paused: false } => "scanning",
            ScanState::Scanning { paused: true } => "paused",
            ScanState::Verifying => "verifying",
            ScanState::Done(_) => "done",
            ScanState::Errored(_) => "errored",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// User gesture: open the camera and begin scanning.
    Start,
    CameraOpened,
    CameraFailed(CameraError),
    Pause,
    Resume,
    /// The dedup gate let a payload through.
    Accepted(DecodedPayload),
    Verified(VerificationOutcome),
    /// Back to scanning from a finished verification, camera kept live.
    Rescan,
    /// Explicit reset: full teardown to idle.
    Reset,
    /// Owner went away (navigation, window closed).
    Teardown,
}

/// Side effects the controller must carry out for a transition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Effects {
    pub acquire_camera: bool,
    pub release_camera: bool,
    pub arm_loop: bool,
    pub cancel_loop: bool,
    /// Forget the last accepted payload and the in-flight flag.
    pub clear_dedup: bool,
    /// Drop any verification response that is still on its way.
    pub discard_pending: bool,
    pub submit: Option<DecodedPayload>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub next: ScanState,
    pub effects: Effects,
}

fn to(next: ScanState, effects: Effects) -> Option<Transition> {
    Some(Transition { next, effects })
}

fn teardown() -> Effects {
    Effects {
        release_camera: true,
        cancel_loop: true,
        clear_dedup: true,
        discard_pending: true,
        ..Effects::default()
    }
}

/// The transition table. `None` means the event is ignored in this state.
pub fn transition(state: &ScanState, event: &Event) -> Option<Transition> {
    use ScanState as S;

    match (state, event) {
        (_, Event::Reset | Event::Teardown) => to(S::Idle, teardown()),

        (S::Idle, Event::Start) => to(
            S::AcquiringCamera,
            Effects { acquire_camera: true, ..Effects::default() },
        ),

        (S::AcquiringCamera, Event::CameraOpened) => to(
            S::Scanning { paused: false },
            Effects { arm_loop: true, ..Effects::default() },
        ),
        (S::AcquiringCamera, Event::CameraFailed(err)) => to(
            S::Errored(ScanError::Camera(err.clone())),
            Effects { release_camera: true, cancel_loop: true, ..Effects::default() },
        ),

        (S::Scanning { paused: false }, Event::Pause) => to(S::Scanning { paused: true }, Effects::default()),
        (S::Scanning { paused: true }, Event::Resume) => to(S::Scanning { paused: false }, Effects::default()),

        (S::Scanning { paused: false }, Event::Accepted(payload)) => to(
            S::Verifying,
            Effects { submit: Some(payload.clone()), ..Effects::default() },
        ),

        (S::Verifying, Event::Verified(outcome)) => match outcome {
            VerificationOutcome::Validated { data } => to(S::Done(Verdict::Validated(data.clone())), Effects::default()),
            VerificationOutcome::NotFound { message } => to(S::Done(Verdict::NotFound(message.clone())), Effects::default()),
            VerificationOutcome::Failed { reason } => to(
                S::Errored(ScanError::Verification(reason.clone())),
                Effects { release_camera: true, cancel_loop: true, ..Effects::default() },
            ),
        },

        (S::Done(_), Event::Rescan) => to(
            S::Scanning { paused: false },
            Effects { clear_dedup: true, ..Effects::default() },
        ),

        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn next(state: ScanState, event: Event) -> ScanState {
        transition(&state, &event).map(|t| t.next).unwrap_or(state)
    }

    #[test]
    fn happy_path_reaches_done() {
        let mut s = ScanState::Idle;
        for e in [Event::Start, Event::CameraOpened, Event::Accepted("T1".into())] {
            s = next(s, e);
        }
        assert_eq!(s, ScanState::Verifying);
        let data = json!({"objectId": "X"});
        s = next(s, Event::Verified(VerificationOutcome::Validated { data: data.clone() }));
        assert_eq!(s, ScanState::Done(Verdict::Validated(data)));
    }

    #[test]
    fn camera_failure_errors_without_arming_the_loop() {
        let t = transition(
            &ScanState::AcquiringCamera,
            &Event::CameraFailed(CameraError::PermissionDenied("no".into())),
        )
        .unwrap();
        assert!(matches!(t.next, ScanState::Errored(ScanError::Camera(CameraError::PermissionDenied(_)))));
        assert!(!t.effects.arm_loop);
        assert!(t.effects.release_camera);
    }

    #[test]
    fn not_found_is_done_and_failure_is_errored() {
        let nf = next(ScanState::Verifying, Event::Verified(VerificationOutcome::NotFound { message: None }));
        assert_eq!(nf, ScanState::Done(Verdict::NotFound(None)));

        let t = transition(
            &ScanState::Verifying,
            &Event::Verified(VerificationOutcome::Failed { reason: "502".into() }),
        )
        .unwrap();
        assert_eq!(t.next, ScanState::Errored(ScanError::Verification("502".into())));
        assert!(t.effects.release_camera);
    }

    #[test]
    fn paused_scanning_does_not_accept() {
        let paused = ScanState::Scanning { paused: true };
        assert!(transition(&paused, &Event::Accepted("T1".into())).is_none());
        assert!(!paused.accepts_payloads());
        assert!(paused.loop_paused());
        assert_eq!(next(paused, Event::Resume), ScanState::Scanning { paused: false });
    }

    #[test]
    fn terminal_states_leave_only_by_reset_or_rescan() {
        let done = ScanState::Done(Verdict::NotFound(None));
        for e in [Event::Start, Event::Pause, Event::Accepted("T2".into()), Event::CameraOpened] {
            assert!(transition(&done, &e).is_none(), "{e:?}");
        }
        let errored = ScanState::Errored(ScanError::Verification("x".into()));
        assert!(transition(&errored, &Event::Start).is_none());
        assert!(transition(&errored, &Event::Rescan).is_none());
        assert_eq!(next(errored, Event::Reset), ScanState::Idle);
    }

    #[test]
    fn reset_tears_everything_down_from_any_state() {
        for s in [
            ScanState::Idle,
            ScanState::AcquiringCamera,
            ScanState::Scanning { paused: true },
            ScanState::Verifying,
            ScanState::Done(Verdict::Validated(json!(null))),
        ] {
            let t = transition(&s, &Event::Teardown).unwrap();
            assert_eq!(t.next, ScanState::Idle);
            assert_eq!(t.effects, teardown());
        }
    }

    #[test]
    fn verification_result_outside_verifying_is_ignored() {
        let s = ScanState::Idle;
        assert!(transition(&s, &Event::Verified(VerificationOutcome::NotFound { message: None })).is_none());
    }
}
