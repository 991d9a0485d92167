// Submission gate between the decode loop and the verifier.
//
// A payload is accepted at most once while it stays unchanged, and nothing is
// accepted while a verification is in flight. The last accepted value
// survives the verification; only `reset` forgets it.

use tracing::debug;

use crate::types::DecodedPayload;

#[derive(Debug, Default)]
pub struct Debounce {
    last_accepted: Option<DecodedPayload>,
    in_flight: bool,
}

impl Debounce {
    pub fn new() -> Self {
        Self::default()
    }

    /// True exactly when `payload` should be submitted now. Flips to in-flight.
    pub fn accept(&mut self, payload: &DecodedPayload) -> bool {
        if self.in_flight {
            debug!(%payload, "verification in flight; payload suppressed");
            return false;
        }
        if self.last_accepted.as_ref() == Some(payload) {
            return false;
        }
        self.last_accepted = Some(payload.clone());
        self.in_flight = true;
        true
    }

    /// The outstanding verification finished (any outcome).
    pub fn complete(&mut self) {
        self.in_flight = false;
    }

    /// Forget everything; the next payload, even a repeat, is accepted.
    pub fn reset(&mut self) {
        self.last_accepted = None;
        self.in_flight = false;
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn last_accepted(&self) -> Option<&DecodedPayload> {
        self.last_accepted.as_ref()
    }
}
