use crate::foundation::error::{MergeError, MergeResult};
use std::fmt;

/// Lifecycle of a [`super::composite::CompositeSession`].
///
/// ```text
/// Idle -> Priming -> Recording -> Finalizing -> Done
///   \________\___________\____________\-------> Failed
///                                      \------> Cancelled
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SessionState {
    /// Constructed, nothing acquired.
    Idle,
    /// Acquiring the surface, codec, recorder and playback.
    Priming,
    /// Audio is playing and the combined stream is being recorded.
    Recording,
    /// Recorder and draw loop are being stopped.
    Finalizing,
    /// Artifact produced.
    Done,
    /// Session ended with an error.
    Failed,
    /// Caller aborted; no artifact.
    Cancelled,
}

impl SessionState {
    /// `true` for states a session never leaves.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Cancelled)
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Idle, Priming) | (Priming, Recording) | (Recording, Finalizing) => true,
            // Aborts jump straight to finalizing from any earlier state.
            (Idle | Priming, Finalizing) => true,
            (Finalizing, Done | Cancelled) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Validated state holder that records every state it passed through.
#[derive(Clone, Debug)]
pub struct StateMachine {
    history: Vec<SessionState>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// Machine in [`SessionState::Idle`].
    pub fn new() -> Self {
        Self {
            history: vec![SessionState::Idle],
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.history
            .last()
            .copied()
            .unwrap_or(SessionState::Idle)
    }

    /// Every state entered so far, starting with `Idle`.
    pub fn history(&self) -> &[SessionState] {
        &self.history
    }

    /// Move to `next`, returning the previous state.
    pub fn transition(&mut self, next: SessionState) -> MergeResult<SessionState> {
        let from = self.state();
        if !from.can_transition_to(next) {
            return Err(MergeError::validation(format!(
                "illegal session transition {from} -> {next}"
            )));
        }
        self.history.push(next);
        Ok(from)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/state.rs"]
mod tests;
