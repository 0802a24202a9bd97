//! Session states and the legal transitions between them.

use serde::Serialize;
use std::fmt;

/// Lifecycle state of a camera session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SessionState {
    Idle,
    Configuring,
    Capturing,
    Recording,
    Stopping,
    Error,
}

impl SessionState {
    /// Transition table. Error is terminal.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Configuring)
                | (Configuring, Capturing)
                | (Configuring, Recording)
                | (Capturing, Idle)
                | (Recording, Stopping)
                | (Stopping, Idle)
                | (Idle | Configuring | Capturing | Recording | Stopping, Error)
        )
    }

    /// Nothing leaves `Error`.
    pub fn is_terminal(self) -> bool {
        self == SessionState::Error
    }

    /// Whether the device is writing video in this state.
    pub fn is_recording(self) -> bool {
        matches!(self, SessionState::Recording | SessionState::Stopping)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Configuring => "configuring",
            SessionState::Capturing => "capturing",
            SessionState::Recording => "recording",
            SessionState::Stopping => "stopping",
            SessionState::Error => "error",
        };
        f.write_str(name)
    }
}
