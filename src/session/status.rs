//! Shared view of the live session.
//!
//! The board is the only state besides the gate permit that requests
//! share. Status queries read it without touching the gate, and stop
//! requests find the running recording through it.

use super::state::SessionState;
use crate::capture::OperationKind;
use crate::error::{Result, ServiceError};
use crate::output::Artifact;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{watch, Notify};

/// Answer of a status query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RecordingState {
    Recording,
    NotRecording,
}

impl RecordingState {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordingState::Recording => "Recording",
            RecordingState::NotRecording => "Not Recording",
        }
    }
}

impl fmt::Display for RecordingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final result of a recording, published once.
pub type RecordingOutcome = Option<Result<Artifact>>;

/// Stop signal and outcome channel of one recording.
#[derive(Clone)]
pub struct RecordingControl {
    stop: Arc<Notify>,
    outcome: watch::Receiver<RecordingOutcome>,
}

impl RecordingControl {
    /// Creates a control and the sender its outcome is published on.
    pub fn channel() -> (Self, watch::Sender<RecordingOutcome>) {
        let (tx, rx) = watch::channel(None);
        (
            Self {
                stop: Arc::new(Notify::new()),
                outcome: rx,
            },
            tx,
        )
    }

    /// Asks the recording to stop; remembered if nobody is waiting yet.
    pub fn request_stop(&self) {
        self.stop.notify_one();
    }

    /// Resolves once a stop was requested.
    pub async fn stop_requested(&self) {
        self.stop.notified().await;
    }

    /// Waits for the recording to finish and returns its result.
    pub async fn outcome(mut self) -> Result<Artifact> {
        loop {
            if let Some(result) = self.outcome.borrow_and_update().clone() {
                return result;
            }
            if self.outcome.changed().await.is_err() {
                return self.outcome.borrow().clone().unwrap_or_else(|| {
                    Err(ServiceError::InvalidState(
                        "recording ended without a result".into(),
                    ))
                });
            }
        }
    }
}

struct SessionEntry {
    id: u64,
    kind: OperationKind,
    state: SessionState,
    control: Option<RecordingControl>,
    stop_requested: bool,
}

#[derive(Default)]
struct Board {
    current: Option<SessionEntry>,
    last_trace: Vec<SessionState>,
}

/// Lock-protected record of the live session.
#[derive(Default)]
pub struct StatusBoard {
    inner: Mutex<Board>,
    next_id: AtomicU64,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Board> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records a new session in `Idle` and returns its id.
    pub(crate) fn register(&self, kind: OperationKind, control: Option<RecordingControl>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let mut board = self.lock();
        if let Some(stale) = board.current.as_ref() {
            tracing::warn!(session = stale.id, "Replacing stale session entry");
        }
        board.current = Some(SessionEntry {
            id,
            kind,
            state: SessionState::Idle,
            control,
            stop_requested: false,
        });
        board.last_trace = vec![SessionState::Idle];
        id
    }

    pub(crate) fn update(&self, id: u64, state: SessionState) {
        let mut board = self.lock();
        let Board {
            current,
            last_trace,
        } = &mut *board;
        if let Some(entry) = current.as_mut().filter(|e| e.id == id) {
            entry.state = state;
            last_trace.push(state);
        }
    }

    /// Removes the session; a newer session's entry is left alone.
    pub(crate) fn clear(&self, id: u64) {
        let mut board = self.lock();
        if board.current.as_ref().is_some_and(|e| e.id == id) {
            board.current = None;
        }
    }

    /// Claims the stop of the running recording.
    ///
    /// Only one caller gets the control; anything but a recording in
    /// progress is an [`ServiceError::InvalidState`].
    pub(crate) fn begin_stop(&self) -> Result<RecordingControl> {
        let mut board = self.lock();
        let entry = board
            .current
            .as_mut()
            .ok_or_else(|| ServiceError::InvalidState("no recording in progress".into()))?;
        if entry.state != SessionState::Recording {
            return Err(ServiceError::InvalidState(format!(
                "cannot stop a {} session in state {}",
                entry.kind, entry.state
            )));
        }
        if entry.stop_requested {
            return Err(ServiceError::InvalidState("stop already requested".into()));
        }
        let control = entry
            .control
            .clone()
            .ok_or_else(|| ServiceError::InvalidState("session cannot be stopped".into()))?;
        entry.stop_requested = true;
        Ok(control)
    }

    /// Read-only probe of the recording state.
    pub fn query(&self) -> Result<RecordingState> {
        let board = self.lock();
        match board.current.as_ref() {
            None => Ok(RecordingState::NotRecording),
            Some(entry) if entry.state == SessionState::Error => Err(ServiceError::Device(
                crate::capture::CameraError::RecordFailed(format!(
                    "session {} faulted",
                    entry.id
                )),
            )),
            Some(entry) if entry.state.is_recording() => Ok(RecordingState::Recording),
            Some(_) => Ok(RecordingState::NotRecording),
        }
    }

    /// State of the live session, if any.
    pub fn current_state(&self) -> Option<SessionState> {
        self.lock().current.as_ref().map(|e| e.state)
    }

    /// States visited by the most recent session, oldest first.
    pub fn last_trace(&self) -> Vec<SessionState> {
        self.lock().last_trace.clone()
    }
}
