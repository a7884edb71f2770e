//! # Session State Machine
//!
//! Tracks the recording-active flag for one connection and hands out
//! fragment sequence numbers. Control messages drive the two-state machine;
//! the ingestion path reads (never writes) the flag to decide whether a
//! fragment enters the window.
//!
//! ## Session Lifecycle:
//! 1. **Idle**: initial state, media is acknowledged but not buffered
//! 2. **Recording**: media is decoded and windowed
//! 3. Disconnect drops the session with its connection — state resets by
//!    construction, there is no terminal state.

use std::fmt;
use tracing::debug;

/// Control token that switches the session into `Recording`.
pub const RECORD_START: &str = "RECORD START";

/// Control token that switches the session back to `Idle`.
pub const RECORD_STOP: &str = "RECORD STOP";

/// Recording-active flag for one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not recording; media is not buffered.
    Idle,
    /// Actively recording; media flows into the window.
    Recording,
}

impl SessionState {
    /// Status string for wire messages and the metrics surface.
    pub fn as_str(&self) -> &str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Recording => "recording",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a control token did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOutcome {
    /// Entered (or re-asserted) `Recording`.
    Started,
    /// Entered (or re-asserted) `Idle`.
    Stopped,
    /// Unrecognized token; state unchanged. Never an error.
    Ignored,
}

/// Per-connection session: the state flag plus a monotonic fragment counter.
#[derive(Debug)]
pub struct RecordingSession {
    state: SessionState,
    fragments_seen: u64,
}

impl RecordingSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            fragments_seen: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == SessionState::Recording
    }

    /// Apply one control token.
    ///
    /// Exactly `"RECORD START"` and `"RECORD STOP"` transition the machine;
    /// both are idempotent when already in the target state. Any other token
    /// is a logged no-op.
    pub fn apply_control(&mut self, token: &str) -> ControlOutcome {
        match token {
            RECORD_START => {
                self.state = SessionState::Recording;
                ControlOutcome::Started
            }
            RECORD_STOP => {
                self.state = SessionState::Idle;
                ControlOutcome::Stopped
            }
            other => {
                debug!(token = %other, "ignoring unrecognized control token");
                ControlOutcome::Ignored
            }
        }
    }

    /// Advance the fragment counter and return the index for the next
    /// accepted fragment.
    pub fn next_seq(&mut self) -> u64 {
        let seq = self.fragments_seen;
        self.fragments_seen += 1;
        seq
    }

    /// Total fragments accepted so far.
    pub fn fragments_seen(&self) -> u64 {
        self.fragments_seen
    }
}

impl Default for RecordingSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_idle() {
        let session = RecordingSession::new();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(!session.is_recording());
    }

    #[test]
    fn test_start_stop_transitions() {
        let mut session = RecordingSession::new();

        assert_eq!(session.apply_control(RECORD_START), ControlOutcome::Started);
        assert!(session.is_recording());

        assert_eq!(session.apply_control(RECORD_STOP), ControlOutcome::Stopped);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_transitions_are_idempotent() {
        let mut session = RecordingSession::new();
        session.apply_control(RECORD_START);
        assert_eq!(session.apply_control(RECORD_START), ControlOutcome::Started);
        assert!(session.is_recording());

        session.apply_control(RECORD_STOP);
        assert_eq!(session.apply_control(RECORD_STOP), ControlOutcome::Stopped);
        assert!(!session.is_recording());
    }

    #[test]
    fn test_unknown_tokens_are_noops() {
        let mut session = RecordingSession::new();
        assert_eq!(session.apply_control("RECORD PAUSE"), ControlOutcome::Ignored);
        assert_eq!(session.state(), SessionState::Idle);

        session.apply_control(RECORD_START);
        assert_eq!(session.apply_control("hello"), ControlOutcome::Ignored);
        assert!(session.is_recording(), "unknown token must not change state");
    }

    #[test]
    fn test_stop_then_start_ends_recording() {
        let mut session = RecordingSession::new();
        session.apply_control(RECORD_START);
        session.apply_control(RECORD_STOP);
        session.apply_control(RECORD_START);
        assert_eq!(session.state(), SessionState::Recording);
    }

    #[test]
    fn test_seq_advances_monotonically() {
        let mut session = RecordingSession::new();
        assert_eq!(session.next_seq(), 0);
        assert_eq!(session.next_seq(), 1);
        assert_eq!(session.next_seq(), 2);
        assert_eq!(session.fragments_seen(), 3);
    }
}
