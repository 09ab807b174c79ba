//! Time-lapse recording state machine.
//!
//! A pure state machine with no I/O and no clock of its own: the capture loop
//! passes in a monotonic timestamp in milliseconds and acts on the returned
//! [`RecordingEvent`].
//!
//! ```text
//!                 motion_detected()
//!        ┌──────┐ ───────────────► ┌───────────┐
//!        │ Idle │                  │ Recording │ ──tick()──► Snap (interval elapsed)
//!        └──────┘ ◄─────────────── └───────────┘
//!             tick(): duration elapsed
//!             force_idle(): monitoring disabled
//! ```
//!
//! Both elapsed checks are strict: a session of 10 s with snaps every 0.5 s
//! takes its last snap at some time `t <= 10 s` and ends on the first tick
//! after `t > 10 s`.

use serde::Serialize;

// =============================================================================
// Recording State
// =============================================================================

/// Bookkeeping of one running time-lapse session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecordingSession {
    /// When the session was started by a motion event
    pub start_ms: u64,
    /// When the most recent capture of this session was taken
    pub last_capture_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordingState {
    #[default]
    Idle,
    Recording(RecordingSession),
}

impl RecordingState {
    pub fn is_recording(&self) -> bool {
        matches!(self, RecordingState::Recording(_))
    }
}

impl std::fmt::Display for RecordingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordingState::Idle => write!(f, "Idle"),
            RecordingState::Recording(_) => write!(f, "Recording"),
        }
    }
}

/// What the caller has to do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingEvent {
    /// Session opened, take the first capture now
    Started,
    /// Interval elapsed, take a capture now
    Snap,
    /// Session closed, nothing to capture
    Finished,
}

impl RecordingEvent {
    pub fn wants_capture(&self) -> bool {
        matches!(self, RecordingEvent::Started | RecordingEvent::Snap)
    }
}

// =============================================================================
// Recording Machine
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct RecordingMachine {
    state: RecordingState,
    sessions_started: u64,
}

impl RecordingMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state.is_recording()
    }

    /// Number of sessions opened since construction.
    pub fn sessions_started(&self) -> u64 {
        self.sessions_started
    }

    /// Report a motion detection.
    ///
    /// Opens a session when idle. While recording, motion is ignored: a
    /// session always runs for its full duration and is never extended.
    pub fn motion_detected(&mut self, current_time_ms: u64) -> Option<RecordingEvent> {
        match self.state {
            RecordingState::Idle => {
                self.state = RecordingState::Recording(RecordingSession {
                    start_ms: current_time_ms,
                    last_capture_ms: current_time_ms,
                });
                self.sessions_started += 1;
                Some(RecordingEvent::Started)
            }
            RecordingState::Recording(_) => None,
        }
    }

    /// Advance a running session.
    ///
    /// The duration check comes first, so no capture is ever taken after
    /// the session has run out.
    pub fn tick(
        &mut self,
        current_time_ms: u64,
        duration_ms: u64,
        interval_ms: u64,
    ) -> Option<RecordingEvent> {
        let RecordingState::Recording(session) = &mut self.state else {
            return None;
        };

        if current_time_ms.saturating_sub(session.start_ms) > duration_ms {
            self.state = RecordingState::Idle;
            return Some(RecordingEvent::Finished);
        }
        if current_time_ms.saturating_sub(session.last_capture_ms) > interval_ms {
            session.last_capture_ms = current_time_ms;
            return Some(RecordingEvent::Snap);
        }
        None
    }

    /// Abandon any running session. Returns true if one was running.
    pub fn force_idle(&mut self) -> bool {
        let was_recording = self.is_recording();
        self.state = RecordingState::Idle;
        was_recording
    }
}
