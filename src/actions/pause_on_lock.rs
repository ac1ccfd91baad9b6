//! Pause the recording while the screen is locked
//!
//! Lock and unlock edges arrive from the platform watcher; the pause and
//! resume are confirmed by recording-state notices. Any recording state
//! that contradicts what we are waiting for means somebody else took over
//! the output, so the machine steps aside instead of fighting them.

use tracing::{debug, warn};

use crate::obs::{Connection, Notice, Notices, RecordingState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Phase {
    #[default]
    Idle,
    WaitingForPause,
    WaitingForResume,
}

#[derive(Debug, Default)]
pub struct PauseOnLock {
    phase: Phase,
}

impl PauseOnLock {
    pub async fn handle_notice(
        &mut self,
        notice: &Notice,
        conn: &mut Connection,
        out: &mut Notices,
    ) {
        match notice {
            Notice::ScreenLocked => {
                if conn.recording.state() == RecordingState::Paused {
                    debug!("screen locked, recording already paused");
                    return;
                }
                debug!("screen locked, pausing recording");
                self.phase = Phase::WaitingForPause;
                if !conn.pause_recording(out).await {
                    self.phase = Phase::Idle;
                }
            }

            Notice::ScreenUnlocked => {
                if conn.recording.state() == RecordingState::Active {
                    debug!("screen unlocked, recording already active");
                    return;
                }
                debug!("screen unlocked, resuming recording");
                self.phase = Phase::WaitingForResume;
                if !conn.resume_recording(out).await {
                    self.phase = Phase::Idle;
                }
            }

            Notice::RecordingChanged(state) => match (self.phase, state) {
                (Phase::Idle, _) => {}
                (Phase::WaitingForPause, RecordingState::Paused) => self.phase = Phase::Idle,
                (Phase::WaitingForResume, RecordingState::Active) => self.phase = Phase::Idle,
                (
                    _,
                    RecordingState::Stopped
                    | RecordingState::Starting
                    | RecordingState::Stopping
                    | RecordingState::Unknown,
                ) => {
                    warn!(phase = ?self.phase, state = ?state, "recording left our hands, standing down");
                    self.phase = Phase::Idle;
                }
                _ => {}
            },

            _ => {}
        }
    }
}
