//! Preset switching machine
//!
//! Reconciles the attached displays with the configured presets by
//! driving OBS through the only safe order: stop the recording, switch
//! the profile, switch the scene collection, start the recording again.
//! Triggers are debounced through a re-armable recheck deadline so a
//! burst of display events causes a single pass. Every step is confirmed
//! by a mirror notice before the next one is issued; any error or
//! disconnect aborts the sequence back to idle and a later recheck
//! starts over from scratch.

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::obs::{Connection, ConnectionState, Notice, Notices, RecordingState};
use crate::preset::Preset;

/// OBS needs a moment after the stop confirmation before it accepts a
/// profile switch without glitching.
const SETTLE_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    StoppingRecording,
    ChangingProfile,
    ChangingSceneCollection,
    StartingRecording,
}

pub struct PresetSwitch {
    phase: Phase,
    target: Option<Preset>,
    recheck_at: Option<Instant>,
}

impl Default for PresetSwitch {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            target: None,
            recheck_at: None,
        }
    }
}

impl PresetSwitch {
    pub fn recheck_deadline(&self) -> Option<Instant> {
        self.recheck_at
    }

    pub async fn handle_notice(
        &mut self,
        notice: &Notice,
        conn: &mut Connection,
        settings: &Settings,
        out: &mut Notices,
    ) {
        match notice {
            Notice::DisplayListChanged | Notice::PresetListChanged => self.arm_recheck(settings),

            Notice::ConnectionChanged { state, .. } => match state {
                ConnectionState::Connected => self.arm_recheck(settings),
                ConnectionState::Disconnected | ConnectionState::ShuttingDown => {
                    self.reset("connection gone");
                }
                ConnectionState::Connecting | ConnectionState::Error => {}
            },

            Notice::Error(_) => {
                self.reset("OBS error");
                self.arm_recheck(settings);
            }

            Notice::RecordingChanged(state) => match (self.phase, state) {
                (_, RecordingState::Unknown) => self.reset("recording state unknown"),
                (Phase::StoppingRecording, RecordingState::Stopped) => {
                    self.phase = Phase::ChangingProfile;
                    self.advance(conn, out).await;
                }
                (Phase::StartingRecording, RecordingState::Active) => {
                    self.advance(conn, out).await;
                }
                _ => {}
            },

            Notice::ProfileActiveChanged(Some(name)) => {
                let wanted = self
                    .target
                    .as_ref()
                    .is_some_and(|target| &target.profile == name);
                if self.phase == Phase::ChangingProfile && wanted {
                    self.phase = Phase::ChangingSceneCollection;
                    self.advance(conn, out).await;
                }
            }

            Notice::SceneCollectionActiveChanged(Some(name)) => {
                let wanted = self
                    .target
                    .as_ref()
                    .is_some_and(|target| &target.scene_collection == name);
                if self.phase == Phase::ChangingSceneCollection && wanted {
                    self.phase = Phase::StartingRecording;
                    self.advance(conn, out).await;
                }
            }

            _ => {}
        }
    }

    /// The debounce deadline fired: decide what, if anything, to do for
    /// the current display configuration and kick the sequence off.
    pub async fn on_recheck(
        &mut self,
        displays: &[String],
        conn: &mut Connection,
        settings: &Settings,
        out: &mut Notices,
    ) {
        self.recheck_at = None;

        let Some(preset) = settings.presets.find_matching(displays) else {
            debug!(?displays, "no preset matches the attached displays");
            self.reset("no matching preset");
            return;
        };
        let preset = preset.clone();

        let profile_ok = conn.profiles.active() == Some(preset.profile.as_str());
        let collection_ok =
            conn.scene_collections.active() == Some(preset.scene_collection.as_str());

        if profile_ok && collection_ok {
            info!(preset = preset.name, "preset already active");
            self.phase = Phase::Idle;
            self.target = None;
            out.push(Notice::PresetActivated(preset));
            return;
        }

        info!(
            preset = preset.name,
            profile = preset.profile,
            scene_collection = preset.scene_collection,
            "switching preset"
        );
        self.target = Some(preset);

        if profile_ok {
            // Only the scene collection is off; advance skips ahead.
            self.phase = Phase::ChangingProfile;
            self.advance(conn, out).await;
            return;
        }

        self.phase = Phase::StoppingRecording;
        if conn.recording.state() == RecordingState::Stopped {
            self.phase = Phase::ChangingProfile;
            self.advance(conn, out).await;
        } else if !conn.stop_recording(out).await {
            self.reset("stop request failed");
        }
    }

    /// Single transition function for both confirmed progress and
    /// skip-ahead: each phase first checks whether its goal already
    /// holds and falls through to the next one, otherwise it issues the
    /// one request for this phase and waits for the confirming notice.
    async fn advance(&mut self, conn: &mut Connection, out: &mut Notices) {
        loop {
            let Some(target) = self.target.clone() else {
                self.phase = Phase::Idle;
                return;
            };

            match self.phase {
                Phase::ChangingProfile => {
                    if conn.profiles.active() == Some(target.profile.as_str()) {
                        self.phase = Phase::ChangingSceneCollection;
                        continue;
                    }
                    sleep(SETTLE_DELAY).await;
                    if !conn.set_profile(&target.profile, out).await {
                        self.reset("profile switch failed");
                    }
                    return;
                }

                Phase::ChangingSceneCollection => {
                    if conn.scene_collections.active() == Some(target.scene_collection.as_str()) {
                        self.phase = Phase::StartingRecording;
                        continue;
                    }
                    if !conn.set_scene_collection(&target.scene_collection, out).await {
                        self.reset("scene collection switch failed");
                    }
                    return;
                }

                Phase::StartingRecording => {
                    if conn.recording.state() == RecordingState::Active {
                        info!(preset = target.name, "preset activated");
                        self.phase = Phase::Idle;
                        self.target = None;
                        out.push(Notice::PresetActivated(target));
                        return;
                    }
                    if !conn.start_recording(out).await {
                        self.reset("start request failed");
                    }
                    return;
                }

                Phase::Idle | Phase::StoppingRecording => return,
            }
        }
    }

    fn arm_recheck(&mut self, settings: &Settings) {
        let grace = Duration::from_secs(settings.obs.grace_period_secs);
        debug!(?grace, "preset recheck (re)armed");
        self.recheck_at = Some(Instant::now() + grace);
    }

    fn reset(&mut self, reason: &str) {
        if self.phase != Phase::Idle {
            warn!(phase = ?self.phase, reason, "aborting preset switch");
        }
        self.phase = Phase::Idle;
        self.target = None;
    }
}
