//! Screen-capture repair after a recording resume
//!
//! macOS screen-capture inputs come back frozen after a pause/resume
//! cycle; toggling any of their settings forces the capture pipeline to
//! restart. A configured delay after each pause→active edge, every
//! screen-capture input gets its cursor flag flipped off and back on,
//! one input at a time, each write confirmed through the settings-changed
//! notice before the next one goes out.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Settings;
use crate::obs::api::SettingsMap;
use crate::obs::{Connection, ConnectionState, Notice, Notices, RecordingState};

const SCREEN_CAPTURE_KIND: &str = "screen_capture";
const SHOW_CURSOR: &str = "show_cursor";

#[derive(Debug, Default)]
pub struct FixInputs {
    previous: RecordingState,
    deadline: Option<Instant>,
    /// Screen-capture inputs still waiting for their toggle cycle
    queue: VecDeque<Uuid>,
    fixing: bool,
}

impl FixInputs {
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub async fn handle_notice(
        &mut self,
        notice: &Notice,
        conn: &mut Connection,
        settings: &Settings,
        out: &mut Notices,
    ) {
        match notice {
            Notice::RecordingChanged(state) => {
                let previous = self.previous;
                self.previous = *state;
                if previous == RecordingState::Paused && *state == RecordingState::Active {
                    self.schedule(settings);
                } else {
                    self.cancel("recording state changed");
                }
            }

            Notice::InputListChanged => {
                // The snapshot is stale; start over with a fresh one.
                if self.fixing {
                    self.cancel("input list changed mid-fix");
                    self.schedule(settings);
                }
            }

            Notice::InputSettingsChanged { .. } => {
                if self.fixing {
                    self.check_head(conn, out).await;
                }
            }

            Notice::ConnectionChanged { state, .. } if *state != ConnectionState::Connected => {
                self.cancel("connection gone");
            }

            _ => {}
        }
    }

    /// The repair delay elapsed: snapshot the screen captures and start
    /// the first toggle cycle.
    pub async fn on_deadline(&mut self, conn: &mut Connection, out: &mut Notices) {
        self.deadline = None;
        self.queue = conn
            .inputs
            .records()
            .iter()
            .filter(|record| record.kind == SCREEN_CAPTURE_KIND)
            .map(|record| record.uuid)
            .collect();

        if self.queue.is_empty() {
            debug!("no screen-capture inputs to repair");
            return;
        }

        info!(count = self.queue.len(), "repairing screen-capture inputs");
        self.fixing = true;
        self.fix_head(conn, out).await;
    }

    /// Toggle the cursor flag off on the queue head, skipping inputs that
    /// vanished since the snapshot.
    async fn fix_head(&mut self, conn: &mut Connection, out: &mut Notices) {
        loop {
            let Some(&head) = self.queue.front() else {
                info!("screen-capture repair finished");
                self.fixing = false;
                return;
            };
            let Some(record) = conn.inputs.get(&head) else {
                self.queue.pop_front();
                continue;
            };
            let name = record.name.clone();
            debug!(input = name, "hiding cursor to restart the capture");
            if !conn.set_input_settings(&name, &show_cursor(false), out).await {
                self.cancel("settings request failed");
            }
            return;
        }
    }

    /// A settings change landed somewhere; see how far along the head's
    /// toggle cycle is.
    async fn check_head(&mut self, conn: &mut Connection, out: &mut Notices) {
        let Some(&head) = self.queue.front() else {
            self.fixing = false;
            return;
        };
        let Some(record) = conn.inputs.get(&head) else {
            self.queue.pop_front();
            self.fix_head(conn, out).await;
            return;
        };

        let cursor_shown = record
            .settings
            .get(SHOW_CURSOR)
            .and_then(|v| v.as_bool())
            .unwrap_or(true);

        if cursor_shown {
            // The restore landed; this input is done.
            debug!(input = record.name, "capture restarted");
            self.queue.pop_front();
            self.fix_head(conn, out).await;
        } else {
            // Our hide landed; put the cursor back.
            let name = record.name.clone();
            if !conn.set_input_settings(&name, &show_cursor(true), out).await {
                self.cancel("settings request failed");
            }
        }
    }

    fn schedule(&mut self, settings: &Settings) {
        let delay = Duration::from_secs(settings.helper.fix_inputs_delay_secs);
        debug!(?delay, "scheduling screen-capture repair");
        self.queue.clear();
        self.fixing = false;
        self.deadline = Some(Instant::now() + delay);
    }

    fn cancel(&mut self, reason: &str) {
        if self.deadline.is_some() || self.fixing {
            warn!(reason, "cancelling screen-capture repair");
        }
        self.deadline = None;
        self.queue.clear();
        self.fixing = false;
    }
}

fn show_cursor(shown: bool) -> SettingsMap {
    let mut settings = SettingsMap::new();
    settings.insert(SHOW_CURSOR.to_string(), serde_json::json!(shown));
    settings
}
