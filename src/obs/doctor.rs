//! Connection doctor
//!
//! Watches connection-state notices and keeps a single reconnect deadline
//! for the engine's select loop. Armed on unexpected disconnects and
//! errors, cancelled by any other state and by shutdown.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::config::Settings;

use super::{ConnectionState, Notice};

#[derive(Debug, Default)]
pub struct ConnectionDoctor {
    deadline: Option<Instant>,
}

impl ConnectionDoctor {
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Called by the engine when the deadline fires, before reconnecting.
    pub fn clear(&mut self) {
        self.deadline = None;
    }

    pub fn handle_notice(&mut self, notice: &Notice, settings: &Settings, shutting_down: bool) {
        let Notice::ConnectionChanged { state, .. } = notice else {
            return;
        };

        match state {
            ConnectionState::Disconnected | ConnectionState::Error if !shutting_down => {
                let delay = Duration::from_secs(settings.obs.reconnect_delay_secs);
                debug!(?delay, "scheduling reconnect");
                self.deadline = Some(Instant::now() + delay);
            }
            _ => self.deadline = None,
        }
    }
}
