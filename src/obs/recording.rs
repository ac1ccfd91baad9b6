//! Recording state mirror
//!
//! Tracks the remote record output. The status poll only resolves the
//! three steady states; the transient starting/stopping phases are only
//! visible through events. Operations are idempotent: asking for a state
//! the output is already in (or cannot leave) succeeds without issuing a
//! request, so a second caller never double-toggles the output.

use anyhow::{Context, Result};
use tracing::debug;

use super::api::{ObsApi, OutputSignal};
use super::{Notice, Notices};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordingState {
    #[default]
    Unknown,
    Stopped,
    Starting,
    Active,
    Stopping,
    Paused,
}

#[derive(Debug, Default)]
pub struct Recording {
    state: RecordingState,
}

impl Recording {
    pub fn state(&self) -> RecordingState {
        self.state
    }

    fn set_state(&mut self, state: RecordingState, out: &mut Notices) {
        if self.state == state {
            return;
        }
        debug!(from = ?self.state, to = ?state, "recording state changed");
        self.state = state;
        out.push(Notice::RecordingChanged(state));
    }

    pub async fn fetch(&mut self, client: &dyn ObsApi, out: &mut Notices) -> Result<()> {
        let status = client.record_status().await?;
        let state = if status.paused {
            RecordingState::Paused
        } else if status.active {
            RecordingState::Active
        } else {
            RecordingState::Stopped
        };
        self.set_state(state, out);
        Ok(())
    }

    pub fn apply_signal(&mut self, signal: OutputSignal, out: &mut Notices) {
        let state = match signal {
            OutputSignal::Starting => RecordingState::Starting,
            OutputSignal::Started => RecordingState::Active,
            OutputSignal::Stopping => RecordingState::Stopping,
            OutputSignal::Stopped => RecordingState::Stopped,
            OutputSignal::Paused => RecordingState::Paused,
            OutputSignal::Resumed => RecordingState::Active,
            OutputSignal::Unknown => RecordingState::Unknown,
        };
        self.set_state(state, out);
    }

    pub fn reset(&mut self, out: &mut Notices) {
        self.set_state(RecordingState::Unknown, out);
    }

    /// Pause only applies to an actively recording output; anything else
    /// is a no-op success.
    pub async fn pause(&self, client: Option<&dyn ObsApi>) -> Result<()> {
        if self.state != RecordingState::Active {
            debug!(state = ?self.state, "not recording, skipping pause");
            return Ok(());
        }
        let client = client.context("not connected")?;
        client.pause_record().await
    }

    pub async fn resume(&self, client: Option<&dyn ObsApi>) -> Result<()> {
        if self.state != RecordingState::Paused {
            debug!(state = ?self.state, "not paused, skipping resume");
            return Ok(());
        }
        let client = client.context("not connected")?;
        client.resume_record().await
    }

    /// Start the output. Already active is a no-op success; a paused
    /// output is resumed instead of restarted.
    pub async fn start(&self, client: Option<&dyn ObsApi>) -> Result<()> {
        match self.state {
            RecordingState::Active => {
                debug!("already recording, skipping start");
                Ok(())
            }
            RecordingState::Paused => self.resume(client).await,
            _ => {
                let client = client.context("not connected")?;
                client.start_record().await
            }
        }
    }

    pub async fn stop(&self, client: Option<&dyn ObsApi>) -> Result<()> {
        if !matches!(self.state, RecordingState::Active | RecordingState::Paused) {
            debug!(state = ?self.state, "not recording, skipping stop");
            return Ok(());
        }
        let client = client.context("not connected")?;
        client.stop_record().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obs::api::testing::{FakeHandle, Request};

    fn recording_in(state: RecordingState) -> Recording {
        let mut recording = Recording::default();
        recording.state = state;
        recording
    }

    #[tokio::test]
    async fn fetch_resolves_steady_states() {
        let handle = FakeHandle::default();
        let client = handle.client();
        let mut recording = Recording::default();
        let mut out = Notices::new();

        handle.set_recording(true, false);
        recording.fetch(&client, &mut out).await.unwrap();
        assert_eq!(recording.state(), RecordingState::Active);

        handle.set_recording(true, true);
        recording.fetch(&client, &mut out).await.unwrap();
        assert_eq!(recording.state(), RecordingState::Paused);

        handle.set_recording(false, false);
        recording.fetch(&client, &mut out).await.unwrap();
        assert_eq!(recording.state(), RecordingState::Stopped);
        assert_eq!(out.len(), 3);
    }

    #[tokio::test]
    async fn state_changes_are_only_notified_on_difference() {
        let mut recording = Recording::default();
        let mut out = Notices::new();

        recording.apply_signal(OutputSignal::Started, &mut out);
        recording.apply_signal(OutputSignal::Started, &mut out);
        assert_eq!(out.len(), 1);

        recording.apply_signal(OutputSignal::Resumed, &mut out);
        assert_eq!(out.len(), 1, "resumed maps to the already-active state");

        recording.apply_signal(OutputSignal::Paused, &mut out);
        assert_eq!(out.len(), 2);
    }

    #[tokio::test]
    async fn pause_is_a_noop_unless_active() {
        let handle = FakeHandle::default();
        let client = handle.client();

        recording_in(RecordingState::Stopped)
            .pause(Some(&client))
            .await
            .unwrap();
        recording_in(RecordingState::Paused)
            .pause(Some(&client))
            .await
            .unwrap();
        assert!(handle.requests().is_empty());

        recording_in(RecordingState::Active)
            .pause(Some(&client))
            .await
            .unwrap();
        assert_eq!(handle.requests(), vec![Request::PauseRecord]);
    }

    #[tokio::test]
    async fn start_resumes_a_paused_output() {
        let handle = FakeHandle::default();
        let client = handle.client();

        recording_in(RecordingState::Active)
            .start(Some(&client))
            .await
            .unwrap();
        assert!(handle.requests().is_empty());

        recording_in(RecordingState::Paused)
            .start(Some(&client))
            .await
            .unwrap();
        assert_eq!(handle.requests(), vec![Request::ResumeRecord]);

        handle.clear_requests();
        recording_in(RecordingState::Stopped)
            .start(Some(&client))
            .await
            .unwrap();
        assert_eq!(handle.requests(), vec![Request::StartRecord]);
    }

    #[tokio::test]
    async fn stop_only_issues_for_running_outputs() {
        let handle = FakeHandle::default();
        let client = handle.client();

        recording_in(RecordingState::Stopped)
            .stop(Some(&client))
            .await
            .unwrap();
        recording_in(RecordingState::Stopping)
            .stop(Some(&client))
            .await
            .unwrap();
        assert!(handle.requests().is_empty());

        recording_in(RecordingState::Paused)
            .stop(Some(&client))
            .await
            .unwrap();
        recording_in(RecordingState::Active)
            .stop(Some(&client))
            .await
            .unwrap();
        assert_eq!(
            handle.requests(),
            vec![Request::StopRecord, Request::StopRecord]
        );
    }

    #[tokio::test]
    async fn noop_ops_succeed_without_a_client() {
        recording_in(RecordingState::Stopped).pause(None).await.unwrap();
        recording_in(RecordingState::Active).resume(None).await.unwrap();
        recording_in(RecordingState::Active).start(None).await.unwrap();
        recording_in(RecordingState::Stopped).stop(None).await.unwrap();

        assert!(recording_in(RecordingState::Active).pause(None).await.is_err());
    }
}
