//! Profile mirror
//!
//! OBS emits an active-changed event with the new name but no payload
//! worth trusting for the list, so list updates go through a refetch.

use anyhow::{bail, Context, Result};
use tracing::debug;

use super::api::ObsApi;
use super::{same_names, Notice, Notices, RecordingState};

#[derive(Debug, Default)]
pub struct Profiles {
    active: Option<String>,
    list: Vec<String>,
}

impl Profiles {
    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn list(&self) -> &[String] {
        &self.list
    }

    pub async fn fetch(&mut self, client: &dyn ObsApi, out: &mut Notices) -> Result<()> {
        let remote = client.profile_list().await?;
        self.update_list(remote.items, out);
        self.update_active(remote.current, out);
        Ok(())
    }

    pub fn apply_active_changed(&mut self, name: Option<String>, out: &mut Notices) {
        self.update_active(name, out);
    }

    pub fn reset(&mut self, out: &mut Notices) {
        self.update_list(Vec::new(), out);
        self.update_active(None, out);
    }

    /// Switch the active profile. Unknown names fail fast, switching to
    /// the already-active profile is a no-op success, and the remote
    /// refuses profile changes unless the record output is fully stopped.
    pub async fn set_active(
        &self,
        client: Option<&dyn ObsApi>,
        name: &str,
        recording: RecordingState,
    ) -> Result<()> {
        if !self.list.iter().any(|p| p == name) {
            bail!("profile does not exist: {name}");
        }
        if self.active.as_deref() == Some(name) {
            debug!(profile = name, "profile already active");
            return Ok(());
        }
        if recording != RecordingState::Stopped {
            bail!("cannot switch profile while recording is {recording:?}");
        }
        let client = client.context("not connected")?;
        client.set_current_profile(name).await
    }

    fn update_list(&mut self, list: Vec<String>, out: &mut Notices) {
        if same_names(&self.list, &list) {
            return;
        }
        self.list = list;
        out.push(Notice::ProfileListChanged);
    }

    fn update_active(&mut self, active: Option<String>, out: &mut Notices) {
        if self.active == active {
            return;
        }
        debug!(from = ?self.active, to = ?active, "active profile changed");
        self.active = active;
        out.push(Notice::ProfileActiveChanged(self.active.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obs::api::testing::{FakeHandle, Request};

    async fn fetched(handle: &FakeHandle) -> Profiles {
        let mut profiles = Profiles::default();
        let mut out = Notices::new();
        profiles.fetch(&handle.client(), &mut out).await.unwrap();
        profiles
    }

    #[tokio::test]
    async fn fetch_only_notifies_on_actual_change() {
        let handle = FakeHandle::default();
        handle.set_profiles("live", &["live", "work"]);

        let mut profiles = Profiles::default();
        let mut out = Notices::new();
        profiles.fetch(&handle.client(), &mut out).await.unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(profiles.active(), Some("live"));

        // Identical remote state, reordered list: nothing to report.
        handle.set_profiles("live", &["work", "live"]);
        let mut out = Notices::new();
        profiles.fetch(&handle.client(), &mut out).await.unwrap();
        assert!(out.is_empty());

        handle.set_profiles("work", &["work", "live"]);
        let mut out = Notices::new();
        profiles.fetch(&handle.client(), &mut out).await.unwrap();
        assert_eq!(out.len(), 1);
        assert!(matches!(out[0], Notice::ProfileActiveChanged(_)));
    }

    #[tokio::test]
    async fn set_active_guards() {
        let handle = FakeHandle::default();
        handle.set_profiles("live", &["live", "work"]);
        let profiles = fetched(&handle).await;
        let client = handle.client();

        assert!(profiles
            .set_active(Some(&client), "nope", RecordingState::Stopped)
            .await
            .is_err());

        profiles
            .set_active(Some(&client), "live", RecordingState::Active)
            .await
            .unwrap();
        assert!(handle.requests().is_empty(), "already active is a no-op");

        assert!(profiles
            .set_active(Some(&client), "work", RecordingState::Active)
            .await
            .is_err());
        assert!(profiles
            .set_active(Some(&client), "work", RecordingState::Stopping)
            .await
            .is_err());

        profiles
            .set_active(Some(&client), "work", RecordingState::Stopped)
            .await
            .unwrap();
        assert_eq!(
            handle.requests(),
            vec![Request::SetProfile("work".to_string())]
        );
    }

    #[tokio::test]
    async fn reset_clears_and_notifies() {
        let handle = FakeHandle::default();
        handle.set_profiles("live", &["live"]);
        let mut profiles = fetched(&handle).await;

        let mut out = Notices::new();
        profiles.reset(&mut out);
        assert_eq!(out.len(), 2);
        assert!(profiles.active().is_none());
        assert!(profiles.list().is_empty());

        // Resetting an already-empty mirror is silent.
        let mut out = Notices::new();
        profiles.reset(&mut out);
        assert!(out.is_empty());
    }
}
