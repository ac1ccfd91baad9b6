//! Scene collection mirror
//!
//! Unlike profiles there is no recording guard: OBS switches scene
//! collections regardless of output state. The list-changed event carries
//! the full list; the active-changed event is handled by the connection
//! as a full refetch.

use anyhow::{bail, Context, Result};
use tracing::debug;

use super::api::ObsApi;
use super::{same_names, Notice, Notices};

#[derive(Debug, Default)]
pub struct SceneCollections {
    active: Option<String>,
    list: Vec<String>,
}

impl SceneCollections {
    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn list(&self) -> &[String] {
        &self.list
    }

    pub async fn fetch(&mut self, client: &dyn ObsApi, out: &mut Notices) -> Result<()> {
        let remote = client.scene_collection_list().await?;
        self.update_list(remote.items, out);
        self.update_active(remote.current, out);
        Ok(())
    }

    pub fn apply_list_changed(&mut self, collections: Vec<String>, out: &mut Notices) {
        self.update_list(collections, out);
    }

    pub fn reset(&mut self, out: &mut Notices) {
        self.update_list(Vec::new(), out);
        self.update_active(None, out);
    }

    pub async fn set_active(&self, client: Option<&dyn ObsApi>, name: &str) -> Result<()> {
        if !self.list.iter().any(|c| c == name) {
            bail!("scene collection does not exist: {name}");
        }
        if self.active.as_deref() == Some(name) {
            debug!(scene_collection = name, "scene collection already active");
            return Ok(());
        }
        let client = client.context("not connected")?;
        client.set_current_scene_collection(name).await
    }

    fn update_list(&mut self, list: Vec<String>, out: &mut Notices) {
        if same_names(&self.list, &list) {
            return;
        }
        self.list = list;
        out.push(Notice::SceneCollectionListChanged);
    }

    fn update_active(&mut self, active: Option<String>, out: &mut Notices) {
        if self.active == active {
            return;
        }
        debug!(from = ?self.active, to = ?active, "active scene collection changed");
        self.active = active;
        out.push(Notice::SceneCollectionActiveChanged(self.active.clone()));
    }
}
