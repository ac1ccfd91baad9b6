//! Input mirror
//!
//! Keeps a descriptor (uuid, name, kind) plus the full settings map per
//! input, in remote list order. Incremental events referencing an unknown
//! uuid mean the mirror has drifted; the apply methods report that so the
//! connection can refetch the whole list.

use anyhow::Result;
use tracing::{debug, warn};
use uuid::Uuid;

use super::api::{ObsApi, SettingsMap};
use super::{Notice, Notices};

#[derive(Debug, Clone, PartialEq)]
pub struct InputRecord {
    pub uuid: Uuid,
    pub name: String,
    pub kind: String,
    pub settings: SettingsMap,
}

/// Whether an incremental update could be applied or the mirror needs a
/// full refetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Applied {
    Ok,
    NeedsRefetch,
}

#[derive(Debug, Default)]
pub struct Inputs {
    inputs: Vec<InputRecord>,
}

impl Inputs {
    pub fn records(&self) -> &[InputRecord] {
        &self.inputs
    }

    pub fn get(&self, uuid: &Uuid) -> Option<&InputRecord> {
        self.inputs.iter().find(|i| &i.uuid == uuid)
    }

    pub async fn fetch(&mut self, client: &dyn ObsApi, out: &mut Notices) -> Result<()> {
        let stubs = client.input_list().await?;
        let mut inputs = Vec::with_capacity(stubs.len());
        for stub in stubs {
            let settings = client.input_settings(&stub.name).await?;
            inputs.push(InputRecord {
                uuid: stub.uuid,
                name: stub.name,
                kind: stub.kind,
                settings,
            });
        }
        if self.inputs != inputs {
            self.inputs = inputs;
            out.push(Notice::InputListChanged);
        }
        Ok(())
    }

    pub fn apply_created(
        &mut self,
        uuid: Uuid,
        name: String,
        kind: String,
        settings: SettingsMap,
        out: &mut Notices,
    ) {
        debug!(%uuid, name, kind, "input created");
        self.inputs.push(InputRecord {
            uuid,
            name,
            kind,
            settings,
        });
        out.push(Notice::InputListChanged);
    }

    pub fn apply_removed(&mut self, uuid: Uuid, out: &mut Notices) -> Applied {
        let Some(pos) = self.inputs.iter().position(|i| i.uuid == uuid) else {
            warn!(%uuid, "removal of an unknown input");
            return Applied::NeedsRefetch;
        };
        let removed = self.inputs.remove(pos);
        debug!(%uuid, name = removed.name, "input removed");
        out.push(Notice::InputListChanged);
        Applied::Ok
    }

    pub fn apply_renamed(
        &mut self,
        uuid: Uuid,
        old_name: &str,
        name: String,
        out: &mut Notices,
    ) -> Applied {
        let Some(input) = self.inputs.iter_mut().find(|i| i.uuid == uuid) else {
            warn!(%uuid, old_name, "rename of an unknown input");
            return Applied::NeedsRefetch;
        };
        debug!(%uuid, old_name, new_name = name, "input renamed");
        input.name = name;
        out.push(Notice::InputListChanged);
        Applied::Ok
    }

    /// Shallow merge: the event carries only the keys that changed.
    pub fn apply_settings_changed(
        &mut self,
        uuid: Uuid,
        settings: SettingsMap,
        out: &mut Notices,
    ) -> Applied {
        let Some(input) = self.inputs.iter_mut().find(|i| i.uuid == uuid) else {
            warn!(%uuid, "settings change for an unknown input");
            return Applied::NeedsRefetch;
        };
        let mut changed = false;
        for (key, value) in settings {
            if input.settings.get(&key) != Some(&value) {
                input.settings.insert(key, value);
                changed = true;
            }
        }
        if changed {
            out.push(Notice::InputSettingsChanged {
                name: input.name.clone(),
            });
        }
        Applied::Ok
    }

    pub fn reset(&mut self, out: &mut Notices) {
        if self.inputs.is_empty() {
            return;
        }
        self.inputs.clear();
        out.push(Notice::InputListChanged);
    }
}
