//! Preset model
//!
//! A preset maps a required display configuration to an OBS profile +
//! scene collection pair. Display sets are compared case-insensitively
//! and independent of order, so presets must be distinct enough for the
//! engine to decide which one to apply when the display list changes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A named rule: when exactly these displays are attached, activate this
/// profile and scene collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    pub uuid: Uuid,
    pub name: String,
    pub displays: Vec<String>,
    pub profile: String,
    pub scene_collection: String,
}

impl Preset {
    pub fn new(
        name: impl Into<String>,
        displays: Vec<String>,
        profile: impl Into<String>,
        scene_collection: impl Into<String>,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            displays,
            profile: profile.into(),
            scene_collection: scene_collection.into(),
        }
    }

    fn comparable_displays(displays: &[String]) -> Vec<String> {
        let mut normalized: Vec<String> = displays.iter().map(|d| d.to_lowercase()).collect();
        normalized.sort();
        normalized
    }

    /// Case-insensitive, order-independent display set equality.
    pub fn matches_displays(&self, displays: &[String]) -> bool {
        Self::comparable_displays(&self.displays) == Self::comparable_displays(displays)
    }

    fn values_equal(&self, other: &Preset) -> bool {
        self.name == other.name
            && Self::comparable_displays(&self.displays)
                == Self::comparable_displays(&other.displays)
            && self.profile == other.profile
            && self.scene_collection == other.scene_collection
    }
}

/// Validation failures raised synchronously to the caller (the preset
/// editing UI); never swallowed.
#[derive(Debug, Error)]
pub enum PresetError {
    #[error("unknown preset: {0}")]
    NotFound(Uuid),
    #[error("preset uuid is not unique: {0}")]
    DuplicateUuid(Uuid),
    #[error("preset \"{new}\" is not unique enough, its display set conflicts with \"{existing}\"")]
    DuplicateDisplays { existing: String, new: String },
    #[error("preset name is not unique: \"{0}\"")]
    DuplicateName(String),
}

/// Ordered preset collection with uuid lookup and uniqueness enforcement.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<Preset>", into = "Vec<Preset>")]
pub struct PresetList {
    presets: Vec<Preset>,
    index: HashMap<Uuid, usize>,
}

impl PresetList {
    pub fn presets(&self) -> &[Preset] {
        &self.presets
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    pub fn get(&self, uuid: &Uuid) -> Option<&Preset> {
        self.index.get(uuid).map(|&i| &self.presets[i])
    }

    /// First preset (in insertion order) whose display set equals the
    /// given active display set.
    pub fn find_matching(&self, displays: &[String]) -> Option<&Preset> {
        self.presets.iter().find(|p| p.matches_displays(displays))
    }

    pub fn add(&mut self, preset: Preset) -> Result<(), PresetError> {
        if self.index.contains_key(&preset.uuid) {
            return Err(PresetError::DuplicateUuid(preset.uuid));
        }
        self.check_conflicts(&preset, None)?;

        self.index.insert(preset.uuid, self.presets.len());
        self.presets.push(preset);
        Ok(())
    }

    pub fn remove(&mut self, uuid: &Uuid) -> Result<Preset, PresetError> {
        let i = *self.index.get(uuid).ok_or(PresetError::NotFound(*uuid))?;
        let removed = self.presets.remove(i);
        self.rebuild_index();
        Ok(removed)
    }

    /// Replace all non-identity fields of the preset with the given uuid.
    /// Returns whether anything actually changed.
    pub fn update(&mut self, uuid: &Uuid, updated: Preset) -> Result<bool, PresetError> {
        let i = *self.index.get(uuid).ok_or(PresetError::NotFound(*uuid))?;
        if self.presets[i].values_equal(&updated) {
            return Ok(false);
        }
        self.check_conflicts(&updated, Some(*uuid))?;

        let existing = &mut self.presets[i];
        existing.name = updated.name;
        existing.displays = updated.displays;
        existing.profile = updated.profile;
        existing.scene_collection = updated.scene_collection;
        Ok(true)
    }

    /// Uniqueness checks against every entry except `skip` (the preset
    /// being updated is allowed to collide with itself).
    fn check_conflicts(&self, candidate: &Preset, skip: Option<Uuid>) -> Result<(), PresetError> {
        for existing in &self.presets {
            if Some(existing.uuid) == skip {
                continue;
            }
            if existing.matches_displays(&candidate.displays) {
                return Err(PresetError::DuplicateDisplays {
                    existing: existing.name.clone(),
                    new: candidate.name.clone(),
                });
            }
            if existing.name == candidate.name {
                return Err(PresetError::DuplicateName(candidate.name.clone()));
            }
        }
        Ok(())
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .presets
            .iter()
            .enumerate()
            .map(|(i, p)| (p.uuid, i))
            .collect();
    }
}

impl PartialEq for PresetList {
    fn eq(&self, other: &Self) -> bool {
        self.presets == other.presets
    }
}

impl TryFrom<Vec<Preset>> for PresetList {
    type Error = PresetError;

    fn try_from(presets: Vec<Preset>) -> Result<Self, Self::Error> {
        let mut list = PresetList::default();
        for preset in presets {
            list.add(preset)?;
        }
        Ok(list)
    }
}

impl From<PresetList> for Vec<Preset> {
    fn from(list: PresetList) -> Self {
        list.presets
    }
}
