//! Configuration management for obs-preset-helper

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::preset::PresetList;

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// OBS WebSocket connection parameters
    #[serde(default)]
    pub obs: ObsSettings,

    /// Helper behaviour options
    #[serde(default)]
    pub helper: HelperSettings,

    /// Every display identifier ever observed (simplifies preset editing)
    #[serde(default)]
    pub displays: AllDisplays,

    /// Preset collection
    #[serde(default)]
    pub presets: PresetList,

    /// Path to config file (not serialized)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObsSettings {
    /// OBS WebSocket host
    #[serde(default = "default_host")]
    pub host: String,

    /// OBS WebSocket port
    #[serde(default = "default_port")]
    pub port: u16,

    /// OBS WebSocket password (empty disables authentication)
    #[serde(default)]
    pub password: String,

    /// Connection/request timeout (seconds)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Delay before a reconnection attempt (seconds)
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,

    /// Debounce window for display/preset changes (seconds)
    #[serde(default = "default_grace_period")]
    pub grace_period_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelperSettings {
    /// Command to run whenever a new recording output file starts;
    /// the file path is appended as the last argument. Empty disables it.
    #[serde(default)]
    pub output_file_change_script: String,

    /// Delay before repairing screen-capture inputs after a recording
    /// resume (seconds)
    #[serde(default = "default_fix_inputs_delay")]
    pub fix_inputs_delay_secs: u64,
}

/// Accumulator of all display identifiers we have ever seen. Never
/// shrinks: a detached display stays known so presets referencing it can
/// still be edited.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllDisplays {
    #[serde(default)]
    pub all_displays: Vec<String>,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    4455
}

fn default_timeout() -> u64 {
    5
}

fn default_reconnect_delay() -> u64 {
    5
}

fn default_grace_period() -> u64 {
    15
}

fn default_fix_inputs_delay() -> u64 {
    15
}

impl Default for ObsSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            password: String::new(),
            timeout_secs: default_timeout(),
            reconnect_delay_secs: default_reconnect_delay(),
            grace_period_secs: default_grace_period(),
        }
    }
}

impl Default for HelperSettings {
    fn default() -> Self {
        Self {
            output_file_change_script: String::new(),
            fix_inputs_delay_secs: default_fix_inputs_delay(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            obs: ObsSettings::default(),
            helper: HelperSettings::default(),
            displays: AllDisplays::default(),
            presets: PresetList::default(),
            config_path: None,
        }
    }
}

impl AllDisplays {
    fn comparable(displays: &[String]) -> Vec<String> {
        let mut normalized: Vec<String> = displays.iter().map(|d| d.to_lowercase()).collect();
        normalized.sort();
        normalized
    }

    /// Union the current display list into the accumulator. The current
    /// list may be smaller than what we know but can still carry new
    /// entries. Returns whether anything changed.
    pub fn absorb(&mut self, current: &[String]) -> bool {
        let mut merged = self.all_displays.clone();
        for display in current {
            if !merged
                .iter()
                .any(|known| known.eq_ignore_ascii_case(display))
            {
                merged.push(display.clone());
            }
        }

        if Self::comparable(&merged) == Self::comparable(&self.all_displays) {
            return false;
        }
        self.all_displays = merged;
        true
    }
}

impl PartialEq for AllDisplays {
    fn eq(&self, other: &Self) -> bool {
        Self::comparable(&self.all_displays) == Self::comparable(&other.all_displays)
    }
}

impl Settings {
    /// Load configuration from the default location or create a default one
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Self::load_from(config_path)
    }

    pub fn load_from(config_path: PathBuf) -> Result<Self> {
        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

            let mut settings: Settings = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

            settings.config_path = Some(config_path);
            Ok(settings)
        } else {
            let mut settings = Settings::default();
            settings.config_path = Some(config_path);
            settings.save()?;
            Ok(settings)
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = match &self.config_path {
            Some(path) => path.clone(),
            None => Self::default_config_path()?,
        };

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, contents)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        Ok(())
    }

    /// Get the config file path
    pub fn config_path(&self) -> Result<PathBuf> {
        match &self.config_path {
            Some(path) => Ok(path.clone()),
            None => Self::default_config_path(),
        }
    }

    fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = directories::ProjectDirs::from("dev", "obs-preset-helper", "helper")
            .context("Failed to determine config directory")?;

        Ok(proj_dirs.config_dir().join("config.toml"))
    }

    /// Carry over new values from a settings instance arriving through the
    /// command channel, keeping our persistence path.
    pub fn apply(&mut self, mut updated: Settings) {
        updated.config_path = self.config_path.clone();
        *self = updated;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preset::Preset;

    #[test]
    fn defaults_match_expected_values() {
        let settings = Settings::default();
        assert_eq!(settings.obs.host, "localhost");
        assert_eq!(settings.obs.port, 4455);
        assert_eq!(settings.obs.timeout_secs, 5);
        assert_eq!(settings.obs.reconnect_delay_secs, 5);
        assert_eq!(settings.obs.grace_period_secs, 15);
        assert_eq!(settings.helper.fix_inputs_delay_secs, 15);
        assert!(settings.helper.output_file_change_script.is_empty());
        assert!(settings.presets.is_empty());
    }

    #[test]
    fn settings_round_trip_through_toml() {
        let mut settings = Settings::default();
        settings.obs.host = "studio.local".to_string();
        settings.obs.password = "hunter2".to_string();
        settings
            .presets
            .add(Preset::new(
                "docked",
                vec!["Built-in".to_string(), "DELL".to_string()],
                "live",
                "main",
            ))
            .unwrap();
        settings.displays.absorb(&["Built-in".to_string()]);

        let encoded = toml::to_string_pretty(&settings).unwrap();
        let decoded: Settings = toml::from_str(&encoded).unwrap();

        assert_eq!(settings, decoded);
        assert_eq!(decoded.presets.len(), 1);
        assert_eq!(decoded.presets.presets()[0].profile, "live");
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let decoded: Settings = toml::from_str("[obs]\nhost = \"studio\"\n").unwrap();
        assert_eq!(decoded.obs.host, "studio");
        assert_eq!(decoded.obs.port, 4455);
        assert!(decoded.presets.is_empty());
    }

    #[test]
    fn all_displays_only_ever_grows() {
        let mut known = AllDisplays::default();

        assert!(known.absorb(&["A".to_string(), "B".to_string()]));
        // A shrunken current list adds nothing and removes nothing.
        assert!(!known.absorb(&["A".to_string()]));
        assert_eq!(known.all_displays.len(), 2);

        // Case-insensitive: "b" is already known.
        assert!(!known.absorb(&["b".to_string()]));
        assert!(known.absorb(&["C".to_string()]));
        assert_eq!(known.all_displays.len(), 3);
    }
}
