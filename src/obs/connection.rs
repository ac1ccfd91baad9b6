//! Connection state tracker
//!
//! Owns the protocol client and all mirrors. Every request failure runs
//! through [`Connection::fail`]: the client is dropped, the state flips
//! to `Error` and the mirrors reset, so downstream consumers never see
//! stale remote state. The connection doctor picks the error notice up
//! and schedules the reconnect.
//!
//! Each successful connect hands a fresh event receiver to the engine;
//! dropping the previous receiver shuts the old forwarder down, so events
//! from a dead client can never bleed into the new session.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::ObsSettings;

use super::api::{ObsApi, ObsClientFactory, ObsEvent, SettingsMap};
use super::inputs::{Applied, Inputs};
use super::output_file::OutputFile;
use super::profiles::Profiles;
use super::recording::Recording;
use super::scene_collections::SceneCollections;
use super::{ConnectionState, Notice, Notices};

pub struct Connection {
    factory: Arc<dyn ObsClientFactory>,
    client: Option<Box<dyn ObsApi>>,
    state: ConnectionState,
    shutting_down: bool,

    pub recording: Recording,
    pub profiles: Profiles,
    pub scene_collections: SceneCollections,
    pub inputs: Inputs,
    pub output_file: OutputFile,
}

impl Connection {
    pub fn new(factory: Arc<dyn ObsClientFactory>) -> Self {
        Self {
            factory,
            client: None,
            state: ConnectionState::Disconnected,
            shutting_down: false,
            recording: Recording::default(),
            profiles: Profiles::default(),
            scene_collections: SceneCollections::default(),
            inputs: Inputs::default(),
            output_file: OutputFile::default(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }

    /// Establish a session and prime every mirror. Returns the receiver
    /// for this session's event feed; `None` when the attempt failed or
    /// a shutdown is in progress.
    pub async fn connect(
        &mut self,
        settings: &ObsSettings,
        out: &mut Notices,
    ) -> Option<mpsc::UnboundedReceiver<ObsEvent>> {
        if self.shutting_down {
            return None;
        }

        info!(host = settings.host, port = settings.port, "connecting to OBS");
        self.set_state(ConnectionState::Connecting, None, out);

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        match self.factory.connect(settings, event_tx).await {
            Ok(client) => self.client = Some(client),
            Err(err) => {
                self.fail("Failed to connect to OBS", err, out);
                return None;
            }
        }

        self.set_state(ConnectionState::Connected, None, out);

        if let Err(err) = self.fetch_all(out).await {
            self.fail("Failed to fetch OBS state", err, out);
        }
        Some(event_rx)
    }

    /// Drop the session without entering the error path. Used when new
    /// settings arrive; the doctor reconnects with the fresh parameters.
    pub fn disconnect(&mut self, reason: &str, out: &mut Notices) {
        self.client = None;
        self.set_state(
            ConnectionState::Disconnected,
            Some(reason.to_string()),
            out,
        );
    }

    /// Final teardown: suppresses any further connect attempt.
    pub fn stop(&mut self, out: &mut Notices) {
        info!("shutting down OBS connection");
        self.shutting_down = true;
        self.set_state(ConnectionState::ShuttingDown, None, out);
        self.client = None;
        self.set_state(ConnectionState::Disconnected, None, out);
    }

    pub async fn apply_event(&mut self, event: ObsEvent, out: &mut Notices) {
        // Anything arriving outside an established session is stale.
        if self.state != ConnectionState::Connected {
            debug!(?event, state = ?self.state, "dropping event outside session");
            return;
        }

        match event {
            ObsEvent::RecordStateChanged { signal, path } => {
                self.recording.apply_signal(signal, out);
                self.output_file.apply_signal(signal, path, out);
            }
            ObsEvent::CurrentProfileChanged { name } => {
                self.profiles.apply_active_changed(Some(name), out);
            }
            ObsEvent::ProfileListChanged => self.refetch_profiles(out).await,
            // The active-changed event is not trustworthy on its own:
            // OBS may have swapped the whole collection set underneath.
            ObsEvent::CurrentSceneCollectionChanged => {
                self.refetch_scene_collections(out).await;
            }
            ObsEvent::SceneCollectionListChanged { collections } => {
                self.scene_collections.apply_list_changed(collections, out);
            }
            ObsEvent::InputCreated {
                uuid,
                name,
                kind,
                settings,
            } => self.inputs.apply_created(uuid, name, kind, settings, out),
            ObsEvent::InputRemoved { uuid, .. } => {
                if self.inputs.apply_removed(uuid, out) == Applied::NeedsRefetch {
                    self.refetch_inputs(out).await;
                }
            }
            ObsEvent::InputRenamed {
                uuid,
                old_name,
                name,
            } => {
                if self.inputs.apply_renamed(uuid, &old_name, name, out) == Applied::NeedsRefetch {
                    self.refetch_inputs(out).await;
                }
            }
            ObsEvent::InputSettingsChanged { uuid, settings, .. } => {
                if self.inputs.apply_settings_changed(uuid, settings, out)
                    == Applied::NeedsRefetch
                {
                    self.refetch_inputs(out).await;
                }
            }
            ObsEvent::Disconnected => {
                warn!("connection to OBS lost");
                self.client = None;
                self.set_state(
                    ConnectionState::Disconnected,
                    Some("Connection to OBS lost".to_string()),
                    out,
                );
            }
        }
    }

    pub async fn pause_recording(&mut self, out: &mut Notices) -> bool {
        let result = self.recording.pause(self.client.as_deref()).await;
        self.check("Failed to pause recording", result, out)
    }

    pub async fn resume_recording(&mut self, out: &mut Notices) -> bool {
        let result = self.recording.resume(self.client.as_deref()).await;
        self.check("Failed to resume recording", result, out)
    }

    pub async fn start_recording(&mut self, out: &mut Notices) -> bool {
        let result = self.recording.start(self.client.as_deref()).await;
        self.check("Failed to start recording", result, out)
    }

    pub async fn stop_recording(&mut self, out: &mut Notices) -> bool {
        let result = self.recording.stop(self.client.as_deref()).await;
        self.check("Failed to stop recording", result, out)
    }

    pub async fn set_profile(&mut self, name: &str, out: &mut Notices) -> bool {
        let result = self
            .profiles
            .set_active(self.client.as_deref(), name, self.recording.state())
            .await;
        self.check("Failed to switch profile", result, out)
    }

    pub async fn set_scene_collection(&mut self, name: &str, out: &mut Notices) -> bool {
        let result = self
            .scene_collections
            .set_active(self.client.as_deref(), name)
            .await;
        self.check("Failed to switch scene collection", result, out)
    }

    pub async fn set_input_settings(
        &mut self,
        name: &str,
        settings: &SettingsMap,
        out: &mut Notices,
    ) -> bool {
        let result = match self.client.as_deref() {
            Some(client) => client.set_input_settings(name, settings, true).await,
            None => Err(anyhow::anyhow!("not connected")),
        };
        self.check("Failed to change input settings", result, out)
    }

    async fn fetch_all(&mut self, out: &mut Notices) -> Result<()> {
        let client = self.client.as_deref().context("not connected")?;
        self.recording.fetch(client, out).await?;
        self.profiles.fetch(client, out).await?;
        self.scene_collections.fetch(client, out).await?;
        self.inputs.fetch(client, out).await?;
        Ok(())
    }

    async fn refetch_profiles(&mut self, out: &mut Notices) {
        let result = match self.client.as_deref() {
            Some(client) => self.profiles.fetch(client, out).await,
            None => return,
        };
        if let Err(err) = result {
            self.fail("Failed to fetch profiles", err, out);
        }
    }

    async fn refetch_scene_collections(&mut self, out: &mut Notices) {
        let result = match self.client.as_deref() {
            Some(client) => self.scene_collections.fetch(client, out).await,
            None => return,
        };
        if let Err(err) = result {
            self.fail("Failed to fetch scene collections", err, out);
        }
    }

    async fn refetch_inputs(&mut self, out: &mut Notices) {
        let result = match self.client.as_deref() {
            Some(client) => self.inputs.fetch(client, out).await,
            None => return,
        };
        if let Err(err) = result {
            self.fail("Failed to fetch inputs", err, out);
        }
    }

    fn check(&mut self, context: &str, result: Result<()>, out: &mut Notices) -> bool {
        match result {
            Ok(()) => true,
            Err(err) => {
                self.fail(context, err, out);
                false
            }
        }
    }

    fn fail(&mut self, context: &str, err: anyhow::Error, out: &mut Notices) {
        let message = format!("{context}: {err:#}");
        warn!("{message}");
        self.client = None;
        self.set_state(ConnectionState::Error, Some(message.clone()), out);
        out.push(Notice::Error(message));
    }

    fn set_state(&mut self, state: ConnectionState, message: Option<String>, out: &mut Notices) {
        if self.state == state && state != ConnectionState::Error {
            return;
        }
        let was_connected = self.state == ConnectionState::Connected;
        debug!(from = ?self.state, to = ?state, "connection state changed");
        self.state = state;
        out.push(Notice::ConnectionChanged { state, message });

        // Leaving the session invalidates everything we mirrored from it.
        if was_connected && state != ConnectionState::Connected {
            self.recording.reset(out);
            self.profiles.reset(out);
            self.scene_collections.reset(out);
            self.inputs.reset(out);
        }
    }
}
