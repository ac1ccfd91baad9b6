//! OBS WebSocket protocol seam
//!
//! The engine talks to OBS through the [`ObsApi`] trait and receives the
//! event feed as typed [`ObsEvent`] values over a channel, so the whole
//! orchestration layer is independent of the concrete client. The
//! production implementation wraps [`obws::Client`].

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use obws::requests::inputs::{InputId, SetSettings};
use obws::Client;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::config::ObsSettings;

/// Input settings payload (JSON object)
pub type SettingsMap = serde_json::Map<String, serde_json::Value>;

/// Result of a record-status poll. The poll cannot observe the transient
/// starting/stopping phases; only events can.
#[derive(Debug, Clone, Copy)]
pub struct RecordStatus {
    pub active: bool,
    pub paused: bool,
}

/// A remote list of names plus the currently selected one
#[derive(Debug, Clone, Default)]
pub struct NamedList {
    pub current: Option<String>,
    pub items: Vec<String>,
}

/// Input descriptor as reported by the input-list request
#[derive(Debug, Clone)]
pub struct InputStub {
    pub uuid: Uuid,
    pub name: String,
    pub kind: String,
}

/// Sub-state carried by a record-state-changed event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSignal {
    Starting,
    Started,
    Stopping,
    Stopped,
    Paused,
    Resumed,
    Unknown,
}

/// Typed OBS event feed. Delivery is in arrival order on a single
/// channel, but events may be duplicated, stale, or simply missing;
/// consumers guard accordingly.
#[derive(Debug, Clone)]
pub enum ObsEvent {
    RecordStateChanged {
        signal: OutputSignal,
        path: Option<String>,
    },
    CurrentProfileChanged {
        name: String,
    },
    ProfileListChanged,
    CurrentSceneCollectionChanged,
    SceneCollectionListChanged {
        collections: Vec<String>,
    },
    InputCreated {
        uuid: Uuid,
        name: String,
        kind: String,
        settings: SettingsMap,
    },
    InputRemoved {
        uuid: Uuid,
        name: String,
    },
    InputRenamed {
        uuid: Uuid,
        old_name: String,
        name: String,
    },
    InputSettingsChanged {
        uuid: Uuid,
        name: String,
        settings: SettingsMap,
    },
    /// The event subscription closed; the link is gone.
    Disconnected,
}

/// Request/response surface of the OBS WebSocket protocol used by the
/// helper. Mirrors issue these; failures are reported, never thrown past
/// the connection boundary.
#[async_trait]
pub trait ObsApi: Send + Sync {
    async fn record_status(&self) -> Result<RecordStatus>;
    async fn start_record(&self) -> Result<()>;
    async fn stop_record(&self) -> Result<()>;
    async fn pause_record(&self) -> Result<()>;
    async fn resume_record(&self) -> Result<()>;

    async fn profile_list(&self) -> Result<NamedList>;
    async fn set_current_profile(&self, name: &str) -> Result<()>;

    async fn scene_collection_list(&self) -> Result<NamedList>;
    async fn set_current_scene_collection(&self, name: &str) -> Result<()>;

    async fn input_list(&self) -> Result<Vec<InputStub>>;
    async fn input_settings(&self, name: &str) -> Result<SettingsMap>;
    async fn set_input_settings(
        &self,
        name: &str,
        settings: &SettingsMap,
        overlay: bool,
    ) -> Result<()>;
}

/// Creates a connected client per connection attempt. The factory wires
/// the event feed (including the disconnect notification) into the given
/// channel before returning.
#[async_trait]
pub trait ObsClientFactory: Send + Sync {
    async fn connect(
        &self,
        settings: &ObsSettings,
        events: mpsc::UnboundedSender<ObsEvent>,
    ) -> Result<Box<dyn ObsApi>>;
}

/// Production factory backed by obws
pub struct ObwsFactory;

#[async_trait]
impl ObsClientFactory for ObwsFactory {
    async fn connect(
        &self,
        settings: &ObsSettings,
        events: mpsc::UnboundedSender<ObsEvent>,
    ) -> Result<Box<dyn ObsApi>> {
        let password = if settings.password.is_empty() {
            None
        } else {
            Some(settings.password.as_str())
        };

        let connect = Client::connect(settings.host.clone(), settings.port, password);
        let client = tokio::time::timeout(Duration::from_secs(settings.timeout_secs), connect)
            .await
            .context("Timed out connecting to OBS WebSocket")?
            .context("Failed to connect to OBS WebSocket")?;

        let stream = client
            .events()
            .context("Failed to subscribe to OBS events")?;
        tokio::spawn(forward_events(stream, events));

        Ok(Box::new(ObwsApi { client }))
    }
}

struct ObwsApi {
    client: Client,
}

#[async_trait]
impl ObsApi for ObwsApi {
    async fn record_status(&self) -> Result<RecordStatus> {
        let status = self.client.recording().status().await?;
        Ok(RecordStatus {
            active: status.active,
            paused: status.paused,
        })
    }

    async fn start_record(&self) -> Result<()> {
        self.client.recording().start().await?;
        Ok(())
    }

    async fn stop_record(&self) -> Result<()> {
        self.client.recording().stop().await?;
        Ok(())
    }

    async fn pause_record(&self) -> Result<()> {
        self.client.recording().pause().await?;
        Ok(())
    }

    async fn resume_record(&self) -> Result<()> {
        self.client.recording().resume().await?;
        Ok(())
    }

    async fn profile_list(&self) -> Result<NamedList> {
        let res = self.client.profiles().list().await?;
        Ok(NamedList {
            current: Some(res.current),
            items: res.profiles,
        })
    }

    async fn set_current_profile(&self, name: &str) -> Result<()> {
        self.client.profiles().set_current(name).await?;
        Ok(())
    }

    async fn scene_collection_list(&self) -> Result<NamedList> {
        let res = self.client.scene_collections().list().await?;
        Ok(NamedList {
            current: Some(res.current),
            items: res.collections,
        })
    }

    async fn set_current_scene_collection(&self, name: &str) -> Result<()> {
        self.client.scene_collections().set_current(name).await?;
        Ok(())
    }

    async fn input_list(&self) -> Result<Vec<InputStub>> {
        let inputs = self.client.inputs().list(None).await?;
        Ok(inputs
            .into_iter()
            .map(|input| InputStub {
                uuid: input.id.uuid,
                name: input.id.name,
                kind: input.unversioned_kind,
            })
            .collect())
    }

    async fn input_settings(&self, name: &str) -> Result<SettingsMap> {
        let res = self
            .client
            .inputs()
            .settings::<serde_json::Value>(InputId::Name(name))
            .await?;
        Ok(json_object(res.settings))
    }

    async fn set_input_settings(
        &self,
        name: &str,
        settings: &SettingsMap,
        overlay: bool,
    ) -> Result<()> {
        self.client
            .inputs()
            .set_settings(SetSettings {
                input: InputId::Name(name),
                settings,
                overlay: Some(overlay),
            })
            .await?;
        Ok(())
    }
}

/// Forward the obws event stream as typed events; a closing stream turns
/// into the disconnect notification.
async fn forward_events(
    events: impl futures::Stream<Item = obws::events::Event>,
    tx: mpsc::UnboundedSender<ObsEvent>,
) {
    tokio::pin!(events);

    while let Some(event) = events.next().await {
        let Some(mapped) = map_event(event) else {
            continue;
        };
        if tx.send(mapped).is_err() {
            // Engine gone, stop forwarding
            return;
        }
    }

    debug!("OBS event stream closed");
    let _ = tx.send(ObsEvent::Disconnected);
}

fn map_event(event: obws::events::Event) -> Option<ObsEvent> {
    use obws::events::{Event, OutputState};

    match event {
        Event::RecordStateChanged { state, path, .. } => {
            let signal = match state {
                OutputState::Starting => OutputSignal::Starting,
                OutputState::Started => OutputSignal::Started,
                OutputState::Stopping => OutputSignal::Stopping,
                OutputState::Stopped => OutputSignal::Stopped,
                OutputState::Paused => OutputSignal::Paused,
                OutputState::Resumed => OutputSignal::Resumed,
                _ => OutputSignal::Unknown,
            };
            Some(ObsEvent::RecordStateChanged { signal, path })
        }
        Event::CurrentProfileChanged { name } => Some(ObsEvent::CurrentProfileChanged { name }),
        Event::ProfileListChanged { .. } => Some(ObsEvent::ProfileListChanged),
        Event::CurrentSceneCollectionChanged { .. } => {
            Some(ObsEvent::CurrentSceneCollectionChanged)
        }
        Event::SceneCollectionListChanged { collections } => {
            Some(ObsEvent::SceneCollectionListChanged { collections })
        }
        Event::InputCreated {
            id,
            settings,
            default_settings,
            unversioned_kind,
            ..
        } => {
            // Explicit settings overlay the kind defaults
            let mut merged = json_object(default_settings);
            for (key, value) in json_object(settings) {
                merged.insert(key, value);
            }
            Some(ObsEvent::InputCreated {
                uuid: id.uuid,
                name: id.name,
                kind: unversioned_kind,
                settings: merged,
            })
        }
        Event::InputRemoved { id } => Some(ObsEvent::InputRemoved {
            uuid: id.uuid,
            name: id.name,
        }),
        Event::InputNameChanged {
            uuid,
            old_name,
            new_name,
        } => Some(ObsEvent::InputRenamed {
            uuid,
            old_name,
            name: new_name,
        }),
        Event::InputSettingsChanged { id, settings } => Some(ObsEvent::InputSettingsChanged {
            uuid: id.uuid,
            name: id.name,
            settings: json_object(settings),
        }),
        _ => None,
    }
}

fn json_object(value: serde_json::Value) -> SettingsMap {
    match value {
        serde_json::Value::Object(map) => map,
        _ => SettingsMap::new(),
    }
}
