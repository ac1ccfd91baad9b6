//! OBS connection, state mirrors and the notice currency
//!
//! Everything the helper knows about the remote OBS instance lives here:
//! the connection tracker, one mirror per remote domain, and the typed
//! [`Notice`] values they produce. Notices are dispatched serially by the
//! engine; handlers may produce further notices, which are queued, never
//! handled recursively.

pub mod api;
pub mod connection;
pub mod doctor;
pub mod inputs;
pub mod output_file;
pub mod profiles;
pub mod recording;
pub mod scene_collections;

pub use connection::Connection;
pub use recording::RecordingState;

use crate::preset::Preset;

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Error,
    Disconnected,
    ShuttingDown,
}

/// Internal change notification. Produced by mirrors, watchers and action
/// machines; consumed by every action machine plus the outward projection.
#[derive(Debug, Clone)]
pub enum Notice {
    ConnectionChanged {
        state: ConnectionState,
        message: Option<String>,
    },
    RecordingChanged(RecordingState),
    ProfileListChanged,
    ProfileActiveChanged(Option<String>),
    SceneCollectionListChanged,
    SceneCollectionActiveChanged(Option<String>),
    InputListChanged,
    InputSettingsChanged {
        name: String,
    },
    OutputFileChanged(String),
    DisplayListChanged,
    PresetListChanged,
    PresetActivated(Preset),
    ScreenLocked,
    ScreenUnlocked,
    Error(String),
}

/// Notices accumulated while handling one external stimulus
pub type Notices = Vec<Notice>;

/// Order-independent list equality, used by mirrors to suppress
/// notifications for reordered but otherwise identical lists.
pub(crate) fn same_names(a: &[String], b: &[String]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut a: Vec<&String> = a.iter().collect();
    let mut b: Vec<&String> = b.iter().collect();
    a.sort();
    b.sort();
    a == b
}
