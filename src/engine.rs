//! Orchestration engine
//!
//! Single task owning the OBS connection, every mirror and every action
//! machine. All stimuli arrive over channels and are handled one at a
//! time; the notices each stimulus produces are dispatched in FIFO order
//! to the action machines before the next stimulus is looked at, so the
//! machines always observe changes in the order they happened.

use anyhow::Result;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::actions::fix_inputs::FixInputs;
use crate::actions::pause_on_lock::PauseOnLock;
use crate::actions::preset_switch::PresetSwitch;
use crate::actions::run_script::RunScriptOnOutputFileChange;
use crate::config::Settings;
use crate::obs::api::{ObsClientFactory, ObsEvent};
use crate::obs::doctor::ConnectionDoctor;
use crate::obs::{same_names, Connection, ConnectionState, Notice, Notices, RecordingState};
use crate::preset::Preset;
use crate::system::screen_lock::LockEvent;
use crate::system::script_launcher::{ScriptLauncher, ScriptOutcome};

/// Inbound engine commands
#[derive(Debug)]
pub enum Command {
    /// Replace the live settings (persisted; OBS-section changes force
    /// a reconnect, preset changes trigger a recheck)
    ApplySettings(Settings),
    Shutdown,
}

/// Outward status feed for tray/UI consumers
#[derive(Debug, Clone)]
pub enum AppEvent {
    ConnectionChanged {
        state: ConnectionState,
        message: Option<String>,
    },
    RecordingChanged(RecordingState),
    ProfileListChanged(Vec<String>),
    ProfileChanged(Option<String>),
    SceneCollectionListChanged(Vec<String>),
    SceneCollectionChanged(Option<String>),
    PresetActivated(Preset),
    OutputFileChanged(String),
    Error(String),
}

pub struct Engine {
    settings: Settings,
    connection: Connection,
    doctor: ConnectionDoctor,
    switcher: PresetSwitch,
    pause_on_lock: PauseOnLock,
    fix_inputs: FixInputs,
    run_script: RunScriptOnOutputFileChange,
    launcher: ScriptLauncher,
    /// Currently attached displays (last accepted snapshot)
    displays: Vec<String>,

    cmd_rx: mpsc::Receiver<Command>,
    /// Event feed of the current OBS session; replaced on reconnect
    obs_rx: Option<mpsc::UnboundedReceiver<ObsEvent>>,
    display_rx: mpsc::UnboundedReceiver<Vec<String>>,
    lock_rx: mpsc::UnboundedReceiver<LockEvent>,
    script_rx: mpsc::UnboundedReceiver<ScriptOutcome>,
    status_tx: broadcast::Sender<AppEvent>,
}

impl Engine {
    pub fn new(
        settings: Settings,
        factory: Arc<dyn ObsClientFactory>,
        cmd_rx: mpsc::Receiver<Command>,
        display_rx: mpsc::UnboundedReceiver<Vec<String>>,
        lock_rx: mpsc::UnboundedReceiver<LockEvent>,
        status_tx: broadcast::Sender<AppEvent>,
    ) -> Self {
        let (launcher, script_rx) = ScriptLauncher::new();

        Self {
            settings,
            connection: Connection::new(factory),
            doctor: ConnectionDoctor::default(),
            switcher: PresetSwitch::default(),
            pause_on_lock: PauseOnLock::default(),
            fix_inputs: FixInputs::default(),
            run_script: RunScriptOnOutputFileChange,
            launcher,
            displays: Vec::new(),
            cmd_rx,
            obs_rx: None,
            display_rx,
            lock_rx,
            script_rx,
            status_tx,
        }
    }

    /// Run the engine main loop until a shutdown command arrives.
    pub async fn run(&mut self) -> Result<()> {
        info!("engine starting");
        self.connect().await;

        loop {
            let doctor_deadline = self.doctor.deadline();
            let recheck_deadline = self.switcher.recheck_deadline();
            let fix_deadline = self.fix_inputs.deadline();

            let mut notices = Notices::new();

            tokio::select! {
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(Command::ApplySettings(new_settings)) => {
                            self.apply_settings(new_settings, &mut notices);
                        }
                        Some(Command::Shutdown) | None => {
                            self.connection.stop(&mut notices);
                            self.dispatch(notices).await;
                            break;
                        }
                    }
                }

                event = recv_or_pending(&mut self.obs_rx) => {
                    match event {
                        Some(event) => self.connection.apply_event(event, &mut notices).await,
                        None => self.obs_rx = None,
                    }
                }

                Some(displays) = self.display_rx.recv() => {
                    self.apply_displays(displays, &mut notices);
                }

                Some(edge) = self.lock_rx.recv() => {
                    notices.push(match edge {
                        LockEvent::Locked => Notice::ScreenLocked,
                        LockEvent::Unlocked => Notice::ScreenUnlocked,
                    });
                }

                Some(outcome) = self.script_rx.recv() => {
                    if outcome.success {
                        info!(logs = outcome.logs, "output-file script finished");
                    } else {
                        error!(logs = outcome.logs, "output-file script failed");
                        notices.push(Notice::Error("Output-file script failed".to_string()));
                    }
                }

                _ = sleep_until_or_pending(doctor_deadline) => {
                    self.doctor.clear();
                    self.connect_into(&mut notices).await;
                }

                _ = sleep_until_or_pending(recheck_deadline) => {
                    let displays = self.displays.clone();
                    self.switcher
                        .on_recheck(&displays, &mut self.connection, &self.settings, &mut notices)
                        .await;
                }

                _ = sleep_until_or_pending(fix_deadline) => {
                    self.fix_inputs.on_deadline(&mut self.connection, &mut notices).await;
                }
            }

            self.dispatch(notices).await;
        }

        info!("engine stopped");
        Ok(())
    }

    async fn connect(&mut self) {
        let mut notices = Notices::new();
        self.connect_into(&mut notices).await;
        self.dispatch(notices).await;
    }

    async fn connect_into(&mut self, notices: &mut Notices) {
        if let Some(rx) = self.connection.connect(&self.settings.obs, notices).await {
            self.obs_rx = Some(rx);
        }
    }

    /// Fan each notice out to every action machine, then publish its
    /// outward projection. Handler-produced notices join the back of the
    /// queue; nothing is handled recursively.
    async fn dispatch(&mut self, notices: Notices) {
        let mut queue: VecDeque<Notice> = notices.into();

        while let Some(notice) = queue.pop_front() {
            debug!(?notice, "dispatching");
            let mut out = Notices::new();

            self.doctor
                .handle_notice(&notice, &self.settings, self.connection.is_shutting_down());
            self.switcher
                .handle_notice(&notice, &mut self.connection, &self.settings, &mut out)
                .await;
            self.pause_on_lock
                .handle_notice(&notice, &mut self.connection, &mut out)
                .await;
            self.fix_inputs
                .handle_notice(&notice, &mut self.connection, &self.settings, &mut out)
                .await;
            self.run_script
                .handle_notice(&notice, &self.settings, &self.launcher);

            self.publish(&notice);
            queue.extend(out);
        }
    }

    fn publish(&self, notice: &Notice) {
        let event = match notice {
            Notice::ConnectionChanged { state, message } => AppEvent::ConnectionChanged {
                state: *state,
                message: message.clone(),
            },
            Notice::RecordingChanged(state) => AppEvent::RecordingChanged(*state),
            Notice::ProfileListChanged => {
                AppEvent::ProfileListChanged(self.connection.profiles.list().to_vec())
            }
            Notice::ProfileActiveChanged(name) => AppEvent::ProfileChanged(name.clone()),
            Notice::SceneCollectionListChanged => {
                AppEvent::SceneCollectionListChanged(self.connection.scene_collections.list().to_vec())
            }
            Notice::SceneCollectionActiveChanged(name) => {
                AppEvent::SceneCollectionChanged(name.clone())
            }
            Notice::PresetActivated(preset) => AppEvent::PresetActivated(preset.clone()),
            Notice::OutputFileChanged(path) => AppEvent::OutputFileChanged(path.clone()),
            Notice::Error(message) => AppEvent::Error(message.clone()),
            // Internal plumbing without an outward projection
            Notice::InputListChanged
            | Notice::InputSettingsChanged { .. }
            | Notice::DisplayListChanged
            | Notice::PresetListChanged
            | Notice::ScreenLocked
            | Notice::ScreenUnlocked => return,
        };
        let _ = self.status_tx.send(event);
    }

    fn apply_settings(&mut self, new_settings: Settings, out: &mut Notices) {
        info!("applying new settings");
        let obs_changed = self.settings.obs != new_settings.obs;
        let presets_changed = self.settings.presets != new_settings.presets;

        self.settings.apply(new_settings);
        if let Err(err) = self.settings.save() {
            warn!("failed to persist settings: {err:#}");
            out.push(Notice::Error(format!("Failed to save settings: {err:#}")));
        }

        if obs_changed {
            // The doctor reconnects with the fresh parameters.
            self.connection.disconnect("applying new settings", out);
        }
        if presets_changed {
            out.push(Notice::PresetListChanged);
        }
    }

    fn apply_displays(&mut self, displays: Vec<String>, out: &mut Notices) {
        if same_names(&self.displays, &displays) {
            return;
        }
        info!(?displays, "display configuration changed");
        self.displays = displays;

        if self.settings.displays.absorb(&self.displays) {
            if let Err(err) = self.settings.save() {
                warn!("failed to persist display list: {err:#}");
            }
        }
        out.push(Notice::DisplayListChanged);
    }
}

async fn recv_or_pending(rx: &mut Option<mpsc::UnboundedReceiver<ObsEvent>>) -> Option<ObsEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until_or_pending(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Create command and status channels for the engine
pub fn create_engine_channels() -> (
    mpsc::Sender<Command>,
    mpsc::Receiver<Command>,
    broadcast::Sender<AppEvent>,
    broadcast::Receiver<AppEvent>,
) {
    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let (status_tx, status_rx) = broadcast::channel(64);
    (cmd_tx, cmd_rx, status_tx, status_rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obs::api::testing::{FakeHandle, Request};
    use std::time::Duration;
    use tokio::task::JoinHandle;
    use uuid::Uuid;

    struct Rig {
        handle: FakeHandle,
        cmd_tx: mpsc::Sender<Command>,
        display_tx: mpsc::UnboundedSender<Vec<String>>,
        lock_tx: mpsc::UnboundedSender<LockEvent>,
        status_rx: broadcast::Receiver<AppEvent>,
        engine: JoinHandle<Result<()>>,
    }

    impl Rig {
        /// Remote starts on "work"/"desk" with an active recording; one
        /// preset maps display "DELL" to "live"/"stage". The fake
        /// confirms every mutation with the matching event.
        fn start() -> Self {
            let handle = FakeHandle::default();
            handle.set_profiles("work", &["work", "live"]);
            handle.set_scene_collections("desk", &["desk", "stage"]);
            handle.set_recording(true, false);
            handle.auto_confirm();

            Self::start_with(handle)
        }

        fn start_with(handle: FakeHandle) -> Self {
            let config_path = std::env::temp_dir()
                .join(format!("obs-preset-helper-test-{}.toml", Uuid::new_v4()));
            let mut settings = Settings::load_from(config_path).unwrap();
            settings
                .presets
                .add(Preset::new(
                    "docked",
                    vec!["DELL".to_string()],
                    "live",
                    "stage",
                ))
                .unwrap();

            let (cmd_tx, cmd_rx, status_tx, status_rx) = create_engine_channels();
            let (display_tx, display_rx) = mpsc::unbounded_channel();
            let (lock_tx, lock_rx) = mpsc::unbounded_channel();

            let mut engine = Engine::new(
                settings,
                Arc::new(handle.factory()),
                cmd_rx,
                display_rx,
                lock_rx,
                status_tx,
            );
            let engine = tokio::spawn(async move { engine.run().await });

            Self {
                handle,
                cmd_tx,
                display_tx,
                lock_tx,
                status_rx,
                engine,
            }
        }

        /// Wait (with the paused clock auto-advancing) until the status
        /// feed yields an event the matcher accepts.
        async fn wait_for<T>(&mut self, matcher: impl Fn(&AppEvent) -> Option<T>) -> T {
            let deadline = Duration::from_secs(300);
            tokio::time::timeout(deadline, async {
                loop {
                    let event = self.status_rx.recv().await.expect("status feed closed");
                    if let Some(found) = matcher(&event) {
                        return found;
                    }
                }
            })
            .await
            .expect("status feed never produced the expected event")
        }

        async fn wait_connected(&mut self) {
            self.wait_for(|event| {
                matches!(
                    event,
                    AppEvent::ConnectionChanged {
                        state: ConnectionState::Connected,
                        ..
                    }
                )
                .then_some(())
            })
            .await;
        }

        async fn shutdown(self) {
            self.cmd_tx.send(Command::Shutdown).await.unwrap();
            self.engine.await.unwrap().unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn display_change_drives_a_full_preset_switch() {
        let mut rig = Rig::start();
        rig.wait_connected().await;
        rig.handle.clear_requests();

        rig.display_tx.send(vec!["DELL".to_string()]).unwrap();

        let preset = rig
            .wait_for(|event| match event {
                AppEvent::PresetActivated(preset) => Some(preset.clone()),
                _ => None,
            })
            .await;
        assert_eq!(preset.name, "docked");

        assert_eq!(
            rig.handle.requests(),
            vec![
                Request::StopRecord,
                Request::SetProfile("live".to_string()),
                Request::SetSceneCollection("stage".to_string()),
                Request::StartRecord,
            ]
        );
        rig.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn restarted_recording_announces_its_output_file() {
        let mut rig = Rig::start();
        rig.wait_connected().await;

        rig.display_tx.send(vec!["DELL".to_string()]).unwrap();

        let path = rig
            .wait_for(|event| match event {
                AppEvent::OutputFileChanged(path) => Some(path.clone()),
                _ => None,
            })
            .await;
        assert_eq!(path, "/tmp/recording.mkv");
        rig.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_display_snapshots_coalesce_into_one_pass() {
        let mut rig = Rig::start();
        rig.wait_connected().await;
        rig.handle.clear_requests();

        // A burst of redundant snapshots.
        rig.display_tx.send(vec!["DELL".to_string()]).unwrap();
        rig.display_tx.send(vec!["DELL".to_string()]).unwrap();
        rig.display_tx.send(vec!["DELL".to_string()]).unwrap();

        rig.wait_for(|event| {
            matches!(event, AppEvent::PresetActivated(_)).then_some(())
        })
        .await;

        let stops = rig
            .handle
            .requests()
            .iter()
            .filter(|r| **r == Request::StopRecord)
            .count();
        assert_eq!(stops, 1, "one reconciliation pass for the whole burst");
        rig.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn lost_connection_reconnects_after_the_delay() {
        let mut rig = Rig::start();
        rig.wait_connected().await;

        rig.handle.send_event(ObsEvent::Disconnected);
        rig.wait_for(|event| {
            matches!(
                event,
                AppEvent::ConnectionChanged {
                    state: ConnectionState::Disconnected,
                    ..
                }
            )
            .then_some(())
        })
        .await;

        // The doctor fires after the reconnect delay and a fresh
        // session comes up.
        rig.wait_connected().await;
        rig.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn new_obs_settings_force_a_reconnect() {
        let mut rig = Rig::start();
        rig.wait_connected().await;

        let mut updated = Settings::default();
        updated.obs.port = 4456;
        rig.cmd_tx
            .send(Command::ApplySettings(updated))
            .await
            .unwrap();

        let message = rig
            .wait_for(|event| match event {
                AppEvent::ConnectionChanged {
                    state: ConnectionState::Disconnected,
                    message,
                } => Some(message.clone()),
                _ => None,
            })
            .await;
        assert_eq!(message.as_deref(), Some("applying new settings"));

        rig.wait_connected().await;
        rig.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn lock_and_unlock_toggle_the_recording() {
        let mut rig = Rig::start();
        rig.wait_connected().await;
        rig.handle.clear_requests();

        rig.lock_tx.send(LockEvent::Locked).unwrap();
        rig.wait_for(|event| {
            matches!(event, AppEvent::RecordingChanged(RecordingState::Paused)).then_some(())
        })
        .await;

        rig.lock_tx.send(LockEvent::Unlocked).unwrap();
        rig.wait_for(|event| {
            matches!(event, AppEvent::RecordingChanged(RecordingState::Active)).then_some(())
        })
        .await;

        assert_eq!(
            rig.handle.requests(),
            vec![Request::PauseRecord, Request::ResumeRecord]
        );
        rig.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_suppresses_the_doctor() {
        let mut rig = Rig::start();
        rig.wait_connected().await;

        rig.cmd_tx.send(Command::Shutdown).await.unwrap();
        rig.engine.await.unwrap().unwrap();

        // Both teardown transitions made it out before the loop ended.
        let mut saw_shutting_down = false;
        let mut saw_disconnected = false;
        while let Ok(event) = rig.status_rx.try_recv() {
            match event {
                AppEvent::ConnectionChanged {
                    state: ConnectionState::ShuttingDown,
                    ..
                } => saw_shutting_down = true,
                AppEvent::ConnectionChanged {
                    state: ConnectionState::Disconnected,
                    ..
                } => saw_disconnected = true,
                _ => {}
            }
        }
        assert!(saw_shutting_down);
        assert!(saw_disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_connect_is_retried_until_obs_is_back() {
        let handle = FakeHandle::default();
        handle.set_profiles("work", &["work", "live"]);
        handle.set_scene_collections("desk", &["desk", "stage"]);
        handle.auto_confirm();
        handle.0.lock().unwrap().fail_connect = true;

        let mut rig = Rig::start_with(handle);

        rig.wait_for(|event| {
            matches!(
                event,
                AppEvent::ConnectionChanged {
                    state: ConnectionState::Error,
                    ..
                }
            )
            .then_some(())
        })
        .await;

        // OBS comes back; the next doctor attempt succeeds.
        rig.handle.0.lock().unwrap().fail_connect = false;
        rig.wait_connected().await;
        rig.shutdown().await;
    }
}
