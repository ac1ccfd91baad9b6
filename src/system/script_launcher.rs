//! Single-flight script runner
//!
//! Runs one user command at a time on a spawned task and reports the
//! combined output back over a channel. A launch request while a script
//! is still running is rejected outright; queuing stale output paths
//! behind a slow script helps nobody.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Debug)]
pub struct ScriptOutcome {
    pub success: bool,
    pub logs: String,
}

pub struct ScriptLauncher {
    tx: mpsc::UnboundedSender<ScriptOutcome>,
    busy: Arc<AtomicBool>,
}

impl ScriptLauncher {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ScriptOutcome>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                busy: Arc::new(AtomicBool::new(false)),
            },
            rx,
        )
    }

    /// Start the command; returns whether it was accepted.
    pub fn launch(&self, command: Vec<String>) -> bool {
        let Some((program, args)) = command.split_first() else {
            warn!("refusing to launch an empty command");
            return false;
        };

        if self.busy.swap(true, Ordering::SeqCst) {
            warn!(program, "a script is still running, dropping this launch");
            return false;
        }

        let program = program.clone();
        let args = args.to_vec();
        let busy = self.busy.clone();
        let tx = self.tx.clone();

        tokio::spawn(async move {
            debug!(program, ?args, "launching script");
            let outcome = match Command::new(&program).args(&args).output().await {
                Ok(output) => {
                    let mut logs = String::from_utf8_lossy(&output.stdout).into_owned();
                    logs.push_str(&String::from_utf8_lossy(&output.stderr));
                    ScriptOutcome {
                        success: output.status.success(),
                        logs,
                    }
                }
                Err(err) => ScriptOutcome {
                    success: false,
                    logs: format!("failed to launch {program}: {err}"),
                },
            };
            busy.store(false, Ordering::SeqCst);
            let _ = tx.send(outcome);
        });
        true
    }
}
