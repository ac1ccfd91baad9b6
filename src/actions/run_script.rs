//! Launch a user script whenever the recording output file changes
//!
//! The configured command line gets the new file path appended as its
//! last argument. Execution is delegated to the launcher; its outcome
//! comes back to the engine asynchronously.

use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::obs::Notice;
use crate::system::script_launcher::ScriptLauncher;

#[derive(Debug, Default)]
pub struct RunScriptOnOutputFileChange;

impl RunScriptOnOutputFileChange {
    pub fn handle_notice(&self, notice: &Notice, settings: &Settings, launcher: &ScriptLauncher) {
        let Notice::OutputFileChanged(path) = notice else {
            return;
        };

        let command = settings.helper.output_file_change_script.trim();
        if command.is_empty() {
            debug!("no output-file script configured");
            return;
        }

        // Shell-style tokenization: quoted arguments stay intact.
        let Some(mut parts) = shlex::split(command) else {
            warn!(command, "output-file script has unbalanced quoting, not running it");
            return;
        };
        parts.push(path.clone());
        info!(?parts, "running output-file script");
        launcher.launch(parts);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_with_script(script: &str) -> Settings {
        let mut settings = Settings::default();
        settings.helper.output_file_change_script = script.to_string();
        settings
    }

    #[tokio::test]
    async fn appends_the_path_and_launches() {
        let (launcher, mut rx) = ScriptLauncher::new();
        let action = RunScriptOnOutputFileChange;
        let settings = settings_with_script("/bin/echo uploaded");

        action.handle_notice(
            &Notice::OutputFileChanged("/tmp/rec.mkv".to_string()),
            &settings,
            &launcher,
        );

        let outcome = rx.recv().await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.logs.trim(), "uploaded /tmp/rec.mkv");
    }

    #[tokio::test]
    async fn quoted_arguments_survive_tokenization() {
        let (launcher, mut rx) = ScriptLauncher::new();
        let action = RunScriptOnOutputFileChange;
        let settings = settings_with_script("/bin/echo \"recording started\"");

        action.handle_notice(
            &Notice::OutputFileChanged("/tmp/rec.mkv".to_string()),
            &settings,
            &launcher,
        );

        let outcome = rx.recv().await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.logs.trim(), "recording started /tmp/rec.mkv");
    }

    #[tokio::test]
    async fn unbalanced_quoting_is_refused() {
        let (launcher, mut rx) = ScriptLauncher::new();
        let action = RunScriptOnOutputFileChange;

        action.handle_notice(
            &Notice::OutputFileChanged("/tmp/rec.mkv".to_string()),
            &settings_with_script("/bin/echo \"oops"),
            &launcher,
        );

        drop(launcher);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn empty_command_and_other_notices_do_nothing() {
        let (launcher, mut rx) = ScriptLauncher::new();
        let action = RunScriptOnOutputFileChange;

        action.handle_notice(
            &Notice::OutputFileChanged("/tmp/rec.mkv".to_string()),
            &settings_with_script("   "),
            &launcher,
        );
        action.handle_notice(
            &Notice::DisplayListChanged,
            &settings_with_script("/bin/echo hi"),
            &launcher,
        );

        drop(launcher);
        assert!(rx.recv().await.is_none());
    }
}
