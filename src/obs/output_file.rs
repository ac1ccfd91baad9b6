//! Output file announcements
//!
//! Turns record-started events into output-file notices. Every started
//! event carrying a path is announced, even when OBS reuses the previous
//! path: a restarted recording is a new file.

use tracing::info;

use super::api::OutputSignal;
use super::{Notice, Notices};

#[derive(Debug, Default)]
pub struct OutputFile;

impl OutputFile {
    pub fn apply_signal(&self, signal: OutputSignal, path: Option<String>, out: &mut Notices) {
        if signal != OutputSignal::Started {
            return;
        }
        let Some(path) = path else {
            return;
        };
        info!(path, "recording output file changed");
        out.push(Notice::OutputFileChanged(path));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_started_events_with_a_path_are_announced() {
        let output = OutputFile;
        let mut out = Notices::new();

        output.apply_signal(OutputSignal::Starting, None, &mut out);
        output.apply_signal(OutputSignal::Started, None, &mut out);
        output.apply_signal(OutputSignal::Stopped, Some("/tmp/a.mkv".to_string()), &mut out);
        assert!(out.is_empty());

        output.apply_signal(OutputSignal::Started, Some("/tmp/a.mkv".to_string()), &mut out);
        assert_eq!(out.len(), 1);
        assert!(matches!(&out[0], Notice::OutputFileChanged(p) if p == "/tmp/a.mkv"));

        // A restart into the same path is still a fresh file.
        output.apply_signal(OutputSignal::Started, Some("/tmp/a.mkv".to_string()), &mut out);
        assert_eq!(out.len(), 2);
    }
}
