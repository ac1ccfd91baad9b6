//! Display configuration watcher
//!
//! On macOS the attached displays are polled through CoreGraphics and a
//! deduplicated snapshot is pushed to the engine whenever the set
//! changes. Other platforms get no built-in provider yet; external
//! providers can push snapshots into the same channel.

use tokio::sync::mpsc;

#[cfg(target_os = "macos")]
const POLL_INTERVAL: std::time::Duration = std::time::Duration::from_secs(2);

/// Spawn the platform display watcher feeding snapshots into `tx`.
#[cfg(target_os = "macos")]
pub fn spawn(tx: mpsc::UnboundedSender<Vec<String>>) {
    use tracing::{debug, warn};

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(POLL_INTERVAL);
        let mut last: Option<Vec<String>> = None;

        loop {
            interval.tick().await;

            let displays = match active_display_ids() {
                Ok(displays) => displays,
                Err(err) => {
                    warn!("failed to enumerate displays: {err:#}");
                    continue;
                }
            };

            if last.as_ref() == Some(&displays) {
                continue;
            }
            debug!(?displays, "display configuration changed");
            last = Some(displays.clone());

            if tx.send(displays).is_err() {
                return;
            }
        }
    });
}

/// Stable display identifiers: vendor, model and serial make the same
/// panel recognizable across reconnects and reboots.
#[cfg(target_os = "macos")]
fn active_display_ids() -> anyhow::Result<Vec<String>> {
    use core_graphics::display::CGDisplay;

    let ids = CGDisplay::active_displays()
        .map_err(|code| anyhow::anyhow!("CGGetActiveDisplayList failed with code {code}"))?;

    let mut displays: Vec<String> = ids
        .into_iter()
        .map(|id| {
            let display = CGDisplay::new(id);
            format!(
                "{:04X}:{:04X}:{:08X}",
                display.vendor_number(),
                display.model_number(),
                display.serial_number()
            )
        })
        .collect();
    displays.sort();
    Ok(displays)
}

#[cfg(not(target_os = "macos"))]
pub fn spawn(tx: mpsc::UnboundedSender<Vec<String>>) {
    // TODO: wire up a display provider for Windows/Linux; until then
    // snapshots only arrive from external providers.
    let _ = tx;
}
