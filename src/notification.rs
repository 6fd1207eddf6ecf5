//! Platform-specific desktop notifications
//!
//! Used to surface settings that failed to apply while the daemon runs
//! unattended:
//! - Linux: Uses notify-send (libnotify)
//! - macOS: Uses osascript (AppleScript)

use std::process::Stdio;
use tokio::process::Command;

const APP_NAME: &str = "Micgate";

/// Send a desktop notification with the given title and body.
///
/// Notification failures are logged but don't propagate errors
/// (notifications are best-effort).
pub async fn send(title: &str, body: &str) {
    #[cfg(target_os = "linux")]
    send_linux(title, body).await;

    #[cfg(target_os = "macos")]
    send_macos(title, body).await;

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        tracing::debug!("Notifications not supported on this platform");
        let _ = (title, body);
    }
}

/// Notify that settings could not be applied or the route failed to restart
pub async fn failure(message: &str) {
    send("Micgate needs attention", &truncate_body(message, 200)).await;
}

#[cfg(target_os = "linux")]
async fn send_linux(title: &str, body: &str) {
    let app_name = format!("--app-name={}", APP_NAME);
    let result = Command::new("notify-send")
        .args([app_name.as_str(), "--expire-time=4000", title, body])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    if let Err(e) = result {
        tracing::debug!("Failed to send notification: {}", e);
    }
}

#[cfg(target_os = "macos")]
async fn send_macos(title: &str, body: &str) {
    let script = format!(
        r#"display notification "{}" with title "{}" subtitle "{}""#,
        escape_applescript(body),
        APP_NAME,
        escape_applescript(title)
    );

    let result = Command::new("osascript")
        .args(["-e", &script])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    if let Err(e) = result {
        tracing::debug!("Failed to send notification: {}", e);
    }
}

#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn escape_applescript(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Keep notification bodies short; backend errors can be long
fn truncate_body(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    out.push_str("...");
    out
}
