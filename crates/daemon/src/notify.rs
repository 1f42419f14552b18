//! Desktop notifications.
//!
//! Fire-and-forget: the platform notifier is spawned and never awaited, and
//! any failure is only logged.

use std::process::{Command, Stdio};

/// Build the platform notifier command, if this platform has one.
pub fn build_notification_command(title: &str, message: &str) -> Option<Command> {
    if cfg!(target_os = "macos") {
        let script = format!(
            "display notification \"{}\" with title \"{}\"",
            escape_double_quoted(message),
            escape_double_quoted(title)
        );
        let mut cmd = Command::new("osascript");
        cmd.arg("-e").arg(script);
        Some(cmd)
    } else if cfg!(target_os = "windows") {
        let script = format!(
            "Add-Type -AssemblyName System.Windows.Forms; [System.Windows.Forms.MessageBox]::Show('{}','{}')",
            escape_single_quoted(message),
            escape_single_quoted(title)
        );
        let mut cmd = Command::new("powershell");
        cmd.arg("-NoProfile").arg("-Command").arg(script);
        Some(cmd)
    } else if cfg!(target_os = "linux") {
        let mut cmd = Command::new("notify-send");
        cmd.arg(title).arg(message);
        Some(cmd)
    } else {
        None
    }
}

/// Show a desktop notification without waiting for it.
pub fn show_notification(title: &str, message: &str) {
    let Some(mut cmd) = build_notification_command(title, message) else {
        return;
    };
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    if let Err(e) = cmd.spawn() {
        tracing::debug!(error = %e, "desktop notification unavailable");
    }
}

/// AppleScript string literal escaping
fn escape_double_quoted(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// PowerShell single-quoted literal escaping
fn escape_single_quoted(text: &str) -> String {
    text.replace('\'', "''")
}
