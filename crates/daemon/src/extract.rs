//! Media URL extraction through the managed binary.
//!
//! The binary is asked for the best audio-only format and prints two lines:
//! the media title and the direct media URL. Everything else in the crate
//! only sees the resulting [`ExtractedMedia`].

use crate::binary::BinaryManager;
use std::path::Path;
use thiserror::Error;
use tokio::process::Command;

/// Title used when the binary prints an empty first line.
pub const DEFAULT_TITLE: &str = "YouTube Video";

/// Format selector: m4a audio when available, any best audio otherwise.
const AUDIO_FORMAT: &str = "bestaudio[ext=m4a]/bestaudio";

/// Output template printing the title and URL on separate lines.
const PRINT_TEMPLATE: &str = "%(title)s\n%(url)s";

/// Error type for extraction
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The binary could not be started.
    #[error("failed to run {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    /// The binary exited unsuccessfully.
    #[error("yt-dlp failed: {0}")]
    Failed(String),

    /// No media URL in the output.
    #[error("no audio URL found")]
    NoMediaUrl,
}

/// Title and direct media URL for one source URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedMedia {
    pub title: String,
    pub media_url: String,
}

/// Build the extraction command for `binary` and `source_url`.
///
/// `--` keeps a source URL starting with `-` from being read as an option.
pub fn build_extract_command(binary: &Path, source_url: &str) -> Command {
    let mut cmd = Command::new(binary);
    cmd.arg("--no-playlist")
        .arg("-f")
        .arg(AUDIO_FORMAT)
        .arg("--print")
        .arg(PRINT_TEMPLATE)
        .arg("--")
        .arg(source_url);
    cmd.kill_on_drop(true);
    cmd
}

/// Parse the two-line output of the extraction command.
pub fn parse_extract_output(stdout: &str) -> Result<ExtractedMedia, ExtractError> {
    // only trailing whitespace: an empty title line must keep its position
    let mut lines = stdout.trim_end().splitn(2, '\n');

    let title = lines
        .next()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_TITLE)
        .to_string();

    let media_url = lines
        .next()
        .and_then(|rest| rest.lines().next())
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or(ExtractError::NoMediaUrl)?
        .to_string();

    Ok(ExtractedMedia { title, media_url })
}

/// Resolve `source_url` with the binary at `binary`.
pub async fn extract_with(binary: &Path, source_url: &str) -> Result<ExtractedMedia, ExtractError> {
    let output = build_extract_command(binary, source_url)
        .output()
        .await
        .map_err(|source| ExtractError::Spawn {
            binary: binary.display().to_string(),
            source,
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let reason = stderr
            .lines()
            .rev()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| output.status.to_string());
        return Err(ExtractError::Failed(reason));
    }

    parse_extract_output(&String::from_utf8_lossy(&output.stdout))
}

/// Resolve `source_url` with the currently managed binary.
///
/// The snapshot is taken once; an update landing mid-call does not affect
/// this invocation.
pub async fn extract(
    binary: &BinaryManager,
    source_url: &str,
) -> Result<ExtractedMedia, ExtractError> {
    let snapshot = binary.current();
    extract_with(&snapshot.path, source_url).await
}

/// Ask the binary for its version; `None` if it cannot be run or prints nothing.
pub async fn probe_version(binary: &Path) -> Option<String> {
    let output = Command::new(binary)
        .arg("--version")
        .kill_on_drop(true)
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!version.is_empty()).then_some(version)
}
