//! Background updater for the managed binary.
//!
//! One cycle walks `Idle -> Checking -> (UpToDate | Downloading -> Installing | Failed) -> Idle`.
//! Cycles run sequentially on a fixed interval; any failure is logged and the
//! installed binary stays in place until the next tick.

use crate::binary::BinaryManager;
use crate::release::{Platform, ReleaseChecker, ReleaseError};
use crate::staging::{self, StagingError};
use futures_util::TryStreamExt;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::io::StreamReader;

/// Error type for a failed update cycle
#[derive(Debug, Error)]
pub enum UpdateError {
    /// Release feed could not be queried
    #[error("Update check failed: {0}")]
    Release(#[from] ReleaseError),

    /// Asset download could not be started
    #[error("Update download failed: {0}")]
    Download(#[from] reqwest::Error),

    /// Asset body broke off partway through the download
    #[error("Update download interrupted: {0}")]
    Interrupted(#[source] io::Error),

    /// Downloaded asset could not be installed
    #[error("Update install failed: {0}")]
    Install(#[from] StagingError),
}

/// Stage of the update state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateState {
    Idle,
    Checking,
    UpToDate,
    Downloading,
    Installing,
    Failed,
}

impl Default for UpdateState {
    fn default() -> Self {
        Self::Idle
    }
}

impl std::fmt::Display for UpdateState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdateState::Idle => write!(f, "idle"),
            UpdateState::Checking => write!(f, "checking"),
            UpdateState::UpToDate => write!(f, "up_to_date"),
            UpdateState::Downloading => write!(f, "downloading"),
            UpdateState::Installing => write!(f, "installing"),
            UpdateState::Failed => write!(f, "failed"),
        }
    }
}

/// Result of one update cycle.
#[derive(Debug)]
pub enum UpdateOutcome {
    /// Feed version equals the installed version; nothing was written.
    UpToDate { version: String },
    /// A new binary was installed.
    Updated { from: String, to: String },
    /// The cycle was abandoned; the previous binary is still installed.
    Failed(UpdateError),
}

/// Streams `url` into the staging slot next to `target`.
///
/// Returns the staged path; the caller commits it.
pub async fn download_to_stage(
    client: &reqwest::Client,
    url: &str,
    target: &Path,
) -> Result<PathBuf, UpdateError> {
    let response = client.get(url).send().await?.error_for_status()?;
    let body = StreamReader::new(response.bytes_stream().map_err(io::Error::other));
    staging::stage(target, body).await.map_err(|e| match e {
        StagingError::Io(e) if is_body_error(&e) => UpdateError::Interrupted(e),
        other => UpdateError::Install(other),
    })
}

/// Whether a staging IO error came from the response body rather than the disk.
fn is_body_error(e: &io::Error) -> bool {
    e.get_ref().is_some_and(|inner| inner.is::<reqwest::Error>())
}

/// Downloads `url` and atomically installs it at `target`.
pub async fn download_and_install(
    client: &reqwest::Client,
    url: &str,
    target: &Path,
) -> Result<PathBuf, UpdateError> {
    let staged = download_to_stage(client, url, target).await?;
    Ok(staging::commit(&staged, target).await?)
}

/// Periodic checker that keeps the managed binary current.
pub struct Updater {
    binary: Arc<BinaryManager>,
    checker: ReleaseChecker,
    platform: Platform,
    install_dir: PathBuf,
    interval: Duration,
    state: Mutex<UpdateState>,
}

impl Updater {
    pub fn new(
        binary: Arc<BinaryManager>,
        checker: ReleaseChecker,
        platform: Platform,
        install_dir: PathBuf,
        interval: Duration,
    ) -> Self {
        Self {
            binary,
            checker,
            platform,
            install_dir,
            interval,
            state: Mutex::new(UpdateState::Idle),
        }
    }

    /// Current state of the state machine.
    pub fn state(&self) -> UpdateState {
        *self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Path the next update is installed at.
    pub fn target_path(&self) -> PathBuf {
        self.install_dir.join(&self.platform.binary_file_name)
    }

    fn transition(&self, next: UpdateState) {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        let prev = *state;
        *state = next;
        tracing::debug!(from = %prev, to = %next, "updater transition");
    }

    /// Run one update cycle to completion.
    ///
    /// Never returns an error: failures are reported in the outcome and the
    /// machine is back in `Idle` when this returns.
    pub async fn check_cycle(&self) -> UpdateOutcome {
        self.transition(UpdateState::Checking);
        tracing::info!(state = %UpdateState::Checking, feed = self.checker.feed_url(), "checking for updates");

        let outcome = match self.try_update().await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.transition(UpdateState::Failed);
                tracing::warn!(state = %UpdateState::Failed, error = %e, "update cycle failed");
                UpdateOutcome::Failed(e)
            }
        };

        self.transition(UpdateState::Idle);
        outcome
    }

    async fn try_update(&self) -> Result<UpdateOutcome, UpdateError> {
        let release = self.checker.latest_release(&self.platform).await?;
        let current = self.binary.current();

        if current.version == release.version {
            self.transition(UpdateState::UpToDate);
            tracing::info!(state = %UpdateState::UpToDate, version = %current.version, "managed binary is up to date");
            return Ok(UpdateOutcome::UpToDate {
                version: current.version,
            });
        }

        self.transition(UpdateState::Downloading);
        tracing::info!(
            state = %UpdateState::Downloading,
            from = %current.version,
            to = %release.version,
            url = %release.download_url,
            "downloading update"
        );
        let target = self.target_path();
        let staged = download_to_stage(self.checker.client(), &release.download_url, &target).await?;

        self.transition(UpdateState::Installing);
        let installed = staging::commit(&staged, &target).await?;
        self.binary.install(&installed, &release.version);
        tracing::info!(
            state = %UpdateState::Installing,
            version = %release.version,
            path = %installed.display(),
            "managed binary updated"
        );

        Ok(UpdateOutcome::Updated {
            from: current.version,
            to: release.version,
        })
    }

    /// Check immediately, then once per interval, for the life of the process.
    ///
    /// Cycles run one after another; ticks missed during a long cycle are skipped.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            self.check_cycle().await;
        }
    }

    /// Spawn [`run`](Self::run) as a background task.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }
}
