//! Startup module for the media helper
//!
//! Makes sure a managed binary exists before the server starts:
//! - reuse an already installed binary (possibly replaced by an earlier update)
//! - otherwise install the bundled seed executable
//! - otherwise fetch the latest release
//!
//! Failing all three is the one fatal startup condition.

use crate::binary::ManagedBinary;
use crate::extract::probe_version;
use crate::release::{Platform, ReleaseChecker, ReleaseError};
use crate::staging::{self, StagingError};
use crate::updater::{download_and_install, UpdateError};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error types for startup
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Failed to install seed binary {path}: {source}")]
    Seed {
        path: PathBuf,
        #[source]
        source: StagingError,
    },

    #[error("No managed binary available and release lookup failed: {0}")]
    Release(#[from] ReleaseError),

    #[error("No managed binary available and download failed: {0}")]
    Download(#[from] UpdateError),
}

/// Where the initial binary came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinarySource {
    Existing,
    Seed,
    Release,
}

/// Resolve or install the initial managed binary in `install_dir`.
///
/// The returned snapshot carries the probed version for an existing or seeded
/// binary, and the release tag for a freshly downloaded one.
pub async fn ensure_initial_binary(
    install_dir: &Path,
    platform: &Platform,
    seed: Option<&Path>,
    checker: &ReleaseChecker,
) -> Result<(ManagedBinary, BinarySource), StartupError> {
    let target = install_dir.join(&platform.binary_file_name);

    if target.is_file() {
        let version = probe_version(&target).await.unwrap_or_default();
        tracing::info!(path = %target.display(), version = %version, "using installed binary");
        return Ok((ManagedBinary::new(target, version), BinarySource::Existing));
    }

    if let Some(seed) = seed {
        staging::install_from_file(&target, seed)
            .await
            .map_err(|source| StartupError::Seed {
                path: seed.to_path_buf(),
                source,
            })?;
        let version = probe_version(&target).await.unwrap_or_default();
        tracing::info!(
            seed = %seed.display(),
            path = %target.display(),
            version = %version,
            "installed bundled binary"
        );
        return Ok((ManagedBinary::new(target, version), BinarySource::Seed));
    }

    tracing::info!(feed = checker.feed_url(), "no bundled binary, fetching latest release");
    let release = checker.latest_release(platform).await?;
    let installed = download_and_install(checker.client(), &release.download_url, &target).await?;
    tracing::info!(
        path = %installed.display(),
        version = %release.version,
        "installed binary from release feed"
    );
    Ok((ManagedBinary::new(installed, release.version), BinarySource::Release))
}
