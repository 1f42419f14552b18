//! Filesystem staging for the managed binary.
//!
//! Resolves the per-user directory that holds the managed executable and
//! installs new executables with write-to-temp-then-rename, so a reader of the
//! target path only ever sees a complete file.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWriteExt};

/// Errors that can occur while staging an executable.
#[derive(Debug, Error)]
pub enum StagingError {
    /// Source could not be fully read or the temp file could not be written.
    #[error("Failed to write staged file: {0}")]
    Io(#[from] io::Error),

    /// The final rename onto the target failed. The temp file is left on disk.
    #[error("Failed to replace {target}: {source} (staged copy kept at {staged})")]
    Replace {
        target: PathBuf,
        staged: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Resolves the per-user configuration directory for the managed binary.
///
/// Uses the platform config directory, falling back to the system temp
/// directory when none is available. The directory is created if missing.
pub fn resolve_config_dir(dir_name: &str) -> PathBuf {
    resolve_config_dir_in(dirs::config_dir(), dir_name)
}

/// Same as [`resolve_config_dir`] with an explicit base directory.
pub fn resolve_config_dir_in(base: Option<PathBuf>, dir_name: &str) -> PathBuf {
    let base = base.unwrap_or_else(std::env::temp_dir);
    let dir = base.join(dir_name);

    if let Err(e) = std::fs::create_dir_all(&dir) {
        let fallback = std::env::temp_dir().join(dir_name);
        tracing::warn!(
            dir = %dir.display(),
            fallback = %fallback.display(),
            error = %e,
            "config directory unavailable, using temp directory"
        );
        // Creation errors surface later when installing into the directory.
        let _ = std::fs::create_dir_all(&fallback);
        return fallback;
    }

    dir
}

/// Sibling temp path used while staging `target`: `<name>.tmp`.
pub fn temp_path_for(target: &Path) -> PathBuf {
    let mut staged = target.as_os_str().to_owned();
    staged.push(".tmp");
    PathBuf::from(staged)
}

/// Atomically installs the bytes read from `source` at `target`.
///
/// The bytes are written to a sibling temp file, flushed to disk, marked
/// executable and then renamed over `target`. Rename within one directory is
/// atomic, so concurrent readers see either the previous file or the new one.
///
/// # Errors
///
/// * [`StagingError::Io`] if reading `source` or writing the temp file fails.
///   The temp file is removed on a best-effort basis.
/// * [`StagingError::Replace`] if the rename fails. The temp file is kept for
///   inspection.
pub async fn install_atomic<R>(target: &Path, source: R) -> Result<PathBuf, StagingError>
where
    R: AsyncRead + Unpin,
{
    let staged = stage(target, source).await?;
    commit(&staged, target).await
}

/// Writes `source` to the sibling temp file of `target` without replacing it.
///
/// Returns the staged path, ready for [`commit`].
pub async fn stage<R>(target: &Path, mut source: R) -> Result<PathBuf, StagingError>
where
    R: AsyncRead + Unpin,
{
    let staged = temp_path_for(target);

    if let Err(e) = write_staged(&staged, &mut source).await {
        let _ = tokio::fs::remove_file(&staged).await;
        return Err(StagingError::Io(e));
    }

    Ok(staged)
}

/// Renames a staged file over `target`.
pub async fn commit(staged: &Path, target: &Path) -> Result<PathBuf, StagingError> {
    tokio::fs::rename(staged, target)
        .await
        .map_err(|source| StagingError::Replace {
            target: target.to_path_buf(),
            staged: staged.to_path_buf(),
            source,
        })?;

    Ok(target.to_path_buf())
}

/// Installs a copy of an existing file at `target` via [`install_atomic`].
pub async fn install_from_file(target: &Path, source: &Path) -> Result<PathBuf, StagingError> {
    let file = tokio::fs::File::open(source).await?;
    install_atomic(target, file).await
}

async fn write_staged<R>(staged: &Path, source: &mut R) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o755);

    let mut file = options.open(staged).await?;
    tokio::io::copy(source, &mut file).await?;
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    mark_executable(staged).await
}

#[cfg(unix)]
async fn mark_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    // umask may have stripped bits from the create mode
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).await
}

#[cfg(not(unix))]
async fn mark_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}
