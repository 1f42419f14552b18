//! Media Helper
//!
//! Local background service that keeps a managed yt-dlp binary installed and
//! current, and exposes audio extraction over a loopback HTTP API.

pub mod binary;
pub mod daemon;
pub mod extract;
pub mod notify;
pub mod proxy;
pub mod release;
pub mod server;
pub mod staging;
pub mod startup;
pub mod updater;

#[cfg(test)]
pub(crate) mod test_support;

pub use binary::{BinaryManager, ManagedBinary, UNKNOWN_VERSION};
pub use daemon::{Daemon, DaemonError};
pub use extract::{extract, extract_with, probe_version, ExtractError, ExtractedMedia};
pub use media_helper_config as config;
pub use media_helper_config::Config;
pub use notify::show_notification;
pub use proxy::{sanitize_filename, MediaProxy, ProxiedMedia, ProxyError};
pub use release::{Platform, ReleaseChecker, ReleaseError, ReleaseInfo};
pub use server::{create_router, AppState, ServerError};
pub use staging::{install_atomic, resolve_config_dir, StagingError};
pub use startup::{ensure_initial_binary, BinarySource, StartupError};
pub use updater::{UpdateError, UpdateOutcome, UpdateState, Updater};
