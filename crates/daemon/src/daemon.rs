//! Daemon startup and main loop for the media helper
//!
//! Wires the binary manager, updater and HTTP server together.

use crate::binary::BinaryManager;
use crate::config::Config;
use crate::notify::show_notification;
use crate::proxy::{MediaProxy, ProxyError};
use crate::release::{Platform, ReleaseChecker, ReleaseError};
use crate::server::{self, AppState, ServerError};
use crate::staging::resolve_config_dir;
use crate::startup::{ensure_initial_binary, StartupError};
use crate::updater::Updater;
use axum::Router;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

/// Shortest accepted update interval
const MIN_UPDATE_INTERVAL: Duration = Duration::from_secs(60);

/// Error type for daemon operations
#[derive(Debug, Error)]
pub enum DaemonError {
    /// No usable managed binary
    #[error("Startup failed: {0}")]
    Startup(#[from] StartupError),

    /// Release feed client could not be built
    #[error("Release client error: {0}")]
    Release(#[from] ReleaseError),

    /// Media proxy client could not be built
    #[error("Proxy client error: {0}")]
    Proxy(#[from] ProxyError),

    /// Server error
    #[error("Server error: {0}")]
    Server(#[from] ServerError),
}

/// Daemon state containing all runtime components
pub struct Daemon {
    /// Configuration loaded from file and environment
    pub config: Config,
    /// Managed binary shared by the updater and request handlers
    pub binary: Arc<BinaryManager>,
    /// Directory holding the managed binary
    pub install_dir: PathBuf,
    platform: Platform,
    checker: ReleaseChecker,
    proxy: MediaProxy,
}

impl Daemon {
    /// Initialize the daemon
    ///
    /// Resolves the per-user config directory and makes sure a managed binary
    /// is installed there. Failing to obtain one aborts startup.
    pub async fn new(config: Config) -> Result<Self, DaemonError> {
        let install_dir = resolve_config_dir(&config.binary.dir_name);
        Self::with_install_dir(config, install_dir).await
    }

    /// Initialize the daemon with an explicit install directory
    pub async fn with_install_dir(config: Config, install_dir: PathBuf) -> Result<Self, DaemonError> {
        let platform = Platform::with_asset_override(config.binary.asset_name.as_deref());
        let checker = ReleaseChecker::new(config.updater.release_feed_url.clone())?;
        let proxy = MediaProxy::new(
            &config.proxy.user_agent,
            Duration::from_secs(config.proxy.timeout_secs),
        )?;

        let (initial, source) = ensure_initial_binary(
            &install_dir,
            &platform,
            config.binary.seed_path.as_deref(),
            &checker,
        )
        .await?;
        tracing::info!(
            path = %initial.path.display(),
            version = %initial.version,
            source = ?source,
            "managed binary ready"
        );

        Ok(Self {
            config,
            binary: Arc::new(BinaryManager::new(initial)),
            install_dir,
            platform,
            checker,
            proxy,
        })
    }

    /// Build the updater for this daemon's managed binary
    pub fn updater(&self) -> Arc<Updater> {
        let interval = Duration::from_secs(self.config.updater.interval_secs).max(MIN_UPDATE_INTERVAL);
        Arc::new(Updater::new(
            self.binary.clone(),
            self.checker.clone(),
            self.platform.clone(),
            self.install_dir.clone(),
            interval,
        ))
    }

    /// Start the background updater if enabled
    pub fn start_updater(&self) -> Option<JoinHandle<()>> {
        if !self.config.updater.enabled {
            tracing::info!("automatic updates disabled");
            return None;
        }
        Some(self.updater().spawn())
    }

    /// Router serving the status and audio endpoints
    pub fn router(&self) -> Result<Router, DaemonError> {
        let state = AppState {
            binary: self.binary.clone(),
            proxy: self.proxy.clone(),
        };
        Ok(server::create_router(state, &self.config.server.allowed_origin)?)
    }

    /// Run the daemon with all background tasks
    ///
    /// Starts the updater, binds the listener and serves requests until the
    /// process exits.
    pub async fn run(&self) -> Result<(), DaemonError> {
        let router = self.router()?;
        let addr = self.config.listen_addr();
        let listener = server::bind(&addr).await?;

        let _updater_handle = self.start_updater();

        tracing::info!(addr = %addr, "helper running on http://{}", addr);
        if self.config.notifications.enabled {
            show_notification(
                "tatatext Helper",
                "Running in background. YouTube transcription is now enabled.",
            );
        }

        server::serve(listener, router).await?;
        Ok(())
    }
}
