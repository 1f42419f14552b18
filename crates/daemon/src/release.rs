//! Release checker for the managed binary.
//!
//! Queries a GitHub-style "latest release" endpoint and picks the asset whose
//! name exactly matches the running platform.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

const FEED_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from a single release-feed query.
#[derive(Debug, Error)]
pub enum ReleaseError {
    /// Transport failure or non-success HTTP status.
    #[error("Release feed request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// No asset in the release matched the platform asset name.
    #[error("Asset {asset} not found in release {tag}")]
    NotFound { asset: String, tag: String },

    /// Release metadata could not be decoded.
    #[error("Malformed release metadata: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Latest published version and where to download it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseInfo {
    pub version: String,
    pub download_url: String,
}

#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
    #[serde(default)]
    assets: Vec<Asset>,
}

#[derive(Debug, Deserialize)]
struct Asset {
    name: String,
    browser_download_url: String,
}

/// Platform-specific names of the managed binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    /// Release asset to download.
    pub asset_name: String,
    /// File name of the installed executable.
    pub binary_file_name: String,
}

impl Platform {
    /// Names for the platform this process was compiled for.
    pub fn current() -> Self {
        let asset_name = if cfg!(target_os = "windows") {
            "yt-dlp.exe"
        } else if cfg!(target_os = "macos") {
            "yt-dlp_macos"
        } else if cfg!(target_arch = "aarch64") {
            "yt-dlp_linux_aarch64"
        } else {
            "yt-dlp_linux"
        };
        let binary_file_name = if cfg!(target_os = "windows") {
            "yt-dlp.exe"
        } else {
            "yt-dlp"
        };

        Self {
            asset_name: asset_name.to_string(),
            binary_file_name: binary_file_name.to_string(),
        }
    }

    /// Current platform with an optional asset name override.
    pub fn with_asset_override(asset_name: Option<&str>) -> Self {
        let mut platform = Self::current();
        if let Some(name) = asset_name.filter(|n| !n.is_empty()) {
            platform.asset_name = name.to_string();
        }
        platform
    }
}

/// Picks the release asset named `asset_name` out of raw release metadata.
pub fn select_asset(metadata: &str, asset_name: &str) -> Result<ReleaseInfo, ReleaseError> {
    let release: Release = serde_json::from_str(metadata)?;

    release
        .assets
        .into_iter()
        .find(|asset| asset.name == asset_name)
        .map(|asset| ReleaseInfo {
            version: release.tag_name.clone(),
            download_url: asset.browser_download_url,
        })
        .ok_or_else(|| ReleaseError::NotFound {
            asset: asset_name.to_string(),
            tag: release.tag_name.clone(),
        })
}

/// Client for the release-metadata endpoint.
#[derive(Debug, Clone)]
pub struct ReleaseChecker {
    client: reqwest::Client,
    feed_url: String,
}

impl ReleaseChecker {
    /// Build a checker with its own HTTP client.
    pub fn new(feed_url: impl Into<String>) -> Result<Self, ReleaseError> {
        // GitHub rejects API requests without a User-Agent
        let client = reqwest::Client::builder()
            .user_agent(concat!("media-helper/", env!("CARGO_PKG_VERSION")))
            .timeout(FEED_TIMEOUT)
            .build()?;
        Ok(Self::with_client(client, feed_url))
    }

    pub fn with_client(client: reqwest::Client, feed_url: impl Into<String>) -> Self {
        Self {
            client,
            feed_url: feed_url.into(),
        }
    }

    pub fn feed_url(&self) -> &str {
        &self.feed_url
    }

    /// HTTP client shared with asset downloads.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Fetch the latest release and select the asset for `platform`.
    ///
    /// Performs exactly one request; retrying is the caller's business.
    pub async fn latest_release(&self, platform: &Platform) -> Result<ReleaseInfo, ReleaseError> {
        let response = self
            .client
            .get(&self.feed_url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await?
            .error_for_status()?;

        let body = response.text().await?;
        select_asset(&body, &platform.asset_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{closed_addr, spawn_server};
    use axum::{http::StatusCode, routing::get, Router};

    const RELEASE_JSON: &str = r#"{
        "tag_name": "2024.02.01",
        "name": "yt-dlp 2024.02.01",
        "assets": [
            {"name": "yt-dlp", "browser_download_url": "https://dl/yt-dlp", "size": 10},
            {"name": "yt-dlp.exe", "browser_download_url": "https://dl/yt-dlp.exe", "size": 20},
            {"name": "yt-dlp_macos", "browser_download_url": "https://dl/yt-dlp_macos", "size": 30},
            {"name": "yt-dlp_linux", "browser_download_url": "https://dl/yt-dlp_linux", "size": 40}
        ]
    }"#;

    fn platform(asset: &str) -> Platform {
        Platform::with_asset_override(Some(asset))
    }

    #[test]
    fn test_select_asset_exact_match() {
        let info = select_asset(RELEASE_JSON, "yt-dlp_macos").unwrap();
        assert_eq!(info.version, "2024.02.01");
        assert_eq!(info.download_url, "https://dl/yt-dlp_macos");

        let info = select_asset(RELEASE_JSON, "yt-dlp.exe").unwrap();
        assert_eq!(info.download_url, "https://dl/yt-dlp.exe");
    }

    #[test]
    fn test_select_asset_requires_exact_name() {
        // "yt-dlp_mac" is a prefix of an asset but not an asset
        let result = select_asset(RELEASE_JSON, "yt-dlp_mac");
        match result {
            Err(ReleaseError::NotFound { asset, tag }) => {
                assert_eq!(asset, "yt-dlp_mac");
                assert_eq!(tag, "2024.02.01");
            }
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_select_asset_without_assets() {
        let result = select_asset(r#"{"tag_name": "2024.02.01"}"#, "yt-dlp_linux");
        assert!(matches!(result, Err(ReleaseError::NotFound { .. })));
    }

    #[test]
    fn test_select_asset_malformed_metadata() {
        assert!(matches!(
            select_asset("<html>rate limited</html>", "yt-dlp"),
            Err(ReleaseError::Parse(_))
        ));
        assert!(matches!(
            select_asset(r#"{"assets": []}"#, "yt-dlp"),
            Err(ReleaseError::Parse(_))
        ));
    }

    #[test]
    fn test_platform_current_names() {
        let platform = Platform::current();
        assert!(platform.asset_name.starts_with("yt-dlp"));
        if cfg!(target_os = "windows") {
            assert_eq!(platform.binary_file_name, "yt-dlp.exe");
        } else {
            assert_eq!(platform.binary_file_name, "yt-dlp");
        }
    }

    #[test]
    fn test_platform_override_ignores_empty() {
        assert_eq!(Platform::with_asset_override(Some("")), Platform::current());
        assert_eq!(Platform::with_asset_override(None), Platform::current());
        assert_eq!(platform("custom").asset_name, "custom");
    }

    #[tokio::test]
    async fn test_latest_release_over_http() {
        let addr = spawn_server(Router::new().route("/latest", get(|| async { RELEASE_JSON }))).await;
        let checker = ReleaseChecker::new(format!("http://{}/latest", addr)).unwrap();

        let info = checker.latest_release(&platform("yt-dlp_linux")).await.unwrap();
        assert_eq!(
            info,
            ReleaseInfo {
                version: "2024.02.01".to_string(),
                download_url: "https://dl/yt-dlp_linux".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_latest_release_error_status_is_network_error() {
        let addr = spawn_server(Router::new().route(
            "/latest",
            get(|| async { (StatusCode::FORBIDDEN, "rate limited") }),
        ))
        .await;
        let checker = ReleaseChecker::new(format!("http://{}/latest", addr)).unwrap();

        let result = checker.latest_release(&platform("yt-dlp_linux")).await;
        assert!(matches!(result, Err(ReleaseError::Network(_))));
    }

    #[tokio::test]
    async fn test_latest_release_unreachable_feed() {
        let addr = closed_addr().await;
        let checker = ReleaseChecker::new(format!("http://{}/latest", addr)).unwrap();

        let result = checker.latest_release(&platform("yt-dlp_linux")).await;
        assert!(matches!(result, Err(ReleaseError::Network(_))));
    }

    #[tokio::test]
    async fn test_latest_release_malformed_body() {
        let addr = spawn_server(Router::new().route("/latest", get(|| async { "not json" }))).await;
        let checker = ReleaseChecker::new(format!("http://{}/latest", addr)).unwrap();

        let result = checker.latest_release(&platform("yt-dlp_linux")).await;
        assert!(matches!(result, Err(ReleaseError::Parse(_))));
    }
}
