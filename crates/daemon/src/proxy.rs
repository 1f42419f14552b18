//! Streaming proxy for extracted media.
//!
//! Opens a streamed GET to the media URL and hands back the response headers
//! the caller needs plus the body as a byte stream, never buffering the
//! whole payload.

use axum::body::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use std::time::Duration;
use thiserror::Error;

/// Longest sanitized title, in characters.
pub const MAX_FILENAME_CHARS: usize = 80;

/// Content type assumed when the upstream does not send one.
pub const DEFAULT_CONTENT_TYPE: &str = "audio/mp4";

const RESERVED_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Error type for the media proxy
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Upstream request could not be established or was rejected.
    #[error("download failed: {0}")]
    Upstream(#[from] reqwest::Error),
}

/// Replace reserved filename characters with `_` and cap the length.
pub fn sanitize_filename(title: &str) -> String {
    title
        .chars()
        .map(|c| if RESERVED_CHARS.contains(&c) { '_' } else { c })
        .take(MAX_FILENAME_CHARS)
        .collect()
}

/// File extension for an upstream content type.
pub fn extension_for_content_type(content_type: &str) -> &'static str {
    if content_type.contains("webm") || content_type.contains("ogg") {
        "webm"
    } else {
        "m4a"
    }
}

/// Upstream media ready to be forwarded to the caller.
pub struct ProxiedMedia {
    pub content_type: String,
    pub content_length: Option<u64>,
    pub extension: &'static str,
    /// Sanitized title plus extension.
    pub filename: String,
    /// Raw extracted title.
    pub title: String,
    pub body: BoxStream<'static, Result<Bytes, reqwest::Error>>,
}

impl ProxiedMedia {
    /// `attachment; filename="<title>.<ext>"`
    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.filename)
    }
}

impl std::fmt::Debug for ProxiedMedia {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxiedMedia")
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .field("extension", &self.extension)
            .field("filename", &self.filename)
            .field("title", &self.title)
            .finish_non_exhaustive()
    }
}

/// HTTP client for upstream media downloads.
#[derive(Debug, Clone)]
pub struct MediaProxy {
    client: reqwest::Client,
}

impl MediaProxy {
    /// Client with a browser-like User-Agent and a total request timeout.
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, ProxyError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    /// Open a streamed GET to `media_url` and derive the response metadata.
    pub async fn proxy(&self, media_url: &str, title: &str) -> Result<ProxiedMedia, ProxyError> {
        let response = self.client.get(media_url).send().await?.error_for_status()?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let content_length = response
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let extension = extension_for_content_type(&content_type);

        Ok(ProxiedMedia {
            filename: format!("{}.{}", sanitize_filename(title), extension),
            title: title.to_string(),
            content_type,
            content_length,
            extension,
            body: response.bytes_stream().boxed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{closed_addr, spawn_server};
    use axum::http::{header, StatusCode};
    use axum::routing::get;
    use axum::Router;
    use futures_util::TryStreamExt;
    use proptest::prelude::*;

    fn proxy() -> MediaProxy {
        MediaProxy::new("Mozilla/5.0", Duration::from_secs(300)).unwrap()
    }

    #[test]
    fn test_sanitize_replaces_reserved() {
        assert_eq!(
            sanitize_filename(r#"a/b\c:d*e?f"g<h>i|j"#),
            "a_b_c_d_e_f_g_h_i_j"
        );
    }

    #[test]
    fn test_sanitize_caps_characters_not_bytes() {
        let title: String = std::iter::repeat('é').take(100).collect();
        let sanitized = sanitize_filename(&title);
        assert_eq!(sanitized.chars().count(), MAX_FILENAME_CHARS);
    }

    #[test]
    fn test_extension_from_content_type() {
        assert_eq!(extension_for_content_type("audio/webm"), "webm");
        assert_eq!(extension_for_content_type("audio/ogg; codecs=opus"), "webm");
        assert_eq!(extension_for_content_type("audio/mp4"), "m4a");
        assert_eq!(extension_for_content_type("application/octet-stream"), "m4a");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_sanitized_has_no_reserved_chars(title in "\\PC{0,200}") {
            let sanitized = sanitize_filename(&title);
            prop_assert!(!sanitized.contains(RESERVED_CHARS));
            prop_assert!(sanitized.chars().count() <= MAX_FILENAME_CHARS);
        }

        #[test]
        fn prop_safe_short_title_unchanged(title in "[a-zA-Z0-9 ._'()-]{0,79}") {
            prop_assert_eq!(sanitize_filename(&title), title);
        }
    }

    #[tokio::test]
    async fn test_proxy_streams_body_and_headers() {
        let payload: Vec<u8> = (0..64 * 1024).map(|i| (i % 251) as u8).collect();
        let served = payload.clone();
        let router = Router::new().route(
            "/media",
            get(move || {
                let served = served.clone();
                async move { ([(header::CONTENT_TYPE, "audio/webm")], served) }
            }),
        );
        let addr = spawn_server(router).await;

        let media = proxy()
            .proxy(&format!("http://{}/media", addr), "Song: Live?")
            .await
            .unwrap();

        assert_eq!(media.content_type, "audio/webm");
        assert_eq!(media.content_length, Some(payload.len() as u64));
        assert_eq!(media.extension, "webm");
        assert_eq!(media.filename, "Song_ Live_.webm");
        assert_eq!(media.title, "Song: Live?");
        assert_eq!(
            media.content_disposition(),
            "attachment; filename=\"Song_ Live_.webm\""
        );

        let chunks: Vec<Bytes> = media.body.try_collect().await.unwrap();
        let received: Vec<u8> = chunks.concat();
        assert_eq!(received, payload);
    }

    #[tokio::test]
    async fn test_proxy_defaults_content_type() {
        let router = Router::new().route(
            "/media",
            get(|| async { ([(header::CONTENT_TYPE, "")], "abc") }),
        );
        let addr = spawn_server(router).await;

        let media = proxy()
            .proxy(&format!("http://{}/media", addr), "t")
            .await
            .unwrap();
        assert_eq!(media.content_type, DEFAULT_CONTENT_TYPE);
        assert_eq!(media.extension, "m4a");
    }

    #[tokio::test]
    async fn test_proxy_upstream_error_status() {
        let router = Router::new().route("/media", get(|| async { StatusCode::FORBIDDEN }));
        let addr = spawn_server(router).await;

        let result = proxy().proxy(&format!("http://{}/media", addr), "t").await;
        assert!(matches!(result, Err(ProxyError::Upstream(_))));
    }

    #[tokio::test]
    async fn test_proxy_unreachable_upstream() {
        let addr = closed_addr().await;
        let result = proxy().proxy(&format!("http://{}/media", addr), "t").await;
        assert!(matches!(result, Err(ProxyError::Upstream(_))));
    }
}
