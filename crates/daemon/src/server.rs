//! HTTP server for the media helper
//!
//! Exposes a status endpoint and the audio extraction endpoint that streams
//! proxied media back to the browser.

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::binary::BinaryManager;
use crate::extract::{extract, ExtractError};
use crate::proxy::{MediaProxy, ProxiedMedia, ProxyError};

/// Raw extracted title.
pub const TITLE_HEADER: &str = "x-video-title";
/// Chosen file extension.
pub const EXTENSION_HEADER: &str = "x-video-extension";

/// Errors that can occur when running the HTTP server
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(#[from] std::io::Error),

    #[error("Invalid allowed origin: {0}")]
    InvalidOrigin(String),
}

/// Shared state for request handlers
#[derive(Clone)]
pub struct AppState {
    pub binary: Arc<BinaryManager>,
    pub proxy: MediaProxy,
}

/// Payload of `GET /ping`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusPayload {
    pub status: String,
    pub version: String,
    #[serde(rename = "ytdlpVersion")]
    pub tool_version: String,
}

/// Per-request failure rendered as `{"error": "..."}`
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("url parameter required")]
    MissingUrl,

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Proxy(#[from] ProxyError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingUrl => StatusCode::BAD_REQUEST,
            ApiError::Extract(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Proxy(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::warn!(status = status.as_u16(), error = %self, "audio request failed");
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// Handler for GET /ping
async fn ping(State(state): State<AppState>) -> Json<StatusPayload> {
    Json(StatusPayload {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        tool_version: state.binary.version(),
    })
}

/// First value of `key` in the query string.
fn first_param(params: Vec<(String, String)>, key: &str) -> Option<String> {
    params.into_iter().find(|(k, _)| k == key).map(|(_, v)| v)
}

/// Handler for GET /audio?url=...
///
/// Repeated `url` parameters are not an error; the first one wins.
async fn audio(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Response, ApiError> {
    let source_url = first_param(params, "url")
        .filter(|u| !u.trim().is_empty())
        .ok_or(ApiError::MissingUrl)?;

    let media = extract(&state.binary, &source_url).await?;
    tracing::info!(title = %media.title, "extracted media URL");

    let proxied = state.proxy.proxy(&media.media_url, &media.title).await?;
    Ok(stream_response(proxied))
}

/// Answers successful OPTIONS requests with 204.
///
/// The CORS layer replies to every OPTIONS request itself with 200, so the
/// status is rewritten on the way out.
async fn preflight_no_content(method: Method, mut response: Response) -> Response {
    if method == Method::OPTIONS && response.status().is_success() {
        *response.status_mut() = StatusCode::NO_CONTENT;
    }
    response
}

/// Header value from arbitrary text; control characters become `_`.
fn header_value_lossy(text: &str) -> HeaderValue {
    HeaderValue::from_bytes(text.as_bytes()).unwrap_or_else(|_| {
        let cleaned: String = text
            .chars()
            .map(|c| if c.is_control() { '_' } else { c })
            .collect();
        HeaderValue::from_bytes(cleaned.as_bytes())
            .unwrap_or_else(|_| HeaderValue::from_static("download"))
    })
}

fn stream_response(media: ProxiedMedia) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, header_value_lossy(&media.content_type));
    if let Some(len) = media.content_length {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    }
    headers.insert(
        header::CONTENT_DISPOSITION,
        header_value_lossy(&media.content_disposition()),
    );
    headers.insert(
        HeaderName::from_static(TITLE_HEADER),
        header_value_lossy(&media.title),
    );
    headers.insert(
        HeaderName::from_static(EXTENSION_HEADER),
        HeaderValue::from_static(media.extension),
    );

    (StatusCode::OK, headers, Body::from_stream(media.body)).into_response()
}

/// CORS policy for the configured browser origin (`*` for any).
pub fn cors_layer(allowed_origin: &str) -> Result<CorsLayer, ServerError> {
    let origin = if allowed_origin.trim() == "*" {
        AllowOrigin::any()
    } else {
        let value = HeaderValue::from_str(allowed_origin.trim())
            .map_err(|_| ServerError::InvalidOrigin(allowed_origin.to_string()))?;
        AllowOrigin::exact(value)
    };

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .expose_headers([
            header::CONTENT_DISPOSITION,
            HeaderName::from_static(TITLE_HEADER),
            HeaderName::from_static(EXTENSION_HEADER),
        ]))
}

/// Creates the axum Router with status and audio endpoints
pub fn create_router(state: AppState, allowed_origin: &str) -> Result<Router, ServerError> {
    Ok(Router::new()
        .route("/ping", get(ping))
        .route("/audio", get(audio))
        .layer(cors_layer(allowed_origin)?)
        .layer(middleware::map_response(preflight_no_content))
        .with_state(state))
}

/// Binds the listener for the HTTP server
pub async fn bind(addr: &str) -> Result<tokio::net::TcpListener, ServerError> {
    Ok(tokio::net::TcpListener::bind(addr).await?)
}

/// Serves `router` on an already bound listener until the process exits
pub async fn serve(listener: tokio::net::TcpListener, router: Router) -> Result<(), ServerError> {
    axum::serve(listener, router).await?;
    Ok(())
}
