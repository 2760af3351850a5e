//! HTTP front of the caching proxy
//!
//! The widgets talk to these routes instead of the remote CRM, so credentials
//! stay on the server and every search goes through the cache.

use crate::config::ProxyConfig;
use crate::list::MAX_PAGE_SIZE;
use crate::proxy::{CacheAsideProxy, ProxyError, ProxyResult, RequestArgs};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// Header carrying the admin token
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

#[derive(Clone)]
pub struct ServerState {
    pub proxy: Arc<CacheAsideProxy>,
    pub config: Arc<ProxyConfig>,
}

/// Query of `GET /neon/events`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsQuery {
    pub start: Option<String>,
    pub end: Option<String>,
    pub current_page: Option<u64>,
    pub page_size: Option<u64>,
}

impl EventsQuery {
    /// Upstream search arguments
    fn request_args(&self) -> RequestArgs {
        let mut args = RequestArgs::query([
            ("currentPage", self.current_page.unwrap_or(0).to_string()),
            (
                "pageSize",
                self.page_size.unwrap_or(MAX_PAGE_SIZE).min(MAX_PAGE_SIZE).to_string(),
            ),
        ]);
        if let Some(start) = self.start.as_deref().filter(|s| !s.is_empty()) {
            args.query.insert("startDateAfter".to_string(), start.to_string());
        }
        if let Some(end) = self.end.as_deref().filter(|s| !s.is_empty()) {
            args.query.insert("endDateBefore".to_string(), end.to_string());
        }
        args
    }
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/neon/events", get(events_handler))
        .route("/neon/campaigns", get(campaigns_handler))
        .with_state(state)
}

/// Proxy error as rendered for one caller
pub struct ApiError {
    error: ProxyError,
    admin: bool,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.error.is_configuration() && !self.admin {
            let status = StatusCode::SERVICE_UNAVAILABLE;
            let body = json!({
                "code": "unavailable",
                "message": "Events are temporarily unavailable",
                "data": { "status": status.as_u16() },
            });
            return (status, Json(body)).into_response();
        }

        let status =
            StatusCode::from_u16(self.error.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let message = match &self.error {
            ProxyError::Upstream { body, .. } => body.clone(),
            other => Value::String(other.to_string()),
        };
        let body = json!({
            "code": self.error.code(),
            "message": message,
            "data": { "status": status.as_u16() },
        });
        (status, Json(body)).into_response()
    }
}

fn is_admin(config: &ProxyConfig, headers: &HeaderMap) -> bool {
    let token = headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());
    config.is_admin(token)
}

fn upstream_url(config: &ProxyConfig, path: &str) -> String {
    format!("{}/{}", config.upstream_url.trim_end_matches('/'), path)
}

async fn fetch_events(state: &ServerState, query: &EventsQuery) -> ProxyResult<Value> {
    state.config.credentials()?;
    let url = upstream_url(&state.config, "events");
    state
        .proxy
        .get_from_cache(&state.config.events_namespace(), &url, &query.request_args())
        .await
}

async fn fetch_campaigns(state: &ServerState) -> ProxyResult<Value> {
    state.config.credentials()?;
    let url = upstream_url(&state.config, "campaigns");
    state
        .proxy
        .get_from_cache(
            &state.config.campaigns_namespace(),
            &url,
            &RequestArgs::default(),
        )
        .await
}

async fn events_handler(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Value>, ApiError> {
    tracing::debug!(?query, "GET /neon/events");
    fetch_events(&state, &query).await.map(Json).map_err(|error| {
        tracing::warn!("Events request failed: {}", error);
        ApiError {
            error,
            admin: is_admin(&state.config, &headers),
        }
    })
}

async fn campaigns_handler(
    State(state): State<ServerState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    tracing::debug!("GET /neon/campaigns");
    fetch_campaigns(&state).await.map(Json).map_err(|error| {
        tracing::warn!("Campaigns request failed: {}", error);
        ApiError {
            error,
            admin: is_admin(&state.config, &headers),
        }
    })
}
