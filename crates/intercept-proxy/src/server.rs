//! HTTP server for the interception proxy
//!
//! Every request outside `/__cache/` is routed through the cache engine.
//! `/__cache/health`, `/__cache/media` and `/__cache/provision` are the
//! admin surface: health, the explicit media save/remove action, and
//! re-running provisioning.

use crate::types::{ErrorResponse, HealthResponse, MediaRequest, SavedResponse};
use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use intercept_cache::network::is_hop_by_hop;
use intercept_cache::{
    AssetManifest, CacheRouter, CachedResponse, Decision, InterceptedRequest, Network,
    Provisioner,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use url::Url;

/// Largest request body forwarded upstream
const MAX_FORWARD_BODY: usize = 64 * 1024 * 1024;

/// Shared state for the HTTP server
pub struct ServerState {
    pub router: CacheRouter,
    pub provisioner: Provisioner,
    pub manifest: AssetManifest,
    /// Used directly for pass-through requests and explicit saves
    pub network: Arc<dyn Network>,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(
        router: CacheRouter,
        provisioner: Provisioner,
        manifest: AssetManifest,
        network: Arc<dyn Network>,
    ) -> Self {
        Self {
            router,
            provisioner,
            manifest,
            network,
            started_at: Utc::now(),
        }
    }

    fn upstream(&self) -> &Url {
        self.router.manager().origin()
    }
}

pub type SharedState = Arc<ServerState>;

/// Create the HTTP router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/__cache/health", get(health))
        .route("/__cache/media", post(save_media).delete(remove_media))
        .route("/__cache/provision", post(reprovision))
        .fallback(intercept)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(state: SharedState, port: u16) -> std::io::Result<()> {
    let router = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Convert a cached or fetched response, dropping connection-level headers
fn to_http_response(response: CachedResponse, cache_status: Option<&'static str>) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut builder = Response::builder().status(status);

    for (name, value) in &response.headers {
        if is_hop_by_hop(name) {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            builder = builder.header(name, value);
        }
    }
    if let Some(cache_status) = cache_status {
        builder = builder.header("X-Cache", cache_status);
    }

    builder
        .body(Body::from(response.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Resolve a client-supplied URL, refusing anything off the upstream origin
fn resolve_on_upstream(upstream: &Url, target: &str) -> Result<Url, Response> {
    let url = upstream
        .join(target)
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, format!("Bad URL: {}", e)))?;
    if url.origin() != upstream.origin() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "URL is not on the upstream origin",
        ));
    }
    Ok(url)
}

/// Rebase an incoming request onto the upstream origin
async fn to_intercepted(
    upstream: &Url,
    request: Request,
) -> Result<InterceptedRequest, Response> {
    let (parts, body) = request.into_parts();

    // Only path and query are taken from the client; the origin is always upstream
    let mut url = upstream.clone();
    url.set_path(parts.uri.path());
    url.set_query(parts.uri.query());

    let mut intercepted = InterceptedRequest::new(parts.method, url);
    for (name, value) in &parts.headers {
        if let Ok(value) = value.to_str() {
            intercepted = intercepted.with_header(name.as_str(), value);
        }
    }

    let body = axum::body::to_bytes(body, MAX_FORWARD_BODY)
        .await
        .map_err(|_| error_response(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large"))?;
    if !body.is_empty() {
        intercepted = intercepted.with_body(body.to_vec());
    }

    Ok(intercepted)
}

/// Every non-admin request
async fn intercept(State(state): State<SharedState>, request: Request) -> Response {
    let intercepted = match to_intercepted(state.upstream(), request).await {
        Ok(intercepted) => intercepted,
        Err(response) => return response,
    };

    let decision = match state.router.route(&intercepted).await {
        Ok(decision) => decision,
        Err(e) => {
            warn!(url = %intercepted.url, error = %e, "Routed request failed");
            return error_response(StatusCode::BAD_GATEWAY, "Upstream unavailable");
        }
    };

    let cache_status = decision.cache_status();
    match decision {
        Decision::ServeFromCache { response, .. } | Decision::FetchNetwork(response) => {
            to_http_response(response, Some(cache_status))
        }
        Decision::PassThrough => match state.network.fetch(&intercepted).await {
            Ok(response) => to_http_response(response, None),
            Err(e) => {
                warn!(url = %intercepted.url, error = %e, "Pass-through request failed");
                error_response(StatusCode::BAD_GATEWAY, "Upstream unavailable")
            }
        },
    }
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let cache_stats = state.router.manager().stats().await;
    let uptime_secs = (Utc::now() - state.started_at).num_seconds() as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs,
        cache: cache_stats,
    })
}

/// Explicit save: fetch the URL from upstream and store it in the media namespace
async fn save_media(State(state): State<SharedState>, Json(body): Json<MediaRequest>) -> Response {
    let url = match resolve_on_upstream(state.upstream(), &body.url) {
        Ok(url) => url,
        Err(response) => return response,
    };
    let request = InterceptedRequest::get(url);

    let response = match state.network.fetch(&request).await {
        Ok(response) if response.is_success() => response,
        Ok(response) => {
            warn!(url = %request.url, status = response.status, "Refusing to save non-success response");
            return error_response(
                StatusCode::BAD_GATEWAY,
                format!("Upstream returned status {}", response.status),
            );
        }
        Err(e) => {
            warn!(url = %request.url, error = %e, "Failed to fetch media for saving");
            return error_response(StatusCode::BAD_GATEWAY, "Upstream unavailable");
        }
    };

    let size = response.body.len();
    match state.router.manager().save_to_media(&request, &response).await {
        Ok(key) => (
            StatusCode::CREATED,
            Json(SavedResponse {
                key: key.to_string(),
                size,
            }),
        )
            .into_response(),
        Err(e) => {
            error!(url = %request.url, error = %e, "Failed to save media");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to save media")
        }
    }
}

async fn remove_media(State(state): State<SharedState>, Json(body): Json<MediaRequest>) -> Response {
    let url = match resolve_on_upstream(state.upstream(), &body.url) {
        Ok(url) => url,
        Err(response) => return response,
    };

    match state
        .router
        .manager()
        .remove_from_media(&InterceptedRequest::get(url))
        .await
    {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => error_response(StatusCode::NOT_FOUND, "Not in media cache"),
        Err(e) => {
            error!(error = %e, "Failed to remove media");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to remove media")
        }
    }
}

async fn reprovision(State(state): State<SharedState>) -> Response {
    match state.provisioner.provision(&state.manifest).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => error_response(StatusCode::BAD_GATEWAY, e.to_string()),
    }
}
