use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{HeaderName, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::store::PermissionSource;
use crate::token::middleware::{require_access_token, Authenticator};

pub mod access;
pub mod auth;

/// Upper bound on a single request, token verification included.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared application state passed to handlers and middleware.
pub struct AppState {
    pub config: Config,
    pub auth: Arc<Authenticator>,
    pub permissions: Arc<dyn PermissionSource>,
}

impl AppState {
    pub fn new(config: Config, permissions: Arc<dyn PermissionSource>) -> Self {
        let auth = Arc::new(Authenticator::new(
            config.signing_key.clone(),
            config.token_order,
        ));
        Self {
            config,
            auth,
            permissions,
        }
    }
}

/// Build the full HTTP router.
///
/// Everything except health checks and logout sits behind the access-token middleware.
pub fn router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/auth/session", get(auth::session))
        .route("/auth/refresh", post(auth::refresh))
        .route("/api/v1/projects/:id/access", get(access::project_access))
        .route("/api/v1/dashboards/:id/access", get(access::dashboard_access))
        .layer(middleware::from_fn_with_state(
            state.auth.clone(),
            require_access_token,
        ));

    let cors = cors_layer(&state.config.cors_origin);

    Router::new()
        // Health endpoints (no auth)
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(readiness_check))
        .route("/auth/logout", post(auth::logout))
        .merge(protected)
        .fallback(fallback_404)
        .with_state(state)
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(middleware::from_fn(security_headers_middleware))
}

async fn fallback_404() -> StatusCode {
    StatusCode::NOT_FOUND
}

async fn readiness_check(State(state): State<Arc<AppState>>) -> Result<&'static str, StatusCode> {
    state.permissions.ping().await.map_err(|e| {
        tracing::warn!("readiness check failed: {}", e);
        StatusCode::SERVICE_UNAVAILABLE
    })?;
    Ok("ok")
}

/// Credentialed CORS for the web client; the cookie only travels with an exact origin.
fn cors_layer(origin: &str) -> CorsLayer {
    let allowed = origin.to_string();
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin, _| {
            let origin_str = origin.to_str().unwrap_or("");
            origin_str == allowed
                || origin_str.starts_with("http://localhost:")
                || origin_str.starts_with("http://127.0.0.1:")
        }))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        // NOTE: AllowHeaders::any() cannot be combined with allow_credentials(true)
        .allow_headers([
            HeaderName::from_static("content-type"),
            HeaderName::from_static("authorization"),
            HeaderName::from_static("x-request-id"),
        ])
        .allow_credentials(true)
}

/// Middleware: injects a unique X-Request-Id into every response.
async fn request_id_middleware(req: Request, next: Next) -> Response {
    let req_id = uuid::Uuid::new_v4().to_string();
    let mut resp = next.run(req).await;
    if let Ok(val) = HeaderValue::from_str(&req_id) {
        resp.headers_mut().insert("x-request-id", val);
    }
    resp
}

/// Middleware: security headers on every response.
async fn security_headers_middleware(req: Request, next: Next) -> Response {
    let mut resp = next.run(req).await;
    let headers = resp.headers_mut();

    headers.insert("x-content-type-options", HeaderValue::from_static("nosniff"));
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    // Responses may carry a freshly issued token.
    headers.insert("cache-control", HeaderValue::from_static("no-store"));
    headers.insert("referrer-policy", HeaderValue::from_static("no-referrer"));
    headers.remove("server");

    resp
}
