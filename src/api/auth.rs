//! Session issuance and the `/auth/*` endpoints.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::AppState;
use crate::errors::AppError;
use crate::token::{
    AccessToken, Authenticated, ProjectId, SignedToken, ACCESS_TOKEN_COOKIE, TOKEN_TTL_SECS,
};

/// A freshly created token together with its signed form.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: AccessToken,
    pub signed: SignedToken,
}

/// Create and sign a token for `user_id` from the user's current memberships.
///
/// A failed membership lookup is logged and yields an empty set rather than
/// failing the login.
pub async fn issue_session(state: &AppState, user_id: &str) -> Result<IssuedToken, AppError> {
    if user_id.trim().is_empty() {
        return Err(AppError::BadRequest("user id must not be empty".into()));
    }

    let projects = state
        .permissions
        .project_ids_for_user(user_id)
        .await
        .unwrap_or_else(|e| {
            tracing::error!(user_id = %user_id, error = %e, "failed to load project permissions");
            Vec::new()
        });
    let dashboards = state
        .permissions
        .dashboard_ids_for_user(user_id)
        .await
        .unwrap_or_else(|e| {
            tracing::error!(user_id = %user_id, error = %e, "failed to load dashboard permissions");
            Vec::new()
        });

    let token = AccessToken::create(user_id, projects, dashboards);
    let signed = token.sign(state.auth.signing_key())?;

    tracing::info!(
        user_id = %user_id,
        projects = token.project_permissions().len(),
        dashboards = token.dashboard_permissions().len(),
        expires_at = %token.expires_at(),
        "access token issued"
    );

    Ok(IssuedToken { token, signed })
}

/// `Set-Cookie` value carrying the signed token.
pub fn session_cookie(state: &AppState, signed: &SignedToken) -> Result<HeaderValue, AppError> {
    cookie_header(state, signed.as_str(), TOKEN_TTL_SECS)
}

/// `Set-Cookie` value that removes the token cookie.
pub fn clear_session_cookie(state: &AppState) -> Result<HeaderValue, AppError> {
    cookie_header(state, "", 0)
}

fn cookie_header(state: &AppState, value: &str, max_age: i64) -> Result<HeaderValue, AppError> {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        ACCESS_TOKEN_COOKIE, value, max_age
    );
    if let Some(domain) = &state.config.cookie_domain {
        cookie.push_str("; Domain=");
        cookie.push_str(domain);
    }
    HeaderValue::from_str(&cookie)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid cookie header: {}", e)))
}

/// Finish a login: issue the token, set the cookie and redirect to the app.
///
/// Called by the OAuth callback once the identity provider has vouched for `user_id`.
pub async fn login_redirect(state: &AppState, user_id: &str) -> Result<Response, AppError> {
    let issued = issue_session(state, user_id).await?;
    let cookie = session_cookie(state, &issued.signed)?;
    let location = HeaderValue::from_str(&state.config.redirect_url)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid redirect url: {}", e)))?;

    Ok((
        StatusCode::FOUND,
        [(header::LOCATION, location), (header::SET_COOKIE, cookie)],
    )
        .into_response())
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user_id: String,
    pub projects: BTreeSet<ProjectId>,
    pub dashboards: BTreeSet<Uuid>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<&AccessToken> for SessionResponse {
    fn from(token: &AccessToken) -> Self {
        Self {
            user_id: token.user_id().to_string(),
            projects: token.project_permissions().clone(),
            dashboards: token.dashboard_permissions().clone(),
            issued_at: token.issued_at(),
            expires_at: token.expires_at(),
        }
    }
}

/// GET /auth/session
pub async fn session(Authenticated(token): Authenticated) -> Json<SessionResponse> {
    Json(SessionResponse::from(&token))
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

/// POST /auth/refresh: re-issue from the memberships as they are now.
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    auth: Authenticated,
) -> Result<Response, AppError> {
    let issued = issue_session(&state, auth.user_id()).await?;
    let cookie = session_cookie(&state, &issued.signed)?;
    let body = RefreshResponse {
        expires_at: issued.token.expires_at(),
        access_token: issued.signed.into_string(),
    };
    Ok(([(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

/// POST /auth/logout
pub async fn logout(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let cookie = clear_session_cookie(&state)?;
    Ok((StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie)]).into_response())
}
