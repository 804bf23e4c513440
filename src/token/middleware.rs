//! Authorization middleware — extraction + verification in front of protected routes.
//!
//! Per request: `start → extracted → verified → token attached` or `start → rejected`.
//! A rejected request never reaches the handler. On success the verified
//! [`AccessToken`] is stored in the request extensions (its type is the key) and the
//! handler runs once, inline. Handlers take it back out with [`Authenticated`].

use std::sync::Arc;

use axum::async_trait;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

use super::extract::{self, ExtractionOrder, TokenSource};
use super::{AccessToken, SigningKey, TokenError};
use crate::errors::AppError;

/// Everything needed to authenticate a request. Read-only after startup.
#[derive(Debug, Clone)]
pub struct Authenticator {
    key: SigningKey,
    order: ExtractionOrder,
}

impl Authenticator {
    pub fn new(key: SigningKey, order: ExtractionOrder) -> Self {
        Self { key, order }
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.key
    }

    pub fn order(&self) -> ExtractionOrder {
        self.order
    }

    /// Find and verify the request's token.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<(AccessToken, TokenSource), TokenError> {
        let found = extract::extract(headers, self.order)?;
        let token = AccessToken::verify(&found.token, &self.key)?;
        Ok((token, found.source))
    }
}

/// `axum::middleware::from_fn_with_state` entry point.
pub async fn require_access_token(
    State(auth): State<Arc<Authenticator>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (token, source) = auth.authenticate(req.headers()).map_err(|e| {
        tracing::warn!(
            kind = e.kind(),
            reason = %e,
            method = %req.method(),
            path = %req.uri().path(),
            "request rejected: access token"
        );
        AppError::Token(e)
    })?;

    tracing::debug!(
        user_id = %token.user_id(),
        source = source.as_str(),
        "access token verified"
    );

    req.extensions_mut().insert(token);
    Ok(next.run(req).await)
}

/// The verified token of the current request, as a handler argument.
///
/// Rejects with 401 when no token was attached or when it carries no user id.
#[derive(Debug, Clone)]
pub struct Authenticated(pub AccessToken);

impl Authenticated {
    pub fn token(&self) -> &AccessToken {
        &self.0
    }

    pub fn user_id(&self) -> &str {
        self.0.user_id()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .extensions
            .get::<AccessToken>()
            .cloned()
            .ok_or_else(|| {
                tracing::error!(path = %parts.uri.path(), "handler reached without a verified token");
                AppError::Unauthenticated
            })?;

        if token.user_id().is_empty() {
            tracing::warn!(path = %parts.uri.path(), "verified token has no user id");
            return Err(AppError::Unauthenticated);
        }
        Ok(Authenticated(token))
    }
}

// ── Tests ────────────────────────────────────────────────────
