//! Stateless access tokens — issuance, verification, extraction and permission checks.
//!
//! A token is an HS256-signed compact JWT carrying the user id and two permission sets
//! (project ids and dashboard ids). There is no server-side session: every request is
//! authorized from the token alone.
//!
//! Request flow:
//! 1. [`extract::extract`] finds a candidate token (bearer header or cookie)
//! 2. [`AccessToken::verify`] checks signature and expiry, then decodes the claims
//! 3. [`middleware::require_access_token`] attaches the verified token to the request
//! 4. handlers take it as [`middleware::Authenticated`] and call [`permissions`]

pub mod access;
pub mod claims;
pub mod extract;
pub mod middleware;
pub mod permissions;

pub use access::{AccessToken, SignedToken, SigningKey};
pub use extract::{ExtractionOrder, Extracted, TokenSource};
pub use middleware::Authenticated;

use thiserror::Error;

/// Value of the `iss` claim on every token we issue.
pub const TOKEN_ISSUER: &str = "todanni.com";

/// Name of the cookie carrying the signed token.
pub const ACCESS_TOKEN_COOKIE: &str = "todanni-access-token";

/// Lifetime of an issued token, in seconds (24 hours).
pub const TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

/// Project identifiers are unsigned integers in the relational store.
pub type ProjectId = u64;

/// Failures on the issuance and verification paths.
///
/// Display strings are for operators. Clients only ever see the generic
/// message produced by [`crate::errors::AppError`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("token signature does not match")]
    SignatureInvalid,

    #[error("token expired")]
    Expired,

    #[error("could not sign token: {0}")]
    Signing(String),

    #[error("no access token in request")]
    NotFound,
}

impl TokenError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        TokenError::Malformed(reason.into())
    }

    /// Short stable identifier for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            TokenError::Malformed(_) => "malformed",
            TokenError::SignatureInvalid => "signature_invalid",
            TokenError::Expired => "expired",
            TokenError::Signing(_) => "signing",
            TokenError::NotFound => "not_found",
        }
    }
}
