//! Token extraction: finds the candidate token string on a request.
//!
//! Two sources: `Authorization: Bearer <token>` and the `todanni-access-token` cookie.
//! They are tried in a fixed, configured order. A source that is absent or malformed
//! falls through to the other one; a source that yields a string ends the search,
//! whether or not that string later verifies.

use std::str::FromStr;

use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::HeaderMap;

use super::{TokenError, ACCESS_TOKEN_COOKIE};

const BEARER_PREFIX: &str = "Bearer ";

/// Where a token was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Header,
    Cookie,
}

impl TokenSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenSource::Header => "header",
            TokenSource::Cookie => "cookie",
        }
    }
}

/// Fixed precedence between the two sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractionOrder {
    /// Bearer header, then cookie.
    #[default]
    HeaderFirst,
    /// Cookie, then bearer header.
    CookieFirst,
}

impl ExtractionOrder {
    pub fn sources(self) -> [TokenSource; 2] {
        match self {
            ExtractionOrder::HeaderFirst => [TokenSource::Header, TokenSource::Cookie],
            ExtractionOrder::CookieFirst => [TokenSource::Cookie, TokenSource::Header],
        }
    }
}

impl FromStr for ExtractionOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "header-first" | "header" => Ok(ExtractionOrder::HeaderFirst),
            "cookie-first" | "cookie" => Ok(ExtractionOrder::CookieFirst),
            other => Err(format!(
                "unknown token order '{other}' (expected 'header-first' or 'cookie-first')"
            )),
        }
    }
}

/// What a single source produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    Found(String),
    /// The header or cookie is not on the request at all.
    Absent,
    /// Present but unusable, e.g. an `Authorization` header without `Bearer `.
    Malformed(&'static str),
}

/// A candidate token and the source that supplied it. Not yet verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub token: String,
    pub source: TokenSource,
}

/// Try each source in `order`; `TokenError::NotFound` when neither yields a string.
pub fn extract(headers: &HeaderMap, order: ExtractionOrder) -> Result<Extracted, TokenError> {
    for source in order.sources() {
        match candidate(headers, source) {
            Candidate::Found(token) => return Ok(Extracted { token, source }),
            Candidate::Absent => {
                tracing::trace!(source = source.as_str(), "access token source absent");
            }
            Candidate::Malformed(reason) => {
                tracing::debug!(source = source.as_str(), reason, "access token source malformed");
            }
        }
    }
    Err(TokenError::NotFound)
}

pub fn candidate(headers: &HeaderMap, source: TokenSource) -> Candidate {
    match source {
        TokenSource::Header => bearer_candidate(headers),
        TokenSource::Cookie => cookie_candidate(headers, ACCESS_TOKEN_COOKIE),
    }
}

/// `Authorization: Bearer <token>`.
pub fn bearer_candidate(headers: &HeaderMap) -> Candidate {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Candidate::Absent;
    };
    let Ok(value) = value.to_str() else {
        return Candidate::Malformed("authorization header is not visible ASCII");
    };
    let Some(token) = value.strip_prefix(BEARER_PREFIX) else {
        return Candidate::Malformed("authorization header has no 'Bearer ' prefix");
    };
    let token = token.trim();
    if token.is_empty() {
        Candidate::Malformed("empty bearer token")
    } else if token.contains(char::is_whitespace) {
        Candidate::Malformed("bearer token contains whitespace")
    } else {
        Candidate::Found(token.to_string())
    }
}

/// The named cookie from any `Cookie` header. First occurrence wins.
pub fn cookie_candidate(headers: &HeaderMap, name: &str) -> Candidate {
    let pairs = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='));

    for (key, value) in pairs {
        if key.trim() != name {
            continue;
        }
        let value = value.trim().trim_matches('"');
        return if value.is_empty() {
            Candidate::Malformed("empty cookie value")
        } else {
            Candidate::Found(value.to_string())
        };
    }
    Candidate::Absent
}

// ── Tests ────────────────────────────────────────────────────
