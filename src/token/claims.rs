//! Claim codec — the token payload as a generic JSON tree.
//!
//! The payload is always decoded into a [`serde_json::Value`] first and every claim is
//! down-cast explicitly. Other issuers (and other JSON libraries) write integers as
//! floats (`42.0`) and sequences as untyped arrays, so the typed collections are never
//! taken for granted.
//!
//! Payload keys: `iss`, `iat`, `exp`, `user_id`, `projects`, `dashboards`.

use std::collections::BTreeSet;

use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::{ProjectId, TokenError};

/// Largest integer a JSON double carries without loss (2^53).
const MAX_EXACT_FLOAT_INT: f64 = 9_007_199_254_740_992.0;

/// The decoded claim set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub issuer: String,
    /// Unix seconds.
    pub issued_at: i64,
    /// Unix seconds.
    pub expires_at: i64,
    /// Empty when unset.
    pub user_id: String,
    pub projects: BTreeSet<ProjectId>,
    pub dashboards: BTreeSet<Uuid>,
}

/// Build the generic tree for a claim set.
///
/// Sets are written in ascending order and `serde_json`'s map keeps keys sorted, so the
/// same claims always serialize to the same bytes.
pub fn encode(claims: &Claims) -> Value {
    let dashboards: Vec<String> = claims
        .dashboards
        .iter()
        .map(|id| id.hyphenated().to_string())
        .collect();

    json!({
        "iss": claims.issuer,
        "iat": claims.issued_at,
        "exp": claims.expires_at,
        "user_id": claims.user_id,
        "projects": claims.projects.iter().collect::<Vec<_>>(),
        "dashboards": dashboards,
    })
}

/// Serialize a claim set to payload bytes.
pub fn to_bytes(claims: &Claims) -> Result<Vec<u8>, TokenError> {
    serde_json::to_vec(&encode(claims)).map_err(|e| TokenError::Signing(e.to_string()))
}

/// Parse payload bytes into a claim set.
pub fn from_bytes(payload: &[u8]) -> Result<Claims, TokenError> {
    let raw: Value = serde_json::from_slice(payload)
        .map_err(|e| TokenError::malformed(format!("payload is not JSON: {e}")))?;
    decode(&raw)
}

/// Coerce a generic tree into a claim set.
pub fn decode(raw: &Value) -> Result<Claims, TokenError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| TokenError::malformed("payload is not a JSON object"))?;

    Ok(Claims {
        issuer: string_claim(obj, "iss")?,
        issued_at: timestamp_claim(obj, "iat")?,
        expires_at: timestamp_claim(obj, "exp")?,
        user_id: user_id_claim(obj)?,
        projects: set_claim(obj, "projects", as_project_id)?,
        dashboards: set_claim(obj, "dashboards", as_dashboard_id)?,
    })
}

// ── Coercion ─────────────────────────────────────────────────

fn string_claim(obj: &Map<String, Value>, key: &str) -> Result<String, TokenError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(TokenError::malformed(format!("'{key}' is not a string"))),
    }
}

fn timestamp_claim(obj: &Map<String, Value>, key: &str) -> Result<i64, TokenError> {
    let value = obj
        .get(key)
        .ok_or_else(|| TokenError::malformed(format!("missing '{key}' claim")))?;
    as_integer(value).ok_or_else(|| TokenError::malformed(format!("'{key}' is not an integer")))
}

/// Older tokens carried a numeric user id; those are read back as their decimal text.
fn user_id_claim(obj: &Map<String, Value>) -> Result<String, TokenError> {
    match obj.get("user_id") {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(v @ Value::Number(_)) => as_unsigned(v)
            .map(|id| id.to_string())
            .ok_or_else(|| TokenError::malformed("'user_id' is not a non-negative integer")),
        Some(_) => Err(TokenError::malformed("'user_id' is not a string")),
    }
}

fn set_claim<T: Ord>(
    obj: &Map<String, Value>,
    key: &str,
    coerce: fn(&Value) -> Option<T>,
) -> Result<BTreeSet<T>, TokenError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(BTreeSet::new()),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                coerce(item).ok_or_else(|| {
                    TokenError::malformed(format!("'{key}'[{i}] has the wrong type: {item}"))
                })
            })
            .collect(),
        Some(_) => Err(TokenError::malformed(format!("'{key}' is not an array"))),
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    if let Some(i) = value.as_i64() {
        return Some(i);
    }
    let f = value.as_f64()?;
    if f.is_finite() && f.fract() == 0.0 && f.abs() <= MAX_EXACT_FLOAT_INT {
        Some(f as i64)
    } else {
        None
    }
}

fn as_unsigned(value: &Value) -> Option<u64> {
    if let Some(u) = value.as_u64() {
        return Some(u);
    }
    let f = value.as_f64()?;
    if f.is_finite() && f.fract() == 0.0 && (0.0..=MAX_EXACT_FLOAT_INT).contains(&f) {
        Some(f as u64)
    } else {
        None
    }
}

fn as_project_id(value: &Value) -> Option<ProjectId> {
    as_unsigned(value)
}

fn as_dashboard_id(value: &Value) -> Option<Uuid> {
    value.as_str().and_then(|s| Uuid::parse_str(s).ok())
}

// ── Tests ────────────────────────────────────────────────────
