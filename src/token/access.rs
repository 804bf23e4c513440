//! Access token — claim set, HS256 signing and verification.
//!
//! Wire form: `base64url(header) "." base64url(payload) "." base64url(hmac)`, all without
//! padding. The MAC is HMAC-SHA256 over the first two segments exactly as they appear
//! in the token text.

use std::collections::BTreeSet;
use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use uuid::Uuid;
use zeroize::Zeroizing;

use super::claims::{self, Claims};
use super::{ProjectId, TokenError, TOKEN_ISSUER, TOKEN_TTL_SECS};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "HS256";
const HEADER_JSON: &[u8] = br#"{"alg":"HS256","typ":"JWT"}"#;

// ── Signing key ──────────────────────────────────────────────

/// Shared HMAC secret. Loaded once at startup and read-only afterwards.
///
/// The bytes are wiped on drop and never printed by `Debug`.
#[derive(Clone)]
pub struct SigningKey(Zeroizing<Vec<u8>>);

impl SigningKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(Zeroizing::new(bytes.into()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn mac(&self) -> Result<HmacSha256, hmac::digest::InvalidLength> {
        HmacSha256::new_from_slice(&self.0)
    }
}

impl From<&str> for SigningKey {
    fn from(s: &str) -> Self {
        Self::new(s.as_bytes())
    }
}

impl From<String> for SigningKey {
    fn from(s: String) -> Self {
        Self::new(s.into_bytes())
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(****)")
    }
}

// ── Signed token ─────────────────────────────────────────────

/// The immutable wire form of a token.
///
/// `Debug` only shows the length: the text is a bearer credential.
#[derive(Clone, PartialEq, Eq)]
pub struct SignedToken(String);

impl SignedToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for SignedToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SignedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignedToken({} bytes)", self.0.len())
    }
}

// ── Access token ─────────────────────────────────────────────

/// An unsigned token under construction, or the claims of a verified one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    claims: Claims,
}

impl AccessToken {
    /// A token issued now, with no user and empty permission sets.
    pub fn new() -> Self {
        Self::new_at(Utc::now())
    }

    /// A token issued at `issued_at`. Expiry is always `issued_at + 24h`.
    pub fn new_at(issued_at: DateTime<Utc>) -> Self {
        let iat = issued_at.timestamp();
        Self {
            claims: Claims {
                issuer: TOKEN_ISSUER.to_string(),
                issued_at: iat,
                expires_at: iat + TOKEN_TTL_SECS,
                user_id: String::new(),
                projects: BTreeSet::new(),
                dashboards: BTreeSet::new(),
            },
        }
    }

    /// Build the claims for an authenticated user.
    pub fn create(
        user_id: impl Into<String>,
        projects: impl IntoIterator<Item = ProjectId>,
        dashboards: impl IntoIterator<Item = Uuid>,
    ) -> Self {
        Self::create_at(Utc::now(), user_id, projects, dashboards)
    }

    pub fn create_at(
        issued_at: DateTime<Utc>,
        user_id: impl Into<String>,
        projects: impl IntoIterator<Item = ProjectId>,
        dashboards: impl IntoIterator<Item = Uuid>,
    ) -> Self {
        let mut token = Self::new_at(issued_at);
        token
            .set_user_id(user_id)
            .set_project_permissions(projects)
            .set_dashboard_permissions(dashboards);
        token
    }

    pub fn set_user_id(&mut self, user_id: impl Into<String>) -> &mut Self {
        self.claims.user_id = user_id.into();
        self
    }

    /// Replace the project set. Duplicates collapse.
    pub fn set_project_permissions(
        &mut self,
        projects: impl IntoIterator<Item = ProjectId>,
    ) -> &mut Self {
        self.claims.projects = projects.into_iter().collect();
        self
    }

    /// Replace the dashboard set. Duplicates collapse.
    pub fn set_dashboard_permissions(
        &mut self,
        dashboards: impl IntoIterator<Item = Uuid>,
    ) -> &mut Self {
        self.claims.dashboards = dashboards.into_iter().collect();
        self
    }

    pub fn issuer(&self) -> &str {
        &self.claims.issuer
    }

    /// Empty when no user is set.
    pub fn user_id(&self) -> &str {
        &self.claims.user_id
    }

    pub fn project_permissions(&self) -> &BTreeSet<ProjectId> {
        &self.claims.projects
    }

    pub fn dashboard_permissions(&self) -> &BTreeSet<Uuid> {
        &self.claims.dashboards
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        from_unix(self.claims.issued_at)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        from_unix(self.claims.expires_at)
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    /// Expired at `now` when `now` has reached `exp`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.claims.expires_at
    }

    /// Sign the claims into the compact wire form.
    pub fn sign(&self, key: &SigningKey) -> Result<SignedToken, TokenError> {
        if key.is_empty() {
            return Err(TokenError::Signing("signing key is empty".into()));
        }
        let payload = claims::to_bytes(&self.claims)?;
        encode_signed(HEADER_JSON, &payload, key).map(SignedToken)
    }

    /// Verify `text` against `key` at the current time.
    pub fn verify(text: &str, key: &SigningKey) -> Result<Self, TokenError> {
        Self::verify_at(text, key, Utc::now())
    }

    /// Verify `text` against `key` as if the current time were `now`.
    ///
    /// Order: structure and header, then signature, then payload decoding, then expiry.
    /// Nothing from the payload is trusted before the MAC matches.
    pub fn verify_at(text: &str, key: &SigningKey, now: DateTime<Utc>) -> Result<Self, TokenError> {
        let mut segments = text.split('.');
        let (header_b64, payload_b64, signature_b64) =
            match (segments.next(), segments.next(), segments.next(), segments.next()) {
                (Some(h), Some(p), Some(s), None) => (h, p, s),
                _ => return Err(TokenError::malformed("expected three dot-separated segments")),
            };

        check_header(header_b64)?;

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|e| TokenError::malformed(format!("signature is not base64url: {e}")))?;

        if key.is_empty() {
            return Err(TokenError::SignatureInvalid);
        }
        let signing_input = &text[..header_b64.len() + 1 + payload_b64.len()];
        let mut mac = key.mac().map_err(|_| TokenError::SignatureInvalid)?;
        mac.update(signing_input.as_bytes());
        let expected = mac.finalize().into_bytes();
        if !bool::from(expected.as_slice().ct_eq(&signature)) {
            return Err(TokenError::SignatureInvalid);
        }

        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|e| TokenError::malformed(format!("payload is not base64url: {e}")))?;
        let token = Self {
            claims: claims::from_bytes(&payload)?,
        };

        if token.is_expired_at(now) {
            return Err(TokenError::Expired);
        }
        Ok(token)
    }
}

impl Default for AccessToken {
    fn default() -> Self {
        Self::new()
    }
}

fn check_header(header_b64: &str) -> Result<(), TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(header_b64)
        .map_err(|e| TokenError::malformed(format!("header is not base64url: {e}")))?;
    let header: serde_json::Value = serde_json::from_slice(&bytes)
        .map_err(|e| TokenError::malformed(format!("header is not JSON: {e}")))?;
    match header.get("alg").and_then(|v| v.as_str()) {
        Some(ALGORITHM) => Ok(()),
        Some(other) => Err(TokenError::malformed(format!("unsupported algorithm '{other}'"))),
        None => Err(TokenError::malformed("header has no 'alg'")),
    }
}

fn encode_signed(header: &[u8], payload: &[u8], key: &SigningKey) -> Result<String, TokenError> {
    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header),
        URL_SAFE_NO_PAD.encode(payload)
    );
    let mut mac = key.mac().map_err(|e| TokenError::Signing(e.to_string()))?;
    mac.update(signing_input.as_bytes());
    let signature = mac.finalize().into_bytes();
    Ok(format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature)))
}

fn from_unix(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or_default()
}

// ── Tests ────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    const KEY: &str = "examplesigningkey";

    fn key() -> SigningKey {
        SigningKey::from(KEY)
    }

    fn issued() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn dashboard() -> Uuid {
        Uuid::parse_str("0b6f3c8e-9d7a-4f3e-8a52-7e4f2c1d9b10").unwrap()
    }

    #[test]
    fn test_sign_verify_preserves_identity_and_sets() {
        let other = Uuid::new_v4();
        let token = AccessToken::create_at(issued(), "u-1", [42, 7, 42], [dashboard(), other]);
        let signed = token.sign(&key()).unwrap();

        let verified = AccessToken::verify_at(signed.as_str(), &key(), issued()).unwrap();
        assert_eq!(verified.user_id(), "u-1");
        assert_eq!(verified.project_permissions(), &BTreeSet::from([7, 42]));
        assert_eq!(verified.dashboard_permissions(), &BTreeSet::from([dashboard(), other]));
        assert_eq!(verified.issuer(), TOKEN_ISSUER);
        assert_eq!(verified, token);
    }

    #[test]
    fn test_empty_permission_sets_are_valid() {
        let signed = AccessToken::create_at(issued(), "new-user", [], [])
            .sign(&key())
            .unwrap();
        let verified = AccessToken::verify_at(signed.as_str(), &key(), issued()).unwrap();
        assert!(verified.project_permissions().is_empty());
        assert!(verified.dashboard_permissions().is_empty());
    }

    #[test]
    fn test_expiry_is_relative_to_each_issue_time() {
        let first = AccessToken::new_at(issued());
        let later = AccessToken::new_at(issued() + Duration::hours(5));
        assert_eq!(first.expires_at() - first.issued_at(), Duration::hours(24));
        assert_eq!(later.expires_at() - later.issued_at(), Duration::hours(24));
        assert_eq!(later.expires_at() - first.expires_at(), Duration::hours(5));
    }

    #[test]
    fn test_expiry_boundary() {
        let signed = AccessToken::create_at(issued(), "u-1", [1], [])
            .sign(&key())
            .unwrap();
        let expiry = issued() + Duration::hours(24);

        let just_before = expiry - Duration::seconds(1);
        assert!(AccessToken::verify_at(signed.as_str(), &key(), just_before).is_ok());

        let sub_second_before = expiry - Duration::milliseconds(1);
        assert!(AccessToken::verify_at(signed.as_str(), &key(), sub_second_before).is_ok());

        assert_eq!(
            AccessToken::verify_at(signed.as_str(), &key(), expiry),
            Err(TokenError::Expired)
        );
        assert_eq!(
            AccessToken::verify_at(signed.as_str(), &key(), expiry + Duration::days(3)),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn test_verify_uses_wall_clock() {
        let fresh = AccessToken::create("u-1", [1], []).sign(&key()).unwrap();
        assert!(AccessToken::verify(fresh.as_str(), &key()).is_ok());

        let stale = AccessToken::create_at(Utc::now() - Duration::hours(25), "u-1", [1], [])
            .sign(&key())
            .unwrap();
        assert_eq!(AccessToken::verify(stale.as_str(), &key()), Err(TokenError::Expired));
    }

    #[test]
    fn test_every_payload_mutation_breaks_signature() {
        let signed = AccessToken::create_at(issued(), "u-1", [42], [dashboard()])
            .sign(&key())
            .unwrap();
        let text = signed.as_str();
        let start = text.find('.').unwrap() + 1;
        let end = text.rfind('.').unwrap();

        for i in start..end {
            let original = text.as_bytes()[i];
            let replacement = if original == b'A' { b'B' } else { b'A' };
            let mut bytes = text.as_bytes().to_vec();
            bytes[i] = replacement;
            let tampered = String::from_utf8(bytes).unwrap();

            assert_eq!(
                AccessToken::verify_at(&tampered, &key(), issued()),
                Err(TokenError::SignatureInvalid),
                "mutation at byte {i} was accepted"
            );
        }
    }

    #[test]
    fn test_wrong_key_is_signature_invalid() {
        let signed = AccessToken::create_at(issued(), "u-1", [], []).sign(&key()).unwrap();
        let other = SigningKey::from("a-different-key");
        assert_eq!(
            AccessToken::verify_at(signed.as_str(), &other, issued()),
            Err(TokenError::SignatureInvalid)
        );
        assert_eq!(
            AccessToken::verify_at(signed.as_str(), &SigningKey::from(""), issued()),
            Err(TokenError::SignatureInvalid)
        );
    }

    #[test]
    fn test_sign_rejects_empty_key() {
        let err = AccessToken::create("u-1", [], [])
            .sign(&SigningKey::new(Vec::new()))
            .unwrap_err();
        assert!(matches!(err, TokenError::Signing(_)));
    }

    #[test]
    fn test_wire_format() {
        let signed = AccessToken::create_at(issued(), "u-1", [42], []).sign(&key()).unwrap();
        let parts: Vec<&str> = signed.as_str().split('.').collect();
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|p| !p.contains('=') && !p.contains('+') && !p.contains('/')));

        let header: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[0]).unwrap()).unwrap();
        assert_eq!(header["alg"], "HS256");

        let payload: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
        assert_eq!(payload["iss"], "todanni.com");
        assert_eq!(payload["user_id"], "u-1");
        assert_eq!(payload["projects"], serde_json::json!([42]));
        assert_eq!(payload["dashboards"], serde_json::json!([]));
        assert_eq!(payload["exp"].as_i64().unwrap() - payload["iat"].as_i64().unwrap(), TOKEN_TTL_SECS);

        // 32-byte MAC → 43 base64url chars without padding.
        assert_eq!(parts[2].len(), 43);
    }

    #[test]
    fn test_malformed_structure() {
        let signed = AccessToken::create_at(issued(), "u-1", [], []).sign(&key()).unwrap();
        let text = signed.as_str();
        let (head, _) = text.rsplit_once('.').unwrap();

        let cases = vec![
            String::new(),
            "not-a-token".to_string(),
            head.to_string(),
            format!("{text}.extra"),
            format!("!!!{text}"),
            format!("{head}.***"),
        ];
        for bad in cases {
            assert!(
                matches!(AccessToken::verify_at(&bad, &key(), issued()), Err(TokenError::Malformed(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn test_rejects_other_algorithms() {
        let payload = claims::to_bytes(AccessToken::create_at(issued(), "u-1", [], []).claims()).unwrap();
        let headers: [&[u8]; 3] = [br#"{"alg":"none"}"#, br#"{"alg":"HS512"}"#, br#"{"typ":"JWT"}"#];
        for header in headers {
            let text = encode_signed(header, &payload, &key()).unwrap();
            assert!(matches!(
                AccessToken::verify_at(&text, &key(), issued()),
                Err(TokenError::Malformed(_))
            ));
        }
    }

    #[test]
    fn test_signed_payload_with_float_claims_is_coerced() {
        // A correctly signed token whose encoder wrote every number as a float.
        let iat = issued().timestamp() as f64;
        let payload = serde_json::json!({
            "iss": "todanni.com",
            "iat": iat,
            "exp": iat + TOKEN_TTL_SECS as f64,
            "user_id": "u-1",
            "projects": [42.0, 42.0, 9.0],
            "dashboards": [dashboard().to_string().to_uppercase()],
        });
        let text = encode_signed(HEADER_JSON, &serde_json::to_vec(&payload).unwrap(), &key()).unwrap();

        let verified = AccessToken::verify_at(&text, &key(), issued()).unwrap();
        assert_eq!(verified.project_permissions(), &BTreeSet::from([9, 42]));
        assert!(verified.dashboard_permissions().contains(&dashboard()));
    }

    #[test]
    fn test_signed_payload_with_bad_claims_is_malformed() {
        let payload = br#"{"iat":1,"exp":99999999999,"projects":["forty-two"]}"#;
        let text = encode_signed(HEADER_JSON, payload, &key()).unwrap();
        assert!(matches!(
            AccessToken::verify_at(&text, &key(), issued()),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let signed = AccessToken::create("u-1", [], []).sign(&key()).unwrap();
        assert!(!format!("{:?}", key()).contains(KEY));
        assert!(!format!("{signed:?}").contains(signed.as_str()));
    }
}
