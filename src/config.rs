use crate::token::{ExtractionOrder, SigningKey};

#[derive(Debug)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// HMAC secret for access tokens. Never logged.
    pub signing_key: SigningKey,
    /// Cookie `Domain` attribute. Host-only cookie when unset.
    /// Set via DOMAIN env var.
    pub cookie_domain: Option<String>,
    /// Where the login callback sends the browser after setting the cookie.
    /// Set via REDIRECT_URL env var. Default: "/tasks".
    pub redirect_url: String,
    /// Which token source wins when a request carries both.
    /// Set via TODANNI_TOKEN_ORDER env var ("header-first" | "cookie-first").
    pub token_order: ExtractionOrder,
    /// Browser origin allowed to call the API with credentials.
    /// Set via CORS_ORIGIN env var. Default: "http://localhost:3000".
    pub cors_origin: String,
    /// Emit JSON log lines. Set via LOG_FORMAT=json.
    pub json_logs: bool,
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();
    from_lookup(|key| std::env::var(key).ok())
}

/// Build the config from any key → value source.
pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let signing_key = lookup("SIGNING_KEY").unwrap_or_default();
    if signing_key.trim().is_empty() {
        anyhow::bail!("SIGNING_KEY must be set to a non-empty secret");
    }

    let token_order = match lookup("TODANNI_TOKEN_ORDER") {
        Some(v) if !v.trim().is_empty() => v
            .parse::<ExtractionOrder>()
            .map_err(|e| anyhow::anyhow!(e))?,
        _ => ExtractionOrder::default(),
    };

    Ok(Config {
        port: lookup("TODANNI_PORT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(8083),
        database_url: database_url(&lookup),
        signing_key: SigningKey::from(signing_key),
        cookie_domain: lookup("DOMAIN")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()),
        redirect_url: lookup("REDIRECT_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "/tasks".into()),
        token_order,
        cors_origin: lookup("CORS_ORIGIN")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "http://localhost:3000".into()),
        json_logs: lookup("LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false),
    })
}

/// DATABASE_URL wins; otherwise the URL is assembled from the POSTGRES_* variables.
fn database_url<F>(lookup: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("DATABASE_URL").filter(|v| !v.is_empty()) {
        return url;
    }
    let host = lookup("POSTGRES_HOST").unwrap_or_else(|| "localhost".into());
    let port = lookup("POSTGRES_PORT").unwrap_or_else(|| "5432".into());
    let name = lookup("POSTGRES_NAME").unwrap_or_else(|| "todanni".into());
    match (lookup("POSTGRES_USER"), lookup("POSTGRES_PASSWORD")) {
        (Some(user), Some(password)) => {
            format!("postgres://{user}:{password}@{host}:{port}/{name}?sslmode=disable")
        }
        (Some(user), None) => format!("postgres://{user}@{host}:{port}/{name}?sslmode=disable"),
        _ => format!("postgres://{host}:{port}/{name}?sslmode=disable"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn test_signing_key_required() {
        assert!(config(&[]).is_err());
        assert!(config(&[("SIGNING_KEY", "   ")]).is_err());
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[("SIGNING_KEY", "k")]).unwrap();
        assert_eq!(cfg.port, 8083);
        assert_eq!(cfg.redirect_url, "/tasks");
        assert_eq!(cfg.token_order, ExtractionOrder::HeaderFirst);
        assert!(cfg.cookie_domain.is_none());
        assert!(!cfg.json_logs);
        assert_eq!(cfg.database_url, "postgres://localhost:5432/todanni?sslmode=disable");
    }

    #[test]
    fn test_overrides() {
        let cfg = config(&[
            ("SIGNING_KEY", "k"),
            ("TODANNI_PORT", "9000"),
            ("DOMAIN", "todanni.com"),
            ("TODANNI_TOKEN_ORDER", "cookie-first"),
            ("POSTGRES_HOST", "db"),
            ("POSTGRES_USER", "app"),
            ("POSTGRES_PASSWORD", "pw"),
            ("LOG_FORMAT", "JSON"),
        ])
        .unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.cookie_domain.as_deref(), Some("todanni.com"));
        assert_eq!(cfg.token_order, ExtractionOrder::CookieFirst);
        assert_eq!(cfg.database_url, "postgres://app:pw@db:5432/todanni?sslmode=disable");
        assert!(cfg.json_logs);
    }

    #[test]
    fn test_bad_token_order_is_an_error() {
        assert!(config(&[("SIGNING_KEY", "k"), ("TODANNI_TOKEN_ORDER", "random")]).is_err());
    }

    #[test]
    fn test_debug_does_not_print_signing_key() {
        let cfg = config(&[("SIGNING_KEY", "super-secret-value")]).unwrap();
        assert!(!format!("{cfg:?}").contains("super-secret-value"));
    }
}
