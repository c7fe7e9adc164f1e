use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    /// `None` issues tokens without an `exp` claim.
    pub ttl_minutes: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub oauth_url: String,
    pub api_url: String,
}

/// Account created at startup when no user owns `email` yet.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminSeed {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// `None` selects the in-process memory store.
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    pub github: GithubConfig,
    pub admin_seed: Option<AdminSeed>,
}

/// Ten years.
pub const MAX_TTL_MINUTES: i64 = 10 * 365 * 24 * 60;

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

/// Unset or blank disables expiry; anything else must be a whole number of minutes in range.
fn parse_ttl(raw: Option<String>) -> anyhow::Result<Option<i64>> {
    let raw = match raw.as_deref().map(str::trim) {
        None | Some("") => return Ok(None),
        Some(v) => v,
    };
    let minutes: i64 = raw
        .parse()
        .with_context(|| format!("JWT_TTL_MINUTES must be a number, got {:?}", raw))?;
    if !(1..=MAX_TTL_MINUTES).contains(&minutes) {
        anyhow::bail!(
            "JWT_TTL_MINUTES must be between 1 and {}, got {}",
            MAX_TTL_MINUTES,
            minutes
        );
    }
    Ok(Some(minutes))
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|v| !v.is_empty() && v != "memory");
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: env_or("JWT_ISSUER", "toolshelf"),
            audience: env_or("JWT_AUDIENCE", "toolshelf-users"),
            ttl_minutes: parse_ttl(std::env::var("JWT_TTL_MINUTES").ok())?,
        };
        let github = GithubConfig {
            client_id: env_or("GITHUB_CLIENT_ID", ""),
            client_secret: env_or("GITHUB_CLIENT_SECRET", ""),
            redirect_uri: env_or("GITHUB_REDIRECT_URI", "http://localhost:5173"),
            oauth_url: env_or("GITHUB_OAUTH_URL", "https://github.com"),
            api_url: env_or("GITHUB_API_URL", "https://api.github.com"),
        };
        let admin_seed = match (std::env::var("ADMIN_EMAIL"), std::env::var("ADMIN_PASSWORD")) {
            (Ok(email), Ok(password)) => Some(AdminSeed {
                name: env_or("ADMIN_NAME", "admin"),
                email,
                password,
            }),
            _ => None,
        };
        Ok(Self {
            database_url,
            jwt,
            github,
            admin_seed,
        })
    }
}

#[cfg(test)]
impl AppConfig {
    pub fn for_tests() -> Self {
        Self {
            database_url: None,
            jwt: JwtConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: None,
            },
            github: GithubConfig {
                client_id: "cid".into(),
                client_secret: "csecret".into(),
                redirect_uri: "http://localhost:5173".into(),
                oauth_url: "http://127.0.0.1:1".into(),
                api_url: "http://127.0.0.1:1".into(),
            },
            admin_seed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_unset_or_blank_disables_expiry() {
        assert_eq!(parse_ttl(None).unwrap(), None);
        assert_eq!(parse_ttl(Some("  ".into())).unwrap(), None);
        assert_eq!(parse_ttl(Some("30".into())).unwrap(), Some(30));
    }

    #[test]
    fn ttl_rejects_garbage_and_out_of_range() {
        let err = parse_ttl(Some("thirty".into())).unwrap_err();
        assert!(err.to_string().contains("JWT_TTL_MINUTES"));
        assert!(parse_ttl(Some("0".into())).is_err());
        assert!(parse_ttl(Some("-5".into())).is_err());
        assert!(parse_ttl(Some(i64::MAX.to_string())).is_err());
        assert_eq!(
            parse_ttl(Some(MAX_TTL_MINUTES.to_string())).unwrap(),
            Some(MAX_TTL_MINUTES)
        );
    }
}
