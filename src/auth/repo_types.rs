use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::auth::password::verify_password;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Identity-issuing authority of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "auth_provider", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Local,
    Github,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Local => "local",
            Provider::Github => "github",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,                 // lowercase, unique
    #[serde(skip_serializing)]
    pub password_hash: Option<String>, // absent for OAuth-only accounts
    pub avatar: Option<String>,
    pub role: Role,
    pub provider: Provider,
    #[serde(skip_serializing)]
    pub provider_id: Option<String>,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Accounts without a local password never match.
    pub fn check_password(&self, plain: &str) -> anyhow::Result<bool> {
        match &self.password_hash {
            Some(hash) => verify_password(plain, hash),
            None => Ok(false),
        }
    }
}

/// Fields supplied when inserting a user; the store assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub avatar: Option<String>,
    pub role: Role,
    pub provider: Provider,
    pub provider_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::hash_password;

    fn user_with_hash(hash: Option<String>) -> User {
        let now = OffsetDateTime::now_utc();
        User {
            id: 1,
            name: "ann".into(),
            email: "ann@x.com".into(),
            password_hash: hash,
            avatar: None,
            role: Role::User,
            provider: Provider::Local,
            provider_id: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn role_parses_known_values_only() {
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
        assert_eq!("user".parse::<Role>(), Ok(Role::User));
        assert!("root".parse::<Role>().is_err());
        assert!("Admin".parse::<Role>().is_err());
    }

    #[test]
    fn provider_displays_as_stored() {
        assert_eq!(Provider::Github.to_string(), "github");
        assert_eq!(Provider::Local.to_string(), "local");
    }

    #[test]
    fn oauth_account_never_matches_password() {
        let user = user_with_hash(None);
        assert!(!user.check_password("anything").unwrap());
    }

    #[test]
    fn local_account_checks_hash() {
        let user = user_with_hash(Some(hash_password("secret1").unwrap()));
        assert!(user.check_password("secret1").unwrap());
        assert!(!user.check_password("secret2").unwrap());
    }

    #[test]
    fn serialization_hides_credentials() {
        let user = user_with_hash(Some("hash".into()));
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("provider_id").is_none());
        assert_eq!(json["role"], "user");
        assert_eq!(json["provider"], "local");
    }
}
