use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        jwt::JwtKeys,
        password::{hash_password, verify_dummy},
        repo_types::{NewUser, Provider, Role, User},
    },
    config::AdminSeed,
    error::{AppError, AppResult},
    state::AppState,
};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_NAME_LEN: usize = 100;

const BAD_CREDENTIALS: &str = "Invalid email or password";

/// A user together with a freshly signed session token.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: User,
    pub token: String,
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex =
            Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub(crate) fn default_avatar(email: &str) -> String {
    format!("https://api.dicebear.com/7.x/avataaars/svg?seed={}", email)
}

fn local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}

fn issue(state: &AppState, user: User) -> AppResult<AuthSession> {
    let token = JwtKeys::from_ref(state).sign(&user)?;
    Ok(AuthSession { user, token })
}

#[instrument(skip(state, password))]
pub async fn login(state: &AppState, email: &str, password: &str) -> AppResult<AuthSession> {
    let email = normalize_email(email);
    if email.is_empty() || password.is_empty() {
        return Err(AppError::invalid("Email and password are required"));
    }
    if !is_valid_email(&email) {
        return Err(AppError::invalid("Invalid email format"));
    }

    let mut tx = state.store.begin().await?;
    let user = tx.find_user_by_email(&email).await?;
    drop(tx);

    let user = match user {
        Some(u) if u.password_hash.is_some() => {
            if !u.check_password(password)? {
                warn!(user_id = u.id, "login wrong password");
                return Err(AppError::unauthorized(BAD_CREDENTIALS));
            }
            u
        }
        Some(u) => {
            verify_dummy(password);
            warn!(user_id = u.id, "login against account without local password");
            return Err(AppError::unauthorized(BAD_CREDENTIALS));
        }
        None => {
            verify_dummy(password);
            warn!(email = %email, "login unknown email");
            return Err(AppError::unauthorized(BAD_CREDENTIALS));
        }
    };

    if !user.is_active {
        warn!(user_id = user.id, "login on deactivated account");
        return Err(AppError::unauthorized(BAD_CREDENTIALS));
    }

    info!(user_id = user.id, provider = %user.provider, "user logged in");
    issue(state, user)
}

#[instrument(skip(state, password, avatar))]
pub async fn register(
    state: &AppState,
    name: &str,
    email: &str,
    password: &str,
    avatar: Option<String>,
) -> AppResult<AuthSession> {
    let email = normalize_email(email);
    if email.is_empty() || password.is_empty() {
        return Err(AppError::invalid("Email and password are required"));
    }
    if !is_valid_email(&email) {
        return Err(AppError::invalid("Invalid email format"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::invalid(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    let name = match name.trim() {
        "" => local_part(&email).to_string(),
        n => n.to_string(),
    };
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::invalid("Name is too long"));
    }

    let mut tx = state.store.begin().await?;
    if tx.find_user_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AppError::conflict("Email already registered"));
    }

    let user = tx
        .insert_user(NewUser {
            name,
            avatar: avatar
                .filter(|a| !a.trim().is_empty())
                .or_else(|| Some(default_avatar(&email))),
            password_hash: Some(hash_password(password)?),
            email,
            role: Role::User,
            provider: Provider::Local,
            provider_id: None,
        })
        .await?;
    tx.commit().await?;

    info!(user_id = user.id, "user registered");
    issue(state, user)
}

#[instrument(skip(state, code))]
pub async fn github_login(state: &AppState, code: &str) -> AppResult<AuthSession> {
    let code = code.trim();
    if code.is_empty() {
        return Err(AppError::invalid("Authorization code is required"));
    }

    let token = state.oauth.exchange_code(code).await.map_err(|e| {
        warn!(error = %e, "github token exchange failed");
        AppError::ExternalAuthFailure("GitHub authorization failed".into())
    })?;
    let access_token = token.access_token.ok_or_else(|| {
        warn!(error = ?token.error, "github returned no access token");
        AppError::ExternalAuthFailure("GitHub authorization failed".into())
    })?;

    let profile = state.oauth.fetch_profile(&access_token).await.map_err(|e| {
        warn!(error = %e, "github profile fetch failed");
        AppError::ExternalAuthFailure("Failed to fetch GitHub user".into())
    })?;
    let external_id = profile
        .id
        .ok_or_else(|| AppError::ExternalAuthFailure("Failed to fetch GitHub user".into()))?
        .to_string();

    let mut tx = state.store.begin().await?;
    if let Some(user) = tx
        .find_user_by_provider(Provider::Github, &external_id)
        .await?
    {
        if !user.is_active {
            warn!(user_id = user.id, "github login on deactivated account");
            return Err(AppError::unauthorized("Account is deactivated"));
        }
        info!(user_id = user.id, provider = %user.provider, "user logged in");
        return issue(state, user);
    }

    let login = profile
        .login
        .filter(|l| !l.trim().is_empty())
        .unwrap_or_else(|| format!("github-{}", external_id));
    let email = profile
        .email
        .map(|e| normalize_email(&e))
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| format!("{}@github.local", login.to_lowercase()));

    if tx.find_user_by_email(&email).await?.is_some() {
        warn!(email = %email, "github email belongs to another account");
        return Err(AppError::conflict("Email already used by another account"));
    }

    let user = tx
        .insert_user(NewUser {
            name: profile
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| login.clone()),
            email,
            password_hash: None,
            avatar: profile.avatar_url,
            role: Role::User,
            provider: Provider::Github,
            provider_id: Some(external_id),
        })
        .await?;
    tx.commit().await?;

    info!(user_id = user.id, provider = %user.provider, "user registered");
    issue(state, user)
}

/// Reloads the token's subject; missing or deactivated accounts no longer authenticate.
pub async fn load_active_user(state: &AppState, user_id: i64) -> AppResult<User> {
    let mut tx = state.store.begin().await?;
    let user = tx.find_user_by_id(user_id).await?;
    match user {
        Some(u) if u.is_active => Ok(u),
        Some(u) => {
            warn!(user_id = u.id, "token for deactivated account");
            Err(AppError::unauthorized("Account is deactivated"))
        }
        None => Err(AppError::unauthorized("User not found")),
    }
}

/// Blank names leave the profile untouched.
#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn update_profile(state: &AppState, user: User, name: &str) -> AppResult<User> {
    let name = name.trim();
    if name.is_empty() {
        return Ok(user);
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::invalid("Name is too long"));
    }

    let mut tx = state.store.begin().await?;
    let mut current = tx
        .find_user_by_id(user.id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    current.name = name.to_string();
    let saved = tx.update_user(&current).await?;
    tx.commit().await?;

    info!("profile updated");
    Ok(saved)
}

/// Creates the configured administrator unless the email is already taken.
pub async fn seed_admin(state: &AppState, seed: &AdminSeed) -> anyhow::Result<()> {
    let email = normalize_email(&seed.email);
    let mut tx = state.store.begin().await?;
    if let Some(existing) = tx.find_user_by_email(&email).await? {
        if !existing.is_admin() {
            warn!(user_id = existing.id, "admin seed email belongs to a regular user");
        }
        return Ok(());
    }
    let user = tx
        .insert_user(NewUser {
            name: seed.name.clone(),
            avatar: Some(default_avatar(&email)),
            email,
            password_hash: Some(hash_password(&seed.password)?),
            role: Role::Admin,
            provider: Provider::Local,
            provider_id: None,
        })
        .await?;
    tx.commit().await?;
    info!(user_id = user.id, "admin account seeded");
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Inserts an account directly, skipping password hashing.
    pub async fn insert_user(state: &AppState, email: &str, role: Role) -> User {
        let mut tx = state.store.begin().await.unwrap();
        let user = tx
            .insert_user(NewUser {
                name: local_part(email).to_string(),
                email: email.to_string(),
                password_hash: None,
                avatar: None,
                role,
                provider: Provider::Local,
                provider_id: None,
            })
            .await
            .unwrap();
        tx.commit().await.unwrap();
        user
    }

    pub fn token_for(state: &AppState, user: &User) -> String {
        JwtKeys::from_ref(state).sign(user).unwrap()
    }
}
