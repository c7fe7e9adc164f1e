use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::config::GithubConfig;

/// Body of the code-for-token exchange; providers answer 200 with an error payload,
/// so a missing token is reported here rather than as a transport failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub error: Option<String>,
}

/// Profile of the external account.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExternalProfile {
    pub id: Option<i64>,
    pub login: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

#[async_trait]
pub trait OAuthProvider: Send + Sync {
    async fn exchange_code(&self, code: &str) -> anyhow::Result<TokenResponse>;
    async fn fetch_profile(&self, access_token: &str) -> anyhow::Result<ExternalProfile>;
}

pub struct GithubClient {
    http: reqwest::Client,
    cfg: GithubConfig,
}

impl GithubClient {
    pub fn new(cfg: GithubConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("toolshelf/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build http client")?;
        Ok(Self { http, cfg })
    }
}

#[async_trait]
impl OAuthProvider for GithubClient {
    #[instrument(skip_all)]
    async fn exchange_code(&self, code: &str) -> anyhow::Result<TokenResponse> {
        let url = format!("{}/login/oauth/access_token", self.cfg.oauth_url.trim_end_matches('/'));
        let resp = self
            .http
            .post(&url)
            .header(ACCEPT, "application/json")
            .form(&[
                ("client_id", self.cfg.client_id.as_str()),
                ("client_secret", self.cfg.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", self.cfg.redirect_uri.as_str()),
            ])
            .send()
            .await
            .context("github token request")?;
        debug!(status = %resp.status(), "github token response");
        let body = resp
            .error_for_status()
            .context("github token status")?
            .json::<TokenResponse>()
            .await
            .context("github token body")?;
        Ok(body)
    }

    #[instrument(skip_all)]
    async fn fetch_profile(&self, access_token: &str) -> anyhow::Result<ExternalProfile> {
        let url = format!("{}/user", self.cfg.api_url.trim_end_matches('/'));
        let resp = self
            .http
            .get(&url)
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, format!("token {}", access_token))
            .send()
            .await
            .context("github user request")?;
        debug!(status = %resp.status(), "github user response");
        let profile = resp
            .error_for_status()
            .context("github user status")?
            .json::<ExternalProfile>()
            .await
            .context("github user body")?;
        Ok(profile)
    }
}
