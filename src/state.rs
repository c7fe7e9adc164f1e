use std::sync::Arc;

use anyhow::Context;

use crate::auth::oauth::{GithubClient, OAuthProvider};
use crate::config::AppConfig;
use crate::store::{MemoryStore, PgStore, Store};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<AppConfig>,
    pub oauth: Arc<dyn OAuthProvider>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store: Arc<dyn Store> = match &config.database_url {
            Some(url) => {
                let db = sqlx::postgres::PgPoolOptions::new()
                    .max_connections(10)
                    .connect(url)
                    .await
                    .context("connect to database")?;

                sqlx::migrate!("./migrations")
                    .run(&db)
                    .await
                    .context("run migrations")?;
                Arc::new(PgStore::new(db))
            }
            None => {
                tracing::warn!("DATABASE_URL not set; using in-memory store");
                Arc::new(MemoryStore::new())
            }
        };

        let oauth = Arc::new(GithubClient::new(config.github.clone())?) as Arc<dyn OAuthProvider>;

        Ok(Self::from_parts(store, config, oauth))
    }

    pub fn from_parts(
        store: Arc<dyn Store>,
        config: Arc<AppConfig>,
        oauth: Arc<dyn OAuthProvider>,
    ) -> Self {
        Self {
            store,
            config,
            oauth,
        }
    }
}

#[cfg(test)]
impl AppState {
    /// Memory store plus an OAuth provider that answers from fixed data.
    pub fn fake() -> Self {
        Self::fake_with_oauth(crate::auth::oauth::tests_support::StubOAuth::default())
    }

    pub fn fake_with_oauth(oauth: crate::auth::oauth::tests_support::StubOAuth) -> Self {
        Self::from_parts(
            Arc::new(MemoryStore::new()),
            Arc::new(AppConfig::for_tests()),
            Arc::new(oauth),
        )
    }
}
