use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use super::{
    Page, PageRequest, Store, StoreError, StoreResult, StoreTx, ToolFilter, ToolStats,
    UserFilter, UserStats,
};
use crate::{
    auth::repo_types::{NewUser, Provider, User},
    tools::repo_types::{NewTool, Tool},
};

const UNIQUE_VIOLATION: &str = "23505";

/// Postgres-backed store; each `begin` opens a database transaction.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await.context("begin tx")?;
        Ok(Box::new(PgTx { tx }))
    }
}

struct PgTx {
    tx: Transaction<'static, Postgres>,
}

/// Unique-constraint failures keep their meaning; everything else is a backend error.
fn map_sqlx(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
            let field = match db.constraint() {
                Some("users_email_key") => "email",
                Some("users_provider_identity_key") => "provider identity",
                Some("tools_uuid_key") => "uuid",
                _ => "record",
            };
            return StoreError::UniqueViolation(field);
        }
    }
    StoreError::Backend(e.into())
}

#[async_trait]
impl StoreTx for PgTx {
    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let PgTx { tx } = *self;
        tx.commit().await.map_err(map_sqlx)
    }

    async fn insert_user(&mut self, user: NewUser) -> StoreResult<User> {
        User::create(&mut self.tx, user).await.map_err(map_sqlx)
    }

    async fn find_user_by_id(&mut self, id: i64) -> StoreResult<Option<User>> {
        User::find_by_id(&mut self.tx, id).await.map_err(map_sqlx)
    }

    async fn find_user_by_email(&mut self, email: &str) -> StoreResult<Option<User>> {
        User::find_by_email(&mut self.tx, email)
            .await
            .map_err(map_sqlx)
    }

    async fn find_user_by_provider(
        &mut self,
        provider: Provider,
        provider_id: &str,
    ) -> StoreResult<Option<User>> {
        User::find_by_provider(&mut self.tx, provider, provider_id)
            .await
            .map_err(map_sqlx)
    }

    async fn update_user(&mut self, user: &User) -> StoreResult<User> {
        user.save(&mut self.tx).await.map_err(map_sqlx)
    }

    async fn query_users(
        &mut self,
        filter: &UserFilter,
        page: PageRequest,
    ) -> StoreResult<Page<User>> {
        User::list(&mut self.tx, filter, page)
            .await
            .map_err(map_sqlx)
    }

    async fn user_stats(&mut self) -> StoreResult<UserStats> {
        User::stats(&mut self.tx).await.map_err(map_sqlx)
    }

    async fn insert_tool(&mut self, tool: NewTool) -> StoreResult<Tool> {
        Tool::create(&mut self.tx, tool).await.map_err(map_sqlx)
    }

    async fn find_tool_by_id(&mut self, id: i64) -> StoreResult<Option<Tool>> {
        Tool::find_by_id(&mut self.tx, id).await.map_err(map_sqlx)
    }

    async fn find_tool_by_uuid(&mut self, uuid: &str) -> StoreResult<Option<Tool>> {
        Tool::find_by_uuid(&mut self.tx, uuid)
            .await
            .map_err(map_sqlx)
    }

    async fn update_tool(&mut self, tool: &Tool) -> StoreResult<Tool> {
        tool.save(&mut self.tx).await.map_err(map_sqlx)
    }

    async fn delete_tool(&mut self, id: i64) -> StoreResult<()> {
        Tool::delete(&mut self.tx, id).await.map_err(map_sqlx)
    }

    async fn query_tools(
        &mut self,
        filter: &ToolFilter,
        page: PageRequest,
    ) -> StoreResult<Page<Tool>> {
        Tool::list(&mut self.tx, filter, page)
            .await
            .map_err(map_sqlx)
    }

    async fn distinct_categories(&mut self) -> StoreResult<Vec<String>> {
        Tool::categories(&mut self.tx).await.map_err(map_sqlx)
    }

    async fn tool_stats(&mut self, owner_id: Option<i64>) -> StoreResult<ToolStats> {
        Tool::stats(&mut self.tx, owner_id)
            .await
            .map_err(map_sqlx)
    }
}
