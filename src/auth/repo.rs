use sqlx::{PgConnection, Postgres, QueryBuilder};

use crate::auth::repo_types::{NewUser, Provider, User};
use crate::store::{Page, PageRequest, UserFilter, UserStats};

const USER_COLUMNS: &str =
    "id, name, email, password_hash, avatar, role, provider, provider_id, is_active, created_at, updated_at";

impl User {
    /// Find a user by (already normalized) email.
    pub async fn find_by_email(conn: &mut PgConnection, email: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, avatar, role, provider, provider_id,
                   is_active, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(conn)
        .await
    }

    pub async fn find_by_id(conn: &mut PgConnection, id: i64) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, avatar, role, provider, provider_id,
                   is_active, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    /// Find a user linked to an external identity.
    pub async fn find_by_provider(
        conn: &mut PgConnection,
        provider: Provider,
        provider_id: &str,
    ) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, avatar, role, provider, provider_id,
                   is_active, created_at, updated_at
            FROM users
            WHERE provider = $1 AND provider_id = $2
            "#,
        )
        .bind(provider)
        .bind(provider_id)
        .fetch_optional(conn)
        .await
    }

    pub async fn create(conn: &mut PgConnection, new: NewUser) -> sqlx::Result<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password_hash, avatar, role, provider, provider_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, name, email, password_hash, avatar, role, provider, provider_id,
                      is_active, created_at, updated_at
            "#,
        )
        .bind(new.name)
        .bind(new.email)
        .bind(new.password_hash)
        .bind(new.avatar)
        .bind(new.role)
        .bind(new.provider)
        .bind(new.provider_id)
        .fetch_one(conn)
        .await
    }

    pub async fn save(&self, conn: &mut PgConnection) -> sqlx::Result<User> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET name = $2, email = $3, password_hash = $4, avatar = $5,
                role = $6, is_active = $7, updated_at = now()
            WHERE id = $1
            RETURNING id, name, email, password_hash, avatar, role, provider, provider_id,
                      is_active, created_at, updated_at
            "#,
        )
        .bind(self.id)
        .bind(&self.name)
        .bind(&self.email)
        .bind(&self.password_hash)
        .bind(&self.avatar)
        .bind(self.role)
        .bind(self.is_active)
        .fetch_one(conn)
        .await
    }

    pub async fn list(
        conn: &mut PgConnection,
        filter: &UserFilter,
        page: PageRequest,
    ) -> sqlx::Result<Page<User>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users WHERE TRUE");
        push_user_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&mut *conn).await?;

        let mut rows = QueryBuilder::<Postgres>::new("SELECT ");
        rows.push(USER_COLUMNS).push(" FROM users WHERE TRUE");
        push_user_filter(&mut rows, filter);
        rows.push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(page.per_page)
            .push(" OFFSET ")
            .push_bind(page.offset());
        let items = rows.build_query_as::<User>().fetch_all(&mut *conn).await?;

        Ok(Page::new(items, total, page))
    }

    pub async fn stats(conn: &mut PgConnection) -> sqlx::Result<UserStats> {
        sqlx::query_as::<_, UserStats>(
            r#"
            SELECT COUNT(*)                                      AS total,
                   COUNT(*) FILTER (WHERE is_active)             AS active,
                   COUNT(*) FILTER (WHERE NOT is_active)         AS inactive,
                   COUNT(*) FILTER (WHERE role = 'admin')        AS admin,
                   COUNT(*) FILTER (WHERE role = 'user')         AS "user",
                   COUNT(*) FILTER (WHERE provider = 'github')   AS github,
                   COUNT(*) FILTER (WHERE provider = 'local')    AS local
            FROM users
            "#,
        )
        .fetch_one(conn)
        .await
    }
}

fn push_user_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter) {
    if let Some(role) = filter.role {
        qb.push(" AND role = ").push_bind(role);
    }
    if let Some(provider) = filter.provider {
        qb.push(" AND provider = ").push_bind(provider);
    }
    if let Some(active) = filter.is_active {
        qb.push(" AND is_active = ").push_bind(active);
    }
    if let Some(search) = &filter.search {
        let pattern = like_pattern(search);
        qb.push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR email ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

/// `%needle%` with LIKE metacharacters escaped.
pub(crate) fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("ann"), "%ann%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }
}
