use sqlx::{PgConnection, Postgres, QueryBuilder};

use crate::auth::repo::like_pattern;
use crate::store::{Page, PageRequest, ToolFilter, ToolStats};
use crate::tools::repo_types::{NewTool, Tool};

const TOOL_COLUMNS: &str = "t.id, t.uuid, t.name, t.description, t.category, t.url, t.icon, \
     t.is_public, t.status, t.user_id, t.reviewed_by, t.reviewed_at, t.review_comment, \
     t.created_at, t.updated_at";

impl Tool {
    pub async fn find_by_uuid(conn: &mut PgConnection, uuid: &str) -> sqlx::Result<Option<Tool>> {
        sqlx::query_as::<_, Tool>(
            r#"
            SELECT id, uuid, name, description, category, url, icon, is_public, status,
                   user_id, reviewed_by, reviewed_at, review_comment, created_at, updated_at
            FROM tools
            WHERE uuid = $1
            "#,
        )
        .bind(uuid)
        .fetch_optional(conn)
        .await
    }

    pub async fn find_by_id(conn: &mut PgConnection, id: i64) -> sqlx::Result<Option<Tool>> {
        sqlx::query_as::<_, Tool>(
            r#"
            SELECT id, uuid, name, description, category, url, icon, is_public, status,
                   user_id, reviewed_by, reviewed_at, review_comment, created_at, updated_at
            FROM tools
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    /// Insert a new tool; status starts at the column default (pending).
    pub async fn create(conn: &mut PgConnection, new: NewTool) -> sqlx::Result<Tool> {
        sqlx::query_as::<_, Tool>(
            r#"
            INSERT INTO tools (uuid, name, description, category, url, icon, is_public, user_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, uuid, name, description, category, url, icon, is_public, status,
                      user_id, reviewed_by, reviewed_at, review_comment, created_at, updated_at
            "#,
        )
        .bind(new.uuid)
        .bind(new.name)
        .bind(new.description)
        .bind(new.category)
        .bind(new.url)
        .bind(new.icon)
        .bind(new.is_public)
        .bind(new.user_id)
        .fetch_one(conn)
        .await
    }

    pub async fn save(&self, conn: &mut PgConnection) -> sqlx::Result<Tool> {
        sqlx::query_as::<_, Tool>(
            r#"
            UPDATE tools
            SET name = $2, description = $3, category = $4, url = $5, icon = $6,
                is_public = $7, status = $8, reviewed_by = $9, reviewed_at = $10,
                review_comment = $11, updated_at = now()
            WHERE id = $1
            RETURNING id, uuid, name, description, category, url, icon, is_public, status,
                      user_id, reviewed_by, reviewed_at, review_comment, created_at, updated_at
            "#,
        )
        .bind(self.id)
        .bind(&self.name)
        .bind(&self.description)
        .bind(&self.category)
        .bind(&self.url)
        .bind(&self.icon)
        .bind(self.is_public)
        .bind(self.status)
        .bind(self.reviewed_by)
        .bind(self.reviewed_at)
        .bind(&self.review_comment)
        .fetch_one(conn)
        .await
    }

    pub async fn delete(conn: &mut PgConnection, id: i64) -> sqlx::Result<()> {
        sqlx::query("DELETE FROM tools WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(())
    }

    pub async fn list(
        conn: &mut PgConnection,
        filter: &ToolFilter,
        page: PageRequest,
    ) -> sqlx::Result<Page<Tool>> {
        let mut count = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM tools t JOIN users u ON u.id = t.user_id WHERE TRUE",
        );
        push_tool_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&mut *conn).await?;

        let mut rows = QueryBuilder::<Postgres>::new("SELECT ");
        rows.push(TOOL_COLUMNS)
            .push(" FROM tools t JOIN users u ON u.id = t.user_id WHERE TRUE");
        push_tool_filter(&mut rows, filter);
        rows.push(" ORDER BY t.created_at DESC, t.id DESC LIMIT ")
            .push_bind(page.per_page)
            .push(" OFFSET ")
            .push_bind(page.offset());
        let items = rows.build_query_as::<Tool>().fetch_all(&mut *conn).await?;

        Ok(Page::new(items, total, page))
    }

    pub async fn categories(conn: &mut PgConnection) -> sqlx::Result<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT category
            FROM tools
            WHERE category IS NOT NULL AND category <> ''
            ORDER BY category
            "#,
        )
        .fetch_all(conn)
        .await
    }

    /// Counts across all tools, or one owner's tools.
    pub async fn stats(conn: &mut PgConnection, owner_id: Option<i64>) -> sqlx::Result<ToolStats> {
        sqlx::query_as::<_, ToolStats>(
            r#"
            SELECT COUNT(*)                                      AS total,
                   COUNT(*) FILTER (WHERE is_public)             AS public,
                   COUNT(*) FILTER (WHERE NOT is_public)         AS private,
                   COUNT(*) FILTER (WHERE status = 'approved')   AS approved,
                   COUNT(*) FILTER (WHERE status = 'pending')    AS pending,
                   COUNT(*) FILTER (WHERE status = 'rejected')   AS rejected
            FROM tools
            WHERE ($1::BIGINT IS NULL OR user_id = $1)
            "#,
        )
        .bind(owner_id)
        .fetch_one(conn)
        .await
    }
}

fn push_tool_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &ToolFilter) {
    if let Some(viewer) = filter.visible_to {
        qb.push(" AND ((t.is_public AND t.status = 'approved') OR t.user_id = ")
            .push_bind(viewer)
            .push(")");
    }
    if let Some(owner) = filter.owner_id {
        qb.push(" AND t.user_id = ").push_bind(owner);
    }
    if let Some(category) = &filter.category {
        qb.push(" AND t.category = ").push_bind(category.clone());
    }
    if let Some(status) = filter.status {
        qb.push(" AND t.status = ").push_bind(status);
    }
    if let Some(public) = filter.is_public {
        qb.push(" AND t.is_public = ").push_bind(public);
    }
    if let Some(search) = &filter.search {
        let pattern = like_pattern(search);
        qb.push(" AND (t.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR t.description ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR u.email ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}
