//! Transactional persistence seam shared by every service.
//!
//! A service opens one [`StoreTx`] per operation, performs its reads and writes through
//! it and commits at the end. Dropping a transaction without committing rolls it back.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::{
    auth::repo_types::{NewUser, Provider, Role, User},
    tools::repo_types::{NewTool, Tool, ToolStatus},
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write; carries the clashing field.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(&'static str),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>>;
}

#[async_trait]
pub trait StoreTx: Send {
    async fn commit(self: Box<Self>) -> StoreResult<()>;

    // ---- users ----
    async fn insert_user(&mut self, user: NewUser) -> StoreResult<User>;
    async fn find_user_by_id(&mut self, id: i64) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&mut self, email: &str) -> StoreResult<Option<User>>;
    async fn find_user_by_provider(
        &mut self,
        provider: Provider,
        provider_id: &str,
    ) -> StoreResult<Option<User>>;
    /// Persists mutable fields and refreshes `updated_at`.
    async fn update_user(&mut self, user: &User) -> StoreResult<User>;
    async fn query_users(&mut self, filter: &UserFilter, page: PageRequest)
        -> StoreResult<Page<User>>;
    async fn user_stats(&mut self) -> StoreResult<UserStats>;

    // ---- tools ----
    async fn insert_tool(&mut self, tool: NewTool) -> StoreResult<Tool>;
    async fn find_tool_by_id(&mut self, id: i64) -> StoreResult<Option<Tool>>;
    async fn find_tool_by_uuid(&mut self, uuid: &str) -> StoreResult<Option<Tool>>;
    /// Persists mutable fields and refreshes `updated_at`.
    async fn update_tool(&mut self, tool: &Tool) -> StoreResult<Tool>;
    async fn delete_tool(&mut self, id: i64) -> StoreResult<()>;
    /// Newest first.
    async fn query_tools(&mut self, filter: &ToolFilter, page: PageRequest)
        -> StoreResult<Page<Tool>>;
    async fn distinct_categories(&mut self) -> StoreResult<Vec<String>>;
    async fn tool_stats(&mut self, owner_id: Option<i64>) -> StoreResult<ToolStats>;
}

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub provider: Option<Provider>,
    pub is_active: Option<bool>,
    pub search: Option<String>, // name or email, case-insensitive
}

#[derive(Debug, Clone, Default)]
pub struct ToolFilter {
    pub owner_id: Option<i64>,
    pub category: Option<String>,
    pub status: Option<ToolStatus>,
    pub is_public: Option<bool>,
    pub search: Option<String>, // name, description or owner email
    /// Listed tools plus everything owned by this user.
    pub visible_to: Option<i64>,
}

impl ToolFilter {
    pub(crate) fn matches(&self, tool: &Tool, owner_email: Option<&str>) -> bool {
        if let Some(viewer) = self.visible_to {
            if !(tool.is_listed() || tool.user_id == viewer) {
                return false;
            }
        }
        if self.owner_id.is_some_and(|id| tool.user_id != id) {
            return false;
        }
        if let Some(category) = &self.category {
            if tool.category.as_deref() != Some(category.as_str()) {
                return false;
            }
        }
        if self.status.is_some_and(|s| tool.status != s) {
            return false;
        }
        if self.is_public.is_some_and(|p| tool.is_public != p) {
            return false;
        }
        if let Some(needle) = self.search.as_deref().map(str::to_lowercase) {
            let hit = |field: Option<&str>| {
                field.is_some_and(|f| f.to_lowercase().contains(&needle))
            };
            if !(hit(Some(&tool.name)) || hit(tool.description.as_deref()) || hit(owner_email)) {
                return false;
            }
        }
        true
    }
}

impl UserFilter {
    pub(crate) fn matches(&self, user: &User) -> bool {
        if self.role.is_some_and(|r| user.role != r) {
            return false;
        }
        if self.provider.is_some_and(|p| user.provider != p) {
            return false;
        }
        if self.is_active.is_some_and(|a| user.is_active != a) {
            return false;
        }
        if let Some(needle) = self.search.as_deref().map(str::to_lowercase) {
            if !(user.name.to_lowercase().contains(&needle)
                || user.email.to_lowercase().contains(&needle))
            {
                return false;
            }
        }
        true
    }
}

pub const DEFAULT_PER_PAGE: i64 = 10;
pub const MAX_PER_PAGE: i64 = 100;
/// Highest page whose offset still fits an `i64` at any page size.
pub const MAX_PAGE: i64 = i64::MAX / MAX_PER_PAGE;

/// Offset pagination request, already clamped to sane bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub per_page: i64,
}

impl PageRequest {
    pub fn new(page: Option<i64>, per_page: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).clamp(1, MAX_PAGE),
            per_page: per_page
                .unwrap_or(DEFAULT_PER_PAGE)
                .clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.per_page
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, req: PageRequest) -> Self {
        let pages = (total + req.per_page - 1) / req.per_page;
        Self {
            items,
            page: req.page,
            per_page: req.per_page,
            total,
            pages,
            has_next: req.page < pages,
            has_prev: req.page > 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct UserStats {
    pub total: i64,
    pub active: i64,
    pub inactive: i64,
    pub admin: i64,
    pub user: i64,
    pub github: i64,
    pub local: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct ToolStats {
    pub total: i64,
    pub public: i64,
    pub private: i64,
    pub approved: i64,
    pub pending: i64,
    pub rejected: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::repo_types::sample_tool;

    #[test]
    fn page_request_clamps() {
        assert_eq!(PageRequest::new(None, None), PageRequest { page: 1, per_page: 10 });
        assert_eq!(PageRequest::new(Some(0), Some(0)), PageRequest { page: 1, per_page: 1 });
        assert_eq!(
            PageRequest::new(Some(3), Some(1000)),
            PageRequest { page: 3, per_page: MAX_PER_PAGE }
        );
        assert_eq!(PageRequest::new(Some(3), Some(20)).offset(), 40);
    }

    #[test]
    fn huge_page_is_capped_and_offset_fits() {
        let req = PageRequest::new(Some(i64::MAX), Some(MAX_PER_PAGE));
        assert_eq!(req.page, MAX_PAGE);
        assert!(req.offset() > 0);

        let p: Page<i32> = Page::new(vec![], 3, req);
        assert!(p.items.is_empty());
        assert!(p.has_prev);
        assert!(!p.has_next);
    }

    #[test]
    fn page_math() {
        let p = Page::new(vec![1, 2], 12, PageRequest::new(Some(2), Some(5)));
        assert_eq!(p.pages, 3);
        assert!(p.has_next);
        assert!(p.has_prev);

        let empty: Page<i32> = Page::new(vec![], 0, PageRequest::default());
        assert_eq!(empty.pages, 0);
        assert!(!empty.has_next);
        assert!(!empty.has_prev);
    }

    #[test]
    fn visibility_filter_admits_listed_or_owned() {
        let filter = ToolFilter { visible_to: Some(99), ..Default::default() };
        let listed = sample_tool(ToolStatus::Approved, true);
        let pending_public = sample_tool(ToolStatus::Pending, true);
        let mut own_private = sample_tool(ToolStatus::Rejected, false);
        own_private.user_id = 99;

        assert!(filter.matches(&listed, None));
        assert!(!filter.matches(&pending_public, None));
        assert!(filter.matches(&own_private, None));
    }

    #[test]
    fn search_is_case_insensitive_over_owner_email() {
        let filter = ToolFilter { search: Some("ANN@".into()), ..Default::default() };
        let tool = sample_tool(ToolStatus::Pending, false);
        assert!(filter.matches(&tool, Some("ann@x.com")));
        assert!(!filter.matches(&tool, Some("bob@x.com")));

        let filter = ToolFilter { search: Some("GRE".into()), ..Default::default() };
        assert!(filter.matches(&tool, None));
    }
}
