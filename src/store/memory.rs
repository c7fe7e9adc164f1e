use std::{collections::BTreeSet, sync::Arc};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{
    Page, PageRequest, Store, StoreError, StoreResult, StoreTx, ToolFilter, ToolStats,
    UserFilter, UserStats,
};
use crate::{
    auth::repo_types::{NewUser, Provider, Role, User},
    tools::repo_types::{NewTool, Tool, ToolStatus},
};

#[derive(Debug, Clone, Default)]
struct Data {
    users: Vec<User>,
    tools: Vec<Tool>,
    last_user_id: i64,
    last_tool_id: i64,
}

/// Process-local store. A transaction holds the lock for its whole lifetime, works on a
/// copy of the data and publishes the copy on commit.
#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<Mutex<Data>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let guard = self.data.clone().lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemoryTx { guard, work }))
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<Data>,
    work: Data,
}

fn count<T>(rows: &[T], pred: impl Fn(&T) -> bool) -> i64 {
    rows.iter().filter(|r| pred(r)).count() as i64
}

fn paginate<T: Clone>(mut rows: Vec<T>, page: PageRequest) -> Page<T> {
    let total = rows.len() as i64;
    let items = rows
        .drain(..)
        .skip(page.offset() as usize)
        .take(page.per_page as usize)
        .collect();
    Page::new(items, total, page)
}

impl MemoryTx {
    fn check_user_unique(
        &self,
        id: Option<i64>,
        email: &str,
        provider: Provider,
        provider_id: Option<&str>,
    ) -> StoreResult<()> {
        let others = self.work.users.iter().filter(|u| Some(u.id) != id);
        for other in others {
            if other.email == email {
                return Err(StoreError::UniqueViolation("email"));
            }
            if provider_id.is_some()
                && other.provider == provider
                && other.provider_id.as_deref() == provider_id
            {
                return Err(StoreError::UniqueViolation("provider identity"));
            }
        }
        Ok(())
    }

    fn owner_email(&self, user_id: i64) -> Option<&str> {
        self.work
            .users
            .iter()
            .find(|u| u.id == user_id)
            .map(|u| u.email.as_str())
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryTx { mut guard, work } = *self;
        *guard = work;
        Ok(())
    }

    async fn insert_user(&mut self, user: NewUser) -> StoreResult<User> {
        self.check_user_unique(
            None,
            &user.email,
            user.provider,
            user.provider_id.as_deref(),
        )?;
        self.work.last_user_id += 1;
        let now = OffsetDateTime::now_utc();
        let row = User {
            id: self.work.last_user_id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            avatar: user.avatar,
            role: user.role,
            provider: user.provider,
            provider_id: user.provider_id,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.work.users.push(row.clone());
        Ok(row)
    }

    async fn find_user_by_id(&mut self, id: i64) -> StoreResult<Option<User>> {
        Ok(self.work.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&mut self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.work.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_provider(
        &mut self,
        provider: Provider,
        provider_id: &str,
    ) -> StoreResult<Option<User>> {
        Ok(self
            .work
            .users
            .iter()
            .find(|u| u.provider == provider && u.provider_id.as_deref() == Some(provider_id))
            .cloned())
    }

    async fn update_user(&mut self, user: &User) -> StoreResult<User> {
        self.check_user_unique(
            Some(user.id),
            &user.email,
            user.provider,
            user.provider_id.as_deref(),
        )?;
        let row = self
            .work
            .users
            .iter_mut()
            .find(|u| u.id == user.id)
            .ok_or_else(|| anyhow::anyhow!("user {} vanished during update", user.id))?;
        row.name = user.name.clone();
        row.email = user.email.clone();
        row.password_hash = user.password_hash.clone();
        row.avatar = user.avatar.clone();
        row.role = user.role;
        row.is_active = user.is_active;
        row.updated_at = OffsetDateTime::now_utc();
        Ok(row.clone())
    }

    async fn query_users(
        &mut self,
        filter: &UserFilter,
        page: PageRequest,
    ) -> StoreResult<Page<User>> {
        let mut rows: Vec<User> = self
            .work
            .users
            .iter()
            .filter(|u| filter.matches(u))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(paginate(rows, page))
    }

    async fn user_stats(&mut self) -> StoreResult<UserStats> {
        let users = &self.work.users;
        Ok(UserStats {
            total: users.len() as i64,
            active: count(users, |u| u.is_active),
            inactive: count(users, |u| !u.is_active),
            admin: count(users, |u| u.role == Role::Admin),
            user: count(users, |u| u.role == Role::User),
            github: count(users, |u| u.provider == Provider::Github),
            local: count(users, |u| u.provider == Provider::Local),
        })
    }

    async fn insert_tool(&mut self, tool: NewTool) -> StoreResult<Tool> {
        if self.work.tools.iter().any(|t| t.uuid == tool.uuid) {
            return Err(StoreError::UniqueViolation("uuid"));
        }
        if !self.work.users.iter().any(|u| u.id == tool.user_id) {
            return Err(anyhow::anyhow!("owner {} does not exist", tool.user_id).into());
        }
        self.work.last_tool_id += 1;
        let now = OffsetDateTime::now_utc();
        let row = Tool {
            id: self.work.last_tool_id,
            uuid: tool.uuid,
            name: tool.name,
            description: tool.description,
            category: tool.category,
            url: tool.url,
            icon: tool.icon,
            is_public: tool.is_public,
            status: ToolStatus::Pending,
            user_id: tool.user_id,
            reviewed_by: None,
            reviewed_at: None,
            review_comment: None,
            created_at: now,
            updated_at: now,
        };
        self.work.tools.push(row.clone());
        Ok(row)
    }

    async fn find_tool_by_id(&mut self, id: i64) -> StoreResult<Option<Tool>> {
        Ok(self.work.tools.iter().find(|t| t.id == id).cloned())
    }

    async fn find_tool_by_uuid(&mut self, uuid: &str) -> StoreResult<Option<Tool>> {
        Ok(self.work.tools.iter().find(|t| t.uuid == uuid).cloned())
    }

    async fn update_tool(&mut self, tool: &Tool) -> StoreResult<Tool> {
        let row = self
            .work
            .tools
            .iter_mut()
            .find(|t| t.id == tool.id)
            .ok_or_else(|| anyhow::anyhow!("tool {} vanished during update", tool.id))?;
        row.name = tool.name.clone();
        row.description = tool.description.clone();
        row.category = tool.category.clone();
        row.url = tool.url.clone();
        row.icon = tool.icon.clone();
        row.is_public = tool.is_public;
        row.status = tool.status;
        row.reviewed_by = tool.reviewed_by;
        row.reviewed_at = tool.reviewed_at;
        row.review_comment = tool.review_comment.clone();
        row.updated_at = OffsetDateTime::now_utc();
        Ok(row.clone())
    }

    async fn delete_tool(&mut self, id: i64) -> StoreResult<()> {
        self.work.tools.retain(|t| t.id != id);
        Ok(())
    }

    async fn query_tools(
        &mut self,
        filter: &ToolFilter,
        page: PageRequest,
    ) -> StoreResult<Page<Tool>> {
        let mut rows: Vec<Tool> = self
            .work
            .tools
            .iter()
            .filter(|t| filter.matches(t, self.owner_email(t.user_id)))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(paginate(rows, page))
    }

    async fn distinct_categories(&mut self) -> StoreResult<Vec<String>> {
        let set: BTreeSet<String> = self
            .work
            .tools
            .iter()
            .filter_map(|t| t.category.clone())
            .filter(|c| !c.is_empty())
            .collect();
        Ok(set.into_iter().collect())
    }

    async fn tool_stats(&mut self, owner_id: Option<i64>) -> StoreResult<ToolStats> {
        let tools: Vec<&Tool> = self
            .work
            .tools
            .iter()
            .filter(|t| owner_id.map_or(true, |id| t.user_id == id))
            .collect();
        Ok(ToolStats {
            total: tools.len() as i64,
            public: count(&tools, |t| t.is_public),
            private: count(&tools, |t| !t.is_public),
            approved: count(&tools, |t| t.status == ToolStatus::Approved),
            pending: count(&tools, |t| t.status == ToolStatus::Pending),
            rejected: count(&tools, |t| t.status == ToolStatus::Rejected),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "n".into(),
            email: email.into(),
            password_hash: None,
            avatar: None,
            role: Role::User,
            provider: Provider::Local,
            provider_id: None,
        }
    }

    fn new_tool(uuid: &str, owner: i64) -> NewTool {
        NewTool {
            uuid: uuid.into(),
            name: format!("tool {}", uuid),
            description: None,
            category: Some("cli".into()),
            url: None,
            icon: None,
            is_public: false,
            user_id: owner,
        }
    }

    #[tokio::test]
    async fn uncommitted_transaction_rolls_back() {
        let store = MemoryStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_user(new_user("a@x.com")).await.unwrap();
        }
        let mut tx = store.begin().await.unwrap();
        assert!(tx.find_user_by_email("a@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn committed_writes_are_visible() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let user = tx.insert_user(new_user("a@x.com")).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let found = tx.find_user_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(found.email, "a@x.com");
        assert!(found.is_active);
    }

    #[tokio::test]
    async fn enforces_unique_email_and_provider_identity() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_user(new_user("a@x.com")).await.unwrap();
        let err = tx.insert_user(new_user("a@x.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation("email")));

        let mut gh = new_user("g1@github.local");
        gh.provider = Provider::Github;
        gh.provider_id = Some("42".into());
        tx.insert_user(gh.clone()).await.unwrap();
        gh.email = "g2@github.local".into();
        let err = tx.insert_user(gh).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation("provider identity")));
    }

    #[tokio::test]
    async fn finds_tool_by_id_and_uuid() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let owner = tx.insert_user(new_user("a@x.com")).await.unwrap();
        let tool = tx.insert_tool(new_tool("t1", owner.id)).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let by_id = tx.find_tool_by_id(tool.id).await.unwrap().unwrap();
        assert_eq!(by_id.uuid, "t1");
        let by_uuid = tx.find_tool_by_uuid("t1").await.unwrap().unwrap();
        assert_eq!(by_uuid.id, tool.id);
        assert!(tx.find_tool_by_id(tool.id + 1).await.unwrap().is_none());

        tx.delete_tool(tool.id).await.unwrap();
        assert!(tx.find_tool_by_id(tool.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn enforces_unique_tool_uuid() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let owner = tx.insert_user(new_user("a@x.com")).await.unwrap();
        tx.insert_tool(new_tool("t1", owner.id)).await.unwrap();
        let err = tx.insert_tool(new_tool("t1", owner.id)).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation("uuid")));
    }

    #[tokio::test]
    async fn query_orders_newest_first_and_paginates() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let owner = tx.insert_user(new_user("a@x.com")).await.unwrap();
        for i in 0..5 {
            tx.insert_tool(new_tool(&format!("t{}", i), owner.id)).await.unwrap();
        }
        let page = tx
            .query_tools(&ToolFilter::default(), PageRequest::new(Some(1), Some(2)))
            .await
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.pages, 3);
        let uuids: Vec<_> = page.items.iter().map(|t| t.uuid.as_str()).collect();
        assert_eq!(uuids, vec!["t4", "t3"]);
    }

    #[tokio::test]
    async fn categories_are_distinct_and_non_empty() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let owner = tx.insert_user(new_user("a@x.com")).await.unwrap();
        tx.insert_tool(new_tool("t1", owner.id)).await.unwrap();
        tx.insert_tool(new_tool("t2", owner.id)).await.unwrap();
        let mut t3 = new_tool("t3", owner.id);
        t3.category = Some(String::new());
        tx.insert_tool(t3).await.unwrap();
        let mut t4 = new_tool("t4", owner.id);
        t4.category = None;
        tx.insert_tool(t4).await.unwrap();
        assert_eq!(tx.distinct_categories().await.unwrap(), vec!["cli".to_string()]);
    }
}
