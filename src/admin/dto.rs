use serde::{Deserialize, Serialize};

use crate::{
    auth::repo_types::{Provider, Role, User},
    store::{Page, ToolStats, UserStats},
    tools::{
        dto::{Pagination, ToolResponse},
        repo_types::ToolStatus,
    },
};

#[derive(Debug, Default, Deserialize)]
pub struct ListUsersQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub role: Option<Role>,
    pub provider: Option<Provider>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserToolsQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub status: Option<ToolStatus>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListAllToolsQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub status: Option<ToolStatus>,
    pub is_public: Option<bool>,
    pub category: Option<String>,
    pub user_id: Option<i64>,
    pub search: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PendingToolsQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub category: Option<String>,
}

/// Role arrives as free text so unknown values surface as a validation error.
#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewRequest {
    pub comment: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub success: bool,
    pub users: Vec<User>,
    pub pagination: Pagination,
}

impl From<Page<User>> for UserListResponse {
    fn from(page: Page<User>) -> Self {
        let pagination = Pagination::from(&page);
        Self {
            success: true,
            users: page.items,
            pagination,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: User,
    pub tool_stats: ToolStats,
}

#[derive(Debug, Serialize)]
pub struct UserDetailResponse {
    pub success: bool,
    pub user: UserDetail,
}

#[derive(Debug, Serialize)]
pub struct UserEnvelope {
    pub success: bool,
    pub message: &'static str,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct ReviewedToolResponse {
    pub success: bool,
    pub message: &'static str,
    pub tool: ToolResponse,
}

#[derive(Debug, Serialize)]
pub struct StatsBody {
    pub users: UserStats,
    pub tools: ToolStats,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub success: bool,
    pub stats: StatsBody,
}
