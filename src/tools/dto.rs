use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

use crate::{
    store::Page,
    tools::repo_types::{Tool, ToolStatus},
};

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
fn double_option<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

/// Request body for creating a tool.
#[derive(Debug, Default, Deserialize)]
pub struct CreateToolRequest {
    pub uuid: Option<String>,
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub url: Option<String>,
    pub icon: Option<String>,
    #[serde(default)]
    pub is_public: bool,
}

/// Partial update; only fields present in the body are applied.
#[derive(Debug, Default, Deserialize)]
pub struct ToolPatch {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub category: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub icon: Option<Option<String>>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListToolsQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub category: Option<String>,
    pub is_public: Option<bool>,
    #[serde(default)]
    pub my_tools: bool,
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReviewInfo {
    pub reviewed_by: Option<i64>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub reviewed_at: Option<OffsetDateTime>,
    pub review_comment: Option<String>,
}

/// Public view of a tool; review bookkeeping is attached for admins only.
#[derive(Debug, Serialize)]
pub struct ToolResponse {
    pub id: i64,
    pub uuid: String,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub url: Option<String>,
    pub icon: Option<String>,
    pub is_public: bool,
    pub status: ToolStatus,
    pub user_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(flatten)]
    pub review: Option<ReviewInfo>,
}

impl ToolResponse {
    pub fn new(tool: Tool, include_review: bool) -> Self {
        let review = include_review.then(|| ReviewInfo {
            reviewed_by: tool.reviewed_by,
            reviewed_at: tool.reviewed_at,
            review_comment: tool.review_comment.clone(),
        });
        Self {
            id: tool.id,
            uuid: tool.uuid,
            name: tool.name,
            description: tool.description,
            category: tool.category,
            url: tool.url,
            icon: tool.icon,
            is_public: tool.is_public,
            status: tool.status,
            user_id: tool.user_id,
            created_at: tool.created_at,
            updated_at: tool.updated_at,
            review,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> From<&Page<T>> for Pagination {
    fn from(p: &Page<T>) -> Self {
        Self {
            page: p.page,
            per_page: p.per_page,
            total: p.total,
            pages: p.pages,
            has_next: p.has_next,
            has_prev: p.has_prev,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ToolEnvelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub tool: ToolResponse,
}

#[derive(Debug, Serialize)]
pub struct ToolListResponse {
    pub success: bool,
    pub tools: Vec<ToolResponse>,
    pub pagination: Pagination,
}

impl ToolListResponse {
    pub fn new(page: Page<Tool>, include_review: bool) -> Self {
        let pagination = Pagination::from(&page);
        Self {
            success: true,
            tools: page
                .items
                .into_iter()
                .map(|t| ToolResponse::new(t, include_review))
                .collect(),
            pagination,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CategoriesResponse {
    pub success: bool,
    pub categories: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: &'static str,
}
