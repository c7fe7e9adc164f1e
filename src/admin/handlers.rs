use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use tracing::instrument;

use crate::{
    admin::{
        dto::{
            ListAllToolsQuery, ListUsersQuery, PendingToolsQuery, ReviewRequest,
            ReviewedToolResponse, SetRoleRequest, SetStatusRequest, StatsBody, StatsResponse,
            UserDetail, UserDetailResponse, UserEnvelope, UserListResponse, UserToolsQuery,
        },
        services,
    },
    auth::extractors::AdminUser,
    error::{AppError, AppResult},
    state::AppState,
    tools::dto::{MessageResponse, ToolListResponse, ToolResponse},
};

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(list_users))
        .route("/admin/users/:id", get(get_user))
        .route("/admin/users/:id/role", put(set_role))
        .route("/admin/users/:id/status", put(set_status))
        .route("/admin/users/:id/tools", get(user_tools))
        .route("/admin/stats", get(stats))
        .route("/admin/tools", get(all_tools))
        .route("/admin/tools/pending", get(pending_tools))
        .route("/admin/tools/:uuid", axum::routing::delete(delete_tool))
        .route("/admin/tools/:uuid/approve", post(approve_tool))
        .route("/admin/tools/:uuid/reject", post(reject_tool))
}

#[instrument(skip_all, fields(actor_id = admin.id))]
pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Query(query): Query<ListUsersQuery>,
) -> AppResult<Json<UserListResponse>> {
    let page = services::list_users(&state, &admin, query).await?;
    Ok(Json(page.into()))
}

#[instrument(skip(state, admin), fields(actor_id = admin.id))]
pub async fn get_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
) -> AppResult<Json<UserDetailResponse>> {
    let (user, tool_stats) = services::user_detail(&state, &admin, id).await?;
    Ok(Json(UserDetailResponse {
        success: true,
        user: UserDetail { user, tool_stats },
    }))
}

#[instrument(skip(state, admin, payload), fields(actor_id = admin.id))]
pub async fn set_role(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
    Json(payload): Json<SetRoleRequest>,
) -> AppResult<Json<UserEnvelope>> {
    let user = services::set_role(&state, &admin, id, &payload.role).await?;
    Ok(Json(UserEnvelope {
        success: true,
        message: "User role updated",
        user,
    }))
}

#[instrument(skip(state, admin, payload), fields(actor_id = admin.id))]
pub async fn set_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
    Json(payload): Json<SetStatusRequest>,
) -> AppResult<Json<UserEnvelope>> {
    let is_active = payload
        .is_active
        .ok_or_else(|| AppError::invalid("is_active is required"))?;
    let user = services::set_active(&state, &admin, id, is_active).await?;
    Ok(Json(UserEnvelope {
        success: true,
        message: if is_active {
            "User activated"
        } else {
            "User deactivated"
        },
        user,
    }))
}

#[instrument(skip(state, admin, query), fields(actor_id = admin.id))]
pub async fn user_tools(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
    Query(query): Query<UserToolsQuery>,
) -> AppResult<Json<ToolListResponse>> {
    let page = services::user_tools(&state, &admin, id, query).await?;
    Ok(Json(ToolListResponse::new(page, true)))
}

#[instrument(skip_all, fields(actor_id = admin.id))]
pub async fn stats(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> AppResult<Json<StatsResponse>> {
    let (users, tools) = services::stats(&state, &admin).await?;
    Ok(Json(StatsResponse {
        success: true,
        stats: StatsBody { users, tools },
    }))
}

#[instrument(skip_all, fields(actor_id = admin.id))]
pub async fn pending_tools(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Query(query): Query<PendingToolsQuery>,
) -> AppResult<Json<ToolListResponse>> {
    let page = services::pending_tools(&state, &admin, query).await?;
    Ok(Json(ToolListResponse::new(page, true)))
}

#[instrument(skip_all, fields(actor_id = admin.id))]
pub async fn all_tools(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Query(query): Query<ListAllToolsQuery>,
) -> AppResult<Json<ToolListResponse>> {
    let page = services::all_tools(&state, &admin, query).await?;
    Ok(Json(ToolListResponse::new(page, true)))
}

/// The body is optional; an empty request approves without a comment.
#[instrument(skip(state, admin, payload), fields(actor_id = admin.id))]
pub async fn approve_tool(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(uuid): Path<String>,
    payload: Option<Json<ReviewRequest>>,
) -> AppResult<Json<ReviewedToolResponse>> {
    let comment = payload.and_then(|Json(r)| r.comment);
    let tool = services::approve_tool(&state, &admin, &uuid, comment).await?;
    Ok(Json(ReviewedToolResponse {
        success: true,
        message: "Tool approved",
        tool: ToolResponse::new(tool, true),
    }))
}

#[instrument(skip(state, admin, payload), fields(actor_id = admin.id))]
pub async fn reject_tool(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(uuid): Path<String>,
    payload: Option<Json<ReviewRequest>>,
) -> AppResult<Json<ReviewedToolResponse>> {
    let comment = payload.and_then(|Json(r)| r.comment);
    let tool = services::reject_tool(&state, &admin, &uuid, comment).await?;
    Ok(Json(ReviewedToolResponse {
        success: true,
        message: "Tool rejected",
        tool: ToolResponse::new(tool, true),
    }))
}

#[instrument(skip(state, admin), fields(actor_id = admin.id))]
pub async fn delete_tool(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(uuid): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    services::delete_tool(&state, &admin, &uuid).await?;
    Ok(Json(MessageResponse {
        success: true,
        message: "Tool deleted",
    }))
}
