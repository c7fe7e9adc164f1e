use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::extractors::CurrentUser,
    error::AppResult,
    policy::{allows, Action},
    state::AppState,
    tools::{
        dto::{
            CategoriesResponse, CreateToolRequest, ListToolsQuery, MessageResponse, ToolEnvelope,
            ToolListResponse, ToolPatch, ToolResponse,
        },
        services,
    },
};

pub fn tool_routes() -> Router<AppState> {
    Router::new()
        .route("/tools", get(list_tools).post(create_tool))
        .route("/tools/categories", get(categories))
        .route(
            "/tools/:uuid",
            get(get_tool).put(update_tool).delete(delete_tool),
        )
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn create_tool(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<CreateToolRequest>,
) -> AppResult<(StatusCode, Json<ToolEnvelope>)> {
    let tool = services::create_tool(&state, &user, payload).await?;
    let include_review = allows(&user, Action::ViewReviewInfo);
    Ok((
        StatusCode::CREATED,
        Json(ToolEnvelope {
            success: true,
            message: Some("Tool created"),
            tool: ToolResponse::new(tool, include_review),
        }),
    ))
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn list_tools(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ListToolsQuery>,
) -> AppResult<Json<ToolListResponse>> {
    let page = services::list_tools(&state, &user, query).await?;
    Ok(Json(ToolListResponse::new(
        page,
        allows(&user, Action::ViewReviewInfo),
    )))
}

#[instrument(skip_all)]
pub async fn categories(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
) -> AppResult<Json<CategoriesResponse>> {
    let categories = services::categories(&state).await?;
    Ok(Json(CategoriesResponse {
        success: true,
        categories,
    }))
}

#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn get_tool(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(uuid): Path<String>,
) -> AppResult<Json<ToolEnvelope>> {
    let tool = services::get_tool(&state, &user, &uuid).await?;
    Ok(Json(ToolEnvelope {
        success: true,
        message: None,
        tool: ToolResponse::new(tool, allows(&user, Action::ViewReviewInfo)),
    }))
}

#[instrument(skip(state, user, patch), fields(user_id = user.id))]
pub async fn update_tool(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(uuid): Path<String>,
    Json(patch): Json<ToolPatch>,
) -> AppResult<Json<ToolEnvelope>> {
    let tool = services::update_tool(&state, &user, &uuid, patch).await?;
    Ok(Json(ToolEnvelope {
        success: true,
        message: Some("Tool updated"),
        tool: ToolResponse::new(tool, allows(&user, Action::ViewReviewInfo)),
    }))
}

#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn delete_tool(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(uuid): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    services::delete_tool(&state, &user, &uuid).await?;
    Ok(Json(MessageResponse {
        success: true,
        message: "Tool deleted",
    }))
}
