use tracing::{info, instrument, warn};

use crate::{
    admin::dto::{ListAllToolsQuery, ListUsersQuery, PendingToolsQuery, UserToolsQuery},
    auth::repo_types::{Role, User},
    error::{AppError, AppResult},
    policy::{authorize, Action},
    state::AppState,
    store::{Page, PageRequest, StoreTx, ToolFilter, ToolStats, UserFilter, UserStats},
    tools::{
        repo_types::{Tool, ToolStatus},
        services::load_tool,
    },
};

async fn load_user(tx: &mut dyn StoreTx, id: i64) -> AppResult<User> {
    tx.find_user_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn ensure_pending(tool: &Tool) -> AppResult<()> {
    if tool.status != ToolStatus::Pending {
        return Err(AppError::InvalidState(format!(
            "Tool is already {}",
            tool.status
        )));
    }
    Ok(())
}

// ---- users ----

#[instrument(skip(state, actor, query), fields(actor_id = actor.id))]
pub async fn list_users(
    state: &AppState,
    actor: &User,
    query: ListUsersQuery,
) -> AppResult<Page<User>> {
    authorize(actor, Action::Moderate)?;
    let filter = UserFilter {
        role: query.role,
        provider: query.provider,
        is_active: query.is_active,
        search: non_blank(query.search),
    };
    let mut tx = state.store.begin().await?;
    let page = tx
        .query_users(&filter, PageRequest::new(query.page, query.per_page))
        .await?;
    Ok(page)
}

#[instrument(skip(state, actor), fields(actor_id = actor.id))]
pub async fn user_detail(
    state: &AppState,
    actor: &User,
    user_id: i64,
) -> AppResult<(User, ToolStats)> {
    authorize(actor, Action::Moderate)?;
    let mut tx = state.store.begin().await?;
    let user = load_user(tx.as_mut(), user_id).await?;
    let stats = tx.tool_stats(Some(user.id)).await?;
    Ok((user, stats))
}

/// Checks run in a fixed order: role value, self-target, then existence.
#[instrument(skip(state, actor), fields(actor_id = actor.id))]
pub async fn set_role(
    state: &AppState,
    actor: &User,
    user_id: i64,
    role: &str,
) -> AppResult<User> {
    authorize(actor, Action::Moderate)?;
    let role: Role = role
        .trim()
        .to_lowercase()
        .parse()
        .map_err(|_| AppError::invalid("Role must be 'user' or 'admin'"))?;
    authorize(actor, Action::ManageUser { target_id: user_id })?;

    let mut tx = state.store.begin().await?;
    let mut user = load_user(tx.as_mut(), user_id).await?;
    user.role = role;
    let saved = tx.update_user(&user).await?;
    tx.commit().await?;

    info!(user_id, role = %role, "user role changed");
    Ok(saved)
}

#[instrument(skip(state, actor), fields(actor_id = actor.id))]
pub async fn set_active(
    state: &AppState,
    actor: &User,
    user_id: i64,
    is_active: bool,
) -> AppResult<User> {
    authorize(actor, Action::ManageUser { target_id: user_id })?;

    let mut tx = state.store.begin().await?;
    let mut user = load_user(tx.as_mut(), user_id).await?;
    user.is_active = is_active;
    let saved = tx.update_user(&user).await?;
    tx.commit().await?;

    info!(user_id, is_active, "user activation changed");
    Ok(saved)
}

#[instrument(skip(state, actor, query), fields(actor_id = actor.id))]
pub async fn user_tools(
    state: &AppState,
    actor: &User,
    user_id: i64,
    query: UserToolsQuery,
) -> AppResult<Page<Tool>> {
    authorize(actor, Action::Moderate)?;
    let mut tx = state.store.begin().await?;
    load_user(tx.as_mut(), user_id).await?;
    let filter = ToolFilter {
        owner_id: Some(user_id),
        status: query.status,
        is_public: query.is_public,
        ..ToolFilter::default()
    };
    let page = tx
        .query_tools(&filter, PageRequest::new(query.page, query.per_page))
        .await?;
    Ok(page)
}

#[instrument(skip(state, actor), fields(actor_id = actor.id))]
pub async fn stats(state: &AppState, actor: &User) -> AppResult<(UserStats, ToolStats)> {
    authorize(actor, Action::Moderate)?;
    let mut tx = state.store.begin().await?;
    let users = tx.user_stats().await?;
    let tools = tx.tool_stats(None).await?;
    Ok((users, tools))
}

// ---- tools ----

#[instrument(skip(state, actor, query), fields(actor_id = actor.id))]
pub async fn pending_tools(
    state: &AppState,
    actor: &User,
    query: PendingToolsQuery,
) -> AppResult<Page<Tool>> {
    authorize(actor, Action::Moderate)?;
    let filter = ToolFilter {
        status: Some(ToolStatus::Pending),
        is_public: Some(true),
        category: non_blank(query.category),
        ..ToolFilter::default()
    };
    let mut tx = state.store.begin().await?;
    let page = tx
        .query_tools(&filter, PageRequest::new(query.page, query.per_page))
        .await?;
    Ok(page)
}

#[instrument(skip(state, actor, query), fields(actor_id = actor.id))]
pub async fn all_tools(
    state: &AppState,
    actor: &User,
    query: ListAllToolsQuery,
) -> AppResult<Page<Tool>> {
    authorize(actor, Action::Moderate)?;
    let filter = ToolFilter {
        owner_id: query.user_id,
        status: query.status,
        is_public: query.is_public,
        category: non_blank(query.category),
        search: non_blank(query.search),
        visible_to: None,
    };
    let mut tx = state.store.begin().await?;
    let page = tx
        .query_tools(&filter, PageRequest::new(query.page, query.per_page))
        .await?;
    Ok(page)
}

#[instrument(skip(state, actor, comment), fields(actor_id = actor.id))]
pub async fn approve_tool(
    state: &AppState,
    actor: &User,
    uuid: &str,
    comment: Option<String>,
) -> AppResult<Tool> {
    authorize(actor, Action::Moderate)?;
    let mut tx = state.store.begin().await?;
    let mut tool = load_tool(tx.as_mut(), uuid).await?;
    ensure_pending(&tool)?;

    tool.approve(actor.id, comment.map(|c| c.trim().to_string()));
    let saved = tx.update_tool(&tool).await?;
    tx.commit().await?;

    info!(tool_id = saved.id, "tool approved");
    Ok(saved)
}

#[instrument(skip(state, actor, comment), fields(actor_id = actor.id))]
pub async fn reject_tool(
    state: &AppState,
    actor: &User,
    uuid: &str,
    comment: Option<String>,
) -> AppResult<Tool> {
    authorize(actor, Action::Moderate)?;
    let mut tx = state.store.begin().await?;
    let mut tool = load_tool(tx.as_mut(), uuid).await?;
    ensure_pending(&tool)?;
    let comment = non_blank(comment).ok_or_else(|| {
        warn!(tool_id = tool.id, "rejection without a reason");
        AppError::invalid("A comment is required when rejecting a tool")
    })?;

    tool.reject(actor.id, comment);
    let saved = tx.update_tool(&tool).await?;
    tx.commit().await?;

    info!(tool_id = saved.id, "tool rejected");
    Ok(saved)
}

#[instrument(skip(state, actor), fields(actor_id = actor.id))]
pub async fn delete_tool(state: &AppState, actor: &User, uuid: &str) -> AppResult<()> {
    authorize(actor, Action::Moderate)?;
    let mut tx = state.store.begin().await?;
    let tool = load_tool(tx.as_mut(), uuid).await?;
    tx.delete_tool(tool.id).await?;
    tx.commit().await?;

    info!(tool_id = tool.id, owner_id = tool.user_id, "tool deleted by admin");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo_types::Provider;
    use crate::auth::services::test_support::insert_user;
    use crate::tools::dto::{CreateToolRequest, ToolPatch};
    use crate::tools::services as tool_services;

    async fn submit(state: &AppState, owner: &User, uuid: &str, public: bool) -> Tool {
        tool_services::create_tool(
            state,
            owner,
            CreateToolRequest {
                uuid: Some(uuid.into()),
                name: uuid.into(),
                is_public: public,
                ..CreateToolRequest::default()
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn non_admin_is_forbidden() {
        let state = AppState::fake();
        let user = insert_user(&state, "u@x.com", Role::User).await;
        assert!(matches!(
            stats(&state, &user).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            approve_tool(&state, &user, "t1", None).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            set_role(&state, &user, 99, "admin").await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn set_role_checks_value_then_self_then_target() {
        let state = AppState::fake();
        let admin = insert_user(&state, "root@x.com", Role::Admin).await;
        let user = insert_user(&state, "u@x.com", Role::User).await;

        assert!(matches!(
            set_role(&state, &admin, user.id, "owner").await,
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            set_role(&state, &admin, admin.id, "user").await,
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            set_role(&state, &admin, 4242, "admin").await,
            Err(AppError::NotFound(_))
        ));

        let promoted = set_role(&state, &admin, user.id, "Admin").await.unwrap();
        assert_eq!(promoted.role, Role::Admin);
    }

    #[tokio::test]
    async fn set_active_guards_self_and_persists() {
        let state = AppState::fake();
        let admin = insert_user(&state, "root@x.com", Role::Admin).await;
        let user = insert_user(&state, "u@x.com", Role::User).await;

        assert!(matches!(
            set_active(&state, &admin, admin.id, false).await,
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            set_active(&state, &admin, 4242, false).await,
            Err(AppError::NotFound(_))
        ));
        let off = set_active(&state, &admin, user.id, false).await.unwrap();
        assert!(!off.is_active);

        let (detail, _) = user_detail(&state, &admin, user.id).await.unwrap();
        assert!(!detail.is_active);
    }

    #[tokio::test]
    async fn approve_and_reject_only_from_pending() {
        let state = AppState::fake();
        let admin = insert_user(&state, "root@x.com", Role::Admin).await;
        let owner = insert_user(&state, "o@x.com", Role::User).await;
        submit(&state, &owner, "a", true).await;
        submit(&state, &owner, "b", true).await;

        let approved = approve_tool(&state, &admin, "a", None).await.unwrap();
        assert_eq!(approved.status, ToolStatus::Approved);
        assert_eq!(approved.reviewed_by, Some(admin.id));
        assert_eq!(approved.review_comment.as_deref(), Some(""));
        assert!(approved.reviewed_at.is_some());

        assert!(matches!(
            approve_tool(&state, &admin, "a", None).await,
            Err(AppError::InvalidState(_))
        ));
        assert!(matches!(
            reject_tool(&state, &admin, "a", Some("late".into())).await,
            Err(AppError::InvalidState(_))
        ));

        assert!(matches!(
            reject_tool(&state, &admin, "b", Some("   ".into())).await,
            Err(AppError::InvalidInput(_))
        ));
        let rejected = reject_tool(&state, &admin, "b", Some("broken link".into()))
            .await
            .unwrap();
        assert_eq!(rejected.status, ToolStatus::Rejected);
        assert_eq!(rejected.review_comment.as_deref(), Some("broken link"));

        assert!(matches!(
            approve_tool(&state, &admin, "missing", None).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn review_scenario_round_trip() {
        let state = AppState::fake();
        let admin = insert_user(&state, "root@x.com", Role::Admin).await;
        let owner = insert_user(&state, "ann@x.com", Role::User).await;
        submit(&state, &owner, "t1", true).await;

        let tool = approve_tool(&state, &admin, "t1", Some("ok".into()))
            .await
            .unwrap();
        assert_eq!(tool.status, ToolStatus::Approved);
        assert_eq!(tool.reviewed_by, Some(admin.id));

        let hide = ToolPatch {
            is_public: Some(false),
            ..ToolPatch::default()
        };
        let hidden = tool_services::update_tool(&state, &owner, "t1", hide)
            .await
            .unwrap();
        assert_eq!(hidden.status, ToolStatus::Approved);

        let show = ToolPatch {
            is_public: Some(true),
            ..ToolPatch::default()
        };
        let shown = tool_services::update_tool(&state, &owner, "t1", show)
            .await
            .unwrap();
        assert_eq!(shown.status, ToolStatus::Pending);
    }

    #[tokio::test]
    async fn pending_queue_excludes_private_tools() {
        let state = AppState::fake();
        let admin = insert_user(&state, "root@x.com", Role::Admin).await;
        let owner = insert_user(&state, "o@x.com", Role::User).await;
        submit(&state, &owner, "public", true).await;
        submit(&state, &owner, "private", false).await;

        let queue = pending_tools(&state, &admin, PendingToolsQuery::default())
            .await
            .unwrap();
        assert_eq!(queue.total, 1);
        assert_eq!(queue.items[0].uuid, "public");

        let everything = all_tools(&state, &admin, ListAllToolsQuery::default())
            .await
            .unwrap();
        assert_eq!(everything.total, 2);
    }

    #[tokio::test]
    async fn admin_delete_bypasses_ownership() {
        let state = AppState::fake();
        let admin = insert_user(&state, "root@x.com", Role::Admin).await;
        let owner = insert_user(&state, "o@x.com", Role::User).await;
        submit(&state, &owner, "gone", false).await;

        delete_tool(&state, &admin, "gone").await.unwrap();
        assert!(matches!(
            delete_tool(&state, &admin, "gone").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn listings_and_stats() {
        let state = AppState::fake();
        let admin = insert_user(&state, "root@x.com", Role::Admin).await;
        let owner = insert_user(&state, "owner@x.com", Role::User).await;
        submit(&state, &owner, "one", true).await;
        submit(&state, &owner, "two", false).await;
        approve_tool(&state, &admin, "one", None).await.unwrap();

        let admins = list_users(
            &state,
            &admin,
            ListUsersQuery {
                role: Some(Role::Admin),
                ..ListUsersQuery::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(admins.total, 1);

        let local = list_users(
            &state,
            &admin,
            ListUsersQuery {
                provider: Some(Provider::Local),
                search: Some("OWNER".into()),
                ..ListUsersQuery::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(local.items.len(), 1);
        assert_eq!(local.items[0].id, owner.id);

        let owned = user_tools(
            &state,
            &admin,
            owner.id,
            UserToolsQuery {
                status: Some(ToolStatus::Approved),
                ..UserToolsQuery::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(owned.total, 1);
        assert!(matches!(
            user_tools(&state, &admin, 4242, UserToolsQuery::default()).await,
            Err(AppError::NotFound(_))
        ));

        let (_, per_user) = user_detail(&state, &admin, owner.id).await.unwrap();
        assert_eq!(per_user.total, 2);
        assert_eq!(per_user.approved, 1);
        assert_eq!(per_user.pending, 1);

        let (users, tools) = stats(&state, &admin).await.unwrap();
        assert_eq!(users.total, 2);
        assert_eq!(users.admin, 1);
        assert_eq!(users.local, 2);
        assert_eq!(tools.total, 2);
        assert_eq!(tools.public, 1);
        assert_eq!(tools.private, 1);
    }
}
