use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::repo_types::User,
    error::{AppError, AppResult},
    policy::{authorize, Action},
    state::AppState,
    store::{Page, PageRequest, StoreTx, ToolFilter},
    tools::{
        dto::{CreateToolRequest, ListToolsQuery, ToolPatch},
        repo_types::{NewTool, Tool},
    },
};

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_UUID_LEN: usize = 64;

fn validate_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::invalid("Tool name is required"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::invalid("Tool name is too long"));
    }
    Ok(name.to_string())
}

/// Blank optional text is stored as absent.
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) async fn load_tool(tx: &mut dyn StoreTx, uuid: &str) -> AppResult<Tool> {
    tx.find_tool_by_uuid(uuid)
        .await?
        .ok_or_else(|| AppError::not_found("Tool not found"))
}

#[instrument(skip(state, owner, req), fields(user_id = owner.id))]
pub async fn create_tool(state: &AppState, owner: &User, req: CreateToolRequest) -> AppResult<Tool> {
    let name = validate_name(&req.name)?;
    let uuid = match non_blank(req.uuid) {
        Some(u) if u.chars().count() > MAX_UUID_LEN => {
            return Err(AppError::invalid("Tool uuid is too long"));
        }
        Some(u) => u,
        None => Uuid::new_v4().to_string(),
    };

    let mut tx = state.store.begin().await?;
    if tx.find_tool_by_uuid(&uuid).await?.is_some() {
        warn!(uuid = %uuid, "tool uuid already taken");
        return Err(AppError::conflict("Tool uuid already exists"));
    }
    let tool = tx
        .insert_tool(NewTool {
            uuid,
            name,
            description: non_blank(req.description),
            category: non_blank(req.category),
            url: non_blank(req.url),
            icon: non_blank(req.icon),
            is_public: req.is_public,
            user_id: owner.id,
        })
        .await?;
    tx.commit().await?;

    info!(tool_id = tool.id, uuid = %tool.uuid, "tool created");
    Ok(tool)
}

/// Own tools in any state plus everything publicly listed, or only own tools with `my_tools`.
#[instrument(skip(state, requester, query), fields(user_id = requester.id))]
pub async fn list_tools(
    state: &AppState,
    requester: &User,
    query: ListToolsQuery,
) -> AppResult<Page<Tool>> {
    let mut filter = ToolFilter {
        category: non_blank(query.category),
        is_public: query.is_public,
        search: non_blank(query.search),
        ..ToolFilter::default()
    };
    if query.my_tools {
        filter.owner_id = Some(requester.id);
    } else {
        filter.visible_to = Some(requester.id);
    }

    let mut tx = state.store.begin().await?;
    let page = tx
        .query_tools(&filter, PageRequest::new(query.page, query.per_page))
        .await?;
    Ok(page)
}

#[instrument(skip(state, requester), fields(user_id = requester.id))]
pub async fn get_tool(state: &AppState, requester: &User, uuid: &str) -> AppResult<Tool> {
    let mut tx = state.store.begin().await?;
    let tool = load_tool(tx.as_mut(), uuid).await?;
    authorize(requester, Action::ViewTool(&tool))?;
    Ok(tool)
}

fn apply_patch(tool: &mut Tool, patch: ToolPatch) -> AppResult<()> {
    if let Some(name) = patch.name {
        tool.name = validate_name(&name)?;
    }
    if let Some(description) = patch.description {
        tool.description = non_blank(description);
    }
    if let Some(category) = patch.category {
        tool.category = non_blank(category);
    }
    if let Some(url) = patch.url {
        tool.url = non_blank(url);
    }
    if let Some(icon) = patch.icon {
        tool.icon = non_blank(icon);
    }
    if let Some(is_public) = patch.is_public {
        tool.set_public(is_public);
    }
    Ok(())
}

#[instrument(skip(state, requester, patch), fields(user_id = requester.id))]
pub async fn update_tool(
    state: &AppState,
    requester: &User,
    uuid: &str,
    patch: ToolPatch,
) -> AppResult<Tool> {
    let mut tx = state.store.begin().await?;
    let mut tool = load_tool(tx.as_mut(), uuid).await?;
    authorize(requester, Action::EditTool(&tool))?;

    let previous = tool.status;
    apply_patch(&mut tool, patch)?;
    let saved = tx.update_tool(&tool).await?;
    tx.commit().await?;

    if saved.status != previous {
        info!(tool_id = saved.id, from = %previous, to = %saved.status, "tool requeued for review");
    }
    info!(tool_id = saved.id, "tool updated");
    Ok(saved)
}

#[instrument(skip(state, requester), fields(user_id = requester.id))]
pub async fn delete_tool(state: &AppState, requester: &User, uuid: &str) -> AppResult<()> {
    let mut tx = state.store.begin().await?;
    let tool = load_tool(tx.as_mut(), uuid).await?;
    authorize(requester, Action::DeleteTool(&tool))?;
    tx.delete_tool(tool.id).await?;
    tx.commit().await?;

    info!(tool_id = tool.id, "tool deleted");
    Ok(())
}

pub async fn categories(state: &AppState) -> AppResult<Vec<String>> {
    let mut tx = state.store.begin().await?;
    Ok(tx.distinct_categories().await?)
}
