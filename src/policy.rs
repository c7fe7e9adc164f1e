//! Who may do what. Every guarded operation names its [`Action`] and calls
//! [`authorize`] before touching the store.

use crate::{
    auth::repo_types::User,
    error::{AppError, AppResult},
    tools::repo_types::Tool,
};

#[derive(Debug, Clone, Copy)]
pub enum Action<'a> {
    ViewTool(&'a Tool),
    EditTool(&'a Tool),
    DeleteTool(&'a Tool),
    ViewReviewInfo,
    /// Admin-only tool review, listing and deletion.
    Moderate,
    /// Role or activation change on another account.
    ManageUser { target_id: i64 },
}

pub fn authorize(actor: &User, action: Action<'_>) -> AppResult<()> {
    match action {
        Action::ViewTool(tool) => {
            if tool.user_id != actor.id && !tool.is_listed() {
                return Err(AppError::forbidden("No permission to view this tool"));
            }
        }
        Action::EditTool(tool) => {
            if tool.user_id != actor.id {
                return Err(AppError::forbidden("No permission to modify this tool"));
            }
        }
        Action::DeleteTool(tool) => {
            if tool.user_id != actor.id {
                return Err(AppError::forbidden("No permission to delete this tool"));
            }
        }
        Action::ViewReviewInfo | Action::Moderate => {
            if !actor.is_admin() {
                return Err(AppError::forbidden("Administrator privileges required"));
            }
        }
        Action::ManageUser { target_id } => {
            if !actor.is_admin() {
                return Err(AppError::forbidden("Administrator privileges required"));
            }
            if target_id == actor.id {
                return Err(AppError::invalid("Cannot modify your own account"));
            }
        }
    }
    Ok(())
}

pub fn allows(actor: &User, action: Action<'_>) -> bool {
    authorize(actor, action).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo_types::{Provider, Role};
    use crate::tools::repo_types::{sample_tool, ToolStatus};
    use time::OffsetDateTime;

    fn actor(id: i64, role: Role) -> User {
        let now = OffsetDateTime::now_utc();
        User {
            id,
            name: "a".into(),
            email: format!("{}@x.com", id),
            password_hash: None,
            avatar: None,
            role,
            provider: Provider::Local,
            provider_id: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn non_owner_sees_only_listed_tools() {
        let stranger = actor(1, Role::User);
        for (status, public) in [
            (ToolStatus::Pending, true),
            (ToolStatus::Rejected, true),
            (ToolStatus::Approved, false),
        ] {
            let tool = sample_tool(status, public);
            assert!(matches!(
                authorize(&stranger, Action::ViewTool(&tool)),
                Err(AppError::Forbidden(_))
            ));
        }
        let listed = sample_tool(ToolStatus::Approved, true);
        assert!(allows(&stranger, Action::ViewTool(&listed)));
    }

    #[test]
    fn admin_gets_no_view_override() {
        let admin = actor(1, Role::Admin);
        let tool = sample_tool(ToolStatus::Pending, false);
        assert!(!allows(&admin, Action::ViewTool(&tool)));
        assert!(allows(&admin, Action::ViewReviewInfo));
    }

    #[test]
    fn only_owner_edits_or_deletes() {
        let tool = sample_tool(ToolStatus::Approved, true);
        let owner = actor(tool.user_id, Role::User);
        let admin = actor(99, Role::Admin);
        assert!(allows(&owner, Action::EditTool(&tool)));
        assert!(allows(&owner, Action::DeleteTool(&tool)));
        assert!(!allows(&admin, Action::EditTool(&tool)));
        assert!(!allows(&admin, Action::DeleteTool(&tool)));
    }

    #[test]
    fn moderation_requires_admin() {
        assert!(matches!(
            authorize(&actor(1, Role::User), Action::Moderate),
            Err(AppError::Forbidden(_))
        ));
        assert!(allows(&actor(1, Role::Admin), Action::Moderate));
    }

    #[test]
    fn managing_self_is_invalid_input() {
        let admin = actor(5, Role::Admin);
        assert!(matches!(
            authorize(&admin, Action::ManageUser { target_id: 5 }),
            Err(AppError::InvalidInput(_))
        ));
        assert!(allows(&admin, Action::ManageUser { target_id: 6 }));
        assert!(matches!(
            authorize(&actor(5, Role::User), Action::ManageUser { target_id: 6 }),
            Err(AppError::Forbidden(_))
        ));
    }
}
