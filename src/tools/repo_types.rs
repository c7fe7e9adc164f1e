use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

/// Moderation lifecycle stage of a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "tool_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl ToolStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolStatus::Pending => "pending",
            ToolStatus::Approved => "approved",
            ToolStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ToolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tool record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct Tool {
    pub id: i64,
    pub uuid: String, // externally exposed, immutable
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub url: Option<String>,
    pub icon: Option<String>,
    pub is_public: bool,
    pub status: ToolStatus,
    pub user_id: i64,
    pub reviewed_by: Option<i64>,
    pub reviewed_at: Option<OffsetDateTime>,
    pub review_comment: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Tool {
    /// Visible to everyone, not just the owner.
    pub fn is_listed(&self) -> bool {
        self.is_public && self.status == ToolStatus::Approved
    }

    /// Turning visibility on sends the tool back to review; turning it off keeps the status.
    pub fn set_public(&mut self, is_public: bool) {
        if is_public && !self.is_public {
            self.status = ToolStatus::Pending;
        }
        self.is_public = is_public;
    }

    pub fn approve(&mut self, reviewer_id: i64, comment: Option<String>) {
        self.record_review(ToolStatus::Approved, reviewer_id, comment);
    }

    pub fn reject(&mut self, reviewer_id: i64, comment: String) {
        self.record_review(ToolStatus::Rejected, reviewer_id, Some(comment));
    }

    fn record_review(&mut self, status: ToolStatus, reviewer_id: i64, comment: Option<String>) {
        self.status = status;
        self.reviewed_by = Some(reviewer_id);
        self.reviewed_at = Some(OffsetDateTime::now_utc());
        self.review_comment = Some(comment.unwrap_or_default());
    }
}

/// Fields supplied when inserting a tool; status always starts at pending.
#[derive(Debug, Clone)]
pub struct NewTool {
    pub uuid: String,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub url: Option<String>,
    pub icon: Option<String>,
    pub is_public: bool,
    pub user_id: i64,
}

#[cfg(test)]
pub(crate) fn sample_tool(status: ToolStatus, is_public: bool) -> Tool {
    let now = OffsetDateTime::now_utc();
    Tool {
        id: 1,
        uuid: "t1".into(),
        name: "grep".into(),
        description: None,
        category: None,
        url: None,
        icon: None,
        is_public,
        status,
        user_id: 10,
        reviewed_by: None,
        reviewed_at: None,
        review_comment: None,
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turning_public_on_resets_any_status() {
        for status in [ToolStatus::Pending, ToolStatus::Approved, ToolStatus::Rejected] {
            let mut tool = sample_tool(status, false);
            tool.set_public(true);
            assert!(tool.is_public);
            assert_eq!(tool.status, ToolStatus::Pending);
        }
    }

    #[test]
    fn turning_public_off_keeps_status() {
        for status in [ToolStatus::Pending, ToolStatus::Approved, ToolStatus::Rejected] {
            let mut tool = sample_tool(status, true);
            tool.set_public(false);
            assert!(!tool.is_public);
            assert_eq!(tool.status, status);
        }
    }

    #[test]
    fn keeping_public_on_does_not_requeue() {
        let mut tool = sample_tool(ToolStatus::Approved, true);
        tool.set_public(true);
        assert_eq!(tool.status, ToolStatus::Approved);
    }

    #[test]
    fn review_stamps_reviewer() {
        let mut tool = sample_tool(ToolStatus::Pending, true);
        tool.approve(7, None);
        assert_eq!(tool.status, ToolStatus::Approved);
        assert_eq!(tool.reviewed_by, Some(7));
        assert!(tool.reviewed_at.is_some());
        assert_eq!(tool.review_comment.as_deref(), Some(""));
        assert!(tool.is_listed());

        let mut tool = sample_tool(ToolStatus::Pending, true);
        tool.reject(8, "spam".into());
        assert_eq!(tool.status, ToolStatus::Rejected);
        assert_eq!(tool.review_comment.as_deref(), Some("spam"));
        assert!(!tool.is_listed());
    }
}
