use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::api::pagination::default_limit;
use crate::core::time::format_primitive;
use crate::db::models::Notification;
use crate::db::types::{NotificationKind, NotificationPriority, UserRole};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct NotificationCreate {
    #[serde(alias = "userIds")]
    #[validate(length(min = 1, max = 1000, message = "user_ids must list 1-1000 recipients"))]
    pub(crate) user_ids: Vec<String>,
    #[validate(length(min = 1, max = 200, message = "title must not be empty"))]
    pub(crate) title: String,
    #[validate(length(min = 1, max = 5_000, message = "message must not be empty"))]
    pub(crate) message: String,
    #[serde(rename = "type", alias = "kind", default = "default_direct_kind")]
    pub(crate) kind: NotificationKind,
    #[serde(default)]
    pub(crate) priority: NotificationPriority,
    #[serde(default)]
    pub(crate) metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SystemNotificationCreate {
    #[validate(length(min = 1, max = 200, message = "title must not be empty"))]
    pub(crate) title: String,
    #[validate(length(min = 1, max = 5_000, message = "message must not be empty"))]
    pub(crate) message: String,
    #[serde(rename = "type", alias = "kind", default = "default_system_kind")]
    pub(crate) kind: NotificationKind,
    #[serde(default)]
    pub(crate) priority: NotificationPriority,
    /// `None` targets every active user.
    #[serde(default)]
    pub(crate) role: Option<UserRole>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NotificationListParams {
    #[serde(default)]
    pub(crate) skip: i64,
    #[serde(default = "default_limit")]
    pub(crate) limit: i64,
    #[serde(default)]
    pub(crate) unread_only: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct NotificationResponse {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) title: String,
    pub(crate) message: String,
    #[serde(rename = "type")]
    pub(crate) kind: NotificationKind,
    pub(crate) priority: NotificationPriority,
    pub(crate) is_read: bool,
    pub(crate) read_at: Option<String>,
    pub(crate) metadata: serde_json::Value,
    pub(crate) created_at: String,
}

impl NotificationResponse {
    pub(crate) fn from_db(notification: Notification) -> Self {
        Self {
            id: notification.id,
            user_id: notification.user_id,
            title: notification.title,
            message: notification.message,
            kind: notification.kind,
            priority: notification.priority,
            is_read: notification.is_read,
            read_at: notification.read_at.map(format_primitive),
            metadata: notification.metadata.0,
            created_at: format_primitive(notification.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct DispatchResponse {
    pub(crate) notifications_created: usize,
    pub(crate) recipients: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct UnreadCountResponse {
    pub(crate) unread_count: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct MarkedReadResponse {
    pub(crate) updated: u64,
}

fn default_direct_kind() -> NotificationKind {
    NotificationKind::Info
}

fn default_system_kind() -> NotificationKind {
    NotificationKind::System
}
