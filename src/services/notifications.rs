//! Notification fan-out.
//!
//! A dispatch resolves its recipients, persists one notification row per
//! recipient in a single bulk insert, and only then starts the paired email
//! sends on a background task. The bulk insert is the durability boundary:
//! when it fails nothing was written and no email is attempted. Email
//! failures stay inside the background batch.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use time::PrimitiveDateTime;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::core::metrics::{EMAILS_TOTAL, NOTIFICATIONS_CREATED_TOTAL};
use crate::db::models::{Notification, User};
use crate::db::types::{NotificationKind, NotificationPriority, UserRole};
use crate::repositories::notifications::CreateNotification;
use crate::repositories::Store;
use crate::services::best_effort::{self, BatchReport};
use crate::services::errors::{StoreResultExt, WorkflowError};
use crate::services::mailer::{Mailer, OutgoingEmail};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Recipients {
    /// Explicit user ids. Unknown ids fail the dispatch.
    Users(Vec<String>),
    /// Active users with the role, or every active user for `None`.
    Role(Option<UserRole>),
    /// Actively enrolled students of the course.
    CourseStudents(String),
}

#[derive(Debug, Clone)]
pub(crate) struct NotificationDraft {
    pub(crate) title: String,
    pub(crate) message: String,
    pub(crate) kind: NotificationKind,
    pub(crate) priority: NotificationPriority,
    pub(crate) metadata: Value,
}

impl NotificationDraft {
    pub(crate) fn new(
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            kind,
            priority: NotificationPriority::default(),
            metadata: Value::Object(Default::default()),
        }
    }

    pub(crate) fn priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = priority;
        self
    }

    pub(crate) fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Resolves to the per-recipient email report once every send finished.
pub(crate) type DeliveryHandle = JoinHandle<BatchReport<String>>;

#[derive(Debug)]
pub(crate) struct Dispatched {
    pub(crate) notifications: Vec<Notification>,
    #[cfg_attr(not(test), allow(dead_code))]
    pub(crate) delivery: DeliveryHandle,
}

#[derive(Clone)]
pub(crate) struct NotificationDispatcher {
    store: Arc<dyn Store>,
    mailer: Arc<dyn Mailer>,
    frontend_url: String,
}

impl NotificationDispatcher {
    pub(crate) fn new(
        store: Arc<dyn Store>,
        mailer: Arc<dyn Mailer>,
        frontend_url: String,
    ) -> Self {
        Self { store, mailer, frontend_url: frontend_url.trim_end_matches('/').to_string() }
    }

    pub(crate) async fn dispatch(
        &self,
        recipients: Recipients,
        draft: NotificationDraft,
        now: PrimitiveDateTime,
    ) -> Result<Dispatched, WorkflowError> {
        let users = self.resolve(&recipients).await?;
        self.dispatch_to(users, draft, now).await
    }

    async fn resolve(&self, recipients: &Recipients) -> Result<Vec<User>, WorkflowError> {
        match recipients {
            Recipients::Users(ids) => {
                let mut seen = HashSet::new();
                let ids: Vec<String> =
                    ids.iter().filter(|id| seen.insert(id.as_str())).cloned().collect();

                let users =
                    self.store.find_users(&ids).await.persistence("Failed to load recipients")?;
                let found: HashSet<&str> = users.iter().map(|user| user.id.as_str()).collect();
                let missing: Vec<&str> =
                    ids.iter().map(String::as_str).filter(|id| !found.contains(id)).collect();
                if !missing.is_empty() {
                    return Err(WorkflowError::not_found(format!(
                        "Recipients not found: {}",
                        missing.join(", ")
                    )));
                }
                Ok(users)
            }
            Recipients::Role(role) => {
                self.store.list_active_users(*role).await.persistence("Failed to load recipients")
            }
            Recipients::CourseStudents(course_id) => self
                .store
                .list_active_students(course_id)
                .await
                .persistence("Failed to load course students"),
        }
    }

    async fn dispatch_to(
        &self,
        users: Vec<User>,
        draft: NotificationDraft,
        now: PrimitiveDateTime,
    ) -> Result<Dispatched, WorkflowError> {
        let rows = users
            .iter()
            .map(|user| CreateNotification {
                id: Uuid::new_v4().to_string(),
                user_id: user.id.clone(),
                title: draft.title.clone(),
                message: draft.message.clone(),
                kind: draft.kind,
                priority: draft.priority,
                metadata: draft.metadata.clone(),
                created_at: now,
            })
            .collect();

        let notifications = match self.store.insert_notifications(rows).await {
            Ok(notifications) => notifications,
            Err(err) => {
                tracing::error!(
                    error = %err,
                    recipients = users.len(),
                    kind = ?draft.kind,
                    "Failed to persist notifications"
                );
                return Err(err).persistence("Failed to persist notifications");
            }
        };

        metrics::counter!(NOTIFICATIONS_CREATED_TOTAL).increment(notifications.len() as u64);
        tracing::info!(
            recipients = notifications.len(),
            kind = ?draft.kind,
            title = %draft.title,
            "Notifications persisted"
        );

        let emails: Vec<(String, OutgoingEmail)> =
            users.iter().map(|user| (user.id.clone(), self.compose(user, &draft))).collect();
        let delivery = tokio::spawn(deliver(self.mailer.clone(), emails));

        Ok(Dispatched { notifications, delivery })
    }

    fn compose(&self, user: &User, draft: &NotificationDraft) -> OutgoingEmail {
        let link = format!("{}/notifications", self.frontend_url);
        let name = if user.full_name.trim().is_empty() { "there" } else { user.full_name.as_str() };

        let text_body = format!(
            "Hello {name},\n\n{message}\n\nView your notifications: {link}\n",
            message = draft.message,
        );
        let html_body = format!(
            "<!DOCTYPE html>\n<html><body>\
             <h2>{title}</h2>\
             <p>Hello {name},</p>\
             <p>{message}</p>\
             <p><a href=\"{link}\">View your notifications</a></p>\
             </body></html>",
            title = escape_html(&draft.title),
            name = escape_html(name),
            message = escape_html(&draft.message),
            link = escape_html(&link),
        );

        OutgoingEmail { to: user.email.clone(), subject: draft.title.clone(), text_body, html_body }
    }
}

async fn deliver(
    mailer: Arc<dyn Mailer>,
    emails: Vec<(String, OutgoingEmail)>,
) -> BatchReport<String> {
    let effects = emails
        .into_iter()
        .map(|(user_id, email)| {
            let mailer = mailer.clone();
            let effect = async move {
                let result = mailer.send(email).await;
                let status = if result.is_ok() { "sent" } else { "failed" };
                metrics::counter!(EMAILS_TOTAL, "status" => status).increment(1);
                result
            };
            (user_id, effect)
        })
        .collect();

    let report = best_effort::run_batch("notification_email", effects).await;
    let undelivered: Vec<&str> = report.failures().map(|outcome| outcome.key.as_str()).collect();
    tracing::info!(
        sent = report.succeeded(),
        failed = report.failed(),
        undelivered = ?undelivered,
        "Notification email batch finished"
    );
    report
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
