use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{
    AssignmentStatus, EnrollmentStatus, NotificationKind, NotificationPriority, SubmissionStatus,
    UserRole,
};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct User {
    pub(crate) id: String,
    pub(crate) email: String,
    pub(crate) hashed_password: String,
    pub(crate) full_name: String,
    pub(crate) role: UserRole,
    pub(crate) is_active: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Course {
    pub(crate) id: String,
    pub(crate) code: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) teacher_id: String,
    pub(crate) is_active: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Enrollment {
    pub(crate) id: String,
    pub(crate) course_id: String,
    pub(crate) student_id: String,
    pub(crate) status: EnrollmentStatus,
    pub(crate) enrolled_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Assignment {
    pub(crate) id: String,
    pub(crate) course_id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) due_date: PrimitiveDateTime,
    pub(crate) max_points: f64,
    pub(crate) allow_late_submission: bool,
    pub(crate) late_penalty_rate: f64,
    pub(crate) status: AssignmentStatus,
    pub(crate) created_by: String,
    pub(crate) published_at: Option<PrimitiveDateTime>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Submission {
    pub(crate) id: String,
    pub(crate) assignment_id: String,
    pub(crate) student_id: String,
    pub(crate) content: String,
    pub(crate) attachments: Json<Vec<String>>,
    pub(crate) is_late: bool,
    pub(crate) status: SubmissionStatus,
    pub(crate) submitted_at: Option<PrimitiveDateTime>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

impl Submission {
    pub(crate) fn has_content(&self) -> bool {
        !self.content.trim().is_empty() || !self.attachments.0.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Grade {
    pub(crate) id: String,
    pub(crate) submission_id: String,
    pub(crate) value: f64,
    pub(crate) adjusted_value: f64,
    pub(crate) comment: Option<String>,
    pub(crate) grader_id: String,
    pub(crate) graded_at: PrimitiveDateTime,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Notification {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) title: String,
    pub(crate) message: String,
    pub(crate) kind: NotificationKind,
    pub(crate) priority: NotificationPriority,
    pub(crate) is_read: bool,
    pub(crate) read_at: Option<PrimitiveDateTime>,
    pub(crate) metadata: Json<serde_json::Value>,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct TokenTransaction {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) amount: i32,
    pub(crate) kind: String,
    pub(crate) reason: String,
    pub(crate) metadata: Json<serde_json::Value>,
    pub(crate) created_at: PrimitiveDateTime,
}
