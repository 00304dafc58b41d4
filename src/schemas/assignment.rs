use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::Assignment;
use crate::db::types::AssignmentStatus;
use crate::schemas::datetime::deserialize_offset_datetime_flexible;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AssignmentCreate {
    #[serde(alias = "courseId")]
    pub(crate) course_id: String,
    #[validate(length(min = 1, max = 200, message = "title must not be empty"))]
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(alias = "dueDate", deserialize_with = "deserialize_offset_datetime_flexible")]
    pub(crate) due_date: OffsetDateTime,
    #[serde(alias = "maxPoints", default = "default_max_points")]
    #[validate(range(exclusive_min = 0.0, message = "max_points must be positive"))]
    pub(crate) max_points: f64,
    #[serde(alias = "allowLateSubmission", default)]
    pub(crate) allow_late_submission: bool,
    #[serde(alias = "latePenaltyRate", default)]
    #[validate(range(min = 0.0, max = 100.0, message = "late_penalty_rate must be 0-100"))]
    pub(crate) late_penalty_rate: f64,
}

#[derive(Debug, Serialize)]
pub(crate) struct AssignmentResponse {
    pub(crate) id: String,
    pub(crate) course_id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) due_date: String,
    pub(crate) max_points: f64,
    pub(crate) allow_late_submission: bool,
    pub(crate) late_penalty_rate: f64,
    pub(crate) status: AssignmentStatus,
    pub(crate) created_by: String,
    pub(crate) published_at: Option<String>,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl AssignmentResponse {
    pub(crate) fn from_db(assignment: Assignment) -> Self {
        Self {
            id: assignment.id,
            course_id: assignment.course_id,
            title: assignment.title,
            description: assignment.description,
            due_date: format_primitive(assignment.due_date),
            max_points: assignment.max_points,
            allow_late_submission: assignment.allow_late_submission,
            late_penalty_rate: assignment.late_penalty_rate,
            status: assignment.status,
            created_by: assignment.created_by,
            published_at: assignment.published_at.map(format_primitive),
            created_at: format_primitive(assignment.created_at),
            updated_at: format_primitive(assignment.updated_at),
        }
    }
}

fn default_max_points() -> f64 {
    100.0
}
