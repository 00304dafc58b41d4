use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{Grade, Submission};
use crate::db::types::SubmissionStatus;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SubmissionUpsert {
    #[serde(alias = "assignmentId")]
    pub(crate) assignment_id: String,
    /// Defaults to the caller.
    #[serde(default)]
    #[serde(alias = "studentId")]
    pub(crate) student_id: Option<String>,
    #[serde(default)]
    #[validate(length(max = 100_000, message = "content is too long"))]
    pub(crate) content: String,
    #[serde(default)]
    #[validate(length(max = 20, message = "at most 20 attachments are allowed"))]
    pub(crate) attachments: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmissionResponse {
    pub(crate) id: String,
    pub(crate) assignment_id: String,
    pub(crate) student_id: String,
    pub(crate) content: String,
    pub(crate) attachments: Vec<String>,
    pub(crate) is_late: bool,
    pub(crate) status: SubmissionStatus,
    pub(crate) submitted_at: Option<String>,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl SubmissionResponse {
    pub(crate) fn from_db(submission: Submission) -> Self {
        Self {
            id: submission.id,
            assignment_id: submission.assignment_id,
            student_id: submission.student_id,
            content: submission.content,
            attachments: submission.attachments.0,
            is_late: submission.is_late,
            status: submission.status,
            submitted_at: submission.submitted_at.map(format_primitive),
            created_at: format_primitive(submission.created_at),
            updated_at: format_primitive(submission.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct FinalizeResponse {
    pub(crate) submission: SubmissionResponse,
    pub(crate) tokens_awarded: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct GradeCreate {
    #[serde(alias = "submissionId")]
    pub(crate) submission_id: String,
    #[serde(alias = "gradeValue")]
    #[validate(range(min = 0.0, max = 100.0, message = "grade_value must be between 0 and 100"))]
    pub(crate) grade_value: f64,
    #[serde(default)]
    #[validate(length(max = 5_000, message = "comment is too long"))]
    pub(crate) comment: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct GradeResponse {
    pub(crate) id: String,
    pub(crate) submission_id: String,
    pub(crate) value: f64,
    pub(crate) adjusted_value: f64,
    pub(crate) comment: Option<String>,
    pub(crate) grader_id: String,
    pub(crate) graded_at: String,
}

impl GradeResponse {
    pub(crate) fn from_db(grade: Grade) -> Self {
        Self {
            id: grade.id,
            submission_id: grade.submission_id,
            value: grade.value,
            adjusted_value: grade.adjusted_value,
            comment: grade.comment,
            grader_id: grade.grader_id,
            graded_at: format_primitive(grade.graded_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct GradedResponse {
    pub(crate) grade: GradeResponse,
    pub(crate) submission: SubmissionResponse,
    pub(crate) bonus_tokens: i32,
}
